use chrono::NaiveDate;

use crate::model::*;

use super::calendar::slots_for;

// ── Availability Algorithm ────────────────────────────────────────

/// Live claims overlapping one slot, per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotCounts {
    pub regular: u32,
    pub private_booth: u32,
    pub whole_facility: bool,
}

/// Count unexpired holds and non-cancelled reservations overlapping `span`.
pub fn count_claims(facility: &FacilityState, span: &Span, now: Ms) -> SlotCounts {
    let mut counts = SlotCounts::default();
    for interval in facility.overlapping(span) {
        if !interval.is_active(now) {
            continue;
        }
        match interval.channel() {
            Channel::Regular => counts.regular += 1,
            Channel::PrivateBooth => counts.private_booth += 1,
            Channel::WholeFacility => counts.whole_facility = true,
        }
    }
    counts
}

/// Channel flags for one slot.
///
/// Whole-facility needs the slot empty on every channel; regular and booth
/// each need no whole-facility claim and room in their own pool.
pub fn classify(config: &FacilityConfig, slot: TimeSlot, counts: SlotCounts) -> SlotAvailability {
    SlotAvailability {
        slot,
        regular_count: counts.regular,
        private_booth_count: counts.private_booth,
        whole_facility_present: counts.whole_facility,
        regular_available: !counts.whole_facility && counts.regular < config.capacity,
        private_booth_available: !counts.whole_facility
            && counts.private_booth < config.booth_pool,
        whole_facility_available: counts.regular == 0
            && counts.private_booth == 0
            && !counts.whole_facility,
    }
}

/// Per-slot availability for every slot of `date`.
pub fn resolve_day(facility: &FacilityState, date: NaiveDate, now: Ms) -> Vec<SlotAvailability> {
    let config = &facility.config;
    slots_for(config, date)
        .into_iter()
        .map(|slot| {
            let span = slot_span(config, &slot);
            classify(config, slot, count_claims(facility, &span, now))
        })
        .collect()
}

/// Check every slot of `[start, start + hours)` for `channel`.
///
/// Returns the first slot that fails; one failing hour rejects the whole
/// request, there are no partial bookings.
pub fn check_span(
    facility: &FacilityState,
    date: NaiveDate,
    start: Minute,
    duration_hours: u32,
    channel: Channel,
    now: Ms,
) -> Result<(), TimeSlot> {
    let config = &facility.config;
    let end = start + duration_hours * 60;
    for slot in slots_for(config, date) {
        if slot.end <= start || slot.start >= end {
            continue;
        }
        let span = slot_span(config, &slot);
        let avail = classify(config, slot, count_claims(facility, &span, now));
        if !avail.is_open(channel) {
            return Err(slot);
        }
    }
    Ok(())
}

fn slot_span(config: &FacilityConfig, slot: &TimeSlot) -> Span {
    let start = config.local_to_ms(slot.date, slot.start);
    Span::new(start, start + (slot.end - slot.start) as Ms * MINUTE_MS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, 1).unwrap()
    }

    fn facility(capacity: u32, booth_pool: u32) -> FacilityState {
        let mut cfg = FacilityConfig::new(Ulid::new());
        cfg.capacity = capacity;
        cfg.booth_pool = booth_pool;
        FacilityState::new(cfg)
    }

    fn reserve(fs: &mut FacilityState, plan: FeePlan, start_hour: u32, hours: u32, status: ReservationStatus) -> Ulid {
        let id = Ulid::new();
        let start = start_hour * 60;
        let r = Reservation {
            id,
            facility_id: fs.id(),
            account_id: "acct".into(),
            date: date(),
            start,
            duration_hours: hours,
            plan,
            head_count: 1,
            entities: vec![],
            status,
            total_amount: 0,
            refund_percent: None,
            created_at: 0,
            cancelled_at: None,
        };
        let span = fs.config.booking_span(date(), start, hours);
        fs.insert_interval(Interval { span, claim: Claim::Reservation(r) });
        id
    }

    fn hold(fs: &mut FacilityState, plan: FeePlan, start_hour: u32, expires_at: Ms) {
        let start = start_hour * 60;
        let h = Hold {
            id: Ulid::new(),
            facility_id: fs.id(),
            account_id: "acct".into(),
            date: date(),
            start,
            duration_hours: 1,
            plan,
            head_count: 1,
            entities: vec![],
            quote: PricingQuote {
                channel: plan.channel(),
                plan,
                base_amount: 0,
                discount_amount: None,
                final_amount: 0,
            },
            expires_at,
        };
        let span = fs.config.booking_span(date(), start, 1);
        fs.insert_interval(Interval { span, claim: Claim::Hold(h) });
    }

    fn at(day: &[SlotAvailability], hour: u32) -> SlotAvailability {
        *day.iter().find(|s| s.slot.start == hour * 60).unwrap()
    }

    #[test]
    fn empty_day_all_channels_open() {
        let fs = facility(2, 1);
        let day = resolve_day(&fs, date(), 0);
        assert_eq!(day.len(), 16);
        assert!(day.iter().all(|s| s.regular_available && s.private_booth_available && s.whole_facility_available));
    }

    #[test]
    fn no_booths_means_booth_never_available() {
        let fs = facility(2, 0);
        let day = resolve_day(&fs, date(), 0);
        assert!(day.iter().all(|s| !s.private_booth_available));
    }

    #[test]
    fn whole_facility_blocks_other_channels() {
        let mut fs = facility(5, 2);
        reserve(&mut fs, FeePlan::FacilityRental, 10, 2, ReservationStatus::Confirmed);
        let day = resolve_day(&fs, date(), 0);
        for h in [10, 11] {
            let s = at(&day, h);
            assert!(s.whole_facility_present);
            assert!(!s.regular_available);
            assert!(!s.private_booth_available);
            assert!(!s.whole_facility_available);
        }
        assert!(at(&day, 12).regular_available);
        assert!(at(&day, 9).whole_facility_available);
    }

    #[test]
    fn any_other_claim_blocks_whole_facility() {
        let mut fs = facility(5, 2);
        reserve(&mut fs, FeePlan::DayPass, 9, 1, ReservationStatus::Pending);
        reserve(&mut fs, FeePlan::BoothRental, 13, 1, ReservationStatus::Confirmed);
        let day = resolve_day(&fs, date(), 0);
        assert!(!at(&day, 9).whole_facility_available);
        assert!(at(&day, 9).regular_available);
        assert!(!at(&day, 13).whole_facility_available);
        assert!(at(&day, 13).private_booth_available);
        assert!(at(&day, 11).whole_facility_available);
    }

    #[test]
    fn pools_count_independently() {
        let mut fs = facility(2, 1);
        reserve(&mut fs, FeePlan::DayPass, 10, 1, ReservationStatus::Confirmed);
        reserve(&mut fs, FeePlan::Subscription, 10, 1, ReservationStatus::Confirmed);
        let s = at(&resolve_day(&fs, date(), 0), 10);
        assert_eq!(s.regular_count, 2);
        assert!(!s.regular_available);
        assert!(s.private_booth_available);

        reserve(&mut fs, FeePlan::BoothRental, 10, 1, ReservationStatus::Confirmed);
        let s = at(&resolve_day(&fs, date(), 0), 10);
        assert_eq!(s.private_booth_count, 1);
        assert!(!s.private_booth_available);
    }

    #[test]
    fn cancelled_reservations_release_capacity() {
        let mut fs = facility(1, 0);
        reserve(&mut fs, FeePlan::DayPass, 10, 1, ReservationStatus::Cancelled);
        let s = at(&resolve_day(&fs, date(), 0), 10);
        assert_eq!(s.regular_count, 0);
        assert!(s.whole_facility_available);
    }

    #[test]
    fn expired_hold_not_counted() {
        let mut fs = facility(1, 0);
        hold(&mut fs, FeePlan::FacilityRental, 10, 500);
        assert!(at(&resolve_day(&fs, date(), 499), 10).whole_facility_present);
        assert!(!at(&resolve_day(&fs, date(), 500), 10).whole_facility_present);
    }

    #[test]
    fn contiguity_rejects_whole_span() {
        let mut fs = facility(5, 0);
        reserve(&mut fs, FeePlan::DayPass, 11, 1, ReservationStatus::Confirmed);
        let failed = check_span(&fs, date(), 10 * 60, 3, Channel::WholeFacility, 0).unwrap_err();
        assert_eq!(failed.start, 11 * 60);
        assert!(check_span(&fs, date(), 12 * 60, 3, Channel::WholeFacility, 0).is_ok());
        assert!(check_span(&fs, date(), 10 * 60, 3, Channel::Regular, 0).is_ok());
    }

    #[test]
    fn other_dates_do_not_interfere() {
        let mut fs = facility(1, 0);
        reserve(&mut fs, FeePlan::FacilityRental, 10, 1, ReservationStatus::Confirmed);
        let next = date().succ_opt().unwrap();
        assert!(check_span(&fs, next, 10 * 60, 1, Channel::WholeFacility, 0).is_ok());
    }
}

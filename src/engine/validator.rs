use std::collections::HashSet;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability::check_span;
use super::calendar::span_within_hours;
use super::pricing::quote;
use super::{EngineError, SlotContext};

/// A request to book one contiguous span on one facility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    /// Id for the hold (and, after payment, the reservation).
    pub id: Ulid,
    pub facility_id: Ulid,
    pub account_id: String,
    pub date: NaiveDate,
    pub start: Minute,
    pub duration_hours: u32,
    pub plan: FeePlan,
    pub head_count: u32,
    /// Dogs covered by the booking: one id per head, each checked against
    /// the prerequisite collaborator.
    pub entities: Vec<String>,
}

impl BookingRequest {
    pub fn channel(&self) -> Channel {
        self.plan.channel()
    }

    pub fn context(&self) -> SlotContext {
        SlotContext {
            facility_id: self.facility_id,
            date: self.date,
            start: self.start,
        }
    }
}

/// Request-shape checks. Run before any external call.
pub fn validate_shape(config: &FacilityConfig, req: &BookingRequest) -> Result<(), EngineError> {
    if req.account_id.is_empty() || req.account_id.len() > MAX_NAME_LEN {
        return Err(EngineError::Validation("account id missing or too long".into()));
    }
    if req.head_count == 0 || req.head_count > config.max_head_count {
        return Err(EngineError::Validation(format!(
            "head count {} outside 1..={}",
            req.head_count, config.max_head_count
        )));
    }
    if req.duration_hours == 0 {
        return Err(EngineError::Validation("duration must be at least one hour".into()));
    }
    if req.duration_hours > MAX_DURATION_HOURS {
        return Err(EngineError::LimitExceeded("duration too long"));
    }
    if req.entities.len() != req.head_count as usize {
        return Err(EngineError::Validation(format!(
            "{} entities listed for head count {}",
            req.entities.len(),
            req.head_count
        )));
    }
    let mut seen = HashSet::new();
    for entity in &req.entities {
        if entity.is_empty() || entity.len() > MAX_ENTITY_ID_LEN {
            return Err(EngineError::Validation("bad entity id".into()));
        }
        if !seen.insert(entity.as_str()) {
            return Err(EngineError::Validation(format!("entity {entity} listed twice")));
        }
    }
    Ok(())
}

/// Lead time in whole local days, then minimum notice before the start.
pub fn check_lead_time(config: &FacilityConfig, req: &BookingRequest, now: Ms) -> Result<(), EngineError> {
    let policy = config.policies.get(req.channel());
    let today = config
        .local_date(now)
        .ok_or_else(|| EngineError::Validation("current time out of range".into()))?;
    let days_ahead = (req.date - today).num_days();
    if days_ahead > MAX_BOOKING_HORIZON_DAYS {
        return Err(EngineError::LimitExceeded("booking too far ahead"));
    }
    let start_ms = config.local_to_ms(req.date, req.start);
    let notice_ok = start_ms - now >= policy.min_notice_minutes as Ms * MINUTE_MS;
    if days_ahead < policy.lead_time_days as i64 || !notice_ok {
        return Err(EngineError::LeadTimeViolation {
            context: req.context(),
            channel: req.channel(),
            lead_time_days: policy.lead_time_days,
            min_notice_minutes: policy.min_notice_minutes,
        });
    }
    Ok(())
}

/// Everything after the prerequisite checks: lead time, operating hours,
/// per-slot availability, then the price. Caller holds the facility lock.
pub fn validate(
    facility: &FacilityState,
    req: &BookingRequest,
    is_subscriber: bool,
    now: Ms,
) -> Result<PricingQuote, EngineError> {
    let config = &facility.config;
    check_lead_time(config, req, now)?;

    if !span_within_hours(config, req.start, req.duration_hours) {
        return Err(EngineError::Validation(format!(
            "{} for {}h is outside operating hours {}–{}",
            format_minute(req.start),
            req.duration_hours,
            format_minute(config.hours.open),
            format_minute(config.hours.close)
        )));
    }

    check_span(facility, req.date, req.start, req.duration_hours, req.channel(), now).map_err(
        |slot| EngineError::AvailabilityConflict {
            context: SlotContext {
                facility_id: config.id,
                date: slot.date,
                start: slot.start,
            },
            channel: req.channel(),
        },
    )?;

    quote(
        &config.rates,
        req.plan,
        req.duration_hours,
        req.head_count,
        config.max_head_count,
        is_subscriber,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2026-03-10 00:00 UTC
    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    fn now(cfg: &FacilityConfig) -> Ms {
        cfg.local_to_ms(today(), 8 * 60)
    }

    fn facility() -> FacilityState {
        let mut cfg = FacilityConfig::new(Ulid::new());
        cfg.booth_pool = 1;
        FacilityState::new(cfg)
    }

    fn request(fs: &FacilityState, plan: FeePlan, days_ahead: u64, start_hour: u32, hours: u32) -> BookingRequest {
        BookingRequest {
            id: Ulid::new(),
            facility_id: fs.id(),
            account_id: "acct-1".into(),
            date: today().checked_add_days(chrono::Days::new(days_ahead)).unwrap(),
            start: start_hour * 60,
            duration_hours: hours,
            plan,
            head_count: 1,
            entities: vec!["dog-1".into()],
        }
    }

    #[test]
    fn shape_rejects_bad_head_counts() {
        let fs = facility();
        let mut req = request(&fs, FeePlan::DayPass, 0, 10, 1);
        req.head_count = 0;
        req.entities.clear();
        assert!(matches!(validate_shape(&fs.config, &req), Err(EngineError::Validation(_))));
        req.head_count = 4;
        assert!(matches!(validate_shape(&fs.config, &req), Err(EngineError::Validation(_))));
    }

    #[test]
    fn shape_rejects_mismatched_or_duplicate_entities() {
        let fs = facility();
        let mut req = request(&fs, FeePlan::DayPass, 0, 10, 1);
        req.head_count = 2;
        assert!(validate_shape(&fs.config, &req).is_err());
        req.entities = vec!["dog-1".into(), "dog-1".into()];
        assert!(validate_shape(&fs.config, &req).is_err());
        req.entities = vec!["dog-1".into(), "dog-2".into()];
        assert!(validate_shape(&fs.config, &req).is_ok());
    }

    #[test]
    fn shape_requires_one_entity_per_head() {
        let fs = facility();
        let mut req = request(&fs, FeePlan::DayPass, 0, 10, 1);
        req.head_count = 3;
        req.entities.clear();
        assert!(matches!(validate_shape(&fs.config, &req), Err(EngineError::Validation(_))));
    }

    #[test]
    fn shape_rejects_zero_duration() {
        let fs = facility();
        let req = request(&fs, FeePlan::FacilityRental, 3, 10, 0);
        assert!(matches!(validate_shape(&fs.config, &req), Err(EngineError::Validation(_))));
    }

    #[test]
    fn whole_facility_lead_time() {
        let fs = facility();
        let now = now(&fs.config);
        for days in [0, 1] {
            let req = request(&fs, FeePlan::FacilityRental, days, 10, 1);
            assert!(matches!(
                validate(&fs, &req, false, now),
                Err(EngineError::LeadTimeViolation { .. })
            ));
        }
        let req = request(&fs, FeePlan::FacilityRental, 2, 10, 1);
        assert_eq!(validate(&fs, &req, false, now).unwrap().final_amount, 4400);
    }

    #[test]
    fn lead_time_is_configurable_per_channel() {
        let mut fs = facility();
        fs.config.policies.whole_facility.lead_time_days = 1;
        let now = now(&fs.config);
        let req = request(&fs, FeePlan::FacilityRental, 1, 10, 1);
        assert!(validate(&fs, &req, false, now).is_ok());
        // day passes have no lead time by default
        let req = request(&fs, FeePlan::DayPass, 0, 10, 1);
        assert!(validate(&fs, &req, false, now).is_ok());
    }

    #[test]
    fn booth_minimum_notice() {
        let fs = facility();
        let now = now(&fs.config); // 08:00
        let too_soon = request(&fs, FeePlan::BoothRental, 0, 8, 1);
        assert!(matches!(
            validate(&fs, &too_soon, false, now),
            Err(EngineError::LeadTimeViolation { .. })
        ));
        let ok = request(&fs, FeePlan::BoothRental, 0, 9, 1);
        assert!(validate(&fs, &ok, false, now).is_ok());
    }

    #[test]
    fn past_start_rejected() {
        let fs = facility();
        let now = now(&fs.config); // 08:00
        let req = request(&fs, FeePlan::DayPass, 0, 7, 1);
        assert!(matches!(
            validate(&fs, &req, false, now),
            Err(EngineError::LeadTimeViolation { .. })
        ));
    }

    #[test]
    fn outside_operating_hours_rejected() {
        let fs = facility();
        let now = now(&fs.config);
        let req = request(&fs, FeePlan::FacilityRental, 3, 21, 2);
        assert!(matches!(validate(&fs, &req, false, now), Err(EngineError::Validation(_))));
    }

    #[test]
    fn occupied_middle_hour_conflicts() {
        let mut fs = facility();
        let now = now(&fs.config);
        let date = today().checked_add_days(chrono::Days::new(3)).unwrap();
        let r = Reservation {
            id: Ulid::new(),
            facility_id: fs.id(),
            account_id: "other".into(),
            date,
            start: 11 * 60,
            duration_hours: 1,
            plan: FeePlan::DayPass,
            head_count: 1,
            entities: vec![],
            status: ReservationStatus::Confirmed,
            total_amount: 800,
            refund_percent: None,
            created_at: 0,
            cancelled_at: None,
        };
        let span = fs.config.booking_span(date, 11 * 60, 1);
        fs.insert_interval(Interval { span, claim: Claim::Reservation(r) });

        let req = request(&fs, FeePlan::FacilityRental, 3, 10, 3);
        match validate(&fs, &req, false, now) {
            Err(EngineError::AvailabilityConflict { context, channel }) => {
                assert_eq!(context.start, 11 * 60);
                assert_eq!(channel, Channel::WholeFacility);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }
}

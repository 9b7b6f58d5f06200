use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds. The only instant type.
pub type Ms = i64;

/// Minutes after local midnight at the facility.
pub type Minute = u32;

/// Whole currency units (yen).
pub type Amount = u64;

pub const MINUTE_MS: Ms = 60_000;
pub const HOUR_MS: Ms = 60 * MINUTE_MS;
pub const DAY_MS: Ms = 24 * HOUR_MS;
pub const MINUTES_PER_DAY: Minute = 24 * 60;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

// ── Channels and fee plans ───────────────────────────────────────

/// Booking mode. Regular and booth claims share nothing; whole-facility
/// excludes both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Regular,
    PrivateBooth,
    WholeFacility,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Regular, Channel::PrivateBooth, Channel::WholeFacility];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Regular => "regular",
            Channel::PrivateBooth => "private_booth",
            Channel::WholeFacility => "whole_facility",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "regular" => Some(Channel::Regular),
            "private_booth" => Some(Channel::PrivateBooth),
            "whole_facility" => Some(Channel::WholeFacility),
            _ => None,
        }
    }
}

/// How a booking is paid for. Each plan books exactly one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeePlan {
    /// Per-head tiered single-day ticket.
    DayPass,
    /// Monthly flat rate; free for already-active subscribers.
    Subscription,
    /// Hourly private booth.
    BoothRental,
    /// Hourly exclusive rental of the whole facility.
    FacilityRental,
}

impl FeePlan {
    pub fn channel(&self) -> Channel {
        match self {
            FeePlan::DayPass | FeePlan::Subscription => Channel::Regular,
            FeePlan::BoothRental => Channel::PrivateBooth,
            FeePlan::FacilityRental => Channel::WholeFacility,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeePlan::DayPass => "day_pass",
            FeePlan::Subscription => "subscription",
            FeePlan::BoothRental => "booth_rental",
            FeePlan::FacilityRental => "facility_rental",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "day_pass" | "single" => Some(FeePlan::DayPass),
            "subscription" => Some(FeePlan::Subscription),
            "booth_rental" => Some(FeePlan::BoothRental),
            "facility_rental" => Some(FeePlan::FacilityRental),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }

    /// Pending and confirmed reservations occupy capacity.
    pub fn is_active(&self) -> bool {
        !matches!(self, ReservationStatus::Cancelled)
    }
}

// ── Facility configuration ───────────────────────────────────────

/// Same-day operating hours, `[open, close)` in local minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingHours {
    pub open: Minute,
    pub close: Minute,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTable {
    /// Day pass price for the first head.
    pub day_pass_base: Amount,
    /// Day pass price for each additional head.
    pub day_pass_additional: Amount,
    pub monthly_fee: Amount,
    /// Whole-facility rental, per hour.
    pub hourly_rate: Amount,
    pub booth_hourly_rate: Amount,
    /// Percent off facility rental for active subscribers. 0 disables it.
    pub subscriber_discount_percent: u32,
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            day_pass_base: 800,
            day_pass_additional: 400,
            monthly_fee: 3800,
            hourly_rate: 4400,
            booth_hourly_rate: 5000,
            subscriber_discount_percent: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundTier {
    /// Minimum time left before start for this tier to apply.
    pub min_notice_ms: Ms,
    pub percent: u32,
}

/// Cancellation rule for one channel.
///
/// Cancellation is allowed while `now <= start - window_ms`. The refund is the
/// first tier (ordered by descending notice) whose notice is met, else 0.
/// With no tiers an allowed cancellation refunds in full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationPolicy {
    pub window_ms: Ms,
    pub refund_tiers: Vec<RefundTier>,
}

impl CancellationPolicy {
    /// Allow/deny only, full refund while allowed.
    pub fn window(window_ms: Ms) -> Self {
        Self {
            window_ms,
            refund_tiers: Vec::new(),
        }
    }

    /// 100% a week out, 50% three days out, nothing after that.
    pub fn tiered_rental() -> Self {
        Self {
            window_ms: 0,
            refund_tiers: vec![
                RefundTier { min_notice_ms: 7 * DAY_MS, percent: 100 },
                RefundTier { min_notice_ms: 3 * DAY_MS, percent: 50 },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPolicy {
    /// Whole days between the facility's current date and the booked date.
    pub lead_time_days: u32,
    /// Minimum minutes between now and the booked start.
    pub min_notice_minutes: u32,
    pub cancellation: CancellationPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPolicies {
    pub regular: ChannelPolicy,
    pub private_booth: ChannelPolicy,
    pub whole_facility: ChannelPolicy,
}

impl ChannelPolicies {
    pub fn get(&self, channel: Channel) -> &ChannelPolicy {
        match channel {
            Channel::Regular => &self.regular,
            Channel::PrivateBooth => &self.private_booth,
            Channel::WholeFacility => &self.whole_facility,
        }
    }

    pub fn get_mut(&mut self, channel: Channel) -> &mut ChannelPolicy {
        match channel {
            Channel::Regular => &mut self.regular,
            Channel::PrivateBooth => &mut self.private_booth,
            Channel::WholeFacility => &mut self.whole_facility,
        }
    }
}

impl Default for ChannelPolicies {
    fn default() -> Self {
        let seat = ChannelPolicy {
            lead_time_days: 0,
            min_notice_minutes: 0,
            cancellation: CancellationPolicy::window(HOUR_MS),
        };
        Self {
            regular: seat.clone(),
            private_booth: ChannelPolicy {
                min_notice_minutes: 60,
                ..seat
            },
            whole_facility: ChannelPolicy {
                lead_time_days: 2,
                min_notice_minutes: 0,
                cancellation: CancellationPolicy::tiered_rental(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityConfig {
    pub id: Ulid,
    pub name: Option<String>,
    pub hours: OperatingHours,
    /// Slot granularity in minutes.
    pub slot_minutes: u32,
    /// Concurrent regular (day-use) claims.
    pub capacity: u32,
    /// Concurrent private-booth claims. 0 = no booths.
    pub booth_pool: u32,
    pub max_head_count: u32,
    /// New reservations start `Confirmed` when set, `Pending` otherwise.
    pub auto_confirm: bool,
    /// Offset of the facility's wall clock from UTC.
    pub utc_offset_minutes: i32,
    pub rates: RateTable,
    pub policies: ChannelPolicies,
}

impl FacilityConfig {
    /// Defaults: open 06:00–22:00, hourly slots, 10 regular places, no booths.
    pub fn new(id: Ulid) -> Self {
        Self {
            id,
            name: None,
            hours: OperatingHours { open: 6 * 60, close: 22 * 60 },
            slot_minutes: 60,
            capacity: 10,
            booth_pool: 0,
            max_head_count: 3,
            auto_confirm: true,
            utc_offset_minutes: 0,
            rates: RateTable::default(),
            policies: ChannelPolicies::default(),
        }
    }

    /// Absolute instant of a local wall-clock time at this facility.
    pub fn local_to_ms(&self, date: NaiveDate, minute: Minute) -> Ms {
        let midnight = date.and_time(NaiveTime::MIN).and_utc().timestamp_millis();
        midnight + minute as Ms * MINUTE_MS - self.utc_offset_minutes as Ms * MINUTE_MS
    }

    /// Local calendar date at this facility for an absolute instant.
    pub fn local_date(&self, now: Ms) -> Option<NaiveDate> {
        DateTime::from_timestamp_millis(now + self.utc_offset_minutes as Ms * MINUTE_MS)
            .map(|dt| dt.date_naive())
    }

    /// The absolute span of a local `[date start, +hours)` booking.
    pub fn booking_span(&self, date: NaiveDate, start: Minute, duration_hours: u32) -> Span {
        let start_ms = self.local_to_ms(date, start);
        Span::new(start_ms, start_ms + duration_hours.max(1) as Ms * HOUR_MS)
    }

    /// The absolute span of one local calendar day.
    pub fn day_span(&self, date: NaiveDate) -> Span {
        let start = self.local_to_ms(date, 0);
        Span::new(start, start + DAY_MS)
    }
}

// ── Pricing ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingQuote {
    pub channel: Channel,
    pub plan: FeePlan,
    pub base_amount: Amount,
    pub discount_amount: Option<Amount>,
    pub final_amount: Amount,
}

// ── Claims: holds and reservations ───────────────────────────────

/// Tentative, expiring claim placed before payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hold {
    pub id: Ulid,
    pub facility_id: Ulid,
    pub account_id: String,
    pub date: NaiveDate,
    pub start: Minute,
    pub duration_hours: u32,
    pub plan: FeePlan,
    pub head_count: u32,
    pub entities: Vec<String>,
    pub quote: PricingQuote,
    pub expires_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub facility_id: Ulid,
    pub account_id: String,
    pub date: NaiveDate,
    pub start: Minute,
    pub duration_hours: u32,
    pub plan: FeePlan,
    pub head_count: u32,
    pub entities: Vec<String>,
    pub status: ReservationStatus,
    pub total_amount: Amount,
    pub refund_percent: Option<u32>,
    pub created_at: Ms,
    pub cancelled_at: Option<Ms>,
}

impl Reservation {
    pub fn channel(&self) -> Channel {
        self.plan.channel()
    }

    /// Convert a paid hold into a reservation.
    pub fn from_hold(id: Ulid, hold: &Hold, status: ReservationStatus, created_at: Ms) -> Self {
        Self {
            id,
            facility_id: hold.facility_id,
            account_id: hold.account_id.clone(),
            date: hold.date,
            start: hold.start,
            duration_hours: hold.duration_hours,
            plan: hold.plan,
            head_count: hold.head_count,
            entities: hold.entities.clone(),
            status,
            total_amount: hold.quote.final_amount,
            refund_percent: None,
            created_at,
            cancelled_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Claim {
    Hold(Hold),
    Reservation(Reservation),
}

/// A claim on a facility, keyed by its absolute span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub span: Span,
    pub claim: Claim,
}

impl Interval {
    pub fn id(&self) -> Ulid {
        match &self.claim {
            Claim::Hold(h) => h.id,
            Claim::Reservation(r) => r.id,
        }
    }

    pub fn channel(&self) -> Channel {
        match &self.claim {
            Claim::Hold(h) => h.plan.channel(),
            Claim::Reservation(r) => r.plan.channel(),
        }
    }

    /// Unexpired holds and non-cancelled reservations occupy capacity.
    pub fn is_active(&self, now: Ms) -> bool {
        match &self.claim {
            Claim::Hold(h) => h.expires_at > now,
            Claim::Reservation(r) => r.status.is_active(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FacilityState {
    pub config: FacilityConfig,
    /// All holds and reservations, sorted by `span.start`.
    pub intervals: Vec<Interval>,
}

impl FacilityState {
    pub fn new(config: FacilityConfig) -> Self {
        Self {
            config,
            intervals: Vec::new(),
        }
    }

    pub fn id(&self) -> Ulid {
        self.config.id
    }

    /// Insert interval maintaining sort order by span.start.
    pub fn insert_interval(&mut self, interval: Interval) {
        let pos = self
            .intervals
            .binary_search_by_key(&interval.span.start, |i| i.span.start)
            .unwrap_or_else(|e| e);
        self.intervals.insert(pos, interval);
    }

    /// Remove interval by id.
    pub fn remove_interval(&mut self, id: Ulid) -> Option<Interval> {
        let pos = self.intervals.iter().position(|i| i.id() == id)?;
        Some(self.intervals.remove(pos))
    }

    pub fn find(&self, id: Ulid) -> Option<&Interval> {
        self.intervals.iter().find(|i| i.id() == id)
    }

    pub fn find_mut(&mut self, id: Ulid) -> Option<&mut Interval> {
        self.intervals.iter_mut().find(|i| i.id() == id)
    }

    /// Return only intervals whose span overlaps the query window.
    /// Uses binary search to skip intervals starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Interval> {
        // Everything at index >= right_bound starts at or after query.end → can't overlap.
        let right_bound = self
            .intervals
            .partition_point(|i| i.span.start < query.end);
        self.intervals[..right_bound]
            .iter()
            .filter(move |i| i.span.end > query.start)
    }

    /// Claims still holding capacity at or after `now`. Past and cancelled
    /// reservations stay in `intervals` for the record but are not counted.
    pub fn live_claims(&self, now: Ms) -> usize {
        self.intervals
            .iter()
            .filter(|i| i.is_active(now) && i.span.end > now)
            .count()
    }

    pub fn holds(&self) -> impl Iterator<Item = &Hold> {
        self.intervals.iter().filter_map(|i| match &i.claim {
            Claim::Hold(h) => Some(h),
            Claim::Reservation(_) => None,
        })
    }

    pub fn reservations(&self) -> impl Iterator<Item = &Reservation> {
        self.intervals.iter().filter_map(|i| match &i.claim {
            Claim::Reservation(r) => Some(r),
            Claim::Hold(_) => None,
        })
    }
}

/// The event types. Flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    FacilityCreated {
        config: FacilityConfig,
    },
    FacilityUpdated {
        config: FacilityConfig,
    },
    FacilityDeleted {
        id: Ulid,
    },
    HoldPlaced {
        hold: Hold,
    },
    HoldReleased {
        id: Ulid,
        facility_id: Ulid,
    },
    /// A hold converted into a reservation (or a reservation replayed by compaction).
    ReservationCreated {
        reservation: Reservation,
        hold_id: Option<Ulid>,
    },
    ReservationConfirmed {
        id: Ulid,
        facility_id: Ulid,
    },
    ReservationCancelled {
        id: Ulid,
        facility_id: Ulid,
        refund_percent: u32,
        cancelled_at: Ms,
    },
}

impl Event {
    /// Event type name, used as the notification kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::FacilityCreated { .. } => "facility_created",
            Event::FacilityUpdated { .. } => "facility_updated",
            Event::FacilityDeleted { .. } => "facility_deleted",
            Event::HoldPlaced { .. } => "hold_placed",
            Event::HoldReleased { .. } => "hold_released",
            Event::ReservationCreated { .. } => "reservation_created",
            Event::ReservationConfirmed { .. } => "reservation_confirmed",
            Event::ReservationCancelled { .. } => "reservation_cancelled",
        }
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    pub facility_id: Ulid,
    pub date: NaiveDate,
    pub start: Minute,
    pub end: Minute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotAvailability {
    pub slot: TimeSlot,
    pub regular_count: u32,
    pub private_booth_count: u32,
    pub whole_facility_present: bool,
    pub regular_available: bool,
    pub private_booth_available: bool,
    pub whole_facility_available: bool,
}

impl SlotAvailability {
    pub fn is_open(&self, channel: Channel) -> bool {
        match channel {
            Channel::Regular => self.regular_available,
            Channel::PrivateBooth => self.private_booth_available,
            Channel::WholeFacility => self.whole_facility_available,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancellationDecision {
    pub allowed: bool,
    pub refund_percent: u32,
}

// ── Wall-clock helpers ───────────────────────────────────────────

/// `HH:MM` for a minute of the day.
pub fn format_minute(m: Minute) -> String {
    format!("{:02}:{:02}", m / 60, m % 60)
}

/// Parse `HH:MM` (or `HH`, or `HH:MM:00`) into a minute of the day. `24:00`
/// is accepted as end of day.
pub fn parse_minute(s: &str) -> Option<Minute> {
    let mut parts = s.trim().split(':');
    let h: Minute = parts.next()?.parse().ok()?;
    let m: Minute = match parts.next() {
        Some(m) => m.parse().ok()?,
        None => 0,
    };
    if let Some(sec) = parts.next()
        && sec.parse::<u32>().ok()? != 0
    {
        return None;
    }
    if parts.next().is_some() || h > 24 || m >= 60 {
        return None;
    }
    let total = h * 60 + m;
    (total <= MINUTES_PER_DAY).then_some(total)
}

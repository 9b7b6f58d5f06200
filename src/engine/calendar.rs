use chrono::NaiveDate;

use crate::model::*;

/// Bookable `(start, end)` units from `open` toward `close`.
///
/// A trailing partial unit is dropped. `close <= open` or a zero unit means
/// the facility is closed all day: empty, not an error.
pub fn unit_bounds(hours: OperatingHours, unit_minutes: u32) -> Vec<(Minute, Minute)> {
    if unit_minutes == 0 || hours.close <= hours.open {
        return Vec::new();
    }
    let close = hours.close.min(MINUTES_PER_DAY);
    let mut out = Vec::new();
    let mut cur = hours.open;
    while cur + unit_minutes <= close {
        out.push((cur, cur + unit_minutes));
        cur += unit_minutes;
    }
    out
}

/// The facility's slots for one date.
pub fn slots_for(config: &FacilityConfig, date: NaiveDate) -> Vec<TimeSlot> {
    unit_bounds(config.hours, config.slot_minutes)
        .into_iter()
        .map(|(start, end)| TimeSlot {
            facility_id: config.id,
            date,
            start,
            end,
        })
        .collect()
}

/// Does `[start, start + hours)` lie inside operating hours and begin on a slot boundary?
pub fn span_within_hours(config: &FacilityConfig, start: Minute, duration_hours: u32) -> bool {
    let hours = config.hours;
    if duration_hours == 0 || config.slot_minutes == 0 {
        return false;
    }
    let end = start + duration_hours * 60;
    start >= hours.open
        && end <= hours.close.min(MINUTES_PER_DAY)
        && (start - hours.open) % config.slot_minutes == 0
}

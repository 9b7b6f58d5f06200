use crate::model::{Amount, Ms};

// ── Per-tenant limits ────────────────────────────────────────────

pub const MAX_TENANTS: usize = 1024;
pub const MAX_TENANT_NAME_LEN: usize = 64;
pub const MAX_FACILITIES_PER_TENANT: usize = 10_000;

// ── Per-facility limits ──────────────────────────────────────────

/// Unexpired holds + upcoming reservations. Past and cancelled ones don't count.
pub const MAX_LIVE_CLAIMS_PER_FACILITY: usize = 100_000;
pub const MAX_NAME_LEN: usize = 256;
pub const MAX_CAPACITY: u32 = 10_000;
pub const MAX_HEAD_COUNT: u32 = 50;
pub const MAX_REFUND_TIERS: usize = 8;
/// Ceiling for any single rate, in minor units.
pub const MAX_RATE: Amount = 100_000_000;

// ── Request limits ───────────────────────────────────────────────

/// Longest single booking (a full day).
pub const MAX_DURATION_HOURS: u32 = 24;
/// How far ahead a booking may be placed.
pub const MAX_BOOKING_HORIZON_DAYS: i64 = 366;
pub const MAX_HOLD_TTL_MS: Ms = 24 * 60 * 60 * 1000;
pub const MAX_ENTITY_ID_LEN: usize = 128;

// ── Occupancy ────────────────────────────────────────────────────

/// Rolling history kept per facility.
pub const OCCUPANCY_HISTORY_LEN: usize = 20;
/// Buffered push updates before senders start waiting.
pub const OCCUPANCY_CHANNEL_CAPACITY: usize = 1024;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::{format_minute, Channel, Minute};

/// Where a rejected request was aimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotContext {
    pub facility_id: Ulid,
    pub date: NaiveDate,
    pub start: Minute,
}

impl std::fmt::Display for SlotContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "facility {} on {} at {}",
            self.facility_id,
            self.date,
            format_minute(self.start)
        )
    }
}

#[derive(Debug)]
pub enum EngineError {
    /// Malformed request; rejected before any external call or write.
    Validation(String),
    PrerequisiteNotMet {
        entity: String,
        context: SlotContext,
    },
    LeadTimeViolation {
        context: SlotContext,
        channel: Channel,
        lead_time_days: u32,
        min_notice_minutes: u32,
    },
    /// Slot taken or race lost. Re-fetch availability and retry.
    AvailabilityConflict {
        context: SlotContext,
        channel: Channel,
    },
    PaymentFailure(String),
    CancellationWindowExpired(Ulid),
    ExternalTimeout(&'static str),
    /// A collaborator answered with an error instead of a result.
    ExternalFailure {
        what: &'static str,
        message: String,
    },
    NotFound(Ulid),
    AlreadyExists(Ulid),
    InvalidState(String),
    LimitExceeded(&'static str),
    WalError(String),
}

impl EngineError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::PrerequisiteNotMet { .. } => "prerequisite_not_met",
            EngineError::LeadTimeViolation { .. } => "lead_time",
            EngineError::AvailabilityConflict { .. } => "availability_conflict",
            EngineError::PaymentFailure(_) => "payment_failure",
            EngineError::CancellationWindowExpired(_) => "cancellation_window_expired",
            EngineError::ExternalTimeout(_) => "external_timeout",
            EngineError::ExternalFailure { .. } => "external_failure",
            EngineError::NotFound(_) => "not_found",
            EngineError::AlreadyExists(_) => "already_exists",
            EngineError::InvalidState(_) => "invalid_state",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::WalError(_) => "wal_error",
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "invalid request: {msg}"),
            EngineError::PrerequisiteNotMet { entity, context } => {
                write!(f, "prerequisite not met for {entity} ({context})")
            }
            EngineError::LeadTimeViolation {
                context,
                channel,
                lead_time_days,
                min_notice_minutes,
            } => write!(
                f,
                "{} bookings need {lead_time_days} day(s) and {min_notice_minutes} minute(s) notice ({context})",
                channel.as_str()
            ),
            EngineError::AvailabilityConflict { context, channel } => write!(
                f,
                "{} not available ({context}); re-fetch availability and retry",
                channel.as_str()
            ),
            EngineError::PaymentFailure(msg) => write!(f, "payment failed: {msg}"),
            EngineError::CancellationWindowExpired(id) => {
                write!(f, "cancellation window expired for reservation {id}")
            }
            EngineError::ExternalTimeout(what) => write!(f, "timed out waiting for {what}"),
            EngineError::ExternalFailure { what, message } => write!(f, "{what} failed: {message}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

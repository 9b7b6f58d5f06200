use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::{DashMap, DashSet};
use tracing::info;
use ulid::Ulid;

use crate::model::{Amount, FeePlan, Minute, Ms};

/// Failure talking to an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollabError {
    /// The collaborator could not be reached or errored internally.
    Unavailable(String),
    /// The collaborator answered, but refused the request.
    Rejected(String),
}

impl std::fmt::Display for CollabError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollabError::Unavailable(msg) => write!(f, "collaborator unavailable: {msg}"),
            CollabError::Rejected(msg) => write!(f, "collaborator rejected request: {msg}"),
        }
    }
}

impl std::error::Error for CollabError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberStatus {
    pub active: bool,
    /// End of the paid period. `None` means open-ended.
    pub expires_at: Option<Ms>,
}

impl SubscriberStatus {
    pub const INACTIVE: SubscriberStatus = SubscriberStatus {
        active: false,
        expires_at: None,
    };

    /// A subscription that has reached its expiry is no longer active.
    pub fn is_active_at(&self, now: Ms) -> bool {
        self.active && self.expires_at.is_none_or(|exp| now < exp)
    }
}

/// What the payment provider is told about a charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentMetadata {
    pub hold_id: Ulid,
    pub facility_id: Ulid,
    pub account_id: String,
    pub plan: FeePlan,
    pub date: NaiveDate,
    pub start: Minute,
    pub duration_hours: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Authorized { reference: String },
    Declined { reason: String },
}

// ── Traits ───────────────────────────────────────────────────────

/// Is an entity (a dog) cleared to use the facility, e.g. vaccination approved?
#[async_trait]
pub trait PrerequisiteCheck: Send + Sync {
    async fn is_approved(&self, entity_id: &str) -> Result<bool, CollabError>;
}

#[async_trait]
pub trait SubscriberDirectory: Send + Sync {
    async fn status(&self, account_id: &str) -> Result<SubscriberStatus, CollabError>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn authorize(&self, amount: Amount, meta: &PaymentMetadata) -> Result<PaymentOutcome, CollabError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, account_id: &str, message: &str) -> Result<(), CollabError>;
}

/// The engine's view of the outside world.
#[derive(Clone)]
pub struct Collaborators {
    pub prerequisites: Arc<dyn PrerequisiteCheck>,
    pub subscribers: Arc<dyn SubscriberDirectory>,
    pub payments: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
}

impl Collaborators {
    /// In-memory registries, auto-approved payments and log-only notifications.
    pub fn in_memory(approvals: Arc<ApprovalRegistry>, subscribers: Arc<SubscriberRegistry>) -> Self {
        Self {
            prerequisites: approvals,
            subscribers,
            payments: Arc::new(AutoApprovePayments),
            notifier: Arc::new(LogNotifier),
        }
    }
}

// ── In-memory implementations ────────────────────────────────────

/// Entities cleared to book.
#[derive(Default)]
pub struct ApprovalRegistry {
    approved: DashSet<String>,
}

impl ApprovalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn approve(&self, entity_id: impl Into<String>) {
        self.approved.insert(entity_id.into());
    }

    /// Returns true if the entity was approved before.
    pub fn revoke(&self, entity_id: &str) -> bool {
        self.approved.remove(entity_id).is_some()
    }
}

#[async_trait]
impl PrerequisiteCheck for ApprovalRegistry {
    async fn is_approved(&self, entity_id: &str) -> Result<bool, CollabError> {
        Ok(self.approved.contains(entity_id))
    }
}

#[derive(Default)]
pub struct SubscriberRegistry {
    accounts: DashMap<String, SubscriberStatus>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, account_id: impl Into<String>, status: SubscriberStatus) {
        self.accounts.insert(account_id.into(), status);
    }
}

#[async_trait]
impl SubscriberDirectory for SubscriberRegistry {
    async fn status(&self, account_id: &str) -> Result<SubscriberStatus, CollabError> {
        Ok(self
            .accounts
            .get(account_id)
            .map(|s| *s.value())
            .unwrap_or(SubscriberStatus::INACTIVE))
    }
}

/// Authorizes every charge. For clients that settle payment elsewhere.
pub struct AutoApprovePayments;

#[async_trait]
impl PaymentGateway for AutoApprovePayments {
    async fn authorize(&self, amount: Amount, meta: &PaymentMetadata) -> Result<PaymentOutcome, CollabError> {
        info!("auto-authorized {amount} for hold {}", meta.hold_id);
        Ok(PaymentOutcome::Authorized {
            reference: format!("auto-{}", meta.hold_id),
        })
    }
}

/// Writes notifications to the log instead of delivering them.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, account_id: &str, message: &str) -> Result<(), CollabError> {
        info!(account = account_id, "notification: {message}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn approvals_can_be_revoked() {
        let reg = ApprovalRegistry::new();
        assert!(!reg.is_approved("dog-1").await.unwrap());
        reg.approve("dog-1");
        assert!(reg.is_approved("dog-1").await.unwrap());
        assert!(reg.revoke("dog-1"));
        assert!(!reg.revoke("dog-1"));
        assert!(!reg.is_approved("dog-1").await.unwrap());
    }

    #[tokio::test]
    async fn unknown_subscriber_is_inactive() {
        let reg = SubscriberRegistry::new();
        assert_eq!(reg.status("nobody").await.unwrap(), SubscriberStatus::INACTIVE);
    }

    #[test]
    fn subscription_expires() {
        let status = SubscriberStatus {
            active: true,
            expires_at: Some(1_000),
        };
        assert!(status.is_active_at(999));
        assert!(!status.is_active_at(1_000));
        let open_ended = SubscriberStatus {
            active: true,
            expires_at: None,
        };
        assert!(open_ended.is_active_at(i64::MAX));
        assert!(!SubscriberStatus::INACTIVE.is_active_at(0));
    }
}

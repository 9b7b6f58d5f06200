use crate::limits::MAX_REFUND_TIERS;
use crate::model::*;

use super::EngineError;

/// Decide whether a reservation starting at `start` may be cancelled at `now`,
/// and what share of the amount is refunded.
pub fn evaluate(policy: &CancellationPolicy, start: Ms, now: Ms) -> CancellationDecision {
    let notice = start - now;
    if notice < policy.window_ms {
        return CancellationDecision {
            allowed: false,
            refund_percent: 0,
        };
    }
    if policy.refund_tiers.is_empty() {
        return CancellationDecision {
            allowed: true,
            refund_percent: 100,
        };
    }
    let refund_percent = policy
        .refund_tiers
        .iter()
        .filter(|t| notice >= t.min_notice_ms)
        .max_by_key(|t| t.min_notice_ms)
        .map_or(0, |t| t.percent);
    CancellationDecision {
        allowed: true,
        refund_percent,
    }
}

pub fn validate_policy(policy: &CancellationPolicy) -> Result<(), EngineError> {
    if policy.window_ms < 0 {
        return Err(EngineError::Validation("cancellation window must not be negative".into()));
    }
    if policy.refund_tiers.len() > MAX_REFUND_TIERS {
        return Err(EngineError::LimitExceeded("too many refund tiers"));
    }
    for tier in &policy.refund_tiers {
        if tier.percent > 100 || tier.min_notice_ms < 0 {
            return Err(EngineError::Validation(format!(
                "bad refund tier: {}% at {}ms notice",
                tier.percent, tier.min_notice_ms
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: Ms = 1_000 * DAY_MS;

    #[test]
    fn rental_refund_tiers() {
        let policy = CancellationPolicy::tiered_rental();
        let d = |days: Ms| evaluate(&policy, START, START - days * DAY_MS);
        assert_eq!(d(8), CancellationDecision { allowed: true, refund_percent: 100 });
        assert_eq!(d(7), CancellationDecision { allowed: true, refund_percent: 100 });
        assert_eq!(d(4), CancellationDecision { allowed: true, refund_percent: 50 });
        assert_eq!(d(3), CancellationDecision { allowed: true, refund_percent: 50 });
        // still cancellable, nothing back
        assert_eq!(d(1), CancellationDecision { allowed: true, refund_percent: 0 });
    }

    #[test]
    fn rental_not_cancellable_after_start() {
        let policy = CancellationPolicy::tiered_rental();
        assert!(evaluate(&policy, START, START).allowed);
        assert!(!evaluate(&policy, START, START + MINUTE_MS).allowed);
    }

    #[test]
    fn seat_window_is_binary() {
        let policy = CancellationPolicy::window(HOUR_MS);
        let early = evaluate(&policy, START, START - 90 * MINUTE_MS);
        assert_eq!(early, CancellationDecision { allowed: true, refund_percent: 100 });
        let late = evaluate(&policy, START, START - 30 * MINUTE_MS);
        assert_eq!(late, CancellationDecision { allowed: false, refund_percent: 0 });
        // exactly at the window edge is still allowed
        assert!(evaluate(&policy, START, START - HOUR_MS).allowed);
    }

    #[test]
    fn tier_order_does_not_matter() {
        let policy = CancellationPolicy {
            window_ms: 0,
            refund_tiers: vec![
                RefundTier { min_notice_ms: 3 * DAY_MS, percent: 50 },
                RefundTier { min_notice_ms: 7 * DAY_MS, percent: 100 },
            ],
        };
        assert_eq!(evaluate(&policy, START, START - 10 * DAY_MS).refund_percent, 100);
    }

    #[test]
    fn policy_validation() {
        assert!(validate_policy(&CancellationPolicy::tiered_rental()).is_ok());
        assert!(validate_policy(&CancellationPolicy::window(-1)).is_err());
        let bad = CancellationPolicy {
            window_ms: 0,
            refund_tiers: vec![RefundTier { min_notice_ms: 0, percent: 120 }],
        };
        assert!(validate_policy(&bad).is_err());
    }
}

use crate::model::*;

use super::EngineError;

/// Price a booking. Pure: the same inputs always give the same quote.
///
/// - day pass: first head at base, each further head at the additional rate
/// - subscription: the monthly fee, or nothing for an active subscriber
/// - facility rental: hourly, with the subscriber discount rounded to the unit
/// - booth rental: hourly, no discount
pub fn quote(
    rates: &RateTable,
    plan: FeePlan,
    duration_hours: u32,
    head_count: u32,
    max_head_count: u32,
    is_subscriber: bool,
) -> Result<PricingQuote, EngineError> {
    if head_count == 0 || head_count > max_head_count {
        return Err(EngineError::Validation(format!(
            "head count {head_count} outside 1..={max_head_count}"
        )));
    }
    let hours = duration_hours as Amount;
    if matches!(plan, FeePlan::BoothRental | FeePlan::FacilityRental) && hours == 0 {
        return Err(EngineError::Validation("duration must be at least one hour".into()));
    }

    let (base_amount, discount_amount) = match plan {
        FeePlan::DayPass => {
            let extra = (head_count - 1) as Amount;
            let total = extra
                .checked_mul(rates.day_pass_additional)
                .and_then(|a| a.checked_add(rates.day_pass_base))
                .ok_or_else(overflow)?;
            (total, None)
        }
        FeePlan::Subscription => {
            if is_subscriber {
                (0, None)
            } else {
                (rates.monthly_fee, None)
            }
        }
        FeePlan::BoothRental => {
            let total = rates.booth_hourly_rate.checked_mul(hours).ok_or_else(overflow)?;
            (total, None)
        }
        FeePlan::FacilityRental => {
            let total = rates.hourly_rate.checked_mul(hours).ok_or_else(overflow)?;
            let pct = rates.subscriber_discount_percent.min(100) as Amount;
            if is_subscriber && pct > 0 {
                let discounted = total
                    .checked_mul(100 - pct)
                    .and_then(|a| a.checked_add(50))
                    .ok_or_else(overflow)?
                    / 100;
                (total, Some(total - discounted))
            } else {
                (total, None)
            }
        }
    };

    Ok(PricingQuote {
        channel: plan.channel(),
        plan,
        base_amount,
        discount_amount,
        final_amount: base_amount - discount_amount.unwrap_or(0),
    })
}

fn overflow() -> EngineError {
    EngineError::Validation("price out of range".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(plan: FeePlan, hours: u32, heads: u32, subscriber: bool) -> Amount {
        quote(&RateTable::default(), plan, hours, heads, 3, subscriber)
            .unwrap()
            .final_amount
    }

    #[test]
    fn day_pass_tiers_by_head() {
        assert_eq!(price(FeePlan::DayPass, 1, 1, false), 800);
        assert_eq!(price(FeePlan::DayPass, 1, 2, false), 1200);
        assert_eq!(price(FeePlan::DayPass, 1, 3, false), 1600);
        // subscription status never discounts a day pass
        assert_eq!(price(FeePlan::DayPass, 1, 3, true), 1600);
    }

    #[test]
    fn day_pass_head_bounds() {
        let rates = RateTable::default();
        assert!(matches!(
            quote(&rates, FeePlan::DayPass, 1, 0, 3, false),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            quote(&rates, FeePlan::DayPass, 1, 4, 3, false),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn subscription_free_when_active() {
        assert_eq!(price(FeePlan::Subscription, 1, 1, false), 3800);
        assert_eq!(price(FeePlan::Subscription, 1, 1, true), 0);
        // extra dogs under the plan cap cost nothing
        assert_eq!(price(FeePlan::Subscription, 1, 3, true), 0);
    }

    #[test]
    fn facility_rental_hourly_with_discount() {
        assert_eq!(price(FeePlan::FacilityRental, 2, 1, false), 8800);
        let q = quote(&RateTable::default(), FeePlan::FacilityRental, 3, 1, 3, true).unwrap();
        assert_eq!(q.base_amount, 13200);
        assert_eq!(q.discount_amount, Some(2640));
        assert_eq!(q.final_amount, 10560);
        assert_eq!(q.channel, Channel::WholeFacility);
    }

    #[test]
    fn discount_rounds_to_nearest_unit() {
        let rates = RateTable {
            hourly_rate: 1003,
            subscriber_discount_percent: 15,
            ..RateTable::default()
        };
        // 1003 * 0.85 = 852.55
        let q = quote(&rates, FeePlan::FacilityRental, 1, 1, 3, true).unwrap();
        assert_eq!(q.final_amount, 853);
    }

    #[test]
    fn zero_discount_percent_disables_discount() {
        let rates = RateTable {
            subscriber_discount_percent: 0,
            ..RateTable::default()
        };
        let q = quote(&rates, FeePlan::FacilityRental, 2, 1, 3, true).unwrap();
        assert_eq!(q.discount_amount, None);
        assert_eq!(q.final_amount, 8800);
    }

    #[test]
    fn booth_rental_hourly() {
        assert_eq!(price(FeePlan::BoothRental, 1, 2, false), 5000);
        assert_eq!(price(FeePlan::BoothRental, 2, 2, true), 10000);
    }

    #[test]
    fn huge_rates_are_rejected_not_wrapped() {
        let rates = RateTable {
            day_pass_additional: Amount::MAX,
            hourly_rate: Amount::MAX,
            booth_hourly_rate: Amount::MAX,
            ..RateTable::default()
        };
        for (plan, hours, heads) in [
            (FeePlan::DayPass, 1, 3),
            (FeePlan::FacilityRental, 3, 1),
            (FeePlan::BoothRental, 2, 1),
        ] {
            assert!(
                matches!(quote(&rates, plan, hours, heads, 3, true), Err(EngineError::Validation(_))),
                "{plan:?}"
            );
        }
    }

    #[test]
    fn quote_is_idempotent() {
        let rates = RateTable::default();
        let a = quote(&rates, FeePlan::FacilityRental, 3, 2, 3, true).unwrap();
        let b = quote(&rates, FeePlan::FacilityRental, 3, 2, 3, true).unwrap();
        assert_eq!(a, b);
    }
}

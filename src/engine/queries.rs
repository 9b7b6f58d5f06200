use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::MAX_BOOKING_HORIZON_DAYS;
use crate::model::*;

use super::availability::resolve_day;
use super::cancellation::evaluate;
use super::pricing;
use super::{Engine, EngineError};

impl Engine {
    /// Per-slot channel availability for one local date.
    pub async fn get_availability(
        &self,
        facility_id: Ulid,
        date: NaiveDate,
        now: Ms,
    ) -> Result<Vec<SlotAvailability>, EngineError> {
        let fs = self
            .get_facility(&facility_id)
            .ok_or(EngineError::NotFound(facility_id))?;
        let guard = fs.read().await;
        if let Some(today) = guard.config.local_date(now)
            && (date - today).num_days().abs() > MAX_BOOKING_HORIZON_DAYS
        {
            return Err(EngineError::LimitExceeded("date too far from today"));
        }
        Ok(resolve_day(&guard, date, now))
    }

    /// Price a request without placing anything.
    pub async fn quote(
        &self,
        facility_id: Ulid,
        plan: FeePlan,
        duration_hours: u32,
        head_count: u32,
        is_subscriber: bool,
    ) -> Result<PricingQuote, EngineError> {
        let fs = self
            .get_facility(&facility_id)
            .ok_or(EngineError::NotFound(facility_id))?;
        let guard = fs.read().await;
        pricing::quote(
            &guard.config.rates,
            plan,
            duration_hours,
            head_count,
            guard.config.max_head_count,
            is_subscriber,
        )
    }

    /// Like `quote`, with subscriber status looked up for the account.
    pub async fn quote_for_account(
        &self,
        facility_id: Ulid,
        plan: FeePlan,
        duration_hours: u32,
        head_count: u32,
        account_id: &str,
        now: Ms,
    ) -> Result<PricingQuote, EngineError> {
        let is_subscriber = self.subscriber_active(account_id, now).await?;
        self.quote(facility_id, plan, duration_hours, head_count, is_subscriber)
            .await
    }

    /// What cancelling now would do, without cancelling.
    pub async fn cancellation_preview(&self, id: Ulid, now: Ms) -> Result<CancellationDecision, EngineError> {
        let facility_id = self
            .get_facility_for_entity(&id)
            .ok_or(EngineError::NotFound(id))?;
        let fs = self
            .get_facility(&facility_id)
            .ok_or(EngineError::NotFound(facility_id))?;
        let guard = fs.read().await;
        let reservation = match guard.find(id).map(|i| &i.claim) {
            Some(Claim::Reservation(r)) => r,
            _ => return Err(EngineError::NotFound(id)),
        };
        if !reservation.status.is_active() {
            return Err(EngineError::InvalidState(format!("reservation {id} already cancelled")));
        }
        let policy = &guard.config.policies.get(reservation.channel()).cancellation;
        let start = guard.config.local_to_ms(reservation.date, reservation.start);
        Ok(evaluate(policy, start, now))
    }

    pub async fn list_facilities(&self) -> Vec<FacilityConfig> {
        let facilities: Vec<_> = self.state.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::with_capacity(facilities.len());
        for fs in facilities {
            out.push(fs.read().await.config.clone());
        }
        out.sort_by_key(|c| c.id);
        out
    }

    pub async fn get_facility_config(&self, id: Ulid) -> Result<FacilityConfig, EngineError> {
        let fs = self.get_facility(&id).ok_or(EngineError::NotFound(id))?;
        let guard = fs.read().await;
        Ok(guard.config.clone())
    }

    /// All reservations of a facility, cancelled ones included, in start order.
    pub async fn get_reservations(&self, facility_id: Ulid) -> Result<Vec<Reservation>, EngineError> {
        let fs = match self.get_facility(&facility_id) {
            Some(fs) => fs,
            None => return Ok(vec![]),
        };
        let guard = fs.read().await;
        Ok(guard.reservations().cloned().collect())
    }

    pub async fn get_reservation(&self, id: Ulid) -> Result<Reservation, EngineError> {
        let facility_id = self
            .get_facility_for_entity(&id)
            .ok_or(EngineError::NotFound(id))?;
        let fs = self
            .get_facility(&facility_id)
            .ok_or(EngineError::NotFound(facility_id))?;
        let guard = fs.read().await;
        match guard.find(id).map(|i| &i.claim) {
            Some(Claim::Reservation(r)) => Ok(r.clone()),
            _ => Err(EngineError::NotFound(id)),
        }
    }

    /// Holds of a facility, expired-but-unreaped ones included.
    pub async fn get_holds(&self, facility_id: Ulid) -> Result<Vec<Hold>, EngineError> {
        let fs = match self.get_facility(&facility_id) {
            Some(fs) => fs,
            None => return Ok(vec![]),
        };
        let guard = fs.read().await;
        Ok(guard.holds().cloned().collect())
    }
}

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{oneshot, RwLock};
use tracing::{info, warn};
use ulid::Ulid;

use crate::collab::{CollabError, PaymentMetadata, PaymentOutcome};
use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::cancellation::{evaluate, validate_policy};
use super::validator::{validate, validate_shape, BookingRequest};
use super::{Engine, EngineError, WalCommand};

fn validate_config(config: &FacilityConfig) -> Result<(), EngineError> {
    if let Some(ref n) = config.name
        && n.len() > MAX_NAME_LEN
    {
        return Err(EngineError::LimitExceeded("facility name too long"));
    }
    if config.hours.open >= config.hours.close || config.hours.close > MINUTES_PER_DAY {
        return Err(EngineError::Validation(format!(
            "operating hours {}–{} must be a same-day range",
            format_minute(config.hours.open),
            format_minute(config.hours.close)
        )));
    }
    if config.slot_minutes == 0 || config.slot_minutes > MINUTES_PER_DAY {
        return Err(EngineError::Validation("slot unit must be 1..=1440 minutes".into()));
    }
    if config.capacity > MAX_CAPACITY || config.booth_pool > MAX_CAPACITY {
        return Err(EngineError::LimitExceeded("capacity too large"));
    }
    if config.max_head_count == 0 || config.max_head_count > MAX_HEAD_COUNT {
        return Err(EngineError::Validation(format!(
            "max head count must be 1..={MAX_HEAD_COUNT}"
        )));
    }
    if config.utc_offset_minutes.abs() > 14 * 60 {
        return Err(EngineError::Validation("UTC offset out of range".into()));
    }
    let rates = &config.rates;
    for (name, rate) in [
        ("day_pass_base", rates.day_pass_base),
        ("day_pass_additional", rates.day_pass_additional),
        ("monthly_fee", rates.monthly_fee),
        ("hourly_rate", rates.hourly_rate),
        ("booth_hourly_rate", rates.booth_hourly_rate),
    ] {
        if rate > MAX_RATE {
            return Err(EngineError::Validation(format!("{name} above {MAX_RATE}")));
        }
    }
    if config.rates.subscriber_discount_percent > 100 {
        return Err(EngineError::Validation("discount above 100%".into()));
    }
    for channel in Channel::ALL {
        let policy = config.policies.get(channel);
        if policy.lead_time_days as i64 > MAX_BOOKING_HORIZON_DAYS {
            return Err(EngineError::LimitExceeded("lead time beyond booking horizon"));
        }
        validate_policy(&policy.cancellation)?;
    }
    Ok(())
}

impl Engine {
    // ── Facilities ───────────────────────────────────────────

    pub async fn create_facility(&self, config: FacilityConfig) -> Result<(), EngineError> {
        validate_config(&config)?;
        let _creating = self.create_lock.lock().await;
        if self.state.len() >= MAX_FACILITIES_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many facilities"));
        }
        let id = config.id;
        if self.state.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let event = Event::FacilityCreated { config: config.clone() };
        self.wal_append(&event).await?;
        self.state.insert(id, Arc::new(RwLock::new(FacilityState::new(config))));
        info!("facility {id} created");
        Ok(())
    }

    pub async fn update_facility(&self, config: FacilityConfig) -> Result<(), EngineError> {
        self.patch_facility(config.id, |current| *current = config).await?;
        Ok(())
    }

    /// Read-modify-write of a facility's config under its write lock.
    pub async fn patch_facility(
        &self,
        id: Ulid,
        patch: impl FnOnce(&mut FacilityConfig),
    ) -> Result<FacilityConfig, EngineError> {
        let fs = self.get_facility(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = fs.write().await;
        let mut config = guard.config.clone();
        patch(&mut config);
        config.id = id;
        validate_config(&config)?;
        let event = Event::FacilityUpdated { config: config.clone() };
        self.persist_and_apply(id, &mut guard, &event).await?;
        Ok(config)
    }

    /// Refused while the facility still has live holds or upcoming reservations.
    pub async fn delete_facility(&self, id: Ulid, now: Ms) -> Result<(), EngineError> {
        let fs = self.get_facility(&id).ok_or(EngineError::NotFound(id))?;
        let guard = fs.write().await;
        if guard.live_claims(now) > 0 {
            return Err(EngineError::InvalidState(format!(
                "facility {id} has upcoming bookings"
            )));
        }

        let event = Event::FacilityDeleted { id };
        self.wal_append(&event).await?;
        for interval in &guard.intervals {
            self.entity_to_facility.remove(&interval.id());
        }
        drop(guard);
        self.state.remove(&id);
        info!("facility {id} deleted");
        Ok(())
    }

    // ── Holds ────────────────────────────────────────────────

    /// Validate a booking request and place a tentative hold on its slots.
    ///
    /// Shape checks, prerequisite checks and the subscriber lookup run before
    /// the facility lock; lead time, hours, availability and pricing are then
    /// re-checked under the write lock together with the WAL append.
    pub async fn place_hold(&self, req: BookingRequest, now: Ms) -> Result<Hold, EngineError> {
        let result = self.try_place_hold(req, now).await;
        match &result {
            Ok(hold) => {
                metrics::counter!(observability::HOLDS_PLACED_TOTAL, "channel" => hold.plan.channel().as_str())
                    .increment(1);
            }
            Err(e) => observability::record_rejection(e),
        }
        result
    }

    async fn try_place_hold(&self, req: BookingRequest, now: Ms) -> Result<Hold, EngineError> {
        let fs = self
            .get_facility(&req.facility_id)
            .ok_or(EngineError::NotFound(req.facility_id))?;
        let config = fs.read().await.config.clone();
        validate_shape(&config, &req)?;
        if self.entity_to_facility.contains_key(&req.id) {
            return Err(EngineError::AlreadyExists(req.id));
        }

        for entity in &req.entities {
            let approved = match self
                .external("prerequisite check", self.collab.prerequisites.is_approved(entity))
                .await?
            {
                Ok(approved) => approved,
                Err(e) => {
                    warn!("prerequisite check for {entity} failed: {e}");
                    false
                }
            };
            if !approved {
                return Err(EngineError::PrerequisiteNotMet {
                    entity: entity.clone(),
                    context: req.context(),
                });
            }
        }

        let is_subscriber = match req.plan {
            FeePlan::Subscription | FeePlan::FacilityRental => {
                self.subscriber_active(&req.account_id, now).await?
            }
            FeePlan::DayPass | FeePlan::BoothRental => false,
        };

        let mut guard = fs.write().await;
        if guard.live_claims(now) >= MAX_LIVE_CLAIMS_PER_FACILITY {
            return Err(EngineError::LimitExceeded("too many bookings on facility"));
        }
        validate_shape(&guard.config, &req)?;
        // a concurrent request with the same id may have won the lock first
        if self.entity_to_facility.contains_key(&req.id) {
            return Err(EngineError::AlreadyExists(req.id));
        }
        let quote = validate(&guard, &req, is_subscriber, now)?;

        let hold = Hold {
            id: req.id,
            facility_id: req.facility_id,
            account_id: req.account_id,
            date: req.date,
            start: req.start,
            duration_hours: req.duration_hours,
            plan: req.plan,
            head_count: req.head_count,
            entities: req.entities,
            quote,
            expires_at: now + self.config.hold_ttl_ms.min(MAX_HOLD_TTL_MS),
        };
        let event = Event::HoldPlaced { hold: hold.clone() };
        self.persist_and_apply(hold.facility_id, &mut guard, &event).await?;
        Ok(hold)
    }

    /// Convert a hold into a reservation once payment has cleared.
    pub async fn confirm_hold(&self, hold_id: Ulid, now: Ms) -> Result<Reservation, EngineError> {
        let (facility_id, mut guard) = self.resolve_entity_write(&hold_id).await?;
        let hold = match guard.find(hold_id).map(|i| &i.claim) {
            Some(Claim::Hold(h)) => h.clone(),
            Some(Claim::Reservation(_)) => {
                return Err(EngineError::InvalidState(format!("{hold_id} is already a reservation")));
            }
            None => return Err(EngineError::NotFound(hold_id)),
        };
        if hold.expires_at <= now {
            // expired holds no longer count, so the slot may already be resold
            let event = Event::HoldReleased { id: hold_id, facility_id };
            self.persist_and_apply(facility_id, &mut guard, &event).await?;
            return Err(EngineError::InvalidState(format!("hold {hold_id} expired")));
        }

        let status = if guard.config.auto_confirm {
            ReservationStatus::Confirmed
        } else {
            ReservationStatus::Pending
        };
        let reservation = Reservation::from_hold(hold_id, &hold, status, now);
        let event = Event::ReservationCreated {
            reservation: reservation.clone(),
            hold_id: Some(hold_id),
        };
        self.persist_and_apply(facility_id, &mut guard, &event).await?;
        drop(guard);

        metrics::counter!(observability::RESERVATIONS_CREATED_TOTAL, "channel" => reservation.channel().as_str())
            .increment(1);
        let state = match status {
            ReservationStatus::Pending => "is awaiting approval",
            _ => "is confirmed",
        };
        self.notify_account(
            &reservation.account_id,
            format!(
                "reservation {} on {} at {} {state}",
                reservation.id,
                reservation.date,
                format_minute(reservation.start)
            ),
        );
        Ok(reservation)
    }

    pub async fn release_hold(&self, id: Ulid) -> Result<Ulid, EngineError> {
        let (facility_id, mut guard) = self.resolve_entity_write(&id).await?;
        match guard.find(id).map(|i| &i.claim) {
            Some(Claim::Hold(_)) => {}
            Some(Claim::Reservation(_)) => {
                return Err(EngineError::InvalidState(format!("{id} is a reservation, not a hold")));
            }
            None => return Err(EngineError::NotFound(id)),
        }
        let event = Event::HoldReleased { id, facility_id };
        self.persist_and_apply(facility_id, &mut guard, &event).await?;
        Ok(facility_id)
    }

    // ── Reservations ─────────────────────────────────────────

    /// The whole booking flow: validate, hold, authorize payment, commit.
    /// Any payment failure or timeout releases the hold.
    pub async fn create_reservation(&self, req: BookingRequest, now: Ms) -> Result<Reservation, EngineError> {
        let started = tokio::time::Instant::now();
        let hold = self.place_hold(req, now).await?;
        if hold.quote.final_amount > 0 {
            let meta = PaymentMetadata {
                hold_id: hold.id,
                facility_id: hold.facility_id,
                account_id: hold.account_id.clone(),
                plan: hold.plan,
                date: hold.date,
                start: hold.start,
                duration_hours: hold.duration_hours,
            };
            let outcome = self
                .external("payment", self.collab.payments.authorize(hold.quote.final_amount, &meta))
                .await;
            let failure = match outcome {
                Ok(Ok(PaymentOutcome::Authorized { reference })) => {
                    info!("payment {reference} authorized for hold {}", hold.id);
                    None
                }
                Ok(Ok(PaymentOutcome::Declined { reason })) => Some(EngineError::PaymentFailure(reason)),
                Ok(Err(e)) => Some(EngineError::PaymentFailure(e.to_string())),
                Err(e) => Some(e),
            };
            if let Some(err) = failure {
                if let Err(e) = self.release_hold(hold.id).await {
                    warn!("release of hold {} after payment failure: {e}", hold.id);
                }
                observability::record_rejection(&err);
                return Err(err);
            }
        }
        // The hold may have lapsed while payment ran, and its slot may be
        // someone else's by now. Confirm against the clock as it reads now.
        let confirm_at = now + started.elapsed().as_millis() as Ms;
        let result = self.confirm_hold(hold.id, confirm_at).await;
        if let Err(e) = &result {
            if hold.quote.final_amount > 0 {
                warn!("hold {} not confirmed after payment was authorized: {e}", hold.id);
            }
            observability::record_rejection(e);
        }
        result
    }

    /// Pending → confirmed, by the facility owner.
    pub async fn approve_reservation(&self, id: Ulid) -> Result<Reservation, EngineError> {
        let (facility_id, mut guard) = self.resolve_entity_write(&id).await?;
        let status = match guard.find(id).map(|i| &i.claim) {
            Some(Claim::Reservation(r)) => r.status,
            Some(Claim::Hold(_)) => {
                return Err(EngineError::InvalidState(format!("{id} is a hold, not a reservation")));
            }
            None => return Err(EngineError::NotFound(id)),
        };
        if status != ReservationStatus::Pending {
            return Err(EngineError::InvalidState(format!(
                "reservation {id} is {}, not pending",
                status.as_str()
            )));
        }
        let event = Event::ReservationConfirmed { id, facility_id };
        self.persist_and_apply(facility_id, &mut guard, &event).await?;
        let reservation = reservation_in(&guard, id)?;
        drop(guard);
        self.notify_account(&reservation.account_id, format!("reservation {id} was approved"));
        Ok(reservation)
    }

    /// Cancel under the channel's cancellation policy.
    pub async fn cancel_reservation(&self, id: Ulid, now: Ms) -> Result<CancellationDecision, EngineError> {
        let (facility_id, mut guard) = self.resolve_entity_write(&id).await?;
        let reservation = live_reservation(&guard, id)?;
        let policy = &guard.config.policies.get(reservation.channel()).cancellation;
        let start = guard.config.local_to_ms(reservation.date, reservation.start);
        let decision = evaluate(policy, start, now);
        if !decision.allowed {
            observability::record_rejection(&EngineError::CancellationWindowExpired(id));
            return Err(EngineError::CancellationWindowExpired(id));
        }
        self.commit_cancellation(facility_id, &mut guard, &reservation, decision.refund_percent, now, "policy")
            .await?;
        Ok(decision)
    }

    /// Owner-side cancellation with an explicit refund, outside any window.
    pub async fn admin_cancel(
        &self,
        id: Ulid,
        refund_percent: u32,
        now: Ms,
    ) -> Result<CancellationDecision, EngineError> {
        if refund_percent > 100 {
            return Err(EngineError::Validation(format!("refund {refund_percent}% above 100%")));
        }
        let (facility_id, mut guard) = self.resolve_entity_write(&id).await?;
        let reservation = live_reservation(&guard, id)?;
        self.commit_cancellation(facility_id, &mut guard, &reservation, refund_percent, now, "admin")
            .await?;
        Ok(CancellationDecision {
            allowed: true,
            refund_percent,
        })
    }

    async fn commit_cancellation(
        &self,
        facility_id: Ulid,
        fs: &mut FacilityState,
        reservation: &Reservation,
        refund_percent: u32,
        now: Ms,
        kind: &'static str,
    ) -> Result<(), EngineError> {
        let event = Event::ReservationCancelled {
            id: reservation.id,
            facility_id,
            refund_percent,
            cancelled_at: now,
        };
        self.persist_and_apply(facility_id, fs, &event).await?;
        metrics::counter!(observability::CANCELLATIONS_TOTAL, "kind" => kind).increment(1);
        self.notify_account(
            &reservation.account_id,
            format!(
                "reservation {} on {} at {} was cancelled ({refund_percent}% refund)",
                reservation.id,
                reservation.date,
                format_minute(reservation.start)
            ),
        );
        Ok(())
    }

    // ── Housekeeping ─────────────────────────────────────────

    /// `(hold_id, facility_id)` for every hold expired at `now`.
    pub fn collect_expired_holds(&self, now: Ms) -> Vec<(Ulid, Ulid)> {
        let mut expired = Vec::new();
        for entry in self.state.iter() {
            let fs = entry.value().clone();
            if let Ok(guard) = fs.try_read() {
                for hold in guard.holds() {
                    if hold.expires_at <= now {
                        expired.push((hold.id, guard.id()));
                    }
                }
            }
        }
        expired
    }

    /// Rewrite the WAL with only the events needed to recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let facilities: Vec<_> = self.state.iter().map(|e| e.value().clone()).collect();
        let mut events = Vec::new();
        for fs in facilities {
            let guard = fs.read().await;
            events.push(Event::FacilityCreated {
                config: guard.config.clone(),
            });
            for interval in &guard.intervals {
                events.push(match &interval.claim {
                    Claim::Hold(h) => Event::HoldPlaced { hold: h.clone() },
                    Claim::Reservation(r) => Event::ReservationCreated {
                        reservation: r.clone(),
                        hold_id: None,
                    },
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    // ── Collaborator plumbing ────────────────────────────────

    /// Run a collaborator call under the external-call budget.
    pub(super) async fn external<T>(
        &self,
        what: &'static str,
        fut: impl Future<Output = Result<T, CollabError>>,
    ) -> Result<Result<T, CollabError>, EngineError> {
        tokio::time::timeout(self.config.external_timeout, fut)
            .await
            .map_err(|_| EngineError::ExternalTimeout(what))
    }

    pub(super) async fn subscriber_active(&self, account_id: &str, now: Ms) -> Result<bool, EngineError> {
        match self
            .external("subscriber directory", self.collab.subscribers.status(account_id))
            .await?
        {
            Ok(status) => Ok(status.is_active_at(now)),
            Err(e) => Err(EngineError::ExternalFailure {
                what: "subscriber directory",
                message: e.to_string(),
            }),
        }
    }

    /// Fire-and-forget. Failures are logged, never returned.
    fn notify_account(&self, account_id: &str, message: String) {
        let notifier = self.collab.notifier.clone();
        let budget = self.config.external_timeout;
        let account_id = account_id.to_string();
        tokio::spawn(async move {
            match tokio::time::timeout(budget, notifier.notify(&account_id, &message)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("notification to {account_id} failed: {e}"),
                Err(_) => warn!("notification to {account_id} timed out"),
            }
        });
    }
}

fn reservation_in(fs: &FacilityState, id: Ulid) -> Result<Reservation, EngineError> {
    match fs.find(id).map(|i| &i.claim) {
        Some(Claim::Reservation(r)) => Ok(r.clone()),
        Some(Claim::Hold(_)) => Err(EngineError::InvalidState(format!("{id} is a hold, not a reservation"))),
        None => Err(EngineError::NotFound(id)),
    }
}

fn live_reservation(fs: &FacilityState, id: Ulid) -> Result<Reservation, EngineError> {
    let reservation = reservation_in(fs, id)?;
    if !reservation.status.is_active() {
        return Err(EngineError::InvalidState(format!("reservation {id} already cancelled")));
    }
    Ok(reservation)
}

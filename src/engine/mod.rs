pub mod availability;
pub mod calendar;
pub mod cancellation;
mod error;
mod mutations;
pub mod pricing;
mod queries;
pub mod validator;

pub use error::{EngineError, SlotContext};
pub use validator::BookingRequest;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use ulid::Ulid;

use crate::collab::Collaborators;
use crate::model::*;
use crate::wal::Wal;

pub type SharedFacilityState = Arc<RwLock<FacilityState>>;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as Ms)
}

/// Runtime knobs for one engine.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// How long a hold blocks its slots while payment is pending.
    pub hold_ttl_ms: Ms,
    /// Budget for each call to an external collaborator.
    pub external_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hold_ttl_ms: 10 * MINUTE_MS,
            external_timeout: Duration::from_secs(5),
        }
    }
}

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }
                commit_batch(&mut wal, &mut batch);
                if let Some(cmd) = deferred {
                    handle_non_append(&mut wal, cmd);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even after an append error so buffered bytes don't leak into the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events).and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => {
            let mut batch = vec![(event, response)];
            commit_batch(wal, &mut batch);
        }
    }
}

pub struct Engine {
    pub state: DashMap<Ulid, SharedFacilityState>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    /// Reverse lookup: hold/reservation id → facility id
    pub(super) entity_to_facility: DashMap<Ulid, Ulid>,
    /// Serializes facility creation: existence check, WAL append, insert.
    pub(super) create_lock: Mutex<()>,
    pub collab: Collaborators,
    pub config: EngineConfig,
}

/// Apply an event directly to a FacilityState (no locking, caller holds the lock).
fn apply_to_facility(fs: &mut FacilityState, event: &Event, entity_map: &DashMap<Ulid, Ulid>) {
    match event {
        Event::HoldPlaced { hold } => {
            let span = fs.config.booking_span(hold.date, hold.start, hold.duration_hours);
            entity_map.insert(hold.id, hold.facility_id);
            fs.insert_interval(Interval {
                span,
                claim: Claim::Hold(hold.clone()),
            });
        }
        Event::HoldReleased { id, .. } => {
            fs.remove_interval(*id);
            entity_map.remove(id);
        }
        Event::ReservationCreated { reservation, hold_id } => {
            if let Some(hold_id) = hold_id {
                fs.remove_interval(*hold_id);
                entity_map.remove(hold_id);
            }
            let span = fs
                .config
                .booking_span(reservation.date, reservation.start, reservation.duration_hours);
            entity_map.insert(reservation.id, reservation.facility_id);
            fs.insert_interval(Interval {
                span,
                claim: Claim::Reservation(reservation.clone()),
            });
        }
        Event::ReservationConfirmed { id, .. } => {
            if let Some(Interval {
                claim: Claim::Reservation(r),
                ..
            }) = fs.find_mut(*id)
            {
                r.status = ReservationStatus::Confirmed;
            }
        }
        Event::ReservationCancelled {
            id,
            refund_percent,
            cancelled_at,
            ..
        } => {
            if let Some(Interval {
                claim: Claim::Reservation(r),
                ..
            }) = fs.find_mut(*id)
            {
                r.status = ReservationStatus::Cancelled;
                r.refund_percent = Some(*refund_percent);
                r.cancelled_at = Some(*cancelled_at);
            }
        }
        Event::FacilityUpdated { config } => {
            fs.config = config.clone();
            // A new UTC offset moves every absolute span.
            for interval in &mut fs.intervals {
                interval.span = match &interval.claim {
                    Claim::Hold(h) => config.booking_span(h.date, h.start, h.duration_hours),
                    Claim::Reservation(r) => config.booking_span(r.date, r.start, r.duration_hours),
                };
            }
            fs.intervals.sort_by_key(|i| i.span.start);
        }
        // FacilityCreated/Deleted are handled at the DashMap level, not here
        Event::FacilityCreated { .. } | Event::FacilityDeleted { .. } => {}
    }
}

impl Engine {
    pub fn new(
        wal_path: PathBuf,
        collab: Collaborators,
        config: EngineConfig,
    ) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            state: DashMap::new(),
            wal_tx,
            entity_to_facility: DashMap::new(),
            create_lock: Mutex::new(()),
            collab,
            config,
        };

        // Replay: we're the sole owner of these Arcs, so try_write always succeeds.
        // Never use blocking_write here, this may run inside an async context.
        for event in &events {
            match event {
                Event::FacilityCreated { config } => {
                    let fs = FacilityState::new(config.clone());
                    engine.state.insert(config.id, Arc::new(RwLock::new(fs)));
                }
                Event::FacilityDeleted { id } => engine.forget_facility(*id),
                other => {
                    if let Some(facility_id) = event_facility_id(other)
                        && let Some(entry) = engine.state.get(&facility_id)
                    {
                        let fs_arc = entry.clone();
                        let mut guard = fs_arc.try_write().expect("replay: uncontended write");
                        apply_to_facility(&mut guard, other, &engine.entity_to_facility);
                    }
                }
            }
        }

        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_facility(&self, id: &Ulid) -> Option<SharedFacilityState> {
        self.state.get(id).map(|e| e.value().clone())
    }

    pub fn get_facility_for_entity(&self, entity_id: &Ulid) -> Option<Ulid> {
        self.entity_to_facility.get(entity_id).map(|e| *e.value())
    }

    /// WAL-append + apply in one call.
    pub(super) async fn persist_and_apply(
        &self,
        facility_id: Ulid,
        fs: &mut FacilityState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_facility(fs, event, &self.entity_to_facility);
        tracing::debug!("{} committed on facility {facility_id}", event.kind());
        Ok(())
    }

    /// Lookup hold/reservation → facility, acquire its write lock.
    pub(super) async fn resolve_entity_write(
        &self,
        entity_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<FacilityState>), EngineError> {
        let facility_id = self
            .get_facility_for_entity(entity_id)
            .ok_or(EngineError::NotFound(*entity_id))?;
        let fs = self
            .get_facility(&facility_id)
            .ok_or(EngineError::NotFound(facility_id))?;
        let guard = fs.write_owned().await;
        Ok((facility_id, guard))
    }

    /// Drop a facility and the reverse-lookup entries of its claims.
    fn forget_facility(&self, id: Ulid) {
        if let Some((_, fs)) = self.state.remove(&id)
            && let Ok(guard) = fs.try_read()
        {
            for interval in &guard.intervals {
                self.entity_to_facility.remove(&interval.id());
            }
        }
    }
}

/// Extract the facility id from an event (for non-Create/Delete events).
fn event_facility_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::HoldPlaced { hold } => Some(hold.facility_id),
        Event::ReservationCreated { reservation, .. } => Some(reservation.facility_id),
        Event::HoldReleased { facility_id, .. }
        | Event::ReservationConfirmed { facility_id, .. }
        | Event::ReservationCancelled { facility_id, .. } => Some(*facility_id),
        Event::FacilityUpdated { config } => Some(config.id),
        Event::FacilityCreated { .. } | Event::FacilityDeleted { .. } => None,
    }
}

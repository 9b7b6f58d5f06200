use std::net::SocketAddr;

use crate::engine::EngineError;
use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "parkslot_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "parkslot_query_duration_seconds";

// ── Booking flow ────────────────────────────────────────────────

/// Counter: holds placed. Labels: channel.
pub const HOLDS_PLACED_TOTAL: &str = "parkslot_holds_placed_total";

/// Counter: holds converted into reservations. Labels: channel.
pub const RESERVATIONS_CREATED_TOTAL: &str = "parkslot_reservations_created_total";

/// Counter: rejected booking/cancellation attempts. Labels: reason.
pub const BOOKING_REJECTIONS_TOTAL: &str = "parkslot_booking_rejections_total";

/// Counter: cancellations. Labels: kind (policy, admin).
pub const CANCELLATIONS_TOTAL: &str = "parkslot_cancellations_total";

/// Counter: expired holds released by the reaper.
pub const HOLDS_REAPED_TOTAL: &str = "parkslot_holds_reaped_total";

/// Counter: occupancy samples recorded.
pub const OCCUPANCY_SAMPLES_TOTAL: &str = "parkslot_occupancy_samples_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "parkslot_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "parkslot_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "parkslot_connections_rejected_total";

/// Gauge: number of active tenants (loaded engines).
pub const TENANTS_ACTIVE: &str = "parkslot_tenants_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "parkslot_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "parkslot_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

pub fn record_rejection(err: &EngineError) {
    metrics::counter!(BOOKING_REJECTIONS_TOTAL, "reason" => err.reason()).increment(1);
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::UpsertFacility { .. } => "upsert_facility",
        Command::DeleteFacility { .. } => "delete_facility",
        Command::SelectFacilities => "select_facilities",
        Command::SelectAvailability { .. } => "select_availability",
        Command::SelectQuote { .. } => "select_quote",
        Command::InsertHold(_) => "insert_hold",
        Command::DeleteHold { .. } => "delete_hold",
        Command::SelectHolds { .. } => "select_holds",
        Command::ConfirmHold { .. } => "confirm_hold",
        Command::InsertReservation(_) => "insert_reservation",
        Command::ApproveReservation { .. } => "approve_reservation",
        Command::CancelReservation { .. } => "cancel_reservation",
        Command::SelectReservations { .. } => "select_reservations",
        Command::SelectCancellation { .. } => "select_cancellation",
        Command::InsertOccupancy { .. } => "insert_occupancy",
        Command::SelectOccupancy { .. } => "select_occupancy",
        Command::InsertApproval { .. } => "insert_approval",
        Command::DeleteApproval { .. } => "delete_approval",
        Command::InsertSubscriber { .. } => "insert_subscriber",
    }
}

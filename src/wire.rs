use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;

use crate::auth::ParkslotAuthSource;
use crate::collab::SubscriberStatus;
use crate::engine::{now_ms, BookingRequest, EngineError};
use crate::model::*;
use crate::observability;
use crate::occupancy::OccupancySample;
use crate::sql::{self, BookingRow, Command, Subscriber};
use crate::tenant::{Tenant, TenantManager};

pub struct ParkslotHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<ParkslotQueryParser>,
}

impl ParkslotHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(ParkslotQueryParser),
        }
    }

    fn resolve_tenant<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Tenant>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.tenant_manager
            .get_or_create(&db)
            .map_err(|e| user_error("08006", format!("tenant error: {e}")))
    }

    /// Run one command and record its latency and outcome.
    async fn execute(&self, tenant: &Tenant, cmd: Command) -> PgWireResult<Vec<Response>> {
        let label = observability::command_label(&cmd);
        let started = Instant::now();
        let result = self.execute_command(tenant, cmd).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn execute_command(&self, tenant: &Tenant, cmd: Command) -> PgWireResult<Vec<Response>> {
        let engine = &tenant.engine;
        let now = now_ms();
        match cmd {
            Command::UpsertFacility { id, patch } => {
                match engine.patch_facility(id, |c| patch.apply(c)).await {
                    Ok(_) => {}
                    Err(EngineError::NotFound(_)) => {
                        let mut config = FacilityConfig::new(id);
                        patch.apply(&mut config);
                        match engine.create_facility(config).await {
                            // another connection created it first; patch theirs
                            Err(EngineError::AlreadyExists(_)) => {
                                engine
                                    .patch_facility(id, |c| patch.apply(c))
                                    .await
                                    .map_err(engine_err)?;
                            }
                            other => other.map_err(engine_err)?,
                        }
                    }
                    Err(e) => return Err(engine_err(e)),
                }
                Ok(vec![executed("INSERT", 1)])
            }
            Command::DeleteFacility { id } => {
                engine.delete_facility(id, now).await.map_err(engine_err)?;
                tenant.occupancy.forget(id);
                Ok(vec![executed("DELETE", 1)])
            }
            Command::SelectFacilities => {
                let facilities = engine.list_facilities().await;
                Ok(vec![rows(facilities_schema(), facilities, encode_facility)])
            }
            Command::SelectAvailability { facility_id, date } => {
                let slots = engine
                    .get_availability(facility_id, date, now)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![rows(availability_schema(), slots, encode_slot)])
            }
            Command::SelectQuote {
                facility_id,
                plan,
                duration_hours,
                head_count,
                subscriber,
            } => {
                let quote = match subscriber {
                    Subscriber::Flag(is_subscriber) => {
                        engine
                            .quote(facility_id, plan, duration_hours, head_count, is_subscriber)
                            .await
                    }
                    Subscriber::Account(account_id) => {
                        engine
                            .quote_for_account(facility_id, plan, duration_hours, head_count, &account_id, now)
                            .await
                    }
                }
                .map_err(engine_err)?;
                Ok(vec![rows(quote_schema(), [quote], encode_quote)])
            }
            Command::InsertHold(row) => {
                engine
                    .place_hold(booking_request(row), now)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![executed("INSERT", 1)])
            }
            Command::DeleteHold { id } => {
                engine.release_hold(id).await.map_err(engine_err)?;
                Ok(vec![executed("DELETE", 1)])
            }
            Command::SelectHolds { facility_id } => {
                let holds = engine.get_holds(facility_id).await.map_err(engine_err)?;
                Ok(vec![rows(holds_schema(), holds, encode_hold)])
            }
            Command::ConfirmHold { hold_id } => {
                engine.confirm_hold(hold_id, now).await.map_err(engine_err)?;
                Ok(vec![executed("INSERT", 1)])
            }
            Command::InsertReservation(row) => {
                engine
                    .create_reservation(booking_request(row), now)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![executed("INSERT", 1)])
            }
            Command::ApproveReservation { id } => {
                engine.approve_reservation(id).await.map_err(engine_err)?;
                Ok(vec![executed("INSERT", 1)])
            }
            Command::CancelReservation { id, refund_percent } => {
                match refund_percent {
                    Some(pct) => engine.admin_cancel(id, pct, now).await,
                    None => engine.cancel_reservation(id, now).await,
                }
                .map_err(engine_err)?;
                Ok(vec![executed("DELETE", 1)])
            }
            Command::SelectReservations { facility_id } => {
                let reservations = engine
                    .get_reservations(facility_id)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![rows(reservations_schema(), reservations, encode_reservation)])
            }
            Command::SelectCancellation { id } => {
                let decision = engine
                    .cancellation_preview(id, now)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![rows(cancellation_schema(), [(id, decision)], encode_cancellation)])
            }
            Command::InsertOccupancy {
                facility_id,
                headcount,
            } => {
                let config = engine
                    .get_facility_config(facility_id)
                    .await
                    .map_err(engine_err)?;
                let sample = OccupancySample {
                    facility_id,
                    at: now,
                    headcount,
                    capacity: config.capacity,
                };
                tenant
                    .occupancy_tx
                    .send(sample)
                    .await
                    .map_err(|_| user_error("P0001", "occupancy feed closed".into()))?;
                Ok(vec![executed("INSERT", 1)])
            }
            Command::SelectOccupancy { facility_id } => {
                let snapshot = tenant.occupancy.snapshot(facility_id);
                Ok(vec![rows(occupancy_schema(), snapshot, encode_occupancy)])
            }
            Command::InsertApproval { entity_id } => {
                tenant.approvals.approve(entity_id);
                Ok(vec![executed("INSERT", 1)])
            }
            Command::DeleteApproval { entity_id } => {
                let removed = tenant.approvals.revoke(&entity_id);
                Ok(vec![executed("DELETE", usize::from(removed))])
            }
            Command::InsertSubscriber {
                account_id,
                expires_at,
            } => {
                tenant.subscribers.set(
                    account_id,
                    SubscriberStatus {
                        active: true,
                        expires_at,
                    },
                );
                Ok(vec![executed("INSERT", 1)])
            }
        }
    }
}

fn booking_request(row: BookingRow) -> BookingRequest {
    BookingRequest {
        id: row.id,
        facility_id: row.facility_id,
        account_id: row.account_id,
        date: row.date,
        start: row.start,
        duration_hours: row.duration_hours,
        plan: row.plan,
        head_count: row.head_count,
        entities: row.entities,
    }
}

fn executed(tag: &str, count: usize) -> Response {
    Response::Execution(Tag::new(tag).with_rows(count))
}

// ── Result sets ──────────────────────────────────────────────────

fn rows<T>(
    schema: Vec<FieldInfo>,
    items: impl IntoIterator<Item = T>,
    encode: fn(&mut DataRowEncoder, T) -> PgWireResult<()>,
) -> Response {
    let schema = Arc::new(schema);
    let rows: Vec<PgWireResult<_>> = items
        .into_iter()
        .map(|item| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encode(&mut encoder, item)?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn text(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::VARCHAR, FieldFormat::Text)
}

fn int8(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::INT8, FieldFormat::Text)
}

fn boolean(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::BOOL, FieldFormat::Text)
}

fn facilities_schema() -> Vec<FieldInfo> {
    vec![
        text("id"),
        text("name"),
        text("open"),
        text("close"),
        int8("slot_minutes"),
        int8("capacity"),
        int8("booth_pool"),
        int8("max_head_count"),
        boolean("auto_confirm"),
        int8("utc_offset_minutes"),
        int8("day_pass_base"),
        int8("day_pass_additional"),
        int8("monthly_fee"),
        int8("hourly_rate"),
        int8("booth_hourly_rate"),
        int8("subscriber_discount_percent"),
    ]
}

fn encode_facility(e: &mut DataRowEncoder, c: FacilityConfig) -> PgWireResult<()> {
    e.encode_field(&c.id.to_string())?;
    e.encode_field(&c.name)?;
    e.encode_field(&format_minute(c.hours.open))?;
    e.encode_field(&format_minute(c.hours.close))?;
    e.encode_field(&(c.slot_minutes as i64))?;
    e.encode_field(&(c.capacity as i64))?;
    e.encode_field(&(c.booth_pool as i64))?;
    e.encode_field(&(c.max_head_count as i64))?;
    e.encode_field(&c.auto_confirm)?;
    e.encode_field(&(c.utc_offset_minutes as i64))?;
    let r = &c.rates;
    e.encode_field(&(r.day_pass_base as i64))?;
    e.encode_field(&(r.day_pass_additional as i64))?;
    e.encode_field(&(r.monthly_fee as i64))?;
    e.encode_field(&(r.hourly_rate as i64))?;
    e.encode_field(&(r.booth_hourly_rate as i64))?;
    e.encode_field(&(r.subscriber_discount_percent as i64))
}

fn availability_schema() -> Vec<FieldInfo> {
    vec![
        text("facility_id"),
        text("date"),
        text("start"),
        text("end"),
        int8("regular_count"),
        int8("private_booth_count"),
        boolean("whole_facility_present"),
        boolean("regular_available"),
        boolean("private_booth_available"),
        boolean("whole_facility_available"),
    ]
}

fn encode_slot(e: &mut DataRowEncoder, s: SlotAvailability) -> PgWireResult<()> {
    e.encode_field(&s.slot.facility_id.to_string())?;
    e.encode_field(&s.slot.date.to_string())?;
    e.encode_field(&format_minute(s.slot.start))?;
    e.encode_field(&format_minute(s.slot.end))?;
    e.encode_field(&(s.regular_count as i64))?;
    e.encode_field(&(s.private_booth_count as i64))?;
    e.encode_field(&s.whole_facility_present)?;
    e.encode_field(&s.regular_available)?;
    e.encode_field(&s.private_booth_available)?;
    e.encode_field(&s.whole_facility_available)
}

fn quote_schema() -> Vec<FieldInfo> {
    vec![
        text("channel"),
        text("plan"),
        int8("base_amount"),
        int8("discount_amount"),
        int8("final_amount"),
    ]
}

fn encode_quote(e: &mut DataRowEncoder, q: PricingQuote) -> PgWireResult<()> {
    e.encode_field(&q.channel.as_str())?;
    e.encode_field(&q.plan.as_str())?;
    e.encode_field(&(q.base_amount as i64))?;
    e.encode_field(&q.discount_amount.map(|d| d as i64))?;
    e.encode_field(&(q.final_amount as i64))
}

fn holds_schema() -> Vec<FieldInfo> {
    vec![
        text("id"),
        text("facility_id"),
        text("account_id"),
        text("date"),
        text("start"),
        int8("duration"),
        text("plan"),
        int8("head_count"),
        text("entities"),
        int8("amount"),
        int8("expires_at"),
    ]
}

fn encode_hold(e: &mut DataRowEncoder, h: Hold) -> PgWireResult<()> {
    e.encode_field(&h.id.to_string())?;
    e.encode_field(&h.facility_id.to_string())?;
    e.encode_field(&h.account_id)?;
    e.encode_field(&h.date.to_string())?;
    e.encode_field(&format_minute(h.start))?;
    e.encode_field(&(h.duration_hours as i64))?;
    e.encode_field(&h.plan.as_str())?;
    e.encode_field(&(h.head_count as i64))?;
    e.encode_field(&h.entities.join(","))?;
    e.encode_field(&(h.quote.final_amount as i64))?;
    e.encode_field(&h.expires_at)
}

fn reservations_schema() -> Vec<FieldInfo> {
    vec![
        text("id"),
        text("facility_id"),
        text("account_id"),
        text("date"),
        text("start"),
        int8("duration"),
        text("plan"),
        int8("head_count"),
        text("entities"),
        text("status"),
        int8("total_amount"),
        int8("refund_percent"),
        int8("created_at"),
        int8("cancelled_at"),
    ]
}

fn encode_reservation(e: &mut DataRowEncoder, r: Reservation) -> PgWireResult<()> {
    e.encode_field(&r.id.to_string())?;
    e.encode_field(&r.facility_id.to_string())?;
    e.encode_field(&r.account_id)?;
    e.encode_field(&r.date.to_string())?;
    e.encode_field(&format_minute(r.start))?;
    e.encode_field(&(r.duration_hours as i64))?;
    e.encode_field(&r.plan.as_str())?;
    e.encode_field(&(r.head_count as i64))?;
    e.encode_field(&r.entities.join(","))?;
    e.encode_field(&r.status.as_str())?;
    e.encode_field(&(r.total_amount as i64))?;
    e.encode_field(&r.refund_percent.map(|p| p as i64))?;
    e.encode_field(&r.created_at)?;
    e.encode_field(&r.cancelled_at)
}

fn cancellation_schema() -> Vec<FieldInfo> {
    vec![text("id"), boolean("allowed"), int8("refund_percent")]
}

fn encode_cancellation(
    e: &mut DataRowEncoder,
    (id, d): (ulid::Ulid, CancellationDecision),
) -> PgWireResult<()> {
    e.encode_field(&id.to_string())?;
    e.encode_field(&d.allowed)?;
    e.encode_field(&(d.refund_percent as i64))
}

fn occupancy_schema() -> Vec<FieldInfo> {
    vec![
        text("facility_id"),
        int8("at"),
        int8("headcount"),
        int8("capacity"),
        text("trend"),
        text("crowd_level"),
        text("history"),
    ]
}

fn encode_occupancy(
    e: &mut DataRowEncoder,
    s: crate::occupancy::OccupancySnapshot,
) -> PgWireResult<()> {
    let history: Vec<String> = s.history.iter().map(|h| h.headcount.to_string()).collect();
    e.encode_field(&s.latest.facility_id.to_string())?;
    e.encode_field(&s.latest.at)?;
    e.encode_field(&(s.latest.headcount as i64))?;
    e.encode_field(&(s.latest.capacity as i64))?;
    e.encode_field(&s.trend.as_str())?;
    e.encode_field(&s.crowd_level.as_str())?;
    e.encode_field(&history.join(","))
}

/// Result columns of a statement, judged from the table it selects from.
fn result_schema(sql: &str) -> Vec<FieldInfo> {
    let lower = sql.to_lowercase();
    if !lower.trim_start().starts_with("select") {
        return vec![];
    }
    let table = lower
        .split_once(" from ")
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .map(|t| t.trim_matches(|c| c == '"' || c == ';'))
        .unwrap_or("");
    match table {
        "facilities" => facilities_schema(),
        "availability" => availability_schema(),
        "quote" => quote_schema(),
        "holds" => holds_schema(),
        "reservations" => reservations_schema(),
        "cancellation" => cancellation_schema(),
        "occupancy" => occupancy_schema(),
        _ => vec![],
    }
}

#[async_trait]
impl SimpleQueryHandler for ParkslotHandler {
    async fn do_query<C>(
        &self,
        client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let tenant = self.resolve_tenant(client)?;
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        self.execute(&tenant, cmd).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct ParkslotQueryParser;

#[async_trait]
impl QueryParser for ParkslotQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for ParkslotHandler {
    type Statement = String;
    type QueryParser = ParkslotQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let tenant = self.resolve_tenant(client)?;
        let sql = substitute_params(portal);
        let cmd = sql::parse_sql(&sql).map_err(sql_err)?;
        let mut responses = self.execute(&tenant, cmd).await?;
        Ok(responses.remove(0))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            result_schema(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(result_schema(
            &target.statement.statement,
        )))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start
                && let Ok(n) = sql[start..i].parse::<usize>()
            {
                max = max.max(n);
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
/// Goes from the highest index down so `$1` never clobbers `$10`.
fn substitute_params(portal: &Portal<String>) -> String {
    let mut result = portal.statement.statement.to_string();
    for (i, param) in portal.parameters.iter().enumerate().rev() {
        let placeholder = format!("${}", i + 1);
        let value = match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                format!("'{}'", text.replace('\'', "''"))
            }
            None => "NULL".to_string(),
        };
        result = result.replace(&placeholder, &value);
    }
    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct ParkslotFactory {
    handler: Arc<ParkslotHandler>,
    auth_handler: Arc<
        CleartextPasswordAuthStartupHandler<ParkslotAuthSource, DefaultServerParameterProvider>,
    >,
    noop: Arc<NoopHandler>,
}

impl ParkslotFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, password: String) -> Self {
        let auth_source = ParkslotAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(ParkslotHandler::new(tenant_manager)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for ParkslotFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    tenant_manager: Arc<TenantManager>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> std::io::Result<()> {
    let factory = ParkslotFactory::new(tenant_manager, password);
    pgwire::tokio::process_socket(socket, tls, factory).await
}

// ── Errors ───────────────────────────────────────────────────────

fn user_error(code: &str, message: String) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new("ERROR".into(), code.into(), message)))
}

/// SQLSTATE for an engine rejection. Conflicts get their own code so
/// clients can tell "re-fetch and retry" apart from bad input.
fn sqlstate(e: &EngineError) -> &'static str {
    match e {
        EngineError::Validation(_)
        | EngineError::LeadTimeViolation { .. }
        | EngineError::PrerequisiteNotMet { .. }
        | EngineError::LimitExceeded(_) => "22023",
        EngineError::AvailabilityConflict { .. } => "23P01",
        EngineError::NotFound(_) => "P0002",
        EngineError::AlreadyExists(_) => "23505",
        _ => "P0001",
    }
}

fn engine_err(e: EngineError) -> PgWireError {
    user_error(sqlstate(&e), e.to_string())
}

fn sql_err(e: crate::sql::SqlError) -> PgWireError {
    user_error("42601", e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_counted_by_highest_index() {
        assert_eq!(count_params("SELECT * FROM holds"), 0);
        assert_eq!(count_params("SELECT * FROM holds WHERE facility_id = $1"), 1);
        assert_eq!(count_params("INSERT INTO t (a, b) VALUES ($2, $10)"), 10);
    }

    #[test]
    fn schema_follows_selected_table() {
        assert_eq!(
            result_schema("SELECT * FROM availability WHERE facility_id = $1").len(),
            availability_schema().len()
        );
        assert_eq!(result_schema("select * from \"quote\"").len(), 5);
        assert!(result_schema("INSERT INTO holds (id) VALUES ($1)").is_empty());
        assert!(result_schema("SELECT * FROM nowhere").is_empty());
    }

    #[test]
    fn conflicts_and_bad_input_have_distinct_codes() {
        let ctx = crate::engine::SlotContext {
            facility_id: ulid::Ulid::new(),
            date: chrono::NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            start: 600,
        };
        assert_eq!(
            sqlstate(&EngineError::AvailabilityConflict {
                context: ctx,
                channel: Channel::Regular
            }),
            "23P01"
        );
        assert_eq!(sqlstate(&EngineError::Validation("x".into())), "22023");
        assert_eq!(sqlstate(&EngineError::PaymentFailure("declined".into())), "P0001");
    }
}

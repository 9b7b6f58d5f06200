use std::collections::HashMap;

use chrono::NaiveDate;
use sqlparser::ast::{self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    /// Creates the facility, or patches it when the id already exists.
    UpsertFacility {
        id: Ulid,
        patch: FacilityPatch,
    },
    DeleteFacility {
        id: Ulid,
    },
    SelectFacilities,
    SelectAvailability {
        facility_id: Ulid,
        date: NaiveDate,
    },
    SelectQuote {
        facility_id: Ulid,
        plan: FeePlan,
        duration_hours: u32,
        head_count: u32,
        subscriber: Subscriber,
    },
    InsertHold(BookingRow),
    DeleteHold {
        id: Ulid,
    },
    SelectHolds {
        facility_id: Ulid,
    },
    /// Convert a paid hold.
    ConfirmHold {
        hold_id: Ulid,
    },
    /// Validate, hold, take payment and commit in one statement.
    InsertReservation(BookingRow),
    ApproveReservation {
        id: Ulid,
    },
    /// `refund_percent` given → administrative cancel; otherwise the policy decides.
    CancelReservation {
        id: Ulid,
        refund_percent: Option<u32>,
    },
    SelectReservations {
        facility_id: Ulid,
    },
    SelectCancellation {
        id: Ulid,
    },
    InsertOccupancy {
        facility_id: Ulid,
        headcount: u32,
    },
    SelectOccupancy {
        facility_id: Ulid,
    },
    InsertApproval {
        entity_id: String,
    },
    DeleteApproval {
        entity_id: String,
    },
    InsertSubscriber {
        account_id: String,
        expires_at: Option<Ms>,
    },
}

/// How a quote learns whether the requester subscribes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscriber {
    Flag(bool),
    Account(String),
}

/// Columns of a booking INSERT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRow {
    pub id: Ulid,
    pub facility_id: Ulid,
    pub account_id: String,
    pub date: NaiveDate,
    pub start: Minute,
    pub duration_hours: u32,
    pub plan: FeePlan,
    pub head_count: u32,
    pub entities: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyField {
    LeadDays,
    NoticeMinutes,
    CancelWindowMinutes,
}

/// Facility columns given in an INSERT; unset fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacilityPatch {
    pub name: Option<String>,
    pub open: Option<Minute>,
    pub close: Option<Minute>,
    pub slot_minutes: Option<u32>,
    pub capacity: Option<u32>,
    pub booth_pool: Option<u32>,
    pub max_head_count: Option<u32>,
    pub auto_confirm: Option<bool>,
    pub utc_offset_minutes: Option<i32>,
    pub day_pass_base: Option<Amount>,
    pub day_pass_additional: Option<Amount>,
    pub monthly_fee: Option<Amount>,
    pub hourly_rate: Option<Amount>,
    pub booth_hourly_rate: Option<Amount>,
    pub subscriber_discount_percent: Option<u32>,
    pub policies: Vec<(Channel, PolicyField, u32)>,
    pub refund_tiers: Vec<(Channel, Vec<RefundTier>)>,
}

impl FacilityPatch {
    pub fn apply(&self, config: &mut FacilityConfig) {
        if let Some(ref name) = self.name {
            config.name = Some(name.clone());
        }
        if let Some(open) = self.open {
            config.hours.open = open;
        }
        if let Some(close) = self.close {
            config.hours.close = close;
        }
        set(&mut config.slot_minutes, self.slot_minutes);
        set(&mut config.capacity, self.capacity);
        set(&mut config.booth_pool, self.booth_pool);
        set(&mut config.max_head_count, self.max_head_count);
        set(&mut config.auto_confirm, self.auto_confirm);
        set(&mut config.utc_offset_minutes, self.utc_offset_minutes);
        let rates = &mut config.rates;
        set(&mut rates.day_pass_base, self.day_pass_base);
        set(&mut rates.day_pass_additional, self.day_pass_additional);
        set(&mut rates.monthly_fee, self.monthly_fee);
        set(&mut rates.hourly_rate, self.hourly_rate);
        set(&mut rates.booth_hourly_rate, self.booth_hourly_rate);
        set(&mut rates.subscriber_discount_percent, self.subscriber_discount_percent);
        for &(channel, field, value) in &self.policies {
            let policy = config.policies.get_mut(channel);
            match field {
                PolicyField::LeadDays => policy.lead_time_days = value,
                PolicyField::NoticeMinutes => policy.min_notice_minutes = value,
                PolicyField::CancelWindowMinutes => {
                    policy.cancellation.window_ms = value as Ms * MINUTE_MS;
                }
            }
        }
        for (channel, tiers) in &self.refund_tiers {
            config.policies.get_mut(*channel).cancellation.refund_tiers = tiers.clone();
        }
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let row = named_values(insert, &table)?;

    match table.as_str() {
        "facilities" => {
            let id = row.ulid("id")?;
            let mut patch = FacilityPatch::default();
            for (col, expr) in &row.0 {
                parse_facility_column(&mut patch, col, expr)?;
            }
            Ok(Command::UpsertFacility { id, patch })
        }
        "holds" => Ok(Command::InsertHold(booking_row(&row)?)),
        "reservations" => {
            if row.has("hold_id") {
                Ok(Command::ConfirmHold {
                    hold_id: row.ulid("hold_id")?,
                })
            } else {
                Ok(Command::InsertReservation(booking_row(&row)?))
            }
        }
        "reservation_approvals" => Ok(Command::ApproveReservation { id: row.ulid("id")? }),
        "occupancy" => Ok(Command::InsertOccupancy {
            facility_id: row.ulid("facility_id")?,
            headcount: row.u32("headcount")?,
        }),
        "approvals" => Ok(Command::InsertApproval {
            entity_id: row.string("entity_id")?,
        }),
        "subscribers" => Ok(Command::InsertSubscriber {
            account_id: row.string("account_id")?,
            expires_at: row.opt("expires_at").map(parse_i64_or_null).transpose()?.flatten(),
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn booking_row(row: &Row) -> Result<BookingRow, SqlError> {
    // every booked head is a dog that has to pass the prerequisite check
    let entities: Vec<String> = row
        .string("entities")?
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let head_count = match row.opt("head_count") {
        Some(expr) => parse_u32(expr)?,
        None => entities.len() as u32,
    };
    Ok(BookingRow {
        id: row.ulid("id")?,
        facility_id: row.ulid("facility_id")?,
        account_id: row.string("account_id")?,
        date: parse_date(row.get("date")?)?,
        start: parse_minute_expr(row.get("start")?)?,
        duration_hours: row.opt("duration").map(parse_u32).transpose()?.unwrap_or(1),
        plan: parse_plan(row.get("plan")?)?,
        head_count,
        entities,
    })
}

fn parse_facility_column(patch: &mut FacilityPatch, col: &str, expr: &Expr) -> Result<(), SqlError> {
    match col {
        "id" => {}
        "name" => patch.name = Some(parse_string(expr)?),
        "open" => patch.open = Some(parse_minute_expr(expr)?),
        "close" => patch.close = Some(parse_minute_expr(expr)?),
        "slot_minutes" => patch.slot_minutes = Some(parse_u32(expr)?),
        "capacity" => patch.capacity = Some(parse_u32(expr)?),
        "booth_pool" => patch.booth_pool = Some(parse_u32(expr)?),
        "max_head_count" => patch.max_head_count = Some(parse_u32(expr)?),
        "auto_confirm" => patch.auto_confirm = Some(parse_bool(expr)?),
        "utc_offset_minutes" => {
            let v = parse_i64_expr(expr)?;
            patch.utc_offset_minutes =
                Some(i32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of i32 range")))?);
        }
        "day_pass_base" => patch.day_pass_base = Some(parse_amount(expr)?),
        "day_pass_additional" => patch.day_pass_additional = Some(parse_amount(expr)?),
        "monthly_fee" => patch.monthly_fee = Some(parse_amount(expr)?),
        "hourly_rate" => patch.hourly_rate = Some(parse_amount(expr)?),
        "booth_hourly_rate" => patch.booth_hourly_rate = Some(parse_amount(expr)?),
        "subscriber_discount_percent" => patch.subscriber_discount_percent = Some(parse_u32(expr)?),
        other => {
            if let Some(prefix) = other.strip_suffix("_refund_tiers")
                && let Some(channel) = channel_prefix(prefix)
            {
                patch.refund_tiers.push((channel, parse_refund_tiers(&parse_string(expr)?)?));
                return Ok(());
            }
            let (channel, field) = policy_column(other).ok_or_else(|| SqlError::UnknownColumn(other.to_string()))?;
            patch.policies.push((channel, field, parse_u32(expr)?));
        }
    }
    Ok(())
}

fn channel_prefix(prefix: &str) -> Option<Channel> {
    match prefix {
        "regular" => Some(Channel::Regular),
        "booth" => Some(Channel::PrivateBooth),
        "facility" => Some(Channel::WholeFacility),
        _ => None,
    }
}

/// `regular_lead_days`, `booth_notice_minutes`, `facility_cancel_window_minutes`, ...
fn policy_column(col: &str) -> Option<(Channel, PolicyField)> {
    let (prefix, rest) = col.split_once('_')?;
    let channel = channel_prefix(prefix)?;
    let field = match rest {
        "lead_days" => PolicyField::LeadDays,
        "notice_minutes" => PolicyField::NoticeMinutes,
        "cancel_window_minutes" => PolicyField::CancelWindowMinutes,
        _ => return None,
    };
    Some((channel, field))
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let filters = Filters::from_selection(delete.selection.as_ref())?;

    match table.as_str() {
        "facilities" => Ok(Command::DeleteFacility { id: filters.ulid("id")? }),
        "holds" => Ok(Command::DeleteHold { id: filters.ulid("id")? }),
        "reservations" => Ok(Command::CancelReservation {
            id: filters.ulid("id")?,
            refund_percent: filters.opt("refund_percent").map(parse_u32).transpose()?,
        }),
        "approvals" => Ok(Command::DeleteApproval {
            entity_id: filters.string("entity_id")?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;
    let filters = Filters::from_selection(select.selection.as_ref())?;

    match table.as_str() {
        "facilities" => Ok(Command::SelectFacilities),
        "availability" => Ok(Command::SelectAvailability {
            facility_id: filters.ulid("facility_id")?,
            date: parse_date(filters.get("date")?)?,
        }),
        "quote" => {
            let subscriber = match (filters.opt("subscriber"), filters.opt("account_id")) {
                (Some(flag), _) => Subscriber::Flag(parse_bool(flag)?),
                (None, Some(account)) => Subscriber::Account(parse_string(account)?),
                (None, None) => Subscriber::Flag(false),
            };
            Ok(Command::SelectQuote {
                facility_id: filters.ulid("facility_id")?,
                plan: parse_plan(filters.get("plan")?)?,
                duration_hours: filters.opt("duration").map(parse_u32).transpose()?.unwrap_or(1),
                head_count: filters.opt("head_count").map(parse_u32).transpose()?.unwrap_or(1),
                subscriber,
            })
        }
        "holds" => Ok(Command::SelectHolds {
            facility_id: filters.ulid("facility_id")?,
        }),
        "reservations" => Ok(Command::SelectReservations {
            facility_id: filters.ulid("facility_id")?,
        }),
        "cancellation" => Ok(Command::SelectCancellation { id: filters.ulid("id")? }),
        "occupancy" => Ok(Command::SelectOccupancy {
            facility_id: filters.ulid("facility_id")?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── Column/filter maps ────────────────────────────────────────

/// Named INSERT values, in column order.
struct Row(Vec<(String, Expr)>);

impl Row {
    fn opt(&self, col: &str) -> Option<&Expr> {
        self.0.iter().find(|(c, _)| c == col).map(|(_, e)| e)
    }

    fn has(&self, col: &str) -> bool {
        self.opt(col).is_some()
    }

    fn get(&self, col: &'static str) -> Result<&Expr, SqlError> {
        self.opt(col).ok_or(SqlError::MissingColumn(col))
    }

    fn ulid(&self, col: &'static str) -> Result<Ulid, SqlError> {
        parse_ulid_expr(self.get(col)?)
    }

    fn u32(&self, col: &'static str) -> Result<u32, SqlError> {
        parse_u32(self.get(col)?)
    }

    fn string(&self, col: &'static str) -> Result<String, SqlError> {
        parse_string(self.get(col)?)
    }
}

/// `col = value` terms of an AND-chained WHERE clause.
struct Filters(HashMap<String, Expr>);

impl Filters {
    fn from_selection(selection: Option<&Expr>) -> Result<Self, SqlError> {
        let mut map = HashMap::new();
        if let Some(expr) = selection {
            collect_eq_filters(expr, &mut map)?;
        }
        Ok(Self(map))
    }

    fn opt(&self, col: &str) -> Option<&Expr> {
        self.0.get(col)
    }

    fn get(&self, col: &'static str) -> Result<&Expr, SqlError> {
        self.opt(col).ok_or(SqlError::MissingFilter(col))
    }

    fn ulid(&self, col: &'static str) -> Result<Ulid, SqlError> {
        parse_ulid_expr(self.get(col)?)
    }

    fn string(&self, col: &'static str) -> Result<String, SqlError> {
        parse_string(self.get(col)?)
    }
}

fn collect_eq_filters(expr: &Expr, out: &mut HashMap<String, Expr>) -> Result<(), SqlError> {
    match expr {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::And,
            right,
        } => {
            collect_eq_filters(left, out)?;
            collect_eq_filters(right, out)
        }
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            let col = expr_column_name(left)
                .ok_or_else(|| SqlError::Parse(format!("expected column, got {left}")))?;
            out.insert(col, right.as_ref().clone());
            Ok(())
        }
        Expr::Nested(inner) => collect_eq_filters(inner, out),
        other => Err(SqlError::Unsupported(format!("filter {other}"))),
    }
}

fn named_values(insert: &ast::Insert, table: &str) -> Result<Row, SqlError> {
    if insert.columns.is_empty() {
        return Err(SqlError::Parse(format!("{table}: column list required")));
    }
    let values = extract_insert_values(insert)?;
    if values.len() != insert.columns.len() {
        return Err(SqlError::WrongArity(table.to_string(), insert.columns.len(), values.len()));
    }
    Ok(Row(insert
        .columns
        .iter()
        .map(|c| c.value.to_lowercase())
        .zip(values)
        .collect()))
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [row] => Ok(row.clone()),
            [] => Err(SqlError::Parse("empty VALUES".into())),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) | Some(Value::Number(s, _)) => Ok(s.clone()),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

fn parse_ulid_expr(expr: &Expr) -> Result<Ulid, SqlError> {
    let s = parse_string(expr)?;
    Ulid::from_string(&s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
}

fn parse_i64_expr(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad integer {s}: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64_expr(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr}")))
    }
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64_expr(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of u32 range")))
}

fn parse_amount(expr: &Expr) -> Result<Amount, SqlError> {
    let v = parse_i64_expr(expr)?;
    Amount::try_from(v).map_err(|_| SqlError::Parse(format!("{v} is not a valid amount")))
}

fn parse_i64_or_null(expr: &Expr) -> Result<Option<i64>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        _ => Ok(Some(parse_i64_expr(expr)?)),
    }
}

fn parse_bool(expr: &Expr) -> Result<bool, SqlError> {
    match extract_value(expr) {
        Some(Value::Boolean(b)) => Ok(*b),
        Some(Value::SingleQuotedString(s)) => match s.to_lowercase().as_str() {
            "true" | "t" | "1" => Ok(true),
            "false" | "f" | "0" => Ok(false),
            _ => Err(SqlError::Parse(format!("bad bool: {s}"))),
        },
        Some(Value::Number(n, _)) => Ok(n != "0"),
        Some(value) => Err(SqlError::Parse(format!("expected bool, got {value}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

/// `'YYYY-MM-DD'`
fn parse_date(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = parse_string(expr)?;
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| SqlError::Parse(format!("bad date {s}: {e}")))
}

/// `'HH:MM'`, or a bare number of minutes after midnight.
fn parse_minute_expr(expr: &Expr) -> Result<Minute, SqlError> {
    match extract_value(expr) {
        Some(Value::Number(..)) => {
            let m = parse_u32(expr)?;
            if m > MINUTES_PER_DAY {
                return Err(SqlError::Parse(format!("minute {m} past end of day")));
            }
            Ok(m)
        }
        _ => {
            let s = parse_string(expr)?;
            parse_minute(&s).ok_or_else(|| SqlError::Parse(format!("bad time of day: {s}")))
        }
    }
}

/// `'7d:100, 3d:50'`: notice (`d`, `h` or `m`) and refund percent per tier.
/// An empty list means a full refund whenever cancelling is allowed.
fn parse_refund_tiers(s: &str) -> Result<Vec<RefundTier>, SqlError> {
    let bad = || SqlError::Parse(format!("bad refund tiers: {s}"));
    let mut tiers = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (notice, percent) = part.split_once(':').ok_or_else(bad)?;
        let notice = notice.trim();
        let unit_ms = match notice.chars().last() {
            Some('d') => DAY_MS,
            Some('h') => HOUR_MS,
            Some('m') => MINUTE_MS,
            _ => return Err(bad()),
        };
        let count: Ms = notice[..notice.len() - 1].parse().map_err(|_| bad())?;
        tiers.push(RefundTier {
            min_notice_ms: count.checked_mul(unit_ms).ok_or_else(bad)?,
            percent: percent.trim().parse().map_err(|_| bad())?,
        });
    }
    Ok(tiers)
}

fn parse_plan(expr: &Expr) -> Result<FeePlan, SqlError> {
    let s = parse_string(expr)?;
    FeePlan::parse(&s).ok_or_else(|| SqlError::Parse(format!("unknown plan: {s}")))
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(String),
    WrongArity(String, usize, usize),
    MissingColumn(&'static str),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(c) => write!(f, "unknown column: {c}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingColumn(col) => write!(f, "missing column: {col}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}

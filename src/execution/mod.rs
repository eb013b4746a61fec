//! Statement execution.
//!
//! A [`ConnectionManager`] hands out one [`Connection`] per data source; the
//! connection runs a compiled [`Statement`] and passes the open
//! [`ResultSet`] to a closure. Connections are released when dropped, so
//! every exit path of the closure returns them.
//!
//! - [`sqlite`] - the bundled rusqlite backend
//! - [`loader`] - compile, execute and stream one request

pub mod loader;
pub mod sqlite;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

use crate::sql::{BoundVariable, Dialect, JdbcType, Statement};
use crate::writer::WriteError;

pub use loader::{DataLoader, LoadError, LoadResult, LoadSummary, RequestOptions};
pub use sqlite::SqliteConnectionManager;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("data source '{0}' is not configured")]
    UnknownDataSource(String),

    #[error("no data source configured")]
    NoDataSource,

    #[error("cannot bind '{value}' as {ty}: {message}")]
    InvalidParameter {
        value: String,
        ty: JdbcType,
        message: String,
    },

    #[error("column {0} is out of range")]
    ColumnOutOfRange(usize),

    #[error("connection is poisoned")]
    Poisoned,

    #[error(transparent)]
    Settings(#[from] crate::config::SettingsError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;

// ============================================================================
// Values
// ============================================================================

/// One cell, or one converted parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    /// Exact decimal text.
    Decimal(String),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse `yyyy-MM-dd`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Parse `yyyy-MM-dd HH:mm:ss[.fff]`, with a space or `T` separator. A bare
/// date is midnight.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| parse_date(s).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

fn is_exact_decimal(s: &str) -> bool {
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    let mut parts = digits.splitn(2, '.');
    let whole = parts.next().unwrap_or("");
    let fraction = parts.next().unwrap_or("");
    !(whole.is_empty() && fraction.is_empty())
        && whole.chars().all(|c| c.is_ascii_digit())
        && fraction.chars().all(|c| c.is_ascii_digit())
}

/// Convert a bound variable to its typed value.
pub fn convert_parameter(var: &BoundVariable) -> ExecutionResult<Value> {
    let raw = var.value();
    let ty = var.jdbc_type();
    let invalid = |message: &str| ExecutionError::InvalidParameter {
        value: raw.to_string(),
        ty,
        message: message.to_string(),
    };

    let value = match ty {
        JdbcType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Value::Boolean(true),
            "false" | "0" => Value::Boolean(false),
            _ => return Err(invalid("expected true or false")),
        },
        t if t.is_integer() => Value::Integer(
            raw.trim()
                .parse()
                .map_err(|_| invalid("expected an integer"))?,
        ),
        JdbcType::Real | JdbcType::Float | JdbcType::Double => Value::Double(
            raw.trim()
                .parse()
                .map_err(|_| invalid("expected a number"))?,
        ),
        JdbcType::Numeric | JdbcType::Decimal => {
            let s = raw.trim();
            if !is_exact_decimal(s) {
                return Err(invalid("expected a decimal number"));
            }
            match s.parse::<i64>() {
                Ok(i) => Value::Integer(i),
                Err(_) => Value::Decimal(s.to_string()),
            }
        }
        JdbcType::Date => {
            Value::Date(parse_date(raw).ok_or_else(|| invalid("expected yyyy-MM-dd"))?)
        }
        JdbcType::Timestamp => Value::Timestamp(
            parse_timestamp(raw).ok_or_else(|| invalid("expected yyyy-MM-dd HH:mm:ss"))?,
        ),
        JdbcType::Time => Value::Time(parse_time(raw).ok_or_else(|| invalid("expected HH:mm:ss"))?),
        _ => Value::Text(raw.to_string()),
    };
    Ok(value)
}

// ============================================================================
// Backend seams
// ============================================================================

/// A result column as reported by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultColumn {
    pub name: String,
    /// Declared type, when the backend knows it.
    pub ty: Option<JdbcType>,
}

/// A forward-only cursor over query results.
pub trait ResultSet {
    fn columns(&self) -> &[ResultColumn];

    /// Advance to the next row; false at the end.
    fn next(&mut self) -> ExecutionResult<bool>;

    /// A cell of the current row.
    fn get(&self, index: usize) -> ExecutionResult<Value>;
}

/// Consumer of an open result set.
pub type Consumer<'c> = dyn FnMut(&mut dyn ResultSet) -> ExecutionResult<()> + 'c;

/// One database session.
pub trait Connection {
    fn dialect(&self) -> Dialect;

    /// Run `statement` and hand its result set to `consume`. At most
    /// `max_rows` rows are fetched.
    fn query(
        &mut self,
        statement: &Statement,
        max_rows: u64,
        consume: &mut Consumer<'_>,
    ) -> ExecutionResult<()>;
}

/// Hands out connections by data source name. `None` picks the default
/// data source.
pub trait ConnectionManager {
    fn dialect(&self, data_source: Option<&str>) -> ExecutionResult<Dialect>;

    fn connection(&self, data_source: Option<&str>) -> ExecutionResult<Box<dyn Connection + '_>>;
}

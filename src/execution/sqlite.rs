//! The bundled SQLite backend.
//!
//! Each data source is one rusqlite connection behind a mutex. A
//! [`Connection`] holds the lock for the duration of one query.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use tracing::debug;

use super::{
    convert_parameter, Connection, ConnectionManager, Consumer, ExecutionError, ExecutionResult,
    ResultColumn, ResultSet, Value,
};
use crate::config::Settings;
use crate::sql::{Dialect, JdbcType, Statement};

const DEFAULT_SOURCE: &str = "default";

/// Maps data source names to SQLite databases.
#[derive(Debug, Default)]
pub struct SqliteConnectionManager {
    sources: HashMap<String, Mutex<rusqlite::Connection>>,
}

impl SqliteConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// A manager with one fresh in-memory database.
    pub fn in_memory(name: &str) -> ExecutionResult<Self> {
        Ok(Self::new().with_connection(name, rusqlite::Connection::open_in_memory()?))
    }

    /// Open every configured data source.
    pub fn from_settings(settings: &Settings) -> ExecutionResult<Self> {
        let mut manager = Self::new();
        for (name, source) in &settings.data_sources {
            source.check_driver()?;
            let path = source.resolved_path()?;
            let conn = if path == ":memory:" {
                rusqlite::Connection::open_in_memory()?
            } else {
                rusqlite::Connection::open(&path)?
            };
            debug!(data_source = %name, path = %path, "opened sqlite data source");
            manager.sources.insert(name.clone(), Mutex::new(conn));
        }
        Ok(manager)
    }

    pub fn with_connection(mut self, name: &str, conn: rusqlite::Connection) -> Self {
        self.sources.insert(name.to_string(), Mutex::new(conn));
        self
    }

    /// Run a script, e.g. to create and seed tables.
    pub fn execute_batch(&self, data_source: Option<&str>, sql: &str) -> ExecutionResult<()> {
        let conn = self.lock(data_source)?;
        conn.execute_batch(sql)?;
        Ok(())
    }

    /// `None` picks the source named `default`, or else the first by name.
    fn source(&self, data_source: Option<&str>) -> ExecutionResult<&Mutex<rusqlite::Connection>> {
        match data_source {
            Some(name) => self
                .sources
                .get(name)
                .ok_or_else(|| ExecutionError::UnknownDataSource(name.to_string())),
            None => self
                .sources
                .get(DEFAULT_SOURCE)
                .or_else(|| {
                    self.sources
                        .iter()
                        .min_by(|a, b| a.0.cmp(b.0))
                        .map(|(_, conn)| conn)
                })
                .ok_or(ExecutionError::NoDataSource),
        }
    }

    fn lock(&self, data_source: Option<&str>) -> ExecutionResult<MutexGuard<'_, rusqlite::Connection>> {
        self.source(data_source)?
            .lock()
            .map_err(|_| ExecutionError::Poisoned)
    }
}

impl ConnectionManager for SqliteConnectionManager {
    fn dialect(&self, data_source: Option<&str>) -> ExecutionResult<Dialect> {
        self.source(data_source)?;
        Ok(Dialect::Sqlite)
    }

    fn connection(&self, data_source: Option<&str>) -> ExecutionResult<Box<dyn Connection + '_>> {
        Ok(Box::new(SqliteConnection {
            conn: self.lock(data_source)?,
        }))
    }
}

struct SqliteConnection<'a> {
    conn: MutexGuard<'a, rusqlite::Connection>,
}

impl Connection for SqliteConnection<'_> {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn query(
        &mut self,
        statement: &Statement,
        max_rows: u64,
        consume: &mut Consumer<'_>,
    ) -> ExecutionResult<()> {
        let params = statement
            .binds()
            .iter()
            .map(|var| convert_parameter(var).map(to_sql_value))
            .collect::<ExecutionResult<Vec<_>>>()?;

        let mut stmt = self.conn.prepare(statement.sql())?;
        let columns = stmt
            .columns()
            .iter()
            .map(|c| ResultColumn {
                name: c.name().to_string(),
                ty: c.decl_type().and_then(JdbcType::parse),
            })
            .collect();
        debug!(binds = params.len(), max_rows, "executing sqlite statement");

        let rows = stmt.query(params_from_iter(params))?;
        let mut results = SqliteResultSet {
            rows,
            columns,
            current: Vec::new(),
            remaining: max_rows,
        };
        consume(&mut results)
    }
}

fn to_sql_value(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Boolean(b) => SqlValue::Integer(i64::from(b)),
        Value::Integer(i) => SqlValue::Integer(i),
        Value::Double(f) => SqlValue::Real(f),
        Value::Decimal(s) => match s.parse::<f64>() {
            Ok(f) => SqlValue::Real(f),
            Err(_) => SqlValue::Text(s),
        },
        Value::Text(s) => SqlValue::Text(s),
        Value::Date(d) => SqlValue::Text(d.format("%Y-%m-%d").to_string()),
        Value::Time(t) => SqlValue::Text(t.format("%H:%M:%S%.f").to_string()),
        Value::Timestamp(ts) => SqlValue::Text(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        Value::Blob(b) => SqlValue::Blob(b),
    }
}

struct SqliteResultSet<'s> {
    rows: rusqlite::Rows<'s>,
    columns: Vec<ResultColumn>,
    current: Vec<SqlValue>,
    remaining: u64,
}

impl ResultSet for SqliteResultSet<'_> {
    fn columns(&self) -> &[ResultColumn] {
        &self.columns
    }

    fn next(&mut self) -> ExecutionResult<bool> {
        if self.remaining == 0 {
            return Ok(false);
        }
        let Some(row) = self.rows.next()? else {
            self.current.clear();
            return Ok(false);
        };
        let mut current = Vec::with_capacity(self.columns.len());
        for i in 0..self.columns.len() {
            current.push(row.get::<_, SqlValue>(i)?);
        }
        self.current = current;
        self.remaining -= 1;
        Ok(true)
    }

    fn get(&self, index: usize) -> ExecutionResult<Value> {
        let cell = self
            .current
            .get(index)
            .ok_or(ExecutionError::ColumnOutOfRange(index))?;
        let declared = self.columns.get(index).and_then(|c| c.ty);
        Ok(match cell {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(i) if declared == Some(JdbcType::Boolean) => Value::Boolean(*i != 0),
            SqlValue::Integer(i) => Value::Integer(*i),
            SqlValue::Real(f) => Value::Double(*f),
            SqlValue::Text(s) => Value::Text(s.clone()),
            SqlValue::Blob(b) => Value::Blob(b.clone()),
        })
    }
}

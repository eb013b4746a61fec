//! One request end to end: compile, execute, stream.

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use super::{ConnectionManager, ExecutionError};
use crate::binding::CatalogRegistry;
use crate::compiler::{request_data_source, CompileError, CompiledQuery, QueryBuilder};
use crate::config::SecuritySettings;
use crate::request::WrqRequest;
use crate::security::Subject;
use crate::writer::{ResultWriter, WriteError};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// An execution failure, with the statement when debugging.
    #[error("{source}\nstatement: {sql}")]
    Statement {
        #[source]
        source: ExecutionError,
        sql: String,
    },

    #[error(transparent)]
    Write(#[from] WriteError),
}

pub type LoadResult<T> = Result<T, LoadError>;

/// What one request needs.
pub struct RequestOptions<'a> {
    pub request: &'a WrqRequest,
    pub catalogs: &'a CatalogRegistry,
    pub connections: &'a dyn ConnectionManager,
    pub subject: &'a dyn Subject,
    pub security: &'a SecuritySettings,
    pub debug: bool,
    /// Server-side row cap.
    pub max_rows: u64,
}

/// Outcome of one load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadSummary {
    pub rows: u64,
    pub columns: usize,
    pub execute: Duration,
    pub write: Duration,
    pub max_rows_exceeded: bool,
}

pub struct DataLoader<'a> {
    options: RequestOptions<'a>,
}

impl<'a> DataLoader<'a> {
    pub fn new(options: RequestOptions<'a>) -> Self {
        Self { options }
    }

    /// Compile the request against the current catalog snapshot.
    pub fn compile(&self) -> LoadResult<CompiledQuery> {
        let opts = &self.options;
        let catalog = opts.catalogs.snapshot();
        let data_source = request_data_source(opts.request, &catalog);
        let dialect = opts.connections.dialect(data_source.as_deref())?;

        let builder = QueryBuilder::new(&catalog, dialect, opts.security, opts.subject)
            .with_max_rows(opts.max_rows);
        match builder.compile(opts.request) {
            Ok(query) => Ok(query),
            Err(CompileError::Malformed(message)) => {
                warn!(%message, "malformed request; returning an empty result");
                Ok(CompiledQuery::empty(dialect, opts.max_rows))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Compile, execute and hand the results to `writer`.
    pub fn load(&self, writer: &mut dyn ResultWriter) -> LoadResult<LoadSummary> {
        let query = self.compile()?;
        let summary = self.execute(&query, writer)?;
        writer.close()?;

        info!(
            rows = summary.rows,
            columns = summary.columns,
            execute_ms = summary.execute.as_millis() as u64,
            write_ms = summary.write.as_millis() as u64,
            "request loaded"
        );
        if summary.max_rows_exceeded {
            warn!(cap = query.effective_cap, "result truncated at the row cap");
        }
        Ok(summary)
    }

    /// Run an already compiled query.
    pub fn execute(
        &self,
        query: &CompiledQuery,
        writer: &mut dyn ResultWriter,
    ) -> LoadResult<LoadSummary> {
        if query.empty {
            let started = Instant::now();
            writer.write(query, None, Duration::ZERO)?;
            return Ok(summarize(writer, Duration::ZERO, started.elapsed()));
        }

        let mut connection = self
            .options
            .connections
            .connection(query.data_source.as_deref())?;
        let started = Instant::now();
        let mut execute = Duration::ZERO;
        let mut write = Duration::ZERO;
        // One extra row tells a capped result from an exact fit.
        let fetch = query.effective_cap.saturating_add(1);
        let result = connection.query(&query.statement, fetch, &mut |results| {
            execute = started.elapsed();
            let writing = Instant::now();
            writer.write(query, Some(results), execute)?;
            write = writing.elapsed();
            Ok(())
        });

        match result {
            Ok(()) => Ok(summarize(writer, execute, write)),
            Err(ExecutionError::Write(e)) => Err(LoadError::Write(e)),
            Err(e) if self.options.debug => Err(LoadError::Statement {
                source: e,
                sql: query.statement.render_with_literals(query.dialect),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

fn summarize(writer: &dyn ResultWriter, execute: Duration, write: Duration) -> LoadSummary {
    LoadSummary {
        rows: writer.row_count(),
        columns: writer.column_count(),
        execute,
        write,
        max_rows_exceeded: writer.max_rows_exceeded(),
    }
}

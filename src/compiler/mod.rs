//! Compilation of a parsed Wrq request into one parameterized statement.
//!
//! ```text
//! WrqRequest → rewrites (top-n) → scopes + virtual tables → Query AST → Statement
//! ```
//!
//! - [`context`] - per-request state: scope table, alias counter, CTEs
//! - [`analyzer`] - reference collection, select-all, VDM remapping
//! - [`expression`] - column references and calculations
//! - [`filter`] - boolean trees (WHERE, HAVING, ON)
//! - [`group_by`] - GROUP BY and grouping-sets emulation
//! - [`select`] - one select, including row windows
//! - [`full_select`] - set operations and CTE bodies
//! - [`query_builder`] - the whole request and read permissions

pub mod analyzer;
pub mod context;
pub mod expression;
pub mod filter;
pub mod full_select;
pub mod group_by;
pub mod query_builder;
pub mod select;

use thiserror::Error;

use crate::binding::BindingError;
use crate::sql::{Dialect, JdbcType, Statement};

pub use context::QueryContext;
pub use query_builder::{request_data_source, QueryBuilder};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during compilation.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A reference could not be resolved; raised before any SQL is built.
    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("permission denied: no read access to binding set '{0}'")]
    PermissionDenied(String),

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("{feature} is not supported by {dialect}")]
    Unsupported { feature: String, dialect: Dialect },

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),
}

pub type CompileResult<T> = Result<T, CompileError>;

// ============================================================================
// Result Types
// ============================================================================

/// An attribute column nested in an output column.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputAttribute {
    /// Attribute name in the response.
    pub name: String,
    /// Logical column id.
    pub id: String,
    pub ty: JdbcType,
    /// Zero-based result set column.
    pub index: usize,
}

/// Metadata of one response column.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputColumn {
    pub id: String,
    pub caption: Option<String>,
    pub ty: JdbcType,
    pub scale: Option<u32>,
    pub escape_xml: bool,
    /// Zero-based result set column.
    pub index: usize,
    pub attributes: Vec<OutputAttribute>,
}

/// A compiled request, ready for the loader.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub statement: Statement,
    pub columns: Vec<OutputColumn>,
    /// Rows the loader delivers at most.
    pub effective_cap: u64,
    /// Rows the client asked for, if it bounded the result.
    pub requested_rows: Option<u64>,
    /// Catalog tables read, one entry per table.
    pub source_tables: Vec<String>,
    /// Nothing to execute; the response carries metadata only.
    pub empty: bool,
    pub data_source: Option<String>,
    pub dialect: Dialect,
}

impl CompiledQuery {
    /// A query with nothing to execute.
    pub fn empty(dialect: Dialect, effective_cap: u64) -> Self {
        Self {
            statement: Statement::default(),
            columns: Vec::new(),
            effective_cap,
            requested_rows: None,
            source_tables: Vec::new(),
            empty: true,
            data_source: None,
            dialect,
        }
    }

    /// Whether the footer should report truncation at the cap.
    pub fn reports_cap(&self) -> bool {
        self.requested_rows.map_or(true, |r| r > self.effective_cap)
    }
}

//! SQL generation module.
//!
//! This module provides a type-safe SQL builder that generates multi-dialect SQL.
//! It includes:
//!
//! - [`query`] - SELECT query builder (joins, set operations, CTEs)
//! - [`expr`] - Expression AST and builder DSL
//! - [`token`] - Token types for SQL generation
//! - [`statement`] - Built statements with ordered bound variables
//! - [`types`] - JDBC column types
//! - [`dialect`] - SQL dialect implementations

pub mod dialect;
pub mod expr;
pub mod query;
pub mod statement;
pub mod token;
pub mod types;

/// SQL validation helpers shared by unit and integration tests.
#[doc(hidden)]
pub mod test_utils;

// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, SpatialRelation, SqlDialect};
pub use expr::{
    and_all, col, count_distinct, func, lit_int, lit_null, lit_str, nullif_zero, or_all, param,
    rank, raw_sql, row_number, star, table_col, BinaryOperator, Expr, ExprExt, Literal,
    NullsOrder, SortDir, UnaryOperator, WindowExt, WindowOrderBy,
};
pub use query::{
    Cte, FromItem, GroupingElement, JoinType, OrderByExpr, Query, SelectExpr, SetOp, SetOpType,
    SetOperation,
};
pub use statement::{BoundVariable, Statement};
pub use token::{Token, TokenStream};
pub use types::{Aggregation, JdbcType};

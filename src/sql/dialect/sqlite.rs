//! SQLite SQL dialect.
//!
//! SQLite differences from ANSI:
//! - Dynamic typing; CAST targets use storage classes
//! - No GROUPING SETS / ROLLUP / CUBE
//! - NULLS FIRST/LAST since 3.30
//! - No spatial predicates without extensions
//! - `strftime` for date rendering

use super::helpers;
use super::{reserved, SpatialRelation, SqlDialect};
use crate::sql::token::TokenStream;
use crate::sql::types::JdbcType;

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn extra_reserved_words(&self) -> &'static [&'static str] {
        reserved::SQLITE
    }

    fn emit_spatial(
        &self,
        _relation: SpatialRelation,
        _lhs: TokenStream,
        _rhs: TokenStream,
    ) -> Option<TokenStream> {
        None
    }

    fn supports_grouping_sets(&self) -> bool {
        false
    }

    fn cast_type_name(&self, ty: JdbcType, _scale: Option<u32>) -> String {
        match ty {
            JdbcType::Boolean
            | JdbcType::TinyInt
            | JdbcType::SmallInt
            | JdbcType::Integer
            | JdbcType::BigInt => "INTEGER".into(),
            // NUMERIC would turn '10' into an integer and truncate divisions
            JdbcType::Real
            | JdbcType::Float
            | JdbcType::Double
            | JdbcType::Numeric
            | JdbcType::Decimal => "REAL".into(),
            JdbcType::Binary | JdbcType::Blob => "BLOB".into(),
            _ => "TEXT".into(),
        }
    }

    fn cast_to_text(&self, expr: TokenStream, ty: JdbcType) -> TokenStream {
        match ty {
            JdbcType::Date => helpers::call("STRFTIME", vec![helpers::lit("%Y-%m-%d"), expr]),
            JdbcType::Timestamp => helpers::call(
                "STRFTIME",
                vec![helpers::lit("%Y-%m-%d %H:%M:%S"), expr],
            ),
            _ => helpers::cast(expr, "TEXT"),
        }
    }
}

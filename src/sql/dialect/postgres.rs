//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features:
//! - ANSI identifier quoting (`"`)
//! - Native GROUPING SETS / ROLLUP / CUBE (9.5+)
//! - NULLS FIRST/LAST
//! - `TO_CHAR` format masks for date rendering
//! - PostGIS `ST_*` spatial predicates

use super::helpers;
use super::{reserved, SqlDialect};
use crate::sql::token::TokenStream;
use crate::sql::types::JdbcType;

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn extra_reserved_words(&self) -> &'static [&'static str] {
        reserved::POSTGRES
    }

    fn cast_type_name(&self, ty: JdbcType, scale: Option<u32>) -> String {
        match ty {
            JdbcType::Binary | JdbcType::Blob => "BYTEA".into(),
            JdbcType::LongVarchar | JdbcType::Clob | JdbcType::Xml => "TEXT".into(),
            _ => helpers::cast_type_ansi(ty, scale),
        }
    }

    fn cast_to_text(&self, expr: TokenStream, ty: JdbcType) -> TokenStream {
        helpers::to_char_text(expr, ty, "VARCHAR")
    }
}

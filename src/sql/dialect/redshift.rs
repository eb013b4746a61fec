//! Amazon Redshift SQL dialect.
//!
//! Redshift is PostgreSQL-based with some differences:
//! - ANSI identifier quoting (`"`)
//! - Recursive CTEs must declare their column list
//! - VARCHAR length capped at 65535

use super::helpers;
use super::{reserved, SqlDialect};
use crate::sql::token::TokenStream;
use crate::sql::types::JdbcType;

/// Amazon Redshift SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Redshift;

impl SqlDialect for Redshift {
    fn name(&self) -> &'static str {
        "redshift"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn extra_reserved_words(&self) -> &'static [&'static str] {
        reserved::POSTGRES
    }

    fn needs_cte_column_list(&self) -> bool {
        true
    }

    fn cast_type_name(&self, ty: JdbcType, scale: Option<u32>) -> String {
        match ty {
            JdbcType::LongVarchar | JdbcType::Clob | JdbcType::Xml => "VARCHAR(65535)".into(),
            JdbcType::Binary | JdbcType::Blob => "VARBYTE".into(),
            _ => helpers::cast_type_ansi(ty, scale),
        }
    }

    fn cast_to_text(&self, expr: TokenStream, ty: JdbcType) -> TokenStream {
        helpers::to_char_text(expr, ty, "VARCHAR")
    }
}

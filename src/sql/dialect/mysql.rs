//! MySQL SQL dialect.
//!
//! MySQL differences from ANSI:
//! - Backtick identifier quoting (`` `name` ``)
//! - Backslash is an escape character inside string literals
//! - `||` is logical OR by default (use CONCAT())
//! - ROLLUP only as `WITH ROLLUP`, no GROUPING SETS
//! - No NULLS FIRST/LAST
//! - Restricted CAST targets (SIGNED, CHAR, DATETIME, ...)

use super::helpers;
use super::{reserved, SqlDialect};
use crate::sql::token::TokenStream;
use crate::sql::types::JdbcType;

/// MySQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_mysql(s)
    }

    fn extra_reserved_words(&self) -> &'static [&'static str] {
        reserved::MYSQL
    }

    fn concat_operator(&self) -> &'static str {
        // Callers should check supports_concat_operator()
        "||"
    }

    fn supports_concat_operator(&self) -> bool {
        false
    }

    fn like_escape_clause(&self) -> &'static str {
        " ESCAPE '\\\\'"
    }

    fn supports_grouping_sets(&self) -> bool {
        false
    }

    fn supports_nulls_ordering(&self) -> bool {
        false
    }

    fn cast_type_name(&self, ty: JdbcType, scale: Option<u32>) -> String {
        match ty {
            JdbcType::Boolean
            | JdbcType::TinyInt
            | JdbcType::SmallInt
            | JdbcType::Integer
            | JdbcType::BigInt => "SIGNED".into(),
            JdbcType::Real | JdbcType::Float | JdbcType::Double => "DOUBLE".into(),
            JdbcType::Numeric | JdbcType::Decimal => helpers::decimal(scale),
            JdbcType::Char
            | JdbcType::Varchar
            | JdbcType::NVarchar
            | JdbcType::LongVarchar
            | JdbcType::Clob
            | JdbcType::Xml => "CHAR".into(),
            JdbcType::Date => "DATE".into(),
            JdbcType::Time => "TIME".into(),
            JdbcType::Timestamp => "DATETIME".into(),
            JdbcType::Binary | JdbcType::Blob => "BINARY".into(),
        }
    }

    fn cast_to_text(&self, expr: TokenStream, ty: JdbcType) -> TokenStream {
        match ty {
            JdbcType::Date => helpers::call("DATE_FORMAT", vec![expr, helpers::lit("%Y-%m-%d")]),
            JdbcType::Timestamp => helpers::call(
                "DATE_FORMAT",
                vec![expr, helpers::lit("%Y-%m-%d %H:%i:%s")],
            ),
            _ => helpers::cast(expr, "CHAR"),
        }
    }
}

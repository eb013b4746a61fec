//! Oracle SQL dialect.
//!
//! Oracle differences from ANSI:
//! - `MINUS` instead of `EXCEPT`
//! - No `AS` before table aliases
//! - No RECURSIVE keyword; recursive CTEs declare their column list
//! - `BITAND()` function instead of an `&` operator
//! - Spatial predicates through `SDO_RELATE`
//! - `NUMBER` / `VARCHAR2` type names

use super::helpers;
use super::{reserved, SpatialRelation, SqlDialect};
use crate::sql::token::{Token, TokenStream};
use crate::sql::types::JdbcType;

/// Oracle SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Oracle;

impl SqlDialect for Oracle {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn extra_reserved_words(&self) -> &'static [&'static str] {
        reserved::ORACLE
    }

    fn except_keyword(&self) -> &'static str {
        "MINUS"
    }

    fn emit_bit_and(&self, lhs: TokenStream, rhs: TokenStream) -> TokenStream {
        helpers::call("BITAND", vec![lhs, rhs])
    }

    fn emit_spatial(
        &self,
        relation: SpatialRelation,
        lhs: TokenStream,
        rhs: TokenStream,
    ) -> Option<TokenStream> {
        let mask = match relation {
            SpatialRelation::Contains => "mask=CONTAINS",
            SpatialRelation::Within => "mask=INSIDE",
            SpatialRelation::Intersects => "mask=ANYINTERACT",
        };
        let mut ts = helpers::call("SDO_RELATE", vec![lhs, rhs, helpers::lit(mask)]);
        ts.space()
            .push(Token::Eq)
            .space()
            .push(Token::LitString("TRUE".into()));
        Some(ts)
    }

    fn emit_recursive_keyword(&self) -> bool {
        false
    }

    fn needs_cte_column_list(&self) -> bool {
        true
    }

    fn table_alias_uses_as(&self) -> bool {
        false
    }

    fn cast_type_name(&self, ty: JdbcType, scale: Option<u32>) -> String {
        match ty {
            JdbcType::Boolean => "NUMBER(1)".into(),
            JdbcType::TinyInt | JdbcType::SmallInt | JdbcType::Integer => "NUMBER(10)".into(),
            JdbcType::BigInt => "NUMBER(19)".into(),
            JdbcType::Real | JdbcType::Float | JdbcType::Double => "BINARY_DOUBLE".into(),
            JdbcType::Numeric | JdbcType::Decimal => {
                format!("NUMBER(31, {})", scale.unwrap_or(6).min(31))
            }
            JdbcType::Char
            | JdbcType::Varchar
            | JdbcType::NVarchar
            | JdbcType::LongVarchar => "VARCHAR2(4000)".into(),
            JdbcType::Clob | JdbcType::Xml => "CLOB".into(),
            JdbcType::Date => "DATE".into(),
            JdbcType::Time | JdbcType::Timestamp => "TIMESTAMP".into(),
            JdbcType::Binary | JdbcType::Blob => "BLOB".into(),
        }
    }

    fn cast_to_text(&self, expr: TokenStream, ty: JdbcType) -> TokenStream {
        match ty {
            JdbcType::Date | JdbcType::Timestamp => helpers::to_char_text(expr, ty, "VARCHAR2(4000)"),
            _ => helpers::call("TO_CHAR", vec![expr]),
        }
    }
}

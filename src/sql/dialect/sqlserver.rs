//! SQL Server dialect.
//!
//! SQL Server has significant differences from ANSI:
//! - Square bracket identifier quoting (`[name]`)
//! - N'...' prefix for Unicode strings
//! - No RECURSIVE keyword; recursive CTEs declare their column list
//! - No NULLS FIRST/LAST before 2022
//! - String concatenation with `+`
//! - Spatial predicates as geometry methods (`g.STContains(h)`)
//! - `CONVERT` styles for date rendering

use super::helpers;
use super::{reserved, SpatialRelation, SqlDialect};
use crate::sql::token::{Token, TokenStream};
use crate::sql::types::JdbcType;

/// SQL Server dialect.
#[derive(Debug, Clone, Copy)]
pub struct SqlServer;

impl SqlDialect for SqlServer {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_bracket(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        if !s.is_ascii() {
            helpers::quote_string_unicode(s)
        } else {
            helpers::quote_string_single(s)
        }
    }

    fn extra_reserved_words(&self) -> &'static [&'static str] {
        reserved::SQLSERVER
    }

    fn concat_operator(&self) -> &'static str {
        "+"
    }

    fn emit_spatial(
        &self,
        relation: SpatialRelation,
        lhs: TokenStream,
        rhs: TokenStream,
    ) -> Option<TokenStream> {
        let method = match relation {
            SpatialRelation::Contains => "STContains",
            SpatialRelation::Within => "STWithin",
            SpatialRelation::Intersects => "STIntersects",
        };
        let mut ts = TokenStream::new();
        ts.append(&lhs)
            .push(Token::Dot)
            .push(Token::Raw(method.into()))
            .lparen()
            .append(&rhs)
            .rparen()
            .space()
            .push(Token::Eq)
            .space()
            .push(Token::LitInt(1));
        Some(ts)
    }

    fn emit_recursive_keyword(&self) -> bool {
        false
    }

    fn needs_cte_column_list(&self) -> bool {
        true
    }

    fn supports_nulls_ordering(&self) -> bool {
        // 2022+ only
        false
    }

    fn cast_type_name(&self, ty: JdbcType, scale: Option<u32>) -> String {
        match ty {
            JdbcType::Boolean => "BIT".into(),
            JdbcType::TinyInt => "TINYINT".into(),
            JdbcType::Float | JdbcType::Double => "FLOAT".into(),
            JdbcType::Char | JdbcType::Varchar | JdbcType::NVarchar => "NVARCHAR(4000)".into(),
            JdbcType::LongVarchar | JdbcType::Clob | JdbcType::Xml => "NVARCHAR(MAX)".into(),
            JdbcType::Timestamp => "DATETIME2".into(),
            JdbcType::Binary | JdbcType::Blob => "VARBINARY(MAX)".into(),
            _ => helpers::cast_type_ansi(ty, scale),
        }
    }

    fn cast_to_text(&self, expr: TokenStream, ty: JdbcType) -> TokenStream {
        let style = |len: &str| {
            let mut target = TokenStream::new();
            target.push(Token::Raw(format!("VARCHAR({})", len)));
            let mut code = TokenStream::new();
            code.push(Token::LitInt(120));
            (target, code)
        };
        match ty {
            JdbcType::Date => {
                let (target, code) = style("10");
                helpers::call("CONVERT", vec![target, expr, code])
            }
            JdbcType::Timestamp => {
                let (target, code) = style("19");
                helpers::call("CONVERT", vec![target, expr, code])
            }
            _ => helpers::cast(expr, "NVARCHAR(4000)"),
        }
    }
}

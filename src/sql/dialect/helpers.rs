//! Shared helper functions for SQL dialect implementations.
//!
//! This module provides reusable building blocks that dialects can compose
//! to implement the `SqlDialect` trait with minimal duplication.

use super::super::token::{Token, TokenStream};
use super::super::types::JdbcType;

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Quote identifier with double quotes (ANSI style).
/// Used by: Ansi, Postgres, Redshift, Oracle, Sqlite
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote identifier with backticks.
/// Used by: MySQL
pub fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Quote identifier with square brackets.
/// Used by: SQL Server
pub fn quote_bracket(ident: &str) -> String {
    format!("[{}]", ident.replace(']', "]]"))
}

/// Returns true if `ident` can be written without quotes
/// (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn is_simple_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// =============================================================================
// String Quoting
// =============================================================================

/// Quote string with single quotes (standard SQL).
/// Used by: All dialects
pub fn quote_string_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Quote string with N prefix for Unicode (SQL Server).
pub fn quote_string_unicode(s: &str) -> String {
    format!("N'{}'", s.replace('\'', "''"))
}

/// Quote string for MySQL, where a backslash inside a literal is an escape
/// character unless doubled.
pub fn quote_string_mysql(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''"))
}

// =============================================================================
// Function Call Building
// =============================================================================

/// `NAME(arg1, arg2, ...)`
pub fn call(name: &str, args: Vec<TokenStream>) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::FunctionName(name.into())).lparen();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            ts.comma().space();
        }
        ts.append(arg);
    }
    ts.rparen();
    ts
}

/// `CAST(expr AS type)`
pub fn cast(expr: TokenStream, type_name: &str) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::Cast)
        .lparen()
        .append(&expr)
        .space()
        .push(Token::As)
        .space()
        .push(Token::Raw(type_name.into()))
        .rparen();
    ts
}

/// A fixed string literal (format masks and the like).
pub fn lit(s: &str) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::LitString(s.into()));
    ts
}

/// `(lhs & rhs)`
pub fn bit_and_operator(lhs: TokenStream, rhs: TokenStream) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.lparen()
        .append(&lhs)
        .space()
        .push(Token::BitAnd)
        .space()
        .append(&rhs)
        .rparen();
    ts
}

// =============================================================================
// Type Names
// =============================================================================

/// Cast target type names for ANSI and Postgres style dialects.
pub fn cast_type_ansi(ty: JdbcType, scale: Option<u32>) -> String {
    match ty {
        JdbcType::Boolean => "BOOLEAN".into(),
        JdbcType::TinyInt | JdbcType::SmallInt => "SMALLINT".into(),
        JdbcType::Integer => "INTEGER".into(),
        JdbcType::BigInt => "BIGINT".into(),
        JdbcType::Real => "REAL".into(),
        JdbcType::Float | JdbcType::Double => "DOUBLE PRECISION".into(),
        JdbcType::Numeric | JdbcType::Decimal => decimal(scale),
        JdbcType::Char => "CHAR(1)".into(),
        JdbcType::Varchar | JdbcType::NVarchar => "VARCHAR(4000)".into(),
        JdbcType::LongVarchar | JdbcType::Clob | JdbcType::Xml => "VARCHAR(32000)".into(),
        JdbcType::Date => "DATE".into(),
        JdbcType::Time => "TIME".into(),
        JdbcType::Timestamp => "TIMESTAMP".into(),
        JdbcType::Binary | JdbcType::Blob => "VARBINARY(8000)".into(),
    }
}

/// `DECIMAL(31, scale)`, scale defaulting to 6.
pub fn decimal(scale: Option<u32>) -> String {
    format!("DECIMAL(31, {})", scale.unwrap_or(6).min(31))
}

// =============================================================================
// Casting to text
// =============================================================================

/// Text conversion through a `TO_CHAR` format mask.
/// Used by: Postgres, Redshift, Oracle
pub fn to_char_text(expr: TokenStream, ty: JdbcType, fallback: &str) -> TokenStream {
    match ty {
        JdbcType::Date => call("TO_CHAR", vec![expr, lit("YYYY-MM-DD")]),
        JdbcType::Timestamp => call("TO_CHAR", vec![expr, lit("YYYY-MM-DD HH24:MI:SS")]),
        _ => cast(expr, fallback),
    }
}

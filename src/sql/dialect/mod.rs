//! SQL Dialect definitions and formatting rules.
//!
//! This module provides a trait-based abstraction for SQL dialect differences.
//! Each dialect implements `SqlDialect` to handle its specific syntax:
//!
//! - Identifier quoting: `"` (ANSI/PG/Oracle/SQLite), `` ` `` (MySQL), `[]` (SQL Server)
//! - String concatenation: `||` vs `+` vs CONCAT()
//! - CTE syntax: WITH RECURSIVE vs WITH, explicit column lists
//! - GROUPING SETS availability
//! - NULLS FIRST/LAST availability
//! - Spatial predicates and bitwise AND
//!
//! # Usage
//!
//! ```ignore
//! use wrq::sql::dialect::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::from_product_name("PostgreSQL");
//! let quoted = dialect.render_identifier("order");  // "order"
//! ```
//!
//! # Feature Flags
//!
//! | Feature | Ansi | Postgres | Redshift | Oracle | SQL Server | MySQL | SQLite |
//! |---------|------|----------|----------|--------|------------|-------|--------|
//! | GROUPING SETS | ✓ | ✓ | ✓ | ✓ | ✓ | ❌ | ❌ |
//! | WITH RECURSIVE keyword | ✓ | ✓ | ✓ | ❌ | ❌ | ✓ | ✓ |
//! | Recursive CTE column list required | ❌ | ❌ | ✓ | ✓ | ✓ | ❌ | ❌ |
//! | NULLS FIRST/LAST | ✓ | ✓ | ✓ | ✓ | ❌ | ❌ | ✓ |
//! | EXCEPT spelling | EXCEPT | EXCEPT | EXCEPT | MINUS | EXCEPT | EXCEPT | EXCEPT |
//!
//! Check the feature flags before generating SQL that uses these features;
//! the compiler emulates grouping sets and null placement where missing.

mod ansi;
pub mod helpers;
mod mysql;
mod oracle;
mod postgres;
mod redshift;
pub mod reserved;
mod sqlite;
mod sqlserver;

pub use ansi::Ansi;
pub use mysql::MySql;
pub use oracle::Oracle;
pub use postgres::Postgres;
pub use redshift::Redshift;
pub use sqlite::Sqlite;
pub use sqlserver::SqlServer;

use std::str::FromStr;

use super::token::{Token, TokenStream};
use super::types::JdbcType;

/// Spatial relation tested by a spatial filter predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialRelation {
    /// Left geometry contains the right one.
    Contains,
    /// Left geometry lies within the right one.
    Within,
    Intersects,
}

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// Implementations handle dialect-specific syntax differences.
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    /// Quote an identifier (table, column, alias).
    ///
    /// - ANSI/PostgreSQL/Oracle/SQLite: `"identifier"`
    /// - MySQL: `` `identifier` ``
    /// - SQL Server: `[identifier]`
    fn quote_identifier(&self, ident: &str) -> String;

    /// Render an identifier, quoting it only when it is not a plain word or
    /// collides with a reserved word.
    fn render_identifier(&self, ident: &str) -> String {
        if helpers::is_simple_identifier(ident) && !self.is_reserved(ident) {
            ident.to_string()
        } else {
            self.quote_identifier(ident)
        }
    }

    /// Quote a string literal.
    ///
    /// All dialects use single quotes with `''` for escaping.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    // =========================================================================
    // Reserved Words
    // =========================================================================

    /// Dialect-specific reserved words on top of [`reserved::COMMON`].
    fn extra_reserved_words(&self) -> &'static [&'static str] {
        &[]
    }

    /// Whether `word` is reserved, case-insensitive.
    fn is_reserved(&self, word: &str) -> bool {
        reserved::contains(reserved::COMMON, word)
            || reserved::contains(self.extra_reserved_words(), word)
    }

    // =========================================================================
    // Operators
    // =========================================================================

    /// String concatenation operator.
    ///
    /// - ANSI/PostgreSQL/Oracle/SQLite: `||`
    /// - SQL Server: `+`
    /// - MySQL: `CONCAT()` (|| is OR by default)
    fn concat_operator(&self) -> &'static str {
        "||"
    }

    /// Whether this dialect supports the `||` concat operator.
    ///
    /// MySQL uses `||` as logical OR by default.
    fn supports_concat_operator(&self) -> bool {
        true
    }

    /// Keyword for the difference set operator.
    fn except_keyword(&self) -> &'static str {
        "EXCEPT"
    }

    /// Clause appended to every LIKE; the compiler escapes with `\`.
    fn like_escape_clause(&self) -> &'static str {
        " ESCAPE '\\'"
    }

    /// Bitwise AND of two operands.
    fn emit_bit_and(&self, lhs: TokenStream, rhs: TokenStream) -> TokenStream {
        helpers::bit_and_operator(lhs, rhs)
    }

    /// Boolean spatial predicate, or `None` when the dialect has no spatial
    /// support.
    fn emit_spatial(
        &self,
        relation: SpatialRelation,
        lhs: TokenStream,
        rhs: TokenStream,
    ) -> Option<TokenStream> {
        let name = match relation {
            SpatialRelation::Contains => "ST_CONTAINS",
            SpatialRelation::Within => "ST_WITHIN",
            SpatialRelation::Intersects => "ST_INTERSECTS",
        };
        Some(helpers::call(name, vec![lhs, rhs]))
    }

    // =========================================================================
    // CTE (Common Table Expressions)
    // =========================================================================

    /// Whether to emit RECURSIVE keyword for recursive CTEs.
    ///
    /// Oracle and SQL Server omit the RECURSIVE keyword.
    fn emit_recursive_keyword(&self) -> bool {
        true
    }

    /// Whether a recursive CTE must declare its column list.
    fn needs_cte_column_list(&self) -> bool {
        false
    }

    // =========================================================================
    // Grouping and Ordering
    // =========================================================================

    /// Whether GROUP BY accepts GROUPING SETS / ROLLUP / CUBE.
    fn supports_grouping_sets(&self) -> bool {
        true
    }

    /// Whether this dialect supports NULLS FIRST/LAST in ORDER BY.
    fn supports_nulls_ordering(&self) -> bool {
        true
    }

    // =========================================================================
    // Table Aliases
    // =========================================================================

    /// Whether a table alias may be introduced with `AS`.
    ///
    /// Oracle rejects `FROM t AS a`.
    fn table_alias_uses_as(&self) -> bool {
        true
    }

    // =========================================================================
    // Types and Casts
    // =========================================================================

    /// Type name used as a CAST target.
    fn cast_type_name(&self, ty: JdbcType, scale: Option<u32>) -> String {
        helpers::cast_type_ansi(ty, scale)
    }

    /// Convert `expr` to text; dates are truncated to the day and timestamps
    /// to the second.
    fn cast_to_text(&self, expr: TokenStream, ty: JdbcType) -> TokenStream {
        match ty {
            JdbcType::Date => helpers::cast(expr, "VARCHAR(10)"),
            JdbcType::Timestamp => helpers::cast(expr, "VARCHAR(19)"),
            _ => helpers::cast(expr, "VARCHAR(4000)"),
        }
    }

    /// A NULL literal typed as `ty`.
    fn typed_null(&self, ty: JdbcType) -> TokenStream {
        let mut null = TokenStream::new();
        null.push(Token::Null);
        helpers::cast(null, &self.cast_type_name(ty, None))
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    #[default]
    Ansi,
    Postgres,
    Redshift,
    Oracle,
    SqlServer,
    MySql,
    Sqlite,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Ansi => &Ansi,
            Dialect::Postgres => &Postgres,
            Dialect::Redshift => &Redshift,
            Dialect::Oracle => &Oracle,
            Dialect::SqlServer => &SqlServer,
            Dialect::MySql => &MySql,
            Dialect::Sqlite => &Sqlite,
        }
    }

    /// Resolve a dialect from a database product name.
    ///
    /// Matching is case-insensitive on substrings; unknown products fall
    /// back to [`Dialect::Ansi`].
    pub fn from_product_name(product: &str) -> Dialect {
        let p = product.to_ascii_lowercase();
        if p.contains("redshift") {
            Dialect::Redshift
        } else if p.contains("postgres") {
            Dialect::Postgres
        } else if p.contains("oracle") {
            Dialect::Oracle
        } else if p.contains("sql server") || p.contains("sqlserver") {
            Dialect::SqlServer
        } else if p.contains("mysql") || p.contains("mariadb") {
            Dialect::MySql
        } else if p.contains("sqlite") {
            Dialect::Sqlite
        } else {
            Dialect::Ansi
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    /// Parse a dialect name as printed by `Display`, or a product name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "ansi" => Ok(Dialect::Ansi),
            "tsql" | "mssql" => Ok(Dialect::SqlServer),
            "" => Err("empty dialect name".into()),
            _ => match Dialect::from_product_name(&lower) {
                Dialect::Ansi => Err(format!("unknown dialect: {}", s)),
                d => Ok(d),
            },
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn render_identifier(&self, ident: &str) -> String {
        self.dialect().render_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn extra_reserved_words(&self) -> &'static [&'static str] {
        self.dialect().extra_reserved_words()
    }

    fn is_reserved(&self, word: &str) -> bool {
        self.dialect().is_reserved(word)
    }

    fn concat_operator(&self) -> &'static str {
        self.dialect().concat_operator()
    }

    fn supports_concat_operator(&self) -> bool {
        self.dialect().supports_concat_operator()
    }

    fn except_keyword(&self) -> &'static str {
        self.dialect().except_keyword()
    }

    fn like_escape_clause(&self) -> &'static str {
        self.dialect().like_escape_clause()
    }

    fn emit_bit_and(&self, lhs: TokenStream, rhs: TokenStream) -> TokenStream {
        self.dialect().emit_bit_and(lhs, rhs)
    }

    fn emit_spatial(
        &self,
        relation: SpatialRelation,
        lhs: TokenStream,
        rhs: TokenStream,
    ) -> Option<TokenStream> {
        self.dialect().emit_spatial(relation, lhs, rhs)
    }

    fn emit_recursive_keyword(&self) -> bool {
        self.dialect().emit_recursive_keyword()
    }

    fn needs_cte_column_list(&self) -> bool {
        self.dialect().needs_cte_column_list()
    }

    fn supports_grouping_sets(&self) -> bool {
        self.dialect().supports_grouping_sets()
    }

    fn supports_nulls_ordering(&self) -> bool {
        self.dialect().supports_nulls_ordering()
    }

    fn table_alias_uses_as(&self) -> bool {
        self.dialect().table_alias_uses_as()
    }

    fn cast_type_name(&self, ty: JdbcType, scale: Option<u32>) -> String {
        self.dialect().cast_type_name(ty, scale)
    }

    fn cast_to_text(&self, expr: TokenStream, ty: JdbcType) -> TokenStream {
        self.dialect().cast_to_text(expr, ty)
    }

    fn typed_null(&self, ty: JdbcType) -> TokenStream {
        self.dialect().typed_null(ty)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}

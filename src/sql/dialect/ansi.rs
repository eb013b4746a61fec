//! ANSI SQL dialect.
//!
//! The fallback for database products that are not recognized. Follows the
//! SQL standard for every construct, which is what the trait defaults
//! already do.

use super::helpers;
use super::SqlDialect;

/// ANSI SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Ansi;

impl SqlDialect for Ansi {
    fn name(&self) -> &'static str {
        "ansi"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }
}

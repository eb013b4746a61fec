//! Qualification of catalog column expressions.
//!
//! A catalog item's `column` is either a plain column name or a small SQL
//! expression over the table's columns (`amount * rate`, `UPPER(name)`).
//! Every bare column name in it gets the occurrence's table alias prefix.
//! Words that are reserved, type names, function names (followed by `(`) or
//! already qualified (`x.y`) are left alone, as are string literals.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::sql::{Dialect, SqlDialect};

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"'(?:[^']|'')*'|(?:[A-Za-z_][A-Za-z0-9_$#]*|"[^"]*"|\[[^\]]*\]|`[^`]*`)(?:\.(?:[A-Za-z_][A-Za-z0-9_$#]*|"[^"]*"|\[[^\]]*\]|`[^`]*`))*|\d+(?:\.\d+)?"#,
    )
    .expect("column expression token pattern is valid")
});

const TYPE_WORDS: &[&str] = &[
    "bigint", "binary", "bit", "blob", "boolean", "char", "clob", "date", "datetime",
    "datetime2", "decimal", "double", "float", "int", "integer", "interval", "nchar",
    "number", "numeric", "nvarchar", "precision", "real", "signed", "smallint", "text",
    "time", "timestamp", "tinyint", "unsigned", "varchar", "varchar2",
];

/// Prefix every bare column name in `column` with `alias`.
pub fn qualify(column: &str, alias: &str, dialect: Dialect) -> String {
    TOKEN
        .replace_all(column, |caps: &Captures| {
            let m = caps.get(0).map(|m| (m.as_str(), m.end())).unwrap_or(("", 0));
            let (word, end) = m;
            if !needs_prefix(word, &column[end..], dialect) {
                return word.to_string();
            }
            format!("{alias}.{word}")
        })
        .into_owned()
}

fn needs_prefix(word: &str, rest: &str, dialect: Dialect) -> bool {
    let first = word.chars().next().unwrap_or(' ');
    if first == '\'' || first.is_ascii_digit() {
        return false;
    }
    if has_qualifier(word) {
        return false;
    }
    if rest.trim_start().starts_with('(') {
        return false;
    }
    let bare = matches!(first, 'A'..='Z' | 'a'..='z' | '_');
    if bare {
        let lower = word.to_ascii_lowercase();
        if dialect.is_reserved(&lower) || TYPE_WORDS.contains(&lower.as_str()) {
            return false;
        }
    }
    true
}

/// Whether a matched identifier chain has more than one part.
fn has_qualifier(word: &str) -> bool {
    let mut quote: Option<char> = None;
    for c in word.chars() {
        match (quote, c) {
            (None, '"') => quote = Some('"'),
            (None, '[') => quote = Some(']'),
            (None, '`') => quote = Some('`'),
            (Some(q), c) if c == q => quote = None,
            (None, '.') => return true,
            _ => {}
        }
    }
    false
}

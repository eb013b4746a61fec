//! Compiled statements and their bound variables.
//!
//! A [`Statement`] is the pair of SQL text and the ordered list of
//! [`BoundVariable`]s whose positions match the `?` placeholders in the text
//! one-to-one. Statements are built once by [`TokenStream::build`] and are not
//! mutated afterwards; concatenation produces a new statement.
//!
//! [`TokenStream::build`]: super::token::TokenStream::build

use std::fmt;

use super::dialect::{Dialect, SqlDialect};
use super::types::JdbcType;

/// A typed literal placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoundVariable {
    value: String,
    jdbc_type: JdbcType,
}

impl BoundVariable {
    pub fn new(value: impl Into<String>, jdbc_type: JdbcType) -> Self {
        Self {
            value: value.into(),
            jdbc_type,
        }
    }

    /// The literal as written in the request.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn jdbc_type(&self) -> JdbcType {
        self.jdbc_type
    }

    /// Render the value as a SQL literal, for diagnostics only.
    pub fn to_literal(&self, dialect: Dialect) -> String {
        if self.jdbc_type.is_numeric() && is_plain_number(&self.value) {
            self.value.clone()
        } else {
            dialect.quote_string(&self.value)
        }
    }
}

fn is_plain_number(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty()
        && digits.chars().filter(|c| *c == '.').count() <= 1
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && !digits.starts_with('.')
        && !digits.ends_with('.')
}

/// SQL text plus its ordered bound variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    sql: String,
    binds: Vec<BoundVariable>,
}

impl Statement {
    pub fn new(sql: String, binds: Vec<BoundVariable>) -> Self {
        Self { sql, binds }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn binds(&self) -> &[BoundVariable] {
        &self.binds
    }

    pub fn is_empty(&self) -> bool {
        self.sql.trim().is_empty()
    }

    /// Concatenate two statements, keeping bind order.
    pub fn concat(&self, separator: &str, other: &Statement) -> Statement {
        let mut sql = String::with_capacity(self.sql.len() + separator.len() + other.sql.len());
        sql.push_str(&self.sql);
        sql.push_str(separator);
        sql.push_str(&other.sql);
        let mut binds = self.binds.clone();
        binds.extend(other.binds.iter().cloned());
        Statement { sql, binds }
    }

    /// Number of `?` placeholders outside quoted literals and identifiers.
    pub fn placeholder_count(&self) -> usize {
        placeholder_positions(&self.sql).len()
    }

    /// Render the statement with every placeholder replaced by its literal.
    ///
    /// Meant for the debug section of a response and for logs; the result is
    /// never executed.
    pub fn render_with_literals(&self, dialect: Dialect) -> String {
        let mut out = String::with_capacity(self.sql.len());
        let mut last = 0;
        for (i, pos) in placeholder_positions(&self.sql).into_iter().enumerate() {
            out.push_str(&self.sql[last..pos]);
            match self.binds.get(i) {
                Some(var) => out.push_str(&var.to_literal(dialect)),
                None => out.push('?'),
            }
            last = pos + 1;
        }
        out.push_str(&self.sql[last..]);
        out
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Byte offsets of `?` placeholders, skipping quoted strings and quoted
/// identifiers.
pub(crate) fn placeholder_positions(sql: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut closing: Option<char> = None;
    for (pos, c) in sql.char_indices() {
        match closing {
            Some(q) if c == q => closing = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => closing = Some(c),
                '[' => closing = Some(']'),
                '?' => positions.push(pos),
                _ => {}
            },
        }
    }
    positions
}

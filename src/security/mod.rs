//! Row-level security.
//!
//! A catalog table may carry a [`SecurityFilter`]: a boolean tree whose leaves
//! restrict one column to the values the current [`Subject`] holds in a
//! permission category. [`SecurityCompiler`] turns the tree into a single
//! predicate, folding unconditional leaves away:
//!
//! - a wildcard permission passes,
//! - no permission fails (or, with `allow_null`, admits only NULL),
//! - up to `inline_threshold` values become `col = ?` / `col IN (?, ...)`,
//! - more values become a correlated sub-select on the permission table.
//!
//! `OR` with a passing branch passes and `AND` with a failing branch fails;
//! neutral branches are dropped.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::binding::{BindingError, BindingResult, ResolvedColumn};
use crate::config::SecuritySettings;
use crate::sql::{
    and_all, lit_int, or_all, param, table_col, Expr, ExprExt, FromItem, JdbcType, Query,
    SelectExpr,
};

/// Security filter tree declared on a catalog table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityFilter {
    And(Vec<SecurityFilter>),
    Or(Vec<SecurityFilter>),
    Subject(SubjectFilter),
}

/// Leaf: restrict `column` to the subject's values in `category`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectFilter {
    pub category: String,
    /// Item id of the restricted column.
    pub column: String,
    #[serde(default)]
    pub op: SubjectOp,
    /// NULL column values pass as well.
    #[serde(default)]
    pub allow_null: bool,
}

impl SubjectFilter {
    pub fn new(category: &str, column: &str) -> Self {
        Self {
            category: category.into(),
            column: column.into(),
            op: SubjectOp::In,
            allow_null: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectOp {
    /// Permission values are exact column values.
    #[default]
    In,
    /// Permission values are LIKE patterns.
    Like,
}

/// What a subject holds in one permission category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Wildcard: every value.
    All,
    Values(Vec<String>),
}

/// The principal a request runs for.
pub trait Subject {
    fn id(&self) -> &str;

    /// Values held in a permission category.
    fn permissions(&self, category: &str) -> Permission;

    /// Plain right check, used for table read permissions.
    fn has_right(&self, right: &str) -> bool;
}

/// Subject with a fixed permission set.
#[derive(Debug, Clone, Default)]
pub struct StaticSubject {
    id: String,
    categories: HashMap<String, Permission>,
    rights: HashSet<String>,
    all_rights: bool,
}

impl StaticSubject {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// A subject that passes every check.
    pub fn unrestricted(id: &str) -> Self {
        Self {
            id: id.into(),
            all_rights: true,
            ..Default::default()
        }
    }

    pub fn with_permission(mut self, category: &str, permission: Permission) -> Self {
        self.categories.insert(category.into(), permission);
        self
    }

    pub fn with_values(self, category: &str, values: &[&str]) -> Self {
        let values = values.iter().map(|v| v.to_string()).collect();
        self.with_permission(category, Permission::Values(values))
    }

    pub fn with_right(mut self, right: &str) -> Self {
        self.rights.insert(right.into());
        self
    }
}

impl Subject for StaticSubject {
    fn id(&self) -> &str {
        &self.id
    }

    fn permissions(&self, category: &str) -> Permission {
        match self.categories.get(category) {
            Some(p) => p.clone(),
            None if self.all_rights => Permission::All,
            None => Permission::Values(Vec::new()),
        }
    }

    fn has_right(&self, right: &str) -> bool {
        self.all_rights || self.rights.contains(right)
    }
}

/// Compiled security predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Pass,
    Fail,
    Expr(Expr),
}

impl Predicate {
    /// The predicate as an expression; unconditional results become the
    /// canonical `1=1` / `1=0`.
    pub fn into_expr(self) -> Expr {
        match self {
            Predicate::Pass => Expr::Truth(true),
            Predicate::Fail => Expr::Truth(false),
            Predicate::Expr(e) => e,
        }
    }

    /// `None` when the predicate passes unconditionally.
    pub fn restriction(self) -> Option<Expr> {
        match self {
            Predicate::Pass => None,
            other => Some(other.into_expr()),
        }
    }
}

/// Alias of the permission table in generated sub-selects.
const PERMISSION_ALIAS: &str = "wrq_perm";

/// Compiles security filters for one subject.
pub struct SecurityCompiler<'a> {
    settings: &'a SecuritySettings,
    subject: &'a dyn Subject,
}

impl<'a> SecurityCompiler<'a> {
    pub fn new(settings: &'a SecuritySettings, subject: &'a dyn Subject) -> Self {
        Self { settings, subject }
    }

    /// Compile a filter; `resolve` maps item ids to the occurrence's columns.
    pub fn compile(
        &self,
        filter: &SecurityFilter,
        resolve: &dyn Fn(&str) -> Option<ResolvedColumn>,
    ) -> BindingResult<Predicate> {
        match filter {
            SecurityFilter::And(children) => {
                let mut parts = Vec::new();
                for child in children {
                    match self.compile(child, resolve)? {
                        Predicate::Fail => return Ok(Predicate::Fail),
                        Predicate::Pass => {}
                        Predicate::Expr(e) => parts.push(e),
                    }
                }
                Ok(and_all(parts).map_or(Predicate::Pass, Predicate::Expr))
            }
            SecurityFilter::Or(children) => {
                let mut parts = Vec::new();
                for child in children {
                    match self.compile(child, resolve)? {
                        Predicate::Pass => return Ok(Predicate::Pass),
                        Predicate::Fail => {}
                        Predicate::Expr(e) => parts.push(e),
                    }
                }
                Ok(or_all(parts).map_or(Predicate::Fail, Predicate::Expr))
            }
            SecurityFilter::Subject(leaf) => {
                let column = resolve(&leaf.column)
                    .ok_or_else(|| BindingError::UnknownColumn(leaf.column.clone()))?;
                Ok(self.compile_leaf(leaf, &column))
            }
        }
    }

    fn compile_leaf(&self, leaf: &SubjectFilter, column: &ResolvedColumn) -> Predicate {
        let values = match self.subject.permissions(&leaf.category) {
            Permission::All => return Predicate::Pass,
            Permission::Values(v) => v,
        };
        if values.is_empty() {
            return if leaf.allow_null {
                Predicate::Expr(column.expr.clone().is_null())
            } else {
                Predicate::Fail
            };
        }

        let restriction = if values.len() <= self.settings.inline_threshold {
            self.inline(leaf.op, column, &values)
        } else {
            self.permission_subselect(leaf, column)
        };

        if leaf.allow_null {
            Predicate::Expr(
                restriction
                    .or(column.expr.clone().is_null())
                    .paren(),
            )
        } else {
            Predicate::Expr(restriction)
        }
    }

    fn inline(&self, op: SubjectOp, column: &ResolvedColumn, values: &[String]) -> Expr {
        match op {
            SubjectOp::In if values.len() == 1 => {
                column.expr.clone().eq(param(values[0].clone(), column.ty))
            }
            SubjectOp::In => column.expr.clone().in_list(
                values
                    .iter()
                    .map(|v| param(v.clone(), column.ty))
                    .collect(),
            ),
            SubjectOp::Like => {
                let likes: Vec<Expr> = values
                    .iter()
                    .map(|v| Expr::Like {
                        expr: Box::new(column.expr.clone()),
                        pattern: Box::new(param(v.clone(), JdbcType::Varchar)),
                        negated: false,
                    })
                    .collect();
                match or_all(likes) {
                    Some(e) if values.len() > 1 => e.paren(),
                    Some(e) => e,
                    None => Expr::Truth(false),
                }
            }
        }
    }

    /// `col IN (SELECT value FROM permissions WHERE subject = ? AND category = ?)`,
    /// or an `EXISTS` with `LIKE` for pattern permissions.
    fn permission_subselect(&self, leaf: &SubjectFilter, column: &ResolvedColumn) -> Expr {
        let s = self.settings;
        let value = table_col(PERMISSION_ALIAS, &s.value_column);
        let keyed = table_col(PERMISSION_ALIAS, &s.subject_column)
            .eq(param(self.subject.id(), JdbcType::Varchar))
            .and(
                table_col(PERMISSION_ALIAS, &s.category_column)
                    .eq(param(leaf.category.clone(), JdbcType::Varchar)),
            );
        let from = FromItem::table(&s.permission_table, PERMISSION_ALIAS);

        match leaf.op {
            SubjectOp::In => Expr::InSubquery {
                expr: Box::new(column.expr.clone()),
                subquery: Box::new(
                    Query::new()
                        .select(vec![SelectExpr::new(value)])
                        .from(from)
                        .filter(keyed),
                ),
                negated: false,
            },
            SubjectOp::Like => Expr::Exists(Box::new(
                Query::new()
                    .select(vec![lit_int(1)])
                    .from(from)
                    .filter(keyed.and(Expr::Like {
                        expr: Box::new(column.expr.clone()),
                        pattern: Box::new(value),
                        negated: false,
                    })),
            )),
        }
    }
}

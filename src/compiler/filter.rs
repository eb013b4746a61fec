//! Boolean trees: WHERE, HAVING and join ON conditions.
//!
//! Leaves compare a column with bound literals, another column, a
//! calculation or a sub-select. Empty sub-trees contribute nothing. Under
//! AND, `>=` and `<=` siblings on the same column merge into one BETWEEN at
//! the position of the first merged leaf.

use std::cmp::Ordering;
use std::collections::HashSet;

use super::expression::{malformed, ExprCompiler, Typed};
use super::select::{compile_select, SelectRole};
use super::{CompileError, CompileResult};
use crate::request::{BoolExpr, CompareOperator, Comparison};
use crate::sql::{
    and_all, func, lit_int, or_all, param, Aggregation, BinaryOperator, Expr, ExprExt, JdbcType,
    SpatialRelation, SqlDialect, TokenStream,
};

impl ExprCompiler<'_, '_> {
    /// Compile a boolean tree; `None` when nothing restricts.
    pub fn condition(&mut self, tree: &BoolExpr) -> CompileResult<Option<Expr>> {
        match tree {
            BoolExpr::And(children) => self.conjunction(children),
            BoolExpr::Or(children) => {
                let mut parts = Vec::with_capacity(children.len());
                for child in children {
                    parts.extend(self.condition(child)?);
                }
                Ok(or_all(parts))
            }
            BoolExpr::Not(inner) => Ok(self.condition(inner)?.map(|e| e.paren().not())),
            BoolExpr::Leaf(leaf) => self.leaf(leaf),
        }
    }

    fn conjunction(&mut self, children: &[BoolExpr]) -> CompileResult<Option<Expr>> {
        let ranges = between_ranges(children);
        let mut merged: HashSet<usize> = HashSet::new();
        let mut parts = Vec::with_capacity(children.len());
        for (i, child) in children.iter().enumerate() {
            if merged.contains(&i) {
                continue;
            }
            if let Some(range) = ranges.iter().find(|r| r.first() == i) {
                parts.push(self.between(children, range)?);
                merged.extend(range.lower.iter().chain(&range.upper));
                continue;
            }
            parts.extend(self.condition(child)?);
        }
        Ok(and_all(parts))
    }

    /// Left-hand side of a leaf: aggregated in HAVING, calculated select-list
    /// columns allowed there too.
    fn leaf_lhs(&mut self, b_ref: &str, aggr: Option<Aggregation>) -> CompileResult<Typed> {
        if self.aggregated {
            self.order_ref(b_ref, aggr)
        } else {
            self.column(b_ref, None, false)
        }
    }

    fn leaf(&mut self, leaf: &Comparison) -> CompileResult<Option<Expr>> {
        let (mut lhs, ty) = self.leaf_lhs(&leaf.b_ref, leaf.aggr)?;
        let value_ty = if leaf.ic {
            lhs = func("LOWER", vec![lhs]);
            JdbcType::Varchar
        } else {
            ty
        };

        if let Some(select) = &leaf.sub_select {
            let compiled = compile_select(self.ctx, select, SelectRole::Nested, Some(self.scope))?;
            let subquery = Box::new(compiled.query);
            let expr = match leaf.op {
                CompareOperator::In | CompareOperator::NotIn => Expr::InSubquery {
                    expr: Box::new(lhs),
                    subquery,
                    negated: leaf.op == CompareOperator::NotIn,
                },
                op => Expr::BinaryOp {
                    left: Box::new(lhs),
                    op: comparison(op).ok_or_else(|| {
                        CompileError::Malformed(format!(
                            "operator {op:?} cannot compare with a sub-select"
                        ))
                    })?,
                    right: Box::new(Expr::Subquery(subquery)),
                },
            };
            return Ok(Some(expr));
        }

        let rhs = if let Some(other) = &leaf.b_ref_value {
            let (rhs, _) = self.leaf_lhs(other, None)?;
            Some(if leaf.ic { func("LOWER", vec![rhs]) } else { rhs })
        } else if let Some(calc) = &leaf.calc {
            Some(self.calc(calc)?.0)
        } else {
            None
        };
        if let Some(rhs) = rhs {
            return self.compare(leaf.op, lhs, rhs).map(Some);
        }

        let values: Vec<String> = if leaf.ic {
            leaf.values.iter().map(|v| v.to_lowercase()).collect()
        } else {
            leaf.values.clone()
        };
        let bound = |v: &String| param(v.clone(), value_ty);

        match leaf.op {
            CompareOperator::In | CompareOperator::NotIn => {
                let negated = leaf.op == CompareOperator::NotIn;
                if values.is_empty() {
                    return Ok((!negated).then_some(Expr::Truth(false)));
                }
                Ok(Some(Expr::In {
                    expr: Box::new(lhs),
                    values: values.iter().map(bound).collect(),
                    negated,
                }))
            }
            // No value: = asks for NULL, anything else for a value.
            CompareOperator::Eq if values.is_empty() => Ok(Some(lhs.is_null())),
            _ if values.is_empty() => Ok(Some(lhs.is_not_null())),
            CompareOperator::Eq | CompareOperator::Ne if values.len() > 1 => Ok(Some(Expr::In {
                expr: Box::new(lhs),
                values: values.iter().map(bound).collect(),
                negated: leaf.op == CompareOperator::Ne,
            })),
            // Several patterns: any may match, or none may.
            CompareOperator::Like | CompareOperator::NotLike => {
                let negated = leaf.op == CompareOperator::NotLike;
                let patterns = values
                    .iter()
                    .map(|v| Expr::Like {
                        expr: Box::new(lhs.clone()),
                        pattern: Box::new(param(like_pattern(v), JdbcType::Varchar)),
                        negated,
                    })
                    .collect();
                Ok(if negated { and_all(patterns) } else { or_all(patterns) })
            }
            CompareOperator::SpatialContains
            | CompareOperator::SpatialContained
            | CompareOperator::SpatialIntersects => {
                let rhs = param(values[0].clone(), JdbcType::Varchar);
                self.compare(leaf.op, lhs, rhs).map(Some)
            }
            op => self.compare(op, lhs, bound(&values[0])).map(Some),
        }
    }

    fn compare(&self, op: CompareOperator, lhs: Expr, rhs: Expr) -> CompileResult<Expr> {
        if let Some(op) = comparison(op) {
            return Ok(Expr::BinaryOp {
                left: Box::new(lhs),
                op,
                right: Box::new(rhs),
            });
        }
        let expr = match op {
            CompareOperator::Like | CompareOperator::NotLike => Expr::Like {
                expr: Box::new(lhs),
                pattern: Box::new(rhs),
                negated: op == CompareOperator::NotLike,
            },
            CompareOperator::In | CompareOperator::NotIn => Expr::In {
                expr: Box::new(lhs),
                values: vec![rhs],
                negated: op == CompareOperator::NotIn,
            },
            // Any of the given bits set.
            CompareOperator::BitAnd => Expr::BitAnd {
                left: Box::new(lhs),
                right: Box::new(rhs),
            }
            .ne(lit_int(0)),
            CompareOperator::SpatialContains
            | CompareOperator::SpatialContained
            | CompareOperator::SpatialIntersects => {
                let relation = match op {
                    CompareOperator::SpatialContains => SpatialRelation::Contains,
                    CompareOperator::SpatialContained => SpatialRelation::Within,
                    _ => SpatialRelation::Intersects,
                };
                let dialect = self.dialect();
                if dialect
                    .emit_spatial(relation, TokenStream::new(), TokenStream::new())
                    .is_none()
                {
                    return Err(CompileError::Unsupported {
                        feature: "spatial predicates".into(),
                        dialect,
                    });
                }
                Expr::Spatial {
                    relation,
                    left: Box::new(lhs),
                    right: Box::new(rhs),
                }
            }
            _ => return Err(malformed("unexpected comparison operator")),
        };
        Ok(expr)
    }

    fn between(&mut self, children: &[BoolExpr], range: &Range) -> CompileResult<Expr> {
        let (expr, ty) = self.leaf_lhs(&range.b_ref, range.aggr)?;
        let numeric = ty.compares_numerically();
        let value = |i: &usize| match &children[*i] {
            BoolExpr::Leaf(leaf) => leaf.values.first().cloned().unwrap_or_default(),
            _ => String::new(),
        };
        let low = range
            .lower
            .iter()
            .map(value)
            .max_by(|a, b| compare_values(a, b, numeric))
            .unwrap_or_default();
        let high = range
            .upper
            .iter()
            .map(value)
            .min_by(|a, b| compare_values(a, b, numeric))
            .unwrap_or_default();
        Ok(Expr::Between {
            expr: Box::new(expr),
            low: Box::new(param(low, ty)),
            high: Box::new(param(high, ty)),
            negated: false,
        })
    }
}

/// `>=` / `<=` siblings on one column, by child index.
#[derive(Debug)]
struct Range {
    b_ref: String,
    aggr: Option<Aggregation>,
    lower: Vec<usize>,
    upper: Vec<usize>,
}

impl Range {
    fn first(&self) -> usize {
        self.lower
            .iter()
            .chain(&self.upper)
            .copied()
            .min()
            .unwrap_or(usize::MAX)
    }
}

fn between_ranges(children: &[BoolExpr]) -> Vec<Range> {
    let mut ranges: Vec<Range> = Vec::new();
    for (i, child) in children.iter().enumerate() {
        let BoolExpr::Leaf(leaf) = child else {
            continue;
        };
        let plain = leaf.values.len() == 1
            && !leaf.ic
            && leaf.b_ref_value.is_none()
            && leaf.calc.is_none()
            && leaf.sub_select.is_none();
        if !plain || !matches!(leaf.op, CompareOperator::Ge | CompareOperator::Le) {
            continue;
        }
        let position = ranges
            .iter()
            .position(|r| r.b_ref == leaf.b_ref && r.aggr == leaf.aggr);
        let range = match position {
            Some(p) => &mut ranges[p],
            None => {
                ranges.push(Range {
                    b_ref: leaf.b_ref.clone(),
                    aggr: leaf.aggr,
                    lower: Vec::new(),
                    upper: Vec::new(),
                });
                let last = ranges.len() - 1;
                &mut ranges[last]
            }
        };
        if leaf.op == CompareOperator::Ge {
            range.lower.push(i);
        } else {
            range.upper.push(i);
        }
    }
    ranges.retain(|r| !r.lower.is_empty() && !r.upper.is_empty());
    ranges
}

fn compare_values(a: &str, b: &str, numeric: bool) -> Ordering {
    if numeric {
        if let (Ok(x), Ok(y)) = (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
            return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
        }
    }
    a.cmp(b)
}

fn comparison(op: CompareOperator) -> Option<BinaryOperator> {
    let op = match op {
        CompareOperator::Eq => BinaryOperator::Eq,
        CompareOperator::Ne => BinaryOperator::Ne,
        CompareOperator::Lt => BinaryOperator::Lt,
        CompareOperator::Le => BinaryOperator::Lte,
        CompareOperator::Gt => BinaryOperator::Gt,
        CompareOperator::Ge => BinaryOperator::Gte,
        _ => return None,
    };
    Some(op)
}

/// LIKE pattern from a request value: `*` is the wildcard; `\`, `_` and `%`
/// match literally.
pub fn like_pattern(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 4);
    for c in value.chars() {
        match c {
            '\\' | '_' | '%' => {
                pattern.push('\\');
                pattern.push(c);
            }
            '*' => pattern.push('%'),
            c => pattern.push(c),
        }
    }
    pattern
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::binding::{BindingItem, Catalog, CatalogTable, LogicalTable};
    use crate::compiler::context::QueryContext;
    use crate::config::SecuritySettings;
    use crate::security::StaticSubject;
    use crate::sql::{Dialect, Query, Statement};

    fn catalog() -> Catalog {
        Catalog::new()
            .with_table(
                CatalogTable::new(
                    "sales",
                    vec![
                        BindingItem::new("region", "region", JdbcType::Varchar),
                        BindingItem::new("amount", "amount", JdbcType::Decimal),
                        BindingItem::new("flags", "flags", JdbcType::Integer),
                    ],
                )
                .unwrap(),
            )
            .unwrap()
    }

    fn compile(tree: &BoolExpr, dialect: Dialect) -> CompileResult<Option<Statement>> {
        let catalog = catalog();
        let settings = SecuritySettings::default();
        let subject = StaticSubject::unrestricted("u");
        let mut ctx = QueryContext::new(&catalog, dialect, &settings, &subject);
        let table: Rc<dyn LogicalTable> =
            Rc::new(ctx.occurrence(catalog.get("sales").unwrap(), "sales").unwrap());
        let scope = ctx.push_scope(Some(table), None);
        let condition = ExprCompiler::new(&mut ctx, scope).condition(tree)?;
        Ok(condition.map(|c| Query::new().filter(c).build(dialect)))
    }

    fn leaf(b_ref: &str, op: CompareOperator, values: &[&str]) -> BoolExpr {
        BoolExpr::Leaf(Comparison::new(
            b_ref,
            op,
            values.iter().map(|v| v.to_string()).collect(),
        ))
    }

    fn where_sql(statement: &Statement) -> String {
        statement
            .sql()
            .split_once("WHERE ")
            .map(|(_, w)| w.to_string())
            .unwrap_or_default()
    }

    fn binds(statement: &Statement) -> Vec<&str> {
        statement.binds().iter().map(|b| b.value()).collect()
    }

    #[test]
    fn test_between_merge_independent_of_order() {
        let tree = BoolExpr::And(vec![
            leaf("amount", CompareOperator::Le, &["20"]),
            leaf("region", CompareOperator::Eq, &["EU"]),
            leaf("amount", CompareOperator::Ge, &["10"]),
        ]);
        let stmt = compile(&tree, Dialect::Postgres).unwrap().unwrap();
        assert_eq!(
            where_sql(&stmt),
            "t1.amount BETWEEN ? AND ? AND t1.region = ?"
        );
        assert_eq!(binds(&stmt), vec!["10", "20", "EU"]);
    }

    #[test]
    fn test_between_keeps_tightest_bounds() {
        let tree = BoolExpr::And(vec![
            leaf("amount", CompareOperator::Ge, &["9"]),
            leaf("amount", CompareOperator::Ge, &["10"]),
            leaf("amount", CompareOperator::Le, &["100"]),
            leaf("amount", CompareOperator::Le, &["20"]),
        ]);
        let stmt = compile(&tree, Dialect::Postgres).unwrap().unwrap();
        assert_eq!(where_sql(&stmt), "t1.amount BETWEEN ? AND ?");
        // Numeric, not lexical: 9 < 10 and 20 < 100.
        assert_eq!(binds(&stmt), vec!["10", "20"]);
    }

    #[test]
    fn test_like_escaping() {
        assert_eq!(like_pattern("a*b_c%d\\"), "a%b\\_c\\%d\\\\");
        let stmt = compile(&leaf("region", CompareOperator::Like, &["E*"]), Dialect::Postgres)
            .unwrap()
            .unwrap();
        assert!(where_sql(&stmt).starts_with("t1.region LIKE ? ESCAPE"));
        assert_eq!(binds(&stmt), vec!["E%"]);
    }

    #[test]
    fn test_like_with_several_patterns() {
        let stmt = compile(&leaf("region", CompareOperator::Like, &["E*", "U*"]), Dialect::Postgres)
            .unwrap()
            .unwrap();
        let sql = where_sql(&stmt);
        assert_eq!(sql.matches("t1.region LIKE ?").count(), 2, "{sql}");
        assert!(sql.contains(" OR "), "{sql}");
        assert_eq!(binds(&stmt), vec!["E%", "U%"]);

        let stmt = compile(
            &leaf("region", CompareOperator::NotLike, &["E*", "U*"]),
            Dialect::Postgres,
        )
        .unwrap()
        .unwrap();
        let sql = where_sql(&stmt);
        assert_eq!(sql.matches("t1.region NOT LIKE ?").count(), 2, "{sql}");
        assert!(sql.contains(" AND "), "{sql}");
    }

    #[test]
    fn test_in_lists() {
        let stmt = compile(
            &leaf("region", CompareOperator::In, &["EU", "US"]),
            Dialect::Postgres,
        )
        .unwrap()
        .unwrap();
        assert_eq!(where_sql(&stmt), "t1.region IN (?, ?)");

        let empty_in = compile(&leaf("region", CompareOperator::In, &[]), Dialect::Postgres)
            .unwrap()
            .unwrap();
        assert_eq!(where_sql(&empty_in), "1=0");

        let empty_not_in =
            compile(&leaf("region", CompareOperator::NotIn, &[]), Dialect::Postgres).unwrap();
        assert!(empty_not_in.is_none());
    }

    #[test]
    fn test_absent_value() {
        let eq = compile(&leaf("region", CompareOperator::Eq, &[]), Dialect::Postgres)
            .unwrap()
            .unwrap();
        assert_eq!(where_sql(&eq), "t1.region IS NULL");
        let gt = compile(&leaf("region", CompareOperator::Gt, &[]), Dialect::Postgres)
            .unwrap()
            .unwrap();
        assert_eq!(where_sql(&gt), "t1.region IS NOT NULL");
    }

    #[test]
    fn test_case_insensitive() {
        let mut comparison = Comparison::new("region", CompareOperator::Eq, vec!["Eu".into()]);
        comparison.ic = true;
        let stmt = compile(&BoolExpr::Leaf(comparison), Dialect::Postgres)
            .unwrap()
            .unwrap();
        assert_eq!(where_sql(&stmt), "LOWER(t1.region) = ?");
        assert_eq!(binds(&stmt), vec!["eu"]);
    }

    #[test]
    fn test_empty_subtrees_dropped() {
        let tree = BoolExpr::And(vec![
            BoolExpr::Or(vec![]),
            leaf("region", CompareOperator::NotIn, &[]),
        ]);
        assert!(compile(&tree, Dialect::Postgres).unwrap().is_none());
    }

    #[test]
    fn test_or_and_not() {
        let tree = BoolExpr::Not(Box::new(BoolExpr::Or(vec![
            leaf("region", CompareOperator::Eq, &["EU"]),
            leaf("amount", CompareOperator::Gt, &["5"]),
        ])));
        let stmt = compile(&tree, Dialect::Postgres).unwrap().unwrap();
        assert_eq!(where_sql(&stmt), "NOT (t1.region = ? OR t1.amount > ?)");
    }

    #[test]
    fn test_column_comparison() {
        let mut comparison = Comparison::new("amount", CompareOperator::Gt, vec![]);
        comparison.b_ref_value = Some("flags".into());
        let stmt = compile(&BoolExpr::Leaf(comparison), Dialect::Postgres)
            .unwrap()
            .unwrap();
        assert_eq!(where_sql(&stmt), "t1.amount > t1.flags");
        assert!(stmt.binds().is_empty());
    }

    #[test]
    fn test_bitand() {
        let stmt = compile(&leaf("flags", CompareOperator::BitAnd, &["4"]), Dialect::Oracle)
            .unwrap()
            .unwrap();
        assert_eq!(where_sql(&stmt), "BITAND(t1.flags, ?) <> 0");
    }

    #[test]
    fn test_spatial_unsupported_on_sqlite() {
        let tree = leaf("region", CompareOperator::SpatialIntersects, &["POINT(1 1)"]);
        assert!(matches!(
            compile(&tree, Dialect::Sqlite),
            Err(CompileError::Unsupported { .. })
        ));
        assert!(compile(&tree, Dialect::Postgres).unwrap().is_some());
    }
}

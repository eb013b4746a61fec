//! Select analysis, run before any SQL of the select is built.
//!
//! Collects every column reference of the select (select list, filter,
//! grouping, having, ordering and VDMs, but not nested sub-selects), resolves
//! them so unknown references fail early, expands an empty select list, and
//! turns each `<Vdm>` into the CASE expression that replaces its column.

use std::collections::HashMap;

use super::context::{QueryContext, ScopeId};
use super::expression::malformed;
use super::{CompileError, CompileResult};
use crate::binding::{BindingError, ResolvedColumn};
use crate::request::{AttributeDef, BoolExpr, CalcDef, SelectDef, VdmDef};
use crate::sql::{lit_null, lit_str, Aggregation, Expr, ExprExt};

/// Where a select-list column comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSource {
    Ref {
        b_ref: String,
        aggr: Option<Aggregation>,
    },
    Calc(CalcDef),
}

/// One select-list entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectColumn {
    pub id: String,
    pub caption: Option<String>,
    pub source: ColumnSource,
    pub attributes: Vec<AttributeDef>,
}

impl SelectColumn {
    fn matches(&self, b_ref: &str, aggr: Option<Aggregation>) -> bool {
        match &self.source {
            ColumnSource::Ref { b_ref: r, aggr: a } => r == b_ref && *a == aggr,
            ColumnSource::Calc(_) => self.id == b_ref,
        }
    }
}

/// The analysis of one select.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub columns: Vec<SelectColumn>,
    pub aggregated: bool,
    /// Grouping column ids with their resolved expressions.
    pub grouping: Vec<(String, Expr)>,
    /// VDM replacement expressions by column id.
    pub vdm: HashMap<String, Expr>,
    /// Referenced columns of this scope by id.
    pub by_id: HashMap<String, ResolvedColumn>,
    /// Referenced columns of this scope by id and requested aggregation.
    pub by_aggregation: HashMap<(String, Aggregation), ResolvedColumn>,
}

impl Analysis {
    /// Result set position of a select-list column.
    ///
    /// Attribute columns take positions too, so this is not the index in
    /// [`Analysis::columns`].
    pub fn position(&self, b_ref: &str, aggr: Option<Aggregation>) -> Option<usize> {
        let mut position = 0;
        for column in &self.columns {
            if column.matches(b_ref, aggr) {
                return Some(position);
            }
            position += 1 + column.attributes.len();
        }
        None
    }

    /// Number of result set columns.
    pub fn width(&self) -> usize {
        self.columns.iter().map(|c| 1 + c.attributes.len()).sum()
    }
}

/// Analyze `select`, whose FROM is bound in `scope`.
pub fn analyze(
    ctx: &QueryContext<'_>,
    scope: ScopeId,
    select: &SelectDef,
) -> CompileResult<Analysis> {
    let mut analysis = Analysis {
        columns: select_list(ctx, scope, select)?,
        aggregated: select.is_aggregated(),
        ..Default::default()
    };

    let calc_ids: Vec<&str> = analysis
        .columns
        .iter()
        .filter(|c| matches!(c.source, ColumnSource::Calc(_)))
        .map(|c| c.id.as_str())
        .collect();

    for (b_ref, aggr) in references(select) {
        if calc_ids.contains(&b_ref.as_str()) {
            continue;
        }
        let (column, owner) = ctx
            .resolve(scope, &b_ref)
            .ok_or_else(|| BindingError::UnknownColumn(b_ref.clone()))?;
        if owner != scope {
            continue;
        }
        analysis.by_aggregation.insert(
            (column.id.clone(), aggr.unwrap_or(Aggregation::None)),
            column.clone(),
        );
        analysis.by_id.insert(column.id.clone(), column);
    }

    if let Some(grouping) = &select.grouping {
        for id in grouping.all_columns() {
            let (column, _) = ctx
                .resolve(scope, &id)
                .ok_or_else(|| BindingError::UnknownColumn(id.clone()))?;
            analysis.grouping.push((id, column.expr));
        }
    }

    for vdm in &select.vdms {
        let (column, _) = ctx
            .resolve(scope, &vdm.b_ref)
            .ok_or_else(|| BindingError::UnknownColumn(vdm.b_ref.clone()))?;
        analysis.vdm.insert(column.id.clone(), vdm_case(&column, vdm)?);
    }

    Ok(analysis)
}

fn select_list(
    ctx: &QueryContext<'_>,
    scope: ScopeId,
    select: &SelectDef,
) -> CompileResult<Vec<SelectColumn>> {
    if select.columns.is_empty() {
        let table = ctx
            .table(scope)
            .ok_or_else(|| malformed("select has neither columns nor a source"))?;
        return Ok(table
            .select_all()?
            .into_iter()
            .map(|c| SelectColumn {
                id: c.id.clone(),
                caption: c.caption.clone(),
                source: ColumnSource::Ref {
                    b_ref: c.id,
                    aggr: None,
                },
                attributes: Vec::new(),
            })
            .collect());
    }

    select
        .columns
        .iter()
        .map(|def| {
            let source = match (&def.calc, &def.b_ref) {
                (Some(calc), _) => ColumnSource::Calc(calc.clone()),
                (None, Some(b_ref)) => ColumnSource::Ref {
                    b_ref: b_ref.clone(),
                    aggr: def.aggr,
                },
                (None, None) => return Err(malformed("column without bRef or Calc")),
            };
            let id = def
                .b_ref
                .clone()
                .ok_or_else(|| malformed("calculated column without bRef"))?;
            Ok(SelectColumn {
                id,
                caption: def.caption.clone(),
                source,
                attributes: def.attributes.clone(),
            })
        })
        .collect()
}

/// Every reference of the select with its requested aggregation.
fn references(select: &SelectDef) -> Vec<(String, Option<Aggregation>)> {
    fn push_calc(calc: &CalcDef, refs: &mut Vec<(String, Option<Aggregation>)>) {
        let mut ids = Vec::new();
        calc.root.collect_refs(&mut ids);
        refs.extend(ids.into_iter().map(|id| (id, None)));
    }

    let mut refs = Vec::new();

    for column in &select.columns {
        match (&column.calc, &column.b_ref) {
            (Some(calc), _) => push_calc(calc, &mut refs),
            (None, Some(b_ref)) => refs.push((b_ref.clone(), column.aggr)),
            (None, None) => {}
        }
        refs.extend(column.attributes.iter().map(|a| (a.b_ref.clone(), None)));
    }
    for tree in [&select.filter, &select.having].into_iter().flatten() {
        for leaf in BoolExpr::leaves(tree) {
            refs.push((leaf.b_ref.clone(), leaf.aggr));
            if let Some(other) = &leaf.b_ref_value {
                refs.push((other.clone(), None));
            }
            if let Some(calc) = &leaf.calc {
                push_calc(calc, &mut refs);
            }
        }
    }
    if let Some(grouping) = &select.grouping {
        refs.extend(grouping.all_columns().into_iter().map(|c| (c, None)));
    }
    for order in &select.ordering {
        if let Some(b_ref) = &order.b_ref {
            refs.push((b_ref.clone(), order.aggr));
        }
    }
    refs.extend(select.vdms.iter().map(|v| (v.b_ref.clone(), None)));
    refs
}

/// `CASE WHEN col IS NULL THEN NULL WHEN col IN ('A', 'B') THEN 'X' ...
/// ELSE <rest | col as text> END`.
///
/// The display values are rendered as escaped literals, never bound.
pub fn vdm_case(column: &ResolvedColumn, vdm: &VdmDef) -> CompileResult<Expr> {
    let text = if column.ty.is_textual() {
        column.expr.clone()
    } else {
        Expr::CastToText {
            expr: Box::new(column.expr.clone()),
            ty: column.ty,
        }
    };

    let mut when_clauses = vec![(column.expr.clone().is_null(), lit_null())];
    for map in &vdm.maps {
        if map.values.is_empty() {
            continue;
        }
        let values = map
            .values
            .iter()
            .map(|v| vdm_literal(v))
            .collect::<CompileResult<Vec<_>>>()?;
        when_clauses.push((text.clone().in_list(values), vdm_literal(&map.to)?));
    }
    let otherwise = match &vdm.rest {
        Some(rest) => vdm_literal(rest)?,
        None => text,
    };
    Ok(Expr::Case {
        operand: None,
        when_clauses,
        else_clause: Some(Box::new(otherwise)),
    })
}

fn vdm_literal(value: &str) -> CompileResult<Expr> {
    if value.chars().any(|c| c.is_control() && c != '\t') {
        return Err(CompileError::Malformed(format!(
            "VDM value {value:?} contains control characters"
        )));
    }
    Ok(lit_str(value))
}

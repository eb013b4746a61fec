//! Selects connected by set operators, plus the trailing ORDER BY.
//!
//! The first select's columns stand for the whole full-select. The trailing
//! ordering addresses output columns by position (`pos`, 1-based) or by id.

use std::sync::Arc;

use super::context::QueryContext;
use super::expression::malformed;
use super::select::{compile_select, CompiledSelect, SelectRole};
use super::{CompileResult, OutputColumn};
use crate::binding::virtual_table::output_name;
use crate::binding::CatalogTable;
use crate::request::{FullSelectDef, OrderDef, SetOperator};
use crate::sql::{
    lit_int, table_col, FromItem, OrderByExpr, Query, SelectExpr, SetOp, SetOpType, SetOperation,
    SqlDialect,
};

fn set_op(op: SetOperator) -> SetOp {
    let (kind, all) = match op {
        SetOperator::Union => (SetOpType::Union, false),
        SetOperator::UnionAll => (SetOpType::Union, true),
        SetOperator::Intersect => (SetOpType::Intersect, false),
        SetOperator::IntersectAll => (SetOpType::Intersect, true),
        SetOperator::Except => (SetOpType::Except, false),
        SetOperator::ExceptAll => (SetOpType::Except, true),
    };
    SetOp { kind, all }
}

/// Zero-based result set index of the column an ordering item addresses.
fn ordered_index(columns: &[OutputColumn], order: &OrderDef) -> CompileResult<usize> {
    let column = match (order.pos, &order.b_ref) {
        (Some(pos), _) => pos.checked_sub(1).and_then(|i| columns.get(i)),
        (None, Some(b_ref)) => columns.iter().find(|c| &c.id == b_ref),
        (None, None) => None,
    };
    column
        .map(|c| c.index)
        .ok_or_else(|| malformed("ordering does not address an output column"))
}

/// Compile a full-select. `top` marks the request's main body, the only
/// place where ordering and loader truncation apply.
pub fn compile_full_select(
    ctx: &mut QueryContext<'_>,
    full: &FullSelectDef,
    top: bool,
) -> CompileResult<CompiledSelect> {
    if full.rest.is_empty() {
        let role = if top {
            SelectRole::Sole
        } else {
            SelectRole::Nested
        };
        if full.ordering.is_empty() || !top {
            return compile_select(ctx, &full.first, role, None);
        }
        // Positions of a single select are resolved by the select itself,
        // ahead of its own ordering.
        let mut select = full.first.clone();
        let mut ordering: Vec<OrderDef> = full
            .ordering
            .iter()
            .map(|o| match o.pos {
                Some(pos) => OrderDef {
                    b_ref: None,
                    pos: Some(pos),
                    aggr: None,
                    dir: o.dir,
                    nulls: o.nulls,
                },
                None => o.clone(),
            })
            .collect();
        ordering.append(&mut select.ordering);
        select.ordering = ordering;
        return compile_select(ctx, &select, role, None);
    }

    let first = compile_select(ctx, &full.first, SelectRole::Member, None)?;
    let mut catalog: Vec<Arc<CatalogTable>> = first.catalog.clone();
    let mut set = SetOperation::new(first.query);
    for (op, select) in &full.rest {
        let member = compile_select(ctx, select, SelectRole::Member, None)?;
        catalog.extend(member.catalog);
        set = set.chain(set_op(*op), member.query);
    }
    let mut query = Query::from_set_op(set);

    if top && !full.ordering.is_empty() {
        let mut indexes = Vec::with_capacity(full.ordering.len());
        for order in &full.ordering {
            indexes.push(ordered_index(&first.columns, order)?);
        }
        let emulated_nulls = !ctx.dialect().supports_nulls_ordering()
            && full.ordering.iter().any(|o| o.nulls.is_some());
        if emulated_nulls {
            // Null placement needs an expression, not a position.
            let alias = ctx.next_alias();
            let width = first.outputs.len();
            let projection: Vec<SelectExpr> = (0..width)
                .map(|i| {
                    SelectExpr::new(table_col(&alias, &output_name(i)))
                        .with_alias(&output_name(i))
                })
                .collect();
            let order = full
                .ordering
                .iter()
                .zip(&indexes)
                .map(|(o, i)| OrderByExpr {
                    expr: table_col(&alias, &output_name(*i)),
                    dir: Some(o.dir),
                    nulls: o.nulls,
                })
                .collect();
            query = Query::new()
                .select(projection)
                .from(FromItem::derived(query, &alias))
                .order_by(order);
        } else {
            let order = full
                .ordering
                .iter()
                .zip(&indexes)
                .map(|(o, i)| OrderByExpr {
                    expr: lit_int(*i as i64 + 1),
                    dir: Some(o.dir),
                    nulls: o.nulls,
                })
                .collect();
            query = query.order_by(order);
        }
    }

    Ok(CompiledSelect {
        query,
        columns: first.columns,
        outputs: first.outputs,
        catalog,
        row_limit: None,
        empty: false,
    })
}

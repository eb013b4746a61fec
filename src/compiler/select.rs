//! One select: FROM binding, clause assembly and row windows.
//!
//! Clause order is SELECT, FROM, WHERE (filter and row-level security),
//! GROUP BY, HAVING, ORDER BY. Select-list items are aliased `v1`, `v2`, ...
//! with attribute columns taking the positions right after their column.
//!
//! Row windows:
//! - the sole select of a request starting at row 1 is truncated by the
//!   loader,
//! - anything else is numbered with `ROW_NUMBER()` over the declared ordering
//!   followed by the key columns, and filtered on that number in an outer
//!   select.

use std::rc::Rc;
use std::sync::Arc;

use super::analyzer::{analyze, Analysis, ColumnSource};
use super::context::{QueryContext, ScopeId};
use super::expression::{malformed, ExprCompiler};
use super::group_by::emulation_levels;
use super::{CompileResult, OutputAttribute, OutputColumn};
use crate::binding::virtual_table::output_name;
use crate::binding::{
    BindingError, CatalogTable, DerivedTable, JoinTable, LogicalTable, ResolvedColumn,
};
use crate::request::rewrite::{expand_top_n, oversized_cube, GroupingLevel, MAX_CUBE_COLUMNS};
use crate::request::{FromDef, SelectDef};
use crate::sql::{
    and_all, param, row_number, table_col, Aggregation, Expr, ExprExt, FromItem, JdbcType,
    NullsOrder, OrderByExpr, Query, SelectExpr, SetOp, SetOperation, SortDir, WindowExt,
    WindowOrderBy,
};

/// Column of the row number added for row windows.
pub const ROW_NUMBER_COLUMN: &str = "rnum";

/// Where a select sits in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectRole {
    /// The only select of the request: ordered, may be truncated by the
    /// loader.
    Sole,
    /// Operand of a set operation.
    Member,
    /// FROM source, filter sub-select or CTE body.
    Nested,
}

/// A compiled select.
#[derive(Debug, Clone)]
pub struct CompiledSelect {
    pub query: Query,
    /// Response metadata, one entry per select-list column.
    pub columns: Vec<OutputColumn>,
    /// Every result set column in position order, for derived tables.
    pub outputs: Vec<ResolvedColumn>,
    pub catalog: Vec<Arc<CatalogTable>>,
    /// Rows the loader stops after.
    pub row_limit: Option<u64>,
    /// The row window is empty; there is nothing to execute.
    pub empty: bool,
}

/// One ordering item, both as an expression and as an output position.
#[derive(Debug, Clone)]
struct OrderItem {
    expr: Expr,
    position: Option<usize>,
    dir: SortDir,
    nulls: Option<NullsOrder>,
}

/// A select before ordering and row windows are applied.
struct Body {
    query: Query,
    columns: Vec<OutputColumn>,
    outputs: Vec<ResolvedColumn>,
    ordering: Vec<OrderItem>,
    /// Row identity for numbering; `None` when the source declares no keys.
    keys: Option<Vec<Expr>>,
    source: String,
    /// Rows are only addressable by output position.
    positional: bool,
    /// Aggregated without grouping: at most one row.
    single_row: bool,
}

/// Compile a select. `parent` is the scope correlated references resolve in.
pub fn compile_select(
    ctx: &mut QueryContext<'_>,
    select: &SelectDef,
    role: SelectRole,
    parent: Option<ScopeId>,
) -> CompileResult<CompiledSelect> {
    let mut select = select.clone();
    expand_top_n(&mut select);
    if let Some(n) = select.grouping.as_ref().and_then(oversized_cube) {
        return Err(malformed(&format!(
            "cube over more than {MAX_CUBE_COLUMNS} columns ({n})"
        )));
    }

    let table = select
        .from
        .as_ref()
        .map(|from| bind_from(ctx, from, parent))
        .transpose()?;
    let scope = ctx.push_scope(table.clone(), parent);
    let analysis = analyze(ctx, scope, &select)?;

    let levels = select
        .grouping
        .as_ref()
        .and_then(|g| emulation_levels(g, ctx.dialect()));
    let mut body = match &levels {
        None => compile_body(ctx, scope, &select, &analysis, None)?,
        Some(levels) => {
            let mut bodies = Vec::with_capacity(levels.len());
            for level in levels {
                bodies.push(compile_body(ctx, scope, &select, &analysis, Some(level))?);
            }
            let mut bodies = bodies.into_iter();
            let first = bodies
                .next()
                .ok_or_else(|| malformed("grouping without grouping sets"))?;
            let set = bodies.fold(SetOperation::new(first.query), |set, b| {
                set.chain(SetOp::union_all(), b.query)
            });
            Body {
                query: Query::from_set_op(set),
                positional: true,
                ..first
            }
        }
    };
    body.positional |= select.distinct;

    let catalog = table
        .as_ref()
        .map(|t| t.catalog_tables())
        .unwrap_or_default();
    ctx.record_tables(catalog.iter().cloned());

    let first_row = select.first_row();
    let invalid = select
        .row_end
        .is_some_and(|end| end == 0 || end < first_row)
        || (body.single_row && first_row > 1);
    let mut row_limit = None;
    let columns = std::mem::take(&mut body.columns);
    let outputs = body.outputs.clone();

    let query = if invalid {
        if role != SelectRole::Sole {
            nothing(ctx, body.query, outputs.len())
        } else {
            body.query
        }
    } else if !select.has_row_window() {
        match role {
            SelectRole::Sole => ordered(ctx, body)?,
            _ => body.query,
        }
    } else if role == SelectRole::Sole && first_row == 1 {
        row_limit = select.row_end;
        ordered(ctx, body)?
    } else if body.single_row {
        // The window starts at row 1 and holds the only row.
        body.query
    } else {
        paginate(ctx, body, first_row, select.row_end, role)?
    };

    Ok(CompiledSelect {
        query,
        columns,
        outputs,
        catalog,
        row_limit,
        empty: invalid && role == SelectRole::Sole,
    })
}

// =============================================================================
// FROM
// =============================================================================

fn bind_from(
    ctx: &mut QueryContext<'_>,
    from: &FromDef,
    parent: Option<ScopeId>,
) -> CompileResult<Rc<dyn LogicalTable>> {
    match from {
        FromDef::BindingSet { name, alias } => {
            let qualifier = alias.as_deref().unwrap_or(name);
            if let Some(cte) = ctx.cte(name).cloned() {
                let sql_alias = ctx.next_alias();
                return Ok(Rc::new(DerivedTable::cte(
                    qualifier,
                    &cte.rendered,
                    &sql_alias,
                    cte.outputs,
                    cte.catalog,
                )));
            }
            let table = ctx
                .catalog()
                .get(name)
                .ok_or_else(|| BindingError::UnknownTable(name.clone()))?;
            Ok(Rc::new(ctx.occurrence(table, qualifier)?))
        }
        FromDef::SubSelect(sub) => {
            let compiled = compile_select(ctx, sub, SelectRole::Nested, None)?;
            let alias = ctx.next_alias();
            let name = sub.alias.clone().unwrap_or_else(|| alias.clone());
            Ok(Rc::new(DerivedTable::subselect(
                &name,
                &alias,
                compiled.query,
                compiled.outputs,
                compiled.catalog,
            )))
        }
        FromDef::Join {
            join_type,
            left,
            right,
            on,
        } => {
            let left = bind_from(ctx, left, parent)?;
            let right = bind_from(ctx, right, parent)?;
            let join = Rc::new(JoinTable::new(left, *join_type, right));
            if let Some(on) = on {
                let visible: Rc<dyn LogicalTable> = join.clone();
                let scope = ctx.push_scope(Some(visible), parent);
                let condition = ExprCompiler::new(ctx, scope).condition(on)?;
                join.set_on(condition);
            }
            Ok(join)
        }
    }
}

// =============================================================================
// Clauses
// =============================================================================

/// Result set position of the `n`-th (1-based) select-list column.
fn column_position(analysis: &Analysis, n: usize) -> Option<usize> {
    let index = n.checked_sub(1)?;
    if index >= analysis.columns.len() {
        return None;
    }
    Some(
        analysis.columns[..index]
            .iter()
            .map(|c| 1 + c.attributes.len())
            .sum(),
    )
}

fn compile_body(
    ctx: &mut QueryContext<'_>,
    scope: ScopeId,
    select: &SelectDef,
    analysis: &Analysis,
    level: Option<&GroupingLevel>,
) -> CompileResult<Body> {
    let table = ctx.table(scope);

    let mut restrictions = Vec::new();
    if let Some(filter) = &select.filter {
        let mut compiler = ExprCompiler::new(ctx, scope).with_analysis(analysis);
        compiler.aggregated = false;
        restrictions.extend(compiler.condition(filter)?);
    }
    restrictions.extend(table.as_ref().and_then(|t| t.rls_predicate()));

    let mut compiler = ExprCompiler::new(ctx, scope).with_analysis(analysis);
    if let Some(level) = level {
        compiler = compiler.at_level(level)?;
    }
    let grouped = |expr: &Expr| analysis.grouping.iter().any(|(_, e)| e == expr);

    let mut items: Vec<SelectExpr> = Vec::with_capacity(analysis.width());
    let mut columns = Vec::with_capacity(analysis.columns.len());
    let mut outputs = Vec::with_capacity(analysis.width());
    for column in &analysis.columns {
        let index = items.len();
        let ((expr, ty), output) = match &column.source {
            ColumnSource::Ref { b_ref, aggr } => {
                let typed = compiler.column(b_ref, *aggr, false)?;
                let (resolved, _) = compiler.resolve(b_ref)?;
                let key = if analysis.aggregated {
                    grouped(&resolved.expr)
                } else {
                    resolved.key
                };
                let output = ResolvedColumn {
                    ty: typed.1,
                    aggr: None,
                    caption: column.caption.clone().or(resolved.caption.clone()),
                    key,
                    ..resolved
                };
                (typed, output)
            }
            ColumnSource::Calc(calc) => {
                let typed = compiler.calc(calc)?;
                compiler.register_calc(&column.id, typed.clone());
                let output = ResolvedColumn {
                    id: column.id.clone(),
                    expr: typed.0.clone(),
                    ty: typed.1,
                    scale: calc.scale,
                    aggr: None,
                    caption: column.caption.clone(),
                    key: false,
                    escape_xml: true,
                    parent: None,
                };
                (typed, output)
            }
        };
        items.push(SelectExpr::new(expr).with_alias(&output_name(index)));

        let mut attributes = Vec::with_capacity(column.attributes.len());
        for attribute in &column.attributes {
            let (expr, ty) = compiler.column(&attribute.b_ref, None, false)?;
            let (resolved, _) = compiler.resolve(&attribute.b_ref)?;
            attributes.push(OutputAttribute {
                name: attribute.name.clone(),
                id: attribute.b_ref.clone(),
                ty,
                index: index + 1 + attributes.len(),
            });
            items.push(SelectExpr::new(expr).with_alias(&output_name(items.len())));
            outputs.push(ResolvedColumn {
                ty,
                aggr: None,
                key: false,
                parent: Some(output.id.clone()),
                ..resolved
            });
        }

        columns.push(OutputColumn {
            id: column.id.clone(),
            caption: output.caption.clone(),
            ty,
            scale: output.scale,
            escape_xml: output.escape_xml,
            index,
            attributes,
        });
        outputs.insert(index, output);
    }

    let group_by = match &select.grouping {
        Some(grouping) => compiler.group_by(grouping, level)?,
        None => Vec::new(),
    };
    let having = match &select.having {
        Some(having) => compiler.condition(having)?,
        None => None,
    };

    let mut ordering = Vec::with_capacity(select.ordering.len());
    for order in &select.ordering {
        let (expr, position) = match (&order.b_ref, order.pos) {
            (Some(b_ref), _) => (
                compiler.order_ref(b_ref, order.aggr)?.0,
                analysis.position(b_ref, order.aggr),
            ),
            (None, Some(pos)) => {
                let position = column_position(analysis, pos)
                    .ok_or_else(|| malformed(&format!("ordering position {pos} out of range")))?;
                (items[position].expr.clone(), Some(position))
            }
            (None, None) => return Err(malformed("ordering without bRef or pos")),
        };
        ordering.push(OrderItem {
            expr,
            position,
            dir: order.dir,
            nulls: order.nulls,
        });
    }

    let keys = if !analysis.grouping.is_empty() {
        let mut keys = Vec::with_capacity(analysis.grouping.len());
        for (id, _) in &analysis.grouping {
            keys.push(compiler.column(id, Some(Aggregation::None), false)?.0);
        }
        Some(keys)
    } else if analysis.aggregated {
        None
    } else {
        let keys: Vec<Expr> = table
            .as_ref()
            .map(|t| t.key_columns().into_iter().map(|c| c.expr).collect())
            .unwrap_or_default();
        (!keys.is_empty()).then_some(keys)
    };

    // Relations are joined in once their columns are referenced, so FROM is
    // rendered last.
    let mut query = Query::new().select(items).group_by(group_by);
    if select.distinct {
        query = query.distinct();
    }
    if let Some(table) = &table {
        query = query.from(table.from_item());
    }
    if let Some(restriction) = and_all(restrictions) {
        query = query.filter(restriction);
    }
    if let Some(having) = having {
        query = query.having(having);
    }

    Ok(Body {
        query,
        columns,
        outputs,
        ordering,
        keys,
        source: table.map(|t| t.name().to_string()).unwrap_or_default(),
        positional: false,
        single_row: analysis.aggregated && analysis.grouping.is_empty(),
    })
}

// =============================================================================
// Ordering and row windows
// =============================================================================

/// `SELECT alias.v1 AS v1, ... FROM (query) alias`
fn wrap(query: Query, alias: &str, width: usize) -> Query {
    let projection: Vec<SelectExpr> = (0..width)
        .map(|i| SelectExpr::new(table_col(alias, &output_name(i))).with_alias(&output_name(i)))
        .collect();
    Query::new()
        .select(projection)
        .from(FromItem::derived(query, alias))
}

/// A query returning no rows with the same columns.
fn nothing(ctx: &mut QueryContext<'_>, query: Query, width: usize) -> Query {
    if query.set_op.is_none() {
        return query.filter(Expr::Truth(false));
    }
    let alias = ctx.next_alias();
    wrap(query, &alias, width).filter(Expr::Truth(false))
}

fn positional_expr(item: &OrderItem, alias: &str) -> CompileResult<Expr> {
    item.position
        .map(|p| table_col(alias, &output_name(p)))
        .ok_or_else(|| malformed("ordering on a column outside the select list"))
}

/// Apply the declared ordering of a sole select.
fn ordered(ctx: &mut QueryContext<'_>, body: Body) -> CompileResult<Query> {
    if body.ordering.is_empty() {
        return Ok(body.query);
    }
    if !body.positional {
        let order = body
            .ordering
            .into_iter()
            .map(|o| OrderByExpr {
                expr: o.expr,
                dir: Some(o.dir),
                nulls: o.nulls,
            })
            .collect();
        return Ok(body.query.order_by(order));
    }
    let alias = ctx.next_alias();
    let order = body
        .ordering
        .iter()
        .map(|o| {
            Ok(OrderByExpr {
                expr: positional_expr(o, &alias)?,
                dir: Some(o.dir),
                nulls: o.nulls,
            })
        })
        .collect::<CompileResult<Vec<_>>>()?;
    Ok(wrap(body.query, &alias, body.outputs.len()).order_by(order))
}

/// Number the rows and keep `first..=last`.
fn paginate(
    ctx: &mut QueryContext<'_>,
    body: Body,
    first: u64,
    last: Option<u64>,
    role: SelectRole,
) -> CompileResult<Query> {
    let width = body.outputs.len();
    let numbered = if body.positional {
        let alias = ctx.next_alias();
        let mut order = Vec::with_capacity(body.ordering.len() + width);
        for item in &body.ordering {
            order.push(WindowOrderBy {
                expr: positional_expr(item, &alias)?,
                dir: Some(item.dir),
                nulls: item.nulls,
            });
        }
        for i in 0..width {
            let expr = table_col(&alias, &output_name(i));
            if !order.iter().any(|o| o.expr == expr) {
                order.push(WindowOrderBy::asc(expr));
            }
        }
        let mut query = wrap(body.query, &alias, width);
        query.select.push(
            SelectExpr::new(row_number().over().order_by(order).build())
                .with_alias(ROW_NUMBER_COLUMN),
        );
        query
    } else {
        let keys = body
            .keys
            .ok_or_else(|| BindingError::MissingKeys(body.source.clone()))?;
        let mut order: Vec<WindowOrderBy> = body
            .ordering
            .into_iter()
            .map(|o| WindowOrderBy {
                expr: o.expr,
                dir: Some(o.dir),
                nulls: o.nulls,
            })
            .collect();
        for key in keys {
            if !order.iter().any(|o| o.expr == key) {
                order.push(WindowOrderBy::asc(key));
            }
        }
        let mut query = body.query;
        query.select.push(
            SelectExpr::new(row_number().over().order_by(order).build())
                .with_alias(ROW_NUMBER_COLUMN),
        );
        query
    };

    let alias = ctx.next_alias();
    let rnum = table_col(&alias, ROW_NUMBER_COLUMN);
    let bounds = match last {
        Some(last) => Expr::Between {
            expr: Box::new(rnum.clone()),
            low: Box::new(param(first.to_string(), JdbcType::BigInt)),
            high: Box::new(param(last.to_string(), JdbcType::BigInt)),
            negated: false,
        },
        None => rnum.clone().gte(param(first.to_string(), JdbcType::BigInt)),
    };
    let mut query = wrap(numbered, &alias, width).filter(bounds);
    if role == SelectRole::Sole {
        query = query.order_by(vec![OrderByExpr::new(rnum)]);
    }
    Ok(query)
}

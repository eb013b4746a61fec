//! Column references and calculations.
//!
//! [`ExprCompiler`] compiles against one scope. It knows whether the select
//! aggregates, which columns are grouping columns and, under grouping-sets
//! emulation, which grouping columns are rolled up at the current level.
//!
//! Aggregation rules for a column reference:
//! - an explicit `aggr` on the reference wins (`none` suppresses it),
//! - inside an inner aggregate nothing is aggregated again,
//! - in an aggregated select a non-grouping column gets its default
//!   aggregation,
//! - references resolved in an enclosing scope are left alone.
//!
//! Analytic functions do not count as inner aggregates.

use std::collections::HashMap;

use super::analyzer::Analysis;
use super::context::{QueryContext, ScopeId};
use super::{CompileError, CompileResult};
use crate::binding::{BindingError, ResolvedColumn};
use crate::request::rewrite::GroupingLevel;
use crate::request::{ArithOp, CalcDef, CalcNode, CompareOp, WindowFn};
use crate::sql::{
    count_distinct, func, lit_int, nullif_zero, param, star, Aggregation, BinaryOperator, Expr,
    JdbcType, UnaryOperator, WindowOrderBy,
};

/// An expression with its result type.
pub type Typed = (Expr, JdbcType);

/// A precision/scale cast waiting for the first operand of an arithmetic
/// chain.
#[derive(Debug, Clone, Copy)]
struct PendingCast {
    ty: JdbcType,
    scale: Option<u32>,
}

/// Compiles expressions in one scope.
pub struct ExprCompiler<'c, 'a> {
    pub(crate) ctx: &'c mut QueryContext<'a>,
    pub(crate) scope: ScopeId,
    /// Non-grouping columns get their default aggregation.
    pub(crate) aggregated: bool,
    grouping: Vec<Expr>,
    /// Grouping columns rolled up at the emulated level being compiled.
    absent: Vec<Expr>,
    emulating: bool,
    vdm: HashMap<String, Expr>,
    /// Calculated select-list columns, referable from ordering and HAVING.
    calcs: HashMap<String, Typed>,
}

impl<'c, 'a> ExprCompiler<'c, 'a> {
    pub fn new(ctx: &'c mut QueryContext<'a>, scope: ScopeId) -> Self {
        Self {
            ctx,
            scope,
            aggregated: false,
            grouping: Vec::new(),
            absent: Vec::new(),
            emulating: false,
            vdm: HashMap::new(),
            calcs: HashMap::new(),
        }
    }

    /// Take aggregation mode, grouping columns and VDM mappings from the
    /// select's analysis.
    pub fn with_analysis(mut self, analysis: &Analysis) -> Self {
        self.aggregated = analysis.aggregated;
        self.grouping = analysis.grouping.iter().map(|(_, e)| e.clone()).collect();
        self.vdm = analysis.vdm.clone();
        self
    }

    /// Compile for one level of an emulated grouping-sets select.
    pub fn at_level(mut self, level: &GroupingLevel) -> CompileResult<Self> {
        self.emulating = true;
        self.absent = level
            .absent
            .iter()
            .map(|id| self.resolve(id).map(|(c, _)| c.expr))
            .collect::<CompileResult<_>>()?;
        Ok(self)
    }

    pub fn dialect(&self) -> crate::sql::Dialect {
        self.ctx.dialect()
    }

    /// Resolve a reference; the flag tells whether it belongs to this scope.
    pub fn resolve(&self, b_ref: &str) -> CompileResult<(ResolvedColumn, bool)> {
        self.ctx
            .resolve(self.scope, b_ref)
            .map(|(column, owner)| (column, owner == self.scope))
            .ok_or_else(|| BindingError::UnknownColumn(b_ref.to_string()).into())
    }

    pub(crate) fn register_calc(&mut self, id: &str, typed: Typed) {
        self.calcs.insert(id.to_string(), typed);
    }

    // =========================================================================
    // Column references
    // =========================================================================

    /// Compile a column reference.
    pub fn column(
        &mut self,
        b_ref: &str,
        aggr: Option<Aggregation>,
        inside_aggregate: bool,
    ) -> CompileResult<Typed> {
        let (column, local) = self.resolve(b_ref)?;
        if !local {
            return Ok((column.expr, column.ty));
        }
        let absent = self.absent.contains(&column.expr);
        let (base, ty) = if absent {
            (Expr::TypedNull(column.ty), column.ty)
        } else if let Some(mapped) = self.vdm.get(&column.id) {
            (mapped.clone(), JdbcType::Varchar)
        } else {
            (column.expr.clone(), column.ty)
        };
        let aggregation = match aggr {
            Some(a) => a,
            None if inside_aggregate || !self.aggregated => Aggregation::None,
            None if self.grouping.contains(&column.expr) => Aggregation::None,
            None => column.default_aggregation(),
        };
        Ok(self.aggregate(aggregation, base, ty))
    }

    /// A reference from ordering or HAVING: a calculated select-list column
    /// by its id, else a column.
    pub fn order_ref(&mut self, b_ref: &str, aggr: Option<Aggregation>) -> CompileResult<Typed> {
        if let Some(calc) = self.calcs.get(b_ref) {
            return Ok(calc.clone());
        }
        self.column(b_ref, aggr, false)
    }

    fn aggregate(&self, aggregation: Aggregation, expr: Expr, ty: JdbcType) -> Typed {
        let result = aggregation.result_type(ty);
        let expr = match aggregation {
            Aggregation::None => return (expr, ty),
            // A rolled-up column is selected as a typed NULL.
            Aggregation::Grouping if self.emulating => {
                lit_int(i64::from(matches!(expr, Expr::TypedNull(_))))
            }
            Aggregation::CountDistinct => count_distinct(expr),
            a => match a.function_name() {
                Some(name) => func(name, vec![expr]),
                None => expr,
            },
        };
        (expr, result)
    }

    // =========================================================================
    // Calculations
    // =========================================================================

    /// Compile a `<Calc>`; the declared type wins over the inferred one.
    pub fn calc(&mut self, calc: &CalcDef) -> CompileResult<Typed> {
        let pending = match calc.ty {
            Some(ty) if ty.is_numeric() && !ty.is_integer() => Some(PendingCast {
                ty,
                scale: calc.scale,
            }),
            Some(_) => None,
            None => calc.scale.map(|scale| PendingCast {
                ty: JdbcType::Decimal,
                scale: Some(scale),
            }),
        };
        let pending = pending.filter(|_| matches!(calc.root, CalcNode::Arith { .. }));
        let (expr, ty) = self.node(&calc.root, pending, false)?;
        Ok((expr, calc.ty.unwrap_or(ty)))
    }

    fn node(
        &mut self,
        node: &CalcNode,
        pending: Option<PendingCast>,
        inside_aggregate: bool,
    ) -> CompileResult<Typed> {
        match node {
            CalcNode::Value { value, ty } => {
                let ty = ty.unwrap_or_else(|| literal_type(value));
                let bound = param(value.clone(), ty);
                Ok(match pending {
                    Some(cast) => (
                        Expr::Cast {
                            expr: Box::new(bound),
                            ty: cast.ty,
                            scale: cast.scale,
                        },
                        cast.ty,
                    ),
                    None => (bound, ty),
                })
            }
            CalcNode::ValueRef { id_ref, aggr } => self.column(id_ref, *aggr, inside_aggregate),
            CalcNode::Arith { op, args } => self.arith(*op, args, pending, inside_aggregate),
            CalcNode::Concat(args) => {
                let parts = self.nodes(args, inside_aggregate)?;
                let expr = fold(parts.into_iter().map(|(e, _)| e), BinaryOperator::Concat)
                    .ok_or_else(|| malformed("Concat without operands"))?;
                Ok((Expr::Paren(Box::new(expr)), JdbcType::Varchar))
            }
            CalcNode::Compare { op, left, right } => {
                let (left, _) = self.node(left, None, inside_aggregate)?;
                let (right, _) = self.node(right, None, inside_aggregate)?;
                let expr = Expr::BinaryOp {
                    left: Box::new(left),
                    op: compare_operator(*op),
                    right: Box::new(right),
                };
                Ok((expr, JdbcType::Boolean))
            }
            CalcNode::CaseWhen {
                branches,
                otherwise,
            } => {
                let mut when_clauses = Vec::with_capacity(branches.len());
                let mut ty = None;
                for (condition, value) in branches {
                    let (condition, _) = self.node(condition, None, inside_aggregate)?;
                    let (value, value_ty) = self.node(value, None, inside_aggregate)?;
                    ty.get_or_insert(value_ty);
                    when_clauses.push((condition, value));
                }
                let else_clause = match otherwise {
                    Some(o) => {
                        let (value, value_ty) = self.node(o, None, inside_aggregate)?;
                        ty.get_or_insert(value_ty);
                        Some(Box::new(value))
                    }
                    None => None,
                };
                if when_clauses.is_empty() {
                    return Err(malformed("CaseWhen without When"));
                }
                let expr = Expr::Case {
                    operand: None,
                    when_clauses,
                    else_clause,
                };
                Ok((expr, ty.unwrap_or_default()))
            }
            CalcNode::Coalesce(args) => {
                let parts = self.nodes(args, inside_aggregate)?;
                let ty = parts.first().map(|(_, t)| *t).unwrap_or_default();
                let args = parts.into_iter().map(|(e, _)| e).collect();
                Ok((func("COALESCE", args), ty))
            }
            CalcNode::Cast { node, ty, scale } => {
                let (expr, _) = self.node(node, None, inside_aggregate)?;
                let expr = Expr::Cast {
                    expr: Box::new(expr),
                    ty: *ty,
                    scale: *scale,
                };
                Ok((expr, *ty))
            }
            CalcNode::Aggregate { func, arg } => {
                let (expr, ty) = self.node(arg, None, true)?;
                Ok(self.aggregate(*func, expr, ty))
            }
            CalcNode::Over {
                func: window,
                args,
                partition_by,
                order_by,
            } => self.window(*window, args, partition_by, order_by, inside_aggregate),
        }
    }

    fn nodes(&mut self, nodes: &[CalcNode], inside_aggregate: bool) -> CompileResult<Vec<Typed>> {
        nodes
            .iter()
            .map(|n| self.node(n, None, inside_aggregate))
            .collect()
    }

    /// An arithmetic chain. Only its first operand sees the pending cast;
    /// divisors are guarded against zero.
    fn arith(
        &mut self,
        op: ArithOp,
        args: &[CalcNode],
        pending: Option<PendingCast>,
        inside_aggregate: bool,
    ) -> CompileResult<Typed> {
        let mut parts = Vec::with_capacity(args.len());
        let mut types = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let cast = if i == 0 { pending } else { None };
            let (expr, ty) = self.node(arg, cast, inside_aggregate)?;
            parts.push(if op == ArithOp::Div && i > 0 {
                nullif_zero(expr)
            } else {
                expr
            });
            types.push(ty);
        }

        let ty = match pending {
            Some(cast) => cast.ty,
            None => arith_type(op, &types),
        };
        if parts.len() == 1 {
            let operand = parts.remove(0);
            let expr = if op == ArithOp::Sub {
                Expr::UnaryOp {
                    op: UnaryOperator::Minus,
                    expr: Box::new(operand),
                }
            } else {
                operand
            };
            return Ok((expr, ty));
        }
        let expr = fold(parts, arith_operator(op))
            .ok_or_else(|| malformed("arithmetic without operands"))?;
        Ok((Expr::Paren(Box::new(expr)), ty))
    }

    fn window(
        &mut self,
        window: WindowFn,
        args: &[CalcNode],
        partition_by: &[CalcNode],
        order_by: &[(CalcNode, crate::sql::SortDir)],
        inside_aggregate: bool,
    ) -> CompileResult<Typed> {
        let args = self.nodes(args, inside_aggregate)?;
        let arg_ty = args.first().map(|(_, t)| *t);
        let mut arg_exprs: Vec<Expr> = args.into_iter().map(|(e, _)| e).collect();
        if window == WindowFn::Count && arg_exprs.is_empty() {
            arg_exprs.push(star());
        }

        let partition_by = self
            .nodes(partition_by, inside_aggregate)?
            .into_iter()
            .map(|(e, _)| e)
            .collect();
        let mut order = Vec::with_capacity(order_by.len());
        for (node, dir) in order_by {
            let (expr, _) = self.node(node, None, inside_aggregate)?;
            order.push(WindowOrderBy {
                expr,
                dir: Some(*dir),
                nulls: None,
            });
        }

        let ty = match window {
            WindowFn::Rank | WindowFn::DenseRank | WindowFn::RowNumber | WindowFn::Count => {
                JdbcType::BigInt
            }
            WindowFn::Avg => JdbcType::Double,
            _ => arg_ty.unwrap_or(JdbcType::Decimal),
        };
        let expr = Expr::WindowFunction {
            function: Box::new(func(window.function_name(), arg_exprs)),
            partition_by,
            order_by: order,
        };
        Ok((expr, ty))
    }
}

pub(crate) fn malformed(message: &str) -> CompileError {
    CompileError::Malformed(message.to_string())
}

fn fold(parts: impl IntoIterator<Item = Expr>, op: BinaryOperator) -> Option<Expr> {
    parts.into_iter().reduce(|left, right| Expr::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    })
}

fn arith_operator(op: ArithOp) -> BinaryOperator {
    match op {
        ArithOp::Add => BinaryOperator::Plus,
        ArithOp::Sub => BinaryOperator::Minus,
        ArithOp::Mul => BinaryOperator::Mul,
        ArithOp::Div => BinaryOperator::Div,
    }
}

fn compare_operator(op: CompareOp) -> BinaryOperator {
    match op {
        CompareOp::Eq => BinaryOperator::Eq,
        CompareOp::Ne => BinaryOperator::Ne,
        CompareOp::Lt => BinaryOperator::Lt,
        CompareOp::Le => BinaryOperator::Lte,
        CompareOp::Gt => BinaryOperator::Gt,
        CompareOp::Ge => BinaryOperator::Gte,
    }
}

fn arith_type(op: ArithOp, operands: &[JdbcType]) -> JdbcType {
    if operands
        .iter()
        .any(|t| matches!(t, JdbcType::Double | JdbcType::Float | JdbcType::Real))
    {
        JdbcType::Double
    } else if op != ArithOp::Div && operands.iter().all(JdbcType::is_integer) {
        JdbcType::BigInt
    } else {
        JdbcType::Decimal
    }
}

/// Type of an untyped calculation literal.
fn literal_type(value: &str) -> JdbcType {
    if value.parse::<i64>().is_ok() {
        JdbcType::BigInt
    } else if value.parse::<f64>().is_ok_and(|f| f.is_finite()) {
        JdbcType::Decimal
    } else {
        JdbcType::Varchar
    }
}

//! Parsed Wrq request model.
//!
//! The request is a closed grammar: every operator, connective, aggregation
//! and join type is a whitelisted enum variant, so nothing from the document
//! reaches SQL text except through bound parameters (and the escaped VDM
//! display literals).

pub mod parser;
pub mod rewrite;

use thiserror::Error;

use crate::sql::{Aggregation, JdbcType, JoinType, NullsOrder, SortDir};

pub use parser::parse_request;

/// Errors raised while reading a request document.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The document is not well-formed XML.
    #[error("request is not well-formed XML: {0}")]
    Xml(String),

    /// Well-formed, but uses vocabulary outside the grammar.
    #[error("invalid request at <{element}>: {message}")]
    Invalid { element: String, message: String },
}

impl RequestError {
    pub(crate) fn invalid(element: &str, message: impl Into<String>) -> Self {
        RequestError::Invalid {
            element: element.to_string(),
            message: message.into(),
        }
    }
}

pub type RequestResult<T> = Result<T, RequestError>;

/// A whole request: CTEs plus the main full-select.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WrqRequest {
    pub ctes: Vec<CteDef>,
    /// `None` when the document has no select at all.
    pub body: Option<FullSelectDef>,
}

impl WrqRequest {
    /// The single top-level select, if the body is not a set operation.
    pub fn sole_select(&self) -> Option<&SelectDef> {
        self.body
            .as_ref()
            .filter(|b| b.rest.is_empty())
            .map(|b| &b.first)
    }
}

/// A named common table expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CteDef {
    pub name: String,
    pub body: FullSelectDef,
}

/// Set operators connecting selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    UnionAll,
    Intersect,
    IntersectAll,
    Except,
    ExceptAll,
}

impl SetOperator {
    pub fn from_element(name: &str) -> Option<Self> {
        let op = match name {
            "Union" => SetOperator::Union,
            "UnionAll" => SetOperator::UnionAll,
            "Intersect" => SetOperator::Intersect,
            "IntersectAll" => SetOperator::IntersectAll,
            "Except" => SetOperator::Except,
            "ExceptAll" => SetOperator::ExceptAll,
            _ => return None,
        };
        Some(op)
    }
}

/// Selects connected by set operators plus an ordering on output positions.
#[derive(Debug, Clone, PartialEq)]
pub struct FullSelectDef {
    pub first: SelectDef,
    pub rest: Vec<(SetOperator, SelectDef)>,
    pub ordering: Vec<OrderDef>,
}

impl FullSelectDef {
    pub fn single(select: SelectDef) -> Self {
        Self {
            first: select,
            rest: Vec::new(),
            ordering: Vec::new(),
        }
    }

    pub fn selects(&self) -> impl Iterator<Item = &SelectDef> {
        std::iter::once(&self.first).chain(self.rest.iter().map(|(_, s)| s))
    }
}

/// One select.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectDef {
    /// Alias when the select is nested in a `From`.
    pub alias: Option<String>,
    /// First row, 1-based inclusive.
    pub row_start: Option<u64>,
    /// Last row, inclusive.
    pub row_end: Option<u64>,
    pub distinct: bool,
    pub columns: Vec<ColumnDef>,
    pub from: Option<FromDef>,
    pub filter: Option<BoolExpr>,
    pub grouping: Option<GroupingDef>,
    pub having: Option<BoolExpr>,
    pub ordering: Vec<OrderDef>,
    pub top_n: Vec<TopNDef>,
    pub vdms: Vec<VdmDef>,
}

impl SelectDef {
    /// Whether a row window other than "everything" is requested.
    pub fn has_row_window(&self) -> bool {
        self.row_start.is_some_and(|s| s > 1) || self.row_end.is_some()
    }

    /// First row of the window, 1 when not given.
    pub fn first_row(&self) -> u64 {
        self.row_start.unwrap_or(1).max(1)
    }

    /// Whether the select aggregates: it groups, or some column or ordering
    /// asks for an aggregation.
    pub fn is_aggregated(&self) -> bool {
        self.grouping.is_some()
            || self.having.is_some()
            || self.columns.iter().any(ColumnDef::is_aggregate)
            || self
                .ordering
                .iter()
                .any(|o| o.aggr.is_some_and(|a| a != Aggregation::None))
    }
}

/// A select-list column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnDef {
    /// Logical column id; for a calculated column the id it is exposed as.
    pub b_ref: Option<String>,
    pub aggr: Option<Aggregation>,
    pub caption: Option<String>,
    pub calc: Option<CalcDef>,
    /// Attribute columns nested in this one.
    pub attributes: Vec<AttributeDef>,
}

impl ColumnDef {
    pub fn reference(b_ref: &str) -> Self {
        Self {
            b_ref: Some(b_ref.to_string()),
            ..Default::default()
        }
    }

    pub fn is_aggregate(&self) -> bool {
        self.aggr.is_some_and(|a| a != Aggregation::None)
            || self.calc.as_ref().is_some_and(|c| c.root.has_aggregate())
    }
}

/// `<A name bRef>` attribute column.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDef {
    pub name: String,
    pub b_ref: String,
}

/// A `<Calc>` expression with its declared output type.
#[derive(Debug, Clone, PartialEq)]
pub struct CalcDef {
    pub ty: Option<JdbcType>,
    pub scale: Option<u32>,
    pub root: CalcNode,
}

/// Arithmetic operators in calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Comparison operators in calculations (CASE conditions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Window functions allowed in `<Over fn>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFn {
    Rank,
    DenseRank,
    RowNumber,
    Sum,
    Min,
    Max,
    Avg,
    Count,
    Lag,
    Lead,
}

impl WindowFn {
    pub fn parse(s: &str) -> Option<Self> {
        let f = match s.trim().to_ascii_lowercase().as_str() {
            "rank" => WindowFn::Rank,
            "denserank" | "dense_rank" => WindowFn::DenseRank,
            "rownumber" | "row_number" => WindowFn::RowNumber,
            "sum" => WindowFn::Sum,
            "min" => WindowFn::Min,
            "max" => WindowFn::Max,
            "avg" => WindowFn::Avg,
            "count" => WindowFn::Count,
            "lag" => WindowFn::Lag,
            "lead" => WindowFn::Lead,
            _ => return None,
        };
        Some(f)
    }

    pub fn function_name(&self) -> &'static str {
        match self {
            WindowFn::Rank => "RANK",
            WindowFn::DenseRank => "DENSE_RANK",
            WindowFn::RowNumber => "ROW_NUMBER",
            WindowFn::Sum => "SUM",
            WindowFn::Min => "MIN",
            WindowFn::Max => "MAX",
            WindowFn::Avg => "AVG",
            WindowFn::Count => "COUNT",
            WindowFn::Lag => "LAG",
            WindowFn::Lead => "LEAD",
        }
    }

    pub fn is_ranking(&self) -> bool {
        matches!(self, WindowFn::Rank | WindowFn::DenseRank | WindowFn::RowNumber)
    }
}

/// Calculation tree.
#[derive(Debug, Clone, PartialEq)]
pub enum CalcNode {
    /// Literal, bound as a parameter.
    Value { value: String, ty: Option<JdbcType> },
    /// Reference to a logical column.
    ValueRef {
        id_ref: String,
        aggr: Option<Aggregation>,
    },
    Arith { op: ArithOp, args: Vec<CalcNode> },
    Concat(Vec<CalcNode>),
    Compare {
        op: CompareOp,
        left: Box<CalcNode>,
        right: Box<CalcNode>,
    },
    CaseWhen {
        branches: Vec<(CalcNode, CalcNode)>,
        otherwise: Option<Box<CalcNode>>,
    },
    Coalesce(Vec<CalcNode>),
    Cast {
        node: Box<CalcNode>,
        ty: JdbcType,
        scale: Option<u32>,
    },
    /// Inner aggregate: SUM/MIN/MAX/AVG/COUNT/COUNT DISTINCT/GROUPING.
    Aggregate {
        func: Aggregation,
        arg: Box<CalcNode>,
    },
    /// Analytic function.
    Over {
        func: WindowFn,
        args: Vec<CalcNode>,
        partition_by: Vec<CalcNode>,
        order_by: Vec<(CalcNode, SortDir)>,
    },
}

impl CalcNode {
    /// Whether an inner aggregate (not an analytic) appears in the tree.
    pub fn has_aggregate(&self) -> bool {
        match self {
            CalcNode::Aggregate { .. } => true,
            CalcNode::ValueRef { aggr, .. } => aggr.is_some_and(|a| a != Aggregation::None),
            CalcNode::Value { .. } => false,
            CalcNode::Arith { args, .. } | CalcNode::Concat(args) | CalcNode::Coalesce(args) => {
                args.iter().any(CalcNode::has_aggregate)
            }
            CalcNode::Compare { left, right, .. } => left.has_aggregate() || right.has_aggregate(),
            CalcNode::CaseWhen {
                branches,
                otherwise,
            } => {
                branches
                    .iter()
                    .any(|(c, v)| c.has_aggregate() || v.has_aggregate())
                    || otherwise.as_ref().is_some_and(|o| o.has_aggregate())
            }
            CalcNode::Cast { node, .. } => node.has_aggregate(),
            CalcNode::Over {
                args,
                partition_by,
                order_by,
                ..
            } => {
                args.iter().any(CalcNode::has_aggregate)
                    || partition_by.iter().any(CalcNode::has_aggregate)
                    || order_by.iter().any(|(n, _)| n.has_aggregate())
            }
        }
    }

    /// Every column id referenced in the tree, in document order.
    pub fn collect_refs(&self, out: &mut Vec<String>) {
        match self {
            CalcNode::ValueRef { id_ref, .. } => out.push(id_ref.clone()),
            CalcNode::Value { .. } => {}
            CalcNode::Arith { args, .. } | CalcNode::Concat(args) | CalcNode::Coalesce(args) => {
                args.iter().for_each(|a| a.collect_refs(out))
            }
            CalcNode::Compare { left, right, .. } => {
                left.collect_refs(out);
                right.collect_refs(out);
            }
            CalcNode::CaseWhen {
                branches,
                otherwise,
            } => {
                for (c, v) in branches {
                    c.collect_refs(out);
                    v.collect_refs(out);
                }
                if let Some(o) = otherwise {
                    o.collect_refs(out);
                }
            }
            CalcNode::Cast { node, .. } => node.collect_refs(out),
            CalcNode::Aggregate { arg, .. } => arg.collect_refs(out),
            CalcNode::Over {
                args,
                partition_by,
                order_by,
                ..
            } => {
                args.iter().for_each(|a| a.collect_refs(out));
                partition_by.iter().for_each(|a| a.collect_refs(out));
                order_by.iter().for_each(|(a, _)| a.collect_refs(out));
            }
        }
    }
}

/// FROM clause sources.
#[derive(Debug, Clone, PartialEq)]
pub enum FromDef {
    /// Catalog table or CTE by name.
    BindingSet { name: String, alias: Option<String> },
    /// Nested select; its alias lives in [`SelectDef::alias`].
    SubSelect(Box<SelectDef>),
    Join {
        join_type: JoinType,
        left: Box<FromDef>,
        right: Box<FromDef>,
        on: Option<BoolExpr>,
    },
}

/// Boolean filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum BoolExpr {
    And(Vec<BoolExpr>),
    Or(Vec<BoolExpr>),
    Not(Box<BoolExpr>),
    Leaf(Comparison),
}

impl BoolExpr {
    /// Leaves in document order.
    pub fn leaves(&self) -> Vec<&Comparison> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Comparison>) {
        match self {
            BoolExpr::And(children) | BoolExpr::Or(children) => {
                children.iter().for_each(|c| c.collect_leaves(out))
            }
            BoolExpr::Not(inner) => inner.collect_leaves(out),
            BoolExpr::Leaf(c) => out.push(c),
        }
    }
}

/// Filter leaf operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOperator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    NotLike,
    In,
    NotIn,
    BitAnd,
    SpatialContains,
    SpatialContained,
    SpatialIntersects,
}

impl CompareOperator {
    pub fn parse(s: &str) -> Option<Self> {
        let op = match s.trim() {
            "=" | "eq" => CompareOperator::Eq,
            "<>" | "!=" | "ne" => CompareOperator::Ne,
            "<" | "lt" => CompareOperator::Lt,
            "<=" | "le" => CompareOperator::Le,
            ">" | "gt" => CompareOperator::Gt,
            ">=" | "ge" => CompareOperator::Ge,
            "like" => CompareOperator::Like,
            "notLike" => CompareOperator::NotLike,
            "in" => CompareOperator::In,
            "notIn" => CompareOperator::NotIn,
            "bitand" => CompareOperator::BitAnd,
            "spatialContains" => CompareOperator::SpatialContains,
            "spatialContained" => CompareOperator::SpatialContained,
            "spatialIntersects" => CompareOperator::SpatialIntersects,
            _ => return None,
        };
        Some(op)
    }
}

/// One filter leaf: `<Expression>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub b_ref: String,
    pub op: CompareOperator,
    /// `value` attribute or `<Value>` children; empty when absent.
    pub values: Vec<String>,
    /// Case-insensitive comparison.
    pub ic: bool,
    pub aggr: Option<Aggregation>,
    /// Compare against another column instead of a literal.
    pub b_ref_value: Option<String>,
    /// Compare against a calculation.
    pub calc: Option<CalcDef>,
    /// Compare against a sub-select.
    pub sub_select: Option<Box<SelectDef>>,
}

impl Comparison {
    pub fn new(b_ref: &str, op: CompareOperator, values: Vec<String>) -> Self {
        Self {
            b_ref: b_ref.to_string(),
            op,
            values,
            ic: false,
            aggr: None,
            b_ref_value: None,
            calc: None,
            sub_select: None,
        }
    }
}

/// `<Grouping>` content.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupingDef {
    pub columns: Vec<String>,
    pub functions: Vec<GroupingFunction>,
}

impl GroupingDef {
    /// Every column id mentioned anywhere in the grouping.
    pub fn all_columns(&self) -> Vec<String> {
        let mut out: Vec<String> = self.columns.clone();
        for f in &self.functions {
            match f {
                GroupingFunction::Rollup(c) | GroupingFunction::Cube(c) => {
                    out.extend(c.iter().cloned())
                }
                GroupingFunction::Sets(sets) => {
                    sets.iter().for_each(|s| out.extend(s.iter().cloned()))
                }
            }
        }
        let mut seen = std::collections::HashSet::new();
        out.retain(|c| seen.insert(c.clone()));
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GroupingFunction {
    Rollup(Vec<String>),
    Cube(Vec<String>),
    Sets(Vec<Vec<String>>),
}

/// Ordering item: by column (select level) or by output position
/// (full-select level).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderDef {
    pub b_ref: Option<String>,
    pub pos: Option<usize>,
    pub aggr: Option<Aggregation>,
    pub dir: SortDir,
    pub nulls: Option<NullsOrder>,
}

/// `<TopN n bRef order>` with its measure column.
#[derive(Debug, Clone, PartialEq)]
pub struct TopNDef {
    pub n: u32,
    pub b_ref: String,
    pub dir: SortDir,
    pub measure: ColumnDef,
}

/// Virtual dimension member mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct VdmDef {
    pub b_ref: String,
    pub maps: Vec<VdmMap>,
    pub rest: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VdmMap {
    pub to: String,
    pub values: Vec<String>,
}

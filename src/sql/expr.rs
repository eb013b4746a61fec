//! Expression AST - the core of SQL expression building.
//!
//! This module provides a strongly-typed AST for SQL expressions
//! with exhaustive pattern matching enforced by the compiler.
//!
//! Request literals only ever enter an expression as [`Expr::Param`]; the
//! rendered text then carries a `?` and the value travels as a bound
//! variable, in token order.

use super::dialect::{helpers, Ansi, Dialect, SpatialRelation, SqlDialect};
use super::query::Query;
use super::statement::BoundVariable;
use super::token::{Token, TokenStream};
use super::types::JdbcType;

// =============================================================================
// Expression AST
// =============================================================================

/// A SQL expression.
///
/// Every variant must be handled in `to_tokens_for_dialect()` - the compiler
/// enforces this.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference by generated name: optional_alias.column
    Column {
        table: Option<String>,
        column: String,
    },

    /// Bound request literal, rendered as `?`.
    Param(BoundVariable),

    /// Literal values
    Literal(Literal),

    /// `NULL` cast to a type, for set operands that must agree on types.
    TypedNull(JdbcType),

    /// Canonical always-true (`1=1`) or always-false (`1=0`) predicate.
    Truth(bool),

    /// Binary operation: left op right
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// Unary operation: op expr
    UnaryOp { op: UnaryOperator, expr: Box<Expr> },

    /// Function call: name(args...)
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },

    /// CASE WHEN... THEN... ELSE... END
    Case {
        operand: Option<Box<Expr>>,
        when_clauses: Vec<(Expr, Expr)>,
        else_clause: Option<Box<Expr>>,
    },

    /// CAST(expr AS type)
    Cast {
        expr: Box<Expr>,
        ty: JdbcType,
        scale: Option<u32>,
    },

    /// Dialect text conversion (dates to the day, timestamps to the second).
    CastToText { expr: Box<Expr>, ty: JdbcType },

    /// Subquery: (SELECT ...)
    Subquery(Box<Query>),

    /// EXISTS (SELECT ...)
    Exists(Box<Query>),

    /// IN: expr IN (values...)
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    /// IN subquery: expr IN (SELECT ...)
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<Query>,
        negated: bool,
    },

    /// BETWEEN: expr BETWEEN low AND high
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },

    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },

    /// LIKE with the dialect's backslash ESCAPE clause.
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },

    /// Bitwise AND (operator or function, per dialect).
    BitAnd { left: Box<Expr>, right: Box<Expr> },

    /// Spatial predicate.
    Spatial {
        relation: SpatialRelation,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Wildcard: * or table.*
    Star { table: Option<String> },

    /// Parenthesized expression
    Paren(Box<Expr>),

    /// Window function expression.
    ///
    /// Example: `SUM(amount) OVER (PARTITION BY region ORDER BY date)`
    WindowFunction {
        /// The function being windowed (usually Expr::Function)
        function: Box<Expr>,
        /// PARTITION BY expressions
        partition_by: Vec<Expr>,
        /// ORDER BY within window
        order_by: Vec<WindowOrderBy>,
    },

    /// Raw SQL expression passed directly to output without escaping.
    ///
    /// # Security Warning
    ///
    /// **Never pass request content to this variant.** Raw SQL is not
    /// sanitized. Only catalog-defined column expressions (already qualified
    /// with their table alias) travel as raw SQL.
    Raw(String),
}

/// Literal values.
///
/// String literals are escaped for the dialect; they are reserved for
/// validated display values, never for request filter values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    String(String),
    Null,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    // Logical
    And,
    Or,
    // Arithmetic
    Plus,
    Minus,
    Mul,
    Div,
    // String
    Concat,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
}

// =============================================================================
// Ordering
// =============================================================================

/// Sort direction (shared with query ORDER BY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

/// NULLS ordering (shared with query ORDER BY).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

/// ORDER BY expression within a window specification.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowOrderBy {
    pub expr: Expr,
    pub dir: Option<SortDir>,
    pub nulls: Option<NullsOrder>,
}

impl WindowOrderBy {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            dir: None,
            nulls: None,
        }
    }

    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            dir: Some(SortDir::Asc),
            nulls: None,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            dir: Some(SortDir::Desc),
            nulls: None,
        }
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = Some(NullsOrder::Last);
        self
    }
}

/// Emit one ordering item.
///
/// Without native `NULLS FIRST/LAST` the placement becomes a leading
/// `CASE WHEN x IS NULL THEN 0 ELSE 1 END` key. `x` is rendered twice, so
/// its parameters are bound twice, in order.
pub(crate) fn emit_order_item(
    ts: &mut TokenStream,
    expr: &Expr,
    dir: Option<SortDir>,
    nulls: Option<NullsOrder>,
    dialect: Dialect,
) {
    let rendered = expr.to_tokens_for_dialect(dialect);
    if let Some(n) = nulls {
        if !dialect.supports_nulls_ordering() {
            let (null_key, other_key) = match n {
                NullsOrder::First => (0, 1),
                NullsOrder::Last => (1, 0),
            };
            ts.push(Token::Case)
                .space()
                .push(Token::When)
                .space()
                .append(&rendered)
                .space()
                .push(Token::IsNull)
                .space()
                .push(Token::Then)
                .space()
                .push(Token::LitInt(null_key))
                .space()
                .push(Token::Else)
                .space()
                .push(Token::LitInt(other_key))
                .space()
                .push(Token::End)
                .comma()
                .space();
        }
    }
    ts.append(&rendered);
    if let Some(d) = dir {
        ts.space().push(match d {
            SortDir::Asc => Token::Asc,
            SortDir::Desc => Token::Desc,
        });
    }
    if let Some(n) = nulls {
        if dialect.supports_nulls_ordering() {
            ts.space().push(match n {
                NullsOrder::First => Token::NullsFirst,
                NullsOrder::Last => Token::NullsLast,
            });
        }
    }
}

// =============================================================================
// Expression to Tokens
// =============================================================================

impl Expr {
    /// Convert this expression to a token stream for a specific dialect.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match self {
            Expr::Column { table, column } => {
                if let Some(t) = table {
                    ts.push(Token::Ident(t.clone()));
                    ts.push(Token::Dot);
                }
                ts.push(Token::Ident(column.clone()));
            }

            Expr::Param(var) => {
                ts.push(Token::Param(var.clone()));
            }

            Expr::Literal(lit) => {
                ts.push(match lit {
                    Literal::Int(n) => Token::LitInt(*n),
                    Literal::String(s) => Token::LitString(s.clone()),
                    Literal::Null => Token::Null,
                });
            }

            Expr::TypedNull(ty) => {
                ts.append(&dialect.typed_null(*ty));
            }

            Expr::Truth(b) => {
                ts.push(Token::LitInt(1))
                    .push(Token::Eq)
                    .push(Token::LitInt(if *b { 1 } else { 0 }));
            }

            Expr::BinaryOp { left, op, right } => {
                // Handle CONCAT specially for dialects that don't support || operator
                if *op == BinaryOperator::Concat && !dialect.supports_concat_operator() {
                    ts.append(&helpers::call(
                        "CONCAT",
                        vec![
                            left.to_tokens_for_dialect(dialect),
                            right.to_tokens_for_dialect(dialect),
                        ],
                    ));
                } else {
                    ts.append(&left.to_tokens_for_dialect(dialect));
                    ts.space();
                    ts.push(binary_op_to_token(*op));
                    ts.space();
                    ts.append(&right.to_tokens_for_dialect(dialect));
                }
            }

            Expr::UnaryOp { op, expr } => {
                match op {
                    UnaryOperator::Not => ts.push(Token::Not).space(),
                    UnaryOperator::Minus => ts.push(Token::Minus),
                };
                ts.append(&expr.to_tokens_for_dialect(dialect));
            }

            Expr::Function {
                name,
                args,
                distinct,
            } => {
                ts.push(Token::FunctionName(name.clone()));
                ts.lparen();
                if *distinct {
                    ts.push(Token::Distinct).space();
                }
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&arg.to_tokens_for_dialect(dialect));
                }
                ts.rparen();
            }

            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                ts.push(Token::Case);
                if let Some(op) = operand {
                    ts.space().append(&op.to_tokens_for_dialect(dialect));
                }
                for (when, then) in when_clauses {
                    ts.space().push(Token::When).space();
                    ts.append(&when.to_tokens_for_dialect(dialect));
                    ts.space().push(Token::Then).space();
                    ts.append(&then.to_tokens_for_dialect(dialect));
                }
                if let Some(else_expr) = else_clause {
                    ts.space().push(Token::Else).space();
                    ts.append(&else_expr.to_tokens_for_dialect(dialect));
                }
                ts.space().push(Token::End);
            }

            Expr::Cast { expr, ty, scale } => {
                ts.append(&helpers::cast(
                    expr.to_tokens_for_dialect(dialect),
                    &dialect.cast_type_name(*ty, *scale),
                ));
            }

            Expr::CastToText { expr, ty } => {
                ts.append(&dialect.cast_to_text(expr.to_tokens_for_dialect(dialect), *ty));
            }

            Expr::Subquery(query) => {
                ts.lparen();
                ts.append(&query.to_tokens_for_dialect(dialect));
                ts.rparen();
            }

            Expr::Exists(query) => {
                ts.push(Token::Exists).space().lparen();
                ts.append(&query.to_tokens_for_dialect(dialect));
                ts.rparen();
            }

            Expr::In {
                expr,
                values,
                negated,
            } => {
                // "x IN ()" is invalid SQL: IN () is false, NOT IN () is true
                if values.is_empty() {
                    ts.append(&Expr::Truth(*negated).to_tokens_for_dialect(dialect));
                } else {
                    ts.append(&expr.to_tokens_for_dialect(dialect));
                    if *negated {
                        ts.space().push(Token::Not);
                    }
                    ts.space().push(Token::In).space().lparen();
                    for (i, val) in values.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.append(&val.to_tokens_for_dialect(dialect));
                    }
                    ts.rparen();
                }
            }

            Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space().push(Token::In).space().lparen();
                ts.append(&subquery.to_tokens_for_dialect(dialect));
                ts.rparen();
            }

            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space().push(Token::Between).space();
                ts.append(&low.to_tokens_for_dialect(dialect));
                ts.space().push(Token::And).space();
                ts.append(&high.to_tokens_for_dialect(dialect));
            }

            Expr::IsNull { expr, negated } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                ts.space();
                ts.push(if *negated {
                    Token::IsNotNull
                } else {
                    Token::IsNull
                });
            }

            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space()
                    .push(Token::Like)
                    .space()
                    .append(&pattern.to_tokens_for_dialect(dialect))
                    .push(Token::Raw(dialect.like_escape_clause().into()));
            }

            Expr::BitAnd { left, right } => {
                ts.append(&dialect.emit_bit_and(
                    left.to_tokens_for_dialect(dialect),
                    right.to_tokens_for_dialect(dialect),
                ));
            }

            Expr::Spatial {
                relation,
                left,
                right,
            } => {
                let lhs = left.to_tokens_for_dialect(dialect);
                let rhs = right.to_tokens_for_dialect(dialect);
                // Callers check support first; ST_* is the neutral spelling.
                let spatial = dialect
                    .emit_spatial(*relation, lhs.clone(), rhs.clone())
                    .or_else(|| Ansi.emit_spatial(*relation, lhs, rhs))
                    .unwrap_or_default();
                ts.append(&spatial);
            }

            Expr::Star { table } => {
                if let Some(t) = table {
                    ts.push(Token::Ident(t.clone()));
                    ts.push(Token::Dot);
                }
                ts.push(Token::Star);
            }

            Expr::Paren(inner) => {
                ts.lparen();
                ts.append(&inner.to_tokens_for_dialect(dialect));
                ts.rparen();
            }

            Expr::WindowFunction {
                function,
                partition_by,
                order_by,
            } => {
                ts.append(&function.to_tokens_for_dialect(dialect));

                // OVER (...)
                ts.space().push(Token::Over).space().lparen();

                if !partition_by.is_empty() {
                    ts.push(Token::PartitionBy).space();
                    for (i, expr) in partition_by.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.append(&expr.to_tokens_for_dialect(dialect));
                    }
                }

                if !order_by.is_empty() {
                    if !partition_by.is_empty() {
                        ts.space();
                    }
                    ts.push(Token::OrderBy).space();
                    for (i, ob) in order_by.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        emit_order_item(&mut ts, &ob.expr, ob.dir, ob.nulls, dialect);
                    }
                }

                ts.rparen();
            }

            Expr::Raw(sql) => {
                ts.push(Token::Raw(sql.clone()));
            }
        }

        ts
    }

    /// Returns true if the expression references no column at all.
    ///
    /// Constant expressions are dropped from GROUP BY.
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Param(_) | Expr::Literal(_) | Expr::TypedNull(_) | Expr::Truth(_) => true,
            Expr::Column { .. }
            | Expr::Raw(_)
            | Expr::Star { .. }
            | Expr::Subquery(_)
            | Expr::Exists(_)
            | Expr::InSubquery { .. }
            | Expr::WindowFunction { .. } => false,
            Expr::BinaryOp { left, right, .. }
            | Expr::BitAnd { left, right }
            | Expr::Spatial { left, right, .. } => left.is_constant() && right.is_constant(),
            Expr::UnaryOp { expr, .. }
            | Expr::Cast { expr, .. }
            | Expr::CastToText { expr, .. }
            | Expr::IsNull { expr, .. }
            | Expr::Paren(expr) => expr.is_constant(),
            Expr::Function { args, .. } => args.iter().all(Expr::is_constant),
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                operand.as_ref().map_or(true, |o| o.is_constant())
                    && when_clauses
                        .iter()
                        .all(|(w, t)| w.is_constant() && t.is_constant())
                    && else_clause.as_ref().map_or(true, |e| e.is_constant())
            }
            Expr::In { expr, values, .. } => {
                expr.is_constant() && values.iter().all(Expr::is_constant)
            }
            Expr::Between {
                expr, low, high, ..
            } => expr.is_constant() && low.is_constant() && high.is_constant(),
            Expr::Like { expr, pattern, .. } => expr.is_constant() && pattern.is_constant(),
        }
    }

    /// Generate SQL text for a specific dialect, with `?` placeholders.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }
}

fn binary_op_to_token(op: BinaryOperator) -> Token {
    match op {
        BinaryOperator::Eq => Token::Eq,
        BinaryOperator::Ne => Token::Ne,
        BinaryOperator::Lt => Token::Lt,
        BinaryOperator::Gt => Token::Gt,
        BinaryOperator::Lte => Token::Lte,
        BinaryOperator::Gte => Token::Gte,
        BinaryOperator::And => Token::And,
        BinaryOperator::Or => Token::Or,
        BinaryOperator::Plus => Token::Plus,
        BinaryOperator::Minus => Token::Minus,
        BinaryOperator::Mul => Token::Mul,
        BinaryOperator::Div => Token::Div,
        BinaryOperator::Concat => Token::Concat,
    }
}

// =============================================================================
// Expression Constructors
// =============================================================================

/// Create a column reference.
pub fn col(name: &str) -> Expr {
    Expr::Column {
        table: None,
        column: name.into(),
    }
}

/// Create a qualified column reference (table.column).
pub fn table_col(table: &str, column: &str) -> Expr {
    Expr::Column {
        table: Some(table.into()),
        column: column.into(),
    }
}

/// Create an integer literal.
pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

/// Create a string literal.
pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

/// Create a NULL literal.
pub fn lit_null() -> Expr {
    Expr::Literal(Literal::Null)
}

/// Create a bound parameter.
pub fn param(value: impl Into<String>, ty: JdbcType) -> Expr {
    Expr::Param(BoundVariable::new(value, ty))
}

/// Create a star (*) expression.
pub fn star() -> Expr {
    Expr::Star { table: None }
}

/// Generic function call.
pub fn func(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.into(),
        args,
        distinct: false,
    }
}

/// COUNT(DISTINCT expr)
pub fn count_distinct(expr: Expr) -> Expr {
    Expr::Function {
        name: "COUNT".into(),
        args: vec![expr],
        distinct: true,
    }
}

/// ROW_NUMBER()
pub fn row_number() -> Expr {
    func("ROW_NUMBER", vec![])
}

/// RANK()
pub fn rank() -> Expr {
    func("RANK", vec![])
}

/// NULLIF(expr, 0) - guards a divisor.
pub fn nullif_zero(expr: Expr) -> Expr {
    func("NULLIF", vec![expr, lit_int(0)])
}

/// Raw SQL expression (pass-through, no parsing).
///
/// # Security Warning
///
/// **Never pass request content to this function.** The SQL is not
/// sanitized.
pub fn raw_sql(sql: &str) -> Expr {
    Expr::Raw(sql.into())
}

/// AND all predicates together; `None` when there are none.
pub fn and_all(predicates: Vec<Expr>) -> Option<Expr> {
    connect(predicates, BinaryOperator::And)
}

/// OR all predicates together; `None` when there are none.
pub fn or_all(predicates: Vec<Expr>) -> Option<Expr> {
    connect(predicates, BinaryOperator::Or)
}

fn connect(predicates: Vec<Expr>, op: BinaryOperator) -> Option<Expr> {
    let count = predicates.len();
    let mut iter = predicates.into_iter().map(|p| {
        if count > 1 && needs_parens_under(&p, op) {
            Expr::Paren(Box::new(p))
        } else {
            p
        }
    });
    let first = iter.next()?;
    Some(iter.fold(first, |acc, p| Expr::BinaryOp {
        left: Box::new(acc),
        op,
        right: Box::new(p),
    }))
}

fn needs_parens_under(expr: &Expr, parent: BinaryOperator) -> bool {
    match expr {
        Expr::BinaryOp { op, .. } => {
            (*op == BinaryOperator::Or || *op == BinaryOperator::And) && *op != parent
        }
        _ => false,
    }
}

// =============================================================================
// Window Builder
// =============================================================================

/// Builder for creating window function expressions.
#[derive(Debug, Clone)]
#[must_use = "WindowBuilder has no effect until build() is called"]
pub struct WindowBuilder {
    function: Expr,
    partition_by: Vec<Expr>,
    order_by: Vec<WindowOrderBy>,
}

impl WindowBuilder {
    /// Create a new window builder for the given function.
    pub fn new(function: Expr) -> Self {
        Self {
            function,
            partition_by: vec![],
            order_by: vec![],
        }
    }

    /// Add PARTITION BY expressions.
    pub fn partition_by(mut self, exprs: Vec<Expr>) -> Self {
        self.partition_by = exprs;
        self
    }

    /// Add ORDER BY expressions.
    pub fn order_by(mut self, exprs: Vec<WindowOrderBy>) -> Self {
        self.order_by = exprs;
        self
    }

    /// Build the window function expression.
    pub fn build(self) -> Expr {
        Expr::WindowFunction {
            function: Box::new(self.function),
            partition_by: self.partition_by,
            order_by: self.order_by,
        }
    }
}

/// Extension trait for adding OVER clause to expressions.
pub trait WindowExt: Sized {
    /// Start building a window function with OVER clause.
    fn over(self) -> WindowBuilder;
}

impl WindowExt for Expr {
    fn over(self) -> WindowBuilder {
        WindowBuilder::new(self)
    }
}

// =============================================================================
// Expression Builder Trait
// =============================================================================

/// Extension trait for building expressions fluently.
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    fn binary(self, op: BinaryOperator, other: impl Into<Expr>) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self.into_expr()),
            op,
            right: Box::new(other.into()),
        }
    }

    // Comparison operators
    fn eq(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Eq, other)
    }

    fn ne(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Ne, other)
    }

    fn gt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Gt, other)
    }

    fn gte(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Gte, other)
    }

    fn lt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Lt, other)
    }

    fn lte(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Lte, other)
    }

    // Logical operators
    fn and(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::And, other)
    }

    fn or(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Or, other)
    }

    fn not(self) -> Expr {
        Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr: Box::new(self.into_expr()),
        }
    }

    // Null checks
    fn is_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: false,
        }
    }

    fn is_not_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: true,
        }
    }

    // Membership
    fn in_list(self, values: Vec<Expr>) -> Expr {
        Expr::In {
            expr: Box::new(self.into_expr()),
            values,
            negated: false,
        }
    }

    fn paren(self) -> Expr {
        Expr::Paren(Box::new(self.into_expr()))
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

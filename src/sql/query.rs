//! Query builder - construct SQL queries with a fluent API.
//!
//! A [`Query`] is either a plain SELECT or, when `set_op` is present, a
//! chain of SELECTs connected by set operators. CTEs and a trailing ORDER BY
//! may wrap either form.

use super::dialect::{Dialect, SqlDialect};
use super::expr::{emit_order_item, Expr, NullsOrder, SortDir};
use super::statement::Statement;
use super::token::{Token, TokenStream};

// =============================================================================
// Select Expression (column with optional alias)
// =============================================================================

/// A SELECT list item: expression with optional alias.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens_for_dialect(dialect);
        if let Some(alias) = &self.alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(alias.clone()));
        }
        ts
    }
}

impl From<Expr> for SelectExpr {
    fn from(expr: Expr) -> Self {
        SelectExpr::new(expr)
    }
}

// =============================================================================
// FROM clause
// =============================================================================

/// Type of join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinType {
    /// Whether the left side may be null-extended.
    pub fn nulls_left(&self) -> bool {
        matches!(self, JoinType::Right | JoinType::Full)
    }

    /// Whether the right side may be null-extended.
    pub fn nulls_right(&self) -> bool {
        matches!(self, JoinType::Left | JoinType::Full)
    }
}

/// One item of a FROM clause, possibly a join tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FromItem {
    /// Physical table from the catalog. The name is catalog-trusted and
    /// emitted verbatim.
    Table { name: String, alias: String },
    /// Derived table: `(SELECT ...) alias`
    Derived { query: Box<Query>, alias: String },
    /// `left <type> JOIN right ON cond`
    Join {
        left: Box<FromItem>,
        join_type: JoinType,
        right: Box<FromItem>,
        on: Option<Expr>,
    },
}

impl FromItem {
    pub fn table(name: &str, alias: &str) -> Self {
        FromItem::Table {
            name: name.into(),
            alias: alias.into(),
        }
    }

    pub fn derived(query: Query, alias: &str) -> Self {
        FromItem::Derived {
            query: Box::new(query),
            alias: alias.into(),
        }
    }

    pub fn join(self, join_type: JoinType, right: FromItem, on: Option<Expr>) -> Self {
        FromItem::Join {
            left: Box::new(self),
            join_type,
            right: Box::new(right),
            on,
        }
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        match self {
            FromItem::Table { name, alias } => {
                ts.push(Token::Raw(name.clone()));
                emit_table_alias(&mut ts, alias, dialect);
            }
            FromItem::Derived { query, alias } => {
                ts.lparen()
                    .append(&query.to_tokens_for_dialect(dialect))
                    .rparen();
                emit_table_alias(&mut ts, alias, dialect);
            }
            FromItem::Join {
                left,
                join_type,
                right,
                on,
            } => {
                ts.append(&left.to_tokens_for_dialect(dialect)).newline();
                match join_type {
                    JoinType::Inner => ts.push(Token::Inner),
                    JoinType::Left => ts.push(Token::Left).space().push(Token::Outer),
                    JoinType::Right => ts.push(Token::Right).space().push(Token::Outer),
                    JoinType::Full => ts.push(Token::Full).space().push(Token::Outer),
                    JoinType::Cross => ts.push(Token::Cross),
                };
                ts.space().push(Token::Join).space();
                // A nested join on the right must be grouped.
                if matches!(**right, FromItem::Join { .. }) {
                    ts.lparen()
                        .append(&right.to_tokens_for_dialect(dialect))
                        .rparen();
                } else {
                    ts.append(&right.to_tokens_for_dialect(dialect));
                }
                if *join_type != JoinType::Cross {
                    let cond = on.clone().unwrap_or(Expr::Truth(true));
                    ts.space()
                        .push(Token::On)
                        .space()
                        .append(&cond.to_tokens_for_dialect(dialect));
                }
            }
        }
        ts
    }
}

fn emit_table_alias(ts: &mut TokenStream, alias: &str, dialect: Dialect) {
    ts.space();
    if dialect.table_alias_uses_as() {
        ts.push(Token::As).space();
    }
    ts.push(Token::Raw(alias.into()));
}

// =============================================================================
// Grouping
// =============================================================================

/// One GROUP BY element.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupingElement {
    Expr(Expr),
    Rollup(Vec<Expr>),
    Cube(Vec<Expr>),
    GroupingSets(Vec<Vec<Expr>>),
}

impl GroupingElement {
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        match self {
            GroupingElement::Expr(e) => {
                ts.append(&e.to_tokens_for_dialect(dialect));
            }
            GroupingElement::Rollup(exprs) => {
                ts.push(Token::Rollup).lparen();
                emit_expr_list(&mut ts, exprs, dialect);
                ts.rparen();
            }
            GroupingElement::Cube(exprs) => {
                ts.push(Token::Cube).lparen();
                emit_expr_list(&mut ts, exprs, dialect);
                ts.rparen();
            }
            GroupingElement::GroupingSets(sets) => {
                ts.push(Token::GroupingSets).space().lparen();
                for (i, set) in sets.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.lparen();
                    emit_expr_list(&mut ts, set, dialect);
                    ts.rparen();
                }
                ts.rparen();
            }
        }
        ts
    }
}

fn emit_expr_list(ts: &mut TokenStream, exprs: &[Expr], dialect: Dialect) {
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            ts.comma().space();
        }
        ts.append(&e.to_tokens_for_dialect(dialect));
    }
}

// =============================================================================
// ORDER BY
// =============================================================================

/// An ORDER BY item.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: Option<SortDir>,
    pub nulls: Option<NullsOrder>,
}

impl OrderByExpr {
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

    pub fn with_nulls(mut self, nulls: Option<NullsOrder>) -> Self {
        self.nulls = nulls;
        self
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        emit_order_item(&mut ts, &self.expr, self.dir, self.nulls, dialect);
        ts
    }
}

// =============================================================================
// Set Operations
// =============================================================================

/// Type of set operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOpType {
    Union,
    Intersect,
    Except,
}

/// A set operator with its ALL flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOp {
    pub kind: SetOpType,
    pub all: bool,
}

impl SetOp {
    pub fn union_all() -> Self {
        Self {
            kind: SetOpType::Union,
            all: true,
        }
    }
}

/// SELECTs connected by set operators, evaluated left to right.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "SetOperation has no effect until converted to SQL with to_sql()"]
pub struct SetOperation {
    pub first: Box<Query>,
    pub rest: Vec<(SetOp, Query)>,
}

impl SetOperation {
    pub fn new(first: Query) -> Self {
        Self {
            first: Box::new(first),
            rest: Vec::new(),
        }
    }

    /// Chain another operand.
    pub fn chain(mut self, op: SetOp, right: Query) -> Self {
        self.rest.push((op, right));
        self
    }

    /// Convert to tokens for a specific dialect.
    ///
    /// Operands are parenthesized. SQLite does not accept a parenthesized
    /// compound member: plain operands are emitted bare there, anything else
    /// is wrapped in `SELECT * FROM (...)`.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        emit_set_operand(&mut ts, &self.first, dialect);
        for (op, query) in &self.rest {
            ts.newline();
            ts.push(match op.kind {
                SetOpType::Union => Token::Union,
                SetOpType::Intersect => Token::Intersect,
                SetOpType::Except => Token::Except,
            });
            if op.all {
                ts.space().push(Token::All);
            }
            ts.newline();
            emit_set_operand(&mut ts, query, dialect);
        }
        ts
    }
}

fn emit_set_operand(ts: &mut TokenStream, query: &Query, dialect: Dialect) {
    if dialect == Dialect::Sqlite {
        if query.is_plain_select() {
            ts.append(&query.to_tokens_for_dialect(dialect));
            return;
        }
        ts.push(Token::Select)
            .space()
            .push(Token::Star)
            .space()
            .push(Token::From)
            .space();
    }
    ts.lparen()
        .append(&query.to_tokens_for_dialect(dialect))
        .rparen();
}

// =============================================================================
// CTE (Common Table Expression)
// =============================================================================

/// A Common Table Expression (WITH clause).
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct Cte {
    pub name: String,
    pub columns: Option<Vec<String>>,
    pub query: Box<Query>,
    /// Whether this is a recursive CTE.
    pub recursive: bool,
}

impl Cte {
    pub fn new(name: &str, query: Query) -> Self {
        Self {
            name: name.into(),
            columns: None,
            query: Box::new(query),
            recursive: false,
        }
    }

    /// Create a recursive CTE.
    pub fn recursive(name: &str, query: Query) -> Self {
        Self {
            name: name.into(),
            columns: None,
            query: Box::new(query),
            recursive: true,
        }
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Ident(self.name.clone()));

        if let Some(cols) = &self.columns {
            ts.space().lparen();
            for (i, col) in cols.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.push(Token::Ident(col.clone()));
            }
            ts.rparen();
        }

        ts.space()
            .push(Token::As)
            .space()
            .lparen()
            .newline()
            .append(&self.query.to_tokens_for_dialect(dialect))
            .newline()
            .rparen();

        ts
    }
}

// =============================================================================
// Query Builder
// =============================================================================

/// A SELECT query.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "Query has no effect until converted to SQL with to_sql() or build()"]
pub struct Query {
    pub with: Vec<Cte>,
    pub select: Vec<SelectExpr>,
    pub distinct: bool,
    pub from: Option<FromItem>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<GroupingElement>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    /// When set, the query body is this set operation instead of the
    /// SELECT fields above.
    pub set_op: Option<Box<SetOperation>>,
}

impl Query {
    /// Create a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a set operation as a query body.
    pub fn from_set_op(set_op: SetOperation) -> Self {
        Self {
            set_op: Some(Box::new(set_op)),
            ..Default::default()
        }
    }

    /// Add a CTE.
    pub fn with_cte(mut self, cte: Cte) -> Self {
        self.with.push(cte);
        self
    }

    /// Set SELECT columns.
    pub fn select(mut self, exprs: Vec<impl Into<SelectExpr>>) -> Self {
        self.select = exprs.into_iter().map(Into::into).collect();
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn from(mut self, item: FromItem) -> Self {
        self.from = Some(item);
        self
    }

    /// Add a WHERE condition, ANDed with any existing one.
    pub fn filter(mut self, condition: Expr) -> Self {
        self.where_clause = match self.where_clause.take() {
            Some(existing) => super::expr::and_all(vec![existing, condition]),
            None => Some(condition),
        };
        self
    }

    pub fn group_by(mut self, elements: Vec<GroupingElement>) -> Self {
        self.group_by = elements;
        self
    }

    pub fn having(mut self, condition: Expr) -> Self {
        self.having = Some(condition);
        self
    }

    pub fn order_by(mut self, exprs: Vec<OrderByExpr>) -> Self {
        self.order_by = exprs;
        self
    }

    /// Convert to token stream for a specific dialect.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        // WITH clause
        if !self.with.is_empty() {
            ts.push(Token::With);

            // Emit RECURSIVE keyword if any CTE is recursive AND dialect supports it
            let has_recursive = self.with.iter().any(|cte| cte.recursive);
            if has_recursive && dialect.emit_recursive_keyword() {
                ts.space().push(Token::Recursive);
            }

            ts.space();
            for (i, cte) in self.with.iter().enumerate() {
                if i > 0 {
                    ts.comma().newline();
                }
                ts.append(&cte.to_tokens_for_dialect(dialect));
            }
            ts.newline();
        }

        if let Some(set_op) = &self.set_op {
            ts.append(&set_op.to_tokens_for_dialect(dialect));
        } else {
            self.emit_select_body(&mut ts, dialect);
        }

        // ORDER BY
        if !self.order_by.is_empty() {
            ts.newline().push(Token::OrderBy).space();
            for (i, order_expr) in self.order_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&order_expr.to_tokens_for_dialect(dialect));
            }
        }

        ts
    }

    fn emit_select_body(&self, ts: &mut TokenStream, dialect: Dialect) {
        // SELECT
        ts.push(Token::Select);
        if self.distinct {
            ts.space().push(Token::Distinct);
        }

        // Columns
        for (i, select_expr) in self.select.iter().enumerate() {
            if i == 0 {
                ts.newline().indent(1);
            } else {
                ts.comma().newline().indent(1);
            }
            ts.append(&select_expr.to_tokens_for_dialect(dialect));
        }

        // FROM
        if let Some(from) = &self.from {
            ts.newline().push(Token::From).space();
            ts.append(&from.to_tokens_for_dialect(dialect));
        }

        // WHERE
        if let Some(where_clause) = &self.where_clause {
            ts.newline().push(Token::Where).space();
            ts.append(&where_clause.to_tokens_for_dialect(dialect));
        }

        // GROUP BY
        if !self.group_by.is_empty() {
            ts.newline().push(Token::GroupBy).space();
            for (i, element) in self.group_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&element.to_tokens_for_dialect(dialect));
            }
        }

        // HAVING
        if let Some(having) = &self.having {
            ts.newline().push(Token::Having).space();
            ts.append(&having.to_tokens_for_dialect(dialect));
        }
    }

    /// A single SELECT without WITH, ORDER BY or set operation.
    pub fn is_plain_select(&self) -> bool {
        self.with.is_empty() && self.order_by.is_empty() && self.set_op.is_none()
    }

    /// Generate SQL string for a specific dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }

    /// Build the statement: SQL text plus bound variables in placeholder
    /// order.
    pub fn build(&self, dialect: Dialect) -> Statement {
        self.to_tokens_for_dialect(dialect).build(dialect)
    }
}

impl std::fmt::Display for Query {
    /// Formats the query using the default dialect (ANSI).
    ///
    /// For dialect-specific SQL, use [`Query::to_sql`] instead.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_sql(Dialect::default()))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::expr::{col, func, lit_int, param, table_col, ExprExt};
    use crate::sql::test_utils::{normalize, validate_sql};
    use crate::sql::types::JdbcType;

    fn sales() -> FromItem {
        FromItem::table("sales", "t1")
    }

    #[test]
    fn test_simple_select() {
        let query = Query::new()
            .select(vec![
                SelectExpr::new(table_col("t1", "region")).with_alias("v1"),
                SelectExpr::new(table_col("t1", "amount")).with_alias("v2"),
            ])
            .from(sales());

        let sql = query.to_sql(Dialect::Postgres);
        assert_eq!(
            normalize(&sql),
            "SELECT t1.region AS v1, t1.amount AS v2 FROM sales AS t1"
        );
        validate_sql(&sql, Dialect::Postgres).unwrap();
    }

    #[test]
    fn test_oracle_alias_without_as() {
        let query = Query::new().select(vec![col("a")]).from(sales());
        assert_eq!(normalize(&query.to_sql(Dialect::Oracle)), "SELECT a FROM sales t1");
    }

    #[test]
    fn test_aggregation_with_params() {
        let query = Query::new()
            .select(vec![
                table_col("t1", "region"),
                func("SUM", vec![table_col("t1", "amount")]),
            ])
            .from(sales())
            .filter(table_col("t1", "amount").gt(param("100", JdbcType::Integer)))
            .group_by(vec![GroupingElement::Expr(table_col("t1", "region"))]);

        let stmt = query.build(Dialect::Postgres);
        assert_eq!(
            normalize(stmt.sql()),
            "SELECT t1.region, SUM(t1.amount) FROM sales AS t1 WHERE t1.amount > ? GROUP BY t1.region"
        );
        assert_eq!(stmt.binds().len(), 1);
        assert_eq!(stmt.binds()[0].value(), "100");
        validate_sql(stmt.sql(), Dialect::Postgres).unwrap();
    }

    #[test]
    fn test_join_tree() {
        let from = sales().join(
            JoinType::Left,
            FromItem::table("region", "t2"),
            Some(table_col("t1", "region_id").eq(table_col("t2", "id"))),
        );
        let query = Query::new().select(vec![table_col("t2", "name")]).from(from);
        let sql = query.to_sql(Dialect::Postgres);
        assert_eq!(
            normalize(&sql),
            "SELECT t2.name FROM sales AS t1 LEFT OUTER JOIN region AS t2 ON t1.region_id = t2.id"
        );
        validate_sql(&sql, Dialect::Postgres).unwrap();
    }

    #[test]
    fn test_grouping_sets() {
        let query = Query::new()
            .select(vec![col("a"), col("b")])
            .from(sales())
            .group_by(vec![GroupingElement::GroupingSets(vec![
                vec![col("a"), col("b")],
                vec![col("a")],
                vec![],
            ])]);
        assert_eq!(
            normalize(&query.to_sql(Dialect::Postgres)),
            "SELECT a, b FROM sales AS t1 GROUP BY GROUPING SETS ((a, b), (a), ())"
        );
    }

    #[test]
    fn test_union_all_with_positional_order() {
        let a = Query::new().select(vec![col("a")]).from(sales());
        let b = Query::new()
            .select(vec![col("a")])
            .from(FromItem::table("sales_archive", "t2"));
        let query = Query::from_set_op(SetOperation::new(a).chain(SetOp::union_all(), b))
            .order_by(vec![OrderByExpr::desc(lit_int(1))]);

        let sql = query.to_sql(Dialect::Postgres);
        assert_eq!(
            normalize(&sql),
            "(SELECT a FROM sales AS t1) UNION ALL (SELECT a FROM sales_archive AS t2) ORDER BY 1 DESC"
        );
        validate_sql(&sql, Dialect::Postgres).unwrap();

        let sqlite = query.to_sql(Dialect::Sqlite);
        assert_eq!(
            normalize(&sqlite),
            "SELECT a FROM sales AS t1 UNION ALL SELECT a FROM sales_archive AS t2 ORDER BY 1 DESC"
        );

        // An operand carrying its own ORDER BY cannot stay bare.
        let nested = Query::from_set_op(
            SetOperation::new(query.clone())
                .chain(SetOp::union_all(), Query::new().select(vec![col("a")])),
        );
        assert!(normalize(&nested.to_sql(Dialect::Sqlite))
            .starts_with("SELECT * FROM (SELECT a FROM sales AS t1 UNION ALL"));
    }

    #[test]
    fn test_except_on_oracle() {
        let a = Query::new().select(vec![col("a")]).from(sales());
        let b = Query::new().select(vec![col("a")]).from(sales());
        let op = SetOp {
            kind: SetOpType::Except,
            all: false,
        };
        let query = Query::from_set_op(SetOperation::new(a).chain(op, b));
        assert!(query.to_sql(Dialect::Oracle).contains("MINUS"));
    }

    #[test]
    fn test_recursive_cte_keyword_and_columns() {
        let body = Query::new().select(vec![col("id")]).from(sales());
        let cte = Cte::recursive("tree", body).with_columns(vec!["v1".into()]);
        let query = Query::new()
            .with_cte(cte)
            .select(vec![col("v1")])
            .from(FromItem::table("tree", "t2"));

        let pg = normalize(&query.to_sql(Dialect::Postgres));
        assert!(pg.starts_with("WITH RECURSIVE tree (v1) AS ("));
        let mssql = normalize(&query.to_sql(Dialect::SqlServer));
        assert!(mssql.starts_with("WITH tree (v1) AS ("));
    }

    #[test]
    fn test_order_by_null_placement_emulated() {
        let query = Query::new()
            .select(vec![col("a")])
            .from(sales())
            .order_by(vec![
                OrderByExpr::asc(col("a")).with_nulls(Some(NullsOrder::First))
            ]);
        assert_eq!(
            normalize(&query.to_sql(Dialect::MySql)),
            "SELECT a FROM sales AS t1 ORDER BY CASE WHEN a IS NULL THEN 0 ELSE 1 END, a ASC"
        );
        assert_eq!(
            normalize(&query.to_sql(Dialect::Postgres)),
            "SELECT a FROM sales AS t1 ORDER BY a ASC NULLS FIRST"
        );
    }
}

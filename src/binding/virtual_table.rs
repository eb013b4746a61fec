//! Per-query table kinds.
//!
//! - [`CatalogOccurrence`]: one use of a catalog table under a unique alias,
//!   carrying its resolved row-level security predicate. Relations declared on
//!   the catalog table are joined in only when an imported column is used.
//! - [`DerivedTable`]: the output of a nested select or a CTE, exposing its
//!   columns positionally as `v1`, `v2`, ...
//! - [`JoinTable`]: two tables joined; column lookup walks the sides in
//!   document order.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use super::column_expr::qualify;
use super::{BindingError, BindingResult, CatalogTable, LogicalTable, Relation, ResolvedColumn};
use crate::sql::{and_all, star, table_col, Dialect, Expr, ExprExt, FromItem, JoinType, Query};

/// Positional output column name of a derived table.
pub fn output_name(position: usize) -> String {
    format!("v{}", position + 1)
}

// =============================================================================
// Catalog occurrence
// =============================================================================

/// A relation of a catalog occurrence, ready to be joined.
#[derive(Debug, Clone)]
pub struct RelationJoin {
    relation: Relation,
    target: Arc<CatalogTable>,
    alias: String,
    rls: Option<Expr>,
}

impl RelationJoin {
    pub fn new(relation: Relation, target: Arc<CatalogTable>, alias: &str) -> Self {
        Self {
            relation,
            target,
            alias: alias.to_string(),
            rls: None,
        }
    }

    pub fn with_rls(mut self, rls: Option<Expr>) -> Self {
        self.rls = rls;
        self
    }

    pub fn target(&self) -> &Arc<CatalogTable> {
        &self.target
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }
}

/// Decorator over a shared catalog table for one occurrence in a query.
#[derive(Debug)]
pub struct CatalogOccurrence {
    table: Arc<CatalogTable>,
    name: String,
    alias: String,
    dialect: Dialect,
    rls: Option<Expr>,
    relations: Vec<RelationJoin>,
    used: RefCell<Vec<bool>>,
}

impl CatalogOccurrence {
    /// `name` is the request alias, or the table name when none was given.
    pub fn new(table: Arc<CatalogTable>, name: &str, alias: &str, dialect: Dialect) -> Self {
        Self {
            table,
            name: name.to_string(),
            alias: alias.to_string(),
            dialect,
            rls: None,
            relations: Vec::new(),
            used: RefCell::new(Vec::new()),
        }
    }

    pub fn with_rls(mut self, rls: Option<Expr>) -> Self {
        self.rls = rls;
        self
    }

    pub fn with_relation(mut self, relation: RelationJoin) -> Self {
        self.relations.push(relation);
        self.used.borrow_mut().push(false);
        self
    }

    pub fn table(&self) -> &Arc<CatalogTable> {
        &self.table
    }

    /// Resolve an item of the base table only.
    pub fn own_column(&self, id: &str) -> Option<ResolvedColumn> {
        let item = self.table.item(id)?;
        let expr = Expr::Raw(qualify(&item.column, &self.alias, self.dialect));
        Some(ResolvedColumn::from_item(item, expr))
    }

    fn imported_column(&self, id: &str) -> Option<ResolvedColumn> {
        for (i, rj) in self.relations.iter().enumerate() {
            let Some(target_id) = rj
                .relation
                .columns
                .iter()
                .find(|c| rj.relation.imported_id(c) == id)
            else {
                continue;
            };
            let item = rj.target.item(target_id)?;
            if let Some(flag) = self.used.borrow_mut().get_mut(i) {
                *flag = true;
            }
            let expr = Expr::Raw(qualify(&item.column, &rj.alias, self.dialect));
            let mut column = ResolvedColumn::from_item(item, expr);
            column.id = id.to_string();
            column.key = false;
            column.parent = None;
            return Some(column);
        }
        None
    }

    fn relation_on(&self, rj: &RelationJoin) -> Option<Expr> {
        let mut parts: Vec<Expr> = rj
            .relation
            .keys
            .iter()
            .filter_map(|(local, remote)| {
                let left = self.own_column(local)?;
                let item = rj.target.item(remote)?;
                let right = Expr::Raw(qualify(&item.column, &rj.alias, self.dialect));
                Some(left.expr.eq(right))
            })
            .collect();
        parts.extend(rj.rls.clone());
        and_all(parts)
    }

    fn is_used(&self, index: usize) -> bool {
        self.used.borrow().get(index).copied().unwrap_or(false)
    }

    fn with_relations(&self, base: FromItem) -> FromItem {
        self.relations
            .iter()
            .enumerate()
            .filter(|(i, _)| self.is_used(*i))
            .fold(base, |from, (_, rj)| {
                from.join(
                    rj.relation.join,
                    FromItem::table(rj.target.table(), &rj.alias),
                    self.relation_on(rj),
                )
            })
    }
}

impl LogicalTable for CatalogOccurrence {
    fn name(&self) -> &str {
        &self.name
    }

    fn alias(&self) -> &str {
        &self.alias
    }

    fn lookup(&self, id: &str) -> Option<ResolvedColumn> {
        self.own_column(id).or_else(|| self.imported_column(id))
    }

    fn select_all(&self) -> BindingResult<Vec<ResolvedColumn>> {
        if !self.table.allow_select_all() {
            return Err(BindingError::SelectAllForbidden(self.table.name().to_string()));
        }
        Ok(self
            .table
            .items()
            .iter()
            .filter_map(|item| self.own_column(&item.id))
            .collect())
    }

    fn key_columns(&self) -> Vec<ResolvedColumn> {
        self.table
            .key_items()
            .filter_map(|item| self.own_column(&item.id))
            .collect()
    }

    fn catalog_tables(&self) -> Vec<Arc<CatalogTable>> {
        let mut tables = vec![Arc::clone(&self.table)];
        for (i, rj) in self.relations.iter().enumerate() {
            if self.is_used(i) {
                tables.push(Arc::clone(&rj.target));
            }
        }
        tables
    }

    fn rls_predicate(&self) -> Option<Expr> {
        self.rls.clone()
    }

    fn from_item(&self) -> FromItem {
        self.with_relations(FromItem::table(self.table.table(), &self.alias))
    }

    fn restricted_from_item(&self) -> FromItem {
        let base = FromItem::table(self.table.table(), &self.alias);
        let base = match &self.rls {
            None => base,
            Some(rls) => FromItem::derived(
                Query::new().select(vec![star()]).from(base).filter(rls.clone()),
                &self.alias,
            ),
        };
        self.with_relations(base)
    }
}

// =============================================================================
// Derived tables
// =============================================================================

#[derive(Debug, Clone)]
enum DerivedSource {
    Query(Box<Query>),
    /// A CTE, already rendered as an identifier.
    Named(String),
}

/// Output of a nested select or a CTE.
#[derive(Debug, Clone)]
pub struct DerivedTable {
    name: String,
    alias: String,
    source: DerivedSource,
    columns: Vec<ResolvedColumn>,
    catalog: Vec<Arc<CatalogTable>>,
}

impl DerivedTable {
    /// Rebind `outputs` positionally to `alias.v1`, `alias.v2`, ...
    fn rebind(alias: &str, outputs: Vec<ResolvedColumn>) -> Vec<ResolvedColumn> {
        outputs
            .into_iter()
            .enumerate()
            .map(|(i, mut c)| {
                c.expr = table_col(alias, &output_name(i));
                c.aggr = None;
                c
            })
            .collect()
    }

    /// A nested select used as a FROM source.
    pub fn subselect(
        name: &str,
        alias: &str,
        query: Query,
        outputs: Vec<ResolvedColumn>,
        catalog: Vec<Arc<CatalogTable>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            alias: alias.to_string(),
            source: DerivedSource::Query(Box::new(query)),
            columns: Self::rebind(alias, outputs),
            catalog,
        }
    }

    /// A reference to a CTE.
    pub fn cte(
        name: &str,
        rendered_name: &str,
        alias: &str,
        outputs: Vec<ResolvedColumn>,
        catalog: Vec<Arc<CatalogTable>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            alias: alias.to_string(),
            source: DerivedSource::Named(rendered_name.to_string()),
            columns: Self::rebind(alias, outputs),
            catalog,
        }
    }

    pub fn columns(&self) -> &[ResolvedColumn] {
        &self.columns
    }
}

impl LogicalTable for DerivedTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn alias(&self) -> &str {
        &self.alias
    }

    fn lookup(&self, id: &str) -> Option<ResolvedColumn> {
        self.columns.iter().find(|c| c.id == id).cloned()
    }

    fn select_all(&self) -> BindingResult<Vec<ResolvedColumn>> {
        Ok(self.columns.clone())
    }

    fn key_columns(&self) -> Vec<ResolvedColumn> {
        self.columns.iter().filter(|c| c.key).cloned().collect()
    }

    fn catalog_tables(&self) -> Vec<Arc<CatalogTable>> {
        self.catalog.clone()
    }

    fn rls_predicate(&self) -> Option<Expr> {
        None
    }

    fn from_item(&self) -> FromItem {
        match &self.source {
            DerivedSource::Query(query) => FromItem::derived((**query).clone(), &self.alias),
            DerivedSource::Named(name) => FromItem::table(name, &self.alias),
        }
    }
}

// =============================================================================
// Joins
// =============================================================================

/// Two tables joined.
///
/// The ON condition is set after construction because it is resolved
/// against the join itself.
#[derive(Debug)]
pub struct JoinTable {
    left: Rc<dyn LogicalTable>,
    right: Rc<dyn LogicalTable>,
    join_type: JoinType,
    on: RefCell<Option<Expr>>,
}

impl JoinTable {
    pub fn new(
        left: Rc<dyn LogicalTable>,
        join_type: JoinType,
        right: Rc<dyn LogicalTable>,
    ) -> Self {
        Self {
            left,
            right,
            join_type,
            on: RefCell::new(None),
        }
    }

    pub fn with_on(self, on: Option<Expr>) -> Self {
        self.set_on(on);
        self
    }

    /// Set the join condition.
    pub fn set_on(&self, on: Option<Expr>) {
        *self.on.borrow_mut() = on;
    }

    pub fn join_type(&self) -> JoinType {
        self.join_type
    }
}

impl LogicalTable for JoinTable {
    fn name(&self) -> &str {
        ""
    }

    fn alias(&self) -> &str {
        ""
    }

    fn lookup(&self, id: &str) -> Option<ResolvedColumn> {
        self.left.lookup(id).or_else(|| self.right.lookup(id))
    }

    fn resolve(&self, b_ref: &str) -> Option<ResolvedColumn> {
        self.left
            .resolve(b_ref)
            .or_else(|| self.right.resolve(b_ref))
    }

    fn select_all(&self) -> BindingResult<Vec<ResolvedColumn>> {
        let mut columns = self.left.select_all()?;
        columns.extend(self.right.select_all()?);
        Ok(columns)
    }

    fn key_columns(&self) -> Vec<ResolvedColumn> {
        let mut keys = self.left.key_columns();
        keys.extend(self.right.key_columns());
        keys
    }

    fn catalog_tables(&self) -> Vec<Arc<CatalogTable>> {
        let mut tables = self.left.catalog_tables();
        tables.extend(self.right.catalog_tables());
        tables
    }

    /// Security of the preserved sides; null-supplying sides are restricted
    /// in the join itself.
    fn rls_predicate(&self) -> Option<Expr> {
        let mut parts = Vec::new();
        if !self.join_type.nulls_left() {
            parts.extend(self.left.rls_predicate());
        }
        if !self.join_type.nulls_right() {
            parts.extend(self.right.rls_predicate());
        }
        and_all(parts)
    }

    fn from_item(&self) -> FromItem {
        if self.join_type == JoinType::Full {
            // Both sides are preserved and null-supplying: restrict each side
            // before joining.
            return self.left.restricted_from_item().join(
                JoinType::Full,
                self.right.restricted_from_item(),
                self.on.borrow().clone(),
            );
        }
        let mut on: Vec<Expr> = self.on.borrow().clone().into_iter().collect();
        if self.join_type.nulls_left() {
            on.extend(self.left.rls_predicate());
        }
        if self.join_type.nulls_right() {
            on.extend(self.right.rls_predicate());
        }
        let on = if self.join_type == JoinType::Cross {
            None
        } else {
            and_all(on)
        };
        self.left
            .from_item()
            .join(self.join_type, self.right.from_item(), on)
    }

    fn restricted_from_item(&self) -> FromItem {
        // Preserved-side security of a nested join moves into its ON clause.
        let mut item = self.from_item();
        if let (FromItem::Join { on, join_type, .. }, Some(rls)) = (&mut item, self.rls_predicate())
        {
            if *join_type != JoinType::Cross {
                *on = and_all(on.take().into_iter().chain([rls]).collect());
            }
        }
        item
    }
}

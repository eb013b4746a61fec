//! Binding abstraction: logical columns and logical tables.
//!
//! A *binding set* is a logical table. The catalog flavor ([`CatalogTable`])
//! maps to a physical table and is shared by every query; the virtual flavors
//! in [`virtual_table`] are built per query from a catalog occurrence, a join,
//! a sub-select or a CTE. All of them implement [`LogicalTable`].

pub mod catalog;
pub mod column_expr;
pub mod virtual_table;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sql::{star, Aggregation, Expr, FromItem, JdbcType, Query};

pub use catalog::{Catalog, CatalogError, CatalogRegistry, CatalogTable, Relation};
pub use virtual_table::{CatalogOccurrence, DerivedTable, JoinTable, RelationJoin};

/// Errors raised while resolving references against binding sets.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BindingError {
    #[error("unknown binding set '{0}'")]
    UnknownTable(String),

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("binding set '{0}' does not allow selecting all columns")]
    SelectAllForbidden(String),

    #[error("binding set '{0}' has no key columns to order a row window by")]
    MissingKeys(String),
}

pub type BindingResult<T> = Result<T, BindingError>;

/// A logical column as declared in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingItem {
    pub id: String,
    /// Physical column expression; bare column names are qualified with the
    /// table alias when used.
    pub column: String,
    #[serde(rename = "type", default)]
    pub ty: JdbcType,
    #[serde(default)]
    pub aggr: Option<Aggregation>,
    #[serde(default)]
    pub scale: Option<u32>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub key: bool,
    /// Serialize character content as escaped text rather than markup.
    #[serde(default = "default_true")]
    pub escape_xml: bool,
    /// Column this one is an attribute of.
    #[serde(default)]
    pub parent: Option<String>,
}

fn default_true() -> bool {
    true
}

impl BindingItem {
    pub fn new(id: &str, column: &str, ty: JdbcType) -> Self {
        Self {
            id: id.into(),
            column: column.into(),
            ty,
            aggr: None,
            scale: None,
            caption: None,
            key: false,
            escape_xml: true,
            parent: None,
        }
    }

    pub fn with_key(mut self) -> Self {
        self.key = true;
        self
    }
}

/// A column resolved in the context of one table occurrence: the SQL
/// expression is already qualified with that occurrence's alias.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedColumn {
    pub id: String,
    pub expr: Expr,
    pub ty: JdbcType,
    pub scale: Option<u32>,
    /// Catalog-declared aggregation; wins over the type default.
    pub aggr: Option<Aggregation>,
    pub caption: Option<String>,
    pub key: bool,
    pub escape_xml: bool,
    pub parent: Option<String>,
}

impl ResolvedColumn {
    pub fn from_item(item: &BindingItem, expr: Expr) -> Self {
        Self {
            id: item.id.clone(),
            expr,
            ty: item.ty,
            scale: item.scale,
            aggr: item.aggr,
            caption: item.caption.clone(),
            key: item.key,
            escape_xml: item.escape_xml,
            parent: item.parent.clone(),
        }
    }

    /// Aggregation to apply when this column must be aggregated.
    pub fn default_aggregation(&self) -> Aggregation {
        match self.aggr {
            Some(a) if a != Aggregation::None => a,
            _ => Aggregation::default_for(self.ty),
        }
    }
}

/// The interface every table kind exposes.
pub trait LogicalTable: std::fmt::Debug {
    /// Name the request uses to qualify this table's columns.
    fn name(&self) -> &str;

    /// SQL alias of this occurrence.
    fn alias(&self) -> &str;

    /// Look up an unqualified column id.
    fn lookup(&self, id: &str) -> Option<ResolvedColumn>;

    /// Look up a possibly qualified `name.id` reference.
    fn resolve(&self, b_ref: &str) -> Option<ResolvedColumn> {
        match b_ref.split_once('.') {
            Some((qualifier, id)) if qualifier == self.name() => self.lookup(id),
            Some(_) => None,
            None => self.lookup(b_ref),
        }
    }

    /// Columns listed by an empty select list.
    fn select_all(&self) -> BindingResult<Vec<ResolvedColumn>>;

    /// Key columns, in declaration order.
    fn key_columns(&self) -> Vec<ResolvedColumn>;

    /// Catalog tables underneath, one entry per occurrence.
    fn catalog_tables(&self) -> Vec<Arc<CatalogTable>>;

    /// Row-level security predicate to combine into WHERE.
    fn rls_predicate(&self) -> Option<Expr>;

    /// FROM clause rendering.
    fn from_item(&self) -> FromItem;

    /// FROM clause rendering with this table's own security applied inside
    /// it, for the sides of a full outer join.
    fn restricted_from_item(&self) -> FromItem {
        match self.rls_predicate() {
            None => self.from_item(),
            Some(rls) => FromItem::derived(
                Query::new()
                    .select(vec![star()])
                    .from(self.from_item())
                    .filter(rls),
                self.alias(),
            ),
        }
    }
}

//! Per-request compilation state.
//!
//! Scopes live in a table owned by the [`QueryContext`]; a select's scope
//! points at its enclosing scope by index, so correlated references resolve
//! by walking the parent chain. The context also hands out the unique table
//! aliases (`t1`, `t2`, ...) and remembers the CTEs compiled so far.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use crate::binding::{
    BindingResult, Catalog, CatalogOccurrence, CatalogTable, LogicalTable, RelationJoin,
    ResolvedColumn,
};
use crate::config::SecuritySettings;
use crate::security::{SecurityCompiler, Subject};
use crate::sql::{Dialect, Expr};

/// Index of a scope in the context's scope table.
pub type ScopeId = usize;

/// The names visible in one select.
#[derive(Debug)]
struct Scope {
    table: Option<Rc<dyn LogicalTable>>,
    parent: Option<ScopeId>,
}

/// A compiled CTE, referable by later CTEs and the main full-select.
#[derive(Debug, Clone)]
pub struct CteInfo {
    pub name: String,
    /// Name as rendered in SQL.
    pub rendered: String,
    pub outputs: Vec<ResolvedColumn>,
    pub catalog: Vec<Arc<CatalogTable>>,
}

/// Mutable state of one compilation.
pub struct QueryContext<'a> {
    catalog: &'a Catalog,
    dialect: Dialect,
    security: SecurityCompiler<'a>,
    subject: &'a dyn Subject,
    scopes: Vec<Scope>,
    alias_counter: usize,
    ctes: HashMap<String, CteInfo>,
    /// Catalog tables read so far, deduplicated by name.
    resolved: Vec<Arc<CatalogTable>>,
}

impl<'a> QueryContext<'a> {
    pub fn new(
        catalog: &'a Catalog,
        dialect: Dialect,
        settings: &'a SecuritySettings,
        subject: &'a dyn Subject,
    ) -> Self {
        Self {
            catalog,
            dialect,
            security: SecurityCompiler::new(settings, subject),
            subject,
            scopes: Vec::new(),
            alias_counter: 0,
            ctes: HashMap::new(),
            resolved: Vec::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub fn subject(&self) -> &'a dyn Subject {
        self.subject
    }

    /// Next unique table alias.
    pub fn next_alias(&mut self) -> String {
        self.alias_counter += 1;
        format!("t{}", self.alias_counter)
    }

    // =========================================================================
    // Scopes
    // =========================================================================

    pub fn push_scope(
        &mut self,
        table: Option<Rc<dyn LogicalTable>>,
        parent: Option<ScopeId>,
    ) -> ScopeId {
        self.scopes.push(Scope { table, parent });
        self.scopes.len() - 1
    }

    pub fn table(&self, scope: ScopeId) -> Option<Rc<dyn LogicalTable>> {
        self.scopes.get(scope).and_then(|s| s.table.clone())
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes.get(scope).and_then(|s| s.parent)
    }

    /// Resolve a reference in `scope` or, failing that, its enclosing
    /// scopes. Returns the column and the scope that owns it.
    pub fn resolve(&self, scope: ScopeId, b_ref: &str) -> Option<(ResolvedColumn, ScopeId)> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let found = self
                .scopes
                .get(id)
                .and_then(|s| s.table.as_ref())
                .and_then(|t| t.resolve(b_ref));
            if let Some(column) = found {
                return Some((column, id));
            }
            current = self.parent(id);
        }
        None
    }

    // =========================================================================
    // Tables
    // =========================================================================

    /// A fresh occurrence of a catalog table with its security resolved,
    /// including the security of every relation target.
    pub fn occurrence(
        &mut self,
        table: Arc<CatalogTable>,
        name: &str,
    ) -> BindingResult<CatalogOccurrence> {
        let alias = self.next_alias();
        let mut occurrence = CatalogOccurrence::new(Arc::clone(&table), name, &alias, self.dialect);
        for relation in table.relations() {
            // Targets are checked when the catalog is loaded.
            let Some(target) = self.catalog.get(&relation.target) else {
                continue;
            };
            let target_alias = self.next_alias();
            let rls = self.restriction(&target, &target_alias)?;
            occurrence = occurrence.with_relation(
                RelationJoin::new(relation.clone(), target, &target_alias).with_rls(rls),
            );
        }
        let rls = match table.security() {
            None => None,
            Some(filter) => self
                .security
                .compile(filter, &|id| occurrence.own_column(id))?
                .restriction(),
        };
        Ok(occurrence.with_rls(rls))
    }

    fn restriction(&self, table: &Arc<CatalogTable>, alias: &str) -> BindingResult<Option<Expr>> {
        let Some(filter) = table.security() else {
            return Ok(None);
        };
        let probe = CatalogOccurrence::new(Arc::clone(table), table.name(), alias, self.dialect);
        Ok(self
            .security
            .compile(filter, &|id| probe.own_column(id))?
            .restriction())
    }

    /// Record catalog tables a compiled select reads.
    pub fn record_tables(&mut self, tables: impl IntoIterator<Item = Arc<CatalogTable>>) {
        for table in tables {
            if !self.resolved.iter().any(|t| t.name() == table.name()) {
                self.resolved.push(table);
            }
        }
    }

    /// Every catalog table recorded, in first-use order.
    pub fn resolved_tables(&self) -> &[Arc<CatalogTable>] {
        &self.resolved
    }

    // =========================================================================
    // CTEs
    // =========================================================================

    pub fn register_cte(&mut self, cte: CteInfo) {
        self.ctes.insert(cte.name.clone(), cte);
    }

    pub fn cte(&self, name: &str) -> Option<&CteInfo> {
        self.ctes.get(name)
    }
}

//! The whole request: CTEs, the main full-select and read permissions.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use super::context::{CteInfo, QueryContext};
use super::full_select::compile_full_select;
use super::select::{compile_select, SelectRole};
use super::{CompileError, CompileResult, CompiledQuery};
use crate::binding::virtual_table::output_name;
use crate::binding::Catalog;
use crate::config::SecuritySettings;
use crate::request::{BoolExpr, CteDef, FromDef, SelectDef, WrqRequest};
use crate::security::Subject;
use crate::sql::{Cte, Dialect, SqlDialect};

static CTE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("CTE name pattern is valid")
});

/// Compiles requests against one catalog snapshot for one subject.
pub struct QueryBuilder<'a> {
    catalog: &'a Catalog,
    dialect: Dialect,
    security: &'a SecuritySettings,
    subject: &'a dyn Subject,
    max_rows: u64,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(
        catalog: &'a Catalog,
        dialect: Dialect,
        security: &'a SecuritySettings,
        subject: &'a dyn Subject,
    ) -> Self {
        Self {
            catalog,
            dialect,
            security,
            subject,
            max_rows: u64::MAX,
        }
    }

    /// Server-side row cap.
    pub fn with_max_rows(mut self, max_rows: u64) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Compile a request into one statement plus response metadata.
    pub fn compile(&self, request: &WrqRequest) -> CompileResult<CompiledQuery> {
        let Some(body) = &request.body else {
            warn!("request has no select; returning an empty result");
            return Ok(CompiledQuery::empty(self.dialect, self.max_rows));
        };

        let mut ctx = QueryContext::new(self.catalog, self.dialect, self.security, self.subject);
        let mut ctes = Vec::with_capacity(request.ctes.len());
        for cte in &request.ctes {
            ctes.push(self.compile_cte(&mut ctx, cte)?);
        }

        let top = compile_full_select(&mut ctx, body, true)?;
        let mut query = top.query;
        ctes.append(&mut query.with);
        query.with = ctes;

        for table in ctx.resolved_tables() {
            if let Some(right) = table.read_permission() {
                if !self.subject.has_right(right) {
                    return Err(CompileError::PermissionDenied(table.name().to_string()));
                }
            }
        }

        let statement = query.build(self.dialect);
        debug!(
            dialect = %self.dialect,
            binds = statement.binds().len(),
            sql = %statement.sql(),
            "compiled request"
        );

        let effective_cap = top
            .row_limit
            .map_or(self.max_rows, |limit| limit.min(self.max_rows));
        Ok(CompiledQuery {
            statement,
            columns: top.columns,
            effective_cap,
            requested_rows: top.row_limit,
            source_tables: ctx
                .resolved_tables()
                .iter()
                .map(|t| t.name().to_string())
                .collect(),
            empty: top.empty,
            data_source: request_data_source(request, self.catalog),
            dialect: self.dialect,
        })
    }

    fn compile_cte(&self, ctx: &mut QueryContext<'_>, def: &CteDef) -> CompileResult<Cte> {
        if !CTE_NAME.is_match(&def.name) {
            return Err(CompileError::InvalidIdentifier(def.name.clone()));
        }
        let rendered = self.dialect.render_identifier(&def.name);
        let recursive = def.body.selects().any(|s| reads_table(s, &def.name));

        if recursive {
            // The recursive members read the anchor's columns.
            let anchor = compile_select(ctx, &def.body.first, SelectRole::Member, None)?;
            ctx.register_cte(CteInfo {
                name: def.name.clone(),
                rendered: rendered.clone(),
                outputs: anchor.outputs,
                catalog: anchor.catalog,
            });
        }

        let compiled = compile_full_select(ctx, &def.body, false)?;
        let width = compiled.outputs.len();
        ctx.register_cte(CteInfo {
            name: def.name.clone(),
            rendered,
            outputs: compiled.outputs,
            catalog: compiled.catalog,
        });

        if !recursive {
            return Ok(Cte::new(&def.name, compiled.query));
        }
        let mut cte = Cte::recursive(&def.name, compiled.query);
        if self.dialect.needs_cte_column_list() {
            cte = cte.with_columns((0..width).map(output_name).collect());
        }
        Ok(cte)
    }
}

/// Whether `select` reads the table `name` in its FROM tree or its filter
/// sub-selects.
fn reads_table(select: &SelectDef, name: &str) -> bool {
    fn from_reads(from: &FromDef, name: &str) -> bool {
        match from {
            FromDef::BindingSet { name: n, .. } => n == name,
            FromDef::SubSelect(sub) => reads_table(sub, name),
            FromDef::Join { left, right, .. } => from_reads(left, name) || from_reads(right, name),
        }
    }
    fn tree_reads(tree: &BoolExpr, name: &str) -> bool {
        tree.leaves()
            .iter()
            .filter_map(|leaf| leaf.sub_select.as_deref())
            .any(|sub| reads_table(sub, name))
    }

    select.from.as_ref().is_some_and(|f| from_reads(f, name))
        || select.filter.as_ref().is_some_and(|f| tree_reads(f, name))
        || select.having.as_ref().is_some_and(|h| tree_reads(h, name))
}

/// Data source of the first catalog table the request reads, in document
/// order.
pub fn request_data_source(request: &WrqRequest, catalog: &Catalog) -> Option<String> {
    fn from_source(from: &FromDef, catalog: &Catalog) -> Option<String> {
        match from {
            FromDef::BindingSet { name, .. } => catalog
                .get(name)
                .and_then(|t| t.data_source().map(str::to_string)),
            FromDef::SubSelect(sub) => sub.from.as_ref().and_then(|f| from_source(f, catalog)),
            FromDef::Join { left, right, .. } => {
                from_source(left, catalog).or_else(|| from_source(right, catalog))
            }
        }
    }

    request
        .ctes
        .iter()
        .map(|cte| &cte.body)
        .chain(request.body.as_ref())
        .flat_map(|full| full.selects())
        .filter_map(|select| select.from.as_ref())
        .find_map(|from| from_source(from, catalog))
}

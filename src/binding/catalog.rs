//! Catalog tables and the process-wide catalog registry.
//!
//! The catalog is loaded from TOML:
//!
//! ```toml
//! [[binding_set]]
//! name = "sales"
//! table = "dw.sales"
//! data_source = "default"
//! read_permission = "sales.read"
//!
//! [[binding_set.item]]
//! id = "region"
//! column = "region_code"
//! type = "VARCHAR"
//! key = true
//!
//! [binding_set.security.subject]
//! category = "region"
//! column = "region"
//!
//! [[binding_set.relation]]
//! target = "regions"
//! keys = [["region", "code"]]
//! columns = ["name"]
//! prefix = "region_"
//! ```
//!
//! A refresh builds a whole new [`Catalog`] and swaps it in; readers holding
//! the previous `Arc<Catalog>` keep a consistent view.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::BindingItem;
use crate::security::SecurityFilter;
use crate::sql::JoinType;

/// Error type for catalog loading.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read catalog file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse catalog file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Duplicate binding set '{0}'")]
    DuplicateTable(String),

    #[error("Duplicate item '{item}' in binding set '{table}'")]
    DuplicateItem { table: String, item: String },

    #[error("Binding set '{table}': {message}")]
    Invalid { table: String, message: String },
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Relation from one catalog table to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Target binding set.
    pub target: String,
    #[serde(default = "default_join", with = "join_type_serde")]
    pub join: JoinType,
    /// Pairs of (local item id, target item id).
    pub keys: Vec<(String, String)>,
    /// Target item ids made visible on the source table.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Prefix for imported column ids.
    #[serde(default)]
    pub prefix: Option<String>,
}

fn default_join() -> JoinType {
    JoinType::Left
}

mod join_type_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::sql::JoinType;

    pub fn serialize<S: Serializer>(join: &JoinType, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(match join {
            JoinType::Inner => "inner",
            JoinType::Left => "left",
            JoinType::Right => "right",
            JoinType::Full => "full",
            JoinType::Cross => "cross",
        })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<JoinType, D::Error> {
        let s = String::deserialize(d)?;
        match s.to_ascii_lowercase().as_str() {
            "inner" => Ok(JoinType::Inner),
            "left" => Ok(JoinType::Left),
            "right" => Ok(JoinType::Right),
            "full" => Ok(JoinType::Full),
            other => Err(serde::de::Error::custom(format!(
                "unsupported relation join '{other}'"
            ))),
        }
    }
}

impl Relation {
    /// Column id under which a target item is visible on the source.
    pub fn imported_id(&self, target_item: &str) -> String {
        format!("{}{}", self.prefix.as_deref().unwrap_or(""), target_item)
    }
}

/// Raw binding set as written in the catalog file.
#[derive(Debug, Clone, Deserialize, Serialize)]
struct BindingSetDef {
    name: String,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    data_source: Option<String>,
    #[serde(default = "default_allow_select_all")]
    allow_select_all: bool,
    #[serde(default)]
    read_permission: Option<String>,
    #[serde(default, rename = "item")]
    items: Vec<BindingItem>,
    #[serde(default)]
    security: Option<SecurityFilter>,
    #[serde(default, rename = "relation")]
    relations: Vec<Relation>,
}

fn default_allow_select_all() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct CatalogFile {
    #[serde(default)]
    binding_set: Vec<BindingSetDef>,
}

/// A catalog binding set: a physical table with its logical columns.
///
/// Immutable once built and shared between queries.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogTable {
    name: String,
    table: String,
    data_source: Option<String>,
    allow_select_all: bool,
    read_permission: Option<String>,
    items: Vec<BindingItem>,
    index: HashMap<String, usize>,
    security: Option<SecurityFilter>,
    relations: Vec<Relation>,
}

impl CatalogTable {
    /// Build a table; the physical table name defaults to the logical name.
    pub fn new(name: &str, items: Vec<BindingItem>) -> CatalogResult<Self> {
        let mut index = HashMap::new();
        for (i, item) in items.iter().enumerate() {
            if index.insert(item.id.clone(), i).is_some() {
                return Err(CatalogError::DuplicateItem {
                    table: name.to_string(),
                    item: item.id.clone(),
                });
            }
        }
        Ok(Self {
            name: name.to_string(),
            table: name.to_string(),
            data_source: None,
            allow_select_all: true,
            read_permission: None,
            items,
            index,
            security: None,
            relations: Vec::new(),
        })
    }

    pub fn with_table(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self
    }

    pub fn with_data_source(mut self, data_source: &str) -> Self {
        self.data_source = Some(data_source.to_string());
        self
    }

    pub fn with_security(mut self, filter: SecurityFilter) -> Self {
        self.security = Some(filter);
        self
    }

    pub fn with_read_permission(mut self, permission: &str) -> Self {
        self.read_permission = Some(permission.to_string());
        self
    }

    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn forbid_select_all(mut self) -> Self {
        self.allow_select_all = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical table name, emitted verbatim.
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn data_source(&self) -> Option<&str> {
        self.data_source.as_deref()
    }

    pub fn allow_select_all(&self) -> bool {
        self.allow_select_all
    }

    pub fn read_permission(&self) -> Option<&str> {
        self.read_permission.as_deref()
    }

    pub fn items(&self) -> &[BindingItem] {
        &self.items
    }

    pub fn item(&self, id: &str) -> Option<&BindingItem> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    pub fn security(&self) -> Option<&SecurityFilter> {
        self.security.as_ref()
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn key_items(&self) -> impl Iterator<Item = &BindingItem> {
        self.items.iter().filter(|i| i.key)
    }
}

/// All catalog tables, by name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: HashMap<String, Arc<CatalogTable>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table, rejecting duplicate names.
    pub fn insert(&mut self, table: CatalogTable) -> CatalogResult<()> {
        if self.tables.contains_key(table.name()) {
            return Err(CatalogError::DuplicateTable(table.name().to_string()));
        }
        self.tables.insert(table.name().to_string(), Arc::new(table));
        Ok(())
    }

    pub fn with_table(mut self, table: CatalogTable) -> CatalogResult<Self> {
        self.insert(table)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<Arc<CatalogTable>> {
        self.tables.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Parse a catalog from TOML text.
    pub fn from_toml(content: &str) -> CatalogResult<Self> {
        let file: CatalogFile = toml::from_str(content)?;
        let mut catalog = Catalog::new();
        for def in file.binding_set {
            let mut table = CatalogTable::new(&def.name, def.items)?;
            if let Some(physical) = def.table {
                table = table.with_table(&physical);
            }
            table.data_source = def.data_source;
            table.allow_select_all = def.allow_select_all;
            table.read_permission = def.read_permission;
            table.security = def.security;
            table.relations = def.relations;
            catalog.insert(table)?;
        }
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> CatalogResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CatalogError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Check that relations and attribute parents point at existing items.
    fn validate(&self) -> CatalogResult<()> {
        for table in self.tables.values() {
            let invalid = |message: String| CatalogError::Invalid {
                table: table.name().to_string(),
                message,
            };
            for item in table.items() {
                if let Some(parent) = &item.parent {
                    if table.item(parent).is_none() {
                        return Err(invalid(format!(
                            "item '{}' has unknown parent '{parent}'",
                            item.id
                        )));
                    }
                }
            }
            for relation in table.relations() {
                let target = self.get(&relation.target).ok_or_else(|| {
                    invalid(format!("relation to unknown binding set '{}'", relation.target))
                })?;
                if relation.keys.is_empty() {
                    return Err(invalid(format!(
                        "relation to '{}' has no keys",
                        relation.target
                    )));
                }
                for (local, remote) in &relation.keys {
                    if table.item(local).is_none() || target.item(remote).is_none() {
                        return Err(invalid(format!(
                            "relation key {local} = {remote} names an unknown item"
                        )));
                    }
                }
                for column in &relation.columns {
                    if target.item(column).is_none() {
                        return Err(invalid(format!(
                            "relation imports unknown item '{column}'"
                        )));
                    }
                    if table.item(&relation.imported_id(column)).is_some() {
                        return Err(CatalogError::DuplicateItem {
                            table: table.name().to_string(),
                            item: relation.imported_id(column),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Versioned, swap-on-refresh handle to the current catalog.
#[derive(Debug, Default)]
pub struct CatalogRegistry {
    current: RwLock<Arc<Catalog>>,
    version: AtomicU64,
}

impl CatalogRegistry {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
            version: AtomicU64::new(1),
        }
    }

    /// The catalog as of now. Later refreshes do not affect the returned
    /// snapshot.
    pub fn snapshot(&self) -> Arc<Catalog> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Swap in a new catalog.
    pub fn replace(&self, catalog: Catalog) {
        let next = Arc::new(catalog);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
        self.version.fetch_add(1, Ordering::AcqRel);
    }

    /// Reload from a file; on error the current catalog stays in place.
    pub fn refresh_from_file<P: AsRef<Path>>(&self, path: P) -> CatalogResult<u64> {
        let catalog = Catalog::from_file(path.as_ref())?;
        let tables = catalog.len();
        self.replace(catalog);
        let version = self.version();
        info!(tables, version, "catalog refreshed");
        Ok(version)
    }
}

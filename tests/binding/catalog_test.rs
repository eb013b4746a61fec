//! Catalog files and the refreshable catalog registry.

use std::fs;

use tempfile::TempDir;
use wrq::binding::{Catalog, CatalogError, CatalogRegistry};
use wrq::sql::JdbcType;

const SALES: &str = r#"
[[binding_set]]
name = "sales"
table = "dw.fact_sales"
data_source = "warehouse"
read_permission = "sales.read"

[[binding_set.item]]
id = "id"
column = "sale_id"
type = "BIGINT"
key = true

[[binding_set.item]]
id = "amount"
column = "amount"
type = "DECIMAL"
scale = 2
aggr = "sum"

[[binding_set.item]]
id = "note"
column = "note"
type = "CLOB"
escape_xml = false

[[binding_set.item]]
id = "note_caption"
column = "note_title"
parent = "note"
"#;

fn write_catalog(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_catalog_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write_catalog(&dir, "catalog.toml", SALES);

    let catalog = Catalog::from_file(&path).unwrap();
    let sales = catalog.get("sales").unwrap();
    assert_eq!(sales.table(), "dw.fact_sales");
    assert_eq!(sales.data_source(), Some("warehouse"));
    assert_eq!(sales.read_permission(), Some("sales.read"));
    assert!(sales.allow_select_all());

    let amount = sales.item("amount").unwrap();
    assert_eq!(amount.ty, JdbcType::Decimal);
    assert_eq!(amount.scale, Some(2));
    assert!(amount.aggr.is_some());

    let note = sales.item("note").unwrap();
    assert!(!note.escape_xml);
    assert_eq!(sales.item("note_caption").unwrap().parent.as_deref(), Some("note"));
    assert_eq!(sales.key_items().map(|i| i.id.as_str()).collect::<Vec<_>>(), vec!["id"]);
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        Catalog::from_file("/nonexistent/catalog.toml"),
        Err(CatalogError::FileNotFound(_))
    ));
}

#[test]
fn test_invalid_catalogs() {
    let duplicate_table = format!("{SALES}\n{SALES}");
    assert!(matches!(
        Catalog::from_toml(&duplicate_table),
        Err(CatalogError::DuplicateTable(name)) if name == "sales"
    ));

    let unknown_parent = r#"
[[binding_set]]
name = "t"
[[binding_set.item]]
id = "a"
column = "a"
parent = "b"
"#;
    assert!(matches!(
        Catalog::from_toml(unknown_parent),
        Err(CatalogError::Invalid { table, .. }) if table == "t"
    ));

    assert!(matches!(
        Catalog::from_toml("[[binding_set]]\nname = 1"),
        Err(CatalogError::ParseError(_))
    ));
}

#[test]
fn test_registry_refresh_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write_catalog(&dir, "catalog.toml", SALES);
    let registry = CatalogRegistry::new(Catalog::new());
    let empty = registry.snapshot();

    let version = registry.refresh_from_file(&path).unwrap();
    assert_eq!(version, 2);
    assert!(empty.is_empty());
    assert!(registry.snapshot().get("sales").is_some());

    // A broken file leaves the current catalog in place.
    fs::write(&path, "[[binding_set]]\nname = ").unwrap();
    assert!(registry.refresh_from_file(&path).is_err());
    assert_eq!(registry.version(), 2);
    assert!(registry.snapshot().get("sales").is_some());
}

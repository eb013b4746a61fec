//! Integration tests for row-level security and read permissions.

use wrq::binding::Catalog;
use wrq::compiler::{CompileError, CompiledQuery, QueryBuilder};
use wrq::config::SecuritySettings;
use wrq::request::parse_request;
use wrq::security::{Permission, StaticSubject};
use wrq::sql::test_utils::{normalize, validate_sql};
use wrq::sql::Dialect;

const CATALOG: &str = r#"
[[binding_set]]
name = "sales"
read_permission = "sales.read"

[[binding_set.item]]
id = "id"
column = "id"
type = "INTEGER"
key = true

[[binding_set.item]]
id = "region"
column = "region"

[[binding_set.item]]
id = "amount"
column = "amount"
type = "DECIMAL"

[binding_set.security.subject]
category = "region"
column = "region"

[[binding_set]]
name = "regions"

[[binding_set.item]]
id = "code"
column = "code"
key = true
"#;

const REQUEST: &str = r#"<WrsRequest><Select>
    <Columns><C bRef="region"/><C bRef="amount" aggr="sum"/></Columns>
    <From><BindingSet>sales</BindingSet></From>
    <Filter><Expression bRef="amount" op="gt" value="0"/></Filter>
    <Grouping><C bRef="region"/></Grouping>
  </Select></WrsRequest>"#;

fn compile_with(
    xml: &str,
    subject: &StaticSubject,
    security: &SecuritySettings,
) -> Result<CompiledQuery, CompileError> {
    let catalog = Catalog::from_toml(CATALOG).unwrap();
    let request = parse_request(xml).unwrap();
    QueryBuilder::new(&catalog, Dialect::Postgres, security, subject).compile(&request)
}

fn compile(xml: &str, subject: &StaticSubject) -> Result<CompiledQuery, CompileError> {
    compile_with(xml, subject, &SecuritySettings::default())
}

fn reader(id: &str) -> StaticSubject {
    StaticSubject::new(id).with_right("sales.read")
}

#[test]
fn test_inline_permission_values() {
    let subject = reader("alice").with_values("region", &["EU", "US"]);
    let query = compile(REQUEST, &subject).unwrap();
    let sql = normalize(query.statement.sql());
    assert!(sql.contains("WHERE t1.amount > ? AND t1.region IN (?, ?)"), "{sql}");
    let binds: Vec<&str> = query.statement.binds().iter().map(|b| b.value()).collect();
    assert_eq!(binds, vec!["0", "EU", "US"]);
    validate_sql(query.statement.sql(), Dialect::Postgres).unwrap();
}

#[test]
fn test_no_permission_matches_nothing() {
    let query = compile(REQUEST, &reader("bob")).unwrap();
    assert!(normalize(query.statement.sql()).contains("AND 1=0"));
}

#[test]
fn test_wildcard_permission_passes() {
    let subject = reader("carol").with_permission("region", Permission::All);
    let query = compile(REQUEST, &subject).unwrap();
    let sql = normalize(query.statement.sql());
    assert!(sql.contains("WHERE t1.amount > ? GROUP BY"), "{sql}");
}

#[test]
fn test_permission_table_above_threshold() {
    let security = SecuritySettings {
        inline_threshold: 1,
        ..Default::default()
    };
    let subject = reader("dave").with_values("region", &["EU", "US", "APAC"]);
    let query = compile_with(REQUEST, &subject, &security).unwrap();
    let sql = normalize(query.statement.sql());
    assert!(sql.contains("t1.region IN (SELECT"), "{sql}");
    assert!(sql.contains("FROM wrq_permission AS wrq_perm"), "{sql}");
    let binds: Vec<&str> = query.statement.binds().iter().map(|b| b.value()).collect();
    assert_eq!(binds, vec!["0", "dave", "region"]);
}

#[test]
fn test_security_applies_inside_sub_selects() {
    let xml = r#"<Select>
        <Columns><C bRef="s.region"/></Columns>
        <From><Select alias="s">
          <Columns><C bRef="region"/></Columns>
          <From><BindingSet>sales</BindingSet></From>
        </Select></From>
      </Select>"#;
    let subject = reader("erin").with_values("region", &["EU"]);
    let query = compile(xml, &subject).unwrap();
    let sql = normalize(query.statement.sql());
    assert!(sql.contains("FROM sales AS t1 WHERE t1.region = ?)"), "{sql}");
}

#[test]
fn test_read_permission_checked_for_every_table() {
    let subject = StaticSubject::new("frank").with_values("region", &["EU"]);
    assert!(matches!(
        compile(REQUEST, &subject),
        Err(CompileError::PermissionDenied(table)) if table == "sales"
    ));

    // Tables without a declared right are readable by anyone.
    let xml = r#"<Select>
        <Columns><C bRef="code"/></Columns>
        <From><BindingSet>regions</BindingSet></From>
      </Select>"#;
    assert!(compile(xml, &subject).is_ok());
}

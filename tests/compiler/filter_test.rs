//! Integration tests for filter compilation: request document to WHERE clause.

use wrq::binding::{BindingError, Catalog};
use wrq::compiler::{CompileError, CompiledQuery, QueryBuilder};
use wrq::config::SecuritySettings;
use wrq::request::parse_request;
use wrq::security::StaticSubject;
use wrq::sql::test_utils::{normalize, validate_sql};
use wrq::sql::Dialect;

const CATALOG: &str = r#"
[[binding_set]]
name = "sales"

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

[[binding_set.item]]
id = "flags"
column = "flags"
type = "INTEGER"

[[binding_set]]
name = "regions"

[[binding_set.item]]
id = "code"
column = "code"
key = true

[[binding_set.item]]
id = "name"
column = "name"
"#;

fn compile(xml: &str, dialect: Dialect) -> Result<CompiledQuery, CompileError> {
    let catalog = Catalog::from_toml(CATALOG).unwrap();
    let request = parse_request(xml).unwrap();
    let security = SecuritySettings::default();
    let subject = StaticSubject::unrestricted("tester");
    QueryBuilder::new(&catalog, dialect, &security, &subject).compile(&request)
}

fn select_with_filter(filter: &str) -> String {
    format!(
        r#"<WrsRequest><Select>
             <Columns><C bRef="id"/><C bRef="amount"/></Columns>
             <From><BindingSet>sales</BindingSet></From>
             <Filter>{filter}</Filter>
           </Select></WrsRequest>"#
    )
}

fn binds(query: &CompiledQuery) -> Vec<&str> {
    query.statement.binds().iter().map(|b| b.value()).collect()
}

#[test]
fn test_bounds_merge_into_between() {
    let xml = select_with_filter(
        r#"<And>
             <Expression bRef="amount" op="ge" value="10"/>
             <Expression bRef="amount" op="ge" value="9"/>
             <Expression bRef="amount" op="le" value="50"/>
             <Expression bRef="region" op="in"><Value>EU</Value><Value>US</Value></Expression>
           </And>"#,
    );
    let query = compile(&xml, Dialect::Postgres).unwrap();
    let sql = normalize(query.statement.sql());
    assert!(sql.contains("t1.amount BETWEEN ? AND ?"), "{sql}");
    assert!(sql.contains("t1.region IN (?, ?)"), "{sql}");
    let values = binds(&query);
    assert_eq!(&values[..2], &["10", "50"]);
    assert!(values.contains(&"EU") && values.contains(&"US"));
    validate_sql(query.statement.sql(), Dialect::Postgres).unwrap();
}

#[test]
fn test_literals_are_always_bound() {
    let xml = select_with_filter(
        r#"<Or>
             <Expression bRef="region" value="x' OR '1'='1"/>
             <Expression bRef="region" op="like" value="E*"/>
           </Or>"#,
    );
    let query = compile(&xml, Dialect::Postgres).unwrap();
    let sql = query.statement.sql();
    assert!(!sql.contains("'1'='1"));
    assert_eq!(query.statement.placeholder_count(), query.statement.binds().len());
    assert_eq!(binds(&query), vec!["x' OR '1'='1", "E%"]);
}

#[test]
fn test_like_over_several_values() {
    let xml = select_with_filter(
        r#"<Expression bRef="amount" op="gt" value="0"/>
           <Expression bRef="region" op="like"><Value>E*</Value><Value>U*</Value></Expression>"#,
    );
    let query = compile(&xml, Dialect::Postgres).unwrap();
    let sql = normalize(query.statement.sql());
    assert!(sql.contains("(t1.region LIKE ? ESCAPE"), "{sql}");
    assert_eq!(binds(&query), vec!["0", "E%", "U%"]);
    validate_sql(query.statement.sql(), Dialect::Postgres).unwrap();
}

#[test]
fn test_not_and_absent_values() {
    let xml = select_with_filter(
        r#"<Not><Expression bRef="region"/></Not>
           <Expression bRef="amount" op="notIn"/>"#,
    );
    let query = compile(&xml, Dialect::Postgres).unwrap();
    let sql = normalize(query.statement.sql());
    assert!(sql.ends_with("WHERE NOT (t1.region IS NULL)") || sql.ends_with("WHERE NOT t1.region IS NULL"), "{sql}");
    assert!(query.statement.binds().is_empty());
}

#[test]
fn test_empty_in_list_matches_nothing() {
    let xml = select_with_filter(r#"<Expression bRef="region" op="in"/>"#);
    let query = compile(&xml, Dialect::Postgres).unwrap();
    assert!(normalize(query.statement.sql()).ends_with("WHERE 1=0"));
}

#[test]
fn test_subselect_on_the_right() {
    let xml = select_with_filter(
        r#"<Expression bRef="region" op="in">
             <Select>
               <Columns><C bRef="code"/></Columns>
               <From><BindingSet>regions</BindingSet></From>
               <Filter><Expression bRef="name" op="like" value="Eu*"/></Filter>
             </Select>
           </Expression>"#,
    );
    let query = compile(&xml, Dialect::Postgres).unwrap();
    let sql = normalize(query.statement.sql());
    assert!(sql.contains("t1.region IN (SELECT t2.code AS v1 FROM regions AS t2 WHERE t2.name LIKE ?"), "{sql}");
    assert_eq!(query.source_tables, vec!["sales".to_string(), "regions".to_string()]);
    validate_sql(query.statement.sql(), Dialect::Postgres).unwrap();
}

#[test]
fn test_bitand_per_dialect() {
    let xml = select_with_filter(r#"<Expression bRef="flags" op="bitand" value="4"/>"#);
    let oracle = compile(&xml, Dialect::Oracle).unwrap();
    assert!(normalize(oracle.statement.sql()).ends_with("WHERE BITAND(t1.flags, ?) <> 0"));
    let postgres = compile(&xml, Dialect::Postgres).unwrap();
    assert!(!postgres.statement.sql().contains("BITAND"));
}

#[test]
fn test_unknown_reference() {
    let xml = select_with_filter(r#"<Expression bRef="nope" value="1"/>"#);
    assert!(matches!(
        compile(&xml, Dialect::Postgres),
        Err(CompileError::Binding(BindingError::UnknownColumn(c))) if c == "nope"
    ));
}

#[test]
fn test_spatial_requires_support() {
    let xml = select_with_filter(r#"<Expression bRef="region" op="spatialIntersects" value="POINT(1 1)"/>"#);
    assert!(matches!(
        compile(&xml, Dialect::Sqlite),
        Err(CompileError::Unsupported { .. })
    ));
}

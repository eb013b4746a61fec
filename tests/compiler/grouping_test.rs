//! Integration tests for grouping functions, native and emulated.

use wrq::binding::Catalog;
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
id = "region"
column = "region"

[[binding_set.item]]
id = "country"
column = "country"

[[binding_set.item]]
id = "amount"
column = "amount"
type = "DECIMAL"
"#;

fn compile(xml: &str, dialect: Dialect) -> CompiledQuery {
    let catalog = Catalog::from_toml(CATALOG).unwrap();
    let request = parse_request(xml).unwrap();
    let security = SecuritySettings::default();
    let subject = StaticSubject::unrestricted("tester");
    QueryBuilder::new(&catalog, dialect, &security, &subject)
        .compile(&request)
        .unwrap()
}

fn rollup_request(ordering: &str) -> String {
    format!(
        r#"<Select>
             <Columns><C bRef="region"/><C bRef="country"/><C bRef="amount" aggr="sum"/></Columns>
             <From><BindingSet>sales</BindingSet></From>
             <Filter><Expression bRef="amount" op="gt" value="0"/></Filter>
             <Grouping><Rollup><C bRef="region"/><C bRef="country"/></Rollup></Grouping>
             {ordering}
           </Select>"#
    )
}

#[test]
fn test_native_grouping_sets() {
    let query = compile(&rollup_request(""), Dialect::Postgres);
    let sql = normalize(query.statement.sql());
    assert!(
        sql.ends_with("GROUP BY GROUPING SETS ((t1.country, t1.region), (t1.region), ())"),
        "{sql}"
    );
    assert_eq!(query.statement.binds().len(), 1);
    validate_sql(query.statement.sql(), Dialect::Postgres).unwrap();
}

#[test]
fn test_emulated_with_union_all() {
    let query = compile(&rollup_request(""), Dialect::Sqlite);
    let sql = normalize(query.statement.sql());
    assert!(!sql.contains("GROUPING SETS"), "{sql}");
    assert_eq!(sql.matches("UNION ALL").count(), 2, "{sql}");

    // Every level repeats the filter.
    let binds: Vec<&str> = query.statement.binds().iter().map(|b| b.value()).collect();
    assert_eq!(binds, vec!["0", "0", "0"]);
    assert_eq!(query.columns.len(), 3);
}

#[test]
fn test_emulated_ordering_is_positional() {
    let ordering = r#"<Ordering><C bRef="region"/><C pos="3" order="desc"/></Ordering>"#;
    let query = compile(&rollup_request(ordering), Dialect::Sqlite);
    let sql = normalize(query.statement.sql());
    assert!(sql.starts_with("SELECT t2.v1 AS v1, t2.v2 AS v2, t2.v3 AS v3 FROM"), "{sql}");
    assert!(sql.contains("ORDER BY t2.v1"), "{sql}");
    assert!(sql.contains("t2.v3 DESC"), "{sql}");
}

#[test]
fn test_single_set_is_plain_group_by() {
    let xml = r#"<Select>
        <Columns><C bRef="region"/><C bRef="amount" aggr="sum"/></Columns>
        <From><BindingSet>sales</BindingSet></From>
        <Grouping><C bRef="region"/><C bRef="region"/></Grouping>
      </Select>"#;
    let query = compile(xml, Dialect::Sqlite);
    let sql = normalize(query.statement.sql());
    assert!(sql.ends_with("GROUP BY t1.region"), "{sql}");
    assert!(!sql.contains("UNION"));
}

#[test]
fn test_cube_on_postgres() {
    let xml = r#"<Select>
        <Columns><C bRef="region"/><C bRef="country"/><C bRef="amount" aggr="sum"/></Columns>
        <From><BindingSet>sales</BindingSet></From>
        <Grouping><Cube><C bRef="region"/><C bRef="country"/></Cube></Grouping>
      </Select>"#;
    let query = compile(xml, Dialect::Postgres);
    let sql = normalize(query.statement.sql());
    assert!(sql.contains("GROUPING SETS ("), "{sql}");
    assert!(sql.contains("()"), "{sql}");
    validate_sql(query.statement.sql(), Dialect::Postgres).unwrap();
}

#[test]
fn test_cube_too_wide_is_malformed() {
    let columns: String = (0..17).map(|i| format!(r#"<C bRef="c{i}"/>"#)).collect();
    let xml = format!(
        r#"<Select>
             <Columns><C bRef="amount" aggr="sum"/></Columns>
             <From><BindingSet>sales</BindingSet></From>
             <Grouping><Cube>{columns}</Cube></Grouping>
           </Select>"#
    );
    let catalog = Catalog::from_toml(CATALOG).unwrap();
    let request = parse_request(&xml).unwrap();
    let security = SecuritySettings::default();
    let subject = StaticSubject::unrestricted("tester");
    let result = QueryBuilder::new(&catalog, Dialect::Postgres, &security, &subject).compile(&request);
    assert!(
        matches!(&result, Err(CompileError::Malformed(message)) if message.contains("cube over more than 16 columns")),
        "{result:?}"
    );
}

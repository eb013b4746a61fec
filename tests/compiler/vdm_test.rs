//! Integration tests for value-domain mappings (VDMs).

use wrq::binding::Catalog;
use wrq::compiler::{CompiledQuery, QueryBuilder};
use wrq::config::SecuritySettings;
use wrq::request::parse_request;
use wrq::security::StaticSubject;
use wrq::sql::test_utils::{normalize, validate_sql};
use wrq::sql::{Dialect, JdbcType};

const CATALOG: &str = r#"
[[binding_set]]
name = "sales"

[[binding_set.item]]
id = "country"
column = "country"

[[binding_set.item]]
id = "year"
column = "year"
type = "INTEGER"

[[binding_set.item]]
id = "amount"
column = "amount"
type = "DECIMAL"
"#;

fn compile(xml: &str) -> CompiledQuery {
    let catalog = Catalog::from_toml(CATALOG).unwrap();
    let request = parse_request(xml).unwrap();
    let security = SecuritySettings::default();
    let subject = StaticSubject::unrestricted("tester");
    QueryBuilder::new(&catalog, Dialect::Postgres, &security, &subject)
        .compile(&request)
        .unwrap()
}

#[test]
fn test_vdm_replaces_column_everywhere() {
    let xml = r#"<Select>
        <Columns><C bRef="country"/><C bRef="amount" aggr="sum"/></Columns>
        <From><BindingSet>sales</BindingSet></From>
        <Grouping><C bRef="country"/></Grouping>
        <Vdms>
          <Vdm bRef="country">
            <Map to="EU"><Value>DE</Value><Value>FR</Value></Map>
            <Rest to="Other"/>
          </Vdm>
        </Vdms>
      </Select>"#;
    let query = compile(xml);
    let sql = normalize(query.statement.sql());
    let case = "CASE WHEN t1.country IS NULL THEN NULL WHEN t1.country IN ('DE', 'FR') THEN 'EU' ELSE 'Other' END";
    assert!(sql.starts_with(&format!("SELECT {case} AS v1")), "{sql}");
    assert!(sql.ends_with(&format!("GROUP BY {case}")), "{sql}");
    assert!(query.statement.binds().is_empty());
    assert_eq!(query.columns[0].ty, JdbcType::Varchar);
    validate_sql(query.statement.sql(), Dialect::Postgres).unwrap();
}

#[test]
fn test_unmapped_values_keep_their_text() {
    let xml = r#"<Select>
        <Columns><C bRef="year"/></Columns>
        <From><BindingSet>sales</BindingSet></From>
        <Vdms>
          <Vdm bRef="year">
            <Map to="old"><Value>1999</Value></Map>
            <Map to="ignored"/>
          </Vdm>
        </Vdms>
      </Select>"#;
    let query = compile(xml);
    let sql = normalize(query.statement.sql());
    assert!(sql.contains("WHEN t1.year IS NULL THEN NULL"), "{sql}");
    assert!(sql.contains("THEN 'old' ELSE"), "{sql}");
    assert!(!sql.contains("'ignored'"), "{sql}");
    assert_eq!(query.columns[0].ty, JdbcType::Varchar);
}

#[test]
fn test_quotes_in_mapped_values() {
    let xml = r#"<Select>
        <Columns><C bRef="country"/></Columns>
        <From><BindingSet>sales</BindingSet></From>
        <Vdms>
          <Vdm bRef="country"><Map to="Island"><Value>O'Land</Value></Map></Vdm>
        </Vdms>
      </Select>"#;
    let sql = normalize(compile(xml).statement.sql());
    assert!(sql.contains("IN ('O''Land')"), "{sql}");
    assert!(sql.contains("ELSE t1.country END"), "{sql}");
}

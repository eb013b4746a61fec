//! Integration tests for single selects: columns, sources, row windows.

use insta::assert_snapshot;
use wrq::binding::{BindingError, Catalog};
use wrq::compiler::{CompileError, CompiledQuery, QueryBuilder};
use wrq::config::SecuritySettings;
use wrq::request::parse_request;
use wrq::security::StaticSubject;
use wrq::sql::test_utils::{normalize, validate_sql};
use wrq::sql::{Dialect, JdbcType};

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
id = "qty"
column = "qty"
type = "INTEGER"

[[binding_set]]
name = "regions"
allow_select_all = false

[[binding_set.item]]
id = "region"
column = "code"

[[binding_set.item]]
id = "name"
column = "name"
"#;

fn compile(xml: &str, dialect: Dialect) -> Result<CompiledQuery, CompileError> {
    let catalog = Catalog::from_toml(CATALOG).unwrap();
    let request = parse_request(xml).unwrap();
    let security = SecuritySettings::default();
    let subject = StaticSubject::unrestricted("tester");
    QueryBuilder::new(&catalog, dialect, &security, &subject)
        .with_max_rows(1000)
        .compile(&request)
}

#[test]
fn test_aggregated_select() {
    let xml = r#"<Select>
        <Columns><C bRef="region"/><C bRef="amount" aggr="sum"/></Columns>
        <From><BindingSet>sales</BindingSet></From>
        <Filter><Expression bRef="amount" op="gt" value="100"/></Filter>
        <Grouping><C bRef="region"/></Grouping>
      </Select>"#;
    let query = compile(xml, Dialect::Postgres).unwrap();
    assert_snapshot!(
        normalize(query.statement.sql()),
        @"SELECT t1.region AS v1, SUM(t1.amount) AS v2 FROM sales AS t1 WHERE t1.amount > ? GROUP BY t1.region"
    );
    assert_eq!(query.columns[0].id, "region");
    assert_eq!(query.columns[1].ty, JdbcType::Decimal);
    validate_sql(query.statement.sql(), Dialect::Postgres).unwrap();
}

#[test]
fn test_calculated_column() {
    let xml = r#"<Select>
        <Columns>
          <C bRef="gross" caption="Gross">
            <Calc>
              <Mul><ValueRef idRef="amount"/><Value>1.2</Value></Mul>
            </Calc>
          </C>
        </Columns>
        <From><BindingSet>sales</BindingSet></From>
      </Select>"#;
    let query = compile(xml, Dialect::Postgres).unwrap();
    assert!(normalize(query.statement.sql()).starts_with("SELECT (t1.amount * ?) AS v1"));
    assert_eq!(query.columns[0].caption.as_deref(), Some("Gross"));
    assert_eq!(query.columns[0].id, "gross");
    assert_eq!(query.statement.binds()[0].value(), "1.2");
}

#[test]
fn test_select_all_expands_catalog_items() {
    let xml = r#"<Select><From><BindingSet>sales</BindingSet></From></Select>"#;
    let query = compile(xml, Dialect::Postgres).unwrap();
    let ids: Vec<&str> = query.columns.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["id", "region", "amount", "qty"]);

    let forbidden = r#"<Select><From><BindingSet>regions</BindingSet></From></Select>"#;
    assert!(matches!(
        compile(forbidden, Dialect::Postgres),
        Err(CompileError::Binding(BindingError::SelectAllForbidden(_)))
    ));
}

#[test]
fn test_window_from_first_row_uses_loader_cap() {
    let xml = r#"<Select rowStart="1" rowEnd="25">
        <Columns><C bRef="region"/></Columns>
        <From><BindingSet>sales</BindingSet></From>
      </Select>"#;
    let query = compile(xml, Dialect::Postgres).unwrap();
    assert!(!query.statement.sql().contains("ROW_NUMBER"));
    assert_eq!(query.effective_cap, 25);
    assert!(!query.reports_cap());
}

#[test]
fn test_window_numbers_rows() {
    let xml = r#"<Select rowStart="5" rowEnd="9">
        <Columns><C bRef="region"/></Columns>
        <From><BindingSet>sales</BindingSet></From>
        <Ordering><C bRef="amount" order="desc"/></Ordering>
      </Select>"#;
    let query = compile(xml, Dialect::Postgres).unwrap();
    assert_snapshot!(
        normalize(query.statement.sql()),
        @"SELECT t2.v1 AS v1 FROM (SELECT t1.region AS v1, ROW_NUMBER() OVER (ORDER BY t1.amount DESC, t1.id ASC) AS rnum FROM sales AS t1) AS t2 WHERE t2.rnum BETWEEN ? AND ? ORDER BY t2.rnum"
    );
    let binds: Vec<&str> = query.statement.binds().iter().map(|b| b.value()).collect();
    assert_eq!(binds, vec!["5", "9"]);
    validate_sql(query.statement.sql(), Dialect::Postgres).unwrap();
}

#[test]
fn test_invalid_window_is_empty() {
    let xml = r#"<Select rowStart="10" rowEnd="3">
        <Columns><C bRef="region"/></Columns>
        <From><BindingSet>sales</BindingSet></From>
      </Select>"#;
    let query = compile(xml, Dialect::Postgres).unwrap();
    assert!(query.empty);
    assert_eq!(query.columns.len(), 1);
}

#[test]
fn test_window_over_grand_total() {
    let total = |start: u32| {
        format!(
            r#"<Select rowStart="{start}" rowEnd="5">
                 <Columns><C bRef="amount" aggr="sum"/></Columns>
                 <From><BindingSet>sales</BindingSet></From>
               </Select>"#
        )
    };
    for dialect in [Dialect::SqlServer, Dialect::Oracle] {
        let query = compile(&total(2), dialect).unwrap();
        assert!(query.empty);
        assert!(!query.statement.sql().contains("OVER ()"));

        let query = compile(&total(1), dialect).unwrap();
        assert!(!query.empty);
        let sql = normalize(query.statement.sql());
        assert!(!sql.contains("ROW_NUMBER"), "{sql}");
        assert!(sql.starts_with("SELECT SUM(t1.amount) AS v1 FROM sales"), "{sql}");
    }
}

#[test]
fn test_window_needs_keys() {
    let xml = r#"<Select rowStart="3" rowEnd="4">
        <Columns><C bRef="name"/></Columns>
        <From><BindingSet>regions</BindingSet></From>
      </Select>"#;
    assert!(matches!(
        compile(xml, Dialect::Postgres),
        Err(CompileError::Binding(BindingError::MissingKeys(_)))
    ));
}

#[test]
fn test_join_sources() {
    let xml = r#"<Select>
        <Columns><C bRef="s.amount"/><C bRef="r.name"/></Columns>
        <From>
          <Join type="left">
            <BindingSet alias="s">sales</BindingSet>
            <BindingSet alias="r">regions</BindingSet>
            <On><Expression bRef="s.region" bRefValue="r.region"/></On>
          </Join>
        </From>
      </Select>"#;
    let query = compile(xml, Dialect::Postgres).unwrap();
    assert_snapshot!(
        normalize(query.statement.sql()),
        @"SELECT t1.amount AS v1, t2.name AS v2 FROM sales AS t1 LEFT OUTER JOIN regions AS t2 ON t1.region = t2.code"
    );
    assert_eq!(query.source_tables, vec!["sales".to_string(), "regions".to_string()]);
}

#[test]
fn test_distinct_with_oracle_aliases() {
    let xml = r#"<Select distinct="true">
        <Columns><C bRef="region"/></Columns>
        <From><BindingSet>sales</BindingSet></From>
      </Select>"#;
    let query = compile(xml, Dialect::Oracle).unwrap();
    let sql = normalize(query.statement.sql());
    assert!(sql.starts_with("SELECT DISTINCT t1.region AS v1 FROM sales t1"), "{sql}");
}

#[test]
fn test_unknown_binding_set() {
    let xml = r#"<Select><Columns><C bRef="a"/></Columns><From><BindingSet>nope</BindingSet></From></Select>"#;
    assert!(matches!(
        compile(xml, Dialect::Postgres),
        Err(CompileError::Binding(BindingError::UnknownTable(t))) if t == "nope"
    ));
}

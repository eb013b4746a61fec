//! Integration tests for set operations and common table expressions.

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
data_source = "dw"

[[binding_set.item]]
id = "region"
column = "region"
key = true

[[binding_set.item]]
id = "amount"
column = "amount"
type = "DECIMAL"

[[binding_set]]
name = "sales_archive"
data_source = "dw"

[[binding_set.item]]
id = "region"
column = "region"
key = true

[[binding_set.item]]
id = "amount"
column = "amount"
type = "DECIMAL"

[[binding_set]]
name = "employees"
data_source = "hr"

[[binding_set.item]]
id = "id"
column = "id"
type = "INTEGER"
key = true

[[binding_set.item]]
id = "manager"
column = "manager_id"
type = "INTEGER"
"#;

fn compile(xml: &str, dialect: Dialect) -> Result<CompiledQuery, CompileError> {
    let catalog = Catalog::from_toml(CATALOG).unwrap();
    let request = parse_request(xml).unwrap();
    let security = SecuritySettings::default();
    let subject = StaticSubject::unrestricted("tester");
    QueryBuilder::new(&catalog, dialect, &security, &subject).compile(&request)
}

#[test]
fn test_union_all_with_positional_ordering() {
    let xml = r#"<SelectList>
        <Select>
          <Columns><C bRef="region"/><C bRef="amount"/></Columns>
          <From><BindingSet>sales</BindingSet></From>
        </Select>
        <UnionAll/>
        <Select>
          <Columns><C bRef="region"/><C bRef="amount"/></Columns>
          <From><BindingSet>sales_archive</BindingSet></From>
          <Filter><Expression bRef="amount" op="gt" value="0"/></Filter>
        </Select>
        <Ordering><C pos="2" order="desc"/></Ordering>
      </SelectList>"#;
    let query = compile(xml, Dialect::Postgres).unwrap();
    let sql = normalize(query.statement.sql());
    assert!(sql.contains("UNION ALL"), "{sql}");
    assert!(sql.ends_with("ORDER BY 2 DESC"), "{sql}");
    assert_eq!(query.columns.len(), 2);
    assert_eq!(
        query.source_tables,
        vec!["sales".to_string(), "sales_archive".to_string()]
    );
    assert_eq!(query.data_source.as_deref(), Some("dw"));
    validate_sql(query.statement.sql(), Dialect::Postgres).unwrap();
}

#[test]
fn test_adjacent_selects_union() {
    let xml = r#"<SelectList>
        <Select><Columns><C bRef="region"/></Columns><From><BindingSet>sales</BindingSet></From></Select>
        <Select><Columns><C bRef="region"/></Columns><From><BindingSet>sales_archive</BindingSet></From></Select>
      </SelectList>"#;
    let query = compile(xml, Dialect::Postgres).unwrap();
    let sql = normalize(query.statement.sql());
    assert!(sql.contains(" UNION "), "{sql}");
    assert!(!sql.contains("UNION ALL"), "{sql}");
}

#[test]
fn test_ordering_by_missing_position() {
    let xml = r#"<SelectList>
        <Select><Columns><C bRef="region"/></Columns><From><BindingSet>sales</BindingSet></From></Select>
        <Except/>
        <Select><Columns><C bRef="region"/></Columns><From><BindingSet>sales_archive</BindingSet></From></Select>
        <Ordering><C pos="4"/></Ordering>
      </SelectList>"#;
    assert!(matches!(
        compile(xml, Dialect::Postgres),
        Err(CompileError::Malformed(_))
    ));
}

#[test]
fn test_common_table_expression() {
    let xml = r#"<WrsRequest>
        <With>
          <Cte name="big">
            <Select>
              <Columns><C bRef="region"/><C bRef="amount" aggr="sum"/></Columns>
              <From><BindingSet>sales</BindingSet></From>
              <Grouping><C bRef="region"/></Grouping>
            </Select>
          </Cte>
        </With>
        <Select>
          <Columns><C bRef="region"/></Columns>
          <From><BindingSet>big</BindingSet></From>
        </Select>
      </WrsRequest>"#;
    let query = compile(xml, Dialect::Postgres).unwrap();
    let sql = normalize(query.statement.sql());
    assert!(sql.starts_with("WITH big AS (SELECT t1.region AS v1, SUM(t1.amount) AS v2 FROM sales AS t1 GROUP BY t1.region)"), "{sql}");
    assert!(sql.contains("FROM big AS t2"), "{sql}");
    assert_eq!(query.source_tables, vec!["sales".to_string()]);
    assert_eq!(query.data_source.as_deref(), Some("dw"));
    validate_sql(query.statement.sql(), Dialect::Postgres).unwrap();
}

#[test]
fn test_recursive_common_table_expression() {
    let xml = r#"<WrsRequest>
        <With>
          <Cte name="tree">
            <SelectList>
              <Select>
                <Columns><C bRef="id"/><C bRef="manager"/></Columns>
                <From><BindingSet>employees</BindingSet></From>
                <Filter><Expression bRef="manager"/></Filter>
              </Select>
              <UnionAll/>
              <Select>
                <Columns><C bRef="e.id"/><C bRef="e.manager"/></Columns>
                <From>
                  <Join type="inner">
                    <BindingSet alias="e">employees</BindingSet>
                    <BindingSet>tree</BindingSet>
                    <On><Expression bRef="e.manager" bRefValue="tree.id"/></On>
                  </Join>
                </From>
              </Select>
            </SelectList>
          </Cte>
        </With>
        <Select>
          <Columns><C bRef="id"/></Columns>
          <From><BindingSet>tree</BindingSet></From>
        </Select>
      </WrsRequest>"#;
    let postgres = compile(xml, Dialect::Postgres).unwrap();
    let sql = normalize(postgres.statement.sql());
    assert!(sql.starts_with("WITH RECURSIVE tree AS ("), "{sql}");
    assert!(sql.contains("INNER JOIN tree AS"), "{sql}");
    assert_eq!(postgres.data_source.as_deref(), Some("hr"));

    let oracle = compile(xml, Dialect::Oracle).unwrap();
    assert!(oracle.statement.sql().starts_with("WITH tree (v1, v2) AS ("));
}

#[test]
fn test_cte_name_must_be_an_identifier() {
    let xml = r#"<WrsRequest>
        <With><Cte name="1st">
          <Select><Columns><C bRef="id"/></Columns><From><BindingSet>employees</BindingSet></From></Select>
        </Cte></With>
        <Select><Columns><C bRef="id"/></Columns><From><BindingSet>employees</BindingSet></From></Select>
      </WrsRequest>"#;
    assert!(matches!(
        compile(xml, Dialect::Postgres),
        Err(CompileError::InvalidIdentifier(name)) if name == "1st"
    ));
}

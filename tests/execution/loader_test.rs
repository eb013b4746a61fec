//! End-to-end tests: request document to Wrs XML over in-memory SQLite.

use wrq::binding::{Catalog, CatalogRegistry};
use wrq::compiler::CompileError;
use wrq::config::SecuritySettings;
use wrq::execution::{
    DataLoader, ExecutionError, LoadError, LoadResult, LoadSummary, RequestOptions,
    SqliteConnectionManager,
};
use wrq::request::parse_request;
use wrq::security::StaticSubject;
use wrq::writer::{WriterOptions, WrsWriter};

const CATALOG: &str = r#"
[[binding_set]]
name = "sales"
data_source = "default"

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
type = "DOUBLE"

[[binding_set.item]]
id = "ghost"
column = "ghost"

[binding_set.security.subject]
category = "region"
column = "region"

[[binding_set.relation]]
target = "regions"
keys = [["region", "code"]]
columns = ["name"]
prefix = "region_"

[[binding_set]]
name = "regions"
data_source = "default"
read_permission = "regions.read"

[[binding_set.item]]
id = "code"
column = "code"
key = true

[[binding_set.item]]
id = "name"
column = "name"

[[binding_set]]
name = "people"
data_source = "hr"

[[binding_set.item]]
id = "id"
column = "id"
type = "INTEGER"
key = true

[[binding_set.item]]
id = "name"
column = "name"

[[binding_set]]
name = "lost"
data_source = "archive"

[[binding_set.item]]
id = "id"
column = "id"
"#;

fn connections() -> SqliteConnectionManager {
    let manager = SqliteConnectionManager::in_memory("default")
        .unwrap()
        .with_connection("hr", rusqlite::Connection::open_in_memory().unwrap());
    manager
        .execute_batch(
            Some("default"),
            "CREATE TABLE sales (id INTEGER, region TEXT, amount REAL);
             INSERT INTO sales VALUES (1, 'EU', 10.5), (2, 'EU', 20.0), (3, 'US', 5.25), (4, 'APAC', 7.0);
             CREATE TABLE regions (code TEXT, name TEXT);
             INSERT INTO regions VALUES ('EU', 'Europe'), ('US', 'United States');",
        )
        .unwrap();
    manager
        .execute_batch(
            Some("hr"),
            "CREATE TABLE people (id INTEGER, name TEXT);
             INSERT INTO people VALUES (7, 'Ada');",
        )
        .unwrap();
    manager
}

fn everyone() -> StaticSubject {
    StaticSubject::unrestricted("tester").with_right("regions.read")
}

fn load_with(
    xml: &str,
    subject: &StaticSubject,
    debug: bool,
    max_rows: u64,
) -> (LoadResult<LoadSummary>, String) {
    let catalogs = CatalogRegistry::new(Catalog::from_toml(CATALOG).unwrap());
    let connections = connections();
    let request = parse_request(xml).unwrap();
    let security = SecuritySettings::default();
    let loader = DataLoader::new(RequestOptions {
        request: &request,
        catalogs: &catalogs,
        connections: &connections,
        subject,
        security: &security,
        debug,
        max_rows,
    });
    let mut writer = WrsWriter::new(Vec::new(), WriterOptions { debug });
    let result = loader.load(&mut writer);
    (result, String::from_utf8(writer.into_inner()).unwrap())
}

fn load(xml: &str) -> (LoadSummary, String) {
    let (result, out) = load_with(xml, &everyone(), false, 1000);
    (result.unwrap(), out)
}

#[test]
fn test_filtered_and_ordered() {
    let (summary, xml) = load(
        r#"<WrsRequest><Select>
             <Columns><C bRef="id"/><C bRef="amount"/></Columns>
             <From><BindingSet>sales</BindingSet></From>
             <Filter><Expression bRef="amount" op="gt" value="6"/></Filter>
             <Ordering><C bRef="amount" order="desc"/></Ordering>
           </Select></WrsRequest>"#,
    );
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.columns, 2);
    assert!(xml.contains(
        "<Data><R id=\"R1\"><C>2</C><C>20</C></R><R id=\"R2\"><C>1</C><C>10.5</C></R>\
         <R id=\"R3\"><C>4</C><C>7</C></R></Data>"
    ), "{xml}");
    assert!(!xml.contains("Footer"));
}

#[test]
fn test_row_level_security() {
    let subject = StaticSubject::new("eve").with_values("region", &["EU"]);
    let (result, xml) = load_with(
        r#"<Select>
             <Columns><C bRef="id"/></Columns>
             <From><BindingSet>sales</BindingSet></From>
             <Ordering><C bRef="id"/></Ordering>
           </Select>"#,
        &subject,
        false,
        1000,
    );
    assert_eq!(result.unwrap().rows, 2);
    assert!(xml.contains("<R id=\"R1\"><C>1</C></R><R id=\"R2\"><C>2</C></R></Data>"));
}

#[test]
fn test_relation_columns_join_in() {
    let (summary, xml) = load(
        r#"<Select>
             <Columns><C bRef="id"/><C bRef="region_name"/></Columns>
             <From><BindingSet>sales</BindingSet></From>
             <Ordering><C bRef="id"/></Ordering>
           </Select>"#,
    );
    assert_eq!(summary.rows, 4);
    assert!(xml.contains("<R id=\"R1\"><C>1</C><C>Europe</C></R>"), "{xml}");
    assert!(xml.contains("<R id=\"R4\"><C>4</C><C><null/></C></R>"), "{xml}");
}

#[test]
fn test_emulated_rollup_executes() {
    let (summary, xml) = load(
        r#"<Select>
             <Columns><C bRef="region"/><C bRef="amount" aggr="sum"/></Columns>
             <From><BindingSet>sales</BindingSet></From>
             <Grouping><Rollup><C bRef="region"/></Rollup></Grouping>
           </Select>"#,
    );
    // Three regions plus the grand total.
    assert_eq!(summary.rows, 4);
    assert!(xml.contains("<C><null/></C><C>42.75</C>"), "{xml}");
}

#[test]
fn test_routes_to_the_table_data_source() {
    let (summary, xml) = load(
        r#"<Select>
             <Columns><C bRef="name"/></Columns>
             <From><BindingSet>people</BindingSet></From>
           </Select>"#,
    );
    assert_eq!(summary.rows, 1);
    assert!(xml.contains("<R id=\"R1\"><C>Ada</C></R>"));
}

#[test]
fn test_outer_table_picks_the_data_source() {
    let xml = r#"<Select>
        <Columns><C bRef="id"/></Columns>
        <From><BindingSet>sales</BindingSet></From>
        <Filter>
          <Expression bRef="id" op="in">
            <Select>
              <Columns><C bRef="id"/></Columns>
              <From><BindingSet>people</BindingSet></From>
            </Select>
          </Expression>
        </Filter>
      </Select>"#;
    let catalogs = CatalogRegistry::new(Catalog::from_toml(CATALOG).unwrap());
    let connections = connections();
    let request = parse_request(xml).unwrap();
    let subject = everyone();
    let security = SecuritySettings::default();
    let loader = DataLoader::new(RequestOptions {
        request: &request,
        catalogs: &catalogs,
        connections: &connections,
        subject: &subject,
        security: &security,
        debug: false,
        max_rows: 1000,
    });
    let query = loader.compile().unwrap();
    assert_eq!(query.data_source.as_deref(), Some("default"));
    assert!(query.source_tables.contains(&"people".to_string()));
}

#[test]
fn test_unknown_data_source() {
    let (result, _) = load_with(
        r#"<Select><Columns><C bRef="id"/></Columns><From><BindingSet>lost</BindingSet></From></Select>"#,
        &everyone(),
        false,
        1000,
    );
    assert!(matches!(
        result,
        Err(LoadError::Execution(ExecutionError::UnknownDataSource(name))) if name == "archive"
    ));
}

#[test]
fn test_execution_error_carries_statement_when_debugging() {
    let xml = r#"<Select><Columns><C bRef="ghost"/></Columns><From><BindingSet>sales</BindingSet></From></Select>"#;

    let (result, _) = load_with(xml, &everyone(), true, 1000);
    match result {
        Err(LoadError::Statement { sql, .. }) => assert!(sql.contains("t1.ghost"), "{sql}"),
        other => panic!("expected a statement error, got {other:?}"),
    }

    let (result, _) = load_with(xml, &everyone(), false, 1000);
    assert!(matches!(
        result,
        Err(LoadError::Execution(ExecutionError::Sqlite(_)))
    ));
}

#[test]
fn test_malformed_request_yields_empty_document() {
    let (summary, xml) = load(
        r#"<SelectList>
             <Select><Columns><C bRef="id"/></Columns><From><BindingSet>sales</BindingSet></From></Select>
             <Select><Columns><C bRef="id"/></Columns><From><BindingSet>sales</BindingSet></From></Select>
             <Ordering><C pos="9"/></Ordering>
           </SelectList>"#,
    );
    assert_eq!(summary.rows, 0);
    assert!(xml.ends_with("<Data></Data></Wrs>"), "{xml}");
}

#[test]
fn test_missing_read_permission() {
    let subject = StaticSubject::unrestricted("mallory");
    let (result, xml) = load_with(
        r#"<Select><Columns><C bRef="name"/></Columns><From><BindingSet>regions</BindingSet></From></Select>"#,
        &subject,
        false,
        1000,
    );
    assert!(matches!(
        result,
        Err(LoadError::Compile(CompileError::PermissionDenied(table))) if table == "regions"
    ));
    assert!(xml.is_empty());
}

#[test]
fn test_debug_output() {
    let (result, xml) = load_with(
        r#"<Select><Columns><C bRef="id"/></Columns><From><BindingSet>people</BindingSet></From></Select>"#,
        &everyone(),
        true,
        1000,
    );
    result.unwrap();
    assert!(xml.contains("<Debug><SelectStatement>SELECT"), "{xml}");
    assert!(xml.contains("people AS t1"), "{xml}");
    assert!(xml.contains("<ExecuteDuration ms=\""));
    assert!(xml.contains("<Footer><WriteDuration ms=\""));
}

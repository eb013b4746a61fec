//! Row windows and row caps, executed against in-memory SQLite.

use wrq::binding::{Catalog, CatalogRegistry};
use wrq::config::SecuritySettings;
use wrq::execution::{DataLoader, LoadSummary, RequestOptions, SqliteConnectionManager};
use wrq::request::parse_request;
use wrq::security::StaticSubject;
use wrq::writer::{WriterOptions, WrsWriter};

const CATALOG: &str = r#"
[[binding_set]]
name = "items"

[[binding_set.item]]
id = "id"
column = "id"
type = "INTEGER"
key = true

[[binding_set.item]]
id = "grp"
column = "grp"

[[binding_set.item]]
id = "weight"
column = "weight"
type = "INTEGER"
"#;

fn load(xml: &str, max_rows: u64) -> (LoadSummary, String) {
    let catalogs = CatalogRegistry::new(Catalog::from_toml(CATALOG).unwrap());
    let connections = SqliteConnectionManager::in_memory("default").unwrap();
    connections
        .execute_batch(
            None,
            "CREATE TABLE items (id INTEGER, grp TEXT, weight INTEGER);
             INSERT INTO items VALUES
               (1, 'a', 50), (2, 'b', 40), (3, 'a', 40), (4, 'c', 10),
               (5, 'b', 90), (6, 'c', 70), (7, 'a', 20), (8, 'b', 60);",
        )
        .unwrap();
    let request = parse_request(xml).unwrap();
    let subject = StaticSubject::unrestricted("tester");
    let security = SecuritySettings::default();
    let loader = DataLoader::new(RequestOptions {
        request: &request,
        catalogs: &catalogs,
        connections: &connections,
        subject: &subject,
        security: &security,
        debug: false,
        max_rows,
    });
    let mut writer = WrsWriter::new(Vec::new(), WriterOptions::default());
    let summary = loader.load(&mut writer).unwrap();
    (summary, String::from_utf8(writer.into_inner()).unwrap())
}

/// The first cell of every row, in order.
fn first_cells(xml: &str) -> Vec<String> {
    xml.split("<R id=")
        .skip(1)
        .filter_map(|row| {
            let start = row.find("<C>")? + 3;
            let end = row[start..].find("</C>")? + start;
            Some(row[start..end].to_string())
        })
        .collect()
}

fn window(start: u64, end: u64) -> String {
    format!(
        r#"<Select rowStart="{start}" rowEnd="{end}">
             <Columns><C bRef="id"/><C bRef="weight"/></Columns>
             <From><BindingSet>items</BindingSet></From>
             <Ordering><C bRef="weight" order="desc"/></Ordering>
           </Select>"#
    )
}

#[test]
fn test_window_with_ties_is_deterministic() {
    // weight desc: 5(90) 6(70) 8(60) 1(50) 2(40) 3(40) 7(20) 4(10); ties by key.
    let (summary, xml) = load(&window(4, 6), 1000);
    assert_eq!(summary.rows, 3);
    assert_eq!(first_cells(&xml), vec!["1", "2", "3"]);
    assert!(xml.contains("<R id=\"R1\"><C>1</C><C>50</C></R>"), "{xml}");
}

#[test]
fn test_window_past_the_end() {
    let (summary, xml) = load(&window(7, 20), 1000);
    assert_eq!(summary.rows, 2);
    assert_eq!(first_cells(&xml), vec!["7", "4"]);
    assert!(!xml.contains("MaxRowsExceeded"));
}

#[test]
fn test_window_from_first_row_is_truncated_by_loader() {
    let (summary, xml) = load(&window(1, 3), 1000);
    assert_eq!(summary.rows, 3);
    assert!(!summary.max_rows_exceeded);
    assert_eq!(first_cells(&xml), vec!["5", "6", "8"]);
}

#[test]
fn test_server_cap_below_requested_rows() {
    let (summary, xml) = load(&window(1, 5), 2);
    assert_eq!(summary.rows, 2);
    assert!(summary.max_rows_exceeded);
    assert!(xml.ends_with("<Footer><MaxRowsExceeded>2</MaxRowsExceeded></Footer></Wrs>"), "{xml}");
}

#[test]
fn test_cap_on_unbounded_request() {
    let xml = r#"<Select>
        <Columns><C bRef="id"/></Columns>
        <From><BindingSet>items</BindingSet></From>
        <Ordering><C bRef="id"/></Ordering>
      </Select>"#;
    let (summary, out) = load(xml, 8);
    assert_eq!(summary.rows, 8);
    assert!(!summary.max_rows_exceeded);

    let (summary, out_capped) = load(xml, 5);
    assert_eq!(summary.rows, 5);
    assert!(summary.max_rows_exceeded);
    assert!(!out.contains("Footer"));
    assert!(out_capped.contains("<MaxRowsExceeded>5</MaxRowsExceeded>"));
}

#[test]
fn test_empty_window_keeps_header() {
    let (summary, xml) = load(&window(6, 2), 1000);
    assert_eq!(summary.rows, 0);
    assert!(xml.contains("<C pos=\"1\" id=\"id\" type-name=\"INTEGER\"/>"), "{xml}");
    assert!(xml.contains("<Data></Data>"));
}

#[test]
fn test_window_over_distinct_values() {
    let xml = r#"<Select distinct="true" rowStart="2" rowEnd="3">
        <Columns><C bRef="grp"/></Columns>
        <From><BindingSet>items</BindingSet></From>
        <Ordering><C bRef="grp"/></Ordering>
      </Select>"#;
    let (summary, out) = load(xml, 1000);
    assert_eq!(summary.rows, 2);
    assert_eq!(first_cells(&out), vec!["b", "c"]);
}

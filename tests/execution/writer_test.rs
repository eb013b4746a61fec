//! Typed cell rendering, executed against in-memory SQLite.

use wrq::binding::{Catalog, CatalogRegistry};
use wrq::config::SecuritySettings;
use wrq::execution::{DataLoader, LoadSummary, RequestOptions, SqliteConnectionManager};
use wrq::request::parse_request;
use wrq::security::StaticSubject;
use wrq::writer::{WriterOptions, WrsWriter};

const CATALOG: &str = r#"
[[binding_set]]
name = "docs"

[[binding_set.item]]
id = "id"
column = "id"
type = "INTEGER"
key = true

[[binding_set.item]]
id = "title"
column = "title"
caption = "Title"

[[binding_set.item]]
id = "created"
column = "created"
type = "TIMESTAMP"

[[binding_set.item]]
id = "stamp"
column = "stamp"
type = "TIMESTAMP"

[[binding_set.item]]
id = "day"
column = "day"
type = "DATE"

[[binding_set.item]]
id = "active"
column = "active"
type = "BOOLEAN"

[[binding_set.item]]
id = "payload"
column = "payload"
type = "BLOB"

[[binding_set.item]]
id = "ratio"
column = "ratio"
type = "DOUBLE"
scale = 2

[[binding_set.item]]
id = "body"
column = "body"
type = "XML"
escape_xml = false
"#;

const ROWS: &str = "
CREATE TABLE docs (
  id INTEGER, title TEXT, created TIMESTAMP, stamp INTEGER, day DATE,
  active BOOLEAN, payload BLOB, ratio REAL, body TEXT
);
INSERT INTO docs VALUES
  (1, 'Fish & <Chips>', '2024-03-01 13:05:09', 0, '2024-03-01', 1, X'68656C6C6F', 3.14159, '<p>hi <b>there</b></p>'),
  (2, 'Plain', '2024-03-02T08:00:00.250', 86400, '2024-03-02 00:00:00', 0, NULL, NULL, '<p>unclosed'),
  (3, NULL, NULL, NULL, NULL, NULL, NULL, 0.5, NULL);
";

fn load(xml: &str) -> (LoadSummary, String) {
    let catalogs = CatalogRegistry::new(Catalog::from_toml(CATALOG).unwrap());
    let connections = SqliteConnectionManager::in_memory("default").unwrap();
    connections.execute_batch(None, ROWS).unwrap();
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
        max_rows: 100,
    });
    let mut writer = WrsWriter::new(Vec::new(), WriterOptions::default());
    let summary = loader.load(&mut writer).unwrap();
    (summary, String::from_utf8(writer.into_inner()).unwrap())
}

fn select(columns: &str, filter: &str) -> String {
    format!(
        r#"<Select>
             <Columns>{columns}</Columns>
             <From><BindingSet>docs</BindingSet></From>
             <Filter>{filter}</Filter>
             <Ordering><C bRef="id"/></Ordering>
           </Select>"#
    )
}

#[test]
fn test_temporal_cells() {
    let xml = select(
        r#"<C bRef="created"/><C bRef="stamp"/><C bRef="day"/>"#,
        r#"<Expression bRef="id" op="le" value="2"/>"#,
    );
    let (summary, out) = load(&xml);
    assert_eq!(summary.rows, 2);
    assert!(out.contains(
        "<R id=\"R1\"><C>2024-03-01T13:05:09</C><C>1970-01-01T00:00:00</C><C>2024-03-01</C></R>"
    ), "{out}");
    assert!(out.contains(
        "<R id=\"R2\"><C>2024-03-02T08:00:00.250</C><C>1970-01-02T00:00:00</C><C>2024-03-02</C></R>"
    ), "{out}");
}

#[test]
fn test_boolean_blob_and_scaled_cells() {
    let xml = select(
        r#"<C bRef="active"/><C bRef="payload"/><C bRef="ratio"/>"#,
        "",
    );
    let (_, out) = load(&xml);
    assert!(out.contains("<R id=\"R1\"><C>true</C><C>aGVsbG8=</C><C>3.14</C></R>"), "{out}");
    assert!(out.contains("<R id=\"R2\"><C>false</C><C><null/></C><C><null/></C></R>"), "{out}");
    assert!(out.contains("<R id=\"R3\"><C><null/></C><C><null/></C><C>0.50</C></R>"), "{out}");
    assert!(out.contains("<C pos=\"3\" id=\"ratio\" type-name=\"DOUBLE\" scale=\"2\"/>"), "{out}");
}

#[test]
fn test_text_is_escaped_and_captioned() {
    let xml = select(
        r#"<C bRef="id"><A name="label" bRef="title"/></C>"#,
        r#"<Expression bRef="id" value="1"/>"#,
    );
    let (_, out) = load(&xml);
    assert!(out.contains("<R id=\"R1\"><C label=\"Fish &amp; &lt;Chips&gt;\">1</C></R>"), "{out}");
    assert!(out.contains("<A id=\"title\" name=\"label\" type-name=\"VARCHAR\"/>"), "{out}");
}

#[test]
fn test_null_attribute_is_omitted() {
    let xml = select(
        r#"<C bRef="id"><A name="label" bRef="title"/></C>"#,
        r#"<Expression bRef="id" value="3"/>"#,
    );
    let (_, out) = load(&xml);
    assert!(out.contains("<R id=\"R1\"><C>3</C></R>"), "{out}");
}

#[test]
fn test_markup_cells_and_failures() {
    let xml = select(r#"<C bRef="body"/><C bRef="id"/>"#, "");
    let (summary, out) = load(&xml);
    assert_eq!(summary.rows, 3);
    assert!(out.contains("<R id=\"R1\"><C><p>hi <b>there</b></p></C><C>1</C></R>"), "{out}");
    // The broken row keeps its place, the rest of the document is intact.
    assert!(out.contains("<R id=\"R2\"><C/><C/></R>"), "{out}");
    assert!(out.contains("<R id=\"R3\"><C><null/></C><C>3</C></R>"), "{out}");
    assert!(out.contains("<Footer><Error>row R2, column body"), "{out}");
}

#[test]
fn test_timestamp_parameter() {
    let xml = select(
        r#"<C bRef="id"/>"#,
        r#"<Expression bRef="created" op="ge" value="2024-03-02"/>"#,
    );
    let (summary, out) = load(&xml);
    assert_eq!(summary.rows, 1);
    assert!(out.contains("<R id=\"R1\"><C>2</C></R>"), "{out}");
}

//! Wrs result documents.
//!
//! ```text
//! <Wrs>
//!   <Header> binding sets, columns, debug </Header>
//!   <Data> <R id="R1"><C>..</C></R> .. </Data>
//!   <Footer> max rows, error, write duration </Footer>
//! </Wrs>
//! ```
//!
//! Rows are streamed as they are read. A cell that cannot be rendered ends
//! its row with empty cells and is reported once in the footer; the document
//! stays well-formed.

pub mod format;

use std::io::Write;
use std::time::{Duration, Instant};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;
use tracing::warn;

use crate::compiler::{CompiledQuery, OutputColumn};
use crate::execution::ResultSet;
use crate::sql::JdbcType;

pub use format::{format_value, parse_markup};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("cannot render cell: {0}")]
    Cell(String),

    #[error("cell is not well-formed markup: {0}")]
    Markup(String),

    #[error("a result was already written")]
    AlreadyWritten,
}

impl WriteError {
    pub(crate) fn cell(message: impl Into<String>) -> Self {
        WriteError::Cell(message.into())
    }
}

pub type WriteResult<T> = Result<T, WriteError>;

// ============================================================================
// Writer
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct WriterOptions {
    /// Include the statement and timings.
    pub debug: bool,
}

/// Serializes one compiled query and its results.
pub trait ResultWriter {
    /// Write the whole document. `results` is `None` when nothing was
    /// executed.
    fn write(
        &mut self,
        query: &CompiledQuery,
        results: Option<&mut dyn ResultSet>,
        execute: Duration,
    ) -> WriteResult<()>;

    fn row_count(&self) -> u64;

    fn column_count(&self) -> usize;

    /// More rows were available than the effective cap.
    fn max_rows_exceeded(&self) -> bool;

    fn close(&mut self) -> WriteResult<()>;
}

enum CellContent {
    Null,
    Text(String),
    Markup(Vec<Event<'static>>),
}

struct Cell {
    attributes: Vec<(String, String)>,
    content: CellContent,
}

/// Streams a Wrs document into any [`Write`].
pub struct WrsWriter<W: Write> {
    xml: Writer<W>,
    options: WriterOptions,
    rows: u64,
    columns: usize,
    exceeded: bool,
    error: Option<String>,
    written: bool,
}

impl<W: Write> WrsWriter<W> {
    pub fn new(inner: W, options: WriterOptions) -> Self {
        Self {
            xml: Writer::new(inner),
            options,
            rows: 0,
            columns: 0,
            exceeded: false,
            error: None,
            written: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.xml.into_inner()
    }

    /// The first in-band error, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn start(&mut self, element: BytesStart<'_>) -> WriteResult<()> {
        self.xml.write_event(Event::Start(element))?;
        Ok(())
    }

    fn end(&mut self, name: &str) -> WriteResult<()> {
        self.xml.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn empty(&mut self, element: BytesStart<'_>) -> WriteResult<()> {
        self.xml.write_event(Event::Empty(element))?;
        Ok(())
    }

    fn text_element(&mut self, name: &str, text: &str) -> WriteResult<()> {
        self.start(BytesStart::new(name))?;
        self.xml.write_event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    fn duration(&mut self, name: &str, elapsed: Duration) -> WriteResult<()> {
        let ms = elapsed.as_millis().to_string();
        self.empty(BytesStart::new(name).with_attributes([("ms", ms.as_str())]))
    }

    fn record_error(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(message);
        }
    }

    fn write_header(&mut self, query: &CompiledQuery, execute: Duration) -> WriteResult<()> {
        self.start(BytesStart::new("Header"))?;
        for table in &query.source_tables {
            self.text_element("BindingSet", table)?;
        }

        self.start(BytesStart::new("Columns"))?;
        for (i, column) in query.columns.iter().enumerate() {
            let pos = (i + 1).to_string();
            let scale = column.scale.map(|s| s.to_string());
            let mut element = BytesStart::new("C");
            element.push_attribute(("pos", pos.as_str()));
            element.push_attribute(("id", column.id.as_str()));
            if let Some(caption) = &column.caption {
                element.push_attribute(("caption", caption.as_str()));
            }
            element.push_attribute(("type-name", column.ty.name()));
            if let Some(scale) = &scale {
                element.push_attribute(("scale", scale.as_str()));
            }
            if column.attributes.is_empty() {
                self.empty(element)?;
                continue;
            }
            self.start(element)?;
            for attr in &column.attributes {
                self.empty(BytesStart::new("A").with_attributes([
                    ("id", attr.id.as_str()),
                    ("name", attr.name.as_str()),
                    ("type-name", attr.ty.name()),
                ]))?;
            }
            self.end("C")?;
        }
        self.end("Columns")?;

        if self.options.debug {
            self.start(BytesStart::new("Debug"))?;
            let sql = query.statement.render_with_literals(query.dialect);
            self.text_element("SelectStatement", &sql)?;
            self.duration("ExecuteDuration", execute)?;
            self.end("Debug")?;
        }
        self.end("Header")
    }

    fn write_rows(&mut self, query: &CompiledQuery, results: &mut dyn ResultSet) -> WriteResult<()> {
        loop {
            match results.next() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    warn!(row = self.rows + 1, error = %e, "result set failed while streaming");
                    self.record_error(e.to_string());
                    break;
                }
            }
            if self.rows >= query.effective_cap {
                self.exceeded = true;
                break;
            }
            self.rows += 1;
            self.write_row(&query.columns, results)?;
        }
        Ok(())
    }

    fn write_row(&mut self, columns: &[OutputColumn], results: &dyn ResultSet) -> WriteResult<()> {
        let id = format!("R{}", self.rows);
        self.start(BytesStart::new("R").with_attributes([("id", id.as_str())]))?;
        let mut failed = false;
        for column in columns {
            if failed {
                self.empty(BytesStart::new("C"))?;
                continue;
            }
            match render_cell(column, results) {
                Ok(cell) => self.write_cell(cell)?,
                Err(e) => {
                    warn!(row = %id, column = %column.id, error = %e, "cannot serialize cell");
                    self.record_error(format!("row {id}, column {}: {e}", column.id));
                    failed = true;
                    self.empty(BytesStart::new("C"))?;
                }
            }
        }
        self.end("R")
    }

    fn write_cell(&mut self, cell: Cell) -> WriteResult<()> {
        let mut element = BytesStart::new("C");
        for (name, value) in &cell.attributes {
            element.push_attribute((name.as_str(), value.as_str()));
        }
        self.start(element)?;
        match cell.content {
            CellContent::Null => self.empty(BytesStart::new("null"))?,
            CellContent::Text(text) => self.xml.write_event(Event::Text(BytesText::new(&text)))?,
            CellContent::Markup(events) => {
                for event in events {
                    self.xml.write_event(event)?;
                }
            }
        }
        self.end("C")
    }

    fn write_footer(&mut self, query: &CompiledQuery, started: Instant) -> WriteResult<()> {
        let max_rows = self.exceeded && query.reports_cap();
        if !max_rows && self.error.is_none() && !self.options.debug {
            return Ok(());
        }
        self.start(BytesStart::new("Footer"))?;
        if max_rows {
            self.text_element("MaxRowsExceeded", &query.effective_cap.to_string())?;
        }
        if let Some(error) = self.error.clone() {
            self.text_element("Error", &error)?;
        }
        if self.options.debug {
            self.duration("WriteDuration", started.elapsed())?;
        }
        self.end("Footer")
    }
}

fn read_text(
    results: &dyn ResultSet,
    index: usize,
    ty: JdbcType,
    scale: Option<u32>,
) -> WriteResult<Option<String>> {
    let value = results
        .get(index)
        .map_err(|e| WriteError::cell(e.to_string()))?;
    format_value(value, ty, scale)
}

fn render_cell(column: &OutputColumn, results: &dyn ResultSet) -> WriteResult<Cell> {
    let mut attributes = Vec::with_capacity(column.attributes.len());
    for attr in &column.attributes {
        if let Some(text) = read_text(results, attr.index, attr.ty, None)? {
            attributes.push((attr.name.clone(), text));
        }
    }
    let content = match read_text(results, column.index, column.ty, column.scale)? {
        None => CellContent::Null,
        Some(text) if !column.escape_xml && (column.ty.is_textual() || column.ty == JdbcType::Xml) => {
            CellContent::Markup(parse_markup(&text)?)
        }
        Some(text) => CellContent::Text(text),
    };
    Ok(Cell {
        attributes,
        content,
    })
}

impl<W: Write> ResultWriter for WrsWriter<W> {
    fn write(
        &mut self,
        query: &CompiledQuery,
        results: Option<&mut dyn ResultSet>,
        execute: Duration,
    ) -> WriteResult<()> {
        if self.written {
            return Err(WriteError::AlreadyWritten);
        }
        self.written = true;
        self.columns = query.columns.len();
        let started = Instant::now();

        self.start(BytesStart::new("Wrs"))?;
        self.write_header(query, execute)?;
        self.start(BytesStart::new("Data"))?;
        if let Some(results) = results {
            self.write_rows(query, results)?;
        }
        self.end("Data")?;
        self.write_footer(query, started)?;
        self.end("Wrs")
    }

    fn row_count(&self) -> u64 {
        self.rows
    }

    fn column_count(&self) -> usize {
        self.columns
    }

    fn max_rows_exceeded(&self) -> bool {
        self.exceeded
    }

    fn close(&mut self) -> WriteResult<()> {
        self.xml.get_mut().flush()?;
        Ok(())
    }
}

//! Cell text: type-directed formatting and nested markup.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use quick_xml::events::Event;
use quick_xml::Reader;

use super::{WriteError, WriteResult};
use crate::execution::{parse_time, parse_timestamp, Value};
use crate::sql::JdbcType;

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `yyyy-MM-ddTHH:mm:ss`, with milliseconds only when present.
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    if ts.nanosecond() == 0 {
        ts.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        ts.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
    }
}

fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

fn format_double(f: f64, scale: Option<u32>) -> WriteResult<String> {
    if !f.is_finite() {
        return Err(WriteError::cell(format!("{f} has no decimal representation")));
    }
    Ok(match scale {
        Some(scale) => format!("{:.*}", scale as usize, f),
        None => f.to_string(),
    })
}

fn epoch(secs: i64) -> WriteResult<NaiveDateTime> {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| WriteError::cell(format!("{secs} is not a valid epoch second")))
}

fn temporal(s: &str, ty: JdbcType) -> WriteResult<String> {
    let invalid = || WriteError::cell(format!("'{s}' is not a valid {ty}"));
    match ty {
        JdbcType::Date => parse_timestamp(s)
            .map(|ts| format_date(ts.date()))
            .ok_or_else(invalid),
        JdbcType::Time => parse_time(s).map(format_time).ok_or_else(invalid),
        _ => parse_timestamp(s).map(format_timestamp).ok_or_else(invalid),
    }
}

/// Render a cell as text for a column of type `ty`; `None` is SQL NULL.
pub fn format_value(value: Value, ty: JdbcType, scale: Option<u32>) -> WriteResult<Option<String>> {
    let text = match value {
        Value::Null => return Ok(None),
        Value::Text(s) if ty.is_temporal() => temporal(&s, ty)?,
        Value::Text(s) => s,
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) if ty == JdbcType::Boolean => (i != 0).to_string(),
        Value::Integer(i) if ty == JdbcType::Date => format_date(epoch(i)?.date()),
        Value::Integer(i) if ty == JdbcType::Timestamp => format_timestamp(epoch(i)?),
        Value::Integer(i) => i.to_string(),
        Value::Double(f) => format_double(f, scale)?,
        Value::Decimal(s) => s,
        Value::Date(d) => format_date(d),
        Value::Time(t) => format_time(t),
        Value::Timestamp(ts) if ty == JdbcType::Date => format_date(ts.date()),
        Value::Timestamp(ts) => format_timestamp(ts),
        Value::Blob(bytes) => BASE64.encode(bytes),
    };
    Ok(Some(text))
}

/// Parse a fragment of markup into events that can be written back as
/// children of a cell. Fails unless the fragment is well-formed.
pub fn parse_markup(fragment: &str) -> WriteResult<Vec<Event<'static>>> {
    let mut reader = Reader::from_str(fragment);
    let mut events = Vec::new();
    let mut depth = 0usize;
    loop {
        let event = reader
            .read_event()
            .map_err(|e| WriteError::Markup(e.to_string()))?;
        match event {
            Event::Eof => break,
            Event::Decl(_) | Event::DocType(_) | Event::PI(_) => continue,
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| WriteError::Markup("unbalanced end tag".into()))?;
            }
            _ => {}
        }
        events.push(event.into_owned());
    }
    if depth != 0 {
        return Err(WriteError::Markup("unclosed element".into()));
    }
    Ok(events)
}

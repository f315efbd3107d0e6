//! Tabular query results.
//!
//! The vendor's SQL endpoint answers either with JSON `{ "header": [...],
//! "rows": [[...], ...] }` or with CSV text, depending on `Accept`. Both
//! parse into the same [`QueryTable`].

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use tenantgate_types::{GateError, traits::Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl QueryTable {
    /// Parse whatever the proxy returned as `data`: a JSON string is treated
    /// as CSV, anything else as the JSON shape.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Parse`] when neither shape matches.
    pub fn parse(data: &Value) -> Result<Self> {
        match data {
            Value::String(text) => Self::from_csv(text),
            other => Self::from_json(other),
        }
    }

    /// Parse the JSON shape. `header` and each row may be an array or an
    /// object keyed by column index (`{"0": ..., "1": ...}`).
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Parse`] if `header` or `rows` is missing or has
    /// the wrong type.
    pub fn from_json(value: &Value) -> Result<Self> {
        let header = value
            .get("header")
            .ok_or_else(|| GateError::Parse("query result has no header".into()))?;
        let header = cells(header)?;

        let rows = match value.get("rows") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(rows)) => rows.iter().map(cells).collect::<Result<_>>()?,
            Some(Value::Object(rows)) => indexed(rows)?
                .into_iter()
                .map(cells)
                .collect::<Result<_>>()?,
            Some(_) => return Err(GateError::Parse("rows must be an array".into())),
        };
        Ok(Self { header, rows })
    }

    /// Parse CSV text. The first record is the header; rows may be ragged.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Parse`] when the reader rejects a record.
    pub fn from_csv(text: &str) -> Result<Self> {
        let mut records = parse_csv(text)?.into_iter();
        let header = records.next().unwrap_or_default();
        Ok(Self {
            header,
            rows: records.collect(),
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        let columns = self
            .rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.header.len()))
            .max()
            .unwrap_or(0);
        let mut widths = vec![0; columns];
        for row in std::iter::once(&self.header).chain(&self.rows) {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
        widths
    }
}

impl fmt::Display for QueryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.widths();
        let line = |f: &mut fmt::Formatter<'_>, row: &[String]| -> fmt::Result {
            let padded: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(i, &w)| {
                    let cell = row.get(i).map_or("", String::as_str);
                    format!("{cell:<w$}")
                })
                .collect();
            writeln!(f, "{}", padded.join(" | ").trim_end())
        };

        line(f, &self.header)?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "{}", rule.join("-+-"))?;
        for row in &self.rows {
            line(f, row)?;
        }
        write!(
            f,
            "({} row{})",
            self.rows.len(),
            if self.rows.len() == 1 { "" } else { "s" }
        )
    }
}

fn cells(value: &Value) -> Result<Vec<String>> {
    match value {
        Value::Array(items) => Ok(items.iter().map(cell_text).collect()),
        Value::Object(map) => Ok(indexed(map)?.into_iter().map(cell_text).collect()),
        _ => Err(GateError::Parse(format!(
            "expected an array or index-keyed object, got {value}"
        ))),
    }
}

/// Values of an index-keyed object, in numeric key order.
fn indexed(map: &Map<String, Value>) -> Result<Vec<&Value>> {
    let mut entries = map
        .iter()
        .map(|(k, v)| {
            k.parse::<usize>()
                .map(|i| (i, v))
                .map_err(|_| GateError::Parse(format!("non-numeric column key {k:?}")))
        })
        .collect::<Result<Vec<_>>>()?;
    entries.sort_by_key(|(i, _)| *i);
    Ok(entries.into_iter().map(|(_, v)| v).collect())
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_csv(text: &str) -> Result<Vec<Vec<String>>> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes())
        .into_records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(|e| GateError::Parse(format!("invalid CSV: {e}")))
        })
        .collect()
}

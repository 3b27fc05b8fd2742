//! # Export Schema
//!
//! The ordered column projection for one run: the nine base columns followed by the
//! selected add-on columns in selection order. Built once per run; every row is encoded
//! through it.

use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde_json::Value;

use crate::constants::{NOT_PRESENT_VALUE, UNKNOWN_VALUE};
use crate::error::{FulfillmentError, Result};
use crate::models::{Record, RecordColumn};

/// Where a column's value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    Base(RecordColumn),
    /// Key into the record's add-on attributes
    Addon(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub label: String,
    pub source: FieldSource,
    pub default: &'static str,
}

const BASE_FIELDS: [(&str, RecordColumn, &str); 9] = [
    ("Business Name", RecordColumn::BusinessName, NOT_PRESENT_VALUE),
    ("Country", RecordColumn::Country, UNKNOWN_VALUE),
    ("State", RecordColumn::State, UNKNOWN_VALUE),
    ("City", RecordColumn::City, UNKNOWN_VALUE),
    ("Address", RecordColumn::Address, NOT_PRESENT_VALUE),
    ("Phone", RecordColumn::Phone, NOT_PRESENT_VALUE),
    ("Category", RecordColumn::Category, NOT_PRESENT_VALUE),
    ("Subcategory", RecordColumn::Subcategory, NOT_PRESENT_VALUE),
    ("Sub-Sub Categories", RecordColumn::SubSubcategories, NOT_PRESENT_VALUE),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSchema {
    fields: Vec<FieldSpec>,
    array_delimiter: String,
}

impl ExportSchema {
    /// Base columns only
    pub fn base(array_delimiter: &str) -> Self {
        Self::for_addons(&[], array_delimiter)
    }

    /// Base columns followed by each distinct, non-blank add-on in selection order
    pub fn for_addons(add_ons: &[String], array_delimiter: &str) -> Self {
        let mut fields: Vec<FieldSpec> = BASE_FIELDS
            .iter()
            .map(|(label, column, default)| FieldSpec {
                label: (*label).to_string(),
                source: FieldSource::Base(*column),
                default: *default,
            })
            .collect();

        for add_on in add_ons {
            let key = add_on.trim();
            if key.is_empty() {
                continue;
            }
            let duplicate = fields
                .iter()
                .any(|field| matches!(&field.source, FieldSource::Addon(existing) if existing == key));
            if duplicate {
                continue;
            }
            fields.push(FieldSpec {
                label: addon_label(key),
                source: FieldSource::Addon(key.to_string()),
                default: NOT_PRESENT_VALUE,
            });
        }

        Self {
            fields,
            array_delimiter: array_delimiter.to_string(),
        }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn labels(&self) -> Vec<&str> {
        self.fields.iter().map(|field| field.label.as_str()).collect()
    }

    /// Encoded header line, terminator included
    pub fn header_row(&self) -> Result<Vec<u8>> {
        encode_line(self.labels())
    }

    /// Encoded data line for one record, terminator included
    pub fn encode_record(&self, record: &Record) -> Result<Vec<u8>> {
        encode_line(self.fields.iter().map(|field| self.resolve(field, record)))
    }

    fn resolve(&self, field: &FieldSpec, record: &Record) -> String {
        let value = match &field.source {
            FieldSource::Base(RecordColumn::SubSubcategories) => {
                record.labels().collect::<Vec<_>>().join(&self.array_delimiter)
            }
            FieldSource::Base(column) => record
                .column(*column)
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
            FieldSource::Addon(key) => record
                .attribute(key)
                .map(|value| self.render_value(value))
                .unwrap_or_default(),
        };

        if value.is_empty() {
            field.default.to_string()
        } else {
            value
        }
    }

    fn render_value(&self, value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.trim().to_string(),
            Value::Array(items) => items
                .iter()
                .map(|item| self.render_value(item))
                .filter(|item| !item.is_empty())
                .collect::<Vec<_>>()
                .join(&self.array_delimiter),
            other => other.to_string(),
        }
    }
}

/// `website` -> `Website`, `social_links` -> `Social Links`
fn addon_label(key: &str) -> String {
    key.split(&['_', ' '][..])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Every cell quoted, embedded quotes doubled, `\n` line terminator
fn encode_line<I, T>(cells: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(cells)?;
    writer
        .into_inner()
        .map_err(|e| FulfillmentError::Export(format!("Failed to flush row buffer: {e}")))
}

//! # Directory Record
//!
//! One business entry of the dataset. Read-only to the pipeline.
//!
//! ## Database Schema
//!
//! Maps to the `directory_records` table. `categories` holds the comma-joined
//! sub-subcategory labels; `attributes` holds optional add-on fields keyed by name.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::constants::LABEL_SEPARATOR;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Record {
    pub record_id: Uuid,
    pub business_name: String,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub category: String,
    pub subcategory: Option<String>,
    pub categories: Option<String>,
    pub attributes: Option<Value>,
}

/// Columns the filter predicate and the base export schema can address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordColumn {
    BusinessName,
    Country,
    State,
    City,
    Address,
    Phone,
    Category,
    Subcategory,
    SubSubcategories,
}

impl RecordColumn {
    /// Physical column name in `directory_records`
    pub fn column_name(&self) -> &'static str {
        match self {
            Self::BusinessName => "business_name",
            Self::Country => "country",
            Self::State => "state",
            Self::City => "city",
            Self::Address => "address",
            Self::Phone => "phone",
            Self::Category => "category",
            Self::Subcategory => "subcategory",
            Self::SubSubcategories => "categories",
        }
    }
}

impl Record {
    pub fn column(&self, column: RecordColumn) -> Option<&str> {
        match column {
            RecordColumn::BusinessName => Some(self.business_name.as_str()),
            RecordColumn::Country => self.country.as_deref(),
            RecordColumn::State => self.state.as_deref(),
            RecordColumn::City => self.city.as_deref(),
            RecordColumn::Address => self.address.as_deref(),
            RecordColumn::Phone => self.phone.as_deref(),
            RecordColumn::Category => Some(self.category.as_str()),
            RecordColumn::Subcategory => self.subcategory.as_deref(),
            RecordColumn::SubSubcategories => self.categories.as_deref(),
        }
    }

    /// Sub-subcategory labels: split on commas, trimmed, empties dropped
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        split_labels(self.categories.as_deref().unwrap_or_default())
    }

    /// Add-on field by name, if the record carries it
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes
            .as_ref()
            .and_then(|attrs| attrs.get(key))
            .filter(|value| !value.is_null())
    }
}

pub(crate) fn split_labels(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(LABEL_SEPARATOR)
        .map(str::trim)
        .filter(|label| !label.is_empty())
}

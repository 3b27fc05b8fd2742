use std::collections::BTreeSet;
use std::fmt;

use crate::models::{Record, RecordColumn};

/// Normalized predicate tree over directory records.
///
/// The same tree is rendered to SQL for the Postgres store and evaluated directly by
/// in-process stores, so both backends agree on what an order covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Case-insensitive exact match
    EqualsIgnoreCase { column: RecordColumn, value: String },
    /// Exact match
    Equals { column: RecordColumn, value: String },
    /// The column's comma-joined labels share at least one entry with `labels`
    LabelsIntersect {
        column: RecordColumn,
        labels: BTreeSet<String>,
    },
    /// Every child holds; an empty list holds trivially
    All(Vec<Condition>),
    /// At least one child holds; an empty list never holds
    Any(Vec<Condition>),
}

impl Condition {
    pub fn equals_ignore_case(column: RecordColumn, value: impl Into<String>) -> Self {
        Self::EqualsIgnoreCase {
            column,
            value: value.into(),
        }
    }

    pub fn equals(column: RecordColumn, value: impl Into<String>) -> Self {
        Self::Equals {
            column,
            value: value.into(),
        }
    }

    pub fn labels_intersect(column: RecordColumn, labels: BTreeSet<String>) -> Self {
        Self::LabelsIntersect { column, labels }
    }

    /// Evaluate the predicate against one record
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Condition::EqualsIgnoreCase { column, value } => record
                .column(*column)
                .is_some_and(|actual| actual.to_lowercase() == value.to_lowercase()),
            Condition::Equals { column, value } => {
                record.column(*column).is_some_and(|actual| actual == value)
            }
            Condition::LabelsIntersect { column, labels } => record
                .column(*column)
                .map(crate::models::record::split_labels)
                .is_some_and(|mut found| found.any(|label| labels.contains(label))),
            Condition::All(children) => children.iter().all(|child| child.matches(record)),
            Condition::Any(children) => children.iter().any(|child| child.matches(record)),
        }
    }

    /// Append this predicate to a Postgres query, binding every value as a parameter
    #[cfg(feature = "postgres")]
    pub fn push_sql(&self, builder: &mut sqlx::QueryBuilder<'_, sqlx::Postgres>) {
        match self {
            Condition::EqualsIgnoreCase { column, value } => {
                builder.push(format!("lower({}) = lower(", column.column_name()));
                builder.push_bind(value.clone());
                builder.push(")");
            }
            Condition::Equals { column, value } => {
                builder.push(format!("{} = ", column.column_name()));
                builder.push_bind(value.clone());
            }
            Condition::LabelsIntersect { column, labels } => {
                builder.push(format!(
                    "EXISTS (SELECT 1 FROM unnest(string_to_array(COALESCE({}, ''), ',')) AS label \
                     WHERE btrim(label) = ANY(",
                    column.column_name()
                ));
                builder.push_bind(labels.iter().cloned().collect::<Vec<String>>());
                builder.push("))");
            }
            Condition::All(children) => push_group(builder, children, " AND ", "TRUE"),
            Condition::Any(children) => push_group(builder, children, " OR ", "FALSE"),
        }
    }
}

#[cfg(feature = "postgres")]
fn push_group(
    builder: &mut sqlx::QueryBuilder<'_, sqlx::Postgres>,
    children: &[Condition],
    operator: &str,
    empty: &str,
) {
    if children.is_empty() {
        builder.push(empty);
        return;
    }
    builder.push("(");
    for (index, child) in children.iter().enumerate() {
        if index > 0 {
            builder.push(operator);
        }
        child.push_sql(builder);
    }
    builder.push(")");
}

/// Human-readable rendering with inlined literals, for logs only
impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::EqualsIgnoreCase { column, value } => {
                write!(f, "lower({}) = lower({})", column.column_name(), format_value(value))
            }
            Condition::Equals { column, value } => {
                write!(f, "{} = {}", column.column_name(), format_value(value))
            }
            Condition::LabelsIntersect { column, labels } => {
                let list = labels
                    .iter()
                    .map(|label| format_value(label))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "labels({}) && [{}]", column.column_name(), list)
            }
            Condition::All(children) => write_group(f, children, " AND ", "TRUE"),
            Condition::Any(children) => write_group(f, children, " OR ", "FALSE"),
        }
    }
}

fn write_group(
    f: &mut fmt::Formatter<'_>,
    children: &[Condition],
    operator: &str,
    empty: &str,
) -> fmt::Result {
    if children.is_empty() {
        return f.write_str(empty);
    }
    let parts: Vec<String> = children.iter().map(ToString::to_string).collect();
    write!(f, "({})", parts.join(operator))
}

/// Quote a literal for display
fn format_value(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

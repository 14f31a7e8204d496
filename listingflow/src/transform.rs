//! Flattening raw listing documents onto the fixed CSV projection.
//!
//! The raw document is a JSON object whose `results` array holds one
//! arbitrary-shape mapping per listing. Transformation is an explicit
//! row-mapping: each record contributes one row, each of the 14 projected
//! columns contributes one cell, and a field missing from an individual
//! record renders as an empty cell rather than dropping the row. A column
//! missing from every record in the batch fails the projection.

use crate::errors::PipelineError;
use serde_json::{Map, Value};

/// The projected columns, in output order.
pub const LISTING_COLUMNS: [&str; 14] = [
    "bathrooms",
    "bedrooms",
    "city",
    "country",
    "homeType",
    "homeStatus",
    "livingArea",
    "price",
    "rentZestimate",
    "zipcode",
    "latitude",
    "longitude",
    "taxAssessedValue",
    "isPremierBuilder",
];

/// Derives the CSV object key for an incoming raw key.
///
/// The trailing five characters (the `.json` suffix) are stripped without
/// validating that they actually are `.json`, so a key with another
/// extension is mis-truncated: `"listing.jsn"` derives base `"listin"`,
/// emitting `"listin.csv"`. This mirrors the upstream naming convention
/// as-is.
#[must_use]
pub fn derived_csv_key(object_key: &str) -> String {
    let total = object_key.chars().count();
    let base: String = object_key.chars().take(total.saturating_sub(5)).collect();
    format!("{base}.csv")
}

/// Extracts the `results` array as one mapping per listing, in array order.
pub fn flatten_results(document: &Value) -> Result<Vec<Map<String, Value>>, PipelineError> {
    let results = document
        .get("results")
        .ok_or_else(|| PipelineError::missing_field("results"))?;

    let records = results
        .as_array()
        .ok_or_else(|| PipelineError::malformed_response("'results' is not an array"))?;

    records
        .iter()
        .map(|record| {
            record.as_object().cloned().ok_or_else(|| {
                PipelineError::malformed_response("listing record is not an object")
            })
        })
        .collect()
}

/// Projects the records onto [`LISTING_COLUMNS`], one row per record.
///
/// A column absent from every record fails with a missing-column error
/// naming the first such column in projection order; a field absent from an
/// individual record yields an empty cell.
pub fn project_rows(records: &[Map<String, Value>]) -> Result<Vec<Vec<String>>, PipelineError> {
    for column in LISTING_COLUMNS {
        if !records.iter().any(|record| record.contains_key(column)) {
            return Err(PipelineError::missing_column(column));
        }
    }

    Ok(records
        .iter()
        .map(|record| {
            LISTING_COLUMNS
                .iter()
                .map(|column| render_cell(record.get(*column)))
                .collect()
        })
        .collect())
}

// Strings render verbatim, numbers and bools in their JSON form, null and
// absent as empty cells. Nested structures keep their JSON text.
fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// Serializes projected rows as CSV text: one header row of the column
/// names, then one line per row, no index column.
#[must_use]
pub fn to_csv(rows: &[Vec<String>]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(LISTING_COLUMNS.join(","));
    for row in rows {
        lines.push(
            row.iter()
                .map(|cell| escape_field(cell))
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    let mut csv = lines.join("\n");
    csv.push('\n');
    csv
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// The full document-to-CSV transform: flatten, project, serialize.
pub fn listings_to_csv(document: &Value) -> Result<String, PipelineError> {
    let records = flatten_results(document)?;
    let rows = project_rows(&records)?;
    Ok(to_csv(&rows))
}

use std::fs;

use camino::Utf8Path;

use crate::error::CasebridgeError;
use crate::extract::ExtractedFields;
use crate::schema::FieldSchema;

/// Flat case-metadata table: header plus one row of string cells per sample,
/// with empty-string placeholders for absent values. Row order mirrors the
/// input record order, and every row has exactly `header.len()` cells.
#[derive(Debug, Clone)]
pub struct MetadataTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    rows_with_missing: usize,
}

impl MetadataTable {
    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Count of rows with at least one missing cell, mandatory or optional.
    pub fn rows_with_missing(&self) -> usize {
        self.rows_with_missing
    }

    /// Header-relative column lookup. Column offsets shift whenever the
    /// observed optional-field union changes, so consumers must never assume
    /// a fixed position.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|column| column == name)
    }

    /// Comma-joined lines, header first. Embedded commas are not quoted or
    /// escaped; the ingestion endpoint accepts only plain CSV.
    pub fn to_csv(&self) -> String {
        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        lines.push(self.header.join(","));
        for row in &self.rows {
            lines.push(row.join(","));
        }
        lines.join("\n")
    }

    pub fn write_to(&self, path: &Utf8Path) -> Result<(), CasebridgeError> {
        fs::write(path.as_std_path(), self.to_csv())
            .map_err(|err| CasebridgeError::Filesystem(format!("writing {path}: {err}")))
    }
}

/// Default output name: `case_metadata.connected_insights.<timestamp>.csv`.
pub fn default_output_name() -> String {
    let timestamp = chrono::Local::now().format("%Y%b%d_%H_%M_%S_%6f");
    format!("case_metadata.connected_insights.{timestamp}.csv")
}

/// Aggregate per-record field sets into a table. First pass unions the
/// observed fields; second pass emits cells in header order. Optional
/// columns are appended only if at least one record contributed one, in
/// first-seen order.
pub fn build_table(
    schema: &FieldSchema,
    extracted: &[ExtractedFields],
) -> Result<MetadataTable, CasebridgeError> {
    let mut any_mandatory = false;
    let mut optional_union: Vec<String> = Vec::new();
    for fields in extracted {
        any_mandatory |= !fields.mandatory().is_empty();
        for (name, _) in fields.optional() {
            if !optional_union.contains(name) {
                optional_union.push(name.clone());
            }
        }
    }

    if !any_mandatory {
        if optional_union.is_empty() {
            return Err(CasebridgeError::NoUsableFields);
        }
        return Err(CasebridgeError::MissingMandatorySchema(
            schema.mandatory().join(", "),
        ));
    }

    let mut header: Vec<String> = schema.mandatory().to_vec();
    header.extend(optional_union.iter().cloned());

    let mut rows = Vec::with_capacity(extracted.len());
    let mut rows_with_missing = 0usize;
    for (index, fields) in extracted.iter().enumerate() {
        let mut row = Vec::with_capacity(header.len());
        let mut missing_mandatory = Vec::new();
        let mut missing_optional = Vec::new();

        for name in schema.mandatory() {
            match fields.mandatory_value(name) {
                Some(value) => row.push(value.to_string()),
                None => {
                    row.push(String::new());
                    missing_mandatory.push(name.as_str());
                }
            }
        }
        for name in &optional_union {
            match fields.optional_value(name) {
                Some(value) => row.push(value.to_string()),
                None => {
                    row.push(String::new());
                    missing_optional.push(name.as_str());
                }
            }
        }

        if !missing_mandatory.is_empty() || !missing_optional.is_empty() {
            rows_with_missing += 1;
            let line = row.join(",");
            if !missing_mandatory.is_empty() {
                tracing::warn!(
                    row = index + 1,
                    fields = %missing_mandatory.join(","),
                    line = %line,
                    "missing mandatory fields"
                );
            }
            if !missing_optional.is_empty() {
                tracing::warn!(
                    row = index + 1,
                    fields = %missing_optional.join(","),
                    line = %line,
                    "missing optional fields"
                );
            }
        }
        rows.push(row);
    }

    Ok(MetadataTable {
        header,
        rows,
        rows_with_missing,
    })
}

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::CasebridgeError;
use crate::table::MetadataTable;

pub const TUMOR_TYPE_COLUMN: &str = "Tumor_Type";
pub const CASE_ID_COLUMN: &str = "Case_ID";

/// A line-level finding against the produced table. Not an error by itself;
/// strict mode escalates accumulated warnings to a fatal condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub line: usize,
    pub message: String,
}

impl ValidationWarning {
    fn new(row: usize, message: String) -> Self {
        // Line numbers match the written file: header is line 1.
        Self {
            line: row + 2,
            message,
        }
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)
    }
}

/// Cross-check the `Tumor_Type` column against the controlled vocabulary.
/// A value that is not an accepted identifier earns a warning citing the
/// full accepted-id list, so the failure is self-diagnosing.
pub fn check_tumor_types(
    table: &MetadataTable,
    vocabulary: &BTreeMap<String, String>,
) -> Result<Vec<ValidationWarning>, CasebridgeError> {
    let column = table
        .column_index(TUMOR_TYPE_COLUMN)
        .ok_or_else(|| CasebridgeError::MissingColumn(TUMOR_TYPE_COLUMN.to_string()))?;

    let accepted = vocabulary.keys().cloned().collect::<Vec<_>>().join(", ");
    let mut warnings = Vec::new();
    for (row, cells) in table.rows().iter().enumerate() {
        let value = &cells[column];
        if !vocabulary.contains_key(value) {
            warnings.push(ValidationWarning::new(
                row,
                format!("Tumor_Type {value:?} is not an accepted identifier; accepted: {accepted}"),
            ));
        }
    }
    Ok(warnings)
}

/// Cross-check the `Case_ID` column against case identifiers already present
/// in the workgroup. Presence is the problem here: an existing id means the
/// upload would collide with a live case.
pub fn check_case_collisions(
    table: &MetadataTable,
    existing: &BTreeSet<String>,
) -> Result<Vec<ValidationWarning>, CasebridgeError> {
    let column = table
        .column_index(CASE_ID_COLUMN)
        .ok_or_else(|| CasebridgeError::MissingColumn(CASE_ID_COLUMN.to_string()))?;

    let mut warnings = Vec::new();
    for (row, cells) in table.rows().iter().enumerate() {
        let value = &cells[column];
        if existing.contains(value) {
            warnings.push(ValidationWarning::new(
                row,
                format!("Case_ID {value:?} already exists in the workgroup"),
            ));
        }
    }
    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::domain::SampleRecord;
    use crate::extract::extract_fields;
    use crate::schema::FieldSchema;
    use crate::table::build_table;

    fn table(values: Vec<serde_json::Value>) -> MetadataTable {
        let schema = FieldSchema::default_clarity();
        let extracted = values
            .into_iter()
            .map(|value| {
                let record: SampleRecord = serde_json::from_value(value).unwrap();
                extract_fields(&record, &schema)
            })
            .collect::<Vec<_>>();
        build_table(&schema, &extracted).unwrap()
    }

    #[test]
    fn unknown_tumor_type_cites_accepted_ids() {
        let table = table(vec![
            json!({"id": "S1", "Tumor_Type": "123", "Case_ID": "C1"}),
            json!({"id": "S2", "Tumor_Type": "999", "Case_ID": "C2"}),
        ]);
        let vocabulary = BTreeMap::from([("123".to_string(), "Lung".to_string())]);

        let warnings = check_tumor_types(&table, &vocabulary).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line, 3);
        assert!(warnings[0].message.contains("\"999\""));
        assert!(warnings[0].message.contains("123"));
    }

    #[test]
    fn case_collision_flags_existing_ids_only() {
        let table = table(vec![
            json!({"id": "S1", "Tumor_Type": "123", "Case_ID": "C1"}),
            json!({"id": "S2", "Tumor_Type": "123", "Case_ID": "C2"}),
        ]);
        let existing = BTreeSet::from(["C2".to_string(), "C9".to_string()]);

        let warnings = check_case_collisions(&table, &existing).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line, 3);
        assert!(warnings[0].message.contains("\"C2\""));
    }

    #[test]
    fn checks_follow_shifted_columns() {
        // The optional union changes the offsets; lookup must stay by name.
        let wide = table(vec![
            json!({"id": "S1", "Tumor_Type": "999", "Case_ID": "C1", "Sample_Type": "FFPE", "Tags": "x"}),
        ]);
        let vocabulary = BTreeMap::from([("123".to_string(), "Lung".to_string())]);
        let warnings = check_tumor_types(&wide, &vocabulary).unwrap();
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn missing_column_is_an_error() {
        let schema = FieldSchema::new(
            vec!["Sample_ID".to_string()],
            vec![],
            vec![("id".to_string(), "Sample_ID".to_string())],
            vec![],
            "userDefinedFields".to_string(),
        )
        .unwrap();
        let record: SampleRecord = serde_json::from_value(json!({"id": "S1"})).unwrap();
        let extracted = vec![extract_fields(&record, &schema)];
        let narrow = build_table(&schema, &extracted).unwrap();

        let err = check_tumor_types(&narrow, &BTreeMap::new()).unwrap_err();
        assert_matches!(err, CasebridgeError::MissingColumn(column) if column == "Tumor_Type");
    }
}

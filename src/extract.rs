use serde_json::Value;

use crate::domain::SampleRecord;
use crate::schema::{FieldClass, FieldSchema};

/// Mandatory and optional field values pulled out of one sample record.
/// A field absent from the source record is simply absent here, never
/// present with an empty value. Insertion order follows the record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    mandatory: Vec<(String, String)>,
    optional: Vec<(String, String)>,
}

impl ExtractedFields {
    pub fn mandatory(&self) -> &[(String, String)] {
        &self.mandatory
    }

    pub fn optional(&self) -> &[(String, String)] {
        &self.optional
    }

    pub fn mandatory_value(&self, name: &str) -> Option<&str> {
        self.mandatory
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn optional_value(&self, name: &str) -> Option<&str> {
        self.optional
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    fn insert(&mut self, class: FieldClass, canonical: &str, cell: String) {
        let target = match class {
            FieldClass::Mandatory => &mut self.mandatory,
            FieldClass::Optional => &mut self.optional,
        };
        if !target.iter().any(|(field, _)| field == canonical) {
            target.push((canonical.to_string(), cell));
        }
    }
}

/// Classify every field on a record against the schema: canonical names are
/// taken directly, aliases are resolved, entries of the user-defined-fields
/// container are classified like top-level fields, and unknown names are
/// dropped. Pure with respect to the record.
pub fn extract_fields(record: &SampleRecord, schema: &FieldSchema) -> ExtractedFields {
    let mut extracted = ExtractedFields::default();

    for name in record.field_names() {
        if schema.is_ignored(name) {
            continue;
        }
        if name == schema.user_defined_container() {
            for entry in record.nested_entries(name) {
                if let Some((class, canonical)) = schema.classify(&entry.key)
                    && let Some(cell) = scalar_cell(&entry.value)
                {
                    extracted.insert(class, canonical, cell);
                }
            }
            continue;
        }
        if let Some((class, canonical)) = schema.classify(name)
            && let Some(cell) = record.get(name).and_then(scalar_cell)
        {
            extracted.insert(class, canonical, cell);
        }
    }

    extracted
}

/// Render a scalar JSON value as a cell. Null and structured values count
/// as absent.
fn scalar_cell(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: serde_json::Value) -> SampleRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn classifies_top_level_and_nested_fields() {
        let schema = FieldSchema::default_clarity();
        let record = record(json!({
            "id": "S1",
            "container": "96-well-1",
            "barcode": "ignored-unknown",
            "userDefinedFields": [
                {"key": "Tumor_Type", "value": "123"},
                {"key": "Sample_Type", "value": "FFPE"},
                {"key": "Vendor_Lot", "value": "L9"}
            ]
        }));

        let extracted = extract_fields(&record, &schema);
        assert_eq!(extracted.mandatory_value("Sample_ID"), Some("S1"));
        assert_eq!(extracted.mandatory_value("Tumor_Type"), Some("123"));
        assert_eq!(extracted.mandatory_value("Case_ID"), None);
        assert_eq!(extracted.optional_value("Sample_Type"), Some("FFPE"));
        assert_eq!(extracted.optional_value("Vendor_Lot"), None);
        assert_eq!(extracted.optional().len(), 1);
    }

    #[test]
    fn null_and_structured_values_are_absent() {
        let schema = FieldSchema::default_clarity();
        let record = record(json!({
            "Tumor_Type": null,
            "Tags": ["a", "b"],
            "Case_ID": 42
        }));

        let extracted = extract_fields(&record, &schema);
        assert_eq!(extracted.mandatory_value("Tumor_Type"), None);
        assert_eq!(extracted.optional_value("Tags"), None);
        assert_eq!(extracted.mandatory_value("Case_ID"), Some("42"));
    }

    #[test]
    fn extraction_is_idempotent() {
        let schema = FieldSchema::default_clarity();
        let record = record(json!({
            "id": "S1",
            "userDefinedFields": [{"key": "Case_ID", "value": "C1"}]
        }));

        let first = extract_fields(&record, &schema);
        let second = extract_fields(&record, &schema);
        assert_eq!(first, second);
    }
}

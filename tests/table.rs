use camino::Utf8PathBuf;
use serde_json::json;

use casebridge::domain::SampleRecord;
use casebridge::extract::extract_fields;
use casebridge::schema::FieldSchema;
use casebridge::table::build_table;

fn extracted(values: Vec<serde_json::Value>) -> Vec<casebridge::extract::ExtractedFields> {
    let schema = FieldSchema::default_clarity();
    values
        .into_iter()
        .map(|value| {
            let record: SampleRecord = serde_json::from_value(value).unwrap();
            extract_fields(&record, &schema)
        })
        .collect()
}

#[test]
fn written_file_matches_serialized_table() {
    let schema = FieldSchema::default_clarity();
    let table = build_table(
        &schema,
        &extracted(vec![
            json!({"id": "S1", "Tumor_Type": "123", "Case_ID": "C1"}),
            json!({"id": "S2", "Tumor_Type": "456", "Case_ID": "C2"}),
        ]),
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().join("out.csv")).unwrap();
    table.write_to(&path).unwrap();

    let written = std::fs::read_to_string(path.as_std_path()).unwrap();
    assert_eq!(written, table.to_csv());
    assert_eq!(written.lines().count(), 3);
}

#[test]
fn nested_user_defined_fields_flow_into_the_table() {
    let schema = FieldSchema::default_clarity();
    let table = build_table(
        &schema,
        &extracted(vec![
            json!({
                "id": "S1",
                "userDefinedFields": [
                    {"key": "Tumor_Type", "value": "123"},
                    {"key": "Case_ID", "value": "C1"},
                    {"key": "Sample_Type", "value": "FFPE"}
                ]
            }),
            json!({
                "id": "S2",
                "userDefinedFields": [
                    {"key": "Tumor_Type", "value": "456"},
                    {"key": "Case_ID", "value": "C2"}
                ]
            }),
        ]),
    )
    .unwrap();

    assert_eq!(
        table.header(),
        ["Sample_ID", "Tumor_Type", "Case_ID", "Sample_Type"]
    );
    assert_eq!(table.rows()[0], ["S1", "123", "C1", "FFPE"]);
    assert_eq!(table.rows()[1], ["S2", "456", "C2", ""]);
    assert_eq!(table.rows_with_missing(), 1);
}

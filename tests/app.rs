use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::json;

use casebridge::app::{App, RunOptions};
use casebridge::domain::{
    AuthContext, IngestMode, IngestionHandle, IngestionStatus, SampleRecord,
};
use casebridge::error::CasebridgeError;
use casebridge::insights::CaseClient;
use casebridge::output::JsonOutput;
use casebridge::schema::FieldSchema;
use casebridge::select::SampleSelection;
use casebridge::warehouse::WarehouseClient;

struct MockWarehouse {
    rows: Vec<serde_json::Value>,
}

impl WarehouseClient for MockWarehouse {
    fn fetch_sample_table(&self) -> Result<Vec<SampleRecord>, CasebridgeError> {
        Ok(self
            .rows
            .iter()
            .map(|row| serde_json::from_value(row.clone()).unwrap())
            .collect())
    }
}

struct MockInsights {
    vocabulary: BTreeMap<String, String>,
    existing: BTreeSet<String>,
    statuses: Vec<&'static str>,
    polls: Mutex<usize>,
    submitted: Mutex<Option<(String, Vec<u8>)>>,
}

impl MockInsights {
    fn new(
        vocabulary: BTreeMap<String, String>,
        existing: BTreeSet<String>,
        statuses: Vec<&'static str>,
    ) -> Self {
        Self {
            vocabulary,
            existing,
            statuses,
            polls: Mutex::new(0),
            submitted: Mutex::new(None),
        }
    }
}

impl CaseClient for MockInsights {
    fn fetch_tumor_type_vocabulary(
        &self,
        _auth: &AuthContext,
    ) -> Result<BTreeMap<String, String>, CasebridgeError> {
        Ok(self.vocabulary.clone())
    }

    fn fetch_existing_case_ids(
        &self,
        _auth: &AuthContext,
    ) -> Result<BTreeSet<String>, CasebridgeError> {
        Ok(self.existing.clone())
    }

    fn submit_document(
        &self,
        _auth: &AuthContext,
        document: Vec<u8>,
        filename: &str,
    ) -> Result<IngestionHandle, CasebridgeError> {
        *self.submitted.lock().unwrap() = Some((filename.to_string(), document));
        Ok(IngestionHandle::new("file-1"))
    }

    fn poll_status(
        &self,
        _auth: &AuthContext,
        _handle: &IngestionHandle,
    ) -> Result<IngestionStatus, CasebridgeError> {
        let mut polls = self.polls.lock().unwrap();
        let status = self
            .statuses
            .get(*polls)
            .or_else(|| self.statuses.last())
            .copied()
            .unwrap_or("QUEUED");
        *polls += 1;
        Ok(IngestionStatus::from(status))
    }
}

fn auth() -> AuthContext {
    AuthContext {
        domain: "acme".to_string(),
        workgroup: "wg-1".parse().unwrap(),
        token: "token".to_string(),
    }
}

fn lung_vocabulary() -> BTreeMap<String, String> {
    BTreeMap::from([("123".to_string(), "Lung".to_string())])
}

fn options_in(dir: &tempfile::TempDir, mode: IngestMode) -> RunOptions {
    RunOptions {
        mode,
        output_csv: Some(
            Utf8PathBuf::from_path_buf(dir.path().join("metadata.csv")).unwrap(),
        ),
        dry_run: false,
        poll_interval: Duration::ZERO,
        max_poll_attempts: 10,
    }
}

fn select_ids(ids: &[&str]) -> SampleSelection {
    SampleSelection {
        sample_ids: ids.iter().map(|id| id.parse().unwrap()).collect(),
        lims_project: None,
    }
}

#[test]
fn pipeline_builds_validates_uploads_and_polls_to_completion() {
    let warehouse = MockWarehouse {
        rows: vec![json!({
            "id": "S1",
            "limsSampleProject": "P1",
            "Tumor_Type": "123",
            "Case_ID": "C1"
        })],
    };
    let insights = MockInsights::new(
        lung_vocabulary(),
        BTreeSet::new(),
        vec!["QUEUED", "IN_PROGRESS", "COMPLETED"],
    );
    let dir = tempfile::tempdir().unwrap();
    let app = App::new(warehouse, insights, FieldSchema::default_clarity());

    let result = app
        .run(
            &auth(),
            &select_ids(&["S1"]),
            &options_in(&dir, IngestMode::Strict),
            &JsonOutput,
        )
        .unwrap();

    assert_eq!(result.rows, 1);
    assert_eq!(result.header, ["Sample_ID", "Tumor_Type", "Case_ID"]);
    assert_eq!(result.final_status.as_deref(), Some("COMPLETED"));
    assert!(result.handle.is_some());
    assert!(result.validation_warnings.is_empty());

    let written = std::fs::read_to_string(dir.path().join("metadata.csv")).unwrap();
    assert_eq!(written, "Sample_ID,Tumor_Type,Case_ID\nS1,123,C1");
}

#[test]
fn unknown_sample_id_fails_with_no_match() {
    let warehouse = MockWarehouse {
        rows: vec![json!({"id": "S1", "Tumor_Type": "123", "Case_ID": "C1"})],
    };
    let insights = MockInsights::new(lung_vocabulary(), BTreeSet::new(), vec!["COMPLETED"]);
    let dir = tempfile::tempdir().unwrap();
    let app = App::new(warehouse, insights, FieldSchema::default_clarity());

    let err = app
        .run(
            &auth(),
            &select_ids(&["S2"]),
            &options_in(&dir, IngestMode::Strict),
            &JsonOutput,
        )
        .unwrap_err();
    assert_matches!(err, CasebridgeError::NoMatch(id) if id == "S2");
}

#[test]
fn strict_mode_aborts_on_unknown_tumor_type() {
    let warehouse = MockWarehouse {
        rows: vec![json!({"id": "S1", "Tumor_Type": "999", "Case_ID": "C1"})],
    };
    let insights = MockInsights::new(lung_vocabulary(), BTreeSet::new(), vec!["COMPLETED"]);
    let dir = tempfile::tempdir().unwrap();
    let app = App::new(warehouse, insights, FieldSchema::default_clarity());

    let err = app
        .run(
            &auth(),
            &select_ids(&["S1"]),
            &options_in(&dir, IngestMode::Strict),
            &JsonOutput,
        )
        .unwrap_err();
    assert_matches!(err, CasebridgeError::ValidationFailed { warnings: 1, .. });
}

#[test]
fn lenient_mode_logs_validation_warnings_and_proceeds() {
    let warehouse = MockWarehouse {
        rows: vec![json!({"id": "S1", "Tumor_Type": "999", "Case_ID": "C1"})],
    };
    let insights = MockInsights::new(lung_vocabulary(), BTreeSet::new(), vec!["COMPLETED"]);
    let dir = tempfile::tempdir().unwrap();
    let app = App::new(warehouse, insights, FieldSchema::default_clarity());

    let result = app
        .run(
            &auth(),
            &select_ids(&["S1"]),
            &options_in(&dir, IngestMode::Lenient),
            &JsonOutput,
        )
        .unwrap();

    assert_eq!(result.validation_warnings.len(), 1);
    assert!(result.validation_warnings[0].starts_with("Line 2:"));
    assert_eq!(result.final_status.as_deref(), Some("COMPLETED"));
}

#[test]
fn case_id_collision_is_reported() {
    let warehouse = MockWarehouse {
        rows: vec![json!({"id": "S1", "Tumor_Type": "123", "Case_ID": "C1"})],
    };
    let insights = MockInsights::new(
        lung_vocabulary(),
        BTreeSet::from(["C1".to_string()]),
        vec!["COMPLETED"],
    );
    let dir = tempfile::tempdir().unwrap();
    let app = App::new(warehouse, insights, FieldSchema::default_clarity());

    let err = app
        .run(
            &auth(),
            &select_ids(&["S1"]),
            &options_in(&dir, IngestMode::Strict),
            &JsonOutput,
        )
        .unwrap_err();
    assert_matches!(err, CasebridgeError::ValidationFailed { warnings: 1, .. });
}

#[test]
fn strict_mode_aborts_on_rows_with_missing_fields() {
    let warehouse = MockWarehouse {
        rows: vec![json!({"id": "S1", "Tumor_Type": "123"})],
    };
    let insights = MockInsights::new(lung_vocabulary(), BTreeSet::new(), vec!["COMPLETED"]);
    let dir = tempfile::tempdir().unwrap();
    let app = App::new(warehouse, insights, FieldSchema::default_clarity());

    let err = app
        .run(
            &auth(),
            &select_ids(&["S1"]),
            &options_in(&dir, IngestMode::Strict),
            &JsonOutput,
        )
        .unwrap_err();
    assert_matches!(err, CasebridgeError::IncompleteRows { rows: 1, .. });

    // The partially filled CSV stays on disk for debugging.
    let written = std::fs::read_to_string(dir.path().join("metadata.csv")).unwrap();
    assert_eq!(written.lines().count(), 2);
}

#[test]
fn dry_run_stops_before_upload() {
    let warehouse = MockWarehouse {
        rows: vec![json!({"id": "S1", "Tumor_Type": "123", "Case_ID": "C1"})],
    };
    let insights = MockInsights::new(lung_vocabulary(), BTreeSet::new(), vec!["COMPLETED"]);
    let dir = tempfile::tempdir().unwrap();
    let app = App::new(warehouse, insights, FieldSchema::default_clarity());

    let mut options = options_in(&dir, IngestMode::Strict);
    options.dry_run = true;
    let result = app
        .run(&auth(), &select_ids(&["S1"]), &options, &JsonOutput)
        .unwrap();

    assert!(result.handle.is_none());
    assert!(result.final_status.is_none());
}

#[test]
fn poll_loop_gives_up_after_max_attempts() {
    let warehouse = MockWarehouse {
        rows: vec![json!({"id": "S1", "Tumor_Type": "123", "Case_ID": "C1"})],
    };
    let insights = MockInsights::new(lung_vocabulary(), BTreeSet::new(), vec!["QUEUED"]);
    let dir = tempfile::tempdir().unwrap();
    let app = App::new(warehouse, insights, FieldSchema::default_clarity());

    let mut options = options_in(&dir, IngestMode::Strict);
    options.max_poll_attempts = 3;
    let err = app
        .run(&auth(), &select_ids(&["S1"]), &options, &JsonOutput)
        .unwrap_err();
    assert_matches!(err, CasebridgeError::IngestionTimeout { attempts: 3 });
}

#[test]
fn unrecognized_terminal_status_is_surfaced_verbatim() {
    let warehouse = MockWarehouse {
        rows: vec![json!({"id": "S1", "Tumor_Type": "123", "Case_ID": "C1"})],
    };
    let insights = MockInsights::new(
        lung_vocabulary(),
        BTreeSet::new(),
        vec!["QUEUED", "PARTIALLY_COMPLETED"],
    );
    let dir = tempfile::tempdir().unwrap();
    let app = App::new(warehouse, insights, FieldSchema::default_clarity());

    let result = app
        .run(
            &auth(),
            &select_ids(&["S1"]),
            &options_in(&dir, IngestMode::Strict),
            &JsonOutput,
        )
        .unwrap();
    assert_eq!(result.final_status.as_deref(), Some("PARTIALLY_COMPLETED"));
}

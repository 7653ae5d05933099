use std::fs;
use std::thread;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::domain::{AuthContext, IngestMode, IngestionHandle, IngestionStatus};
use crate::error::CasebridgeError;
use crate::extract::extract_fields;
use crate::insights::CaseClient;
use crate::schema::FieldSchema;
use crate::select::{SampleSelection, select_samples};
use crate::table::{build_table, default_output_name};
use crate::validate::{check_case_collisions, check_tumor_types};
use crate::warehouse::WarehouseClient;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: IngestMode,
    pub output_csv: Option<Utf8PathBuf>,
    /// Build and validate the document but skip the upload/poll phase.
    pub dry_run: bool,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: IngestMode::Strict,
            output_csv: None,
            dry_run: false,
            poll_interval: Duration::from_secs(2),
            max_poll_attempts: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub output_path: String,
    pub rows: usize,
    pub header: Vec<String>,
    pub rows_with_missing: usize,
    pub ambiguous_samples: usize,
    pub validation_warnings: Vec<String>,
    pub handle: Option<IngestionHandle>,
    pub final_status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// The ingestion pipeline: fetch, select, extract, tabulate, serialize,
/// validate remotely, upload, poll. Sequential and batch-oriented; each
/// stage consumes the complete output of the previous one.
#[derive(Clone)]
pub struct App<W: WarehouseClient, C: CaseClient> {
    warehouse: W,
    insights: C,
    schema: FieldSchema,
}

impl<W: WarehouseClient, C: CaseClient> App<W, C> {
    pub fn new(warehouse: W, insights: C, schema: FieldSchema) -> Self {
        Self {
            warehouse,
            insights,
            schema,
        }
    }

    pub fn run(
        &self,
        auth: &AuthContext,
        selection: &SampleSelection,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, CasebridgeError> {
        sink.event(ProgressEvent {
            message: "phase=Load; querying Clarity sample view".to_string(),
            elapsed: None,
        });
        let records = self.warehouse.fetch_sample_table()?;

        sink.event(ProgressEvent {
            message: format!("phase=Select; {}", selection.describe()),
            elapsed: None,
        });
        let selected = select_samples(&records, selection)?;

        sink.event(ProgressEvent {
            message: format!("phase=Extract; {} record(s)", selected.records.len()),
            elapsed: None,
        });
        let extracted = selected
            .records
            .iter()
            .map(|record| extract_fields(record, &self.schema))
            .collect::<Vec<_>>();
        let table = build_table(&self.schema, &extracted)?;

        let output_path = options
            .output_csv
            .clone()
            .unwrap_or_else(|| Utf8PathBuf::from(default_output_name()));
        sink.event(ProgressEvent {
            message: format!("phase=Write; {output_path}"),
            elapsed: None,
        });
        table.write_to(&output_path)?;

        if table.rows_with_missing() > 0 {
            tracing::warn!(
                rows = table.rows_with_missing(),
                path = %output_path,
                "lines with missing fields"
            );
            if options.mode == IngestMode::Strict {
                return Err(CasebridgeError::IncompleteRows {
                    rows: table.rows_with_missing(),
                    path: output_path.to_string(),
                });
            }
        }

        sink.event(ProgressEvent {
            message: "phase=Validate; cross-checking against Connected Insights".to_string(),
            elapsed: None,
        });
        let vocabulary = self.insights.fetch_tumor_type_vocabulary(auth)?;
        let existing = self.insights.fetch_existing_case_ids(auth)?;
        let mut warnings = check_tumor_types(&table, &vocabulary)?;
        warnings.extend(check_case_collisions(&table, &existing)?);
        for warning in &warnings {
            tracing::warn!("{warning}");
        }
        if options.mode == IngestMode::Strict && !warnings.is_empty() {
            return Err(CasebridgeError::ValidationFailed {
                warnings: warnings.len(),
                path: output_path.to_string(),
            });
        }

        let mut result = RunResult {
            output_path: output_path.to_string(),
            rows: table.rows().len(),
            header: table.header().to_vec(),
            rows_with_missing: table.rows_with_missing(),
            ambiguous_samples: selected.ambiguous.len(),
            validation_warnings: warnings.iter().map(ToString::to_string).collect(),
            handle: None,
            final_status: None,
        };
        if options.dry_run {
            return Ok(result);
        }

        let document = fs::read(output_path.as_std_path())
            .map_err(|err| CasebridgeError::Filesystem(format!("reading {output_path}: {err}")))?;
        let filename = output_path.file_name().unwrap_or("case_metadata.csv");
        sink.event(ProgressEvent {
            message: format!("phase=Upload; {filename}"),
            elapsed: None,
        });
        let handle = self.insights.submit_document(auth, document, filename)?;

        let status = self.poll_until_terminal(auth, &handle, options, sink)?;
        result.handle = Some(handle);
        result.final_status = Some(status.to_string());
        Ok(result)
    }

    /// Poll the ingestion status until it leaves QUEUED/IN_PROGRESS. The
    /// terminal status is surfaced verbatim; interpreting FAILED is the
    /// caller's responsibility.
    fn poll_until_terminal(
        &self,
        auth: &AuthContext,
        handle: &IngestionHandle,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<IngestionStatus, CasebridgeError> {
        let mut attempts = 0u32;
        loop {
            let status = self.insights.poll_status(auth, handle)?;
            attempts += 1;
            if status.is_terminal() {
                return Ok(status);
            }
            if attempts >= options.max_poll_attempts {
                return Err(CasebridgeError::IngestionTimeout { attempts });
            }
            sink.event(ProgressEvent {
                message: format!("phase=Poll; status={status} attempt={attempts}"),
                elapsed: None,
            });
            thread::sleep(options.poll_interval);
        }
    }
}

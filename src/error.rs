use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CasebridgeError {
    #[error("invalid sample id: {0}")]
    InvalidSampleId(String),

    #[error("invalid workgroup id: {0}")]
    InvalidWorkgroupId(String),

    #[error(
        "no selection criteria: provide at least one sample id or a Clarity LIMS sample project"
    )]
    InvalidSelection,

    #[error("no matching samples for {0}")]
    NoMatch(String),

    #[error("multiple projects match {0}")]
    MultipleProjects(String),

    #[error("field schema conflict: {0}")]
    SchemaConflict(String),

    #[error("no fields of interest found in the selected samples")]
    NoUsableFields,

    #[error("none of the mandatory fields found: {0}")]
    MissingMandatorySchema(String),

    #[error("column not present in table header: {0}")]
    MissingColumn(String),

    #[error("{warnings} validation warning(s) in {path}; see warnings above")]
    ValidationFailed { warnings: usize, path: String },

    #[error("{rows} line(s) with missing fields in {path}; see warnings above")]
    IncompleteRows { rows: usize, path: String },

    #[error("ingestion still pending after {attempts} status checks")]
    IngestionTimeout { attempts: u32 },

    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("no CLARITY table in the project Base catalogue; available tables: {0}")]
    MissingClarityTable(String),

    #[error("warehouse request failed: {0}")]
    WarehouseHttp(String),

    #[error("warehouse returned status {status}: {message}")]
    WarehouseStatus { status: u16, message: String },

    #[error("platform authentication request failed: {0}")]
    AuthHttp(String),

    #[error("platform authentication returned status {status}: {message}")]
    AuthStatus { status: u16, message: String },

    #[error("no workgroup associated to the authenticated user")]
    NoWorkgroup,

    #[error("case service request failed: {0}")]
    InsightsHttp(String),

    #[error("case service returned status {status}: {message}")]
    InsightsStatus { status: u16, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

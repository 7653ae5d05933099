use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CasebridgeError;

/// Whether validation warnings abort the run or are only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    Strict,
    Lenient,
}

impl fmt::Display for IngestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestMode::Strict => write!(f, "strict"),
            IngestMode::Lenient => write!(f, "lenient"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleId(String);

impl SampleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SampleId {
    type Err = CasebridgeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_string();
        if normalized.is_empty() || normalized.contains(',') {
            return Err(CasebridgeError::InvalidSampleId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkgroupId(String);

impl WorkgroupId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkgroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WorkgroupId {
    type Err = CasebridgeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_string();
        if normalized.is_empty() {
            return Err(CasebridgeError::InvalidWorkgroupId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// Identity acquired once per run and passed to every remote call.
/// Never persisted.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub domain: String,
    pub workgroup: WorkgroupId,
    pub token: String,
}

/// Opaque identifier returned by the case-data upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionHandle(String);

impl IngestionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IngestionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote ingestion lifecycle. Anything outside QUEUED/IN_PROGRESS is
/// terminal for the polling loop; unknown values are surfaced verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestionStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Other(String),
}

impl IngestionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, IngestionStatus::Queued | IngestionStatus::InProgress)
    }
}

impl From<&str> for IngestionStatus {
    fn from(value: &str) -> Self {
        match value {
            "QUEUED" => IngestionStatus::Queued,
            "IN_PROGRESS" => IngestionStatus::InProgress,
            "COMPLETED" => IngestionStatus::Completed,
            "FAILED" => IngestionStatus::Failed,
            other => IngestionStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for IngestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestionStatus::Queued => write!(f, "QUEUED"),
            IngestionStatus::InProgress => write!(f, "IN_PROGRESS"),
            IngestionStatus::Completed => write!(f, "COMPLETED"),
            IngestionStatus::Failed => write!(f, "FAILED"),
            IngestionStatus::Other(value) => write!(f, "{value}"),
        }
    }
}

/// One nested entry of the user-defined-fields container.
#[derive(Debug, Clone, Deserialize)]
pub struct UserDefinedField {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

/// One row of the Clarity sample view: a flat mapping of field name to value,
/// where one field may itself hold an ordered list of key/value pairs.
#[derive(Debug, Clone, Deserialize)]
pub struct SampleRecord {
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl SampleRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn id(&self) -> Option<&str> {
        self.fields.get("id").and_then(Value::as_str)
    }

    pub fn lims_project(&self) -> Option<&str> {
        self.fields.get("limsSampleProject").and_then(Value::as_str)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Entries of the named nested container, in source order. Entries that
    /// do not look like `{key, value}` pairs are skipped.
    pub fn nested_entries(&self, container: &str) -> Vec<UserDefinedField> {
        self.fields
            .get(container)
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        serde_json::from_value::<UserDefinedField>(entry.clone()).ok()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;

use crate::domain::SampleRecord;
use crate::error::CasebridgeError;

const PAGE_SIZE: u64 = 30;

/// Warehouse/query access, presented to the pipeline as a single synchronous
/// call returning the fully materialized sample table.
pub trait WarehouseClient: Send + Sync {
    fn fetch_sample_table(&self) -> Result<Vec<SampleRecord>, CasebridgeError>;
}

#[derive(Clone)]
pub struct ClarityWarehouseClient {
    client: Client,
    base_url: String,
    project_id: String,
}

impl ClarityWarehouseClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        project_id: impl Into<String>,
    ) -> Result<Self, CasebridgeError> {
        Ok(Self {
            client: build_client(api_key)?,
            base_url: format!("{}/ica/rest", base_url.trim_end_matches('/')),
            project_id: project_id.into(),
        })
    }

    /// Pre-flight check that the API key is accepted at all.
    pub fn validate_api_key(&self) -> Result<(), CasebridgeError> {
        let url = format!("{}/api/tokens", self.base_url);
        let response = self.send_with_retries(|| self.client.get(&url))?;
        handle_status(response).map(|_| ())
    }

    /// Pre-flight check that the project is visible to the caller.
    pub fn validate_project(&self) -> Result<(), CasebridgeError> {
        let url = format!("{}/api/projects/{}", self.base_url, self.project_id);
        let response = self.send_with_retries(|| self.client.get(&url))?;
        handle_status(response).map(|_| ())
    }

    /// Resolve a project name to its id via the paginated project search.
    /// More than one hit is fatal; the project must be named unambiguously.
    pub fn resolve_project_id(
        base_url: &str,
        api_key: &str,
        project_name: &str,
    ) -> Result<String, CasebridgeError> {
        let probe = Self::new(base_url, api_key, "")?;
        let mut matches: Vec<ProjectItem> = Vec::new();
        let mut offset = 0u64;
        loop {
            let url = format!(
                "{}/api/projects?search={project_name}&includeHiddenProjects=true&pageOffset={offset}&pageSize={PAGE_SIZE}",
                probe.base_url
            );
            let response = probe.send_with_retries(|| probe.client.get(&url))?;
            let page: PagedProjects = handle_status(response)?
                .json()
                .map_err(|err| CasebridgeError::WarehouseHttp(err.to_string()))?;
            let fetched = page.items.len() as u64;
            matches.extend(page.items);
            offset += fetched;
            if fetched == 0 || offset >= page.total_item_count {
                break;
            }
        }

        match matches.len() {
            0 => Err(CasebridgeError::NoMatch(format!(
                "ICA project {project_name}"
            ))),
            1 => Ok(matches.remove(0).id),
            _ => {
                let names = matches
                    .iter()
                    .map(|project| project.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                tracing::warn!(candidates = %names, "ambiguous project name");
                Err(CasebridgeError::MultipleProjects(project_name.to_string()))
            }
        }
    }

    fn clarity_table_name(&self) -> Result<String, CasebridgeError> {
        let url = format!(
            "{}/api/projects/{}/base/tables",
            self.base_url, self.project_id
        );
        let response = self.send_with_retries(|| self.client.get(&url))?;
        let tables: TableList = handle_status(response)?
            .json()
            .map_err(|err| CasebridgeError::WarehouseHttp(err.to_string()))?;

        let names = tables
            .items
            .iter()
            .map(|table| table.name.as_str())
            .collect::<Vec<_>>();
        names
            .iter()
            .find(|name| name.starts_with("CLARITY"))
            .map(|name| (*name).to_string())
            .ok_or_else(|| CasebridgeError::MissingClarityTable(names.join(", ")))
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, CasebridgeError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        std::thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        std::thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(CasebridgeError::WarehouseHttp(err.to_string()));
                }
            }
        }
    }
}

impl WarehouseClient for ClarityWarehouseClient {
    fn fetch_sample_table(&self) -> Result<Vec<SampleRecord>, CasebridgeError> {
        let table_name = self.clarity_table_name()?;
        let url = format!(
            "{}/api/projects/{}/base/tables/{table_name}/data",
            self.base_url, self.project_id
        );
        let response = self.send_with_retries(|| self.client.get(&url))?;
        let rows: TableRows = handle_status(response)?
            .json()
            .map_err(|err| CasebridgeError::WarehouseHttp(err.to_string()))?;

        let mut records = Vec::with_capacity(rows.items.len());
        for (index, row) in rows.items.into_iter().enumerate() {
            match parse_record(row) {
                Some(record) => records.push(record),
                None => tracing::warn!(row = index, table = %table_name, "unparseable sample row"),
            }
        }
        Ok(records)
    }
}

/// A warehouse row carries the sample document in its data column, either
/// inline as a JSON object or as an embedded JSON string.
fn parse_record(row: Value) -> Option<SampleRecord> {
    let data = row.get("data").or_else(|| row.get("DATA"))?;
    let value = match data {
        Value::String(text) => serde_json::from_str(text).ok()?,
        other => other.clone(),
    };
    serde_json::from_value(value).ok()
}

fn build_client(api_key: &str) -> Result<Client, CasebridgeError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/vnd.illumina.v3+json"),
    );
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/vnd.illumina.v3+json"),
    );
    headers.insert(
        "X-API-Key",
        HeaderValue::from_str(api_key)
            .map_err(|err| CasebridgeError::WarehouseHttp(err.to_string()))?,
    );
    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(|err| CasebridgeError::WarehouseHttp(err.to_string()))
}

fn handle_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, CasebridgeError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .unwrap_or_else(|_| "warehouse request failed".to_string());
    Err(CasebridgeError::WarehouseStatus { status, message })
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[derive(Debug, Deserialize)]
struct PagedProjects {
    #[serde(rename = "totalItemCount")]
    total_item_count: u64,
    items: Vec<ProjectItem>,
}

#[derive(Debug, Deserialize)]
struct ProjectItem {
    name: String,
    id: String,
}

#[derive(Debug, Deserialize)]
struct TableList {
    items: Vec<TableItem>,
}

#[derive(Debug, Deserialize)]
struct TableItem {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TableRows {
    items: Vec<Value>,
}

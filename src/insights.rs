use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;

use crate::domain::{AuthContext, IngestionHandle, IngestionStatus};
use crate::error::CasebridgeError;

const PAGE_SIZE: u64 = 100;

/// Connected Insights boundary as the pipeline sees it: authoritative value
/// sets, the case-data upload, and status polling. Pagination is handled
/// here; callers see one logical result set.
pub trait CaseClient: Send + Sync {
    fn fetch_tumor_type_vocabulary(
        &self,
        auth: &AuthContext,
    ) -> Result<BTreeMap<String, String>, CasebridgeError>;

    fn fetch_existing_case_ids(
        &self,
        auth: &AuthContext,
    ) -> Result<BTreeSet<String>, CasebridgeError>;

    fn submit_document(
        &self,
        auth: &AuthContext,
        document: Vec<u8>,
        filename: &str,
    ) -> Result<IngestionHandle, CasebridgeError>;

    fn poll_status(
        &self,
        auth: &AuthContext,
        handle: &IngestionHandle,
    ) -> Result<IngestionStatus, CasebridgeError>;
}

#[derive(Clone)]
pub struct InsightsHttpClient {
    client: Client,
    domain_url: String,
}

impl InsightsHttpClient {
    pub fn new(domain_url: &str) -> Result<Self, CasebridgeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| CasebridgeError::InsightsHttp(err.to_string()))?;
        Ok(Self {
            client,
            domain_url: domain_url.trim_end_matches('/').to_string(),
        })
    }

    fn with_auth(
        &self,
        request: reqwest::blocking::RequestBuilder,
        auth: &AuthContext,
    ) -> reqwest::blocking::RequestBuilder {
        request
            .header("accept", "*/*")
            .header("X-ILMN-Domain", &auth.domain)
            .header("X-ILMN-Workgroup", auth.workgroup.as_str())
            .header(AUTHORIZATION, &auth.token)
    }

    fn send(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<reqwest::blocking::Response, CasebridgeError> {
        let response = request
            .send()
            .map_err(|err| CasebridgeError::InsightsHttp(err.to_string()))?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "case service request failed".to_string());
        Err(CasebridgeError::InsightsStatus { status, message })
    }
}

impl CaseClient for InsightsHttpClient {
    fn fetch_tumor_type_vocabulary(
        &self,
        auth: &AuthContext,
    ) -> Result<BTreeMap<String, String>, CasebridgeError> {
        let url = format!("{}/crs/api/v1/ontology/tumor-types", self.domain_url);
        let response = self.send(self.with_auth(self.client.get(&url), auth))?;
        let vocabulary: VocabularyPage = response
            .json()
            .map_err(|err| CasebridgeError::InsightsHttp(err.to_string()))?;
        Ok(vocabulary
            .items
            .into_iter()
            .map(|term| (term.code, term.display))
            .collect())
    }

    fn fetch_existing_case_ids(
        &self,
        auth: &AuthContext,
    ) -> Result<BTreeSet<String>, CasebridgeError> {
        let mut ids = BTreeSet::new();
        let mut page_number = 0u64;
        loop {
            let url = format!(
                "{}/crs/api/v1/cases?pageNumber={page_number}&pageSize={PAGE_SIZE}",
                self.domain_url
            );
            let response = self.send(self.with_auth(self.client.get(&url), auth))?;
            let page: CasePage = response
                .json()
                .map_err(|err| CasebridgeError::InsightsHttp(err.to_string()))?;
            if page.items.is_empty() {
                break;
            }
            ids.extend(page.items.into_iter().map(|case| case.case_id));
            page_number += 1;
            if page_number * PAGE_SIZE >= page.total_item_count {
                break;
            }
        }
        Ok(ids)
    }

    fn submit_document(
        &self,
        auth: &AuthContext,
        document: Vec<u8>,
        filename: &str,
    ) -> Result<IngestionHandle, CasebridgeError> {
        let url = format!("{}/crs/api/v2/custom-case-data/files", self.domain_url);
        let part = Part::bytes(document)
            .file_name(filename.to_string())
            .mime_str("text/csv")
            .map_err(|err| CasebridgeError::InsightsHttp(err.to_string()))?;
        let form = Form::new().part("files", part);
        let response = self.send(self.with_auth(self.client.post(&url), auth).multipart(form))?;
        let uploaded: Vec<UploadedFile> = response
            .json()
            .map_err(|err| CasebridgeError::InsightsHttp(err.to_string()))?;
        uploaded
            .into_iter()
            .next()
            .map(|file| IngestionHandle::new(file.id))
            .ok_or_else(|| {
                CasebridgeError::InsightsHttp("upload response contained no file id".to_string())
            })
    }

    fn poll_status(
        &self,
        auth: &AuthContext,
        handle: &IngestionHandle,
    ) -> Result<IngestionStatus, CasebridgeError> {
        let url = format!(
            "{}/crs/api/v1/custom-case-data/{}/status",
            self.domain_url,
            handle.as_str()
        );
        let response = self.send(self.with_auth(self.client.get(&url), auth))?;
        let payload: StatusPayload = response
            .json()
            .map_err(|err| CasebridgeError::InsightsHttp(err.to_string()))?;
        Ok(IngestionStatus::from(payload.status.as_str()))
    }
}

#[derive(Debug, Deserialize)]
struct VocabularyPage {
    items: Vec<VocabularyTerm>,
}

#[derive(Debug, Deserialize)]
struct VocabularyTerm {
    code: String,
    display: String,
}

#[derive(Debug, Deserialize)]
struct CasePage {
    #[serde(rename = "totalItemCount")]
    total_item_count: u64,
    items: Vec<CaseItem>,
}

#[derive(Debug, Deserialize)]
struct CaseItem {
    #[serde(rename = "caseId")]
    case_id: String,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    status: String,
}

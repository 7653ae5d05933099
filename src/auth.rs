use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::json;

use crate::domain::{AuthContext, WorkgroupId};
use crate::error::CasebridgeError;

/// Token negotiation boundary: credentials in, opaque capability out.
pub trait AuthClient: Send + Sync {
    fn authenticate(&self) -> Result<AuthContext, CasebridgeError>;
}

pub struct PlatformAuthClient {
    client: Client,
    platform_url: String,
    domain_url: String,
    application_name: String,
    username: String,
    password: String,
}

impl PlatformAuthClient {
    pub fn new(
        platform_url: &str,
        domain_url: &str,
        application_name: &str,
        username: &str,
        password: &str,
    ) -> Result<Self, CasebridgeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| CasebridgeError::AuthHttp(err.to_string()))?;
        Ok(Self {
            client,
            platform_url: platform_url.trim_end_matches('/').to_string(),
            domain_url: domain_url.trim_end_matches('/').to_string(),
            application_name: application_name.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    fn session_token(&self) -> Result<String, CasebridgeError> {
        let url = format!("{}/platform-services-manager/Session/", self.platform_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .header("accept", "application/json")
            .header("grant_type", "password")
            .json(&json!({
                "clientId": self.application_name,
                "rURL": self.domain_url,
            }))
            .send()
            .map_err(|err| CasebridgeError::AuthHttp(err.to_string()))?;
        let response = handle_status(response)?;
        let session: SessionPayload = response
            .json()
            .map_err(|err| CasebridgeError::AuthHttp(err.to_string()))?;
        Ok(session.access_token)
    }

    fn workgroup(&self, domain: &str, token: &str) -> Result<WorkgroupId, CasebridgeError> {
        let url = format!("{}/crs/api/v1/session/workgroups", self.domain_url);
        let response = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .header("X-ILMN-Domain", domain)
            .header(AUTHORIZATION, token)
            .send()
            .map_err(|err| CasebridgeError::AuthHttp(err.to_string()))?;
        let response = handle_status(response)?;
        let payload: WorkgroupsPayload = response
            .json()
            .map_err(|err| CasebridgeError::AuthHttp(err.to_string()))?;

        // A user can belong to several workgroups; the first role wins, as
        // in the service's own session bootstrap.
        let role = payload
            .workgroup_roles
            .into_iter()
            .next()
            .ok_or(CasebridgeError::NoWorkgroup)?;
        tracing::info!(
            workgroup = %role.orgid,
            name = %role.org_name,
            "resolved workgroup"
        );
        role.orgid.parse()
    }
}

impl AuthClient for PlatformAuthClient {
    fn authenticate(&self) -> Result<AuthContext, CasebridgeError> {
        let token = self.session_token()?;
        let domain = domain_tag(&self.domain_url);
        let workgroup = self.workgroup(&domain, &token)?;
        Ok(AuthContext {
            domain,
            workgroup,
            token,
        })
    }
}

/// Domain tag sent in `X-ILMN-Domain`: the first label of the service host.
fn domain_tag(domain_url: &str) -> String {
    domain_url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('.')
        .next()
        .unwrap_or_default()
        .to_string()
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
        .unwrap_or_else(|_| "platform authentication failed".to_string());
    Err(CasebridgeError::AuthStatus { status, message })
}

#[derive(Debug, Deserialize)]
struct SessionPayload {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct WorkgroupsPayload {
    #[serde(rename = "workgroupRoles")]
    workgroup_roles: Vec<WorkgroupRole>,
}

#[derive(Debug, Deserialize)]
struct WorkgroupRole {
    orgid: String,
    #[serde(rename = "orgName")]
    org_name: String,
}

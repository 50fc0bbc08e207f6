use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::config::model::{ApiEndpoints, Credentials};
use crate::error::DeviceError;
use crate::status::{StatusClient, StatusReport, parse_started_at};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Client-credential token exchange plus the `streams?user_login=` query.
pub struct HelixStatusClient {
    http: Client,
    endpoints: ApiEndpoints,
    credentials: Credentials,
}

impl HelixStatusClient {
    pub fn new(endpoints: ApiEndpoints, credentials: Credentials) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("livewatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            endpoints,
            credentials,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamsResponse {
    #[serde(default)]
    data: Vec<StreamEntry>,
}

#[derive(Debug, Deserialize)]
struct StreamEntry {
    #[serde(default)]
    started_at: Option<String>,
}

impl StatusClient for HelixStatusClient {
    fn fetch_token(&mut self) -> Result<String, DeviceError> {
        let form = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ];
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&form)
            .send()
            .map_err(|err| DeviceError::token(err.to_string()))?;
        if !response.status().is_success() {
            return Err(DeviceError::token(format!(
                "token endpoint answered HTTP {}",
                response.status()
            )));
        }
        let keys: TokenResponse = response
            .json()
            .map_err(|err| DeviceError::token(format!("invalid token response: {err}")))?;
        match keys.access_token {
            Some(token) if !token.is_empty() => {
                log::info!("obtained API token");
                Ok(token)
            }
            _ => Err(DeviceError::token("response carried no access_token")),
        }
    }

    fn query(&mut self, token: &str, account: &str) -> Result<StatusReport, DeviceError> {
        let response = self
            .http
            .get(&self.endpoints.streams_url)
            .query(&[("user_login", account)])
            .header("Client-ID", &self.credentials.client_id)
            .bearer_auth(token)
            .send()
            .map_err(|err| DeviceError::status(err.to_string()))?;
        if !response.status().is_success() {
            return Err(DeviceError::status(format!(
                "status endpoint answered HTTP {}",
                response.status()
            )));
        }
        let body: StreamsResponse = response
            .json()
            .map_err(|err| DeviceError::status(format!("invalid status response: {err}")))?;
        log::debug!("status data for {account}: {} entries", body.data.len());
        Ok(report_from_entries(&body.data))
    }
}

fn report_from_entries(entries: &[StreamEntry]) -> StatusReport {
    let Some(entry) = entries.first() else {
        return StatusReport::Offline;
    };
    let raw = entry.started_at.clone().unwrap_or_default();
    match parse_started_at(&raw) {
        Ok(started_at) => StatusReport::Live { started_at },
        Err(err) => {
            log::warn!("{err}");
            StatusReport::Unparseable { raw }
        }
    }
}

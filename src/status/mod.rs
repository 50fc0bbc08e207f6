pub mod helix;
pub mod scheduler;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::error::DeviceError;

/// What one status query said about the account.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum StatusReport {
    Offline,
    Live { started_at: i64 },
    /// Live data came back but its start time could not be read.
    Unparseable { raw: String },
}

impl StatusReport {
    /// Start time to feed the session tracker; unreadable reports count as
    /// not live for this cycle.
    pub fn started_at(&self) -> Option<i64> {
        match self {
            StatusReport::Live { started_at } => Some(*started_at),
            StatusReport::Offline | StatusReport::Unparseable { .. } => None,
        }
    }
}

/// Remote streaming-status API. The token is fetched once per boot.
pub trait StatusClient {
    fn fetch_token(&mut self) -> Result<String, DeviceError>;
    fn query(&mut self, token: &str, account: &str) -> Result<StatusReport, DeviceError>;
}

#[derive(Debug, Error, Eq, PartialEq)]
#[error("unparseable start timestamp '{raw}'")]
pub struct StartTimeError {
    pub raw: String,
}

/// Parse an ISO-8601 UTC timestamp such as `2023-09-26T09:00:54Z` into epoch
/// seconds. The trailing UTC designator is optional.
pub fn parse_started_at(raw: &str) -> Result<i64, StartTimeError> {
    let trimmed = raw.trim();
    let without_designator = trimmed
        .strip_suffix('Z')
        .or_else(|| trimmed.strip_suffix('z'))
        .unwrap_or(trimmed);
    NaiveDateTime::parse_from_str(without_designator, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(without_designator, "%Y-%m-%dT%H:%M:%S"))
        .map(|naive| naive.and_utc().timestamp())
        .map_err(|_| StartTimeError {
            raw: raw.to_string(),
        })
}

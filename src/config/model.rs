use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::breaks::{NOTICE_COUNT, NOTICE_SPACING_MS};
use crate::status::scheduler::{DEFAULT_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS};
use crate::tick::TICKS_HALF_PERIOD;

pub const CONFIG_VERSION: u32 = 1;
pub const DEFAULT_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
pub const DEFAULT_STREAMS_URL: &str = "https://api.twitch.tv/helix/streams";
pub const DEFAULT_BREAK_DELAY_MS: u32 = 30 * 60 * 1_000;
pub const DEFAULT_REBOOT_DELAY_MS: u32 = 22 * 60 * 60 * 1_000;
pub const DEFAULT_FATAL_RESTART_DELAY_S: u32 = 10;
/// The first notice sits this far before the break deadline, so a break
/// delay must be strictly longer for a new schedule to start with no notice due.
pub const BREAK_NOTICE_SPAN_MS: u32 = NOTICE_COUNT as u32 * NOTICE_SPACING_MS as u32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub version: u32,
    pub account: String,
    pub credentials: Credentials,
    #[serde(default)]
    pub api: ApiEndpoints,
    #[serde(default)]
    pub timing: TimingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEndpoints {
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_streams_url")]
    pub streams_url: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            token_url: default_token_url(),
            streams_url: default_streams_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u32,
    #[serde(default = "default_break_reminders")]
    pub break_reminders: bool,
    #[serde(default = "default_break_delay_ms")]
    pub break_delay_ms: u32,
    #[serde(default = "default_reboot_delay_ms")]
    pub reboot_delay_ms: u32,
    #[serde(default = "default_fatal_restart_delay_s")]
    pub fatal_restart_delay_s: u32,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            break_reminders: default_break_reminders(),
            break_delay_ms: default_break_delay_ms(),
            reboot_delay_ms: default_reboot_delay_ms(),
            fatal_restart_delay_s: default_fatal_restart_delay_s(),
        }
    }
}

impl DeviceConfig {
    pub fn template() -> Self {
        Self {
            version: CONFIG_VERSION,
            account: "your_account_login".to_string(),
            credentials: Credentials {
                client_id: "YOUR-CLIENT-ID".to_string(),
                client_secret: "YOUR-CLIENT-SECRET".to_string(),
            },
            api: ApiEndpoints::default(),
            timing: TimingSettings::default(),
        }
    }
}

pub fn load_device_config(path: &Path) -> Result<DeviceConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read config file {}", path.display()))?;
    parse_device_config_text(&content)
}

pub fn parse_device_config_text(content: &str) -> Result<DeviceConfig> {
    let config = serde_json::from_str::<DeviceConfig>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow::anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })?;
    validate_device_config(&config)?;
    Ok(config)
}

pub fn validate_device_config(config: &DeviceConfig) -> Result<()> {
    if config.version != CONFIG_VERSION {
        bail!(
            "unsupported config version {}; expected version {CONFIG_VERSION}",
            config.version
        );
    }
    if config.account.trim().is_empty() {
        bail!("account must name the login to monitor");
    }
    if config.credentials.client_id.trim().is_empty() {
        bail!("credentials.client_id must not be empty");
    }
    if config.credentials.client_secret.trim().is_empty() {
        bail!("credentials.client_secret must not be empty");
    }

    let timing = &config.timing;
    if timing.break_delay_ms <= BREAK_NOTICE_SPAN_MS {
        bail!(
            "timing.break_delay_ms = {} must be longer than the {BREAK_NOTICE_SPAN_MS} ms covered by the break notices",
            timing.break_delay_ms
        );
    }
    if timing.poll_interval_ms > MAX_POLL_INTERVAL_MS {
        bail!(
            "timing.poll_interval_ms = {} exceeds {MAX_POLL_INTERVAL_MS} ms, the longest interval the first poll can be seeded for",
            timing.poll_interval_ms
        );
    }
    let limit = TICKS_HALF_PERIOD;
    for (name, value) in [
        ("poll_interval_ms", timing.poll_interval_ms),
        ("break_delay_ms", timing.break_delay_ms),
        ("reboot_delay_ms", timing.reboot_delay_ms),
    ] {
        if value >= limit {
            bail!("timing.{name} = {value} exceeds the tick comparison window of {limit} ms");
        }
    }
    Ok(())
}

pub fn save_device_config(path: &Path, config: &DeviceConfig) -> Result<()> {
    let text = serde_json::to_string_pretty(config)?;
    fs::write(path, format!("{text}\n"))
        .with_context(|| format!("unable to write config file {}", path.display()))?;
    Ok(())
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

fn default_streams_url() -> String {
    DEFAULT_STREAMS_URL.to_string()
}

fn default_poll_interval_ms() -> u32 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_break_reminders() -> bool {
    true
}

fn default_break_delay_ms() -> u32 {
    DEFAULT_BREAK_DELAY_MS
}

fn default_reboot_delay_ms() -> u32 {
    DEFAULT_REBOOT_DELAY_MS
}

fn default_fatal_restart_delay_s() -> u32 {
    DEFAULT_FATAL_RESTART_DELAY_S
}

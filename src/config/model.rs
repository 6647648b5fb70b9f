// src/config/model.rs

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::RefreshSpec;
use crate::engine::poller::PollSettings;
use crate::retry::RetryPolicy;
use crate::types::RefreshKind;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// endpoint = "https://analytics.example.com"
/// site_id = "marketing"
/// poll_mode = true
/// continue_on_error = false
///
/// [credentials]
/// type = "personal_access_token"
/// token_name = "pipeline"
/// token_secret = "..."
///
/// [[datasources]]
/// name = "Sales"
/// tag = "prod"
/// kind = "full"
///
/// [[workbooks]]
/// id = "9b3c6d0e-..."
///
/// [retry]
/// max_attempts = 10
///
/// [polling]
/// interval_secs = 10
/// timeout_secs = 7200
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Server base URL.
    pub endpoint: String,

    /// Site URL name; omitted or empty selects the default site.
    #[serde(default)]
    pub site_id: Option<String>,

    /// Pin the REST API version instead of asking the server.
    #[serde(default)]
    pub api_version: Option<String>,

    pub credentials: Credentials,

    #[serde(default)]
    pub datasources: Vec<SpecConfig>,

    #[serde(default)]
    pub workbooks: Vec<SpecConfig>,

    /// Wait for every triggered job to finish and fail on failed jobs.
    #[serde(default)]
    pub poll_mode: bool,

    /// Record per-spec failures instead of aborting the run.
    #[serde(default)]
    pub continue_on_error: bool,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: f64,

    #[serde(default)]
    pub retry: RetrySection,

    #[serde(default)]
    pub polling: PollingSection,
}

fn default_request_timeout_secs() -> f64 {
    60.0
}

/// Sign-in credentials, selected by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    PersonalAccessToken {
        token_name: String,
        token_secret: Secret,
    },
    Password {
        username: String,
        password: Secret,
    },
}

/// A secret string whose `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// One `[[datasources]]` or `[[workbooks]]` entry.
///
/// Empty strings are treated as absent, so exported configs that always
/// carry every key still work.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpecConfig {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub tag: Option<String>,

    /// Stable unique identifier (LUID).
    #[serde(default, alias = "luid")]
    pub id: Option<String>,

    /// Refresh kind. Required for datasources; a workbook without a kind is
    /// refreshed directly instead of through a scheduled task.
    #[serde(default, alias = "type")]
    pub kind: Option<RefreshKind>,
}

/// `[retry]` section. Delays are in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: f64,

    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: f64,

    /// Random extra delay range `[min, max]` added after every attempt.
    #[serde(default = "default_jitter_secs")]
    pub jitter_secs: [f64; 2],
}

fn default_max_attempts() -> u32 {
    42
}

fn default_initial_delay_secs() -> f64 {
    0.5
}

fn default_backoff_factor() -> f64 {
    std::f64::consts::SQRT_2
}

fn default_max_delay_secs() -> f64 {
    60.0
}

fn default_jitter_secs() -> [f64; 2] {
    [0.0, 0.5]
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_secs: default_initial_delay_secs(),
            backoff_factor: default_backoff_factor(),
            max_delay_secs: default_max_delay_secs(),
            jitter_secs: default_jitter_secs(),
        }
    }
}

/// `[polling]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PollingSection {
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: f64,

    /// Overall deadline for waiting on jobs; `0` waits forever.
    #[serde(default = "default_poll_timeout_secs")]
    pub timeout_secs: f64,
}

fn default_poll_interval_secs() -> f64 {
    5.0
}

fn default_poll_timeout_secs() -> f64 {
    4.0 * 60.0 * 60.0
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
            timeout_secs: default_poll_timeout_secs(),
        }
    }
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub endpoint: String,
    pub site_id: Option<String>,
    pub api_version: Option<String>,
    pub credentials: Credentials,
    /// Datasource specs first, then workbook specs, each in file order.
    pub specs: Vec<RefreshSpec>,
    pub poll_mode: bool,
    pub continue_on_error: bool,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub polling: PollSettings,
}

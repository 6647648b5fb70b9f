// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{
    ConfigFile, Credentials, PollingSection, RawConfigFile, RetrySection, SpecConfig,
};
use crate::engine::RefreshSpec;
use crate::engine::poller::PollSettings;
use crate::errors::{RefreshError, Result};
use crate::retry::RetryPolicy;
use crate::types::EntityKind;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = RefreshError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let endpoint = validate_endpoint(&raw.endpoint)?;
        validate_credentials(&raw.credentials)?;
        let specs = build_specs(&raw.datasources, &raw.workbooks)?;
        let retry = build_retry_policy(&raw.retry)?;
        let polling = build_poll_settings(&raw.polling)?;
        let request_timeout = positive_secs("request_timeout_secs", raw.request_timeout_secs)?;

        Ok(ConfigFile {
            endpoint,
            site_id: non_empty(raw.site_id),
            api_version: non_empty(raw.api_version),
            credentials: raw.credentials,
            specs,
            poll_mode: raw.poll_mode,
            continue_on_error: raw.continue_on_error,
            request_timeout,
            retry,
            polling,
        })
    }
}

fn config_error(msg: impl Into<String>) -> RefreshError {
    RefreshError::Config(msg.into())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_endpoint(endpoint: &str) -> Result<String> {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.is_empty() {
        return Err(config_error("`endpoint` must not be empty"));
    }
    if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
        return Err(config_error(format!(
            "`endpoint` must start with http:// or https:// (got '{endpoint}')"
        )));
    }
    Ok(endpoint.to_string())
}

fn validate_credentials(credentials: &Credentials) -> Result<()> {
    let (user_field, user, secret_field, secret) = match credentials {
        Credentials::PersonalAccessToken {
            token_name,
            token_secret,
        } => ("token_name", token_name.as_str(), "token_secret", token_secret.expose()),
        Credentials::Password { username, password } => {
            ("username", username.as_str(), "password", password.expose())
        }
    };
    if user.trim().is_empty() {
        return Err(config_error(format!("[credentials].{user_field} must not be empty")));
    }
    if secret.is_empty() {
        return Err(config_error(format!("[credentials].{secret_field} must not be empty")));
    }
    Ok(())
}

fn build_specs(datasources: &[SpecConfig], workbooks: &[SpecConfig]) -> Result<Vec<RefreshSpec>> {
    if datasources.is_empty() && workbooks.is_empty() {
        return Err(config_error(
            "config must contain at least one [[datasources]] or [[workbooks]] entry",
        ));
    }

    let datasource_specs = datasources
        .iter()
        .enumerate()
        .map(|(i, entry)| build_spec(EntityKind::Datasource, i, entry));
    let workbook_specs = workbooks
        .iter()
        .enumerate()
        .map(|(i, entry)| build_spec(EntityKind::Workbook, i, entry));

    datasource_specs.chain(workbook_specs).collect()
}

/// Normalise one entry and check it identifies something.
pub fn build_spec(entity_kind: EntityKind, index: usize, entry: &SpecConfig) -> Result<RefreshSpec> {
    let section = entity_kind.collection();
    let name = non_empty(entry.name.clone());
    let id = non_empty(entry.id.clone());

    if name.is_none() && id.is_none() {
        return Err(config_error(format!(
            "[[{section}]] entry #{} needs a `name` or an `id`",
            index + 1
        )));
    }
    if entity_kind == EntityKind::Datasource && entry.kind.is_none() {
        return Err(config_error(format!(
            "[[{section}]] entry #{} ({}) needs a refresh `kind` (full or incremental)",
            index + 1,
            name.as_deref().or(id.as_deref()).unwrap_or_default()
        )));
    }

    Ok(RefreshSpec {
        entity_kind,
        name,
        tag: non_empty(entry.tag.clone()),
        id,
        kind: entry.kind,
    })
}

fn build_retry_policy(section: &RetrySection) -> Result<RetryPolicy> {
    if section.max_attempts == 0 {
        return Err(config_error("[retry].max_attempts must be >= 1 (got 0)"));
    }
    if !(section.backoff_factor.is_finite() && section.backoff_factor >= 1.0) {
        return Err(config_error(format!(
            "[retry].backoff_factor must be >= 1.0 (got {})",
            section.backoff_factor
        )));
    }

    let initial_delay = non_negative_secs("[retry].initial_delay_secs", section.initial_delay_secs)?;
    let max_delay = non_negative_secs("[retry].max_delay_secs", section.max_delay_secs)?;
    if max_delay < initial_delay {
        return Err(config_error(
            "[retry].max_delay_secs must not be smaller than initial_delay_secs",
        ));
    }

    let [jitter_min, jitter_max] = section.jitter_secs;
    let jitter_min = non_negative_secs("[retry].jitter_secs[0]", jitter_min)?;
    let jitter_max = non_negative_secs("[retry].jitter_secs[1]", jitter_max)?;
    if jitter_max < jitter_min {
        return Err(config_error("[retry].jitter_secs must be [min, max] with min <= max"));
    }

    Ok(RetryPolicy {
        max_attempts: section.max_attempts,
        initial_delay,
        backoff_factor: section.backoff_factor,
        max_delay,
        jitter: (jitter_min, jitter_max),
        ..RetryPolicy::default()
    })
}

fn build_poll_settings(section: &PollingSection) -> Result<PollSettings> {
    let interval = positive_secs("[polling].interval_secs", section.interval_secs)?;
    let timeout = non_negative_secs("[polling].timeout_secs", section.timeout_secs)?;
    Ok(PollSettings {
        interval,
        timeout: (!timeout.is_zero()).then_some(timeout),
    })
}

fn non_negative_secs(field: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| config_error(format!("{field} must be a non-negative number of seconds (got {secs})")))
}

fn positive_secs(field: &str, secs: f64) -> Result<Duration> {
    let duration = non_negative_secs(field, secs)?;
    if duration.is_zero() {
        return Err(config_error(format!("{field} must be greater than 0")));
    }
    Ok(duration)
}

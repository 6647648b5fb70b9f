#![allow(dead_code)]

use std::time::Duration;

use extract_trigger::config::model::{PollingSection, RetrySection};
use extract_trigger::config::{ConfigFile, Credentials, RawConfigFile, Secret, SpecConfig};
use extract_trigger::remote::{RefreshTask, RemoteEntity};
use extract_trigger::retry::RetryPolicy;
use extract_trigger::types::{EntityKind, RefreshKind};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Retries and polling use millisecond delays so tests with paused time
/// stay short.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                endpoint: "https://analytics.example.com".into(),
                site_id: Some("marketing".into()),
                api_version: None,
                credentials: Credentials::PersonalAccessToken {
                    token_name: "pipeline".into(),
                    token_secret: Secret::new("s3cr3t"),
                },
                datasources: Vec::new(),
                workbooks: Vec::new(),
                poll_mode: false,
                continue_on_error: false,
                request_timeout_secs: 5.0,
                retry: RetrySection {
                    max_attempts: 3,
                    initial_delay_secs: 0.001,
                    backoff_factor: 1.0,
                    max_delay_secs: 0.001,
                    jitter_secs: [0.0, 0.0],
                },
                polling: PollingSection {
                    interval_secs: 1.0,
                    timeout_secs: 60.0,
                },
            },
        }
    }

    pub fn endpoint(mut self, url: &str) -> Self {
        self.config.endpoint = url.to_string();
        self
    }

    pub fn api_version(mut self, version: &str) -> Self {
        self.config.api_version = Some(version.to_string());
        self
    }

    pub fn with_datasource(mut self, spec: SpecConfig) -> Self {
        self.config.datasources.push(spec);
        self
    }

    pub fn with_workbook(mut self, spec: SpecConfig) -> Self {
        self.config.workbooks.push(spec);
        self
    }

    pub fn poll_mode(mut self, val: bool) -> Self {
        self.config.poll_mode = val;
        self
    }

    pub fn continue_on_error(mut self, val: bool) -> Self {
        self.config.continue_on_error = val;
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `[[datasources]]`/`[[workbooks]]` entry by name.
pub fn spec_entry(name: &str, kind: Option<RefreshKind>) -> SpecConfig {
    SpecConfig {
        name: Some(name.to_string()),
        kind,
        ..SpecConfig::default()
    }
}

/// Builder for `RemoteEntity`.
pub struct EntityBuilder {
    entity: RemoteEntity,
}

impl EntityBuilder {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            entity: RemoteEntity {
                id: id.to_string(),
                name: name.to_string(),
                project_name: "Default".to_string(),
                tags: Default::default(),
            },
        }
    }

    pub fn project(mut self, name: &str) -> Self {
        self.entity.project_name = name.to_string();
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.entity.tags.insert(tag.to_string());
        self
    }

    pub fn build(self) -> RemoteEntity {
        self.entity
    }
}

pub fn entity(id: &str, name: &str) -> RemoteEntity {
    EntityBuilder::new(id, name).build()
}

pub fn datasource_task(id: &str, kind: RefreshKind, target_id: &str) -> RefreshTask {
    RefreshTask {
        id: id.to_string(),
        kind,
        target_id: target_id.to_string(),
        target_kind: EntityKind::Datasource,
    }
}

pub fn workbook_task(id: &str, kind: RefreshKind, target_id: &str) -> RefreshTask {
    RefreshTask {
        target_kind: EntityKind::Workbook,
        ..datasource_task(id, kind, target_id)
    }
}

/// Retry policy with `max_attempts` attempts and a 1ms fixed delay.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::fixed(max_attempts, Duration::from_millis(1))
}

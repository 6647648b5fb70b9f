// tests/config_loading.rs

use std::io::Write;
use std::time::Duration;

use extract_trigger::config::{Credentials, load_and_validate};
use extract_trigger::errors::{EXIT_OPERATOR_ERROR, RefreshError};
use extract_trigger::types::{EntityKind, RefreshKind};
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn full_config_loads_with_defaults() {
    let file = write_config(
        r#"
endpoint = "https://analytics.example.com/"
site_id = "marketing"
poll_mode = true

[credentials]
type = "personal_access_token"
token_name = "pipeline"
token_secret = "s3cr3t"

[[datasources]]
name = "Sales"
tag = "prod"
type = "RefreshExtractTask"

[[datasources]]
luid = "a1b2"
kind = "incremental"

[[workbooks]]
name = "Exec Dashboard"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.endpoint, "https://analytics.example.com");
    assert_eq!(cfg.site_id.as_deref(), Some("marketing"));
    assert!(cfg.poll_mode);
    assert!(!cfg.continue_on_error);
    assert!(matches!(cfg.credentials, Credentials::PersonalAccessToken { .. }));

    assert_eq!(cfg.specs.len(), 3);
    assert_eq!(cfg.specs[0].kind, Some(RefreshKind::Full));
    assert_eq!(cfg.specs[0].tag.as_deref(), Some("prod"));
    assert_eq!(cfg.specs[1].id.as_deref(), Some("a1b2"));
    assert_eq!(cfg.specs[1].kind, Some(RefreshKind::Incremental));
    assert_eq!(cfg.specs[2].entity_kind, EntityKind::Workbook);
    assert_eq!(cfg.specs[2].kind, None);

    assert_eq!(cfg.retry.max_attempts, 42);
    assert_eq!(cfg.retry.max_delay, Duration::from_secs(60));
    assert_eq!(cfg.polling.interval, Duration::from_secs(5));
    assert_eq!(cfg.request_timeout, Duration::from_secs(60));
}

#[test]
fn password_credentials_and_custom_sections() {
    let file = write_config(
        r#"
endpoint = "http://localhost:8080"
continue_on_error = true
request_timeout_secs = 10

[credentials]
type = "password"
username = "svc"
password = "hunter2"

[[datasources]]
name = "Sales"
kind = "full"

[retry]
max_attempts = 5
initial_delay_secs = 1
backoff_factor = 2.0

[polling]
interval_secs = 30
timeout_secs = 0
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();

    assert!(cfg.continue_on_error);
    assert!(!format!("{:?}", cfg.credentials).contains("hunter2"));
    assert_eq!(cfg.retry.max_attempts, 5);
    assert_eq!(cfg.retry.initial_delay, Duration::from_secs(1));
    assert_eq!(cfg.polling.interval, Duration::from_secs(30));
    assert_eq!(cfg.polling.timeout, None);
    assert_eq!(cfg.request_timeout, Duration::from_secs(10));
}

#[test]
fn datasource_without_kind_returns_config_error() {
    let file = write_config(
        r#"
endpoint = "https://analytics.example.com"

[credentials]
type = "personal_access_token"
token_name = "pipeline"
token_secret = "s3cr3t"

[[datasources]]
name = "Sales"
"#,
    );

    match load_and_validate(file.path()) {
        Err(err @ RefreshError::Config(_)) => {
            assert!(err.to_string().contains("kind"));
            assert_eq!(err.exit_code(), EXIT_OPERATOR_ERROR);
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn unknown_refresh_kind_is_a_toml_error() {
    let file = write_config(
        r#"
endpoint = "https://analytics.example.com"

[credentials]
type = "personal_access_token"
token_name = "pipeline"
token_secret = "s3cr3t"

[[datasources]]
name = "Sales"
kind = "sometimes"
"#,
    );

    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, RefreshError::Toml(_)));
    assert_eq!(err.exit_code(), EXIT_OPERATOR_ERROR);
}

#[test]
fn missing_file_is_io_error() {
    let err = load_and_validate("/definitely/not/here/extract-trigger.toml").unwrap_err();
    assert!(matches!(err, RefreshError::Io(_)));
}

// src/errors.rs

//! Crate-wide error types.
//!
//! - [`RemoteError`] is what the remote service boundary reports. It knows
//!   whether a failure is worth retrying.
//! - [`RefreshError`] is the engine taxonomy surfaced to the operator. Every
//!   variant that concerns a particular refresh spec carries enough detail
//!   (name, tag, LUID, candidates) to fix the configuration without
//!   re-running with verbose logging.

use std::fmt::Write as _;
use std::time::Duration;

use thiserror::Error;

use crate::engine::report::FailedJob;
use crate::remote::RemoteEntity;
use crate::types::{EntityKind, RefreshKind};

/// Exit code for configuration, resolution, matching and job failures.
pub const EXIT_OPERATOR_ERROR: i32 = 1;
/// Exit code for anything else.
pub const EXIT_UNEXPECTED_ERROR: i32 = 2;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server responded with HTTP {status}: {message}")]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// The server acknowledged the request but the body lacks the element
    /// the operation promises (e.g. a run-now call without a job).
    #[error("unfinished response from {operation}: {message}")]
    UnfinishedResponse { operation: String, message: String },

    #[error("could not decode response from {operation}: {message}")]
    Decode { operation: String, message: String },

    #[error("not signed in to the server")]
    NotAuthenticated,
}

impl RemoteError {
    /// Whether the failure is worth another attempt.
    ///
    /// Transport failures, 5xx answers, rate limiting and unfinished
    /// responses are transient. Everything else is final.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request() || e.is_body(),
            RemoteError::Status { status, .. } => *status >= 500 || *status == 429,
            RemoteError::UnfinishedResponse { .. } => true,
            RemoteError::Decode { .. } | RemoteError::NotAuthenticated => false,
        }
    }

    /// HTTP status of a server error answer, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            RemoteError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// One refresh spec together with why it could not be processed.
#[derive(Debug)]
pub struct SpecFailure {
    pub spec: String,
    pub error: RefreshError,
}

impl SpecFailure {
    pub fn new(spec: impl Into<String>, error: RefreshError) -> Self {
        Self {
            spec: spec.into(),
            error,
        }
    }
}

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("there is no {kind} for the combination of name '{name}' and {}", tag_phrase(.tag))]
    NoMatch {
        kind: EntityKind,
        name: String,
        tag: Option<String>,
    },

    #[error("there is no {kind} with the specified LUID '{id}'")]
    NotFound { kind: EntityKind, id: String },

    #[error(
        "there is more than one {kind} for name '{name}' and {}; set a more specific tag or use a LUID. The results are: {}",
        tag_phrase(.tag),
        entity_list(.candidates)
    )]
    AmbiguousMatch {
        kind: EntityKind,
        name: String,
        tag: Option<String>,
        candidates: Vec<RemoteEntity>,
    },

    #[error(
        "the {kind} retrieved by the LUID '{id}' has name '{retrieved}' which does not match the name specified in the configuration: '{configured}'"
    )]
    IdentityMismatch {
        kind: EntityKind,
        id: String,
        configured: String,
        retrieved: String,
    },

    #[error(
        "no {kind} refresh task found for {target_kind} {entity}; create the extract refresh task of type {kind} on the server first"
    )]
    TaskNotFound {
        target_kind: EntityKind,
        entity: String,
        kind: RefreshKind,
    },

    #[error(
        "found {} {kind} refresh tasks for {target_kind} {entity}: [{}]",
        .task_ids.len(),
        .task_ids.join(", ")
    )]
    DuplicateTasks {
        target_kind: EntityKind,
        entity: String,
        kind: RefreshKind,
        task_ids: Vec<String>,
    },

    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: RemoteError,
    },

    #[error("{operation} failed: {source}")]
    Remote {
        operation: String,
        #[source]
        source: RemoteError,
    },

    #[error("could not start refresh job for {spec}: {source}")]
    Trigger {
        spec: String,
        #[source]
        source: Box<RefreshError>,
    },

    #[error("{} refresh job(s) failed:{}", .0.len(), job_list(.0))]
    JobsFailed(Vec<FailedJob>),

    #[error(
        "refresh jobs did not finish within {}s; still pending: [{}]{}",
        .waited.as_secs(),
        .pending.join(", "),
        failed_suffix(.failed)
    )]
    PollTimeout {
        waited: Duration,
        pending: Vec<String>,
        /// Jobs that had already failed when the deadline passed.
        failed: Vec<FailedJob>,
    },

    /// Polling stopped on an error after some jobs had already failed.
    #[error(
        "{} refresh job(s) failed before polling stopped:{}\npolling stopped: {source}",
        .failed.len(),
        job_list(.failed)
    )]
    PollInterrupted {
        failed: Vec<FailedJob>,
        #[source]
        source: Box<RefreshError>,
    },

    #[error("{} refresh spec(s) could not be processed:{}", .0.len(), failure_list(.0))]
    InvalidSpecs(Vec<SpecFailure>),

    #[error("all {} refresh spec(s) failed:{}", .0.len(), failure_list(.0))]
    AllSpecsFailed(Vec<SpecFailure>),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RefreshError {
    /// Whether the operator can fix this by changing configuration or the
    /// server-side setup, as opposed to an unexpected failure.
    pub fn is_operator_error(&self) -> bool {
        match self {
            RefreshError::Config(_)
            | RefreshError::Io(_)
            | RefreshError::Toml(_)
            | RefreshError::NoMatch { .. }
            | RefreshError::NotFound { .. }
            | RefreshError::AmbiguousMatch { .. }
            | RefreshError::IdentityMismatch { .. }
            | RefreshError::TaskNotFound { .. }
            | RefreshError::DuplicateTasks { .. }
            | RefreshError::JobsFailed(_)
            | RefreshError::PollTimeout { .. }
            | RefreshError::PollInterrupted { .. } => true,
            RefreshError::InvalidSpecs(failures) | RefreshError::AllSpecsFailed(failures) => {
                failures.iter().all(|f| f.error.is_operator_error())
            }
            RefreshError::Trigger { source, .. } => source.is_operator_error(),
            // Rejected credentials, missing permissions and the like.
            RefreshError::Remote { source, .. } => {
                matches!(source.status(), Some(status) if (400..500).contains(&status))
            }
            RefreshError::RetryExhausted { .. } | RefreshError::Other(_) => false,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        if self.is_operator_error() {
            EXIT_OPERATOR_ERROR
        } else {
            EXIT_UNEXPECTED_ERROR
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RefreshError>;

fn tag_phrase(tag: &Option<String>) -> String {
    match tag {
        Some(tag) => format!("tag '{tag}'"),
        None => "no tag".to_string(),
    }
}

fn entity_list(entities: &[RemoteEntity]) -> String {
    let items: Vec<String> = entities.iter().map(|e| e.to_string()).collect();
    format!("[{}]", items.join(", "))
}

fn job_list(jobs: &[FailedJob]) -> String {
    let mut out = String::new();
    for job in jobs {
        let _ = write!(out, "\n  - {job}");
    }
    out
}

fn failed_suffix(jobs: &[FailedJob]) -> String {
    if jobs.is_empty() {
        String::new()
    } else {
        format!("; already failed:{}", job_list(jobs))
    }
}

fn failure_list(failures: &[SpecFailure]) -> String {
    let mut out = String::new();
    for failure in failures {
        let _ = write!(out, "\n  - {}: {}", failure.spec, failure.error);
    }
    out
}

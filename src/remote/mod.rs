// src/remote/mod.rs

//! Remote analytics server boundary.
//!
//! The engine never sees HTTP, authentication handshakes, pagination or
//! response bodies. It talks to a [`RemoteService`] and only reasons about the
//! value types defined here:
//!
//! - [`RemoteEntity`]: a datasource or workbook snapshot.
//! - [`RefreshTask`]: a scheduled extract refresh definition.
//! - [`Job`]: an asynchronous job started by running a task.
//!
//! [`rest::RestClient`] is the production implementation; tests provide a
//! scripted fake.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::config::model::Credentials;
use crate::errors::RemoteError;
use crate::types::{EntityKind, RefreshKind};

pub mod rest;
pub mod wire;

pub use rest::RestClient;

/// Boxed future returned by boundary operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A datasource or workbook as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntity {
    pub id: String,
    pub name: String,
    pub project_name: String,
    pub tags: BTreeSet<String>,
}

impl RemoteEntity {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

impl fmt::Display for RemoteEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.tags.iter().map(String::as_str).collect();
        write!(
            f,
            "(Name: {}, Project: {}, LUID: {}, Tags: [{}])",
            self.name,
            self.project_name,
            self.id,
            tags.join(", ")
        )
    }
}

/// A pre-existing scheduled extract refresh definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTask {
    pub id: String,
    pub kind: RefreshKind,
    pub target_id: String,
    pub target_kind: EntityKind,
}

impl fmt::Display for RefreshTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(ID: {}, Task type: {}, Target: {} {})",
            self.id,
            self.kind,
            self.target_kind.element(),
            self.target_id
        )
    }
}

/// Job handle. `finish_code` stays `None` while the job is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub finish_code: Option<i32>,
}

impl Job {
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            finish_code: None,
        }
    }
}

/// Server-side filter for entity listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityFilter {
    pub name: Option<String>,
    pub tag: Option<String>,
}

/// Authenticated session details.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub site_id: String,
    pub user_id: Option<String>,
    pub token: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("site_id", &self.site_id)
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Operations the engine consumes from the analytics server.
///
/// Entity operations are keyed by [`EntityKind`] rather than by separate
/// methods per endpoint, so resolution code is identical for datasources
/// and workbooks.
pub trait RemoteService: Send + Sync {
    fn authenticate<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, Result<Session, RemoteError>>;

    fn list_entities<'a>(
        &'a self,
        kind: EntityKind,
        filter: &'a EntityFilter,
    ) -> BoxFuture<'a, Result<Vec<RemoteEntity>, RemoteError>>;

    fn get_entity_by_id<'a>(
        &'a self,
        kind: EntityKind,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<RemoteEntity>, RemoteError>>;

    fn list_tasks(&self) -> BoxFuture<'_, Result<Vec<RefreshTask>, RemoteError>>;

    fn run_task<'a>(&'a self, task: &'a RefreshTask) -> BoxFuture<'a, Result<Job, RemoteError>>;

    fn refresh_workbook<'a>(
        &'a self,
        entity: &'a RemoteEntity,
    ) -> BoxFuture<'a, Result<Job, RemoteError>>;

    fn get_job<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Job, RemoteError>>;

    /// End the session. Implementations without sessions keep the default.
    fn sign_out(&self) -> BoxFuture<'_, Result<(), RemoteError>> {
        Box::pin(async { Ok(()) })
    }
}

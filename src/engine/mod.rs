// src/engine/mod.rs

//! Refresh orchestration engine.
//!
//! A run moves through fixed phases:
//! - resolve every [`RefreshSpec`] to exactly one remote entity ([`resolver`])
//! - match resolved entities to scheduled refresh tasks ([`matcher`])
//! - start one job per spec ([`trigger`])
//! - optionally wait for all jobs to finish ([`poller`])
//!
//! [`orchestrator::Orchestrator`] sequences the phases and applies the
//! continue-on-error policy; progress is reported through an
//! [`events::EventSink`].

use std::fmt;

use crate::types::{EntityKind, RefreshKind};

pub mod events;
pub mod matcher;
pub mod orchestrator;
pub mod poller;
pub mod report;
pub mod resolver;
pub mod trigger;

pub use events::{EventSink, RunEvent, TracingEventSink};
pub use matcher::TaskIndex;
pub use orchestrator::{Orchestrator, OrchestratorOptions, RefreshPlan};
pub use poller::{JobPoller, JobState, PollSettings};
pub use report::{ExecutionOutcome, FailedJob, RunReport};
pub use trigger::{PlannedRefresh, RefreshAction};

/// One configured refresh: which entity to refresh and how.
///
/// At least one of `name` and `id` is set (enforced by config validation).
/// `kind` is always set for datasources; a workbook without a kind is
/// refreshed directly rather than through a scheduled task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSpec {
    pub entity_kind: EntityKind,
    pub name: Option<String>,
    pub tag: Option<String>,
    pub id: Option<String>,
    pub kind: Option<RefreshKind>,
}

impl RefreshSpec {
    pub fn datasource(name: impl Into<String>, kind: RefreshKind) -> Self {
        Self {
            entity_kind: EntityKind::Datasource,
            name: Some(name.into()),
            tag: None,
            id: None,
            kind: Some(kind),
        }
    }

    pub fn workbook(name: impl Into<String>) -> Self {
        Self {
            entity_kind: EntityKind::Workbook,
            name: Some(name.into()),
            tag: None,
            id: None,
            kind: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_kind(mut self, kind: RefreshKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

impl fmt::Display for RefreshSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        let kind = self
            .kind
            .map(|k| k.to_string())
            .unwrap_or_else(|| "direct".to_string());
        write!(
            f,
            "{} (name: {}, tag: {}, LUID: {}, refresh: {})",
            self.entity_kind,
            or_dash(&self.name),
            or_dash(&self.tag),
            or_dash(&self.id),
            kind
        )
    }
}

// src/engine/trigger.rs

use std::fmt;

use crate::engine::RefreshSpec;
use crate::errors::{RefreshError, Result};
use crate::remote::{Job, RefreshTask, RemoteEntity, RemoteService};
use crate::retry::RetryPolicy;

/// How a resolved spec gets its job started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshAction {
    /// Run a scheduled extract refresh task now.
    RunTask(RefreshTask),
    /// Ask the server to refresh a workbook directly.
    RefreshWorkbook,
}

/// A spec that passed resolution and matching.
#[derive(Debug, Clone)]
pub struct PlannedRefresh {
    pub spec: RefreshSpec,
    pub entity: RemoteEntity,
    pub action: RefreshAction,
}

impl fmt::Display for PlannedRefresh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            RefreshAction::RunTask(task) => {
                write!(f, "{} -> {} via task {}", self.spec, self.entity, task.id)
            }
            RefreshAction::RefreshWorkbook => {
                write!(f, "{} -> {} via direct refresh", self.spec, self.entity)
            }
        }
    }
}

/// Start the job for `planned`.
///
/// Failures are wrapped in [`RefreshError::Trigger`] naming the spec.
pub async fn trigger<S>(service: &S, retry: &RetryPolicy, planned: &PlannedRefresh) -> Result<Job>
where
    S: RemoteService + ?Sized,
{
    let started = match &planned.action {
        RefreshAction::RunTask(task) => {
            retry
                .execute(&format!("run task {}", task.id), move || service.run_task(task))
                .await
        }
        RefreshAction::RefreshWorkbook => {
            let entity = &planned.entity;
            retry
                .execute(&format!("refresh workbook {}", entity.id), move || {
                    service.refresh_workbook(entity)
                })
                .await
        }
    };

    started.map_err(|source| RefreshError::Trigger {
        spec: planned.spec.to_string(),
        source: Box::new(source),
    })
}

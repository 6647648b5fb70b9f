// src/engine/orchestrator.rs

//! Sequences a refresh run.
//!
//! Phase order is fixed: resolve all specs, then list tasks once and match,
//! then trigger, then (optionally) poll. Nothing is triggered until every
//! spec has been resolved and matched, so a configuration mistake in the
//! last spec does not leave the first ones half-run.
//!
//! Without `continue_on_error` resolution and matching failures are
//! collected per phase and reported together as
//! [`RefreshError::InvalidSpecs`]; any other failure aborts at once. With it,
//! failed specs are recorded in the [`RunReport`] and the rest proceed. If
//! every spec fails the run still fails with [`RefreshError::AllSpecsFailed`].

use tracing::{debug, warn};

use crate::config::model::Credentials;
use crate::engine::events::{EventSink, RunEvent};
use crate::engine::matcher::TaskIndex;
use crate::engine::poller::{JobPoller, PollSettings};
use crate::engine::report::{ExecutionOutcome, RunReport};
use crate::engine::resolver::fetch_and_resolve;
use crate::engine::trigger::{PlannedRefresh, RefreshAction, trigger};
use crate::engine::RefreshSpec;
use crate::errors::{RefreshError, Result, SpecFailure};
use crate::remote::{RemoteEntity, RemoteService, Session};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Default)]
pub struct OrchestratorOptions {
    pub continue_on_error: bool,
    /// Wait for jobs with these settings; `None` returns once jobs are started.
    pub poll: Option<PollSettings>,
}

/// Resolved and matched specs, ready to trigger.
#[derive(Debug, Default)]
pub struct RefreshPlan {
    pub items: Vec<PlannedRefresh>,
    /// Specs dropped under continue-on-error.
    pub failures: Vec<SpecFailure>,
}

pub struct Orchestrator<'a, S: RemoteService> {
    service: &'a S,
    retry: RetryPolicy,
    options: OrchestratorOptions,
    events: &'a dyn EventSink,
}

impl<'a, S: RemoteService> Orchestrator<'a, S> {
    pub fn new(
        service: &'a S,
        retry: RetryPolicy,
        options: OrchestratorOptions,
        events: &'a dyn EventSink,
    ) -> Self {
        Self {
            service,
            retry,
            options,
            events,
        }
    }

    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Session> {
        let service = self.service;
        let session = self
            .retry
            .execute("sign in", move || service.authenticate(credentials))
            .await?;
        self.events.emit(RunEvent::Authenticated {
            site_id: session.site_id.clone(),
        });
        Ok(session)
    }

    /// End the session. Failures are logged and otherwise ignored.
    pub async fn sign_out(&self) {
        if let Err(err) = self.service.sign_out().await {
            warn!(error = %err, "sign out failed");
        }
    }

    /// Resolve and match every spec without starting anything.
    pub async fn plan(&self, specs: &[RefreshSpec]) -> Result<RefreshPlan> {
        let (resolved, mut failures) = self.resolve_all(specs).await?;
        let index = self.build_task_index(&resolved).await?;

        let mut items = Vec::with_capacity(resolved.len());
        let mut unmatched = Vec::new();

        for (spec, entity) in resolved {
            let action = match spec.kind {
                None => Ok(RefreshAction::RefreshWorkbook),
                Some(kind) => index
                    .lookup(spec.entity_kind, &entity, kind)
                    .map(|task| RefreshAction::RunTask(task.clone())),
            };
            match action {
                Ok(action) => items.push(PlannedRefresh {
                    spec,
                    entity,
                    action,
                }),
                Err(err) => unmatched.push(SpecFailure::new(spec.to_string(), err)),
            }
        }

        if !unmatched.is_empty() && !self.options.continue_on_error {
            return Err(RefreshError::InvalidSpecs(unmatched));
        }
        failures.extend(unmatched);

        debug!(planned = items.len(), skipped = failures.len(), "refresh plan ready");
        Ok(RefreshPlan { items, failures })
    }

    /// Trigger every planned refresh and, when configured, wait for the jobs.
    pub async fn execute(&self, plan: RefreshPlan) -> Result<RunReport> {
        let mut outcomes = Vec::with_capacity(plan.items.len() + plan.failures.len());

        for failure in plan.failures {
            self.events.emit(RunEvent::SpecSkipped {
                spec: failure.spec.clone(),
                error: failure.error.to_string(),
            });
            outcomes.push(ExecutionOutcome::failed(failure.spec, failure.error));
        }

        let mut started = Vec::new();
        for item in &plan.items {
            let spec = item.spec.to_string();
            match trigger(self.service, &self.retry, item).await {
                Ok(job) => {
                    self.events.emit(RunEvent::Triggered {
                        spec: spec.clone(),
                        job_id: job.id.clone(),
                    });
                    started.push((spec.clone(), job.clone()));
                    outcomes.push(ExecutionOutcome::started(spec, job));
                }
                Err(err) if self.options.continue_on_error => {
                    self.events.emit(RunEvent::SpecSkipped {
                        spec: spec.clone(),
                        error: err.to_string(),
                    });
                    outcomes.push(ExecutionOutcome::failed(spec, err));
                }
                Err(err) => return Err(err),
            }
        }

        if started.is_empty() && !outcomes.is_empty() {
            let failures = outcomes
                .into_iter()
                .filter_map(|o| o.result.err().map(|e| SpecFailure::new(o.spec, e)))
                .collect();
            return Err(RefreshError::AllSpecsFailed(failures));
        }

        let polled = match &self.options.poll {
            Some(settings) if !started.is_empty() => {
                JobPoller::new(settings.clone())
                    .wait_for_all(self.service, &self.retry, self.events, started)
                    .await?
            }
            _ => Vec::new(),
        };

        let report = RunReport { outcomes, polled };
        self.events.emit(RunEvent::Finished {
            started: report.started().count(),
            failed: report.failures().count(),
        });
        Ok(report)
    }

    /// Plan and execute `specs`.
    pub async fn run(&self, specs: &[RefreshSpec]) -> Result<RunReport> {
        let plan = self.plan(specs).await?;
        self.execute(plan).await
    }

    async fn resolve_all(
        &self,
        specs: &[RefreshSpec],
    ) -> Result<(Vec<(RefreshSpec, RemoteEntity)>, Vec<SpecFailure>)> {
        let mut resolved = Vec::with_capacity(specs.len());
        let mut failures = Vec::new();

        for spec in specs {
            match fetch_and_resolve(self.service, &self.retry, spec).await {
                Ok(entity) => {
                    self.events.emit(RunEvent::Resolved {
                        spec: spec.to_string(),
                        entity: entity.to_string(),
                    });
                    resolved.push((spec.clone(), entity));
                }
                Err(err) if self.options.continue_on_error || is_resolution_error(&err) => {
                    failures.push(SpecFailure::new(spec.to_string(), err));
                }
                Err(err) => return Err(err),
            }
        }

        if !failures.is_empty() && !self.options.continue_on_error {
            return Err(RefreshError::InvalidSpecs(failures));
        }
        Ok((resolved, failures))
    }

    /// List tasks once, unless no resolved spec needs one.
    async fn build_task_index(&self, resolved: &[(RefreshSpec, RemoteEntity)]) -> Result<TaskIndex> {
        if resolved.iter().all(|(spec, _)| spec.kind.is_none()) {
            return Ok(TaskIndex::default());
        }

        let service = self.service;
        let tasks = self
            .retry
            .execute("list tasks", move || service.list_tasks())
            .await?;

        Ok(TaskIndex::build(
            &tasks,
            resolved
                .iter()
                .filter(|(spec, _)| spec.kind.is_some())
                .map(|(spec, entity)| (spec.entity_kind, entity)),
        ))
    }
}

fn is_resolution_error(err: &RefreshError) -> bool {
    matches!(
        err,
        RefreshError::Config(_)
            | RefreshError::NoMatch { .. }
            | RefreshError::NotFound { .. }
            | RefreshError::AmbiguousMatch { .. }
            | RefreshError::IdentityMismatch { .. }
    )
}

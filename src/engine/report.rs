// src/engine/report.rs

use std::fmt;

use crate::engine::poller::{JobState, TrackedJob};
use crate::errors::RefreshError;
use crate::remote::Job;

/// A job that finished with a non-zero finish code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedJob {
    pub spec: String,
    pub job_id: String,
    pub finish_code: i32,
}

impl fmt::Display for FailedJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "job {} for {} finished with code {}",
            self.job_id, self.spec, self.finish_code
        )
    }
}

/// What happened to one refresh spec during a run.
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub spec: String,
    pub result: Result<Job, RefreshError>,
}

impl ExecutionOutcome {
    pub fn started(spec: impl Into<String>, job: Job) -> Self {
        Self {
            spec: spec.into(),
            result: Ok(job),
        }
    }

    pub fn failed(spec: impl Into<String>, error: RefreshError) -> Self {
        Self {
            spec: spec.into(),
            result: Err(error),
        }
    }

    pub fn job_id(&self) -> Option<&str> {
        self.result.as_ref().ok().map(|job| job.id.as_str())
    }

    pub fn error(&self) -> Option<&RefreshError> {
        self.result.as_ref().err()
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of a completed run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<ExecutionOutcome>,
    /// Final job states; empty unless polling was enabled.
    pub polled: Vec<TrackedJob>,
}

impl RunReport {
    pub fn started(&self) -> impl Iterator<Item = &ExecutionOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ExecutionOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn job_ids(&self) -> Vec<&str> {
        self.outcomes.iter().filter_map(|o| o.job_id()).collect()
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Human-readable summary, one line per spec.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.outcomes.len());
        for outcome in &self.outcomes {
            let line = match &outcome.result {
                Ok(job) => match self.polled.iter().find(|t| t.job_id == job.id) {
                    Some(tracked) if tracked.state == JobState::Succeeded => {
                        format!("ok      {}: job {} succeeded", outcome.spec, job.id)
                    }
                    _ => format!("started {}: job {}", outcome.spec, job.id),
                },
                Err(err) => format!("failed  {}: {err}", outcome.spec),
            };
            lines.push(line);
        }
        lines
    }
}

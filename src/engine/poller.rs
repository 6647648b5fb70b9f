// src/engine/poller.rs

//! Wait for started refresh jobs to finish.
//!
//! Jobs are polled in passes. Each pass re-fetches every job that has not
//! finished yet; a job leaves the working set the first time it reports a
//! finish code and its state never changes afterwards. Once the working set
//! is empty, all failed jobs are reported together. Failures seen before a
//! deadline or a poll error are carried in that error too.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::engine::events::{EventSink, RunEvent};
use crate::engine::report::FailedJob;
use crate::errors::{RefreshError, Result};
use crate::remote::{Job, RemoteService};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// Pause between passes.
    pub interval: Duration,
    /// Give up after this long; `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Some(Duration::from_secs(4 * 60 * 60)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Succeeded,
    Failed(i32),
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobState::Pending)
    }

    /// State after observing `finish_code`. Terminal states are final.
    pub fn observe(self, finish_code: Option<i32>) -> Self {
        match (self, finish_code) {
            (JobState::Pending, Some(0)) => JobState::Succeeded,
            (JobState::Pending, Some(code)) => JobState::Failed(code),
            (state, _) => state,
        }
    }
}

/// A job under observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedJob {
    pub spec: String,
    pub job_id: String,
    pub state: JobState,
    pub polls: u32,
}

#[derive(Debug, Clone)]
pub struct JobPoller {
    settings: PollSettings,
}

impl JobPoller {
    pub fn new(settings: PollSettings) -> Self {
        Self { settings }
    }

    /// Poll `jobs` (spec description, job) until every one has finished.
    ///
    /// Returns the final states when all jobs succeeded,
    /// [`RefreshError::JobsFailed`] listing every failed job otherwise, and
    /// [`RefreshError::PollTimeout`] when the deadline passes first. A poll
    /// error after some jobs failed becomes [`RefreshError::PollInterrupted`].
    pub async fn wait_for_all<S>(
        &self,
        service: &S,
        retry: &RetryPolicy,
        events: &dyn EventSink,
        jobs: Vec<(String, Job)>,
    ) -> Result<Vec<TrackedJob>>
    where
        S: RemoteService + ?Sized,
    {
        let started = Instant::now();
        let mut tracked: Vec<TrackedJob> = jobs
            .into_iter()
            .map(|(spec, job)| TrackedJob {
                spec,
                job_id: job.id,
                state: JobState::Pending,
                polls: 0,
            })
            .collect();

        events.emit(RunEvent::PollingStarted {
            jobs: tracked.len(),
        });

        loop {
            let mut pending = 0usize;

            for index in 0..tracked.len() {
                if tracked[index].state.is_terminal() {
                    continue;
                }

                let id = tracked[index].job_id.as_str();
                let current = match retry
                    .execute(&format!("get job {id}"), move || service.get_job(id))
                    .await
                {
                    Ok(current) => current,
                    Err(err) => return Err(interrupted(failed_so_far(&tracked), err)),
                };

                let job = &mut tracked[index];
                job.polls += 1;
                job.state = job.state.observe(current.finish_code);

                match job.state {
                    JobState::Pending => pending += 1,
                    JobState::Succeeded => events.emit(RunEvent::JobSucceeded {
                        spec: job.spec.clone(),
                        job_id: job.job_id.clone(),
                    }),
                    JobState::Failed(finish_code) => events.emit(RunEvent::JobFailed {
                        spec: job.spec.clone(),
                        job_id: job.job_id.clone(),
                        finish_code,
                    }),
                }
            }

            if pending == 0 {
                break;
            }

            let mut wait = self.settings.interval;
            if let Some(timeout) = self.settings.timeout {
                let waited = started.elapsed();
                if waited >= timeout {
                    return Err(RefreshError::PollTimeout {
                        waited,
                        pending: tracked
                            .iter()
                            .filter(|j| !j.state.is_terminal())
                            .map(|j| format!("job {} for {}", j.job_id, j.spec))
                            .collect(),
                        failed: failed_so_far(&tracked),
                    });
                }
                wait = wait.min(timeout - waited);
            }

            debug!(pending, wait_ms = wait.as_millis() as u64, "jobs still running");
            sleep(wait).await;
        }

        let failed = failed_so_far(&tracked);
        if failed.is_empty() {
            Ok(tracked)
        } else {
            Err(RefreshError::JobsFailed(failed))
        }
    }
}

fn failed_so_far(tracked: &[TrackedJob]) -> Vec<FailedJob> {
    tracked
        .iter()
        .filter_map(|j| match j.state {
            JobState::Failed(finish_code) => Some(FailedJob {
                spec: j.spec.clone(),
                job_id: j.job_id.clone(),
                finish_code,
            }),
            _ => None,
        })
        .collect()
}

fn interrupted(failed: Vec<FailedJob>, err: RefreshError) -> RefreshError {
    if failed.is_empty() {
        err
    } else {
        RefreshError::PollInterrupted {
            failed,
            source: Box::new(err),
        }
    }
}

// src/engine/events.rs

//! Run progress events.
//!
//! The orchestrator never logs progress directly; it emits [`RunEvent`]s to
//! an injected [`EventSink`]. The production sink forwards them to `tracing`,
//! tests record them.

use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    Authenticated {
        site_id: String,
    },
    Resolved {
        spec: String,
        entity: String,
    },
    /// A spec failed and the run continues without it.
    SpecSkipped {
        spec: String,
        error: String,
    },
    Triggered {
        spec: String,
        job_id: String,
    },
    PollingStarted {
        jobs: usize,
    },
    JobSucceeded {
        spec: String,
        job_id: String,
    },
    JobFailed {
        spec: String,
        job_id: String,
        finish_code: i32,
    },
    Finished {
        started: usize,
        failed: usize,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: RunEvent);
}

/// Forwards events to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: RunEvent) {
        match event {
            RunEvent::Authenticated { site_id } => info!(%site_id, "signed in"),
            RunEvent::Resolved { spec, entity } => info!(%spec, %entity, "resolved"),
            RunEvent::SpecSkipped { spec, error } => {
                warn!(%spec, %error, "refresh spec failed; continuing with the rest")
            }
            RunEvent::Triggered { spec, job_id } => info!(%spec, %job_id, "refresh job started"),
            RunEvent::PollingStarted { jobs } => info!(jobs, "waiting for refresh jobs to finish"),
            RunEvent::JobSucceeded { spec, job_id } => {
                info!(%spec, %job_id, "refresh job finished successfully")
            }
            RunEvent::JobFailed {
                spec,
                job_id,
                finish_code,
            } => error!(%spec, %job_id, finish_code, "refresh job failed"),
            RunEvent::Finished { started, failed } => info!(started, failed, "run finished"),
        }
    }
}

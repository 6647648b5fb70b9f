// tests/job_poller.rs

use std::time::Duration;

use extract_trigger::engine::{JobPoller, JobState, PollSettings, RunEvent};
use extract_trigger::errors::{EXIT_OPERATOR_ERROR, EXIT_UNEXPECTED_ERROR, RefreshError};
use extract_trigger::remote::Job;
use extract_trigger_test_utils::builders::fast_retry;
use extract_trigger_test_utils::fake_service::{FakeOp, FakeRemoteService, RecordingSink};
use extract_trigger_test_utils::init_tracing;

fn settings(interval_secs: u64, timeout_secs: Option<u64>) -> PollSettings {
    PollSettings {
        interval: Duration::from_secs(interval_secs),
        timeout: timeout_secs.map(Duration::from_secs),
    }
}

#[tokio::test(start_paused = true)]
async fn finished_jobs_are_not_polled_again() {
    init_tracing();

    let service = FakeRemoteService::new()
        .with_job_script("a", [Some(0)])
        .with_job_script("b", [None, None, None, Some(0)]);
    let sink = RecordingSink::new();

    let tracked = JobPoller::new(settings(5, None))
        .wait_for_all(
            &service,
            &fast_retry(3),
            &sink,
            vec![
                ("spec a".to_string(), Job::pending("a")),
                ("spec b".to_string(), Job::pending("b")),
            ],
        )
        .await
        .unwrap();

    assert!(tracked.iter().all(|j| j.state == JobState::Succeeded));
    assert_eq!(service.count("get_job a"), 1);
    assert_eq!(service.count("get_job b"), 4);

    let successes = sink
        .events()
        .into_iter()
        .filter(|e| matches!(e, RunEvent::JobSucceeded { .. }))
        .count();
    assert_eq!(successes, 2);
}

#[tokio::test(start_paused = true)]
async fn deadline_reports_pending_jobs() {
    init_tracing();

    let service = FakeRemoteService::new()
        .with_job_script("done", [Some(0)])
        .with_job_script("stuck", [None]);
    let sink = RecordingSink::new();

    let err = JobPoller::new(settings(10, Some(60)))
        .wait_for_all(
            &service,
            &fast_retry(3),
            &sink,
            vec![
                ("spec done".to_string(), Job::pending("done")),
                ("spec stuck".to_string(), Job::pending("stuck")),
            ],
        )
        .await
        .unwrap_err();

    match err {
        RefreshError::PollTimeout {
            waited,
            pending,
            failed,
        } => {
            assert!(waited >= Duration::from_secs(60));
            assert_eq!(pending.len(), 1);
            assert!(pending[0].contains("stuck"));
            assert!(failed.is_empty());
        }
        other => panic!("expected PollTimeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn transient_poll_failures_are_retried() {
    init_tracing();

    let service = FakeRemoteService::new()
        .with_job_script("a", [Some(0)])
        .failing(FakeOp::GetJob, 2);
    let sink = RecordingSink::new();

    let tracked = JobPoller::new(settings(5, None))
        .wait_for_all(
            &service,
            &fast_retry(3),
            &sink,
            vec![("spec a".to_string(), Job::pending("a"))],
        )
        .await
        .unwrap();

    assert_eq!(tracked[0].state, JobState::Succeeded);
    assert_eq!(service.count("get_job"), 3);
}

#[tokio::test(start_paused = true)]
async fn deadline_keeps_jobs_that_already_failed() {
    init_tracing();

    let service = FakeRemoteService::new()
        .with_job_script("a", [Some(1)])
        .with_job_script("b", [None]);
    let sink = RecordingSink::new();

    let err = JobPoller::new(settings(1, Some(3)))
        .wait_for_all(
            &service,
            &fast_retry(3),
            &sink,
            vec![
                ("spec A".to_string(), Job::pending("a")),
                ("spec B".to_string(), Job::pending("b")),
            ],
        )
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), EXIT_OPERATOR_ERROR);
    assert!(err.to_string().contains("spec A"));
    match err {
        RefreshError::PollTimeout { pending, failed, .. } => {
            assert_eq!(pending, vec!["job b for spec B".to_string()]);
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].spec, "spec A");
            assert_eq!(failed[0].finish_code, 1);
        }
        other => panic!("expected PollTimeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn poll_error_keeps_jobs_that_already_failed() {
    init_tracing();

    let service = FakeRemoteService::new()
        .with_job_script("a", [Some(1)])
        .failing_job("c", usize::MAX);
    let sink = RecordingSink::new();

    let err = JobPoller::new(settings(5, None))
        .wait_for_all(
            &service,
            &fast_retry(2),
            &sink,
            vec![
                ("spec A".to_string(), Job::pending("a")),
                ("spec C".to_string(), Job::pending("c")),
            ],
        )
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), EXIT_OPERATOR_ERROR);
    assert!(err.to_string().contains("spec A"));
    match err {
        RefreshError::PollInterrupted { failed, source } => {
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].job_id, "a");
            assert!(matches!(*source, RefreshError::RetryExhausted { attempts: 2, .. }));
        }
        other => panic!("expected PollInterrupted, got {other:?}"),
    }
    assert_eq!(service.count("get_job c"), 2);
}

#[tokio::test(start_paused = true)]
async fn poll_error_without_failures_is_surfaced_as_is() {
    init_tracing();

    let service = FakeRemoteService::new().failing_job("c", usize::MAX);
    let sink = RecordingSink::new();

    let err = JobPoller::new(settings(5, None))
        .wait_for_all(
            &service,
            &fast_retry(2),
            &sink,
            vec![("spec C".to_string(), Job::pending("c"))],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RefreshError::RetryExhausted { .. }));
    assert_eq!(err.exit_code(), EXIT_UNEXPECTED_ERROR);
}

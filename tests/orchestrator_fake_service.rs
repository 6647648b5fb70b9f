// tests/orchestrator_fake_service.rs

use extract_trigger::config::SpecConfig;
use extract_trigger::engine::{RefreshAction, RunEvent};
use extract_trigger::errors::{EXIT_OPERATOR_ERROR, EXIT_UNEXPECTED_ERROR, RefreshError};
use extract_trigger::types::RefreshKind;
use extract_trigger::{Outcome, run_with_service};
use extract_trigger_test_utils::builders::{
    ConfigFileBuilder, EntityBuilder, datasource_task, entity, spec_entry, workbook_task,
};
use extract_trigger_test_utils::fake_service::{FakeOp, FakeRemoteService, RecordingSink};
use extract_trigger_test_utils::init_tracing;

fn completed(outcome: Outcome) -> extract_trigger::engine::RunReport {
    match outcome {
        Outcome::Completed(report) => report,
        Outcome::Planned(_) => panic!("expected a completed run"),
    }
}

#[tokio::test(start_paused = true)]
async fn single_datasource_runs_its_task() {
    init_tracing();

    let service = FakeRemoteService::new()
        .with_datasource(entity("ds-1", "Sales"))
        .with_task(datasource_task("10", RefreshKind::Full, "ds-1"))
        .with_task(datasource_task("11", RefreshKind::Incremental, "ds-1"));
    let cfg = ConfigFileBuilder::new()
        .with_datasource(spec_entry("Sales", Some(RefreshKind::Full)))
        .build();
    let sink = RecordingSink::new();

    let report = completed(run_with_service(&cfg, &service, &sink, false).await.unwrap());

    assert_eq!(report.job_ids(), vec!["job-10"]);
    assert!(!report.has_failures());
    assert_eq!(
        service.calls(),
        vec![
            "authenticate",
            "list_entities datasources",
            "list_tasks",
            "run_task 10",
            "sign_out",
        ]
    );
    assert!(sink.events().contains(&RunEvent::Triggered {
        spec: cfg.specs[0].to_string(),
        job_id: "job-10".into(),
    }));
}

#[tokio::test(start_paused = true)]
async fn ambiguous_spec_aborts_before_anything_runs() {
    init_tracing();

    let service = FakeRemoteService::new()
        .with_datasource(entity("ds-1", "Sales"))
        .with_datasource(EntityBuilder::new("ds-2", "Costs").project("EMEA").build())
        .with_datasource(EntityBuilder::new("ds-3", "Costs").project("APAC").build())
        .with_task(datasource_task("10", RefreshKind::Full, "ds-1"));
    let cfg = ConfigFileBuilder::new()
        .with_datasource(spec_entry("Sales", Some(RefreshKind::Full)))
        .with_datasource(spec_entry("Costs", Some(RefreshKind::Full)))
        .build();
    let sink = RecordingSink::new();

    let err = run_with_service(&cfg, &service, &sink, false)
        .await
        .unwrap_err();

    match &err {
        RefreshError::InvalidSpecs(failures) => {
            assert_eq!(failures.len(), 1);
            assert!(matches!(
                &failures[0].error,
                RefreshError::AmbiguousMatch { candidates, .. } if candidates.len() == 2
            ));
        }
        other => panic!("expected InvalidSpecs, got {other:?}"),
    }
    assert_eq!(err.exit_code(), EXIT_OPERATOR_ERROR);
    assert_eq!(service.count("run_task"), 0);
    assert_eq!(service.count("list_tasks"), 0);
    assert_eq!(service.count("sign_out"), 1);
}

#[tokio::test(start_paused = true)]
async fn continue_on_error_runs_the_valid_specs() {
    init_tracing();

    let service = FakeRemoteService::new()
        .with_datasource(entity("ds-1", "Sales"))
        .with_datasource(entity("ds-2", "Costs"))
        .with_datasource(entity("ds-3", "Costs"))
        .with_task(datasource_task("10", RefreshKind::Full, "ds-1"));
    let cfg = ConfigFileBuilder::new()
        .with_datasource(spec_entry("Sales", Some(RefreshKind::Full)))
        .with_datasource(spec_entry("Costs", Some(RefreshKind::Full)))
        .continue_on_error(true)
        .build();
    let sink = RecordingSink::new();

    let report = completed(run_with_service(&cfg, &service, &sink, false).await.unwrap());

    assert_eq!(report.job_ids(), vec!["job-10"]);
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].spec.contains("Costs"));
    assert!(matches!(
        failures[0].error(),
        Some(RefreshError::AmbiguousMatch { .. })
    ));
    assert!(
        sink.events()
            .iter()
            .any(|e| matches!(e, RunEvent::SpecSkipped { spec, .. } if spec.contains("Costs")))
    );
}

#[tokio::test(start_paused = true)]
async fn every_spec_failing_fails_the_run() {
    init_tracing();

    let service = FakeRemoteService::new().with_datasource(entity("ds-1", "Sales"));
    let cfg = ConfigFileBuilder::new()
        .with_datasource(spec_entry("Sales", Some(RefreshKind::Incremental)))
        .with_datasource(spec_entry("Missing", Some(RefreshKind::Full)))
        .continue_on_error(true)
        .build();
    let sink = RecordingSink::new();

    let err = run_with_service(&cfg, &service, &sink, false)
        .await
        .unwrap_err();

    match &err {
        RefreshError::AllSpecsFailed(failures) => {
            assert_eq!(failures.len(), 2);
            assert!(
                failures
                    .iter()
                    .any(|f| matches!(f.error, RefreshError::NoMatch { .. }))
            );
            assert!(
                failures
                    .iter()
                    .any(|f| matches!(f.error, RefreshError::TaskNotFound { .. }))
            );
        }
        other => panic!("expected AllSpecsFailed, got {other:?}"),
    }
    assert_eq!(err.exit_code(), EXIT_OPERATOR_ERROR);
}

#[tokio::test(start_paused = true)]
async fn missing_task_names_entity_and_kind() {
    init_tracing();

    let service = FakeRemoteService::new()
        .with_datasource(entity("ds-1", "Sales"))
        .with_task(datasource_task("10", RefreshKind::Full, "ds-1"));
    let cfg = ConfigFileBuilder::new()
        .with_datasource(spec_entry("Sales", Some(RefreshKind::Incremental)))
        .build();
    let sink = RecordingSink::new();

    let err = run_with_service(&cfg, &service, &sink, false)
        .await
        .unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("Sales"), "{msg}");
    assert!(msg.contains("incremental"), "{msg}");
}

#[tokio::test(start_paused = true)]
async fn workbooks_use_task_or_direct_refresh() {
    init_tracing();

    let service = FakeRemoteService::new()
        .with_workbook(entity("wb-1", "Exec"))
        .with_workbook(entity("wb-2", "Ops"))
        .with_task(workbook_task("20", RefreshKind::Full, "wb-1"));
    let cfg = ConfigFileBuilder::new()
        .with_workbook(spec_entry("Exec", Some(RefreshKind::Full)))
        .with_workbook(spec_entry("Ops", None))
        .build();
    let sink = RecordingSink::new();

    let report = completed(run_with_service(&cfg, &service, &sink, false).await.unwrap());

    assert_eq!(report.job_ids(), vec!["job-20", "job-wb-wb-2"]);
    assert_eq!(service.count("run_task 20"), 1);
    assert_eq!(service.count("refresh_workbook wb-2"), 1);
}

#[tokio::test(start_paused = true)]
async fn dry_run_plans_without_starting_jobs() {
    init_tracing();

    let service = FakeRemoteService::new()
        .with_datasource(entity("ds-1", "Sales"))
        .with_task(datasource_task("10", RefreshKind::Full, "ds-1"));
    let cfg = ConfigFileBuilder::new()
        .with_datasource(spec_entry("Sales", Some(RefreshKind::Full)))
        .build();
    let sink = RecordingSink::new();

    let outcome = run_with_service(&cfg, &service, &sink, true).await.unwrap();

    match outcome {
        Outcome::Planned(plan) => {
            assert_eq!(plan.items.len(), 1);
            assert!(matches!(&plan.items[0].action, RefreshAction::RunTask(t) if t.id == "10"));
        }
        Outcome::Completed(_) => panic!("dry run must not execute"),
    }
    assert_eq!(service.count("run_task"), 0);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried() {
    init_tracing();

    let service = FakeRemoteService::new()
        .with_datasource(entity("ds-1", "Sales"))
        .with_task(datasource_task("10", RefreshKind::Full, "ds-1"))
        .failing(FakeOp::ListTasks, 2)
        .failing(FakeOp::RunTask, 1);
    let cfg = ConfigFileBuilder::new()
        .with_datasource(spec_entry("Sales", Some(RefreshKind::Full)))
        .build();
    let sink = RecordingSink::new();

    let report = completed(run_with_service(&cfg, &service, &sink, false).await.unwrap());

    assert_eq!(report.job_ids(), vec!["job-10"]);
    assert_eq!(service.count("list_tasks"), 3);
    assert_eq!(service.count("run_task"), 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_are_unexpected_errors() {
    init_tracing();

    let service = FakeRemoteService::new()
        .with_datasource(entity("ds-1", "Sales"))
        .failing(FakeOp::GetEntity, 3);
    let cfg = ConfigFileBuilder::new()
        .with_datasource(SpecConfig {
            id: Some("ds-1".into()),
            kind: Some(RefreshKind::Full),
            ..SpecConfig::default()
        })
        .build();
    let sink = RecordingSink::new();

    let err = run_with_service(&cfg, &service, &sink, false)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RefreshError::RetryExhausted { attempts: 3, .. }
    ));
    assert_eq!(err.exit_code(), EXIT_UNEXPECTED_ERROR);
    assert_eq!(service.count("get_entity"), 3);
}

#[tokio::test(start_paused = true)]
async fn luid_with_other_name_is_rejected() {
    init_tracing();

    let service = FakeRemoteService::new().with_datasource(entity("ds-1", "Sales"));
    let cfg = ConfigFileBuilder::new()
        .with_datasource(SpecConfig {
            name: Some("Revenue".into()),
            id: Some("ds-1".into()),
            kind: Some(RefreshKind::Full),
            ..SpecConfig::default()
        })
        .build();
    let sink = RecordingSink::new();

    let err = run_with_service(&cfg, &service, &sink, false)
        .await
        .unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("'Sales'"), "{msg}");
    assert!(msg.contains("'Revenue'"), "{msg}");
}

#[tokio::test(start_paused = true)]
async fn polling_reports_failed_jobs() {
    init_tracing();

    let service = FakeRemoteService::new()
        .with_datasource(entity("ds-1", "Sales"))
        .with_datasource(entity("ds-2", "Costs"))
        .with_task(datasource_task("10", RefreshKind::Full, "ds-1"))
        .with_task(datasource_task("11", RefreshKind::Full, "ds-2"))
        .with_job_script("job-10", [Some(0)])
        .with_job_script("job-11", [None, None, Some(1)]);
    let cfg = ConfigFileBuilder::new()
        .with_datasource(spec_entry("Sales", Some(RefreshKind::Full)))
        .with_datasource(spec_entry("Costs", Some(RefreshKind::Full)))
        .poll_mode(true)
        .build();
    let sink = RecordingSink::new();

    let err = run_with_service(&cfg, &service, &sink, false)
        .await
        .unwrap_err();

    match &err {
        RefreshError::JobsFailed(jobs) => {
            assert_eq!(jobs.len(), 1);
            assert_eq!(jobs[0].job_id, "job-11");
            assert_eq!(jobs[0].finish_code, 1);
            assert!(jobs[0].spec.contains("Costs"));
        }
        other => panic!("expected JobsFailed, got {other:?}"),
    }
    assert_eq!(err.exit_code(), EXIT_OPERATOR_ERROR);
    assert_eq!(service.count("get_job job-10"), 1);
    assert_eq!(service.count("get_job job-11"), 3);
}

#[tokio::test(start_paused = true)]
async fn polling_success_marks_jobs_done() {
    init_tracing();

    let service = FakeRemoteService::new()
        .with_datasource(entity("ds-1", "Sales"))
        .with_task(datasource_task("10", RefreshKind::Full, "ds-1"))
        .with_job_script("job-10", [None, Some(0)]);
    let cfg = ConfigFileBuilder::new()
        .with_datasource(spec_entry("Sales", Some(RefreshKind::Full)))
        .poll_mode(true)
        .build();
    let sink = RecordingSink::new();

    let report = completed(run_with_service(&cfg, &service, &sink, false).await.unwrap());

    assert_eq!(report.polled.len(), 1);
    assert_eq!(report.polled[0].polls, 2);
    assert!(report.summary_lines()[0].starts_with("ok"));
}

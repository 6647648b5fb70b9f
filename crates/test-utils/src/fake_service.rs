use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use extract_trigger::config::Credentials;
use extract_trigger::engine::{EventSink, RunEvent};
use extract_trigger::errors::RemoteError;
use extract_trigger::remote::{
    BoxFuture, EntityFilter, Job, RefreshTask, RemoteEntity, RemoteService, Session,
};
use extract_trigger::types::EntityKind;

/// Remote operations the fake can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    Authenticate,
    ListEntities,
    GetEntity,
    ListTasks,
    RunTask,
    RefreshWorkbook,
    GetJob,
}

#[derive(Default)]
struct State {
    datasources: Vec<RemoteEntity>,
    workbooks: Vec<RemoteEntity>,
    tasks: Vec<RefreshTask>,
    /// Finish codes returned by successive `get_job` calls; the last one repeats.
    job_scripts: HashMap<String, VecDeque<Option<i32>>>,
    failures: HashMap<FakeOp, VecDeque<RemoteError>>,
    /// Remaining HTTP 503 answers for `get_job` of a particular job.
    job_failures: HashMap<String, usize>,
    calls: Vec<String>,
}

/// An in-memory [`RemoteService`] that:
/// - serves the configured entity catalogs and tasks
/// - starts jobs named `job-<task id>` / `job-wb-<workbook id>`
/// - plays back scripted finish codes for `get_job` (default: success)
/// - records every call
pub struct FakeRemoteService {
    state: Mutex<State>,
}

impl FakeRemoteService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_datasource(self, entity: RemoteEntity) -> Self {
        self.state.lock().unwrap().datasources.push(entity);
        self
    }

    pub fn with_workbook(self, entity: RemoteEntity) -> Self {
        self.state.lock().unwrap().workbooks.push(entity);
        self
    }

    pub fn with_task(self, task: RefreshTask) -> Self {
        self.state.lock().unwrap().tasks.push(task);
        self
    }

    /// Script the finish codes `get_job(job_id)` reports, one per call.
    pub fn with_job_script(self, job_id: &str, codes: impl IntoIterator<Item = Option<i32>>) -> Self {
        self.state
            .lock()
            .unwrap()
            .job_scripts
            .insert(job_id.to_string(), codes.into_iter().collect());
        self
    }

    /// Make the next `times` calls of `op` fail with HTTP 503.
    pub fn failing(mut self, op: FakeOp, times: usize) -> Self {
        for _ in 0..times {
            self = self.failing_with(op, unavailable());
        }
        self
    }

    /// Make the next `times` polls of `job_id` fail with HTTP 503.
    pub fn failing_job(self, job_id: &str, times: usize) -> Self {
        self.state
            .lock()
            .unwrap()
            .job_failures
            .insert(job_id.to_string(), times);
        self
    }

    /// Make the next call of `op` fail with `error`.
    pub fn failing_with(self, op: FakeOp, error: RemoteError) -> Self {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
        self
    }

    /// Every call made so far, e.g. `"run_task t-1"`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of recorded calls starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, op: FakeOp, call: String) -> Result<std::sync::MutexGuard<'_, State>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if let Some(err) = state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        Ok(state)
    }
}

impl Default for FakeRemoteService {
    fn default() -> Self {
        Self::new()
    }
}

fn unavailable() -> RemoteError {
    RemoteError::Status {
        status: 503,
        code: None,
        message: "Service Unavailable".into(),
    }
}

fn catalog(state: &State, kind: EntityKind) -> &[RemoteEntity] {
    match kind {
        EntityKind::Datasource => &state.datasources,
        EntityKind::Workbook => &state.workbooks,
    }
}

impl RemoteService for FakeRemoteService {
    fn authenticate<'a>(
        &'a self,
        _credentials: &'a Credentials,
    ) -> BoxFuture<'a, Result<Session, RemoteError>> {
        let result = self
            .record(FakeOp::Authenticate, "authenticate".to_string())
            .map(|_| Session {
                site_id: "site-1".into(),
                user_id: Some("user-1".into()),
                token: "fake-token".into(),
            });
        Box::pin(async move { result })
    }

    fn list_entities<'a>(
        &'a self,
        kind: EntityKind,
        filter: &'a EntityFilter,
    ) -> BoxFuture<'a, Result<Vec<RemoteEntity>, RemoteError>> {
        let result: Result<Vec<RemoteEntity>, RemoteError> = self
            .record(FakeOp::ListEntities, format!("list_entities {}", kind.collection()))
            .map(|state| {
                catalog(&state, kind)
                    .iter()
                    .filter(|e| filter.name.as_deref().is_none_or(|n| e.name == n))
                    .filter(|e| filter.tag.as_deref().is_none_or(|t| e.has_tag(t)))
                    .cloned()
                    .collect()
            });
        Box::pin(async move { result })
    }

    fn get_entity_by_id<'a>(
        &'a self,
        kind: EntityKind,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<RemoteEntity>, RemoteError>> {
        let result = self
            .record(FakeOp::GetEntity, format!("get_entity {} {id}", kind.element()))
            .map(|state| catalog(&state, kind).iter().find(|e| e.id == id).cloned());
        Box::pin(async move { result })
    }

    fn list_tasks(&self) -> BoxFuture<'_, Result<Vec<RefreshTask>, RemoteError>> {
        let result = self
            .record(FakeOp::ListTasks, "list_tasks".to_string())
            .map(|state| state.tasks.clone());
        Box::pin(async move { result })
    }

    fn run_task<'a>(&'a self, task: &'a RefreshTask) -> BoxFuture<'a, Result<Job, RemoteError>> {
        let result = self
            .record(FakeOp::RunTask, format!("run_task {}", task.id))
            .map(|_| Job::pending(format!("job-{}", task.id)));
        Box::pin(async move { result })
    }

    fn refresh_workbook<'a>(
        &'a self,
        entity: &'a RemoteEntity,
    ) -> BoxFuture<'a, Result<Job, RemoteError>> {
        let result = self
            .record(FakeOp::RefreshWorkbook, format!("refresh_workbook {}", entity.id))
            .map(|_| Job::pending(format!("job-wb-{}", entity.id)));
        Box::pin(async move { result })
    }

    fn get_job<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Job, RemoteError>> {
        let result = self
            .record(FakeOp::GetJob, format!("get_job {id}"))
            .and_then(|mut state| {
                if let Some(left) = state.job_failures.get_mut(id).filter(|left| **left > 0) {
                    *left -= 1;
                    return Err(unavailable());
                }
                let finish_code = match state.job_scripts.get_mut(id) {
                    Some(script) if script.len() > 1 => script.pop_front().flatten(),
                    Some(script) => script.front().copied().flatten(),
                    None => Some(0),
                };
                Ok(Job {
                    id: id.to_string(),
                    finish_code,
                })
            });
        Box::pin(async move { result })
    }

    fn sign_out(&self) -> BoxFuture<'_, Result<(), RemoteError>> {
        self.state.lock().unwrap().calls.push("sign_out".to_string());
        Box::pin(async { Ok(()) })
    }
}

/// Event sink that keeps every event for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: RunEvent) {
        self.events.lock().unwrap().push(event);
    }
}

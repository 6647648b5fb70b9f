// src/remote/wire.rs

//! JSON wire format of the server REST API.
//!
//! These types mirror response bodies one-to-one and are converted into the
//! engine's value types ([`RemoteEntity`], [`RefreshTask`], [`Job`]) before
//! leaving the boundary. Numeric attributes arrive as strings in most server
//! versions and as numbers in some, so both are accepted.

use serde::{Deserialize, Deserializer, Serialize};

use crate::remote::{Job, RefreshTask, RemoteEntity};
use crate::types::{EntityKind, RefreshKind};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(i64),
    String(String),
}

fn de_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NumberOrString>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::String(s)) if s.trim().is_empty() => Ok(None),
        Some(NumberOrString::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SignInRequest<'a> {
    pub credentials: SignInCredentials<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SignInCredentials<'a> {
    #[serde(rename_all = "camelCase")]
    PersonalAccessToken {
        personal_access_token_name: &'a str,
        personal_access_token_secret: &'a str,
        site: SiteRef<'a>,
    },
    Password {
        name: &'a str,
        password: &'a str,
        site: SiteRef<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteRef<'a> {
    pub content_url: &'a str,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfoResponse {
    pub server_info: ServerInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub rest_api_version: String,
}

#[derive(Debug, Deserialize)]
pub struct SignInResponse {
    pub credentials: SignInResult,
}

#[derive(Debug, Deserialize)]
pub struct SignInResult {
    pub token: String,
    pub site: IdRef,
    #[serde(default)]
    pub user: Option<IdRef>,
}

#[derive(Debug, Deserialize)]
pub struct IdRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub page_number: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub page_size: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub total_available: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct EntityPage {
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default, alias = "datasources", alias = "workbooks")]
    pub items: Option<EntityList>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EntityList {
    #[serde(default, alias = "datasource", alias = "workbook")]
    pub entries: Vec<EntityItem>,
}

#[derive(Debug, Deserialize)]
pub struct SingleEntityResponse {
    #[serde(alias = "datasource", alias = "workbook")]
    pub item: EntityItem,
}

#[derive(Debug, Deserialize)]
pub struct EntityItem {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub project: Option<ProjectRef>,
    #[serde(default)]
    pub tags: Option<TagList>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectRef {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TagList {
    #[serde(default)]
    pub tag: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
pub struct Tag {
    pub label: String,
}

impl From<EntityItem> for RemoteEntity {
    fn from(item: EntityItem) -> Self {
        RemoteEntity {
            id: item.id,
            name: item.name,
            project_name: item.project.map(|p| p.name).unwrap_or_default(),
            tags: item
                .tags
                .unwrap_or_default()
                .tag
                .into_iter()
                .map(|t| t.label)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TaskListResponse {
    #[serde(default)]
    pub tasks: Option<TaskList>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskList {
    #[serde(default)]
    pub task: Vec<TaskEnvelope>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEnvelope {
    #[serde(default)]
    pub extract_refresh: Option<ExtractRefreshItem>,
}

#[derive(Debug, Deserialize)]
pub struct ExtractRefreshItem {
    pub id: String,
    #[serde(rename = "type", default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub datasource: Option<IdRef>,
    #[serde(default)]
    pub workbook: Option<IdRef>,
}

impl ExtractRefreshItem {
    /// Convert into a [`RefreshTask`].
    ///
    /// Returns `None` for tasks without a known extract refresh type or
    /// without a datasource/workbook target; those can never match a spec.
    pub fn into_task(self) -> Option<RefreshTask> {
        let kind = RefreshKind::from_server_type(self.task_type.as_deref()?)?;
        let (target_kind, target) = match (self.datasource, self.workbook) {
            (Some(ds), _) => (EntityKind::Datasource, ds),
            (None, Some(wb)) => (EntityKind::Workbook, wb),
            (None, None) => return None,
        };
        Some(RefreshTask {
            id: self.id,
            kind,
            target_id: target.id,
            target_kind,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct JobResponse {
    #[serde(default)]
    pub job: Option<JobItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobItem {
    pub id: String,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub finish_code: Option<i64>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

impl From<JobItem> for Job {
    /// A running job may already carry a provisional finish code; it only
    /// counts once the job reports a completion time.
    fn from(item: JobItem) -> Self {
        let finish_code = match item.completed_at {
            Some(_) => item
                .finish_code
                .map(|c| i32::try_from(c).unwrap_or(i32::MAX)),
            None => None,
        };
        Job {
            id: item.id,
            finish_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_page_decodes_string_pagination_and_tags() {
        let body = r#"{
            "pagination": {"pageNumber": "1", "pageSize": "100", "totalAvailable": "1"},
            "datasources": {"datasource": [{
                "id": "ds-1",
                "name": "Sales",
                "project": {"id": "p-1", "name": "Finance"},
                "tags": {"tag": [{"label": "prod"}]}
            }]}
        }"#;

        let page: EntityPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.pagination.total_available, Some(1));

        let entities: Vec<RemoteEntity> = page
            .items
            .unwrap_or_default()
            .entries
            .into_iter()
            .map(RemoteEntity::from)
            .collect();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].project_name, "Finance");
        assert!(entities[0].has_tag("prod"));
    }

    #[test]
    fn workbook_page_uses_the_same_shape() {
        let body = r#"{"workbooks": {"workbook": [{"id": "wb-1", "name": "Exec", "tags": {}}]}}"#;
        let page: EntityPage = serde_json::from_str(body).unwrap();
        let list = page.items.unwrap_or_default();
        assert_eq!(list.entries[0].id, "wb-1");
    }

    #[test]
    fn tasks_without_known_type_or_target_are_dropped() {
        let body = r#"{"tasks": {"task": [
            {"extractRefresh": {"id": "t-1", "type": "RefreshExtractTask", "datasource": {"id": "ds-1"}}},
            {"extractRefresh": {"id": "t-2", "type": "IncrementExtractTask", "workbook": {"id": "wb-1"}}},
            {"extractRefresh": {"id": "t-3", "type": "RefreshExtractTask"}},
            {"extractRefresh": {"id": "t-4", "type": "DataAcceleration", "datasource": {"id": "ds-1"}}},
            {"extractRefresh": {"id": "t-5", "datasource": {"id": "ds-1"}}}
        ]}}"#;

        let resp: TaskListResponse = serde_json::from_str(body).unwrap();
        let tasks: Vec<RefreshTask> = resp
            .tasks
            .unwrap_or_default()
            .task
            .into_iter()
            .filter_map(|t| t.extract_refresh)
            .filter_map(ExtractRefreshItem::into_task)
            .collect();

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].target_kind, EntityKind::Datasource);
        assert_eq!(tasks[1].kind, RefreshKind::Incremental);
        assert_eq!(tasks[1].target_kind, EntityKind::Workbook);
    }

    #[test]
    fn finish_code_counts_only_after_completion() {
        let running: JobResponse =
            serde_json::from_str(r#"{"job": {"id": "j-1", "finishCode": "1", "progress": "40"}}"#)
                .unwrap();
        let done: JobResponse = serde_json::from_str(
            r#"{"job": {"id": "j-1", "finishCode": 0, "completedAt": "2024-01-01T00:00:00Z"}}"#,
        )
        .unwrap();

        assert_eq!(Job::from(running.job.unwrap()).finish_code, None);
        assert_eq!(Job::from(done.job.unwrap()).finish_code, Some(0));
    }
}

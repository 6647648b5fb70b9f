// src/remote/rest.rs

//! `reqwest`-backed implementation of [`RemoteService`].
//!
//! Talks JSON to the server REST API:
//! - discovers the REST API version from `serverinfo` unless one is configured,
//! - signs in once and sends the session token on every request,
//! - signs in again (once) when the server rejects an expired session,
//! - pages through entity listings and applies name/tag filters server-side.

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::model::Credentials;
use crate::errors::RemoteError;
use crate::remote::wire::{
    EntityPage, ErrorResponse, ExtractRefreshItem, JobResponse, ServerInfoResponse,
    SignInCredentials, SignInRequest, SignInResponse, SingleEntityResponse, SiteRef,
    TaskListResponse,
};
use crate::remote::{
    BoxFuture, EntityFilter, Job, RefreshTask, RemoteEntity, RemoteService, Session,
};
use crate::types::EntityKind;

const APPLICATION_JSON: &str = "application/json";
const AUTH_HEADER: &str = "X-Tableau-Auth";
/// Oldest API version that serves `serverinfo`.
const SERVER_INFO_API_VERSION: &str = "2.4";
const PAGE_SIZE: usize = 100;

/// REST client for the analytics server.
#[derive(Debug)]
pub struct RestClient {
    http: reqwest::Client,
    endpoint: String,
    site_content_url: String,
    api_version: RwLock<Option<String>>,
    session: RwLock<Option<Session>>,
    /// Remembered after a successful sign-in so an expired session can be
    /// renewed transparently.
    credentials: RwLock<Option<Credentials>>,
}

impl RestClient {
    /// Build a client for `endpoint` (e.g. `https://analytics.example.com`).
    ///
    /// `site_content_url` is the site's URL name; `None` selects the default
    /// site. When `api_version` is `None` the server is asked for it.
    pub fn new(
        endpoint: &str,
        site_content_url: Option<&str>,
        api_version: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            site_content_url: site_content_url.unwrap_or_default().to_string(),
            api_version: RwLock::new(api_version),
            session: RwLock::new(None),
            credentials: RwLock::new(None),
        })
    }

    async fn api_version(&self) -> Result<String, RemoteError> {
        if let Some(version) = self.api_version.read().await.clone() {
            return Ok(version);
        }

        let url = format!("{}/api/{}/serverinfo", self.endpoint, SERVER_INFO_API_VERSION);
        let resp = self
            .http
            .get(&url)
            .header(ACCEPT, APPLICATION_JSON)
            .send()
            .await?;
        let info: ServerInfoResponse = decode(check_status(resp).await?, "server info").await?;

        let version = info.server_info.rest_api_version;
        info!(api_version = %version, "using server REST API version");
        *self.api_version.write().await = Some(version.clone());
        Ok(version)
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, RemoteError> {
        let version = self.api_version().await?;
        let site = SiteRef {
            content_url: &self.site_content_url,
        };
        let creds = match credentials {
            Credentials::PersonalAccessToken {
                token_name,
                token_secret,
            } => SignInCredentials::PersonalAccessToken {
                personal_access_token_name: token_name,
                personal_access_token_secret: token_secret.expose(),
                site,
            },
            Credentials::Password { username, password } => SignInCredentials::Password {
                name: username,
                password: password.expose(),
                site,
            },
        };

        let url = format!("{}/api/{}/auth/signin", self.endpoint, version);
        let resp = self
            .http
            .post(&url)
            .header(ACCEPT, APPLICATION_JSON)
            .json(&SignInRequest { credentials: creds })
            .send()
            .await?;
        let body: SignInResponse = decode(check_status(resp).await?, "sign in").await?;

        let session = Session {
            site_id: body.credentials.site.id,
            user_id: body.credentials.user.map(|u| u.id),
            token: body.credentials.token,
        };
        debug!(site_id = %session.site_id, "signed in");

        *self.session.write().await = Some(session.clone());
        *self.credentials.write().await = Some(credentials.clone());
        Ok(session)
    }

    async fn sign_out_session(&self) -> Result<(), RemoteError> {
        let Some(session) = self.session.write().await.take() else {
            return Ok(());
        };
        let version = self.api_version().await?;
        let url = format!("{}/api/{}/auth/signout", self.endpoint, version);
        let resp = self
            .http
            .post(&url)
            .header(ACCEPT, APPLICATION_JSON)
            .header(AUTH_HEADER, &session.token)
            .send()
            .await?;
        check_status(resp).await?;
        debug!("signed out");
        Ok(())
    }

    /// Send a site-scoped request, renewing the session once on 401.
    async fn send_authed(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        with_body: bool,
    ) -> Result<Response, RemoteError> {
        let resp = self.send_once(method.clone(), path, query, with_body).await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        let credentials = self.credentials.read().await.clone();
        let Some(credentials) = credentials else {
            return Ok(resp);
        };
        warn!(path, "session rejected by server; signing in again");
        self.sign_in(&credentials).await?;
        self.send_once(method, path, query, with_body).await
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        with_body: bool,
    ) -> Result<Response, RemoteError> {
        let version = self.api_version().await?;
        let session = self
            .session
            .read()
            .await
            .clone()
            .ok_or(RemoteError::NotAuthenticated)?;

        let url = format!(
            "{}/api/{}/sites/{}/{}",
            self.endpoint, version, session.site_id, path
        );
        let mut req = self
            .http
            .request(method, &url)
            .header(ACCEPT, APPLICATION_JSON)
            .header(AUTH_HEADER, &session.token)
            .query(query);
        if with_body {
            req = req
                .header(CONTENT_TYPE, APPLICATION_JSON)
                .body("{}");
        }
        Ok(req.send().await?)
    }

    async fn fetch_entities(
        &self,
        kind: EntityKind,
        filter: &EntityFilter,
    ) -> Result<Vec<RemoteEntity>, RemoteError> {
        let operation = format!("list {}", kind.collection());
        let mut entities = Vec::new();
        let mut page_number = 1usize;

        loop {
            let mut query = vec![
                ("pageSize", PAGE_SIZE.to_string()),
                ("pageNumber", page_number.to_string()),
            ];
            if let Some(expr) = filter_expression(filter) {
                query.push(("filter", expr));
            }

            let resp = self
                .send_authed(Method::GET, kind.collection(), &query, false)
                .await?;
            let page: EntityPage = decode(check_status(resp).await?, &operation).await?;

            let items = page.items.unwrap_or_default().entries;
            let received = items.len();
            entities.extend(items.into_iter().map(RemoteEntity::from));

            let total = page
                .pagination
                .total_available
                .and_then(|t| usize::try_from(t).ok())
                .unwrap_or(entities.len());
            if received == 0 || entities.len() >= total {
                break;
            }
            page_number += 1;
        }

        debug!(kind = %kind, count = entities.len(), "listed entities");
        Ok(entities)
    }

    async fn fetch_entity(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<RemoteEntity>, RemoteError> {
        let path = format!("{}/{}", kind.collection(), id);
        let resp = self.send_authed(Method::GET, &path, &[], false).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: SingleEntityResponse =
            decode(check_status(resp).await?, &format!("get {}", kind.element())).await?;
        Ok(Some(RemoteEntity::from(body.item)))
    }

    async fn fetch_tasks(&self) -> Result<Vec<RefreshTask>, RemoteError> {
        let resp = self
            .send_authed(Method::GET, "tasks/extractRefreshes", &[], false)
            .await?;
        let body: TaskListResponse = decode(check_status(resp).await?, "list tasks").await?;

        let tasks: Vec<RefreshTask> = body
            .tasks
            .unwrap_or_default()
            .task
            .into_iter()
            .filter_map(|t| t.extract_refresh)
            .filter_map(ExtractRefreshItem::into_task)
            .collect();
        debug!(count = tasks.len(), "listed extract refresh tasks");
        Ok(tasks)
    }

    async fn post_for_job(&self, path: &str, operation: &str) -> Result<Job, RemoteError> {
        let resp = self.send_authed(Method::POST, path, &[], true).await?;
        expect_job(decode(check_status(resp).await?, operation).await?, operation)
    }

    async fn fetch_job(&self, id: &str) -> Result<Job, RemoteError> {
        let path = format!("jobs/{id}");
        let resp = self.send_authed(Method::GET, &path, &[], false).await?;
        expect_job(decode(check_status(resp).await?, "get job").await?, "get job")
    }
}

impl RemoteService for RestClient {
    fn authenticate<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, Result<Session, RemoteError>> {
        Box::pin(self.sign_in(credentials))
    }

    fn list_entities<'a>(
        &'a self,
        kind: EntityKind,
        filter: &'a EntityFilter,
    ) -> BoxFuture<'a, Result<Vec<RemoteEntity>, RemoteError>> {
        Box::pin(self.fetch_entities(kind, filter))
    }

    fn get_entity_by_id<'a>(
        &'a self,
        kind: EntityKind,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<RemoteEntity>, RemoteError>> {
        Box::pin(self.fetch_entity(kind, id))
    }

    fn list_tasks(&self) -> BoxFuture<'_, Result<Vec<RefreshTask>, RemoteError>> {
        Box::pin(self.fetch_tasks())
    }

    fn run_task<'a>(&'a self, task: &'a RefreshTask) -> BoxFuture<'a, Result<Job, RemoteError>> {
        Box::pin(async move {
            let path = format!("tasks/extractRefreshes/{}/runNow", task.id);
            self.post_for_job(&path, "run task").await
        })
    }

    fn refresh_workbook<'a>(
        &'a self,
        entity: &'a RemoteEntity,
    ) -> BoxFuture<'a, Result<Job, RemoteError>> {
        Box::pin(async move {
            let path = format!("workbooks/{}/refresh", entity.id);
            self.post_for_job(&path, "refresh workbook").await
        })
    }

    fn get_job<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Job, RemoteError>> {
        Box::pin(self.fetch_job(id))
    }

    fn sign_out(&self) -> BoxFuture<'_, Result<(), RemoteError>> {
        Box::pin(self.sign_out_session())
    }
}

/// Server-side filter expression, e.g. `name:eq:Sales,tags:eq:prod`.
///
/// The filter syntax has no escaping, so values containing `,` or `:` are
/// left out and matched client-side by the resolver instead.
fn filter_expression(filter: &EntityFilter) -> Option<String> {
    let safe = |v: &&String| !v.contains(',') && !v.contains(':');
    let mut parts = Vec::new();
    if let Some(name) = filter.name.as_ref().filter(safe) {
        parts.push(format!("name:eq:{name}"));
    }
    if let Some(tag) = filter.tag.as_ref().filter(safe) {
        parts.push(format!("tags:eq:{tag}"));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(","))
    }
}

async fn check_status(resp: Response) -> Result<Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

fn status_error(status: StatusCode, body: &str) -> RemoteError {
    if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) {
        let err = parsed.error;
        let mut message = err
            .summary
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        if let Some(detail) = err.detail {
            message.push_str(": ");
            message.push_str(&detail);
        }
        return RemoteError::Status {
            status: status.as_u16(),
            code: err.code,
            message,
        };
    }

    let message = match body.trim() {
        "" => status.canonical_reason().unwrap_or("request failed").to_string(),
        text => text.to_string(),
    };
    RemoteError::Status {
        status: status.as_u16(),
        code: None,
        message,
    }
}

async fn decode<T: DeserializeOwned>(resp: Response, operation: &str) -> Result<T, RemoteError> {
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        if e.is_eof() {
            RemoteError::UnfinishedResponse {
                operation: operation.to_string(),
                message: format!("truncated body: {e}"),
            }
        } else {
            RemoteError::Decode {
                operation: operation.to_string(),
                message: e.to_string(),
            }
        }
    })
}

fn expect_job(resp: JobResponse, operation: &str) -> Result<Job, RemoteError> {
    resp.job
        .map(Job::from)
        .ok_or_else(|| RemoteError::UnfinishedResponse {
            operation: operation.to_string(),
            message: "response carries no job".to_string(),
        })
}

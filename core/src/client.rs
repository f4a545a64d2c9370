//! Stateless HTTP request builder and response parser for the Basecamp API.
//!
//! # Design
//! `BasecampClient` holds only the account base URL and the fixed headers
//! (bearer credential, user agent). Each call is split into a `build_*`
//! method that produces an `HttpRequest` and a `parse_*` method that
//! consumes an `HttpResponse`; executing the round trip is somebody else's
//! job (see `remote::HttpRemote`).

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::config::ConnectionConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{CreateTodo, Page, Project, RemoteTask, TaskRecord, Todolist};

#[derive(Debug, Clone)]
pub struct BasecampClient {
    base_url: String,
    headers: Vec<(String, String)>,
}

impl BasecampClient {
    pub fn new(connection: &ConnectionConfig) -> Self {
        Self {
            base_url: format!(
                "{}/{}",
                connection.api_base_url.trim_end_matches('/'),
                connection.account_id
            ),
            headers: vec![
                (
                    "authorization".to_string(),
                    format!("Bearer {}", connection.access_token),
                ),
                ("user-agent".to_string(), connection.user_agent.clone()),
                ("accept".to_string(), "application/json".to_string()),
            ],
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, url: String) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url,
            headers: self.headers.clone(),
            body: None,
        }
    }

    pub fn build_list_projects(&self) -> HttpRequest {
        self.get(format!("{}/projects.json", self.base_url))
    }

    pub fn build_get_project(&self, project_id: &str) -> HttpRequest {
        self.get(format!("{}/projects/{project_id}.json", self.base_url))
    }

    pub fn build_list_todolists(&self, project_id: &str, todoset_id: u64) -> HttpRequest {
        self.get(format!(
            "{}/buckets/{project_id}/todosets/{todoset_id}/todolists.json",
            self.base_url
        ))
    }

    /// First page of the to-dos in a list. Later pages use `build_page`.
    pub fn build_list_tasks(&self, project_id: &str, todolist_id: &str) -> HttpRequest {
        self.get(format!(
            "{}/buckets/{project_id}/todolists/{todolist_id}/todos.json",
            self.base_url
        ))
    }

    /// Follow an absolute pagination link returned by a previous page.
    /// Links outside this account's base URL are refused so credentials
    /// never leave it.
    pub fn build_page(&self, next_url: &str) -> Result<HttpRequest, ApiError> {
        let inside = next_url
            .strip_prefix(self.base_url.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '?']));
        if !inside {
            return Err(ApiError::UnexpectedResponse(format!(
                "pagination link {next_url} is outside {}",
                self.base_url
            )));
        }
        Ok(self.get(next_url.to_string()))
    }

    pub fn build_create_task(
        &self,
        project_id: &str,
        todolist_id: &str,
        record: &TaskRecord,
    ) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(&CreateTodo::from(record))
            .map_err(|e| ApiError::Serialization(e.to_string()))?;
        let mut headers = self.headers.clone();
        headers.push(("content-type".to_string(), "application/json".to_string()));
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: format!(
                "{}/buckets/{project_id}/todolists/{todolist_id}/todos.json",
                self.base_url
            ),
            headers,
            body: Some(body),
        })
    }

    pub fn parse_list_projects(&self, response: HttpResponse) -> Result<Vec<Project>, ApiError> {
        check_status(&response, 200)?;
        decode(&response)
    }

    pub fn parse_get_project(&self, response: HttpResponse) -> Result<Project, ApiError> {
        check_status(&response, 200)?;
        decode(&response)
    }

    pub fn parse_list_todolists(&self, response: HttpResponse) -> Result<Vec<Todolist>, ApiError> {
        check_status(&response, 200)?;
        decode(&response)
    }

    pub fn parse_list_tasks(&self, response: HttpResponse) -> Result<Page<RemoteTask>, ApiError> {
        check_status(&response, 200)?;
        Ok(Page {
            items: decode(&response)?,
            next: response.header("link").and_then(next_link),
        })
    }

    pub fn parse_create_task(&self, response: HttpResponse) -> Result<RemoteTask, ApiError> {
        check_status(&response, 201)?;
        decode(&response)
    }
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

/// Map a non-expected status to `ApiError::Http`, keeping any `Retry-After`.
fn check_status(response: &HttpResponse, expected: u16) -> Result<(), ApiError> {
    if response.status == expected {
        return Ok(());
    }
    Err(ApiError::Http {
        status: response.status,
        body: response.body.clone(),
        retry_after: response.header("retry-after").and_then(parse_retry_after),
    })
}

/// Only the delay-seconds form is honoured; HTTP-dates are ignored.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Extract the `rel="next"` target from an RFC 8288 `Link` header.
fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|param| {
            let param = param.trim();
            param == "rel=\"next\"" || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

//! The remote service seam used by the sync engine.
//!
//! `RemoteService` is the remote contract, exactly one HTTP round trip per
//! call. Implementations never retry or sleep; the engine wraps every call
//! in the retry policy and rate limiter.

use tracing::debug;

use crate::client::BasecampClient;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::types::{Page, Project, RemoteTask, TaskRecord, Todolist};

pub trait RemoteService {
    fn list_projects(&self) -> Result<Vec<Project>, ApiError>;

    fn get_project(&self, project_id: &str) -> Result<Project, ApiError>;

    /// To-do lists of the project's to-do set (see `Project::todoset_id`).
    fn list_todolists(&self, project_id: &str, todoset_id: u64)
        -> Result<Vec<Todolist>, ApiError>;

    /// One page of to-dos. `page` is the `next` link of the previous page,
    /// or `None` for the first one.
    fn list_tasks(
        &self,
        project_id: &str,
        todolist_id: &str,
        page: Option<&str>,
    ) -> Result<Page<RemoteTask>, ApiError>;

    fn create_task(
        &self,
        project_id: &str,
        todolist_id: &str,
        record: &TaskRecord,
    ) -> Result<RemoteTask, ApiError>;
}

impl<R: RemoteService + ?Sized> RemoteService for &R {
    fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        (**self).list_projects()
    }

    fn get_project(&self, project_id: &str) -> Result<Project, ApiError> {
        (**self).get_project(project_id)
    }

    fn list_todolists(
        &self,
        project_id: &str,
        todoset_id: u64,
    ) -> Result<Vec<Todolist>, ApiError> {
        (**self).list_todolists(project_id, todoset_id)
    }

    fn list_tasks(
        &self,
        project_id: &str,
        todolist_id: &str,
        page: Option<&str>,
    ) -> Result<Page<RemoteTask>, ApiError> {
        (**self).list_tasks(project_id, todolist_id, page)
    }

    fn create_task(
        &self,
        project_id: &str,
        todolist_id: &str,
        record: &TaskRecord,
    ) -> Result<RemoteTask, ApiError> {
        (**self).create_task(project_id, todolist_id, record)
    }
}

/// `RemoteService` over a `BasecampClient` and a host-provided transport.
pub struct HttpRemote<T> {
    client: BasecampClient,
    transport: T,
}

impl<T: Transport> HttpRemote<T> {
    pub fn new(client: BasecampClient, transport: T) -> Self {
        Self { client, transport }
    }

    fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(method = request.method.as_str(), url = %request.url, "sending request");
        let response = self.transport.execute(&request)?;
        debug!(status = response.status, "received response");
        Ok(response)
    }
}

impl<T: Transport> RemoteService for HttpRemote<T> {
    fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        let response = self.send(self.client.build_list_projects())?;
        self.client.parse_list_projects(response)
    }

    fn get_project(&self, project_id: &str) -> Result<Project, ApiError> {
        let response = self.send(self.client.build_get_project(project_id))?;
        self.client.parse_get_project(response)
    }

    fn list_todolists(
        &self,
        project_id: &str,
        todoset_id: u64,
    ) -> Result<Vec<Todolist>, ApiError> {
        let response = self.send(self.client.build_list_todolists(project_id, todoset_id))?;
        self.client.parse_list_todolists(response)
    }

    fn list_tasks(
        &self,
        project_id: &str,
        todolist_id: &str,
        page: Option<&str>,
    ) -> Result<Page<RemoteTask>, ApiError> {
        let request = match page {
            Some(url) => self.client.build_page(url)?,
            None => self.client.build_list_tasks(project_id, todolist_id),
        };
        let response = self.send(request)?;
        self.client.parse_list_tasks(response)
    }

    fn create_task(
        &self,
        project_id: &str,
        todolist_id: &str,
        record: &TaskRecord,
    ) -> Result<RemoteTask, ApiError> {
        let request = self
            .client
            .build_create_task(project_id, todolist_id, record)?;
        let response = self.send(request)?;
        self.client.parse_create_task(response)
    }
}

/// Stands in when no connection is configured. Every call fails without
/// touching the network; a dry run never makes one.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineRemote;

impl OfflineRemote {
    fn refuse<T>(&self) -> Result<T, ApiError> {
        Err(ApiError::Transport("no Basecamp connection configured".into()))
    }
}

impl RemoteService for OfflineRemote {
    fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        self.refuse()
    }

    fn get_project(&self, _project_id: &str) -> Result<Project, ApiError> {
        self.refuse()
    }

    fn list_todolists(
        &self,
        _project_id: &str,
        _todoset_id: u64,
    ) -> Result<Vec<Todolist>, ApiError> {
        self.refuse()
    }

    fn list_tasks(
        &self,
        _project_id: &str,
        _todolist_id: &str,
        _page: Option<&str>,
    ) -> Result<Page<RemoteTask>, ApiError> {
        self.refuse()
    }

    fn create_task(
        &self,
        _project_id: &str,
        _todolist_id: &str,
        _record: &TaskRecord,
    ) -> Result<RemoteTask, ApiError> {
        self.refuse()
    }
}

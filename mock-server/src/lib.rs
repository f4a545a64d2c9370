//! In-memory stand-in for the Basecamp API subset the sync tool uses.
//!
//! Routes live under `/{account_id}`: project listing and lookup, to-do list
//! listing through a project's to-do set, and paginated to-do listing and
//! creation. Every request must carry the configured bearer token. Failures
//! can be scripted with `MockBasecamp::fail_next` to exercise retry paths.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DockItem {
    pub id: u64,
    pub name: String,
    pub enabled: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub app_url: String,
    pub dock: Vec<DockItem>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Todolist {
    pub id: u64,
    pub name: String,
    pub todos_count: usize,
    pub app_url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Todo {
    pub id: u64,
    pub content: String,
    #[serde(default)]
    pub description: String,
    pub due_on: Option<String>,
    pub starts_on: Option<String>,
    #[serde(default)]
    pub assignee_ids: Vec<u64>,
    #[serde(default)]
    pub notify: bool,
    pub app_url: String,
}

#[derive(Deserialize)]
pub struct CreateTodo {
    pub content: String,
    #[serde(default)]
    pub description: Option<String>,
    pub due_on: Option<String>,
    pub starts_on: Option<String>,
    #[serde(default)]
    pub assignee_ids: Vec<u64>,
    #[serde(default)]
    pub notify: bool,
}

#[derive(Deserialize)]
struct PageQuery {
    page: Option<usize>,
}

/// A scripted failure returned instead of handling the next request.
#[derive(Clone, Debug)]
pub struct Fault {
    pub status: u16,
    pub retry_after_secs: Option<u64>,
}

#[derive(Debug)]
struct Inner {
    account_id: String,
    token: String,
    page_size: usize,
    next_id: u64,
    projects: Vec<Project>,
    /// todoset id -> (project id, list ids)
    todosets: HashMap<u64, (u64, Vec<u64>)>,
    todolists: HashMap<u64, (u64, Todolist)>,
    todos: HashMap<u64, Vec<Todo>>,
    faults: VecDeque<Fault>,
    requests: usize,
}

/// Shared handle to the mock's state. Cloning shares the same data.
#[derive(Clone, Debug)]
pub struct MockBasecamp {
    inner: Arc<Mutex<Inner>>,
}

impl MockBasecamp {
    pub fn new(account_id: &str, token: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                account_id: account_id.to_string(),
                token: token.to_string(),
                page_size: 15,
                next_id: 1,
                projects: Vec::new(),
                todosets: HashMap::new(),
                todolists: HashMap::new(),
                todos: HashMap::new(),
                faults: VecDeque::new(),
                requests: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Poisoning only means a handler panicked; the data is still usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_page_size(self, page_size: usize) -> Self {
        self.lock().page_size = page_size.max(1);
        self
    }

    /// Add a project with an enabled to-do set. Returns `(project, todoset)` ids.
    pub fn add_project(&self, name: &str) -> (u64, u64) {
        let mut inner = self.lock();
        let project_id = inner.allocate();
        let todoset_id = inner.allocate();
        let app_url = format!(
            "https://3.basecamp.com/{}/projects/{project_id}",
            inner.account_id
        );
        inner.projects.push(Project {
            id: project_id,
            name: name.to_string(),
            app_url,
            dock: vec![DockItem {
                id: todoset_id,
                name: "todoset".to_string(),
                enabled: true,
            }],
        });
        inner.todosets.insert(todoset_id, (project_id, Vec::new()));
        (project_id, todoset_id)
    }

    pub fn add_todolist(&self, project_id: u64, todoset_id: u64, name: &str) -> u64 {
        let mut inner = self.lock();
        let id = inner.allocate();
        let app_url = format!(
            "https://3.basecamp.com/{}/buckets/{project_id}/todolists/{id}",
            inner.account_id
        );
        if let Some((_, lists)) = inner.todosets.get_mut(&todoset_id) {
            lists.push(id);
        }
        inner.todolists.insert(
            id,
            (
                project_id,
                Todolist {
                    id,
                    name: name.to_string(),
                    todos_count: 0,
                    app_url,
                },
            ),
        );
        inner.todos.insert(id, Vec::new());
        id
    }

    /// Insert an existing to-do directly, bypassing the HTTP surface.
    pub fn seed_todo(&self, project_id: u64, todolist_id: u64, content: &str) -> u64 {
        let mut inner = self.lock();
        let input = CreateTodo {
            content: content.to_string(),
            description: None,
            due_on: None,
            starts_on: None,
            assignee_ids: Vec::new(),
            notify: false,
        };
        inner.insert_todo(project_id, todolist_id, input).id
    }

    /// Answer the next `times` requests with `status` instead of handling them.
    pub fn fail_next(&self, status: u16, times: usize) {
        let mut inner = self.lock();
        for _ in 0..times {
            inner.faults.push_back(Fault {
                status,
                retry_after_secs: None,
            });
        }
    }

    pub fn push_fault(&self, fault: Fault) {
        self.lock().faults.push_back(fault);
    }

    pub fn todos(&self, todolist_id: u64) -> Vec<Todo> {
        self.lock()
            .todos
            .get(&todolist_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Requests that reached the server, authorized or not.
    pub fn request_count(&self) -> usize {
        self.lock().requests
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/{account}/projects.json", get(list_projects))
            .route("/{account}/projects/{project_file}", get(get_project))
            .route(
                "/{account}/buckets/{project}/todosets/{todoset}/todolists.json",
                get(list_todolists),
            )
            .route(
                "/{account}/buckets/{project}/todolists/{todolist}/todos.json",
                get(list_todos).post(create_todo),
            )
            .with_state(self.clone())
    }
}

impl Inner {
    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn insert_todo(&mut self, project_id: u64, todolist_id: u64, input: CreateTodo) -> Todo {
        let id = self.allocate();
        let todo = Todo {
            id,
            content: input.content,
            description: input.description.unwrap_or_default(),
            due_on: input.due_on,
            starts_on: input.starts_on,
            assignee_ids: input.assignee_ids,
            notify: input.notify,
            app_url: format!(
                "https://3.basecamp.com/{}/buckets/{project_id}/todos/{id}",
                self.account_id
            ),
        };
        self.todos.entry(todolist_id).or_default().push(todo.clone());
        if let Some((_, list)) = self.todolists.get_mut(&todolist_id) {
            list.todos_count += 1;
        }
        todo
    }

    /// Count the request, then check credentials, the account and scripted faults.
    fn admit(&mut self, account: &str, headers: &HeaderMap) -> Result<(), Response> {
        self.requests += 1;
        let expected = format!("Bearer {}", self.token);
        let authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected);
        if !authorized {
            return Err((StatusCode::UNAUTHORIZED, "unauthorized").into_response());
        }
        if account != self.account_id {
            return Err(StatusCode::NOT_FOUND.into_response());
        }
        if let Some(fault) = self.faults.pop_front() {
            let status =
                StatusCode::from_u16(fault.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let mut response = (status, "injected fault").into_response();
            if let Some(secs) = fault.retry_after_secs {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(secs));
            }
            return Err(response);
        }
        Ok(())
    }

    fn list_in_project(&self, project_id: u64, todolist_id: u64) -> bool {
        self.todolists
            .get(&todolist_id)
            .is_some_and(|(owner, _)| *owner == project_id)
    }
}

pub async fn run(listener: TcpListener, mock: MockBasecamp) -> Result<(), std::io::Error> {
    axum::serve(listener, mock.router()).await
}

async fn list_projects(
    State(mock): State<MockBasecamp>,
    Path(account): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<Project>>, Response> {
    let mut inner = mock.lock();
    inner.admit(&account, &headers)?;
    Ok(Json(inner.projects.clone()))
}

async fn get_project(
    State(mock): State<MockBasecamp>,
    Path((account, project_file)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Project>, Response> {
    let mut inner = mock.lock();
    inner.admit(&account, &headers)?;
    let id = project_file
        .strip_suffix(".json")
        .and_then(|id| id.parse::<u64>().ok())
        .ok_or_else(|| StatusCode::NOT_FOUND.into_response())?;
    inner
        .projects
        .iter()
        .find(|p| p.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| StatusCode::NOT_FOUND.into_response())
}

async fn list_todolists(
    State(mock): State<MockBasecamp>,
    Path((account, project, todoset)): Path<(String, u64, u64)>,
    headers: HeaderMap,
) -> Result<Json<Vec<Todolist>>, Response> {
    let mut inner = mock.lock();
    inner.admit(&account, &headers)?;
    let (owner, ids) = inner
        .todosets
        .get(&todoset)
        .ok_or_else(|| StatusCode::NOT_FOUND.into_response())?;
    if *owner != project {
        return Err(StatusCode::NOT_FOUND.into_response());
    }
    let lists = ids
        .iter()
        .filter_map(|id| inner.todolists.get(id).map(|(_, list)| list.clone()))
        .collect();
    Ok(Json(lists))
}

async fn list_todos(
    State(mock): State<MockBasecamp>,
    Path((account, project, todolist)): Path<(String, u64, u64)>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Result<Response, Response> {
    let mut inner = mock.lock();
    inner.admit(&account, &headers)?;
    if !inner.list_in_project(project, todolist) {
        return Err(StatusCode::NOT_FOUND.into_response());
    }

    let page = query.page.unwrap_or(1).max(1);
    let size = inner.page_size;
    let all = inner.todos.get(&todolist).map(Vec::as_slice).unwrap_or_default();
    let items: Vec<Todo> = all.iter().skip((page - 1) * size).take(size).cloned().collect();
    let mut response = Json(items).into_response();

    if page * size < all.len() {
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");
        let link = format!(
            "<http://{host}/{account}/buckets/{project}/todolists/{todolist}/todos.json?page={}>; rel=\"next\"",
            page + 1
        );
        if let Ok(value) = HeaderValue::from_str(&link) {
            response.headers_mut().insert(header::LINK, value);
        }
    }
    Ok(response)
}

async fn create_todo(
    State(mock): State<MockBasecamp>,
    Path((account, project, todolist)): Path<(String, u64, u64)>,
    headers: HeaderMap,
    Json(input): Json<CreateTodo>,
) -> Result<(StatusCode, Json<Todo>), Response> {
    let mut inner = mock.lock();
    inner.admit(&account, &headers)?;
    if !inner.list_in_project(project, todolist) {
        return Err(StatusCode::NOT_FOUND.into_response());
    }
    if input.content.trim().is_empty() {
        return Err((StatusCode::UNPROCESSABLE_ENTITY, "content can't be blank").into_response());
    }
    let todo = inner.insert_todo(project, todolist, input);
    Ok((StatusCode::CREATED, Json(todo)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_todo_defaults_optional_fields() {
        let input: CreateTodo = serde_json::from_str(r#"{"content":"Only content"}"#).unwrap();
        assert_eq!(input.content, "Only content");
        assert!(input.description.is_none());
        assert!(input.assignee_ids.is_empty());
        assert!(!input.notify);
    }

    #[test]
    fn create_todo_rejects_missing_content() {
        let result: Result<CreateTodo, _> = serde_json::from_str(r#"{"notify":true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn seeded_todos_count_towards_their_list() {
        let mock = MockBasecamp::new("1", "t");
        let (project, todoset) = mock.add_project("P");
        let list = mock.add_todolist(project, todoset, "L");
        mock.seed_todo(project, list, "Existing");
        let todos = mock.todos(list);
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].content, "Existing");
        assert!(todos[0].app_url.ends_with(&format!("/todos/{}", todos[0].id)));
    }

    #[test]
    fn ids_are_unique_across_resources() {
        let mock = MockBasecamp::new("1", "t");
        let (project, todoset) = mock.add_project("P");
        let list = mock.add_todolist(project, todoset, "L");
        let todo = mock.seed_todo(project, list, "x");
        let (other_project, other_todoset) = mock.add_project("Q");
        let ids = [project, todoset, list, todo, other_project, other_todoset];
        let unique: std::collections::HashSet<u64> = ids.into_iter().collect();
        assert_eq!(unique.len(), ids.len());
    }
}

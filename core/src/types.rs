//! Domain types: the normalized task record and the remote service DTOs.
//!
//! # Design
//! Remote DTOs mirror the mock-server's schema but are defined independently;
//! integration tests catch any drift. Only the fields the sync needs are
//! modelled, everything else in a payload is ignored on decode.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Local-only urgency marker. Never transmitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "normal" => Some(Priority::Normal),
            "high" => Some(Priority::High),
            "critical" => Some(Priority::Critical),
            _ => None,
        }
    }
}

/// A normalized unit of work. `content` is trimmed and never empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskRecord {
    pub content: String,
    pub description: Option<String>,
    pub due_on: Option<NaiveDate>,
    pub starts_on: Option<NaiveDate>,
    pub assignee_ids: BTreeSet<u64>,
    pub notify: bool,

    // Local metadata, never sent to the remote service.
    pub priority: Priority,
    pub category: Option<String>,
    pub source_file: Option<String>,
    pub source_line: Option<u64>,
}

impl TaskRecord {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

/// Request payload for creating a to-do. Borrowed from a `TaskRecord`.
#[derive(Debug, Serialize)]
pub struct CreateTodo<'a> {
    pub content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_on: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starts_on: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assignee_ids: Vec<u64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub notify: bool,
}

impl<'a> From<&'a TaskRecord> for CreateTodo<'a> {
    fn from(record: &'a TaskRecord) -> Self {
        Self {
            content: &record.content,
            description: record.description.as_deref(),
            due_on: record.due_on,
            starts_on: record.starts_on,
            assignee_ids: record.assignee_ids.iter().copied().collect(),
            notify: record.notify,
        }
    }
}

/// A project, as listed by the account's projects endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub app_url: Option<String>,
    #[serde(default)]
    pub dock: Vec<DockItem>,
}

impl Project {
    /// The id of the project's to-do set, if the tool is present and enabled.
    pub fn todoset_id(&self) -> Option<u64> {
        self.dock
            .iter()
            .find(|item| item.name == "todoset" && item.enabled)
            .map(|item| item.id)
    }
}

/// One tool attached to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockItem {
    pub id: u64,
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todolist {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub todos_count: Option<u64>,
    #[serde(default)]
    pub app_url: Option<String>,
}

/// A to-do as returned by the list and create endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTask {
    pub id: u64,
    pub content: String,
    #[serde(default)]
    pub app_url: Option<String>,
}

/// One page of a paginated listing. `next` is the absolute URL of the
/// following page, taken from the `Link` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_payload_omits_unset_fields_and_local_metadata() {
        let mut record = TaskRecord::new("Write docs");
        record.priority = Priority::Critical;
        record.category = Some("docs".into());
        record.source_line = Some(12);

        let json = serde_json::to_value(CreateTodo::from(&record)).unwrap();
        assert_eq!(json, serde_json::json!({ "content": "Write docs" }));
    }

    #[test]
    fn create_payload_carries_dates_and_sorted_assignees() {
        let mut record = TaskRecord::new("Ship");
        record.due_on = NaiveDate::from_ymd_opt(2024, 12, 31);
        record.assignee_ids = [9, 3].into_iter().collect();
        record.notify = true;

        let json = serde_json::to_value(CreateTodo::from(&record)).unwrap();
        assert_eq!(json["due_on"], "2024-12-31");
        assert_eq!(json["assignee_ids"], serde_json::json!([3, 9]));
        assert_eq!(json["notify"], true);
    }

    #[test]
    fn todoset_id_ignores_disabled_tools() {
        let project: Project = serde_json::from_str(
            r#"{"id":1,"name":"P","dock":[
                {"id":7,"name":"todoset","enabled":false},
                {"id":8,"name":"message_board"}]}"#,
        )
        .unwrap();
        assert_eq!(project.todoset_id(), None);
    }

    #[test]
    fn priority_parse_is_case_insensitive() {
        assert_eq!(Priority::parse(" HIGH "), Some(Priority::High));
        assert_eq!(Priority::parse("urgent"), None);
    }
}

//! Turning an input document into `TaskRecord`s.
//!
//! # Design
//! Entries are decoded one at a time from a `serde_json::Value` so a bad
//! entry only rejects itself. An entry is either a bare string (the title) or
//! an object; both become the same `TaskRecord` here and nothing downstream
//! sees the raw shape.
//!
//! A missing or blank title rejects the entry. Any other malformed field is
//! dropped with a warning and the rest of the record is kept.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::error::ValidationError;
use crate::types::{Priority, TaskRecord};

/// The document as a whole could not be used.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("input is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("expected a JSON array of tasks or an object, found {0}")]
    UnsupportedShape(&'static str),
}

/// An entry that failed validation. `task` is the best available label
/// for the result ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub task: String,
    pub error: ValidationError,
}

/// A field dropped from an otherwise valid entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWarning {
    /// Zero-based position of the entry in the input list.
    pub index: usize,
    pub task: String,
    pub error: ValidationError,
}

pub type Entry = Result<TaskRecord, Rejected>;

#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub entries: Vec<Entry>,
    pub warnings: Vec<FieldWarning>,
}

/// Each entry of the input is a title or a structured task.
#[derive(Debug)]
enum RawEntry {
    Title(String),
    Task(Box<RawTask>),
}

/// Structured task fields. Values are kept loose so each can be validated
/// on its own; unknown keys are ignored. Alternate spellings are separate
/// fields so an entry may carry both; the canonical one wins unless it is
/// absent, null or blank.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTask {
    content: Option<Value>,
    title: Option<Value>,
    description: Option<Value>,
    due_on: Option<Value>,
    #[serde(rename = "dueOn")]
    due_on_camel: Option<Value>,
    starts_on: Option<Value>,
    #[serde(rename = "startsOn")]
    starts_on_camel: Option<Value>,
    assignee_ids: Option<Value>,
    #[serde(rename = "assigneeIds")]
    assignee_ids_camel: Option<Value>,
    notify: Option<Value>,
    priority: Option<Value>,
    category: Option<Value>,
    source_file: Option<Value>,
    #[serde(rename = "sourceFile")]
    source_file_camel: Option<Value>,
    source_line: Option<Value>,
    #[serde(rename = "sourceLine")]
    source_line_camel: Option<Value>,
}

/// A field value together with the key it was read from.
type Picked = (Option<Value>, &'static str);

fn pick(
    canonical: Option<Value>,
    canonical_name: &'static str,
    alias: Option<Value>,
    alias_name: &'static str,
) -> Picked {
    let unset = match &canonical {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(_) => false,
    };
    if unset && alias.is_some() {
        (alias, alias_name)
    } else {
        (canonical, canonical_name)
    }
}

/// Read the input from a file path, or treat `source` as JSON text if it
/// parses as such.
pub fn load(source: &str) -> Result<Normalized, InputError> {
    if let Ok(value) = serde_json::from_str::<Value>(source) {
        return normalize(&value);
    }
    let path = Path::new(source);
    let text = std::fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse(&text)
}

pub fn parse(text: &str) -> Result<Normalized, InputError> {
    let value: Value = serde_json::from_str(text)?;
    normalize(&value)
}

/// Accepts `[...]`, `{"tasks": [...]}`, or a single task object.
pub fn normalize(value: &Value) -> Result<Normalized, InputError> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => match map.get("tasks") {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(other) => return Err(InputError::UnsupportedShape(kind(other))),
            None => vec![value],
        },
        other => return Err(InputError::UnsupportedShape(kind(other))),
    };

    let mut normalized = Normalized::default();
    for (index, item) in items.into_iter().enumerate() {
        let mut warnings = Vec::new();
        let entry = normalize_entry(item, &mut warnings);
        let task = match &entry {
            Ok(record) => record.content.clone(),
            Err(rejected) => rejected.task.clone(),
        };
        for error in warnings {
            warn!(index, task = %task, %error, "dropping invalid field");
            normalized.warnings.push(FieldWarning {
                index,
                task: task.clone(),
                error,
            });
        }
        normalized.entries.push(entry);
    }
    Ok(normalized)
}

fn normalize_entry(item: &Value, warnings: &mut Vec<ValidationError>) -> Entry {
    let raw = match item {
        Value::String(title) => RawEntry::Title(title.clone()),
        Value::Object(_) => match RawTask::deserialize(item) {
            Ok(task) => RawEntry::Task(Box::new(task)),
            Err(err) => {
                return Err(Rejected {
                    task: item.to_string(),
                    error: ValidationError::UnsupportedEntry(err.to_string()),
                })
            }
        },
        other => {
            return Err(Rejected {
                task: other.to_string(),
                error: ValidationError::UnsupportedEntry(kind(other).to_string()),
            })
        }
    };

    match raw {
        RawEntry::Title(title) => titled(&title).map(TaskRecord::new).ok_or(Rejected {
            task: title,
            error: ValidationError::MissingContent,
        }),
        RawEntry::Task(task) => normalize_task(*task, warnings),
    }
}

fn normalize_task(raw: RawTask, warnings: &mut Vec<ValidationError>) -> Entry {
    let (content, _) = pick(raw.content, "content", raw.title, "title");
    let label = content
        .as_ref()
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default();
    let Some(content) = titled(&label) else {
        return Err(Rejected {
            task: label,
            error: ValidationError::MissingContent,
        });
    };

    let mut record = TaskRecord::new(content);
    record.description = text_field((raw.description, "description"), warnings);
    record.due_on = date_field(
        pick(raw.due_on, "due_on", raw.due_on_camel, "dueOn"),
        warnings,
    );
    record.starts_on = date_field(
        pick(raw.starts_on, "starts_on", raw.starts_on_camel, "startsOn"),
        warnings,
    );
    record.assignee_ids = assignees(
        pick(raw.assignee_ids, "assignee_ids", raw.assignee_ids_camel, "assigneeIds"),
        warnings,
    );
    record.notify = match raw.notify {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => flag,
        Some(other) => {
            let reason = format!("expected a boolean, found {}", kind(&other));
            warnings.push(invalid("notify", reason));
            false
        }
    };
    record.priority = match text_field((raw.priority, "priority"), warnings) {
        None => Priority::default(),
        Some(value) => Priority::parse(&value).unwrap_or_else(|| {
            warnings.push(invalid(
                "priority",
                format!("`{value}` is not one of low, normal, high, critical"),
            ));
            Priority::default()
        }),
    };
    record.category = text_field((raw.category, "category"), warnings);
    record.source_file = text_field(
        pick(raw.source_file, "source_file", raw.source_file_camel, "sourceFile"),
        warnings,
    );
    let (source_line, line_field) =
        pick(raw.source_line, "source_line", raw.source_line_camel, "sourceLine");
    record.source_line = match source_line {
        None | Some(Value::Null) => None,
        Some(value) => match value.as_u64().filter(|line| *line > 0) {
            Some(line) => Some(line),
            None => {
                let reason = format!("expected a positive integer, found {value}");
                warnings.push(invalid(line_field, reason));
                None
            }
        },
    };
    Ok(record)
}

fn titled(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn invalid(field: &'static str, reason: String) -> ValidationError {
    ValidationError::InvalidField { field, reason }
}

/// Optional free text. Blank strings count as absent.
fn text_field((value, field): Picked, warnings: &mut Vec<ValidationError>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(other) => {
            let reason = format!("expected a string, found {}", kind(&other));
            warnings.push(invalid(field, reason));
            None
        }
    }
}

fn date_field((value, field): Picked, warnings: &mut Vec<ValidationError>) -> Option<NaiveDate> {
    let text = text_field((value, field), warnings)?;
    // `%Y-%m-%d` alone would also accept unpadded forms like 2024-1-5.
    let well_formed = text.len() == 10
        && text
            .char_indices()
            .all(|(i, c)| if i == 4 || i == 7 { c == '-' } else { c.is_ascii_digit() });
    match NaiveDate::parse_from_str(&text, "%Y-%m-%d") {
        Ok(date) if well_formed => Some(date),
        _ => {
            warnings.push(ValidationError::InvalidDate { field, value: text });
            None
        }
    }
}

fn assignees((value, field): Picked, warnings: &mut Vec<ValidationError>) -> BTreeSet<u64> {
    let items = match value {
        None | Some(Value::Null) => return BTreeSet::new(),
        Some(Value::Array(items)) => items,
        Some(other) => {
            let reason = format!("expected a list, found {}", kind(&other));
            warnings.push(invalid(field, reason));
            return BTreeSet::new();
        }
    };
    let ids: Option<BTreeSet<u64>> = items
        .iter()
        .map(|item| item.as_u64().filter(|id| *id > 0))
        .collect();
    ids.unwrap_or_else(|| {
        let reason = "every id must be a positive integer".to_string();
        warnings.push(invalid(field, reason));
        BTreeSet::new()
    })
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

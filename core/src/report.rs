//! Per-task outcomes and the run report.
//!
//! The serialized shape (`timestamp`, `stats`, `results[]` with `task`,
//! `status`, `basecamp_id`, `url`, `error`) is consumed by other tools and
//! must stay stable.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::RemoteTask;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Created,
    Skipped,
    Failed,
}

/// Outcome of one input entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub task: String,
    pub status: SyncStatus,
    #[serde(rename = "basecamp_id")]
    pub remote_id: Option<u64>,
    #[serde(rename = "url")]
    pub remote_url: Option<String>,
    pub error: Option<String>,
    /// Set on dry-run results, which look created but never left the host.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub simulated: bool,
}

impl SyncResult {
    pub fn created(task: impl Into<String>, remote: &RemoteTask) -> Self {
        Self {
            task: task.into(),
            status: SyncStatus::Created,
            remote_id: Some(remote.id),
            remote_url: remote.app_url.clone(),
            error: None,
            simulated: false,
        }
    }

    pub fn simulated(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            status: SyncStatus::Created,
            remote_id: None,
            remote_url: None,
            error: None,
            simulated: true,
        }
    }

    pub fn skipped(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            status: SyncStatus::Skipped,
            remote_id: None,
            remote_url: None,
            error: None,
            simulated: false,
        }
    }

    pub fn failed(task: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            task: task.into(),
            status: SyncStatus::Failed,
            remote_id: None,
            remote_url: None,
            error: Some(error.to_string()),
            simulated: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub timestamp: DateTime<Utc>,
    pub stats: Stats,
    pub results: Vec<SyncResult>,
}

impl RunReport {
    /// Aggregate a finished ledger. Result order is kept as given.
    pub fn build(ledger: Vec<SyncResult>, timestamp: DateTime<Utc>) -> Self {
        let mut stats = Stats {
            total: ledger.len(),
            ..Stats::default()
        };
        for result in &ledger {
            match result.status {
                SyncStatus::Created => stats.created += 1,
                SyncStatus::Skipped => stats.skipped += 1,
                SyncStatus::Failed => stats.failed += 1,
            }
        }
        Self {
            timestamp,
            stats,
            results: ledger,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.stats.failed > 0
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Stats {
            total,
            created,
            skipped,
            failed,
        } = self.stats;
        writeln!(f, "Summary")?;
        writeln!(f, "  Total tasks: {total}")?;
        writeln!(f, "  Created:     {created}")?;
        writeln!(f, "  Skipped:     {skipped}")?;
        write!(f, "  Failed:      {failed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(id: u64) -> RemoteTask {
        RemoteTask {
            id,
            content: String::new(),
            app_url: Some(format!("https://bc/{id}")),
        }
    }

    #[test]
    fn build_counts_every_status_and_keeps_order() {
        let ledger = vec![
            SyncResult::created("a", &remote(1)),
            SyncResult::skipped("b"),
            SyncResult::failed("c", "HTTP 401: nope"),
            SyncResult::simulated("d"),
        ];
        let report = RunReport::build(ledger, DateTime::<Utc>::default());
        assert_eq!(
            report.stats,
            Stats {
                total: 4,
                created: 2,
                skipped: 1,
                failed: 1
            }
        );
        let tasks: Vec<_> = report.results.iter().map(|r| r.task.as_str()).collect();
        assert_eq!(tasks, ["a", "b", "c", "d"]);
        assert!(report.has_failures());
    }

    #[test]
    fn empty_ledger_has_zero_counts() {
        let report = RunReport::build(Vec::new(), DateTime::<Utc>::default());
        assert_eq!(report.stats, Stats::default());
        assert!(report.results.is_empty());
        assert!(!report.has_failures());
    }

    #[test]
    fn document_uses_stable_field_names() {
        let report = RunReport::build(
            vec![
                SyncResult::created("a", &remote(9)),
                SyncResult::failed("b", "boom"),
                SyncResult::simulated("c"),
            ],
            DateTime::<Utc>::default(),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["timestamp"], "1970-01-01T00:00:00Z");
        assert_eq!(json["stats"]["total"], 3);
        assert_eq!(
            json["results"][0],
            serde_json::json!({
                "task": "a",
                "status": "created",
                "basecamp_id": 9,
                "url": "https://bc/9",
                "error": null
            })
        );
        assert_eq!(json["results"][1]["status"], "failed");
        assert_eq!(json["results"][1]["error"], "boom");
        assert_eq!(json["results"][2]["simulated"], true);
        assert!(json["results"][2]["basecamp_id"].is_null());
    }

    #[test]
    fn summary_lists_counts() {
        let report = RunReport::build(vec![SyncResult::skipped("x")], DateTime::<Utc>::default());
        let text = report.to_string();
        assert!(text.contains("Total tasks: 1"));
        assert!(text.contains("Skipped:     1"));
    }
}

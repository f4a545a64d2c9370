//! The sync engine: drives normalized entries to one outcome each.
//!
//! # Design
//! Entries are processed strictly in input order, one at a time, each fully
//! resolved (retries included) before the next starts. Per entry:
//!
//! ```text
//! Pending ─┬─ rejected by normalizer ───────────────► failed
//!          ├─ duplicate (filter enabled) ───────────► skipped
//!          └─ remote call ─┬─ dry run ──────────────► created (simulated)
//!                          ├─ ok ───────────────────► created
//!                          └─ error / exhausted ────► failed
//! ```
//!
//! Record-level failures never escape `run`. The only run-level failure is
//! not being able to build the duplicate index, which happens before the
//! first entry is looked at. Successful (and simulated) creations are added
//! to the index immediately, so a title repeated in the input is created once.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{Settings, SyncOptions, Target};
use crate::duplicate::{DuplicateFilter, ExistingTaskIndex};
use crate::error::{ApiError, RunError, SyncError};
use crate::normalize::Entry;
use crate::rate_limit::RateLimiter;
use crate::remote::RemoteService;
use crate::report::{RunReport, SyncResult, SyncStatus};
use crate::retry::RetryPolicy;
use crate::types::{Project, TaskRecord, Todolist};

/// Upper bound on pages read while building the duplicate index.
pub const MAX_PAGES: usize = 1_000;

pub struct SyncEngine<R, C = SystemClock> {
    remote: R,
    clock: C,
    target: Target,
    options: SyncOptions,
    policy: RetryPolicy,
    limiter: RateLimiter,
}

impl<R: RemoteService> SyncEngine<R, SystemClock> {
    pub fn new(remote: R, settings: &Settings) -> Self {
        Self::with_clock(remote, settings, SystemClock)
    }
}

impl<R: RemoteService, C: Clock> SyncEngine<R, C> {
    pub fn with_clock(remote: R, settings: &Settings, clock: C) -> Self {
        Self {
            remote,
            clock,
            target: settings.target.clone(),
            options: settings.options,
            policy: RetryPolicy::new(settings.retry),
            limiter: RateLimiter::new(settings.rate_limit),
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn list_projects(&mut self) -> Result<Vec<Project>, SyncError> {
        let remote = &self.remote;
        self.policy
            .run(&self.clock, &mut self.limiter, || remote.list_projects())
    }

    /// Resolve the target project's to-do set, then list its to-do lists.
    /// Each step is its own throttled and retried call.
    pub fn list_todolists(&mut self) -> Result<Vec<Todolist>, SyncError> {
        let remote = &self.remote;
        let project_id = self.target.project_id.as_str();
        let project = self.policy.run(&self.clock, &mut self.limiter, || {
            remote.get_project(project_id)
        })?;
        let todoset_id = project.todoset_id().ok_or_else(|| {
            SyncError::Api(ApiError::UnexpectedResponse(format!(
                "project {project_id} has no enabled to-do set"
            )))
        })?;
        self.policy.run(&self.clock, &mut self.limiter, || {
            remote.list_todolists(project_id, todoset_id)
        })
    }

    /// Fetch every page of the target list's to-dos into an index.
    ///
    /// A `next` link that was already followed, or more than `MAX_PAGES`
    /// pages, is treated as a broken listing.
    pub fn fetch_existing(&mut self) -> Result<ExistingTaskIndex, SyncError> {
        let remote = &self.remote;
        let Target {
            project_id,
            todolist_id,
        } = &self.target;
        let mut titles = Vec::new();
        let mut visited = HashSet::new();
        let mut next: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let page = self.policy.run(&self.clock, &mut self.limiter, || {
                remote.list_tasks(project_id, todolist_id, next.as_deref())
            })?;
            titles.extend(page.items.into_iter().map(|task| task.content));
            let Some(url) = page.next else {
                return Ok(ExistingTaskIndex::from_titles(titles));
            };
            if !visited.insert(url.clone()) {
                return Err(SyncError::Api(ApiError::UnexpectedResponse(format!(
                    "pagination loops back to {url}"
                ))));
            }
            next = Some(url);
        }
        Err(SyncError::Api(ApiError::UnexpectedResponse(format!(
            "to-do listing exceeds {MAX_PAGES} pages"
        ))))
    }

    /// Process every entry and build the report.
    pub fn run(&mut self, entries: Vec<Entry>) -> Result<RunReport, RunError> {
        let mut filter = if self.options.skip_duplicates && !self.options.dry_run {
            let index = self.fetch_existing().map_err(RunError::IndexFetch)?;
            info!(existing = index.len(), "loaded existing tasks");
            DuplicateFilter::Enabled(index)
        } else if self.options.skip_duplicates {
            DuplicateFilter::Enabled(ExistingTaskIndex::default())
        } else {
            DuplicateFilter::Disabled
        };

        let total = entries.len();
        info!(total, dry_run = self.options.dry_run, "processing tasks");

        let mut ledger = Vec::with_capacity(total);
        for (position, entry) in entries.into_iter().enumerate() {
            let result = match entry {
                Ok(record) => self.process(&record, &mut filter),
                Err(rejected) => SyncResult::failed(
                    rejected.task,
                    SyncError::Validation(rejected.error),
                ),
            };
            log_outcome(position + 1, total, &result);
            ledger.push(result);
        }

        Ok(RunReport::build(ledger, self.clock.utc()))
    }

    fn process(&mut self, record: &TaskRecord, filter: &mut DuplicateFilter) -> SyncResult {
        if filter.is_duplicate(record) {
            return SyncResult::skipped(&record.content);
        }

        if self.options.dry_run {
            filter.record_created(record);
            return SyncResult::simulated(&record.content);
        }

        let remote = &self.remote;
        let Target {
            project_id,
            todolist_id,
        } = &self.target;
        match self.policy.run(&self.clock, &mut self.limiter, || {
            remote.create_task(project_id, todolist_id, record)
        }) {
            Ok(created) => {
                filter.record_created(record);
                SyncResult::created(&record.content, &created)
            }
            Err(err) => SyncResult::failed(&record.content, err),
        }
    }
}

fn log_outcome(position: usize, total: usize, result: &SyncResult) {
    match result.status {
        SyncStatus::Created if result.simulated => {
            info!(position, total, task = %result.task, "would create (dry run)")
        }
        SyncStatus::Created => info!(
            position,
            total,
            task = %result.task,
            id = result.remote_id,
            "created"
        ),
        SyncStatus::Skipped => info!(position, total, task = %result.task, "skipped duplicate"),
        SyncStatus::Failed => warn!(
            position,
            total,
            task = %result.task,
            error = result.error.as_deref().unwrap_or_default(),
            "failed"
        ),
    }
}

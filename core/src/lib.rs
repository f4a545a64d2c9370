//! Sync core for pushing a JSON task list into a Basecamp to-do list.
//!
//! # Overview
//! Input is normalized into `TaskRecord`s, then the `SyncEngine` creates each
//! one remotely, skipping titles that already exist, retrying transient
//! failures with backoff and pacing every call through a rate limiter. The
//! outcome is a `RunReport` with one result per input entry, in input order.
//!
//! # Design
//! - `BasecampClient` is stateless and does no I/O: it builds `HttpRequest`
//!   values and parses `HttpResponse` values. A host-provided `Transport`
//!   executes the round trip.
//! - `RemoteService` is the seam the engine talks to; `HttpRemote` is the
//!   real implementation, tests use in-memory fakes.
//! - All waiting goes through `Clock`, so timing is deterministic in tests.
//! - Configuration is resolved once into `Settings` and passed in; nothing
//!   here reads the environment.

pub mod client;
pub mod clock;
pub mod config;
pub mod duplicate;
pub mod engine;
pub mod error;
pub mod http;
pub mod normalize;
pub mod rate_limit;
pub mod remote;
pub mod report;
pub mod retry;
pub mod types;

pub use client::BasecampClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, PartialConfig, Scope, Settings};
pub use engine::SyncEngine;
pub use error::{ApiError, RunError, SyncError, ValidationError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use normalize::{InputError, Normalized};
pub use remote::{HttpRemote, OfflineRemote, RemoteService};
pub use report::{RunReport, Stats, SyncResult, SyncStatus};
pub use types::{Page, Project, RemoteTask, TaskRecord, Todolist};

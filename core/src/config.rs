//! Run configuration.
//!
//! # Design
//! Configuration arrives in layers (config file, then environment and flags)
//! as `PartialConfig` values where every field is optional. Layers are merged
//! with `overlay`, and `resolve` turns the result into a `Settings` value
//! once, at startup. Nothing in the core reads the environment; `Settings`
//! is passed explicitly into the client and engine constructors.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_API_BASE_URL: &str = "https://3.basecampapi.com";
pub const DEFAULT_USER_AGENT: &str = "basecamp-sync (set BASECAMP_USER_AGENT)";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required settings: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("could not read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One configuration layer. Absent fields defer to lower layers or defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PartialConfig {
    pub account_id: Option<String>,
    pub access_token: Option<String>,
    pub project_id: Option<String>,
    pub todolist_id: Option<String>,
    pub user_agent: Option<String>,
    pub api_base_url: Option<String>,
    pub skip_duplicates: Option<bool>,
    pub dry_run: Option<bool>,
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub min_interval_ms: Option<u64>,
    pub budget_requests: Option<u32>,
    pub budget_window_ms: Option<u64>,
}

impl PartialConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    /// Merge `upper` on top of `self`; fields set in `upper` win.
    pub fn overlay(self, upper: PartialConfig) -> PartialConfig {
        PartialConfig {
            account_id: upper.account_id.or(self.account_id),
            access_token: upper.access_token.or(self.access_token),
            project_id: upper.project_id.or(self.project_id),
            todolist_id: upper.todolist_id.or(self.todolist_id),
            user_agent: upper.user_agent.or(self.user_agent),
            api_base_url: upper.api_base_url.or(self.api_base_url),
            skip_duplicates: upper.skip_duplicates.or(self.skip_duplicates),
            dry_run: upper.dry_run.or(self.dry_run),
            max_attempts: upper.max_attempts.or(self.max_attempts),
            base_delay_ms: upper.base_delay_ms.or(self.base_delay_ms),
            max_delay_ms: upper.max_delay_ms.or(self.max_delay_ms),
            min_interval_ms: upper.min_interval_ms.or(self.min_interval_ms),
            budget_requests: upper.budget_requests.or(self.budget_requests),
            budget_window_ms: upper.budget_window_ms.or(self.budget_window_ms),
        }
    }

    /// Resolve every required field, reporting all missing ones together.
    pub fn resolve(&self) -> Result<Settings, ConfigError> {
        self.resolve_for(Scope::Todolist)
    }

    /// Like `resolve`, but only insists on the identifiers `scope` needs.
    /// Target ids that are not required and not set resolve to empty strings.
    pub fn resolve_for(&self, scope: Scope) -> Result<Settings, ConfigError> {
        let mut missing = Vec::new();
        let (account_id, access_token) = if scope >= Scope::Connection {
            (
                required(&self.account_id, "account_id", &mut missing),
                required(&self.access_token, "access_token", &mut missing),
            )
        } else {
            (optional(&self.account_id), optional(&self.access_token))
        };
        let project_id = if scope >= Scope::Project {
            required(&self.project_id, "project_id", &mut missing)
        } else {
            optional(&self.project_id)
        };
        let todolist_id = if scope >= Scope::Todolist {
            required(&self.todolist_id, "todolist_id", &mut missing)
        } else {
            optional(&self.todolist_id)
        };
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let max_attempts = self.max_attempts.unwrap_or(3);
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "max_attempts",
                reason: "must be at least 1".into(),
            });
        }
        let budget_requests = self.budget_requests.unwrap_or(45);
        let budget_window = Duration::from_millis(self.budget_window_ms.unwrap_or(10_000));
        if budget_requests == 0 || budget_window.is_zero() {
            return Err(ConfigError::Invalid {
                field: "budget_requests",
                reason: "request budget and its window must be non-zero".into(),
            });
        }

        Ok(Settings {
            connection: self.connection(account_id, access_token),
            target: Target {
                project_id,
                todolist_id,
            },
            options: SyncOptions {
                skip_duplicates: self.skip_duplicates.unwrap_or(true),
                dry_run: self.dry_run.unwrap_or(false),
            },
            retry: RetryConfig {
                max_attempts,
                base_delay: Duration::from_millis(self.base_delay_ms.unwrap_or(1_000)),
                max_delay: Duration::from_millis(self.max_delay_ms.unwrap_or(30_000)),
            },
            rate_limit: RateLimitConfig {
                min_interval: Duration::from_millis(self.min_interval_ms.unwrap_or(500)),
                budget_requests,
                budget_window,
            },
        })
    }

    fn connection(&self, account_id: String, access_token: String) -> ConnectionConfig {
        ConnectionConfig {
            account_id,
            access_token,
            user_agent: self
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            api_base_url: self
                .api_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        }
    }
}

fn optional(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

fn required(
    value: &Option<String>,
    name: &'static str,
    missing: &mut Vec<&'static str>,
) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => {
            missing.push(name);
            String::new()
        }
    }
}

/// How much of the target a command needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scope {
    /// Nothing remote at all: a dry run with no connection configured.
    Offline,
    /// Credentials only, e.g. listing projects.
    Connection,
    /// Credentials and a project, e.g. listing its to-do lists.
    Project,
    /// Everything a sync run needs.
    Todolist,
}

/// Fully resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub connection: ConnectionConfig,
    pub target: Target,
    pub options: SyncOptions,
    pub retry: RetryConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub account_id: String,
    pub access_token: String,
    pub user_agent: String,
    pub api_base_url: String,
}

/// The project and to-do list a run writes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub project_id: String,
    pub todolist_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub skip_duplicates: bool,
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            skip_duplicates: true,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub min_interval: Duration,
    /// At most this many calls inside any `budget_window`.
    pub budget_requests: u32,
    pub budget_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(500),
            budget_requests: 45,
            budget_window: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> PartialConfig {
        PartialConfig {
            account_id: Some("999".into()),
            access_token: Some("secret".into()),
            project_id: Some("1".into()),
            todolist_id: Some("2".into()),
            ..PartialConfig::default()
        }
    }

    #[test]
    fn resolve_applies_defaults() {
        let settings = complete().resolve().unwrap();
        assert_eq!(settings.connection.api_base_url, DEFAULT_API_BASE_URL);
        assert!(settings.options.skip_duplicates);
        assert!(!settings.options.dry_run);
        assert_eq!(settings.retry, RetryConfig::default());
        assert_eq!(settings.rate_limit, RateLimitConfig::default());
    }

    #[test]
    fn resolve_lists_every_missing_field() {
        let err = PartialConfig {
            account_id: Some("999".into()),
            access_token: Some("   ".into()),
            ..PartialConfig::default()
        }
        .resolve()
        .unwrap_err();
        match err {
            ConfigError::Missing(fields) => {
                assert_eq!(fields, vec!["access_token", "project_id", "todolist_id"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn narrower_scopes_need_fewer_ids() {
        let creds = PartialConfig {
            account_id: Some("999".into()),
            access_token: Some("secret".into()),
            ..PartialConfig::default()
        };
        let settings = creds.resolve_for(Scope::Connection).unwrap();
        assert_eq!(settings.target.project_id, "");

        match creds.resolve_for(Scope::Project).unwrap_err() {
            ConfigError::Missing(fields) => assert_eq!(fields, vec!["project_id"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn offline_scope_needs_nothing_but_keeps_options() {
        let config = PartialConfig {
            dry_run: Some(true),
            max_attempts: Some(0),
            ..PartialConfig::default()
        };
        assert!(matches!(
            config.resolve_for(Scope::Offline),
            Err(ConfigError::Invalid { .. })
        ));

        let config = PartialConfig {
            dry_run: Some(true),
            ..PartialConfig::default()
        };
        let settings = config.resolve_for(Scope::Offline).unwrap();
        assert!(settings.options.dry_run);
        assert!(settings.connection.access_token.is_empty());
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let mut config = complete();
        config.max_attempts = Some(0);
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::Invalid {
                field: "max_attempts",
                ..
            })
        ));
    }

    #[test]
    fn overlay_prefers_upper_layer() {
        let file = PartialConfig {
            project_id: Some("from-file".into()),
            todolist_id: Some("list".into()),
            ..PartialConfig::default()
        };
        let flags = PartialConfig {
            project_id: Some("from-flag".into()),
            ..PartialConfig::default()
        };
        let merged = file.overlay(flags);
        assert_eq!(merged.project_id.as_deref(), Some("from-flag"));
        assert_eq!(merged.todolist_id.as_deref(), Some("list"));
    }

    #[test]
    fn config_file_uses_snake_case_keys() {
        let parsed: PartialConfig =
            serde_json::from_str(r#"{"account_id":"1","min_interval_ms":250}"#).unwrap();
        assert_eq!(parsed.account_id.as_deref(), Some("1"));
        assert_eq!(parsed.min_interval_ms, Some(250));
    }
}

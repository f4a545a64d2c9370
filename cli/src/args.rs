//! Command-line surface.
//!
//! Connection and target flags fall back to `BASECAMP_*` environment
//! variables. Everything is optional at parse time; required settings are
//! checked once the config file and flags have been merged.

use std::path::PathBuf;

use basecamp_sync_core::PartialConfig;
use clap::{ArgGroup, Parser};

#[derive(Debug, Parser)]
#[command(
    name = "basecamp-sync",
    version,
    about = "Create Basecamp to-dos from a JSON task list",
    long_about = "Create Basecamp to-dos from a JSON task list.\n\n\
                  INPUT is a file path or inline JSON: an array of titles and/or task objects, \
                  or an object with a `tasks` array. Titles already present in the target list \
                  are skipped unless --allow-duplicates is given."
)]
#[command(group(
    ArgGroup::new("utility")
        .args(["list_projects", "list_todolists", "test_connection"])
        .multiple(false)
))]
pub struct Cli {
    /// Task list: path to a JSON file, or JSON text
    #[arg(
        value_name = "INPUT",
        conflicts_with = "stdin",
        required_unless_present_any = ["stdin", "list_projects", "list_todolists", "test_connection"]
    )]
    pub input: Option<String>,

    /// Read the task list from standard input
    #[arg(long)]
    pub stdin: bool,

    /// JSON config file; flags and environment take precedence over it
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "BASECAMP_ACCOUNT_ID")]
    pub account_id: Option<String>,

    #[arg(long, env = "BASECAMP_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    #[arg(long, env = "BASECAMP_PROJECT_ID")]
    pub project_id: Option<String>,

    #[arg(long, env = "BASECAMP_TODOLIST_ID")]
    pub todolist_id: Option<String>,

    /// Sent as User-Agent; Basecamp asks for an app name and contact address
    #[arg(long, env = "BASECAMP_USER_AGENT")]
    pub user_agent: Option<String>,

    #[arg(long, env = "BASECAMP_API_BASE_URL", value_name = "URL")]
    pub api_base_url: Option<String>,

    /// Show what would be created without sending anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Create tasks even when the title already exists in the list
    #[arg(long)]
    pub allow_duplicates: bool,

    /// Attempts per remote call, including the first
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// First retry delay; doubles on every further attempt
    #[arg(long, value_name = "MS")]
    pub base_delay_ms: Option<u64>,

    /// Minimum spacing between requests
    #[arg(long, value_name = "MS")]
    pub min_interval_ms: Option<u64>,

    /// Write the results document to FILE as JSON
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// List the projects visible to the credentials and exit
    #[arg(long)]
    pub list_projects: bool,

    /// List the to-do lists of the configured project and exit
    #[arg(long)]
    pub list_todolists: bool,

    /// Check the credentials against the API and exit
    #[arg(long)]
    pub test_connection: bool,

    /// Log each task outcome (RUST_LOG overrides)
    #[arg(short, long)]
    pub verbose: bool,
}

/// What the invocation asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Sync,
    ListProjects,
    ListTodolists,
    TestConnection,
}

impl Cli {
    pub fn command(&self) -> Command {
        if self.list_projects {
            Command::ListProjects
        } else if self.list_todolists {
            Command::ListTodolists
        } else if self.test_connection {
            Command::TestConnection
        } else {
            Command::Sync
        }
    }

    /// The flag/environment layer. Switches only count when given, so they
    /// never mask a config file value.
    pub fn to_partial(&self) -> PartialConfig {
        PartialConfig {
            account_id: self.account_id.clone(),
            access_token: self.access_token.clone(),
            project_id: self.project_id.clone(),
            todolist_id: self.todolist_id.clone(),
            user_agent: self.user_agent.clone(),
            api_base_url: self.api_base_url.clone(),
            skip_duplicates: self.allow_duplicates.then_some(false),
            dry_run: self.dry_run.then_some(true),
            max_attempts: self.max_attempts,
            base_delay_ms: self.base_delay_ms,
            min_interval_ms: self.min_interval_ms,
            ..PartialConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    #[test]
    fn input_file_with_switches() {
        let cli = Cli::try_parse_from([
            "basecamp-sync",
            "tasks.json",
            "-n",
            "--allow-duplicates",
            "--project-id",
            "12",
            "-o",
            "out.json",
        ])
        .unwrap();
        assert_eq!(cli.input.as_deref(), Some("tasks.json"));
        assert_eq!(cli.command(), Command::Sync);
        assert_eq!(cli.output, Some(PathBuf::from("out.json")));

        let partial = cli.to_partial();
        assert_eq!(partial.dry_run, Some(true));
        assert_eq!(partial.skip_duplicates, Some(false));
        assert_eq!(partial.project_id.as_deref(), Some("12"));
    }

    #[test]
    fn unset_switches_leave_layer_empty() {
        let cli = Cli::try_parse_from(["basecamp-sync", "--stdin"]).unwrap();
        let partial = cli.to_partial();
        assert_eq!(partial.dry_run, None);
        assert_eq!(partial.skip_duplicates, None);
        assert_eq!(partial.max_attempts, None);
    }

    #[test]
    fn input_is_required_for_a_sync() {
        let err = Cli::try_parse_from(["basecamp-sync"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn input_and_stdin_conflict() {
        let err = Cli::try_parse_from(["basecamp-sync", "tasks.json", "--stdin"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn utility_commands_need_no_input() {
        let cli = Cli::try_parse_from(["basecamp-sync", "--list-todolists"]).unwrap();
        assert_eq!(cli.command(), Command::ListTodolists);
    }

    #[test]
    fn utility_commands_are_exclusive() {
        let err = Cli::try_parse_from(["basecamp-sync", "--list-projects", "--test-connection"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn retry_tuning_flags_parse() {
        let cli = Cli::try_parse_from([
            "basecamp-sync",
            "[]",
            "--max-attempts",
            "5",
            "--base-delay-ms",
            "200",
            "--min-interval-ms",
            "50",
        ])
        .unwrap();
        let partial = cli.to_partial();
        assert_eq!(partial.max_attempts, Some(5));
        assert_eq!(partial.base_delay_ms, Some(200));
        assert_eq!(partial.min_interval_ms, Some(50));
    }
}

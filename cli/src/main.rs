use std::io::Read;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use basecamp_sync_core::normalize::{self, Normalized};
use basecamp_sync_core::{
    BasecampClient, ConfigError, HttpRemote, OfflineRemote, PartialConfig, RunReport, Scope,
    Settings, SyncEngine, SyncResult, SyncStatus,
};
use clap::Parser;
use tracing::{info, warn};

mod args;
mod transport;

use args::{Cli, Command};
use transport::UreqTransport;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit status when at least one task failed.
const EXIT_TASK_FAILURES: u8 = 1;
/// Exit status when the run stopped before processing tasks.
const EXIT_ABORTED: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_ABORTED)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let config = layered_config(cli)?;
    match cli.command() {
        Command::ListProjects => list_projects(&config),
        Command::ListTodolists => list_todolists(&config),
        Command::TestConnection => test_connection(&config),
        Command::Sync => sync(cli, &config),
    }
}

/// Config file first, flags and environment on top.
fn layered_config(cli: &Cli) -> Result<PartialConfig> {
    let base = match &cli.config {
        Some(path) => PartialConfig::from_json_file(path)?,
        None => PartialConfig::default(),
    };
    Ok(base.overlay(cli.to_partial()))
}

fn engine(settings: &Settings) -> SyncEngine<HttpRemote<UreqTransport>> {
    let remote = HttpRemote::new(
        BasecampClient::new(&settings.connection),
        UreqTransport::new(REQUEST_TIMEOUT),
    );
    SyncEngine::new(remote, settings)
}

fn list_projects(config: &PartialConfig) -> Result<ExitCode> {
    let settings = config.resolve_for(Scope::Connection)?;
    let projects = engine(&settings)
        .list_projects()
        .context("listing projects")?;
    if projects.is_empty() {
        println!("No projects found.");
    }
    for project in &projects {
        let todoset = project
            .todoset_id()
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        println!("{:>12}  {}  (todoset {todoset})", project.id, project.name);
    }
    Ok(ExitCode::SUCCESS)
}

fn list_todolists(config: &PartialConfig) -> Result<ExitCode> {
    let settings = config.resolve_for(Scope::Project)?;
    let lists = engine(&settings)
        .list_todolists()
        .with_context(|| format!("listing to-do lists of project {}", settings.target.project_id))?;
    if lists.is_empty() {
        println!("No to-do lists found.");
    }
    for list in &lists {
        let count = list
            .todos_count
            .map_or_else(String::new, |n| format!("  ({n} to-dos)"));
        println!("{:>12}  {}{count}", list.id, list.name);
    }
    Ok(ExitCode::SUCCESS)
}

fn test_connection(config: &PartialConfig) -> Result<ExitCode> {
    let settings = config.resolve_for(Scope::Connection)?;
    let projects = engine(&settings)
        .list_projects()
        .context("connecting to Basecamp")?;
    println!(
        "Connected to account {} ({} projects visible).",
        settings.connection.account_id,
        projects.len()
    );
    Ok(ExitCode::SUCCESS)
}

fn sync(cli: &Cli, config: &PartialConfig) -> Result<ExitCode> {
    let input = read_input(cli)?;
    if !input.warnings.is_empty() {
        info!(count = input.warnings.len(), "some optional fields were dropped");
    }

    let report = sync_report(config, input)?;

    print_report(&report, config.dry_run.unwrap_or(false));
    if let Some(path) = &cli.output {
        write_report(&report, path)?;
    }

    Ok(if report.has_failures() {
        ExitCode::from(EXIT_TASK_FAILURES)
    } else {
        ExitCode::SUCCESS
    })
}

/// A dry run may go ahead without connection settings; it then runs
/// against `OfflineRemote` and never opens a connection.
fn sync_report(config: &PartialConfig, input: Normalized) -> Result<RunReport> {
    let outcome = match config.resolve() {
        Ok(settings) => engine(&settings).run(input.entries),
        Err(ConfigError::Missing(fields)) if config.dry_run == Some(true) => {
            warn!(
                missing = %fields.join(", "),
                "dry run without connection settings; nothing will be sent"
            );
            let settings = config.resolve_for(Scope::Offline)?;
            SyncEngine::new(OfflineRemote, &settings).run(input.entries)
        }
        Err(err) => return Err(err.into()),
    };
    outcome.context("sync aborted before any task was processed")
}

fn read_input(cli: &Cli) -> Result<Normalized> {
    if cli.stdin {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading tasks from stdin")?;
        return normalize::parse(&text).context("parsing tasks from stdin");
    }
    let source = cli.input.as_deref().unwrap_or_default();
    normalize::load(source).context("loading tasks")
}

fn print_report(report: &RunReport, dry_run: bool) {
    if dry_run {
        println!("Dry run: nothing was sent to Basecamp.");
    }
    for result in &report.results {
        println!("{}", outcome_line(result));
    }
    println!();
    println!("{report}");
}

fn outcome_line(result: &SyncResult) -> String {
    match result.status {
        SyncStatus::Created if result.simulated => format!("  would create  {}", result.task),
        SyncStatus::Created => match &result.remote_url {
            Some(url) => format!("  created       {}  {url}", result.task),
            None => format!("  created       {}", result.task),
        },
        SyncStatus::Skipped => format!("  skipped       {}  (already exists)", result.task),
        SyncStatus::Failed => format!(
            "  failed        {}  {}",
            result.task,
            result.error.as_deref().unwrap_or_default()
        ),
    }
}

fn write_report(report: &RunReport, path: &std::path::Path) -> Result<()> {
    let json = report.to_json_pretty().context("serializing results")?;
    std::fs::write(path, json)
        .with_context(|| format!("writing results to {}", path.display()))?;
    info!(path = %path.display(), "results written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use basecamp_sync_core::RemoteTask;

    use super::*;

    #[test]
    fn outcome_lines_name_the_status() {
        let created = SyncResult::created(
            "Ship",
            &RemoteTask {
                id: 7,
                content: "Ship".into(),
                app_url: Some("https://bc/7".into()),
            },
        );
        assert_eq!(outcome_line(&created), "  created       Ship  https://bc/7");
        assert_eq!(
            outcome_line(&SyncResult::simulated("Ship")),
            "  would create  Ship"
        );
        assert!(outcome_line(&SyncResult::failed("Ship", "HTTP 403")).ends_with("HTTP 403"));
    }

    fn without_connection(cli: &Cli) -> PartialConfig {
        PartialConfig {
            account_id: None,
            access_token: None,
            project_id: None,
            todolist_id: None,
            ..layered_config(cli).unwrap()
        }
    }

    #[test]
    fn dry_run_goes_ahead_without_credentials() {
        let cli =
            Cli::try_parse_from(["basecamp-sync", "--dry-run", r#"["Draft", "Draft", "Review"]"#])
                .unwrap();
        let config = without_connection(&cli);
        let report = sync_report(&config, read_input(&cli).unwrap()).unwrap();

        let statuses: Vec<_> = report.results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![SyncStatus::Created, SyncStatus::Skipped, SyncStatus::Created]
        );
        assert!(report.results[0].simulated);
        assert!(report.results[0].remote_id.is_none());
        assert!(!report.has_failures());
    }

    #[test]
    fn real_run_still_needs_credentials() {
        let cli = Cli::try_parse_from(["basecamp-sync", r#"["Draft"]"#]).unwrap();
        let config = without_connection(&cli);
        let err = sync_report(&config, read_input(&cli).unwrap()).unwrap_err();
        match err.downcast_ref::<ConfigError>() {
            Some(ConfigError::Missing(fields)) => assert!(fields.contains(&"access_token")),
            other => panic!("expected missing settings, got {other:?}"),
        }
    }

    #[test]
    fn flags_override_config_file() {
        let dir = std::env::temp_dir().join(format!("basecamp-sync-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, r#"{"project_id":"1","todolist_id":"2","dry_run":false}"#).unwrap();

        let cli = Cli::try_parse_from([
            "basecamp-sync",
            "--config",
            path.to_str().unwrap(),
            "--todolist-id",
            "99",
            "--dry-run",
            "[]",
        ])
        .unwrap();
        let config = layered_config(&cli).unwrap();
        assert_eq!(config.project_id.as_deref(), Some("1"));
        assert_eq!(config.todolist_id.as_deref(), Some("99"));
        assert_eq!(config.dry_run, Some(true));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}

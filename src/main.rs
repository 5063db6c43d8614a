//! glance-exec - Splits a SQL script into executables and runs them in batch chains.

mod cli;

use cli::{Cli, OutputFormat};
use glance_executor::backend::MockBackend;
use glance_executor::config::Config;
use glance_executor::error::{ExecutorError, Result};
use glance_executor::execution::variables::unresolved_placeholders;
use glance_executor::execution::{ExecutableId, ExecutableRaw, ExecutionStatus, Executor};
use glance_executor::logging;
use glance_executor::session::SessionActor;
use glance_executor::statement::{ParsedLocation, StatementSplitter};
use serde::Serialize;
use std::io::Read;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    if cli.log_file {
        if let Some(path) = logging::init_file_logging() {
            eprintln!("Logging to {}", path.display());
        }
    } else {
        logging::init_stderr_logging();
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let format = cli.output_format()?;
    let selection = cli.selection_mode()?;

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    config.executor.apply_env_defaults();
    info!("Executing via: {}", config.executor.display_string());

    let sql = read_script(&cli.script)?;
    let splitter = StatementSplitter::from_config(&config.executor)?;
    let details = splitter.details(&sql, cli.cursor, selection)?;

    if !cli.run {
        let mut executor = Executor::new(config.executor);
        let report = executor.update_with_report(&details, false);
        let plan: Vec<PlanEntry> = executor
            .executables()
            .iter()
            .map(|e| PlanEntry {
                id: e.id(),
                statement: e.statement().statement.clone(),
                location: e.statement().location,
                database: e.database().to_string(),
                active: executor.active() == Some(e.id()),
                selected: report.selected.contains(&e.id()),
                unresolved: unresolved_placeholders(
                    &e.statement().statement,
                    &executor.config().variables,
                ),
            })
            .collect();
        return print_plan(&plan, format);
    }

    let (handle, actor) = SessionActor::spawn(
        config.executor,
        Arc::new(MockBackend::new()),
        config.session,
    );
    let session = tokio::spawn(actor.run());

    if handle.execute(details).await?.is_none() {
        warn!("Nothing selected to run");
    }
    handle.when_idle().await?;
    let snapshot = handle.snapshot().await?;

    handle.close().await?;
    session
        .await
        .map_err(|e| ExecutorError::internal(format!("Session task failed: {e}")))?;

    print_snapshot(&snapshot.executables, format)
}

/// Reads the script from a file, or from stdin for "-".
fn read_script(path: &str) -> Result<String> {
    if path == "-" {
        let mut sql = String::new();
        std::io::stdin()
            .read_to_string(&mut sql)
            .map_err(|e| ExecutorError::config(format!("Failed to read script from stdin: {e}")))?;
        return Ok(sql);
    }

    std::fs::read_to_string(path)
        .map_err(|e| ExecutorError::config(format!("Failed to read script {path}: {e}")))
}

/// One executable as the synchronizer sees it, before any run.
#[derive(Debug, Serialize)]
struct PlanEntry {
    id: ExecutableId,
    statement: String,
    location: ParsedLocation,
    database: String,
    active: bool,
    selected: bool,
    /// Placeholders the configured variables leave unfilled.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    unresolved: Vec<String>,
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ExecutorError::internal(format!("Failed to serialize output: {e}")))
}

fn print_plan(plan: &[PlanEntry], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", to_json(&plan)?),
        OutputFormat::Text => {
            for entry in plan {
                let marker = match (entry.active, entry.selected) {
                    (true, true) => "*>",
                    (true, false) => "* ",
                    (false, true) => " >",
                    (false, false) => "  ",
                };
                println!(
                    "{} {} [{}-{}] ({}) {}",
                    marker,
                    entry.id,
                    entry.location.start,
                    entry.location.end,
                    entry.database,
                    entry.statement
                );
                if !entry.unresolved.is_empty() {
                    println!("     unresolved: {}", entry.unresolved.join(", "));
                }
            }
        }
    }
    Ok(())
}

fn print_snapshot(executables: &[ExecutableRaw], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", to_json(&executables)?),
        OutputFormat::Text => {
            for e in executables {
                let detail = match (e.status, &e.result, &e.error) {
                    (ExecutionStatus::Success, Some(result), _) => {
                        format!("{} row(s)", result.row_count)
                    }
                    (ExecutionStatus::Failed, _, Some(error)) => error.clone(),
                    _ => String::new(),
                };
                println!(
                    "{} {:<9} {} {}",
                    e.id,
                    e.status.to_string(),
                    e.statement.statement,
                    detail
                );
            }
        }
    }
    Ok(())
}

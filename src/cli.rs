//! Command-line argument parsing for glance-exec.
//!
//! Uses clap to parse CLI arguments.

use clap::Parser;
use glance_executor::config::Config;
use glance_executor::error::{ExecutorError, Result};
use glance_executor::statement::{Position, SelectionMode};
use std::path::PathBuf;

/// Output format for the plan and the run snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// One line per executable.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "Invalid output format: {s}. Expected: text or json"
            )),
        }
    }
}

/// Splits a SQL script into executables and runs them in batch chains.
#[derive(Parser, Debug)]
#[command(name = "glance-exec")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// SQL script to load (use "-" for stdin)
    #[arg(value_name = "SCRIPT")]
    pub script: String,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Cursor position (LINE:COL, 1-based)
    #[arg(long, value_name = "LINE:COL")]
    pub cursor: Option<Position>,

    /// Which statements to select: active, all, or range
    #[arg(long, value_name = "MODE", default_value = "active")]
    pub selection: String,

    /// Highlighted range for --selection range (e.g. "2:1-3:10")
    #[arg(long, value_name = "START-END")]
    pub range: Option<String>,

    /// Execute the selection against the mock backend
    #[arg(long)]
    pub run: bool,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    pub format: String,

    /// Log to a file instead of stderr
    #[arg(long)]
    pub log_file: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path, using the default if not specified.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(Config::default_path)
    }

    /// Parses the output format.
    pub fn output_format(&self) -> Result<OutputFormat> {
        self.format.parse::<OutputFormat>().map_err(ExecutorError::config)
    }

    /// Builds the selection mode from `--selection` and `--range`.
    pub fn selection_mode(&self) -> Result<SelectionMode> {
        match self.selection.to_lowercase().as_str() {
            "active" => Ok(SelectionMode::Active),
            "all" => Ok(SelectionMode::All),
            "range" => {
                let range = self.range.as_deref().ok_or_else(|| {
                    ExecutorError::config("--selection range requires --range START-END")
                })?;
                let (start, end) = parse_range(range).map_err(ExecutorError::config)?;
                Ok(SelectionMode::Range { start, end })
            }
            other => Err(ExecutorError::config(format!(
                "Invalid selection: {other}. Expected: active, all, or range"
            ))),
        }
    }
}

/// Parses `LINE:COL-LINE:COL`.
fn parse_range(s: &str) -> std::result::Result<(Position, Position), String> {
    let (start, end) = s
        .split_once('-')
        .ok_or_else(|| format!("Invalid range: {s}. Expected START-END"))?;
    let start: Position = start.parse()?;
    let end: Position = end.parse()?;
    if end < start {
        return Err(format!("Invalid range: {s}. End is before start"));
    }
    Ok((start, end))
}

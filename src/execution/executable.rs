//! One statement's execution lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::events::{ExecutorEvent, Notifier};
use super::variables::substitute_variables;
use crate::backend::{ExecutionRequest, StatementResult};
use crate::config::ExecutorConfig;
use crate::error::{ExecutorError, Result};
use crate::statement::ParsedStatement;

/// Unique identifier for an executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutableId(u64);

impl ExecutableId {
    /// Generates a new unique executable ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ExecutableId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Execution status of an executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Never run, or reset after its statement was edited.
    #[default]
    Ready,
    /// Submitted to the backend.
    Running,
    /// Backend is delivering results.
    Streaming,
    Success,
    Failed,
    Canceled,
}

impl ExecutionStatus {
    /// Returns true while a run is in flight.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Running | Self::Streaming)
    }

    /// Returns true once a run has finished, one way or another.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Canceled)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::Running => write!(f, "running"),
            Self::Streaming => write!(f, "streaming"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

/// Handed to whoever runs a started executable.
#[derive(Debug, Clone)]
pub struct RunTicket {
    pub id: ExecutableId,
    pub run_id: u64,
    /// Cancelled when the executable's chain is cancelled.
    pub cancel: CancellationToken,
    pub request: ExecutionRequest,
}

/// A unit tracking one statement's execution lifecycle.
///
/// Chain links are ids into the executor's collection. They are only ever
/// changed by the chain manager, which keeps both sides of a link in step.
#[derive(Debug)]
pub struct Executable {
    id: ExecutableId,
    statement: ParsedStatement,
    database: String,
    status: ExecutionStatus,
    lost: bool,
    previous: Option<ExecutableId>,
    next: Option<ExecutableId>,
    cancel_token: Option<CancellationToken>,
    run_id: u64,
    /// Statement text and database the current run was started with.
    run_statement: Option<(String, String)>,
    result: Option<StatementResult>,
    error: Option<String>,
    config: Arc<ExecutorConfig>,
}

impl Executable {
    /// Creates a ready executable for a statement.
    pub fn new(statement: ParsedStatement, database: String, config: Arc<ExecutorConfig>) -> Self {
        Self {
            id: ExecutableId::new(),
            statement,
            database,
            status: ExecutionStatus::Ready,
            lost: false,
            previous: None,
            next: None,
            cancel_token: None,
            run_id: 0,
            run_statement: None,
            result: None,
            error: None,
            config,
        }
    }

    pub fn id(&self) -> ExecutableId {
        self.id
    }

    pub fn statement(&self) -> &ParsedStatement {
        &self.statement
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn is_lost(&self) -> bool {
        self.lost
    }

    /// Predecessor in the batch chain.
    pub fn previous(&self) -> Option<ExecutableId> {
        self.previous
    }

    /// Successor in the batch chain.
    pub fn next(&self) -> Option<ExecutableId> {
        self.next
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn result(&self) -> Option<&StatementResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn config(&self) -> &Arc<ExecutorConfig> {
        &self.config
    }

    pub(crate) fn set_previous(&mut self, previous: Option<ExecutableId>) {
        self.previous = previous;
    }

    pub(crate) fn set_next(&mut self, next: Option<ExecutableId>) {
        self.next = next;
    }

    /// Flags the executable as no longer matching any statement.
    pub fn mark_lost(&mut self) {
        self.lost = true;
    }

    /// Points the executable at a (possibly edited) statement.
    ///
    /// Returns true when the text or the database changed. A finished run's
    /// result belongs to the old text, so the executable goes back to
    /// `Ready`. An in-flight run is left to finish, but its outcome is not
    /// attached to the edited statement (see [`Executable::complete`]).
    pub fn update_statement(&mut self, statement: ParsedStatement, database: String) -> bool {
        let edited =
            statement.statement != self.statement.statement || database != self.database;
        self.statement = statement;
        self.database = database;
        if edited && self.status.is_terminal() {
            self.status = ExecutionStatus::Ready;
            self.result = None;
            self.error = None;
        }
        edited
    }

    /// Builds the backend request for the current statement.
    pub fn request(&self) -> ExecutionRequest {
        ExecutionRequest {
            executable_id: self.id,
            run_id: self.run_id,
            sql: substitute_variables(&self.statement.statement, &self.config.variables),
            database: self.database.clone(),
            connector: self.config.connector.id.clone(),
            compute: self.config.compute.clone(),
            namespace: self.config.namespace.clone(),
            limit: self.config.default_limit,
            is_sql_engine: self.config.is_sql_engine,
            is_optimizer_enabled: self.config.is_optimizer_enabled,
        }
    }

    /// Starts a new run and returns the ticket for the runner.
    pub fn start(&mut self) -> Result<RunTicket> {
        if self.lost {
            return Err(ExecutorError::invalid_state(format!(
                "executable {} is lost",
                self.id
            )));
        }
        if self.status.is_in_flight() {
            return Err(ExecutorError::invalid_state(format!(
                "executable {} is already {}",
                self.id, self.status
            )));
        }

        let token = CancellationToken::new();
        self.run_id += 1;
        self.status = ExecutionStatus::Running;
        self.result = None;
        self.error = None;
        self.cancel_token = Some(token.clone());
        self.run_statement = Some((self.statement.statement.clone(), self.database.clone()));

        Ok(RunTicket {
            id: self.id,
            run_id: self.run_id,
            cancel: token,
            request: self.request(),
        })
    }

    /// Moves a running run to `Streaming`. Ignored for stale runs.
    pub fn mark_streaming(&mut self, run_id: u64) -> bool {
        if run_id != self.run_id || self.status != ExecutionStatus::Running {
            return false;
        }
        self.status = ExecutionStatus::Streaming;
        true
    }

    /// Records the outcome of a run.
    ///
    /// Returns false, changing nothing, when the run is stale (an older
    /// `run_id`) or was cancelled in the meantime. If the statement was
    /// edited while the run was in flight, the run still counts as finished
    /// but its outcome belongs to the old text: the executable goes back to
    /// `Ready` with no result or error.
    pub fn complete(&mut self, run_id: u64, outcome: Result<StatementResult>) -> bool {
        if run_id != self.run_id || !self.status.is_in_flight() {
            return false;
        }
        self.cancel_token = None;
        let ran = self.run_statement.take();
        if !self.ran_current_statement(ran.as_ref()) {
            self.status = ExecutionStatus::Ready;
            self.result = None;
            self.error = None;
            return true;
        }
        match outcome {
            Ok(result) => {
                self.status = ExecutionStatus::Success;
                self.result = Some(result);
            }
            Err(e) => {
                self.status = ExecutionStatus::Failed;
                self.error = Some(e.to_string());
            }
        }
        true
    }

    fn ran_current_statement(&self, ran: Option<&(String, String)>) -> bool {
        ran.is_some_and(|(sql, database)| {
            *sql == self.statement.statement && *database == self.database
        })
    }

    /// Cancels the in-flight run, if any. Returns true if something was cancelled.
    pub fn cancel(&mut self) -> bool {
        if !self.status.is_in_flight() {
            return false;
        }
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        self.status = ExecutionStatus::Canceled;
        true
    }

    /// Tells observers this executable changed.
    pub fn notify(&self, notifier: &Notifier) {
        notifier.publish(ExecutorEvent::Changed {
            id: self.id,
            status: self.status,
            lost: self.lost,
        });
    }

    /// Plain representation for persistence.
    pub fn to_raw(&self) -> ExecutableRaw {
        ExecutableRaw {
            id: self.id,
            statement: self.statement.clone(),
            database: self.database.clone(),
            status: self.status,
            lost: self.lost,
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }

    /// Rebuilds an executable from its raw form.
    ///
    /// A fresh id is allocated so restored executables can never collide with
    /// live ones. Runs cannot survive a restore, so in-flight statuses come
    /// back as `Ready`.
    pub fn from_raw(raw: ExecutableRaw, config: Arc<ExecutorConfig>) -> Self {
        let status = if raw.status.is_in_flight() {
            ExecutionStatus::Ready
        } else {
            raw.status
        };
        Self {
            status,
            lost: raw.lost,
            result: raw.result,
            error: raw.error,
            ..Self::new(raw.statement, raw.database, config)
        }
    }
}

/// Serializable form of an executable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutableRaw {
    pub id: ExecutableId,
    pub statement: ParsedStatement,
    pub database: String,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub lost: bool,
    #[serde(default)]
    pub result: Option<StatementResult>,
    #[serde(default)]
    pub error: Option<String>,
}

//! Request and result types exchanged with execution backends.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::execution::ExecutableId;

/// Everything a backend needs to run one statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Executable this run belongs to.
    pub executable_id: ExecutableId,
    /// Run generation of the executable; completions echo it back.
    pub run_id: u64,
    /// Statement text with variables substituted.
    pub sql: String,
    /// Database resolved for the statement.
    pub database: String,
    pub connector: String,
    pub compute: String,
    pub namespace: String,
    /// Maximum number of rows to fetch.
    pub limit: u64,
    pub is_sql_engine: bool,
    pub is_optimizer_enabled: bool,
}

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Column data type.
    pub data_type: String,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Result of running one statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementResult {
    /// Column metadata for the result set.
    pub columns: Vec<ColumnInfo>,

    /// Rows of data.
    pub rows: Vec<Vec<serde_json::Value>>,

    /// Number of rows returned (after the limit was applied).
    pub row_count: usize,

    /// Whether the limit cut the result short.
    #[serde(default)]
    pub was_truncated: bool,

    /// Time the backend spent on the statement.
    #[serde(with = "duration_serde")]
    pub execution_time: Duration,
}

impl StatementResult {
    /// Creates an empty result (e.g. for DDL).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a result with the given columns and rows.
    pub fn with_data(columns: Vec<ColumnInfo>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            was_truncated: false,
            execution_time: Duration::ZERO,
        }
    }

    /// Sets the execution time.
    pub fn with_execution_time(mut self, duration: Duration) -> Self {
        self.execution_time = duration;
        self
    }

    /// Truncates the rows to `limit`, flagging the result when rows were dropped.
    pub fn apply_limit(mut self, limit: u64) -> Self {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        if self.rows.len() > limit {
            self.rows.truncate(limit);
            self.row_count = limit;
            self.was_truncated = true;
        }
        self
    }

    /// Returns true if the result set is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Serde support for Duration (not natively supported by serde).
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_nanos().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = u128::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos as u64))
    }
}

//! Mock execution backends for testing and the CLI's `--run` mode.

use super::{ColumnInfo, ExecutionBackend, ExecutionRequest, StatementResult};
use crate::error::{ExecutorError, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;

/// A mock backend that returns predefined results.
///
/// Row-returning statements (`SELECT`, `WITH`, `SHOW`, `VALUES`) yield a
/// single row echoing the statement; everything else yields an empty result.
#[derive(Debug, Default)]
pub struct MockBackend {
    delay: Duration,
    fail_marker: Option<String>,
    executed: Mutex<Vec<String>>,
}

impl MockBackend {
    /// Creates a mock backend that answers immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every statement by `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fails every statement whose text contains `marker`.
    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_marker = Some(marker.into());
        self
    }

    /// SQL of every statement executed so far, in execution order.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

fn returns_rows(sql: &str) -> bool {
    let first = sql
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase();
    matches!(first.as_str(), "SELECT" | "WITH" | "SHOW" | "VALUES")
}

#[async_trait]
impl ExecutionBackend for MockBackend {
    async fn execute(&self, request: &ExecutionRequest) -> Result<StatementResult> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.executed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.sql.clone());

        if let Some(marker) = &self.fail_marker {
            if request.sql.contains(marker.as_str()) {
                return Err(ExecutorError::execution(format!(
                    "Mock failure for: {}",
                    request.sql
                )));
            }
        }

        let result = if returns_rows(&request.sql) {
            StatementResult::with_data(
                vec![ColumnInfo::new("result", "text")],
                vec![vec![json!(format!("Mock result for: {}", request.sql))]],
            )
        } else {
            StatementResult::new()
        };

        Ok(result
            .with_execution_time(Duration::from_millis(1))
            .apply_limit(request.limit))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A backend whose every execution fails, for error-path tests.
#[derive(Debug, Default)]
pub struct FailingBackend {
    message: String,
}

impl FailingBackend {
    /// Creates a backend that fails with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl ExecutionBackend for FailingBackend {
    async fn execute(&self, _request: &ExecutionRequest) -> Result<StatementResult> {
        Err(ExecutorError::execution(self.message.clone()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

//! Execution backend abstraction.
//!
//! The executor never talks to a compute engine itself. A backend receives
//! one [`ExecutionRequest`] at a time and reports a [`StatementResult`] or an
//! error; the session races each call against the run's cancellation token.

mod mock;
mod types;

pub use mock::{FailingBackend, MockBackend};
pub use types::{ColumnInfo, ExecutionRequest, StatementResult};

use crate::error::Result;
use async_trait::async_trait;

/// Trait defining the interface for execution backends.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Executes one statement and returns its result.
    async fn execute(&self, request: &ExecutionRequest) -> Result<StatementResult>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "backend"
    }
}

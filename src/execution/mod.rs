//! Executable identity, lifecycle, chaining and synchronization.
//!
//! [`Executor`] keeps one [`Executable`] per statement of an editor buffer.
//! Every edit goes through [`Executor::update`], which synchronizes the
//! collection with fresh statement boundaries, cancels runs whose statement
//! disappeared, and re-chains the selection right before a run.

pub mod chain;
mod events;
mod executable;
mod executor;
pub mod sync;
pub mod variables;

pub use events::{ExecutorEvent, Notifier, DEFAULT_EVENT_CAPACITY};
pub use executable::{Executable, ExecutableId, ExecutableRaw, ExecutionStatus, RunTicket};
pub use executor::{Executor, ExecutorRaw, UpdateReport};
pub use sync::{synchronize, SynchronizationResult};

//! Actor that drives batch chains against an execution backend.
//!
//! The actor owns the [`Executor`], so every update, cancellation and run
//! completion is applied serially. Each running statement gets its own task
//! which races the backend call against the run's cancellation token. When a
//! statement succeeds its chain successor is started; when it fails the
//! rest of the chain is dropped.

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::backend::{ExecutionBackend, StatementResult};
use crate::config::{ExecutorConfig, SessionConfig};
use crate::error::{ExecutorError, Result};
use crate::execution::{ExecutableId, Executor, ExecutorEvent, ExecutorRaw, Notifier, RunTicket};
use crate::statement::StatementDetails;

/// Commands sent from the editor to the session actor.
#[derive(Debug)]
pub enum SessionCommand {
    /// Synchronize with the buffer after an edit.
    Update {
        details: StatementDetails,
        reply: oneshot::Sender<Option<ExecutableId>>,
    },
    /// Synchronize, chain the selection, and start its first statement.
    Execute {
        details: StatementDetails,
        reply: oneshot::Sender<Result<Option<ExecutableId>>>,
    },
    /// Cancel the chain containing an executable.
    Cancel(ExecutableId),
    /// Cancel every chain.
    CancelAll,
    /// Return the serializable state.
    Snapshot { reply: oneshot::Sender<ExecutorRaw> },
    /// Reply once no statement is running.
    WhenIdle { reply: oneshot::Sender<()> },
    /// Cancel everything and stop the actor.
    Shutdown,
}

/// Outcome of a run task, sent back to the actor.
#[derive(Debug)]
struct RunCompletion {
    id: ExecutableId,
    run_id: u64,
    outcome: Result<StatementResult>,
}

/// The session actor.
pub struct SessionActor {
    executor: Executor,
    backend: Arc<dyn ExecutionBackend>,
    receiver: mpsc::Receiver<SessionCommand>,
    completion_tx: mpsc::Sender<RunCompletion>,
    completion_rx: mpsc::Receiver<RunCompletion>,
    tracker: TaskTracker,
    idle_waiters: Vec<oneshot::Sender<()>>,
}

impl SessionActor {
    /// Creates a new actor and returns a handle for communication.
    pub fn spawn(
        config: ExecutorConfig,
        backend: Arc<dyn ExecutionBackend>,
        session: SessionConfig,
    ) -> (SessionHandle, Self) {
        let notifier = Notifier::new(session.event_capacity);
        let executor = Executor::with_notifier(config, notifier.clone());
        let (sender, receiver) = mpsc::channel(session.channel_capacity.max(1));
        let (completion_tx, completion_rx) = mpsc::channel(session.channel_capacity.max(1));

        let actor = Self {
            executor,
            backend,
            receiver,
            completion_tx,
            completion_rx,
            tracker: TaskTracker::new(),
            idle_waiters: Vec::new(),
        };

        let handle = SessionHandle { sender, notifier };

        (handle, actor)
    }

    /// Runs the actor loop until Shutdown is received or every handle is dropped.
    pub async fn run(mut self) {
        info!(
            "Session started ({} via {})",
            self.executor.config().display_string(),
            self.backend.name()
        );

        loop {
            tokio::select! {
                biased;

                cmd = self.receiver.recv() => {
                    match cmd {
                        Some(SessionCommand::Shutdown) | None => break,
                        Some(cmd) => self.handle_command(cmd),
                    }
                }

                Some(completion) = self.completion_rx.recv() => {
                    self.handle_completion(completion);
                }
            }

            self.wake_idle_waiters();
        }

        self.shutdown().await;
    }

    fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Update { details, reply } => {
                let first = self.executor.update(&details, false);
                let _ = reply.send(first);
            }
            SessionCommand::Execute { details, reply } => {
                let result = match self.executor.update(&details, true) {
                    Some(first) => self.start_run(first).map(|()| Some(first)),
                    None => Ok(None),
                };
                let _ = reply.send(result);
            }
            SessionCommand::Cancel(id) => {
                let cancelled = self.executor.cancel(id);
                debug!("Cancel {} stopped {} run(s)", id, cancelled.len());
            }
            SessionCommand::CancelAll => {
                let cancelled = self.executor.cancel_all();
                debug!("Cancel all stopped {} run(s)", cancelled.len());
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.executor.to_raw());
            }
            SessionCommand::WhenIdle { reply } => {
                self.idle_waiters.push(reply);
            }
            SessionCommand::Shutdown => {
                // Handled in run() loop
            }
        }
    }

    fn handle_completion(&mut self, completion: RunCompletion) {
        let RunCompletion {
            id,
            run_id,
            outcome,
        } = completion;

        let Some(next) = self.executor.complete(id, run_id, outcome) else {
            return;
        };

        if let Err(e) = self.start_run(next) {
            warn!("Could not continue chain at {}: {}", next, e);
            self.executor.cancel(next);
        }
    }

    /// Starts `id` and spawns the task that runs it.
    fn start_run(&mut self, id: ExecutableId) -> Result<()> {
        let RunTicket {
            id,
            run_id,
            cancel,
            request,
        } = self.executor.start(id)?;
        let backend = Arc::clone(&self.backend);
        let completion_tx = self.completion_tx.clone();

        self.tracker.spawn(async move {
            let outcome = tokio::select! {
                biased;

                _ = cancel.cancelled() => None,
                result = backend.execute(&request) => Some(result),
            };

            match outcome {
                Some(outcome) => {
                    let _ = completion_tx
                        .send(RunCompletion {
                            id,
                            run_id,
                            outcome,
                        })
                        .await;
                }
                None => debug!("Run {} of {} cancelled before completion", run_id, id),
            }
        });

        Ok(())
    }

    fn is_idle(&self) -> bool {
        !self
            .executor
            .executables()
            .iter()
            .any(|e| e.status().is_in_flight())
    }

    fn wake_idle_waiters(&mut self) {
        if self.idle_waiters.is_empty() || !self.is_idle() {
            return;
        }
        for waiter in self.idle_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    /// Cancels everything and waits for run tasks to finish.
    async fn shutdown(&mut self) {
        let cancelled = self.executor.cancel_all();
        info!("Session shutting down, cancelled {} run(s)", cancelled.len());

        self.tracker.close();
        loop {
            tokio::select! {
                _ = self.tracker.wait() => break,
                // Keep draining so no task blocks on a full completion channel
                Some(_) = self.completion_rx.recv() => {}
            }
        }

        for waiter in self.idle_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }
}

/// Handle for communicating with the session actor.
///
/// This is a lightweight, cloneable handle; executor events are available
/// through [`SessionHandle::subscribe`].
#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionCommand>,
    notifier: Notifier,
}

impl SessionHandle {
    async fn send(&self, cmd: SessionCommand) -> Result<()> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| ExecutorError::internal("Session actor closed"))
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply)).await?;
        rx.await
            .map_err(|_| ExecutorError::internal("Session actor dropped the reply"))
    }

    /// Synchronizes with the buffer; returns the first selected executable.
    pub async fn update(&self, details: StatementDetails) -> Result<Option<ExecutableId>> {
        self.request(|reply| SessionCommand::Update { details, reply })
            .await
    }

    /// Runs the selection; returns the executable that started first.
    pub async fn execute(&self, details: StatementDetails) -> Result<Option<ExecutableId>> {
        self.request(|reply| SessionCommand::Execute { details, reply })
            .await?
    }

    /// Cancels the chain containing `id`.
    pub async fn cancel(&self, id: ExecutableId) -> Result<()> {
        self.send(SessionCommand::Cancel(id)).await
    }

    /// Cancels every chain.
    pub async fn cancel_all(&self) -> Result<()> {
        self.send(SessionCommand::CancelAll).await
    }

    /// Returns the serializable executor state.
    pub async fn snapshot(&self) -> Result<ExecutorRaw> {
        self.request(|reply| SessionCommand::Snapshot { reply })
            .await
    }

    /// Resolves once no statement is running.
    pub async fn when_idle(&self) -> Result<()> {
        self.request(|reply| SessionCommand::WhenIdle { reply })
            .await
    }

    /// Subscribes to executor events.
    pub fn subscribe(&self) -> broadcast::Receiver<ExecutorEvent> {
        self.notifier.subscribe()
    }

    /// Gracefully shuts down the actor.
    pub async fn close(&self) -> Result<()> {
        self.send(SessionCommand::Shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FailingBackend, MockBackend};
    use crate::execution::ExecutionStatus;
    use crate::statement::{SelectionMode, StatementSplitter};
    use std::time::Duration;
    use tokio::time::timeout;

    fn script(sql: &str, selection: SelectionMode) -> StatementDetails {
        StatementSplitter::new("postgresql")
            .unwrap()
            .details(sql, None, selection)
            .unwrap()
    }

    fn create_test_session(
        backend: Arc<dyn ExecutionBackend>,
    ) -> (SessionHandle, tokio::task::JoinHandle<()>) {
        let (handle, actor) =
            SessionActor::spawn(ExecutorConfig::default(), backend, SessionConfig::default());
        (handle, tokio::spawn(actor.run()))
    }

    #[tokio::test]
    async fn test_execute_runs_chain_in_order() {
        let backend = Arc::new(MockBackend::new());
        let (handle, actor) = create_test_session(backend.clone());

        let first = handle
            .execute(script("SELECT 1; SELECT 2; SELECT 3", SelectionMode::All))
            .await
            .unwrap();
        assert!(first.is_some());

        timeout(Duration::from_secs(1), handle.when_idle())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(backend.executed(), vec!["SELECT 1", "SELECT 2", "SELECT 3"]);
        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot
            .executables
            .iter()
            .all(|e| e.status == ExecutionStatus::Success));

        handle.close().await.unwrap();
        actor.await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_with_nothing_selected() {
        let (handle, actor) = create_test_session(Arc::new(MockBackend::new()));

        let first = handle
            .execute(script("SELECT 1", SelectionMode::Active))
            .await
            .unwrap();
        assert_eq!(first, None);

        handle.close().await.unwrap();
        actor.await.unwrap();
    }

    #[tokio::test]
    async fn test_failure_stops_chain() {
        let backend = Arc::new(MockBackend::new().failing_on("broken"));
        let (handle, actor) = create_test_session(backend.clone());

        handle
            .execute(script(
                "SELECT 1; SELECT * FROM broken; SELECT 3",
                SelectionMode::All,
            ))
            .await
            .unwrap();
        timeout(Duration::from_secs(1), handle.when_idle())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(backend.executed(), vec!["SELECT 1", "SELECT * FROM broken"]);
        let statuses: Vec<ExecutionStatus> = handle
            .snapshot()
            .await
            .unwrap()
            .executables
            .iter()
            .map(|e| e.status)
            .collect();
        assert_eq!(
            statuses,
            vec![
                ExecutionStatus::Success,
                ExecutionStatus::Failed,
                ExecutionStatus::Ready
            ]
        );

        handle.close().await.unwrap();
        actor.await.unwrap();
    }

    #[tokio::test]
    async fn test_failing_backend_records_error() {
        let (handle, actor) =
            create_test_session(Arc::new(FailingBackend::new("connection refused")));

        handle
            .execute(script("SELECT 1", SelectionMode::All))
            .await
            .unwrap();
        handle.when_idle().await.unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.executables[0].status, ExecutionStatus::Failed);
        assert_eq!(
            snapshot.executables[0].error.as_deref(),
            Some("Execution error: connection refused")
        );

        handle.close().await.unwrap();
        actor.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_stops_running_chain() {
        let backend = Arc::new(MockBackend::new().with_delay(Duration::from_secs(30)));
        let (handle, actor) = create_test_session(backend.clone());

        let first = handle
            .execute(script("SELECT 1; SELECT 2", SelectionMode::All))
            .await
            .unwrap()
            .unwrap();
        handle.cancel(first).await.unwrap();
        timeout(Duration::from_secs(1), handle.when_idle())
            .await
            .unwrap()
            .unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.executables[0].status, ExecutionStatus::Canceled);
        assert_eq!(snapshot.executables[1].status, ExecutionStatus::Ready);
        assert!(backend.executed().is_empty());

        handle.close().await.unwrap();
        actor.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_cancels_runs() {
        let backend = Arc::new(MockBackend::new().with_delay(Duration::from_secs(30)));
        let (handle, actor) = create_test_session(backend);

        handle
            .execute(script("SELECT 1", SelectionMode::All))
            .await
            .unwrap();
        handle.close().await.unwrap();

        timeout(Duration::from_secs(1), actor).await.unwrap().unwrap();
        assert!(handle.snapshot().await.is_err());
    }
}

//! The coordinator that owns an editor's executables.
//!
//! All methods take `&mut self` and are expected to be called serially from
//! the editor's event pipeline (or the session actor); the executor itself
//! never spawns or awaits anything.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::chain::{cancel_chain, link_sequential, repair_links};
use super::events::{ExecutorEvent, Notifier};
use super::executable::{Executable, ExecutableId, ExecutableRaw, ExecutionStatus, RunTicket};
use super::sync::{synchronize, SynchronizationResult};
use crate::backend::StatementResult;
use crate::config::ExecutorConfig;
use crate::error::{ExecutorError, Result};
use crate::statement::StatementDetails;

/// Serializable form of the executor, in collection order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorRaw {
    pub executables: Vec<ExecutableRaw>,
}

/// Everything an update changed.
#[derive(Debug, Default)]
pub struct UpdateReport {
    /// First selected executable; what the caller runs first.
    pub first_selected: Option<ExecutableId>,
    /// All selected executables, in statement order.
    pub selected: Vec<ExecutableId>,
    /// Kept executables whose text or database changed.
    pub edited: Vec<ExecutableId>,
    /// Executables that left the collection, already marked lost and cancelled.
    pub lost: Vec<Executable>,
    /// Executables whose in-flight runs this update cancelled.
    pub cancelled: Vec<ExecutableId>,
}

/// Coordinates executables for one editor session.
#[derive(Debug)]
pub struct Executor {
    config: Arc<ExecutorConfig>,
    executables: Vec<Executable>,
    active: Option<ExecutableId>,
    notifier: Notifier,
}

impl Executor {
    /// Creates an executor with no executables.
    pub fn new(config: ExecutorConfig) -> Self {
        Self::with_notifier(config, Notifier::default())
    }

    /// Creates an executor publishing on the given notifier.
    pub fn with_notifier(config: ExecutorConfig, notifier: Notifier) -> Self {
        Self {
            config: Arc::new(config),
            executables: Vec::new(),
            active: None,
            notifier,
        }
    }

    pub fn config(&self) -> &Arc<ExecutorConfig> {
        &self.config
    }

    /// The tracked executables, in statement order.
    pub fn executables(&self) -> &[Executable] {
        &self.executables
    }

    pub fn executable(&self, id: ExecutableId) -> Option<&Executable> {
        self.executables.iter().find(|e| e.id() == id)
    }

    fn executable_mut(&mut self, id: ExecutableId) -> Option<&mut Executable> {
        self.executables.iter_mut().find(|e| e.id() == id)
    }

    /// Id of the executable under the cursor.
    pub fn active(&self) -> Option<ExecutableId> {
        self.active
    }

    pub fn active_executable(&self) -> Option<&Executable> {
        self.active.and_then(|id| self.executable(id))
    }

    /// Subscribes to executor events.
    pub fn subscribe(&self) -> broadcast::Receiver<ExecutorEvent> {
        self.notifier.subscribe()
    }

    fn notify_all(&self) {
        for executable in &self.executables {
            executable.notify(&self.notifier);
        }
    }

    fn notify_one(&self, id: ExecutableId) {
        if let Some(executable) = self.executable(id) {
            executable.notify(&self.notifier);
        }
    }

    fn publish_collection(&self) {
        self.notifier.publish(ExecutorEvent::CollectionReplaced {
            ids: self.executables.iter().map(|e| e.id()).collect(),
            active: self.active,
        });
    }

    /// Cancels every chain in the current collection.
    fn cancel_every_chain(&mut self) -> Vec<ExecutableId> {
        let ids: Vec<ExecutableId> = self.executables.iter().map(|e| e.id()).collect();
        let mut cancelled = Vec::new();
        for id in ids {
            cancelled.extend(cancel_chain(&mut self.executables, id));
        }
        cancelled
    }

    /// Cancels the chain containing `id`. Returns the ids whose runs were cancelled.
    pub fn cancel(&mut self, id: ExecutableId) -> Vec<ExecutableId> {
        let cancelled = cancel_chain(&mut self.executables, id);
        self.notify_all();
        cancelled
    }

    /// Cancels every chain and every in-flight run.
    pub fn cancel_all(&mut self) -> Vec<ExecutableId> {
        let cancelled = self.cancel_every_chain();
        self.notify_all();
        cancelled
    }

    /// Replaces the tracked collection wholesale.
    ///
    /// Every chain in the current collection is cancelled before the swap,
    /// so no run from the old collection keeps going. Broken links inside
    /// `next` are cleared.
    pub fn replace_executables(&mut self, next: Vec<Executable>) {
        let cancelled = self.cancel_every_chain();
        if !cancelled.is_empty() {
            info!("Cancelled {} run(s) before replacing executables", cancelled.len());
        }

        let mut next = next;
        let repaired = repair_links(&mut next);
        if repaired > 0 {
            warn!("Cleared {} broken chain link(s) in replacement executables", repaired);
        }

        self.active = self
            .active
            .filter(|active| next.iter().any(|e| e.id() == *active));
        self.executables = next;

        self.notify_all();
        self.publish_collection();
    }

    /// Synchronizes with the given statements and returns the first selected
    /// executable.
    ///
    /// With `is_pre_run`, the selected executables are re-chained for an
    /// imminent run, after cancelling any chain they were part of.
    pub fn update(&mut self, details: &StatementDetails, is_pre_run: bool) -> Option<ExecutableId> {
        self.update_with_report(details, is_pre_run).first_selected
    }

    /// Like [`Executor::update`], but also hands back the lost executables
    /// and what changed.
    pub fn update_with_report(
        &mut self,
        details: &StatementDetails,
        is_pre_run: bool,
    ) -> UpdateReport {
        let previous = std::mem::take(&mut self.executables);
        let SynchronizationResult {
            mut all,
            lost,
            edited,
            selected,
            active,
        } = synchronize(previous, details, &self.config);

        // Lost executables join the collection only for as long as it takes
        // to cancel their chains, which may reach kept executables.
        let kept = all.len();
        all.extend(lost);
        let mut cancelled = Vec::new();
        for at in kept..all.len() {
            all[at].mark_lost();
            let id = all[at].id();
            cancelled.extend(cancel_chain(&mut all, id));
        }
        let lost = all.split_off(kept);

        if is_pre_run {
            for id in &selected {
                cancelled.extend(cancel_chain(&mut all, *id));
            }
            link_sequential(&mut all, &selected);
        }

        self.active = active;
        self.executables = all;

        for executable in &lost {
            executable.notify(&self.notifier);
            self.notifier.publish(ExecutorEvent::Lost {
                id: executable.id(),
            });
        }
        self.notify_all();
        self.publish_collection();

        debug!(
            "Update: {} executable(s), {} selected, {} lost, {} cancelled, pre-run: {}",
            self.executables.len(),
            selected.len(),
            lost.len(),
            cancelled.len(),
            is_pre_run
        );

        UpdateReport {
            first_selected: selected.first().copied(),
            selected,
            edited,
            lost,
            cancelled,
        }
    }

    /// Starts a run of `id` and returns the ticket for the runner.
    pub fn start(&mut self, id: ExecutableId) -> Result<RunTicket> {
        let executable = self
            .executable_mut(id)
            .ok_or_else(|| ExecutorError::invalid_state(format!("executable {id} is not tracked")))?;
        let ticket = executable.start()?;
        info!("Started executable {} (run {})", id, ticket.run_id);
        self.notify_one(id);
        Ok(ticket)
    }

    /// Marks a running run as streaming results.
    pub fn mark_streaming(&mut self, id: ExecutableId, run_id: u64) -> bool {
        let changed = self
            .executable_mut(id)
            .is_some_and(|executable| executable.mark_streaming(run_id));
        if changed {
            self.notify_one(id);
        }
        changed
    }

    /// Records a run's outcome and returns the chain successor to run next.
    ///
    /// A failed run cancels the rest of its chain. Outcomes for executables
    /// that are gone, cancelled, or re-run since are discarded. A run whose
    /// statement was edited meanwhile still advances its chain, but the
    /// executable is left `Ready` without the outdated outcome.
    pub fn complete(
        &mut self,
        id: ExecutableId,
        run_id: u64,
        outcome: Result<StatementResult>,
    ) -> Option<ExecutableId> {
        let Some(executable) = self.executable_mut(id) else {
            debug!("Discarding completion for untracked executable {}", id);
            return None;
        };
        let succeeded = outcome.is_ok();
        if !executable.complete(run_id, outcome) {
            debug!("Discarding stale completion for executable {} (run {})", id, run_id);
            return None;
        }
        let next = executable.next();
        if executable.status() == ExecutionStatus::Ready {
            debug!("Executable {} was edited during run {}, outcome dropped", id, run_id);
        }

        if succeeded {
            info!("Executable {} succeeded", id);
            self.notify_one(id);
            next
        } else {
            warn!("Executable {} failed, dropping the rest of its chain", id);
            cancel_chain(&mut self.executables, id);
            self.notify_all();
            None
        }
    }

    /// Plain, order-preserving representation for persistence.
    pub fn to_raw(&self) -> ExecutorRaw {
        ExecutorRaw {
            executables: self.executables.iter().map(|e| e.to_raw()).collect(),
        }
    }

    /// Rebuilds the collection from its raw form.
    pub fn restore(&mut self, raw: ExecutorRaw) {
        let next = raw
            .executables
            .into_iter()
            .map(|raw| Executable::from_raw(raw, Arc::clone(&self.config)))
            .collect();
        self.replace_executables(next);
    }
}

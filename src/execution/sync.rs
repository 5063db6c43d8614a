//! Synchronizing executables with statement boundaries.
//!
//! Matching runs in two passes:
//!
//! 1. **Exact.** A statement keeps the executable whose text is identical.
//!    When several previous executables share the text, the one whose old
//!    index is closest to the statement's new index wins (lower index on a
//!    tie); the others stay unmatched.
//! 2. **Positional.** A statement without an exact match may adopt an
//!    unmatched executable that sat between the same two exact matches
//!    before the edit. That is how an executable follows a statement while
//!    the user types in it. Only one statement can adopt a given
//!    executable, so a statement split in two keeps one executable and gets
//!    one new one.
//!
//! Previous executables left unmatched are lost.

use std::sync::Arc;
use tracing::debug;

use super::executable::{Executable, ExecutableId};
use crate::config::ExecutorConfig;
use crate::statement::StatementDetails;

/// How a statement was paired with a previous executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementMatch {
    /// Same text; `0` is the index in the previous collection.
    Exact(usize),
    /// Edited in place; `0` is the index in the previous collection.
    Adopted(usize),
}

impl StatementMatch {
    pub fn previous_index(&self) -> usize {
        match self {
            Self::Exact(index) | Self::Adopted(index) => *index,
        }
    }
}

/// Pairs each new statement text with at most one previous text.
pub fn match_statements(previous: &[&str], current: &[&str]) -> Vec<Option<StatementMatch>> {
    let mut claimed = vec![false; previous.len()];
    let mut matches: Vec<Option<StatementMatch>> = vec![None; current.len()];

    for (i, text) in current.iter().enumerate() {
        let best = previous
            .iter()
            .enumerate()
            .filter(|(j, candidate)| !claimed[*j] && *candidate == text)
            .min_by_key(|(j, _)| (i.abs_diff(*j), *j))
            .map(|(j, _)| j);
        if let Some(j) = best {
            claimed[j] = true;
            matches[i] = Some(StatementMatch::Exact(j));
        }
    }

    let exact_anchor = |m: &Option<StatementMatch>| match m {
        Some(StatementMatch::Exact(j)) => Some(*j),
        _ => None,
    };

    for i in 0..current.len() {
        if matches[i].is_some() {
            continue;
        }
        let lower = matches[..i].iter().rev().find_map(exact_anchor);
        let upper = matches[i + 1..].iter().find_map(exact_anchor);
        let low = lower.map_or(0, |j| j + 1);
        let high = upper.unwrap_or(previous.len());
        if let Some(j) = (low..high).find(|j| !claimed[*j]) {
            claimed[j] = true;
            matches[i] = Some(StatementMatch::Adopted(j));
        }
    }

    matches
}

/// Outcome of one synchronization.
#[derive(Debug, Default)]
pub struct SynchronizationResult {
    /// The new collection, in statement order.
    pub all: Vec<Executable>,
    /// Previous executables that no longer match any statement.
    pub lost: Vec<Executable>,
    /// Kept executables whose text or database changed.
    pub edited: Vec<ExecutableId>,
    /// Executables to run next, in statement order.
    pub selected: Vec<ExecutableId>,
    /// Executable under the cursor.
    pub active: Option<ExecutableId>,
}

/// Rebuilds the executable collection for the given statements.
///
/// Takes ownership of the previous collection; every executable ends up in
/// exactly one of `all` or `lost`.
pub fn synchronize(
    previous: Vec<Executable>,
    details: &StatementDetails,
    config: &Arc<ExecutorConfig>,
) -> SynchronizationResult {
    let matches = {
        let previous_texts: Vec<&str> = previous
            .iter()
            .map(|e| e.statement().statement.as_str())
            .collect();
        let current_texts: Vec<&str> = details
            .statements
            .iter()
            .map(|s| s.statement.as_str())
            .collect();
        match_statements(&previous_texts, &current_texts)
    };

    let mut slots: Vec<Option<Executable>> = previous.into_iter().map(Some).collect();
    let mut all = Vec::with_capacity(details.statements.len());
    let mut edited = Vec::new();
    let mut active_database = config.database.clone();

    for (statement, matched) in details.statements.iter().zip(matches) {
        if let Some(database) = statement.used_database() {
            active_database = database;
        }
        let database = statement
            .database
            .clone()
            .unwrap_or_else(|| active_database.clone());

        let kept = matched.and_then(|m| slots[m.previous_index()].take());
        let executable = match kept {
            Some(mut executable) => {
                if executable.update_statement(statement.clone(), database) {
                    edited.push(executable.id());
                }
                executable
            }
            None => Executable::new(statement.clone(), database, Arc::clone(config)),
        };
        all.push(executable);
    }

    let lost: Vec<Executable> = slots.into_iter().flatten().collect();
    let active = details.active_index().map(|index| all[index].id());
    let selected = details
        .selected_indices()
        .into_iter()
        .map(|index| all[index].id())
        .collect();

    debug!(
        "Synchronized {} statement(s): {} edited, {} lost",
        all.len(),
        edited.len(),
        lost.len()
    );

    SynchronizationResult {
        all,
        lost,
        edited,
        selected,
        active,
    }
}

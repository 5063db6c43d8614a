//! Batch chains.
//!
//! A chain is a simple path of executables linked through their
//! `previous`/`next` ids. Running a selection walks the chain forward;
//! cancelling any member cancels the whole chain. Links are always written
//! in pairs, so `a.next == Some(b)` holds exactly when `b.previous == Some(a)`.

use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use super::executable::{Executable, ExecutableId};

fn index_by_id(units: &[Executable]) -> HashMap<ExecutableId, usize> {
    units
        .iter()
        .enumerate()
        .map(|(index, unit)| (unit.id(), index))
        .collect()
}

/// Removes a unit from whatever chain it is in, clearing the neighbours'
/// back-pointers too.
fn detach(units: &mut [Executable], index: &HashMap<ExecutableId, usize>, at: usize) {
    let id = units[at].id();

    if let Some(previous) = units[at].previous() {
        if let Some(&p) = index.get(&previous) {
            if units[p].next() == Some(id) {
                units[p].set_next(None);
            }
        }
        units[at].set_previous(None);
    }

    if let Some(next) = units[at].next() {
        if let Some(&n) = index.get(&next) {
            if units[n].previous() == Some(id) {
                units[n].set_previous(None);
            }
        }
        units[at].set_next(None);
    }
}

/// Indices of every unit reachable from `start` through chain links.
fn chain_members(
    units: &[Executable],
    index: &HashMap<ExecutableId, usize>,
    start: usize,
) -> Vec<usize> {
    let mut visited = HashSet::from([start]);
    let mut members = vec![start];

    let mut cursor = start;
    while let Some(&previous) = units[cursor].previous().and_then(|id| index.get(&id)) {
        if !visited.insert(previous) {
            break;
        }
        members.push(previous);
        cursor = previous;
    }

    let mut cursor = start;
    while let Some(&next) = units[cursor].next().and_then(|id| index.get(&id)) {
        if !visited.insert(next) {
            break;
        }
        members.push(next);
        cursor = next;
    }

    members
}

/// Links `ids` into one chain in the given order.
///
/// Every listed unit is first detached from any chain it belonged to, so no
/// pointer into a stale chain survives. Unknown and repeated ids are skipped.
/// Calling this twice with the same ids yields the same links.
///
/// In-flight runs in the old chains are not cancelled here; callers cancel
/// those chains first.
pub fn link_sequential(units: &mut [Executable], ids: &[ExecutableId]) {
    let index = index_by_id(units);
    let mut seen = HashSet::new();
    let chain: Vec<usize> = ids
        .iter()
        .filter_map(|id| index.get(id).copied())
        .filter(|at| seen.insert(*at))
        .collect();

    for &at in &chain {
        detach(units, &index, at);
    }

    for pair in chain.windows(2) {
        let (first, second) = (pair[0], pair[1]);
        let (first_id, second_id) = (units[first].id(), units[second].id());
        units[first].set_next(Some(second_id));
        units[second].set_previous(Some(first_id));
    }

    debug!("Linked chain of {} executable(s)", chain.len());
}

/// Cancels the chain containing `start`.
///
/// Every in-flight member is cancelled and every link in the chain is
/// cleared. Returns the ids whose runs were actually cancelled. Unknown ids,
/// finished units and already-cancelled chains are no-ops.
pub fn cancel_chain(units: &mut [Executable], start: ExecutableId) -> Vec<ExecutableId> {
    let index = index_by_id(units);
    let Some(&at) = index.get(&start) else {
        return Vec::new();
    };

    let members = chain_members(units, &index, at);

    let mut cancelled = Vec::new();
    for &member in &members {
        if units[member].cancel() {
            cancelled.push(units[member].id());
        }
    }

    for &member in &members {
        detach(units, &index, member);
    }

    if !cancelled.is_empty() {
        info!(
            "Cancelled {} run(s) in chain of {}",
            cancelled.len(),
            start
        );
    }

    cancelled
}

/// Clears links that break the path invariant: links to ids outside
/// `units`, one-sided links, and cycles. Returns how many link pointers
/// were cleared.
pub fn repair_links(units: &mut [Executable]) -> usize {
    let index = index_by_id(units);
    let mut cleared = 0;

    for at in 0..units.len() {
        let id = units[at].id();

        if let Some(previous) = units[at].previous() {
            let paired = index
                .get(&previous)
                .is_some_and(|&p| p != at && units[p].next() == Some(id));
            if !paired {
                units[at].set_previous(None);
                cleared += 1;
            }
        }

        if let Some(next) = units[at].next() {
            let paired = index
                .get(&next)
                .is_some_and(|&n| n != at && units[n].previous() == Some(id));
            if !paired {
                units[at].set_next(None);
                cleared += 1;
            }
        }
    }

    // Links are now pairwise consistent, so every chain is a path or a cycle.
    // Paths are reachable from a head; anything left over is a cycle.
    let mut on_path = vec![false; units.len()];
    for head in 0..units.len() {
        if units[head].previous().is_some() {
            continue;
        }
        let mut cursor = Some(head);
        while let Some(at) = cursor {
            on_path[at] = true;
            cursor = units[at].next().and_then(|id| index.get(&id).copied());
        }
    }

    for at in 0..units.len() {
        if on_path[at] {
            continue;
        }
        let Some(previous) = units[at].previous().and_then(|id| index.get(&id).copied()) else {
            continue;
        };
        units[previous].set_next(None);
        units[at].set_previous(None);
        cleared += 2;

        let mut cursor = Some(at);
        while let Some(member) = cursor {
            if on_path[member] {
                break;
            }
            on_path[member] = true;
            cursor = units[member].next().and_then(|id| index.get(&id).copied());
        }
    }

    cleared
}

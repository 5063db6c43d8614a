//! Editing scenarios driven through the statement splitter.
//!
//! Each test feeds successive versions of a script to the executor, the way
//! an editor does after every keystroke.

use glance_executor::config::ExecutorConfig;
use glance_executor::execution::{ExecutableId, ExecutionStatus, Executor, ExecutorRaw};
use glance_executor::statement::{Position, SelectionMode, StatementDetails, StatementSplitter};
use pretty_assertions::assert_eq;

fn details(sql: &str) -> StatementDetails {
    StatementSplitter::new("postgresql")
        .unwrap()
        .details(sql, None, SelectionMode::Active)
        .unwrap()
}

fn ids(executor: &Executor) -> Vec<ExecutableId> {
    executor.executables().iter().map(|e| e.id()).collect()
}

fn texts(executor: &Executor) -> Vec<String> {
    executor
        .executables()
        .iter()
        .map(|e| e.statement().statement.clone())
        .collect()
}

#[test]
fn test_typing_inside_a_statement_keeps_every_id() {
    let mut executor = Executor::new(ExecutorConfig::default());
    executor.update(&details("SELECT 1;\nSELECT 2;\nSELECT 3;"), false);
    let before = ids(&executor);

    let report = executor.update_with_report(&details("SELECT 1;\nSELECT 2 + 2;\nSELECT 3;"), false);

    assert_eq!(ids(&executor), before);
    assert_eq!(report.edited, vec![before[1]]);
    assert!(report.lost.is_empty());
    assert_eq!(texts(&executor), vec!["SELECT 1", "SELECT 2 + 2", "SELECT 3"]);
}

#[test]
fn test_appending_a_statement_creates_one_executable() {
    let mut executor = Executor::new(ExecutorConfig::default());
    executor.update(&details("SELECT 1;\nSELECT 2;"), false);
    let before = ids(&executor);

    executor.update(&details("SELECT 1;\nSELECT 2;\nSELECT 3;"), false);
    let after = ids(&executor);

    assert_eq!(after.len(), 3);
    assert_eq!(after[..2], before[..]);
    assert!(!before.contains(&after[2]));
}

#[test]
fn test_splitting_a_statement_keeps_one_id() {
    let mut executor = Executor::new(ExecutorConfig::default());
    executor.update(&details("SELECT 1 SELECT 2"), false);
    let before = ids(&executor);

    executor.update(&details("SELECT 1; SELECT 2"), false);
    let after = ids(&executor);

    assert_eq!(after.len(), 2);
    assert_eq!(after[0], before[0]);
    assert_ne!(after[1], before[0]);
}

#[test]
fn test_deleting_a_running_statement_cancels_its_chain() {
    let mut executor = Executor::new(ExecutorConfig::default());
    let sql = "SELECT 1;\nSELECT 2;\nSELECT 3;";
    let run_all = details(sql).with_selection(SelectionMode::All);
    let first = executor.update(&run_all, true).unwrap();
    let before = ids(&executor);
    let ticket = executor.start(first).unwrap();

    let report = executor.update_with_report(&details("SELECT 1;\nSELECT 3;"), false);

    assert_eq!(ids(&executor), vec![before[0], before[2]]);
    assert_eq!(report.lost.len(), 1);
    assert_eq!(report.lost[0].id(), before[1]);
    assert!(report.lost[0].is_lost());
    assert_eq!(report.cancelled, vec![before[0]]);
    assert!(ticket.cancel.is_cancelled());
    for executable in executor.executables() {
        assert_eq!(executable.previous(), None);
        assert_eq!(executable.next(), None);
    }
}

#[test]
fn test_cursor_picks_the_active_statement() {
    let mut executor = Executor::new(ExecutorConfig::default());
    let sql = "SELECT 1;\nSELECT 2;\nSELECT 3;";

    let first = executor.update(&details(sql).with_cursor(Position::new(2, 4)), false);

    let all = ids(&executor);
    assert_eq!(first, Some(all[1]));
    assert_eq!(executor.active(), Some(all[1]));
    assert_eq!(
        executor.active_executable().unwrap().statement().statement,
        "SELECT 2"
    );
}

#[test]
fn test_range_selection_is_chained_in_order() {
    let mut executor = Executor::new(ExecutorConfig::default());
    let sql = "SELECT 1;\nSELECT 2;\nSELECT 3;";
    let range = details(sql).with_selection(SelectionMode::Range {
        start: Position::new(1, 3),
        end: Position::new(2, 2),
    });

    let first = executor.update(&range, true);

    let all = ids(&executor);
    assert_eq!(first, Some(all[0]));
    let links: Vec<_> = executor
        .executables()
        .iter()
        .map(|e| (e.previous(), e.next()))
        .collect();
    assert_eq!(
        links,
        vec![(None, Some(all[1])), (Some(all[0]), None), (None, None)]
    );
}

#[test]
fn test_cancelling_the_middle_stops_the_whole_chain() {
    let mut executor = Executor::new(ExecutorConfig::default());
    let run_all = details("SELECT 1;\nSELECT 2;\nSELECT 3;").with_selection(SelectionMode::All);
    executor.update(&run_all, true);
    let all = ids(&executor);
    let tickets: Vec<_> = all.iter().map(|id| executor.start(*id).unwrap()).collect();

    let cancelled = executor.cancel(all[1]);

    assert_eq!(cancelled.len(), 3);
    assert!(tickets.iter().all(|t| t.cancel.is_cancelled()));
    assert!(executor
        .executables()
        .iter()
        .all(|e| e.status() == ExecutionStatus::Canceled));
}

#[test]
fn test_use_statement_sets_database_for_what_follows() {
    let mut executor = Executor::new(ExecutorConfig::default());
    executor.update(&details("SELECT 1;\nUSE sales;\nSELECT 2;"), false);

    let databases: Vec<&str> = executor
        .executables()
        .iter()
        .map(|e| e.database())
        .collect();
    assert_eq!(databases, vec!["default", "sales", "sales"]);
}

#[test]
fn test_clearing_the_script_loses_everything() {
    let mut executor = Executor::new(ExecutorConfig::default());
    executor.update(&details("SELECT 1;\nSELECT 2;").with_cursor(Position::new(1, 1)), false);

    let report = executor.update_with_report(&details("  -- nothing here\n"), false);

    assert!(executor.executables().is_empty());
    assert_eq!(executor.active(), None);
    assert_eq!(report.lost.len(), 2);
    assert_eq!(report.first_selected, None);
}

#[test]
fn test_snapshot_survives_json() {
    let mut executor = Executor::new(ExecutorConfig::default());
    executor.update(&details("SELECT 1;\nUSE sales;\nSELECT 2;"), false);

    let json = serde_json::to_string(&executor.to_raw()).unwrap();
    let raw: ExecutorRaw = serde_json::from_str(&json).unwrap();

    let mut restored = Executor::new(ExecutorConfig::default());
    restored.restore(raw);

    assert_eq!(texts(&restored), texts(&executor));
    assert_eq!(restored.executables()[2].database(), "sales");
}

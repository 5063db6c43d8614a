//! Session actor tests: running, editing and cancelling batch chains.

use glance_executor::backend::MockBackend;
use glance_executor::config::{ExecutorConfig, SessionConfig};
use glance_executor::execution::{ExecutionStatus, ExecutorEvent};
use glance_executor::session::{SessionActor, SessionHandle};
use glance_executor::statement::{Position, SelectionMode, StatementDetails, StatementSplitter};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_test::assert_ok;

fn details(sql: &str, selection: SelectionMode) -> StatementDetails {
    StatementSplitter::new("postgresql")
        .unwrap()
        .details(sql, None, selection)
        .unwrap()
}

fn start_session(
    config: ExecutorConfig,
    backend: Arc<MockBackend>,
) -> (SessionHandle, JoinHandle<()>) {
    let (handle, actor) = SessionActor::spawn(config, backend, SessionConfig::default());
    (handle, tokio::spawn(actor.run()))
}

async fn wait_idle(handle: &SessionHandle) {
    assert_ok!(timeout(Duration::from_secs(2), handle.when_idle()).await.unwrap());
}

#[tokio::test]
async fn test_run_all_executes_in_statement_order() {
    let backend = Arc::new(MockBackend::new().with_delay(Duration::from_millis(5)));
    let (handle, session) = start_session(ExecutorConfig::default(), backend.clone());

    let sql = "CREATE TABLE t (id int);\nINSERT INTO t VALUES (1);\nSELECT * FROM t;";
    assert_ok!(handle.execute(details(sql, SelectionMode::All)).await);
    wait_idle(&handle).await;

    assert_eq!(
        backend.executed(),
        vec![
            "CREATE TABLE t (id int)",
            "INSERT INTO t VALUES (1)",
            "SELECT * FROM t"
        ]
    );
    let snapshot = handle.snapshot().await.unwrap();
    let rows: Vec<Option<usize>> = snapshot
        .executables
        .iter()
        .map(|e| e.result.as_ref().map(|r| r.rows.len()))
        .collect();
    assert_eq!(rows, vec![Some(0), Some(0), Some(1)]);

    handle.close().await.unwrap();
    session.await.unwrap();
}

#[tokio::test]
async fn test_run_active_only_runs_statement_under_cursor() {
    let backend = Arc::new(MockBackend::new());
    let (handle, session) = start_session(ExecutorConfig::default(), backend.clone());

    let d = details("SELECT 1;\nSELECT 2;", SelectionMode::Active).with_cursor(Position::new(2, 1));
    assert_ok!(handle.execute(d).await);
    wait_idle(&handle).await;

    assert_eq!(backend.executed(), vec!["SELECT 2"]);

    handle.close().await.unwrap();
    session.await.unwrap();
}

#[tokio::test]
async fn test_variables_and_use_reach_the_backend() {
    let backend = Arc::new(MockBackend::new());
    let config = ExecutorConfig {
        variables: HashMap::from([("table".to_string(), "orders".to_string())]),
        ..Default::default()
    };
    let (handle, session) = start_session(config, backend.clone());

    let sql = "USE sales;\nSELECT * FROM ${table} WHERE region = '${region=emea}';";
    assert_ok!(handle.execute(details(sql, SelectionMode::All)).await);
    wait_idle(&handle).await;

    assert_eq!(
        backend.executed(),
        vec![
            "USE sales",
            "SELECT * FROM orders WHERE region = 'emea'"
        ]
    );
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.executables[1].database, "sales");

    handle.close().await.unwrap();
    session.await.unwrap();
}

#[tokio::test]
async fn test_editing_away_a_running_statement_stops_the_chain() {
    let backend = Arc::new(MockBackend::new().with_delay(Duration::from_secs(30)));
    let (handle, session) = start_session(ExecutorConfig::default(), backend.clone());

    let first = handle
        .execute(details("SELECT 1;\nSELECT 2;", SelectionMode::All))
        .await
        .unwrap()
        .unwrap();

    // Deleting the running statement loses it and cancels its chain
    handle
        .update(details("SELECT 2;", SelectionMode::Active))
        .await
        .unwrap();
    wait_idle(&handle).await;

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.executables.len(), 1);
    assert_ne!(snapshot.executables[0].id, first);
    assert_eq!(snapshot.executables[0].status, ExecutionStatus::Ready);
    assert!(backend.executed().is_empty());

    handle.close().await.unwrap();
    session.await.unwrap();
}

#[tokio::test]
async fn test_rerun_replaces_previous_chain() {
    let backend = Arc::new(MockBackend::new().with_delay(Duration::from_millis(20)));
    let (handle, session) = start_session(ExecutorConfig::default(), backend.clone());

    let sql = "SELECT 1;\nSELECT 2;";
    assert_ok!(handle.execute(details(sql, SelectionMode::All)).await);
    // Running again while the first chain is in flight restarts from the top
    assert_ok!(handle.execute(details(sql, SelectionMode::All)).await);
    wait_idle(&handle).await;

    assert_eq!(backend.executed(), vec!["SELECT 1", "SELECT 2"]);
    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot
        .executables
        .iter()
        .all(|e| e.status == ExecutionStatus::Success));

    handle.close().await.unwrap();
    session.await.unwrap();
}

#[tokio::test]
async fn test_cancel_all_stops_every_chain() {
    let backend = Arc::new(MockBackend::new().with_delay(Duration::from_secs(30)));
    let (handle, session) = start_session(ExecutorConfig::default(), backend.clone());

    assert_ok!(handle.execute(details("SELECT 1", SelectionMode::All)).await);
    handle.cancel_all().await.unwrap();
    wait_idle(&handle).await;

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.executables[0].status, ExecutionStatus::Canceled);

    handle.close().await.unwrap();
    session.await.unwrap();
}

#[tokio::test]
async fn test_subscribers_see_status_changes() {
    let backend = Arc::new(MockBackend::new());
    let (handle, session) = start_session(ExecutorConfig::default(), backend);
    let mut events = handle.subscribe();

    let id = handle
        .execute(details("SELECT 1", SelectionMode::All))
        .await
        .unwrap()
        .unwrap();
    wait_idle(&handle).await;

    let mut statuses = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ExecutorEvent::Changed {
            id: changed,
            status,
            ..
        } = event
        {
            if changed == id && statuses.last() != Some(&status) {
                statuses.push(status);
            }
        }
    }
    assert_eq!(
        statuses,
        vec![
            ExecutionStatus::Ready,
            ExecutionStatus::Running,
            ExecutionStatus::Success
        ]
    );

    handle.close().await.unwrap();
    session.await.unwrap();
}

#[tokio::test]
async fn test_handle_errors_after_close() {
    let (handle, session) = start_session(ExecutorConfig::default(), Arc::new(MockBackend::new()));

    handle.close().await.unwrap();
    session.await.unwrap();

    let err = handle
        .update(details("SELECT 1", SelectionMode::Active))
        .await
        .unwrap_err();
    assert_eq!(err.category(), "Internal Error");
}

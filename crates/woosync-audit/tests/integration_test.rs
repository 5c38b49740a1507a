//! Integration test: ErrorLogger → SQLite → query back
//!
//! Uses a real in-memory SQLite database to verify the full flow:
//! ErrorLogger creates entries → ISyncStateRepository persists them →
//! get_error_logs_since returns them.

use std::sync::Arc;

use chrono::{Duration, Utc};
use woosync_audit::ErrorLogger;
use woosync_core::{
    domain::{ErrorKind, RemoteId, RunId, ServerId, SyncScope},
    ports::{ISyncStateRepository, RemoteApiError},
};
use woosync_reconcile::ReconcileError;
use woosync_store::{DatabasePool, SqliteStore};

async fn make_store() -> Arc<SqliteStore> {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    Arc::new(SqliteStore::new(pool.pool().clone()))
}

#[tokio::test]
async fn test_error_logger_integration_with_sqlite() {
    let store = make_store().await;
    let run = RunId::new();
    let logger = ErrorLogger::new(Arc::clone(&store) as Arc<dyn ISyncStateRepository>)
        .for_pass(run, SyncScope::SalesOrders);
    let server = ServerId::new("shop.example.com".to_string()).unwrap();

    let transport = logger
        .log_record_failure(
            Some(&server),
            "1001",
            &RemoteApiError::Server {
                status: 502,
                message: "Bad Gateway".into(),
            },
        )
        .await;
    let validation = logger
        .log_record_failure(
            Some(&server),
            "1002",
            &ReconcileError::MissingBillingEmail {
                order: RemoteId::from_u64(1002).unwrap(),
            },
        )
        .await;
    logger
        .log_pass_failure(Some(&server), &"database is locked")
        .await;

    assert!(transport.is_some());
    assert!(validation.is_some());
    assert_ne!(transport, validation);

    let entries = store
        .get_error_logs_since(Utc::now() - Duration::hours(1), 100)
        .await
        .expect("Failed to query error log");
    assert_eq!(entries.len(), 3);

    // Newest first
    assert_eq!(entries[0].kind(), ErrorKind::Internal);
    assert!(entries[0].message().contains("database is locked"));
    assert!(entries[0].record().is_none());

    assert_eq!(entries[1].kind(), ErrorKind::Validation);
    assert_eq!(entries[1].record(), Some("1002"));

    assert_eq!(entries[2].kind(), ErrorKind::Transport);
    assert_eq!(entries[2].server(), Some(&server));

    for entry in &entries {
        assert_eq!(entry.run_id(), Some(&run));
        assert_eq!(entry.scope(), Some(SyncScope::SalesOrders));
    }
}

#[tokio::test]
async fn test_entries_outside_window_are_not_returned() {
    let store = make_store().await;
    let logger = ErrorLogger::new(Arc::clone(&store) as Arc<dyn ISyncStateRepository>);
    let server = ServerId::new("shop.example.com".to_string()).unwrap();

    logger
        .log_mapping_error(&server, "description", "unexpected end of expression at 7")
        .await;

    let future = store
        .get_error_logs_since(Utc::now() + Duration::minutes(5), 100)
        .await
        .unwrap();
    assert!(future.is_empty());

    let recent = store
        .get_error_logs_since(Utc::now() - Duration::minutes(5), 100)
        .await
        .unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].kind(), ErrorKind::MappingExpression);
    assert!(recent[0].run_id().is_none());
}

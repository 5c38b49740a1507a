use chrono::{Duration, Utc};

use woosync_core::domain::{Checkpoint, ErrorKind, RemoteEntity, RunId, SyncScope};
use woosync_core::ports::ISyncStateRepository;
use woosync_sync::SyncError;

use crate::common::{harness, initial_checkpoint, order, simple_product};

#[tokio::test]
async fn first_pass_starts_from_configured_checkpoint() {
    let h = harness(|_| {}).await;
    assert_eq!(
        h.orchestrator
            .resolve_checkpoint(SyncScope::Items)
            .await
            .unwrap(),
        Checkpoint::at(initial_checkpoint())
    );

    let before = Utc::now();
    h.orchestrator.run_scope(SyncScope::Items).await.unwrap();

    let stored = h
        .store
        .get_checkpoint(SyncScope::Items)
        .await
        .unwrap()
        .expect("checkpoint stored");
    assert!(stored.instant() >= before);
    assert!(h.store.get_checkpoint(SyncScope::SalesOrders).await.unwrap().is_none());
}

#[tokio::test]
async fn failed_listing_keeps_checkpoint() {
    let h = harness(|_| {}).await;
    h.shop.insert(&RemoteEntity::Order, order(1042, 0));
    h.shop.fail_next_lists(3);

    let err = h
        .orchestrator
        .run_scope(SyncScope::SalesOrders)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Remote(_)));
    assert!(h.store.get_checkpoint(SyncScope::SalesOrders).await.unwrap().is_none());

    let logs = h
        .store
        .get_error_logs_since(Utc::now() - Duration::minutes(5), 10)
        .await
        .unwrap();
    assert!(logs.iter().any(|entry| entry.kind() == ErrorKind::Internal));

    // The lock was released; the next pass picks the order up
    let outcome = h.orchestrator.run_scope(SyncScope::SalesOrders).await.unwrap();
    assert_eq!(outcome.report.created_local, 1);
}

#[tokio::test]
async fn transient_listing_failure_is_retried() {
    let h = harness(|_| {}).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    h.shop.fail_next_lists(1);

    let outcome = h.orchestrator.run_scope(SyncScope::Items).await.unwrap();
    assert_eq!(outcome.report.created_local, 1);
}

#[tokio::test]
async fn held_lock_refuses_second_pass() {
    let h = harness(|_| {}).await;
    let holder = RunId::new();
    assert!(h
        .store
        .try_acquire_pass_lock(SyncScope::SalesOrders, holder, Duration::hours(2))
        .await
        .unwrap());

    let err = h
        .orchestrator
        .run_scope(SyncScope::SalesOrders)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::PassInProgress(SyncScope::SalesOrders)));

    // Other scopes are independent
    h.orchestrator.run_scope(SyncScope::Items).await.unwrap();

    h.store
        .release_pass_lock(SyncScope::SalesOrders, holder)
        .await
        .unwrap();
    h.orchestrator.run_scope(SyncScope::SalesOrders).await.unwrap();
}

#[tokio::test]
async fn explicit_checkpoint_is_not_stored() {
    let h = harness(|_| {}).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));

    let outcome = h
        .orchestrator
        .run_items_sync(Checkpoint::at(initial_checkpoint()))
        .await
        .unwrap();
    assert!(outcome.checkpoint.instant() > initial_checkpoint());
    assert!(h.store.get_checkpoint(SyncScope::Items).await.unwrap().is_none());
}

#[tokio::test]
async fn disabled_server_is_not_synced() {
    let h = harness(|server| server.enable_sync = false).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));

    let outcome = h.orchestrator.run_scope(SyncScope::Items).await.unwrap();
    assert_eq!(outcome.report.processed(), 0);
}

#[tokio::test]
async fn passes_run_on_spawned_tasks() {
    let h = harness(|_| {}).await;
    h.shop.insert(&RemoteEntity::Order, order(1042, 0));
    h.shop.fail_next_lists(3);

    // The failing pass goes through the error-log path before returning
    let orchestrator = std::sync::Arc::clone(&h.orchestrator);
    let failed = tokio::spawn(async move { orchestrator.run_scope(SyncScope::SalesOrders).await })
        .await
        .unwrap();
    assert!(failed.is_err());

    let orchestrator = std::sync::Arc::clone(&h.orchestrator);
    let outcome = tokio::spawn(async move { orchestrator.run_scope(SyncScope::SalesOrders).await })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.report.created_local, 1);
}

#[tokio::test]
async fn long_pass_keeps_its_lock_fresh() {
    let h = harness(|_| {}).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    h.shop.delay_lists(600);

    let orchestrator = std::sync::Arc::clone(&h.orchestrator);
    let pass = tokio::spawn(async move { orchestrator.run_scope(SyncScope::Items).await });

    // Older than 200ms would count as abandoned; the running pass keeps it younger
    tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    let intruder = RunId::new();
    assert!(!h
        .store
        .try_acquire_pass_lock(SyncScope::Items, intruder, Duration::milliseconds(200))
        .await
        .unwrap());

    let outcome = pass.await.unwrap().unwrap();
    assert_eq!(outcome.report.created_local, 1);
}

#[tokio::test]
async fn pass_stops_when_its_lock_is_taken_over() {
    let h = harness(|_| {}).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    h.shop.delay_lists(800);

    let orchestrator = std::sync::Arc::clone(&h.orchestrator);
    let pass = tokio::spawn(async move { orchestrator.run_scope(SyncScope::Items).await });

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let intruder = RunId::new();
    assert!(h
        .store
        .try_acquire_pass_lock(SyncScope::Items, intruder, Duration::zero())
        .await
        .unwrap());

    let err = pass.await.unwrap().unwrap_err();
    assert!(matches!(err, SyncError::PassInProgress(SyncScope::Items)));
    assert!(h.store.get_checkpoint(SyncScope::Items).await.unwrap().is_none());

    // The aborted pass left the new holder's lock alone
    assert!(!h
        .store
        .try_acquire_pass_lock(SyncScope::Items, RunId::new(), Duration::hours(2))
        .await
        .unwrap());
}

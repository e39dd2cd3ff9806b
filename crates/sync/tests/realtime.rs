//! Realtime ingress and channel lifecycle scenarios.

mod support;

use std::sync::atomic::Ordering;

use serde_json::json;
use tokio::sync::oneshot;
use uuid::Uuid;

use hearth_core::clock::Clock;
use hearth_core::meta::SyncState;
use hearth_core::remote::{ChangeAction, RowChange};
use hearth_core::tables::Table;
use hearth_sync::ConnectionState;

use support::*;

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..2000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

fn broadcast_envelope(payload: serde_json::Value) -> serde_json::Value {
    json!({
        "event": "broadcast",
        "type": "broadcast",
        "payload": payload,
        "meta": null,
    })
}

#[tokio::test]
async fn row_changes_flow_into_the_store() {
    let h = Harness::new();
    h.engine.start_listening().await;
    assert!(h.engine.is_listening());

    let task_id = Uuid::new_v4();
    h.realtime.send_row_change(RowChange {
        table: Table::Tasks,
        action: ChangeAction::Insert,
        record: Some(task_value(task_id, "From realtime", base_time())),
        old_record: None,
    });
    wait_until(|| h.store.tasks.contains(task_id)).await;

    h.realtime.send_row_change(RowChange {
        table: Table::Tasks,
        action: ChangeAction::Delete,
        record: None,
        old_record: Some(json!({ "id": task_id })),
    });
    wait_until(|| !h.store.tasks.contains(task_id)).await;

    h.engine.stop_listening().await;
    assert!(!h.engine.is_listening());
    assert_eq!(
        *h.engine.connection().borrow(),
        ConnectionState::Disconnected
    );
    assert!(h.realtime.unsubscribes.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn realtime_upserts_never_advance_watermarks() {
    let h = Harness::new();
    h.engine.start_listening().await;

    let task_id = Uuid::new_v4();
    h.realtime.send_row_change(RowChange {
        table: Table::Tasks,
        action: ChangeAction::Insert,
        record: Some(task_value(task_id, "From realtime", base_time())),
        old_record: None,
    });
    wait_until(|| h.store.tasks.contains(task_id)).await;

    assert!(h.last_sync_time().is_none());
}

#[tokio::test]
async fn echo_during_push_is_suppressed() {
    let h = Harness::new();
    h.engine.start_listening().await;

    let task_id = Uuid::new_v4();
    h.store
        .tasks
        .put(local_task(task_id, "Mine", h.clock.now()));

    let (entered_tx, entered_rx) = oneshot::channel();
    let (resume_tx, resume_rx) = oneshot::channel();
    h.remote.set_upsert_gate(UpsertGate {
        table: Table::Tasks,
        entered: Some(entered_tx),
        resume: Some(resume_rx),
    });

    let engine = std::sync::Arc::clone(&h.engine);
    let sync_task = tokio::spawn(async move { engine.sync().await });

    // the push has marked the id in-flight and is now mid-request
    entered_rx.await.expect("push entered");

    // self-echo of our own write
    h.realtime.send_broadcast(broadcast_envelope(json!({
        "table": "tasks",
        "type": "update",
        "record": task_value(task_id, "Echoed copy", at_offset(60)),
        "eventVersion": 1,
        "originUserId": h.me,
    })));
    // a foreign update racing the push is held off by the in-flight set
    h.realtime.send_broadcast(broadcast_envelope(json!({
        "table": "tasks",
        "type": "update",
        "record": task_value(task_id, "Foreign racer", at_offset(60)),
        "eventVersion": 1,
        "originUserId": Uuid::new_v4(),
    })));
    settle().await;
    assert_eq!(h.store.tasks.get(task_id).unwrap().title, "Mine");

    resume_tx.send(()).expect("resume push");
    sync_task.await.expect("sync finished");

    let task = h.store.tasks.get(task_id).unwrap();
    assert_eq!(task.meta.state, SyncState::Synced);
    assert_eq!(task.title, "Mine");

    // once the in-flight set clears, foreign updates apply again
    h.realtime.send_broadcast(broadcast_envelope(json!({
        "table": "tasks",
        "type": "update",
        "record": task_value(task_id, "Foreign later", at_offset(120)),
        "eventVersion": 1,
        "originUserId": Uuid::new_v4(),
    })));
    wait_until(|| h.store.tasks.get(task_id).unwrap().title == "Foreign later").await;
}

#[tokio::test]
async fn reconnect_retries_with_backoff_until_subscribed() {
    let h = Harness::new();
    // initial subscribe plus reconnect attempts 1..=6 fail (attempt 6 is the
    // one past the advertised budget, after `degraded`); attempt 7 succeeds
    h.realtime.fail_next_subscribes(7);
    h.engine.start_listening().await;

    wait_until(|| *h.engine.connection().borrow() == ConnectionState::Connected).await;
    assert_eq!(h.realtime.subscribe_calls.load(Ordering::SeqCst), 8);

    h.engine.stop_listening().await;
}

#[tokio::test]
async fn short_outage_recovers_before_the_budget_is_spent() {
    let h = Harness::new();
    h.realtime.fail_next_subscribes(2);
    h.engine.start_listening().await;

    wait_until(|| *h.engine.connection().borrow() == ConnectionState::Connected).await;
    assert_eq!(h.realtime.subscribe_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn reset_and_reconnect_starts_a_fresh_subscription() {
    let h = Harness::new();
    h.engine.start_listening().await;
    wait_until(|| *h.engine.connection().borrow() == ConnectionState::Connected).await;
    let calls_before = h.realtime.subscribe_calls.load(Ordering::SeqCst);

    h.engine.reset_and_reconnect().await;
    wait_until(|| *h.engine.connection().borrow() == ConnectionState::Connected).await;
    assert_eq!(
        h.realtime.subscribe_calls.load(Ordering::SeqCst),
        calls_before + 1
    );
    assert!(h.realtime.unsubscribes.load(Ordering::SeqCst) >= 1);

    // the fresh channel is live
    let task_id = Uuid::new_v4();
    h.realtime.send_row_change(RowChange {
        table: Table::Tasks,
        action: ChangeAction::Insert,
        record: Some(task_value(task_id, "After reset", base_time())),
        old_record: None,
    });
    wait_until(|| h.store.tasks.contains(task_id)).await;
}

#[tokio::test]
async fn local_authoritative_rows_ignore_realtime_updates() {
    let h = Harness::new();
    h.engine.start_listening().await;

    // pending local edit, newer than the incoming event
    let task_id = Uuid::new_v4();
    h.store
        .tasks
        .put(local_task(task_id, "Local edit", at_offset(0)));

    h.realtime.send_row_change(RowChange {
        table: Table::Tasks,
        action: ChangeAction::Update,
        record: Some(task_value(task_id, "Older remote", at_offset(-30))),
        old_record: None,
    });
    settle().await;
    assert_eq!(h.store.tasks.get(task_id).unwrap().title, "Local edit");

    // a genuinely newer remote row wins over pending
    h.realtime.send_row_change(RowChange {
        table: Table::Tasks,
        action: ChangeAction::Update,
        record: Some(task_value(task_id, "Newer remote", at_offset(30))),
        old_record: None,
    });
    wait_until(|| h.store.tasks.get(task_id).unwrap().title == "Newer remote").await;
    assert_eq!(
        h.store.tasks.get(task_id).unwrap().meta.state,
        SyncState::Synced
    );
}

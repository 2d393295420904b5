use std::sync::atomic::Ordering;

use tokio::sync::watch;

use super::support::{record, session, wait_for, MockApi};
use crate::config::Config;
use crate::engine::SyncEngine;
use crate::model::NotificationKind;
use crate::transport::ConnectionState;

// Port 9 (discard) is never listening; channel attempts fail fast and the
// engine falls back to the pull path, which is exactly what these tests
// exercise.
fn config() -> Config {
    Config::with_api_base("http://127.0.0.1:9")
}

#[tokio::test]
async fn scenario_a_empty_server_yields_empty_state() {
    let api = MockApi::new();
    let engine = SyncEngine::new(config(), api.clone());
    let (sessions_tx, sessions_rx) = watch::channel(None);
    let handle = engine.start(sessions_rx).unwrap();
    let mut snapshots = handle.notifications();

    sessions_tx.send(Some(session())).unwrap();
    // The activation fetch publishes even when the server has nothing.
    snapshots.changed().await.unwrap();

    let snap = snapshots.borrow().clone();
    assert!(snap.notifications.is_empty());
    assert_eq!(snap.unread, 0);
    assert!(handle.current_toast().is_none());
    assert_eq!(api.fetches.load(Ordering::SeqCst), 1);
    handle.shutdown();
}

#[tokio::test]
async fn scenario_b_alert_surfaces_provisionally_then_reconciles_without_duplication() {
    // One permit: the activation fetch. The alert-triggered fetch waits until
    // the test has observed the provisional state.
    let api = MockApi::gated(1);
    let engine = SyncEngine::new(config(), api.clone());
    let (sessions_tx, sessions_rx) = watch::channel(None);
    let handle = engine.start(sessions_rx).unwrap();
    let mut snapshots = handle.notifications();
    let mut toasts = handle.toast();

    sessions_tx.send(Some(session())).unwrap();
    snapshots.changed().await.unwrap();

    api.set_records(vec![record("srv-1", "Client replied", "URGENT_ALERT", false)]);
    handle.inject_frame(r#"{"type":"URGENT_ALERT","message":"Client replied","project_id":"p-7"}"#);

    // Provisional entry is visible before the fetch resolves.
    let snap = wait_for(&mut snapshots, |s| s.notifications.len() == 1).await;
    assert_eq!(snap.unread, 1);
    let provisional = &snap.notifications[0];
    assert!(provisional.id.starts_with("pending-"));
    assert_eq!(provisional.message, "Client replied");
    assert_eq!(provisional.kind, NotificationKind::Urgent);
    assert!(!provisional.read);

    let toast = wait_for(&mut toasts, |t| t.is_some()).await.unwrap();
    assert_eq!(toast.message, "Client replied");
    assert!(toast.notification_id.starts_with("pending-"));

    // Let the authoritative fetch land: one entry, no duplication.
    api.allow_fetch();
    let snap = wait_for(&mut snapshots, |s| {
        s.notifications.len() == 1 && s.notifications[0].id == "srv-1"
    })
    .await;
    assert_eq!(snap.unread, 1);

    // The toast follows the authoritative identity, message unchanged.
    let toast = wait_for(&mut toasts, |t| {
        t.as_ref().map(|t| t.notification_id == "srv-1").unwrap_or(false)
    })
    .await
    .unwrap();
    assert_eq!(toast.message, "Client replied");
    handle.shutdown();
}

#[tokio::test]
async fn scenario_c_mark_read_is_optimistic_even_when_ack_fails() {
    let api = MockApi::new();
    api.set_records(vec![record("srv-1", "Client replied", "URGENT_ALERT", false)]);
    api.fail_acks.store(true, Ordering::SeqCst);

    let engine = SyncEngine::new(config(), api.clone());
    let (sessions_tx, sessions_rx) = watch::channel(None);
    let handle = engine.start(sessions_rx).unwrap();
    let mut snapshots = handle.notifications();
    let mut toasts = handle.toast();

    sessions_tx.send(Some(session())).unwrap();
    wait_for(&mut snapshots, |s| s.notifications.len() == 1).await;
    wait_for(&mut toasts, |t| t.is_some()).await;

    handle.mark_read("srv-1").await;

    let snap = handle.snapshot();
    assert_eq!(snap.unread, 0);
    assert!(snap.notifications[0].read);
    assert!(handle.current_toast().is_none());
    // The acknowledgment was attempted and its failure did not roll back.
    let acks = api.read_acks.lock().clone();
    assert_eq!(acks, vec!["srv-1".to_string()]);
    handle.shutdown();
}

#[tokio::test]
async fn scenario_d_refresh_frame_triggers_fetch_without_synthesis() {
    let api = MockApi::new();
    let engine = SyncEngine::new(config(), api.clone());
    let (sessions_tx, sessions_rx) = watch::channel(None);
    let handle = engine.start(sessions_rx).unwrap();
    let mut snapshots = handle.notifications();

    sessions_tx.send(Some(session())).unwrap();
    snapshots.changed().await.unwrap();
    assert_eq!(api.fetches.load(Ordering::SeqCst), 1);

    api.set_records(vec![record("srv-9", "Weekly digest posted", "PROJECT_UPDATE", false)]);
    handle.inject_frame(r#"{"type":"REFRESH_PROJECTS"}"#);

    let snap = wait_for(&mut snapshots, |s| s.notifications.len() == 1).await;
    assert_eq!(snap.notifications[0].id, "srv-9");
    assert_eq!(snap.notifications[0].kind, NotificationKind::Info);
    assert_eq!(api.fetches.load(Ordering::SeqCst), 2);
    // No provisional entry and no toast came out of a bare refresh.
    assert!(handle.current_toast().is_none());
    handle.shutdown();
}

#[tokio::test]
async fn scenario_e_mark_all_read_clears_immediately_despite_ack_outcome() {
    let api = MockApi::new();
    api.set_records(vec![
        record("n-1", "one", "PROJECT_UPDATE", false),
        record("n-2", "two", "PROJECT_UPDATE", false),
        record("n-3", "three", "PROJECT_UPDATE", false),
        record("n-4", "four", "PROJECT_UPDATE", false),
        record("n-5", "five", "PROJECT_UPDATE", false),
    ]);
    api.fail_acks.store(true, Ordering::SeqCst);

    let engine = SyncEngine::new(config(), api.clone());
    let (sessions_tx, sessions_rx) = watch::channel(None);
    let handle = engine.start(sessions_rx).unwrap();
    let mut snapshots = handle.notifications();

    sessions_tx.send(Some(session())).unwrap();
    let snap = wait_for(&mut snapshots, |s| s.notifications.len() == 5).await;
    assert_eq!(snap.unread, 5);

    handle.mark_all_read().await;

    let snap = handle.snapshot();
    assert!(snap.notifications.is_empty());
    assert_eq!(snap.unread, 0);
    assert_eq!(api.read_all_acks.load(Ordering::SeqCst), 1);
    handle.shutdown();
}

#[tokio::test]
async fn failed_fetch_keeps_the_stale_list() {
    let api = MockApi::new();
    api.set_records(vec![record("srv-1", "Kickoff booked", "PROJECT_UPDATE", false)]);

    let engine = SyncEngine::new(config(), api.clone());
    let (sessions_tx, sessions_rx) = watch::channel(None);
    let handle = engine.start(sessions_rx).unwrap();
    let mut snapshots = handle.notifications();

    sessions_tx.send(Some(session())).unwrap();
    wait_for(&mut snapshots, |s| s.notifications.len() == 1).await;

    api.fail_fetch.store(true, Ordering::SeqCst);
    handle.inject_frame(r#"{"type":"REFRESH_PROJECTS"}"#);
    wait_for_fetches(&api, 2).await;

    let snap = handle.snapshot();
    assert_eq!(snap.notifications.len(), 1);
    assert_eq!(snap.notifications[0].id, "srv-1");
    handle.shutdown();
}

#[tokio::test]
async fn unread_count_tracks_read_flags_across_alert_sequences() {
    let api = MockApi::gated(1);
    let engine = SyncEngine::new(config(), api.clone());
    let (sessions_tx, sessions_rx) = watch::channel(None);
    let handle = engine.start(sessions_rx).unwrap();
    let mut snapshots = handle.notifications();

    sessions_tx.send(Some(session())).unwrap();
    snapshots.changed().await.unwrap();

    for n in 1..=3 {
        handle.inject_frame(r#"{"type":"URGENT_ALERT","message":"ping"}"#);
        let snap = handle.snapshot();
        assert_eq!(snap.notifications.len(), n);
        assert_eq!(
            snap.unread,
            snap.notifications.iter().filter(|e| !e.read).count()
        );
    }
    handle.shutdown();
}

#[tokio::test]
async fn logout_releases_the_connection() {
    let api = MockApi::new();
    let engine = SyncEngine::new(config(), api.clone());
    let (sessions_tx, sessions_rx) = watch::channel(None);
    let handle = engine.start(sessions_rx).unwrap();
    let mut connection = handle.connection();

    sessions_tx.send(Some(session())).unwrap();
    // Nothing listens on the push endpoint here, so the channel attempt
    // settles as Closed while the pull path keeps working.
    wait_for(&mut connection, |state| *state == ConnectionState::Closed).await;

    sessions_tx.send(None).unwrap();
    wait_for(&mut connection, |state| *state == ConnectionState::Absent).await;
    handle.shutdown();
}

async fn wait_for_fetches(api: &MockApi, at_least: usize) {
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while api.fetches.load(Ordering::SeqCst) < at_least {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("fetch count not reached in time");
}

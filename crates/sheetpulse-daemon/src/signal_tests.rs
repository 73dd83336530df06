use super::*;
use std::time::Duration;

#[test]
fn test_reload_is_not_sticky() {
    let signals = SignalHandler::new();
    signals.request_reload();
    assert!(!signals.is_shutdown_requested());

    signals.request_shutdown();
    assert!(signals.is_shutdown_requested());
    assert_eq!(DaemonSignal::Reload.to_string(), "reload");
}

#[tokio::test]
async fn test_every_subscriber_sees_reload() {
    let signals = SignalHandler::new();
    let mut daemon_rx = signals.subscribe();
    let mut other_rx = signals.subscribe();

    signals.request_reload();

    assert_eq!(daemon_rx.recv().await.unwrap(), DaemonSignal::Reload);
    assert_eq!(other_rx.recv().await.unwrap(), DaemonSignal::Reload);
}

#[tokio::test]
async fn test_shutdown_requested_before_waiting() {
    let signals = SignalHandler::new();
    signals.clone().request_shutdown();

    tokio::time::timeout(Duration::from_secs(1), signals.shutdown_requested())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_shutdown_requested_wakes_waiter() {
    let signals = SignalHandler::new();
    let waiter = {
        let signals = signals.clone();
        tokio::spawn(async move { signals.shutdown_requested().await })
    };

    tokio::task::yield_now().await;
    signals.request_reload();
    signals.request_shutdown();

    tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
}

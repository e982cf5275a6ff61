//! Independent waits sharing a runtime and a request context

#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tfplug::context::Context;
use tfplug::retry::{RefreshError, StateChangeConf, WaitError};
use tokio::time::Instant;

/// Returns the labels in order, repeating the last one
async fn scripted(
    labels: &[&'static str],
    calls: &AtomicUsize,
) -> Result<(usize, String), RefreshError<String>> {
    let n = calls.fetch_add(1, Ordering::SeqCst);
    let label = labels[n.min(labels.len() - 1)];
    Ok((n, label.to_string()))
}

#[tokio::test(start_paused = true)]
async fn concurrent_waits_do_not_serialize() {
    let ctx = Context::new();
    let start = Instant::now();

    let monitor_calls = AtomicUsize::new(0);
    let key_calls = AtomicUsize::new(0);

    let monitor = StateChangeConf::new(["PENDING"], ["ACTIVE"])
        .timeout(Duration::from_secs(60))
        .poll_interval(Duration::from_secs(5));
    let key = StateChangeConf::new(["CREATING"], ["ENABLED"])
        .timeout(Duration::from_secs(60))
        .poll_interval(Duration::from_secs(2));

    let monitor_labels = ["PENDING", "PENDING", "PENDING", "ACTIVE"];
    let key_labels = ["CREATING", "ENABLED"];

    let (monitor_result, key_result) = futures::join!(
        monitor.wait_for_state(&ctx, || scripted(&monitor_labels, &monitor_calls)),
        key.wait_for_state(&ctx, || scripted(&key_labels, &key_calls)),
    );

    assert_eq!(monitor_result.unwrap(), Some(3));
    assert_eq!(key_result.unwrap(), Some(1));
    assert_eq!(start.elapsed(), Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn cancelling_parent_stops_waits_on_child_contexts() {
    let parent = Context::new();
    let first = parent.with_timeout(Duration::from_secs(600)).await;
    let second = parent.with_timeout(Duration::from_secs(600)).await;

    let first_calls = AtomicUsize::new(0);
    let second_calls = AtomicUsize::new(0);
    let conf = StateChangeConf::new(["PENDING"], ["ACTIVE"])
        .timeout(Duration::from_secs(600))
        .poll_interval(Duration::from_secs(1));

    let (first_result, second_result, _) = futures::join!(
        conf.wait_for_state(&first, || scripted(&["PENDING"], &first_calls)),
        conf.wait_for_state(&second, || scripted(&["PENDING"], &second_calls)),
        async {
            tokio::time::sleep(Duration::from_millis(3500)).await;
            parent.cancel();
        },
    );

    for result in [first_result, second_result] {
        match result {
            Err(WaitError::Cancelled { last }) => assert!(last.is_some()),
            other => panic!("expected cancellation, got {:?}", other.map(|_| ())),
        }
    }
    assert!(first_calls.load(Ordering::SeqCst) <= 5);
    assert!(second_calls.load(Ordering::SeqCst) <= 5);
}

#[tokio::test(start_paused = true)]
async fn context_deadline_cuts_a_longer_wait_short() {
    let ctx = Context::new().with_timeout(Duration::from_secs(5)).await;
    let start = Instant::now();
    let calls = AtomicUsize::new(0);

    let result = StateChangeConf::new(["PENDING"], ["ACTIVE"])
        .timeout(Duration::from_secs(600))
        .poll_interval(Duration::from_secs(1))
        .wait_for_state(&ctx, || scripted(&["PENDING"], &calls))
        .await;

    assert!(matches!(result, Err(WaitError::Cancelled { .. })));
    assert!(start.elapsed() < Duration::from_secs(7));
}

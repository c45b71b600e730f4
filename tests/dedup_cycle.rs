// tests/dedup_cycle.rs
mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use vaccine_hunter::ledger::LedgerEntry;
use vaccine_hunter::orchestrator::poll_cycle;
use vaccine_hunter::registrant::DestinationKey;
use vaccine_hunter::summary::RunOutcome;

// ~1.4 miles from the registrant center
const NEAR: (f64, f64) = (41.90, -87.63);

#[tokio::test]
async fn identical_second_run_sends_nothing() {
    let feed = fixture(vec![feature(
        1,
        NEAR.0,
        NEAR.1,
        "Evanston",
        true,
        &["2021-04-05T15:45:00-05:00", "2021-04-06T09:00:00-05:00"],
    )]);
    let notifier = Arc::new(RecordingNotifier::default());
    let store = MemStore::default();
    let regs = vec![registrant("alex", "+13125550100")];

    let first = run(feed.clone(), notifier.clone(), &store, &regs, morning()).await;
    assert_eq!(first.alerts_sent(), 1);
    assert_eq!(first.reports[0].sent[0].new_days, vec!["2021-04-05", "2021-04-06"]);
    assert_eq!(store.entries.lock().len(), 2);

    let second = run(feed, notifier.clone(), &store, &regs, morning()).await;
    assert_eq!(second.alerts_sent(), 0);
    assert_eq!(second.reports[0].suppressed, 1);
    assert_eq!(notifier.sent.lock().len(), 1);
    assert_eq!(store.save_count(), 2, "flushed once per cycle");
}

#[tokio::test]
async fn new_day_at_known_location_alerts_again_for_that_day_only() {
    let store = MemStore::default();
    store.entries.lock().push(LedgerEntry::new(
        1,
        day(4, 5),
        DestinationKey("+13125550100".into()),
    ));
    let feed = fixture(vec![feature(
        1,
        NEAR.0,
        NEAR.1,
        "Evanston",
        true,
        &["2021-04-05T15:45:00-05:00", "2021-04-06T09:00:00-05:00"],
    )]);
    let notifier = Arc::new(RecordingNotifier::default());
    let regs = vec![registrant("alex", "+13125550100")];

    let rep = run(feed, notifier, &store, &regs, morning()).await;
    assert_eq!(rep.alerts_sent(), 1);
    assert_eq!(rep.reports[0].sent[0].new_days, vec!["2021-04-06"]);
    assert_eq!(rep.ledger_entries, 2);
}

#[tokio::test]
async fn registrants_with_distinct_destinations_both_get_alerted() {
    let feed = fixture(vec![feature(
        7,
        NEAR.0,
        NEAR.1,
        "Evanston",
        true,
        &["2021-04-06T09:00:00-05:00"],
    )]);
    let notifier = Arc::new(RecordingNotifier::default());
    let store = MemStore::default();
    let regs: Vec<_> = (0..8)
        .map(|i| registrant(&format!("r{i}"), &format!("+1312555010{i}")))
        .collect();

    let rep = run(feed, notifier.clone(), &store, &regs, morning()).await;

    assert_eq!(rep.alerts_sent(), 8);
    for i in 0..8 {
        assert_eq!(notifier.sent_to(&format!("+1312555010{i}")).len(), 1);
    }
    assert_eq!(store.entries.lock().len(), 8);
    let names: Vec<_> = rep.reports.iter().map(|r| r.registrant.clone()).collect();
    assert_eq!(names, (0..8).map(|i| format!("r{i}")).collect::<Vec<_>>(), "input order kept");
}

#[tokio::test]
async fn shared_destination_is_alerted_once_per_day() {
    let feed = fixture(vec![feature(
        7,
        NEAR.0,
        NEAR.1,
        "Evanston",
        true,
        &["2021-04-06T09:00:00-05:00"],
    )]);
    let notifier = Arc::new(RecordingNotifier::default());
    let store = MemStore::default();
    let regs = vec![
        registrant("a", "+13125550100"),
        registrant("b", "+13125550100"),
    ];

    let rep = run(feed, notifier.clone(), &store, &regs, morning()).await;
    assert_eq!(rep.alerts_sent(), 1);
    assert_eq!(notifier.sent.lock().len(), 1);
}

#[tokio::test]
async fn failed_send_still_commits_the_ledger() {
    let feed = fixture(vec![feature(
        1,
        NEAR.0,
        NEAR.1,
        "Evanston",
        true,
        &["2021-04-06T09:00:00-05:00"],
    )]);
    let store = MemStore::default();
    let regs = vec![registrant("alex", "+13125550100")];

    let failing = Arc::new(RecordingNotifier::failing());
    let first = run(feed.clone(), failing, &store, &regs, morning()).await;
    let sent = &first.reports[0].sent[0];
    assert!(!sent.delivered);
    assert!(sent.error.as_deref().unwrap().contains("gateway down"));
    assert_eq!(store.entries.lock().len(), 1);

    let ok = Arc::new(RecordingNotifier::default());
    let second = run(feed, ok.clone(), &store, &regs, morning()).await;
    assert_eq!(second.alerts_sent(), 0);
    assert!(ok.sent.lock().is_empty());
}

#[tokio::test]
async fn send_failure_does_not_stop_remaining_alerts() {
    let feed = fixture(vec![
        feature(1, NEAR.0, NEAR.1, "Evanston", true, &["2021-04-06T09:00:00-05:00"]),
        feature(2, 41.91, -87.64, "Evanston", true, &["2021-04-07T09:00:00-05:00"]),
    ]);
    let notifier = Arc::new(RecordingNotifier::failing_once());
    let store = MemStore::default();
    let regs = vec![registrant("alex", "+13125550100")];

    let rep = run(feed, notifier.clone(), &store, &regs, morning()).await;
    let delivered: Vec<bool> = rep.reports[0].sent.iter().map(|s| s.delivered).collect();
    assert_eq!(delivered, vec![false, true]);
    assert_eq!(notifier.sent.lock().len(), 2);
    assert_eq!(store.entries.lock().len(), 2);
}

#[tokio::test]
async fn stalled_feed_times_out_for_that_registrant_only() {
    let feed = Arc::new(StallingFeed {
        inner: fixture(vec![feature(
            1,
            NEAR.0,
            NEAR.1,
            "Evanston",
            true,
            &["2021-04-06T09:00:00-05:00"],
        )]),
        stalled_partition: "WI".into(),
    });
    let notifier = Arc::new(RecordingNotifier::default());
    let store = MemStore::default();
    let mut wi = registrant("wi", "+14145550100");
    wi.feed_partition = "WI".into();
    let regs = vec![wi, registrant("il", "+13125550100")];

    let rep = poll_cycle(feed, notifier, &store, &regs, Duration::from_millis(20), morning()).await;

    let stalled = &rep.reports[0];
    assert_eq!(stalled.outcome, RunOutcome::FeedFailed);
    assert!(stalled.error_status.is_none());
    assert!(stalled.error_message.as_deref().unwrap().contains("timed out"));
    assert!(stalled.sent.is_empty());

    assert_eq!(rep.reports[1].outcome, RunOutcome::Completed);
    let entries = store.entries.lock();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].destination, DestinationKey("+13125550100".into()));
}

#[tokio::test]
async fn feed_failure_for_one_registrant_does_not_stop_others() {
    let feed = fixture(vec![feature(
        1,
        NEAR.0,
        NEAR.1,
        "Evanston",
        true,
        &["2021-04-06T09:00:00-05:00"],
    )]);
    let notifier = Arc::new(RecordingNotifier::default());
    let store = MemStore::default();
    let mut wi = registrant("wi", "+14145550100");
    wi.feed_partition = "WI".into();
    let regs = vec![wi, registrant("il", "+13125550100")];

    let rep = run(feed, notifier, &store, &regs, morning()).await;

    assert_eq!(rep.reports[0].outcome, RunOutcome::FeedFailed);
    assert!(!rep.reports[0].success);
    assert_eq!(rep.reports[1].outcome, RunOutcome::Completed);
    assert_eq!(rep.alerts_sent(), 1);
    assert_eq!(store.entries.lock().len(), 1, "failed registrant reserved nothing");
}

#[tokio::test]
async fn flush_failure_is_reported() {
    let feed = fixture(vec![]);
    let notifier = Arc::new(RecordingNotifier::default());
    let store = MemStore::failing();
    let regs = vec![registrant("alex", "+13125550100")];

    let rep = run(feed, notifier, &store, &regs, morning()).await;
    assert!(rep.flush_error.unwrap().contains("disk full"));
    assert_eq!(store.save_count(), 1);
}

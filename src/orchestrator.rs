// src/orchestrator.rs
//! # Run orchestrator
//! One poll cycle: every registrant runs window gate → fetch → geo filter →
//! candidate → eligibility → ledger reservation → send, concurrently with the
//! others. The shared ledger is flushed once, after all of them have finished.
//!
//! Ledger entries are reserved before sending and stay reserved when the send
//! fails: a failed send is not retried on the next poll.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use tokio::task::JoinSet;

use crate::candidate::{build_candidate, AlertCandidate};
use crate::eligibility::is_eligible;
use crate::feed::{FeedHttpError, FeedSource, LocationSnapshot};
use crate::geo;
use crate::ledger::{DedupLedger, LedgerStore};
use crate::metrics::ensure_metrics_described;
use crate::notify::{Notifier, OutboundAlert};
use crate::registrant::Registrant;
use crate::summary::{radius_stats, LocationStatus, RegistrantReport, RunOutcome, SentAlert};
use crate::window::AlertWindow;

#[derive(Clone)]
pub struct RunOrchestrator {
    feed: Arc<dyn FeedSource>,
    notifier: Arc<dyn Notifier>,
    ledger: Arc<DedupLedger>,
    feed_timeout: Duration,
}

/// Outcome of a full cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub reports: Vec<RegistrantReport>,
    pub ledger_entries: usize,
    /// `Some` when the end-of-cycle ledger write failed.
    pub flush_error: Option<String>,
}

impl CycleReport {
    pub fn alerts_sent(&self) -> usize {
        self.reports.iter().map(|r| r.sent.len()).sum()
    }
}

fn alert_subject(c: &AlertCandidate) -> String {
    format!("Vaccine appointments at {}", c.name)
}

impl RunOrchestrator {
    pub fn new(feed: Arc<dyn FeedSource>, notifier: Arc<dyn Notifier>, ledger: Arc<DedupLedger>) -> Self {
        Self {
            feed,
            notifier,
            ledger,
            feed_timeout: Duration::from_secs(20),
        }
    }

    pub fn with_feed_timeout(mut self, timeout: Duration) -> Self {
        self.feed_timeout = timeout;
        self
    }

    pub fn ledger(&self) -> &Arc<DedupLedger> {
        &self.ledger
    }

    async fn fetch(&self, partition: &str) -> anyhow::Result<Vec<LocationSnapshot>> {
        match tokio::time::timeout(self.feed_timeout, self.feed.fetch(partition)).await {
            Ok(res) => res,
            Err(_) => Err(anyhow!(
                "{} fetch for {partition} timed out after {:?}",
                self.feed.name(),
                self.feed_timeout
            )),
        }
    }

    /// Full pipeline for one registrant. Never fails: every problem ends up in the report.
    pub async fn run_registrant(&self, r: &Registrant, now: DateTime<Utc>) -> RegistrantReport {
        let window = match AlertWindow::parse(&r.alert_window) {
            Ok(w) => w,
            Err(e) => {
                tracing::warn!(registrant = %r.name, error = %format!("{e:#}"), "alert window invalid, skipping");
                counter!("hunter_registrants_skipped_total").increment(1);
                return RegistrantReport::new(r, RunOutcome::WindowInvalid, now).failed(None, format!("{e:#}"));
            }
        };

        match window.is_open(now) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(registrant = %r.name, "outside alert window");
                counter!("hunter_registrants_skipped_total").increment(1);
                return RegistrantReport::new(r, RunOutcome::WindowClosed, now);
            }
            Err(e) => {
                tracing::warn!(registrant = %r.name, error = %format!("{e:#}"), "alert window not evaluable, skipping");
                counter!("hunter_registrants_skipped_total").increment(1);
                return RegistrantReport::new(r, RunOutcome::WindowInvalid, now).failed(None, format!("{e:#}"));
            }
        }

        let locations = match self.fetch(&r.feed_partition).await {
            Ok(l) => l,
            Err(e) => {
                let status = e.downcast_ref::<FeedHttpError>().map(|h| h.status);
                tracing::warn!(
                    target: "feed",
                    registrant = %r.name,
                    partition = %r.feed_partition,
                    status = ?status,
                    error = %format!("{e:#}"),
                    "feed fetch failed"
                );
                counter!("hunter_feed_errors_total").increment(1);
                return RegistrantReport::new(r, RunOutcome::FeedFailed, now).failed(status, format!("{e:#}"));
            }
        };

        let tz = window.timezone();
        let today = window.today(now);
        let favorites = geo::filter_locations(&locations, r.center, r.radius_miles, &r.excluded_cities);

        let mut report = RegistrantReport::new(r, RunOutcome::Completed, now);
        report.stats = Some(radius_stats(&locations, r.center, &favorites));
        report.favorite_locations = favorites.iter().map(|l| LocationStatus::new(l, tz)).collect();

        let mut outgoing = Vec::new();
        for loc in favorites.iter().filter(|l| l.appointments_available) {
            let candidate = build_candidate(loc, tz);
            if !is_eligible(&candidate, r.eligibility_date, today) {
                report.ineligible += 1;
                continue;
            }
            let reservation = self.ledger.check_and_reserve(&candidate, r, today);
            if !reservation.is_novel {
                report.suppressed += 1;
                continue;
            }
            let new_days = reservation.new_entries.into_iter().map(|e| e.day).collect();
            outgoing.push((candidate, new_days));
        }
        counter!("hunter_alerts_suppressed_total").increment(report.suppressed as u64);

        for (candidate, new_days) in outgoing {
            let alert = OutboundAlert {
                destination: r.destination.clone(),
                subject: alert_subject(&candidate),
                body: candidate.message.clone(),
            };
            let error = match self.notifier.send(&alert).await {
                Ok(()) => {
                    counter!("hunter_alerts_sent_total").increment(1);
                    None
                }
                Err(e) => {
                    tracing::warn!(
                        registrant = %r.name,
                        location = candidate.location_id,
                        to = %r.destination.redacted(),
                        error = %format!("{e:#}"),
                        "alert send failed"
                    );
                    counter!("hunter_send_failures_total").increment(1);
                    Some(format!("{e:#}"))
                }
            };
            report.sent.push(SentAlert {
                location_id: candidate.location_id,
                name: candidate.name,
                address: candidate.address,
                new_days,
                delivered: error.is_none(),
                error,
            });
        }

        report
    }

    /// Run every registrant concurrently. Reports come back in input order; a
    /// panicked pipeline is logged and has no report.
    pub async fn run_all(&self, registrants: &[Registrant], now: DateTime<Utc>) -> Vec<RegistrantReport> {
        ensure_metrics_described();

        let mut set = JoinSet::new();
        for (i, r) in registrants.iter().cloned().enumerate() {
            let this = self.clone();
            set.spawn(async move { (i, this.run_registrant(&r, now).await) });
        }

        let mut out = Vec::with_capacity(registrants.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(pair) => out.push(pair),
                Err(e) => tracing::error!(error = %e, "registrant pipeline panicked"),
            }
        }
        out.sort_by_key(|(i, _)| *i);

        let reports: Vec<RegistrantReport> = out.into_iter().map(|(_, r)| r).collect();
        for rep in &reports {
            emit_summary(rep);
        }
        reports
    }
}

/// One structured record per registrant.
pub fn emit_summary(rep: &RegistrantReport) {
    let record = serde_json::to_string(rep).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"));
    tracing::info!(
        target: "summary",
        registrant = %rep.registrant,
        outcome = ?rep.outcome,
        success = rep.success,
        sent = rep.sent.len(),
        suppressed = rep.suppressed,
        record = %record,
        "registrant summary"
    );
}

/// Load the ledger, run every registrant, flush the ledger once.
pub async fn poll_cycle(
    feed: Arc<dyn FeedSource>,
    notifier: Arc<dyn Notifier>,
    store: &dyn LedgerStore,
    registrants: &[Registrant],
    feed_timeout: Duration,
    now: DateTime<Utc>,
) -> CycleReport {
    let ledger = Arc::new(DedupLedger::load(store).await);
    let orchestrator = RunOrchestrator::new(feed, notifier, ledger.clone()).with_feed_timeout(feed_timeout);

    let reports = orchestrator.run_all(registrants, now).await;

    let flush_error = match ledger.flush(store).await {
        Ok(()) => None,
        Err(e) => {
            tracing::error!(target: "ledger", error = %format!("{e:#}"), "ledger flush failed");
            Some(format!("{e:#}"))
        }
    };
    gauge!("hunter_cycle_last_run_ts").set(Utc::now().timestamp() as f64);

    let report = CycleReport {
        reports,
        ledger_entries: ledger.len(),
        flush_error,
    };
    tracing::info!(
        registrants = registrants.len(),
        sent = report.alerts_sent(),
        ledger_entries = report.ledger_entries,
        "poll cycle finished"
    );
    report
}

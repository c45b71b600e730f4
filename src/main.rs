//! Vaccine hunter — binary entrypoint.
//! Runs one poll cycle (or repeats on an interval when `HUNTER_REPEAT_SECS` is set),
//! wiring config, feed, notification channels and the ledger store.

use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::Utc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vaccine_hunter::config::{load_registrants_default, RunSettings};
use vaccine_hunter::feed::VaccineSpotterFeed;
use vaccine_hunter::ledger::JsonFileLedgerStore;
use vaccine_hunter::metrics::MetricsTextfile;
use vaccine_hunter::notify::NotifierMux;
use vaccine_hunter::orchestrator::{poll_cycle, CycleReport};

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vaccine_hunter=info,warn"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().flatten_event(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

async fn cycle(
    settings: &RunSettings,
    feed: &Arc<VaccineSpotterFeed>,
    notifier: &Arc<NotifierMux>,
    store: &JsonFileLedgerStore,
) -> Result<CycleReport> {
    let registrants = load_registrants_default()?;
    if registrants.is_empty() {
        tracing::warn!("no valid registrants configured");
    }
    Ok(poll_cycle(
        feed.clone(),
        notifier.clone(),
        store,
        &registrants,
        settings.feed_timeout,
        Utc::now(),
    )
    .await)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let settings = RunSettings::from_env();
    init_tracing(settings.log_json);

    let metrics = match settings.metrics_textfile.as_ref().map(MetricsTextfile::install) {
        Some(Ok(m)) => Some(m),
        Some(Err(e)) => {
            tracing::warn!(error = %format!("{e:#}"), "metrics disabled");
            None
        }
        None => None,
    };

    let feed = Arc::new(VaccineSpotterFeed::new(settings.feed_base_url.clone()).with_timeout(settings.feed_timeout));
    let notifier = Arc::new(NotifierMux::from_env().with_timeout(settings.notify_timeout));
    let store = JsonFileLedgerStore::new(settings.ledger_path.clone());

    let Some(period) = settings.repeat_every else {
        let report = cycle(&settings, &feed, &notifier, &store).await?;
        if let Some(m) = &metrics {
            if let Err(e) = m.write().await {
                tracing::warn!(error = %format!("{e:#}"), "metrics write failed");
            }
        }
        if let Some(err) = report.flush_error {
            bail!("ledger flush failed: {err}");
        }
        return Ok(());
    };

    tracing::info!(every_secs = period.as_secs(), "repeat mode");
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        match cycle(&settings, &feed, &notifier, &store).await {
            Ok(report) => {
                if let Some(err) = report.flush_error {
                    tracing::error!(error = %err, "cycle ended without persisting the ledger");
                }
            }
            Err(e) => tracing::warn!(error = %format!("{e:#}"), "cycle skipped"),
        }
        if let Some(m) = &metrics {
            if let Err(e) = m.write().await {
                tracing::warn!(error = %format!("{e:#}"), "metrics write failed");
            }
        }
    }
}

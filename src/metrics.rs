// src/metrics.rs
use std::path::PathBuf;

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metric descriptions (so series carry help text once rendered).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("hunter_feed_errors_total", "Feed fetches that failed or timed out.");
        describe_counter!("hunter_alerts_sent_total", "Alerts handed to a channel successfully.");
        describe_counter!(
            "hunter_alerts_suppressed_total",
            "Candidates dropped because every day was already in the ledger."
        );
        describe_counter!("hunter_send_failures_total", "Alerts whose channel send failed.");
        describe_counter!(
            "hunter_registrants_skipped_total",
            "Registrant runs skipped by a closed or invalid alert window."
        );
        describe_gauge!("hunter_ledger_entries", "Entries in the dedup ledger after the last flush.");
        describe_gauge!("hunter_cycle_last_run_ts", "Unix ts when the last poll cycle finished.");
    });
}

/// Prometheus recorder whose exposition is written to a file after each cycle,
/// for node_exporter's textfile collector.
pub struct MetricsTextfile {
    handle: PrometheusHandle,
    path: PathBuf,
}

impl MetricsTextfile {
    pub fn install(path: impl Into<PathBuf>) -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self {
            handle,
            path: path.into(),
        })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    pub async fn write(&self) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await.ok();
        }
        tokio::fs::write(&self.path, self.render())
            .await
            .with_context(|| format!("write metrics {}", self.path.display()))
    }
}

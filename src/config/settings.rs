// src/config/settings.rs
use std::path::PathBuf;
use std::time::Duration;

use crate::feed::DEFAULT_FEED_BASE_URL;
use crate::ledger::DEFAULT_LEDGER_PATH;

/// Process-level settings, read from the environment (after `.env` is loaded).
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub ledger_path: PathBuf,
    pub feed_base_url: String,
    pub feed_timeout: Duration,
    pub notify_timeout: Duration,
    /// `None`: run one cycle and exit.
    pub repeat_every: Option<Duration>,
    pub metrics_textfile: Option<PathBuf>,
    pub log_json: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            ledger_path: PathBuf::from(DEFAULT_LEDGER_PATH),
            feed_base_url: DEFAULT_FEED_BASE_URL.to_string(),
            feed_timeout: Duration::from_secs(20),
            notify_timeout: Duration::from_secs(15),
            repeat_every: None,
            metrics_textfile: None,
            log_json: false,
        }
    }
}

fn secs(v: Option<String>) -> Option<Duration> {
    v.and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
        .map(Duration::from_secs)
}

impl RunSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Unparseable values fall back to defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let non_empty = |k: &str| get(k).filter(|v| !v.trim().is_empty());

        Self {
            ledger_path: non_empty("LEDGER_PATH").map(PathBuf::from).unwrap_or(d.ledger_path),
            feed_base_url: non_empty("FEED_BASE_URL").unwrap_or(d.feed_base_url),
            feed_timeout: secs(get("FEED_TIMEOUT_SECS")).unwrap_or(d.feed_timeout),
            notify_timeout: secs(get("NOTIFY_TIMEOUT_SECS")).unwrap_or(d.notify_timeout),
            repeat_every: secs(get("HUNTER_REPEAT_SECS")),
            metrics_textfile: non_empty("METRICS_TEXTFILE_PATH").map(PathBuf::from),
            log_json: get("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_and_overrides() {
        let empty = RunSettings::from_lookup(|_| None);
        assert_eq!(empty, RunSettings::default());

        let vars: HashMap<&str, &str> = [
            ("LEDGER_PATH", "/tmp/l.json"),
            ("FEED_TIMEOUT_SECS", "5"),
            ("NOTIFY_TIMEOUT_SECS", "abc"),
            ("HUNTER_REPEAT_SECS", "300"),
            ("LOG_FORMAT", "JSON"),
        ]
        .into_iter()
        .collect();
        let s = RunSettings::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(s.ledger_path, PathBuf::from("/tmp/l.json"));
        assert_eq!(s.feed_timeout, Duration::from_secs(5));
        assert_eq!(s.notify_timeout, Duration::from_secs(15));
        assert_eq!(s.repeat_every, Some(Duration::from_secs(300)));
        assert!(s.log_json);
    }
}

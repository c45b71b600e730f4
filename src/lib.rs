// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod feed;
pub mod registrant;

// Decision engine: filter → candidate → eligibility → dedup, gated by the alert window
pub mod candidate;
pub mod eligibility;
pub mod geo;
pub mod ledger;
pub mod window;

// Cycle orchestration, notifications, observability
pub mod metrics;
pub mod notify;
pub mod orchestrator;
pub mod summary;

// ---- Re-exports for stable public API ----
pub use crate::candidate::{build_candidate, AlertCandidate, AppointmentDays};
pub use crate::feed::{FeedSource, GeoPoint, LocationSnapshot};
pub use crate::ledger::{DedupLedger, LedgerEntry, LedgerStore, Reservation};
pub use crate::notify::{Notifier, NotifierMux, OutboundAlert};
pub use crate::orchestrator::{poll_cycle, CycleReport, RunOrchestrator};
pub use crate::registrant::{Destination, DestinationKey, DestinationKind, Registrant};

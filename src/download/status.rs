//! In-memory status store for background downloads.
//!
//! Entries are keyed by operation key and expire a fixed time after their
//! last update, so finished and failed downloads do not pile up. Time comes
//! from an injected [`Clock`].

use crate::core::config;
use crate::download::source::ProgressSink;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Highest progress reported before the download is marked finished.
const MAX_IN_FLIGHT_PROGRESS: f64 = 99.99;

/// Source of "now" for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    Downloading,
    Completed,
    Error,
}

/// What `GET /status/{key}` returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationStatus {
    pub status: StatusState,
    /// Percent, two decimals
    pub progress: f64,
    pub filename: String,
    pub error: Option<String>,
}

impl OperationStatus {
    fn downloading() -> Self {
        Self {
            status: StatusState::Downloading,
            progress: 0.0,
            filename: String::new(),
            error: None,
        }
    }
}

#[derive(Debug, Clone)]
struct StatusEntry {
    status: OperationStatus,
    updated_at: DateTime<Utc>,
}

pub struct StatusTracker {
    entries: DashMap<String, StatusEntry>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl StatusTracker {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            ttl,
        }
    }

    /// Tracker on the wall clock with the configured TTL.
    pub fn from_env() -> Self {
        Self::new(Arc::new(SystemClock), config::status::ttl())
    }

    fn fresh_entry(&self) -> StatusEntry {
        StatusEntry {
            status: OperationStatus::downloading(),
            updated_at: self.clock.now(),
        }
    }

    /// Starts tracking `key` as downloading at 0%, replacing any previous entry.
    pub fn create(&self, key: &str) {
        self.entries.insert(key.to_string(), self.fresh_entry());
    }

    /// Starts tracking under `base_key`, or `base_key_N` when that is taken.
    pub fn create_unique(&self, base_key: &str) -> String {
        let mut suffix = 0u32;
        loop {
            let candidate = if suffix == 0 {
                base_key.to_string()
            } else {
                format!("{}_{}", base_key, suffix)
            };
            match self.entries.entry(candidate.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(self.fresh_entry());
                    return candidate;
                }
                Entry::Occupied(_) => suffix += 1,
            }
        }
    }

    /// Records byte progress. Ignored when `total` is 0, the key is unknown or
    /// the operation already finished. Progress never goes backwards.
    pub fn update_progress(&self, key: &str, downloaded: u64, total: u64) {
        if total == 0 {
            return;
        }
        let Some(mut entry) = self.entries.get_mut(key) else {
            return;
        };
        if entry.status.status != StatusState::Downloading {
            return;
        }
        let percent = ((downloaded as f64 / total as f64) * 100.0 * 100.0).round() / 100.0;
        let percent = percent.clamp(0.0, MAX_IN_FLIGHT_PROGRESS);
        if percent > entry.status.progress {
            entry.status.progress = percent;
        }
        entry.updated_at = self.clock.now();
    }

    pub fn mark_finished(&self, key: &str, filename: &str) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.status.status = StatusState::Completed;
            entry.status.progress = 100.0;
            entry.status.filename = filename.to_string();
            entry.updated_at = self.clock.now();
        } else {
            log::warn!("mark_finished for unknown status key {}", key);
        }
    }

    pub fn mark_error(&self, key: &str, summary: &str) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.status.status = StatusState::Error;
            entry.status.error = Some(summary.to_string());
            entry.updated_at = self.clock.now();
        } else {
            log::warn!("mark_error for unknown status key {}", key);
        }
    }

    pub fn get(&self, key: &str) -> Option<OperationStatus> {
        self.entries.get(key).map(|entry| entry.status.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops entries not updated within the TTL. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let Ok(ttl) = chrono::Duration::from_std(self.ttl) else {
            return 0;
        };
        let cutoff = self.clock.now() - ttl;
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = entry.updated_at > cutoff;
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            log::debug!("Purged {} expired status entries", removed);
        }
        removed
    }

    /// Runs [`purge_expired`](Self::purge_expired) every `interval` until the task is aborted.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.purge_expired();
            }
        })
    }
}

/// Progress sink bound to one status key.
pub struct KeyedProgress {
    tracker: Arc<StatusTracker>,
    key: String,
}

impl KeyedProgress {
    pub fn new(tracker: Arc<StatusTracker>, key: impl Into<String>) -> Self {
        Self {
            tracker,
            key: key.into(),
        }
    }
}

impl ProgressSink for KeyedProgress {
    fn on_progress(&self, downloaded: u64, total: u64) {
        self.tracker.update_progress(&self.key, downloaded, total);
    }
}

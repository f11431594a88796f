//! Audit ring for not-found lookups

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// One recorded miss.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingRecord {
    pub timestamp: String,
    pub path: String,
    pub normalized: String,
    pub tried: Vec<String>,
}

/// Counters for the stats surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingStats {
    pub total: u64,
    pub recorded: usize,
    pub last_path: Option<String>,
}

/// Append-only bounded ring of missed paths. Notification (a `warn!`)
/// is throttled by a cooldown so a scraping client cannot flood the log;
/// every miss is still recorded.
pub struct MissingLog {
    state: Mutex<State>,
    cooldown: Duration,
    total: AtomicU64,
}

struct State {
    records: VecDeque<MissingRecord>,
    last_notice: Option<Instant>,
}

impl MissingLog {
    pub const CAPACITY: usize = 1_000;

    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(State {
                records: VecDeque::with_capacity(64),
                last_notice: None,
            }),
            cooldown,
            total: AtomicU64::new(0),
        }
    }

    pub fn record(&self, path: &str, normalized: &str, tried: Vec<String>) {
        self.total.fetch_add(1, Ordering::Relaxed);

        let mut state = self.state.lock();
        if state.records.len() == Self::CAPACITY {
            state.records.pop_front();
        }
        state.records.push_back(MissingRecord {
            timestamp: Utc::now().to_rfc3339(),
            path: path.to_owned(),
            normalized: normalized.to_owned(),
            tried,
        });

        let due = state
            .last_notice
            .map_or(true, |at| at.elapsed() >= self.cooldown);
        if due {
            state.last_notice = Some(Instant::now());
            warn!(path = %path, "path not found in any archive");
        } else {
            debug!(path = %path, "path not found in any archive (throttled)");
        }
    }

    pub fn stats(&self) -> MissingStats {
        let state = self.state.lock();
        MissingStats {
            total: self.total.load(Ordering::Relaxed),
            recorded: state.records.len(),
            last_path: state.records.back().map(|r| r.path.clone()),
        }
    }

    /// Copy of the current ring contents, oldest first.
    pub fn snapshot(&self) -> Vec<MissingRecord> {
        self.state.lock().records.iter().cloned().collect()
    }
}

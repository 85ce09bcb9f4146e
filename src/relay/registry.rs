//! In-memory view of running relays and how finished ones ended.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use super::{RelayOutcome, RelayReport};

/// Finished relays kept for the debug view
const RECENT_LIMIT: usize = 32;

/// Diagnostic text kept per finished relay, in characters
const DIAGNOSTICS_EXCERPT_CHARS: usize = 2048;

/// A relay that is currently streaming
#[derive(Debug, Clone, Serialize)]
pub struct ActiveRelay {
    pub id: Uuid,
    pub target: String,
    pub started_at: DateTime<Utc>,
}

/// A relay that has ended, as reported by the relay itself
#[derive(Debug, Clone, Serialize)]
pub struct FinishedRelay {
    pub id: Uuid,
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RelayOutcome,
    pub bytes_relayed: u64,
    pub pid: Option<u32>,
    /// `None` when killed by a signal or never reaped
    pub exit_code: Option<i32>,
    pub kills_issued: u32,
    pub diagnostics: Option<String>,
}

/// Counters by outcome, plus spawn failures
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub graceful_end: u64,
    pub forced_end: u64,
    pub client_disconnected: u64,
    pub spawn_failures: u64,
}

/// Point-in-time copy of the registry
#[derive(Debug, Serialize)]
pub struct RegistrySnapshot {
    pub active_count: usize,
    pub active: Vec<ActiveRelay>,
    /// Newest first
    pub recent: Vec<FinishedRelay>,
    pub outcomes: OutcomeCounts,
    pub bytes_relayed: u64,
}

#[derive(Debug, Default)]
pub struct RelayRegistry {
    active: DashMap<Uuid, ActiveRelay>,
    recent: Mutex<VecDeque<FinishedRelay>>,
    graceful_end: AtomicU64,
    forced_end: AtomicU64,
    client_disconnected: AtomicU64,
    spawn_failures: AtomicU64,
    bytes_relayed: AtomicU64,
}

impl RelayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a starting relay. The entry is removed when the guard drops.
    pub fn begin(self: &Arc<Self>, target: &str) -> RelayGuard {
        let id = Uuid::new_v4();
        self.active.insert(
            id,
            ActiveRelay {
                id,
                target: target.to_string(),
                started_at: Utc::now(),
            },
        );
        RelayGuard {
            registry: Arc::clone(self),
            id,
        }
    }

    /// Move the relay behind `guard` from active to finished.
    ///
    /// Counters and history are updated before the active entry goes away.
    pub fn finish(&self, guard: RelayGuard, report: &RelayReport) {
        let entry = self.active.get(&guard.id).map(|r| r.value().clone());

        self.record_outcome(report.outcome);
        self.bytes_relayed
            .fetch_add(report.bytes_relayed, Ordering::Relaxed);

        if let Some(relay) = entry {
            let finished = FinishedRelay {
                id: relay.id,
                target: relay.target,
                started_at: relay.started_at,
                finished_at: Utc::now(),
                outcome: report.outcome,
                bytes_relayed: report.bytes_relayed,
                pid: report.pid,
                exit_code: report.exit_status.and_then(|s| s.code()),
                kills_issued: report.kills_issued,
                diagnostics: report
                    .diagnostics
                    .as_ref()
                    .map(|d| d.chars().take(DIAGNOSTICS_EXCERPT_CHARS).collect()),
            };
            let mut recent = self.recent.lock();
            if recent.len() == RECENT_LIMIT {
                recent.pop_back();
            }
            recent.push_front(finished);
        }

        let id = guard.id;
        drop(guard);
        tracing::debug!(
            "Relay {} finished ({}), {} still active",
            id,
            report.outcome,
            self.active_count()
        );
    }

    fn record_outcome(&self, outcome: RelayOutcome) {
        let counter = match outcome {
            RelayOutcome::GracefulEnd => &self.graceful_end,
            RelayOutcome::ForcedEnd => &self.forced_end,
            RelayOutcome::ClientDisconnected => &self.client_disconnected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_spawn_failure(&self) {
        self.spawn_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn outcomes(&self) -> OutcomeCounts {
        OutcomeCounts {
            graceful_end: self.graceful_end.load(Ordering::Relaxed),
            forced_end: self.forced_end.load(Ordering::Relaxed),
            client_disconnected: self.client_disconnected.load(Ordering::Relaxed),
            spawn_failures: self.spawn_failures.load(Ordering::Relaxed),
        }
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let mut active: Vec<_> = self.active.iter().map(|r| r.value().clone()).collect();
        active.sort_by_key(|r| r.started_at);
        RegistrySnapshot {
            active_count: active.len(),
            active,
            recent: self.recent.lock().iter().cloned().collect(),
            outcomes: self.outcomes(),
            bytes_relayed: self.bytes_relayed.load(Ordering::Relaxed),
        }
    }
}

/// Keeps a relay listed as active until dropped
#[derive(Debug)]
pub struct RelayGuard {
    registry: Arc<RelayRegistry>,
    id: Uuid,
}

impl RelayGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for RelayGuard {
    fn drop(&mut self) {
        self.registry.active.remove(&self.id);
    }
}

//! Request → cell correlation.
//!
//! Every execute request gets a fresh [`RequestId`]; the kernel echoes it on
//! each reply and output. The table maps it back to the originating cell.
//!
//! A request can produce any number of events, so [`CorrelationTable::resolve`]
//! never removes. Entries leave the table when the kernel signals completion
//! ([`CorrelationTable::close`]) or when they outlive the configured TTL
//! ([`CorrelationTable::evict_expired`]).

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use cellbridge_core::RequestId;
use cellbridge_core::notebook::CellRef;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct Entry {
    cell_ref: CellRef,
    recorded_at: Instant,
}

/// Maps in-flight request ids to the cell that issued them.
#[derive(Debug)]
pub struct CorrelationTable {
    entries: HashMap<RequestId, Entry>,
    /// Insertion-ordered `(recorded_at, id)` pairs. May hold stale pairs for
    /// ids that were closed or re-recorded; eviction skips those.
    expiry: VecDeque<(Instant, RequestId)>,
    ttl: Option<Duration>,
}

impl CorrelationTable {
    /// Create a table whose entries expire after `ttl` (`None`: never).
    #[must_use]
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: HashMap::new(),
            expiry: VecDeque::new(),
            ttl,
        }
    }

    /// Configured entry lifetime.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Record that `request_id` was issued for `cell_ref`, replacing any
    /// previous entry for the same id.
    pub fn record(&mut self, request_id: RequestId, cell_ref: CellRef) {
        let recorded_at = Instant::now();
        if self.ttl.is_some() {
            self.expiry.push_back((recorded_at, request_id.clone()));
        }
        let _ = self.entries.insert(
            request_id,
            Entry {
                cell_ref,
                recorded_at,
            },
        );
    }

    /// Look up the cell for `request_id`. Expired entries resolve to `None`.
    #[must_use]
    pub fn resolve(&self, request_id: &RequestId) -> Option<&CellRef> {
        let entry = self.entries.get(request_id)?;
        if self.is_expired(entry.recorded_at, Instant::now()) {
            return None;
        }
        Some(&entry.cell_ref)
    }

    /// Remove the entry for `request_id`, returning its cell.
    pub fn close(&mut self, request_id: &RequestId) -> Option<CellRef> {
        self.entries.remove(request_id).map(|entry| entry.cell_ref)
    }

    /// Drop every entry recorded at least one TTL before `now`.
    ///
    /// Returns the number of entries removed.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let mut evicted = 0;
        while let Some((recorded_at, _)) = self.expiry.front() {
            if !self.is_expired(*recorded_at, now) {
                break;
            }
            let Some((recorded_at, request_id)) = self.expiry.pop_front() else {
                break;
            };
            // Only remove if this pair still describes the live entry.
            if self
                .entries
                .get(&request_id)
                .is_some_and(|entry| entry.recorded_at == recorded_at)
            {
                let _ = self.entries.remove(&request_id);
                evicted += 1;
            }
        }
        if evicted > 0 {
            debug!(evicted, remaining = self.entries.len(), "evicted expired correlations");
        }
        evicted
    }

    /// Number of live entries (including expired ones not yet evicted).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, recorded_at: Instant, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.saturating_duration_since(recorded_at) >= ttl)
    }
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new(None)
    }
}

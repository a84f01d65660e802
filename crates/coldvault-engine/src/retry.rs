//! Cross-sweep retry ledger
//!
//! Tracks per-document transient-failure attempts so backoff spans sweeps:
//! a document inside its backoff window is skipped by the current sweep and
//! picked up again once the window passes.

use crate::config::RetryPolicy;
use coldvault_domain::DocumentId;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy)]
struct RetryEntry {
    attempts: u32,
    next_attempt_at: u64,
}

/// What a recorded failure means for the document's future
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    /// The document will be retried once its backoff window passes
    WillRetry {
        /// Failed attempts so far
        attempts: u32,

        /// Epoch seconds when the document becomes eligible again
        next_attempt_at: u64,
    },

    /// The retry budget is exhausted; the ledger entry is reset so a later
    /// sweep starts a fresh budget
    Exhausted,
}

/// Per-document transient-failure bookkeeping
#[derive(Debug)]
pub struct RetryLedger {
    policy: RetryPolicy,
    entries: Mutex<HashMap<DocumentId, RetryEntry>>,
}

impl RetryLedger {
    /// An empty ledger under the given policy
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Whether the document is inside its backoff window at `now`, and until
    /// when
    pub fn in_backoff(&self, id: DocumentId, now: u64) -> Option<u64> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(&id)
            .filter(|e| e.next_attempt_at > now)
            .map(|e| e.next_attempt_at)
    }

    /// Record a transient failure at `now`
    pub fn record_failure(&self, id: DocumentId, now: u64) -> RetryDisposition {
        let mut entries = self.entries.lock().unwrap();
        let attempts = entries.get(&id).map(|e| e.attempts).unwrap_or(0) + 1;
        if attempts >= self.policy.max_attempts {
            entries.remove(&id);
            return RetryDisposition::Exhausted;
        }
        let next_attempt_at = now.saturating_add(self.policy.backoff(attempts).as_secs());
        entries.insert(
            id,
            RetryEntry {
                attempts,
                next_attempt_at,
            },
        );
        RetryDisposition::WillRetry {
            attempts,
            next_attempt_at,
        }
    }

    /// Forget the document (called on success or permanent failure)
    pub fn clear(&self, id: DocumentId) {
        self.entries.lock().unwrap().remove(&id);
    }

    /// How many documents the ledger currently tracks
    pub fn tracked(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

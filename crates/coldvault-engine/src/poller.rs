//! Restore poller: reconciles provider restore facts into record intent
//!
//! The poller is the only path that turns what the backend reports (a
//! restore finished, a window lapsed) into record updates. Everything else
//! reads fact without writing it.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{emit, EventKind, EventSink};
use crate::now_epoch;
use crate::pool::{run_batch, CancelToken};
use crate::retry::{RetryDisposition, RetryLedger};
use coldvault_domain::{DocumentId, DocumentRecord, RestoreStatus, TierStateMachine, TransitionOutcome};
use coldvault_provider::{ProviderRegistry, RestoreProbe};
use coldvault_store::{EligibilityFilter, MetadataStore};
use serde::Serialize;
use std::sync::Arc;

/// What the check did to one document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum RestoreAction {
    /// The backend reported the restore done; the record is now Restored
    Completed {
        /// When the restored copy lapses
        expires_at: u64,
    },

    /// The restore job is still running (or the backend has not started it)
    StillInProgress,

    /// The restore window lapsed; the record is back to Archived
    Expired,

    /// The document sits inside its transient-failure backoff window
    SkippedBackoff {
        /// When it becomes eligible again
        next_attempt_at: u64,
    },

    /// The probe or commit failed; the check continued
    Failed {
        /// What went wrong
        error: String,

        /// Whether a later check retries it
        retryable: bool,
    },
}

/// Per-document line item in a [`RestoreCheckReport`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestoreDetail {
    /// Which document
    pub document_id: DocumentId,

    /// What happened to it
    pub action: RestoreAction,
}

/// Summary of one restore check
#[derive(Debug, Clone, Serialize)]
pub struct RestoreCheckReport {
    /// Documents examined (in-progress plus expiring)
    pub checked: usize,

    /// Restores that completed this check
    pub completed: usize,

    /// Restore windows that lapsed this check
    pub expired: usize,

    /// Events successfully handed to the sink
    pub events_published: usize,

    /// Documents that failed
    pub failed: usize,

    /// Whether the check stopped early on cancellation
    pub cancelled: bool,

    /// Per-document outcomes
    pub details: Vec<RestoreDetail>,
}

/// Polls in-progress restores and lapses expired windows
pub struct RestorePoller {
    config: EngineConfig,
    store: Arc<dyn MetadataStore>,
    providers: Arc<ProviderRegistry>,
    events: Arc<dyn EventSink>,
    ledger: RetryLedger,
}

impl RestorePoller {
    /// Create a poller over the given store, providers, and event sink
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn MetadataStore>,
        providers: Arc<ProviderRegistry>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let ledger = RetryLedger::new(config.retry.clone());
        Self {
            config,
            store,
            providers,
            events,
            ledger,
        }
    }

    /// Run one check: complete finished restores, lapse expired windows
    ///
    /// Idempotent under overlap: the state machine no-ops plus conditional
    /// commits guarantee each completion and each expiry publishes at most
    /// once, no matter how many checker runs race.
    pub async fn run_check(&self, cancel: &CancelToken) -> Result<RestoreCheckReport, EngineError> {
        let now = now_epoch();
        let mut details = Vec::new();
        let mut events_published = 0usize;

        // Phase 1: probe every in-progress restore
        let in_progress = self.store.list_eligible(&EligibilityFilter {
            restore_status: Some(RestoreStatus::InProgress),
            ..Default::default()
        })?;
        let mut runnable = Vec::new();
        for record in in_progress {
            match self.ledger.in_backoff(record.document_id, now) {
                Some(next_attempt_at) => details.push(RestoreDetail {
                    document_id: record.document_id,
                    action: RestoreAction::SkippedBackoff { next_attempt_at },
                }),
                None => runnable.push(record),
            }
        }
        let outcome = run_batch(runnable, self.config.max_in_flight, cancel, |record| {
            self.check_one(record, now)
        })
        .await;
        for (detail, published) in outcome.results {
            if published {
                events_published += 1;
            }
            details.push(detail);
        }
        let mut cancelled = outcome.cancelled;

        // Phase 2: lapse expired windows; no provider calls, so sequential
        let expiring = self.store.list_eligible(&EligibilityFilter {
            restore_status: Some(RestoreStatus::Restored),
            expiry_before: Some(now),
            ..Default::default()
        })?;
        for record in expiring {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            if let Some((detail, published)) = self.expire_one(record, now) {
                if published {
                    events_published += 1;
                }
                details.push(detail);
            }
        }

        let report = RestoreCheckReport {
            checked: details.len(),
            completed: details
                .iter()
                .filter(|d| matches!(d.action, RestoreAction::Completed { .. }))
                .count(),
            expired: details
                .iter()
                .filter(|d| matches!(d.action, RestoreAction::Expired))
                .count(),
            events_published,
            failed: details
                .iter()
                .filter(|d| matches!(d.action, RestoreAction::Failed { .. }))
                .count(),
            cancelled,
            details,
        };
        tracing::info!(
            "Restore check completed: {} checked, {} completed, {} expired, {} failed",
            report.checked,
            report.completed,
            report.expired,
            report.failed
        );
        Ok(report)
    }

    /// Probe one in-progress restore; returns the detail and whether an
    /// event went out
    async fn check_one(&self, record: DocumentRecord, now: u64) -> (RestoreDetail, bool) {
        let id = record.document_id;
        match self.try_complete(&record, now).await {
            Ok(Some(expires_at)) => {
                self.ledger.clear(id);
                let published = emit(
                    self.events.as_ref(),
                    EventKind::RestoreReady,
                    id,
                    serde_json::json!({ "restore_expiry": expires_at }),
                );
                (
                    RestoreDetail {
                        document_id: id,
                        action: RestoreAction::Completed { expires_at },
                    },
                    published,
                )
            }
            Ok(None) => {
                self.ledger.clear(id);
                (
                    RestoreDetail {
                        document_id: id,
                        action: RestoreAction::StillInProgress,
                    },
                    false,
                )
            }
            Err(e) => {
                let retryable = e.is_retryable();
                if retryable {
                    if let RetryDisposition::Exhausted = self.ledger.record_failure(id, now) {
                        tracing::error!("Document {} exhausted its restore-check budget: {}", id, e);
                    }
                } else {
                    self.ledger.clear(id);
                    tracing::error!("Restore check for document {} failed permanently: {}", id, e);
                }
                (
                    RestoreDetail {
                        document_id: id,
                        action: RestoreAction::Failed {
                            error: e.to_string(),
                            retryable,
                        },
                    },
                    false,
                )
            }
        }
    }

    /// Probe and, if the backend says retrievable, commit the completion.
    /// Returns the committed expiry, or None when the restore is still
    /// pending.
    async fn try_complete(
        &self,
        record: &DocumentRecord,
        now: u64,
    ) -> Result<Option<u64>, EngineError> {
        let provider = self
            .providers
            .get(record.provider)
            .ok_or(EngineError::UnknownProvider(record.provider))?;
        let probe = provider.archive_status(&record.storage_path).await?;
        if !probe.is_retrievable() {
            return Ok(None);
        }

        // Backends that report an expiry win; otherwise the configured
        // restore window starts now
        let expires_at = match probe.restore {
            RestoreProbe::Ready {
                expires_at: Some(expiry),
            } => expiry,
            _ => now + self.config.restore_window(),
        };

        match TierStateMachine::complete_restore(record, expires_at)? {
            TransitionOutcome::Applied(updated) => {
                if !self.store.update_if_version(&updated, record.version)? {
                    return Err(EngineError::VersionConflict {
                        document_id: record.document_id,
                    });
                }
                tracing::debug!(
                    "Restore of document {} completed (expires {})",
                    record.document_id,
                    expires_at
                );
                Ok(Some(expires_at))
            }
            // Another checker run got there first
            TransitionOutcome::NoOp => Ok(None),
        }
    }

    /// Lapse one expired window; `None` when a concurrent run already
    /// expired (or renewed) it
    fn expire_one(&self, record: DocumentRecord, now: u64) -> Option<(RestoreDetail, bool)> {
        let id = record.document_id;
        let failed = |error: String, retryable: bool| {
            Some((
                RestoreDetail {
                    document_id: id,
                    action: RestoreAction::Failed { error, retryable },
                },
                false,
            ))
        };
        let outcome = match TierStateMachine::expire_restore(&record, now) {
            Ok(outcome) => outcome,
            Err(e) => return failed(e.to_string(), false),
        };
        match outcome {
            TransitionOutcome::Applied(updated) => {
                match self.store.update_if_version(&updated, record.version) {
                    Ok(true) => {
                        tracing::debug!("Restore window of document {} lapsed", id);
                        let published = emit(
                            self.events.as_ref(),
                            EventKind::RestoreExpired,
                            id,
                            serde_json::json!({}),
                        );
                        Some((
                            RestoreDetail {
                                document_id: id,
                                action: RestoreAction::Expired,
                            },
                            published,
                        ))
                    }
                    Ok(false) => failed(
                        EngineError::VersionConflict { document_id: id }.to_string(),
                        true,
                    ),
                    Err(e) => failed(e.to_string(), false),
                }
            }
            TransitionOutcome::NoOp => None,
        }
    }
}

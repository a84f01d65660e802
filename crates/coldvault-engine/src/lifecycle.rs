//! Lifecycle scheduler: age-based tier sweeps

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{emit, EventKind, EventSink};
use crate::pool::{run_batch, CancelToken};
use crate::retry::{RetryDisposition, RetryLedger};
use crate::now_epoch;
use coldvault_domain::{
    DocumentId, DocumentRecord, StorageTier, TierStateMachine, TransitionOutcome,
};
use coldvault_provider::ProviderRegistry;
use coldvault_store::{EligibilityFilter, MetadataStore};
use serde::Serialize;
use std::sync::Arc;

/// One document the eligibility computation selected, with its intended move
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleCandidate {
    /// Which document
    pub document_id: DocumentId,

    /// Whole days since ingest, as of the computation
    pub age_days: u64,

    /// Tier the record currently holds
    pub current_tier: StorageTier,

    /// Tier its age entitles it to
    pub target_tier: StorageTier,
}

/// What the sweep did (or would have done) to one document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum SweepAction {
    /// The document moved and the move was committed
    Transitioned {
        /// Tier before the move
        from: StorageTier,

        /// Tier after the move
        to: StorageTier,
    },

    /// Dry-run: the document would have moved
    WouldTransition {
        /// Tier before the hypothetical move
        from: StorageTier,

        /// Tier it would move to
        to: StorageTier,
    },

    /// The document sits inside its transient-failure backoff window
    SkippedBackoff {
        /// When it becomes eligible again
        next_attempt_at: u64,
    },

    /// The record was already at its target when processed
    AlreadyThere,

    /// The document failed; the sweep continued
    Failed {
        /// What went wrong
        error: String,

        /// Whether a later sweep retries it
        retryable: bool,
    },
}

/// Per-document line item in a [`SweepReport`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepDetail {
    /// Which document
    pub document_id: DocumentId,

    /// What happened to it
    pub action: SweepAction,
}

/// Summary of one lifecycle sweep
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    /// Epoch seconds when the sweep started
    pub started_at: u64,

    /// Epoch seconds when the sweep finished
    pub completed_at: u64,

    /// Whether this was a dry run
    pub dry_run: bool,

    /// Whether the sweep stopped early on cancellation
    pub cancelled: bool,

    /// Documents examined
    pub processed: usize,

    /// Documents moved (and committed)
    pub transitioned: usize,

    /// Documents that failed
    pub failed: usize,

    /// Per-document outcomes
    pub details: Vec<SweepDetail>,
}

impl SweepReport {
    fn from_details(started_at: u64, dry_run: bool, cancelled: bool, details: Vec<SweepDetail>) -> Self {
        let transitioned = details
            .iter()
            .filter(|d| matches!(d.action, SweepAction::Transitioned { .. }))
            .count();
        let failed = details
            .iter()
            .filter(|d| matches!(d.action, SweepAction::Failed { .. }))
            .count();
        Self {
            started_at,
            completed_at: now_epoch(),
            dry_run,
            cancelled,
            processed: details.len(),
            transitioned,
            failed,
            details,
        }
    }
}

/// Moves documents to colder tiers as they age past the configured thresholds
///
/// Per-document failures are recorded in the report and the sweep continues;
/// transient failures additionally enter the retry ledger so the document is
/// skipped until its backoff window passes.
pub struct LifecycleScheduler {
    config: EngineConfig,
    store: Arc<dyn MetadataStore>,
    providers: Arc<ProviderRegistry>,
    events: Arc<dyn EventSink>,
    ledger: RetryLedger,
}

impl LifecycleScheduler {
    /// Create a scheduler over the given store, providers, and event sink
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

    /// The tier a document of this age is entitled to, if colder than warm
    fn target_for_age(&self, age_secs: u64) -> Option<StorageTier> {
        if age_secs >= self.config.deep_archive_after() {
            Some(StorageTier::DeepArchive)
        } else if age_secs >= self.config.archive_after() {
            Some(StorageTier::Archive)
        } else {
            None
        }
    }

    fn eligible_records(
        &self,
        as_of: u64,
    ) -> Result<Vec<(DocumentRecord, StorageTier)>, EngineError> {
        // Anything younger than the archive threshold cannot be eligible,
        // and DeepArchive has nowhere colder to go
        let filter = EligibilityFilter {
            created_before: Some(as_of.saturating_sub(self.config.archive_after()).saturating_add(1)),
            tiers: Some(vec![
                StorageTier::Standard,
                StorageTier::Infrequent,
                StorageTier::Archive,
            ]),
            ..Default::default()
        };
        let mut eligible = Vec::new();
        for record in self.store.list_eligible(&filter)? {
            let age_secs = as_of.saturating_sub(record.created_at);
            if let Some(target) = self.target_for_age(age_secs) {
                if record.storage_tier < target {
                    eligible.push((record, target));
                }
            }
        }
        Ok(eligible)
    }

    /// The eligibility computation as data: which documents would move where
    /// as of the given instant
    pub fn list_eligible(&self, as_of: u64) -> Result<Vec<LifecycleCandidate>, EngineError> {
        Ok(self
            .eligible_records(as_of)?
            .into_iter()
            .map(|(record, target)| LifecycleCandidate {
                document_id: record.document_id,
                age_days: record.age_days(as_of),
                current_tier: record.storage_tier,
                target_tier: target,
            })
            .collect())
    }

    /// Run one sweep
    ///
    /// Dry-run computes the same eligibility list and intended targets but
    /// performs no provider calls, no metadata writes, and no event
    /// publishes.
    pub async fn run_sweep(
        &self,
        dry_run: bool,
        cancel: &CancelToken,
    ) -> Result<SweepReport, EngineError> {
        let started_at = now_epoch();
        let eligible = self.eligible_records(started_at)?;
        tracing::debug!(
            "Lifecycle sweep found {} eligible documents (dry_run: {})",
            eligible.len(),
            dry_run
        );

        if dry_run {
            let details = eligible
                .into_iter()
                .map(|(record, target)| SweepDetail {
                    document_id: record.document_id,
                    action: SweepAction::WouldTransition {
                        from: record.storage_tier,
                        to: target,
                    },
                })
                .collect();
            return Ok(SweepReport::from_details(started_at, true, false, details));
        }

        let mut details = Vec::new();
        let mut runnable = Vec::new();
        for (record, target) in eligible {
            match self.ledger.in_backoff(record.document_id, started_at) {
                Some(next_attempt_at) => details.push(SweepDetail {
                    document_id: record.document_id,
                    action: SweepAction::SkippedBackoff { next_attempt_at },
                }),
                None => runnable.push((record, target)),
            }
        }

        let outcome = run_batch(
            runnable,
            self.config.max_in_flight,
            cancel,
            |(record, target)| self.process(record, target, started_at),
        )
        .await;
        details.extend(outcome.results);

        let report =
            SweepReport::from_details(started_at, false, outcome.cancelled, details);
        tracing::info!(
            "Lifecycle sweep completed: {} processed, {} transitioned, {} failed",
            report.processed,
            report.transitioned,
            report.failed
        );
        Ok(report)
    }

    /// Move one document, commit, publish; shared with `archive_now`
    pub(crate) async fn transition_document(
        &self,
        record: &DocumentRecord,
        target: StorageTier,
        now: u64,
    ) -> Result<bool, EngineError> {
        let updated = match TierStateMachine::request_archive(record, target, now)? {
            TransitionOutcome::Applied(updated) => updated,
            TransitionOutcome::NoOp => return Ok(false),
        };

        let provider = self
            .providers
            .get(record.provider)
            .ok_or(EngineError::UnknownProvider(record.provider))?;
        provider
            .archive_to_tier(&record.storage_path, target)
            .await?;

        if !self.store.update_if_version(&updated, record.version)? {
            return Err(EngineError::VersionConflict {
                document_id: record.document_id,
            });
        }

        emit(
            self.events.as_ref(),
            EventKind::MovedToTier,
            record.document_id,
            serde_json::json!({
                "previous_tier": record.storage_tier,
                "new_tier": target,
            }),
        );
        Ok(true)
    }

    async fn process(&self, record: DocumentRecord, target: StorageTier, now: u64) -> SweepDetail {
        let from = record.storage_tier;
        let id = record.document_id;
        match self.transition_document(&record, target, now).await {
            Ok(true) => {
                self.ledger.clear(id);
                tracing::debug!("Document {} moved {} -> {}", id, from, target);
                SweepDetail {
                    document_id: id,
                    action: SweepAction::Transitioned { from, to: target },
                }
            }
            Ok(false) => {
                self.ledger.clear(id);
                SweepDetail {
                    document_id: id,
                    action: SweepAction::AlreadyThere,
                }
            }
            Err(e) => {
                let retryable = e.is_retryable();
                if retryable {
                    if let RetryDisposition::Exhausted = self.ledger.record_failure(id, now) {
                        tracing::error!("Document {} exhausted its retry budget: {}", id, e);
                    }
                } else {
                    self.ledger.clear(id);
                    tracing::error!("Document {} failed permanently: {}", id, e);
                }
                SweepDetail {
                    document_id: id,
                    action: SweepAction::Failed {
                        error: e.to_string(),
                        retryable,
                    },
                }
            }
        }
    }
}

//! Tier/restore state machine - pure transition logic, no I/O
//!
//! Every mutation of a [`DocumentRecord`] goes through one of the four
//! operations here, whether it is triggered by a user request, the lifecycle
//! sweep, or the restore poller. The functions take the current record by
//! reference and return either a fully formed successor record or a typed
//! error; committing the successor (with a conditional version check) is the
//! caller's job.

use crate::document::DocumentRecord;
use crate::restore::RestoreStatus;
use crate::tier::StorageTier;
use thiserror::Error;

/// Errors returned by transition validation
///
/// All variants are permanent: retrying the same transition against the same
/// record state will fail the same way.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The requested tier/restore transition violates the state machine
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// A restore completion arrived for a document with no active restore
    #[error("Restore conflict: {0}")]
    RestoreConflict(String),

    /// A transition would have produced a record violating the invariants
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

/// Result of applying a transition
///
/// `NoOp` means the record is already in the requested state; callers must
/// not bump the version or publish an event for it. That distinction is what
/// keeps duplicate requests and overlapping sweeps from double-publishing.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// The transition produced a new record state (version not yet bumped)
    Applied(DocumentRecord),

    /// The record is already in the requested state
    NoOp,
}

impl TransitionOutcome {
    /// Whether this outcome carries a new record state
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied(_))
    }
}

/// Pure tier/restore transition logic
///
/// # Examples
///
/// ```
/// use coldvault_domain::{DocumentId, DocumentRecord, ProviderKind, StorageTier};
/// use coldvault_domain::{TierStateMachine, TransitionOutcome};
/// use std::collections::BTreeMap;
///
/// let record = DocumentRecord::new(
///     DocumentId::new(),
///     "archives/2026/01/01/x/a.pdf".into(),
///     ProviderKind::Local,
///     "a.pdf".into(),
///     "application/pdf".into(),
///     10,
///     BTreeMap::new(),
///     1_700_000_000,
/// );
///
/// let outcome = TierStateMachine::request_archive(
///     &record,
///     StorageTier::Archive,
///     1_700_086_400,
/// ).unwrap();
/// assert!(outcome.is_applied());
/// ```
pub struct TierStateMachine;

impl TierStateMachine {
    /// Request a move to `target` tier
    ///
    /// - target equal to the current tier: idempotent no-op success
    /// - target ahead: applied; `last_tier_change_at` is set to `now` and a
    ///   cold target with no active restore marks the document `Archived`
    /// - target behind: [`TransitionError::InvalidTransition`] (backward
    ///   moves are only legal via administrative override, which is not part
    ///   of this engine)
    pub fn request_archive(
        record: &DocumentRecord,
        target: StorageTier,
        now: u64,
    ) -> Result<TransitionOutcome, TransitionError> {
        if target == record.storage_tier {
            return Ok(TransitionOutcome::NoOp);
        }
        if target < record.storage_tier {
            return Err(TransitionError::InvalidTransition(format!(
                "cannot move document {} backward from {} to {}",
                record.document_id, record.storage_tier, target
            )));
        }

        let mut next = record.clone();
        next.storage_tier = target;
        next.last_tier_change_at = now;
        // Entering a cold tier with no restore in flight means "archived,
        // not retrievable". An active restore window survives the move.
        if target.is_cold() && next.restore_status == RestoreStatus::NotArchived {
            next.restore_status = RestoreStatus::Archived;
        }
        Self::checked(next)
    }

    /// Request a restore window of `days` days
    ///
    /// - Standard tier: [`TransitionError::InvalidTransition`] (nothing to
    ///   restore)
    /// - already `Restored`: applied renewal, the expiry is extended to
    ///   `now + days` without passing through `InProgress` again
    /// - already `InProgress`: duplicate suppressed, no-op
    /// - otherwise: applied, the document enters `InProgress`
    pub fn request_restore(
        record: &DocumentRecord,
        days: u32,
        now: u64,
    ) -> Result<TransitionOutcome, TransitionError> {
        if record.storage_tier == StorageTier::Standard {
            return Err(TransitionError::InvalidTransition(format!(
                "document {} is in standard storage and needs no restore",
                record.document_id
            )));
        }

        match record.restore_status {
            RestoreStatus::Restored => {
                let mut next = record.clone();
                next.restore_expiry = Some(now + u64::from(days) * 86_400);
                Self::checked(next)
            }
            RestoreStatus::InProgress => Ok(TransitionOutcome::NoOp),
            _ => {
                let mut next = record.clone();
                next.restore_status = RestoreStatus::InProgress;
                next.restore_expiry = None;
                Self::checked(next)
            }
        }
    }

    /// Record a provider-confirmed restore completion
    ///
    /// Called only by the restore poller once the backend reports the object
    /// retrievable. Already-`Restored` records no-op, which is the guard
    /// against duplicate poll results; any other state means a completion
    /// arrived for a restore that was never requested or already lapsed.
    pub fn complete_restore(
        record: &DocumentRecord,
        expires_at: u64,
    ) -> Result<TransitionOutcome, TransitionError> {
        match record.restore_status {
            RestoreStatus::InProgress => {
                let mut next = record.clone();
                next.restore_status = RestoreStatus::Restored;
                next.restore_expiry = Some(expires_at);
                Self::checked(next)
            }
            RestoreStatus::Restored => Ok(TransitionOutcome::NoOp),
            other => Err(TransitionError::RestoreConflict(format!(
                "restore completion for document {} in state {}",
                record.document_id, other
            ))),
        }
    }

    /// Lapse a restore window that has passed its expiry
    ///
    /// Applied only when the record is `Restored` with
    /// `restore_expiry <= now`; everything else is a no-op so overlapping
    /// poller runs cannot double-expire.
    pub fn expire_restore(
        record: &DocumentRecord,
        now: u64,
    ) -> Result<TransitionOutcome, TransitionError> {
        match (record.restore_status, record.restore_expiry) {
            (RestoreStatus::Restored, Some(expiry)) if expiry <= now => {
                let mut next = record.clone();
                next.restore_status = RestoreStatus::Archived;
                next.restore_expiry = None;
                Self::checked(next)
            }
            _ => Ok(TransitionOutcome::NoOp),
        }
    }

    fn checked(next: DocumentRecord) -> Result<TransitionOutcome, TransitionError> {
        next.check_invariants()
            .map_err(TransitionError::InvariantViolation)?;
        Ok(TransitionOutcome::Applied(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentId;
    use crate::tier::ProviderKind;
    use std::collections::BTreeMap;

    const T0: u64 = 1_700_000_000;

    fn record() -> DocumentRecord {
        DocumentRecord::new(
            DocumentId::new(),
            "archives/2026/01/15/x/report.pdf".to_string(),
            ProviderKind::Local,
            "report.pdf".to_string(),
            "application/pdf".to_string(),
            1024,
            BTreeMap::new(),
            T0,
        )
    }

    fn applied(outcome: TransitionOutcome) -> DocumentRecord {
        match outcome {
            TransitionOutcome::Applied(r) => r,
            TransitionOutcome::NoOp => panic!("expected Applied, got NoOp"),
        }
    }

    #[test]
    fn test_archive_forward() {
        let r = record();
        let next = applied(
            TierStateMachine::request_archive(&r, StorageTier::Archive, T0 + 100).unwrap(),
        );
        assert_eq!(next.storage_tier, StorageTier::Archive);
        assert_eq!(next.restore_status, RestoreStatus::Archived);
        assert_eq!(next.last_tier_change_at, T0 + 100);
        // Version bump belongs to the commit, not the transition
        assert_eq!(next.version, r.version);
    }

    #[test]
    fn test_archive_to_warm_tier_keeps_not_archived() {
        let r = record();
        let next = applied(
            TierStateMachine::request_archive(&r, StorageTier::Infrequent, T0 + 100).unwrap(),
        );
        assert_eq!(next.storage_tier, StorageTier::Infrequent);
        assert_eq!(next.restore_status, RestoreStatus::NotArchived);
    }

    #[test]
    fn test_archive_same_tier_is_noop() {
        let r = record();
        let outcome = TierStateMachine::request_archive(&r, StorageTier::Standard, T0).unwrap();
        assert_eq!(outcome, TransitionOutcome::NoOp);
    }

    #[test]
    fn test_archive_backward_is_invalid() {
        let mut r = record();
        r.storage_tier = StorageTier::Archive;
        r.restore_status = RestoreStatus::Archived;
        let err = TierStateMachine::request_archive(&r, StorageTier::Standard, T0).unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition(_)));
    }

    #[test]
    fn test_archive_deeper_preserves_active_restore() {
        let mut r = record();
        r.storage_tier = StorageTier::Archive;
        r.restore_status = RestoreStatus::Restored;
        r.restore_expiry = Some(T0 + 86_400);

        let next = applied(
            TierStateMachine::request_archive(&r, StorageTier::DeepArchive, T0 + 10).unwrap(),
        );
        assert_eq!(next.storage_tier, StorageTier::DeepArchive);
        assert_eq!(next.restore_status, RestoreStatus::Restored);
        assert_eq!(next.restore_expiry, Some(T0 + 86_400));
    }

    #[test]
    fn test_restore_from_standard_is_invalid() {
        let r = record();
        let err = TierStateMachine::request_restore(&r, 7, T0).unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition(_)));
    }

    #[test]
    fn test_restore_initiation() {
        let mut r = record();
        r.storage_tier = StorageTier::DeepArchive;
        r.restore_status = RestoreStatus::Archived;

        let next = applied(TierStateMachine::request_restore(&r, 7, T0).unwrap());
        assert_eq!(next.restore_status, RestoreStatus::InProgress);
        assert_eq!(next.restore_expiry, None);
    }

    #[test]
    fn test_restore_duplicate_suppressed() {
        let mut r = record();
        r.storage_tier = StorageTier::DeepArchive;
        r.restore_status = RestoreStatus::InProgress;

        let outcome = TierStateMachine::request_restore(&r, 7, T0).unwrap();
        assert_eq!(outcome, TransitionOutcome::NoOp);
    }

    #[test]
    fn test_restore_renewal_extends_expiry() {
        let mut r = record();
        r.storage_tier = StorageTier::Archive;
        r.restore_status = RestoreStatus::Restored;
        r.restore_expiry = Some(T0 + 100);

        let next = applied(TierStateMachine::request_restore(&r, 7, T0 + 50).unwrap());
        assert_eq!(next.restore_status, RestoreStatus::Restored);
        assert_eq!(next.restore_expiry, Some(T0 + 50 + 7 * 86_400));
    }

    #[test]
    fn test_complete_restore() {
        let mut r = record();
        r.storage_tier = StorageTier::DeepArchive;
        r.restore_status = RestoreStatus::InProgress;

        let next = applied(TierStateMachine::complete_restore(&r, T0 + 7 * 86_400).unwrap());
        assert_eq!(next.restore_status, RestoreStatus::Restored);
        assert_eq!(next.restore_expiry, Some(T0 + 7 * 86_400));
    }

    #[test]
    fn test_complete_restore_twice_is_noop() {
        let mut r = record();
        r.storage_tier = StorageTier::DeepArchive;
        r.restore_status = RestoreStatus::Restored;
        r.restore_expiry = Some(T0 + 7 * 86_400);

        let outcome = TierStateMachine::complete_restore(&r, T0 + 8 * 86_400).unwrap();
        assert_eq!(outcome, TransitionOutcome::NoOp);
    }

    #[test]
    fn test_complete_restore_without_request_conflicts() {
        let mut r = record();
        r.storage_tier = StorageTier::DeepArchive;
        r.restore_status = RestoreStatus::Archived;

        let err = TierStateMachine::complete_restore(&r, T0).unwrap_err();
        assert!(matches!(err, TransitionError::RestoreConflict(_)));
    }

    #[test]
    fn test_expire_restore() {
        let mut r = record();
        r.storage_tier = StorageTier::Archive;
        r.restore_status = RestoreStatus::Restored;
        r.restore_expiry = Some(T0 + 100);

        // Not yet due
        let outcome = TierStateMachine::expire_restore(&r, T0 + 99).unwrap();
        assert_eq!(outcome, TransitionOutcome::NoOp);

        let next = applied(TierStateMachine::expire_restore(&r, T0 + 100).unwrap());
        assert_eq!(next.restore_status, RestoreStatus::Archived);
        assert_eq!(next.restore_expiry, None);

        // Expiring a non-restored record is a no-op
        let outcome = TierStateMachine::expire_restore(&next, T0 + 200).unwrap();
        assert_eq!(outcome, TransitionOutcome::NoOp);
    }
}

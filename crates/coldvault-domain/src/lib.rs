//! Coldvault Domain Layer
//!
//! This crate contains the core business logic for the storage tier lifecycle
//! and restore engine. It defines the document record, the tier and restore
//! enums, and the pure transition logic that every caller (request-scoped
//! orchestrator, lifecycle sweep, restore poller) must go through.
//!
//! ## Key Concepts
//!
//! - **DocumentRecord**: one row per archived document, the local source of
//!   truth for where a document lives and whether it is retrievable
//! - **StorageTier**: cost/latency class (standard → infrequent → archive →
//!   deep_archive), monotonically non-decreasing under lifecycle aging
//! - **RestoreStatus**: the restore state machine (not_archived → archived →
//!   in_progress → restored → archived/expired)
//! - **TierStateMachine**: pure transition functions with no I/O; callers
//!   commit the resulting record through a conditional (versioned) update
//!
//! ## Architecture
//!
//! This crate has no I/O and no infrastructure dependencies. Storage backends
//! live in `coldvault-provider`, persistence in `coldvault-store`, and the
//! orchestration in `coldvault-engine`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod restore;
pub mod state_machine;
pub mod tier;

// Re-exports for convenience
pub use document::{DocumentId, DocumentRecord};
pub use restore::{RestoreSpeed, RestoreStatus};
pub use state_machine::{TierStateMachine, TransitionError, TransitionOutcome};
pub use tier::{ProviderKind, StorageTier};

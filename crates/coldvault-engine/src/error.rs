//! Engine error taxonomy

use coldvault_domain::{DocumentId, ProviderKind, TransitionError};
use coldvault_provider::ProviderError;
use coldvault_store::StoreError;
use thiserror::Error;

/// Errors surfaced by engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// No record exists for the document id
    #[error("Document not found: {0}")]
    NotFound(DocumentId),

    /// The state machine rejected the transition
    #[error("Transition rejected: {0}")]
    Transition(#[from] TransitionError),

    /// A provider call failed
    #[error("Provider operation failed: {0}")]
    Provider(#[from] ProviderError),

    /// The metadata store failed
    #[error("Metadata store failure: {0}")]
    Store(#[from] StoreError),

    /// A conditional commit lost against a concurrent update
    #[error("Concurrent update lost for document {document_id}; re-read and retry")]
    VersionConflict {
        /// The contended document
        document_id: DocumentId,
    },

    /// A record names a backend the deployment never configured
    #[error("No provider configured for {0}")]
    UnknownProvider(ProviderKind),

    /// The operation observed its cancel token
    #[error("Operation cancelled")]
    Cancelled,
}

impl EngineError {
    /// Whether a retry can help
    ///
    /// Transient provider failures and version conflicts are retryable;
    /// everything else reproduces deterministically.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Provider(e) => e.is_transient(),
            EngineError::VersionConflict { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability() {
        assert!(EngineError::Provider(ProviderError::Unavailable("x".into())).is_retryable());
        assert!(EngineError::Provider(ProviderError::Timeout { op: "probe" }).is_retryable());
        assert!(EngineError::VersionConflict {
            document_id: DocumentId::new()
        }
        .is_retryable());

        assert!(!EngineError::Provider(ProviderError::NotFound("x".into())).is_retryable());
        assert!(!EngineError::NotFound(DocumentId::new()).is_retryable());
        assert!(!EngineError::Transition(TransitionError::InvalidTransition("x".into()))
            .is_retryable());
        assert!(!EngineError::Cancelled.is_retryable());
    }
}

//! Provider error taxonomy

use coldvault_domain::StorageTier;
use thiserror::Error;

/// Errors surfaced by storage providers, classified for retry policy
///
/// `Unavailable` and `Timeout` are transient: the calling sweep retries them
/// with backoff across iterations. Everything else is permanent and surfaced
/// immediately.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// No object exists at the path
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Object exists but is archived and not currently restored
    #[error("Object is archived and not retrievable (tier: {tier:?}); request a restore first")]
    NotRetrievable {
        /// The cold tier the object sits in, when the backend reports it
        tier: Option<StorageTier>,
    },

    /// Transient backend or network failure
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Storage quota or capacity limit reached; never retried
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// A call exceeded its per-operation timeout
    #[error("Provider call timed out during {op}")]
    Timeout {
        /// Which operation was in flight
        op: &'static str,
    },

    /// Authentication or authorization failure
    #[error("Provider authentication failed: {0}")]
    Auth(String),

    /// The backend answered with something the client cannot interpret
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether a retry (with backoff, on a later sweep) can help
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Unavailable(_) | ProviderError::Timeout { .. }
        )
    }
}

/// Classify an HTTP status from a backend into the error taxonomy
///
/// 409 is deliberately absent: its meaning is operation-specific (restore
/// already running, blob rehydrating) and handled at each call site.
pub(crate) fn classify_status(status: u16, context: &str) -> ProviderError {
    match status {
        404 | 410 => ProviderError::NotFound(context.to_string()),
        401 | 403 => ProviderError::Auth(format!("HTTP {}: {}", status, context)),
        408 | 429 => ProviderError::Unavailable(format!("HTTP {}: {}", status, context)),
        413 | 507 => ProviderError::QuotaExceeded(format!("HTTP {}: {}", status, context)),
        s if s >= 500 => ProviderError::Unavailable(format!("HTTP {}: {}", s, context)),
        s => ProviderError::InvalidResponse(format!("HTTP {}: {}", s, context)),
    }
}

/// Map a reqwest transport error into the taxonomy
pub(crate) fn classify_transport(op: &'static str, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout { op }
    } else if err.is_connect() || err.is_request() {
        ProviderError::Unavailable(format!("{}: {}", op, err))
    } else {
        ProviderError::InvalidResponse(format!("{}: {}", op, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Unavailable("x".into()).is_transient());
        assert!(ProviderError::Timeout { op: "probe" }.is_transient());
        assert!(!ProviderError::NotFound("x".into()).is_transient());
        assert!(!ProviderError::QuotaExceeded("x".into()).is_transient());
        assert!(!ProviderError::NotRetrievable { tier: None }.is_transient());
        assert!(!ProviderError::Auth("x".into()).is_transient());
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(classify_status(404, "k"), ProviderError::NotFound(_)));
        assert!(matches!(classify_status(403, "k"), ProviderError::Auth(_)));
        assert!(matches!(classify_status(429, "k"), ProviderError::Unavailable(_)));
        assert!(matches!(classify_status(503, "k"), ProviderError::Unavailable(_)));
        assert!(matches!(classify_status(507, "k"), ProviderError::QuotaExceeded(_)));
        assert!(matches!(classify_status(418, "k"), ProviderError::InvalidResponse(_)));
    }
}

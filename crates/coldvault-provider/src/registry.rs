//! Provider registry
//!
//! Maps each [`ProviderKind`] to its configured backend so the engine can
//! resolve the provider a document record names without knowing which
//! backends the deployment enabled.

use crate::StorageProvider;
use coldvault_domain::ProviderKind;
use std::collections::HashMap;
use std::sync::Arc;

/// Configured backends, keyed by kind
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn StorageProvider>>,
}

impl ProviderRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under its own reported kind, replacing any
    /// previous registration for that kind
    pub fn register(&mut self, provider: Arc<dyn StorageProvider>) -> &mut Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    /// Resolve a backend; `None` when the deployment never configured one
    /// for this kind
    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn StorageProvider>> {
        self.providers.get(&kind).cloned()
    }

    /// The kinds with a configured backend
    pub fn kinds(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<_> = self.providers.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProvider;

    #[test]
    fn test_register_and_resolve() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(Arc::new(MockProvider::for_kind(ProviderKind::Local)))
            .register(Arc::new(MockProvider::for_kind(ProviderKind::Aws)));

        assert!(registry.get(ProviderKind::Local).is_some());
        assert!(registry.get(ProviderKind::Aws).is_some());
        assert!(registry.get(ProviderKind::Gcp).is_none());
        assert_eq!(registry.kinds(), vec![ProviderKind::Local, ProviderKind::Aws]);
    }

    #[test]
    fn test_reregistration_replaces() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(MockProvider::new()));
        registry.register(Arc::new(MockProvider::new()));
        assert_eq!(registry.kinds().len(), 1);
    }
}

//! Platform → adapter lookup.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokenwarden_domain::{AuthError, Platform, Result};

use super::ports::PlatformAdapter;

/// Maps each platform to the adapter that speaks its protocol.
///
/// Adapters are keyed by [`PlatformAdapter::platform`], so two platforms that
/// share a protocol (Instagram and Facebook) are registered as two adapter
/// instances, each bound to its own platform.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, returning the one it replaced.
    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.insert(adapter.platform(), adapter)
    }

    #[must_use]
    pub fn with(mut self, adapter: Arc<dyn PlatformAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.get(&platform).cloned()
    }

    /// Like [`get`](Self::get), but a missing adapter is a platform error.
    pub fn require(&self, platform: Platform) -> Result<Arc<dyn PlatformAdapter>> {
        self.get(platform).ok_or_else(|| {
            AuthError::platform_error(platform, "no adapter registered for platform")
        })
    }

    pub fn contains(&self, platform: Platform) -> bool {
        self.adapters.contains_key(&platform)
    }

    /// Registered platforms in stable order.
    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<_> = self.adapters.keys().copied().collect();
        platforms.sort();
        platforms
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry").field("platforms", &self.platforms()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokenwarden_common::time::MockClock;
    use tokenwarden_domain::AuthErrorKind;

    use super::*;
    use crate::testing::MockAdapter;

    #[test]
    fn test_register_keys_by_adapter_platform() {
        let clock = Arc::new(MockClock::new());
        let registry = AdapterRegistry::new()
            .with(Arc::new(MockAdapter::new(Platform::Instagram, clock.clone())))
            .with(Arc::new(MockAdapter::new(Platform::Facebook, clock)));

        assert_eq!(registry.platforms(), vec![Platform::Instagram, Platform::Facebook]);
        assert_eq!(registry.require(Platform::Facebook).unwrap().platform(), Platform::Facebook);
    }

    #[test]
    fn test_require_missing_adapter_is_platform_error() {
        let err = AdapterRegistry::new().require(Platform::Reddit).err().unwrap();
        assert_eq!(err.kind, AuthErrorKind::PlatformError);
        assert_eq!(err.platform, Platform::Reddit);
    }

    #[test]
    fn test_register_replaces_existing() {
        let clock = Arc::new(MockClock::new());
        let mut registry = AdapterRegistry::new();
        assert!(registry.register(Arc::new(MockAdapter::new(Platform::TikTok, clock.clone()))).is_none());
        assert!(registry.register(Arc::new(MockAdapter::new(Platform::TikTok, clock))).is_some());
        assert_eq!(registry.len(), 1);
    }
}

//! Shared fixtures for `tokenwarden-core` integration tests.
//!
//! A [`Harness`] wires a coordinator to in-memory doubles so tests can focus
//! on lifecycle behaviour instead of boilerplate.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokenwarden_common::time::{Clock, MockClock};
use tokenwarden_core::testing::{MockAdapter, MockTokenStore, RecordingObserver};
use tokenwarden_core::{AdapterRegistry, AuthCoordinator, CoordinatorConfig, PlatformAdapter};
use tokenwarden_domain::{AuthToken, Platform, PlatformCredentials};

pub struct Harness {
    pub coordinator: AuthCoordinator,
    pub store: Arc<MockTokenStore>,
    pub clock: Arc<MockClock>,
    pub observer: Arc<RecordingObserver>,
    adapters: HashMap<Platform, Arc<MockAdapter>>,
}

impl Harness {
    /// Default mock adapters for `platforms` and the default config.
    pub fn new(platforms: &[Platform]) -> Self {
        let clock = Arc::new(MockClock::new());
        let adapters = platforms.iter().map(|p| MockAdapter::new(*p, clock.clone())).collect();
        Self::with_adapters(clock, adapters, CoordinatorConfig::default())
    }

    pub fn with_adapters(
        clock: Arc<MockClock>,
        adapters: Vec<MockAdapter>,
        config: CoordinatorConfig,
    ) -> Self {
        let store = Arc::new(MockTokenStore::new());
        let observer = Arc::new(RecordingObserver::new());
        let adapters: HashMap<Platform, Arc<MockAdapter>> =
            adapters.into_iter().map(|a| (a.platform(), Arc::new(a))).collect();

        let mut registry = AdapterRegistry::new();
        for adapter in adapters.values() {
            registry.register(adapter.clone());
        }

        let mut builder = AuthCoordinator::builder(store.clone(), registry)
            .config(config)
            .clock(clock.clone())
            .observer(observer.clone());
        for platform in adapters.keys().filter(|p| p.requires_auth()) {
            builder = builder.credentials(*platform, credentials(*platform));
        }

        Self { coordinator: builder.build().unwrap(), store, clock, observer, adapters }
    }

    pub fn adapter(&self, platform: Platform) -> &Arc<MockAdapter> {
        &self.adapters[&platform]
    }

    /// Store a token expiring in `secs`, with a refresh token.
    pub fn seed(&self, platform: Platform, secs: u64) -> AuthToken {
        let token = AuthToken::with_lifetime(
            platform,
            format!("seed-{platform}"),
            Duration::from_secs(secs),
            self.clock.utc_now(),
        )
        .unwrap()
        .with_refresh_token(format!("seed-refresh-{platform}"));
        self.store.seed(token.clone());
        token
    }
}

pub fn credentials(platform: Platform) -> PlatformCredentials {
    PlatformCredentials::new(format!("client-{platform}"), format!("secret-{platform}"))
}

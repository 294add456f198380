//! Provider adapters
//!
//! One [`OAuth2PlatformAdapter`] per OAuth platform, configured by a
//! [`ProviderProfile`], plus a [`NoAuthAdapter`] for anonymous feeds.

pub mod no_auth;
pub mod oauth2;
pub mod profile;

use std::sync::Arc;

use tokenwarden_common::time::Clock;
use tokenwarden_core::AdapterRegistry;
use tokenwarden_domain::{HttpSettings, Platform};

pub use no_auth::{NoAuthAdapter, NO_AUTH_ACCESS_TOKEN};
pub use oauth2::OAuth2PlatformAdapter;
pub use profile::{ClientAuth, ProviderProfile, RefreshGrant, RevokeMethod};

use crate::http::HttpClient;

/// Registry with an adapter for every supported platform.
pub fn default_registry(
    http: &HttpSettings,
    clock: Arc<dyn Clock>,
) -> Result<AdapterRegistry, reqwest::Error> {
    let client = HttpClient::from_settings(http)?;
    let mut registry = AdapterRegistry::new();
    for platform in Platform::ALL {
        match ProviderProfile::for_platform(platform) {
            Some(profile) => {
                registry.register(Arc::new(OAuth2PlatformAdapter::new(
                    profile,
                    client.clone(),
                    clock.clone(),
                )));
            }
            None => {
                registry.register(Arc::new(NoAuthAdapter::new(platform, clock.clone())));
            }
        }
    }
    Ok(registry)
}

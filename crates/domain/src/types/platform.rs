//! External providers whose tokens are managed.

use serde::{Deserialize, Serialize};

use crate::impl_domain_str_conversions;

/// One external social/content provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    TikTok,
    Instagram,
    Facebook,
    YouTube,
    Reddit,
    Rss,
}

impl_domain_str_conversions!(Platform {
    TikTok => "tiktok",
    Instagram => "instagram",
    Facebook => "facebook",
    YouTube => "youtube",
    Reddit => "reddit",
    Rss => "rss",
});

impl Platform {
    /// Every supported platform, in declaration order.
    pub const ALL: [Platform; 6] = [
        Platform::TikTok,
        Platform::Instagram,
        Platform::Facebook,
        Platform::YouTube,
        Platform::Reddit,
        Platform::Rss,
    ];

    /// Whether the platform needs an OAuth grant at all. Feed-style platforms
    /// are read anonymously.
    pub const fn requires_auth(&self) -> bool {
        !matches!(self, Platform::Rss)
    }

    /// Upper-case form used in environment variable names.
    pub fn env_prefix(&self) -> String {
        self.as_str().to_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_round_trip_through_from_str() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
        }
        assert_eq!("YouTube".parse::<Platform>().unwrap(), Platform::YouTube);
    }

    #[test]
    fn test_serde_uses_lowercase_ids() {
        assert_eq!(serde_json::to_string(&Platform::TikTok).unwrap(), "\"tiktok\"");
        let parsed: Platform = serde_json::from_str("\"youtube\"").unwrap();
        assert_eq!(parsed, Platform::YouTube);
    }

    #[test]
    fn test_only_rss_skips_auth() {
        assert!(!Platform::Rss.requires_auth());
        assert_eq!(Platform::ALL.iter().filter(|p| p.requires_auth()).count(), 5);
        assert_eq!(Platform::Reddit.env_prefix(), "REDDIT");
    }
}

//! Macro for implementing string conversions on domain enums
//!
//! Generates `as_str`, `Display` and `FromStr` from a single variant table so
//! the wire id, log output and parsing never drift apart.
//!
//! # Example
//!
//! ```rust
//! use tokenwarden_domain::impl_domain_str_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Grant {
//!     Refresh,
//!     Exchange,
//! }
//!
//! impl_domain_str_conversions!(Grant {
//!     Refresh => "refresh",
//!     Exchange => "exchange",
//! });
//!
//! assert_eq!(Grant::Refresh.as_str(), "refresh");
//! assert_eq!("EXCHANGE".parse::<Grant>().unwrap(), Grant::Exchange);
//! ```

/// Implements `as_str`, `Display` and case-insensitive `FromStr` for an enum
#[macro_export]
macro_rules! impl_domain_str_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Stable lowercase identifier.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestKind {
        Alpha,
        Beta,
    }

    impl_domain_str_conversions!(TestKind {
        Alpha => "alpha",
        Beta => "beta",
    });

    #[test]
    fn test_display_matches_as_str() {
        assert_eq!(TestKind::Alpha.to_string(), "alpha");
        assert_eq!(TestKind::Beta.as_str(), "beta");
    }

    #[test]
    fn test_fromstr_is_case_insensitive_and_trims() {
        assert_eq!(TestKind::from_str("ALPHA").unwrap(), TestKind::Alpha);
        assert_eq!(TestKind::from_str(" Beta ").unwrap(), TestKind::Beta);
    }

    #[test]
    fn test_fromstr_invalid() {
        let result = TestKind::from_str("gamma");
        assert!(result.unwrap_err().contains("Invalid TestKind: gamma"));
    }
}

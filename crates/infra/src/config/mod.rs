//! Configuration loading
//!
//! Layers a TOML/JSON file and `TOKENWARDEN_*` environment variables over
//! the defaults in [`tokenwarden_domain::Settings`].

pub mod loader;

// Re-export commonly used items
pub use loader::{
    apply_env_overrides, load, load_from_file, load_with, parse_settings, probe_config_paths,
    LoaderError, LoaderResult,
};

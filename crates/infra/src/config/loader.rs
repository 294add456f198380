//! Configuration loader
//!
//! Builds [`Settings`] from layered sources.
//!
//! ## Loading Strategy
//! 1. Load a `.env` file into the process environment, if present
//! 2. Read the config file passed in, else the one named by
//!    `TOKENWARDEN_CONFIG`, else the first file
//!    found by [`probe_config_paths`]; with neither, start from defaults
//! 3. Apply environment variable overrides
//! 4. Validate the result
//!
//! Files may be TOML or JSON, detected by extension.
//!
//! ## Environment Variables
//! - `TOKENWARDEN_CONFIG`: explicit config file path
//! - `TOKENWARDEN_CHECK_INTERVAL_SECS`: monitor check interval
//! - `TOKENWARDEN_MONITOR_ENABLED`: whether the monitor runs (true/false)
//! - `TOKENWARDEN_MAX_CONCURRENT_REFRESHES`: monitor refresh batch size
//! - `TOKENWARDEN_REFRESH_THRESHOLD_SECS`: coordinator refresh threshold
//! - `TOKENWARDEN_FAILURE_THRESHOLD`: circuit breaker failure threshold
//! - `TOKENWARDEN_RECOVERY_TIMEOUT_SECS`: circuit breaker recovery timeout
//! - `TOKENWARDEN_HTTP_TIMEOUT_SECS`: provider request timeout
//! - `TOKENWARDEN_STORE_PATH`: token file path (selects the file store)
//! - `TOKENWARDEN_LOG_LEVEL`: default log filter
//! - `TOKENWARDEN_LOG_JSON`: JSON log output (true/false)
//! - `TOKENWARDEN_<PLATFORM>_CLIENT_ID`, `_CLIENT_SECRET`, `_REDIRECT_URI`,
//!   `_SCOPES` (comma separated): per-platform credentials, e.g.
//!   `TOKENWARDEN_REDDIT_CLIENT_ID`

use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use tokenwarden_common::error::ConfigError;
use tokenwarden_domain::{Platform, Settings, StoreKind};

const ENV_PREFIX: &str = "TOKENWARDEN";
const CONFIG_PATH_VAR: &str = "TOKENWARDEN_CONFIG";
const CONFIG_FILE_NAMES: [&str; 3] =
    ["tokenwarden.toml", "config/tokenwarden.toml", "tokenwarden.json"];

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid {format} in {}: {message}", path.display())]
    Parse { path: PathBuf, format: &'static str, message: String },

    #[error("unsupported config format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

pub type LoaderResult<T> = Result<T, LoaderError>;

/// Load configuration from `.env`, file and process environment.
///
/// An explicit `path` wins over `TOKENWARDEN_CONFIG` and probing.
///
/// # Errors
/// Returns [`LoaderError`] if an explicitly named file is missing, a file
/// cannot be parsed, an override has an invalid value, or the merged
/// settings fail validation.
pub fn load(path: Option<PathBuf>) -> LoaderResult<Settings> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        Err(err) if err.not_found() => {}
        Err(err) => tracing::warn!(error = %err, "Failed to load .env file"),
    }

    let path = path
        .or_else(|| std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from))
        .or_else(probe_config_paths);
    load_with(path, |key| std::env::var(key).ok())
}

/// Load from an optional file, then apply overrides read through `lookup`.
pub fn load_with<F>(path: Option<PathBuf>, lookup: F) -> LoaderResult<Settings>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = match path {
        Some(path) => load_from_file(&path)?,
        None => {
            tracing::info!("No config file found, using defaults");
            Settings::default()
        }
    };
    apply_env_overrides(&mut settings, lookup)?;
    settings.validate()?;
    Ok(settings)
}

/// Load configuration from a file, without overrides or validation.
///
/// # Errors
/// Returns [`LoaderError`] if the file is missing, unreadable or malformed.
pub fn load_from_file(path: &Path) -> LoaderResult<Settings> {
    if !path.exists() {
        return Err(LoaderError::NotFound { path: path.to_path_buf() });
    }

    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|source| LoaderError::Io { path: path.to_path_buf(), source })?;

    parse_settings(&contents, path)
}

/// Parse configuration text, detecting the format from `path`'s extension.
pub fn parse_settings(contents: &str, path: &Path) -> LoaderResult<Settings> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| LoaderError::Parse {
            path: path.to_path_buf(),
            format: "TOML",
            message: e.to_string(),
        }),
        "json" => serde_json::from_str(contents).map_err(|e| LoaderError::Parse {
            path: path.to_path_buf(),
            format: "JSON",
            message: e.to_string(),
        }),
        other => Err(LoaderError::UnsupportedFormat { extension: other.to_string() }),
    }
}

/// First existing config file in the working directory or next to the
/// executable.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        roots.push(exe_dir);
    }
    probe_in(&roots)
}

fn probe_in(roots: &[PathBuf]) -> Option<PathBuf> {
    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.is_file())
}

/// Overlay `TOKENWARDEN_*` values onto `settings`.
///
/// # Errors
/// Returns [`LoaderError::InvalidValue`] for unparsable numbers or booleans.
pub fn apply_env_overrides<F>(settings: &mut Settings, lookup: F) -> LoaderResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    if let Some(v) = env.parse("CHECK_INTERVAL_SECS")? {
        settings.monitor.check_interval_secs = v;
    }
    if let Some(v) = env.flag("MONITOR_ENABLED")? {
        settings.monitor.enabled = v;
    }
    if let Some(v) = env.parse("MAX_CONCURRENT_REFRESHES")? {
        settings.monitor.max_concurrent_refreshes = v;
    }
    if let Some(v) = env.parse("REFRESH_THRESHOLD_SECS")? {
        settings.coordinator.refresh_threshold_secs = v;
    }
    if let Some(v) = env.parse("FAILURE_THRESHOLD")? {
        settings.circuit_breaker.failure_threshold = v;
    }
    if let Some(v) = env.parse("RECOVERY_TIMEOUT_SECS")? {
        settings.circuit_breaker.recovery_timeout_secs = v;
    }
    if let Some(v) = env.parse("HTTP_TIMEOUT_SECS")? {
        settings.http.timeout_secs = v;
    }
    if let Some(path) = env.string("STORE_PATH") {
        settings.store.kind = StoreKind::File;
        settings.store.path = Some(PathBuf::from(path));
    }
    if let Some(level) = env.string("LOG_LEVEL") {
        settings.logging.level = level;
    }
    if let Some(v) = env.flag("LOG_JSON")? {
        settings.logging.json = v;
    }

    for platform in Platform::ALL {
        let prefix = platform.env_prefix();
        let client_id = env.string(&format!("{prefix}_CLIENT_ID"));
        let client_secret = env.string(&format!("{prefix}_CLIENT_SECRET"));
        let redirect_uri = env.string(&format!("{prefix}_REDIRECT_URI"));
        let scopes = env.string(&format!("{prefix}_SCOPES"));

        if client_id.is_none() && client_secret.is_none() && redirect_uri.is_none() && scopes.is_none() {
            continue;
        }

        let credentials = settings.platforms.entry(platform).or_default();
        if let Some(id) = client_id {
            credentials.client_id = id;
        }
        if let Some(secret) = client_secret {
            credentials.client_secret = secret;
        }
        if redirect_uri.is_some() {
            credentials.redirect_uri = redirect_uri;
        }
        if let Some(scopes) = scopes {
            credentials.scopes = scopes
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        tracing::debug!(platform = %platform, "Applied credential overrides from environment");
    }

    Ok(())
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn key(name: &str) -> String {
        format!("{ENV_PREFIX}_{name}")
    }

    /// Non-blank value for `TOKENWARDEN_<name>`.
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(&Self::key(name)).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, name: &str) -> LoaderResult<Option<T>> {
        self.string(name)
            .map(|value| {
                value
                    .parse::<T>()
                    .map_err(|_| LoaderError::InvalidValue { key: Self::key(name), value })
            })
            .transpose()
    }

    /// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off`
    /// (case-insensitive).
    fn flag(&self, name: &str) -> LoaderResult<Option<bool>> {
        self.string(name)
            .map(|value| match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(LoaderError::InvalidValue { key: Self::key(name), value }),
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::TempDir;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_flag_parsing() {
        let reader = EnvReader {
            lookup: env(&[
                ("TOKENWARDEN_A", "YES"),
                ("TOKENWARDEN_B", "off"),
                ("TOKENWARDEN_C", "maybe"),
                ("TOKENWARDEN_D", "  "),
            ]),
        };
        assert_eq!(reader.flag("A").unwrap(), Some(true));
        assert_eq!(reader.flag("B").unwrap(), Some(false));
        assert!(matches!(reader.flag("C"), Err(LoaderError::InvalidValue { .. })));
        assert_eq!(reader.flag("D").unwrap(), None);
        assert_eq!(reader.flag("MISSING").unwrap(), None);
    }

    #[test]
    fn test_overrides_apply_to_defaults() {
        let mut settings = Settings::default();
        apply_env_overrides(
            &mut settings,
            env(&[
                ("TOKENWARDEN_CHECK_INTERVAL_SECS", "60"),
                ("TOKENWARDEN_FAILURE_THRESHOLD", "2"),
                ("TOKENWARDEN_STORE_PATH", "/var/lib/tokenwarden/tokens.json"),
                ("TOKENWARDEN_LOG_JSON", "true"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.monitor.check_interval_secs, 60);
        assert_eq!(settings.circuit_breaker.failure_threshold, 2);
        assert_eq!(settings.store.kind, StoreKind::File);
        assert!(settings.logging.json);
        assert!(settings.validate().is_ok());
    }

    /// Validates per-platform credential variables.
    ///
    /// Assertions:
    /// - Variables are keyed by the upper-case platform id.
    /// - Scopes are comma separated and trimmed.
    /// - Platforms without variables are not added.
    #[test]
    fn test_platform_credentials_from_env() {
        let mut settings = Settings::default();
        apply_env_overrides(
            &mut settings,
            env(&[
                ("TOKENWARDEN_REDDIT_CLIENT_ID", "rid"),
                ("TOKENWARDEN_REDDIT_CLIENT_SECRET", "rsecret"),
                ("TOKENWARDEN_REDDIT_SCOPES", "read, identity,"),
                ("TOKENWARDEN_YOUTUBE_REDIRECT_URI", "http://localhost/cb"),
            ]),
        )
        .unwrap();

        let reddit = &settings.platforms[&Platform::Reddit];
        assert_eq!(reddit.client_id, "rid");
        assert_eq!(reddit.scopes, vec!["read", "identity"]);
        assert_eq!(
            settings.platforms[&Platform::YouTube].redirect_uri.as_deref(),
            Some("http://localhost/cb")
        );
        assert!(!settings.platforms.contains_key(&Platform::TikTok));
        // YouTube has a redirect URI but no client id yet
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_invalid_number_is_reported_with_key() {
        let mut settings = Settings::default();
        let err = apply_env_overrides(
            &mut settings,
            env(&[("TOKENWARDEN_MAX_CONCURRENT_REFRESHES", "lots")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("TOKENWARDEN_MAX_CONCURRENT_REFRESHES"));
    }

    #[test]
    fn test_parse_settings_by_extension() {
        assert!(parse_settings("[monitor]\nenabled = false\n", Path::new("a.toml")).is_ok());
        assert!(parse_settings(r#"{"monitor":{"enabled":false}}"#, Path::new("a.json")).is_ok());
        assert!(matches!(
            parse_settings("", Path::new("a.yaml")),
            Err(LoaderError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            parse_settings("{", Path::new("a.json")),
            Err(LoaderError::Parse { format: "JSON", .. })
        ));
    }

    #[test]
    fn test_probe_prefers_first_name_in_order() {
        let dir = TempDir::new().unwrap();
        assert_eq!(probe_in(&[dir.path().to_path_buf()]), None);

        std::fs::create_dir(dir.path().join("config")).unwrap();
        std::fs::write(dir.path().join("config/tokenwarden.toml"), "").unwrap();
        std::fs::write(dir.path().join("tokenwarden.json"), "{}").unwrap();
        assert_eq!(
            probe_in(&[dir.path().to_path_buf()]),
            Some(dir.path().join("config/tokenwarden.toml"))
        );
    }
}

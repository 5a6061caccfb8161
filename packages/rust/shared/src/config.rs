//! Application configuration for the catalog enricher.
//!
//! User config lives at `~/.enricher/enricher.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EnricherError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "enricher.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".enricher";

// ---------------------------------------------------------------------------
// Config structs (matching enricher.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where the catalog file and database live.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Package registry settings.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Source-hosting service settings.
    #[serde(default)]
    pub hosting: HostingConfig,

    /// Aggregation defaults.
    #[serde(default)]
    pub aggregate: AggregateConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Catalog TOML file listing known packages.
    #[serde(default = "default_catalog")]
    pub catalog: String,

    /// libSQL database file.
    #[serde(default = "default_database")]
    pub database: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            catalog: default_catalog(),
            database: default_database(),
        }
    }
}

fn default_catalog() -> String {
    "catalog.toml".into()
}
fn default_database() -> String {
    "var/enricher.db".into()
}

/// `[registry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URL of the registry metadata API.
    #[serde(default = "default_registry_url")]
    pub url: String,

    /// Dotted path, inside a version object, of the minimum runtime version.
    #[serde(default = "default_runtime_version_field")]
    pub runtime_version_field: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: default_registry_url(),
            runtime_version_field: default_runtime_version_field(),
        }
    }
}

fn default_registry_url() -> String {
    "https://registry.npmjs.org".into()
}
fn default_runtime_version_field() -> String {
    "app_min_version".into()
}

/// `[hosting]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostingConfig {
    /// Base URL of the hosting JSON API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Base URL of the hosting web pages.
    #[serde(default = "default_web_url")]
    pub web_url: String,

    /// Name of the env var holding the API token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Regex matching auto-generated social-preview images.
    #[serde(default = "default_avatar_pattern")]
    pub avatar_pattern: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HostingConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            web_url: default_web_url(),
            token_env: default_token_env(),
            avatar_pattern: default_avatar_pattern(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".into()
}
fn default_web_url() -> String {
    "https://github.com".into()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_avatar_pattern() -> String {
    r"^https://(opengraph\.githubassets\.com|avatars\.githubusercontent\.com)/".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[aggregate]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateConfig {
    /// Runtime version assumed for packages that never declared one.
    #[serde(default = "default_baseline_runtime_version")]
    pub baseline_runtime_version: String,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            baseline_runtime_version: default_baseline_runtime_version(),
        }
    }
}

fn default_baseline_runtime_version() -> String {
    "1.0.0".into()
}

impl AppConfig {
    /// Reject values that would only fail later, mid-run.
    pub fn validate(&self) -> Result<()> {
        regex::Regex::new(&self.hosting.avatar_pattern).map_err(|e| {
            EnricherError::config(format!("invalid hosting.avatar_pattern: {e}"))
        })?;

        for (key, value) in [
            ("registry.url", &self.registry.url),
            ("hosting.api_url", &self.hosting.api_url),
            ("hosting.web_url", &self.hosting.web_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| EnricherError::config(format!("invalid {key} '{value}': {e}")))?;
        }

        if self.registry.runtime_version_field.trim().is_empty() {
            return Err(EnricherError::config(
                "registry.runtime_version_field must not be empty",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.enricher/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| EnricherError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.enricher/enricher.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| EnricherError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        EnricherError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let path = config_file_path()?;
    init_config_at(&path)?;
    Ok(path)
}

/// Write a default config file at `path`, creating parent directories.
pub fn init_config_at(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| EnricherError::io(dir, e))?;
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| EnricherError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| EnricherError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(())
}

/// Read the hosting API token from the env var named in config.
///
/// Unset or empty means "no credential"; requests then go out anonymously.
pub fn resolve_token(config: &AppConfig) -> Option<String> {
    match std::env::var(&config.hosting.token_env) {
        Ok(val) if !val.trim().is_empty() => Some(val.trim().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("catalog"));
        assert!(toml_str.contains("GITHUB_TOKEN"));
        assert!(toml_str.contains("baseline_runtime_version"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.hosting.timeout_secs, 30);
        assert_eq!(parsed.registry.runtime_version_field, "app_min_version");
        assert_eq!(parsed.aggregate.baseline_runtime_version, "1.0.0");
        parsed.validate().expect("defaults are valid");
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let toml_str = r#"
[paths]
catalog = "/srv/catalog.toml"

[aggregate]
baseline_runtime_version = "2.3.0"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.paths.catalog, "/srv/catalog.toml");
        assert_eq!(config.paths.database, "var/enricher.db");
        assert_eq!(config.aggregate.baseline_runtime_version, "2.3.0");
        assert_eq!(config.hosting.api_url, "https://api.github.com");
    }

    #[test]
    fn invalid_avatar_pattern_is_rejected() {
        let mut config = AppConfig::default();
        config.hosting.avatar_pattern = "([unclosed".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("avatar_pattern"));
    }

    #[test]
    fn load_config_from_file() {
        let path = std::env::temp_dir().join(format!("enricher_cfg_{}.toml", std::process::id()));
        std::fs::write(&path, "[registry]\nurl = \"not a url\"\n").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("registry.url"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn init_config_at_writes_loadable_defaults() {
        let path = std::env::temp_dir()
            .join(format!("enricher_init_{}", std::process::id()))
            .join("enricher.toml");
        init_config_at(&path).unwrap();
        let config = load_config_from(&path).unwrap();
        assert_eq!(config.paths.database, "var/enricher.db");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_token_env_means_anonymous() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.hosting.token_env = "ENRICHER_TEST_NONEXISTENT_TOKEN_12345".into();
        assert!(resolve_token(&config).is_none());
    }
}

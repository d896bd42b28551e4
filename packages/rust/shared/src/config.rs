//! Application configuration for AccessCMS.
//!
//! User config lives at `~/.accesscms/accesscms.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AccessCmsError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "accesscms.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".accesscms";

/// Key value that marks a deliberately disabled generator in test setups.
const PLACEHOLDER_API_KEY: &str = "dummy-key-for-testing";

// ---------------------------------------------------------------------------
// Config structs (matching accesscms.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Text-generation endpoint settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Adaptation fan-out settings.
    #[serde(default)]
    pub adaptation: AdaptationConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Path of the content database.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "~/.accesscms/accesscms.db".into()
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model to use for adaptation.
    #[serde(default = "default_model")]
    pub model: String,

    /// Output token budget per call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature. Kept low so the model edits values literally.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GenerationConfig {
    /// Per-call timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_temperature() -> f32 {
    0.3
}
fn default_timeout_secs() -> u64 {
    60
}

/// `[adaptation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptationConfig {
    /// Maximum concurrent generator calls during a fan-out.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,

    /// Generator attempts per profile. Only generation failures and timeouts
    /// are retried; unusable output falls back immediately.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_max_concurrency() -> u32 {
    3
}
fn default_max_attempts() -> u32 {
    1
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.accesscms/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AccessCmsError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.accesscms/accesscms.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| AccessCmsError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        AccessCmsError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| AccessCmsError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| AccessCmsError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| AccessCmsError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the database path, expanding a leading `~/`.
pub fn database_path(config: &AppConfig) -> Result<PathBuf> {
    expand_home(&config.defaults.database_path)
}

fn expand_home(raw: &str) -> Result<PathBuf> {
    match raw.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| AccessCmsError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(raw)),
    }
}

/// Read the generation API key from the configured env var.
///
/// Returns `None` when the variable is unset, empty, or holds the test
/// placeholder. `None` means generation is unavailable, which is a valid
/// steady state.
pub fn resolve_api_key(config: &AppConfig) -> Option<String> {
    std::env::var(&config.generation.api_key_env)
        .ok()
        .filter(|val| usable_api_key(val))
}

/// Whether `val` can be sent as a credential: not blank and not the test
/// placeholder.
pub fn usable_api_key(val: &str) -> bool {
    !val.trim().is_empty() && val != PLACEHOLDER_API_KEY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("database_path"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
        assert!(toml_str.contains("max_concurrency"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.generation.max_tokens, 4096);
        assert_eq!(parsed.generation.model, "openai/gpt-4o-mini");
        assert_eq!(parsed.adaptation.max_concurrency, 3);
        assert_eq!(parsed.adaptation.max_attempts, 1);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[generation]
model = "meta-llama/llama-3.1-8b-instruct"
timeout_secs = 5
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.generation.model, "meta-llama/llama-3.1-8b-instruct");
        assert_eq!(config.generation.timeout(), Duration::from_secs(5));
        assert_eq!(config.generation.base_url, "https://openrouter.ai/api/v1");
        assert!((config.generation.temperature - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn database_path_is_used_verbatim_without_tilde() {
        let mut config = AppConfig::default();
        config.defaults.database_path = "/tmp/accesscms-test.db".into();
        assert_eq!(
            database_path(&config).unwrap(),
            PathBuf::from("/tmp/accesscms-test.db")
        );
    }

    #[test]
    fn unset_api_key_resolves_to_none() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.generation.api_key_env = "ACMS_TEST_NONEXISTENT_KEY_12345".into();
        assert!(resolve_api_key(&config).is_none());
    }

    #[test]
    fn blank_and_placeholder_keys_are_unusable() {
        assert!(!usable_api_key(""));
        assert!(!usable_api_key("   "));
        assert!(!usable_api_key("\t\n"));
        assert!(!usable_api_key("dummy-key-for-testing"));

        assert!(usable_api_key("sk-or-v1-abc123"));
    }
}

//! Configuration helpers.
//!
//! Config lives in `config.json` inside the session directory (or at an
//! explicit `--config` path). A missing file means defaults; environment
//! variables override file values; validation runs before any network call.
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2:1b";
pub const DEFAULT_TIMEOUT_SECS: u64 = 1200;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_USER_AGENT: &str = "proptech_site_strategist";
pub const DEFAULT_COUNTRY_SUFFIX: &str = "Malaysia";
pub const DEFAULT_GEOCODER_TIMEOUT_SECS: u64 = 10;

pub const ENV_BACKEND_URL: &str = "PROPTECH_BACKEND_URL";
pub const ENV_MODEL: &str = "PROPTECH_MODEL";
pub const ENV_GEOCODER_URL: &str = "PROPTECH_GEOCODER_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub schema_version: u32,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
}

/// Text-generation backend settings shared by every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub user_agent: String,
    /// Appended to every query (`"{location}, {suffix}"`); empty disables it.
    pub country_suffix: String,
    pub timeout_secs: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GEOCODER_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            country_suffix: DEFAULT_COUNTRY_SUFFIX.to_string(),
            timeout_secs: DEFAULT_GEOCODER_TIMEOUT_SECS,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        default_config()
    }
}

pub fn default_config() -> AppConfig {
    AppConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        backend: BackendConfig::default(),
        geocoder: GeocoderConfig::default(),
    }
}

/// Render a pretty JSON config stub for new sessions.
pub fn config_stub() -> String {
    let config = default_config();
    serde_json::to_string_pretty(&config).expect("serialize config stub")
}

/// Load config from `path`, falling back to defaults when it does not exist.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(default_config());
    }
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: AppConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    Ok(config)
}

/// Apply environment overrides; `lookup` is `std::env::var` outside tests.
pub fn apply_env_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
    if let Some(url) = non_empty(ENV_BACKEND_URL) {
        config.backend.base_url = url.trim().to_string();
    }
    if let Some(model) = non_empty(ENV_MODEL) {
        config.backend.model = model.trim().to_string();
    }
    if let Some(url) = non_empty(ENV_GEOCODER_URL) {
        config.geocoder.base_url = url.trim().to_string();
    }
}

pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    validate_url(&config.backend.base_url, "backend.base_url")?;
    validate_url(&config.geocoder.base_url, "geocoder.base_url")?;
    if config.backend.model.trim().is_empty() {
        return Err(anyhow!("backend.model must be non-empty"));
    }
    if config.backend.timeout_secs == 0 {
        return Err(anyhow!("backend.timeout_secs must be positive"));
    }
    if !(0.0..=2.0).contains(&config.backend.temperature) {
        return Err(anyhow!(
            "backend.temperature must be within 0.0..=2.0 (got {})",
            config.backend.temperature
        ));
    }
    if config.geocoder.timeout_secs == 0 {
        return Err(anyhow!("geocoder.timeout_secs must be positive"));
    }
    if config.geocoder.user_agent.trim().is_empty() {
        return Err(anyhow!("geocoder.user_agent must be non-empty"));
    }
    Ok(())
}

/// Load, override from the process environment, and validate.
pub fn resolve_config(path: &Path) -> Result<AppConfig> {
    let mut config = load_config(path)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config)?;
    tracing::debug!(
        backend = %config.backend.base_url,
        model = %config.backend.model,
        "config resolved"
    );
    Ok(config)
}

fn validate_url(url: &str, label: &str) -> Result<()> {
    let pattern = Regex::new(r"^https?://[^\s/?#]+(/[^\s]*)?$").context("compile URL pattern")?;
    if !pattern.is_match(url) {
        return Err(anyhow!("{label} must be an http(s) URL (got {url:?})"));
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

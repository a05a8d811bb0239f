//! Configuration loading and merging logic
//!
//! Handles loading configuration from multiple sources and merging them
//! according to precedence rules. Layers are merged as YAML trees so a file
//! only overrides the keys it actually mentions.

use super::{defaults, paths, schema::Config};
use anyhow::{Context, Result};
use serde_yaml::Value;
use std::path::{Path, PathBuf};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with all layers merged
    ///
    /// Precedence order (highest to lowest):
    /// 1. Environment variable overrides
    /// 2. Profile config (`profiles/<name>.yaml`)
    /// 3. Root config
    /// 4. Built-in defaults
    pub fn load(profile: Option<&str>) -> Result<Config> {
        Self::load_from_dir(&paths::config_dir(), profile, |key| std::env::var(key).ok())
    }

    /// Load from an explicit config directory with a custom environment lookup
    pub fn load_from_dir(
        config_dir: &Path,
        profile: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Config> {
        let mut merged = defaults::default_layer();

        let root_path = config_dir.join("config.yaml");
        if let Some(layer) = Self::read_layer(&root_path)? {
            merge_values(&mut merged, layer);
        }

        if let Some(name) = profile {
            let profile_path = paths::profile_config_path_in(config_dir, name);
            match Self::read_layer(&profile_path)? {
                Some(layer) => merge_values(&mut merged, layer),
                None => tracing::warn!(profile = name, "Profile config not found"),
            }
        }

        let config: Config =
            serde_yaml::from_value(merged).context("Failed to build merged configuration")?;
        Ok(Self::apply_env_overrides(config, env))
    }

    /// Load configuration from a single file
    pub fn load_file(path: &PathBuf) -> Result<Config> {
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate the root config file and the merged result
    ///
    /// Fails on invalid YAML, wrong value types and out-of-range settings.
    pub fn validate(profile: Option<&str>) -> Result<()> {
        let root_path = paths::root_config_path();
        if root_path.exists() {
            Self::load_file(&root_path)?
                .validate()
                .with_context(|| format!("Invalid settings in {}", root_path.display()))?;
        }

        Self::load(profile)
            .context("Failed to load merged configuration")?
            .validate()
    }

    /// Load default configuration
    pub fn load_defaults() -> Config {
        defaults::default_config()
    }

    fn read_layer(path: &Path) -> Result<Option<Value>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let value: Value = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded config layer");
        Ok(Some(value))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: Config, env: impl Fn(&str) -> Option<String>) -> Config {
        if let Some(url) = env("KODO_BACKEND_URL") {
            config.backend.url = url;
        }

        if let Some(key) = env("KODO_ANON_KEY") {
            config.backend.anon_key = key;
        }

        if let Some(token) = env("KODO_ACCESS_TOKEN") {
            config.auth.access_token = Some(token);
        }

        if let Some(user_id) = env("KODO_USER_ID") {
            config.auth.user_id = Some(user_id);
        }

        if let Some(read_only) = env("KODO_READ_ONLY") {
            match read_only.parse::<bool>() {
                Ok(val) => config.read_only = val,
                Err(_) => tracing::warn!(value = %read_only, "Ignoring invalid KODO_READ_ONLY"),
            }
        }

        config
    }

    /// Save configuration to a file
    pub fn save(config: &Config, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            paths::ensure_dir(parent)?;
        }

        let yaml =
            serde_yaml::to_string(config).context("Failed to serialize configuration to YAML")?;

        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Save root configuration
    pub fn save_root(config: &Config) -> Result<()> {
        Self::save(config, &paths::root_config_path())
    }
}

/// Recursively merge `overlay` into `base`; mappings merge key by key and
/// anything else replaces the base value
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        // An empty file parses as null and changes nothing
        (_, Value::Null) => {}
        (slot, value) => *slot = value,
    }
}

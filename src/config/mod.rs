//! Configuration system for kodo
//!
//! Layered YAML configuration: built-in defaults, a root file, an optional
//! profile file and environment overrides, plus dot-key get/set for the CLI.

mod defaults;
pub mod loader;
pub mod paths;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{AuthConfig, BackendConfig, Config, JobsConfig, SyncConfig, UiConfig, ViewsConfig};

use anyhow::Context;

/// Keys accepted by `get_config_value` and `set_config_value`
pub const CONFIG_KEYS: &[&str] = &[
    "readOnly",
    "backend.url",
    "backend.anonKey",
    "backend.requestTimeoutSecs",
    "auth.email",
    "sync.maxRetries",
    "sync.initialBackoffMs",
    "sync.maxBackoffMs",
    "sync.pollIntervalMs",
    "sync.queryLimit",
    "views.criticalAnomalyThreshold",
    "views.restartThreshold",
    "views.anomalyWindowHours",
    "jobs.deletionBatchSize",
    "jobs.progressEvery",
    "ui.enableMouse",
    "ui.noIcons",
    "ui.refreshMs",
];

/// Get a configuration value by key (dot notation)
pub fn get_config_value(config: &Config, key: &str) -> anyhow::Result<String> {
    let value = match key {
        "readOnly" => config.read_only.to_string(),
        "backend.url" => config.backend.url.clone(),
        "backend.anonKey" => config.backend.anon_key.clone(),
        "backend.requestTimeoutSecs" => config.backend.request_timeout_secs.to_string(),
        "auth.email" => config.auth.email.clone().unwrap_or_default(),
        "sync.maxRetries" => config.sync.max_retries.to_string(),
        "sync.initialBackoffMs" => config.sync.initial_backoff_ms.to_string(),
        "sync.maxBackoffMs" => config.sync.max_backoff_ms.to_string(),
        "sync.pollIntervalMs" => config.sync.poll_interval_ms.to_string(),
        "sync.queryLimit" => config.sync.query_limit.to_string(),
        "views.criticalAnomalyThreshold" => config.views.critical_anomaly_threshold.to_string(),
        "views.restartThreshold" => config.views.restart_threshold.to_string(),
        "views.anomalyWindowHours" => config.views.anomaly_window_hours.to_string(),
        "jobs.deletionBatchSize" => config.jobs.deletion_batch_size.to_string(),
        "jobs.progressEvery" => config.jobs.progress_every.to_string(),
        "ui.enableMouse" => config.ui.enable_mouse.to_string(),
        "ui.noIcons" => config.ui.no_icons.to_string(),
        "ui.refreshMs" => config.ui.refresh_ms.to_string(),
        _ => return Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    };
    Ok(value)
}

fn parse<T: std::str::FromStr>(key: &str, value: &str, expected: &str) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("{} must be {}", key, expected))
}

/// Set a configuration value by key (dot notation)
pub fn set_config_value(config: &mut Config, key: &str, value: &str) -> anyhow::Result<()> {
    const BOOL: &str = "'true' or 'false'";
    const NUMBER: &str = "a number";

    match key {
        "readOnly" => config.read_only = parse(key, value, BOOL)?,
        "backend.url" => {
            if !value.is_empty() {
                url::Url::parse(value).context("backend.url must be a valid URL")?;
            }
            config.backend.url = value.to_string();
        }
        "backend.anonKey" => config.backend.anon_key = value.to_string(),
        "backend.requestTimeoutSecs" => {
            config.backend.request_timeout_secs = parse(key, value, NUMBER)?
        }
        "auth.email" => {
            config.auth.email = (!value.is_empty()).then(|| value.to_string());
        }
        "sync.maxRetries" => config.sync.max_retries = parse(key, value, NUMBER)?,
        "sync.initialBackoffMs" => config.sync.initial_backoff_ms = parse(key, value, NUMBER)?,
        "sync.maxBackoffMs" => config.sync.max_backoff_ms = parse(key, value, NUMBER)?,
        "sync.pollIntervalMs" => config.sync.poll_interval_ms = parse(key, value, NUMBER)?,
        "sync.queryLimit" => config.sync.query_limit = parse(key, value, NUMBER)?,
        "views.criticalAnomalyThreshold" => {
            config.views.critical_anomaly_threshold = parse(key, value, NUMBER)?
        }
        "views.restartThreshold" => config.views.restart_threshold = parse(key, value, NUMBER)?,
        "views.anomalyWindowHours" => {
            config.views.anomaly_window_hours = parse(key, value, NUMBER)?
        }
        "jobs.deletionBatchSize" => config.jobs.deletion_batch_size = parse(key, value, NUMBER)?,
        "jobs.progressEvery" => config.jobs.progress_every = parse(key, value, NUMBER)?,
        "ui.enableMouse" => config.ui.enable_mouse = parse(key, value, BOOL)?,
        "ui.noIcons" => config.ui.no_icons = parse(key, value, BOOL)?,
        "ui.refreshMs" => config.ui.refresh_ms = parse(key, value, NUMBER)?,
        _ => return Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }

    config.validate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_key_is_readable() {
        let config = Config::default();
        for key in CONFIG_KEYS {
            get_config_value(&config, key).unwrap();
        }
    }

    #[test]
    fn test_set_and_get() {
        let mut config = Config::default();
        set_config_value(&mut config, "views.criticalAnomalyThreshold", "4").unwrap();
        assert_eq!(
            get_config_value(&config, "views.criticalAnomalyThreshold").unwrap(),
            "4"
        );

        assert!(set_config_value(&mut config, "readOnly", "maybe").is_err());
        assert!(set_config_value(&mut config, "no.such.key", "1").is_err());
        assert!(set_config_value(&mut config, "sync.queryLimit", "0").is_err());
    }
}

//! Configuration schema definitions
//!
//! Defines the structure of configuration files using serde for serialization.

use crate::sync::{RetryPolicy, SyncSettings};
use crate::views::ViewThresholds;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Disable status changes and deletions globally
    #[serde(default)]
    pub read_only: bool,

    /// Remote backend connection
    #[serde(default)]
    pub backend: BackendConfig,

    /// Static credentials (usually from the environment)
    #[serde(default)]
    pub auth: AuthConfig,

    /// Synchronizer tuning
    #[serde(default)]
    pub sync: SyncConfig,

    /// Derived view thresholds
    #[serde(default)]
    pub views: ViewsConfig,

    /// Background job tuning
    #[serde(default)]
    pub jobs: JobsConfig,

    /// UI configuration
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Project URL, e.g. https://xyz.example.co
    #[serde(default)]
    pub url: String,

    /// Public (anon) API key sent with every request
    #[serde(default)]
    pub anon_key: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// Bearer token used instead of a password sign-in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// User the static token belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Default sign-in email for `kodo login`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Retries for a failed bulk query or subscribe
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Change-feed poll interval for the HTTP store
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Row cap on bulk queries
    #[serde(default = "default_query_limit")]
    pub query_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViewsConfig {
    /// Anomalies in the window above this count make a cluster critical
    #[serde(default = "default_critical_anomaly_threshold")]
    pub critical_anomaly_threshold: usize,

    /// Container restarts above this count degrade a pod
    #[serde(default = "default_restart_threshold")]
    pub restart_threshold: u32,

    #[serde(default = "default_anomaly_window_hours")]
    pub anomaly_window_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobsConfig {
    /// Rows deleted per batch from the metrics table
    #[serde(default = "default_deletion_batch_size")]
    pub deletion_batch_size: usize,

    /// Batches between progress updates on the notification
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UiConfig {
    /// Enable mouse support
    #[serde(default)]
    pub enable_mouse: bool,

    /// Disable Unicode icons for compatibility
    #[serde(default)]
    pub no_icons: bool,

    /// Redraw interval
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_query_limit() -> usize {
    500
}

fn default_critical_anomaly_threshold() -> usize {
    2
}

fn default_restart_threshold() -> u32 {
    3
}

fn default_anomaly_window_hours() -> i64 {
    24
}

fn default_deletion_batch_size() -> usize {
    1000
}

fn default_progress_every() -> usize {
    5
}

fn default_refresh_ms() -> u64 {
    250
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            query_limit: default_query_limit(),
        }
    }
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            critical_anomaly_threshold: default_critical_anomaly_threshold(),
            restart_threshold: default_restart_threshold(),
            anomaly_window_hours: default_anomaly_window_hours(),
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            deletion_batch_size: default_deletion_batch_size(),
            progress_every: default_progress_every(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            enable_mouse: false,
            no_icons: false,
            refresh_ms: default_refresh_ms(),
        }
    }
}

impl Config {
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            retry: RetryPolicy {
                max_retries: self.sync.max_retries,
                initial_backoff: Duration::from_millis(self.sync.initial_backoff_ms),
                max_backoff: Duration::from_millis(self.sync.max_backoff_ms),
            },
            query_limit: self.sync.query_limit,
            read_only: self.read_only,
        }
    }

    pub fn view_thresholds(&self) -> ViewThresholds {
        ViewThresholds {
            critical_anomaly_threshold: self.views.critical_anomaly_threshold,
            restart_threshold: self.views.restart_threshold,
            anomaly_window: chrono::Duration::hours(self.views.anomaly_window_hours),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.sync.poll_interval_ms)
    }

    /// Whether a backend has been configured at all
    pub fn has_backend(&self) -> bool {
        !self.backend.url.is_empty() && !self.backend.anon_key.is_empty()
    }

    /// Semantic checks beyond what deserialization enforces
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.backend.url.is_empty() {
            url::Url::parse(&self.backend.url)
                .map_err(|e| anyhow::anyhow!("backend.url is not a valid URL: {}", e))?;
        }
        if self.sync.initial_backoff_ms > self.sync.max_backoff_ms {
            anyhow::bail!(
                "sync.initialBackoffMs ({}) exceeds sync.maxBackoffMs ({})",
                self.sync.initial_backoff_ms,
                self.sync.max_backoff_ms
            );
        }
        if self.sync.query_limit == 0 {
            anyhow::bail!("sync.queryLimit must be at least 1");
        }
        if self.jobs.deletion_batch_size == 0 {
            anyhow::bail!("jobs.deletionBatchSize must be at least 1");
        }
        if self.jobs.progress_every == 0 {
            anyhow::bail!("jobs.progressEvery must be at least 1");
        }
        if self.views.anomaly_window_hours <= 0 {
            anyhow::bail!("views.anomalyWindowHours must be positive");
        }
        Ok(())
    }
}

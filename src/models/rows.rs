//! Per-entity row schemas
//!
//! Rows arrive from the remote store as JSON objects. These structs are the
//! validated shape the rest of the crate works with: required keys must be
//! present, nullable numeric columns collapse to zero, and nested blobs that
//! fail to parse are treated as absent instead of rejecting the whole row.

use super::metrics::ClusterMetrics;
use super::status::{
    ClusterStatus, NotificationKind, Provider, RecommendationStatus, RecommendationType,
    Severity, ThreatStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A Kubernetes cluster registered by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub provider: Provider,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub environment: String,
    pub status: ClusterStatus,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub node_count: u32,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub pod_count: u32,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub cpu_usage: f64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub memory_usage: f64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub storage_usage: f64,
    /// Raw metrics blob written by the reporter
    #[serde(default, deserialize_with = "de::lenient", skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ClusterMetrics>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// AI-generated incident card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub cluster_id: String,
    pub severity: Severity,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub description: String,
    #[serde(default)]
    pub root_cause: Option<String>,
    #[serde(default)]
    pub recommendation: Option<String>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub action_taken: bool,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Incident {
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}

/// Anomaly raised by the detection pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: String,
    pub cluster_id: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub anomaly_type: String,
    pub severity: Severity,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub resolved: bool,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub auto_heal_applied: bool,
    #[serde(default)]
    pub detected_at: Option<DateTime<Utc>>,
}

/// Persistent volume right-sizing recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageRecommendation {
    pub id: String,
    pub cluster_id: String,
    pub pvc_name: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub namespace: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub current_size_gb: f64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub recommended_size_gb: f64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub avg_usage: f64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub p95_usage: f64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub p99_usage: f64,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub max_usage: f64,
    pub recommendation_type: RecommendationType,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub potential_savings: f64,
    pub status: RecommendationStatus,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Security finding for a cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityThreat {
    pub id: String,
    pub cluster_id: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub threat_type: String,
    pub severity: Severity,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub description: String,
    pub status: ThreatStatus,
    #[serde(default)]
    pub detected_at: Option<DateTime<Utc>>,
}

/// User-facing notification, also used as a progress channel by background jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub message: String,
    #[serde(rename = "type", default, deserialize_with = "de::null_as_default")]
    pub kind: NotificationKind,
    #[serde(default)]
    pub related_cluster_id: Option<String>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub read: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

mod de {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};

    /// Treat an explicit JSON `null` the same as a missing key
    pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }

    /// Parse a nested blob, falling back to `None` if it has the wrong shape
    pub fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(value.and_then(|v| serde_json::from_value(v).ok()))
    }
}

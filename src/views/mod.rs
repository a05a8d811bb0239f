//! Derived views
//!
//! Pure functions over cache snapshots that produce display-ready
//! aggregates. Nothing here touches the cache or the network; a view is a
//! function of the snapshot and the thresholds it is given.
//!
//! Structure:
//! - `pods.rs` - pod health bucketing from the metrics blob
//! - `status.rs` - overall cluster status priority chain
//! - `usage.rs` - nearest-rank percentile and usage summaries
//! - `savings.rs` - storage savings aggregation
//! - `feed.rs` - incident feed, anomaly window, security and inbox summaries
//! - `overview.rs` - per-cluster overview and fleet summary

pub mod feed;
pub mod overview;
pub mod pods;
pub mod savings;
pub mod status;
pub mod usage;

pub use feed::{
    IncidentFilter, IncidentRow, InboxSummary, SecuritySummary, anomalies_within, incident_feed,
    inbox, security_summary,
};
pub use overview::{ClusterOverview, FleetSummary, cluster_overview, fleet_summary};
pub use pods::{PodBucket, PodHealth, classify_pod, cluster_pod_health, pod_health};
pub use savings::potential_savings;
pub use status::overall_status;
pub use usage::{UsageSummary, percentile, summarize};

/// Tunable thresholds for the derived views
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewThresholds {
    /// Recent anomalies above this count make a cluster critical
    pub critical_anomaly_threshold: usize,
    /// Container restarts above this count degrade a pod
    pub restart_threshold: u32,
    /// Window used for "recent" anomalies
    pub anomaly_window: chrono::Duration,
}

impl Default for ViewThresholds {
    fn default() -> Self {
        Self {
            critical_anomaly_threshold: 2,
            restart_threshold: 3,
            anomaly_window: chrono::Duration::hours(24),
        }
    }
}

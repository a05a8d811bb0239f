//! Overall cluster status

use super::pods::PodHealth;
use crate::models::{Cluster, ClusterStatus};

/// Combine the stored status, pod health and recent anomalies
///
/// Critical is decided first and short-circuits: offline, any critical pod,
/// or more than `critical_anomaly_threshold` recent anomalies. Warning
/// follows: a stored warning status, any warning pod, or any recent anomaly.
pub fn overall_status(
    cluster: &Cluster,
    pods: &PodHealth,
    recent_anomalies: usize,
    critical_anomaly_threshold: usize,
) -> ClusterStatus {
    if cluster.status == ClusterStatus::Offline
        || pods.critical > 0
        || recent_anomalies > critical_anomaly_threshold
    {
        ClusterStatus::Critical
    } else if cluster.status == ClusterStatus::Warning || pods.warning > 0 || recent_anomalies > 0
    {
        ClusterStatus::Warning
    } else {
        ClusterStatus::Healthy
    }
}

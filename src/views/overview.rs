//! Per-cluster overview and fleet summary

use super::ViewThresholds;
use super::feed::{SecuritySummary, anomalies_within, security_summary};
use super::pods::{PodHealth, cluster_pod_health};
use super::savings::potential_savings;
use super::status::overall_status;
use super::usage::{UsageSummary, summarize};
use crate::cache::CacheSnapshot;
use crate::models::{Cluster, ClusterStatus};
use chrono::{DateTime, Utc};

/// Everything the dashboard header shows for the selected cluster
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterOverview {
    pub cluster: Cluster,
    pub status: ClusterStatus,
    pub pods: PodHealth,
    pub recent_anomalies: usize,
    pub cpu: UsageSummary,
    pub memory: UsageSummary,
    pub open_incidents: usize,
    pub potential_savings: f64,
    pub security: SecuritySummary,
}

/// Usage history, or the current gauge when no history was reported
fn usage_series(history: Option<&Vec<f64>>, gauge: f64) -> UsageSummary {
    match history {
        Some(h) if !h.is_empty() => summarize(h),
        _ => summarize(&[gauge]),
    }
}

pub fn cluster_overview(
    snapshot: &CacheSnapshot,
    cluster_id: &str,
    thresholds: &ViewThresholds,
    now: DateTime<Utc>,
) -> Option<ClusterOverview> {
    let cluster = snapshot.cluster(cluster_id)?;
    let pods = cluster_pod_health(cluster, thresholds.restart_threshold);
    let recent_anomalies =
        anomalies_within(&snapshot.anomalies, cluster_id, thresholds.anomaly_window, now);
    let status = overall_status(
        cluster,
        &pods,
        recent_anomalies,
        thresholds.critical_anomaly_threshold,
    );

    let metrics = cluster.metrics.as_ref();
    Some(ClusterOverview {
        cluster: cluster.clone(),
        status,
        pods,
        recent_anomalies,
        cpu: usage_series(metrics.map(|m| &m.cpu_history), cluster.cpu_usage),
        memory: usage_series(metrics.map(|m| &m.memory_history), cluster.memory_usage),
        open_incidents: snapshot
            .incidents
            .iter()
            .filter(|i| i.cluster_id == cluster_id && !i.is_resolved())
            .count(),
        potential_savings: potential_savings(
            snapshot
                .recommendations
                .iter()
                .filter(|r| r.cluster_id == cluster_id),
        ),
        security: security_summary(&snapshot.threats, Some(cluster_id)),
    })
}

/// Totals across every owned cluster
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FleetSummary {
    pub clusters: usize,
    pub healthy: usize,
    pub warning: usize,
    pub critical: usize,
    pub nodes: u64,
    pub pods: u64,
    pub open_incidents: usize,
    pub potential_savings: f64,
}

/// Fleet totals over the cached rows
///
/// Only the selected cluster has its dependent rows cached, so anomaly,
/// incident and savings figures cover what is currently loaded.
pub fn fleet_summary(
    snapshot: &CacheSnapshot,
    thresholds: &ViewThresholds,
    now: DateTime<Utc>,
) -> FleetSummary {
    let mut summary = FleetSummary {
        clusters: snapshot.clusters.len(),
        open_incidents: snapshot.incidents.iter().filter(|i| !i.is_resolved()).count(),
        potential_savings: potential_savings(&snapshot.recommendations),
        ..Default::default()
    };

    for cluster in &snapshot.clusters {
        let pods = cluster_pod_health(cluster, thresholds.restart_threshold);
        let recent =
            anomalies_within(&snapshot.anomalies, &cluster.id, thresholds.anomaly_window, now);
        match overall_status(cluster, &pods, recent, thresholds.critical_anomaly_threshold) {
            ClusterStatus::Critical | ClusterStatus::Offline => summary.critical += 1,
            ClusterStatus::Warning => summary.warning += 1,
            ClusterStatus::Healthy => summary.healthy += 1,
        }
        summary.nodes += u64::from(cluster.node_count);
        summary.pods += u64::from(cluster.pod_count);
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        "2024-05-02T12:00:00Z".parse().unwrap()
    }

    fn snapshot() -> CacheSnapshot {
        CacheSnapshot {
            clusters: vec![
                serde_json::from_value(json!({
                    "id": "a", "user_id": "u", "name": "alpha", "status": "healthy",
                    "node_count": 3, "pod_count": 2, "cpu_usage": 55.0,
                    "metrics": {
                        "pods": [
                            { "name": "p1", "phase": "Running", "containers": [{ "ready": true }] },
                            { "name": "p2", "phase": "Pending" }
                        ],
                        "cpuHistory": [10.0, 20.0, 30.0, 40.0, 50.0]
                    }
                }))
                .unwrap(),
                serde_json::from_value(json!({
                    "id": "b", "user_id": "u", "name": "beta", "status": "offline", "node_count": 1
                }))
                .unwrap(),
            ],
            recommendations: vec![
                serde_json::from_value(json!({
                    "id": "r1", "cluster_id": "a", "pvc_name": "data",
                    "recommendation_type": "downsize", "potential_savings": 12.0, "status": "pending"
                }))
                .unwrap(),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_cluster_overview() {
        let overview = cluster_overview(&snapshot(), "a", &ViewThresholds::default(), now()).unwrap();
        assert_eq!(overview.status, ClusterStatus::Warning);
        assert_eq!(overview.pods.warning, 1);
        assert_eq!(overview.cpu.p95, 50.0);
        assert_eq!(overview.cpu.average, 30.0);
        // No memory history falls back to the gauge
        assert_eq!(overview.memory.samples, 1);
        assert_eq!(overview.potential_savings, 12.0);
    }

    #[test]
    fn test_overview_of_unknown_cluster() {
        assert!(cluster_overview(&snapshot(), "zzz", &ViewThresholds::default(), now()).is_none());
    }

    #[test]
    fn test_fleet_summary() {
        let fleet = fleet_summary(&snapshot(), &ViewThresholds::default(), now());
        assert_eq!(fleet.clusters, 2);
        assert_eq!(fleet.warning, 1);
        assert_eq!(fleet.critical, 1);
        assert_eq!(fleet.nodes, 4);
        assert_eq!(fleet.potential_savings, 12.0);
    }
}

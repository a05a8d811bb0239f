//! Conversion from Kubernetes objects to the reporter's metric shapes

use crate::models::{ClusterMetrics, ContainerSnapshot, PodSnapshot};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use serde_json::{Value, json};

/// Convert a pod into the snapshot consumed by the pod-health view
pub fn pod_snapshot(pod: &Pod) -> PodSnapshot {
    let status = pod.status.as_ref();
    let containers = status
        .and_then(|s| s.container_statuses.as_ref())
        .map(|statuses| {
            statuses
                .iter()
                .map(|c| ContainerSnapshot {
                    name: c.name.clone(),
                    ready: c.ready,
                    restart_count: u32::try_from(c.restart_count).unwrap_or(0),
                })
                .collect()
        })
        .unwrap_or_default();

    PodSnapshot {
        name: pod.metadata.name.clone().unwrap_or_default(),
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        phase: status
            .and_then(|s| s.phase.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        containers,
    }
}

/// Workload state collected from one cluster
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterReport {
    pub node_count: u32,
    pub pods: Vec<PodSnapshot>,
}

impl ClusterReport {
    pub fn from_objects(node_count: usize, pods: &[Pod]) -> Self {
        let mut pods: Vec<PodSnapshot> = pods.iter().map(pod_snapshot).collect();
        pods.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        Self {
            node_count: u32::try_from(node_count).unwrap_or(u32::MAX),
            pods,
        }
    }

    /// Patch for the cluster row; usage history already on the row is kept
    pub fn to_patch(&self, existing: Option<ClusterMetrics>, now: DateTime<Utc>) -> Value {
        let mut metrics = existing.unwrap_or_default();
        metrics.pods = self.pods.clone();
        json!({
            "node_count": self.node_count,
            "pod_count": self.pods.len(),
            "metrics": metrics,
            "updated_at": now.to_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{ContainerStatus, PodStatus};
    use kube::api::ObjectMeta;

    fn pod(name: &str, phase: Option<&str>, containers: &[(bool, i32)]) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: phase.map(str::to_string),
                container_statuses: Some(
                    containers
                        .iter()
                        .enumerate()
                        .map(|(i, (ready, restarts))| ContainerStatus {
                            name: format!("c{}", i),
                            ready: *ready,
                            restart_count: *restarts,
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_pod_snapshot_conversion() {
        let snap = pod_snapshot(&pod("api-0", Some("Running"), &[(true, 0), (false, 4)]));
        assert_eq!(snap.name, "api-0");
        assert_eq!(snap.phase, "Running");
        assert_eq!(snap.max_restarts(), 4);
        assert!(!snap.all_containers_ready());
    }

    #[test]
    fn test_missing_status_is_unknown_phase() {
        let bare = Pod {
            metadata: ObjectMeta {
                name: Some("bare".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let snap = pod_snapshot(&bare);
        assert_eq!(snap.phase, "Unknown");
        assert!(snap.containers.is_empty());
    }

    #[test]
    fn test_patch_keeps_history() {
        let report = ClusterReport::from_objects(3, &[pod("b", Some("Running"), &[(true, 0)])]);
        let existing = ClusterMetrics {
            cpu_history: vec![10.0, 20.0],
            ..Default::default()
        };
        let patch = report.to_patch(Some(existing), Utc::now());
        assert_eq!(patch["node_count"], 3);
        assert_eq!(patch["pod_count"], 1);
        assert_eq!(patch["metrics"]["cpu_history"], json!([10.0, 20.0]));
        assert_eq!(patch["metrics"]["pods"][0]["name"], "b");
    }
}

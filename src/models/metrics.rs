//! Metrics blob stored on cluster rows
//!
//! The reporter writes pod statuses and a short usage history into the
//! `metrics` column. Every field is optional on the wire so that partially
//! populated blobs still produce usable (zeroed) views.

use serde::{Deserialize, Serialize};

/// Snapshot of cluster workload state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterMetrics {
    pub pods: Vec<PodSnapshot>,
    /// CPU utilisation percentages, oldest first
    #[serde(alias = "cpuHistory")]
    pub cpu_history: Vec<f64>,
    /// Memory utilisation percentages, oldest first
    #[serde(alias = "memoryHistory")]
    pub memory_history: Vec<f64>,
}

/// Pod status as reported by the metrics agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PodSnapshot {
    pub name: String,
    pub namespace: String,
    /// Pod phase as reported by the kubelet (e.g. "Running", "Pending")
    pub phase: String,
    pub containers: Vec<ContainerSnapshot>,
}

/// Per-container readiness and restart count
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSnapshot {
    pub name: String,
    pub ready: bool,
    #[serde(alias = "restartCount")]
    pub restart_count: u32,
}

impl PodSnapshot {
    /// Highest restart count across containers
    pub fn max_restarts(&self) -> u32 {
        self.containers
            .iter()
            .map(|c| c.restart_count)
            .max()
            .unwrap_or(0)
    }

    pub fn all_containers_ready(&self) -> bool {
        self.containers.iter().all(|c| c.ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_camel_case_aliases() {
        let metrics: ClusterMetrics = serde_json::from_value(json!({
            "pods": [{
                "name": "api-0",
                "phase": "Running",
                "containers": [{ "name": "api", "ready": true, "restartCount": 4 }]
            }],
            "cpuHistory": [10.0, 20.0]
        }))
        .unwrap();

        assert_eq!(metrics.pods[0].max_restarts(), 4);
        assert_eq!(metrics.cpu_history, vec![10.0, 20.0]);
        assert!(metrics.memory_history.is_empty());
    }

    #[test]
    fn test_pod_without_containers() {
        let pod = PodSnapshot::default();
        assert_eq!(pod.max_restarts(), 0);
        assert!(pod.all_containers_ready());
    }
}

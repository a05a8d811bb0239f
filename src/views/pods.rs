//! Pod health bucketing

use crate::models::{Cluster, PodSnapshot};

/// Health bucket of a single pod
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodBucket {
    Healthy,
    Warning,
    Critical,
}

/// Pod counts per bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PodHealth {
    pub healthy: usize,
    pub warning: usize,
    pub critical: usize,
    pub total: usize,
}

impl PodHealth {
    fn add(&mut self, bucket: PodBucket) {
        match bucket {
            PodBucket::Healthy => self.healthy += 1,
            PodBucket::Warning => self.warning += 1,
            PodBucket::Critical => self.critical += 1,
        }
        self.total += 1;
    }
}

/// Bucket one pod
///
/// Rules apply in order: running with every container ready and no excess
/// restarts is healthy; pending or any excess restarts is warning; failed or
/// unknown is critical. Phases outside those rules fall back to healthy.
pub fn classify_pod(pod: &PodSnapshot, restart_threshold: u32) -> PodBucket {
    let phase = pod.phase.to_ascii_lowercase();
    let restarting = pod.max_restarts() > restart_threshold;

    if phase == "running" && pod.all_containers_ready() && !restarting {
        PodBucket::Healthy
    } else if phase == "pending" || restarting {
        PodBucket::Warning
    } else if phase == "failed" || phase == "unknown" {
        PodBucket::Critical
    } else {
        PodBucket::Healthy
    }
}

pub fn pod_health(pods: &[PodSnapshot], restart_threshold: u32) -> PodHealth {
    pods.iter()
        .map(|pod| classify_pod(pod, restart_threshold))
        .fold(PodHealth::default(), |mut acc, bucket| {
            acc.add(bucket);
            acc
        })
}

/// Pod health of a cluster; a missing metrics blob counts as no pods
pub fn cluster_pod_health(cluster: &Cluster, restart_threshold: u32) -> PodHealth {
    cluster
        .metrics
        .as_ref()
        .map(|m| pod_health(&m.pods, restart_threshold))
        .unwrap_or_default()
}

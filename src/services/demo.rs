//! Demo data for `kodo --demo`
//!
//! Seeds an in-memory store with a small fleet so the dashboard can be
//! explored without a backend.

use crate::store::MemoryStore;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};

pub const DEMO_USER: &str = "demo-user";

fn ts(now: DateTime<Utc>, minutes_ago: i64) -> String {
    (now - Duration::minutes(minutes_ago)).to_rfc3339()
}

fn pod(name: &str, namespace: &str, phase: &str, ready: bool, restarts: u32) -> Value {
    json!({
        "name": name,
        "namespace": namespace,
        "phase": phase,
        "containers": [{ "name": "main", "ready": ready, "restart_count": restarts }]
    })
}

/// Populate `store` with clusters and their dependent rows for `user_id`
pub fn seed(store: &MemoryStore, user_id: &str, now: DateTime<Utc>) {
    let clusters = [
        json!({
            "id": "demo-prod", "user_id": user_id, "name": "prod-eu-west",
            "provider": "aws", "environment": "production", "status": "healthy",
            "node_count": 6, "pod_count": 5, "cpu_usage": 62.0, "memory_usage": 71.5,
            "storage_usage": 48.0,
            "metrics": {
                "pods": [
                    pod("api-7f9c", "shop", "Running", true, 0),
                    pod("api-2b1d", "shop", "Running", true, 1),
                    pod("worker-0", "shop", "Running", false, 7),
                    pod("cron-report", "batch", "Failed", false, 0),
                    pod("cache-0", "shop", "Running", true, 0),
                ],
                "cpu_history": [41.0, 48.5, 55.0, 63.5, 58.0, 62.0, 77.5, 60.0],
                "memory_history": [66.0, 68.0, 70.5, 71.0, 71.5, 73.0, 72.0, 71.5]
            },
            "created_at": ts(now, 60 * 24 * 40),
            "updated_at": ts(now, 2),
        }),
        json!({
            "id": "demo-staging", "user_id": user_id, "name": "staging",
            "provider": "gcp", "environment": "staging", "status": "healthy",
            "node_count": 2, "pod_count": 3, "cpu_usage": 18.0, "memory_usage": 35.0,
            "metrics": {
                "pods": [
                    pod("api-0", "shop", "Running", true, 0),
                    pod("worker-0", "shop", "Pending", false, 0),
                    pod("db-0", "data", "Running", true, 0),
                ],
                "cpu_history": [12.0, 15.0, 18.0],
                "memory_history": [30.0, 33.0, 35.0]
            },
            "created_at": ts(now, 60 * 24 * 12),
            "updated_at": ts(now, 5),
        }),
        json!({
            "id": "demo-edge", "user_id": user_id, "name": "edge-lab",
            "provider": "on-prem", "environment": "lab", "status": "offline",
            "node_count": 1, "pod_count": 0,
            "created_at": ts(now, 60 * 24 * 3),
        }),
    ];
    for row in clusters {
        store.insert("clusters", row);
    }

    let incidents = [
        ("demo-prod", "critical", "Checkout latency above SLO", 12, false),
        ("demo-prod", "high", "worker-0 crash looping", 45, false),
        ("demo-prod", "low", "Certificate renews in 14 days", 60 * 20, false),
        ("demo-prod", "medium", "Node pressure on ip-10-0-3-12", 60 * 30, true),
        ("demo-staging", "medium", "db-0 slow queries", 90, false),
    ];
    for (i, (cluster, severity, title, age, resolved)) in incidents.into_iter().enumerate() {
        let root_cause = (severity == "critical").then_some("Connection pool exhausted on api pods");
        let resolved_at = resolved.then(|| ts(now, age - 30));
        store.insert(
            "incidents",
            json!({
                "id": format!("demo-inc-{}", i + 1),
                "cluster_id": cluster,
                "severity": severity,
                "title": title,
                "description": format!("{} (detected by the analysis pipeline)", title),
                "root_cause": root_cause,
                "resolved_at": resolved_at,
                "created_at": ts(now, age),
            }),
        );
    }

    let anomalies = [
        ("demo-prod", "cpu_spike", "high", 20),
        ("demo-prod", "memory_leak", "medium", 180),
        ("demo-prod", "restart_storm", "high", 300),
        ("demo-staging", "cpu_spike", "low", 60 * 30),
    ];
    for (i, (cluster, kind, severity, age)) in anomalies.into_iter().enumerate() {
        store.insert(
            "anomalies",
            json!({
                "id": format!("demo-anom-{}", i + 1),
                "cluster_id": cluster,
                "anomaly_type": kind,
                "severity": severity,
                "description": kind.replace('_', " "),
                "detected_at": ts(now, age),
            }),
        );
    }

    let recommendations = [
        ("demo-prod", "data-postgres-0", "downsize", 500.0, 200.0, 42.5, "pending"),
        ("demo-prod", "logs-archive", "delete", 100.0, 0.0, 10.0, "pending"),
        ("demo-prod", "data-kafka-0", "upsize", 200.0, 400.0, 0.0, "pending"),
        ("demo-prod", "cache-redis", "maintain", 20.0, 20.0, 0.0, "accepted"),
        ("demo-staging", "data-db-0", "downsize", 100.0, 50.0, 5.0, "pending"),
    ];
    for (i, (cluster, pvc, kind, current, recommended, savings, status)) in
        recommendations.into_iter().enumerate()
    {
        store.insert(
            "storage_recommendations",
            json!({
                "id": format!("demo-rec-{}", i + 1),
                "cluster_id": cluster,
                "pvc_name": pvc,
                "namespace": "data",
                "current_size_gb": current,
                "recommended_size_gb": recommended,
                "recommendation_type": kind,
                "potential_savings": savings,
                "status": status,
                "created_at": ts(now, 60 * (i as i64 + 1)),
            }),
        );
    }

    let threats = [
        ("demo-prod", "privileged_container", "high", "Privileged container in shop", "active"),
        ("demo-prod", "exposed_secret", "critical", "Secret mounted as env var", "investigating"),
        ("demo-prod", "outdated_image", "low", "Base image 120 days old", "mitigated"),
    ];
    for (i, (cluster, kind, severity, title, status)) in threats.into_iter().enumerate() {
        store.insert(
            "security_threats",
            json!({
                "id": format!("demo-threat-{}", i + 1),
                "cluster_id": cluster,
                "threat_type": kind,
                "severity": severity,
                "title": title,
                "status": status,
                "detected_at": ts(now, 30 * (i as i64 + 1)),
            }),
        );
    }

    let notifications = [
        ("Weekly report ready", "Your fleet summary for last week is available.", "info", false, 30),
        ("Cluster deleted", "Cluster old-sandbox deleted (1204 rows removed in 3.2s)", "success", true, 600),
    ];
    for (i, (title, message, kind, read, age)) in notifications.into_iter().enumerate() {
        store.insert(
            "notifications",
            json!({
                "id": format!("demo-note-{}", i + 1),
                "user_id": user_id,
                "title": title,
                "message": message,
                "type": kind,
                "read": read,
                "created_at": ts(now, age),
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityKind, Row};

    #[test]
    fn test_seed_rows_decode() {
        let store = MemoryStore::new();
        seed(&store, DEMO_USER, Utc::now());
        for &kind in EntityKind::all() {
            let rows = store.rows(kind.table());
            assert!(!rows.is_empty(), "no demo rows for {}", kind);
            for row in rows {
                Row::decode(kind, row).unwrap();
            }
        }
    }
}

//! Derived view fixtures over hand-built cache snapshots

use chrono::{DateTime, Duration, Utc};
use kodo::cache::CacheSnapshot;
use kodo::models::{
    Anomaly, Cluster, ClusterStatus, Incident, Notification, SecurityThreat, Severity,
    StorageRecommendation,
};
use kodo::views::{
    IncidentFilter, ViewThresholds, anomalies_within, cluster_overview, fleet_summary,
    incident_feed, inbox, percentile, potential_savings, security_summary,
};
use serde_json::json;

fn now() -> DateTime<Utc> {
    "2024-06-01T12:00:00Z".parse().unwrap()
}

fn ago(hours: i64) -> String {
    (now() - Duration::hours(hours)).to_rfc3339()
}

fn cluster(id: &str, name: &str, status: &str) -> Cluster {
    serde_json::from_value(json!({
        "id": id, "user_id": "u1", "name": name, "status": status,
        "node_count": 3, "pod_count": 12
    }))
    .unwrap()
}

fn incident(id: &str, cluster: &str, severity: &str, hours_ago: i64) -> Incident {
    serde_json::from_value(json!({
        "id": id, "cluster_id": cluster, "severity": severity,
        "title": format!("incident {}", id), "created_at": ago(hours_ago)
    }))
    .unwrap()
}

fn anomaly(id: &str, cluster: &str, hours_ago: i64, resolved: bool) -> Anomaly {
    serde_json::from_value(json!({
        "id": id, "cluster_id": cluster, "anomaly_type": "memory_leak", "severity": "medium",
        "resolved": resolved, "detected_at": ago(hours_ago)
    }))
    .unwrap()
}

fn recommendation(id: &str, cluster: &str, kind: &str, savings: f64) -> StorageRecommendation {
    serde_json::from_value(json!({
        "id": id, "cluster_id": cluster, "pvc_name": format!("pvc-{}", id),
        "recommendation_type": kind, "potential_savings": savings, "status": "pending"
    }))
    .unwrap()
}

fn threat(id: &str, severity: &str, status: &str) -> SecurityThreat {
    serde_json::from_value(json!({
        "id": id, "cluster_id": "a", "threat_type": "privileged_container",
        "severity": severity, "title": id, "status": status
    }))
    .unwrap()
}

/// Two clusters: A with three incidents, B with one
fn fleet() -> CacheSnapshot {
    CacheSnapshot {
        clusters: vec![cluster("a", "alpha", "healthy"), cluster("b", "beta", "healthy")],
        incidents: vec![
            incident("i1", "a", "critical", 1),
            incident("i2", "a", "high", 2),
            incident("i3", "a", "low", 3),
            incident("i4", "b", "medium", 4),
        ],
        ..Default::default()
    }
}

#[test]
fn test_percentile_fixtures() {
    assert_eq!(percentile(&[10.0, 20.0, 30.0, 40.0, 50.0], 95.0), 50.0);
    assert_eq!(percentile(&[100.0], 95.0), 100.0);
    assert_eq!(percentile(&[], 95.0), 0.0);
}

#[test]
fn test_status_priority_chain() {
    let thresholds = ViewThresholds::default();
    let mut snapshot = CacheSnapshot {
        clusters: vec![cluster("a", "alpha", "healthy")],
        ..Default::default()
    };

    let status = |snap: &CacheSnapshot| {
        cluster_overview(snap, "a", &thresholds, now())
            .unwrap()
            .status
    };
    assert_eq!(status(&snapshot), ClusterStatus::Healthy);

    snapshot.anomalies = vec![anomaly("x1", "a", 1, false), anomaly("x2", "a", 2, true)];
    assert_eq!(status(&snapshot), ClusterStatus::Warning);

    snapshot.anomalies.push(anomaly("x3", "a", 3, false));
    assert_eq!(status(&snapshot), ClusterStatus::Critical);

    // Outside the 24h window
    snapshot.anomalies = vec![anomaly("old", "a", 30, false); 5];
    assert_eq!(status(&snapshot), ClusterStatus::Healthy);
}

/// A healthy cluster, no critical pods and three anomalies in the last day.
///
/// The anomaly rule reads "more than two", which three satisfies, so the
/// default thresholds report critical. A threshold of three gives the
/// warning reading of the same fixture.
#[test]
fn test_three_recent_anomalies_on_healthy_cluster() {
    let snapshot = CacheSnapshot {
        clusters: vec![cluster("a", "alpha", "healthy")],
        anomalies: vec![
            anomaly("x1", "a", 1, false),
            anomaly("x2", "a", 5, false),
            anomaly("x3", "a", 20, false),
        ],
        ..Default::default()
    };

    let overview = cluster_overview(&snapshot, "a", &ViewThresholds::default(), now()).unwrap();
    assert_eq!(overview.pods.critical, 0);
    assert_eq!(overview.recent_anomalies, 3);
    assert_eq!(overview.status, ClusterStatus::Critical);

    let lenient = ViewThresholds {
        critical_anomaly_threshold: 3,
        ..Default::default()
    };
    let overview = cluster_overview(&snapshot, "a", &lenient, now()).unwrap();
    assert_eq!(overview.status, ClusterStatus::Warning);
}

#[test]
fn test_offline_cluster_is_critical() {
    let snapshot = CacheSnapshot {
        clusters: vec![cluster("a", "alpha", "offline")],
        ..Default::default()
    };
    let overview = cluster_overview(&snapshot, "a", &ViewThresholds::default(), now()).unwrap();
    assert_eq!(overview.status, ClusterStatus::Critical);
}

#[test]
fn test_anomaly_window_is_inclusive_and_per_cluster() {
    let anomalies = vec![
        anomaly("x1", "a", 24, false),
        anomaly("x2", "a", 25, false),
        anomaly("x3", "b", 1, false),
    ];
    assert_eq!(anomalies_within(&anomalies, "a", Duration::hours(24), now()), 1);
    assert_eq!(anomalies_within(&anomalies, "b", Duration::hours(24), now()), 1);
    assert_eq!(anomalies_within(&anomalies, "c", Duration::hours(24), now()), 0);
}

#[test]
fn test_savings_exclude_non_actionable_types() {
    let recs = vec![
        recommendation("r1", "a", "upsize", 5.0),
        recommendation("r2", "a", "downsize", 10.0),
        recommendation("r3", "a", "maintain", 3.0),
    ];
    assert_eq!(potential_savings(&recs), 10.0);
}

#[test]
fn test_usage_prefers_history_over_gauge() {
    let mut c = cluster("a", "alpha", "healthy");
    c.cpu_usage = 80.0;
    c.memory_usage = 40.0;
    c.metrics = Some(
        serde_json::from_value(json!({ "cpuHistory": [10.0, 20.0, 30.0, 40.0, 50.0] })).unwrap(),
    );
    let snapshot = CacheSnapshot {
        clusters: vec![c],
        ..Default::default()
    };

    let overview = cluster_overview(&snapshot, "a", &ViewThresholds::default(), now()).unwrap();
    assert_eq!(overview.cpu.p95, 50.0);
    assert_eq!(overview.cpu.average, 30.0);
    assert_eq!(overview.cpu.samples, 5);
    // No memory history: the gauge is the only sample
    assert_eq!(overview.memory.p95, 40.0);
    assert_eq!(overview.memory.samples, 1);
}

#[test]
fn test_pod_health_from_metrics_blob() {
    let mut c = cluster("a", "alpha", "healthy");
    c.metrics = Some(
        serde_json::from_value(json!({
            "pods": [
                { "name": "web", "phase": "Running", "containers": [{ "ready": true, "restartCount": 0 }] },
                { "name": "job", "phase": "Pending" },
                { "name": "crash", "phase": "Running", "containers": [{ "ready": true, "restartCount": 12 }] },
                { "name": "dead", "phase": "Failed" }
            ]
        }))
        .unwrap(),
    );
    let snapshot = CacheSnapshot {
        clusters: vec![c],
        ..Default::default()
    };

    let overview = cluster_overview(&snapshot, "a", &ViewThresholds::default(), now()).unwrap();
    assert_eq!(overview.pods.total, 4);
    assert_eq!(overview.pods.healthy, 1);
    assert_eq!(overview.pods.warning, 2);
    assert_eq!(overview.pods.critical, 1);
    assert_eq!(overview.status, ClusterStatus::Critical);
}

#[test]
fn test_incident_feed_severity_filter_per_cluster() {
    let snapshot = fleet();

    let critical_on_a = incident_feed(
        &snapshot,
        &IncidentFilter::for_cluster("a").with_severity(Some(Severity::Critical)),
    );
    assert_eq!(critical_on_a.len(), 1);
    assert_eq!(critical_on_a[0].incident.id, "i1");
    assert_eq!(critical_on_a[0].cluster_name, "alpha");

    let critical_on_b = incident_feed(
        &snapshot,
        &IncidentFilter::for_cluster("b").with_severity(Some(Severity::Critical)),
    );
    assert!(critical_on_b.is_empty());
}

#[test]
fn test_incident_feed_is_newest_first() {
    let ids: Vec<String> = incident_feed(&fleet(), &IncidentFilter::default())
        .into_iter()
        .map(|row| row.incident.id)
        .collect();
    assert_eq!(ids, vec!["i1", "i2", "i3", "i4"]);
}

#[test]
fn test_open_incidents_skip_resolved() {
    let mut snapshot = fleet();
    snapshot.incidents[0].resolved_at = Some(now());

    let overview = cluster_overview(&snapshot, "a", &ViewThresholds::default(), now()).unwrap();
    assert_eq!(overview.open_incidents, 2);

    let open = incident_feed(
        &snapshot,
        &IncidentFilter {
            cluster_id: Some("a".to_string()),
            include_resolved: false,
            ..Default::default()
        },
    );
    assert_eq!(open.len(), 2);
}

#[test]
fn test_security_summary_counts_open_by_severity() {
    let threats = vec![
        threat("t1", "critical", "active"),
        threat("t2", "critical", "investigating"),
        threat("t3", "high", "mitigated"),
        threat("t4", "low", "false_positive"),
    ];
    let summary = security_summary(&threats, Some("a"));
    assert_eq!(summary.open(), 2);
    assert_eq!(summary.mitigated, 1);
    assert_eq!(summary.false_positive, 1);
    assert_eq!(summary.open_by_severity.get(&Severity::Critical), Some(&2));
    assert_eq!(summary.open_by_severity.get(&Severity::High), None);
}

#[test]
fn test_inbox_counts_unread() {
    let notes: Vec<Notification> = vec![
        serde_json::from_value(json!({
            "id": "n1", "user_id": "u1", "title": "old", "read": true, "created_at": ago(5)
        }))
        .unwrap(),
        serde_json::from_value(json!({
            "id": "n2", "user_id": "u1", "title": "new", "type": "warning", "created_at": ago(1)
        }))
        .unwrap(),
    ];
    let summary = inbox(&notes);
    assert_eq!(summary.unread, 1);
    assert_eq!(summary.items[0].id, "n2");
}

#[test]
fn test_fleet_summary_over_cached_rows() {
    let mut snapshot = fleet();
    snapshot.clusters.push(cluster("c", "gamma", "warning"));
    snapshot.recommendations = vec![
        recommendation("r1", "a", "downsize", 12.5),
        recommendation("r2", "a", "delete", 7.5),
    ];

    let summary = fleet_summary(&snapshot, &ViewThresholds::default(), now());
    assert_eq!(summary.clusters, 3);
    assert_eq!(summary.healthy, 2);
    assert_eq!(summary.warning, 1);
    assert_eq!(summary.critical, 0);
    assert_eq!(summary.nodes, 9);
    assert_eq!(summary.pods, 36);
    assert_eq!(summary.open_incidents, 4);
    assert_eq!(summary.potential_savings, 20.0);
}

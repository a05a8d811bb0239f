//! Incident feed and per-entity summaries

use crate::cache::CacheSnapshot;
use crate::models::{Anomaly, Incident, Notification, SecurityThreat, Severity, ThreatStatus};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Label used when a joined cluster is not cached
pub const UNKNOWN_CLUSTER: &str = "unknown";

/// Which incidents to show
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncidentFilter {
    pub cluster_id: Option<String>,
    pub severity: Option<Severity>,
    pub include_resolved: bool,
}

impl IncidentFilter {
    pub fn for_cluster(cluster_id: impl Into<String>) -> Self {
        Self {
            cluster_id: Some(cluster_id.into()),
            include_resolved: true,
            ..Default::default()
        }
    }

    pub fn with_severity(mut self, severity: Option<Severity>) -> Self {
        self.severity = severity;
        self
    }

    fn accepts(&self, incident: &Incident) -> bool {
        self.cluster_id
            .as_deref()
            .is_none_or(|id| incident.cluster_id == id)
            && self.severity.is_none_or(|s| incident.severity == s)
            && (self.include_resolved || !incident.is_resolved())
    }
}

/// Incident joined with the name of its cluster
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentRow {
    pub incident: Incident,
    pub cluster_name: String,
}

/// Newest first; rows without a timestamp sort last
fn newest_first(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn incident_feed(snapshot: &CacheSnapshot, filter: &IncidentFilter) -> Vec<IncidentRow> {
    let mut rows: Vec<IncidentRow> = snapshot
        .incidents
        .iter()
        .filter(|i| filter.accepts(i))
        .map(|i| IncidentRow {
            cluster_name: snapshot
                .cluster_name(&i.cluster_id)
                .unwrap_or(UNKNOWN_CLUSTER)
                .to_string(),
            incident: i.clone(),
        })
        .collect();

    rows.sort_by(|a, b| {
        newest_first(a.incident.created_at, b.incident.created_at)
            .then_with(|| a.incident.id.cmp(&b.incident.id))
    });
    rows
}

/// Anomalies of `cluster_id` detected within `window` before `now`
pub fn anomalies_within<'a>(
    anomalies: impl IntoIterator<Item = &'a Anomaly>,
    cluster_id: &str,
    window: chrono::Duration,
    now: DateTime<Utc>,
) -> usize {
    let since = now - window;
    anomalies
        .into_iter()
        .filter(|a| a.cluster_id == cluster_id)
        .filter(|a| a.detected_at.is_some_and(|t| t >= since && t <= now))
        .count()
}

/// Threat counts per status, plus open threats per severity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecuritySummary {
    pub active: usize,
    pub investigating: usize,
    pub mitigated: usize,
    pub false_positive: usize,
    pub open_by_severity: BTreeMap<Severity, usize>,
}

impl SecuritySummary {
    pub fn open(&self) -> usize {
        self.active + self.investigating
    }
}

pub fn security_summary<'a>(
    threats: impl IntoIterator<Item = &'a SecurityThreat>,
    cluster_id: Option<&str>,
) -> SecuritySummary {
    let mut summary = SecuritySummary::default();
    for threat in threats
        .into_iter()
        .filter(|t| cluster_id.is_none_or(|id| t.cluster_id == id))
    {
        match threat.status {
            ThreatStatus::Active => summary.active += 1,
            ThreatStatus::Investigating => summary.investigating += 1,
            ThreatStatus::Mitigated => summary.mitigated += 1,
            ThreatStatus::FalsePositive => summary.false_positive += 1,
        }
        if threat.status.is_open() {
            *summary.open_by_severity.entry(threat.severity).or_insert(0) += 1;
        }
    }
    summary
}

/// Notifications, newest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboxSummary {
    pub unread: usize,
    pub items: Vec<Notification>,
}

pub fn inbox<'a>(notifications: impl IntoIterator<Item = &'a Notification>) -> InboxSummary {
    let mut items: Vec<Notification> = notifications.into_iter().cloned().collect();
    items.sort_by(|a, b| newest_first(a.created_at, b.created_at).then_with(|| a.id.cmp(&b.id)));
    InboxSummary {
        unread: items.iter().filter(|n| !n.read).count(),
        items,
    }
}

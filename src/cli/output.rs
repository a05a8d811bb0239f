//! Plain-text rendering for `kodo status`

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::cache::CacheSnapshot;
use crate::models::Severity;
use crate::sync::StatusSnapshot;
use crate::views::{
    IncidentFilter, UsageSummary, ViewThresholds, cluster_overview, fleet_summary, inbox,
    incident_feed,
};

/// Incidents listed before the feed is cut off
const FEED_LIMIT: usize = 10;

/// Everything the status report is rendered from
pub struct StatusReport<'a> {
    pub user: &'a str,
    pub status: &'a StatusSnapshot,
    pub snapshot: &'a CacheSnapshot,
    pub selected: Option<&'a str>,
    pub thresholds: &'a ViewThresholds,
    pub severity: Option<Severity>,
    pub now: DateTime<Utc>,
}

fn usage_line(label: &str, usage: &UsageSummary) -> String {
    format!(
        "  {:<8} avg {:>5.1}%  p95 {:>5.1}%  max {:>5.1}%  ({} samples)",
        label, usage.average, usage.p95, usage.max, usage.samples
    )
}

fn age(now: DateTime<Utc>, at: Option<DateTime<Utc>>) -> String {
    let Some(at) = at else {
        return "-".to_string();
    };
    let minutes = (now - at).num_minutes().max(0);
    match minutes {
        0 => "now".to_string(),
        m if m < 60 => format!("{}m", m),
        m if m < 60 * 24 => format!("{}h", m / 60),
        m => format!("{}d", m / (60 * 24)),
    }
}

impl StatusReport<'_> {
    /// Render the report; output depends only on the inputs
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail
        let _ = self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "User:  {}", self.user)?;
        write!(out, "Sync:  {}", self.status.phase)?;
        if self.status.retries > 0 {
            write!(out, " (retry {})", self.status.retries)?;
        }
        if let Some(err) = &self.status.last_error {
            write!(out, " - {}", err)?;
        }
        writeln!(out)?;

        let fleet = fleet_summary(self.snapshot, self.thresholds, self.now);
        writeln!(
            out,
            "Fleet: {} clusters ({} healthy, {} warning, {} critical), {} nodes, {} pods, {} open incidents, ${:.2}/mo savings",
            fleet.clusters,
            fleet.healthy,
            fleet.warning,
            fleet.critical,
            fleet.nodes,
            fleet.pods,
            fleet.open_incidents,
            fleet.potential_savings
        )?;

        writeln!(out)?;
        writeln!(out, "CLUSTERS")?;
        if self.snapshot.clusters.is_empty() {
            writeln!(out, "  No clusters yet. Connect one to get started.")?;
        }
        for cluster in &self.snapshot.clusters {
            let marker = if self.selected == Some(cluster.id.as_str()) {
                "*"
            } else {
                " "
            };
            writeln!(
                out,
                "{} {:<16} {:<8} {:<12} {:<9} nodes {:>3}  pods {:>4}",
                marker,
                cluster.name,
                cluster.provider.as_str(),
                cluster.environment,
                cluster.status.as_str(),
                cluster.node_count,
                cluster.pod_count
            )?;
        }

        if let Some(id) = self.selected {
            self.write_selected(out, id)?;
        }

        let inbox = inbox(&self.snapshot.notifications);
        writeln!(out)?;
        writeln!(
            out,
            "INBOX: {} unread of {}",
            inbox.unread,
            inbox.items.len()
        )?;
        for note in inbox.items.iter().filter(|n| !n.read) {
            writeln!(
                out,
                "  [{}] {} - {}",
                note.kind.as_str(),
                note.title,
                note.message
            )?;
        }
        Ok(())
    }

    fn write_selected(&self, out: &mut String, id: &str) -> std::fmt::Result {
        let Some(overview) = cluster_overview(self.snapshot, id, self.thresholds, self.now) else {
            writeln!(out)?;
            writeln!(out, "Selected cluster {} is not loaded", id)?;
            return Ok(());
        };

        writeln!(out)?;
        writeln!(
            out,
            "CLUSTER {} ({})",
            overview.cluster.name,
            overview.status.as_str()
        )?;
        writeln!(
            out,
            "  pods     {} total: {} healthy, {} warning, {} critical",
            overview.pods.total, overview.pods.healthy, overview.pods.warning, overview.pods.critical
        )?;
        writeln!(
            out,
            "  anomalies {} in the last {}h",
            overview.recent_anomalies,
            self.thresholds.anomaly_window.num_hours()
        )?;
        writeln!(out, "{}", usage_line("cpu", &overview.cpu))?;
        writeln!(out, "{}", usage_line("memory", &overview.memory))?;

        let security = &overview.security;
        write!(
            out,
            "  security {} open ({} active, {} investigating), {} mitigated",
            security.open(),
            security.active,
            security.investigating,
            security.mitigated
        )?;
        let by_severity: Vec<String> = Severity::all_descending()
            .iter()
            .filter_map(|s| {
                security
                    .open_by_severity
                    .get(s)
                    .map(|n| format!("{} {}", n, s.as_str()))
            })
            .collect();
        if !by_severity.is_empty() {
            write!(out, " [{}]", by_severity.join(", "))?;
        }
        writeln!(out)?;
        writeln!(
            out,
            "  savings  ${:.2}/mo potential",
            overview.potential_savings
        )?;

        let filter = IncidentFilter::for_cluster(id).with_severity(self.severity);
        let feed = incident_feed(self.snapshot, &filter);
        writeln!(out)?;
        match self.severity {
            Some(s) => writeln!(out, "INCIDENTS ({} open, showing {})", overview.open_incidents, s.as_str())?,
            None => writeln!(out, "INCIDENTS ({} open)", overview.open_incidents)?,
        }
        if feed.is_empty() {
            writeln!(out, "  none")?;
        }
        for row in feed.iter().take(FEED_LIMIT) {
            let incident = &row.incident;
            writeln!(
                out,
                "  {:<8} {:>4}  {}{}",
                incident.severity.as_str(),
                age(self.now, incident.created_at),
                incident.title,
                if incident.is_resolved() { " (resolved)" } else { "" }
            )?;
        }
        if feed.len() > FEED_LIMIT {
            writeln!(out, "  ... {} more", feed.len() - FEED_LIMIT)?;
        }
        Ok(())
    }
}

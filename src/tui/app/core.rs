//! Core App struct and data accessors

use super::state::{Focus, Tab, UIState, ViewState};
use crate::cache::CacheSnapshot;
use crate::config::Config;
use crate::models::{Anomaly, Cluster, Notification, SecurityThreat, StorageRecommendation};
use crate::selection::SelectionState;
use crate::services::DashboardSession;
use crate::sync::StatusSnapshot;
use crate::tui::constants::STATUS_MESSAGE_TIMEOUT_SECS;
use crate::tui::theme::Theme;
use crate::views::{
    ClusterOverview, IncidentFilter, IncidentRow, ViewThresholds, cluster_overview, inbox,
    incident_feed,
};
use chrono::{DateTime, Utc};
use std::cmp::Reverse;

/// Dashboard state rendered each frame
///
/// Holds a copy of the session's data taken by `sync_from`, so rendering
/// never touches the cache lock.
pub struct App {
    pub(super) snapshot: CacheSnapshot,
    pub(super) status: StatusSnapshot,
    pub(super) selection: SelectionState,
    pub(super) user: Option<String>,
    pub(super) thresholds: ViewThresholds,
    pub(super) read_only: bool,
    pub(super) no_icons: bool,
    pub(super) theme: Theme,
    pub(super) view_state: ViewState,
    pub(super) ui_state: UIState,
    /// Fixed clock for deterministic rendering
    clock: Option<DateTime<Utc>>,
}

impl App {
    pub fn new(config: &Config) -> Self {
        Self {
            snapshot: CacheSnapshot::default(),
            status: StatusSnapshot::default(),
            selection: SelectionState::Uninitialized,
            user: None,
            thresholds: config.view_thresholds(),
            read_only: config.read_only,
            no_icons: config.ui.no_icons,
            theme: Theme::default(),
            view_state: ViewState::default(),
            ui_state: UIState::default(),
            clock: None,
        }
    }

    /// Pin the clock used for anomaly windows and ages
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.clock = Some(now);
        self
    }

    pub(super) fn now(&self) -> DateTime<Utc> {
        self.clock.unwrap_or_else(Utc::now)
    }

    /// Replace the displayed data
    pub fn update(
        &mut self,
        snapshot: CacheSnapshot,
        status: StatusSnapshot,
        selection: SelectionState,
        user: Option<String>,
    ) {
        let selection_changed = self.selection.selected() != selection.selected();
        self.snapshot = snapshot;
        self.status = status;
        self.selection = selection;
        self.user = user;

        if selection_changed {
            self.view_state.row_index = 0;
            self.view_state.row_scroll = 0;
            if let Some(id) = self.selection.selected() {
                if let Some(pos) = self.snapshot.clusters.iter().position(|c| c.id == id) {
                    self.view_state.cluster_index = pos;
                }
            }
        }
        self.clamp_cursors();
    }

    pub fn sync_from(&mut self, session: &DashboardSession) {
        self.update(
            session.snapshot(),
            session.status(),
            session.selection().state(),
            session.user_id().map(str::to_string),
        );
    }

    fn clamp_cursors(&mut self) {
        let clusters = self.snapshot.clusters.len();
        self.view_state.cluster_index = self
            .view_state
            .cluster_index
            .min(clusters.saturating_sub(1));
        let rows = self.row_count();
        self.view_state.row_index = self.view_state.row_index.min(rows.saturating_sub(1));
    }

    pub fn set_status_message(&mut self, message: (String, bool)) {
        self.ui_state.status_message = Some(message);
        self.ui_state.status_message_time = Some(std::time::Instant::now());
    }

    pub fn status_message(&self) -> Option<&(String, bool)> {
        self.ui_state.status_message.as_ref()
    }

    /// Clear the status message once it has been shown long enough
    pub fn check_status_message_timeout(&mut self) {
        let expired = self.ui_state.status_message_time.is_some_and(|at| {
            at.elapsed() >= std::time::Duration::from_secs(STATUS_MESSAGE_TIMEOUT_SECS)
        });
        if expired {
            self.ui_state.status_message = None;
            self.ui_state.status_message_time = None;
        }
    }

    pub fn focus(&self) -> Focus {
        self.view_state.focus
    }

    pub fn tab(&self) -> Tab {
        self.view_state.tab
    }

    pub fn severity_filter(&self) -> Option<crate::models::Severity> {
        self.view_state.severity
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn selected_cluster_id(&self) -> Option<&str> {
        self.selection.selected()
    }

    /// Cluster under the list cursor
    pub(super) fn cursor_cluster(&self) -> Option<&Cluster> {
        self.snapshot.clusters.get(self.view_state.cluster_index)
    }

    pub(super) fn overview(&self) -> Option<ClusterOverview> {
        let id = self.selection.selected()?;
        cluster_overview(&self.snapshot, id, &self.thresholds, self.now())
    }

    pub(super) fn incident_rows(&self) -> Vec<IncidentRow> {
        let Some(id) = self.selection.selected() else {
            return Vec::new();
        };
        let filter = IncidentFilter::for_cluster(id).with_severity(self.view_state.severity);
        incident_feed(&self.snapshot, &filter)
    }

    fn for_selected<'a, T>(&self, rows: &'a [T], cluster_of: impl Fn(&T) -> &str) -> Vec<&'a T> {
        let selected = self.selection.selected();
        rows.iter()
            .filter(|r| selected == Some(cluster_of(r)))
            .collect()
    }

    /// Newest first
    pub(super) fn anomaly_rows(&self) -> Vec<&Anomaly> {
        let mut rows = self.for_selected(&self.snapshot.anomalies, |a| a.cluster_id.as_str());
        rows.sort_by_key(|a| Reverse(a.detected_at));
        rows
    }

    /// Largest saving first
    pub(super) fn recommendation_rows(&self) -> Vec<&StorageRecommendation> {
        let mut rows =
            self.for_selected(&self.snapshot.recommendations, |r| r.cluster_id.as_str());
        rows.sort_by(|a, b| {
            b.potential_savings
                .total_cmp(&a.potential_savings)
                .then_with(|| a.pvc_name.cmp(&b.pvc_name))
        });
        rows
    }

    /// Most severe first
    pub(super) fn threat_rows(&self) -> Vec<&SecurityThreat> {
        let mut rows = self.for_selected(&self.snapshot.threats, |t| t.cluster_id.as_str());
        rows.sort_by_key(|t| (Reverse(t.severity), Reverse(t.detected_at)));
        rows
    }

    pub(super) fn inbox_rows(&self) -> Vec<Notification> {
        inbox(&self.snapshot.notifications).items
    }

    pub(super) fn row_count(&self) -> usize {
        match self.view_state.tab {
            Tab::Incidents => self.incident_rows().len(),
            Tab::Anomalies => self.anomaly_rows().len(),
            Tab::Storage => self.recommendation_rows().len(),
            Tab::Security => self.threat_rows().len(),
            Tab::Inbox => self.inbox_rows().len(),
        }
    }
}

//! Keyboard handling

use super::core::App;
use super::state::{Focus, Tab};
use crate::models::{RecommendationStatus, ThreatStatus};
use crossterm::event::{KeyCode, KeyEvent};

/// Work the event loop must carry out on the App's behalf
#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    Quit,
    SelectCluster(String),
    Refresh,
    SetRecommendationStatus {
        id: String,
        status: RecommendationStatus,
    },
    SetThreatStatus {
        id: String,
        status: ThreatStatus,
    },
}

/// Which way a decision key points
#[derive(Clone, Copy, PartialEq)]
enum Decision {
    Accept,
    Reject,
}

impl App {
    /// Apply a key press; returns an action when the event loop must act
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<AppAction> {
        if key.code == KeyCode::Esc && self.ui_state.status_message.is_some() {
            self.ui_state.status_message = None;
            self.ui_state.status_message_time = None;
            return None;
        }
        self.check_status_message_timeout();

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => Some(AppAction::Quit),
            KeyCode::Up | KeyCode::Char('k') => {
                self.move_cursor(-1);
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.move_cursor(1);
                None
            }
            KeyCode::Tab => {
                self.view_state.next_pane();
                None
            }
            KeyCode::Enter => self.select_under_cursor(),
            KeyCode::Char('s') => {
                self.view_state.cycle_severity();
                let label = self
                    .view_state
                    .severity
                    .map(|s| s.as_str())
                    .unwrap_or("all");
                self.set_status_message((format!("Severity filter: {}", label), false));
                None
            }
            KeyCode::Char('r') => {
                self.set_status_message(("Refreshing...".to_string(), false));
                Some(AppAction::Refresh)
            }
            KeyCode::Char('a') => self.decide(Decision::Accept),
            KeyCode::Char('x') => self.decide(Decision::Reject),
            _ => None,
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        let (index, len) = match self.view_state.focus {
            Focus::Clusters => (
                &mut self.view_state.cluster_index,
                self.snapshot.clusters.len(),
            ),
            Focus::Table => {
                let len = self.row_count();
                (&mut self.view_state.row_index, len)
            }
        };
        if len == 0 {
            *index = 0;
            return;
        }
        *index = index.saturating_add_signed(delta).min(len - 1);
    }

    fn select_under_cursor(&mut self) -> Option<AppAction> {
        if self.view_state.focus != Focus::Clusters {
            return None;
        }
        let cluster = self.cursor_cluster()?;
        if self.selection.selected() == Some(cluster.id.as_str()) {
            return None;
        }
        Some(AppAction::SelectCluster(cluster.id.clone()))
    }

    fn decide(&mut self, decision: Decision) -> Option<AppAction> {
        if self.view_state.focus != Focus::Table {
            return None;
        }
        let action = match self.view_state.tab {
            Tab::Storage => self.recommendation_decision(decision),
            Tab::Security => self.threat_decision(decision),
            _ => return None,
        };
        let action = match action {
            Ok(action) => action,
            Err(message) => {
                self.set_status_message((message, true));
                return None;
            }
        };
        if self.read_only {
            self.set_status_message(("Read-only mode: changes are disabled".to_string(), true));
            return None;
        }
        Some(action)
    }

    fn recommendation_decision(&self, decision: Decision) -> Result<AppAction, String> {
        let rows = self.recommendation_rows();
        let rec = rows
            .get(self.view_state.row_index)
            .ok_or_else(|| "No recommendation selected".to_string())?;
        let status = match (decision, rec.status) {
            (Decision::Accept, RecommendationStatus::Pending) => RecommendationStatus::Accepted,
            (Decision::Accept, RecommendationStatus::Accepted) => RecommendationStatus::Applied,
            (Decision::Reject, RecommendationStatus::Pending) => RecommendationStatus::Rejected,
            (_, current) => {
                return Err(format!("Recommendation is already {}", current));
            }
        };
        Ok(AppAction::SetRecommendationStatus {
            id: rec.id.clone(),
            status,
        })
    }

    fn threat_decision(&self, decision: Decision) -> Result<AppAction, String> {
        let rows = self.threat_rows();
        let threat = rows
            .get(self.view_state.row_index)
            .ok_or_else(|| "No threat selected".to_string())?;
        let status = match decision {
            Decision::Accept => threat.status.next_statuses().first().copied(),
            Decision::Reject => Some(ThreatStatus::FalsePositive)
                .filter(|&s| threat.status.can_transition_to(s)),
        }
        .ok_or_else(|| format!("Threat is already {}", threat.status))?;
        Ok(AppAction::SetThreatStatus {
            id: threat.id.clone(),
            status,
        })
    }
}

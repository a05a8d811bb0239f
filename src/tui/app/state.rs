//! Application state structures
//!
//! Sub-structures that group the App's fields by concern.

use crate::models::Severity;

/// Table shown in the main pane
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Tab {
    #[default]
    Incidents,
    Anomalies,
    Storage,
    Security,
    Inbox,
}

impl Tab {
    pub const ALL: [Tab; 5] = [
        Tab::Incidents,
        Tab::Anomalies,
        Tab::Storage,
        Tab::Security,
        Tab::Inbox,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Incidents => "Incidents",
            Tab::Anomalies => "Anomalies",
            Tab::Storage => "Storage",
            Tab::Security => "Security",
            Tab::Inbox => "Inbox",
        }
    }

    pub fn index(&self) -> usize {
        Tab::ALL.iter().position(|t| t == self).unwrap_or(0)
    }
}

/// Pane that receives navigation keys
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Focus {
    #[default]
    Clusters,
    Table,
}

/// Navigation state
#[derive(Debug, Default)]
pub struct ViewState {
    pub focus: Focus,
    pub tab: Tab,
    /// Incident severity filter; `None` shows all
    pub severity: Option<Severity>,
    /// Cursor in the cluster list
    pub cluster_index: usize,
    pub cluster_scroll: usize,
    /// Cursor in the active table
    pub row_index: usize,
    pub row_scroll: usize,
}

impl ViewState {
    /// Clusters, then each tab in order, then back to clusters
    pub fn next_pane(&mut self) {
        match self.focus {
            Focus::Clusters => {
                self.focus = Focus::Table;
                self.tab = Tab::Incidents;
            }
            Focus::Table => match Tab::ALL.get(self.tab.index() + 1) {
                Some(&tab) => self.tab = tab,
                None => self.focus = Focus::Clusters,
            },
        }
        self.row_index = 0;
        self.row_scroll = 0;
    }

    /// All, then critical down to low, then all again
    pub fn cycle_severity(&mut self) {
        let order = Severity::all_descending();
        self.severity = match self.severity {
            None => order.first().copied(),
            Some(current) => order
                .iter()
                .position(|&s| s == current)
                .and_then(|i| order.get(i + 1))
                .copied(),
        };
        self.row_index = 0;
        self.row_scroll = 0;
    }
}

/// Transient UI state
#[derive(Debug, Default)]
pub struct UIState {
    /// Status message to display (message, is_error)
    pub status_message: Option<(String, bool)>,
    /// When status message was set (for auto-clearing)
    pub status_message_time: Option<std::time::Instant>,
}

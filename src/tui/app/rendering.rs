//! Layout and per-frame rendering

use super::core::App;
use super::state::{Focus, Tab};
use crate::selection::SelectionState;
use crate::tui::constants::{
    CLUSTER_PANE_WIDTH, FOOTER_HEIGHT, HEADER_HEIGHT, MIN_TERMINAL_HEIGHT, MIN_TERMINAL_WIDTH,
};
use crate::tui::views::{self, HeaderInfo, TableCursor};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    widgets::{Block, Borders, Paragraph, Wrap},
};

impl App {
    /// Render the whole dashboard
    pub fn render(&mut self, f: &mut Frame) {
        let size = f.area();
        if size.width < MIN_TERMINAL_WIDTH || size.height < MIN_TERMINAL_HEIGHT {
            let msg = format!(
                "Terminal too small! Need at least {}x{} (current: {}x{})",
                MIN_TERMINAL_WIDTH, MIN_TERMINAL_HEIGHT, size.width, size.height
            );
            let paragraph = Paragraph::new(msg)
                .style(Style::default().fg(self.theme.message_error))
                .block(Block::default().borders(Borders::ALL))
                .wrap(Wrap { trim: true });
            f.render_widget(paragraph, size);
            return;
        }

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(HEADER_HEIGHT),
                Constraint::Min(0),
                Constraint::Length(FOOTER_HEIGHT),
            ])
            .split(size);

        let overview = self.overview();
        let info = HeaderInfo {
            user: self.user.as_deref(),
            overview: overview.as_ref(),
            status: &self.status,
            anomaly_window_hours: self.thresholds.anomaly_window.num_hours(),
            read_only: self.read_only,
            no_icons: self.no_icons,
        };
        views::render_header(f, rows[0], &info, &self.theme);

        self.render_body(f, rows[1]);

        views::render_footer(
            f,
            rows[2],
            self.ui_state.status_message.as_ref(),
            self.read_only,
            &self.theme,
        );
    }

    fn render_body(&mut self, f: &mut Frame, area: Rect) {
        match &self.selection {
            SelectionState::Uninitialized => {
                views::helpers::render_loading_state(
                    f,
                    area,
                    " kodo ",
                    "Signing in...",
                    &self.theme,
                );
                return;
            }
            SelectionState::Loading => {
                views::helpers::render_loading_state(
                    f,
                    area,
                    " Clusters ",
                    "Loading your clusters...",
                    &self.theme,
                );
                return;
            }
            SelectionState::Ready(None) => {
                views::helpers::render_empty_state(
                    f,
                    area,
                    " Welcome ",
                    "You have no clusters yet.",
                    "Run `kodo report --cluster-id <id>` inside a cluster to start streaming its health here.",
                    &self.theme,
                );
                return;
            }
            SelectionState::Ready(Some(_)) => {}
        }

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(CLUSTER_PANE_WIDTH), Constraint::Min(0)])
            .split(area);

        let selected = self.selection.selected().map(str::to_string);
        views::render_cluster_list(
            f,
            columns[0],
            &self.snapshot.clusters,
            selected.as_deref(),
            self.view_state.cluster_index,
            &mut self.view_state.cluster_scroll,
            self.view_state.focus == Focus::Clusters,
            &self.theme,
            self.no_icons,
        );

        let main = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(columns[1]);

        let table_focused = self.view_state.focus == Focus::Table;
        views::render_tabs(
            f,
            main[0],
            self.view_state.tab,
            table_focused,
            self.view_state.severity,
            &self.theme,
        );
        self.render_table(f, main[1], table_focused);
    }

    fn render_table(&mut self, f: &mut Frame, area: Rect, focused: bool) {
        let now = self.now();
        let index = self.view_state.row_index;
        // Copied out and written back after drawing
        let mut scroll = self.view_state.row_scroll;
        let cursor = TableCursor {
            index,
            scroll: &mut scroll,
            focused,
        };

        match self.view_state.tab {
            Tab::Incidents => {
                let rows = self.incident_rows();
                views::render_incidents(f, area, &rows, now, cursor, &self.theme);
            }
            Tab::Anomalies => {
                let rows = self.anomaly_rows();
                views::render_anomalies(f, area, &rows, now, cursor, &self.theme);
            }
            Tab::Storage => {
                let rows = self.recommendation_rows();
                views::render_recommendations(f, area, &rows, cursor, &self.theme);
            }
            Tab::Security => {
                let rows = self.threat_rows();
                views::render_threats(f, area, &rows, now, cursor, &self.theme);
            }
            Tab::Inbox => {
                let rows = self.inbox_rows();
                views::render_inbox(f, area, &rows, now, cursor, &self.theme);
            }
        }
        self.view_state.row_scroll = scroll;
    }
}

//! Tab bar and the per-tab tables

use super::helpers::{format_age, render_empty_state, truncate_message, update_scroll_offset};
use crate::models::{
    Anomaly, Notification, RecommendationStatus, SecurityThreat, Severity, StorageRecommendation,
};
use crate::tui::app::Tab;
use crate::tui::constants::SCROLL_BUFFER;
use crate::tui::theme::Theme;
use crate::views::IncidentRow;
use chrono::{DateTime, Utc};
use ratatui::{
    Frame,
    layout::{Constraint, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Row, Table, Tabs},
};

pub fn render_tabs(
    f: &mut Frame,
    area: Rect,
    active: Tab,
    focused: bool,
    severity: Option<Severity>,
    theme: &Theme,
) {
    let titles: Vec<Line> = Tab::ALL
        .iter()
        .map(|tab| Line::from(tab.title()))
        .collect();
    let filter = format!(
        " severity: {} ",
        severity.map(|s| s.as_str()).unwrap_or("all")
    );
    let highlight = if focused {
        theme.footer_key_style()
    } else {
        Style::default().fg(theme.tab_active)
    };
    let tabs = Tabs::new(titles)
        .select(active.index())
        .style(Style::default().fg(theme.tab_inactive))
        .highlight_style(highlight)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title_bottom(Line::from(filter).right_aligned())
                .border_style(Style::default().fg(theme.text_label)),
        );
    f.render_widget(tabs, area);
}

/// Cursor position and scroll state for one table
pub struct TableCursor<'a> {
    pub index: usize,
    pub scroll: &'a mut usize,
    pub focused: bool,
}

/// Shared scrolling table; `rows` is the full list, sliced to the viewport here
#[allow(clippy::too_many_arguments)]
fn render_rows_table(
    f: &mut Frame,
    area: Rect,
    title: String,
    header: &[&'static str],
    widths: &[Constraint],
    rows: Vec<Row<'static>>,
    cursor: TableCursor,
    theme: &Theme,
) {
    let visible_height = (area.height as usize).saturating_sub(3);
    update_scroll_offset(cursor.index, visible_height, cursor.scroll, SCROLL_BUFFER);
    let offset = *cursor.scroll;

    let visible: Vec<Row> = rows
        .into_iter()
        .enumerate()
        .skip(offset)
        .take(visible_height)
        .map(|(idx, row)| {
            if cursor.focused && idx == cursor.index {
                row.style(theme.table_selected_style())
            } else {
                row
            }
        })
        .collect();

    let table = Table::new(visible, widths.to_vec())
        .header(Row::new(header.to_vec()).style(theme.table_header_style()))
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.text_label)),
        );
    f.render_widget(table, area);
}

pub fn render_incidents(
    f: &mut Frame,
    area: Rect,
    rows: &[IncidentRow],
    now: DateTime<Utc>,
    cursor: TableCursor,
    theme: &Theme,
) {
    let title = format!(" Incidents ({}) ", rows.len());
    if rows.is_empty() {
        render_empty_state(f, area, &title, "No incidents", "All quiet.", theme);
        return;
    }
    let table_rows = rows
        .iter()
        .map(|row| {
            let incident = &row.incident;
            let state = if incident.is_resolved() {
                "resolved"
            } else {
                "open"
            };
            Row::new(vec![
                Cell::from(Span::styled(
                    incident.severity.as_str(),
                    theme.severity_style(incident.severity),
                )),
                Cell::from(format_age(now, incident.created_at)),
                Cell::from(state),
                Cell::from(truncate_message(&incident.title, 60)),
                Cell::from(
                    incident
                        .root_cause
                        .as_deref()
                        .map(|c| truncate_message(c, 40))
                        .unwrap_or_default(),
                ),
            ])
        })
        .collect();
    render_rows_table(
        f,
        area,
        title,
        &["SEVERITY", "AGE", "STATE", "TITLE", "ROOT CAUSE"],
        &[
            Constraint::Length(9),
            Constraint::Length(5),
            Constraint::Length(9),
            Constraint::Percentage(55),
            Constraint::Percentage(45),
        ],
        table_rows,
        cursor,
        theme,
    );
}

pub fn render_anomalies(
    f: &mut Frame,
    area: Rect,
    rows: &[&Anomaly],
    now: DateTime<Utc>,
    cursor: TableCursor,
    theme: &Theme,
) {
    let title = format!(" Anomalies ({}) ", rows.len());
    if rows.is_empty() {
        render_empty_state(f, area, &title, "No anomalies detected", "", theme);
        return;
    }
    let table_rows = rows
        .iter()
        .map(|a| {
            Row::new(vec![
                Cell::from(Span::styled(
                    a.severity.as_str(),
                    theme.severity_style(a.severity),
                )),
                Cell::from(format_age(now, a.detected_at)),
                Cell::from(a.anomaly_type.clone()),
                Cell::from(if a.resolved { "resolved" } else { "open" }),
                Cell::from(if a.auto_heal_applied { "healed" } else { "" }),
                Cell::from(truncate_message(&a.description, 60)),
            ])
        })
        .collect();
    render_rows_table(
        f,
        area,
        title,
        &["SEVERITY", "AGE", "TYPE", "STATE", "AUTO", "DESCRIPTION"],
        &[
            Constraint::Length(9),
            Constraint::Length(5),
            Constraint::Length(16),
            Constraint::Length(9),
            Constraint::Length(7),
            Constraint::Min(10),
        ],
        table_rows,
        cursor,
        theme,
    );
}

pub fn render_recommendations(
    f: &mut Frame,
    area: Rect,
    rows: &[&StorageRecommendation],
    cursor: TableCursor,
    theme: &Theme,
) {
    let title = format!(" Storage ({}) ", rows.len());
    if rows.is_empty() {
        render_empty_state(f, area, &title, "No storage recommendations", "", theme);
        return;
    }
    let table_rows = rows
        .iter()
        .map(|r| {
            let status_style = match r.status {
                RecommendationStatus::Pending => Style::default().fg(theme.status_warning),
                RecommendationStatus::Rejected => Style::default().fg(theme.table_muted),
                _ => Style::default().fg(theme.status_healthy),
            };
            Row::new(vec![
                Cell::from(r.pvc_name.clone()),
                Cell::from(r.namespace.clone()),
                Cell::from(r.recommendation_type.as_str()),
                Cell::from(format!(
                    "{:.0} -> {:.0} GB",
                    r.current_size_gb, r.recommended_size_gb
                )),
                Cell::from(format!("${:.2}", r.potential_savings)),
                Cell::from(Span::styled(r.status.as_str(), status_style)),
            ])
        })
        .collect();
    render_rows_table(
        f,
        area,
        title,
        &["PVC", "NAMESPACE", "ACTION", "SIZE", "SAVINGS", "STATUS"],
        &[
            Constraint::Min(14),
            Constraint::Length(12),
            Constraint::Length(9),
            Constraint::Length(16),
            Constraint::Length(10),
            Constraint::Length(9),
        ],
        table_rows,
        cursor,
        theme,
    );
}

pub fn render_threats(
    f: &mut Frame,
    area: Rect,
    rows: &[&SecurityThreat],
    now: DateTime<Utc>,
    cursor: TableCursor,
    theme: &Theme,
) {
    let title = format!(" Security ({}) ", rows.len());
    if rows.is_empty() {
        render_empty_state(f, area, &title, "No security threats", "", theme);
        return;
    }
    let table_rows = rows
        .iter()
        .map(|t| {
            let status_style = if t.status.is_open() {
                Style::default().fg(theme.status_critical)
            } else {
                Style::default().fg(theme.table_muted)
            };
            Row::new(vec![
                Cell::from(Span::styled(
                    t.severity.as_str(),
                    theme.severity_style(t.severity),
                )),
                Cell::from(format_age(now, t.detected_at)),
                Cell::from(Span::styled(t.status.as_str(), status_style)),
                Cell::from(t.threat_type.clone()),
                Cell::from(truncate_message(&t.title, 60)),
            ])
        })
        .collect();
    render_rows_table(
        f,
        area,
        title,
        &["SEVERITY", "AGE", "STATUS", "TYPE", "TITLE"],
        &[
            Constraint::Length(9),
            Constraint::Length(5),
            Constraint::Length(15),
            Constraint::Length(22),
            Constraint::Min(10),
        ],
        table_rows,
        cursor,
        theme,
    );
}

pub fn render_inbox(
    f: &mut Frame,
    area: Rect,
    rows: &[Notification],
    now: DateTime<Utc>,
    cursor: TableCursor,
    theme: &Theme,
) {
    let unread = rows.iter().filter(|n| !n.read).count();
    let title = format!(" Inbox ({} unread) ", unread);
    if rows.is_empty() {
        render_empty_state(f, area, &title, "No notifications", "", theme);
        return;
    }
    let table_rows = rows
        .iter()
        .map(|n| {
            Row::new(vec![
                Cell::from(if n.read { " " } else { "•" }),
                Cell::from(format_age(now, n.created_at)),
                Cell::from(Span::styled(n.kind.as_str(), theme.notification_style(n.kind))),
                Cell::from(truncate_message(&n.title, 30)),
                Cell::from(truncate_message(&n.message, 70)),
            ])
        })
        .collect();
    render_rows_table(
        f,
        area,
        title,
        &["", "AGE", "TYPE", "TITLE", "MESSAGE"],
        &[
            Constraint::Length(1),
            Constraint::Length(5),
            Constraint::Length(8),
            Constraint::Length(30),
            Constraint::Min(10),
        ],
        table_rows,
        cursor,
        theme,
    );
}

//! Header view rendering

use super::helpers::status_icon;
use crate::sync::StatusSnapshot;
use crate::tui::theme::Theme;
use crate::views::{ClusterOverview, UsageSummary};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

/// Everything the header shows
pub struct HeaderInfo<'a> {
    pub user: Option<&'a str>,
    pub overview: Option<&'a ClusterOverview>,
    pub status: &'a StatusSnapshot,
    pub anomaly_window_hours: i64,
    pub read_only: bool,
    pub no_icons: bool,
}

fn label<'a>(text: &'a str, theme: &Theme) -> Span<'a> {
    Span::styled(text, Style::default().fg(theme.header_label))
}

fn usage_spans<'a>(name: &'a str, usage: &UsageSummary, theme: &Theme) -> Vec<Span<'a>> {
    vec![
        label(name, theme),
        Span::raw(format!(
            "avg {:.0}% p95 {:.0}% max {:.0}%   ",
            usage.average, usage.p95, usage.max
        )),
    ]
}

/// Render user, selected cluster health and sync state
pub fn render_header(f: &mut Frame, area: Rect, info: &HeaderInfo, theme: &Theme) {
    let mut first = vec![
        label("User: ", theme),
        Span::styled(
            info.user.unwrap_or("signed out").to_string(),
            Style::default()
                .fg(theme.header_user)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
    ];

    let mut lines = Vec::with_capacity(4);
    match info.overview {
        Some(overview) => {
            first.push(label("Cluster: ", theme));
            first.push(Span::styled(
                overview.cluster.name.clone(),
                Style::default()
                    .fg(theme.header_cluster)
                    .add_modifier(Modifier::BOLD),
            ));
            first.push(Span::raw(" "));
            first.push(Span::styled(
                format!(
                    "{} {}",
                    status_icon(overview.status, info.no_icons),
                    overview.status
                ),
                theme.cluster_status_style(overview.status),
            ));
            if info.read_only {
                first.push(Span::styled(
                    "   [READ-ONLY]",
                    Style::default().fg(theme.header_read_only),
                ));
            }
            lines.push(Line::from(first));

            let pods = &overview.pods;
            lines.push(Line::from(vec![
                label("Pods: ", theme),
                Span::raw(format!("{} ", pods.total)),
                Span::styled(
                    format!("{} healthy ", pods.healthy),
                    Style::default().fg(theme.status_healthy),
                ),
                Span::styled(
                    format!("{} warning ", pods.warning),
                    Style::default().fg(theme.status_warning),
                ),
                Span::styled(
                    format!("{} critical", pods.critical),
                    Style::default().fg(theme.status_critical),
                ),
                Span::raw("   "),
                label("Anomalies: ", theme),
                Span::raw(format!(
                    "{} in {}h   ",
                    overview.recent_anomalies, info.anomaly_window_hours
                )),
                label("Incidents: ", theme),
                Span::raw(format!("{} open", overview.open_incidents)),
            ]));

            let mut usage = usage_spans("CPU ", &overview.cpu, theme);
            usage.extend(usage_spans("Mem ", &overview.memory, theme));
            usage.push(label("Savings: ", theme));
            usage.push(Span::raw(format!("${:.2}/mo", overview.potential_savings)));
            lines.push(Line::from(usage));
        }
        None => {
            if info.read_only {
                first.push(Span::styled(
                    "[READ-ONLY]",
                    Style::default().fg(theme.header_read_only),
                ));
            }
            lines.push(Line::from(first));
            lines.push(Line::from(label("No cluster selected", theme)));
            lines.push(Line::from(""));
        }
    }

    let mut sync = vec![
        label("Sync: ", theme),
        Span::styled(
            info.status.phase.to_string(),
            theme.phase_style(info.status.phase),
        ),
    ];
    if let Some(at) = info.status.last_synced {
        sync.push(Span::raw(format!("  (synced {})", at.format("%H:%M:%S"))));
    }
    if info.status.retries > 0 {
        sync.push(Span::raw(format!("  retry {}", info.status.retries)));
    }
    if let Some(err) = &info.status.last_error {
        sync.push(Span::styled(
            format!("  {}", err),
            Style::default().fg(theme.status_critical),
        ));
    }
    lines.push(Line::from(sync));

    let header = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" kodo ")
            .border_style(Style::default().fg(theme.text_label)),
    );
    f.render_widget(header, area);
}

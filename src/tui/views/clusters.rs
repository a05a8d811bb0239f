//! Cluster list pane

use super::helpers::{
    create_themed_block, render_empty_state, status_icon, truncate_message, update_scroll_offset,
};
use crate::models::Cluster;
use crate::tui::constants::SCROLL_BUFFER;
use crate::tui::theme::Theme;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

/// Render the owned clusters; `*` marks the selected one
#[allow(clippy::too_many_arguments)]
pub fn render_cluster_list(
    f: &mut Frame,
    area: Rect,
    clusters: &[Cluster],
    selected: Option<&str>,
    cursor: usize,
    scroll_offset: &mut usize,
    focused: bool,
    theme: &Theme,
    no_icons: bool,
) {
    let title = format!(" Clusters ({}) ", clusters.len());
    if clusters.is_empty() {
        render_empty_state(
            f,
            area,
            &title,
            "No clusters yet",
            "Run `kodo report --cluster-id <id>` from a cluster to connect it.",
            theme,
        );
        return;
    }

    let visible_height = (area.height as usize).saturating_sub(2);
    update_scroll_offset(cursor, visible_height, scroll_offset, SCROLL_BUFFER);
    let name_width = (area.width as usize).saturating_sub(7);

    let lines: Vec<Line> = clusters
        .iter()
        .enumerate()
        .skip(*scroll_offset)
        .take(visible_height)
        .map(|(idx, cluster)| {
            let marker = if selected == Some(cluster.id.as_str()) {
                "*"
            } else {
                " "
            };
            let mut name_style = Style::default().fg(theme.text_primary);
            if selected == Some(cluster.id.as_str()) {
                name_style = name_style.add_modifier(Modifier::BOLD);
            }
            let line = Line::from(vec![
                Span::raw(format!("{} ", marker)),
                Span::styled(
                    format!("{} ", status_icon(cluster.status, no_icons)),
                    theme.cluster_status_style(cluster.status),
                ),
                Span::styled(truncate_message(&cluster.name, name_width), name_style),
            ]);
            if focused && idx == cursor {
                line.style(theme.table_selected_style())
            } else {
                line
            }
        })
        .collect();

    let block = if focused {
        create_themed_block(&title, theme).border_style(theme.footer_key_style())
    } else {
        Block::default()
            .title(title.as_str())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.table_muted))
    };
    f.render_widget(Paragraph::new(lines).block(block), area);
}

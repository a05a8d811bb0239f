//! Shared helpers for view rendering

use crate::models::ClusterStatus;
use crate::tui::theme::Theme;
use chrono::{DateTime, Utc};
use ratatui::{
    Frame,
    layout::Rect,
    style::Style,
    text::Line,
    widgets::{Block, Borders, Paragraph, Wrap},
};

/// Keep the cursor inside the visible window, `buffer` rows from the edge
pub fn update_scroll_offset(
    selected_index: usize,
    visible_height: usize,
    scroll_offset: &mut usize,
    buffer: usize,
) {
    if selected_index >= *scroll_offset + visible_height.saturating_sub(buffer) {
        *scroll_offset = selected_index.saturating_sub(visible_height.saturating_sub(buffer + 1));
    }
    if selected_index < *scroll_offset + buffer {
        *scroll_offset = selected_index.saturating_sub(buffer);
    }
}

pub fn render_loading_state(f: &mut Frame, area: Rect, title: &str, message: &str, theme: &Theme) {
    let text = vec![
        Line::from(message),
        Line::from(""),
        Line::from("Please wait..."),
    ];
    let paragraph = Paragraph::new(text)
        .block(create_themed_block(title, theme))
        .style(Style::default().fg(theme.text_secondary));
    f.render_widget(paragraph, area);
}

pub fn render_empty_state(
    f: &mut Frame,
    area: Rect,
    title: &str,
    message: &str,
    instructions: &str,
    theme: &Theme,
) {
    let text = vec![
        Line::from(message),
        Line::from(""),
        Line::from(instructions),
    ];
    let paragraph = Paragraph::new(text)
        .block(create_themed_block(title, theme))
        .style(Style::default().fg(theme.text_secondary))
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

/// Truncate to `max_len` characters, marking the cut with "..."
pub fn truncate_message(message: &str, max_len: usize) -> String {
    if message.chars().count() > max_len {
        let kept: String = message.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        message.to_string()
    }
}

pub fn create_themed_block<'a>(title: &'a str, theme: &Theme) -> Block<'a> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.text_label))
}

/// Compact age such as "5m", "3h" or "2d"
pub fn format_age(now: DateTime<Utc>, at: Option<DateTime<Utc>>) -> String {
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

pub fn status_icon(status: ClusterStatus, no_icons: bool) -> &'static str {
    if no_icons {
        return match status {
            ClusterStatus::Healthy => "+",
            ClusterStatus::Warning => "!",
            ClusterStatus::Critical => "x",
            ClusterStatus::Offline => "-",
        };
    }
    match status {
        ClusterStatus::Healthy => "●",
        ClusterStatus::Warning => "▲",
        ClusterStatus::Critical => "✖",
        ClusterStatus::Offline => "○",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_follows_cursor() {
        let mut offset = 0;
        update_scroll_offset(9, 10, &mut offset, 2);
        assert_eq!(offset, 2);
        update_scroll_offset(0, 10, &mut offset, 2);
        assert_eq!(offset, 0);
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate_message("short", 10), "short");
        assert_eq!(truncate_message("ééééééé", 5), "éé...");
    }
}

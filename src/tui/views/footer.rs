//! Footer view rendering

use crate::tui::keybindings::get_navigation_commands;
use crate::tui::theme::Theme;
use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

/// Render the status message if there is one, key hints otherwise
pub fn render_footer(
    f: &mut Frame,
    area: Rect,
    status_message: Option<&(String, bool)>,
    read_only: bool,
    theme: &Theme,
) {
    let line = match status_message {
        Some((msg, is_error)) => Line::from(Span::styled(msg.clone(), theme.message_style(*is_error))),
        None => {
            let mut spans = Vec::new();
            for (idx, cmd) in get_navigation_commands(read_only).iter().enumerate() {
                if idx > 0 {
                    spans.push(Span::raw(" | "));
                }
                spans.push(Span::styled(cmd.key, theme.footer_key_style()));
                spans.push(Span::raw(format!(" {}", cmd.label)));
            }
            Line::from(spans)
        }
    };

    let footer = Paragraph::new(line)
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    f.render_widget(footer, area);
}

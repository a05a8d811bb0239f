//! Theme and styling definitions
//!
//! Centralizes every color the dashboard uses so views never hard-code one.

use crate::models::{ClusterStatus, NotificationKind, Severity};
use crate::sync::SyncPhase;
use ratatui::style::{Color, Modifier, Style};

/// Colors for the dashboard
pub struct Theme {
    // Header colors
    pub header_user: Color,
    pub header_cluster: Color,
    pub header_label: Color,
    pub header_read_only: Color,

    // Status colors
    pub status_healthy: Color,
    pub status_warning: Color,
    pub status_critical: Color,
    pub status_offline: Color,

    // Table colors
    pub table_header: Color,
    pub table_selected: Color,
    pub table_selected_bg: Color,
    pub table_muted: Color,

    // Tabs
    pub tab_active: Color,
    pub tab_inactive: Color,

    // Text colors
    pub text_primary: Color,
    pub text_secondary: Color,
    pub text_label: Color,

    // Messages
    pub message_success: Color,
    pub message_error: Color,

    pub footer_key: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            header_user: Color::Yellow,
            header_cluster: Color::Cyan,
            header_label: Color::Gray,
            header_read_only: Color::Magenta,

            status_healthy: Color::Green,
            status_warning: Color::Yellow,
            status_critical: Color::Red,
            status_offline: Color::DarkGray,

            table_header: Color::Cyan,
            table_selected: Color::Blue,
            table_selected_bg: Color::DarkGray,
            table_muted: Color::DarkGray,

            tab_active: Color::Yellow,
            tab_inactive: Color::Gray,

            text_primary: Color::White,
            text_secondary: Color::Gray,
            text_label: Color::Cyan,

            message_success: Color::Green,
            message_error: Color::Red,

            footer_key: Color::Yellow,
        }
    }
}

impl Theme {
    pub fn cluster_status_style(&self, status: ClusterStatus) -> Style {
        let color = match status {
            ClusterStatus::Healthy => self.status_healthy,
            ClusterStatus::Warning => self.status_warning,
            ClusterStatus::Critical => self.status_critical,
            ClusterStatus::Offline => self.status_offline,
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }

    pub fn severity_style(&self, severity: Severity) -> Style {
        let color = match severity {
            Severity::Critical => self.status_critical,
            Severity::High => Color::LightRed,
            Severity::Medium => self.status_warning,
            Severity::Low => self.text_secondary,
        };
        Style::default().fg(color)
    }

    pub fn notification_style(&self, kind: NotificationKind) -> Style {
        let color = match kind {
            NotificationKind::Info => self.text_primary,
            NotificationKind::Success => self.message_success,
            NotificationKind::Warning => self.status_warning,
            NotificationKind::Error => self.message_error,
        };
        Style::default().fg(color)
    }

    /// Sync phase indicator; stale data is flagged loudly
    pub fn phase_style(&self, phase: SyncPhase) -> Style {
        match phase {
            SyncPhase::Ready => Style::default().fg(self.status_healthy),
            SyncPhase::Loading => Style::default().fg(self.status_warning),
            SyncPhase::Stale => Style::default()
                .fg(self.status_critical)
                .add_modifier(Modifier::BOLD),
            SyncPhase::Idle => Style::default().fg(self.text_secondary),
        }
    }

    pub fn table_header_style(&self) -> Style {
        Style::default()
            .fg(self.table_header)
            .add_modifier(Modifier::BOLD)
    }

    pub fn table_selected_style(&self) -> Style {
        Style::default()
            .fg(self.table_selected)
            .bg(self.table_selected_bg)
    }

    pub fn footer_key_style(&self) -> Style {
        Style::default().fg(self.footer_key)
    }

    pub fn message_style(&self, is_error: bool) -> Style {
        Style::default()
            .fg(if is_error {
                self.message_error
            } else {
                self.message_success
            })
            .add_modifier(Modifier::BOLD)
    }
}

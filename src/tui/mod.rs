//! TUI module
//!
//! Terminal dashboard over a `DashboardSession`, built with ratatui.

mod app;
mod constants;
mod keybindings;
mod theme;
pub mod views;

pub use app::*;
pub use theme::*;

use crate::config::Config;
use crate::services::DashboardSession;
use crate::sync::SyncEvent;
use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io;
use std::time::Duration;

type DashboardTerminal = Terminal<CrosstermBackend<io::Stdout>>;

/// Run the dashboard until the user quits
pub async fn run_dashboard(mut session: DashboardSession, config: &Config) -> Result<()> {
    tracing::debug!("Initializing TUI");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    if config.ui.enable_mouse {
        execute!(stdout, EnableMouseCapture)?;
    }
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = event_loop(&mut terminal, &mut session, config);

    tracing::debug!("TUI shutting down");
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    if config.ui.enable_mouse {
        execute!(terminal.backend_mut(), DisableMouseCapture)?;
    }
    terminal.show_cursor()?;

    session.stop();
    result
}

fn event_loop(
    terminal: &mut DashboardTerminal,
    session: &mut DashboardSession,
    config: &Config,
) -> Result<()> {
    let mut app = App::new(config);
    app.sync_from(session);
    let mut runner = ActionRunner::new(session.handle().clone());
    let tick = Duration::from_millis(config.ui.refresh_ms.max(16));

    loop {
        terminal.draw(|f| app.render(f))?;

        if event::poll(tick)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match app.handle_key(key) {
                        Some(AppAction::Quit) => break,
                        Some(AppAction::SelectCluster(id)) => {
                            if let Err(e) = session.select(&id) {
                                app.set_status_message((e.to_string(), true));
                            }
                        }
                        Some(AppAction::Refresh) => session.handle().refresh(),
                        Some(action) => runner.spawn(action),
                        None => {}
                    }
                }
            }
        }

        for event in session.drain_events() {
            match event {
                SyncEvent::SessionExpired => app.set_status_message((
                    "Session expired; run `kodo login` and restart".to_string(),
                    true,
                )),
                SyncEvent::Error(msg) => app.set_status_message((msg, true)),
                _ => {}
            }
        }
        runner.collect(&mut app);
        app.check_status_message_timeout();
        app.sync_from(session);
    }

    Ok(())
}

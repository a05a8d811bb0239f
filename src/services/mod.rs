//! Service layer
//!
//! Ties the store, cache, selection and subscription manager together for
//! the TUI, the CLI commands and library consumers.

pub mod dashboard_session;
pub mod demo;

pub use dashboard_session::DashboardSession;

//! CLI command handling module
//!
//! Handles all CLI subcommands and argument parsing.

mod commands;
mod config;
mod logging;
pub mod output;
mod version;

pub use commands::{
    ClusterSubcommand, handle_cluster_command, handle_invoke, handle_login, handle_logout,
    handle_report, handle_status,
};
pub use config::{ConfigSubcommand, handle_config_command};
pub use logging::*;
pub use version::display_version;

//! Kodo library
//!
//! Live dashboard state for a Kubernetes monitoring backend: a subscription
//! manager keeps an in-memory cache of the signed-in user's rows in sync
//! with a remote store, and pure views derive what the dashboard shows.
//! The `kodo` binary is a thin layer over this crate.

pub mod auth;
pub mod cache;
pub mod cli;
pub mod collector;
pub mod config;
pub mod functions;
pub mod jobs;
pub mod models;
pub mod selection;
pub mod services;
pub mod store;
pub mod sync;
#[cfg(feature = "tui")]
pub mod tui;
pub mod views;

#[cfg(test)]
mod test_support;

// Re-export commonly used types for convenience
pub use cache::{CacheSnapshot, EntityCache};
pub use selection::{SelectionContext, SelectionState};
pub use services::DashboardSession;
pub use sync::{SubscriptionManager, SyncEvent, SyncHandle, SyncPhase};

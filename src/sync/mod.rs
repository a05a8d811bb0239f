//! Subscription manager
//!
//! Keeps the entity cache in step with the remote store. One task owns every
//! push subscription and every cache write; query completions and push
//! messages reach it through channels and are applied in arrival order.
//!
//! Structure:
//! - `manager.rs` - the manager task and its selection-driven lifecycle
//! - `retry.rs` - bounded exponential backoff
//! - `handle.rs` - cloneable handle for commands and user actions

mod handle;
mod manager;
mod retry;

pub use handle::{ActionError, SyncHandle};
pub use manager::SubscriptionManager;
pub use retry::RetryPolicy;

use crate::models::{ChangeEvent, EntityKind};
use crate::store::Filter;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// What a subscription or query is keyed on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    User(String),
    Cluster(String),
}

impl Scope {
    /// Scope a kind is watched under for this user/cluster pair
    pub fn for_kind(kind: EntityKind, user_id: &str, cluster_id: Option<&str>) -> Option<Self> {
        if kind.is_cluster_scoped() {
            cluster_id.map(|id| Scope::Cluster(id.to_string()))
        } else {
            Some(Scope::User(user_id.to_string()))
        }
    }

    pub fn filter(&self) -> Filter {
        match self {
            Scope::User(id) => Filter::eq("user_id", id.as_str()),
            Scope::Cluster(id) => Filter::eq("cluster_id", id.as_str()),
        }
    }

    pub fn cluster_id(&self) -> Option<&str> {
        match self {
            Scope::Cluster(id) => Some(id),
            Scope::User(_) => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::User(id) => write!(f, "user:{}", id),
            Scope::Cluster(id) => write!(f, "cluster:{}", id),
        }
    }
}

/// Tunables for the manager
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub retry: RetryPolicy,
    /// Row cap on every bulk query
    pub query_limit: usize,
    /// Refuse user actions that mutate the store
    pub read_only: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            query_limit: 500,
            read_only: false,
        }
    }
}

/// Notifications from the manager to the view layer
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Rows of this kind changed in the cache
    Updated(EntityKind),
    StatusChanged(SyncPhase),
    SelectionChanged(Option<String>),
    /// Authorization failed; everything has been torn down
    SessionExpired,
    Error(String),
}

/// Requests handled by the manager task
#[derive(Debug, Clone, PartialEq)]
pub enum SyncCommand {
    /// Sign-in: load the user's clusters and notifications
    Start { user_id: String },
    /// Re-run every bulk query for the current scopes
    Refresh,
    /// Sign-out: drop subscriptions and cached rows
    Stop,
    /// Apply a row written by a user action
    Apply(ChangeEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Idle,
    Loading,
    Ready,
    /// Showing cached rows after a failed refresh
    Stale,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Loading => "loading",
            SyncPhase::Ready => "live",
            SyncPhase::Stale => "stale",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time copy of the sync status
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusSnapshot {
    pub phase: SyncPhase,
    /// Retries issued since the last successful load
    pub retries: u32,
    pub last_error: Option<String>,
    pub last_synced: Option<DateTime<Utc>>,
}

/// Shared sync status, written by the manager and read by the UI
#[derive(Clone, Default)]
pub struct SyncStatus {
    inner: Arc<RwLock<StatusSnapshot>>,
}

impl SyncStatus {
    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn phase(&self) -> SyncPhase {
        self.snapshot().phase
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut StatusSnapshot)) {
        let mut status = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_for_kind() {
        assert_eq!(
            Scope::for_kind(EntityKind::Incident, "u1", Some("c1")),
            Some(Scope::Cluster("c1".to_string()))
        );
        assert_eq!(Scope::for_kind(EntityKind::Incident, "u1", None), None);
        assert_eq!(
            Scope::for_kind(EntityKind::Notification, "u1", Some("c1")),
            Some(Scope::User("u1".to_string()))
        );
    }

    #[test]
    fn test_scope_filter() {
        assert_eq!(
            Scope::Cluster("c1".into()).filter(),
            Filter::eq("cluster_id", "c1")
        );
        assert_eq!(Scope::User("u1".into()).to_string(), "user:u1");
    }
}

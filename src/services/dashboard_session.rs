//! Headless dashboard session for library consumers
//!
//! `DashboardSession` wires a remote store, the entity cache, the selection
//! context and a running subscription manager into one object. The TUI and
//! the `status` command both sit on top of it; nothing here depends on a
//! terminal.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::auth::AuthSession;
use crate::cache::{CacheSnapshot, EntityCache};
use crate::config::{Config, paths};
use crate::selection::{SelectionContext, SelectionError, SelectionState};
use crate::store::{MemoryStore, RemoteStore, RestStore};
use crate::sync::{StatusSnapshot, SubscriptionManager, SyncEvent, SyncHandle, SyncPhase};
use crate::views::{ClusterOverview, FleetSummary, ViewThresholds, cluster_overview, fleet_summary};

use super::demo;

/// A live view of one user's dashboard state.
///
/// # Example
///
/// ```rust,no_run
/// use kodo::config::Config;
/// use kodo::services::DashboardSession;
///
/// # async fn example() -> anyhow::Result<()> {
/// let mut session = DashboardSession::demo(&Config::default());
/// session.wait_until_ready(std::time::Duration::from_secs(5)).await?;
///
/// if let Some(overview) = session.overview() {
///     println!("{}: {}", overview.cluster.name, overview.status);
/// }
/// # Ok(())
/// # }
/// ```
pub struct DashboardSession {
    handle: SyncHandle,
    selection: SelectionContext,
    thresholds: ViewThresholds,
    events_rx: mpsc::UnboundedReceiver<SyncEvent>,
    task: JoinHandle<()>,
    user_id: Option<String>,
    /// Cluster the manager last reported switching to
    synced_cluster: Option<String>,
    expired: bool,
}

impl DashboardSession {
    /// Spawn a manager over `store`; call `start` to sign a user in
    pub fn with_store(
        store: Arc<dyn RemoteStore>,
        config: &Config,
        selection_path: Option<PathBuf>,
    ) -> Self {
        let cache = EntityCache::new();
        let selection = SelectionContext::new(selection_path);
        let (manager, events_rx) =
            SubscriptionManager::new(store, cache, selection.clone(), config.sync_settings());
        let handle = manager.handle();
        let task = tokio::spawn(manager.run());

        Self {
            handle,
            selection,
            thresholds: config.view_thresholds(),
            events_rx,
            task,
            user_id: None,
            synced_cluster: None,
            expired: false,
        }
    }

    /// Connect to the configured backend as `session`'s user and start syncing
    pub fn connect(config: &Config, session: &AuthSession) -> Result<Self> {
        if !config.has_backend() {
            anyhow::bail!(
                "No backend configured; set backend.url and backend.anonKey (or KODO_BACKEND_URL / KODO_ANON_KEY)"
            );
        }
        let store = RestStore::new(
            &config.backend.url,
            &config.backend.anon_key,
            config.request_timeout(),
        )
        .context("Failed to create backend client")?
        .with_access_token(session.access_token.clone())
        .with_poll_interval(config.poll_interval());

        let mut dashboard =
            Self::with_store(Arc::new(store), config, Some(paths::selection_path()));
        dashboard.start(&session.user_id);
        Ok(dashboard)
    }

    /// Start a session over seeded in-memory data
    pub fn demo(config: &Config) -> Self {
        let store = MemoryStore::new();
        demo::seed(&store, demo::DEMO_USER, Utc::now());
        let mut dashboard = Self::with_store(Arc::new(store), config, None);
        dashboard.start(demo::DEMO_USER);
        dashboard
    }

    /// Sign `user_id` in and begin loading their clusters
    pub fn start(&mut self, user_id: &str) {
        self.user_id = Some(user_id.to_string());
        self.synced_cluster = None;
        self.expired = false;
        self.handle.start(user_id);
    }

    /// Sign out: subscriptions, cache and selection are dropped
    pub fn stop(&mut self) {
        self.user_id = None;
        self.handle.stop();
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Handle for refreshes and status-change actions
    pub fn handle(&self) -> &SyncHandle {
        &self.handle
    }

    pub fn selection(&self) -> &SelectionContext {
        &self.selection
    }

    pub fn select(&self, cluster_id: &str) -> Result<(), SelectionError> {
        self.selection.select(cluster_id)
    }

    pub fn thresholds(&self) -> &ViewThresholds {
        &self.thresholds
    }

    pub fn cache(&self) -> &EntityCache {
        self.handle.cache()
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        self.handle.cache().snapshot()
    }

    pub fn status(&self) -> StatusSnapshot {
        self.handle.status().snapshot()
    }

    /// Whether an authorization failure ended the session
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Overview of the selected cluster, if any
    pub fn overview(&self) -> Option<ClusterOverview> {
        let selected = self.selection.selected()?;
        cluster_overview(&self.snapshot(), &selected, &self.thresholds, Utc::now())
    }

    pub fn fleet(&self) -> FleetSummary {
        fleet_summary(&self.snapshot(), &self.thresholds, Utc::now())
    }

    fn observe(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::SelectionChanged(id) => self.synced_cluster = id.clone(),
            SyncEvent::SessionExpired => {
                self.expired = true;
                self.user_id = None;
            }
            _ => {}
        }
    }

    /// Wait for and return the next sync event.
    ///
    /// Returns `None` if the manager has stopped.
    pub async fn recv_event(&mut self) -> Option<SyncEvent> {
        let event = self.events_rx.recv().await?;
        self.observe(&event);
        Some(event)
    }

    /// Non-blocking receive of the next sync event.
    pub fn try_recv_event(&mut self) -> Option<SyncEvent> {
        let event = self.events_rx.try_recv().ok()?;
        self.observe(&event);
        Some(event)
    }

    /// Drain all pending events and return them.
    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv_event() {
            events.push(event);
        }
        events
    }

    /// True once the owned clusters and the selected cluster's rows are loaded
    pub fn is_ready(&self) -> bool {
        let state = self.selection.state();
        let caught_up = match &state {
            SelectionState::Ready(Some(id)) => self.synced_cluster.as_deref() == Some(id.as_str()),
            SelectionState::Ready(None) => true,
            _ => false,
        };
        caught_up && self.status().phase == SyncPhase::Ready
    }

    /// Process events until `is_ready`, the session expires, or `timeout` passes
    pub async fn wait_until_ready(&mut self, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.expired {
                anyhow::bail!("Session expired; run `kodo login` again");
            }
            if self.is_ready() {
                return Ok(());
            }
            match tokio::time::timeout_at(deadline, self.recv_event()).await {
                Ok(Some(_)) => {}
                Ok(None) => anyhow::bail!("Subscription manager stopped"),
                Err(_) => {
                    let status = self.status();
                    anyhow::bail!(
                        "Timed out waiting for data (phase: {}{})",
                        status.phase,
                        status
                            .last_error
                            .map(|e| format!(", last error: {}", e))
                            .unwrap_or_default()
                    );
                }
            }
        }
    }
}

impl Drop for DashboardSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

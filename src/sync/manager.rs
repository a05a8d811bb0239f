//! The subscription manager task

use super::handle::SyncHandle;
use super::{Scope, SyncCommand, SyncEvent, SyncPhase, SyncSettings, SyncStatus};
use crate::cache::EntityCache;
use crate::models::{EntityKind, Row};
use crate::selection::{SelectionContext, SelectionState};
use crate::store::{FeedMessage, Query, RemoteStore, StoreError, StoreResult, SubscriptionHandle};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Messages the manager sends itself from spawned tasks
#[derive(Debug)]
enum Inbound {
    QueryFinished {
        kind: EntityKind,
        scope: Scope,
        epoch: u64,
        attempt: u32,
        result: StoreResult<Vec<Value>>,
    },
    RetryQuery {
        kind: EntityKind,
        scope: Scope,
        epoch: u64,
        attempt: u32,
    },
    ResubscribeDue {
        kind: EntityKind,
        scope: Scope,
        epoch: u64,
        attempt: u32,
    },
}

type SubKey = (EntityKind, Scope);

/// Owns push subscriptions and applies every change to the cache
///
/// Subscriptions exist per (entity kind, scope). User-scoped kinds follow the
/// signed-in user; cluster-scoped kinds follow the selection. Each scope has
/// an epoch that is bumped whenever its subscriptions are torn down, and
/// query completions carrying an old epoch are discarded.
pub struct SubscriptionManager {
    store: Arc<dyn RemoteStore>,
    cache: EntityCache,
    selection: SelectionContext,
    selection_rx: watch::Receiver<SelectionState>,
    settings: SyncSettings,
    status: SyncStatus,
    events_tx: mpsc::UnboundedSender<SyncEvent>,
    inbox_tx: mpsc::UnboundedSender<Inbound>,
    inbox_rx: mpsc::UnboundedReceiver<Inbound>,
    feed_tx: mpsc::UnboundedSender<FeedMessage>,
    feed_rx: mpsc::UnboundedReceiver<FeedMessage>,
    command_tx: mpsc::UnboundedSender<SyncCommand>,
    command_rx: mpsc::UnboundedReceiver<SyncCommand>,
    user_id: Option<String>,
    current_cluster: Option<String>,
    user_epoch: u64,
    cluster_epoch: u64,
    subscriptions: HashMap<SubKey, SubscriptionHandle>,
    by_handle: HashMap<SubscriptionHandle, SubKey>,
    loading: HashSet<SubKey>,
    failed: HashSet<SubKey>,
    in_flight: usize,
}

impl SubscriptionManager {
    /// Create a manager and the receiver for its events
    pub fn new(
        store: Arc<dyn RemoteStore>,
        cache: EntityCache,
        selection: SelectionContext,
        settings: SyncSettings,
    ) -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let selection_rx = selection.subscribe();

        (
            Self {
                store,
                cache,
                selection,
                selection_rx,
                settings,
                status: SyncStatus::default(),
                events_tx,
                inbox_tx,
                inbox_rx,
                feed_tx,
                feed_rx,
                command_tx,
                command_rx,
                user_id: None,
                current_cluster: None,
                user_epoch: 0,
                cluster_epoch: 0,
                subscriptions: HashMap::new(),
                by_handle: HashMap::new(),
                loading: HashSet::new(),
                failed: HashSet::new(),
                in_flight: 0,
            },
            events_rx,
        )
    }

    /// Cloneable handle for commands and user actions
    pub fn handle(&self) -> SyncHandle {
        SyncHandle::new(
            self.store.clone(),
            self.cache.clone(),
            self.status.clone(),
            self.command_tx.clone(),
            self.settings.read_only,
        )
    }

    pub fn status(&self) -> SyncStatus {
        self.status.clone()
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    /// Number of open push subscriptions
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.events_tx.send(event);
    }

    fn epoch_for(&self, scope: &Scope) -> u64 {
        match scope {
            Scope::User(_) => self.user_epoch,
            Scope::Cluster(_) => self.cluster_epoch,
        }
    }

    fn is_current(&self, scope: &Scope, epoch: u64) -> bool {
        if epoch != self.epoch_for(scope) {
            return false;
        }
        match scope {
            Scope::User(id) => self.user_id.as_deref() == Some(id.as_str()),
            Scope::Cluster(id) => self.current_cluster.as_deref() == Some(id.as_str()),
        }
    }

    /// Sign-in: subscribe the user's own tables and load them
    pub async fn start(&mut self, user_id: &str) {
        if self.user_id.is_some() {
            self.stop().await;
        }
        tracing::info!("Starting sync for user {}", user_id);

        self.user_id = Some(user_id.to_string());
        self.user_epoch += 1;
        self.cache.set_owner(Some(user_id.to_string()));
        self.selection.begin_loading();
        self.status.update(|s| {
            s.retries = 0;
            s.last_error = None;
        });

        let scope = Scope::User(user_id.to_string());
        for &kind in EntityKind::user_scoped() {
            if self.open_subscription(kind, scope.clone(), 0).await {
                self.spawn_query(kind, scope.clone(), 0);
            }
            if self.user_id.is_none() {
                // Expired while subscribing
                break;
            }
        }
        self.refresh_phase();
    }

    /// Sign-out: drop every subscription, the cache and the selection
    pub async fn stop(&mut self) {
        tracing::info!("Stopping sync");
        self.close_all().await;
        self.user_id = None;
        self.cache.clear();
        self.selection.teardown();
        self.refresh_phase();
    }

    /// Re-run the bulk query behind every open subscription
    pub fn refresh(&mut self) {
        let keys: Vec<SubKey> = self.subscriptions.keys().cloned().collect();
        tracing::debug!("Refreshing {} scopes", keys.len());
        for (kind, scope) in keys {
            self.spawn_query(kind, scope, 0);
        }
        self.refresh_phase();
    }

    /// Process one message; returns false once there is nothing left to wait on
    pub async fn tick(&mut self) -> bool {
        tokio::select! {
            biased;
            changed = self.selection_rx.changed() => {
                if changed.is_err() {
                    return false;
                }
                let state = self.selection_rx.borrow_and_update().clone();
                self.on_selection(state).await;
            }
            Some(command) = self.command_rx.recv() => self.on_command(command).await,
            Some(msg) = self.inbox_rx.recv() => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.on_inbound(msg).await;
            }
            Some(msg) = self.feed_rx.recv() => self.on_feed(msg).await,
            else => return false,
        }
        true
    }

    /// Run until every channel closes
    pub async fn run(mut self) {
        while self.tick().await {}
        tracing::debug!("Subscription manager stopped");
    }

    /// Process messages until no query, retry or delivery is outstanding
    pub async fn settle(&mut self) {
        loop {
            let idle = self.in_flight == 0
                && self.inbox_rx.is_empty()
                && self.feed_rx.is_empty()
                && self.command_rx.is_empty()
                && !self.selection_rx.has_changed().unwrap_or(false);
            if idle || !self.tick().await {
                break;
            }
        }
    }

    async fn on_command(&mut self, command: SyncCommand) {
        match command {
            SyncCommand::Start { user_id } => self.start(&user_id).await,
            SyncCommand::Refresh => self.refresh(),
            SyncCommand::Stop => self.stop().await,
            SyncCommand::Apply(event) => {
                let kind = event.kind();
                if self.cache.apply(event) {
                    self.emit(SyncEvent::Updated(kind));
                }
            }
        }
    }

    async fn on_selection(&mut self, state: SelectionState) {
        match state {
            SelectionState::Uninitialized => {
                if !self.subscriptions.is_empty() {
                    self.close_all().await;
                    self.refresh_phase();
                }
            }
            SelectionState::Loading => {}
            SelectionState::Ready(selected) => {
                if selected != self.current_cluster {
                    self.switch_cluster(selected).await;
                }
            }
        }
    }

    /// Tear down the old cluster's subscriptions and load the new one
    async fn switch_cluster(&mut self, selected: Option<String>) {
        tracing::debug!(
            "Switching cluster {:?} -> {:?}",
            self.current_cluster,
            selected
        );

        let old: Vec<SubKey> = self
            .subscriptions
            .keys()
            .filter(|(_, scope)| matches!(scope, Scope::Cluster(_)))
            .cloned()
            .collect();
        for key in old {
            self.close_subscription(&key).await;
        }
        self.loading.retain(|(_, scope)| !matches!(scope, Scope::Cluster(_)));
        self.failed.retain(|(_, scope)| !matches!(scope, Scope::Cluster(_)));

        self.cluster_epoch += 1;
        self.current_cluster = selected.clone();
        self.cache.retain_cluster_scope(selected.as_deref());

        if let Some(cluster_id) = &selected {
            let scope = Scope::Cluster(cluster_id.clone());
            for &kind in EntityKind::cluster_scoped() {
                self.spawn_query(kind, scope.clone(), 0);
                self.open_subscription(kind, scope.clone(), 0).await;
                if self.user_id.is_none() {
                    return;
                }
            }
        }
        self.refresh_phase();
        // Must follow refresh_phase: the phase a listener reads must postdate the switch
        self.emit(SyncEvent::SelectionChanged(selected));
    }

    async fn on_inbound(&mut self, msg: Inbound) {
        match msg {
            Inbound::QueryFinished {
                kind,
                scope,
                epoch,
                attempt,
                result,
            } => {
                if !self.is_current(&scope, epoch) {
                    tracing::debug!("Discarding {} result for stale scope {}", kind, scope);
                    return;
                }
                match result {
                    Ok(rows) => self.on_rows(kind, scope, rows),
                    Err(e) => self.on_query_error(kind, scope, attempt, e).await,
                }
            }
            Inbound::RetryQuery {
                kind,
                scope,
                epoch,
                attempt,
            } => {
                if self.is_current(&scope, epoch) {
                    self.spawn_query(kind, scope, attempt);
                }
            }
            Inbound::ResubscribeDue {
                kind,
                scope,
                epoch,
                attempt,
            } => {
                if self.is_current(&scope, epoch)
                    && self.open_subscription(kind, scope.clone(), attempt).await
                {
                    // One requery covers whatever the dead feed missed
                    self.spawn_query(kind, scope, 0);
                }
            }
        }
        self.refresh_phase();
    }

    fn on_rows(&mut self, kind: EntityKind, scope: Scope, values: Vec<Value>) {
        let rows: Vec<Row> = values
            .into_iter()
            .filter_map(|value| match Row::decode(kind, value) {
                Ok(row) => Some(row),
                Err(e) => {
                    tracing::warn!("Dropping row from {} query: {}", scope, e);
                    None
                }
            })
            .collect();

        let accepted = self.cache.replace_scope(kind, scope.cluster_id(), rows);
        tracing::debug!("Loaded {} {} rows for {}", accepted, kind, scope);

        let owned_list_loaded = kind == EntityKind::Cluster && matches!(scope, Scope::User(_));
        let key = (kind, scope);
        self.loading.remove(&key);
        self.failed.remove(&key);
        self.status.update(|s| {
            s.retries = 0;
            s.last_synced = Some(chrono::Utc::now());
            if self.failed.is_empty() {
                s.last_error = None;
            }
        });

        if owned_list_loaded {
            self.resolve_owned_clusters();
        }
        self.emit(SyncEvent::Updated(kind));
    }

    async fn on_query_error(&mut self, kind: EntityKind, scope: Scope, attempt: u32, err: StoreError) {
        if err.is_auth() {
            self.expire_session(&err).await;
            return;
        }

        let key = (kind, scope.clone());
        self.failed.insert(key.clone());
        self.status.update(|s| s.last_error = Some(err.to_string()));

        if err.is_transient() && self.settings.retry.allows(attempt) {
            let delay = self.settings.retry.delay_for(attempt);
            tracing::warn!(
                "{} query for {} failed (attempt {}), retrying in {:?}: {}",
                kind,
                scope,
                attempt + 1,
                delay,
                err
            );
            self.status.update(|s| s.retries += 1);
            self.schedule(
                delay,
                Inbound::RetryQuery {
                    kind,
                    scope: scope.clone(),
                    epoch: self.epoch_for(&scope),
                    attempt: attempt + 1,
                },
            );
        } else {
            tracing::warn!("{} query for {} gave up: {}", kind, scope, err);
            self.loading.remove(&key);
            self.emit(SyncEvent::Error(format!("Failed to load {}: {}", kind, err)));
        }
    }

    async fn on_feed(&mut self, msg: FeedMessage) {
        match msg {
            FeedMessage::Change { handle, change } => {
                if !self.by_handle.contains_key(&handle) {
                    return;
                }
                let event = match change.decode() {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!("Dropping push event on {}: {}", handle, e);
                        return;
                    }
                };
                let kind = event.kind();
                if self.cache.apply(event) {
                    if kind == EntityKind::Cluster {
                        self.refresh_owned_clusters();
                    }
                    self.emit(SyncEvent::Updated(kind));
                }
            }
            FeedMessage::Closed { handle, reason } => {
                let Some(key) = self.by_handle.remove(&handle) else {
                    return;
                };
                self.subscriptions.remove(&key);
                let (kind, scope) = key;
                tracing::warn!("Subscription {} for {} {} closed: {}", handle, kind, scope, reason);

                if self.open_subscription(kind, scope.clone(), 0).await {
                    self.spawn_query(kind, scope, 0);
                }
                self.refresh_phase();
            }
        }
    }

    /// The owned-cluster query landed; leave `Loading` or refresh the list
    fn resolve_owned_clusters(&self) {
        let owned = self.cache.owned_cluster_ids();
        match self.selection.state() {
            SelectionState::Loading => {
                self.selection.resolve(owned);
            }
            SelectionState::Ready(_) => self.selection.set_owned(owned),
            SelectionState::Uninitialized => {}
        }
    }

    /// A pushed cluster change; only the query may resolve a loading selection
    fn refresh_owned_clusters(&self) {
        if let SelectionState::Ready(_) = self.selection.state() {
            self.selection.set_owned(self.cache.owned_cluster_ids());
        }
    }

    fn spawn_query(&mut self, kind: EntityKind, scope: Scope, attempt: u32) {
        let query = Query::table(kind.table())
            .filter(scope.filter())
            .order_desc(kind.order_column())
            .limit(self.settings.query_limit);
        let epoch = self.epoch_for(&scope);
        let store = self.store.clone();
        let inbox = self.inbox_tx.clone();

        self.loading.insert((kind, scope.clone()));
        self.in_flight += 1;
        tokio::spawn(async move {
            let result = store.query(&query).await;
            let _ = inbox.send(Inbound::QueryFinished {
                kind,
                scope,
                epoch,
                attempt,
                result,
            });
        });
    }

    fn schedule(&mut self, delay: std::time::Duration, msg: Inbound) {
        let inbox = self.inbox_tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = inbox.send(msg);
        });
    }

    /// Subscribe one (kind, scope); on failure schedule a retry or give up
    async fn open_subscription(&mut self, kind: EntityKind, scope: Scope, attempt: u32) -> bool {
        let result = self
            .store
            .subscribe(kind.table(), vec![scope.filter()], self.feed_tx.clone())
            .await;

        match result {
            Ok(handle) => {
                tracing::debug!("Subscribed {} for {} as {}", kind, scope, handle);
                let key = (kind, scope);
                self.by_handle.insert(handle, key.clone());
                self.subscriptions.insert(key, handle);
                true
            }
            Err(e) if e.is_auth() => {
                self.expire_session(&e).await;
                false
            }
            Err(e) => {
                let key = (kind, scope.clone());
                self.failed.insert(key);
                self.status.update(|s| s.last_error = Some(e.to_string()));

                if self.settings.retry.allows(attempt) {
                    let delay = self.settings.retry.delay_for(attempt);
                    tracing::warn!("Subscribe {} for {} failed, retrying in {:?}: {}", kind, scope, delay, e);
                    self.status.update(|s| s.retries += 1);
                    self.schedule(
                        delay,
                        Inbound::ResubscribeDue {
                            kind,
                            scope: scope.clone(),
                            epoch: self.epoch_for(&scope),
                            attempt: attempt + 1,
                        },
                    );
                } else {
                    tracing::warn!("Giving up on {} subscription for {}: {}", kind, scope, e);
                    self.emit(SyncEvent::Error(format!("Live updates for {} unavailable: {}", kind, e)));
                }
                false
            }
        }
    }

    async fn close_subscription(&mut self, key: &SubKey) {
        let Some(handle) = self.subscriptions.remove(key) else {
            return;
        };
        self.by_handle.remove(&handle);
        if let Err(e) = self.store.unsubscribe(handle).await {
            tracing::debug!("Unsubscribe {} failed: {}", handle, e);
        }
    }

    async fn close_all(&mut self) {
        let keys: Vec<SubKey> = self.subscriptions.keys().cloned().collect();
        for key in keys {
            self.close_subscription(&key).await;
        }
        self.user_epoch += 1;
        self.cluster_epoch += 1;
        self.current_cluster = None;
        self.loading.clear();
        self.failed.clear();
    }

    /// Authorization failed: tear everything down, no retry
    async fn expire_session(&mut self, err: &StoreError) {
        tracing::warn!("Session expired: {}", err);
        self.close_all().await;
        self.user_id = None;
        self.cache.clear();
        self.selection.teardown();
        // The teardown above must not be replayed as a selection change
        self.selection_rx.mark_unchanged();
        self.status.update(|s| {
            s.phase = SyncPhase::Idle;
            s.last_error = Some(err.to_string());
        });
        self.emit(SyncEvent::SessionExpired);
    }

    fn refresh_phase(&self) {
        let phase = if self.user_id.is_none() {
            SyncPhase::Idle
        } else if !self.failed.is_empty() {
            SyncPhase::Stale
        } else if !self.loading.is_empty() {
            SyncPhase::Loading
        } else {
            SyncPhase::Ready
        };

        let mut changed = false;
        self.status.update(|s| {
            changed = s.phase != phase;
            s.phase = phase;
        });
        if changed {
            self.emit(SyncEvent::StatusChanged(phase));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockRemoteStore;
    use serde_json::json;

    fn manager_with(store: MockRemoteStore) -> (SubscriptionManager, mpsc::UnboundedReceiver<SyncEvent>) {
        SubscriptionManager::new(
            Arc::new(store),
            EntityCache::new(),
            SelectionContext::new(None),
            SyncSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_auth_failure_on_subscribe_expires_session() {
        let mut store = MockRemoteStore::new();
        store
            .expect_subscribe()
            .times(1)
            .returning(|_, _, _| Err(StoreError::Unauthorized("jwt expired".into())));
        store.expect_query().never();

        let (mut manager, mut events) = manager_with(store);
        manager.start("u1").await;

        assert_eq!(manager.subscription_count(), 0);
        assert_eq!(manager.status().phase(), SyncPhase::Idle);
        let mut saw_expired = false;
        while let Ok(event) = events.try_recv() {
            saw_expired |= event == SyncEvent::SessionExpired;
        }
        assert!(saw_expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_query_error_is_not_retried() {
        let mut store = MockRemoteStore::new();
        store
            .expect_subscribe()
            .returning(|_, _, _| Ok(SubscriptionHandle(1)));
        store.expect_query().times(2).returning(|q| {
            if q.table == "clusters" {
                Err(StoreError::Status {
                    status: 400,
                    message: "bad filter".into(),
                })
            } else {
                Ok(vec![json!({ "id": "n1", "user_id": "u1" })])
            }
        });

        let (mut manager, _events) = manager_with(store);
        manager.start("u1").await;
        manager.settle().await;

        let status = manager.status().snapshot();
        assert_eq!(status.phase, SyncPhase::Stale);
        assert_eq!(status.retries, 0);
        assert!(status.last_error.unwrap().contains("bad filter"));
    }
}

//! End-to-end sync scenarios against the in-process store
//!
//! Each test drives a `SubscriptionManager` directly: `start` signs in,
//! `settle` processes messages until nothing is outstanding, and `tick`
//! steps one message at a time when a test needs to act mid-flight.

use async_trait::async_trait;
use kodo::cache::CacheSnapshot;
use kodo::models::{EntityKind, RecommendationStatus, Row, Severity, ThreatStatus};
use kodo::selection::{SelectionContext, SelectionFile, SelectionState};
use kodo::store::{
    FeedSender, Filter, MemoryStore, Mutation, Query, RemoteStore, StoreError, StoreResult,
    SubscriptionHandle,
};
use kodo::sync::{ActionError, SubscriptionManager, SyncEvent, SyncPhase, SyncSettings};
use kodo::views::{IncidentFilter, incident_feed};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};

struct Harness {
    manager: SubscriptionManager,
    events: mpsc::UnboundedReceiver<SyncEvent>,
    selection: SelectionContext,
}

impl Harness {
    fn new(store: Arc<dyn RemoteStore>, settings: SyncSettings) -> Self {
        Self::with_selection(store, settings, SelectionContext::new(None))
    }

    fn with_selection(
        store: Arc<dyn RemoteStore>,
        settings: SyncSettings,
        selection: SelectionContext,
    ) -> Self {
        let (manager, events) =
            SubscriptionManager::new(store, Default::default(), selection.clone(), settings);
        Self {
            manager,
            events,
            selection,
        }
    }

    fn drain(&mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    fn snapshot(&self) -> CacheSnapshot {
        self.manager.cache().snapshot()
    }

    fn incident_ids(&self) -> Vec<String> {
        self.snapshot().incidents.into_iter().map(|i| i.id).collect()
    }

    /// Tick until `wanted` is emitted
    async fn until_event(&mut self, wanted: SyncEvent) {
        let wait = async {
            loop {
                while let Ok(event) = self.events.try_recv() {
                    if event == wanted {
                        return;
                    }
                }
                self.manager.tick().await;
            }
        };
        tokio::time::timeout(Duration::from_secs(60), wait)
            .await
            .expect("event never arrived");
    }

    /// Tick until `done` holds
    async fn tick_until(&mut self, done: impl Fn(&Self) -> bool) {
        let wait = async {
            while !done(&*self) {
                self.manager.tick().await;
            }
        };
        tokio::time::timeout(Duration::from_secs(60), wait)
            .await
            .expect("condition never held");
    }
}

fn harness(store: &MemoryStore) -> Harness {
    Harness::new(Arc::new(store.clone()), SyncSettings::default())
}

/// u1 owns alpha (a) and beta (b); u2 owns zeta
fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    for (id, user, name) in [("a", "u1", "alpha"), ("b", "u1", "beta"), ("z", "u2", "zeta")] {
        store.insert(
            "clusters",
            json!({ "id": id, "user_id": user, "name": name, "status": "healthy" }),
        );
    }
    for (id, cluster, severity) in [
        ("i1", "a", "critical"),
        ("i2", "a", "high"),
        ("i3", "a", "low"),
        ("i4", "b", "medium"),
    ] {
        store.insert(
            "incidents",
            json!({ "id": id, "cluster_id": cluster, "severity": severity, "title": id }),
        );
    }
    store.insert(
        "notifications",
        json!({ "id": "n1", "user_id": "u1", "title": "Welcome", "type": "info" }),
    );
    store.insert(
        "notifications",
        json!({ "id": "n2", "user_id": "u2", "title": "Not yours", "type": "info" }),
    );
    store
}

fn critical_incidents(h: &Harness, cluster: &str) -> usize {
    incident_feed(
        &h.snapshot(),
        &IncidentFilter::for_cluster(cluster).with_severity(Some(Severity::Critical)),
    )
    .len()
}

#[tokio::test]
async fn test_sign_in_loads_user_rows_and_first_cluster() {
    let store = seeded_store();
    let mut h = harness(&store);

    h.manager.start("u1").await;
    h.manager.settle().await;

    let snap = h.snapshot();
    let clusters: Vec<&str> = snap.clusters.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(clusters, vec!["a", "b"]);
    assert_eq!(snap.notifications.len(), 1);
    assert_eq!(h.selection.state(), SelectionState::Ready(Some("a".to_string())));
    assert_eq!(h.incident_ids(), vec!["i1", "i2", "i3"]);

    // Two user scopes and four cluster scopes
    assert_eq!(h.manager.subscription_count(), 6);
    assert_eq!(store.subscription_count(), 6);

    let status = h.manager.status().snapshot();
    assert_eq!(status.phase, SyncPhase::Ready);
    assert!(status.last_synced.is_some());
    assert!(h.drain().contains(&SyncEvent::SelectionChanged(Some("a".to_string()))));
}

#[tokio::test]
async fn test_switching_clusters_filters_by_selection() {
    let store = seeded_store();
    let mut h = harness(&store);
    h.manager.start("u1").await;
    h.manager.settle().await;

    assert_eq!(critical_incidents(&h, "a"), 1);

    h.selection.select("b").unwrap();
    h.manager.settle().await;

    assert_eq!(h.incident_ids(), vec!["i4"]);
    assert_eq!(critical_incidents(&h, "b"), 0);
    assert_eq!(store.subscriptions_on("incidents").len(), 1);
    assert_eq!(h.manager.subscription_count(), 6);
}

#[tokio::test]
async fn test_selecting_foreign_cluster_is_refused() {
    let store = seeded_store();
    let mut h = harness(&store);
    h.manager.start("u1").await;
    h.manager.settle().await;

    assert!(h.selection.select("z").is_err());
    assert_eq!(h.selection.selected().as_deref(), Some("a"));
}

#[tokio::test(start_paused = true)]
async fn test_result_for_abandoned_cluster_is_discarded() {
    let store = seeded_store();
    store.delay_queries(Filter::eq("cluster_id", "a"), Duration::from_secs(10));
    let mut h = harness(&store);

    h.manager.start("u1").await;
    h.until_event(SyncEvent::SelectionChanged(Some("a".to_string())))
        .await;

    // A's queries are still sleeping when B is selected
    h.selection.select("b").unwrap();
    h.manager.settle().await;

    assert_eq!(store.query_count("incidents"), 2);
    assert_eq!(h.incident_ids(), vec!["i4"]);
    assert_eq!(h.manager.status().phase(), SyncPhase::Ready);
}

/// Store whose incident queries read their rows, then wait for a permit
struct GatedStore {
    inner: MemoryStore,
    gate: Arc<Semaphore>,
    reads: mpsc::UnboundedSender<()>,
}

#[async_trait]
impl RemoteStore for GatedStore {
    async fn query(&self, query: &Query) -> StoreResult<Vec<Value>> {
        let rows = self.inner.query(query).await?;
        if query.table == "incidents" {
            let _ = self.reads.send(());
            self.gate
                .acquire()
                .await
                .map_err(|e| StoreError::Network(e.to_string()))?
                .forget();
        }
        Ok(rows)
    }

    async fn mutate(&self, table: &str, mutation: Mutation) -> StoreResult<Vec<Value>> {
        self.inner.mutate(table, mutation).await
    }

    async fn subscribe(
        &self,
        table: &str,
        filters: Vec<Filter>,
        sink: FeedSender,
    ) -> StoreResult<SubscriptionHandle> {
        self.inner.subscribe(table, filters, sink).await
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> StoreResult<()> {
        self.inner.unsubscribe(handle).await
    }
}

#[tokio::test]
async fn test_later_delivery_wins_over_newer_data() {
    let store = seeded_store();
    let gate = Arc::new(Semaphore::new(0));
    let (reads_tx, mut reads_rx) = mpsc::unbounded_channel();
    let remote = GatedStore {
        inner: store.clone(),
        gate: gate.clone(),
        reads: reads_tx,
    };
    let mut h = Harness::new(Arc::new(remote), SyncSettings::default());

    h.manager.start("u1").await;
    h.until_event(SyncEvent::SelectionChanged(Some("a".to_string())))
        .await;
    // The bulk query has read i1 as critical and is held back
    reads_rx.recv().await.unwrap();

    store.update("incidents", &[Filter::eq("id", "i1")], json!({ "severity": "low" }));
    let severity_of_i1 = |h: &Harness| match h.manager.cache().get(EntityKind::Incident, "i1") {
        Some(Row::Incident(i)) => Some(i.severity),
        _ => None,
    };
    h.tick_until(|h| severity_of_i1(h) == Some(Severity::Low)).await;

    // The older query result arrives second and overwrites the push
    gate.add_permits(1);
    h.manager.settle().await;
    assert_eq!(severity_of_i1(&h), Some(Severity::Critical));

    // A push after the query wins again
    store.update("incidents", &[Filter::eq("id", "i1")], json!({ "severity": "high" }));
    h.manager.settle().await;
    assert_eq!(severity_of_i1(&h), Some(Severity::High));
}

#[tokio::test]
async fn test_user_without_clusters_is_ready_for_onboarding() {
    let store = MemoryStore::new();
    store.insert(
        "clusters",
        json!({ "id": "z", "user_id": "u2", "name": "zeta", "status": "healthy" }),
    );
    let mut h = harness(&store);

    h.manager.start("u1").await;
    h.manager.settle().await;

    assert_eq!(h.selection.state(), SelectionState::Ready(None));
    assert!(h.selection.state().needs_onboarding());
    let status = h.manager.status().snapshot();
    assert_eq!(status.phase, SyncPhase::Ready);
    assert_eq!(status.last_error, None);
    assert_eq!(h.manager.subscription_count(), 2);

    // Connecting a first cluster selects it
    store.insert(
        "clusters",
        json!({ "id": "c1", "user_id": "u1", "name": "first", "status": "healthy" }),
    );
    h.manager.settle().await;

    assert_eq!(h.selection.selected().as_deref(), Some("c1"));
    assert_eq!(h.manager.subscription_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_cluster_push_before_owned_query_keeps_persisted_selection() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("selection.yaml");
    SelectionFile::new(path.clone()).save("b");

    let store = seeded_store();
    store.delay_queries(Filter::eq("user_id", "u1"), Duration::from_secs(10));
    let mut h = Harness::with_selection(
        Arc::new(store.clone()),
        SyncSettings::default(),
        SelectionContext::new(Some(path)),
    );

    h.manager.start("u1").await;
    // A new cluster is pushed while the owned-cluster query is still sleeping
    store.insert(
        "clusters",
        json!({ "id": "c", "user_id": "u1", "name": "aaa", "status": "healthy" }),
    );
    h.tick_until(|h| h.manager.cache().get(EntityKind::Cluster, "c").is_some())
        .await;
    assert_eq!(h.selection.state(), SelectionState::Loading);

    h.manager.settle().await;

    assert_eq!(h.selection.state(), SelectionState::Ready(Some("b".to_string())));
    let mut owned = h.selection.owned();
    owned.sort();
    assert_eq!(owned, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_push_events_follow_selected_cluster() {
    let store = seeded_store();
    let mut h = harness(&store);
    h.manager.start("u1").await;
    h.manager.settle().await;

    store.insert(
        "incidents",
        json!({ "id": "i5", "cluster_id": "a", "severity": "high", "title": "new" }),
    );
    store.insert(
        "incidents",
        json!({ "id": "i6", "cluster_id": "b", "severity": "high", "title": "elsewhere" }),
    );
    store.update(
        "incidents",
        &[Filter::eq("id", "i1")],
        json!({ "resolved_at": "2024-06-01T00:00:00Z" }),
    );
    store.delete("incidents", &[Filter::eq("id", "i3")]);
    h.manager.settle().await;

    assert_eq!(h.incident_ids(), vec!["i1", "i2", "i5"]);
    let snap = h.snapshot();
    assert!(snap.incidents.iter().any(|i| i.id == "i1" && i.is_resolved()));
}

#[tokio::test]
async fn test_cluster_push_updates_owned_list() {
    let store = seeded_store();
    let mut h = harness(&store);
    h.manager.start("u1").await;
    h.manager.settle().await;

    store.insert(
        "clusters",
        json!({ "id": "c", "user_id": "u1", "name": "gamma", "status": "warning" }),
    );
    store.insert(
        "clusters",
        json!({ "id": "y", "user_id": "u2", "name": "yotta", "status": "healthy" }),
    );
    h.manager.settle().await;

    assert_eq!(h.manager.cache().owned_cluster_ids(), vec!["a", "b", "c"]);
    assert_eq!(h.selection.owned(), vec!["a", "b", "c"]);
    assert_eq!(h.selection.selected().as_deref(), Some("a"));
}

#[tokio::test]
async fn test_deleting_selected_cluster_falls_back() {
    let store = seeded_store();
    let mut h = harness(&store);
    h.manager.start("u1").await;
    h.manager.settle().await;

    store.delete("clusters", &[Filter::eq("id", "a")]);
    h.manager.settle().await;

    assert_eq!(h.selection.selected().as_deref(), Some("b"));
    assert_eq!(h.incident_ids(), vec!["i4"]);
}

#[tokio::test]
async fn test_dropped_subscription_resubscribes_and_requeries_once() {
    let store = seeded_store();
    let mut h = harness(&store);
    h.manager.start("u1").await;
    h.manager.settle().await;

    let before = store.query_count("incidents");
    let handles = store.subscriptions_on("incidents");
    assert_eq!(handles.len(), 1);
    assert!(store.disconnect(handles[0]));

    // Missed while the feed was down
    store.insert(
        "incidents",
        json!({ "id": "i9", "cluster_id": "a", "severity": "high", "title": "missed" }),
    );
    h.manager.settle().await;

    assert_eq!(store.query_count("incidents"), before + 1);
    let reopened = store.subscriptions_on("incidents");
    assert_eq!(reopened.len(), 1);
    assert_ne!(reopened[0], handles[0]);
    assert!(h.manager.cache().get(EntityKind::Incident, "i9").is_some());
    assert_eq!(h.manager.subscription_count(), 6);
}

#[tokio::test]
async fn test_transport_drop_recovers_every_scope() {
    let store = seeded_store();
    let mut h = harness(&store);
    h.manager.start("u1").await;
    h.manager.settle().await;

    let tables: Vec<&str> = EntityKind::all().iter().map(|k| k.table()).collect();
    let before: Vec<usize> = tables.iter().map(|t| store.query_count(t)).collect();

    assert_eq!(store.disconnect_all(), 6);
    h.manager.settle().await;

    for (table, count) in tables.iter().zip(before) {
        assert_eq!(store.query_count(table), count + 1, "requeries of {}", table);
    }
    assert_eq!(store.subscription_count(), 6);
    assert_eq!(h.manager.status().phase(), SyncPhase::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_retries_and_keeps_rows() {
    let store = seeded_store();
    let mut h = harness(&store);
    h.manager.start("u1").await;
    h.manager.settle().await;

    let before = store.query_count("incidents");
    store.fail_next_query("incidents", StoreError::Network("connection reset".to_string()));
    store.fail_next_query("incidents", StoreError::Timeout);
    h.manager.refresh();

    h.tick_until(|h| h.manager.status().snapshot().retries >= 1)
        .await;
    let status = h.manager.status().snapshot();
    assert_eq!(status.phase, SyncPhase::Stale);
    assert!(status.last_error.unwrap().contains("connection reset"));
    assert_eq!(h.manager.cache().len(EntityKind::Incident), 3);

    h.manager.settle().await;
    let status = h.manager.status().snapshot();
    assert_eq!(status.phase, SyncPhase::Ready);
    assert_eq!(status.retries, 0);
    assert_eq!(status.last_error, None);
    assert_eq!(store.query_count("incidents"), before + 3);
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_bounded() {
    let store = seeded_store();
    let mut settings = SyncSettings::default();
    settings.retry.max_retries = 2;
    let mut h = Harness::new(Arc::new(store.clone()), settings);
    for _ in 0..5 {
        store.fail_next_query("notifications", StoreError::Timeout);
    }

    h.manager.start("u1").await;
    h.manager.settle().await;

    // First attempt plus two retries
    assert_eq!(store.query_count("notifications"), 3);
    assert_eq!(h.manager.status().phase(), SyncPhase::Stale);
    assert!(
        h.drain()
            .iter()
            .any(|e| matches!(e, SyncEvent::Error(msg) if msg.contains("Notification")))
    );
    // The rest of the dashboard still loaded
    assert_eq!(h.incident_ids(), vec!["i1", "i2", "i3"]);
}

#[tokio::test]
async fn test_unauthorized_query_tears_down_without_retry() {
    let store = seeded_store();
    let mut h = harness(&store);
    h.manager.start("u1").await;
    h.manager.settle().await;
    h.drain();

    let before = store.query_count("incidents");
    store.fail_next_query("incidents", StoreError::Unauthorized("JWT expired".to_string()));
    h.manager.refresh();
    h.manager.settle().await;

    assert!(h.drain().contains(&SyncEvent::SessionExpired));
    assert_eq!(store.query_count("incidents"), before + 1);
    assert_eq!(h.snapshot(), CacheSnapshot::default());
    assert_eq!(h.selection.state(), SelectionState::Uninitialized);
    assert_eq!(h.manager.subscription_count(), 0);
    assert_eq!(store.subscription_count(), 0);
    assert_eq!(h.manager.status().phase(), SyncPhase::Idle);
}

#[tokio::test]
async fn test_unauthorized_subscribe_stops_sign_in() {
    let store = seeded_store();
    store.fail_next_subscribe(StoreError::Status {
        status: 401,
        message: "invalid token".to_string(),
    });
    let mut h = harness(&store);

    h.manager.start("u1").await;
    h.manager.settle().await;

    assert!(h.drain().contains(&SyncEvent::SessionExpired));
    assert_eq!(store.query_count("clusters"), 0);
    assert_eq!(h.selection.state(), SelectionState::Uninitialized);
    assert_eq!(store.subscription_count(), 0);
}

#[tokio::test]
async fn test_stop_clears_everything() {
    let store = seeded_store();
    let mut h = harness(&store);
    h.manager.start("u1").await;
    h.manager.settle().await;

    h.manager.stop().await;

    assert_eq!(h.snapshot(), CacheSnapshot::default());
    assert_eq!(h.selection.state(), SelectionState::Uninitialized);
    assert_eq!(store.subscription_count(), 0);
    assert_eq!(h.manager.status().phase(), SyncPhase::Idle);
}

#[tokio::test]
async fn test_restart_as_other_user_replaces_tenant() {
    let store = seeded_store();
    let mut h = harness(&store);
    h.manager.start("u1").await;
    h.manager.settle().await;

    h.manager.start("u2").await;
    h.manager.settle().await;

    let snap = h.snapshot();
    assert_eq!(snap.clusters.len(), 1);
    assert_eq!(snap.clusters[0].id, "z");
    assert_eq!(snap.notifications.len(), 1);
    assert_eq!(snap.notifications[0].id, "n2");
    assert!(snap.incidents.is_empty());
    assert_eq!(h.selection.selected().as_deref(), Some("z"));
}

#[tokio::test]
async fn test_status_actions_write_through_to_cache() {
    let store = seeded_store();
    store.insert(
        "storage_recommendations",
        json!({
            "id": "r1", "cluster_id": "a", "pvc_name": "data",
            "recommendation_type": "downsize", "potential_savings": 12.0, "status": "pending"
        }),
    );
    let mut h = harness(&store);
    h.manager.start("u1").await;
    h.manager.settle().await;
    let handle = h.manager.handle();

    let updated = handle
        .set_recommendation_status("r1", RecommendationStatus::Accepted)
        .await
        .unwrap();
    assert_eq!(updated.status, RecommendationStatus::Accepted);
    h.manager.settle().await;

    match h.manager.cache().get(EntityKind::StorageRecommendation, "r1") {
        Some(Row::StorageRecommendation(r)) => assert_eq!(r.status, RecommendationStatus::Accepted),
        other => panic!("unexpected row: {:?}", other),
    }
    assert_eq!(store.rows("storage_recommendations")[0]["status"], "accepted");

    let err = handle
        .set_recommendation_status("r1", RecommendationStatus::Rejected)
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Transition(_)));

    let err = handle
        .set_threat_status("missing", ThreatStatus::Mitigated)
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::NotFound { .. }));
}

#[tokio::test]
async fn test_read_only_refuses_actions() {
    let store = seeded_store();
    store.insert(
        "security_threats",
        json!({
            "id": "t1", "cluster_id": "a", "threat_type": "privileged_container",
            "severity": "high", "title": "root pod", "status": "active"
        }),
    );
    let settings = SyncSettings {
        read_only: true,
        ..SyncSettings::default()
    };
    let mut h = Harness::new(Arc::new(store.clone()), settings);
    h.manager.start("u1").await;
    h.manager.settle().await;

    let err = h
        .manager
        .handle()
        .set_threat_status("t1", ThreatStatus::Investigating)
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::ReadOnly));
    assert_eq!(store.mutation_count("security_threats"), 0);
}

//! Entity cache
//!
//! Per-entity-type map of primary key to the latest row seen, shared between
//! the subscription manager (the only writer) and the views. Writes are last
//! arrival wins; there is no versioning.
//!
//! The cache also enforces tenancy: cluster rows and notifications must belong
//! to the session user, and cluster-scoped rows must point at a cached
//! cluster. Rows that fail the check are dropped on arrival.

use crate::models::{
    Anomaly, ChangeEvent, Cluster, EntityKind, Incident, Notification, Row, SecurityThreat,
    StorageRecommendation,
};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct CacheInner {
    tables: HashMap<EntityKind, HashMap<String, Row>>,
    owner: Option<String>,
}

impl CacheInner {
    fn table(&self, kind: EntityKind) -> Option<&HashMap<String, Row>> {
        self.tables.get(&kind)
    }

    fn owns_cluster(&self, cluster_id: &str) -> bool {
        self.table(EntityKind::Cluster)
            .is_some_and(|t| t.contains_key(cluster_id))
    }

    fn admits(&self, row: &Row) -> bool {
        let owner_matches = |user_id: &str| self.owner.as_deref().is_none_or(|o| o == user_id);
        match row {
            Row::Cluster(c) => owner_matches(&c.user_id),
            Row::Notification(n) => owner_matches(&n.user_id),
            other => other.cluster_id().is_some_and(|id| self.owns_cluster(id)),
        }
    }

    fn upsert(&mut self, row: Row) -> bool {
        if !self.admits(&row) {
            // A cluster handed to another user stops being ours
            if let Row::Cluster(c) = &row {
                self.remove(EntityKind::Cluster, &c.id);
            }
            tracing::debug!("Dropping {} row {} outside tenant scope", row.kind(), row.id());
            return false;
        }
        self.tables
            .entry(row.kind())
            .or_default()
            .insert(row.id().to_string(), row);
        true
    }

    fn remove(&mut self, kind: EntityKind, id: &str) -> Option<Row> {
        let removed = self.tables.get_mut(&kind)?.remove(id)?;
        if kind == EntityKind::Cluster {
            self.evict_dependents(|cluster_id| cluster_id == id);
        }
        Some(removed)
    }

    /// Drop cluster-scoped rows whose cluster matches `pred`
    fn evict_dependents(&mut self, pred: impl Fn(&str) -> bool) {
        for &kind in EntityKind::cluster_scoped() {
            if let Some(table) = self.tables.get_mut(&kind) {
                table.retain(|_, row| !row.cluster_id().is_some_and(&pred));
            }
        }
    }
}

/// Typed copy of every cached table at one point in time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheSnapshot {
    /// Sorted by name
    pub clusters: Vec<Cluster>,
    pub incidents: Vec<Incident>,
    pub anomalies: Vec<Anomaly>,
    pub recommendations: Vec<StorageRecommendation>,
    pub threats: Vec<SecurityThreat>,
    pub notifications: Vec<Notification>,
}

impl CacheSnapshot {
    pub fn cluster(&self, id: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.id == id)
    }

    pub fn cluster_name(&self, id: &str) -> Option<&str> {
        self.cluster(id).map(|c| c.name.as_str())
    }
}

/// Thread-safe entity cache
#[derive(Clone, Default)]
pub struct EntityCache {
    inner: Arc<RwLock<CacheInner>>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Restrict the cache to rows owned by `user_id`, purging anything else
    pub fn set_owner(&self, user_id: Option<String>) {
        let mut inner = self.write();
        inner.owner = user_id;

        let rejected: Vec<(EntityKind, String)> = inner
            .tables
            .values()
            .flat_map(HashMap::values)
            .filter(|row| !inner.admits(row))
            .map(|row| (row.kind(), row.id().to_string()))
            .collect();
        for (kind, id) in rejected {
            inner.remove(kind, &id);
        }
    }

    pub fn owner(&self) -> Option<String> {
        self.read().owner.clone()
    }

    pub fn get(&self, kind: EntityKind, id: &str) -> Option<Row> {
        self.read().table(kind).and_then(|t| t.get(id)).cloned()
    }

    /// Insert or replace a row; returns false when the tenant filter rejects it
    pub fn upsert(&self, row: Row) -> bool {
        self.write().upsert(row)
    }

    /// Remove a row; removing a cluster also evicts its dependent rows
    pub fn remove(&self, kind: EntityKind, id: &str) -> Option<Row> {
        self.write().remove(kind, id)
    }

    pub fn list(&self, kind: EntityKind) -> Vec<Row> {
        self.read()
            .table(kind)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        self.read().table(kind).map_or(0, HashMap::len)
    }

    /// Apply a push event; returns whether the cache changed
    pub fn apply(&self, event: ChangeEvent) -> bool {
        let mut inner = self.write();
        match event {
            ChangeEvent::Insert(row) | ChangeEvent::Update(row) => inner.upsert(row),
            ChangeEvent::Delete { kind, id } => inner.remove(kind, &id).is_some(),
        }
    }

    /// Land a bulk query result as the new contents of one scope
    ///
    /// With `cluster_id` set only rows of that cluster are replaced, otherwise
    /// the whole table. Rows of the scope missing from `rows` are evicted.
    /// Returns the number of rows accepted.
    pub fn replace_scope(&self, kind: EntityKind, cluster_id: Option<&str>, rows: Vec<Row>) -> usize {
        let mut inner = self.write();

        let incoming: std::collections::HashSet<&str> = rows.iter().map(Row::id).collect();
        let stale: Vec<String> = inner
            .table(kind)
            .map(|t| {
                t.values()
                    .filter(|row| cluster_id.is_none() || row.cluster_id() == cluster_id)
                    .filter(|row| !incoming.contains(row.id()))
                    .map(|row| row.id().to_string())
                    .collect()
            })
            .unwrap_or_default();
        for id in stale {
            inner.remove(kind, &id);
        }

        rows.into_iter()
            .filter(|row| row.kind() == kind)
            .map(|row| inner.upsert(row))
            .filter(|accepted| *accepted)
            .count()
    }

    /// Drop cluster-scoped rows of every cluster except `keep`
    pub fn retain_cluster_scope(&self, keep: Option<&str>) {
        self.write()
            .evict_dependents(|cluster_id| Some(cluster_id) != keep);
    }

    /// Ids of cached clusters, sorted by cluster name
    pub fn owned_cluster_ids(&self) -> Vec<String> {
        self.clusters().into_iter().map(|c| c.id).collect()
    }

    pub fn clusters(&self) -> Vec<Cluster> {
        let mut clusters: Vec<Cluster> = self
            .list(EntityKind::Cluster)
            .into_iter()
            .filter_map(|row| match row {
                Row::Cluster(c) => Some(c),
                _ => None,
            })
            .collect();
        clusters.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        clusters
    }

    /// Copy every table out under a single read lock
    pub fn snapshot(&self) -> CacheSnapshot {
        let inner = self.read();
        let mut snap = CacheSnapshot::default();
        for row in inner.tables.values().flat_map(HashMap::values) {
            match row.clone() {
                Row::Cluster(r) => snap.clusters.push(r),
                Row::Incident(r) => snap.incidents.push(r),
                Row::Anomaly(r) => snap.anomalies.push(r),
                Row::StorageRecommendation(r) => snap.recommendations.push(r),
                Row::SecurityThreat(r) => snap.threats.push(r),
                Row::Notification(r) => snap.notifications.push(r),
            }
        }
        drop(inner);

        snap.clusters
            .sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        snap.incidents.sort_by(|a, b| a.id.cmp(&b.id));
        snap.anomalies.sort_by(|a, b| a.id.cmp(&b.id));
        snap.recommendations.sort_by(|a, b| a.id.cmp(&b.id));
        snap.threats.sort_by(|a, b| a.id.cmp(&b.id));
        snap.notifications.sort_by(|a, b| a.id.cmp(&b.id));
        snap
    }

    /// Drop every row and the owner (sign-out)
    pub fn clear(&self) {
        let mut inner = self.write();
        inner.tables.clear();
        inner.owner = None;
    }
}

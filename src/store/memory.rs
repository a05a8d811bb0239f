//! In-process store
//!
//! Keeps tables as JSON rows in memory and fans every mutation out to the
//! matching subscriptions synchronously. Failures and transport drops can be
//! injected, which is what the sync tests and `--demo` mode rely on.

use super::{
    ChangeType, FeedMessage, FeedSender, Filter, Mutation, Query, RawChange, RemoteStore,
    StoreError, StoreResult, SubscriptionHandle, compare_values, value_to_string,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

struct Subscription {
    table: String,
    filters: Vec<Filter>,
    sink: FeedSender,
}

#[derive(Default)]
struct Inner {
    tables: HashMap<String, Vec<Value>>,
    subscriptions: HashMap<u64, Subscription>,
    next_handle: u64,
    next_id: u64,
    query_failures: HashMap<String, VecDeque<StoreError>>,
    mutation_failures: HashMap<String, VecDeque<StoreError>>,
    subscribe_failures: VecDeque<StoreError>,
    query_delays: Vec<(Filter, Duration)>,
    query_counts: HashMap<String, usize>,
    mutation_counts: HashMap<String, usize>,
}

impl Inner {
    fn publish(&mut self, change: RawChange) {
        let row = match change.change_type {
            ChangeType::Delete => change.old_row.as_ref(),
            _ => change.new_row.as_ref(),
        };
        let Some(row) = row else { return };

        let mut closed = Vec::new();
        for (handle, sub) in &self.subscriptions {
            if sub.table != change.table || !sub.filters.iter().all(|f| f.matches(row)) {
                continue;
            }
            let message = FeedMessage::Change {
                handle: SubscriptionHandle(*handle),
                change: change.clone(),
            };
            if sub.sink.send(message).is_err() {
                closed.push(*handle);
            }
        }
        for handle in closed {
            self.subscriptions.remove(&handle);
        }
    }

    fn insert(&mut self, table: &str, mut row: Value) -> Value {
        if let Value::Object(map) = &mut row {
            if !map.contains_key("id") {
                self.next_id += 1;
                map.insert(
                    "id".to_string(),
                    Value::String(format!("{}-{}", table, self.next_id)),
                );
            }
        }
        self.tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        self.publish(RawChange {
            change_type: ChangeType::Insert,
            table: table.to_string(),
            new_row: Some(row.clone()),
            old_row: None,
        });
        row
    }

    fn update(&mut self, table: &str, filters: &[Filter], patch: &Value) -> Vec<Value> {
        let mut changes = Vec::new();
        if let Some(rows) = self.tables.get_mut(table) {
            for row in rows.iter_mut() {
                if !filters.iter().all(|f| f.matches(row)) {
                    continue;
                }
                let old = row.clone();
                merge(row, patch);
                changes.push((old, row.clone()));
            }
        }

        let mut updated = Vec::with_capacity(changes.len());
        for (old, new) in changes {
            self.publish(RawChange {
                change_type: ChangeType::Update,
                table: table.to_string(),
                new_row: Some(new.clone()),
                old_row: Some(old),
            });
            updated.push(new);
        }
        updated
    }

    fn delete(&mut self, table: &str, filters: &[Filter]) -> Vec<Value> {
        let Some(rows) = self.tables.get_mut(table) else {
            return Vec::new();
        };
        let (removed, kept): (Vec<Value>, Vec<Value>) = std::mem::take(rows)
            .into_iter()
            .partition(|row| filters.iter().all(|f| f.matches(row)));
        *rows = kept;

        for old in &removed {
            self.publish(RawChange {
                change_type: ChangeType::Delete,
                table: table.to_string(),
                new_row: None,
                old_row: Some(old.clone()),
            });
        }
        removed
    }
}

/// Store that keeps every table in process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a row, assigning an id if it has none, and notify subscribers
    pub fn insert(&self, table: &str, row: Value) -> Value {
        self.lock().insert(table, row)
    }

    /// Merge `patch` into every matching row and notify subscribers
    pub fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Vec<Value> {
        self.lock().update(table, filters, &patch)
    }

    /// Remove every matching row and notify subscribers
    pub fn delete(&self, table: &str, filters: &[Filter]) -> Vec<Value> {
        self.lock().delete(table, filters)
    }

    /// All rows of a table in insertion order
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// Fail the next query against `table` with `error`
    pub fn fail_next_query(&self, table: &str, error: StoreError) {
        self.lock()
            .query_failures
            .entry(table.to_string())
            .or_default()
            .push_back(error);
    }

    /// Fail the next mutation against `table` with `error`
    pub fn fail_next_mutation(&self, table: &str, error: StoreError) {
        self.lock()
            .mutation_failures
            .entry(table.to_string())
            .or_default()
            .push_back(error);
    }

    /// Fail the next subscribe call with `error`
    pub fn fail_next_subscribe(&self, error: StoreError) {
        self.lock().subscribe_failures.push_back(error);
    }

    /// Delay queries carrying `filter` before they read the table
    pub fn delay_queries(&self, filter: Filter, delay: Duration) {
        self.lock().query_delays.push((filter, delay));
    }

    /// Simulate a transport drop on one subscription
    pub fn disconnect(&self, handle: SubscriptionHandle) -> bool {
        let Some(sub) = self.lock().subscriptions.remove(&handle.0) else {
            return false;
        };
        let _ = sub.sink.send(FeedMessage::Closed {
            handle,
            reason: "transport closed".to_string(),
        });
        true
    }

    /// Simulate a transport drop on every subscription
    pub fn disconnect_all(&self) -> usize {
        let subs: Vec<(u64, Subscription)> = self.lock().subscriptions.drain().collect();
        for (handle, sub) in &subs {
            let _ = sub.sink.send(FeedMessage::Closed {
                handle: SubscriptionHandle(*handle),
                reason: "transport closed".to_string(),
            });
        }
        subs.len()
    }

    /// Open subscription handles on `table`
    pub fn subscriptions_on(&self, table: &str) -> Vec<SubscriptionHandle> {
        let mut handles: Vec<SubscriptionHandle> = self
            .lock()
            .subscriptions
            .iter()
            .filter(|(_, sub)| sub.table == table)
            .map(|(h, _)| SubscriptionHandle(*h))
            .collect();
        handles.sort_by_key(|h| h.0);
        handles
    }

    pub fn subscription_count(&self) -> usize {
        self.lock().subscriptions.len()
    }

    /// Number of queries served for `table`, failed ones included
    pub fn query_count(&self, table: &str) -> usize {
        self.lock().query_counts.get(table).copied().unwrap_or(0)
    }

    /// Number of mutations attempted against `table`, failed ones included
    pub fn mutation_count(&self, table: &str) -> usize {
        self.lock().mutation_counts.get(table).copied().unwrap_or(0)
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn query(&self, query: &Query) -> StoreResult<Vec<Value>> {
        let delay = {
            let mut inner = self.lock();
            *inner.query_counts.entry(query.table.clone()).or_insert(0) += 1;
            if let Some(err) = inner
                .query_failures
                .get_mut(&query.table)
                .and_then(VecDeque::pop_front)
            {
                return Err(err);
            }
            inner
                .query_delays
                .iter()
                .filter(|(f, _)| query.filters.contains(f))
                .map(|(_, d)| *d)
                .max()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let inner = self.lock();
        let mut rows: Vec<Value> = inner
            .tables
            .get(&query.table)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let a = a.get(&order.column).map(value_to_string).unwrap_or_default();
                let b = b.get(&order.column).map(value_to_string).unwrap_or_default();
                let ord = compare_values(&a, &b);
                if order.descending { ord.reverse() } else { ord }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        if let Some(columns) = query.columns.as_deref().filter(|c| *c != "*") {
            let wanted: Vec<&str> = columns.split(',').map(str::trim).collect();
            rows = rows.into_iter().map(|row| project(row, &wanted)).collect();
        }
        Ok(rows)
    }

    async fn mutate(&self, table: &str, mutation: Mutation) -> StoreResult<Vec<Value>> {
        let mut inner = self.lock();
        *inner.mutation_counts.entry(table.to_string()).or_insert(0) += 1;
        if let Some(err) = inner
            .mutation_failures
            .get_mut(table)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }

        let rows = match mutation {
            Mutation::Insert(Value::Array(rows)) => {
                rows.into_iter().map(|r| inner.insert(table, r)).collect()
            }
            Mutation::Insert(row) => vec![inner.insert(table, row)],
            Mutation::Update { filters, patch } => inner.update(table, &filters, &patch),
            Mutation::Delete { filters } => inner.delete(table, &filters),
        };
        Ok(rows)
    }

    async fn subscribe(
        &self,
        table: &str,
        filters: Vec<Filter>,
        sink: FeedSender,
    ) -> StoreResult<SubscriptionHandle> {
        let mut inner = self.lock();
        if let Some(err) = inner.subscribe_failures.pop_front() {
            return Err(err);
        }
        inner.next_handle += 1;
        let handle = inner.next_handle;
        inner.subscriptions.insert(
            handle,
            Subscription {
                table: table.to_string(),
                filters,
                sink,
            },
        );
        Ok(SubscriptionHandle(handle))
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> StoreResult<()> {
        self.lock()
            .subscriptions
            .remove(&handle.0)
            .map(|_| ())
            .ok_or(StoreError::UnknownSubscription(handle.0))
    }
}

fn merge(row: &mut Value, patch: &Value) {
    match (row, patch) {
        (Value::Object(target), Value::Object(fields)) => {
            for (k, v) in fields {
                target.insert(k.clone(), v.clone());
            }
        }
        (row, patch) => *row = patch.clone(),
    }
}

fn project(row: Value, columns: &[&str]) -> Value {
    match row {
        Value::Object(map) => {
            let projected: Map<String, Value> = map
                .into_iter()
                .filter(|(k, _)| columns.contains(&k.as_str()))
                .collect();
            Value::Object(projected)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_subscription_receives_matching_changes_only() {
        let store = MemoryStore::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = store
            .subscribe("incidents", vec![Filter::eq("cluster_id", "a")], tx)
            .await
            .unwrap();

        store.insert("incidents", json!({ "id": "i1", "cluster_id": "b" }));
        store.insert("incidents", json!({ "id": "i2", "cluster_id": "a" }));

        match rx.try_recv().unwrap() {
            FeedMessage::Change { handle: h, change } => {
                assert_eq!(h, handle);
                assert_eq!(change.change_type, ChangeType::Insert);
                assert_eq!(change.new_row.unwrap()["id"], "i2");
            }
            other => panic!("unexpected message: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_query_order_limit_and_projection() {
        let store = MemoryStore::new();
        for (id, ts) in [("a", "2024-01-01"), ("b", "2024-03-01"), ("c", "2024-02-01")] {
            store.insert("incidents", json!({ "id": id, "created_at": ts, "x": 1 }));
        }

        let rows = store
            .query(
                &Query::table("incidents")
                    .select("id")
                    .order_desc("created_at")
                    .limit(2),
            )
            .await
            .unwrap();
        assert_eq!(rows, vec![json!({ "id": "b" }), json!({ "id": "c" })]);
    }

    #[tokio::test]
    async fn test_update_merges_patch_and_publishes_old_row() {
        let store = MemoryStore::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        store.insert("notifications", json!({ "id": "n1", "message": "start" }));
        store.subscribe("notifications", vec![], tx).await.unwrap();

        let updated = store
            .mutate(
                "notifications",
                Mutation::Update {
                    filters: vec![Filter::eq("id", "n1")],
                    patch: json!({ "message": "done" }),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated[0]["message"], "done");

        let FeedMessage::Change { change, .. } = rx.try_recv().unwrap() else {
            panic!("expected change");
        };
        assert_eq!(change.old_row.unwrap()["message"], "start");
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed_once() {
        let store = MemoryStore::new();
        store.fail_next_query("clusters", StoreError::Timeout);

        let q = Query::table("clusters");
        assert!(matches!(store.query(&q).await, Err(StoreError::Timeout)));
        assert!(store.query(&q).await.unwrap().is_empty());
        assert_eq!(store.query_count("clusters"), 2);
    }

    #[tokio::test]
    async fn test_disconnect_sends_closed() {
        let store = MemoryStore::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = store.subscribe("clusters", vec![], tx).await.unwrap();

        assert!(store.disconnect(handle));
        assert_eq!(store.subscription_count(), 0);
        assert!(matches!(rx.try_recv().unwrap(), FeedMessage::Closed { .. }));
        assert!(store.unsubscribe(handle).await.is_err());
    }

    #[test]
    fn test_insert_assigns_id() {
        let store = MemoryStore::new();
        let row = store.insert("notifications", json!({ "message": "hi" }));
        assert_eq!(row["id"], "notifications-1");
    }
}

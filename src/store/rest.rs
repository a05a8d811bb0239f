//! HTTP row API store
//!
//! Talks to a PostgREST-compatible endpoint (`/rest/v1/<table>`). Push
//! subscriptions are served by a polling change feed: a background task
//! re-lists the subscribed scope on an interval and diffs it against the
//! previous listing to produce insert/update/delete events.

use super::{
    ChangeType, FeedMessage, FeedSender, Filter, Mutation, Query, RawChange, RemoteStore,
    StoreError, StoreResult, SubscriptionHandle, value_to_string,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use url::Url;

/// Consecutive poll failures after which a feed reports itself closed
const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Connection details shared by queries and feed tasks
#[derive(Clone)]
struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    access_token: Option<String>,
}

impl RestClient {
    fn table_url(&self, table: &str) -> StoreResult<Url> {
        self.base_url
            .join(&format!("rest/v1/{}", table))
            .map_err(|e| StoreError::Network(format!("invalid table url: {}", e)))
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let token = self.access_token.as_deref().unwrap_or(&self.api_key);
        req.header("apikey", &self.api_key).bearer_auth(token)
    }

    async fn fetch(&self, query: &Query) -> StoreResult<Vec<Value>> {
        let mut url = self.table_url(&query.table)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", query.columns.as_deref().unwrap_or("*"));
            for filter in &query.filters {
                let (k, v) = filter.to_query_pair();
                pairs.append_pair(&k, &v);
            }
            if let Some(order) = &query.order {
                let dir = if order.descending { "desc" } else { "asc" };
                pairs.append_pair("order", &format!("{}.{}", order.column, dir));
            }
            if let Some(limit) = query.limit {
                pairs.append_pair("limit", &limit.to_string());
            }
        }

        let resp = self
            .authorize(self.http.get(url))
            .send()
            .await
            .map_err(map_transport_error)?;
        read_rows(resp).await
    }

    async fn mutate(&self, table: &str, mutation: Mutation) -> StoreResult<Vec<Value>> {
        let mut url = self.table_url(table)?;
        let filters = match &mutation {
            Mutation::Insert(_) => &[][..],
            Mutation::Update { filters, .. } | Mutation::Delete { filters } => &filters[..],
        };
        if !filters.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for filter in filters {
                let (k, v) = filter.to_query_pair();
                pairs.append_pair(&k, &v);
            }
        }

        let req = match &mutation {
            Mutation::Insert(body) => self.http.post(url).json(body),
            Mutation::Update { patch, .. } => self.http.patch(url).json(patch),
            Mutation::Delete { .. } => self.http.delete(url),
        };

        let resp = self
            .authorize(req)
            .header("Prefer", "return=representation")
            .send()
            .await
            .map_err(map_transport_error)?;
        read_rows(resp).await
    }
}

/// Store backed by the HTTP row API
pub struct RestStore {
    client: RestClient,
    poll_interval: Duration,
    next_handle: AtomicU64,
    /// Running feed tasks; a task removes its own entry when it stops
    feeds: Arc<Mutex<HashMap<u64, JoinHandle<()>>>>,
}

impl RestStore {
    /// Create a store for the given project URL and public API key
    pub fn new(base_url: &str, api_key: &str, request_timeout: Duration) -> anyhow::Result<Self> {
        use anyhow::Context;

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to create HTTP client")?;
        let mut base_url = Url::parse(base_url).context("Invalid backend URL")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        tracing::debug!("Created REST store for: {}", base_url);

        Ok(Self {
            client: RestClient {
                http,
                base_url,
                api_key: api_key.to_string(),
                access_token: None,
            },
            poll_interval: Duration::from_secs(2),
            next_handle: AtomicU64::new(1),
            feeds: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Authenticate requests with a user access token
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.client.access_token = Some(token.into());
        self
    }

    /// Interval between change-feed polls
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn query(&self, query: &Query) -> StoreResult<Vec<Value>> {
        tracing::debug!("Querying {} ({} filters)", query.table, query.filters.len());
        self.client.fetch(query).await
    }

    async fn mutate(&self, table: &str, mutation: Mutation) -> StoreResult<Vec<Value>> {
        tracing::debug!("Mutating {} ({})", table, mutation.op_name());
        self.client.mutate(table, mutation).await
    }

    async fn subscribe(
        &self,
        table: &str,
        filters: Vec<Filter>,
        sink: FeedSender,
    ) -> StoreResult<SubscriptionHandle> {
        let handle = SubscriptionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let mut query = Query::table(table);
        query.filters = filters;

        // Held across spawn so a feed that stops at once cannot remove
        // itself before it is registered
        let mut feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
        let registry = self.feeds.clone();
        let client = self.client.clone();
        let interval = self.poll_interval;
        let task = tokio::spawn(async move {
            poll_feed(client, query, handle, sink, interval).await;
            registry
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&handle.0);
        });
        feeds.insert(handle.0, task);
        drop(feeds);
        tracing::debug!("Opened change feed {} on {}", handle, table);
        Ok(handle)
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> StoreResult<()> {
        let task = self
            .feeds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&handle.0)
            .ok_or(StoreError::UnknownSubscription(handle.0))?;
        task.abort();
        tracing::debug!("Closed change feed {}", handle);
        Ok(())
    }
}

impl Drop for RestStore {
    fn drop(&mut self) {
        let mut feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
        for (_, task) in feeds.drain() {
            task.abort();
        }
    }
}

/// Poll a scope and turn listing differences into change events
async fn poll_feed(
    client: RestClient,
    query: Query,
    handle: SubscriptionHandle,
    sink: FeedSender,
    interval: Duration,
) {
    let mut known: HashMap<String, Value> = HashMap::new();
    let mut primed = false;
    let mut error_count = 0u32;
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;
        if sink.is_closed() {
            break;
        }

        match client.fetch(&query).await {
            Ok(rows) => {
                error_count = 0;
                let current: HashMap<String, Value> = rows
                    .into_iter()
                    .filter_map(|row| {
                        let id = row.get("id").map(value_to_string)?;
                        Some((id, row))
                    })
                    .collect();

                // The first listing only establishes the baseline
                if primed {
                    for change in diff_listing(&query.table, &known, &current) {
                        let _ = sink.send(FeedMessage::Change { handle, change });
                    }
                }
                known = current;
                primed = true;
            }
            Err(e) if e.is_auth() => {
                let _ = sink.send(FeedMessage::Closed {
                    handle,
                    reason: e.to_string(),
                });
                break;
            }
            Err(e) => {
                error_count += 1;
                tracing::warn!(
                    "Change feed {} on {} failed ({}): {}",
                    handle,
                    query.table,
                    error_count,
                    e
                );
                if error_count >= MAX_CONSECUTIVE_ERRORS {
                    let _ = sink.send(FeedMessage::Closed {
                        handle,
                        reason: format!(
                            "change feed stopped after {} consecutive errors: {}",
                            error_count, e
                        ),
                    });
                    break;
                }
            }
        }
    }
}

/// Compute the change events that turn `before` into `after`
fn diff_listing(
    table: &str,
    before: &HashMap<String, Value>,
    after: &HashMap<String, Value>,
) -> Vec<RawChange> {
    let mut changes = Vec::new();

    for (id, row) in after {
        match before.get(id) {
            None => changes.push(RawChange {
                change_type: ChangeType::Insert,
                table: table.to_string(),
                new_row: Some(row.clone()),
                old_row: None,
            }),
            Some(old) if old != row => changes.push(RawChange {
                change_type: ChangeType::Update,
                table: table.to_string(),
                new_row: Some(row.clone()),
                old_row: Some(old.clone()),
            }),
            Some(_) => {}
        }
    }

    for (id, old) in before {
        if !after.contains_key(id) {
            changes.push(RawChange {
                change_type: ChangeType::Delete,
                table: table.to_string(),
                new_row: None,
                old_row: Some(old.clone()),
            });
        }
    }

    changes
}

fn map_transport_error(e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout
    } else {
        StoreError::Network(e.to_string())
    }
}

async fn read_rows(resp: reqwest::Response) -> StoreResult<Vec<Value>> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        let message = resp.text().await.unwrap_or_default();
        return Err(StoreError::Unauthorized(message));
    }
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(StoreError::Status {
            status: status.as_u16(),
            message,
        });
    }
    if status == reqwest::StatusCode::NO_CONTENT {
        return Ok(Vec::new());
    }

    let body: Value = resp.json().await.map_err(map_transport_error)?;
    match body {
        Value::Array(rows) => Ok(rows),
        Value::Null => Ok(Vec::new()),
        single => Ok(vec![single]),
    }
}

//! Remote store client
//!
//! Abstraction over the remote relational data source: bulk queries,
//! mutations and push subscriptions keyed by table and filter. The
//! `RemoteStore` trait is the seam between the synchronizer and transport;
//! `RestStore` talks to a PostgREST-style row API over HTTP and
//! `MemoryStore` keeps everything in-process.

mod memory;
mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

use crate::models::{ChangeEvent, DecodeError, EntityKind, Row};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc;

/// Errors surfaced by a remote store
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("remote store returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("unknown subscription {0}")]
    UnknownSubscription(u64),
}

impl StoreError {
    /// Failures worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Network(_) | StoreError::Timeout => true,
            StoreError::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }

    /// Failures that mean the session is no longer valid
    pub fn is_auth(&self) -> bool {
        match self {
            StoreError::Unauthorized(_) => true,
            StoreError::Status { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Row filter
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, String),
    Gt(String, String),
    In(String, Vec<String>),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Eq(column.into(), value.into())
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _) | Filter::Gt(c, _) | Filter::In(c, _) => c,
        }
    }

    /// Evaluate the filter against a JSON row
    pub fn matches(&self, row: &Value) -> bool {
        let Some(actual) = row.get(self.column()).map(value_to_string) else {
            return false;
        };
        match self {
            Filter::Eq(_, expected) => &actual == expected,
            Filter::Gt(_, bound) => compare_values(&actual, bound) == std::cmp::Ordering::Greater,
            Filter::In(_, options) => options.iter().any(|o| o == &actual),
        }
    }

    /// Render as a PostgREST query parameter
    pub fn to_query_pair(&self) -> (String, String) {
        match self {
            Filter::Eq(c, v) => (c.clone(), format!("eq.{}", v)),
            Filter::Gt(c, v) => (c.clone(), format!("gt.{}", v)),
            Filter::In(c, values) => {
                let quoted: Vec<String> = values.iter().map(|v| format!("\"{}\"", v)).collect();
                (c.clone(), format!("in.({})", quoted.join(",")))
            }
        }
    }
}

/// Sort order for a query
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

/// Bulk query description
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub columns: Option<String>,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: None,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.columns = Some(columns.into());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.order = Some(Order {
            column: column.into(),
            descending: true,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }
}

/// Write operation against a table
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Insert(Value),
    Update { filters: Vec<Filter>, patch: Value },
    Delete { filters: Vec<Filter> },
}

impl Mutation {
    pub fn op_name(&self) -> &'static str {
        match self {
            Mutation::Insert(_) => "insert",
            Mutation::Update { .. } => "update",
            Mutation::Delete { .. } => "delete",
        }
    }
}

/// Identifier of an open push subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Change type of a raw push event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

/// Push event as delivered by the transport, before validation
#[derive(Debug, Clone, PartialEq)]
pub struct RawChange {
    pub change_type: ChangeType,
    pub table: String,
    pub new_row: Option<Value>,
    pub old_row: Option<Value>,
}

impl RawChange {
    /// Validate the event against the schema of its table
    pub fn decode(self) -> Result<ChangeEvent, DecodeError> {
        let kind = EntityKind::from_table(&self.table).ok_or_else(|| DecodeError {
            kind: EntityKind::Notification,
            reason: format!("unknown table '{}'", self.table),
        })?;
        let missing = |what: &str| DecodeError {
            kind,
            reason: format!("{} event without {}", self.table, what),
        };

        match self.change_type {
            ChangeType::Insert => {
                let row = self.new_row.clone().ok_or_else(|| missing("new row"))?;
                Ok(ChangeEvent::Insert(Row::decode(kind, row)?))
            }
            ChangeType::Update => {
                let row = self.new_row.clone().ok_or_else(|| missing("new row"))?;
                Ok(ChangeEvent::Update(Row::decode(kind, row)?))
            }
            ChangeType::Delete => {
                let id = self
                    .old_row
                    .as_ref()
                    .and_then(|row| row.get("id"))
                    .map(value_to_string)
                    .ok_or_else(|| missing("old row id"))?;
                Ok(ChangeEvent::Delete { kind, id })
            }
        }
    }
}

/// Message delivered on a subscription sink
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Change {
        handle: SubscriptionHandle,
        change: RawChange,
    },
    /// The transport behind the subscription went away; no further events follow
    Closed {
        handle: SubscriptionHandle,
        reason: String,
    },
}

/// Channel end a store pushes subscription messages into
pub type FeedSender = mpsc::UnboundedSender<FeedMessage>;

/// Remote relational store with push subscriptions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Run a bulk query and return the raw rows
    async fn query(&self, query: &Query) -> StoreResult<Vec<Value>>;

    /// Apply a mutation and return the affected rows
    async fn mutate(&self, table: &str, mutation: Mutation) -> StoreResult<Vec<Value>>;

    /// Open a push subscription; messages are delivered to `sink`
    async fn subscribe(
        &self,
        table: &str,
        filters: Vec<Filter>,
        sink: FeedSender,
    ) -> StoreResult<SubscriptionHandle>;

    /// Close a push subscription
    async fn unsubscribe(&self, handle: SubscriptionHandle) -> StoreResult<()>;
}

/// Stringify a JSON scalar the way filters compare it
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub(crate) fn compare_values(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_matches() {
        let row = json!({ "cluster_id": "c1", "count": 7, "resolved": false });
        assert!(Filter::eq("cluster_id", "c1").matches(&row));
        assert!(!Filter::eq("cluster_id", "c2").matches(&row));
        assert!(Filter::eq("resolved", "false").matches(&row));
        assert!(Filter::Gt("count".into(), "5".into()).matches(&row));
        assert!(!Filter::Gt("count".into(), "10".into()).matches(&row));
        assert!(Filter::In("cluster_id".into(), vec!["c0".into(), "c1".into()]).matches(&row));
        assert!(!Filter::eq("missing", "x").matches(&row));
    }

    #[test]
    fn test_query_pairs() {
        assert_eq!(
            Filter::eq("cluster_id", "abc").to_query_pair(),
            ("cluster_id".to_string(), "eq.abc".to_string())
        );
        assert_eq!(
            Filter::In("id".into(), vec!["a".into(), "b".into()]).to_query_pair(),
            ("id".to_string(), "in.(\"a\",\"b\")".to_string())
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(StoreError::Timeout.is_transient());
        assert!(StoreError::Network("reset".into()).is_transient());
        assert!(
            StoreError::Status {
                status: 503,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            !StoreError::Status {
                status: 400,
                message: String::new()
            }
            .is_transient()
        );
        assert!(StoreError::Unauthorized("jwt expired".into()).is_auth());
        assert!(
            StoreError::Status {
                status: 403,
                message: String::new()
            }
            .is_auth()
        );
        assert!(!StoreError::Timeout.is_auth());
    }

    #[test]
    fn test_raw_delete_uses_old_row_id() {
        let raw = RawChange {
            change_type: ChangeType::Delete,
            table: "incidents".to_string(),
            new_row: None,
            old_row: Some(json!({ "id": "i9" })),
        };
        assert_eq!(
            raw.decode().unwrap(),
            ChangeEvent::Delete {
                kind: EntityKind::Incident,
                id: "i9".to_string()
            }
        );
    }

    #[test]
    fn test_raw_insert_without_row_is_rejected() {
        let raw = RawChange {
            change_type: ChangeType::Insert,
            table: "incidents".to_string(),
            new_row: None,
            old_row: None,
        };
        assert!(raw.decode().is_err());
    }

    #[test]
    fn test_raw_unknown_table_is_rejected() {
        let raw = RawChange {
            change_type: ChangeType::Insert,
            table: "cost_tracking".to_string(),
            new_row: Some(json!({ "id": "x" })),
            old_row: None,
        };
        assert!(raw.decode().is_err());
    }
}

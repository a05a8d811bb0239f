//! Kodo model layer
//!
//! Typed schemas for every row the dashboard mirrors from the remote store.
//!
//! Structure:
//! - `entity_kind.rs` - entity/table enumeration
//! - `status.rs` - enumerated fields and allowed status transitions
//! - `rows.rs` - per-entity row structs
//! - `metrics.rs` - the metrics blob carried on cluster rows
//! - `row.rs` - tagged `Row` / `ChangeEvent` used by the cache

pub mod entity_kind;
pub mod metrics;
pub mod row;
pub mod rows;
pub mod status;

pub use entity_kind::EntityKind;
pub use metrics::{ClusterMetrics, ContainerSnapshot, PodSnapshot};
pub use row::{ChangeEvent, DecodeError, Row};
pub use rows::{Anomaly, Cluster, Incident, Notification, SecurityThreat, StorageRecommendation};
pub use status::{
    ClusterStatus, NotificationKind, Provider, RecommendationStatus, RecommendationType,
    Severity, ThreatStatus, TransitionError,
};

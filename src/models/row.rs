//! Tagged row and change-event types
//!
//! `Row` is the single currency of the entity cache: one variant per entity
//! kind, each holding a validated struct. `ChangeEvent` is the tagged push
//! event (`Insert | Update | Delete`) applied by the cache through one match.

use super::entity_kind::EntityKind;
use super::rows::{Anomaly, Cluster, Incident, Notification, SecurityThreat, StorageRecommendation};
use serde_json::Value;

/// A validated row of any cached entity type
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Cluster(Cluster),
    Incident(Incident),
    Anomaly(Anomaly),
    StorageRecommendation(StorageRecommendation),
    SecurityThreat(SecurityThreat),
    Notification(Notification),
}

/// A row that failed schema validation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid {kind} row: {reason}")]
pub struct DecodeError {
    pub kind: EntityKind,
    pub reason: String,
}

impl Row {
    /// Validate a raw JSON row against the schema for `kind`
    pub fn decode(kind: EntityKind, value: Value) -> Result<Self, DecodeError> {
        let err = |e: serde_json::Error| DecodeError {
            kind,
            reason: e.to_string(),
        };
        let row = match kind {
            EntityKind::Cluster => Row::Cluster(serde_json::from_value(value).map_err(err)?),
            EntityKind::Incident => Row::Incident(serde_json::from_value(value).map_err(err)?),
            EntityKind::Anomaly => Row::Anomaly(serde_json::from_value(value).map_err(err)?),
            EntityKind::StorageRecommendation => {
                Row::StorageRecommendation(serde_json::from_value(value).map_err(err)?)
            }
            EntityKind::SecurityThreat => {
                Row::SecurityThreat(serde_json::from_value(value).map_err(err)?)
            }
            EntityKind::Notification => {
                Row::Notification(serde_json::from_value(value).map_err(err)?)
            }
        };
        Ok(row)
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Row::Cluster(_) => EntityKind::Cluster,
            Row::Incident(_) => EntityKind::Incident,
            Row::Anomaly(_) => EntityKind::Anomaly,
            Row::StorageRecommendation(_) => EntityKind::StorageRecommendation,
            Row::SecurityThreat(_) => EntityKind::SecurityThreat,
            Row::Notification(_) => EntityKind::Notification,
        }
    }

    /// Primary key
    pub fn id(&self) -> &str {
        match self {
            Row::Cluster(r) => &r.id,
            Row::Incident(r) => &r.id,
            Row::Anomaly(r) => &r.id,
            Row::StorageRecommendation(r) => &r.id,
            Row::SecurityThreat(r) => &r.id,
            Row::Notification(r) => &r.id,
        }
    }

    /// Owning cluster for cluster-scoped rows
    pub fn cluster_id(&self) -> Option<&str> {
        match self {
            Row::Incident(r) => Some(&r.cluster_id),
            Row::Anomaly(r) => Some(&r.cluster_id),
            Row::StorageRecommendation(r) => Some(&r.cluster_id),
            Row::SecurityThreat(r) => Some(&r.cluster_id),
            Row::Cluster(_) | Row::Notification(_) => None,
        }
    }

    /// Owning user for user-scoped rows
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Row::Cluster(r) => Some(&r.user_id),
            Row::Notification(r) => Some(&r.user_id),
            _ => None,
        }
    }
}

/// Push event after validation
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Insert(Row),
    Update(Row),
    Delete { kind: EntityKind, id: String },
}

impl ChangeEvent {
    pub fn kind(&self) -> EntityKind {
        match self {
            ChangeEvent::Insert(row) | ChangeEvent::Update(row) => row.kind(),
            ChangeEvent::Delete { kind, .. } => *kind,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ChangeEvent::Insert(row) | ChangeEvent::Update(row) => row.id(),
            ChangeEvent::Delete { id, .. } => id,
        }
    }
}

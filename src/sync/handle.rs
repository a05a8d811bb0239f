//! Handle used by the UI to drive the manager and perform user actions

use super::{SyncCommand, SyncStatus};
use crate::cache::EntityCache;
use crate::models::{
    ChangeEvent, EntityKind, RecommendationStatus, Row, SecurityThreat, StorageRecommendation,
    ThreatStatus, TransitionError,
};
use crate::store::{Filter, Mutation, RemoteStore, StoreError};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("read-only mode: changes are disabled")]
    ReadOnly,

    #[error("{kind} '{id}' is not loaded")]
    NotFound { kind: EntityKind, id: String },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("store returned no row for {kind} '{id}'")]
    NoRowReturned { kind: EntityKind, id: String },
}

/// Cloneable handle onto a running subscription manager
#[derive(Clone)]
pub struct SyncHandle {
    store: Arc<dyn RemoteStore>,
    cache: EntityCache,
    status: SyncStatus,
    command_tx: mpsc::UnboundedSender<SyncCommand>,
    read_only: bool,
}

impl SyncHandle {
    pub(super) fn new(
        store: Arc<dyn RemoteStore>,
        cache: EntityCache,
        status: SyncStatus,
        command_tx: mpsc::UnboundedSender<SyncCommand>,
        read_only: bool,
    ) -> Self {
        Self {
            store,
            cache,
            status,
            command_tx,
            read_only,
        }
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn send(&self, command: SyncCommand) {
        if self.command_tx.send(command).is_err() {
            tracing::debug!("Subscription manager is gone, command dropped");
        }
    }

    pub fn start(&self, user_id: impl Into<String>) {
        self.send(SyncCommand::Start {
            user_id: user_id.into(),
        });
    }

    pub fn refresh(&self) {
        self.send(SyncCommand::Refresh);
    }

    pub fn stop(&self) {
        self.send(SyncCommand::Stop);
    }

    /// Accept, reject or mark applied a storage recommendation
    pub async fn set_recommendation_status(
        &self,
        id: &str,
        next: RecommendationStatus,
    ) -> Result<StorageRecommendation, ActionError> {
        let kind = EntityKind::StorageRecommendation;
        let Some(Row::StorageRecommendation(current)) = self.cache.get(kind, id) else {
            return Err(ActionError::NotFound {
                kind,
                id: id.to_string(),
            });
        };
        if !current.status.can_transition_to(next) {
            return Err(TransitionError {
                entity: "recommendation",
                from: current.status.to_string(),
                to: next.to_string(),
            }
            .into());
        }

        match self.write_status(kind, id, next.as_str()).await? {
            Row::StorageRecommendation(updated) => Ok(updated),
            _ => Err(ActionError::NoRowReturned {
                kind,
                id: id.to_string(),
            }),
        }
    }

    /// Move a security threat forward through its investigation states
    pub async fn set_threat_status(
        &self,
        id: &str,
        next: ThreatStatus,
    ) -> Result<SecurityThreat, ActionError> {
        let kind = EntityKind::SecurityThreat;
        let Some(Row::SecurityThreat(current)) = self.cache.get(kind, id) else {
            return Err(ActionError::NotFound {
                kind,
                id: id.to_string(),
            });
        };
        if !current.status.can_transition_to(next) {
            return Err(TransitionError {
                entity: "threat",
                from: current.status.to_string(),
                to: next.to_string(),
            }
            .into());
        }

        match self.write_status(kind, id, next.as_str()).await? {
            Row::SecurityThreat(updated) => Ok(updated),
            _ => Err(ActionError::NoRowReturned {
                kind,
                id: id.to_string(),
            }),
        }
    }

    async fn write_status(&self, kind: EntityKind, id: &str, status: &str) -> Result<Row, ActionError> {
        if self.read_only {
            return Err(ActionError::ReadOnly);
        }
        tracing::info!("Setting {} {} status to {}", kind, id, status);

        let returned = self
            .store
            .mutate(
                kind.table(),
                Mutation::Update {
                    filters: vec![Filter::eq("id", id)],
                    patch: json!({ "status": status }),
                },
            )
            .await?;
        let value = returned
            .into_iter()
            .next()
            .ok_or_else(|| ActionError::NoRowReturned {
                kind,
                id: id.to_string(),
            })?;
        let row = Row::decode(kind, value).map_err(StoreError::from)?;

        // The manager task owns cache writes
        self.send(SyncCommand::Apply(ChangeEvent::Update(row.clone())));
        Ok(row)
    }
}

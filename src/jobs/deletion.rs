//! Batched cluster deletion
//!
//! Metrics rows are by far the largest dependent table, so they are removed
//! in fixed-size batches (select ids, delete by id list, repeat). The other
//! dependent tables go in one delete each; a failure there is logged and
//! skipped. Only the final delete of the cluster row is fatal.

use crate::models::NotificationKind;
use crate::store::{Filter, Mutation, Query, RemoteStore, StoreError, value_to_string};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

pub const METRICS_TABLE: &str = "cluster_metrics";

/// Deleted after the metrics, in this order
pub const DEPENDENT_TABLES: &[&str] = &[
    "incidents",
    "anomalies",
    "storage_recommendations",
    "security_threats",
    "cost_tracking",
    "auto_heal_actions",
    "pod_events",
    "cluster_events",
    "scan_history",
];

const CLUSTERS_TABLE: &str = "clusters";
const NOTIFICATIONS_TABLE: &str = "notifications";

#[derive(Debug, thiserror::Error)]
pub enum DeletionError {
    #[error("failed to delete cluster {cluster_id}: {source}")]
    ClusterDelete {
        cluster_id: String,
        #[source]
        source: StoreError,
    },

    #[error("cluster {0} was not deleted (not found or not permitted)")]
    NotFound(String),
}

/// Progress update published while the job runs
#[derive(Debug, Clone, PartialEq)]
pub struct DeletionProgress {
    pub table: String,
    /// Rows removed from `table` so far
    pub rows_removed: usize,
    pub batches: usize,
}

/// Outcome of a completed deletion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeletionReport {
    pub cluster_id: String,
    /// Rows removed per table
    pub removed: BTreeMap<String, usize>,
    /// Dependent tables whose delete failed
    pub skipped: Vec<String>,
    pub elapsed: Duration,
}

impl DeletionReport {
    pub fn total_removed(&self) -> usize {
        self.removed.values().sum()
    }
}

pub struct ClusterDeletionJob {
    store: Arc<dyn RemoteStore>,
    batch_size: usize,
    progress_every: usize,
    progress: Option<mpsc::UnboundedSender<DeletionProgress>>,
}

impl ClusterDeletionJob {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            batch_size: 1000,
            progress_every: 5,
            progress: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Update the notification every `batches` metric batches
    pub fn with_progress_every(mut self, batches: usize) -> Self {
        self.progress_every = batches.max(1);
        self
    }

    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<DeletionProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub async fn run(
        &self,
        cluster_id: &str,
        notification_id: &str,
    ) -> Result<DeletionReport, DeletionError> {
        let started = Instant::now();
        let mut report = DeletionReport {
            cluster_id: cluster_id.to_string(),
            ..Default::default()
        };
        tracing::info!(cluster_id, "Starting cluster deletion");

        self.notify(
            notification_id,
            NotificationKind::Info,
            "Deleting cluster data...".to_string(),
        )
        .await;

        let metrics_removed = self.delete_metrics(cluster_id, notification_id, &mut report).await;
        report
            .removed
            .insert(METRICS_TABLE.to_string(), metrics_removed);

        for &table in DEPENDENT_TABLES {
            let mutation = Mutation::Delete {
                filters: vec![Filter::eq("cluster_id", cluster_id)],
            };
            match self.store.mutate(table, mutation).await {
                Ok(rows) => {
                    tracing::debug!(table, rows = rows.len(), "Deleted dependent rows");
                    report.removed.insert(table.to_string(), rows.len());
                }
                Err(e) => {
                    tracing::warn!(table, error = %e, "Skipping dependent table");
                    report.skipped.push(table.to_string());
                }
            }
        }

        let mutation = Mutation::Delete {
            filters: vec![Filter::eq("id", cluster_id)],
        };
        let result = match self.store.mutate(CLUSTERS_TABLE, mutation).await {
            Ok(rows) if rows.is_empty() => Err(DeletionError::NotFound(cluster_id.to_string())),
            Ok(rows) => {
                report.removed.insert(CLUSTERS_TABLE.to_string(), rows.len());
                Ok(())
            }
            Err(source) => Err(DeletionError::ClusterDelete {
                cluster_id: cluster_id.to_string(),
                source,
            }),
        };
        report.elapsed = started.elapsed();

        match result {
            Ok(()) => {
                tracing::info!(
                    cluster_id,
                    rows = report.total_removed(),
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Cluster deleted"
                );
                let message = format!(
                    "Cluster deleted ({} rows removed in {:.1}s)",
                    report.total_removed(),
                    report.elapsed.as_secs_f64()
                );
                self.notify(notification_id, NotificationKind::Success, message)
                    .await;
                Ok(report)
            }
            Err(e) => {
                tracing::error!(cluster_id, error = %e, "Cluster deletion failed");
                self.notify(
                    notification_id,
                    NotificationKind::Error,
                    format!("Failed to delete cluster: {}", e),
                )
                .await;
                Err(e)
            }
        }
    }

    /// Remove metric rows batch by batch; returns the number removed
    async fn delete_metrics(
        &self,
        cluster_id: &str,
        notification_id: &str,
        report: &mut DeletionReport,
    ) -> usize {
        let mut removed = 0;
        let mut batches = 0;

        loop {
            let query = Query::table(METRICS_TABLE)
                .select("id")
                .eq("cluster_id", cluster_id)
                .limit(self.batch_size);
            let ids: Vec<String> = match self.store.query(&query).await {
                Ok(rows) => rows.iter().map(|r| value_to_string(&r["id"])).collect(),
                Err(e) => {
                    tracing::warn!(error = %e, "Listing metric rows failed; skipping metrics");
                    report.skipped.push(METRICS_TABLE.to_string());
                    break;
                }
            };
            if ids.is_empty() {
                break;
            }

            let mutation = Mutation::Delete {
                filters: vec![Filter::In("id".to_string(), ids)],
            };
            match self.store.mutate(METRICS_TABLE, mutation).await {
                Ok(rows) if rows.is_empty() => {
                    // Nothing was deleted; looping again would select the same ids
                    tracing::warn!("Metric batch delete removed no rows; skipping metrics");
                    report.skipped.push(METRICS_TABLE.to_string());
                    break;
                }
                Ok(rows) => removed += rows.len(),
                Err(e) => {
                    tracing::warn!(error = %e, "Metric batch delete failed; skipping metrics");
                    report.skipped.push(METRICS_TABLE.to_string());
                    break;
                }
            }
            batches += 1;

            if let Some(tx) = &self.progress {
                let _ = tx.send(DeletionProgress {
                    table: METRICS_TABLE.to_string(),
                    rows_removed: removed,
                    batches,
                });
            }
            if batches % self.progress_every == 0 {
                self.notify(
                    notification_id,
                    NotificationKind::Info,
                    format!("Deleting cluster data... {} metric rows removed", removed),
                )
                .await;
            }
        }

        removed
    }

    /// Best-effort notification update
    async fn notify(&self, notification_id: &str, kind: NotificationKind, message: String) {
        let mutation = Mutation::Update {
            filters: vec![Filter::eq("id", notification_id)],
            patch: json!({ "message": message, "type": kind.as_str() }),
        };
        if let Err(e) = self.store.mutate(NOTIFICATIONS_TABLE, mutation).await {
            tracing::warn!(notification_id, error = %e, "Failed to update notification");
        }
    }
}

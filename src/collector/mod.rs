//! Cluster metrics reporter
//!
//! Lists nodes and pods from a live cluster and writes them onto the
//! cluster's row, which is how pod health reaches the dashboard.
//!
//! Uses the default kubeconfig loading strategy unless a context is named:
//! 1. In-cluster config (if running in a pod)
//! 2. KUBECONFIG environment variable
//! 3. ~/.kube/config

mod pods;

pub use pods::{ClusterReport, pod_snapshot};

use crate::models::{Cluster, EntityKind, Row};
use crate::store::{Filter, Mutation, Query, RemoteStore};
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{Api, ListParams};
use kube::config::KubeConfigOptions;
use kube::{Client, Config};

/// Create a Kubernetes client, optionally for a specific kubeconfig context
pub async fn create_client(context: Option<&str>) -> Result<Client> {
    let config = match context {
        Some(name) => Config::from_kubeconfig(&KubeConfigOptions {
            context: Some(name.to_string()),
            ..Default::default()
        })
        .await
        .with_context(|| format!("Failed to load kubeconfig context '{}'", name))?,
        None => Config::infer()
            .await
            .context("Failed to infer Kubernetes config")?,
    };
    tracing::debug!(cluster_url = %config.cluster_url, "Connecting to cluster");

    Client::try_from(config).context("Failed to create Kubernetes client")
}

/// List nodes and pods across all namespaces
pub async fn collect(client: &Client) -> Result<ClusterReport> {
    let nodes: Api<Node> = Api::all(client.clone());
    let pods: Api<Pod> = Api::all(client.clone());

    let node_list = nodes
        .list(&ListParams::default())
        .await
        .context("Failed to list nodes")?;
    let pod_list = pods
        .list(&ListParams::default())
        .await
        .context("Failed to list pods")?;

    tracing::debug!(
        nodes = node_list.items.len(),
        pods = pod_list.items.len(),
        "Collected cluster state"
    );
    Ok(ClusterReport::from_objects(
        node_list.items.len(),
        &pod_list.items,
    ))
}

/// Write a report onto the cluster row, keeping its usage history
pub async fn publish(store: &dyn RemoteStore, cluster_id: &str, report: &ClusterReport) -> Result<()> {
    let query = Query::table(EntityKind::Cluster.table()).eq("id", cluster_id);
    let existing = store
        .query(&query)
        .await
        .context("Failed to read cluster row")?
        .into_iter()
        .next()
        .with_context(|| format!("Cluster {} not found", cluster_id))?;

    let metrics = match Row::decode(EntityKind::Cluster, existing) {
        Ok(Row::Cluster(Cluster { metrics, .. })) => metrics,
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(error = %e, "Existing cluster row is malformed; replacing metrics");
            None
        }
    };

    let mutation = Mutation::Update {
        filters: vec![Filter::eq("id", cluster_id)],
        patch: report.to_patch(metrics, chrono::Utc::now()),
    };
    let updated = store
        .mutate(EntityKind::Cluster.table(), mutation)
        .await
        .context("Failed to update cluster row")?;
    if updated.is_empty() {
        anyhow::bail!("Cluster {} was not updated (not permitted?)", cluster_id);
    }

    tracing::info!(
        cluster_id,
        nodes = report.node_count,
        pods = report.pods.len(),
        "Published cluster metrics"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PodSnapshot;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_patches_cluster_row() {
        let store = MemoryStore::new();
        store.insert(
            "clusters",
            json!({
                "id": "c1", "user_id": "u1", "name": "prod", "status": "healthy",
                "metrics": { "cpu_history": [5.0] }
            }),
        );
        let report = ClusterReport {
            node_count: 2,
            pods: vec![PodSnapshot {
                name: "api-0".into(),
                phase: "Running".into(),
                ..Default::default()
            }],
        };

        publish(&store, "c1", &report).await.unwrap();

        let row = &store.rows("clusters")[0];
        assert_eq!(row["node_count"], 2);
        assert_eq!(row["pod_count"], 1);
        assert_eq!(row["metrics"]["cpu_history"], json!([5.0]));
    }

    #[tokio::test]
    async fn test_publish_unknown_cluster_fails() {
        let store = MemoryStore::new();
        assert!(publish(&store, "missing", &ClusterReport::default()).await.is_err());
    }
}

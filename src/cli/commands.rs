//! CLI command handlers

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Subcommand;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use super::output::StatusReport;
use crate::auth::{AuthSession, provider_for};
use crate::collector;
use crate::config::Config;
use crate::functions::FunctionsClient;
use crate::jobs::ClusterDeletionJob;
use crate::models::{Cluster, EntityKind, Row, Severity};
use crate::services::DashboardSession;
use crate::store::{Mutation, Query, RemoteStore, RestStore};

/// Cluster management subcommands
#[derive(Subcommand, Debug)]
pub enum ClusterSubcommand {
    /// List the clusters you own
    List,
    /// Delete a cluster and all of its data
    Delete {
        /// Cluster id
        id: String,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

/// Signed-in session, or an error telling the user to log in
async fn require_session(config: &Config) -> Result<AuthSession> {
    let auth = provider_for(config)?;
    auth.current_session()
        .await
        .context("Failed to read session")?
        .context("Not signed in; run `kodo login` first")
}

fn backend_store(config: &Config, session: &AuthSession) -> Result<Arc<dyn RemoteStore>> {
    let store = RestStore::new(
        &config.backend.url,
        &config.backend.anon_key,
        config.request_timeout(),
    )
    .context("Failed to create backend client")?
    .with_access_token(session.access_token.clone());
    Ok(Arc::new(store))
}

fn prompt_line(prompt: &str) -> Result<String> {
    eprint!("{}", prompt);
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Print a one-shot status report
pub async fn handle_status(
    config: &Config,
    demo: bool,
    cluster: Option<String>,
    severity: Option<Severity>,
) -> Result<()> {
    let mut session = if demo {
        DashboardSession::demo(config)
    } else {
        let auth = require_session(config).await?;
        DashboardSession::connect(config, &auth)?
    };

    let timeout = config.request_timeout();
    session.wait_until_ready(timeout).await?;
    if let Some(id) = &cluster {
        session
            .select(id)
            .with_context(|| format!("Cannot select cluster {}", id))?;
        session.wait_until_ready(timeout).await?;
    }

    let user = session.user_id().unwrap_or("-").to_string();
    let selected = session.selection().selected();
    let report = StatusReport {
        user: &user,
        status: &session.status(),
        snapshot: &session.snapshot(),
        selected: selected.as_deref(),
        thresholds: session.thresholds(),
        severity,
        now: Utc::now(),
    }
    .render();
    print!("{}", report);

    session.stop();
    Ok(())
}

pub async fn handle_login(config: &Config, email: Option<String>, password_stdin: bool) -> Result<()> {
    let email = match email.or_else(|| config.auth.email.clone()) {
        Some(email) => email,
        None => prompt_line("Email: ")?,
    };
    let password = if password_stdin {
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read password from stdin")?;
        line.trim_end_matches(['\r', '\n']).to_string()
    } else {
        prompt_line("Password: ")?
    };

    let auth = provider_for(config)?;
    let session = auth
        .sign_in(&email, &password)
        .await
        .context("Sign-in failed")?;
    tracing::info!(user_id = %session.user_id, "Signed in");
    println!("Signed in as {} ({})", email, session.user_id);
    Ok(())
}

pub async fn handle_logout(config: &Config) -> Result<()> {
    let auth = provider_for(config)?;
    auth.sign_out().await.context("Sign-out failed")?;
    println!("Signed out");
    Ok(())
}

/// Collect pod state from a live cluster and write it onto the cluster row
pub async fn handle_report(
    config: &Config,
    cluster_id: &str,
    context: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    let client = collector::create_client(context).await?;
    let report = collector::collect(&client).await?;

    if dry_run {
        let patch = report.to_patch(None, Utc::now());
        println!(
            "{}",
            serde_json::to_string_pretty(&patch).context("Failed to serialize report")?
        );
        return Ok(());
    }

    let session = require_session(config).await?;
    let store = backend_store(config, &session)?;
    collector::publish(store.as_ref(), cluster_id, &report).await?;
    println!(
        "Reported {} nodes and {} pods for cluster {}",
        report.node_count,
        report.pods.len(),
        cluster_id
    );
    Ok(())
}

async fn owned_clusters(store: &dyn RemoteStore, user_id: &str) -> Result<Vec<Cluster>> {
    let rows = store
        .query(
            &Query::table(EntityKind::Cluster.table())
                .eq("user_id", user_id)
                .order_desc("created_at"),
        )
        .await
        .context("Failed to list clusters")?;

    let mut clusters = Vec::with_capacity(rows.len());
    for row in rows {
        match Row::decode(EntityKind::Cluster, row) {
            Ok(Row::Cluster(cluster)) => clusters.push(cluster),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Skipping malformed cluster row"),
        }
    }
    clusters.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(clusters)
}

pub async fn handle_cluster_command(cmd: ClusterSubcommand, config: &Config) -> Result<()> {
    let session = require_session(config).await?;
    let store = backend_store(config, &session)?;

    match cmd {
        ClusterSubcommand::List => {
            let clusters = owned_clusters(store.as_ref(), &session.user_id).await?;
            if clusters.is_empty() {
                println!("No clusters yet");
            }
            for cluster in clusters {
                println!(
                    "{:<38} {:<16} {:<8} {}",
                    cluster.id,
                    cluster.name,
                    cluster.provider.as_str(),
                    cluster.status.as_str()
                );
            }
        }
        ClusterSubcommand::Delete { id, yes } => {
            if config.read_only {
                anyhow::bail!("Read-only mode: cluster deletion is disabled");
            }

            let clusters = owned_clusters(store.as_ref(), &session.user_id).await?;
            let cluster = clusters
                .into_iter()
                .find(|c| c.id == id)
                .with_context(|| format!("Cluster {} not found", id))?;

            if !yes {
                let answer = prompt_line(&format!(
                    "Delete cluster '{}' and all of its data? [y/N] ",
                    cluster.name
                ))?;
                if !answer.eq_ignore_ascii_case("y") {
                    println!("Aborted");
                    return Ok(());
                }
            }

            delete_cluster(config, store, &session.user_id, &cluster).await?;
        }
    }
    Ok(())
}

async fn delete_cluster(
    config: &Config,
    store: Arc<dyn RemoteStore>,
    user_id: &str,
    cluster: &Cluster,
) -> Result<()> {
    let inserted = store
        .mutate(
            EntityKind::Notification.table(),
            Mutation::Insert(json!({
                "user_id": user_id,
                "title": format!("Deleting cluster {}", cluster.name),
                "message": "Deletion queued",
                "type": "info",
                "related_cluster_id": cluster.id,
                "read": false,
            })),
        )
        .await
        .context("Failed to create progress notification")?;
    let notification_id = inserted
        .first()
        .and_then(|row| row.get("id"))
        .and_then(Value::as_str)
        .context("Backend did not return the notification id")?
        .to_string();

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let job = ClusterDeletionJob::new(store)
        .with_batch_size(config.jobs.deletion_batch_size)
        .with_progress_every(config.jobs.progress_every)
        .with_progress(progress_tx);

    let cluster_id = cluster.id.clone();
    let mut task = tokio::spawn(async move { job.run(&cluster_id, &notification_id).await });

    let started = Instant::now();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut last = String::from("starting");
    let result = loop {
        tokio::select! {
            result = &mut task => break result.context("Deletion task panicked")?,
            Some(progress) = progress_rx.recv() => {
                last = format!("{}: {} rows in {} batches", progress.table, progress.rows_removed, progress.batches);
            }
            _ = ticker.tick() => {
                eprint!("\r[{:>5.1}s] {}", started.elapsed().as_secs_f64(), last);
                std::io::stderr().flush().ok();
            }
        }
    };
    eprintln!();

    let report = result?;
    if !report.skipped.is_empty() {
        eprintln!("Skipped tables: {}", report.skipped.join(", "));
    }
    println!(
        "Cluster {} deleted ({} rows removed in {:.1}s)",
        cluster.name,
        report.total_removed(),
        report.elapsed.as_secs_f64()
    );
    Ok(())
}

/// Call an analysis function and print its JSON response
pub async fn handle_invoke(config: &Config, function: &str, body: Option<&str>) -> Result<()> {
    let body: Value = match body {
        Some(raw) => serde_json::from_str(raw).context("--body must be valid JSON")?,
        None => json!({}),
    };

    let session = require_session(config).await?;
    let client = FunctionsClient::new(
        &config.backend.url,
        &config.backend.anon_key,
        config.request_timeout(),
    )?
    .with_access_token(session.access_token);

    match client.invoke(function, &body).await {
        Ok(response) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&response).context("Failed to format response")?
            );
            Ok(())
        }
        Err(e) => {
            // Shown as the backend worded it
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

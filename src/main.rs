//! Kodo - live Kubernetes fleet dashboard
//!
//! Signs in to the monitoring backend, keeps the user's clusters, incidents,
//! anomalies, storage recommendations, threats and notifications in sync,
//! and shows them in a terminal dashboard.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kodo::cli::{
    ClusterSubcommand, ConfigSubcommand, display_version, handle_cluster_command,
    handle_config_command, handle_invoke, handle_login, handle_logout, handle_report,
    handle_status, init_logging,
};
use kodo::config::{Config, ConfigLoader};
use kodo::models::Severity;

/// Kodo - live Kubernetes fleet dashboard
#[derive(Parser, Debug)]
#[command(name = "kodo")]
#[command(about = "Live dashboard for your Kubernetes fleet", long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(long, short = 'd', global = true)]
    debug: bool,

    /// Configuration profile layered over config.yaml
    #[arg(long, short = 'p', global = true, env = "KODO_PROFILE")]
    profile: Option<String>,

    /// Use built-in demo data instead of the backend
    #[arg(long, global = true)]
    demo: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a one-shot status report
    Status {
        /// Cluster to report on instead of the remembered selection
        #[arg(long)]
        cluster: Option<String>,
        /// Only list incidents of this severity
        #[arg(long)]
        severity: Option<Severity>,
    },
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: Option<String>,
        /// Read the password from stdin instead of prompting
        #[arg(long)]
        password_stdin: bool,
    },
    /// Sign out and forget the cached session
    Logout,
    /// Collect pod state from a live cluster and publish it
    Report {
        /// Id of the cluster row to update
        #[arg(long)]
        cluster_id: String,
        /// Kubeconfig context to collect from
        #[arg(long)]
        context: Option<String>,
        /// Print the collected report without publishing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Cluster management
    Cluster {
        #[command(subcommand)]
        subcommand: ClusterSubcommand,
    },
    /// Invoke an analysis function
    Invoke {
        /// Function name
        function: String,
        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
    /// Show version information
    Version,
}

fn load_config(profile: Option<&str>) -> Result<Config> {
    let config = ConfigLoader::load(profile).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let profile = args.profile.as_deref();

    match args.command {
        Some(Command::Config { subcommand }) => {
            return handle_config_command(subcommand, profile).await;
        }
        Some(Command::Version) => {
            display_version();
            return Ok(());
        }
        _ => {}
    }

    let log_file = init_logging(args.debug);
    if let Some(ref log_path) = log_file {
        eprintln!(
            "Debug logging enabled. Logs written to: {}",
            log_path.display()
        );
    }

    let config = load_config(profile)?;
    tracing::debug!(
        read_only = config.read_only,
        backend = %config.backend.url,
        "Configuration loaded"
    );

    match args.command {
        Some(Command::Status { cluster, severity }) => {
            handle_status(&config, args.demo, cluster, severity).await
        }
        Some(Command::Login {
            email,
            password_stdin,
        }) => handle_login(&config, email, password_stdin).await,
        Some(Command::Logout) => handle_logout(&config).await,
        Some(Command::Report {
            cluster_id,
            context,
            dry_run,
        }) => handle_report(&config, &cluster_id, context.as_deref(), dry_run).await,
        Some(Command::Cluster { subcommand }) => handle_cluster_command(subcommand, &config).await,
        Some(Command::Invoke { function, body }) => {
            handle_invoke(&config, &function, body.as_deref()).await
        }
        Some(Command::Config { .. }) | Some(Command::Version) => Ok(()),
        None => run_dashboard(&config, args.demo).await,
    }
}

#[cfg(feature = "tui")]
async fn run_dashboard(config: &Config, demo: bool) -> Result<()> {
    use kodo::auth::provider_for;
    use kodo::services::DashboardSession;

    let session = if demo {
        DashboardSession::demo(config)
    } else {
        let auth = provider_for(config)?;
        let current = auth
            .current_session()
            .await
            .context("Failed to read session")?
            .context("Not signed in; run `kodo login` first (or try `kodo --demo`)")?;
        DashboardSession::connect(config, &current)?
    };

    kodo::tui::run_dashboard(session, config).await
}

#[cfg(not(feature = "tui"))]
async fn run_dashboard(_config: &Config, _demo: bool) -> Result<()> {
    anyhow::bail!("This build has no terminal UI; use `kodo status` instead")
}

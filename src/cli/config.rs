//! `kodo config` subcommands

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::config::{CONFIG_KEYS, ConfigLoader, paths};

/// Configuration management subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigSubcommand {
    /// Get configuration value
    Get {
        /// Configuration key (e.g., "readOnly", "sync.maxRetries")
        key: Option<String>,
    },
    /// Set configuration value in the root config file
    Set {
        /// Configuration key (e.g., "readOnly", "views.criticalAnomalyThreshold")
        key: String,
        /// Configuration value
        value: String,
    },
    /// List all configuration
    List,
    /// List the keys accepted by get/set
    Keys,
    /// Show configuration file path
    Path,
    /// Validate configuration
    Validate,
}

/// Handle configuration subcommands
pub async fn handle_config_command(cmd: ConfigSubcommand, profile: Option<&str>) -> Result<()> {
    match cmd {
        ConfigSubcommand::Get { key } => {
            let config = ConfigLoader::load(profile).context("Failed to load configuration")?;

            if let Some(key) = key {
                println!("{}", crate::config::get_config_value(&config, &key)?);
            } else {
                let yaml =
                    serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
                print!("{}", yaml);
            }
        }
        ConfigSubcommand::Set { key, value } => {
            // Only the root file is rewritten, so start from it rather than
            // the merged view (env overrides must not be persisted)
            let root_path = paths::root_config_path();
            let mut config = if root_path.exists() {
                ConfigLoader::load_file(&root_path)?
            } else {
                ConfigLoader::load_defaults()
            };

            crate::config::set_config_value(&mut config, &key, &value)
                .with_context(|| format!("Failed to set {} = {}", key, value))?;

            ConfigLoader::save_root(&config).context("Failed to save configuration")?;
            println!("Configuration saved");
        }
        ConfigSubcommand::List => {
            let config = ConfigLoader::load(profile).context("Failed to load configuration")?;
            let yaml =
                serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
            print!("{}", yaml);
        }
        ConfigSubcommand::Keys => {
            for key in CONFIG_KEYS {
                println!("{}", key);
            }
        }
        ConfigSubcommand::Path => {
            println!("{}", paths::root_config_path().display());
            if let Some(name) = profile {
                println!("{}", paths::profile_config_path(name).display());
            }
        }
        ConfigSubcommand::Validate => match ConfigLoader::validate(profile) {
            Ok(()) => println!("Configuration is valid"),
            Err(e) => {
                eprintln!("Configuration validation failed: {:#}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

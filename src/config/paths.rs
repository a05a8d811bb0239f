//! Cross-platform directory path resolution
//!
//! Provides functions to resolve platform-appropriate paths for configuration
//! and state directories.
//! - Linux/macOS: XDG Base Directory specification (~/.config, ~/.local/state)
//! - Windows: Known Folder API (AppData\Roaming, AppData\Local)

use std::path::{Path, PathBuf};

/// Get the configuration directory path
///
/// Checks KODO_CONFIG_DIR environment variable first, then falls back to:
/// - Unix (Linux/macOS): XDG_CONFIG_HOME/kodo or ~/.config/kodo
/// - Windows: %APPDATA%\kodo\config
pub fn config_dir() -> PathBuf {
    std::env::var("KODO_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            #[cfg(windows)]
            {
                use directories::ProjectDirs;
                ProjectDirs::from("", "", "kodo")
                    .map(|dirs| dirs.config_dir().to_path_buf())
                    .unwrap_or_else(|| PathBuf::from(".").join(".config").join("kodo"))
            }
            #[cfg(not(windows))]
            {
                use directories::BaseDirs;
                std::env::var("XDG_CONFIG_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| {
                        BaseDirs::new()
                            .map(|dirs| dirs.home_dir().join(".config"))
                            .unwrap_or_else(|| PathBuf::from(".").join(".config"))
                    })
                    .join("kodo")
            }
        })
}

/// Get the state directory path (session, last selection)
///
/// Checks KODO_STATE_DIR environment variable first, then falls back to:
/// - Unix (Linux/macOS): XDG_STATE_HOME/kodo or ~/.local/state/kodo
/// - Windows: %LOCALAPPDATA%\kodo\data
pub fn state_dir() -> PathBuf {
    std::env::var("KODO_STATE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            #[cfg(windows)]
            {
                use directories::ProjectDirs;
                ProjectDirs::from("", "", "kodo")
                    .map(|dirs| dirs.data_local_dir().to_path_buf())
                    .unwrap_or_else(|| PathBuf::from(".").join(".local").join("state").join("kodo"))
            }
            #[cfg(not(windows))]
            {
                use directories::BaseDirs;
                std::env::var("XDG_STATE_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| {
                        BaseDirs::new()
                            .map(|dirs| dirs.home_dir().join(".local").join("state"))
                            .unwrap_or_else(|| PathBuf::from(".").join(".local").join("state"))
                    })
                    .join("kodo")
            }
        })
}

/// Get the root configuration file path
pub fn root_config_path() -> PathBuf {
    config_dir().join("config.yaml")
}

/// Get the profile config file path under `config_dir`
pub fn profile_config_path_in(config_dir: &Path, profile: &str) -> PathBuf {
    config_dir.join("profiles").join(format!("{}.yaml", profile))
}

/// Get the profile config file path
pub fn profile_config_path(profile: &str) -> PathBuf {
    profile_config_path_in(&config_dir(), profile)
}

/// Persisted selected cluster
pub fn selection_path() -> PathBuf {
    state_dir().join("selection.yaml")
}

/// Cached auth session
pub fn session_path() -> PathBuf {
    state_dir().join("session.json")
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

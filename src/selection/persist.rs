//! Persisted selection (`selection.yaml` in the state directory)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Persisted {
    #[serde(default)]
    selected_cluster_id: Option<String>,
}

/// Location of the persisted selection
///
/// Failures to read or write are logged and otherwise ignored; losing the
/// remembered selection only means the first cluster gets picked.
#[derive(Debug, Clone)]
pub struct SelectionFile {
    path: PathBuf,
}

impl SelectionFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> Option<String> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match serde_yaml::from_str::<Persisted>(&content) {
            Ok(p) => p.selected_cluster_id,
            Err(e) => {
                tracing::warn!("Ignoring unreadable {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, cluster_id: &str) {
        let persisted = Persisted {
            selected_cluster_id: Some(cluster_id.to_string()),
        };
        let result = serde_yaml::to_string(&persisted)
            .map_err(|e| e.to_string())
            .and_then(|yaml| {
                if let Some(parent) = self.path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
                }
                std::fs::write(&self.path, yaml).map_err(|e| e.to_string())
            });
        if let Err(e) = result {
            tracing::warn!("Failed to persist selection to {}: {}", self.path.display(), e);
        }
    }
}

//! Status-change actions run off the render loop
//!
//! Writes go through the `SyncHandle` on spawned tasks; each task reports a
//! one-line outcome that the loop shows as a status message.

use super::core::App;
use super::events::AppAction;
use crate::sync::SyncHandle;
use tokio::sync::mpsc;

/// Outcome message (message, is_error)
type Outcome = (String, bool);

pub struct ActionRunner {
    handle: SyncHandle,
    tx: mpsc::UnboundedSender<Outcome>,
    rx: mpsc::UnboundedReceiver<Outcome>,
}

impl ActionRunner {
    pub fn new(handle: SyncHandle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { handle, tx, rx }
    }

    /// Spawn a status write; other actions are not the runner's concern
    pub fn spawn(&self, action: AppAction) {
        let handle = self.handle.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = match action {
                AppAction::SetRecommendationStatus { id, status } => {
                    match handle.set_recommendation_status(&id, status).await {
                        Ok(rec) => (format!("{} marked {}", rec.pvc_name, rec.status), false),
                        Err(e) => {
                            tracing::warn!("Recommendation update failed: {}", e);
                            (format!("Update failed: {}", e), true)
                        }
                    }
                }
                AppAction::SetThreatStatus { id, status } => {
                    match handle.set_threat_status(&id, status).await {
                        Ok(threat) => (format!("{} marked {}", threat.title, threat.status), false),
                        Err(e) => {
                            tracing::warn!("Threat update failed: {}", e);
                            (format!("Update failed: {}", e), true)
                        }
                    }
                }
                other => {
                    tracing::debug!("Ignoring non-write action {:?}", other);
                    return;
                }
            };
            let _ = tx.send(outcome);
        });
    }

    /// Show any finished outcomes on the app
    pub fn collect(&mut self, app: &mut App) -> bool {
        let mut any = false;
        while let Ok(outcome) = self.rx.try_recv() {
            app.set_status_message(outcome);
            any = true;
        }
        any
    }
}

//! Selection context
//!
//! Session-scoped record of which cluster the user is looking at and which
//! clusters they own. It is an explicit object: the session creates one on
//! sign-in and hands clones to every consumer. State changes are published on
//! a `watch` channel; the subscription manager is the main listener.

mod persist;

pub use persist::SelectionFile;

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;

/// Lifecycle of the selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionState {
    /// Signed out
    Uninitialized,
    /// Signed in, owned clusters not loaded yet
    Loading,
    /// Owned clusters known; `None` means the user has no clusters yet
    Ready(Option<String>),
}

impl SelectionState {
    pub fn selected(&self) -> Option<&str> {
        match self {
            SelectionState::Ready(id) => id.as_deref(),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SelectionState::Ready(_))
    }

    /// Ready with nothing to select
    pub fn needs_onboarding(&self) -> bool {
        matches!(self, SelectionState::Ready(None))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("cluster '{0}' is not owned by the current user")]
    NotOwned(String),

    #[error("selection is not ready (clusters still loading or signed out)")]
    NotReady,
}

struct SelectionInner {
    tx: watch::Sender<SelectionState>,
    owned: RwLock<Vec<String>>,
    file: Option<SelectionFile>,
}

/// Shared handle to the selection
#[derive(Clone)]
pub struct SelectionContext {
    inner: Arc<SelectionInner>,
}

impl SelectionContext {
    /// Create an uninitialized selection, persisting to `path` if given
    pub fn new(path: Option<PathBuf>) -> Self {
        let (tx, _rx) = watch::channel(SelectionState::Uninitialized);
        Self {
            inner: Arc::new(SelectionInner {
                tx,
                owned: RwLock::new(Vec::new()),
                file: path.map(SelectionFile::new),
            }),
        }
    }

    /// Receiver that observes every state change
    pub fn subscribe(&self) -> watch::Receiver<SelectionState> {
        self.inner.tx.subscribe()
    }

    pub fn state(&self) -> SelectionState {
        self.inner.tx.borrow().clone()
    }

    pub fn selected(&self) -> Option<String> {
        self.inner.tx.borrow().selected().map(str::to_string)
    }

    pub fn owned(&self) -> Vec<String> {
        self.inner
            .owned
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, state: SelectionState) -> bool {
        self.inner.tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            tracing::debug!("Selection {:?} -> {:?}", current, state);
            *current = state;
            true
        })
    }

    fn set_owned_list(&self, owned: Vec<String>) {
        *self
            .inner
            .owned
            .write()
            .unwrap_or_else(PoisonError::into_inner) = owned;
    }

    /// Enter `Loading` on sign-in
    pub fn begin_loading(&self) {
        self.publish(SelectionState::Loading);
    }

    /// Resolve the selection once the owned clusters are known
    ///
    /// The persisted selection wins if it is still owned, otherwise the first
    /// owned cluster is picked. No clusters resolves to `Ready(None)`.
    pub fn resolve(&self, owned: Vec<String>) -> Option<String> {
        let persisted = self.inner.file.as_ref().and_then(SelectionFile::load);
        let choice = persisted
            .filter(|id| owned.contains(id))
            .or_else(|| owned.first().cloned());

        self.set_owned_list(owned);
        self.publish(SelectionState::Ready(choice.clone()));
        choice
    }

    /// Explicitly select an owned cluster
    pub fn select(&self, cluster_id: &str) -> Result<(), SelectionError> {
        if !self.state().is_ready() {
            return Err(SelectionError::NotReady);
        }
        if !self.owned().iter().any(|id| id == cluster_id) {
            return Err(SelectionError::NotOwned(cluster_id.to_string()));
        }

        if let Some(file) = &self.inner.file {
            file.save(cluster_id);
        }
        self.publish(SelectionState::Ready(Some(cluster_id.to_string())));
        Ok(())
    }

    /// Update the owned clusters, falling back if the selected one went away
    pub fn set_owned(&self, owned: Vec<String>) {
        let state = self.state();
        self.set_owned_list(owned.clone());

        if let SelectionState::Ready(current) = state {
            let still_owned = current.as_ref().is_some_and(|id| owned.contains(id));
            if !still_owned {
                self.publish(SelectionState::Ready(owned.first().cloned()));
            }
        }
    }

    /// Back to `Uninitialized` on sign-out
    pub fn teardown(&self) {
        self.set_owned_list(Vec::new());
        self.publish(SelectionState::Uninitialized);
    }
}

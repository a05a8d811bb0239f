//! Selection context lifecycle and persistence

use kodo::selection::{SelectionContext, SelectionError, SelectionFile, SelectionState};
use tempfile::TempDir;

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_selection_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state").join("selection.yaml");

    let first = SelectionContext::new(Some(path.clone()));
    first.begin_loading();
    assert_eq!(first.resolve(ids(&["a", "b"])), Some("a".to_string()));
    first.select("b").unwrap();
    assert!(path.exists());

    let second = SelectionContext::new(Some(path));
    second.begin_loading();
    assert_eq!(second.resolve(ids(&["a", "b"])), Some("b".to_string()));
}

#[test]
fn test_persisted_cluster_no_longer_owned_falls_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("selection.yaml");
    SelectionFile::new(path.clone()).save("gone");

    let ctx = SelectionContext::new(Some(path));
    ctx.begin_loading();
    assert_eq!(ctx.resolve(ids(&["a", "b"])), Some("a".to_string()));
}

#[test]
fn test_unreadable_file_is_ignored() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("selection.yaml");
    std::fs::write(&path, "selectedClusterId: [not, a, string").unwrap();

    assert_eq!(SelectionFile::new(path.clone()).load(), None);
    let ctx = SelectionContext::new(Some(path));
    ctx.begin_loading();
    assert_eq!(ctx.resolve(ids(&["b"])), Some("b".to_string()));
}

#[test]
fn test_no_clusters_resolves_to_onboarding() {
    let ctx = SelectionContext::new(None);
    ctx.begin_loading();
    assert_eq!(ctx.resolve(Vec::new()), None);
    assert_eq!(ctx.state(), SelectionState::Ready(None));
    assert!(ctx.state().needs_onboarding());
}

#[test]
fn test_select_requires_ready_and_ownership() {
    let ctx = SelectionContext::new(None);
    assert_eq!(ctx.select("a"), Err(SelectionError::NotReady));

    ctx.begin_loading();
    assert_eq!(ctx.select("a"), Err(SelectionError::NotReady));

    ctx.resolve(ids(&["a"]));
    assert_eq!(
        ctx.select("b"),
        Err(SelectionError::NotOwned("b".to_string()))
    );
    assert_eq!(ctx.selected().as_deref(), Some("a"));
}

#[test]
fn test_deleted_selection_falls_back_to_first_remaining() {
    let ctx = SelectionContext::new(None);
    ctx.begin_loading();
    ctx.resolve(ids(&["a", "b", "c"]));
    ctx.select("b").unwrap();

    ctx.set_owned(ids(&["a", "c"]));
    assert_eq!(ctx.selected().as_deref(), Some("a"));

    // Losing an unselected cluster keeps the selection
    ctx.set_owned(ids(&["a"]));
    assert_eq!(ctx.selected().as_deref(), Some("a"));
    assert_eq!(ctx.owned(), ids(&["a"]));
}

#[test]
fn test_set_owned_before_ready_does_not_resolve() {
    let ctx = SelectionContext::new(None);
    ctx.begin_loading();
    ctx.set_owned(ids(&["a"]));
    assert_eq!(ctx.state(), SelectionState::Loading);
}

#[tokio::test]
async fn test_listeners_observe_changes() {
    let ctx = SelectionContext::new(None);
    let mut rx = ctx.subscribe();

    ctx.begin_loading();
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), SelectionState::Loading);

    ctx.resolve(ids(&["a", "b"]));
    ctx.select("b").unwrap();
    rx.changed().await.unwrap();
    // Intermediate states may be coalesced; the latest one is observed
    assert_eq!(
        *rx.borrow_and_update(),
        SelectionState::Ready(Some("b".to_string()))
    );

    ctx.teardown();
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow(), SelectionState::Uninitialized);
    assert!(ctx.owned().is_empty());
}

#[test]
fn test_clones_share_state() {
    let ctx = SelectionContext::new(None);
    let other = ctx.clone();
    ctx.begin_loading();
    ctx.resolve(ids(&["a"]));
    assert_eq!(other.selected().as_deref(), Some("a"));
}

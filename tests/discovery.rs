mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use common::{cat, monthly, orchestrator, series, Call, FakeRemote};
use fredsync::model::{Category, EntityKind};
use fredsync::sync::DiscoveryPacing;
use fredsync::tree::CategoryTree;
use fredsync::Error;

fn ids(categories: &[Category]) -> Vec<i64> {
  categories.iter().map(|c| c.id).collect()
}

fn id_set(categories: &[Category]) -> BTreeSet<i64> {
  categories.iter().map(|c| c.id).collect()
}

/// 0 ─┬─ 1 ─┬─ 2 ── 4
///    │     └─ 3
///    └─ 5
fn hierarchy() -> Arc<FakeRemote> {
  Arc::new(FakeRemote::new().with_categories(vec![
    cat(0, 0),
    cat(1, 0),
    cat(2, 1),
    cat(3, 1),
    cat(4, 2),
    cat(5, 0),
  ]))
}

#[tokio::test]
async fn test_remote_discovery_is_breadth_first_and_cached() {
  let remote = hierarchy();
  let orch = orchestrator(&remote);

  let found = orch.discover_category_tree(1).await.unwrap();
  assert_eq!(ids(&found), vec![1, 2, 3, 4]);
  assert_eq!(orch.store().count(EntityKind::Category).unwrap(), 4);
  assert_eq!(
    remote.calls(),
    vec![
      Call::Category(1),
      Call::Children(1),
      Call::Children(2),
      Call::Children(3),
      Call::Children(4),
    ]
  );
}

#[tokio::test]
async fn test_second_discovery_is_served_from_cache() {
  let remote = hierarchy();
  let orch = orchestrator(&remote);

  let first = orch.discover_category_tree(1).await.unwrap();
  remote.clear_calls();
  let second = orch.discover_category_tree(1).await.unwrap();

  assert_eq!(id_set(&first), id_set(&second));
  assert_eq!(remote.call_count(), 0);
}

#[tokio::test]
async fn test_super_root_is_returned_once() {
  let remote = hierarchy();
  let orch = orchestrator(&remote);

  let found = orch.discover_category_tree(0).await.unwrap();
  assert_eq!(found.len(), 6);
  assert_eq!(id_set(&found), (0..=5).collect());
  assert_eq!(found[0].id, 0);

  // The cached expansion sees the self-parented row too
  let cached = orch.discover_category_tree(0).await.unwrap();
  assert_eq!(cached.len(), 6);
  assert_eq!(id_set(&cached), id_set(&found));
}

#[tokio::test]
async fn test_already_cached_category_does_not_abort_discovery() {
  let remote = hierarchy();
  let orch = orchestrator(&remote);
  orch.store().insert_category(&cat(3, 1)).unwrap();

  let found = orch.discover_category_tree(1).await.unwrap();
  assert_eq!(ids(&found), vec![1, 2, 3, 4]);
  assert_eq!(orch.store().count(EntityKind::Category).unwrap(), 4);
}

#[tokio::test]
async fn test_unknown_root_is_not_found() {
  let remote = hierarchy();
  let orch = orchestrator(&remote);

  let err = orch.discover_category_tree(99).await.unwrap_err();
  assert!(matches!(err, Error::CategoryNotFound(99)));
  assert_eq!(orch.store().count(EntityKind::Category).unwrap(), 0);
}

#[tokio::test]
async fn test_leaf_discovery_returns_only_the_leaf() {
  let remote = hierarchy();
  let orch = orchestrator(&remote);

  let found = orch.discover_category_tree(4).await.unwrap();
  assert_eq!(ids(&found), vec![4]);
}

#[tokio::test]
async fn test_recursive_walk_matches_breadth_first_set() {
  let remote = hierarchy();
  let orch = orchestrator(&remote);

  let recursive = orch.discover_category_tree_recursive(1).await.unwrap();
  assert_eq!(ids(&recursive), vec![1, 2, 4, 3]);
  // Remote only: nothing cached
  assert_eq!(orch.store().count(EntityKind::Category).unwrap(), 0);

  let iterative = orch.discover_category_tree(1).await.unwrap();
  assert_eq!(id_set(&recursive), id_set(&iterative));
}

#[tokio::test]
async fn test_recursive_walk_from_super_root_terminates() {
  let remote = hierarchy();
  let orch = orchestrator(&remote);

  let recursive = orch.discover_category_tree_recursive(0).await.unwrap();
  assert_eq!(ids(&recursive), vec![0, 1, 2, 4, 3, 5]);
}

#[tokio::test]
async fn test_discovered_categories_build_a_tree() {
  let remote = hierarchy();
  let orch = orchestrator(&remote);

  let tree = CategoryTree::from_categories(orch.discover_category_tree(0).await.unwrap()).unwrap();
  assert_eq!(tree.size(), 6);
  assert_eq!(tree.root().id, 0);
  assert_eq!(ids_of(tree.children(0)), vec![1, 5]);
  assert_eq!(tree.parent(4).map(|c| c.id), Some(2));

  let branch = tree.subtree(2).unwrap();
  assert_eq!(branch.size(), 2);
  assert_eq!(branch.root().id, 2);
}

#[tokio::test]
async fn test_subtree_discovery_builds_a_tree() {
  let remote = hierarchy();
  let orch = orchestrator(&remote);

  let tree = CategoryTree::from_categories(orch.discover_category_tree(1).await.unwrap()).unwrap();
  assert_eq!(tree.root().id, 1);
  assert_eq!(tree.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_category_cached_for_a_series_is_still_discovered() {
  let remote = Arc::new(
    FakeRemote::new()
      .with_categories(vec![cat(0, 0), cat(106, 0), cat(107, 106), cat(108, 106)])
      .with_series(series("GDP", 106, "2024-03-01"), monthly("GDP", 3)),
  );
  let orch = orchestrator(&remote);

  orch.get_series(106).await.unwrap();
  assert!(orch.store().has_category(106).unwrap());
  assert!(orch.store().has_category(0).unwrap());

  let found = orch.discover_category_tree(106).await.unwrap();
  assert_eq!(ids(&found), vec![106, 107, 108]);

  remote.clear_calls();
  let cached = orch.discover_category_tree(106).await.unwrap();
  assert_eq!(ids(&cached), vec![106, 107, 108]);
  assert_eq!(remote.call_count(), 0);
}

#[tokio::test]
async fn test_series_owner_ancestors_are_cached() {
  let remote = Arc::new(
    FakeRemote::new()
      .with_categories(vec![cat(0, 0), cat(1, 0), cat(2, 1), cat(3, 2)])
      .with_series(series("DEEP", 3, "2024-03-01"), monthly("DEEP", 1)),
  );
  let orch = orchestrator(&remote);

  orch.update_series("DEEP").await.unwrap();
  for id in [0, 1, 2, 3] {
    assert!(orch.store().has_category(id).unwrap(), "category {} missing", id);
  }
  assert!(!orch.store().is_expanded(3).unwrap());

  // An owner that is already cached needs no category fetch
  remote.clear_calls();
  remote.set_series(series("SIBLING", 2, "2024-03-01"), monthly("SIBLING", 1));
  orch.update_series("SIBLING").await.unwrap();
  assert!(!remote.calls().iter().any(|c| matches!(c, Call::Category(_))));
}

#[tokio::test]
async fn test_interrupted_discovery_is_not_replayed_from_cache() {
  let remote = hierarchy();
  let orch = orchestrator(&remote);

  remote.fail_children_of(Some(3));
  let err = orch.discover_category_tree(1).await.unwrap_err();
  assert!(matches!(err, Error::RemoteRequestFailed { status: 429, .. }));
  assert!(orch.store().has_category(2).unwrap());
  assert!(!orch.store().is_expanded(1).unwrap());
  assert!(!orch.store().is_expanded(2).unwrap());

  remote.fail_children_of(None);
  let found = orch.discover_category_tree(1).await.unwrap();
  assert_eq!(ids(&found), vec![1, 2, 3, 4]);
  assert!(orch.store().is_expanded(4).unwrap());
}

fn paced() -> DiscoveryPacing {
  DiscoveryPacing {
    delay: Duration::from_millis(100),
    super_root_delay: Duration::from_millis(250),
  }
}

#[tokio::test(start_paused = true)]
async fn test_remote_discovery_waits_between_calls() {
  let remote = hierarchy();
  let orch = orchestrator(&remote).with_pacing(paced());

  let start = Instant::now();
  orch.discover_category_tree(1).await.unwrap();
  // One category fetch and four child listings: four gaps
  assert_eq!(remote.call_count(), 5);
  let elapsed = start.elapsed();
  assert!(elapsed >= Duration::from_millis(400), "{:?}", elapsed);
  assert!(elapsed < Duration::from_millis(500), "{:?}", elapsed);

  // Cached replay makes no remote calls and does not wait
  let start = Instant::now();
  orch.discover_category_tree(1).await.unwrap();
  assert!(start.elapsed() < Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_super_root_discovery_uses_longer_delay() {
  let remote = hierarchy();
  let orch = orchestrator(&remote).with_pacing(paced());

  let start = Instant::now();
  orch.discover_category_tree(0).await.unwrap();
  // One category fetch and six child listings: six gaps
  assert_eq!(remote.call_count(), 7);
  let elapsed = start.elapsed();
  assert!(elapsed >= Duration::from_millis(1500), "{:?}", elapsed);
  assert!(elapsed < Duration::from_millis(1750), "{:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_recursive_walk_waits_between_calls() {
  let remote = hierarchy();
  let orch = orchestrator(&remote).with_pacing(paced());

  let start = Instant::now();
  orch.discover_category_tree_recursive(1).await.unwrap();
  assert_eq!(remote.call_count(), 5);
  assert!(start.elapsed() >= Duration::from_millis(400));
}

fn ids_of(categories: Vec<&Category>) -> Vec<i64> {
  categories.into_iter().map(|c| c.id).collect()
}

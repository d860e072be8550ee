//! Read-through / write-back policy between the local store and the remote source.

use futures::future::BoxFuture;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};

use crate::db::LocalStore;
use crate::error::{Error, Result};
use crate::model::{Category, Observation, Series};
use crate::source::DataSource;

use super::pacing::{DiscoveryPacing, Pacer};

/// Outcome of [`SyncOrchestrator::update_category`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryUpdate {
  /// Series whose cached copy was replaced
  pub replaced: usize,
  /// Series already up to date
  pub fresh: usize,
}

impl CategoryUpdate {
  /// True when every series of the category had to be replaced.
  pub fn all_replaced(&self) -> bool {
    self.fresh == 0
  }
}

/// Decides per entity whether the cache is usable or must be refilled from
/// the remote source.
///
/// Owns the local store: build it once, use it, and release it with
/// [`SyncOrchestrator::close`]. Remote failures are passed through as-is;
/// nothing is retried here.
pub struct SyncOrchestrator<R: DataSource> {
  remote: R,
  store: LocalStore,
  pacing: DiscoveryPacing,
}

impl<R: DataSource> SyncOrchestrator<R> {
  pub fn new(remote: R, store: LocalStore) -> Self {
    Self {
      remote,
      store,
      pacing: DiscoveryPacing::default(),
    }
  }

  /// Set the delays used between remote calls during discovery.
  pub fn with_pacing(mut self, pacing: DiscoveryPacing) -> Self {
    self.pacing = pacing;
    self
  }

  pub fn store(&self) -> &LocalStore {
    &self.store
  }

  pub fn remote(&self) -> &R {
    &self.remote
  }

  /// Release the local store.
  pub fn close(self) -> Result<()> {
    self.store.close()
  }

  // ===== Series freshness =====

  /// A cached series is fresh when its `last_updated` date is not older than
  /// the remote one and it has at least one cached observation.
  pub fn is_stale(&self, remote: &Series) -> Result<bool> {
    let cached = match self.store.get_series(&remote.id) {
      Ok(cached) => cached,
      Err(e) if e.is_not_found() => return Ok(true),
      Err(e) => return Err(e),
    };

    if remote.last_updated_date() > cached.last_updated_date() {
      return Ok(true);
    }
    Ok(self.store.observation_count(&remote.id)? == 0)
  }

  /// Replace the cached series and all its observations when stale.
  /// Returns whether a replace happened.
  pub async fn sync_series(&self, remote: &Series) -> Result<bool> {
    if !self.is_stale(remote)? {
      debug!(series = %remote.id, "cached series is fresh");
      return Ok(false);
    }

    // Fetch before touching the cache so a remote failure leaves it intact
    let observations = self
      .remote
      .fetch_observations_by_series(&remote.id)
      .await?;
    self.ensure_category(remote.category_id).await?;
    self.store.replace_series(remote, &observations)?;

    info!(
      series = %remote.id,
      observations = observations.len(),
      "series refreshed from remote"
    );
    Ok(true)
  }

  /// Fetch the remote copy of one series and sync it.
  pub async fn update_series(&self, series_id: &str) -> Result<bool> {
    let remote = self.remote.fetch_series(series_id).await?;
    self.sync_series(&remote).await
  }

  /// Sync every remote series of a category.
  pub async fn update_category(&self, category_id: i64) -> Result<CategoryUpdate> {
    let series = self.remote.fetch_series_by_category(category_id).await?;
    let mut update = CategoryUpdate::default();
    for s in &series {
      if self.sync_series(s).await? {
        update.replaced += 1;
      } else {
        update.fresh += 1;
      }
    }
    info!(
      category = category_id,
      replaced = update.replaced,
      fresh = update.fresh,
      "category synced"
    );
    Ok(update)
  }

  // ===== Read-through =====

  /// Series of a category, from the cache when it has any, otherwise fetched
  /// and cached.
  ///
  /// A series is cached once, under the first category it was fetched for.
  /// A category whose every series is already cached under another category
  /// has no cached rows of its own and is fetched again on every call.
  pub async fn get_series(&self, category_id: i64) -> Result<Vec<Series>> {
    let cached = self.store.get_series_by_category(category_id)?;
    if !cached.is_empty() {
      debug!(category = category_id, count = cached.len(), "series cache hit");
      return Ok(cached);
    }

    let fetched = self.remote.fetch_series_by_category(category_id).await?;
    if fetched.is_empty() {
      return Ok(fetched);
    }

    self.ensure_category(category_id).await?;
    for series in &fetched {
      // A series listed under several categories is cached once, under the
      // first category it was seen in
      if self.store.has_series(&series.id)? {
        debug!(series = %series.id, "series already cached");
        continue;
      }
      self.store.insert_series(series)?;
    }
    info!(category = category_id, count = fetched.len(), "series cached");
    Ok(fetched)
  }

  /// Observations of a series, sorted by date.
  ///
  /// A series with no cached observations is fetched again on every call,
  /// including one whose history is really empty.
  pub async fn get_observations(&self, series_id: &str) -> Result<Vec<Observation>> {
    let mut observations = match self.store.get_series(series_id) {
      Ok(_) => {
        let cached = self.store.get_observations(series_id)?;
        if !cached.is_empty() {
          debug!(series = series_id, count = cached.len(), "observations cache hit");
          return Ok(cached);
        }
        let fetched = self.remote.fetch_observations_by_series(series_id).await?;
        self.store.insert_observations(&fetched)?;
        fetched
      }
      Err(e) if e.is_not_found() => {
        let series = self.remote.fetch_series(series_id).await?;
        let fetched = self.remote.fetch_observations_by_series(series_id).await?;
        self.ensure_category(series.category_id).await?;
        self.store.replace_series(&series, &fetched)?;
        fetched
      }
      Err(e) => return Err(e),
    };

    info!(series = series_id, count = observations.len(), "observations cached");
    observations.sort_by_key(|o| o.date);
    Ok(observations)
  }

  /// Make sure the category row a series points at exists, along with every
  /// ancestor up to the first one already cached or the top level.
  async fn ensure_category(&self, category_id: i64) -> Result<()> {
    let mut chain: Vec<Category> = Vec::new();
    let mut next = Some(category_id);
    while let Some(id) = next {
      if self.store.has_category(id)? || chain.iter().any(|c| c.id == id) {
        break;
      }
      let category = self.remote.fetch_category(id).await?;
      next = (category.parent_id != category.id).then_some(category.parent_id);
      chain.push(category);
    }

    // Parents before children
    for category in chain.iter().rev() {
      self.store.insert_category(category)?;
    }
    if !chain.is_empty() {
      debug!(category = category_id, cached = chain.len(), "category chain cached");
    }
    Ok(())
  }

  // ===== Category discovery =====

  /// `root_id` and every category below it, breadth-first.
  ///
  /// Served from the cache when an earlier remote discovery expanded the
  /// root. A root row cached only as the owner of a series does not count.
  /// Otherwise the remote source is walked with a fixed delay between calls
  /// and each category is cached as it is dequeued; a rejected write is
  /// logged and skipped. Categories are marked expanded once the walk is
  /// complete.
  pub async fn discover_category_tree(&self, root_id: i64) -> Result<Vec<Category>> {
    if self.store.is_expanded(root_id)? {
      let root = self.store.get_category(root_id)?;
      return self.expand_cached(root);
    }
    self.expand_remote(root_id).await
  }

  fn expand_cached(&self, root: Category) -> Result<Vec<Category>> {
    debug!(root = root.id, "expanding category tree from cache");
    let mut frontier = Frontier::new(root);
    let mut result = Vec::new();
    while let Some(current) = frontier.pop() {
      frontier.extend(self.store.get_categories_by_parent(current.id)?);
      result.push(current);
    }
    Ok(result)
  }

  async fn expand_remote(&self, root_id: i64) -> Result<Vec<Category>> {
    debug!(root = root_id, "expanding category tree from remote");
    let mut pacer = Pacer::new(self.pacing.delay_for(root_id));

    pacer.ready().await;
    let root = self.remote.fetch_category(root_id).await?;

    let mut frontier = Frontier::new(root);
    let mut result = Vec::new();
    while let Some(current) = frontier.pop() {
      pacer.ready().await;
      frontier.extend(self.remote.fetch_category_children(current.id).await?);
      self.insert_best_effort(&current)?;
      result.push(current);
    }

    // Only a walk that reached every leaf may be replayed from the cache
    for category in &result {
      best_effort(category.id, self.store.mark_expanded(category.id))?;
    }
    info!(root = root_id, count = result.len(), "category tree discovered");
    Ok(result)
  }

  fn insert_best_effort(&self, category: &Category) -> Result<()> {
    if self.store.has_category(category.id)? {
      return Ok(());
    }
    best_effort(category.id, self.store.insert_category(category))
  }

  /// Remote-only pre-order walk from `root_id`, root included. Nothing is
  /// cached. Yields the same set of categories as
  /// [`Self::discover_category_tree`], in a different order.
  pub async fn discover_category_tree_recursive(&self, root_id: i64) -> Result<Vec<Category>> {
    let mut walk = Walk {
      pacer: Pacer::new(self.pacing.delay_for(root_id)),
      seen: HashSet::new(),
      out: Vec::new(),
    };

    walk.pacer.ready().await;
    let root = self.remote.fetch_category(root_id).await?;
    self.walk(root, &mut walk).await?;
    Ok(walk.out)
  }

  fn walk<'a>(&'a self, category: Category, walk: &'a mut Walk) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
      if !walk.seen.insert(category.id) {
        return Ok(());
      }
      let id = category.id;
      walk.out.push(category);

      walk.pacer.ready().await;
      let children = self.remote.fetch_category_children(id).await?;
      for child in children {
        self.walk(child, &mut *walk).await?;
      }
      Ok(())
    })
  }
}

fn best_effort(category_id: i64, written: Result<()>) -> Result<()> {
  match written {
    Err(Error::WriteFailure { cause, .. }) => {
      warn!(category = category_id, "category not cached: {}", cause);
      Ok(())
    }
    other => other,
  }
}

/// State threaded through the recursive walk.
struct Walk {
  pacer: Pacer,
  seen: HashSet<i64>,
  out: Vec<Category>,
}

/// Breadth-first work queue that admits each category id once.
///
/// The provider lists its top level as a child of itself; without this the
/// super-root would be queued again and expanded forever.
struct Frontier {
  seen: HashSet<i64>,
  queue: VecDeque<Category>,
}

impl Frontier {
  fn new(root: Category) -> Self {
    Self {
      seen: HashSet::from([root.id]),
      queue: VecDeque::from([root]),
    }
  }

  fn pop(&mut self) -> Option<Category> {
    self.queue.pop_front()
  }

  fn extend(&mut self, children: Vec<Category>) {
    for child in children {
      if self.seen.insert(child.id) {
        self.queue.push_back(child);
      } else {
        debug!(category = child.id, "dropping repeated category");
      }
    }
  }
}

//! Retrieval capability shared by the remote provider and the local cache.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::model::{Category, Observation, Series};

/// Anything that can hand out categories, series and observations by id.
///
/// Implemented by [`crate::fred::FredClient`] (authoritative, remote) and by
/// [`crate::db::LocalStore`] (cache). The sync layer decides which one to ask.
///
/// Single-entity fetches fail with `CategoryNotFound` / `SeriesNotFound` when
/// nothing matches; collection fetches return an empty vector instead.
#[async_trait]
pub trait DataSource: Send + Sync {
  async fn fetch_category(&self, id: i64) -> Result<Category>;

  /// Direct children of `parent_id`.
  async fn fetch_category_children(&self, parent_id: i64) -> Result<Vec<Category>>;

  async fn fetch_series_by_category(&self, category_id: i64) -> Result<Vec<Series>>;

  async fn fetch_series(&self, series_id: &str) -> Result<Series>;

  async fn fetch_observations_by_series(&self, series_id: &str) -> Result<Vec<Observation>>;
}

#[async_trait]
impl<T: DataSource + ?Sized> DataSource for Arc<T> {
  async fn fetch_category(&self, id: i64) -> Result<Category> {
    (**self).fetch_category(id).await
  }

  async fn fetch_category_children(&self, parent_id: i64) -> Result<Vec<Category>> {
    (**self).fetch_category_children(parent_id).await
  }

  async fn fetch_series_by_category(&self, category_id: i64) -> Result<Vec<Series>> {
    (**self).fetch_series_by_category(category_id).await
  }

  async fn fetch_series(&self, series_id: &str) -> Result<Series> {
    (**self).fetch_series(series_id).await
  }

  async fn fetch_observations_by_series(&self, series_id: &str) -> Result<Vec<Observation>> {
    (**self).fetch_observations_by_series(series_id).await
  }
}

//! Scripted in-memory remote used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate, TimeZone};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use fredsync::db::LocalStore;
use fredsync::model::{Category, Frequency, Observation, Series};
use fredsync::source::DataSource;
use fredsync::sync::{DiscoveryPacing, SyncOrchestrator};
use fredsync::{Error, Result};

/// One call made against [`FakeRemote`], in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
  Category(i64),
  Children(i64),
  SeriesByCategory(i64),
  Series(String),
  Observations(String),
}

#[derive(Default)]
pub struct FakeRemote {
  categories: Mutex<Vec<Category>>,
  /// (series, categories listing it)
  series: Mutex<Vec<(Series, Vec<i64>)>>,
  observations: Mutex<HashMap<String, Vec<Observation>>>,
  fail_observations: Mutex<bool>,
  fail_children_of: Mutex<Option<i64>>,
  calls: Mutex<Vec<Call>>,
}

impl FakeRemote {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_categories(self, categories: Vec<Category>) -> Self {
    self.categories.lock().unwrap().extend(categories);
    self
  }

  pub fn with_series(self, series: Series, observations: Vec<Observation>) -> Self {
    self.set_series(series, observations);
    self
  }

  /// Add or replace a series on the remote side.
  pub fn set_series(&self, series: Series, observations: Vec<Observation>) {
    let mut all = self.series.lock().unwrap();
    all.retain(|(s, _)| s.id != series.id);
    self
      .observations
      .lock()
      .unwrap()
      .insert(series.id.clone(), observations);
    let listed_in = vec![series.category_id];
    all.push((series, listed_in));
  }

  /// Also list an existing series under `category_id`.
  pub fn list_series_under(&self, series_id: &str, category_id: i64) {
    let mut all = self.series.lock().unwrap();
    if let Some((_, listed_in)) = all.iter_mut().find(|(s, _)| s.id == series_id) {
      listed_in.push(category_id);
    }
  }

  pub fn fail_observations(&self, fail: bool) {
    *self.fail_observations.lock().unwrap() = fail;
  }

  /// Make the child listing of `parent_id` fail, or stop failing with `None`.
  pub fn fail_children_of(&self, parent_id: Option<i64>) {
    *self.fail_children_of.lock().unwrap() = parent_id;
  }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.lock().unwrap().clone()
  }

  pub fn call_count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }

  pub fn clear_calls(&self) {
    self.calls.lock().unwrap().clear();
  }

  fn record(&self, call: Call) {
    self.calls.lock().unwrap().push(call);
  }
}

#[async_trait]
impl DataSource for FakeRemote {
  async fn fetch_category(&self, id: i64) -> Result<Category> {
    self.record(Call::Category(id));
    self
      .categories
      .lock()
      .unwrap()
      .iter()
      .find(|c| c.id == id)
      .cloned()
      .ok_or(Error::CategoryNotFound(id))
  }

  /// Like the real provider, the super-root is listed among its own children.
  async fn fetch_category_children(&self, parent_id: i64) -> Result<Vec<Category>> {
    self.record(Call::Children(parent_id));
    if *self.fail_children_of.lock().unwrap() == Some(parent_id) {
      return Err(Error::RemoteRequestFailed {
        status: 429,
        body: "Too Many Requests".to_string(),
      });
    }
    Ok(
      self
        .categories
        .lock()
        .unwrap()
        .iter()
        .filter(|c| c.parent_id == parent_id)
        .cloned()
        .collect(),
    )
  }

  async fn fetch_series_by_category(&self, category_id: i64) -> Result<Vec<Series>> {
    self.record(Call::SeriesByCategory(category_id));
    Ok(
      self
        .series
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, listed_in)| listed_in.contains(&category_id))
        .map(|(s, _)| Series {
          category_id,
          ..s.clone()
        })
        .collect(),
    )
  }

  async fn fetch_series(&self, series_id: &str) -> Result<Series> {
    self.record(Call::Series(series_id.to_string()));
    self
      .series
      .lock()
      .unwrap()
      .iter()
      .find(|(s, _)| s.id == series_id)
      .map(|(s, _)| s.clone())
      .ok_or_else(|| Error::SeriesNotFound(series_id.to_string()))
  }

  async fn fetch_observations_by_series(&self, series_id: &str) -> Result<Vec<Observation>> {
    self.record(Call::Observations(series_id.to_string()));
    if *self.fail_observations.lock().unwrap() {
      return Err(Error::RemoteRequestFailed {
        status: 500,
        body: "Internal Server Error".to_string(),
      });
    }
    Ok(
      self
        .observations
        .lock()
        .unwrap()
        .get(series_id)
        .cloned()
        .unwrap_or_default(),
    )
  }
}

pub fn orchestrator(remote: &Arc<FakeRemote>) -> SyncOrchestrator<Arc<FakeRemote>> {
  let store = LocalStore::open_in_memory().unwrap();
  SyncOrchestrator::new(Arc::clone(remote), store).with_pacing(DiscoveryPacing::none())
}

pub fn cat(id: i64, parent_id: i64) -> Category {
  Category::new(id, format!("Category {}", id), parent_id)
}

pub fn date(s: &str) -> NaiveDate {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// A monthly series last updated at `updated` 07:51 US Central.
pub fn series(id: &str, category_id: i64, updated: &str) -> Series {
  series_at(id, category_id, updated, 7)
}

pub fn series_at(id: &str, category_id: i64, updated: &str, hour: u32) -> Series {
  let offset = FixedOffset::west_opt(5 * 3600).unwrap();
  let day = date(updated);
  let last_updated = offset
    .from_local_datetime(&day.and_hms_opt(hour, 51, 0).unwrap())
    .unwrap();
  Series {
    id: id.to_string(),
    title: format!("Series {}", id),
    last_updated,
    observation_start: date("2020-01-01"),
    observation_end: day,
    frequency: Frequency::Monthly,
    category_id,
  }
}

pub fn obs(series_id: &str, day: &str, value: f64) -> Observation {
  Observation::new(date(day), value, series_id)
}

/// `n` monthly observations starting January 2020.
pub fn monthly(series_id: &str, n: u32) -> Vec<Observation> {
  (1..=n)
    .map(|m| {
      let day = NaiveDate::from_ymd_opt(2020 + ((m - 1) / 12) as i32, (m - 1) % 12 + 1, 1).unwrap();
      Observation::new(day, m as f64, series_id)
    })
    .collect()
}

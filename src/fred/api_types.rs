//! Serde-deserializable types matching FRED API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs. Each entity kind
//! has its own decoder; there is no catch-all parse.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::Deserialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::model::{Category, Frequency, Observation, Series};

/// Value FRED reports for an observation with no data
pub const MISSING_VALUE: &str = ".";

// ============================================================================
// Categories (category, category/children, series/categories)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiCategory {
  pub id: i64,
  pub name: String,
  #[serde(default)]
  pub parent_id: i64,
}

impl From<ApiCategory> for Category {
  fn from(c: ApiCategory) -> Self {
    Category {
      id: c.id,
      name: c.name,
      parent_id: c.parent_id,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiCategoriesResponse {
  #[serde(default)]
  pub categories: Vec<ApiCategory>,
}

// ============================================================================
// Series (category/series, series)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiSeries {
  pub id: String,
  pub title: String,
  pub last_updated: String,
  pub observation_start: String,
  pub observation_end: String,
  #[serde(default)]
  pub frequency: String,
  #[serde(default)]
  pub frequency_short: String,
}

impl ApiSeries {
  pub fn into_series(self, category_id: i64) -> Result<Series> {
    let frequency: Frequency = self.frequency_short.parse().map_err(|_| {
      Error::Decode(format!(
        "series {} has unsupported frequency '{}' ({})",
        self.id, self.frequency_short, self.frequency
      ))
    })?;

    Ok(Series {
      last_updated: parse_last_updated(&self.last_updated)?,
      observation_start: parse_date(&self.observation_start)?,
      observation_end: parse_date(&self.observation_end)?,
      frequency,
      category_id,
      title: self.title,
      id: self.id,
    })
  }
}

/// FRED spells the collection "seriess".
#[derive(Debug, Deserialize)]
pub struct ApiSeriesResponse {
  #[serde(default)]
  pub seriess: Vec<ApiSeries>,
}

// ============================================================================
// Observations (series/observations)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiObservation {
  pub date: String,
  pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiObservationsResponse {
  #[serde(default)]
  pub observations: Vec<ApiObservation>,
}

// ============================================================================
// Decoders
// ============================================================================

pub fn decode_categories(body: &str) -> Result<Vec<Category>> {
  let response: ApiCategoriesResponse = from_json(body)?;
  Ok(response.categories.into_iter().map(Category::from).collect())
}

/// Decode a series collection, tagging each series with its owning category.
/// Series with a frequency outside [`Frequency`] are skipped with a warning.
pub fn decode_series(body: &str, category_id: i64) -> Result<Vec<Series>> {
  let response: ApiSeriesResponse = from_json(body)?;
  let mut series = Vec::with_capacity(response.seriess.len());
  for api_series in response.seriess {
    if api_series.frequency_short.parse::<Frequency>().is_err() {
      warn!(
        series = %api_series.id,
        frequency = %api_series.frequency_short,
        "skipping series with unsupported frequency"
      );
      continue;
    }
    series.push(api_series.into_series(category_id)?);
  }
  Ok(series)
}

/// Decode observations, dropping entries that carry [`MISSING_VALUE`].
pub fn decode_observations(body: &str, series_id: &str) -> Result<Vec<Observation>> {
  let response: ApiObservationsResponse = from_json(body)?;
  response
    .observations
    .into_iter()
    .filter(|o| o.value.trim() != MISSING_VALUE)
    .map(|o| {
      let value: f64 = o.value.trim().parse().map_err(|e| {
        Error::Decode(format!(
          "bad value '{}' on {} for series {}: {}",
          o.value, o.date, series_id, e
        ))
      })?;
      Ok(Observation {
        date: parse_date(&o.date)?,
        value,
        series_id: series_id.to_string(),
      })
    })
    .collect()
}

fn from_json<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T> {
  serde_json::from_str(body).map_err(|e| Error::Decode(e.to_string()))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::Decode(format!("bad date '{}': {}", s, e)))
}

/// Parse FRED's `last_updated`, e.g. `2013-07-31 09:26:16-05`.
/// RFC 3339 and bare dates (taken as UTC midnight) are accepted too.
pub fn parse_last_updated(s: &str) -> Result<DateTime<FixedOffset>> {
  let s = s.trim();
  if let Ok(ts) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%#z") {
    return Ok(ts);
  }
  if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
    return Ok(ts);
  }
  let date = parse_date(s)
    .map_err(|_| Error::Decode(format!("bad last_updated timestamp '{}'", s)))?;
  Ok(date.and_time(NaiveTime::MIN).and_utc().fixed_offset())
}

//! Plain records for categories, series and observations.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Reserved id of the provider's top-level category. It is also the
/// `parent_id` the provider reports for the top level itself.
pub const SUPER_ROOT_ID: i64 = 0;

/// A node in the provider's subject hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
  pub id: i64,
  pub name: String,
  pub parent_id: i64,
}

impl Category {
  pub fn new(id: i64, name: impl Into<String>, parent_id: i64) -> Self {
    Self {
      id,
      name: name.into(),
      parent_id,
    }
  }
}

impl fmt::Display for Category {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} (id {}, parent {})", self.name, self.id, self.parent_id)
  }
}

/// Sampling frequency of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
  Daily,
  Weekly,
  Biweekly,
  Monthly,
  Quarterly,
  Semiannual,
  Annual,
}

impl Frequency {
  /// The provider's short code, also the stored form.
  pub fn short(&self) -> &'static str {
    match self {
      Frequency::Daily => "D",
      Frequency::Weekly => "W",
      Frequency::Biweekly => "BW",
      Frequency::Monthly => "M",
      Frequency::Quarterly => "Q",
      Frequency::Semiannual => "SA",
      Frequency::Annual => "A",
    }
  }
}

impl FromStr for Frequency {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_uppercase().as_str() {
      "D" => Ok(Frequency::Daily),
      "W" => Ok(Frequency::Weekly),
      "BW" => Ok(Frequency::Biweekly),
      "M" => Ok(Frequency::Monthly),
      "Q" => Ok(Frequency::Quarterly),
      "SA" => Ok(Frequency::Semiannual),
      "A" => Ok(Frequency::Annual),
      other => Err(Error::Decode(format!("unknown frequency '{}'", other))),
    }
  }
}

impl fmt::Display for Frequency {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.short())
  }
}

/// A dated, frequency-tagged sequence owned by one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
  pub id: String,
  pub title: String,
  pub last_updated: DateTime<FixedOffset>,
  pub observation_start: NaiveDate,
  pub observation_end: NaiveDate,
  pub frequency: Frequency,
  pub category_id: i64,
}

impl Series {
  /// Calendar date of the last update, in the provider's own offset.
  /// Freshness is decided on this, not on the full timestamp.
  pub fn last_updated_date(&self) -> NaiveDate {
    self.last_updated.date_naive()
  }
}

impl fmt::Display for Series {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}: {} [{}] {}..{} (updated {})",
      self.id,
      self.title,
      self.frequency,
      self.observation_start,
      self.observation_end,
      self.last_updated_date()
    )
  }
}

/// One dated sample of a series. `value` may be NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
  pub date: NaiveDate,
  pub value: f64,
  pub series_id: String,
}

impl Observation {
  pub fn new(date: NaiveDate, value: f64, series_id: impl Into<String>) -> Self {
    Self {
      date,
      value,
      series_id: series_id.into(),
    }
  }
}

/// The closed set of entity kinds held by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
  Category,
  Series,
  Observation,
}

impl EntityKind {
  /// Backing table name
  pub fn table(&self) -> &'static str {
    match self {
      EntityKind::Category => "categories",
      EntityKind::Series => "series",
      EntityKind::Observation => "observables",
    }
  }
}

impl FromStr for EntityKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "category" | "categories" => Ok(EntityKind::Category),
      "series" => Ok(EntityKind::Series),
      "observation" | "observations" | "observables" => Ok(EntityKind::Observation),
      other => Err(Error::UnsupportedEntityKind(other.to_string())),
    }
  }
}

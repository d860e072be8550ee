//! SQLite-backed local cache of categories, series and observations.

pub mod schema;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use rusqlite::{params, Connection, Params, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{Category, EntityKind, Observation, Series};
use crate::source::DataSource;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Persistent cache keyed by the provider's natural ids.
///
/// One connection per store. Every write commits on its own; `replace_series`
/// and `insert_observations` group their statements in one transaction.
/// Release the connection with [`LocalStore::close`].
pub struct LocalStore {
  conn: Mutex<Connection>,
}

impl LocalStore {
  /// Open or create the database at `path`. A missing `.db` extension is added.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = normalize_db_path(path.as_ref());

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      if !parent.as_os_str().is_empty() {
        std::fs::create_dir_all(parent)?;
      }
    }

    let conn = Connection::open(&path)?;
    debug!(path = %path.display(), "opened local store");
    Self::from_connection(conn)
  }

  /// Volatile store, used by tests and dry runs.
  pub fn open_in_memory() -> Result<Self> {
    Self::from_connection(Connection::open_in_memory()?)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.execute_batch(schema::SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Close the underlying connection, surfacing any error SQLite reports.
  pub fn close(self) -> Result<()> {
    let conn = self.conn.into_inner().map_err(|_| Error::LockPoisoned)?;
    conn.close().map_err(|(_, e)| Error::Storage(e))
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|_| Error::LockPoisoned)
  }

  /// Run a read-only statement and map every row.
  fn read<T, P, F>(&self, sql: &str, params: P, map: F) -> Result<Vec<T>>
  where
    P: Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
  {
    let conn = self.lock()?;
    let mut stmt = conn.prepare(sql)?;
    if !stmt.readonly() {
      return Err(Error::InvalidQuery(sql.to_string()));
    }
    let rows = stmt
      .query_map(params, map)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
  }

  fn write<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
    let conn = self.lock()?;
    execute_write(&conn, sql, params)
  }

  // ===== Categories =====

  pub fn get_category(&self, id: i64) -> Result<Category> {
    self
      .read(
        "SELECT category_id, name, parent_id FROM categories WHERE category_id = ?1",
        params![id],
        category_from_row,
      )?
      .into_iter()
      .next()
      .ok_or(Error::CategoryNotFound(id))
  }

  /// Direct children of `parent_id`; empty when there are none.
  pub fn get_categories_by_parent(&self, parent_id: i64) -> Result<Vec<Category>> {
    self.read(
      "SELECT category_id, name, parent_id FROM categories
       WHERE parent_id = ?1
       ORDER BY category_id",
      params![parent_id],
      category_from_row,
    )
  }

  pub fn has_category(&self, id: i64) -> Result<bool> {
    let rows = self.read(
      "SELECT 1 FROM categories WHERE category_id = ?1",
      params![id],
      |row| row.get::<_, i64>(0),
    )?;
    Ok(!rows.is_empty())
  }

  pub fn insert_category(&self, category: &Category) -> Result<()> {
    self.write(
      "INSERT INTO categories (category_id, name, parent_id) VALUES (?1, ?2, ?3)",
      params![category.id, category.name, category.parent_id],
    )?;
    Ok(())
  }

  /// Record that every child of `id` has been cached.
  pub fn mark_expanded(&self, id: i64) -> Result<()> {
    self.write(
      "INSERT OR IGNORE INTO expanded_categories (category_id) VALUES (?1)",
      params![id],
    )?;
    Ok(())
  }

  /// Whether the children of `id` were cached by a remote discovery. A
  /// category row alone says nothing about its children.
  pub fn is_expanded(&self, id: i64) -> Result<bool> {
    let rows = self.read(
      "SELECT 1 FROM expanded_categories WHERE category_id = ?1",
      params![id],
      |row| row.get::<_, i64>(0),
    )?;
    Ok(!rows.is_empty())
  }

  // ===== Series =====

  pub fn get_series(&self, id: &str) -> Result<Series> {
    let row = self
      .read(
        "SELECT series_id, title, last_updated, observation_start, observation_end,
                frequency_short, category_id
         FROM series WHERE series_id = ?1",
        params![id],
        SeriesRow::from_row,
      )?
      .into_iter()
      .next()
      .ok_or_else(|| Error::SeriesNotFound(id.to_string()))?;
    row.into_series()
  }

  pub fn get_series_by_category(&self, category_id: i64) -> Result<Vec<Series>> {
    self
      .read(
        "SELECT series_id, title, last_updated, observation_start, observation_end,
                frequency_short, category_id
         FROM series WHERE category_id = ?1
         ORDER BY series_id",
        params![category_id],
        SeriesRow::from_row,
      )?
      .into_iter()
      .map(SeriesRow::into_series)
      .collect()
  }

  pub fn has_series(&self, id: &str) -> Result<bool> {
    let rows = self.read(
      "SELECT 1 FROM series WHERE series_id = ?1",
      params![id],
      |row| row.get::<_, i64>(0),
    )?;
    Ok(!rows.is_empty())
  }

  pub fn insert_series(&self, series: &Series) -> Result<()> {
    let conn = self.lock()?;
    insert_series_with(&conn, series)
  }

  /// Delete a series; its observations go with it through the foreign key.
  pub fn delete_series(&self, id: &str) -> Result<()> {
    self.write("DELETE FROM series WHERE series_id = ?1", params![id])?;
    Ok(())
  }

  /// Whole-entity replace: drop any cached row for `series.id`, then insert
  /// the series and the full observation batch in one transaction.
  pub fn replace_series(&self, series: &Series, observations: &[Observation]) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    execute_write(&tx, "DELETE FROM series WHERE series_id = ?1", params![series.id])?;
    insert_series_with(&tx, series)?;
    for observation in observations {
      insert_observation_with(&tx, observation)?;
    }
    tx.commit()?;
    debug!(
      series = %series.id,
      observations = observations.len(),
      "replaced cached series"
    );
    Ok(())
  }

  // ===== Observations =====

  /// Observations of a series ordered by date.
  pub fn get_observations(&self, series_id: &str) -> Result<Vec<Observation>> {
    self
      .read(
        "SELECT date, value, series_id FROM observables
         WHERE series_id = ?1
         ORDER BY date, id",
        params![series_id],
        |row| {
          Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<f64>>(1)?,
            row.get::<_, String>(2)?,
          ))
        },
      )?
      .into_iter()
      .map(|(date, value, series_id)| {
        Ok(Observation {
          date: parse_date(&date)?,
          value: value.unwrap_or(f64::NAN),
          series_id,
        })
      })
      .collect()
  }

  pub fn observation_count(&self, series_id: &str) -> Result<usize> {
    let count = self.read(
      "SELECT COUNT(*) FROM observables WHERE series_id = ?1",
      params![series_id],
      |row| row.get::<_, i64>(0),
    )?;
    Ok(count.first().copied().unwrap_or(0) as usize)
  }

  pub fn insert_observation(&self, observation: &Observation) -> Result<()> {
    let conn = self.lock()?;
    insert_observation_with(&conn, observation)
  }

  /// Insert a batch atomically; nothing is kept if one row is rejected.
  pub fn insert_observations(&self, observations: &[Observation]) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    for observation in observations {
      insert_observation_with(&tx, observation)?;
    }
    tx.commit()?;
    Ok(())
  }

  /// Number of cached rows of the given kind.
  pub fn count(&self, kind: EntityKind) -> Result<usize> {
    let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
    let count = self.read(&sql, [], |row| row.get::<_, i64>(0))?;
    Ok(count.first().copied().unwrap_or(0) as usize)
  }
}

#[async_trait]
impl DataSource for LocalStore {
  async fn fetch_category(&self, id: i64) -> Result<Category> {
    self.get_category(id)
  }

  async fn fetch_category_children(&self, parent_id: i64) -> Result<Vec<Category>> {
    self.get_categories_by_parent(parent_id)
  }

  async fn fetch_series_by_category(&self, category_id: i64) -> Result<Vec<Series>> {
    self.get_series_by_category(category_id)
  }

  async fn fetch_series(&self, series_id: &str) -> Result<Series> {
    self.get_series(series_id)
  }

  async fn fetch_observations_by_series(&self, series_id: &str) -> Result<Vec<Observation>> {
    self.get_observations(series_id)
  }
}

/// Append `.db` unless the path already carries that extension.
pub fn normalize_db_path(path: &Path) -> PathBuf {
  match path.extension() {
    Some(ext) if ext == "db" => path.to_path_buf(),
    _ => {
      let mut name = path.as_os_str().to_os_string();
      name.push(".db");
      PathBuf::from(name)
    }
  }
}

fn execute_write<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<usize> {
  let mut stmt = conn.prepare(sql).map_err(|cause| Error::WriteFailure {
    query: sql.to_string(),
    cause,
  })?;
  if stmt.readonly() {
    return Err(Error::InvalidQuery(sql.to_string()));
  }
  stmt.execute(params).map_err(|cause| Error::WriteFailure {
    query: sql.to_string(),
    cause,
  })
}

fn insert_series_with(conn: &Connection, series: &Series) -> Result<()> {
  execute_write(
    conn,
    "INSERT INTO series (series_id, title, last_updated, observation_start, observation_end,
                         frequency_short, category_id)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    params![
      series.id,
      series.title,
      series.last_updated.to_rfc3339(),
      series.observation_start.format(DATE_FORMAT).to_string(),
      series.observation_end.format(DATE_FORMAT).to_string(),
      series.frequency.short(),
      series.category_id,
    ],
  )?;
  Ok(())
}

fn insert_observation_with(conn: &Connection, observation: &Observation) -> Result<()> {
  // NaN is stored as NULL and read back as NaN
  let value = (!observation.value.is_nan()).then_some(observation.value);
  execute_write(
    conn,
    "INSERT INTO observables (date, value, series_id) VALUES (?1, ?2, ?3)",
    params![
      observation.date.format(DATE_FORMAT).to_string(),
      value,
      observation.series_id,
    ],
  )?;
  Ok(())
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
  Ok(Category {
    id: row.get(0)?,
    name: row.get(1)?,
    parent_id: row.get(2)?,
  })
}

/// Raw `series` row; text columns are parsed outside the rusqlite closure.
struct SeriesRow {
  id: String,
  title: String,
  last_updated: String,
  observation_start: String,
  observation_end: String,
  frequency_short: String,
  category_id: i64,
}

impl SeriesRow {
  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id: row.get(0)?,
      title: row.get(1)?,
      last_updated: row.get(2)?,
      observation_start: row.get(3)?,
      observation_end: row.get(4)?,
      frequency_short: row.get(5)?,
      category_id: row.get(6)?,
    })
  }

  fn into_series(self) -> Result<Series> {
    let last_updated = DateTime::parse_from_rfc3339(&self.last_updated).map_err(|e| {
      Error::Decode(format!(
        "bad last_updated '{}' for series {}: {}",
        self.last_updated, self.id, e
      ))
    })?;
    Ok(Series {
      last_updated,
      observation_start: parse_date(&self.observation_start)?,
      observation_end: parse_date(&self.observation_end)?,
      frequency: self.frequency_short.parse()?,
      category_id: self.category_id,
      title: self.title,
      id: self.id,
    })
  }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT)
    .map_err(|e| Error::Decode(format!("bad date '{}': {}", s, e)))
}

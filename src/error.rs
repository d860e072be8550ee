//! Error taxonomy shared by the store, the remote client, the sync layer and the tree.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
  #[error("Request has failed with HTTP code {status}: {body}")]
  RemoteRequestFailed { status: u16, body: String },

  #[error("Network error: {0}")]
  Network(#[from] reqwest::Error),

  #[error("Invalid URL: {0}")]
  Url(#[from] url::ParseError),

  #[error("Invalid response: {0}")]
  Decode(String),

  #[error("Category with id {0} not found")]
  CategoryNotFound(i64),

  #[error("Series with id {0} not found")]
  SeriesNotFound(String),

  #[error("Invalid query: {0}")]
  InvalidQuery(String),

  #[error("Query {query} has failed with error: {cause}")]
  WriteFailure {
    query: String,
    #[source]
    cause: rusqlite::Error,
  },

  #[error("Entity kind not supported: {0}")]
  UnsupportedEntityKind(String),

  #[error("Storage error: {0}")]
  Storage(#[from] rusqlite::Error),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Lock poisoned")]
  LockPoisoned,

  #[error("No root category found in batch")]
  NoTreeRoot,

  #[error("More than one root candidate in batch: {0:?}")]
  AmbiguousTreeRoot(Vec<i64>),

  #[error("Category {0} appears more than once in batch")]
  DuplicateCategory(i64),

  #[error("Categories not reachable from the root: {0:?}")]
  DisconnectedCategories(Vec<i64>),
}

impl Error {
  /// True for the empty-result lookups the sync layer recovers from.
  pub fn is_not_found(&self) -> bool {
    matches!(self, Error::CategoryNotFound(_) | Error::SeriesNotFound(_))
  }
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl Error {
  pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
    let body = if body.len() <= MAX_ERROR_BODY_LENGTH {
      body.to_string()
    } else {
      let mut end = MAX_ERROR_BODY_LENGTH;
      while !body.is_char_boundary(end) {
        end -= 1;
      }
      format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    };
    Error::RemoteRequestFailed {
      status: status.as_u16(),
      body,
    }
  }
}

pub type Result<T> = std::result::Result<T, Error>;

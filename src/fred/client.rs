use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::fred::api_types::{decode_categories, decode_observations, decode_series};
use crate::model::{Category, Observation, Series, SUPER_ROOT_ID};
use crate::source::DataSource;

/// Base URL of the FRED REST API
pub const FRED_URL: &str = "https://api.stlouisfed.org/fred";

/// HTTP request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// FRED API client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct FredClient {
  client: Client,
  base_url: String,
  api_key: String,
}

impl FredClient {
  pub fn new(api_key: impl Into<String>) -> Result<Self> {
    Self::with_base_url(FRED_URL, api_key, Duration::from_secs(REQUEST_TIMEOUT_SECS))
  }

  pub fn with_base_url(
    base_url: &str,
    api_key: impl Into<String>,
    timeout: Duration,
  ) -> Result<Self> {
    // Validate early so a bad config fails before the first request
    Url::parse(base_url)?;

    let client = Client::builder().timeout(timeout).build()?;

    Ok(Self {
      client,
      base_url: base_url.trim_end_matches('/').to_string(),
      api_key: api_key.into(),
    })
  }

  /// Build `<base>/<endpoint>?<params>&api_key=..&file_type=json`.
  fn endpoint_url(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/{}", self.base_url, endpoint))?;
    url
      .query_pairs_mut()
      .extend_pairs(params)
      .append_pair("api_key", &self.api_key)
      .append_pair("file_type", "json");
    Ok(url)
  }

  /// GET an endpoint and return the body. Any non-success status is a hard
  /// failure; retrying is left to the caller.
  async fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String> {
    let url = self.endpoint_url(endpoint, params)?;
    debug!(endpoint, ?params, "FRED request");

    // The credential is part of the URL, so it is stripped from transport errors
    let response = self
      .client
      .get(url)
      .send()
      .await
      .map_err(|e| Error::Network(e.without_url()))?;
    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| Error::Network(e.without_url()))?;

    if !status.is_success() {
      return Err(Error::from_status(status, &body));
    }
    Ok(body)
  }
}

#[async_trait]
impl DataSource for FredClient {
  async fn fetch_category(&self, id: i64) -> Result<Category> {
    let id_param = id.to_string();
    let body = self.get("category", &[("category_id", &id_param)]).await?;
    decode_categories(&body)?
      .into_iter()
      .next()
      .ok_or(Error::CategoryNotFound(id))
  }

  async fn fetch_category_children(&self, parent_id: i64) -> Result<Vec<Category>> {
    let id_param = parent_id.to_string();
    let body = self
      .get("category/children", &[("category_id", &id_param)])
      .await?;
    decode_categories(&body)
  }

  async fn fetch_series_by_category(&self, category_id: i64) -> Result<Vec<Series>> {
    let id_param = category_id.to_string();
    let body = self
      .get("category/series", &[("category_id", &id_param)])
      .await?;
    decode_series(&body, category_id)
  }

  /// The `series` endpoint does not say which category owns the series, so
  /// the first entry of `series/categories` is used (the super-root if none).
  async fn fetch_series(&self, series_id: &str) -> Result<Series> {
    let body = self
      .get("series/categories", &[("series_id", series_id)])
      .await?;
    let category_id = decode_categories(&body)?
      .first()
      .map(|c| c.id)
      .unwrap_or(SUPER_ROOT_ID);

    let body = self.get("series", &[("series_id", series_id)]).await?;
    decode_series(&body, category_id)?
      .into_iter()
      .next()
      .ok_or_else(|| Error::SeriesNotFound(series_id.to_string()))
  }

  async fn fetch_observations_by_series(&self, series_id: &str) -> Result<Vec<Observation>> {
    let body = self
      .get("series/observations", &[("series_id", series_id)])
      .await?;
    decode_observations(&body, series_id)
  }
}

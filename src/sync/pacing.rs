//! Client-side request pacing for bulk category discovery.

use serde::Deserialize;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::model::SUPER_ROOT_ID;

/// Default gap between consecutive remote calls.
pub const DEFAULT_DELAY_MS: u64 = 350;

/// Gap used when discovering from the super-root, whose fan-out is largest.
pub const DEFAULT_SUPER_ROOT_DELAY_MS: u64 = 800;

/// Fixed delays applied between remote calls during discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DiscoveryPacing {
  #[serde(rename = "delay_ms", with = "millis", default = "default_delay")]
  pub delay: Duration,
  #[serde(
    rename = "super_root_delay_ms",
    with = "millis",
    default = "default_super_root_delay"
  )]
  pub super_root_delay: Duration,
}

impl Default for DiscoveryPacing {
  fn default() -> Self {
    Self {
      delay: default_delay(),
      super_root_delay: default_super_root_delay(),
    }
  }
}

impl DiscoveryPacing {
  /// No delay at all. Meant for tests and local fakes.
  pub fn none() -> Self {
    Self {
      delay: Duration::ZERO,
      super_root_delay: Duration::ZERO,
    }
  }

  /// Delay to use for a discovery rooted at `root_id`.
  pub fn delay_for(&self, root_id: i64) -> Duration {
    if root_id == SUPER_ROOT_ID {
      self.super_root_delay
    } else {
      self.delay
    }
  }
}

fn default_delay() -> Duration {
  Duration::from_millis(DEFAULT_DELAY_MS)
}

fn default_super_root_delay() -> Duration {
  Duration::from_millis(DEFAULT_SUPER_ROOT_DELAY_MS)
}

mod millis {
  use serde::{Deserialize, Deserializer};
  use std::time::Duration;

  pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
  where
    D: Deserializer<'de>,
  {
    u64::deserialize(deserializer).map(Duration::from_millis)
  }
}

/// Keeps at least `delay` between the starts of consecutive calls.
/// The first call goes out immediately.
#[derive(Debug)]
pub(crate) struct Pacer {
  delay: Duration,
  last: Option<Instant>,
}

impl Pacer {
  pub(crate) fn new(delay: Duration) -> Self {
    Self { delay, last: None }
  }

  /// Wait until the next call may start.
  pub(crate) async fn ready(&mut self) {
    if let Some(last) = self.last {
      let elapsed = last.elapsed();
      if elapsed < self.delay {
        sleep(self.delay - elapsed).await;
      }
    }
    self.last = Some(Instant::now());
  }
}

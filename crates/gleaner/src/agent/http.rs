use std::{
  sync::Mutex,
  time::{Duration, Instant},
};

use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;
use url::Url;

use super::{Agent, Resource};
use crate::error::{GleanerError, Result};

/// Reqwest-backed [`Agent`] with a minimum delay between requests.
///
/// The delay is a simple pacing gate, not a scheduler: before each request
/// the agent sleeps until at least `time_between_requests` has elapsed
/// since the previous one. The default is one second.
pub struct HttpAgent {
  client:                reqwest::Client,
  time_between_requests: Duration,
  last_request_at:       Mutex<Option<Instant>>,
}

impl Default for HttpAgent {
  fn default() -> Self { Self::new() }
}

impl HttpAgent {
  /// Creates an agent with the default one-second request pacing.
  pub fn new() -> Self {
    Self {
      client:                reqwest::Client::new(),
      time_between_requests: Duration::from_secs(1),
      last_request_at:       Mutex::new(None),
    }
  }

  /// Sets the enforced minimum amount of time to wait between requests.
  pub fn with_time_between_requests(mut self, delay: Duration) -> Self {
    self.time_between_requests = delay;
    self
  }

  async fn request(&self, method: Method, url: &Url) -> Result<Resource> {
    self.pace().await;

    debug!("{} {}", method, url);
    let response = self.client.request(method, url.clone()).send().await?;

    let status = response.status();
    let final_url = response.url().clone();
    if !status.is_success() {
      return Err(GleanerError::ResponseCode {
        status: status.as_u16(),
        url:    final_url.to_string(),
      });
    }

    let body = response.bytes().await?.to_vec();
    Ok(Resource::new(final_url, body))
  }

  async fn pace(&self) {
    let wait = {
      let last = self.last_request_at.lock().expect("pacing lock poisoned");
      last.map(|at| self.time_between_requests.saturating_sub(at.elapsed()))
    };
    if let Some(wait) = wait {
      if !wait.is_zero() {
        tokio::time::sleep(wait).await;
      }
    }
    *self.last_request_at.lock().expect("pacing lock poisoned") = Some(Instant::now());
  }
}

#[async_trait]
impl Agent for HttpAgent {
  async fn get(&self, url: &Url) -> Result<Resource> { self.request(Method::GET, url).await }

  async fn head(&self, url: &Url) -> Result<Resource> { self.request(Method::HEAD, url).await }
}

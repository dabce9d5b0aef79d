//! Transport collaborator surface.
//!
//! The crawling and scraping layers never talk to the network directly;
//! they go through the [`Agent`] trait, which hands back fetched
//! [`Resource`]s. The crate ships one real implementation,
//! [`HttpAgent`], and tests supply mocks.
//!
//! A [`Resource`] is deliberately small: the final URI of the fetch, the
//! raw body, and a content hash computed eagerly over the body. Parsing
//! the body (JSON, HTML, ...) is the concern of whoever consumes it.

use std::borrow::Cow;

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{ResolveError, Result};

/// Reqwest-backed agent implementation.
mod http;

pub use self::http::HttpAgent;

/// A fetched artifact: final URI, raw body, and content hash.
#[derive(Debug, Clone)]
pub struct Resource {
  uri:          Url,
  body:         Vec<u8>,
  content_hash: String,
}

impl Resource {
  /// Wraps a fetched body, hashing it immediately.
  ///
  /// `uri` should be the *final* URI of the fetch, after any redirects.
  pub fn new(uri: Url, body: Vec<u8>) -> Self {
    let mut hasher = Sha256::new();
    hasher.update(&body);
    let content_hash = hex::encode(hasher.finalize());
    Self { uri, body, content_hash }
  }

  /// The final URI this resource was served from.
  pub fn uri(&self) -> &Url { &self.uri }

  /// The raw response body.
  pub fn body(&self) -> &[u8] { &self.body }

  /// Hex-encoded SHA-256 of the body.
  pub fn content_hash(&self) -> &str { &self.content_hash }

  /// The body as text, replacing invalid UTF-8.
  pub fn text(&self) -> Cow<'_, str> { String::from_utf8_lossy(&self.body) }

  /// Parses the body as a JSON document.
  ///
  /// Returns [`ResolveError::Invalid`] on malformed JSON so field
  /// resolvers can use this directly with `?`.
  pub fn json(&self) -> core::result::Result<Value, ResolveError> {
    serde_json::from_slice(&self.body)
      .map_err(|e| ResolveError::Invalid(format!("failed to parse JSON: {}", e)))
  }
}

/// Transport contract consumed by the crawling layer.
///
/// Implementations must report non-success status codes as
/// [`GleanerError::ResponseCode`](crate::error::GleanerError::ResponseCode)
/// so that mirror fallback and capability probes can distinguish them from
/// connection-level failures. Retrying transient network errors is the
/// implementation's job; callers never retry.
#[async_trait]
pub trait Agent: Send + Sync {
  /// Fetches `url`, following redirects, and returns the resource.
  async fn get(&self, url: &Url) -> Result<Resource>;

  /// Performs a HEAD-equivalent probe of `url`.
  ///
  /// The returned resource's body may be empty; only the status and final
  /// URI are meaningful.
  async fn head(&self, url: &Url) -> Result<Resource>;
}

//! Error types for the gleaner library.
//!
//! Two layers of errors live here:
//!
//! - [`GleanerError`] covers everything a caller of the crawling layer can
//!   see: bad targets, transport failures, journal I/O.
//! - [`ResolveError`], [`FieldError`], and [`ScrapeError`] form the closed
//!   error set of the field-resolution engine. A resolver fails with a
//!   [`ResolveError`]; the engine records it per field as a [`FieldError`];
//!   a failed construction surfaces every recorded failure at once as a
//!   single [`ScrapeError`].

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

/// Error type alias used for the [`gleaner`](crate) crate.
pub type Result<T> = core::result::Result<T, GleanerError>;

/// Errors that can occur while crawling, journaling, or scraping.
#[derive(Error, Debug)]
pub enum GleanerError {
  /// The caller supplied a target that is not an absolute URI.
  ///
  /// This is a caller bug, not a transient condition, and must not be
  /// retried.
  #[error("target is not an absolute URI: {0}")]
  InvalidTarget(String),

  /// The server answered with a non-success status code.
  ///
  /// Carries the numeric status so mirror fallback and callers can log it.
  #[error("request for {url} failed with response code {status}")]
  ResponseCode {
    /// HTTP status code of the response.
    status: u16,
    /// The URL that produced the response.
    url:    String,
  },

  /// A connection-level network failure from the HTTP client.
  #[error(transparent)]
  Network(#[from] reqwest::Error),

  /// A file system operation on the journal (or elsewhere) failed.
  #[error(transparent)]
  Io(#[from] std::io::Error),

  /// A journal row could not be written or parsed back into a
  /// fulfillment entry, e.g. because it has the wrong column count.
  #[error(transparent)]
  Journal(#[from] csv::Error),

  /// A field-level failure escaped through a direct accessor.
  #[error(transparent)]
  Field(#[from] FieldError),

  /// Constructing a scraper failed; every failing field is inside.
  #[error(transparent)]
  Scrape(#[from] ScrapeError),
}

/// The closed set of failures a field resolver may return.
///
/// Resolvers are expected to return a value or fail with one of these
/// kinds; the engine's field-evaluation wrapper catches exactly this type
/// rather than a broad catch-all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
  /// The queried content does not exist in the source document.
  #[error("not found: {0}")]
  NotFound(String),

  /// The source document's content was present but malformed.
  #[error("{0}")]
  Invalid(String),

  /// A cross-field access hit a field that itself failed.
  #[error(transparent)]
  Field(#[from] FieldError),
}

/// A recorded per-field failure.
///
/// Once a field carries one of these it stays failed; every subsequent
/// access to the field returns a clone without re-running the resolver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
  /// A required field's resolver returned nil.
  #[error("`{0}` is nil but is not marked as optional")]
  Required(String),

  /// A field's resolver failed; wraps the resolver's error message.
  #[error("`{field}` failed to resolve: {message}")]
  Failed {
    /// Name of the failing field.
    field:   String,
    /// Rendered message of the underlying [`ResolveError`].
    message: String,
  },

  /// A field failed only because another field it references failed.
  ///
  /// These are kept in the error map but omitted from the aggregate
  /// listing, since the root cause is reported under `via`.
  #[error("`{field}` raised through `{via}`")]
  Upstream {
    /// Name of the field whose resolver was running.
    field: String,
    /// Name of the already-failed field it accessed.
    via:   String,
  },

  /// No field with this name was ever declared on the schema.
  #[error("no field named `{0}` is declared")]
  Unknown(String),
}

impl FieldError {
  /// The name of the field this error was recorded for.
  pub fn field(&self) -> &str {
    match self {
      FieldError::Required(field) | FieldError::Unknown(field) => field,
      FieldError::Failed { field, .. } | FieldError::Upstream { field, .. } => field,
    }
  }
}

/// Aggregate error raised once per failed scraper construction.
///
/// Carries the full field-to-error map together with the values that *did*
/// resolve, so callers can inspect which fields succeeded.
#[derive(Debug)]
pub struct ScrapeError {
  errors:  BTreeMap<String, FieldError>,
  scraped: BTreeMap<String, Value>,
}

impl ScrapeError {
  /// Builds the aggregate from the per-field failures and the partial
  /// results accumulated during construction.
  pub fn new(errors: BTreeMap<String, FieldError>, scraped: BTreeMap<String, Value>) -> Self {
    Self { errors, scraped }
  }

  /// Failures collected during construction, indexed by field name.
  pub fn errors(&self) -> &BTreeMap<String, FieldError> { &self.errors }

  /// Values that resolved successfully before construction failed.
  pub fn scraped(&self) -> &BTreeMap<String, Value> { &self.scraped }
}

impl std::fmt::Display for ScrapeError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    writeln!(f, "failed to scrape the following fields:")?;
    for error in self.errors.values() {
      // Propagated failures are noise; the root cause has its own entry.
      if matches!(error, FieldError::Upstream { .. }) {
        continue;
      }
      writeln!(f, "* {error}")?;
    }
    Ok(())
  }
}

impl std::error::Error for ScrapeError {}

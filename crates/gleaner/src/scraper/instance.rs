use std::{collections::BTreeMap, sync::Arc};

use tracing::debug;
use url::Url;

use super::{Schema, Value};
use crate::{
  agent::{Agent, Resource},
  error::{FieldError, GleanerError, ResolveError, ScrapeError},
};

/// One evaluation of a [`Schema`] against one source document.
///
/// Construction eagerly attempts every declared field, so a successfully
/// built scraper always has every field resolved. Each field is in
/// exactly one of three terminal states afterwards: resolved to a value,
/// resolved to `null` because a guard skipped it, or failed; failures are
/// sticky and re-raised on every later access without re-running the
/// resolver.
pub struct Scraper<D> {
  schema:   Arc<Schema<D>>,
  source:   D,
  resolved: BTreeMap<String, Value>,
  failed:   BTreeMap<String, FieldError>,
}

impl<D> Scraper<D> {
  /// Evaluates every declared field of `schema` against `source`.
  ///
  /// Per-field failures do not abort evaluation; every field is attempted
  /// before deciding pass or fail. If any field failed, the aggregate
  /// [`ScrapeError`] carries the full field-to-error map along with the
  /// values that did resolve.
  pub fn new(schema: Arc<Schema<D>>, source: D) -> core::result::Result<Self, ScrapeError> {
    let mut scraper =
      Self { schema: schema.clone(), source, resolved: BTreeMap::new(), failed: BTreeMap::new() };

    for name in schema.field_names() {
      let _ = scraper.get(&name);
    }

    if scraper.failed.is_empty() {
      Ok(scraper)
    } else {
      Err(ScrapeError::new(scraper.failed, scraper.resolved))
    }
  }

  /// The document being scraped.
  pub fn source(&self) -> &D { &self.source }

  /// The schema this instance was built from.
  pub fn schema(&self) -> &Arc<Schema<D>> { &self.schema }

  /// Lazy, memoized accessor for one field.
  ///
  /// On first access the guard is consulted (a false condition resolves
  /// the field to `null` without running the resolver), then the resolver
  /// runs with this instance as context, so resolvers may read other
  /// fields through `get` and trigger their resolution in turn. A `null`
  /// result on a required field is recorded as
  /// [`FieldError::Required`]. Every later access returns the memoized
  /// value, or a clone of the recorded failure.
  pub fn get(&mut self, name: &str) -> core::result::Result<Value, FieldError> {
    if let Some(error) = self.failed.get(name) {
      return Err(error.clone());
    }
    if let Some(value) = self.resolved.get(name) {
      return Ok(value.clone());
    }

    let spec = match self.schema.spec(name) {
      Some(spec) => spec.clone(),
      None => return Err(FieldError::Unknown(name.to_string())),
    };

    if let Some(guard) = spec.guard_ref() {
      match guard.should_skip(self) {
        Ok(true) => {
          self.resolved.insert(name.to_string(), Value::Null);
          return Ok(Value::Null);
        },
        Ok(false) => {},
        Err(error) => return Err(self.record_failure(name, error)),
      }
    }

    match (spec.resolver())(self) {
      Ok(Value::Null) if !spec.is_optional() => {
        let error = FieldError::Required(name.to_string());
        self.failed.insert(name.to_string(), error.clone());
        Err(error)
      },
      Ok(value) => {
        if value.is_null() {
          debug!("field {} is nil", name);
        }
        self.resolved.insert(name.to_string(), value.clone());
        Ok(value)
      },
      Err(error) => Err(self.record_failure(name, error)),
    }
  }

  /// Direct lookup of an already-resolved value.
  ///
  /// By construction every declared field is resolved once the scraper
  /// exists, so this fails only for names that were never declared.
  pub fn value(&self, name: &str) -> core::result::Result<&Value, FieldError> {
    self.resolved.get(name).ok_or_else(|| FieldError::Unknown(name.to_string()))
  }

  /// Snapshot of all resolved values, indexed by field name.
  pub fn to_map(&self) -> BTreeMap<String, Value> { self.resolved.clone() }

  /// Records one resolver failure, distinguishing propagated cross-field
  /// failures from root causes.
  fn record_failure(&mut self, name: &str, error: ResolveError) -> FieldError {
    let field_error = match error {
      ResolveError::Field(upstream) =>
        FieldError::Upstream { field: name.to_string(), via: upstream.field().to_string() },
      other => FieldError::Failed { field: name.to_string(), message: other.to_string() },
    };
    self.failed.insert(name.to_string(), field_error.clone());
    field_error
  }
}

impl<D> std::fmt::Debug for Scraper<D> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Scraper")
      .field("resolved", &self.resolved)
      .field("failed", &self.failed)
      .finish_non_exhaustive()
  }
}

impl Scraper<Resource> {
  /// Fetches `target` through `agent` and scrapes the fetched resource.
  ///
  /// The agent is always passed explicitly; there is no shared default.
  pub async fn scrape(
    schema: &Arc<Schema<Resource>>,
    target: &str,
    agent: &impl Agent,
  ) -> crate::error::Result<Self> {
    let url = Url::parse(target).map_err(|_| GleanerError::InvalidTarget(target.to_string()))?;
    let resource = agent.get(&url).await?;
    Ok(Self::new(schema.clone(), resource)?)
  }

  /// Iterates a series of documents starting at `start`, scraping each
  /// and passing it to `visit`.
  ///
  /// After each document, the field named `next_field` decides what
  /// follows: `null` (or `false`) stops the iteration, and a string is
  /// resolved against the current document's URI and fetched as the next
  /// document. Fails fast, before visiting anything, if `next_field` is
  /// not declared on the schema.
  pub async fn each<A, F>(
    schema: &Arc<Schema<Resource>>,
    start: &str,
    agent: &A,
    next_field: &str,
    mut visit: F,
  ) -> crate::error::Result<()>
  where
    A: Agent,
    F: FnMut(&Self),
  {
    if !schema.declares(next_field) {
      return Err(FieldError::Unknown(next_field.to_string()).into());
    }

    let start_url =
      Url::parse(start).map_err(|_| GleanerError::InvalidTarget(start.to_string()))?;
    let mut current = Some(agent.get(&start_url).await?);

    while let Some(resource) = current.take() {
      let base = resource.uri().clone();
      let scraper = Self::new(schema.clone(), resource)?;
      visit(&scraper);

      current = match scraper.value(next_field)? {
        Value::Null | Value::Bool(false) => None,
        Value::String(next) => {
          let url = base
            .join(next)
            .map_err(|_| GleanerError::InvalidTarget(next.clone()))?;
          Some(agent.get(&url).await?)
        },
        other => {
          return Err(GleanerError::InvalidTarget(format!(
            "next field `{}` must be a URL string, got: {}",
            next_field, other
          )));
        },
      };
    }
    Ok(())
  }
}

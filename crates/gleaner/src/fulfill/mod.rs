//! Fulfillment tracking: run an action at most once per purpose and
//! resource identity, durably.
//!
//! The identity of a resource is checked in four stages, derived from a
//! single fetch attempt:
//!
//! 1. the caller's target, resolved to an absolute URI,
//! 2. that URI normalized (fragment stripped, one trailing slash
//!    stripped),
//! 3. after the fetch, the resource's final post-redirect URI,
//! 4. a synthetic `"content hash: <hex>"` key over the body.
//!
//! Stages 1 and 2 are checked *before* fetching, so an already-seen URI
//! never costs a network request. Stages 3 and 4 are both checked after
//! the fetch (not short-circuited) because both keys must be recorded.
//! Every newly staged key from one call is appended to the journal as one
//! batch, restoring the dedup state across process restarts.
//!
//! # Examples
//!
//! ```no_run
//! use gleaner::{agent::HttpAgent, fulfill::Gleaner};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut gleaner = Gleaner::with_journal(HttpAgent::new(), "crawl.csv")?;
//!
//! // Runs the closure on the first call...
//! gleaner.fulfill("https://example.com/posts", "download", |resource| {
//!   println!("{} bytes", resource.body().len());
//! }).await?;
//!
//! // ...and skips it on every later call, even after a restart.
//! let ran = gleaner.fulfill("https://example.com/posts", "download", |_| ()).await?;
//! assert!(ran.is_none());
//! # Ok(())
//! # }
//! ```

use std::{
  collections::HashSet,
  path::{Path, PathBuf},
};

use tracing::{debug, info, warn};
use url::Url;

use crate::{
  agent::{Agent, Resource},
  error::{GleanerError, Result},
};

/// Durable fulfillment records and their CSV journal.
mod journal;

pub use self::journal::{Fulfillment, Journal};

/// Crawling front end that deduplicates work by purpose and resource
/// identity.
///
/// Owns the transport agent, the optional journal, and the in-memory set
/// of fulfilled entries. Single-threaded use only: sharing one journal
/// file between trackers or processes is unsupported.
pub struct Gleaner<A> {
  agent:     A,
  journal:   Option<Journal>,
  fulfilled: HashSet<Fulfillment>,
}

impl<A: Agent> Gleaner<A> {
  /// Creates a tracker with no journal; dedup state lives in memory only.
  pub fn new(agent: A) -> Self {
    Self { agent, journal: None, fulfilled: HashSet::new() }
  }

  /// Creates a tracker whose fulfilled set is backed by the journal file
  /// at `path`, loading any existing entries.
  pub fn with_journal(agent: A, path: impl AsRef<Path>) -> Result<Self> {
    let mut gleaner = Self::new(agent);
    gleaner.set_journal(Some(path.as_ref().to_path_buf()))?;
    Ok(gleaner)
  }

  /// The transport agent this tracker fetches through.
  pub fn agent(&self) -> &A { &self.agent }

  /// Path of the current journal file, if one is set.
  pub fn journal_path(&self) -> Option<&Path> { self.journal.as_ref().map(Journal::path) }

  /// Entries currently known to be fulfilled.
  pub fn fulfilled(&self) -> &HashSet<Fulfillment> { &self.fulfilled }

  /// Swaps the journal, *replacing* the in-memory fulfilled set.
  ///
  /// With `Some(path)` the file is touched immediately (so it can be
  /// statted before any writes) and the set is reloaded from its rows;
  /// with `None` the set is cleared. Used to segment journals by topic or
  /// run. Fails if the file cannot be created or contains malformed rows.
  pub fn set_journal(&mut self, path: Option<PathBuf>) -> Result<()> {
    match path {
      None => {
        self.journal = None;
        self.fulfilled.clear();
      },
      Some(path) => {
        let journal = Journal::open(path)?;
        self.fulfilled = journal.load()?;
        debug!("loaded {} fulfilled entries from {}", self.fulfilled.len(), journal.path().display());
        self.journal = Some(journal);
      },
    }
    Ok(())
  }

  /// Fetches `target` and runs `action` on it, unless an identical
  /// resource was already fulfilled for `purpose`.
  ///
  /// Returns `Ok(Some(result))` when the action ran and `Ok(None)` when
  /// it was skipped as a duplicate. A duplicate detected before the fetch
  /// stage skips the network request entirely. A call that fails records
  /// nothing, so retrying the same target after a transient transport
  /// error fetches again.
  ///
  /// # Errors
  ///
  /// - [`GleanerError::InvalidTarget`] if `target` is not an absolute URI
  ///   (a caller bug; never retried),
  /// - any transport error from the fetch, propagated unchanged,
  /// - journal I/O errors from the commit.
  pub async fn fulfill<F, R>(&mut self, target: &str, purpose: &str, action: F) -> Result<Option<R>>
  where F: FnOnce(&Resource) -> R {
    let uri =
      Url::parse(target).map_err(|_| GleanerError::InvalidTarget(target.to_string()))?;

    let mut staged = Vec::new();

    if self.stage(&mut staged, purpose, uri.as_str()) {
      debug!("skipping fulfilled uri: {}", uri);
      self.commit(staged)?;
      return Ok(None);
    }

    let normalized = normalize(&uri);
    if self.stage(&mut staged, purpose, normalized.as_str()) {
      debug!("skipping fulfilled uri: {}", normalized);
      self.commit(staged)?;
      return Ok(None);
    }

    let resource = self.agent.get(&normalized).await?;

    // Both post-fetch keys are staged regardless of outcome, so a future
    // call can match on either one.
    let seen_uri = self.stage(&mut staged, purpose, resource.uri().as_str());
    let hash_key = format!("content hash: {}", resource.content_hash());
    let seen_hash = self.stage(&mut staged, purpose, &hash_key);

    let result = if seen_uri || seen_hash {
      debug!("skipping fulfilled resource: {}", resource.uri());
      None
    } else {
      Some(action(&resource))
    };

    self.commit(staged)?;
    Ok(result)
  }

  /// Probes `target` with a HEAD-equivalent request.
  ///
  /// Returns `true` only on a success status; every failure, including
  /// error status codes and unparseable targets, converts to `false` and
  /// never propagates.
  pub async fn ok(&self, target: &str) -> bool {
    let url = match Url::parse(target) {
      Ok(url) => url,
      Err(_) => return false,
    };
    match self.agent.head(&url).await {
      Ok(_) => true,
      Err(error) => {
        debug!("probe of {} failed: {}", url, error);
        false
      },
    }
  }

  /// Fetches the first mirror that answers successfully.
  ///
  /// Response-code failures on all but the last candidate are logged and
  /// skipped; the last candidate's failure is propagated. Any other
  /// failure propagates immediately. Mirror fallback does not itself
  /// deduplicate; pair it with [`fulfill`](Self::fulfill) for that.
  pub async fn get_mirrored(&self, mirror_uris: &[&str]) -> Result<Resource> {
    for (i, raw) in mirror_uris.iter().enumerate() {
      let url = Url::parse(raw).map_err(|_| GleanerError::InvalidTarget(raw.to_string()))?;
      match self.agent.get(&url).await {
        Ok(resource) => return Ok(resource),
        Err(GleanerError::ResponseCode { status, url }) if i + 1 < mirror_uris.len() => {
          info!("mirror failed with response code {}: {}", status, url);
          debug!("trying next mirror: {}", mirror_uris[i + 1]);
        },
        Err(error) => return Err(error),
      }
    }
    Err(GleanerError::InvalidTarget("no mirror URIs given".to_string()))
  }

  /// Checks one identity key and stages it for commit if novel.
  ///
  /// Returns whether the key was already fulfilled *before* this call.
  /// Keys staged earlier in the same call are deduplicated by string
  /// equality but do not count as already fulfilled. The fulfilled set
  /// itself is untouched until [`commit`](Self::commit), so a call that
  /// fails mid-flight leaves no trace.
  fn stage(&self, staged: &mut Vec<Fulfillment>, purpose: &str, target: &str) -> bool {
    let entry = Fulfillment::new(purpose, target);
    if staged.contains(&entry) {
      return false;
    }
    if self.fulfilled.contains(&entry) {
      return true;
    }
    staged.push(entry);
    false
  }

  /// Appends every entry staged by the current call, in order, then
  /// merges them into the fulfilled set. A journal failure records
  /// nothing, keeping the set and the file in agreement.
  fn commit(&mut self, staged: Vec<Fulfillment>) -> Result<()> {
    if let Some(journal) = &self.journal {
      journal.append(&staged)?;
    }
    self.fulfilled.extend(staged);
    Ok(())
  }
}

/// Normalizes a URI for identity checking: drops the fragment (with a
/// warning, since two targets differing only by fragment are the same
/// resource) and strips one trailing slash from the path.
fn normalize(uri: &Url) -> Url {
  let mut normalized = uri.clone();
  if normalized.fragment().is_some() {
    warn!("stripping fragment from {}", uri);
    normalized.set_fragment(None);
  }
  let path = normalized.path();
  if path.len() > 1 && path.ends_with('/') {
    let trimmed = path[..path.len() - 1].to_string();
    normalized.set_path(&trimmed);
  }
  normalized
}

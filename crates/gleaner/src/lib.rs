//! Once-per-purpose crawling and declarative field scraping.
//!
//! `gleaner` is a toolkit for reliably pulling structured data out of
//! remote resources — web pages, JSON APIs, mirrored downloads — exactly
//! once per logical purpose, even across process restarts, and for
//! surfacing every extraction failure from a document together instead of
//! stopping at the first one.
//!
//! # Features
//!
//! - **Fulfillment deduplication**: [`fulfill::Gleaner`] runs an action
//!   at most once per (purpose, resource identity) pair, where identity
//!   covers the original URI, its normalized form, the final
//!   post-redirect URI, and the body's content hash. History persists to
//!   an append-only CSV journal and is restored on the next run.
//! - **Declarative scraping**: [`scraper::Schema`] declares named fields
//!   computed lazily from a source document, with optional/required
//!   semantics, guards, memoization, and one aggregate error that lists
//!   every failing field.
//! - **Pluggable transport**: everything fetches through the
//!   [`agent::Agent`] trait; [`agent::HttpAgent`] is the reqwest-backed
//!   implementation with inter-request pacing, and tests substitute
//!   mocks.
//!
//! # Getting Started
//!
//! ```no_run
//! use gleaner::{
//!   agent::HttpAgent,
//!   fulfill::Gleaner,
//!   scraper::{Schema, Scraper},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!   let mut gleaner = Gleaner::with_journal(HttpAgent::new(), "posts.csv")?;
//!
//!   let schema = Schema::builder()
//!     .field("title", |s: &mut Scraper<gleaner::agent::Resource>| {
//!       Ok(s.source().json()?["title"].clone())
//!     })
//!     .build();
//!
//!   gleaner
//!     .fulfill("https://example.com/posts/42.json", "archive", |resource| {
//!       println!("fetched {} bytes", resource.body().len());
//!     })
//!     .await?;
//!
//!   let post = Scraper::scrape(&schema, "https://example.com/posts/42.json", gleaner.agent())
//!     .await?;
//!   println!("{}", post.value("title")?);
//!   Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`agent`]: transport contract, fetched [`agent::Resource`]s, and the
//!   HTTP implementation
//! - [`fulfill`]: fulfillment tracking and the durable journal
//! - [`scraper`]: schema declaration and field resolution
//! - [`error`]: the error taxonomy shared by all of the above
//!
//! # Concurrency model
//!
//! The core is single-agent and sequential: a tracker's fulfilled set and
//! journal are owned by one caller, and field resolution is a synchronous
//! nested computation. Callers that want parallel crawling shard by
//! purpose and journal file.

#![warn(missing_docs)]

pub mod agent;
pub mod error;
pub mod fulfill;
pub mod scraper;

/// Common types for ergonomic glob imports.
///
/// ```no_run
/// use gleaner::prelude::*;
/// ```
pub mod prelude {
  pub use crate::{
    agent::{Agent, HttpAgent, Resource},
    error::{FieldError, GleanerError, ResolveError, Result, ScrapeError},
    fulfill::Gleaner,
    scraper::{FieldSpec, Guard, Schema, Scraper, Value},
  };
}

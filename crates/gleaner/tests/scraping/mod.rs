use std::sync::Arc;

use gleaner::{
  agent::Resource,
  error::{FieldError, GleanerError, ResolveError},
  scraper::{Schema, Scraper, Value},
};

use crate::{MockAgent, TestResult};

fn post_schema() -> Arc<Schema<Resource>> {
  Schema::builder()
    .field("title", |s: &mut Scraper<Resource>| Ok(s.source().json()?["title"].clone()))
    .field("author", |s: &mut Scraper<Resource>| Ok(s.source().json()?["author"].clone()))
    .optional_field("next", |s: &mut Scraper<Resource>| Ok(s.source().json()?["next"].clone()))
    .build()
}

#[tokio::test]
async fn test_scrape_fetches_then_extracts() -> TestResult {
  let agent = MockAgent::new().serve(
    "http://example.com/posts/42.json",
    br#"{"title": "Forty-two", "author": "deep thought"}"#,
  );

  let post = Scraper::scrape(&post_schema(), "http://example.com/posts/42.json", &agent).await?;

  assert_eq!(*post.value("title")?, "Forty-two");
  assert_eq!(*post.value("author")?, "deep thought");
  assert_eq!(*post.value("next")?, Value::Null);
  Ok(())
}

#[tokio::test]
async fn test_scrape_aggregates_every_failing_field() {
  let agent = MockAgent::new().serve("http://example.com/posts/43.json", br#"{"next": null}"#);

  let result =
    Scraper::scrape(&post_schema(), "http://example.com/posts/43.json", &agent).await;

  let Err(GleanerError::Scrape(error)) = result else {
    panic!("expected an aggregate scrape error");
  };
  // Both required fields failed independently; neither aborted the other.
  assert_eq!(error.errors().len(), 2);
  assert!(matches!(error.errors()["title"], FieldError::Required(_)));
  assert!(matches!(error.errors()["author"], FieldError::Required(_)));

  let listing = error.to_string();
  assert!(listing.contains("`title`"));
  assert!(listing.contains("`author`"));
}

#[tokio::test]
async fn test_optional_field_tolerates_nil_where_required_does_not() {
  let schema = Schema::<Value>::builder()
    .optional_field("maybe", |_| Ok(Value::Null))
    .build();
  let scraper = Scraper::new(schema, Value::Null).unwrap();
  assert_eq!(*scraper.value("maybe").unwrap(), Value::Null);

  let schema = Schema::<Value>::builder().field("must", |_| Ok(Value::Null)).build();
  let error = Scraper::new(schema, Value::Null).unwrap_err();
  assert_eq!(error.errors()["must"], FieldError::Required("must".to_string()));
}

#[tokio::test]
async fn test_scrape_error_exposes_partial_results() {
  let schema = Schema::<Value>::builder()
    .field("good", |_| Ok(Value::from("resolved")))
    .field("bad", |_| Err(ResolveError::NotFound("missing".into())))
    .build();

  let error = Scraper::new(schema, Value::Null).unwrap_err();
  assert_eq!(error.scraped()["good"], "resolved");
  assert!(!error.scraped().contains_key("bad"));
}

#[tokio::test]
async fn test_scrape_propagates_transport_failures() {
  let agent = MockAgent::new().fail("http://example.com/gone.json", 404);

  let result = Scraper::scrape(&post_schema(), "http://example.com/gone.json", &agent).await;

  assert!(matches!(result, Err(GleanerError::ResponseCode { status: 404, .. })));
}

#[tokio::test]
async fn test_each_follows_the_next_field() -> TestResult {
  let agent = MockAgent::new()
    .serve(
      "http://example.com/posts?page=1",
      br#"{"title": "one", "author": "a", "next": "/posts?page=2"}"#,
    )
    .serve(
      "http://example.com/posts?page=2",
      br#"{"title": "two", "author": "b", "next": null}"#,
    );

  let mut titles = Vec::new();
  Scraper::each(&post_schema(), "http://example.com/posts?page=1", &agent, "next", |post| {
    titles.push(post.value("title").unwrap().clone());
  })
  .await?;

  assert_eq!(titles, vec![Value::from("one"), Value::from("two")]);
  assert_eq!(agent.gets(), 2);
  Ok(())
}

#[tokio::test]
async fn test_each_fails_fast_on_undeclared_next_field() {
  let agent = MockAgent::new().serve("http://example.com/posts?page=1", b"{}");

  let mut visited = 0;
  let result =
    Scraper::each(&post_schema(), "http://example.com/posts?page=1", &agent, "nonexistent", |_| {
      visited += 1;
    })
    .await;

  assert!(matches!(result, Err(GleanerError::Field(FieldError::Unknown(_)))));
  assert_eq!(visited, 0);
  // The check happens before the first fetch.
  assert_eq!(agent.gets(), 0);
}

#[tokio::test]
async fn test_each_rejects_a_non_string_next_value() {
  let agent = MockAgent::new().serve(
    "http://example.com/posts?page=1",
    br#"{"title": "one", "author": "a", "next": 7}"#,
  );

  let result =
    Scraper::each(&post_schema(), "http://example.com/posts?page=1", &agent, "next", |_| ()).await;

  assert!(matches!(result, Err(GleanerError::InvalidTarget(_))));
}

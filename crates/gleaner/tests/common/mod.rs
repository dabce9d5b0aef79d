use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use gleaner::{
  agent::{Agent, Resource},
  error::{GleanerError, Result},
};
use url::Url;

#[derive(Clone)]
struct Route {
  status:     u16,
  final_url:  String,
  body:       Vec<u8>,
  fail_first: Option<u16>,
}

/// In-memory [`Agent`] that serves canned routes and records every
/// request, so tests can assert on fetch counts.
pub struct MockAgent {
  routes:   HashMap<String, Route>,
  requests: Mutex<Vec<(&'static str, String)>>,
}

impl MockAgent {
  pub fn new() -> Self {
    Self { routes: HashMap::new(), requests: Mutex::new(Vec::new()) }
  }

  /// Serves `body` with a 200 at `url`.
  pub fn serve(self, url: &str, body: &[u8]) -> Self {
    self.route(url, Route {
      status:     200,
      final_url:  url.to_string(),
      body:       body.to_vec(),
      fail_first: None,
    })
  }

  /// Serves `body` at `url` but reports `final_url` as the post-redirect
  /// location.
  pub fn redirect(self, url: &str, final_url: &str, body: &[u8]) -> Self {
    self.route(url, Route {
      status:     200,
      final_url:  final_url.to_string(),
      body:       body.to_vec(),
      fail_first: None,
    })
  }

  /// Answers `url` with an error status.
  pub fn fail(self, url: &str, status: u16) -> Self {
    self.route(url, Route {
      status,
      final_url: url.to_string(),
      body: Vec::new(),
      fail_first: None,
    })
  }

  /// Fails the first request to `url` with `status`, then serves `body`.
  pub fn fail_once(self, url: &str, status: u16, body: &[u8]) -> Self {
    self.route(url, Route {
      status:     200,
      final_url:  url.to_string(),
      body:       body.to_vec(),
      fail_first: Some(status),
    })
  }

  fn route(mut self, url: &str, route: Route) -> Self {
    self.routes.insert(url.to_string(), route);
    self
  }

  /// Number of GET requests made so far.
  pub fn gets(&self) -> usize {
    self.requests.lock().unwrap().iter().filter(|(m, _)| *m == "GET").count()
  }

  /// Number of GET requests made for one exact URL.
  pub fn gets_for(&self, url: &str) -> usize {
    self.requests.lock().unwrap().iter().filter(|(m, u)| *m == "GET" && u == url).count()
  }

  /// Number of HEAD requests made so far.
  pub fn heads(&self) -> usize {
    self.requests.lock().unwrap().iter().filter(|(m, _)| *m == "HEAD").count()
  }

  fn lookup(&self, method: &'static str, url: &Url) -> Result<Resource> {
    let mut requests = self.requests.lock().unwrap();
    let prior = requests.iter().filter(|(m, u)| *m == method && u == url.as_str()).count();
    requests.push((method, url.to_string()));
    drop(requests);

    match self.routes.get(url.as_str()) {
      None => Err(GleanerError::ResponseCode { status: 404, url: url.to_string() }),
      Some(route) if !(200..300).contains(&route.status) =>
        Err(GleanerError::ResponseCode { status: route.status, url: route.final_url.clone() }),
      Some(route) => match route.fail_first {
        Some(status) if prior == 0 =>
          Err(GleanerError::ResponseCode { status, url: url.to_string() }),
        _ => Ok(Resource::new(Url::parse(&route.final_url).unwrap(), route.body.clone())),
      },
    }
  }
}

#[async_trait]
impl Agent for MockAgent {
  async fn get(&self, url: &Url) -> Result<Resource> { self.lookup("GET", url) }

  async fn head(&self, url: &Url) -> Result<Resource> { self.lookup("HEAD", url) }
}

//! Engine and transport seams.
//!
//! [`SearchBackend`] is what a [`Criteria`] compiles and executes through.
//! [`SolrBackend`] is the stock implementation: it compiles with
//! [`QueryCompiler`], hands a [`SearchRequest`] to a [`Transport`] and
//! hydrates the body with [`ResultHydrator`]. Transports are supplied by
//! the caller; the crate performs no I/O of its own.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::collection::Collection;
use crate::compiler::QueryCompiler;
use crate::config;
use crate::criteria::Criteria;
use crate::error::{BoxError, Result, ScopeError};
use crate::hydrate::{RecordTypes, ResultHydrator};
use crate::params::WireParams;

static QTIME: Lazy<Regex> = Lazy::new(|| Regex::new(r#""QTime":(\d+)"#).expect("valid regex"));

/// Receives the outcome of an asynchronous execution.
pub type CollectionCallback = Box<dyn FnOnce(Result<Collection>) + Send>;

/// Receives the raw body of an asynchronous request.
pub type BodyCallback = Box<dyn FnOnce(std::result::Result<String, BoxError>) + Send>;

/// Compiles and executes criteria against one engine.
pub trait SearchBackend: fmt::Debug + Send + Sync {
    fn to_params(&self, criteria: &Criteria) -> Result<WireParams>;

    fn execute(&self, criteria: &Criteria) -> Result<Collection>;

    /// Runs [`execute`](Self::execute) and hands the outcome to `callback`.
    fn execute_async(&self, criteria: &Criteria, callback: CollectionCallback) -> Result<()> {
        callback(self.execute(criteria));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
}

impl Method {
    /// HTTP verb name.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request handed to a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub method: Method,
    /// Select endpoint, when one is configured.
    pub url: Option<String>,
    pub params: WireParams,
}

/// Moves a request to the engine and returns the raw body.
///
/// Errors are opaque to this crate and surface as [`ScopeError::Transport`].
pub trait Transport: fmt::Debug + Send + Sync {
    fn execute(&self, request: &SearchRequest) -> std::result::Result<String, BoxError>;

    /// Runs [`execute`](Self::execute) and hands the body to `callback`.
    /// Batching transports override this.
    fn execute_async(&self, request: SearchRequest, callback: BodyCallback) {
        callback(self.execute(&request));
    }
}

/// Solr backend: compile, send, hydrate.
#[derive(Debug, Clone, Default)]
pub struct SolrBackend {
    url: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    record_types: RecordTypes,
}

impl SolrBackend {
    /// A backend reading the engine URL from [`config`] at request time.
    pub fn new() -> Self {
        SolrBackend::default()
    }

    /// Pins the engine URL instead of reading [`config::read_url`].
    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(config::remove_trailing_slash(url));
        self
    }

    /// Sets the transport requests are sent through.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Registers a type documents may be hydrated into.
    pub fn with_record_type(mut self, name: impl Into<String>) -> Self {
        self.record_types.insert(name);
        self
    }

    /// `<url>/select`, if any URL is known.
    pub fn select_url(&self) -> Option<String> {
        self.url
            .clone()
            .or_else(config::read_url)
            .map(|url| format!("{}/select", url))
    }

    fn transport(&self) -> Result<&Arc<dyn Transport>> {
        self.transport.as_ref().ok_or(ScopeError::MissingTransport)
    }

    /// Compiled parameters with the JSON response writer forced.
    pub fn request(&self, criteria: &Criteria) -> Result<SearchRequest> {
        let mut params = self.to_params(criteria)?;
        params.insert("wt", "json");
        Ok(SearchRequest {
            method: Method::Get,
            url: self.select_url(),
            params,
        })
    }

    fn hydrator(&self, criteria: &Criteria) -> ResultHydrator {
        ResultHydrator::new(criteria, self.record_types.clone())
    }
}

/// Engine-reported query time in milliseconds.
pub fn qtime_from_body(body: &str) -> Option<u64> {
    QTIME
        .captures(body)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn log_response(request: &SearchRequest, body: &str, started: Instant) {
    info!(
        method = %request.method,
        url = request.url.as_deref().unwrap_or("-"),
        params = ?request.params.to_query_pairs(),
        qtime = ?qtime_from_body(body),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "search request completed"
    );
}

impl SearchBackend for SolrBackend {
    fn to_params(&self, criteria: &Criteria) -> Result<WireParams> {
        QueryCompiler::new(criteria).to_params()
    }

    fn execute(&self, criteria: &Criteria) -> Result<Collection> {
        let transport = self.transport()?;
        let request = self.request(criteria)?;
        let started = Instant::now();
        let body = transport.execute(&request).map_err(ScopeError::Transport)?;
        log_response(&request, &body, started);
        self.hydrator(criteria).hydrate(&body)
    }

    fn execute_async(&self, criteria: &Criteria, callback: CollectionCallback) -> Result<()> {
        let transport = Arc::clone(self.transport()?);
        let request = self.request(criteria)?;
        let hydrator = self.hydrator(criteria);
        let logged = request.clone();
        let started = Instant::now();
        transport.execute_async(
            request,
            Box::new(move |outcome| {
                let collection = outcome.map_err(ScopeError::Transport).and_then(|body| {
                    log_response(&logged, &body, started);
                    hydrator.hydrate(&body)
                });
                callback(collection);
            }),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Default)]
    struct Canned {
        body: String,
        seen: Mutex<Vec<SearchRequest>>,
    }

    impl Transport for Canned {
        fn execute(&self, request: &SearchRequest) -> std::result::Result<String, BoxError> {
            self.seen.lock().push(request.clone());
            Ok(self.body.clone())
        }
    }

    #[derive(Debug)]
    struct Down;

    impl Transport for Down {
        fn execute(&self, _: &SearchRequest) -> std::result::Result<String, BoxError> {
            Err("connection refused".into())
        }
    }

    const BODY: &str = r#"{"responseHeader":{"QTime":4},"response":{"numFound":1,"docs":[{"id":"offers/1","type":"Offer"}]}}"#;

    #[test]
    fn reads_qtime() {
        assert_eq!(qtime_from_body(BODY), Some(4));
        assert_eq!(qtime_from_body("{}"), None);
    }

    #[test]
    fn forces_json_writer_and_select_url() {
        let transport = Arc::new(Canned {
            body: BODY.to_string(),
            ..Default::default()
        });
        let backend = SolrBackend::new()
            .with_url("http://solr:8983/solr/")
            .with_transport(transport.clone());
        let scope = Criteria::for_type("Offer")
            .format("ruby")
            .with_backend(Arc::new(backend));
        let collection = scope.execute().unwrap();
        assert_eq!(collection.total_entries(), 1);
        assert!(collection.first().unwrap().as_record().is_some());

        let seen = transport.seen.lock();
        assert_eq!(seen[0].method, Method::Get);
        assert_eq!(seen[0].url.as_deref(), Some("http://solr:8983/solr/select"));
        assert_eq!(seen[0].params.text("wt"), Some("json"));
    }

    #[test]
    fn to_params_keeps_requested_writer() {
        let scope = Criteria::new()
            .format("ruby")
            .with_backend(Arc::new(SolrBackend::new()));
        assert_eq!(scope.to_params().unwrap().text("wt"), Some("ruby"));
    }

    #[test]
    fn missing_transport() {
        let scope = Criteria::new().with_backend(Arc::new(SolrBackend::new()));
        assert!(matches!(scope.execute(), Err(ScopeError::MissingTransport)));
    }

    #[test]
    fn transport_errors_pass_through() {
        let backend = SolrBackend::new().with_transport(Arc::new(Down));
        let scope = Criteria::new().with_backend(Arc::new(backend));
        match scope.execute() {
            Err(ScopeError::Transport(e)) => assert_eq!(e.to_string(), "connection refused"),
            other => panic!("unexpected: {:?}", other.map(|c| c.len())),
        }
    }

    #[test]
    fn async_execution_delivers_collection() {
        let backend = SolrBackend::new().with_transport(Arc::new(Canned {
            body: BODY.to_string(),
            ..Default::default()
        }));
        let scope = Criteria::new().with_backend(Arc::new(backend));
        let delivered = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&delivered);
        scope
            .execute_async(move |outcome| {
                *slot.lock() = Some(outcome.map(|c| c.total_entries()).ok());
            })
            .unwrap();
        assert_eq!(*delivered.lock(), Some(Some(1)));
    }
}

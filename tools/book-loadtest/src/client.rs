use std::time::{Duration, Instant};

use reqwest::{Client, Method, Url};
use thiserror::Error;
use tracing::trace;

use crate::book::BookRequest;
use crate::report::ErrorCategory;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("timed out waiting for response")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("failed to read response body: {0}")]
    Body(String),
    #[error("invalid request url: {0}")]
    Url(String),
}

impl TransportError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Timeout => ErrorCategory::Timeout,
            Self::Connect(_) => ErrorCategory::Connect,
            Self::Request(_) | Self::Body(_) | Self::Url(_) => ErrorCategory::Transport,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            Self::Body(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// One HTTP call against the catalog, relative to the base url.
#[derive(Debug, Clone)]
pub struct CatalogRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(&'static str, String)>,
    pub body: Option<BookRequest>,
}

impl CatalogRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    pub fn json(mut self, body: BookRequest) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub latency_ms: u128,
}

/// Shared by every virtual user. `reqwest::Client` pools connections
/// internally, clones are cheap handles to the same pool.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, request: &CatalogRequest) -> Result<Url, TransportError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, request.path))
            .map_err(|err| TransportError::Url(err.to_string()))?;
        if !request.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(request.query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    /// Send once and drain the body. Any status is a successful exchange,
    /// judging it is up to the caller.
    pub async fn send(&self, request: &CatalogRequest) -> Result<Response, TransportError> {
        let url = self.url_for(request)?;
        let mut builder = self.http.request(request.method.clone(), url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let start = Instant::now();
        let response = builder.send().await?;
        let status = response.status().as_u16();
        // latency covers the whole body, not just the headers
        response.bytes().await?;
        let latency_ms = start.elapsed().as_millis();

        trace!(method = %request.method, path = %request.path, status, latency_ms, "response");
        Ok(Response { status, latency_ms })
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;

    use super::{CatalogClient, CatalogRequest, TransportError};
    use crate::report::ErrorCategory;

    #[test]
    fn url_joins_path_and_encodes_query() {
        let client = CatalogClient::new("http://127.0.0.1:8000/", None).unwrap();
        let request = CatalogRequest::new(Method::GET, "/books/title/")
            .query("title", "Updated Test Book 42");

        let url = client.url_for(&request).unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8000/books/title/?title=Updated+Test+Book+42"
        );
    }

    #[test]
    fn url_keeps_base_path_prefix() {
        let client = CatalogClient::new("http://catalog:9000/api", None).unwrap();
        let url = client
            .url_for(&CatalogRequest::new(Method::DELETE, "/books/500"))
            .unwrap();

        assert_eq!(url.as_str(), "http://catalog:9000/api/books/500");
    }

    #[test]
    fn error_categories() {
        assert_eq!(TransportError::Timeout.category(), ErrorCategory::Timeout);
        assert_eq!(
            TransportError::Connect("refused".into()).category(),
            ErrorCategory::Connect
        );
        assert_eq!(
            TransportError::Body("eof".into()).category(),
            ErrorCategory::Transport
        );
    }

    #[tokio::test]
    async fn connection_refused_is_a_connect_error() {
        // bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = CatalogClient::new(&format!("http://{addr}"), None).unwrap();
        let err = client
            .send(&CatalogRequest::new(Method::GET, "/books/all"))
            .await
            .expect_err("nothing is listening");

        assert_eq!(err.category(), ErrorCategory::Connect);
    }
}

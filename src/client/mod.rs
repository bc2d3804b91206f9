//! Outbound JSON API client.
//!
//! # Responsibilities
//! - Build requests against one server address (plain or TLS)
//! - Run an auth mutator on every request before it is sent
//! - Expose raw responses plus JSON decoding helpers
//!
//! # Design Decisions
//! - The mutator sees the request at build time so it can add headers
//!   that later builder calls may still override
//! - Non-2xx responses are not errors at this level; [`Response::decode`]
//!   turns them into [`ClientError::Api`]

pub mod crud;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use axum::body::Bytes;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::http::error::ApiError;

pub use crud::CrudClient;

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid resource id {0:?}: not usable as a path segment")]
    InvalidId(String),

    #[error("Server returned error: {0}")]
    Api(ApiError),
}

/// Mutates every request the client builds.
pub type AuthMutator = Arc<dyn Fn(&mut Request) + Send + Sync>;

/// Client bound to a single server address.
#[derive(Clone)]
pub struct Client {
    addr: String,
    use_tls: bool,
    auth: AuthMutator,
    http: reqwest::Client,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("addr", &self.addr)
            .field("use_tls", &self.use_tls)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client for `addr` (`host:port`, or `:port` for localhost).
    pub fn new(addr: impl Into<String>) -> Self {
        Self::with_http_client(addr, reqwest::Client::new())
    }

    /// Create a client that sends through an existing `reqwest::Client`.
    pub fn with_http_client(addr: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            addr: addr.into(),
            use_tls: false,
            auth: Arc::new(|_: &mut Request| {}),
            http,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_tls(&self) -> bool {
        self.use_tls
    }

    /// Set the mutator run on every request this client builds.
    pub fn set_auth_fn<F>(&mut self, auth: F) -> &mut Self
    where
        F: Fn(&mut Request) + Send + Sync + 'static,
    {
        self.auth = Arc::new(auth);
        self
    }

    /// Use `https` for every request.
    pub fn use_tls(&mut self) -> &mut Self {
        self.use_tls = true;
        self
    }

    fn base(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        match self.addr.strip_prefix(':') {
            Some(port) => format!("{scheme}://localhost:{port}"),
            None => format!("{scheme}://{}", self.addr),
        }
    }

    /// Start a new request. The auth mutator has already run on it.
    pub fn request(&self) -> Request {
        let mut req = Request {
            base: self.base(),
            method: Method::GET,
            uri: String::new(),
            body: None,
            headers: BTreeMap::new(),
            http: self.http.clone(),
        };
        (self.auth)(&mut req);
        req
    }

    pub async fn get(&self, uri: &str) -> Result<Response, ClientError> {
        self.request()
            .set_method(Method::GET)
            .set_uri(uri)
            .send()
            .await
    }

    pub async fn post<T: Serialize + ?Sized>(&self, uri: &str, body: &T) -> Result<Response, ClientError> {
        let body = serde_json::to_vec(body)?;
        self.request()
            .set_method(Method::POST)
            .set_uri(uri)
            .set_body(body)
            .send()
            .await
    }

    pub async fn put<T: Serialize + ?Sized>(&self, uri: &str, body: &T) -> Result<Response, ClientError> {
        let body = serde_json::to_vec(body)?;
        self.request()
            .set_method(Method::PUT)
            .set_uri(uri)
            .set_body(body)
            .send()
            .await
    }

    pub async fn delete(&self, uri: &str) -> Result<Response, ClientError> {
        self.request()
            .set_method(Method::DELETE)
            .set_uri(uri)
            .send()
            .await
    }
}

/// A request under construction.
#[derive(Debug, Clone)]
pub struct Request {
    base: String,
    method: Method,
    uri: String,
    body: Option<Vec<u8>>,
    headers: BTreeMap<String, String>,
    http: reqwest::Client,
}

impl Request {
    pub fn set_method(&mut self, method: Method) -> &mut Self {
        self.method = method;
        self
    }

    pub fn set_uri(&mut self, uri: impl Into<String>) -> &mut Self {
        self.uri = uri.into();
        self
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) -> &mut Self {
        self.body = Some(body.into());
        self
    }

    /// Replace all headers.
    pub fn set_headers<I, K, V>(&mut self, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers = headers
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Scheme and authority this request is sent to.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Full URL: base joined with the URI.
    pub fn url(&self) -> Result<Url, ClientError> {
        let raw = if self.uri.is_empty() || self.uri.starts_with('/') {
            format!("{}{}", self.base, self.uri)
        } else {
            format!("{}/{}", self.base, self.uri)
        };
        Url::parse(&raw).map_err(|source| ClientError::InvalidUrl { url: raw, source })
    }

    /// Send the request and read the whole response.
    pub async fn send(&self) -> Result<Response, ClientError> {
        let url = self.url()?;
        let mut builder = self.http.request(self.method.clone(), url.clone());
        for (k, v) in &self.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }
        if let Some(body) = &self.body {
            if !self.headers.keys().any(|k| k.eq_ignore_ascii_case(CONTENT_TYPE.as_str())) {
                builder = builder.header(CONTENT_TYPE, "application/json");
            }
            builder = builder.body(body.clone());
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;

        tracing::debug!(method = %self.method, url = %url, status = status.as_u16(), "Client request completed");

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the body as JSON, whatever the status.
    pub fn read_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// The error carried by a non-2xx response.
    ///
    /// Bodies that are not a JSON error are wrapped with the response status.
    pub fn api_error(&self) -> ApiError {
        match self.read_json::<ApiError>() {
            Ok(err) if err.code != 0 => err,
            Ok(err) => ApiError::new(err.message, self.status),
            Err(_) => ApiError::new(String::from_utf8_lossy(&self.body), self.status),
        }
    }

    /// Decode a 2xx body as `T`, or return the server's error.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        if !self.is_success() {
            return Err(ClientError::Api(self.api_error()));
        }
        Ok(self.read_json()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_client() {
        let c = Client::new(":123");
        assert_eq!(c.addr(), ":123");
        assert!(!c.is_tls());
    }

    #[test]
    fn test_request_base() {
        let r = Client::new("local:123").request();
        assert_eq!(r.base(), "http://local:123");
        assert_eq!(*r.method(), Method::GET);
        assert!(r.uri().is_empty());
        assert!(r.body().is_none());
        assert!(r.headers().is_empty());

        let mut c = Client::new("local:123");
        c.use_tls();
        assert_eq!(c.request().base(), "https://local:123");
    }

    #[test]
    fn test_port_only_address_targets_localhost() {
        let r = Client::new(":8080").request();
        assert_eq!(r.url().unwrap().as_str(), "http://localhost:8080/");
    }

    #[test]
    fn test_request_setters() {
        let mut r = Client::new("local:123").request();
        r.set_method(Method::PATCH)
            .set_uri("test/uri")
            .set_body("some body")
            .set_header("x-header-1", "some header");
        assert_eq!(*r.method(), Method::PATCH);
        assert_eq!(r.uri(), "test/uri");
        assert_eq!(r.body(), Some(&b"some body"[..]));
        assert_eq!(r.header("x-header-1"), Some("some header"));
        assert_eq!(r.url().unwrap().as_str(), "http://local:123/test/uri");

        r.set_headers([("x-header", "replaced")]);
        assert_eq!(r.headers().len(), 1);
        assert_eq!(r.header("x-header"), Some("replaced"));
    }

    #[test]
    fn test_auth_mutator_runs_on_every_request() {
        let mut c = Client::new("local:123");
        c.set_auth_fn(|r: &mut Request| {
            r.set_header("authorization", "Bearer secret");
        });
        assert_eq!(c.request().header("authorization"), Some("Bearer secret"));
        assert_eq!(c.request().header("authorization"), Some("Bearer secret"));
    }

    #[test]
    fn test_invalid_url() {
        let r = Client::new("bad host:1").request();
        assert!(matches!(r.url(), Err(ClientError::InvalidUrl { .. })));
    }

    #[test]
    fn test_api_error_from_body() {
        let resp = Response {
            status: StatusCode::NOT_FOUND,
            headers: HeaderMap::new(),
            body: Bytes::from_static(br#"{"error":"name not found","code":404}"#),
        };
        assert!(!resp.is_success());
        let err = resp.api_error();
        assert_eq!(err.message, "name not found");
        assert_eq!(err.code, 404);
        assert!(matches!(resp.decode::<serde_json::Value>(), Err(ClientError::Api(_))));
    }

    #[test]
    fn test_api_error_from_plain_body() {
        let resp = Response {
            status: StatusCode::BAD_GATEWAY,
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"upstream down"),
        };
        let err = resp.api_error();
        assert_eq!(err.message, "upstream down");
        assert_eq!(err.code, 502);
    }

    #[test]
    fn test_decode_success() {
        let resp = Response {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(br#"{"some":"data"}"#),
        };
        let v: serde_json::Value = resp.decode().unwrap();
        assert_eq!(v["some"], "data");
    }
}

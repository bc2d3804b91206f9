//! Per-request context.
//!
//! # Responsibilities
//! - Expose the request (method, path, headers, body, path parameters)
//! - Hold the response being built (status, headers, body)
//! - Typed, fallible access to path parameters
//!
//! # Design Decisions
//! - A `Ctx` is owned by exactly one request task and never shared
//! - Missing or unparsable parameters are errors, never silent defaults
//! - JSON write failures fall back to a static 500 body

use std::fmt::Display;
use std::str::FromStr;

use axum::body::{Body, Bytes};
use axum::http::{
    header::{HeaderName, HeaderValue},
    request, HeaderMap, Method, StatusCode, Uri,
};
use axum::response::Response;
use serde::{de::DeserializeOwned, Serialize};

use crate::http::error::{ApiError, MARSHAL_FALLBACK_BODY};

/// Error returned by the path parameter accessors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    /// The route has no parameter with this name.
    #[error("no such path parameter: {0}")]
    Missing(String),

    /// The raw value could not be parsed into the requested type.
    #[error("invalid path parameter {name}={value:?}: {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

/// Path parameters captured by the router, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// The response under construction.
#[derive(Debug)]
struct ResponseState {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

/// Request context handed to every handler.
#[derive(Debug)]
pub struct Ctx {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    params: Params,
    route: Option<String>,
    response: ResponseState,
}

impl Default for Ctx {
    fn default() -> Self {
        Self::new(Method::GET, Uri::from_static("/"), HeaderMap::new(), Bytes::new())
    }
}

impl Ctx {
    /// Create a context for a request.
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
            params: Params::new(),
            route: None,
            response: ResponseState::default(),
        }
    }

    /// Create a context from request parts and a buffered body.
    pub fn from_parts(parts: request::Parts, body: Bytes) -> Self {
        Self::new(parts.method, parts.uri, parts.headers, body)
    }

    // --- request ---

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// The registered pattern that matched this request, once routed.
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub(crate) fn set_route(&mut self, pattern: &str) {
        self.route = Some(pattern.to_string());
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a request header as a string, if present and valid UTF-8.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|v| v.to_str().ok())
    }

    /// Raw request body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Deserialize the request body.
    pub fn read_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    // --- path parameters ---

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Set a path parameter. The router does this before the handler runs.
    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.insert(name, value);
    }

    pub(crate) fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    /// Returns path parameter `name` exactly as matched.
    pub fn param(&self, name: &str) -> Result<&str, ParamError> {
        self.params
            .get(name)
            .ok_or_else(|| ParamError::Missing(name.to_string()))
    }

    /// Returns path parameter `name` parsed as `T`.
    pub fn param_as<T>(&self, name: &str) -> Result<T, ParamError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.param(name)?;
        raw.parse::<T>().map_err(|e| ParamError::Invalid {
            name: name.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn param_int(&self, name: &str) -> Result<i32, ParamError> {
        self.param_as(name)
    }

    pub fn param_i64(&self, name: &str) -> Result<i64, ParamError> {
        self.param_as(name)
    }

    pub fn param_u64(&self, name: &str) -> Result<u64, ParamError> {
        self.param_as(name)
    }

    pub fn param_f64(&self, name: &str) -> Result<f64, ParamError> {
        self.param_as(name)
    }

    // --- response ---

    pub fn status(&self) -> StatusCode {
        self.response.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.response.status = status;
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response.headers
    }

    pub fn response_body(&self) -> &Bytes {
        &self.response.body
    }

    /// Set a response header. Invalid names or values are dropped with a warning.
    pub fn set_header<K, V>(&mut self, key: K, value: V)
    where
        K: TryInto<HeaderName>,
        V: TryInto<HeaderValue>,
    {
        match (key.try_into(), value.try_into()) {
            (Ok(k), Ok(v)) => {
                self.response.headers.insert(k, v);
            }
            _ => tracing::warn!(path = %self.path(), "Ignoring invalid response header"),
        }
    }

    /// Replace the response body with raw bytes.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.response.body = body.into();
    }

    /// Serialize `value` into the response body.
    ///
    /// On failure the status becomes 500 and the body the fixed fallback.
    pub fn write_json<T: Serialize + ?Sized>(&mut self, value: &T) {
        self.write_marshaled(serde_json::to_vec(value));
    }

    pub(crate) fn write_marshaled(&mut self, encoded: Result<Vec<u8>, serde_json::Error>) {
        match encoded {
            Ok(bytes) => self.set_body(bytes),
            Err(e) => {
                tracing::error!(path = %self.path(), error = %e, "Failed to marshal response");
                self.set_status(StatusCode::INTERNAL_SERVER_ERROR);
                self.set_body(Bytes::from_static(MARSHAL_FALLBACK_BODY.as_bytes()));
            }
        }
    }

    /// Write `value` with status 200.
    pub fn ok<T: Serialize + ?Sized>(&mut self, value: &T) {
        self.set_status(StatusCode::OK);
        self.write_json(value);
    }

    /// Write a structured error, using its code as the status.
    pub fn write_error(&mut self, err: &ApiError) {
        let err = err.normalized();
        self.set_status(err.status());
        self.write_json(&err);
    }

    /// Write `err` as a structured error with `code`.
    pub fn err(&mut self, err: impl Display, code: StatusCode) {
        self.write_error(&ApiError::from_err(err, code));
    }

    pub fn err_bad_request(&mut self, err: impl Display) {
        self.err(err, StatusCode::BAD_REQUEST);
    }

    pub fn err_unauthorized(&mut self, err: impl Display) {
        self.err(err, StatusCode::UNAUTHORIZED);
    }

    pub fn err_forbidden(&mut self, err: impl Display) {
        self.err(err, StatusCode::FORBIDDEN);
    }

    pub fn err_not_found(&mut self, err: impl Display) {
        self.err(err, StatusCode::NOT_FOUND);
    }

    pub fn err_method_not_allowed(&mut self, err: impl Display) {
        self.err(err, StatusCode::METHOD_NOT_ALLOWED);
    }

    pub fn err_internal_server_error(&mut self, err: impl Display) {
        self.err(err, StatusCode::INTERNAL_SERVER_ERROR);
    }

    pub fn err_bad_gateway(&mut self, err: impl Display) {
        self.err(err, StatusCode::BAD_GATEWAY);
    }

    pub fn err_service_unavailable(&mut self, err: impl Display) {
        self.err(err, StatusCode::SERVICE_UNAVAILABLE);
    }

    pub fn err_gateway_timeout(&mut self, err: impl Display) {
        self.err(err, StatusCode::GATEWAY_TIMEOUT);
    }

    /// Convert the built response into an HTTP response.
    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.response.body));
        *response.status_mut() = self.response.status;
        *response.headers_mut() = self.response.headers;
        response
    }
}

//! Request dispatch.
//!
//! # Responsibilities
//! - Look up the route for each request
//! - Set the standard JSON response headers
//! - Run the auth predicate before any handler
//! - Answer router-level misses (404/405) and oversized bodies (413)
//! - Rewrite the timeout layer's bare 408 as a JSON error
//! - Record per-request metrics
//!
//! # Design Decisions
//! - Controller handlers are adapted to raw handlers once, at registration
//! - The route table is frozen inside the dispatcher; serving never writes to it
//! - Router-level misses are not auth gated; every matched route is

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{Body, Bytes, HttpBody},
    extract::State,
    http::{
        header::{self, HeaderMap, HeaderValue},
        request, Method, Request, StatusCode, Uri,
    },
    response::Response,
};

use crate::http::ctx::Ctx;
use crate::http::error::ApiError;
use crate::http::response::Outcome;
use crate::observability::metrics;
use crate::routing::{Lookup, RouteTable};

/// Default value of the `Server` response header.
pub const DEFAULT_SERVER_NAME: &str = "jsonapi";

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A handler that writes its response directly into the context.
pub type Handler = Arc<dyn for<'a> Fn(&'a mut Ctx) -> BoxFuture<'a, ()> + Send + Sync>;

/// A handler that returns an envelope for the dispatcher to write.
pub type ControllerHandler = Arc<dyn for<'a> Fn(&'a mut Ctx) -> BoxFuture<'a, Outcome> + Send + Sync>;

/// Predicate evaluated before every dispatched request.
pub type AuthFn = Arc<dyn Fn(&Ctx) -> bool + Send + Sync>;

/// Box a closure as a [`Handler`].
///
/// ```ignore
/// let h = handler(|ctx| Box::pin(async move { ctx.ok(&"pong") }));
/// ```
pub fn handler<F>(f: F) -> Handler
where
    F: for<'a> Fn(&'a mut Ctx) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Box a closure as a [`ControllerHandler`].
pub fn controller_handler<F>(f: F) -> ControllerHandler
where
    F: for<'a> Fn(&'a mut Ctx) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Adapt a controller handler into a raw handler that writes its outcome.
pub fn wrap_controller(h: ControllerHandler) -> Handler {
    handler(move |ctx: &mut Ctx| {
        let h = Arc::clone(&h);
        Box::pin(async move {
            let outcome = h(&mut *ctx).await;
            outcome.write_to(ctx);
        })
    })
}

/// The auth predicate used when none is configured: everything passes.
pub fn allow_all() -> AuthFn {
    Arc::new(|_: &Ctx| true)
}

/// Routes requests to handlers behind the auth gate.
pub struct Dispatcher {
    routes: RouteTable<Handler>,
    auth: AuthFn,
    server_name: HeaderValue,
    max_body_size: usize,
}

impl Dispatcher {
    pub fn new(routes: RouteTable<Handler>, auth: AuthFn, server_name: &str, max_body_size: usize) -> Self {
        let server_name = HeaderValue::from_str(server_name).unwrap_or_else(|_| {
            tracing::warn!(server_name, "Invalid server name; using default");
            HeaderValue::from_static(DEFAULT_SERVER_NAME)
        });
        Self {
            routes,
            auth,
            server_name,
            max_body_size,
        }
    }

    pub fn routes(&self) -> &RouteTable<Handler> {
        &self.routes
    }

    /// Dispatch one request.
    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let start_time = Instant::now();
        let (parts, body) = request.into_parts();
        let method = parts.method.clone();
        let path = parts.uri.path().to_string();

        let (endpoint, pattern, params) = match self.routes.lookup(&method, &path) {
            Lookup::Found {
                handler,
                pattern,
                params,
            } => (handler, pattern, params),
            Lookup::MethodNotAllowed { allowed } => {
                tracing::debug!(method = %method, path = %path, "Method not allowed");
                let mut ctx = self.reject(parts, ApiError::method_not_allowed("method not allowed"));
                let allow: Vec<&str> = allowed.iter().map(Method::as_str).collect();
                ctx.set_header(header::ALLOW, allow.join(", ").as_str());
                return self.finish(ctx, &method, "none", start_time);
            }
            Lookup::NotFound => {
                tracing::debug!(method = %method, path = %path, "No route matched");
                let ctx = self.reject(parts, ApiError::not_found("not found"));
                return self.finish(ctx, &method, "none", start_time);
            }
        };

        let declared = content_length(&parts)
            .or_else(|| body.size_hint().exact().and_then(|n| usize::try_from(n).ok()));
        if let Some(len) = declared {
            if len > self.max_body_size {
                tracing::warn!(path = %path, content_length = len, "Request body too large");
                let ctx = self.reject(
                    parts,
                    ApiError::new("request body too large", StatusCode::PAYLOAD_TOO_LARGE),
                );
                return self.finish(ctx, &method, pattern, start_time);
            }
        }

        let body = match axum::body::to_bytes(body, self.max_body_size).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Failed to read request body");
                let ctx = self.reject(parts, ApiError::bad_request("failed to read request body"));
                return self.finish(ctx, &method, pattern, start_time);
            }
        };

        let mut ctx = Ctx::from_parts(parts, body);
        ctx.set_params(params);
        ctx.set_route(pattern);
        self.set_standard_headers(&mut ctx);

        if !(self.auth)(&ctx) {
            tracing::debug!(method = %method, path = %path, "Request rejected by auth predicate");
            ctx.write_error(&ApiError::unauthorized_request());
        } else {
            endpoint(&mut ctx).await;
        }

        self.finish(ctx, &method, pattern, start_time)
    }

    /// Replace the empty 408 produced by the timeout layer with a JSON error.
    ///
    /// Any other response, including a 408 written by a handler, passes through.
    pub fn timed_out(&self, method: &Method, uri: &Uri, response: Response) -> Response {
        if response.status() != StatusCode::REQUEST_TIMEOUT
            || response.headers().contains_key(header::CONTENT_TYPE)
        {
            return response;
        }

        tracing::warn!(method = %method, path = %uri.path(), "Request timed out");
        let mut ctx = Ctx::new(method.clone(), uri.clone(), HeaderMap::new(), Bytes::new());
        self.set_standard_headers(&mut ctx);
        ctx.write_error(&ApiError::new("request timeout", StatusCode::REQUEST_TIMEOUT));
        ctx.into_response()
    }

    fn set_standard_headers(&self, ctx: &mut Ctx) {
        ctx.set_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        ctx.set_header(header::SERVER, self.server_name.clone());
    }

    fn reject(&self, parts: request::Parts, err: ApiError) -> Ctx {
        let mut ctx = Ctx::from_parts(parts, Bytes::new());
        self.set_standard_headers(&mut ctx);
        ctx.write_error(&err);
        ctx
    }

    fn finish(&self, ctx: Ctx, method: &Method, route: &str, start_time: Instant) -> Response {
        let status = ctx.status();
        metrics::record_request(method.as_str(), status.as_u16(), route, start_time);
        tracing::debug!(
            method = %method,
            route = %route,
            status = status.as_u16(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Request dispatched"
        );
        ctx.into_response()
    }
}

/// Body length announced by the `Content-Length` header.
fn content_length(parts: &request::Parts) -> Option<usize> {
    parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Axum fallback that hands every request to the dispatcher.
pub async fn dispatch_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    request: Request<Body>,
) -> Response {
    dispatcher.dispatch(request).await
}

/// Response mapper layered outside the timeout layer.
pub async fn timeout_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    method: Method,
    uri: Uri,
    response: Response,
) -> Response {
    dispatcher.timed_out(&method, &uri, response)
}

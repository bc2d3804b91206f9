//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Collect route registrations (chained calls, controllers, CRUD resources)
//! - Hold the auth predicate and listen address
//! - Freeze the route table into a dispatcher and an Axum router
//! - Wire up middleware (request ID, tracing, timeout)
//! - Answer timed out requests with the same JSON error body as every other error
//! - Serve over TCP, TLS or a unix socket with graceful shutdown
//!
//! # Design Decisions
//! - Every `listen*` method consumes the server, so routes cannot be
//!   registered after serving starts and a server cannot be bound twice
//! - Registration errors are deferred: the first one is reported when the
//!   server is built or started

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::Method, middleware::map_response_with_state, Router};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::schema::{ServerConfig, DEFAULT_ADDR};
use crate::http::ctx::Ctx;
use crate::http::dispatch::{
    allow_all, dispatch_handler, handler, timeout_handler, wrap_controller, AuthFn, BoxFuture,
    ControllerHandler, Dispatcher, Handler,
};
use crate::http::request::UuidRequestId;
use crate::lifecycle::shutdown_signal;
use crate::net::listener::{bind_tcp, resolve_addr, ListenerError};
use crate::net::tls::{load_tls_config, tls_config_from_pem};
use crate::routing::{RouteError, RouteTable};

/// Error returned when building or starting a server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Route registration failed: {0}")]
    Route(#[from] RouteError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("TLS setup failed: {0}")]
    Tls(#[source] std::io::Error),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON API server builder.
pub struct Server {
    addr: String,
    config: ServerConfig,
    routes: RouteTable<Handler>,
    auth: AuthFn,
    error: Option<RouteError>,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    /// Create a server listening on the default address (`:80`).
    pub fn new() -> Self {
        Self::from_config(ServerConfig::default())
    }

    /// Create a server from configuration.
    pub fn from_config(config: ServerConfig) -> Self {
        let addr = if config.listener.address.is_empty() {
            DEFAULT_ADDR.to_string()
        } else {
            config.listener.address.clone()
        };
        Self {
            addr,
            config,
            routes: RouteTable::new(),
            auth: allow_all(),
            error: None,
        }
    }

    /// Set the listen address.
    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    /// Set the predicate evaluated before every request.
    ///
    /// Requests for which it returns false get a 401 and never reach a handler.
    pub fn with_auth_fn<F>(mut self, auth: F) -> Self
    where
        F: Fn(&Ctx) -> bool + Send + Sync + 'static,
    {
        self.auth = Arc::new(auth);
        self
    }

    pub fn address(&self) -> &str {
        &self.addr
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Registered (method, pattern) pairs.
    pub fn routes(&self) -> Vec<(Method, String)> {
        self.routes.routes()
    }

    pub(crate) fn register(&mut self, method: Method, path: &str, h: Handler) {
        if let Err(e) = self.routes.insert(method.clone(), path, h) {
            tracing::error!(method = %method, path, error = %e, "Invalid route");
            self.error.get_or_insert(e);
        }
    }

    pub(crate) fn register_controller(&mut self, method: Method, path: &str, h: ControllerHandler) {
        self.register(method, path, wrap_controller(h));
    }

    /// Add a raw handler for `method` and `path`.
    pub fn route(mut self, method: Method, path: &str, h: Handler) -> Self {
        self.register(method, path, h);
        self
    }

    /// Add a raw handler written as a closure.
    pub fn handle<F>(self, method: Method, path: &str, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Ctx) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.route(method, path, handler(f))
    }

    /// Add a handler returning an `Outcome`.
    ///
    /// Can be used directly, without a controller.
    pub fn controller_method(mut self, method: Method, path: &str, h: ControllerHandler) -> Self {
        self.register_controller(method, path, h);
        self
    }

    pub fn get<F>(self, path: &str, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Ctx) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.handle(Method::GET, path, f)
    }

    pub fn head<F>(self, path: &str, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Ctx) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.handle(Method::HEAD, path, f)
    }

    pub fn post<F>(self, path: &str, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Ctx) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.handle(Method::POST, path, f)
    }

    pub fn put<F>(self, path: &str, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Ctx) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.handle(Method::PUT, path, f)
    }

    pub fn patch<F>(self, path: &str, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Ctx) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.handle(Method::PATCH, path, f)
    }

    pub fn delete<F>(self, path: &str, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Ctx) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.handle(Method::DELETE, path, f)
    }

    pub fn connect<F>(self, path: &str, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Ctx) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.handle(Method::CONNECT, path, f)
    }

    pub fn options<F>(self, path: &str, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Ctx) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.handle(Method::OPTIONS, path, f)
    }

    pub fn trace<F>(self, path: &str, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Ctx) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.handle(Method::TRACE, path, f)
    }

    /// Freeze the route table and build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn into_router(self) -> Result<Router, ServerError> {
        if let Some(err) = self.error {
            return Err(err.into());
        }

        tracing::info!(routes = self.routes.len(), "Route table frozen");
        for (method, pattern) in self.routes.routes() {
            tracing::debug!(method = %method, pattern = %pattern, "Route registered");
        }

        let dispatcher = Arc::new(Dispatcher::new(
            self.routes,
            self.auth,
            &self.config.http.server_name,
            self.config.http.max_body_size,
        ));

        Ok(Router::new()
            .fallback(dispatch_handler)
            .with_state(Arc::clone(&dispatcher))
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.timeouts.request_secs,
            )))
            .layer(map_response_with_state(dispatcher, timeout_handler))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId)))
    }

    /// Serve on an already bound listener until `shutdown` completes.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.into_router()?;
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Listen on the configured address until Ctrl-C.
    pub async fn listen(self) -> Result<(), ServerError> {
        if let Some(err) = self.error.clone() {
            return Err(err.into());
        }
        let listener = bind_tcp(&self.addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Listen with TLS, reading the certificate and key from PEM files.
    pub async fn listen_tls(
        self,
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
    ) -> Result<(), ServerError> {
        let tls = load_tls_config(cert_path.as_ref(), key_path.as_ref())
            .await
            .map_err(ServerError::Tls)?;
        self.serve_tls(tls).await
    }

    /// Listen with TLS using a PEM certificate and key held in memory.
    pub async fn listen_tls_embedded(self, cert: Vec<u8>, key: Vec<u8>) -> Result<(), ServerError> {
        let tls = tls_config_from_pem(cert, key)
            .await
            .map_err(ServerError::Tls)?;
        self.serve_tls(tls).await
    }

    async fn serve_tls(self, tls: RustlsConfig) -> Result<(), ServerError> {
        let addr = resolve_addr(&self.addr).await?;
        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        let router = self.into_router()?;

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown_handle.graceful_shutdown(Some(grace));
        });

        tracing::info!(address = %addr, "HTTPS server starting");
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Listen on a unix socket at `path` with file `mode` until Ctrl-C.
    #[cfg(unix)]
    pub async fn listen_unix(self, path: impl AsRef<Path>, mode: u32) -> Result<(), ServerError> {
        if let Some(err) = self.error.clone() {
            return Err(err.into());
        }
        let listener = crate::net::listener::bind_unix(path.as_ref(), mode)?;
        self.serve_unix(listener, shutdown_signal()).await
    }

    /// Serve on an already bound unix listener until `shutdown` completes.
    #[cfg(unix)]
    pub async fn serve_unix<F>(
        self,
        listener: tokio::net::UnixListener,
        shutdown: F,
    ) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.into_router()?;
        tracing::info!("HTTP server starting on unix socket");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Listen the way the configuration says: unix socket, TLS, or plain TCP.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = self.config.listener.clone();

        #[cfg(unix)]
        if let Some(unix) = listener.unix {
            return self.listen_unix(&unix.path, unix.mode).await;
        }

        match listener.tls {
            Some(tls) => self.listen_tls(&tls.cert_path, &tls.key_path).await,
            None => self.listen().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_address() {
        let s = Server::new();
        assert_eq!(s.address(), ":80");
        let s = s.with_addr("addr:877");
        assert_eq!(s.address(), "addr:877");
    }

    #[test]
    fn test_from_config_uses_listener_address() {
        let mut config = ServerConfig::default();
        config.listener.address = "127.0.0.1:9999".into();
        assert_eq!(Server::from_config(config).address(), "127.0.0.1:9999");
    }

    #[test]
    fn test_chained_registration() {
        let s = Server::new()
            .get("/a", |ctx| Box::pin(async move { ctx.ok(&1) }))
            .post("/a", |ctx| Box::pin(async move { ctx.ok(&2) }))
            .delete("/a/:id", |ctx| Box::pin(async move { ctx.ok(&3) }));
        let routes: Vec<String> = s
            .routes()
            .into_iter()
            .map(|(m, p)| format!("{m} {p}"))
            .collect();
        assert_eq!(routes, vec!["GET /a", "POST /a", "DELETE /a/:id"]);
    }

    #[test]
    fn test_invalid_route_is_reported_on_build() {
        let s = Server::new().get("no-slash", |ctx| Box::pin(async move { ctx.ok(&1) }));
        let err = s.into_router().unwrap_err();
        assert!(matches!(err, ServerError::Route(RouteError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn test_listen_reports_route_error_before_binding() {
        let s = Server::new()
            .with_addr("127.0.0.1:0")
            .get("/x/:", |ctx| Box::pin(async move { ctx.ok(&1) }));
        assert!(matches!(s.listen().await, Err(ServerError::Route(_))));
    }

    #[tokio::test]
    async fn test_listen_reports_bind_error() {
        let s = Server::new().with_addr("definitely not an address");
        assert!(matches!(s.listen().await, Err(ServerError::Listener(_))));
    }

    #[tokio::test]
    async fn test_listen_tls_missing_files() {
        let s = Server::new().with_addr("127.0.0.1:0");
        let err = s
            .listen_tls("/nonexistent/cert.pem", "/nonexistent/key.pem")
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Tls(_)));
    }
}

//! JSON-over-HTTP dispatch layer.
//!
//! Handlers are registered against (method, path pattern) pairs, either one
//! by one, through a [`controller::Controller`] method map, or as a five
//! route [`controller::CrudController`] resource. Every response is JSON;
//! errors use the body `{"error":"<message>","code":<int>}`.
//!
//! ```text
//!     Client Request
//!     ──▶ net (tcp / tls / unix listener)
//!     ──▶ http::server (request id, trace, timeout)
//!     ──▶ http::dispatch (route table lookup, body limit, auth gate)
//!     ──▶ handler (Ctx accessors, Outcome / direct writers)
//!     ◀── JSON response
//! ```

// Core subsystems
pub mod config;
pub mod controller;
pub mod http;
pub mod net;
pub mod routing;

// Outbound
pub mod client;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use axum::http::{Method, StatusCode};
pub use client::{Client, ClientError, CrudClient};
pub use config::ServerConfig;
pub use controller::{Controller, ControllerMethods, ControllerPaths, CrudController};
pub use http::{
    controller_handler, handler, ApiError, Ctx, Outcome, ParamError, Respond, ResponseBuilder,
    Server, ServerError,
};
pub use lifecycle::Shutdown;

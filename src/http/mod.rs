//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS/unix connection
//!     → server.rs (Axum setup, middleware, listeners)
//!     → request.rs (request ID)
//!     → dispatch.rs (route lookup, body limit, auth gate)
//!     → handler (ctx.rs accessors, response.rs outcomes)
//!     → error.rs (JSON error body)
//!     → Send to client
//! ```

pub mod ctx;
pub mod dispatch;
pub mod error;
pub mod request;
pub mod response;
pub mod server;

pub use ctx::{Ctx, ParamError, Params};
pub use dispatch::{
    controller_handler, handler, AuthFn, BoxFuture, ControllerHandler, Dispatcher, Handler,
};
pub use error::ApiError;
pub use request::X_REQUEST_ID;
pub use response::{Marshal, Outcome, Respond, ResponseBuilder};
pub use server::{Server, ServerError};

//! Response envelopes returned by controller handlers.
//!
//! # Responsibilities
//! - Carry either a success payload or a structured error (never both)
//! - Defer payload serialization until the response is written
//! - Provide the `ResponseBuilder` capability controllers compose with
//!
//! # Design Decisions
//! - Payloads are type-erased behind `Marshal` so handlers of one route
//!   table can return different types
//! - Serialization failures are handled by the writer, not the handler

use std::fmt::{self, Display};

use axum::http::StatusCode;
use serde::Serialize;

use crate::http::ctx::Ctx;
use crate::http::error::ApiError;

/// A value that can encode itself as JSON.
pub trait Marshal: Send {
    fn marshal_json(&self) -> Result<Vec<u8>, serde_json::Error>;
}

impl<T: Serialize + Send> Marshal for T {
    fn marshal_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Outcome of a controller handler.
pub enum Outcome {
    /// Success payload, written with status 200.
    Data(Box<dyn Marshal>),
    /// Error, written with its own code.
    Err(ApiError),
}

impl Outcome {
    pub fn data<T: Serialize + Send + 'static>(value: T) -> Self {
        Outcome::Data(Box::new(value))
    }

    pub fn error(err: ApiError) -> Self {
        Outcome::Err(err)
    }

    /// Returns true if this outcome carries an error.
    pub fn has_error(&self) -> bool {
        matches!(self, Outcome::Err(_))
    }

    /// Replace this outcome with `err`.
    pub fn with_error(self, err: ApiError) -> Self {
        Outcome::Err(err)
    }

    pub fn as_error(&self) -> Option<&ApiError> {
        match self {
            Outcome::Err(e) => Some(e),
            Outcome::Data(_) => None,
        }
    }

    /// Write this outcome into the response held by `ctx`.
    pub fn write_to(self, ctx: &mut Ctx) {
        match self {
            Outcome::Err(err) => ctx.write_error(&err),
            Outcome::Data(payload) => {
                ctx.set_status(StatusCode::OK);
                ctx.write_marshaled(payload.marshal_json());
            }
        }
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Data(_) => f.write_str("Outcome::Data(..)"),
            Outcome::Err(e) => f.debug_tuple("Outcome::Err").field(e).finish(),
        }
    }
}

impl From<ApiError> for Outcome {
    fn from(err: ApiError) -> Self {
        Outcome::Err(err)
    }
}

impl<T, E> From<Result<T, E>> for Outcome
where
    T: Serialize + Send + 'static,
    E: Into<ApiError>,
{
    fn from(res: Result<T, E>) -> Self {
        match res {
            Ok(v) => Outcome::data(v),
            Err(e) => Outcome::Err(e.into()),
        }
    }
}

/// Builds `Outcome`s for controllers.
///
/// Controllers hold a [`Respond`] and call these instead of building
/// envelopes by hand.
pub trait ResponseBuilder {
    fn ok<T: Serialize + Send + 'static>(&self, value: T) -> Outcome {
        Outcome::data(value)
    }

    fn err(&self, err: impl Display, code: StatusCode) -> Outcome {
        let message = err.to_string();
        let message = if message.is_empty() {
            "unknown error".to_string()
        } else {
            message
        };
        Outcome::Err(ApiError::new(message, code))
    }

    fn err_bad_request(&self, err: impl Display) -> Outcome {
        self.err(err, StatusCode::BAD_REQUEST)
    }

    fn err_unauthorized(&self, err: impl Display) -> Outcome {
        self.err(err, StatusCode::UNAUTHORIZED)
    }

    fn err_forbidden(&self, err: impl Display) -> Outcome {
        self.err(err, StatusCode::FORBIDDEN)
    }

    fn err_not_found(&self, err: impl Display) -> Outcome {
        self.err(err, StatusCode::NOT_FOUND)
    }

    fn err_method_not_allowed(&self, err: impl Display) -> Outcome {
        self.err(err, StatusCode::METHOD_NOT_ALLOWED)
    }

    fn err_internal_server_error(&self, err: impl Display) -> Outcome {
        self.err(err, StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn err_bad_gateway(&self, err: impl Display) -> Outcome {
        self.err(err, StatusCode::BAD_GATEWAY)
    }

    fn err_service_unavailable(&self, err: impl Display) -> Outcome {
        self.err(err, StatusCode::SERVICE_UNAVAILABLE)
    }

    fn err_gateway_timeout(&self, err: impl Display) -> Outcome {
        self.err(err, StatusCode::GATEWAY_TIMEOUT)
    }
}

/// Stateless `ResponseBuilder`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Respond;

impl ResponseBuilder for Respond {}

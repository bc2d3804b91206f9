//! Structured API errors.
//!
//! # Wire Format
//! ```text
//! {"error":"<message>","code":<status>}
//! ```
//!
//! # Design Decisions
//! - A zero code is omitted on the wire; it is normalized to 500 only when
//!   the error is written as a response (see `ApiError::status`)
//! - Named constructors exist for every error status the API exposes

use std::fmt::Display;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// Message used when the auth predicate rejects a request.
pub const UNAUTHORIZED_MESSAGE: &str = "unauthorized";

/// Body written when a success payload cannot be serialized.
pub const MARSHAL_FALLBACK_BODY: &str = r#"{"error":"failed to marshal json"}"#;

/// An error carried back to the client as a JSON body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    /// Human readable message.
    #[serde(rename = "error")]
    pub message: String,

    /// HTTP status code. Zero means "unspecified".
    #[serde(default, skip_serializing_if = "is_zero")]
    pub code: u16,
}

fn is_zero(code: &u16) -> bool {
    *code == 0
}

impl ApiError {
    /// Create an error with an explicit status code.
    pub fn new(message: impl Into<String>, code: StatusCode) -> Self {
        Self {
            message: message.into(),
            code: code.as_u16(),
        }
    }

    /// Create an error without a status code.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: 0,
        }
    }

    /// Create an error from any displayable error.
    pub fn from_err(err: impl Display, code: StatusCode) -> Self {
        Self::new(err.to_string(), code)
    }

    /// The status this error is written with.
    ///
    /// Unspecified or invalid codes become `500 Internal Server Error`.
    pub fn status(&self) -> StatusCode {
        match self.code {
            0 => StatusCode::INTERNAL_SERVER_ERROR,
            code => StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    /// Copy of this error with the code normalized to the emitted status.
    pub fn normalized(&self) -> Self {
        Self {
            message: self.message.clone(),
            code: self.status().as_u16(),
        }
    }

    /// The error sent when the auth predicate fails.
    pub fn unauthorized_request() -> Self {
        Self::new(UNAUTHORIZED_MESSAGE, StatusCode::UNAUTHORIZED)
    }

    pub fn bad_request(err: impl Display) -> Self {
        Self::from_err(err, StatusCode::BAD_REQUEST)
    }

    pub fn unauthorized(err: impl Display) -> Self {
        Self::from_err(err, StatusCode::UNAUTHORIZED)
    }

    pub fn forbidden(err: impl Display) -> Self {
        Self::from_err(err, StatusCode::FORBIDDEN)
    }

    pub fn not_found(err: impl Display) -> Self {
        Self::from_err(err, StatusCode::NOT_FOUND)
    }

    pub fn method_not_allowed(err: impl Display) -> Self {
        Self::from_err(err, StatusCode::METHOD_NOT_ALLOWED)
    }

    pub fn internal_server_error(err: impl Display) -> Self {
        Self::from_err(err, StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn bad_gateway(err: impl Display) -> Self {
        Self::from_err(err, StatusCode::BAD_GATEWAY)
    }

    pub fn service_unavailable(err: impl Display) -> Self {
        Self::from_err(err, StatusCode::SERVICE_UNAVAILABLE)
    }

    pub fn gateway_timeout(err: impl Display) -> Self {
        Self::from_err(err, StatusCode::GATEWAY_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = ApiError::new("great error", StatusCode::NOT_FOUND);
        assert_eq!(e.to_string(), "404: great error");
    }

    #[test]
    fn test_serialize_with_code() {
        let e = ApiError::from_err("some error", StatusCode::NOT_FOUND);
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(json, r#"{"error":"some error","code":404}"#);
    }

    #[test]
    fn test_zero_code_is_omitted() {
        let e = ApiError::message("some error");
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(json, r#"{"error":"some error"}"#);
    }

    #[test]
    fn test_deserialize() {
        let e: ApiError = serde_json::from_str(r#"{"error":"big error","code":678}"#).unwrap();
        assert_eq!(e.message, "big error");
        assert_eq!(e.code, 678);

        let e: ApiError = serde_json::from_str(r#"{"error":"no code"}"#).unwrap();
        assert_eq!(e.code, 0);
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let raw = r#"{"error":"name not found","code":404}"#;
        let e: ApiError = serde_json::from_str(raw).unwrap();
        assert_eq!(serde_json::to_string(&e).unwrap(), raw);
    }

    #[test]
    fn test_status_defaults_to_500() {
        assert_eq!(ApiError::message("x").status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::message("x").normalized().code, 500);
        let bogus = ApiError { message: "x".into(), code: 42 };
        assert_eq!(bogus.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_named_constructors() {
        let cases = [
            (ApiError::bad_request("e"), 400),
            (ApiError::unauthorized("e"), 401),
            (ApiError::forbidden("e"), 403),
            (ApiError::not_found("e"), 404),
            (ApiError::method_not_allowed("e"), 405),
            (ApiError::internal_server_error("e"), 500),
            (ApiError::bad_gateway("e"), 502),
            (ApiError::service_unavailable("e"), 503),
            (ApiError::gateway_timeout("e"), 504),
        ];
        for (err, code) in cases {
            assert_eq!(err.code, code);
            assert_eq!(err.message, "e");
        }
    }

    #[test]
    fn test_fallback_body_is_valid_json() {
        let v: serde_json::Value = serde_json::from_str(MARSHAL_FALLBACK_BODY).unwrap();
        assert_eq!(v["error"], "failed to marshal json");
    }
}

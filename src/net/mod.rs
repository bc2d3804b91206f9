//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Configured address / socket path
//!     → listener.rs (resolve, bind TCP or unix socket)
//!     → tls.rs (optional rustls configuration)
//!     → Hand off to the HTTP layer (axum / axum-server)
//! ```
//!
//! # Design Decisions
//! - Go-style ":port" addresses are accepted and mean all interfaces
//! - Bind failures are returned to the caller, never retried
//! - TLS is optional and handled by axum-server

pub mod listener;
pub mod tls;

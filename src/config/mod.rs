//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → Server::from_config
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; routes and auth are code, not config
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    HttpConfig, ListenerConfig, ObservabilityConfig, ServerConfig, TimeoutConfig, TlsConfig,
    UnixSocketConfig,
};
pub use validation::{validate_config, ValidationError};

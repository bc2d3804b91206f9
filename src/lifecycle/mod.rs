//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → every subscribed server stops accepting → drain → exit
//!
//! Signals (signals.rs):
//!     SIGINT / Ctrl-C → graceful shutdown of `listen*` servers
//! ```
//!
//! # Design Decisions
//! - Routes are registered before listening; there is no runtime reconfiguration
//! - Shutdown is cooperative: in-flight requests finish before the listener exits

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;

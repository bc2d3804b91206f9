//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (before listen):
//!     (method, "/users/:id", handler)
//!     → path.rs (parse pattern into segments)
//!     → router.rs (insert into segment trie)
//!
//! Lookup (per request):
//!     (method, "/users/42")
//!     → router.rs (walk trie, capture params)
//!     → Found { handler, params } | MethodNotAllowed | NotFound
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup, immutable while serving
//! - No regex: static and `:name` segments only
//! - Static segments win over parameters at the same depth
//! - Duplicate (method, path) registrations: last one wins

pub mod path;
pub mod router;

pub use path::{join, Segment};
pub use router::{Lookup, RouteError, RouteTable};

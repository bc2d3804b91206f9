//! Declarative route registration.
//!
//! # Responsibilities
//! - Expand a controller's method map into route registrations under a prefix
//! - Expand a CRUD resource into its five fixed routes (see [`crud`])
//!
//! # Design Decisions
//! - Controllers describe routes as data; the server owns registration
//! - Every controller handler goes through the same `Outcome` wrapping as
//!   `Server::controller_method`

pub mod crud;

use std::collections::HashMap;

use axum::http::Method;

use crate::http::dispatch::ControllerHandler;
use crate::http::server::Server;
use crate::routing::join;

pub use crud::CrudController;

/// Path suffix → handler.
pub type ControllerPaths = HashMap<String, ControllerHandler>;

/// Method → path suffix → handler.
pub type ControllerMethods = HashMap<Method, ControllerPaths>;

/// A group of routes mounted under a common prefix.
pub trait Controller {
    fn methods(&self) -> ControllerMethods;
}

impl Server {
    /// Register every route of `ctrl` under `prefix`.
    pub fn controller<C: Controller + ?Sized>(mut self, prefix: &str, ctrl: &C) -> Self {
        for (method, paths) in ctrl.methods() {
            for (suffix, h) in paths {
                let path = join(prefix, &suffix);
                tracing::debug!(method = %method, path = %path, "Mounting controller route");
                self.register_controller(method.clone(), &path, h);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::dispatch::controller_handler;
    use crate::http::response::{Respond, ResponseBuilder};

    struct Pair;

    impl Controller for Pair {
        fn methods(&self) -> ControllerMethods {
            let mut get = ControllerPaths::new();
            get.insert("/".into(), controller_handler(|_| Box::pin(async { Respond.ok(1) })));
            get.insert(":id".into(), controller_handler(|_| Box::pin(async { Respond.ok(2) })));

            let mut post = ControllerPaths::new();
            post.insert("/".into(), controller_handler(|_| Box::pin(async { Respond.ok(3) })));

            ControllerMethods::from([(Method::GET, get), (Method::POST, post)])
        }
    }

    #[test]
    fn test_controller_routes_joined_with_prefix() {
        let s = Server::new().controller("/names/", &Pair);
        let routes: Vec<String> = s
            .routes()
            .into_iter()
            .map(|(m, p)| format!("{m} {p}"))
            .collect();
        assert_eq!(routes, vec!["GET /names", "POST /names", "GET /names/:id"]);
    }

    #[test]
    fn test_controller_as_trait_object() {
        let ctrl: Box<dyn Controller> = Box::new(Pair);
        let s = Server::new().controller("/", ctrl.as_ref());
        assert_eq!(s.routes().len(), 3);
    }
}

//! CRUD resources.
//!
//! A [`CrudController`] is mounted at a base path with five fixed routes:
//!
//! | Operation   | Method | Path         |
//! |-------------|--------|--------------|
//! | `create`    | POST   | `{base}`     |
//! | `get`       | GET    | `{base}`     |
//! | `get_by_id` | GET    | `{base}/:id` |
//! | `update`    | PUT    | `{base}/:id` |
//! | `delete`    | DELETE | `{base}/:id` |

use std::future::Future;
use std::sync::Arc;

use axum::http::Method;

use crate::http::ctx::Ctx;
use crate::http::dispatch::controller_handler;
use crate::http::response::Outcome;
use crate::http::server::Server;
use crate::routing::join;

/// Name of the path parameter carrying the resource ID.
pub const ID_PARAM: &str = "id";

/// A resource exposing create, list, fetch, update and delete.
pub trait CrudController: Send + Sync + 'static {
    fn create(&self, ctx: &mut Ctx) -> impl Future<Output = Outcome> + Send;
    fn get(&self, ctx: &mut Ctx) -> impl Future<Output = Outcome> + Send;
    fn get_by_id(&self, ctx: &mut Ctx) -> impl Future<Output = Outcome> + Send;
    fn update(&self, ctx: &mut Ctx) -> impl Future<Output = Outcome> + Send;
    fn delete(&self, ctx: &mut Ctx) -> impl Future<Output = Outcome> + Send;
}

impl Server {
    /// Mount `ctrl` at `base`.
    pub fn crud<C: CrudController>(mut self, base: &str, ctrl: Arc<C>) -> Self {
        macro_rules! op {
            ($op:ident) => {{
                let ctrl = Arc::clone(&ctrl);
                controller_handler(move |ctx| {
                    let ctrl = Arc::clone(&ctrl);
                    Box::pin(async move { ctrl.$op(ctx).await })
                })
            }};
        }

        let base = join(base, "");
        let item = join(&base, &format!(":{ID_PARAM}"));
        tracing::debug!(base = %base, "Mounting CRUD resource");

        self.register_controller(Method::POST, &base, op!(create));
        self.register_controller(Method::GET, &base, op!(get));
        self.register_controller(Method::GET, &item, op!(get_by_id));
        self.register_controller(Method::PUT, &item, op!(update));
        self.register_controller(Method::DELETE, &item, op!(delete));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::{Respond, ResponseBuilder};

    struct Echo;

    impl CrudController for Echo {
        async fn create(&self, _ctx: &mut Ctx) -> Outcome {
            Respond.ok("create")
        }

        async fn get(&self, _ctx: &mut Ctx) -> Outcome {
            Respond.ok("get")
        }

        async fn get_by_id(&self, ctx: &mut Ctx) -> Outcome {
            match ctx.param(ID_PARAM) {
                Ok(id) => Respond.ok(format!("get {id}")),
                Err(e) => Respond.err_bad_request(e),
            }
        }

        async fn update(&self, _ctx: &mut Ctx) -> Outcome {
            Respond.ok("update")
        }

        async fn delete(&self, _ctx: &mut Ctx) -> Outcome {
            Respond.ok("delete")
        }
    }

    #[test]
    fn test_crud_registers_exactly_five_routes() {
        let s = Server::new().crud("/a/b/c", Arc::new(Echo));
        let routes: Vec<String> = s
            .routes()
            .into_iter()
            .map(|(m, p)| format!("{m} {p}"))
            .collect();
        assert_eq!(
            routes,
            vec![
                "GET /a/b/c",
                "POST /a/b/c",
                "DELETE /a/b/c/:id",
                "GET /a/b/c/:id",
                "PUT /a/b/c/:id",
            ]
        );
    }

    #[test]
    fn test_crud_base_is_normalized() {
        let s = Server::new().crud("/users/", Arc::new(Echo));
        assert!(s
            .routes()
            .iter()
            .any(|(m, p)| *m == Method::PUT && p == "/users/:id"));
    }
}

//! Demo application served by the `jsonapi` binary.
//!
//! - `GET /health`: liveness probe
//! - `GET /names`, `GET /names/:id`: read-only controller over fixed data
//! - `/users`: in-memory CRUD resource

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use jsonapi::controller::crud::ID_PARAM;
use jsonapi::{
    controller_handler, Controller, ControllerMethods, ControllerPaths, CrudController, Ctx,
    Method, Outcome, Respond, ResponseBuilder, Server,
};

/// Build the demo server on top of `server`.
///
/// With a token, every request must carry `Authorization: Bearer <token>`.
pub fn app(server: Server, token: Option<String>) -> Server {
    let server = match token {
        Some(token) => server.with_auth_fn(bearer_auth(&token)),
        None => server,
    };

    server
        .get("/health", |ctx| {
            Box::pin(async move { ctx.ok(&serde_json::json!({ "status": "ok" })) })
        })
        .controller("/names", &NamesController::default())
        .crud("/users", Arc::new(UserStore::default()))
}

/// Auth predicate accepting only `Authorization: Bearer <token>`.
pub fn bearer_auth(token: &str) -> impl Fn(&Ctx) -> bool + Send + Sync + 'static {
    let expected = format!("Bearer {token}");
    move |ctx: &Ctx| ctx.header("authorization") == Some(expected.as_str())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Name {
    pub id: i32,
    pub name: String,
}

/// Read-only controller over a fixed list of names.
pub struct NamesController {
    names: Arc<Vec<Name>>,
}

impl NamesController {
    pub fn new() -> Self {
        let names = ["Peter", "Tom", "John"]
            .iter()
            .zip(1..)
            .map(|(name, id)| Name {
                id,
                name: name.to_string(),
            })
            .collect();
        Self {
            names: Arc::new(names),
        }
    }
}

impl Default for NamesController {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller for NamesController {
    fn methods(&self) -> ControllerMethods {
        let mut get = ControllerPaths::new();

        let names = Arc::clone(&self.names);
        get.insert(
            "/".into(),
            controller_handler(move |_| {
                let names = Arc::clone(&names);
                Box::pin(async move { Respond.ok(names.as_ref().clone()) })
            }),
        );

        let names = Arc::clone(&self.names);
        get.insert(
            "/:id".into(),
            controller_handler(move |ctx| {
                let names = Arc::clone(&names);
                Box::pin(async move {
                    let id = match ctx.param_int("id") {
                        Ok(id) => id,
                        Err(e) => return Respond.err_bad_request(e),
                    };
                    match names.iter().find(|n| n.id == id) {
                        Some(name) => Respond.ok(name.clone()),
                        None => Respond.err_not_found("name not found"),
                    }
                })
            }),
        );

        ControllerMethods::from([(Method::GET, get)])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

/// Body accepted by create and update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInput {
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// In-memory user table.
#[derive(Debug, Default)]
pub struct UserStore {
    users: RwLock<BTreeMap<u64, User>>,
    next_id: AtomicU64,
}

impl UserStore {
    fn input(ctx: &Ctx) -> Result<UserInput, Outcome> {
        let input: UserInput = ctx.read_json().map_err(|e| Respond.err_bad_request(e))?;
        if input.name.trim().is_empty() {
            return Err(Respond.err_bad_request("name must not be empty"));
        }
        Ok(input)
    }

    fn id(ctx: &Ctx) -> Result<u64, Outcome> {
        ctx.param_u64(ID_PARAM).map_err(|e| Respond.err_bad_request(e))
    }
}

impl CrudController for UserStore {
    async fn create(&self, ctx: &mut Ctx) -> Outcome {
        let input = match Self::input(ctx) {
            Ok(input) => input,
            Err(outcome) => return outcome,
        };
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let user = User {
            id,
            name: input.name,
            email: input.email,
        };
        self.users.write().await.insert(id, user.clone());
        tracing::debug!(id, "User created");
        Respond.ok(user)
    }

    async fn get(&self, _ctx: &mut Ctx) -> Outcome {
        let users: Vec<User> = self.users.read().await.values().cloned().collect();
        Respond.ok(users)
    }

    async fn get_by_id(&self, ctx: &mut Ctx) -> Outcome {
        let id = match Self::id(ctx) {
            Ok(id) => id,
            Err(outcome) => return outcome,
        };
        match self.users.read().await.get(&id) {
            Some(user) => Respond.ok(user.clone()),
            None => Respond.err_not_found("user not found"),
        }
    }

    async fn update(&self, ctx: &mut Ctx) -> Outcome {
        let id = match Self::id(ctx) {
            Ok(id) => id,
            Err(outcome) => return outcome,
        };
        let input = match Self::input(ctx) {
            Ok(input) => input,
            Err(outcome) => return outcome,
        };
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) => {
                user.name = input.name;
                user.email = input.email;
                Respond.ok(user.clone())
            }
            None => Respond.err_not_found("user not found"),
        }
    }

    async fn delete(&self, ctx: &mut Ctx) -> Outcome {
        let id = match Self::id(ctx) {
            Ok(id) => id,
            Err(outcome) => return outcome,
        };
        match self.users.write().await.remove(&id) {
            Some(user) => Respond.ok(user),
            None => Respond.err_not_found("user not found"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn call(server: Server, method: &str, uri: &str, body: &str, auth: Option<&str>) -> (StatusCode, String) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            req = req.header("authorization", auth);
        }
        let req = req.body(Body::from(body.to_string())).unwrap();
        let resp = server.into_router().unwrap().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn demo() -> Server {
        app(Server::new(), None)
    }

    #[tokio::test]
    async fn test_names() {
        let (status, body) = call(demo(), "GET", "/names/1", "", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"id":1,"name":"Peter"}"#);

        let (status, body) = call(demo(), "GET", "/names/9", "", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, r#"{"error":"name not found","code":404}"#);

        let (status, _) = call(demo(), "GET", "/names/abc", "", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(demo(), "GET", "/names", "", None).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<Name> = serde_json::from_str(&body).unwrap();
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn test_names_default_matches_new() {
        let a = NamesController::default();
        let b = NamesController::new();
        assert_eq!(a.names, b.names);
        assert_eq!(a.names.len(), 3);
    }

    #[tokio::test]
    async fn test_users_crud_sequence() {
        let store = Arc::new(UserStore::default());
        let server = || Server::new().crud("/users", Arc::clone(&store));

        let (status, body) = call(server(), "POST", "/users", r#"{"name":"Ann","email":"a@x"}"#, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"id":1,"name":"Ann","email":"a@x"}"#);

        let (status, body) = call(server(), "PUT", "/users/1", r#"{"name":"Anna"}"#, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"id":1,"name":"Anna","email":""}"#);

        let (_, body) = call(server(), "GET", "/users", "", None).await;
        assert_eq!(body, r#"[{"id":1,"name":"Anna","email":""}]"#);

        let (status, _) = call(server(), "DELETE", "/users/1", "", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(server(), "GET", "/users/1", "", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, r#"{"error":"user not found","code":404}"#);
    }

    #[tokio::test]
    async fn test_users_rejects_bad_input() {
        let (status, _) = call(demo(), "POST", "/users", "not json", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(demo(), "POST", "/users", r#"{"name":" "}"#, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, r#"{"error":"name must not be empty","code":400}"#);

        let (status, _) = call(demo(), "GET", "/users/x", "", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_bearer_auth() {
        let secured = || app(Server::new(), Some("s3cret".into()));

        let (status, body) = call(secured(), "GET", "/health", "", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, r#"{"error":"unauthorized","code":401}"#);

        let (status, _) = call(secured(), "GET", "/health", "", Some("Bearer wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(secured(), "GET", "/health", "", Some("Bearer s3cret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"status":"ok"}"#);
    }
}

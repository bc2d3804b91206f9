//! Route table and lookup.
//!
//! # Responsibilities
//! - Store registered routes in a segment trie
//! - Look up the handler for (method, path) and capture parameters
//! - Distinguish "no such path" from "path exists, wrong method"
//!
//! # Design Decisions
//! - Immutable while serving (shared via `Arc`, no locks)
//! - O(depth) lookup with backtracking from static to parameter branches
//! - Explicit `NotFound` / `MethodNotAllowed` rather than a silent default

use std::collections::HashMap;

use axum::http::Method;

use crate::http::ctx::Params;
use crate::routing::path::{decode_segment, parse_pattern, render, split, Segment};

/// Error raised while registering a route.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("route path must start with '/': {0:?}")]
    InvalidPath(String),

    #[error("empty parameter name in route {0:?}")]
    EmptyParam(String),

    #[error("parameter {name:?} appears twice in route {path:?}")]
    DuplicateParam { path: String, name: String },

    #[error("parameter {new:?} in route {path:?} conflicts with existing parameter {existing:?}")]
    ParamConflict {
        path: String,
        existing: String,
        new: String,
    },
}

/// A handler bound to its pattern.
#[derive(Debug, Clone)]
struct Endpoint<H> {
    pattern: String,
    handler: H,
}

#[derive(Debug)]
struct Node<H> {
    statics: HashMap<String, Node<H>>,
    param: Option<(String, Box<Node<H>>)>,
    endpoints: Vec<(Method, Endpoint<H>)>,
}

impl<H> Default for Node<H> {
    fn default() -> Self {
        Self {
            statics: HashMap::new(),
            param: None,
            endpoints: Vec::new(),
        }
    }
}

impl<H> Node<H> {
    fn endpoint(&self, method: &Method) -> Option<&Endpoint<H>> {
        self.endpoints
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, e)| e)
    }

    /// Depth-first search preferring static children.
    ///
    /// `accept` decides whether a terminal node satisfies the search.
    /// Captured parameters are pushed on the way down and popped on backtrack.
    fn find<'a>(
        &'a self,
        segments: &[&str],
        params: &mut Vec<(String, String)>,
        accept: &dyn Fn(&Node<H>) -> bool,
    ) -> Option<&'a Node<H>> {
        let Some((head, rest)) = segments.split_first() else {
            return accept(self).then_some(self);
        };

        if let Some(child) = self.statics.get(*head) {
            if let Some(found) = child.find(rest, params, accept) {
                return Some(found);
            }
        }

        if let Some((name, child)) = &self.param {
            params.push((name.clone(), (*head).to_string()));
            if let Some(found) = child.find(rest, params, accept) {
                return Some(found);
            }
            params.pop();
        }

        None
    }

    fn collect<'a>(&'a self, out: &mut Vec<(&'a Method, &'a str)>) {
        for (method, endpoint) in &self.endpoints {
            out.push((method, endpoint.pattern.as_str()));
        }
        for child in self.statics.values() {
            child.collect(out);
        }
        if let Some((_, child)) = &self.param {
            child.collect(out);
        }
    }
}

/// Result of a route lookup.
#[derive(Debug)]
pub enum Lookup<'a, H> {
    Found {
        handler: &'a H,
        pattern: &'a str,
        params: Params,
    },
    MethodNotAllowed {
        allowed: Vec<Method>,
    },
    NotFound,
}

/// Maps (method, path pattern) to handlers.
#[derive(Debug)]
pub struct RouteTable<H> {
    root: Node<H>,
    len: usize,
}

impl<H> Default for RouteTable<H> {
    fn default() -> Self {
        Self {
            root: Node::default(),
            len: 0,
        }
    }
}

impl<H> RouteTable<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` and `path`.
    ///
    /// Registering the same (method, path) twice replaces the earlier handler.
    pub fn insert(&mut self, method: Method, path: &str, handler: H) -> Result<(), RouteError> {
        let segments = parse_pattern(path)?;
        let pattern = render(&segments);

        let mut node = &mut self.root;
        for segment in &segments {
            node = match segment {
                Segment::Static(s) => node.statics.entry(s.clone()).or_default(),
                Segment::Param(name) => {
                    let (existing, child) = node
                        .param
                        .get_or_insert_with(|| (name.clone(), Box::default()));
                    if *existing != *name {
                        return Err(RouteError::ParamConflict {
                            path: path.to_string(),
                            existing: existing.clone(),
                            new: name.clone(),
                        });
                    }
                    child.as_mut()
                }
            };
        }

        let endpoint = Endpoint {
            pattern: pattern.clone(),
            handler,
        };
        match node.endpoints.iter_mut().find(|(m, _)| *m == method) {
            Some(slot) => {
                tracing::warn!(method = %method, pattern = %pattern, "Route registered twice; replacing handler");
                slot.1 = endpoint;
            }
            None => {
                node.endpoints.push((method, endpoint));
                self.len += 1;
            }
        }
        Ok(())
    }

    /// Find the handler for `method` and the concrete request `path`.
    pub fn lookup(&self, method: &Method, path: &str) -> Lookup<'_, H> {
        let segments: Vec<&str> = split(path).collect();

        let mut captured = Vec::new();
        if let Some(node) = self
            .root
            .find(&segments, &mut captured, &|n: &Node<H>| n.endpoint(method).is_some())
        {
            if let Some(endpoint) = node.endpoint(method) {
                let mut params = Params::new();
                for (name, value) in captured {
                    params.insert(name, decode_segment(&value));
                }
                return Lookup::Found {
                    handler: &endpoint.handler,
                    pattern: &endpoint.pattern,
                    params,
                };
            }
        }

        let mut ignored = Vec::new();
        match self
            .root
            .find(&segments, &mut ignored, &|n: &Node<H>| !n.endpoints.is_empty())
        {
            Some(node) => Lookup::MethodNotAllowed {
                allowed: node.endpoints.iter().map(|(m, _)| m.clone()).collect(),
            },
            None => Lookup::NotFound,
        }
    }

    /// All registered (method, pattern) pairs, sorted by pattern then method.
    pub fn routes(&self) -> Vec<(Method, String)> {
        let mut out = Vec::new();
        self.root.collect(&mut out);
        let mut routes: Vec<(Method, String)> = out
            .into_iter()
            .map(|(m, p)| (m.clone(), p.to_string()))
            .collect();
        routes.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
        routes
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(routes: &[(Method, &str, u32)]) -> RouteTable<u32> {
        let mut t = RouteTable::new();
        for (m, p, h) in routes {
            t.insert(m.clone(), p, *h).unwrap();
        }
        t
    }

    fn found(t: &RouteTable<u32>, method: Method, path: &str) -> Option<(u32, Params)> {
        match t.lookup(&method, path) {
            Lookup::Found { handler, params, .. } => Some((*handler, params)),
            _ => None,
        }
    }

    #[test]
    fn test_exact_match() {
        let t = table(&[(Method::GET, "/a1", 1), (Method::GET, "/", 2)]);
        assert_eq!(found(&t, Method::GET, "/a1").unwrap().0, 1);
        assert_eq!(found(&t, Method::GET, "/").unwrap().0, 2);
        assert_eq!(found(&t, Method::GET, "/a1/").unwrap().0, 1);
        assert!(matches!(t.lookup(&Method::GET, "/a2"), Lookup::NotFound));
    }

    #[test]
    fn test_param_capture_is_exact() {
        let t = table(&[(Method::GET, "/users/:id/posts/:post", 1)]);
        let (_, params) = found(&t, Method::GET, "/users/a%20b/posts/007").unwrap();
        assert_eq!(params.get("id"), Some("a b"));
        assert_eq!(params.get("post"), Some("007"));
    }

    #[test]
    fn test_encoded_slash_stays_in_param() {
        let t = table(&[(Method::GET, "/files/:name", 1)]);
        let (_, params) = found(&t, Method::GET, "/files/a%2Fb").unwrap();
        assert_eq!(params.get("name"), Some("a/b"));
        assert!(matches!(t.lookup(&Method::GET, "/files/a/b"), Lookup::NotFound));
    }

    #[test]
    fn test_static_preferred_with_backtracking() {
        let t = table(&[
            (Method::GET, "/users/me", 1),
            (Method::GET, "/users/:id", 2),
            (Method::GET, "/users/:id/friends", 3),
        ]);
        assert_eq!(found(&t, Method::GET, "/users/me").unwrap().0, 1);
        assert_eq!(found(&t, Method::GET, "/users/42").unwrap().0, 2);

        // "me" matches statically, but only the param branch has /friends.
        let (h, params) = found(&t, Method::GET, "/users/me/friends").unwrap();
        assert_eq!(h, 3);
        assert_eq!(params.get("id"), Some("me"));
    }

    #[test]
    fn test_method_not_allowed() {
        let t = table(&[(Method::GET, "/a", 1), (Method::POST, "/a", 2)]);
        match t.lookup(&Method::DELETE, "/a") {
            Lookup::MethodNotAllowed { allowed } => {
                assert_eq!(allowed, vec![Method::GET, Method::POST]);
            }
            other => panic!("unexpected lookup: {other:?}"),
        }
    }

    #[test]
    fn test_method_found_on_param_branch() {
        let t = table(&[(Method::GET, "/a/b", 1), (Method::POST, "/a/:x", 2)]);
        let (h, params) = found(&t, Method::POST, "/a/b").unwrap();
        assert_eq!(h, 2);
        assert_eq!(params.get("x"), Some("b"));
    }

    #[test]
    fn test_last_registration_wins() {
        let t = table(&[(Method::GET, "/a", 1), (Method::GET, "/a/", 2)]);
        assert_eq!(t.len(), 1);
        assert_eq!(found(&t, Method::GET, "/a").unwrap().0, 2);
    }

    #[test]
    fn test_param_conflict() {
        let mut t = table(&[(Method::GET, "/a/:id", 1)]);
        let err = t.insert(Method::GET, "/a/:name/b", 2).unwrap_err();
        assert!(matches!(err, RouteError::ParamConflict { .. }));
    }

    #[test]
    fn test_marker_segment_is_never_literal() {
        let t = table(&[(Method::GET, "/a/:id", 1)]);
        let (_, params) = found(&t, Method::GET, "/a/:id").unwrap();
        assert_eq!(params.get("id"), Some(":id"));
        let (_, params) = found(&t, Method::GET, "/a/5").unwrap();
        assert_eq!(params.get("id"), Some("5"));
    }

    #[test]
    fn test_routes_listing() {
        let t = table(&[
            (Method::PUT, "/a/:id", 1),
            (Method::GET, "/a", 2),
            (Method::GET, "/a/:id", 3),
        ]);
        let routes: Vec<(String, String)> = t
            .routes()
            .into_iter()
            .map(|(m, p)| (m.to_string(), p))
            .collect();
        assert_eq!(
            routes,
            vec![
                ("GET".to_string(), "/a".to_string()),
                ("GET".to_string(), "/a/:id".to_string()),
                ("PUT".to_string(), "/a/:id".to_string()),
            ]
        );
    }
}

//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store the registered route services in declaration order
//! - Find the service for a request's method and path
//! - Answer 404 (no pattern matches) and 405 (pattern matches, method doesn't)
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) pattern scan; first match wins
//! - Matched segment values travel to the service as a request extension

use std::convert::Infallible;

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tower::util::BoxCloneSyncService;
use tower::ServiceExt;

use crate::routing::pattern::{PathParams, PatternError, RoutePattern};

/// The service answering requests for one route.
pub type RouteService = BoxCloneSyncService<Request<Body>, Response, Infallible>;

/// A route service with the method and pattern it answers.
#[derive(Clone)]
pub struct RegisteredRoute {
    pub method: Method,
    pub pattern: RoutePattern,
    pub label: String,
    service: RouteService,
}

impl std::fmt::Debug for RegisteredRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredRoute")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .field("label", &self.label)
            .finish()
    }
}

/// Result of a route lookup.
#[derive(Debug)]
pub enum RouteMatch<'a> {
    Found {
        route: &'a RegisteredRoute,
        params: PathParams,
    },
    /// The path matches a route, but only for other methods.
    MethodNotAllowed { allowed: Vec<Method> },
    NotFound,
}

/// Ordered table of route services.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RegisteredRoute>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `pattern` and append a route.
    pub fn register(
        &mut self,
        method: Method,
        pattern: &str,
        label: impl Into<String>,
        service: RouteService,
    ) -> Result<(), PatternError> {
        let pattern = RoutePattern::compile(pattern)?;
        self.routes.push(RegisteredRoute {
            method,
            pattern,
            label: label.into(),
            service,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn routes(&self) -> &[RegisteredRoute] {
        &self.routes
    }

    /// Find the first route matching `method` and `path`.
    pub fn lookup(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        let mut allowed = Vec::new();

        for route in &self.routes {
            let Some(params) = route.pattern.matches(path) else {
                continue;
            };
            if route.method == *method {
                return RouteMatch::Found { route, params };
            }
            if !allowed.contains(&route.method) {
                allowed.push(route.method.clone());
            }
        }

        if allowed.is_empty() {
            RouteMatch::NotFound
        } else {
            RouteMatch::MethodNotAllowed { allowed }
        }
    }

    /// Hand a request to its route service.
    pub async fn dispatch(&self, mut request: Request<Body>) -> Response {
        let path = request.uri().path().to_string();

        match self.lookup(request.method(), &path) {
            RouteMatch::Found { route, params } => {
                request.extensions_mut().insert(params);
                match route.service.clone().oneshot(request).await {
                    Ok(response) => response,
                    Err(never) => match never {},
                }
            }
            RouteMatch::MethodNotAllowed { allowed } => {
                tracing::debug!(method = %request.method(), path = %path, "Method not allowed");
                let allow = allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut response = StatusCode::METHOD_NOT_ALLOWED.into_response();
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    response.headers_mut().insert(header::ALLOW, value);
                }
                response
            }
            RouteMatch::NotFound => {
                tracing::debug!(method = %request.method(), path = %path, "No route matched");
                StatusCode::NOT_FOUND.into_response()
            }
        }
    }
}

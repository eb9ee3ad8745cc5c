//! Per-route request dispatch.
//!
//! # Responsibilities
//! - Build the execution environment (route `Env`, then request parameters)
//! - Buffer the request body for routes that pass it on
//! - Run the route's command on its executer, bound to the request's lifetime
//! - Assemble the response from the exit code table
//! - Write the access log and request metrics
//!
//! # Design Decisions
//! - One `RouteHandler` per route, built at startup and shared by all requests
//! - The request owns a cancellation token; dropping the request future
//!   (client gone, timeout) cancels it and kills the process
//! - Execution failures are answered with 500 and never retried

use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio_util::sync::CancellationToken;

use crate::execution::{ExecSpec, Executer, ExecutionConfig};
use crate::http::request::request_id;
use crate::http::response::{build_response, execution_failed};
use crate::observability::metrics;
use crate::routing::compiler::OptimizedRoute;
use crate::routing::pattern::PathParams;

/// Runs one route's command for each request.
#[derive(Debug)]
pub struct RouteHandler {
    route: OptimizedRoute,
    spec: ExecSpec,
    executer: Arc<dyn Executer>,
    max_body_size: usize,
}

impl RouteHandler {
    pub fn new(
        route: OptimizedRoute,
        spec: ExecSpec,
        executer: Arc<dyn Executer>,
        max_body_size: usize,
    ) -> Self {
        Self {
            route,
            spec,
            executer,
            max_body_size,
        }
    }

    pub fn route(&self) -> &OptimizedRoute {
        &self.route
    }

    /// Handle one request routed to this route.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let method = request.method().clone();
        let uri = request.uri().clone();
        let request_id = request_id(request.headers()).to_string();
        let user_agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();

        let (status, body_size, response) = self.execute(request).await;

        tracing::info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            route = %self.route.label,
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            body_size,
            user_agent = %user_agent,
            "Request completed"
        );
        metrics::record_request(method.as_str(), status.as_u16(), &self.route.label, start);

        response
    }

    async fn execute(&self, request: Request<Body>) -> (StatusCode, usize, Response) {
        let params = request
            .extensions()
            .get::<PathParams>()
            .cloned()
            .unwrap_or_default();
        let (parts, body) = request.into_parts();

        let mut env = self.route.env.clone();
        env.extend(
            self.route
                .parameters
                .extract(&parts.headers, parts.uri.query(), &params),
        );

        let stdin = if self.route.allow_body {
            match self.read_body(&parts.headers, body).await {
                Ok(bytes) => Some(bytes),
                Err(status) => return (status, 0, status.into_response()),
            }
        } else {
            None
        };

        let cancel = CancellationToken::new();
        let _guard = cancel.clone().drop_guard();
        let config = ExecutionConfig::for_spec(&self.spec, env, stdin);

        match self.executer.execute(&cancel, config).await {
            Ok((handle, code)) => {
                let mapping = self.route.exit_code_response(code);
                let body = handle.body_for(mapping.stream);
                let body_size = body.as_ref().map_or(0, Bytes::len);
                tracing::debug!(route = %self.route.label, exit_code = code, status = %mapping.status, "Command finished");
                (
                    mapping.status,
                    body_size,
                    build_response(&self.route.headers, mapping, body),
                )
            }
            Err(e) => {
                tracing::error!(route = %self.route.label, error = %e, "Execution failed");
                (StatusCode::INTERNAL_SERVER_ERROR, 0, execution_failed())
            }
        }
    }

    /// Buffer the body up to the configured limit.
    async fn read_body(&self, headers: &axum::http::HeaderMap, body: Body) -> Result<Bytes, StatusCode> {
        let declared = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > self.max_body_size) {
            return Err(StatusCode::PAYLOAD_TOO_LARGE);
        }

        // With the length checked upfront, a failed read means a chunked body over the limit.
        axum::body::to_bytes(body, self.max_body_size)
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, limit = self.max_body_size, "Request body rejected");
                StatusCode::PAYLOAD_TOO_LARGE
            })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::schema::{
        ExecProc, ExitCodeMapping, ParamSource, ResponseStream, RouteConfig, RouteExec,
        RouteParameter,
    };
    use crate::execution::{DirectProcessExecuter, EnvPolicy};
    use crate::routing::compiler::compile_route;

    fn handler(mut route: RouteConfig, script: &str) -> RouteHandler {
        route.exec = RouteExec {
            proc: Some(ExecProc {
                path: "sh".to_string(),
                args: vec!["-c".to_string(), script.to_string()],
            }),
            shell: None,
        };
        let compiled = compile_route(&route);
        let spec = compiled.exec.clone().unwrap();
        let executer = Arc::new(DirectProcessExecuter::new(EnvPolicy::new(
            false,
            vec!["PATH".to_string()],
        )));
        RouteHandler::new(compiled, spec, executer, 16)
    }

    async fn text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_env_and_parameters_reach_command() {
        let mut route = RouteConfig::default();
        route.env.insert("GREETING".to_string(), "hello".to_string());
        route.env.insert("WC_NAME".to_string(), "overridden".to_string());
        route.parameters.push(RouteParameter {
            name: "name".to_string(),
            source: ParamSource::Query,
            ..Default::default()
        });
        let handler = handler(route, "echo \"$GREETING $WC_NAME\"");

        let request = Request::builder()
            .uri("/?name=world")
            .body(Body::empty())
            .unwrap();
        let response = handler.handle(request).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response).await, "hello world\n");
    }

    #[tokio::test]
    async fn test_exit_code_selects_mapping() {
        let mut route = RouteConfig {
            response_stream: ResponseStream::Stderr,
            ..Default::default()
        };
        route.headers.insert("X-Route".to_string(), "yes".to_string());
        route.status_codes.push(ExitCodeMapping {
            exit_code: Some(2),
            status_code: 404,
            headers: [("X-Missing".to_string(), "1".to_string())].into(),
            response_stream: None,
        });
        let handler = handler(route, "echo out; echo err >&2; exit 2");

        let response = handler.handle(Request::new(Body::empty())).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["x-route"], "yes");
        assert_eq!(response.headers()["x-missing"], "1");
        assert_eq!(text(response).await, "err\n");
    }

    #[tokio::test]
    async fn test_unmapped_exit_code_is_500() {
        let handler = handler(RouteConfig::default(), "echo broken; exit 9");
        let response = handler.handle(Request::new(Body::empty())).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(text(response).await, "broken\n");
    }

    #[tokio::test]
    async fn test_body_is_piped_and_limited() {
        let route = RouteConfig {
            method: "POST".to_string(),
            allow_body: true,
            ..Default::default()
        };
        let handler = handler(route, "cat");

        let request = Request::builder()
            .method("POST")
            .body(Body::from("small body"))
            .unwrap();
        assert_eq!(text(handler.handle(request).await).await, "small body");

        let request = Request::builder()
            .method("POST")
            .body(Body::from("this body is far too large"))
            .unwrap();
        let response = handler.handle(request).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_body_ignored_without_allow_body() {
        let handler = handler(RouteConfig::default(), "cat");
        let request = Request::new(Body::from("ignored"));
        let response = handler.handle(request).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response).await, "");
    }
}

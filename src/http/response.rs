//! Response assembly.
//!
//! # Responsibilities
//! - Turn an exit code mapping and process output into an HTTP response
//! - Emit route headers, then the exit code's headers
//!
//! # Design Decisions
//! - Headers are additive: a name set by both the route and the mapping is sent twice
//! - The `none` stream sends no body at all
//! - Execution failures answer 500 without a body

use axum::body::{Body, Bytes};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::routing::compiler::CompiledMapping;

/// Build the response for an exit code mapping.
pub fn build_response(
    route_headers: &[(HeaderName, HeaderValue)],
    mapping: &CompiledMapping,
    body: Option<Bytes>,
) -> Response {
    let mut response = match body {
        Some(bytes) => Response::new(Body::from(bytes)),
        None => Response::new(Body::empty()),
    };
    *response.status_mut() = mapping.status;

    let headers = response.headers_mut();
    for (name, value) in route_headers.iter().chain(mapping.headers.iter()) {
        headers.append(name.clone(), value.clone());
    }

    response
}

/// Response for a failed execution.
pub fn execution_failed() -> Response {
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ResponseStream;

    fn header(name: &'static str, value: &'static str) -> (HeaderName, HeaderValue) {
        (HeaderName::from_static(name), HeaderValue::from_static(value))
    }

    #[test]
    fn test_headers_are_additive() {
        let mapping = CompiledMapping {
            status: StatusCode::CREATED,
            headers: vec![header("x-tag", "mapping")],
            stream: ResponseStream::Stdout,
        };
        let route_headers = vec![header("x-tag", "route"), header("content-type", "text/plain")];

        let response = build_response(&route_headers, &mapping, Some(Bytes::from("out")));
        assert_eq!(response.status(), StatusCode::CREATED);

        let tags: Vec<_> = response.headers().get_all("x-tag").iter().collect();
        assert_eq!(tags, vec!["route", "mapping"]);
        assert_eq!(response.headers()["content-type"], "text/plain");
    }

    #[tokio::test]
    async fn test_no_body() {
        let mapping = CompiledMapping {
            status: StatusCode::NOT_FOUND,
            headers: Vec::new(),
            stream: ResponseStream::Empty,
        };
        let response = build_response(&[], &mapping, None);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.is_empty());
    }
}

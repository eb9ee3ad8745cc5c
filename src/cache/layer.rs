//! Caching middleware for route services.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::cache::store::{is_cacheable, set_cache_control, CachedResponse, ResponseCache};
use crate::observability::metrics;

/// Serve a stored response when there is one, otherwise run the route and
/// store its response if the status is below 400.
///
/// Used with `axum::middleware::from_fn_with_state`.
pub async fn cache_response(
    State(cache): State<Arc<ResponseCache>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request
        .uri()
        .path_and_query()
        .map_or_else(|| request.uri().path().to_string(), |pq| pq.as_str().to_string());
    let key = ResponseCache::key(request.method().as_str(), &path);

    if let Some(hit) = cache.get(&key) {
        metrics::record_cache_lookup(true);
        tracing::debug!(key = %key, "Cache hit");
        let mut response = hit.into_response();
        set_cache_control(&mut response, &cache);
        return response;
    }
    metrics::record_cache_lookup(false);

    let mut response = next.run(request).await;
    set_cache_control(&mut response, &cache);
    if !is_cacheable(response.status()) {
        return response;
    }

    let (parts, body) = response.into_parts();
    match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => {
            cache.insert(
                key,
                CachedResponse {
                    status: parts.status,
                    headers: parts.headers.clone(),
                    body: bytes.clone(),
                },
            );
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(e) => {
            tracing::error!(error = %e, key = %key, "Failed to buffer response for caching");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

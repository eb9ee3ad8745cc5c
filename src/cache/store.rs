//! In-memory response store with LRU eviction and TTL expiry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use dashmap::DashMap;

use crate::config::schema::CacheConfig;

/// A stored response.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[derive(Debug)]
struct Entry {
    response: CachedResponse,
    stored_at: Instant,
    /// Logical time of the last access, for LRU eviction.
    last_used: u64,
}

/// Thread-safe response cache shared by all caching routes.
#[derive(Debug)]
pub struct ResponseCache {
    entries: DashMap<String, Entry>,
    capacity: usize,
    ttl: Duration,
    control: HeaderValue,
    clock: AtomicU64,
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration, directives: &[String]) -> Self {
        let mut control = format!("max-age={}", ttl.as_secs());
        for directive in directives {
            control.push_str(", ");
            control.push_str(directive);
        }

        Self {
            entries: DashMap::with_capacity(capacity),
            capacity,
            ttl,
            control: HeaderValue::from_str(&control).unwrap_or_else(|_| {
                tracing::warn!(value = %control, "Invalid Cache-Control directives, using max-age only");
                HeaderValue::from_str(&format!("max-age={}", ttl.as_secs()))
                    .unwrap_or(HeaderValue::from_static("no-cache"))
            }),
            clock: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            config.max_responses_cached,
            Duration::from_secs(config.ttl_secs),
            &config.control_directives,
        )
    }

    /// Key of a request: method, path and query.
    pub fn key(method: &str, path_and_query: &str) -> String {
        format!("{method} {path_and_query}")
    }

    /// `Cache-Control` value sent with responses of caching routes.
    pub fn control_header(&self) -> &HeaderValue {
        &self.control
    }

    /// Stored response for `key`, if present and not expired.
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        let tick = self.tick();
        let mut entry = self.entries.get_mut(key)?;
        if entry.stored_at.elapsed() >= self.ttl {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        entry.last_used = tick;
        Some(entry.response.clone())
    }

    /// Store a response, evicting the least recently used one when full.
    pub fn insert(&self, key: String, response: CachedResponse) {
        if self.capacity == 0 {
            return;
        }

        if !self.entries.contains_key(&key) {
            self.evict_expired();
            while self.entries.len() >= self.capacity {
                if !self.evict_least_recent() {
                    break;
                }
            }
        }

        let entry = Entry {
            response,
            stored_at: Instant::now(),
            last_used: self.tick(),
        };
        self.entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn evict_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
    }

    fn evict_least_recent(&self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.last_used)
            .map(|entry| entry.key().clone());

        match oldest {
            Some(key) => {
                tracing::debug!(key = %key, "Evicting cached response");
                self.entries.remove(&key);
                true
            }
            None => false,
        }
    }
}

/// Whether a response may be stored.
pub fn is_cacheable(status: StatusCode) -> bool {
    status.as_u16() < 400
}

/// Add the `Cache-Control` header of `cache` to a response.
pub fn set_cache_control(response: &mut Response, cache: &ResponseCache) {
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, cache.control_header().clone());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &'static str) -> CachedResponse {
        CachedResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn test_get_and_insert() {
        let cache = ResponseCache::new(10, Duration::from_secs(60), &[]);
        let key = ResponseCache::key("GET", "/a?x=1");
        assert!(cache.get(&key).is_none());

        cache.insert(key.clone(), response("a"));
        assert_eq!(cache.get(&key).unwrap().body, "a");
        assert!(cache.get("GET /a?x=2").is_none());
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let cache = ResponseCache::new(2, Duration::from_secs(60), &[]);
        cache.insert("a".to_string(), response("a"));
        cache.insert("b".to_string(), response("b"));

        // Touch "a" so "b" becomes the eviction candidate.
        assert!(cache.get("a").is_some());
        cache.insert("c".to_string(), response("c"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let cache = ResponseCache::new(2, Duration::ZERO, &[]);
        cache.insert("a".to_string(), response("a"));
        assert!(cache.get("a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_control_header() {
        let cache = ResponseCache::new(1, Duration::from_secs(30), &["public".to_string()]);
        assert_eq!(cache.control_header(), "max-age=30, public");
    }

    #[test]
    fn test_only_success_and_redirects_are_cacheable() {
        assert!(is_cacheable(StatusCode::OK));
        assert!(is_cacheable(StatusCode::FOUND));
        assert!(!is_cacheable(StatusCode::NOT_FOUND));
        assert!(!is_cacheable(StatusCode::INTERNAL_SERVER_ERROR));
    }
}

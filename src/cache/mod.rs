//! Response cache for GET routes.
//!
//! # Data Flow
//! ```text
//! GET request on a caching route
//!     → layer.rs (build key: method + path + query)
//!     → store.rs lookup
//!         hit  → stored response + Cache-Control
//!         miss → route service → store if status < 400 → Cache-Control
//! ```
//!
//! # Design Decisions
//! - The cache wraps a route service as a tower layer; the route never knows
//! - Fixed capacity with least-recently-used eviction, plus a time to live
//! - Concurrent access through a sharded map (dashmap)

pub mod layer;
pub mod store;

pub use layer::cache_response;
pub use store::{CachedResponse, ResponseCache};

//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, catch-all handler)
//!     → request.rs (request ID)
//!     → routing (route table lookup, 404 / 405)
//!     → [cache layer on caching GET routes]
//!     → dispatcher.rs (parameters, body, execution)
//!     → response.rs (exit code mapping → status, headers, body)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::RouteHandler;
pub use request::{RequestUuid, X_REQUEST_ID};
pub use server::{bind, HttpServer, ServerError};

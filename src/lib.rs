//! webcmd: an HTTP server that runs a command per request.
//!
//! Requests are matched against configured routes; each route runs an
//! executable directly or a command line in a pooled shell, exposes request
//! values as environment variables and maps the exit code to the response.

pub mod cache;
pub mod cli;
pub mod config;
pub mod execution;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod params;
pub mod resilience;
pub mod routing;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;

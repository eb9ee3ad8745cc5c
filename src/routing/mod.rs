//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → compiler.rs (exit code table, parameters, caching gate)
//!     → pattern.rs (compile path matchers)
//!     → router.rs (ordered table of route services)
//!
//! Incoming Request (method, path):
//!     → router.rs (first pattern match wins)
//!     → pattern.rs (extract decoded segment values)
//!     → route service, or 404 / 405
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins (declaration order)

pub mod compiler;
pub mod pattern;
pub mod router;

pub use compiler::{compile_route, CompiledMapping, ExitCodeKey, OptimizedRoute};
pub use pattern::{PathParams, PatternError, RoutePattern};
pub use router::{RouteMatch, RouteService, RouteTable};

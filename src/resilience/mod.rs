//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Shell pool replenishment:
//!     spawn fails → backoff.rs (exponential delay with jitter) → retry
//! Requests:
//!     tower-http TimeoutLayer bounds every request, command included
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every request has a deadline
//! - Failed commands are never retried; only pool spawns are

pub mod backoff;

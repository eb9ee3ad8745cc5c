//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Merge flags → Validate → Compile routes → Start pool → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain requests → Close shell pool → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then executers, then the listener
//! - Ordered shutdown: stop accept, drain, kill idle shells

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;

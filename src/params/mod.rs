//! Request parameter subsystem.
//!
//! # Data Flow
//! ```text
//! Route compilation (at startup):
//!     declared parameters + path segments of the pattern
//!     → extractor.rs (resolve list, derive env variable names)
//!
//! Per request:
//!     headers / query string / path segments
//!     → extractor.rs (read value or default)
//!     → sanitizer.rs (strip shell metacharacters)
//!     → EnvMap for the executer
//! ```

pub mod extractor;
pub mod sanitizer;

pub use extractor::{env_name, EnvMap, ParameterExtractor, ResolvedParameter};
pub use sanitizer::sanitize;

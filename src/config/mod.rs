//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML/JSON)
//!     → loader.rs (detect format, parse & deserialize)
//!     → command line flags merged on top (cli.rs)
//!     → validation.rs (remarks: info / warning / critical)
//!     → AppConfig (validated, immutable)
//!     → compiled into routes and modules at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{AppConfig, ModulesConfig, RouteConfig, ServerConfig};
pub use validation::{Remark, RemarkLevel};

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.
//! Keys are PascalCase (`Routes`, `StatusCodes`, `AllowBody`, ...).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Prefix for environment variables derived from request parameters.
pub const ROUTE_PARAM_PREFIX: &str = "WC_";

/// Root configuration for webcmd.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, rename_all = "PascalCase")]
pub struct AppConfig {
    /// HTTP server settings.
    pub server: ServerConfig,

    /// Routes to serve.
    pub routes: Vec<RouteConfig>,

    /// Server-wide modules (shell pool, cache, process environment).
    pub modules: ModulesConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ServerConfig {
    /// Host address to listen on.
    pub host: String,

    /// Port to listen on.
    pub port: u16,

    /// Total time a request may take, command execution included.
    pub request_timeout_secs: u64,

    /// Maximum accepted request body in bytes.
    pub max_body_size: usize,
}

impl ServerConfig {
    /// `host:port` as used for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 60,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// A declared route.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RouteConfig {
    /// HTTP method (GET, POST, PUT, DELETE).
    pub method: String,

    /// Path pattern, may contain `{name}` or `{name:constraint}` segments.
    #[serde(rename = "Route")]
    pub pattern: String,

    /// Response headers sent for every exit code.
    pub headers: HashMap<String, String>,

    /// Request values exposed to the command as environment variables.
    pub parameters: Vec<RouteParameter>,

    /// Exit code to status code mappings. Always starts with `0 -> 200`,
    /// which configured mappings may override.
    #[serde(deserialize_with = "with_success_mapping")]
    pub status_codes: Vec<ExitCodeMapping>,

    /// Static environment variables for every execution.
    pub env: HashMap<String, String>,

    /// Pass the request body to the command's stdin.
    pub allow_body: bool,

    /// Cache responses (GET only).
    pub caching: bool,

    /// Default output stream used for the response body.
    pub response_stream: ResponseStream,

    /// What to execute.
    pub exec: RouteExec,
}

impl RouteConfig {
    /// `METHOD PATTERN`, used as the route's label in logs and metrics.
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.pattern)
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            pattern: "/*".to_string(),
            headers: HashMap::new(),
            parameters: Vec::new(),
            status_codes: vec![ExitCodeMapping::success()],
            env: HashMap::new(),
            allow_body: false,
            caching: false,
            response_stream: ResponseStream::Both,
            exec: RouteExec::default(),
        }
    }
}

fn with_success_mapping<'de, D>(deserializer: D) -> Result<Vec<ExitCodeMapping>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let configured = Vec::<ExitCodeMapping>::deserialize(deserializer)?;
    let mut mappings = Vec::with_capacity(configured.len() + 1);
    mappings.push(ExitCodeMapping::success());
    mappings.extend(configured);
    Ok(mappings)
}

/// Maps one exit code (or every unmapped one) to a response.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ExitCodeMapping {
    /// Exit code to map from. `None` is the default for unmapped codes.
    #[serde(default)]
    pub exit_code: Option<i32>,

    /// Status code to answer with. Clamped to 200..=999.
    pub status_code: i64,

    /// Extra headers for this exit code.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Output stream override for this exit code.
    #[serde(default)]
    pub response_stream: Option<ResponseStream>,
}

impl ExitCodeMapping {
    /// The implicit `0 -> 200` mapping every route starts with.
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            status_code: 200,
            headers: HashMap::new(),
            response_stream: None,
        }
    }
}

/// Which output of the process becomes the response body.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStream {
    Stdout,
    Stderr,
    #[default]
    Both,
    /// No response body.
    #[serde(rename = "none")]
    Empty,
}

/// A request value exposed as an environment variable.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "PascalCase")]
pub struct RouteParameter {
    /// Name of the parameter at its source.
    pub name: String,

    /// Where the value is read from.
    pub source: ParamSource,

    /// Custom environment variable name. Defaults to `WC_<NAME>`.
    #[serde(rename = "As")]
    pub env_name: String,

    /// Value used when the request provides an empty one.
    pub default: String,

    /// Skip value sanitization for this parameter.
    pub disable_sanitization: bool,
}

/// Source of a route parameter value.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParamSource {
    Query,
    Route,
    Header,
    /// Always uses the default value.
    #[default]
    #[serde(rename = "none", alias = "")]
    Unset,
}

/// Execution config of a route: exactly one of `Proc` or `Shell`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RouteExec {
    pub proc: Option<ExecProc>,
    pub shell: Option<ExecShell>,
}

/// Run an executable directly.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "PascalCase")]
pub struct ExecProc {
    /// Executable file or name on PATH.
    pub path: String,
    pub args: Vec<String>,
}

/// Run a command line in a pooled shell.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "PascalCase")]
pub struct ExecShell {
    pub command: String,
}

/// Server-wide modules.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ModulesConfig {
    pub shell_pool: ShellPoolConfig,
    pub cache: CacheConfig,
    pub environment: EnvironmentConfig,
}

/// Pre-spawned shell processes for `Shell` routes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ShellPoolConfig {
    /// Shell binary path.
    pub path: String,

    /// Shell arguments; the shell must read its script from stdin.
    pub args: Vec<String>,

    /// Number of shells kept ready.
    pub size: usize,
}

impl Default for ShellPoolConfig {
    fn default() -> Self {
        Self {
            path: "/usr/bin/bash".to_string(),
            args: vec!["-s".to_string()],
            size: 2,
        }
    }
}

/// Response cache for routes with `Caching` enabled.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct CacheConfig {
    /// Number of responses kept before the least recently used is evicted.
    pub max_responses_cached: usize,

    /// Time to live of a cached response in seconds. Accepts whole seconds
    /// (`60`) or a duration string of hours, minutes and seconds (`"1m30s"`).
    #[serde(rename = "TTL", deserialize_with = "seconds_or_duration")]
    pub ttl_secs: u64,

    /// Extra `Cache-Control` directives appended after `max-age`.
    pub control_directives: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_responses_cached: 100,
            ttl_secs: 60,
            control_directives: Vec::new(),
        }
    }
}

fn seconds_or_duration<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(secs),
        Raw::Text(text) => parse_duration_secs(&text).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid duration '{text}', expected e.g. 90, \"90s\", \"5m\" or \"1h30m\""
            ))
        }),
    }
}

/// Parse `"2h"`, `"1m30s"` or `"45"` into seconds.
pub fn parse_duration_secs(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let value: u64 = digits.parse().ok()?;
        digits.clear();
        let unit = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return None,
        };
        total = total.checked_add(value.checked_mul(unit)?)?;
    }
    if !digits.is_empty() {
        total = total.checked_add(digits.parse().ok()?)?;
    }
    Some(total)
}

/// Environment of spawned processes.
///
/// By default a process only sees the allowlisted variables of the server
/// environment, the route's `Env` map and the request parameters. With
/// `Inherit` the complete server environment is passed on as well.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct EnvironmentConfig {
    /// Pass the complete server environment to every process.
    pub inherit: bool,

    /// Server variables passed on when `Inherit` is off.
    pub allow: Vec<String>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            inherit: false,
            allow: ["PATH", "HOME", "LANG", "USER"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

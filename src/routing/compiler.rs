//! Route compilation.
//!
//! # Responsibilities
//! - Build the exit code table of a route (clamped statuses, inherited
//!   streams, a guaranteed default entry)
//! - Resolve the route's parameters and their variable names
//! - Gate caching to GET routes
//!
//! # Design Decisions
//! - Compilation never fails; configuration problems are reported as remarks
//!   by `config::validation`
//! - The compiled route is immutable and shared by every request

use std::collections::HashMap;
use std::sync::LazyLock;

use axum::http::{HeaderName, HeaderValue, Method, StatusCode};

use crate::config::schema::{ExitCodeMapping, ResponseStream, RouteConfig};
use crate::execution::ExecSpec;
use crate::params::{EnvMap, ParameterExtractor};

/// Lowest status code an exit code may map to.
pub const MIN_STATUS: i64 = 200;
/// Highest status code an exit code may map to.
pub const MAX_STATUS: i64 = 999;

static FALLBACK_MAPPING: LazyLock<CompiledMapping> = LazyLock::new(CompiledMapping::fallback);

/// Key of the exit code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitCodeKey {
    Code(i32),
    /// Entry used for every exit code without its own mapping.
    Default,
}

impl From<Option<i32>> for ExitCodeKey {
    fn from(code: Option<i32>) -> Self {
        code.map_or(ExitCodeKey::Default, ExitCodeKey::Code)
    }
}

/// Response settings for one exit code.
#[derive(Debug, Clone)]
pub struct CompiledMapping {
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub stream: ResponseStream,
}

impl CompiledMapping {
    fn compile(mapping: &ExitCodeMapping, route_stream: ResponseStream) -> Self {
        Self {
            status: status_code(mapping.status_code),
            headers: compile_headers(&mapping.headers),
            stream: mapping.response_stream.unwrap_or(route_stream),
        }
    }

    /// The entry synthesized when a route declares no default mapping.
    fn fallback() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            headers: Vec::new(),
            stream: ResponseStream::Both,
        }
    }
}

/// Clamp a configured status code to `200..=999`.
pub fn clamp_status(status: i64) -> u16 {
    // Both bounds fit u16.
    status.clamp(MIN_STATUS, MAX_STATUS) as u16
}

fn status_code(status: i64) -> StatusCode {
    StatusCode::from_u16(clamp_status(status)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Parse configured headers, skipping invalid ones (validation reports them).
pub fn compile_headers(headers: &HashMap<String, String>) -> Vec<(HeaderName, HeaderValue)> {
    let mut compiled: Vec<(HeaderName, HeaderValue)> = headers
        .iter()
        .filter_map(|(name, value)| {
            let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
            let value = HeaderValue::from_str(value).ok()?;
            Some((name, value))
        })
        .collect();
    compiled.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
    compiled
}

/// Parse a configured method. `None` for methods that are not served.
pub fn parse_method(method: &str) -> Option<Method> {
    match method.to_ascii_uppercase().as_str() {
        "GET" => Some(Method::GET),
        "POST" => Some(Method::POST),
        "PUT" => Some(Method::PUT),
        "DELETE" => Some(Method::DELETE),
        _ => None,
    }
}

/// A route ready to serve requests.
#[derive(Debug, Clone)]
pub struct OptimizedRoute {
    /// `METHOD PATTERN`, used in logs and metrics.
    pub label: String,
    pub method: Method,
    pub pattern: String,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub exit_codes: HashMap<ExitCodeKey, CompiledMapping>,
    pub parameters: ParameterExtractor,
    /// Static variables set for every execution.
    pub env: EnvMap,
    pub allow_body: bool,
    /// Only ever set for GET routes.
    pub caching: bool,
    pub exec: Option<ExecSpec>,
}

impl OptimizedRoute {
    /// Response settings for an exit code, falling back to the default entry.
    pub fn exit_code_response(&self, code: i32) -> &CompiledMapping {
        self.exit_codes
            .get(&ExitCodeKey::Code(code))
            .or_else(|| self.exit_codes.get(&ExitCodeKey::Default))
            .unwrap_or(&FALLBACK_MAPPING)
    }
}

/// Compile a declared route.
pub fn compile_route(route: &RouteConfig) -> OptimizedRoute {
    let mut exit_codes = HashMap::with_capacity(route.status_codes.len() + 1);
    for mapping in &route.status_codes {
        exit_codes.insert(
            ExitCodeKey::from(mapping.exit_code),
            CompiledMapping::compile(mapping, route.response_stream),
        );
    }
    exit_codes
        .entry(ExitCodeKey::Default)
        .or_insert_with(CompiledMapping::fallback);

    let method = parse_method(&route.method).unwrap_or(Method::GET);
    let caching = route.caching && method == Method::GET;

    OptimizedRoute {
        label: route.label(),
        pattern: route.pattern.clone(),
        headers: compile_headers(&route.headers),
        exit_codes,
        parameters: ParameterExtractor::new(&route.pattern, &route.parameters),
        env: route.env.clone(),
        allow_body: route.allow_body,
        caching,
        exec: ExecSpec::from_config(&route.exec),
        method,
    }
}

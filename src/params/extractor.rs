//! Request parameter extraction.
//!
//! # Responsibilities
//! - Resolve a route's parameter list (declared + implicit path segments)
//! - Derive each parameter's environment variable name at startup
//! - Read, sanitize and default values for one request
//!
//! # Design Decisions
//! - Declared order is kept; a later parameter with the same variable name wins
//! - Defaults are operator-provided and never sanitized

use std::collections::HashMap;

use axum::http::HeaderMap;

use crate::config::schema::{ParamSource, RouteParameter, ROUTE_PARAM_PREFIX};
use crate::params::sanitizer::sanitize;
use crate::routing::pattern::{param_names, PathParams};

/// Environment variable name to value.
pub type EnvMap = HashMap<String, String>;

/// A parameter with its environment variable name already derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParameter {
    pub name: String,
    pub source: ParamSource,
    pub env_name: String,
    pub default: String,
    pub sanitize: bool,
}

impl From<&RouteParameter> for ResolvedParameter {
    fn from(param: &RouteParameter) -> Self {
        Self {
            name: param.name.clone(),
            source: param.source,
            env_name: env_name(param),
            default: param.default.clone(),
            sanitize: !param.disable_sanitization,
        }
    }
}

/// Environment variable name of a parameter.
///
/// `WC_` + the uppercased name, or the explicit `As` name. A rename starting
/// with a digit gets the prefix too. Anything but ASCII letters, digits and
/// underscores is replaced with `_`.
pub fn env_name(param: &RouteParameter) -> String {
    let name = if param.env_name.is_empty() {
        format!("{ROUTE_PARAM_PREFIX}{}", param.name.to_uppercase())
    } else if param.env_name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{ROUTE_PARAM_PREFIX}{}", param.env_name)
    } else {
        param.env_name.clone()
    };

    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// The compiled parameter list of one route.
#[derive(Debug, Clone, Default)]
pub struct ParameterExtractor {
    parameters: Vec<ResolvedParameter>,
}

impl ParameterExtractor {
    /// Resolve the declared parameters plus every path segment of `pattern`
    /// that is not declared already.
    pub fn new(pattern: &str, declared: &[RouteParameter]) -> Self {
        let mut parameters: Vec<ResolvedParameter> =
            declared.iter().map(ResolvedParameter::from).collect();

        for name in param_names(pattern) {
            if !declared.iter().any(|p| p.name == name) {
                parameters.push(ResolvedParameter::from(&RouteParameter {
                    name,
                    source: ParamSource::Route,
                    ..Default::default()
                }));
            }
        }

        Self { parameters }
    }

    pub fn parameters(&self) -> &[ResolvedParameter] {
        &self.parameters
    }

    /// Every variable name this extractor can produce.
    pub fn env_names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.env_name.as_str()).collect()
    }

    /// Build the environment variables for one request.
    pub fn extract(&self, headers: &HeaderMap, query: Option<&str>, path: &PathParams) -> EnvMap {
        let query_values = query.map(parse_query).unwrap_or_default();
        let mut env = EnvMap::with_capacity(self.parameters.len());

        for param in &self.parameters {
            let raw = match param.source {
                ParamSource::Header => headers
                    .get(param.name.as_str())
                    .and_then(|v| v.to_str().ok()),
                ParamSource::Query => query_values.get(&param.name).map(String::as_str),
                ParamSource::Route => path.get(&param.name),
                ParamSource::Unset => None,
            }
            .unwrap_or_default();

            let value = if raw.is_empty() {
                param.default.clone()
            } else if param.sanitize {
                sanitize(raw)
            } else {
                raw.to_string()
            };

            if !param.env_name.is_empty() {
                env.insert(param.env_name.clone(), value);
            }
        }

        env
    }
}

/// First value of every query key.
fn parse_query(query: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        values
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    values
}

//! Route pattern parsing and path matching.
//!
//! # Responsibilities
//! - Find the named segments (`{name}`, `{name:constraint}`) of a pattern
//! - Compile a pattern into an anchored matcher
//! - Extract percent-decoded segment values from a request path
//!
//! # Design Decisions
//! - Patterns are compiled once at startup, matching is a single regex run
//! - Constraints are regular expressions and must match the whole segment value
//! - A `*` matches the rest of the path
//! - Trailing slashes are ignored on patterns and request paths

use std::collections::HashMap;
use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;
use thiserror::Error;

/// Segment name up to an optional `:constraint`, never crossing a `/`.
static SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([^/\\:]+)(?::([^}/]+))?\}").expect("segment regex is valid")
});

/// Error type for pattern compilation.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("constraint '{constraint}' of segment '{name}' is not a valid regular expression: {source}")]
    InvalidConstraint {
        name: String,
        constraint: String,
        #[source]
        source: regex::Error,
    },

    #[error("pattern '{0}' can not be compiled: {1}")]
    Invalid(String, #[source] regex::Error),
}

/// Names of all path segments embedded in a pattern, in order of appearance.
pub fn param_names(pattern: &str) -> Vec<String> {
    SEGMENT
        .captures_iter(pattern)
        .filter_map(|caps| caps.get(1))
        .map(|name| name.as_str().to_string())
        .collect()
}

/// Values of the named segments of a matched request path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(HashMap<String, String>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for PathParams {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A compiled route pattern.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    raw: String,
    matcher: Regex,
    /// Segment names; the segment at index `i` is captured by group `p{i}`.
    names: Vec<String>,
}

impl RoutePattern {
    /// Compile a pattern into a matcher.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let normalized = normalize(pattern);
        let mut source = String::from("^");
        let mut names = Vec::new();
        let mut last = 0;

        for caps in SEGMENT.captures_iter(&normalized) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            source.push_str(&literal(&normalized[last..whole.start()]));

            let group = format!("p{}", names.len());
            match caps.get(2) {
                Some(constraint) => {
                    Regex::new(constraint.as_str()).map_err(|err| {
                        PatternError::InvalidConstraint {
                            name: name.as_str().to_string(),
                            constraint: constraint.as_str().to_string(),
                            source: err,
                        }
                    })?;
                    source.push_str(&format!("(?P<{group}>{})", constraint.as_str()));
                }
                None => source.push_str(&format!("(?P<{group}>[^/]+)")),
            }

            names.push(name.as_str().to_string());
            last = whole.end();
        }
        source.push_str(&literal(&normalized[last..]));
        source.push('$');

        let matcher =
            Regex::new(&source).map_err(|e| PatternError::Invalid(pattern.to_string(), e))?;

        Ok(Self {
            raw: normalized,
            matcher,
            names,
        })
    }

    /// The normalized pattern text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Names of the segments this pattern captures.
    pub fn param_names(&self) -> &[String] {
        &self.names
    }

    /// Match a request path, returning the decoded segment values.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let normalized = normalize(path);
        let caps = self.matcher.captures(&normalized)?;

        Some(
            self.names
                .iter()
                .enumerate()
                .filter_map(|(i, name)| {
                    let value = caps.name(&format!("p{i}"))?;
                    let decoded = percent_decode_str(value.as_str()).decode_utf8_lossy();
                    Some((name.clone(), decoded.into_owned()))
                })
                .collect(),
        )
    }
}

/// Strip trailing slashes and make sure the path is rooted.
fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Escape literal pattern text; `*` becomes a match-anything wildcard.
fn literal(text: &str) -> String {
    text.split('*')
        .map(|part| regex::escape(part))
        .collect::<Vec<_>>()
        .join(".*")
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Report problems per route as remarks of three levels
//! - Detect conflicting routes
//!
//! # Design Decisions
//! - Returns all remarks, not just the first
//! - Validation is a pure function: AppConfig → Vec<Remark>
//! - Only critical remarks stop startup; the rest are logged

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use axum::http::{HeaderName, HeaderValue, Method};

use crate::config::schema::{AppConfig, ParamSource, RouteConfig};
use crate::params::env_name;
use crate::routing::compiler::parse_method;
use crate::routing::pattern::RoutePattern;

/// Severity of a remark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RemarkLevel {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for RemarkLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemarkLevel::Info => write!(f, "info"),
            RemarkLevel::Warning => write!(f, "warning"),
            RemarkLevel::Critical => write!(f, "critical"),
        }
    }
}

/// A problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remark {
    pub level: RemarkLevel,
    /// Label of the route, empty for server-wide remarks.
    pub route: String,
    pub message: String,
}

impl Remark {
    fn new(level: RemarkLevel, route: &str, message: impl Into<String>) -> Self {
        Self {
            level,
            route: route.to_string(),
            message: message.into(),
        }
    }

    pub fn is_critical(&self) -> bool {
        self.level == RemarkLevel::Critical
    }
}

impl fmt::Display for Remark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.route.is_empty() {
            write!(f, "[{}] {}", self.level, self.message)
        } else {
            write!(f, "[{}] {}: {}", self.level, self.route, self.message)
        }
    }
}

/// Check the whole configuration.
pub fn check_config(config: &AppConfig) -> Vec<Remark> {
    let mut remarks: Vec<Remark> = config.routes.iter().flat_map(check_route).collect();

    let mut seen = HashSet::new();
    for route in &config.routes {
        let method = parse_method(&route.method).unwrap_or(Method::GET);
        let pattern = RoutePattern::compile(&route.pattern)
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|_| route.pattern.clone());
        if !seen.insert((method, pattern)) {
            remarks.push(Remark::new(
                RemarkLevel::Critical,
                &route.label(),
                "route is declared more than once",
            ));
        }
    }

    if config.modules.shell_pool.size == 0 {
        remarks.push(Remark::new(
            RemarkLevel::Info,
            "",
            "shell pool size is 0, one shell is kept ready",
        ));
    }

    let shell_routes = config
        .routes
        .iter()
        .any(|r| r.exec.proc.is_none() && r.exec.shell.is_some());
    let shell = &config.modules.shell_pool.path;
    if shell_routes && find_executable(shell).is_none() {
        remarks.push(Remark::new(
            RemarkLevel::Warning,
            "",
            format!("shell '{shell}' was not found, shell routes will time out"),
        ));
    }

    remarks
}

/// Check a single route.
pub fn check_route(route: &RouteConfig) -> Vec<Remark> {
    let label = route.label();
    let mut remarks = Vec::new();
    let mut remark = |level, message: String| remarks.push(Remark::new(level, &label, message));

    let method = parse_method(&route.method);
    match &method {
        None => remark(
            RemarkLevel::Critical,
            format!("method '{}' is not one of GET, POST, PUT, DELETE", route.method),
        ),
        Some(m) if (*m == Method::POST || *m == Method::PUT) && !route.allow_body => remark(
            RemarkLevel::Info,
            "request bodies are ignored unless AllowBody is set".to_string(),
        ),
        Some(_) => {}
    }

    if route.caching && method != Some(Method::GET) {
        remark(
            RemarkLevel::Warning,
            "caching is only applied to GET routes and is disabled".to_string(),
        );
    }

    match (&route.exec.proc, &route.exec.shell) {
        (None, None) => remark(
            RemarkLevel::Critical,
            "neither Proc nor Shell execution is configured".to_string(),
        ),
        (Some(_), Some(_)) => remark(
            RemarkLevel::Warning,
            "both Proc and Shell execution are configured, Proc is used".to_string(),
        ),
        _ => {}
    }

    if let Some(proc) = &route.exec.proc {
        if proc.path.is_empty() {
            remark(RemarkLevel::Critical, "Proc path is empty".to_string());
        } else if find_executable(&proc.path).is_none() {
            remark(
                RemarkLevel::Warning,
                format!("executable '{}' was not found", proc.path),
            );
        }
    }
    if let (None, Some(shell)) = (&route.exec.proc, &route.exec.shell) {
        if shell.command.trim().is_empty() {
            remark(RemarkLevel::Critical, "Shell command is empty".to_string());
        }
    }

    if !route.status_codes.iter().any(|m| m.exit_code.is_none()) {
        remark(
            RemarkLevel::Info,
            "no default exit code mapping, unmapped exit codes answer 500".to_string(),
        );
    }

    if let Err(e) = RoutePattern::compile(&route.pattern) {
        remark(RemarkLevel::Critical, e.to_string());
    }

    let mapping_headers = route.status_codes.iter().flat_map(|m| m.headers.iter());
    for (name, value) in route.headers.iter().chain(mapping_headers) {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            remark(RemarkLevel::Critical, format!("invalid header name '{name}'"));
        } else if HeaderValue::from_str(value).is_err() {
            remark(
                RemarkLevel::Critical,
                format!("invalid value for header '{name}'"),
            );
        }
    }

    for param in &route.parameters {
        if param.name.is_empty() && param.env_name.is_empty() {
            remark(
                RemarkLevel::Warning,
                "parameter without Name or As is exposed as 'WC_'".to_string(),
            );
        } else if param.name.is_empty() && param.source != ParamSource::Unset {
            remark(
                RemarkLevel::Warning,
                format!(
                    "parameter '{}' has no Name, only its default is used",
                    param.env_name
                ),
            );
        }

        let derived = env_name(param);
        if !param.env_name.is_empty() && derived != param.env_name {
            remark(
                RemarkLevel::Info,
                format!("parameter '{}' is exposed as '{derived}'", param.env_name),
            );
        }
    }

    remarks
}

/// Log every remark at its level. Returns the number of critical remarks.
pub fn log_remarks(remarks: &[Remark]) -> usize {
    for r in remarks {
        match r.level {
            RemarkLevel::Info => tracing::info!(route = %r.route, "{}", r.message),
            RemarkLevel::Warning => tracing::warn!(route = %r.route, "{}", r.message),
            RemarkLevel::Critical => tracing::error!(route = %r.route, "{}", r.message),
        }
    }

    let critical = remarks.iter().filter(|r| r.is_critical()).count();
    if critical == 0 {
        tracing::info!(remarks = remarks.len(), "config ok");
    } else {
        tracing::error!(remarks = remarks.len(), critical, "config with problems");
    }
    critical
}

/// Resolve an executable path or a name on PATH.
pub fn find_executable(path: &str) -> Option<PathBuf> {
    let candidate = Path::new(path);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(path))
        .find(|full| full.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ExecProc, ExecShell, ExitCodeMapping, RouteExec, RouteParameter};

    fn shell_route(command: &str) -> RouteConfig {
        RouteConfig {
            exec: RouteExec {
                proc: None,
                shell: Some(ExecShell {
                    command: command.to_string(),
                }),
            },
            ..Default::default()
        }
    }

    fn levels(remarks: &[Remark]) -> Vec<RemarkLevel> {
        remarks.iter().map(|r| r.level).collect()
    }

    fn with_default(mut route: RouteConfig) -> RouteConfig {
        route.status_codes.push(ExitCodeMapping {
            exit_code: None,
            status_code: 500,
            headers: Default::default(),
            response_stream: None,
        });
        route
    }

    #[test]
    fn test_clean_route_has_no_remarks() {
        let route = with_default(shell_route("echo hi"));
        assert!(check_route(&route).is_empty());
    }

    #[test]
    fn test_missing_default_mapping_is_info() {
        let remarks = check_route(&shell_route("echo hi"));
        assert_eq!(levels(&remarks), vec![RemarkLevel::Info]);
    }

    #[test]
    fn test_caching_on_post_is_warning() {
        let mut route = with_default(shell_route("cat"));
        route.method = "POST".to_string();
        route.allow_body = true;
        route.caching = true;

        let remarks = check_route(&route);
        assert_eq!(levels(&remarks), vec![RemarkLevel::Warning]);
        assert!(remarks[0].message.contains("caching"));
    }

    #[test]
    fn test_critical_remarks() {
        let mut bad_method = with_default(shell_route("echo"));
        bad_method.method = "PATCH".to_string();
        assert!(check_route(&bad_method).iter().any(Remark::is_critical));

        let no_exec = with_default(RouteConfig::default());
        assert!(check_route(&no_exec).iter().any(Remark::is_critical));

        let empty_shell = with_default(shell_route("  "));
        assert!(check_route(&empty_shell).iter().any(Remark::is_critical));

        let mut bad_constraint = with_default(shell_route("echo"));
        bad_constraint.pattern = "/x/{id:[}".to_string();
        assert!(check_route(&bad_constraint).iter().any(Remark::is_critical));

        let mut bad_header = with_default(shell_route("echo"));
        bad_header
            .headers
            .insert("Bad Header".to_string(), "x".to_string());
        assert!(check_route(&bad_header).iter().any(Remark::is_critical));
    }

    #[test]
    fn test_proc_remarks() {
        let mut route = with_default(RouteConfig::default());
        route.exec.proc = Some(ExecProc {
            path: String::new(),
            args: Vec::new(),
        });
        assert_eq!(levels(&check_route(&route)), vec![RemarkLevel::Critical]);

        route.exec.proc = Some(ExecProc {
            path: "/definitely/missing/binary".to_string(),
            args: Vec::new(),
        });
        assert_eq!(levels(&check_route(&route)), vec![RemarkLevel::Warning]);

        route.exec.shell = Some(ExecShell {
            command: "echo".to_string(),
        });
        assert!(check_route(&route)
            .iter()
            .any(|r| r.message.contains("both Proc and Shell")));
    }

    #[test]
    fn test_parameter_remarks() {
        let mut route = with_default(shell_route("echo"));
        route.parameters.push(RouteParameter {
            name: "q".to_string(),
            source: ParamSource::Query,
            env_name: "MY-VAR".to_string(),
            ..Default::default()
        });
        route.parameters.push(RouteParameter::default());

        assert_eq!(
            levels(&check_route(&route)),
            vec![RemarkLevel::Info, RemarkLevel::Warning]
        );
    }

    #[test]
    fn test_duplicate_routes_are_critical() {
        let mut config = AppConfig::default();
        config.routes.push(with_default(shell_route("echo a")));
        let mut second = with_default(shell_route("echo b"));
        second.pattern = "/*/".to_string();
        config.routes.push(second);

        let remarks = check_config(&config);
        assert_eq!(remarks.iter().filter(|r| r.is_critical()).count(), 1);
    }

    #[test]
    fn test_missing_pool_shell_is_warning() {
        let mut config = AppConfig::default();
        config.modules.shell_pool.path = "/no/such/shell".to_string();
        assert!(check_config(&config).is_empty());

        config.routes.push(with_default(shell_route("echo")));
        let remarks = check_config(&config);
        assert_eq!(levels(&remarks), vec![RemarkLevel::Warning]);
        assert!(remarks[0].message.contains("/no/such/shell"));
    }

    #[cfg(unix)]
    #[test]
    fn test_pool_shell_found() {
        let mut config = AppConfig::default();
        config.modules.shell_pool.path = "sh".to_string();
        config.routes.push(with_default(shell_route("echo")));
        assert!(check_config(&config).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_find_executable() {
        assert!(find_executable("sh").is_some());
        assert!(find_executable("/bin/sh").is_some());
        assert!(find_executable("no-such-tool-anywhere").is_none());
    }
}

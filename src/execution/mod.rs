//! Command execution subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     ModulesConfig + routes
//!     → registry.rs (register executers available on this platform)
//!     → pool.rs (pre-spawn shells, only if a route needs them)
//!
//! Per request:
//!     ExecutionConfig (command, args, env, body)
//!     → direct.rs (spawn a fresh process)   | shell.rs (take a pooled shell,
//!                                           |  write exports + command to stdin)
//!     → process.rs (capture output, wait for exit)
//!     → (ProcessHandle, exit code) or ExecError
//! ```
//!
//! # Design Decisions
//! - A non-zero exit code is a result, not an error
//! - Every execution races against the request's cancellation token and
//!   kills the process when the request goes away

pub mod direct;
pub mod pool;
pub mod process;
pub mod registry;
pub mod shell;

use std::fmt;
use std::io;

use async_trait::async_trait;
use axum::body::Bytes;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::schema::RouteExec;
use crate::params::EnvMap;

pub use direct::DirectProcessExecuter;
pub use pool::ShellPool;
pub use process::{EnvPolicy, ProcessHandle, ProcessTemplate};
pub use registry::{ExecuterRegistry, RegistryError};
pub use shell::PooledShellExecuter;

/// Error type for executions. Each of these ends the request with a 500.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for process: {0}")]
    Wait(#[source] io::Error),

    #[error("execution cancelled")]
    Cancelled,

    #[error("shell pool is closed")]
    PoolClosed,
}

/// How a route runs its command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecMode {
    Proc,
    Shell,
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecMode::Proc => write!(f, "proc"),
            ExecMode::Shell => write!(f, "shell"),
        }
    }
}

/// The resolved execution config of a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecSpec {
    Proc { path: String, args: Vec<String> },
    Shell { command: String },
}

impl ExecSpec {
    /// Resolve the declared config. `Proc` wins when both are set.
    pub fn from_config(exec: &RouteExec) -> Option<Self> {
        match (&exec.proc, &exec.shell) {
            (Some(proc), _) => Some(Self::Proc {
                path: proc.path.clone(),
                args: proc.args.clone(),
            }),
            (None, Some(shell)) => Some(Self::Shell {
                command: shell.command.clone(),
            }),
            (None, None) => None,
        }
    }

    pub fn mode(&self) -> ExecMode {
        match self {
            Self::Proc { .. } => ExecMode::Proc,
            Self::Shell { .. } => ExecMode::Shell,
        }
    }
}

/// Operating system family, used to decide which executers can be registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Unix,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }
}

/// Input of one execution, built fresh for every request.
#[derive(Debug, Clone, Default)]
pub struct ExecutionConfig {
    /// Executable path (proc) or command line (shell).
    pub command: String,
    pub args: Vec<String>,
    pub env: EnvMap,
    /// Request body, only set when the route allows it.
    pub stdin: Option<Bytes>,
}

impl ExecutionConfig {
    /// Execution config for `spec` with the given environment and body.
    pub fn for_spec(spec: &ExecSpec, env: EnvMap, stdin: Option<Bytes>) -> Self {
        match spec {
            ExecSpec::Proc { path, args } => Self {
                command: path.clone(),
                args: args.clone(),
                env,
                stdin,
            },
            ExecSpec::Shell { command } => Self {
                command: command.clone(),
                args: Vec::new(),
                env,
                stdin,
            },
        }
    }
}

/// Runs commands for routes of one execution mode.
#[async_trait]
pub trait Executer: Send + Sync + fmt::Debug {
    /// The execution mode this executer serves.
    fn mode(&self) -> ExecMode;

    /// Whether this executer can run on `platform`. Checked before construction.
    fn available_on(platform: Platform) -> bool
    where
        Self: Sized;

    /// Run a command and wait for it to exit.
    ///
    /// Returns the finished process and its exit code. When `cancel` fires
    /// first, the process is killed and [`ExecError::Cancelled`] is returned.
    async fn execute(
        &self,
        cancel: &CancellationToken,
        config: ExecutionConfig,
    ) -> Result<(ProcessHandle, i32), ExecError>;
}

/// Feed `input` to the process, close stdin and wait for it to exit, unless
/// `cancel` fires first, in which case the process is killed.
pub(crate) async fn run_to_exit(
    handle: &mut ProcessHandle,
    cancel: &CancellationToken,
    input: &[&[u8]],
) -> Result<i32, ExecError> {
    let outcome = tokio::select! {
        result = feed_and_wait(handle, input) => Some(result),
        _ = cancel.cancelled() => None,
    };

    match outcome {
        Some(result) => result.map_err(ExecError::Wait),
        None => {
            if let Err(e) = handle.kill().await {
                tracing::warn!(error = %e, pid = ?handle.id(), "Failed to kill cancelled process");
            }
            Err(ExecError::Cancelled)
        }
    }
}

async fn feed_and_wait(handle: &mut ProcessHandle, input: &[&[u8]]) -> io::Result<i32> {
    for chunk in input {
        // The process may exit without reading its input; its exit code tells the rest.
        if let Err(e) = handle.write_input(chunk).await {
            tracing::debug!(error = %e, "Process stopped accepting input");
            break;
        }
    }
    handle.close_input().await;
    handle.wait().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ExecProc, ExecShell};

    #[test]
    fn test_exec_spec_resolution() {
        let proc = ExecProc {
            path: "echo".to_string(),
            args: vec!["hi".to_string()],
        };
        let shell = ExecShell {
            command: "echo hi".to_string(),
        };

        let both = RouteExec {
            proc: Some(proc.clone()),
            shell: Some(shell.clone()),
        };
        assert_eq!(ExecSpec::from_config(&both).map(|s| s.mode()), Some(ExecMode::Proc));

        let only_shell = RouteExec {
            proc: None,
            shell: Some(shell),
        };
        assert_eq!(
            ExecSpec::from_config(&only_shell),
            Some(ExecSpec::Shell {
                command: "echo hi".to_string()
            })
        );

        assert_eq!(ExecSpec::from_config(&RouteExec::default()), None);
    }

    #[test]
    fn test_execution_config_for_spec() {
        let spec = ExecSpec::Proc {
            path: "/bin/echo".to_string(),
            args: vec!["a".to_string()],
        };
        let config = ExecutionConfig::for_spec(&spec, EnvMap::new(), Some(Bytes::from("body")));
        assert_eq!(config.command, "/bin/echo");
        assert_eq!(config.args, vec!["a"]);
        assert_eq!(config.stdin.as_deref(), Some(&b"body"[..]));
    }
}

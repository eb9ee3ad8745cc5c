//! Pooled shell execution: run a command line in a pre-spawned shell.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::execution::pool::ShellPool;
use crate::execution::process::ProcessHandle;
use crate::execution::{run_to_exit, ExecError, ExecMode, Executer, ExecutionConfig, Platform};
use crate::params::EnvMap;

/// Runs shell routes by writing their command line to a pooled shell's stdin.
#[derive(Debug, Clone)]
pub struct PooledShellExecuter {
    pool: Arc<ShellPool>,
}

impl PooledShellExecuter {
    pub fn new(pool: Arc<ShellPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<ShellPool> {
        &self.pool
    }
}

/// `export NAME='VALUE'; ` for every variable, in name order.
///
/// Values are single-quoted so the shell sees them exactly as a directly
/// spawned process would.
pub fn export_prefix(env: &EnvMap) -> String {
    let mut names: Vec<&String> = env.keys().collect();
    names.sort();
    names
        .into_iter()
        .map(|name| format!("export {}={}; ", name, single_quote(&env[name])))
        .collect()
}

/// Quote `value` for a POSIX shell. An embedded `'` becomes `'\''`.
fn single_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[async_trait]
impl Executer for PooledShellExecuter {
    fn mode(&self) -> ExecMode {
        ExecMode::Shell
    }

    fn available_on(platform: Platform) -> bool {
        platform != Platform::Windows
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        config: ExecutionConfig,
    ) -> Result<(ProcessHandle, i32), ExecError> {
        let mut handle = self.pool.take(cancel).await?;
        tracing::debug!(pid = ?handle.id(), "Pooled shell checked out");

        let script = format!("{}{}", export_prefix(&config.env), config.command);
        let mut input: Vec<&[u8]> = vec![script.as_bytes()];
        if let Some(body) = config.stdin.as_deref() {
            input.push(b"\n");
            input.push(body);
        }

        let code = run_to_exit(&mut handle, cancel, &input).await?;
        Ok((handle, code))
    }
}

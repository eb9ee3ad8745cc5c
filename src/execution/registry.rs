//! Execution mode to executer lookup.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::config::schema::{ModulesConfig, RouteConfig};
use crate::execution::direct::DirectProcessExecuter;
use crate::execution::pool::ShellPool;
use crate::execution::process::{EnvPolicy, ProcessTemplate};
use crate::execution::shell::PooledShellExecuter;
use crate::execution::{ExecMode, ExecSpec, Executer, Platform};

/// Error type for executer lookup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no executer available for {0} routes on this platform")]
    NoExecuterAvailable(ExecMode),
}

/// Executers by execution mode, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct ExecuterRegistry {
    executers: HashMap<ExecMode, Arc<dyn Executer>>,
    pool: Option<Arc<ShellPool>>,
}

impl ExecuterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the executers for `platform`.
    ///
    /// The shell pool is only started when one of `routes` runs in shell mode.
    pub fn from_config(modules: &ModulesConfig, routes: &[RouteConfig], platform: Platform) -> Self {
        let policy = EnvPolicy::from(&modules.environment);
        let mut registry = Self::new();

        if DirectProcessExecuter::available_on(platform) {
            registry.register(Arc::new(DirectProcessExecuter::new(policy.clone())));
        }

        let needs_shell = routes.iter().any(|route| {
            matches!(ExecSpec::from_config(&route.exec), Some(ExecSpec::Shell { .. }))
        });
        if needs_shell && PooledShellExecuter::available_on(platform) {
            let template = ProcessTemplate {
                program: modules.shell_pool.path.clone(),
                args: modules.shell_pool.args.clone(),
                open_stdin: true,
                policy,
            };
            let pool = Arc::new(ShellPool::new(template, modules.shell_pool.size));
            registry.pool = Some(pool.clone());
            registry.register(Arc::new(PooledShellExecuter::new(pool)));
        }

        registry
    }

    /// Register an executer for its mode, replacing any previous one.
    pub fn register(&mut self, executer: Arc<dyn Executer>) {
        tracing::debug!(mode = %executer.mode(), "Executer registered");
        self.executers.insert(executer.mode(), executer);
    }

    /// The executer for a route's execution config.
    pub fn for_route(&self, spec: &ExecSpec) -> Result<Arc<dyn Executer>, RegistryError> {
        self.executers
            .get(&spec.mode())
            .cloned()
            .ok_or(RegistryError::NoExecuterAvailable(spec.mode()))
    }

    /// The shell pool, if one was started.
    pub fn shell_pool(&self) -> Option<&Arc<ShellPool>> {
        self.pool.as_ref()
    }

    /// Close the shell pool, if any.
    pub fn shutdown(&self) {
        if let Some(pool) = &self.pool {
            pool.close();
        }
    }
}

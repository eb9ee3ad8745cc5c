//! Command line interface.
//!
//! ```text
//! webcmd [-v] [--no-color] run [-c FILE] [--dry-run] [-m METHOD] [-r ROUTE]
//!        [-p PORT] [--host HOST] [-- COMMAND...]
//! ```
//!
//! Flags override the config file. A command line route is added when the
//! config has no routes or when a route flag or command was given.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::schema::{AppConfig, ExecProc, ExitCodeMapping, ResponseStream, RouteConfig};

/// Command run by the command line route when none is given.
pub const DEFAULT_COMMAND: &str = "echo Your webcmd works!";

#[derive(Debug, Parser)]
#[command(name = "webcmd", version, about = "Map HTTP requests to command executions")]
pub struct Cli {
    /// Log at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable coloured log output.
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the server.
    Run(RunArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Config file (TOML or JSON). Defaults to ./server.toml if present.
    #[arg(short = 'c', long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// Load and check the configuration, then exit.
    #[arg(long)]
    pub dry_run: bool,

    /// Method of the command line route.
    #[arg(short, long)]
    pub method: Option<String>,

    /// Pattern of the command line route.
    #[arg(short, long)]
    pub route: Option<String>,

    /// Port to listen on.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host address to listen on.
    #[arg(long)]
    pub host: Option<String>,

    /// Command of the command line route.
    #[arg(last = true)]
    pub command: Vec<String>,
}

impl RunArgs {
    /// Merge the flags into a loaded configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            tracing::debug!(host = %host, "Host set from command line");
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            tracing::debug!(port, "Port set from command line");
            config.server.port = port;
        }

        let mut route = RouteConfig::default();
        route.status_codes.push(ExitCodeMapping {
            exit_code: None,
            status_code: 500,
            headers: HashMap::new(),
            response_stream: Some(ResponseStream::Empty),
        });

        let mut touched = false;
        if let Some(method) = &self.method {
            route.method = method.to_ascii_uppercase();
            touched = true;
        }
        if let Some(pattern) = &self.route {
            route.pattern = pattern.clone();
            touched = true;
        }
        let command = if self.command.is_empty() {
            DEFAULT_COMMAND.to_string()
        } else {
            touched = true;
            self.command.join(" ")
        };
        route.exec.proc = Some(command_line_proc(command));

        if config.routes.is_empty() || touched {
            tracing::debug!(route = %route.label(), "Adding command line route");
            config.routes.push(route);
        }
    }
}

/// Run `command` through the platform shell.
fn command_line_proc(command: String) -> ExecProc {
    if cfg!(windows) {
        ExecProc {
            path: "cmd".to_string(),
            args: vec!["/C".to_string(), command],
        }
    } else {
        ExecProc {
            path: "sh".to_string(),
            args: vec!["-c".to_string(), command],
        }
    }
}

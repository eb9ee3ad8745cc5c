//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::task::JoinHandle;
use webcmd::config::schema::{
    AppConfig, ExecProc, ExecShell, ExitCodeMapping, ResponseStream, RouteConfig, RouteExec,
};
use webcmd::http::{HttpServer, ServerError};
use webcmd::lifecycle::Shutdown;

/// A server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server to stop.
    pub async fn stop(self) -> Result<(), ServerError> {
        self.shutdown.trigger();
        self.handle.await.expect("server task panicked")
    }
}

/// Start webcmd with `config` on 127.0.0.1 and an ephemeral port.
pub async fn start_server(mut config: AppConfig) -> TestServer {
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;

    let listener = tokio::net::TcpListener::bind(config.server.bind_address())
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config);
    let rx = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, rx).await });

    TestServer {
        addr,
        shutdown,
        handle,
    }
}

/// A config whose shell pool uses `sh`.
pub fn config_with(routes: Vec<RouteConfig>) -> AppConfig {
    let mut config = AppConfig::default();
    config.modules.shell_pool.path = "sh".to_string();
    config.modules.shell_pool.args = vec!["-s".to_string()];
    config.routes = routes;
    config
}

/// A route running `script` with `sh -c`.
pub fn proc_route(method: &str, pattern: &str, script: &str) -> RouteConfig {
    RouteConfig {
        method: method.to_string(),
        pattern: pattern.to_string(),
        exec: RouteExec {
            proc: Some(ExecProc {
                path: "sh".to_string(),
                args: vec!["-c".to_string(), script.to_string()],
            }),
            shell: None,
        },
        ..Default::default()
    }
}

/// A route running `command` in a pooled shell.
pub fn shell_route(method: &str, pattern: &str, command: &str) -> RouteConfig {
    RouteConfig {
        method: method.to_string(),
        pattern: pattern.to_string(),
        exec: RouteExec {
            proc: None,
            shell: Some(ExecShell {
                command: command.to_string(),
            }),
        },
        ..Default::default()
    }
}

/// An exit code mapping without headers.
pub fn mapping(exit_code: Option<i32>, status_code: i64, stream: Option<ResponseStream>) -> ExitCodeMapping {
    ExitCodeMapping {
        exit_code,
        status_code,
        headers: HashMap::new(),
        response_stream: stream,
    }
}

/// A client that never reuses connections.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

//! Spawned OS processes and their captured output.
//!
//! # Responsibilities
//! - Spawn a process from a template with the configured environment policy
//! - Capture stdout, stderr and the combined stream while the process runs
//! - Feed and close stdin, wait for exit, kill on cancellation
//!
//! # Design Decisions
//! - One reader task per output pipe; the combined buffer keeps arrival order
//! - On unix every process leads its own process group; killing a handle
//!   kills the group, so commands started by a shell go down with it
//! - Processes that have not exited are killed when their handle is dropped
//! - A process killed by a signal reports exit code -1

use std::collections::HashMap;
use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};

use axum::body::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;

use crate::config::schema::{EnvironmentConfig, ResponseStream};

/// Exit code reported for processes terminated without one (e.g. by a signal).
pub const UNKNOWN_EXIT_CODE: i32 = -1;

/// Which variables of the server environment a process gets.
#[derive(Debug, Clone, Default)]
pub struct EnvPolicy {
    inherit: bool,
    allow: Vec<String>,
}

impl EnvPolicy {
    pub fn new(inherit: bool, allow: Vec<String>) -> Self {
        Self { inherit, allow }
    }

    fn apply(&self, command: &mut Command) {
        if self.inherit {
            return;
        }
        command.env_clear();
        for name in &self.allow {
            if let Some(value) = std::env::var_os(name) {
                command.env(name, value);
            }
        }
    }
}

impl From<&EnvironmentConfig> for EnvPolicy {
    fn from(config: &EnvironmentConfig) -> Self {
        Self::new(config.inherit, config.allow.clone())
    }
}

/// Everything needed to start a process.
#[derive(Debug, Clone)]
pub struct ProcessTemplate {
    pub program: String,
    pub args: Vec<String>,
    /// Keep stdin as a pipe; otherwise it is connected to the null device.
    pub open_stdin: bool,
    pub policy: EnvPolicy,
}

/// Output captured from a process.
#[derive(Debug, Default)]
struct OutputBuffers {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    combined: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
enum Pipe {
    Stdout,
    Stderr,
}

/// A running (or finished) process with its stdin and captured output.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    /// Process group led by the child.
    #[cfg(unix)]
    group: Option<u32>,
    exited: bool,
    stdin: Option<ChildStdin>,
    output: Arc<Mutex<OutputBuffers>>,
    readers: Vec<JoinHandle<()>>,
}

impl ProcessHandle {
    /// Start a process. `env` is added on top of the template's policy.
    pub fn spawn(template: &ProcessTemplate, env: &HashMap<String, String>) -> io::Result<Self> {
        let mut command = Command::new(&template.program);
        command
            .args(&template.args)
            .stdin(if template.open_stdin {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        template.policy.apply(&mut command);
        command.envs(env);

        let mut child = command.spawn()?;
        let stdin = child.stdin.take();
        let output = Arc::new(Mutex::new(OutputBuffers::default()));

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(capture(stdout, Pipe::Stdout, output.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(capture(stderr, Pipe::Stderr, output.clone())));
        }

        Ok(Self {
            #[cfg(unix)]
            group: child.id(),
            child,
            exited: false,
            stdin,
            output,
            readers,
        })
    }

    /// OS process id, if the process has not been reaped yet.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Whether stdin is still open.
    pub fn has_input(&self) -> bool {
        self.stdin.is_some()
    }

    /// Write bytes to stdin. Fails with `BrokenPipe` if stdin is closed.
    pub async fn write_input(&mut self, data: &[u8]) -> io::Result<()> {
        match self.stdin.as_mut() {
            Some(stdin) => stdin.write_all(data).await,
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdin is closed")),
        }
    }

    /// Close stdin, signalling end of input to the process.
    pub async fn close_input(&mut self) {
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }
    }

    /// Wait for the process to exit and its output to be fully captured.
    ///
    /// A non-zero exit code is a normal result; only a failure to wait is an error.
    pub async fn wait(&mut self) -> io::Result<i32> {
        self.close_input().await;
        let status = self.child.wait().await?;
        self.exited = true;
        for reader in self.readers.drain(..) {
            let _ = reader.await;
        }
        Ok(status.code().unwrap_or(UNKNOWN_EXIT_CODE))
    }

    /// Kill the process with its process group and reap it.
    pub async fn kill(&mut self) -> io::Result<()> {
        self.kill_group();
        let result = self.child.kill().await;
        self.exited = true;
        result
    }

    /// SIGKILL the process group. Only valid while the leader is unreaped,
    /// so the group id can not have been reused.
    #[cfg(unix)]
    fn kill_group(&self) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let Some(group) = self.group.filter(|_| !self.exited) else {
            return;
        };
        let Ok(raw) = i32::try_from(group) else {
            return;
        };
        if let Err(e) = killpg(Pid::from_raw(raw), Signal::SIGKILL) {
            tracing::debug!(error = %e, group, "Failed to kill process group");
        }
    }

    #[cfg(not(unix))]
    fn kill_group(&self) {}

    /// Captured stdout so far.
    pub fn stdout(&self) -> Bytes {
        Bytes::from(self.buffers().stdout.clone())
    }

    /// Captured stderr so far.
    pub fn stderr(&self) -> Bytes {
        Bytes::from(self.buffers().stderr.clone())
    }

    /// Captured stdout and stderr, interleaved in arrival order.
    pub fn combined(&self) -> Bytes {
        Bytes::from(self.buffers().combined.clone())
    }

    /// Response body for an output stream selector. `None` for [`ResponseStream::Empty`].
    pub fn body_for(&self, stream: ResponseStream) -> Option<Bytes> {
        match stream {
            ResponseStream::Stdout => Some(self.stdout()),
            ResponseStream::Stderr => Some(self.stderr()),
            ResponseStream::Empty => None,
            ResponseStream::Both => Some(self.combined()),
        }
    }

    fn buffers(&self) -> std::sync::MutexGuard<'_, OutputBuffers> {
        self.output.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.kill_group();
    }
}

/// Copy one output pipe into the shared buffers until EOF.
async fn capture<R>(mut reader: R, pipe: Pipe, output: Arc<Mutex<OutputBuffers>>)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 8192];
    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(error = %e, ?pipe, "Reading process output failed");
                break;
            }
        };

        let mut buffers = output.lock().unwrap_or_else(PoisonError::into_inner);
        let data = chunk.get(..n).unwrap_or_default();
        match pipe {
            Pipe::Stdout => buffers.stdout.extend_from_slice(data),
            Pipe::Stderr => buffers.stderr.extend_from_slice(data),
        }
        buffers.combined.extend_from_slice(data);
    }
}

//! Pool of pre-spawned shell processes.
//!
//! # Responsibilities
//! - Keep up to `Size` idle shells ready, stdin open
//! - Hand each shell out exactly once
//! - Replace every checked-out shell in the background
//!
//! # Design Decisions
//! - A semaphore counts ready shells, so waiting for one is fair-ish and
//!   cancellable without consuming anything
//! - Replenishment runs on a single background task fed through a channel;
//!   failed spawns are retried with exponential backoff
//! - `available + pending` never exceeds the capacity: the pending counter is
//!   decremented before a new shell becomes visible

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::execution::process::{ProcessHandle, ProcessTemplate};
use crate::execution::ExecError;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

const RETRY_BASE_MS: u64 = 100;
const RETRY_MAX_MS: u64 = 5_000;

/// State shared between the pool and its replenisher.
#[derive(Debug)]
struct PoolState {
    template: ProcessTemplate,
    capacity: usize,
    entries: Mutex<VecDeque<ProcessHandle>>,
    /// One permit per entry in `entries`.
    ready: Semaphore,
    /// Replacements requested but not yet in the pool.
    pending: AtomicUsize,
    /// Replacements requested by checkouts since startup.
    scheduled: AtomicUsize,
}

impl PoolState {
    fn push(&self, handle: ProcessHandle) {
        let available = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.push_back(handle);
            entries.len()
        };
        self.ready.add_permits(1);
        metrics::record_pool_available(available);
    }

    fn pop(&self) -> Option<ProcessHandle> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = entries.pop_front();
        metrics::record_pool_available(entries.len());
        handle
    }

    fn available(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// A bounded, self-replenishing store of single-use shells.
#[derive(Debug)]
pub struct ShellPool {
    state: Arc<PoolState>,
    requests: mpsc::UnboundedSender<()>,
    closed: CancellationToken,
}

impl ShellPool {
    /// Spawn `size` shells from `template` and start the replenisher.
    ///
    /// Shells that fail to start are handed to the replenisher, so the pool
    /// fills up as soon as spawning succeeds. Must be called within a Tokio runtime.
    pub fn new(template: ProcessTemplate, size: usize) -> Self {
        let capacity = size.max(1);
        let state = Arc::new(PoolState {
            template,
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            ready: Semaphore::new(0),
            pending: AtomicUsize::new(0),
            scheduled: AtomicUsize::new(0),
        });
        let (requests, rx) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();

        tokio::spawn(replenish(state.clone(), rx, closed.clone()));

        let pool = Self {
            state,
            requests,
            closed,
        };

        for _ in 0..capacity {
            match ProcessHandle::spawn(&pool.state.template, &HashMap::new()) {
                Ok(handle) => pool.state.push(handle),
                Err(e) => {
                    tracing::warn!(
                        shell = %pool.state.template.program,
                        error = %e,
                        "Failed to start pooled shell, retrying in background"
                    );
                    pool.request_replacement();
                }
            }
        }

        tracing::info!(
            shell = %pool.state.template.program,
            capacity,
            available = pool.available(),
            "Shell pool started"
        );

        pool
    }

    /// Check out a shell, waiting until one is ready or `cancel` fires.
    ///
    /// A cancelled take consumes nothing. Every successful take schedules
    /// exactly one replacement.
    pub async fn take(&self, cancel: &CancellationToken) -> Result<ProcessHandle, ExecError> {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExecError::Cancelled),
            permit = self.state.ready.acquire() => permit.map_err(|_| ExecError::PoolClosed)?,
        };
        permit.forget();

        let handle = self.state.pop().ok_or(ExecError::PoolClosed)?;
        self.state.scheduled.fetch_add(1, Ordering::SeqCst);
        self.request_replacement();
        metrics::record_pool_checkout();

        Ok(handle)
    }

    /// Stop replenishing, fail pending and future takes, and kill idle shells.
    pub fn close(&self) {
        self.closed.cancel();
        self.state.ready.close();
        self.state
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn capacity(&self) -> usize {
        self.state.capacity
    }

    /// Shells ready to be taken.
    pub fn available(&self) -> usize {
        self.state.available()
    }

    /// Replacements not yet in the pool.
    pub fn pending(&self) -> usize {
        self.state.pending.load(Ordering::SeqCst)
    }

    /// Replacements scheduled by checkouts since startup.
    pub fn replenishments_scheduled(&self) -> usize {
        self.state.scheduled.load(Ordering::SeqCst)
    }

    fn request_replacement(&self) {
        self.state.pending.fetch_add(1, Ordering::SeqCst);
        if self.requests.send(()).is_err() {
            tracing::debug!("Shell pool replenisher has stopped");
        }
    }
}

impl Drop for ShellPool {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

/// Background task: spawn one shell per request, retrying failures.
async fn replenish(
    state: Arc<PoolState>,
    mut requests: mpsc::UnboundedReceiver<()>,
    closed: CancellationToken,
) {
    loop {
        tokio::select! {
            request = requests.recv() => {
                if request.is_none() {
                    break;
                }
            }
            _ = closed.cancelled() => break,
        }

        let mut attempt = 0;
        loop {
            match ProcessHandle::spawn(&state.template, &HashMap::new()) {
                Ok(handle) => {
                    state.pending.fetch_sub(1, Ordering::SeqCst);
                    state.push(handle);
                    break;
                }
                Err(e) => {
                    attempt += 1;
                    let delay = calculate_backoff(attempt, RETRY_BASE_MS, RETRY_MAX_MS);
                    tracing::warn!(
                        shell = %state.template.program,
                        attempt,
                        delay = ?delay,
                        error = %e,
                        "Failed to spawn pooled shell"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = closed.cancelled() => return,
                    }
                }
            }
        }
    }

    tracing::debug!("Shell pool replenisher stopped");
}

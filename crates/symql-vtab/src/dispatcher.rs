//! Single-worker query dispatcher.
//!
//! All SQL runs on one dedicated thread that owns the connection and the
//! record sources behind it. Callers on any thread enqueue a job and get a
//! [`PendingQuery`] back; the worker pops jobs strictly in arrival order,
//! runs each to completion and answers on the job's oneshot channel.
//!
//! ```text
//!   HTTP handlers ─┐                      ┌──────────────────────────┐
//!   REPL thread  ──┼─► FIFO job queue ───►│ symql-query-worker       │
//!   one-shot CLI ──┘   (mutex + condvar)  │  QueryEngine + sources   │
//!          ▲                              └────────────┬─────────────┘
//!          └────────────── oneshot reply ──────────────┘
//! ```
//!
//! Every accepted job is answered exactly once: with its result, with
//! [`DispatchError::Internal`] if execution panicked, or with
//! [`DispatchError::ShutDown`] / [`DispatchError::WorkerGone`] if it could no
//! longer run.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt::Display;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::engine::{QueryResult, SqlExecutor};
use crate::error::DispatchError;
use crate::registry::TableInfo;

type Reply = Result<QueryResult, DispatchError>;

/// Dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Maximum queued (not yet running) jobs. `None` means unbounded.
    pub max_queue_depth: Option<usize>,
    /// Run jobs still queued at shutdown instead of failing them.
    pub drain_on_shutdown: bool,
    /// Name of the worker thread.
    pub thread_name: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_queue_depth: None,
            drain_on_shutdown: true,
            thread_name: "symql-query-worker".to_string(),
        }
    }
}

/// Counters reported by [`QueryDispatcher::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherStats {
    /// Jobs accepted into the queue.
    pub submitted: u64,
    /// Jobs that produced a `QueryResult` (successful or not).
    pub completed: u64,
    /// Accepted jobs answered with an error.
    pub failed: u64,
    /// Submissions refused (queue full or shut down).
    pub rejected: u64,
    /// Jobs currently waiting.
    pub queue_depth: usize,
}

struct Job {
    id: u64,
    sql: String,
    reply: oneshot::Sender<Reply>,
    enqueued_at: Instant,
}

#[derive(Default)]
struct Queue {
    jobs: VecDeque<Job>,
    stop: bool,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

struct Shared {
    queue: Mutex<Queue>,
    ready: Condvar,
    counters: Counters,
    next_id: AtomicU64,
}

impl Shared {
    fn fail_all(&self, jobs: impl IntoIterator<Item = Job>, err: DispatchError) {
        for job in jobs {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
            let _ = job.reply.send(Err(err.clone()));
        }
    }
}

/// Handle to a submitted job.
#[must_use = "a submitted query does nothing observable unless waited on"]
#[derive(Debug)]
pub struct PendingQuery {
    id: u64,
    rx: oneshot::Receiver<Reply>,
}

impl PendingQuery {
    /// Job id, unique per dispatcher.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Block the calling thread until the job resolves.
    ///
    /// Must not be called from inside an async runtime; use
    /// [`wait_async`](Self::wait_async) there.
    pub fn wait(self) -> Reply {
        self.rx.blocking_recv().map_err(|_| DispatchError::WorkerGone)?
    }

    /// Await the job's resolution.
    pub async fn wait_async(self) -> Reply {
        self.rx.await.map_err(|_| DispatchError::WorkerGone)?
    }
}

/// Serializes SQL execution onto one worker thread.
pub struct QueryDispatcher {
    shared: Arc<Shared>,
    config: DispatcherConfig,
    tables: Vec<TableInfo>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl QueryDispatcher {
    /// Spawn the worker and build its executor on it with `init`.
    ///
    /// Returns once `init` has finished. If it fails, the worker exits and
    /// the error is returned as [`DispatchError::Init`].
    pub fn start<E, F, InitErr>(config: DispatcherConfig, init: F) -> Result<Self, DispatchError>
    where
        E: SqlExecutor + 'static,
        F: FnOnce() -> Result<E, InitErr> + Send + 'static,
        InitErr: Display,
    {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue::default()),
            ready: Condvar::new(),
            counters: Counters::default(),
            next_id: AtomicU64::new(1),
        });
        let (ready_tx, ready_rx) = mpsc::channel::<Result<Vec<TableInfo>, String>>();

        let worker_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                let mut executor = match catch_unwind(AssertUnwindSafe(init)) {
                    Ok(Ok(executor)) => executor,
                    Ok(Err(e)) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                    Err(panic) => {
                        let _ = ready_tx.send(Err(panic_message(panic.as_ref())));
                        return;
                    }
                };
                if ready_tx.send(Ok(executor.tables())).is_err() {
                    return;
                }
                run_loop(&worker_shared, &mut executor);
            })
            .map_err(|e| DispatchError::Init(format!("Failed to spawn query worker thread: {}", e)))?;

        let tables = match ready_rx.recv() {
            Ok(Ok(tables)) => tables,
            Ok(Err(msg)) => {
                let _ = handle.join();
                error!(error = %msg, "Query worker initialization failed");
                return Err(DispatchError::Init(msg));
            }
            Err(_) => {
                let _ = handle.join();
                return Err(DispatchError::Init("query worker exited during startup".into()));
            }
        };

        info!(
            thread = %config.thread_name,
            max_queue_depth = ?config.max_queue_depth,
            tables = tables.len(),
            "Query dispatcher started"
        );

        Ok(Self {
            shared,
            config,
            tables,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Enqueue `sql` without waiting for it.
    pub fn submit(&self, sql: impl Into<String>) -> Result<PendingQuery, DispatchError> {
        let (tx, rx) = oneshot::channel();
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut queue = self.shared.queue.lock();
            if queue.stop {
                self.shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(DispatchError::ShutDown);
            }
            if let Some(max) = self.config.max_queue_depth {
                if queue.jobs.len() >= max {
                    self.shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
                    debug!(depth = queue.jobs.len(), "Query rejected, queue full");
                    return Err(DispatchError::QueueFull {
                        depth: queue.jobs.len(),
                    });
                }
            }
            queue.jobs.push_back(Job {
                id,
                sql: sql.into(),
                reply: tx,
                enqueued_at: Instant::now(),
            });
            self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
        }
        self.shared.ready.notify_one();
        Ok(PendingQuery { id, rx })
    }

    /// Submit and block until the result is available.
    pub fn execute(&self, sql: impl Into<String>) -> Reply {
        self.submit(sql)?.wait()
    }

    /// Submit and await the result.
    pub async fn execute_async(&self, sql: impl Into<String>) -> Reply {
        self.submit(sql)?.wait_async().await
    }

    /// Tables served by the executor, captured at startup.
    pub fn tables(&self) -> &[TableInfo] {
        &self.tables
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn stats(&self) -> DispatcherStats {
        let c = &self.shared.counters;
        DispatcherStats {
            submitted: c.submitted.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            queue_depth: self.shared.queue.lock().jobs.len(),
        }
    }

    /// Whether shutdown has begun.
    pub fn is_shut_down(&self) -> bool {
        self.shared.queue.lock().stop
    }

    /// Stop accepting jobs and join the worker.
    ///
    /// Queued jobs run first when `drain_on_shutdown` is set; otherwise they
    /// are answered with [`DispatchError::ShutDown`]. Safe to call repeatedly.
    pub fn shutdown(&self) {
        let dropped = {
            let mut queue = self.shared.queue.lock();
            queue.stop = true;
            if self.config.drain_on_shutdown {
                Vec::new()
            } else {
                queue.jobs.drain(..).collect::<Vec<_>>()
            }
        };
        if !dropped.is_empty() {
            info!(jobs = dropped.len(), "Failing queued queries at shutdown");
            self.shared.fail_all(dropped, DispatchError::ShutDown);
        }
        self.shared.ready.notify_all();

        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                error!("Query worker thread panicked");
            }
            info!("Query dispatcher stopped");
        }
    }
}

impl Drop for QueryDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for QueryDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryDispatcher")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Fails whatever is still queued if the worker leaves its loop for any
/// reason, including a panic outside job execution.
struct ExitGuard<'a>(&'a Shared);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        let leftover = {
            let mut queue = self.0.queue.lock();
            queue.stop = true;
            queue.jobs.drain(..).collect::<Vec<_>>()
        };
        if !leftover.is_empty() {
            warn!(jobs = leftover.len(), "Query worker exiting with queued jobs");
            self.0.fail_all(leftover, DispatchError::WorkerGone);
        }
    }
}

fn run_loop<E: SqlExecutor>(shared: &Shared, executor: &mut E) {
    let _guard = ExitGuard(shared);
    debug!("Query worker loop started");

    loop {
        let job = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(job) = queue.jobs.pop_front() {
                    break Some(job);
                }
                if queue.stop {
                    break None;
                }
                shared.ready.wait(&mut queue);
            }
        };
        let Some(job) = job else {
            break;
        };

        let queued_ms = job.enqueued_at.elapsed().as_millis() as u64;
        let reply = match catch_unwind(AssertUnwindSafe(|| executor.execute(&job.sql))) {
            Ok(result) => {
                shared.counters.completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    job = job.id,
                    queued_ms,
                    success = result.success,
                    rows = result.row_count,
                    "Query job finished"
                );
                Ok(result)
            }
            Err(panic) => {
                let msg = panic_message(panic.as_ref());
                shared.counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(job = job.id, error = %msg, "Query execution panicked");
                Err(DispatchError::Internal(msg))
            }
        };

        if job.reply.send(reply).is_err() {
            debug!(job = job.id, "Query caller went away before the result");
        }
    }

    debug!("Query worker loop exited");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

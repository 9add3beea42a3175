//! Single-writer operation queue.
//!
//! One dedicated thread owns the SQLite connection and drains a bounded
//! channel of operations in FIFO order, running each to completion before
//! taking the next. Callers hold a cloneable [`QueueHandle`]:
//!
//! - `submit` waits at most `enqueue_timeout` for a free slot, then fails
//!   with [`Error::QueueTimeout`] (the only backpressure in the system)
//! - each operation carries its own `oneshot` reply channel
//! - shutdown is a separate cancellation signal: the worker finishes the
//!   operation in flight, stops dequeuing and is joined before
//!   [`OperationQueue::shutdown`] returns

use rusqlite::{Connection, Transaction};
use std::panic::{self, AssertUnwindSafe};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::observability::metrics::{record_operation, record_queue_timeout};

/// Default bound on queued operations.
pub const DEFAULT_QUEUE_SIZE: usize = 256;

/// Default wait for a free queue slot.
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// A unit of store access. The reply channel lives inside the closure.
type Operation = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

/// Configuration for the operation queue.
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    /// Maximum number of operations waiting to be dequeued
    pub capacity: usize,
    /// Maximum time `submit` waits for a free slot
    pub enqueue_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_SIZE,
            enqueue_timeout: DEFAULT_ENQUEUE_TIMEOUT,
        }
    }
}

impl QueueConfig {
    /// Create a QueueConfig from application config values.
    pub fn from_config(queue_size: usize, enqueue_timeout_ms: u64) -> Self {
        Self {
            capacity: queue_size,
            enqueue_timeout: Duration::from_millis(enqueue_timeout_ms),
        }
    }
}

/// Owner of the store worker thread.
///
/// Dropping this without calling [`OperationQueue::shutdown`] detaches the
/// worker; it keeps serving handles until they are all gone.
pub struct OperationQueue {
    handle: QueueHandle,
    shutdown: CancellationToken,
    thread: JoinHandle<()>,
}

impl OperationQueue {
    /// Spawn the worker thread, handing it exclusive ownership of `conn`.
    ///
    /// A capacity of zero is raised to one.
    pub fn spawn(conn: Connection, config: QueueConfig) -> Result<Self> {
        let capacity = config.capacity.max(1);
        let (sender, receiver) = mpsc::channel::<Operation>(capacity);
        let shutdown = CancellationToken::new();

        let worker_shutdown = shutdown.clone();
        let thread = std::thread::Builder::new()
            .name("store-worker".into())
            .spawn(move || run_worker(conn, receiver, worker_shutdown))?;

        tracing::info!(
            capacity,
            enqueue_timeout_ms = config.enqueue_timeout.as_millis() as u64,
            "Store worker spawned"
        );

        Ok(Self {
            handle: QueueHandle {
                sender,
                enqueue_timeout: config.enqueue_timeout,
            },
            shutdown,
            thread,
        })
    }

    /// Get a handle for submitting operations.
    pub fn handle(&self) -> QueueHandle {
        self.handle.clone()
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// The operation currently executing runs to completion. Operations
    /// still queued are dropped and their submitters get
    /// [`Error::QueueClosed`].
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown.cancel();
        let thread = self.thread;
        tokio::task::spawn_blocking(move || thread.join())
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?
            .map_err(|_| Error::Io(std::io::Error::other("store worker panicked")))?;
        tracing::info!("Store worker stopped");
        Ok(())
    }
}

/// Cloneable submission side of the queue.
#[derive(Clone)]
pub struct QueueHandle {
    sender: mpsc::Sender<Operation>,
    enqueue_timeout: Duration,
}

impl QueueHandle {
    /// Run `action` on the worker and wait for its result.
    ///
    /// Fails with [`Error::QueueTimeout`] if no slot frees up within the
    /// enqueue timeout and [`Error::QueueClosed`] if the worker has stopped.
    /// Errors returned by `action` are passed through unchanged.
    pub async fn submit<T, F>(&self, action: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let start = Instant::now();
        let (reply_tx, reply_rx) = oneshot::channel();
        let operation: Operation = Box::new(move |conn| {
            // Receiver gone means the caller stopped waiting
            let _ = reply_tx.send(action(conn));
        });

        match tokio::time::timeout(self.enqueue_timeout, self.sender.send(operation)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                record_operation("closed", start.elapsed().as_secs_f64());
                return Err(Error::QueueClosed);
            }
            Err(_) => {
                record_queue_timeout();
                tracing::warn!(
                    timeout_ms = self.enqueue_timeout.as_millis() as u64,
                    "Store queue full, submission timed out"
                );
                return Err(Error::QueueTimeout(self.enqueue_timeout));
            }
        }

        let result = reply_rx.await.unwrap_or(Err(Error::QueueClosed));
        let outcome = if result.is_ok() { "ok" } else { "error" };
        record_operation(outcome, start.elapsed().as_secs_f64());
        result
    }

    /// Run `action` inside one transaction as a single queued operation.
    ///
    /// Commits when `action` returns `Ok`; any error rolls back every
    /// statement the action executed.
    pub async fn transaction<T, F>(&self, action: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(move |conn| {
            let tx = conn.transaction()?;
            let value = action(&tx)?;
            tx.commit()?;
            Ok(value)
        })
        .await
    }

    /// Number of operations queued but not yet taken by the worker.
    pub fn pending(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Whether the worker has stopped accepting operations.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

fn run_worker(
    mut conn: Connection,
    mut receiver: mpsc::Receiver<Operation>,
    shutdown: CancellationToken,
) {
    tracing::debug!("Store worker started");
    let mut executed: u64 = 0;

    loop {
        let next = futures::executor::block_on(async {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => None,
                operation = receiver.recv() => operation,
            }
        });

        let Some(operation) = next else {
            break;
        };

        // A panicking action drops its reply sender during unwinding, so
        // its caller sees QueueClosed while the worker keeps serving.
        if panic::catch_unwind(AssertUnwindSafe(|| operation(&mut conn))).is_err() {
            tracing::error!("Store operation panicked");
        }
        executed += 1;
    }

    receiver.close();
    let dropped = std::iter::from_fn(|| receiver.try_recv().ok()).count();
    tracing::debug!(executed, dropped, "Store worker exiting");
}

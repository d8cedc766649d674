//! Worker pool for job execution
//!
//! Manages a fixed set of worker threads with a bounded queue and a shutdown
//! that drains every accepted job before returning.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::job::{default_handler, Job, JobHandler, JobResult};

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerPoolConfig {
    /// Pool identifier used in logs and worker thread names
    pub pool_id: String,

    /// Number of worker threads, launched at construction
    pub workers: usize,

    /// Capacity of the job queue
    pub queue_capacity: usize,

    /// Upper bound for [`WorkerPool::shutdown`] (None = wait for full drain)
    #[serde(with = "option_duration_millis")]
    pub shutdown_timeout: Option<Duration>,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            pool_id: format!("pool-{}", Uuid::now_v7()),
            workers: 4,
            queue_capacity: 100,
            shutdown_timeout: None,
        }
    }
}

impl WorkerPoolConfig {
    /// Create a configuration with `workers` worker threads
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            ..Default::default()
        }
    }

    /// Set the pool ID
    pub fn with_pool_id(mut self, id: impl Into<String>) -> Self {
        self.pool_id = id.into();
        self
    }

    /// Set the number of workers
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the job queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Bound how long [`WorkerPool::shutdown`] waits for the drain
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), WorkerPoolError> {
        if self.workers == 0 {
            return Err(WorkerPoolError::InvalidConfig(
                "workers must be at least 1".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(WorkerPoolError::InvalidConfig(
                "queue_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Worker pool status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerPoolStatus {
    /// Accepting submissions
    Running,
    /// Queue closed to new jobs, workers finishing what is buffered
    Draining,
    /// All workers exited; results are final
    Stopped,
}

impl std::fmt::Display for WorkerPoolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Draining => write!(f, "draining"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Worker pool errors
#[derive(Debug, thiserror::Error)]
pub enum WorkerPoolError {
    /// Submission after shutdown began
    #[error("worker pool is shutting down")]
    ShuttingDown,

    /// Non-blocking submit found the queue full; the job is handed back
    #[error("job queue is full (job {})", .0.id)]
    QueueFull(Job),

    /// Bounded shutdown expired before the drain finished
    #[error("graceful shutdown timed out with {remaining_workers} workers still draining")]
    ShutdownTimeout { remaining_workers: usize },

    /// Invalid configuration
    #[error("invalid worker pool configuration: {0}")]
    InvalidConfig(String),

    /// The OS refused to start a worker thread
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl WorkerPoolError {
    /// Recover the job rejected by [`WorkerPool::try_submit`]
    pub fn into_job(self) -> Option<Job> {
        match self {
            Self::QueueFull(job) => Some(job),
            _ => None,
        }
    }
}

/// Keeps the live-worker count honest even if the handler panics
struct WorkerExitGuard {
    live: Arc<AtomicUsize>,
    // Dropped after `drop` runs, so waiters observe the decremented count
    _exited: Sender<()>,
}

impl WorkerExitGuard {
    fn new(live: Arc<AtomicUsize>, exited: Sender<()>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self {
            live,
            _exited: exited,
        }
    }
}

impl Drop for WorkerExitGuard {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Fixed-size pool of worker threads draining a bounded job queue
///
/// `submit` blocks while the queue is full. `shutdown` closes the queue to
/// new jobs, lets every worker keep pulling until the queue is empty and
/// closed, and returns once all workers have exited. After it returns,
/// `results()` holds exactly one entry per accepted job.
///
/// Submitting after shutdown began is reported as
/// [`WorkerPoolError::ShuttingDown`]; it never panics and is never silent.
///
/// # Example
///
/// ```
/// use synckit::worker::{Job, WorkerPool, WorkerPoolConfig};
///
/// let config = WorkerPoolConfig::new(2).with_queue_capacity(8);
/// let pool = WorkerPool::with_handler(config, |job: &Job| job.payload.to_uppercase())?;
///
/// pool.submit(Job::new(1, "alpha"))?;
/// pool.submit(Job::new(2, "beta"))?;
///
/// let mut results = pool.into_results()?;
/// results.sort_by_key(|r| r.job_id);
/// assert_eq!(results[0].output, "ALPHA");
/// # Ok::<(), synckit::worker::WorkerPoolError>(())
/// ```
pub struct WorkerPool {
    config: WorkerPoolConfig,
    status: RwLock<WorkerPoolStatus>,
    /// Producer side of the queue; `None` once draining began
    queue_tx: RwLock<Option<Sender<Job>>>,
    /// Held only to report queue depth
    queue_rx: Receiver<Job>,
    /// Dropped when draining begins; wakes submitters blocked on a full queue
    closing_tx: Mutex<Option<Sender<()>>>,
    closing_rx: Receiver<()>,
    /// Disconnects once every worker has exited
    exited_rx: Receiver<()>,
    live_workers: Arc<AtomicUsize>,
    results: Arc<Mutex<Vec<JobResult>>>,
    accepted: AtomicUsize,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown_lock: Mutex<()>,
}

impl WorkerPool {
    /// Launch `workers` workers with the default configuration and handler
    pub fn new(workers: usize) -> Result<Self, WorkerPoolError> {
        Self::with_config(WorkerPoolConfig::new(workers))
    }

    /// Launch a pool with the default handler
    pub fn with_config(config: WorkerPoolConfig) -> Result<Self, WorkerPoolError> {
        Self::start(config, default_handler())
    }

    /// Launch a pool that processes every job with `handler`
    pub fn with_handler<F>(config: WorkerPoolConfig, handler: F) -> Result<Self, WorkerPoolError>
    where
        F: Fn(&Job) -> String + Send + Sync + 'static,
    {
        Self::start(config, Arc::new(handler))
    }

    fn start(config: WorkerPoolConfig, handler: JobHandler) -> Result<Self, WorkerPoolError> {
        config.validate()?;

        let (queue_tx, queue_rx) = bounded(config.queue_capacity);
        let (closing_tx, closing_rx) = bounded(0);
        let (exited_tx, exited_rx) = bounded(0);

        info!(
            pool_id = %config.pool_id,
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "Starting worker pool"
        );

        let pool = Self {
            config,
            status: RwLock::new(WorkerPoolStatus::Running),
            queue_tx: RwLock::new(Some(queue_tx)),
            queue_rx,
            closing_tx: Mutex::new(Some(closing_tx)),
            closing_rx,
            exited_rx,
            live_workers: Arc::new(AtomicUsize::new(0)),
            results: Arc::new(Mutex::new(Vec::new())),
            accepted: AtomicUsize::new(0),
            workers: Mutex::new(Vec::new()),
            shutdown_lock: Mutex::new(()),
        };

        let spawned = (0..pool.config.workers).try_for_each(|index| {
            let handle = pool.spawn_worker(index, &handler, exited_tx.clone())?;
            pool.workers.lock().push(handle);
            Ok::<(), WorkerPoolError>(())
        });

        // Only workers may hold the exit channel, or the drain wait never ends
        drop(exited_tx);

        // On failure, dropping `pool` drains the workers that did start
        spawned?;
        Ok(pool)
    }

    fn spawn_worker(
        &self,
        index: usize,
        handler: &JobHandler,
        exited_tx: Sender<()>,
    ) -> std::io::Result<JoinHandle<()>> {
        let queue = self.queue_rx.clone();
        let results = Arc::clone(&self.results);
        let handler = Arc::clone(handler);
        let guard = WorkerExitGuard::new(Arc::clone(&self.live_workers), exited_tx);
        let pool_id = self.config.pool_id.clone();

        thread::Builder::new()
            .name(format!("{}-worker-{}", pool_id, index))
            .spawn(move || {
                let _guard = guard;
                debug!(%pool_id, worker = index, "Worker started");

                let mut processed = 0usize;
                // Ends only once the queue is empty and every sender is gone
                for job in queue.iter() {
                    let output = handler(&job);
                    results.lock().push(JobResult {
                        job_id: job.id,
                        output,
                    });
                    processed += 1;
                }

                debug!(%pool_id, worker = index, processed, "Worker exited");
            })
    }

    /// Enqueue a job, blocking while the queue is full
    ///
    /// A shutdown that begins while this call is blocked wakes it up with
    /// [`WorkerPoolError::ShuttingDown`]; the job is then not accepted.
    pub fn submit(&self, job: Job) -> Result<(), WorkerPoolError> {
        let sender = self.sender()?;

        select! {
            send(sender, job) -> res => match res {
                Ok(()) => {
                    self.accepted.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
                Err(_) => Err(WorkerPoolError::ShuttingDown),
            },
            recv(self.closing_rx) -> _ => Err(WorkerPoolError::ShuttingDown),
        }
    }

    /// Enqueue a job without blocking
    ///
    /// Returns [`WorkerPoolError::QueueFull`] carrying the job back when the
    /// queue has no room, so the caller may retry or drop it.
    pub fn try_submit(&self, job: Job) -> Result<(), WorkerPoolError> {
        let sender = self.sender()?;

        match sender.try_send(job) {
            Ok(()) => {
                self.accepted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(TrySendError::Full(job)) => Err(WorkerPoolError::QueueFull(job)),
            Err(TrySendError::Disconnected(_)) => Err(WorkerPoolError::ShuttingDown),
        }
    }

    fn sender(&self) -> Result<Sender<Job>, WorkerPoolError> {
        self.queue_tx
            .read()
            .as_ref()
            .cloned()
            .ok_or(WorkerPoolError::ShuttingDown)
    }

    /// Shut down gracefully, waiting for every accepted job to be processed
    ///
    /// Waits without limit unless the configuration sets a shutdown timeout.
    /// Calling it again after the pool stopped returns `Ok(())`.
    #[instrument(skip(self), fields(pool_id = %self.config.pool_id))]
    pub fn shutdown(&self) -> Result<(), WorkerPoolError> {
        let deadline = self.config.shutdown_timeout.map(|t| Instant::now() + t);
        self.shutdown_until(deadline)
    }

    /// Shut down gracefully, giving up after `timeout`
    ///
    /// On expiry the pool stays `Draining` and the workers keep going in the
    /// background; a later `shutdown` call completes the join.
    #[instrument(skip(self), fields(pool_id = %self.config.pool_id))]
    pub fn shutdown_timeout(&self, timeout: Duration) -> Result<(), WorkerPoolError> {
        // Fixed once and held across both the lock wait and the drain wait
        let deadline = Instant::now() + timeout;
        self.shutdown_until(Some(deadline))
    }

    fn shutdown_until(&self, deadline: Option<Instant>) -> Result<(), WorkerPoolError> {
        let _serialized = match deadline {
            Some(deadline) => self
                .shutdown_lock
                .try_lock_until(deadline)
                .ok_or_else(|| self.timeout_error())?,
            None => self.shutdown_lock.lock(),
        };

        if self.status() == WorkerPoolStatus::Stopped {
            return Ok(());
        }

        self.begin_drain();

        loop {
            let waited = match deadline {
                Some(deadline) => self
                    .exited_rx
                    .recv_timeout(deadline.saturating_duration_since(Instant::now())),
                None => self
                    .exited_rx
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };

            match waited {
                // Nothing is ever sent; only the disconnect matters
                Ok(()) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    let err = self.timeout_error();
                    warn!(
                        queued = self.queued(),
                        live_workers = self.live_workers(),
                        "Shutdown timeout reached"
                    );
                    return Err(err);
                }
            }
        }

        let handles = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            if handle.join().is_err() {
                error!("Worker thread panicked while processing a job");
            }
        }

        *self.status.write() = WorkerPoolStatus::Stopped;

        info!(
            accepted = self.accepted(),
            results = self.result_count(),
            "Worker pool stopped"
        );
        Ok(())
    }

    /// Close the producer side of the queue; the only signal workers get
    fn begin_drain(&self) {
        let mut status = self.status.write();
        if *status != WorkerPoolStatus::Running {
            return;
        }

        *status = WorkerPoolStatus::Draining;
        self.queue_tx.write().take();
        self.closing_tx.lock().take();

        debug!(queued = self.queued(), "Draining worker pool");
    }

    fn timeout_error(&self) -> WorkerPoolError {
        WorkerPoolError::ShutdownTimeout {
            remaining_workers: self.live_workers(),
        }
    }

    /// Shut down (without a time bound) and hand over the final results
    pub fn into_results(self) -> Result<Vec<JobResult>, WorkerPoolError> {
        self.shutdown_until(None)?;
        let results = std::mem::take(&mut *self.results.lock());
        Ok(results)
    }

    /// Snapshot of the results collected so far
    ///
    /// Complete and stable only once the pool is `Stopped`. Order across
    /// workers is unspecified.
    pub fn results(&self) -> Vec<JobResult> {
        self.results.lock().clone()
    }

    /// Number of results collected so far
    pub fn result_count(&self) -> usize {
        self.results.lock().len()
    }

    /// Number of jobs accepted into the queue
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Jobs waiting in the queue
    pub fn queued(&self) -> usize {
        self.queue_rx.len()
    }

    /// Worker threads that have not exited yet
    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::SeqCst)
    }

    /// Get current status
    pub fn status(&self) -> WorkerPoolStatus {
        *self.status.read()
    }

    /// Check if accepting jobs
    pub fn is_accepting(&self) -> bool {
        self.status() == WorkerPoolStatus::Running
    }

    /// Get the pool ID
    pub fn pool_id(&self) -> &str {
        &self.config.pool_id
    }

    /// Get the configuration
    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.status() == WorkerPoolStatus::Stopped {
            return;
        }
        debug!(pool_id = %self.config.pool_id, "Worker pool dropped before shutdown, draining");
        if let Err(e) = self.shutdown_until(None) {
            error!(pool_id = %self.config.pool_id, "Drain on drop failed: {}", e);
        }
    }
}

/// Serde support for Option<Duration> as milliseconds
mod option_duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => d.as_millis().serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis: Option<u64> = Option::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

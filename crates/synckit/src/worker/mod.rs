//! Bounded worker pool
//!
//! This module provides:
//! - [`WorkerPool`] - fixed set of worker threads draining a bounded queue
//! - [`WorkerPoolConfig`] - worker count, queue capacity, shutdown bound
//! - [`Job`] / [`JobResult`] - the unit of work and its output
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       WorkerPool                             │
//! │                                                              │
//! │  submit() ──► ┌───────────────────────────┐                  │
//! │               │  bounded job queue (100)  │                  │
//! │               └─────────────┬─────────────┘                  │
//! │                             │ MPMC                           │
//! │         ┌──────────┬────────┴───┬──────────┐                 │
//! │         ▼          ▼            ▼          ▼                 │
//! │    [worker 0] [worker 1]  ...  [worker N-1]                  │
//! │         │          │            │          │                 │
//! │         └──────────┴─────┬──────┴──────────┘                 │
//! │                          ▼                                   │
//! │               results (Mutex<Vec<JobResult>>)                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Shutdown protocol
//!
//! `Running --shutdown()--> Draining --queue empty & closed--> Stopped`
//!
//! Shutdown closes the producer side of the queue and nothing else. Workers
//! are never told to stop: each one keeps receiving until the queue reports
//! empty *and* closed, so every job accepted before the close is processed.
//!
//! # Example
//!
//! ```
//! use synckit::worker::{Job, WorkerPool};
//!
//! let pool = WorkerPool::new(4)?;
//! for i in 0..50 {
//!     pool.submit(Job::new(i, format!("job-{i}")))?;
//! }
//! pool.shutdown()?;
//!
//! assert_eq!(pool.results().len(), 50);
//! # Ok::<(), synckit::worker::WorkerPoolError>(())
//! ```

mod job;
mod pool;

pub use job::{default_handler, Job, JobHandler, JobId, JobResult};
pub use pool::{WorkerPool, WorkerPoolConfig, WorkerPoolError, WorkerPoolStatus};

//! # Synckit
//!
//! In-process concurrency primitives for coordinating work across OS threads.
//!
//! ## Features
//!
//! - **Concurrent map**: reader/writer-locked storage with snapshot iteration
//! - **Worker pool**: bounded job queue whose shutdown drains every accepted job
//! - **Pub/sub broker**: topic fan-out where publishing never blocks
//! - **Circuit breaker**: three-state failure isolation with lazy cooldown
//! - **Batch processor**: fixed-size batching with independently owned batches
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐ ┌──────────────┐ ┌──────────────┐ ┌──────────────┐
//! │ ConcurrentMap│ │  WorkerPool  │ │    Broker    │ │CircuitBreaker│
//! │   (RwLock)   │ │ (MPMC queue) │ │(try_send fan)│ │   (Mutex)    │
//! └──────────────┘ └──────────────┘ └──────────────┘ └──────────────┘
//! ```
//!
//! The primitives are independent. None holds one component's lock while
//! acquiring another's, so there is no cross-component lock ordering.
//!
//! ## Example
//!
//! ```
//! use synckit::prelude::*;
//! use std::time::Duration;
//!
//! let pool = WorkerPool::new(2)?;
//! let breaker = CircuitBreaker::new(
//!     CircuitBreakerConfig::new().with_reset_timeout(Duration::from_secs(5)),
//! );
//!
//! for i in 0..10 {
//!     let job = Job::new(i, format!("item-{i}"));
//!     breaker
//!         .execute(|| pool.submit(job))
//!         .expect("pool accepts while running");
//! }
//! pool.shutdown()?;
//!
//! assert_eq!(pool.result_count(), 10);
//! # Ok::<(), WorkerPoolError>(())
//! ```

pub mod batch;
pub mod map;
pub mod pubsub;
pub mod reliability;
pub mod worker;

/// Prelude for common imports
pub mod prelude {
    pub use crate::batch::{BatchError, BatchProcessor};
    pub use crate::map::ConcurrentMap;
    pub use crate::pubsub::{Broker, BrokerConfig, Message, PublishReport, Subscription};
    pub use crate::reliability::{
        BreakerCounters, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState,
    };
    pub use crate::worker::{
        Job, JobResult, WorkerPool, WorkerPoolConfig, WorkerPoolError, WorkerPoolStatus,
    };
}

// Re-export key types at crate root
pub use batch::{BatchError, BatchProcessor};
pub use map::ConcurrentMap;
pub use pubsub::{
    Broker, BrokerConfig, BrokerStats, Message, PublishReport, ReceiveError, Subscription,
    SubscriptionId,
};
pub use reliability::{
    BreakerCounters, BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError,
    CircuitPermit, CircuitState,
};
pub use worker::{
    Job, JobHandler, JobId, JobResult, WorkerPool, WorkerPoolConfig, WorkerPoolError,
    WorkerPoolStatus,
};

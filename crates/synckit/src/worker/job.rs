//! Units of work and their outputs

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Caller-assigned job identifier
pub type JobId = u64;

/// A unit of work handed to a [`WorkerPool`](super::WorkerPool)
///
/// Immutable once submitted. Ownership moves into the pool on a successful
/// submit and from there to whichever worker dequeues it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Opaque identifier, chosen by the submitter
    pub id: JobId,

    /// Opaque payload
    pub payload: String,
}

impl Job {
    /// Create a job
    pub fn new(id: JobId, payload: impl Into<String>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }
}

/// Output of processing one [`Job`]
///
/// Created exactly once per job by the worker that processed it, then
/// appended to the pool's result collection and never touched again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobResult {
    /// Identifier of the job this result belongs to
    pub job_id: JobId,

    /// Whatever the processing step returned
    pub output: String,
}

/// Processing step run by every worker
///
/// Processing is synchronous. A handler that panics takes its worker thread
/// down with it; the remaining workers keep draining the queue.
pub type JobHandler = Arc<dyn Fn(&Job) -> String + Send + Sync>;

/// Default processing step: prefixes the payload with `processed:`
pub fn default_handler() -> JobHandler {
    Arc::new(|job: &Job| format!("processed:{}", job.payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_handler() {
        let handler = default_handler();
        assert_eq!(handler(&Job::new(1, "alpha")), "processed:alpha");
    }

    #[test]
    fn test_job_serialization() {
        let job = Job::new(7, "payload");
        let json = serde_json::to_string(&job).unwrap();
        assert_eq!(json, r#"{"id":7,"payload":"payload"}"#);

        let parsed: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, job);
    }
}

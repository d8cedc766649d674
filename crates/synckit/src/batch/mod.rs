//! Batch accumulation
//!
//! [`BatchProcessor`] buffers items and hands them to a callback in
//! fixed-size batches. Each delivered batch is its own `Vec`; the buffer is
//! swapped out rather than truncated, so nothing added later can reach a
//! batch that was already delivered.

mod processor;

pub use processor::{BatchError, BatchProcessor};

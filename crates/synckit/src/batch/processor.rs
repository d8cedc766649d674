use std::mem;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors from batch processor operations
#[derive(Debug, Error)]
pub enum BatchError<T> {
    /// The processor was closed; the rejected item is handed back
    #[error("batch processor is closed")]
    Closed(T),
}

impl<T> BatchError<T> {
    /// Recover the rejected item
    pub fn into_item(self) -> T {
        match self {
            Self::Closed(item) => item,
        }
    }
}

type FlushCallback<T> = Box<dyn Fn(Vec<T>) + Send + Sync>;

struct Buffer<T> {
    items: Vec<T>,
    closed: bool,
}

/// Thread-safe accumulator that flushes in fixed-size batches
///
/// The callback runs on whichever thread triggered the flush, outside the
/// buffer lock. With several producers, batches may reach the callback in a
/// different order than they were cut.
///
/// # Example
///
/// ```
/// use synckit::BatchProcessor;
/// use std::sync::{Arc, Mutex};
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
/// let batches = BatchProcessor::new(2, move |batch: Vec<&str>| {
///     sink.lock().unwrap().push(batch);
/// });
///
/// batches.add("a").unwrap();
/// batches.add("b").unwrap();
/// batches.add("c").unwrap();
/// batches.flush();
///
/// assert_eq!(*seen.lock().unwrap(), vec![vec!["a", "b"], vec!["c"]]);
/// ```
pub struct BatchProcessor<T> {
    batch_size: usize,
    buffer: Mutex<Buffer<T>>,
    callback: FlushCallback<T>,
}

impl<T> BatchProcessor<T> {
    /// Create a processor; a `batch_size` of 0 is treated as 1
    pub fn new<F>(batch_size: usize, callback: F) -> Self
    where
        F: Fn(Vec<T>) + Send + Sync + 'static,
    {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            buffer: Mutex::new(Buffer {
                items: Vec::with_capacity(batch_size),
                closed: false,
            }),
            callback: Box::new(callback),
        }
    }

    /// Append an item, flushing if the buffer reached the batch size
    pub fn add(&self, item: T) -> Result<(), BatchError<T>> {
        let full = {
            let mut buffer = self.buffer.lock();
            if buffer.closed {
                return Err(BatchError::Closed(item));
            }

            buffer.items.push(item);
            if buffer.items.len() >= self.batch_size {
                Some(self.take(&mut buffer.items))
            } else {
                None
            }
        };

        if let Some(batch) = full {
            trace!(size = batch.len(), "batch full, flushing");
            (self.callback)(batch);
        }
        Ok(())
    }

    /// Flush whatever is buffered; no-op when empty
    ///
    /// Returns the number of items delivered.
    pub fn flush(&self) -> usize {
        let batch = {
            let mut buffer = self.buffer.lock();
            if buffer.items.is_empty() {
                return 0;
            }
            self.take(&mut buffer.items)
        };

        let size = batch.len();
        trace!(size, "flushing partial batch");
        (self.callback)(batch);
        size
    }

    /// Flush the remainder and reject further adds
    ///
    /// Returns the number of items in the final flush. Closing twice is a
    /// no-op.
    pub fn close(&self) -> usize {
        let batch = {
            let mut buffer = self.buffer.lock();
            if buffer.closed {
                return 0;
            }
            buffer.closed = true;
            mem::take(&mut buffer.items)
        };

        let size = batch.len();
        debug!(size, "batch processor closed");
        if size > 0 {
            (self.callback)(batch);
        }
        size
    }

    /// Items currently buffered
    pub fn buffer_len(&self) -> usize {
        self.buffer.lock().items.len()
    }

    /// Configured batch size
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns true once [`close`](Self::close) was called
    pub fn is_closed(&self) -> bool {
        self.buffer.lock().closed
    }

    fn take(&self, items: &mut Vec<T>) -> Vec<T> {
        mem::replace(items, Vec::with_capacity(self.batch_size))
    }
}

impl<T> std::fmt::Debug for BatchProcessor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchProcessor")
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Weak};
    use std::thread;

    type Batches<T> = Arc<Mutex<Vec<Vec<T>>>>;

    fn collecting<T: Send + 'static>(batch_size: usize) -> (BatchProcessor<T>, Batches<T>) {
        let batches: Batches<T> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&batches);
        let processor = BatchProcessor::new(batch_size, move |batch| sink.lock().push(batch));
        (processor, batches)
    }

    #[test]
    fn test_auto_flush_at_batch_size() {
        let (processor, batches) = collecting(3);

        processor.add("a").unwrap();
        processor.add("b").unwrap();
        assert!(batches.lock().is_empty());

        processor.add("c").unwrap();
        assert_eq!(*batches.lock(), vec![vec!["a", "b", "c"]]);
        assert_eq!(processor.buffer_len(), 0);
    }

    #[test]
    fn test_manual_flush() {
        let (processor, batches) = collecting(5);

        processor.add("x").unwrap();
        processor.add("y").unwrap();
        assert_eq!(processor.flush(), 2);

        assert_eq!(*batches.lock(), vec![vec!["x", "y"]]);
    }

    #[test]
    fn test_flush_empty_buffer_is_noop() {
        let (processor, batches) = collecting::<String>(3);
        assert_eq!(processor.flush(), 0);
        assert!(batches.lock().is_empty());
    }

    #[test]
    fn test_buffer_len_tracking() {
        let (processor, _batches) = collecting(3);
        assert_eq!(processor.buffer_len(), 0);

        processor.add(1).unwrap();
        assert_eq!(processor.buffer_len(), 1);
        processor.add(2).unwrap();
        assert_eq!(processor.buffer_len(), 2);
        processor.add(3).unwrap();
        assert_eq!(processor.buffer_len(), 0);
    }

    #[test]
    fn test_flushed_batches_are_independent() {
        let (processor, batches) = collecting(3);

        for item in ["a", "b", "c", "d", "e", "f"] {
            processor.add(item.to_string()).unwrap();
        }
        processor.add("g".to_string()).unwrap();
        processor.flush();

        let batches = batches.lock();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0], ["a", "b", "c"]);
        assert_eq!(batches[1], ["d", "e", "f"]);
        assert_eq!(batches[2], ["g"]);
    }

    #[test]
    fn test_close_flushes_and_rejects() {
        let (processor, batches) = collecting(10);

        processor.add(1).unwrap();
        processor.add(2).unwrap();
        assert_eq!(processor.close(), 2);
        assert!(processor.is_closed());
        assert_eq!(*batches.lock(), vec![vec![1, 2]]);

        let err = processor.add(3).unwrap_err();
        assert_eq!(err.to_string(), "batch processor is closed");
        assert_eq!(err.into_item(), 3);

        assert_eq!(processor.close(), 0);
        assert_eq!(batches.lock().len(), 1);
    }

    #[test]
    fn test_zero_batch_size_flushes_every_item() {
        let (processor, batches) = collecting(0);
        assert_eq!(processor.batch_size(), 1);

        processor.add('a').unwrap();
        processor.add('b').unwrap();
        assert_eq!(*batches.lock(), vec![vec!['a'], vec!['b']]);
    }

    #[test]
    fn test_callback_may_reenter() {
        let processor = Arc::new_cyclic(|weak: &Weak<BatchProcessor<u32>>| {
            let weak = weak.clone();
            BatchProcessor::new(2, move |batch: Vec<u32>| {
                if let Some(processor) = weak.upgrade() {
                    // Runs outside the buffer lock
                    assert!(processor.buffer_len() <= 2);
                }
                assert_eq!(batch.len(), 2);
            })
        });

        for i in 0..4 {
            processor.add(i).unwrap();
        }
    }

    #[test]
    fn test_concurrent_adds_lose_nothing() {
        let (processor, batches) = collecting(7);

        thread::scope(|s| {
            for t in 0..4u32 {
                let processor = &processor;
                s.spawn(move || {
                    for i in 0..100 {
                        processor.add(t * 1000 + i).unwrap();
                    }
                });
            }
        });
        processor.flush();

        let mut all: Vec<u32> = batches.lock().iter().flatten().copied().collect();
        all.sort_unstable();
        let mut expected: Vec<u32> = (0..4)
            .flat_map(|t| (0..100).map(move |i| t * 1000 + i))
            .collect();
        expected.sort_unstable();
        assert_eq!(all, expected);
        assert!(batches.lock().iter().all(|b| b.len() <= 7));
    }
}

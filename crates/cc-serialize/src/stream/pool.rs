use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::config::ParallelStreamConfig;
use super::failure::{FailureCell, StreamFailure};

/// Bounded pool of reusable byte buffers.
///
/// At most `max_chunks` buffers are ever allocated. Below 90% of that budget a
/// take allocates a fresh buffer; past it, returned buffers are reused first.
/// Once nothing can be allocated or reused, `take` waits up to the configured
/// timeout for a buffer to come back.
#[derive(Debug)]
pub struct BufferPool {
    chunk_size: usize,
    max_chunks: usize,
    reuse_threshold: usize,
    timeout: Duration,
    state: Mutex<PoolState>,
    returned: Condvar,
    failure: FailureCell,
}

#[derive(Debug, Default)]
struct PoolState {
    free: Vec<Vec<u8>>,
    allocated: usize,
}

impl BufferPool {
    pub fn new(config: &ParallelStreamConfig) -> Self {
        Self::with_timeout(config.chunk_size, config.max_chunks, config.writer_timeout())
    }

    pub fn with_timeout(chunk_size: usize, max_chunks: usize, timeout: Duration) -> Self {
        let chunk_size = chunk_size.max(1);
        let max_chunks = max_chunks.max(1);
        Self {
            chunk_size,
            max_chunks,
            reuse_threshold: max_chunks * 9 / 10,
            timeout,
            state: Mutex::new(PoolState::default()),
            returned: Condvar::new(),
            failure: FailureCell::new(),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Takes an empty buffer with capacity for one chunk.
    pub fn take(&self) -> Result<Vec<u8>, StreamFailure> {
        let deadline = Instant::now() + self.timeout;
        let mut state = self.state.lock();
        loop {
            self.failure.check()?;

            if state.allocated < self.reuse_threshold {
                state.allocated += 1;
                return Ok(Vec::with_capacity(self.chunk_size));
            }
            if let Some(buffer) = state.free.pop() {
                return Ok(buffer);
            }
            if state.allocated < self.max_chunks {
                state.allocated += 1;
                return Ok(Vec::with_capacity(self.chunk_size));
            }

            if self.returned.wait_until(&mut state, deadline).timed_out() && state.free.is_empty() {
                let failure = StreamFailure::Timeout {
                    waited: self.timeout,
                };
                tracing::warn!(max_chunks = self.max_chunks, "{failure}");
                // Picked up by the check at the top of the loop.
                if self.failure.set(failure) {
                    self.returned.notify_all();
                }
            }
        }
    }

    /// Returns a buffer to the pool. Its contents are discarded.
    pub fn give_back(&self, mut buffer: Vec<u8>) {
        buffer.clear();
        let mut state = self.state.lock();
        state.free.push(buffer);
        drop(state);
        self.returned.notify_one();
    }

    /// Records a sticky failure and wakes every waiting taker.
    pub fn fail(&self, failure: StreamFailure) {
        if self.failure.set(failure) {
            // Under the lock so a taker between its check and its wait cannot miss it.
            let _state = self.state.lock();
            self.returned.notify_all();
        }
    }

    pub fn failure(&self) -> Option<StreamFailure> {
        self.failure.get()
    }

    pub fn check(&self) -> Result<(), StreamFailure> {
        self.failure.check()
    }

    /// Buffers allocated so far, in use or free.
    pub fn allocated(&self) -> usize {
        self.state.lock().allocated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_allocates_up_to_budget() {
        let pool = BufferPool::with_timeout(16, 3, Duration::from_millis(10));
        let buffers: Vec<_> = (0..3).map(|_| pool.take().unwrap()).collect();
        assert!(buffers.iter().all(|b| b.is_empty() && b.capacity() >= 16));
        assert_eq!(pool.allocated(), 3);
    }

    #[test]
    fn test_reuses_returned_buffer_near_budget() {
        let pool = BufferPool::with_timeout(16, 10, Duration::from_millis(10));
        let buffers: Vec<_> = (0..9).map(|_| pool.take().unwrap()).collect();
        for buffer in buffers {
            pool.give_back(buffer);
        }
        pool.take().unwrap();
        assert_eq!(pool.allocated(), 9);
    }

    #[test]
    fn test_exhaustion_times_out_and_sticks() {
        let pool = BufferPool::with_timeout(16, 2, Duration::from_millis(50));
        let first = pool.take().unwrap();
        let _second = pool.take().unwrap();

        let started = Instant::now();
        let error = pool.take().unwrap_err();
        assert!(matches!(error, StreamFailure::Timeout { .. }));
        assert!(started.elapsed() >= Duration::from_millis(50));

        // Returning a buffer does not clear the failure.
        pool.give_back(first);
        assert!(matches!(pool.take(), Err(StreamFailure::Timeout { .. })));
    }

    #[test]
    fn test_waiting_taker_gets_returned_buffer() {
        let pool = Arc::new(BufferPool::with_timeout(16, 1, Duration::from_secs(10)));
        let mut held = pool.take().unwrap();
        held.extend_from_slice(b"stale");

        let taker = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.take())
        };
        thread::sleep(Duration::from_millis(20));
        pool.give_back(held);

        let buffer = taker.join().unwrap().unwrap();
        assert!(buffer.is_empty());
        assert_eq!(pool.allocated(), 1);
    }

    #[test]
    fn test_failure_wakes_waiting_taker() {
        let pool = Arc::new(BufferPool::with_timeout(16, 1, Duration::from_secs(10)));
        let _held = pool.take().unwrap();

        let taker = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.take())
        };
        thread::sleep(Duration::from_millis(20));
        pool.fail(StreamFailure::WriterPanicked);

        assert!(matches!(taker.join().unwrap(), Err(StreamFailure::WriterPanicked)));
    }
}

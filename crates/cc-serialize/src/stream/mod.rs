//! Parallel output stream.
//!
//! Moves the I/O of a large serialized stream off the producing thread: the
//! producer fills fixed-size buffers taken from a bounded [`BufferPool`] and
//! sends them over a bounded channel to one writer thread per stream.

mod config;
mod failure;
mod output;
mod pool;

pub use config::{
    ParallelStreamConfig, CHUNK_SIZE_ENV, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CHUNKS,
    DEFAULT_WRITER_TIMEOUT_SECONDS, MAX_CHUNKS_ENV, WRITER_TIMEOUT_ENV,
};
pub use failure::{FailureCell, StreamFailure};
pub use output::{Chunk, ParallelOutputStream};
pub use pool::BufferPool;

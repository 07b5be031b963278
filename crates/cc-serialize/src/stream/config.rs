use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CHUNK_SIZE: usize = 4096;
pub const DEFAULT_MAX_CHUNKS: usize = 4096;
pub const DEFAULT_WRITER_TIMEOUT_SECONDS: u64 = 30 * 60;

pub const CHUNK_SIZE_ENV: &str = "CC_CHUNK_SIZE";
pub const MAX_CHUNKS_ENV: &str = "CC_MAX_CHUNKS";
pub const WRITER_TIMEOUT_ENV: &str = "CC_WRITER_TIMEOUT_SECONDS";

/// Sizing of a [`ParallelOutputStream`](super::ParallelOutputStream).
///
/// The working set is at most `chunk_size * max_chunks` bytes (16 MiB by
/// default).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelStreamConfig {
    pub chunk_size: usize,
    pub max_chunks: usize,
    /// How long the producer waits for a buffer once the pool is exhausted.
    pub writer_timeout_seconds: u64,
}

impl Default for ParallelStreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_chunks: DEFAULT_MAX_CHUNKS,
            writer_timeout_seconds: DEFAULT_WRITER_TIMEOUT_SECONDS,
        }
    }
}

impl ParallelStreamConfig {
    /// Defaults overridden by `CC_CHUNK_SIZE`, `CC_MAX_CHUNKS` and
    /// `CC_WRITER_TIMEOUT_SECONDS`.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`. Values that do not parse as positive
    /// integers are ignored with a warning.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = positive(&lookup, CHUNK_SIZE_ENV) {
            self.chunk_size = value as usize;
        }
        if let Some(value) = positive(&lookup, MAX_CHUNKS_ENV) {
            self.max_chunks = value as usize;
        }
        if let Some(value) = positive(&lookup, WRITER_TIMEOUT_ENV) {
            self.writer_timeout_seconds = value;
        }
        self
    }

    pub fn writer_timeout(&self) -> Duration {
        Duration::from_secs(self.writer_timeout_seconds)
    }
}

fn positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            tracing::warn!(key, value = %raw, "ignoring invalid parallel stream setting");
            None
        }
    }
}

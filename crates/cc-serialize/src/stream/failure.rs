use std::io;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use thiserror::Error;

/// Why a parallel output stream stopped working.
#[derive(Debug, Clone, Error)]
pub enum StreamFailure {
    #[error("writer thread failed: {0}")]
    Io(Arc<io::Error>),

    #[error("timed out after {waited:?} waiting for a free buffer")]
    Timeout { waited: Duration },

    #[error("writer thread panicked")]
    WriterPanicked,

    #[error("writer thread is gone")]
    WriterGone,
}

impl From<StreamFailure> for io::Error {
    fn from(failure: StreamFailure) -> Self {
        let kind = match &failure {
            StreamFailure::Io(err) => err.kind(),
            StreamFailure::Timeout { .. } => io::ErrorKind::TimedOut,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, failure)
    }
}

/// One-shot failure slot shared by the producer and the writer thread.
///
/// The first recorded failure wins; every later check on either side sees it.
#[derive(Debug, Default)]
pub struct FailureCell {
    slot: OnceLock<StreamFailure>,
}

impl FailureCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `failure` unless one is already recorded. Returns whether it
    /// was recorded.
    pub fn set(&self, failure: StreamFailure) -> bool {
        self.slot.set(failure).is_ok()
    }

    pub fn get(&self) -> Option<StreamFailure> {
        self.slot.get().cloned()
    }

    pub fn check(&self) -> Result<(), StreamFailure> {
        match self.slot.get() {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_failure_wins() {
        let cell = FailureCell::new();
        assert!(cell.check().is_ok());
        assert!(cell.set(StreamFailure::WriterPanicked));
        assert!(!cell.set(StreamFailure::WriterGone));
        assert!(matches!(cell.get(), Some(StreamFailure::WriterPanicked)));
        assert!(matches!(cell.check(), Err(StreamFailure::WriterPanicked)));
    }

    #[test]
    fn test_io_error_kind_is_kept() {
        let failure = StreamFailure::Io(Arc::new(io::Error::new(io::ErrorKind::PermissionDenied, "nope")));
        let error: io::Error = failure.into();
        assert_eq!(error.kind(), io::ErrorKind::PermissionDenied);
    }
}

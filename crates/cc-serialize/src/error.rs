//! Error types for encoding and decoding.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::stream::StreamFailure;
use crate::trace::PropertyTrace;

pub type CodecResult<T> = Result<T, CodecError>;

/// Failure while encoding or decoding a value graph.
///
/// `Clone` so a failure can be recorded and reported more than once; I/O
/// errors are shared behind an `Arc`.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),

    /// The stream does not follow the expected layout.
    #[error("Malformed stream: {0}")]
    Format(String),

    #[error("Unexpected tag {tag} while reading {context}")]
    UnexpectedTag { tag: u8, context: &'static str },

    /// A value the codec cannot encode. Reported and skipped on write.
    #[error("{0}")]
    Unsupported(String),

    #[error("Could not load the value of {trace}")]
    PropertyLoad {
        trace: PropertyTrace,
        #[source]
        source: Box<CodecError>,
    },

    #[error(transparent)]
    Stream(#[from] StreamFailure),
}

impl CodecError {
    /// I/O and stream failures are never wrapped with property context.
    pub fn is_io(&self) -> bool {
        matches!(self, CodecError::Io(_) | CodecError::Stream(_))
    }
}

impl From<io::Error> for CodecError {
    fn from(err: io::Error) -> Self {
        CodecError::Io(Arc::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_load_message() {
        let error = CodecError::PropertyLoad {
            trace: PropertyTrace::root("graph").bean("Foo").field("bar"),
            source: Box::new(CodecError::Format("truncated".to_string())),
        };
        assert_eq!(
            error.to_string(),
            "Could not load the value of field `bar` of `Foo` bean found in graph"
        );
        assert!(!error.is_io());
    }

    #[test]
    fn test_io_conversion() {
        let error: CodecError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(error.is_io());
        let cloned = error.clone();
        assert_eq!(cloned.to_string(), "I/O error: eof");
    }
}

//! Configuration-cache serialization primitives.
//!
//! Binary encoding, property traces and problem reporting, identity tables for
//! shared references, and the parallel output stream used to write large cache
//! entries.

pub mod encoding;
pub mod error;
pub mod identities;
pub mod problems;
pub mod stream;
pub mod trace;

pub use encoding::{BinaryDecoder, BinaryEncoder, Decoder, Encoder};
pub use error::{CodecError, CodecResult};
pub use identities::{ReadIdentities, WriteIdentities};
pub use problems::{CollectedProblems, LoggingProblems, ProblemKind, ProblemsListener, PropertyProblem};
pub use stream::{ParallelOutputStream, ParallelStreamConfig, StreamFailure};
pub use trace::PropertyTrace;

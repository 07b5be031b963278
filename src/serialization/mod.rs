//! Configuration-cache entries: a bean graph written to a file.
//!
//! An entry is the magic bytes, the format version and the encoded root
//! value, with nothing after it. Writing goes through a
//! [`ParallelOutputStream`] so encoding and file I/O overlap.

mod context;

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use cc_serialize::{
    BinaryDecoder, BinaryEncoder, CodecError, Decoder, Encoder, ParallelOutputStream, ParallelStreamConfig,
    ProblemsListener, StreamFailure,
};
use thiserror::Error;

use crate::beans::{BeanStateCache, BeanValue, DefaultValueCodec, IgnoredFields, InstantiationScheme, TypeRegistry, ValueCodec};

pub use context::{ReadContext, WriteContext};

pub const MAGIC: &[u8; 4] = b"BLCC";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Stream(#[from] StreamFailure),

    #[error("Not a configuration cache entry (bad magic bytes)")]
    BadMagic,

    #[error("Unsupported cache format version {found} (expected {FORMAT_VERSION})")]
    UnsupportedVersion { found: u32 },

    #[error("Unexpected data after the root value")]
    TrailingData,
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Stores and loads bean graphs.
///
/// Relevant fields and per-type writers and readers are computed once and
/// reused by every store and load.
pub struct ConfigurationCache {
    registry: TypeRegistry,
    stream: ParallelStreamConfig,
    codec: Rc<dyn ValueCodec>,
    scheme: Option<Box<dyn InstantiationScheme>>,
    beans: RefCell<BeanStateCache>,
}

impl ConfigurationCache {
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            registry,
            stream: ParallelStreamConfig::default(),
            codec: Rc::new(DefaultValueCodec),
            scheme: None,
            beans: RefCell::new(BeanStateCache::default()),
        }
    }

    pub fn with_stream_config(mut self, stream: ParallelStreamConfig) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_ignored_fields(mut self, ignored: IgnoredFields) -> Self {
        self.beans = RefCell::new(BeanStateCache::new(ignored));
        self
    }

    pub fn with_codec(mut self, codec: Rc<dyn ValueCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_scheme(mut self, scheme: impl InstantiationScheme + 'static) -> Self {
        self.scheme = Some(Box::new(scheme));
        self
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn stream_config(&self) -> &ParallelStreamConfig {
        &self.stream
    }

    /// Writes `root` to `path`, replacing any existing file.
    pub fn store_graph(&self, path: &Path, root: &BeanValue, problems: &mut dyn ProblemsListener) -> CacheResult<()> {
        let target = path.to_path_buf();
        let stream = ParallelOutputStream::new(&self.stream, move || File::create(&target).map(BufWriter::new))
            .map_err(|source| CacheError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let mut encoder = BinaryEncoder::new(stream);
        let written = self.encode(&mut encoder, root, problems);
        let mut stream = encoder.into_inner();
        let closed = stream.close();

        // A failed writer thread surfaces as an I/O error on the producer
        // side; report the recorded failure instead.
        match (written, closed) {
            (_, Err(failure)) => Err(failure.into()),
            (Err(err), Ok(())) => Err(err),
            (Ok(()), Ok(())) => {
                tracing::debug!(path = %path.display(), "stored configuration cache entry");
                Ok(())
            }
        }
    }

    pub fn load_graph(&self, path: &Path, problems: &mut dyn ProblemsListener) -> CacheResult<BeanValue> {
        let file = File::open(path).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut decoder = BinaryDecoder::new(BufReader::new(file));
        let root = self.decode(&mut decoder, problems)?;
        if !decoder.at_end()? {
            return Err(CacheError::TrailingData);
        }
        tracing::debug!(path = %path.display(), "loaded configuration cache entry");
        Ok(root)
    }

    /// Encodes an entry into memory.
    pub fn encode_graph(&self, root: &BeanValue, problems: &mut dyn ProblemsListener) -> CacheResult<Vec<u8>> {
        let mut encoder = BinaryEncoder::new(Vec::new());
        self.encode(&mut encoder, root, problems)?;
        Ok(encoder.into_inner())
    }

    pub fn decode_graph(&self, bytes: &[u8], problems: &mut dyn ProblemsListener) -> CacheResult<BeanValue> {
        let mut decoder = BinaryDecoder::new(bytes);
        let root = self.decode(&mut decoder, problems)?;
        if !decoder.at_end()? {
            return Err(CacheError::TrailingData);
        }
        Ok(root)
    }

    fn encode(&self, encoder: &mut dyn Encoder, root: &BeanValue, problems: &mut dyn ProblemsListener) -> CacheResult<()> {
        encoder.write_bytes(MAGIC)?;
        encoder.write_small_int(FORMAT_VERSION)?;

        let mut beans = self.beans.borrow_mut();
        let mut ctx = WriteContext::new(encoder, Rc::clone(&self.codec), &mut beans, problems);
        ctx.write_root(root)?;
        Ok(())
    }

    fn decode(&self, decoder: &mut dyn Decoder, problems: &mut dyn ProblemsListener) -> CacheResult<BeanValue> {
        let mut magic = [0u8; 4];
        decoder.read_exact_bytes(&mut magic)?;
        if &magic != MAGIC {
            return Err(CacheError::BadMagic);
        }
        let found = decoder.read_small_int()?;
        if found != FORMAT_VERSION {
            return Err(CacheError::UnsupportedVersion { found });
        }

        let mut beans = self.beans.borrow_mut();
        let mut ctx = ReadContext::new(decoder, &self.registry, Rc::clone(&self.codec), &mut beans, problems)
            .with_scheme(self.scheme.as_deref());
        Ok(ctx.read_root()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beans::framework::{AbstractTask, DefaultTask};
    use crate::beans::{bean_ref, Bean};
    use cc_serialize::{CollectedProblems, ProblemKind};

    fn cache() -> ConfigurationCache {
        ConfigurationCache::new(TypeRegistry::with_framework_types())
    }

    #[test]
    fn test_scalar_root_round_trip() {
        let cache = cache();
        let mut problems = CollectedProblems::new();
        let root = BeanValue::List(vec![
            BeanValue::Int(-3),
            BeanValue::Long(1 << 40),
            BeanValue::String("text".into()),
            BeanValue::Null,
            BeanValue::Boolean(true),
        ]);
        let bytes = cache.encode_graph(&root, &mut problems).unwrap();
        assert_eq!(&bytes[..4], MAGIC);
        assert_eq!(cache.decode_graph(&bytes, &mut problems).unwrap(), root);
        assert!(problems.is_empty());
    }

    #[test]
    fn test_task_fields_round_trip() {
        let cache = cache();
        let mut problems = CollectedProblems::new();
        let mut task = DefaultTask::default();
        task.task.name = "compile".into();
        task.task.description = Some("Compiles sources".into());
        task.task.enabled = false;
        task.task.did_work = true;

        let bytes = cache.encode_graph(&BeanValue::Bean(bean_ref(task)), &mut problems).unwrap();
        let loaded = cache.decode_graph(&bytes, &mut problems).unwrap();
        let loaded = loaded.as_bean().unwrap().borrow();
        let part = loaded.declared_part(&crate::beans::framework::ABSTRACT_TASK).unwrap();
        let task = part.downcast_ref::<AbstractTask>().unwrap();

        assert_eq!(task.description.as_deref(), Some("Compiles sources"));
        assert!(!task.enabled);
        // Not relevant: left at the blank value.
        assert_eq!(task.name, "");
        assert!(!task.did_work);
        assert!(problems.is_empty());
    }

    #[test]
    fn test_opaque_root_is_an_error() {
        let cache = cache();
        let mut problems = CollectedProblems::new();
        let err = cache.encode_graph(&BeanValue::Opaque("Thread"), &mut problems).unwrap_err();
        assert!(matches!(err, CacheError::Codec(CodecError::Unsupported(_))));
    }

    #[test]
    fn test_header_checks() {
        let cache = cache();
        let mut problems = CollectedProblems::new();
        assert!(matches!(
            cache.decode_graph(b"XXXX\x01\x00", &mut problems),
            Err(CacheError::BadMagic)
        ));
        assert!(matches!(
            cache.decode_graph(b"BLCC\x07\x00", &mut problems),
            Err(CacheError::UnsupportedVersion { found: 7 })
        ));
        assert!(matches!(
            cache.decode_graph(b"BLCC\x01\x00\x00", &mut problems),
            Err(CacheError::TrailingData)
        ));
        assert!(matches!(
            cache.decode_graph(b"BLCC\x01\x7f", &mut problems),
            Err(CacheError::Codec(CodecError::UnexpectedTag { tag: 0x7f, .. }))
        ));
    }

    #[test]
    fn test_corrupt_string_length_is_an_error() {
        let cache = cache();
        let mut problems = CollectedProblems::new();
        let err = cache
            .decode_graph(b"BLCC\x01\x06\xff\xff\xff\xff\x0f", &mut problems)
            .unwrap_err();
        assert!(matches!(err, CacheError::Codec(ref e) if e.is_io()), "{err}");
    }

    #[test]
    fn test_unknown_bean_type_is_a_format_error() {
        let writer = cache();
        let mut problems = CollectedProblems::new();
        let bytes = writer
            .encode_graph(&BeanValue::Bean(bean_ref(DefaultTask::default())), &mut problems)
            .unwrap();

        let reader = ConfigurationCache::new(TypeRegistry::new());
        assert!(matches!(
            reader.decode_graph(&bytes, &mut problems),
            Err(CacheError::Codec(CodecError::Format(_)))
        ));
        assert!(!problems.problems().iter().any(|p| p.kind == ProblemKind::IncompatibleValue));
    }
}

//! Build logic evaluation and configuration-cache serialization
//!
//! The analysis side lowers declarative build scripts (parsed by
//! `dcl-language`) into a schema-agnostic document, resolves them against an
//! analysis schema and runs document checks. The serialization side persists
//! task bean graphs field by field, streaming the encoded bytes to disk
//! through `cc-serialize`.

pub mod analysis;
pub mod beans;
pub mod config;
pub mod dom;
pub mod serialization;

pub use analysis::{AnalysisSchema, AnalysisStepRunner, StageFailure, StepResult};
pub use beans::{Bean, BeanRef, BeanType, BeanValue, TypeRegistry};
pub use config::{EffectiveConfig, Settings};
pub use dom::{convert_block_to_document, Document, DocumentResult};
pub use serialization::{CacheError, ConfigurationCache};

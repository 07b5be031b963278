//! Declarative document built from a parsed script.

mod convert;
mod model;

pub use convert::{convert_block_to_document, DocumentResult, LanguageTreeMappings, SourceElement};
pub use model::{
    Document, DocumentError, DocumentNode, ElementNode, ErrorNode, LiteralNode, NodeId,
    PropertyNode, UnsupportedSyntaxCause, ValueFactoryNode, ValueId, ValueNode,
};

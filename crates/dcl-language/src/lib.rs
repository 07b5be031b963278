//! Declarative build-script language.
//!
//! Parses the restricted Kotlin-like DSL into a schema-agnostic language tree.
//! Unsupported constructs are reported instead of failing the whole parse, so
//! callers can lower the parts that are fine and surface the rest.

mod blocks;
mod lexer;
mod parser;
mod result;
mod source;
mod tree;

pub use blocks::{extract_top_level_block, BlockError, TopLevelBlock};
pub use parser::parse;
pub use result::{
    FailingResult, LanguageTreeResult, ParsingError, SingleFailure, UnsupportedConstruct,
    UnsupportedLanguageFeature,
};
pub use source::{Position, SourceData, SourceIdentifier};
pub use tree::{
    Assignment, Block, BlockElement, DataStatement, Expr, FunctionArgument, FunctionCall, Import,
    Literal, LiteralValue, LocalValue, PropertyAccess,
};

/// File extension of declarative build scripts.
pub const SCRIPT_EXTENSION: &str = "dcl";

//! Parse result and failure types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::source::SourceData;
use crate::tree::{Block, Import};

/// Everything the parser produced for one script.
///
/// Parsing never fails as a whole: whatever could not be understood is kept as
/// a [`FailingResult`] next to the statements that were understood.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageTreeResult {
    pub imports: Vec<Import>,
    pub top_level_block: Block,
    /// Failures in the package header and import list.
    pub header_failures: Vec<FailingResult>,
}

impl LanguageTreeResult {
    /// Failures found in the script body, including nested blocks.
    pub fn code_failures(&self) -> Vec<&FailingResult> {
        self.top_level_block.all_failures()
    }

    /// Header failures followed by code failures.
    pub fn all_failures(&self) -> Vec<&FailingResult> {
        self.header_failures
            .iter()
            .chain(self.code_failures())
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        !self.header_failures.is_empty() || !self.code_failures().is_empty()
    }
}

/// A statement (or header entry) that could not be turned into a tree element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailingResult {
    /// The span of the whole element the failures belong to.
    pub source: SourceData,
    pub failures: Vec<SingleFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SingleFailure {
    Parsing(ParsingError),
    Unsupported(UnsupportedConstruct),
}

impl SingleFailure {
    pub fn erroneous_source(&self) -> &SourceData {
        match self {
            SingleFailure::Parsing(error) => &error.erroneous_source,
            SingleFailure::Unsupported(construct) => &construct.erroneous_source,
        }
    }
}

impl fmt::Display for SingleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SingleFailure::Parsing(error) => write!(f, "{}", error.message),
            SingleFailure::Unsupported(construct) => {
                write!(f, "unsupported language feature: {}", construct.language_feature)
            }
        }
    }
}

/// Malformed input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsingError {
    pub potential_element_source: SourceData,
    pub erroneous_source: SourceData,
    pub message: String,
}

/// Well-formed input that uses a feature the language deliberately rejects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsupportedConstruct {
    pub potential_element_source: SourceData,
    pub erroneous_source: SourceData,
    pub language_feature: UnsupportedLanguageFeature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnsupportedLanguageFeature {
    PackageHeader,
    StarImport,
    RenamingImport,
    LocalVarNotSupported,
    ExplicitVariableType,
    UninitializedProperty,
    SafeNavigation,
    StringTemplates,
    Indexing,
    AnnotationUsage,
    ThisWithLabelQualifier,
    UnsupportedOperator,
    UnsupportedOperationInBinaryExpression,
    InfixFunctionCall,
    LambdaWithParameters,
    UnsignedType,
    FunctionDeclaration,
    TypeDeclaration,
}

impl fmt::Display for UnsupportedLanguageFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::PackageHeader => "package header",
            Self::StarImport => "star import",
            Self::RenamingImport => "renaming import",
            Self::LocalVarNotSupported => "local `var`",
            Self::ExplicitVariableType => "explicit variable type",
            Self::UninitializedProperty => "uninitialized local value",
            Self::SafeNavigation => "safe navigation",
            Self::StringTemplates => "string template",
            Self::Indexing => "indexing",
            Self::AnnotationUsage => "annotation",
            Self::ThisWithLabelQualifier => "labelled `this`",
            Self::UnsupportedOperator => "unsupported operator",
            Self::UnsupportedOperationInBinaryExpression => "binary expression",
            Self::InfixFunctionCall => "infix function call",
            Self::LambdaWithParameters => "lambda with parameters",
            Self::UnsignedType => "unsigned literal",
            Self::FunctionDeclaration => "function declaration",
            Self::TypeDeclaration => "type declaration",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_serialization() {
        let json = serde_json::to_string(&UnsupportedLanguageFeature::SafeNavigation).unwrap();
        assert_eq!(json, "\"SAFE_NAVIGATION\"");
    }

    #[test]
    fn test_feature_display() {
        assert_eq!(
            UnsupportedLanguageFeature::LocalVarNotSupported.to_string(),
            "local `var`"
        );
    }
}

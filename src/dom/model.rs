//! Document model.
//!
//! A [`Document`] owns every node and value in two arenas; nodes refer to
//! their children and values by index. Back-references into the language tree
//! are kept outside the document, in
//! [`LanguageTreeMappings`](super::LanguageTreeMappings).

use dcl_language::{LiteralValue, ParsingError, SourceData, UnsupportedConstruct};
use serde::Serialize;
use serde_json::{json, Value};

/// Index of a [`DocumentNode`] in its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Index of a [`ValueNode`] in its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ValueId(pub(crate) usize);

impl ValueId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentNode {
    Element(ElementNode),
    Property(PropertyNode),
    Error(ErrorNode),
}

impl DocumentNode {
    pub fn source(&self) -> &SourceData {
        match self {
            DocumentNode::Element(node) => &node.source,
            DocumentNode::Property(node) => &node.source,
            DocumentNode::Error(node) => &node.source,
        }
    }
}

/// `name(values...) { content }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementNode {
    pub name: String,
    pub source: SourceData,
    pub element_values: Vec<ValueId>,
    pub content: Vec<NodeId>,
}

/// `name = value`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyNode {
    pub name: String,
    pub source: SourceData,
    pub value: ValueId,
}

/// A statement that could not be lowered, with every reason found for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorNode {
    pub source: SourceData,
    pub errors: Vec<DocumentError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueNode {
    Literal(LiteralNode),
    ValueFactory(ValueFactoryNode),
}

impl ValueNode {
    pub fn source(&self) -> &SourceData {
        match self {
            ValueNode::Literal(node) => &node.source,
            ValueNode::ValueFactory(node) => &node.source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiteralNode {
    pub value: LiteralValue,
    pub source: SourceData,
}

/// `a.b.factory(values...)`; `factory_name` is the full dotted name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueFactoryNode {
    pub factory_name: String,
    pub values: Vec<ValueId>,
    pub source: SourceData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentError {
    SyntaxError {
        parsing_error: ParsingError,
    },
    UnsupportedConstruct {
        construct: UnsupportedConstruct,
    },
    UnsupportedSyntax {
        cause: UnsupportedSyntaxCause,
        source: SourceData,
    },
}

impl DocumentError {
    pub fn source(&self) -> &SourceData {
        match self {
            DocumentError::SyntaxError { parsing_error } => &parsing_error.erroneous_source,
            DocumentError::UnsupportedConstruct { construct } => &construct.erroneous_source,
            DocumentError::UnsupportedSyntax { source, .. } => source,
        }
    }

    pub fn message(&self) -> String {
        match self {
            DocumentError::SyntaxError { parsing_error } => {
                format!("syntax error: {}", parsing_error.message)
            }
            DocumentError::UnsupportedConstruct { construct } => {
                format!("unsupported language feature: {}", construct.language_feature)
            }
            DocumentError::UnsupportedSyntax { cause, .. } => {
                format!("unsupported syntax: {}", cause.message())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnsupportedSyntaxCause {
    AssignmentWithExplicitReceiver,
    ElementWithExplicitReceiver,
    ElementArgumentFormat,
    ElementMultipleLambdas,
    LocalVal,
    DanglingExpr,
    UnsupportedPropertyAccessValue,
    UnsupportedThisValue,
    UnsupportedNullValue,
    ValueFactoryCallWithComplexReceiver,
    ValueFactoryArgumentFormat,
}

impl UnsupportedSyntaxCause {
    pub fn message(self) -> &'static str {
        match self {
            Self::AssignmentWithExplicitReceiver => "assignment with explicit receiver",
            Self::ElementWithExplicitReceiver => "element with explicit receiver",
            Self::ElementArgumentFormat => "element arguments must be positional",
            Self::ElementMultipleLambdas => "element with more than one lambda",
            Self::LocalVal => "local value declaration",
            Self::DanglingExpr => "expression used as a statement",
            Self::UnsupportedPropertyAccessValue => "property access used as a value",
            Self::UnsupportedThisValue => "`this` used as a value",
            Self::UnsupportedNullValue => "`null` used as a value",
            Self::ValueFactoryCallWithComplexReceiver => {
                "value factory receiver is not a dotted name"
            }
            Self::ValueFactoryArgumentFormat => "value factory arguments must be positional",
        }
    }
}

/// Lowered script: top-level node ids plus the arenas they index into.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Document {
    pub(crate) nodes: Vec<DocumentNode>,
    pub(crate) values: Vec<ValueNode>,
    pub(crate) content: Vec<NodeId>,
}

impl Document {
    /// Ids of the top-level nodes, in source order.
    pub fn content(&self) -> &[NodeId] {
        &self.content
    }

    pub fn node(&self, id: NodeId) -> &DocumentNode {
        &self.nodes[id.0]
    }

    pub fn value(&self, id: ValueId) -> &ValueNode {
        &self.values[id.0]
    }

    pub fn top_level_nodes(&self) -> impl Iterator<Item = (NodeId, &DocumentNode)> {
        self.content.iter().map(|&id| (id, self.node(id)))
    }

    /// Every node, parents before children, in source order.
    pub fn walk(&self) -> Vec<(NodeId, &DocumentNode)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.content.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            if let DocumentNode::Element(element) = node {
                stack.extend(element.content.iter().rev().copied());
            }
            out.push((id, node));
        }
        out
    }

    pub fn error_nodes(&self) -> impl Iterator<Item = &ErrorNode> {
        self.nodes.iter().filter_map(|node| match node {
            DocumentNode::Error(error) => Some(error),
            _ => None,
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Nested JSON rendering for tooling, with children and values inlined.
    pub fn to_json(&self) -> Value {
        Value::Array(self.content.iter().map(|&id| self.node_json(id)).collect())
    }

    fn node_json(&self, id: NodeId) -> Value {
        match self.node(id) {
            DocumentNode::Element(element) => json!({
                "kind": "element",
                "name": element.name,
                "range": [element.source.start, element.source.end],
                "values": element.element_values.iter().map(|&v| self.value_json(v)).collect::<Vec<_>>(),
                "content": element.content.iter().map(|&c| self.node_json(c)).collect::<Vec<_>>(),
            }),
            DocumentNode::Property(property) => json!({
                "kind": "property",
                "name": property.name,
                "range": [property.source.start, property.source.end],
                "value": self.value_json(property.value),
            }),
            DocumentNode::Error(error) => json!({
                "kind": "error",
                "range": [error.source.start, error.source.end],
                "errors": error.errors.iter().map(|e| json!({
                    "message": e.message(),
                    "range": [e.source().start, e.source().end],
                })).collect::<Vec<_>>(),
            }),
        }
    }

    fn value_json(&self, id: ValueId) -> Value {
        match self.value(id) {
            ValueNode::Literal(literal) => json!({
                "kind": "literal",
                "value": literal.value.to_string(),
            }),
            ValueNode::ValueFactory(factory) => json!({
                "kind": "value_factory",
                "name": factory.factory_name,
                "values": factory.values.iter().map(|&v| self.value_json(v)).collect::<Vec<_>>(),
            }),
        }
    }
}

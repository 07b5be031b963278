//! Lowering of the language tree into a [`Document`].

use dcl_language::{
    Assignment, Block, BlockElement, DataStatement, Expr, FailingResult, FunctionArgument,
    FunctionCall, SingleFailure,
};

use super::model::{
    Document, DocumentError, DocumentNode, ElementNode, ErrorNode, LiteralNode, NodeId,
    PropertyNode, UnsupportedSyntaxCause, ValueFactoryNode, ValueId, ValueNode,
};

/// The language-tree element a document node was built from.
#[derive(Debug, Clone, Copy)]
pub enum SourceElement<'t> {
    Statement(&'t DataStatement),
    Failure(&'t FailingResult),
}

/// Back-references from document nodes and values to the tree they came
/// from. Every node and value of the document has exactly one entry.
#[derive(Debug, Default)]
pub struct LanguageTreeMappings<'t> {
    nodes: Vec<SourceElement<'t>>,
    values: Vec<&'t Expr>,
}

impl<'t> LanguageTreeMappings<'t> {
    pub fn source_of_node(&self, id: NodeId) -> SourceElement<'t> {
        self.nodes[id.0]
    }

    pub fn source_of_value(&self, id: ValueId) -> &'t Expr {
        self.values[id.0]
    }
}

#[derive(Debug)]
pub struct DocumentResult<'t> {
    pub document: Document,
    pub mappings: LanguageTreeMappings<'t>,
}

/// Lowers `block` (usually the top-level block of a script) into a document.
///
/// Never fails: statements that cannot be lowered become [`ErrorNode`]s
/// carrying every problem found in them.
pub fn convert_block_to_document(block: &Block) -> DocumentResult<'_> {
    let mut converter = Converter {
        document: Document::default(),
        mappings: LanguageTreeMappings::default(),
    };
    let content = converter.block_content(block);
    converter.document.content = content;
    tracing::debug!(
        nodes = converter.document.nodes.len(),
        values = converter.document.values.len(),
        "converted language tree to document"
    );
    DocumentResult {
        document: converter.document,
        mappings: converter.mappings,
    }
}

impl From<&SingleFailure> for DocumentError {
    fn from(failure: &SingleFailure) -> Self {
        match failure {
            SingleFailure::Parsing(error) => DocumentError::SyntaxError {
                parsing_error: error.clone(),
            },
            SingleFailure::Unsupported(construct) => DocumentError::UnsupportedConstruct {
                construct: construct.clone(),
            },
        }
    }
}

type Lowered<T> = Result<T, Vec<DocumentError>>;

struct Converter<'t> {
    document: Document,
    mappings: LanguageTreeMappings<'t>,
}

impl<'t> Converter<'t> {
    fn block_content(&mut self, block: &'t Block) -> Vec<NodeId> {
        block
            .content
            .iter()
            .map(|element| match element {
                BlockElement::Statement(statement) => self.statement(statement),
                BlockElement::Failure(failure) => {
                    let errors = failure.failures.iter().map(DocumentError::from).collect();
                    self.error_node(SourceElement::Failure(failure), errors)
                }
            })
            .collect()
    }

    fn statement(&mut self, statement: &'t DataStatement) -> NodeId {
        let checkpoint = self.document.values.len();
        let lowered = match statement {
            DataStatement::Assignment(assignment) => self.assignment(assignment),
            DataStatement::Expr(Expr::FunctionCall(call)) => self.element(call),
            DataStatement::LocalValue(local) => Err(vec![unsupported(
                UnsupportedSyntaxCause::LocalVal,
                &local.source,
            )]),
            DataStatement::Expr(expr) => Err(vec![unsupported(
                UnsupportedSyntaxCause::DanglingExpr,
                expr.source(),
            )]),
        };
        match lowered {
            Ok(node) => self.push_node(node, SourceElement::Statement(statement)),
            Err(errors) => {
                self.rollback_values(checkpoint);
                self.error_node(SourceElement::Statement(statement), errors)
            }
        }
    }

    fn assignment(&mut self, assignment: &'t Assignment) -> Lowered<DocumentNode> {
        let mut errors = Vec::new();
        if assignment.lhs.receiver.is_some() {
            errors.push(unsupported(
                UnsupportedSyntaxCause::AssignmentWithExplicitReceiver,
                &assignment.lhs.source,
            ));
        }
        let value = self.expr_to_value(&assignment.rhs);
        match value {
            Ok(value) if errors.is_empty() => Ok(DocumentNode::Property(PropertyNode {
                name: assignment.lhs.name.clone(),
                source: assignment.source.clone(),
                value,
            })),
            Ok(_) => Err(errors),
            Err(value_errors) => {
                errors.extend(value_errors);
                Err(errors)
            }
        }
    }

    /// Header problems (receiver, arguments, lambdas) are all collected before
    /// giving up; the lambda content is only lowered for a valid header.
    fn element(&mut self, call: &'t FunctionCall) -> Lowered<DocumentNode> {
        let mut errors = Vec::new();
        if call.receiver.is_some() {
            errors.push(unsupported(
                UnsupportedSyntaxCause::ElementWithExplicitReceiver,
                &call.source,
            ));
        }

        let lambdas: Vec<&'t Block> = call.lambdas().collect();
        if lambdas.len() > 1 {
            errors.push(unsupported(
                UnsupportedSyntaxCause::ElementMultipleLambdas,
                &call.source,
            ));
        }

        let mut element_values = Vec::new();
        for argument in &call.args {
            match argument {
                FunctionArgument::Positional { expr, .. } => match self.expr_to_value(expr) {
                    Ok(value) => element_values.push(value),
                    Err(value_errors) => errors.extend(value_errors),
                },
                FunctionArgument::Named { source, .. } => errors.push(unsupported(
                    UnsupportedSyntaxCause::ElementArgumentFormat,
                    source,
                )),
                FunctionArgument::Lambda { .. } => {}
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let content = match lambdas.first() {
            Some(block) => self.block_content(block),
            None => Vec::new(),
        };
        Ok(DocumentNode::Element(ElementNode {
            name: call.name.clone(),
            source: call.source.clone(),
            element_values,
            content,
        }))
    }

    fn expr_to_value(&mut self, expr: &'t Expr) -> Lowered<ValueId> {
        match expr {
            Expr::Literal(literal) => Ok(self.push_value(
                ValueNode::Literal(LiteralNode {
                    value: literal.value.clone(),
                    source: literal.source.clone(),
                }),
                expr,
            )),
            Expr::FunctionCall(call) => {
                let mut errors = Vec::new();
                let mut name_parts = match call.receiver.as_deref() {
                    None => Some(Vec::new()),
                    Some(Expr::PropertyAccess(access)) => access.as_dotted_names(),
                    Some(_) => None,
                }
                .unwrap_or_else(|| {
                    errors.push(unsupported(
                        UnsupportedSyntaxCause::ValueFactoryCallWithComplexReceiver,
                        &call.source,
                    ));
                    Vec::new()
                });

                let mut values = Vec::new();
                for argument in &call.args {
                    match argument {
                        FunctionArgument::Positional { expr, .. } => {
                            match self.expr_to_value(expr) {
                                Ok(value) => values.push(value),
                                Err(value_errors) => errors.extend(value_errors),
                            }
                        }
                        FunctionArgument::Named { source, .. }
                        | FunctionArgument::Lambda { source, .. } => errors.push(unsupported(
                            UnsupportedSyntaxCause::ValueFactoryArgumentFormat,
                            source,
                        )),
                    }
                }

                if !errors.is_empty() {
                    return Err(errors);
                }
                name_parts.push(call.name.clone());
                Ok(self.push_value(
                    ValueNode::ValueFactory(ValueFactoryNode {
                        factory_name: name_parts.join("."),
                        values,
                        source: call.source.clone(),
                    }),
                    expr,
                ))
            }
            Expr::PropertyAccess(access) => Err(vec![unsupported(
                UnsupportedSyntaxCause::UnsupportedPropertyAccessValue,
                &access.source,
            )]),
            Expr::This(source) => Err(vec![unsupported(
                UnsupportedSyntaxCause::UnsupportedThisValue,
                source,
            )]),
            Expr::Null(source) => Err(vec![unsupported(
                UnsupportedSyntaxCause::UnsupportedNullValue,
                source,
            )]),
        }
    }

    fn push_node(&mut self, node: DocumentNode, source: SourceElement<'t>) -> NodeId {
        let id = NodeId(self.document.nodes.len());
        self.document.nodes.push(node);
        self.mappings.nodes.push(source);
        id
    }

    fn push_value(&mut self, value: ValueNode, source: &'t Expr) -> ValueId {
        let id = ValueId(self.document.values.len());
        self.document.values.push(value);
        self.mappings.values.push(source);
        id
    }

    /// Drops values created for a construct that ended up as an error node.
    fn rollback_values(&mut self, checkpoint: usize) {
        self.document.values.truncate(checkpoint);
        self.mappings.values.truncate(checkpoint);
    }

    fn error_node(&mut self, source: SourceElement<'t>, errors: Vec<DocumentError>) -> NodeId {
        let span = match source {
            SourceElement::Statement(statement) => statement.source().clone(),
            SourceElement::Failure(failure) => failure.source.clone(),
        };
        self.push_node(
            DocumentNode::Error(ErrorNode {
                source: span,
                errors,
            }),
            source,
        )
    }
}

fn unsupported(cause: UnsupportedSyntaxCause, source: &dcl_language::SourceData) -> DocumentError {
    DocumentError::UnsupportedSyntax {
        cause,
        source: source.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcl_language::{parse, LiteralValue, SourceIdentifier};

    fn lower(text: &str) -> (dcl_language::LanguageTreeResult, Document) {
        let tree = parse(SourceIdentifier::new("test"), text);
        let document = convert_block_to_document(&tree.top_level_block).document;
        (tree, document)
    }

    fn causes(node: &DocumentNode) -> Vec<UnsupportedSyntaxCause> {
        match node {
            DocumentNode::Error(error) => error
                .errors
                .iter()
                .filter_map(|e| match e {
                    DocumentError::UnsupportedSyntax { cause, .. } => Some(*cause),
                    _ => None,
                })
                .collect(),
            other => panic!("expected an error node, got {other:?}"),
        }
    }

    #[test]
    fn test_assignment_and_element() {
        let (_, document) = lower("foo.bar = 1\nbaz(1, 2) { bar = 2 }");
        let top: Vec<_> = document.top_level_nodes().map(|(_, node)| node).collect();
        assert_eq!(top.len(), 2);
        assert_eq!(
            causes(top[0]),
            vec![UnsupportedSyntaxCause::AssignmentWithExplicitReceiver]
        );

        let DocumentNode::Element(element) = top[1] else {
            panic!("expected an element");
        };
        assert_eq!(element.name, "baz");
        let values: Vec<_> = element
            .element_values
            .iter()
            .map(|&v| match document.value(v) {
                ValueNode::Literal(literal) => literal.value.clone(),
                other => panic!("unexpected value {other:?}"),
            })
            .collect();
        assert_eq!(values, vec![LiteralValue::Int(1), LiteralValue::Int(2)]);

        assert_eq!(element.content.len(), 1);
        let DocumentNode::Property(property) = document.node(element.content[0]) else {
            panic!("expected a property");
        };
        assert_eq!(property.name, "bar");
        assert!(matches!(
            document.value(property.value),
            ValueNode::Literal(LiteralNode { value: LiteralValue::Int(2), .. })
        ));
    }

    #[test]
    fn test_value_factory() {
        let (_, document) = lower("x = a.b.file(\"f\", c(1))");
        let (_, node) = document.top_level_nodes().next().unwrap();
        let DocumentNode::Property(property) = node else {
            panic!("expected a property");
        };
        let ValueNode::ValueFactory(factory) = document.value(property.value) else {
            panic!("expected a value factory");
        };
        assert_eq!(factory.factory_name, "a.b.file");
        assert_eq!(factory.values.len(), 2);
        assert!(matches!(document.value(factory.values[1]), ValueNode::ValueFactory(inner) if inner.factory_name == "c"));
    }

    #[test]
    fn test_element_errors_are_collected_together() {
        let (_, document) = lower("a.f(x = 1, y) { } { }");
        let (_, node) = document.top_level_nodes().next().unwrap();
        assert_eq!(
            causes(node),
            vec![
                UnsupportedSyntaxCause::ElementWithExplicitReceiver,
                UnsupportedSyntaxCause::ElementMultipleLambdas,
                UnsupportedSyntaxCause::ElementArgumentFormat,
                UnsupportedSyntaxCause::UnsupportedPropertyAccessValue,
            ]
        );
    }

    #[test]
    fn test_failed_statements_leave_no_values() {
        let (_, document) = lower("f(1, 2, x)\ny = g(3, this)\nz = 4");
        assert_eq!(document.value_count(), 1);
        assert_eq!(document.error_nodes().count(), 2);
    }

    #[test]
    fn test_unsupported_statements() {
        let (_, document) = lower("val a = 1\nfoo\nx = null\ny = this\nz = f(g = 1)\nw = (a.b()).c(1)");
        let all: Vec<_> = document.top_level_nodes().map(|(_, n)| causes(n)).collect();
        assert_eq!(
            all,
            vec![
                vec![UnsupportedSyntaxCause::LocalVal],
                vec![UnsupportedSyntaxCause::DanglingExpr],
                vec![UnsupportedSyntaxCause::UnsupportedNullValue],
                vec![UnsupportedSyntaxCause::UnsupportedThisValue],
                vec![UnsupportedSyntaxCause::ValueFactoryArgumentFormat],
                vec![UnsupportedSyntaxCause::ValueFactoryCallWithComplexReceiver],
            ]
        );
    }

    #[test]
    fn test_language_tree_failures_become_error_nodes() {
        let (_, document) = lower("a = b?.c\nd = 1");
        let top: Vec<_> = document.top_level_nodes().map(|(_, node)| node).collect();
        let DocumentNode::Error(error) = top[0] else {
            panic!("expected an error node");
        };
        assert!(matches!(error.errors[0], DocumentError::UnsupportedConstruct { .. }));
        assert!(matches!(top[1], DocumentNode::Property(_)));
    }

    #[test]
    fn test_every_node_and_value_is_mapped() {
        let tree = parse(SourceIdentifier::new("test"), "a(1) {\n    b = c(2)\n    d(\"x\")\n}\ne = 3");
        let result = convert_block_to_document(&tree.top_level_block);
        let document = &result.document;

        for (id, node) in document.walk() {
            match result.mappings.source_of_node(id) {
                SourceElement::Statement(statement) => {
                    assert_eq!(statement.source(), node.source())
                }
                SourceElement::Failure(_) => panic!("no failures expected"),
            }
        }
        for index in 0..document.value_count() {
            let id = ValueId(index);
            assert_eq!(result.mappings.source_of_value(id).source(), document.value(id).source());
        }
        assert_eq!(document.walk().len(), document.node_count());
    }

    #[test]
    fn test_json_rendering() {
        let (_, document) = lower("baz(1) { bar = 2 }");
        let json = document.to_json();
        assert_eq!(json[0]["name"], "baz");
        assert_eq!(json[0]["values"][0]["value"], "1");
        assert_eq!(json[0]["content"][0]["name"], "bar");
    }
}

//! Script to document lowering, end to end.

use build_logic::dom::{convert_block_to_document, DocumentError, DocumentNode, SourceElement, ValueNode};
use dcl_language::{parse, LiteralValue, SourceIdentifier};
use proptest::prelude::*;

fn lower(text: &str) -> build_logic::Document {
    let tree = parse(SourceIdentifier::new("build.dcl"), text);
    convert_block_to_document(&tree.top_level_block).document
}

// =============================================================================
// Fixed scripts
// =============================================================================

#[test]
fn test_typical_script() {
    let document = lower(
        r#"
plugins {
    id("java-library")
}

version = "1.0"
buildNumber = 7L
group = layout.projectDirectory.file("group.txt")

dependencies {
    implementation("core") {
        transitive = false
    }
}
"#,
    );

    assert_eq!(document.error_nodes().count(), 0);
    let names: Vec<_> = document
        .top_level_nodes()
        .map(|(_, node)| match node {
            DocumentNode::Element(element) => element.name.clone(),
            DocumentNode::Property(property) => property.name.clone(),
            DocumentNode::Error(_) => unreachable!(),
        })
        .collect();
    assert_eq!(names, vec!["plugins", "version", "buildNumber", "group", "dependencies"]);

    let group = document
        .walk()
        .into_iter()
        .find_map(|(_, node)| match node {
            DocumentNode::Property(property) if property.name == "group" => Some(property.value),
            _ => None,
        })
        .unwrap();
    let ValueNode::ValueFactory(factory) = document.value(group) else {
        panic!("expected a value factory");
    };
    assert_eq!(factory.factory_name, "layout.projectDirectory.file");

    let json = document.to_json();
    assert_eq!(json[4]["content"][0]["content"][0]["name"], "transitive");
}

#[test]
fn test_errors_keep_their_position() {
    let document = lower("x = 1\ny = null\n");
    let errors: Vec<_> = document.error_nodes().collect();
    assert_eq!(errors.len(), 1);
    let error = &errors[0].errors[0];
    assert!(matches!(error, DocumentError::UnsupportedSyntax { .. }));
    assert_eq!(error.source().start_position.line, 2);
    assert!(!error.message().is_empty());
}

#[test]
fn test_failures_map_back_to_the_tree() {
    let tree = parse(SourceIdentifier::new("build.dcl"), "a = b?.c\nd = 1");
    let result = convert_block_to_document(&tree.top_level_block);
    let (first, _) = result.document.top_level_nodes().next().unwrap();
    assert!(matches!(result.mappings.source_of_node(first), SourceElement::Failure(_)));
}

// =============================================================================
// Generated scripts
// =============================================================================

#[derive(Debug, Clone)]
enum Value {
    Literal(LiteralValue),
    Factory(Vec<&'static str>, Vec<Value>),
}

#[derive(Debug, Clone)]
enum Statement {
    Assign(&'static str, Value),
    Element(&'static str, Vec<Value>, Option<Vec<Statement>>),
}

const NAMES: &[&str] = &["alpha", "beta", "gamma", "delta", "epsilon"];

fn name() -> impl Strategy<Value = &'static str> {
    prop::sample::select(NAMES)
}

fn literal() -> impl Strategy<Value = LiteralValue> {
    prop_oneof![
        (0..100_000i32).prop_map(LiteralValue::Int),
        (0..1_000_000i64).prop_map(LiteralValue::Long),
        any::<bool>().prop_map(LiteralValue::Boolean),
        "[a-z0-9 ]{0,8}".prop_map(LiteralValue::String),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    literal().prop_map(Value::Literal).prop_recursive(3, 12, 3, |inner| {
        (prop::collection::vec(name(), 1..3), prop::collection::vec(inner, 0..3))
            .prop_map(|(path, args)| Value::Factory(path, args))
    })
}

fn statement() -> impl Strategy<Value = Statement> {
    let leaf = (name(), value()).prop_map(|(name, value)| Statement::Assign(name, value));
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            (name(), value()).prop_map(|(name, value)| Statement::Assign(name, value)),
            (
                name(),
                prop::collection::vec(literal().prop_map(Value::Literal), 0..3),
                prop::option::of(prop::collection::vec(inner, 0..4)),
            )
                .prop_map(|(name, args, body)| Statement::Element(name, args, body)),
        ]
    })
}

fn render_value(value: &Value, out: &mut String) {
    match value {
        Value::Literal(literal) => out.push_str(&literal.to_string()),
        Value::Factory(path, args) => {
            out.push_str(&path.join("."));
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render_value(arg, out);
            }
            out.push(')');
        }
    }
}

fn render(statements: &[Statement], indent: usize, out: &mut String) {
    for statement in statements {
        out.push_str(&"    ".repeat(indent));
        match statement {
            Statement::Assign(name, value) => {
                out.push_str(name);
                out.push_str(" = ");
                render_value(value, out);
            }
            Statement::Element(name, args, body) => {
                out.push_str(name);
                out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    render_value(arg, out);
                }
                out.push(')');
                if let Some(body) = body {
                    out.push_str(" {\n");
                    render(body, indent + 1, out);
                    out.push_str(&"    ".repeat(indent));
                    out.push('}');
                }
            }
        }
        out.push('\n');
    }
}

fn count_statements(statements: &[Statement]) -> usize {
    statements
        .iter()
        .map(|statement| match statement {
            Statement::Assign(..) => 1,
            Statement::Element(_, _, body) => 1 + body.as_deref().map_or(0, count_statements),
        })
        .sum()
}

fn count_values(value: &Value) -> usize {
    match value {
        Value::Literal(_) => 1,
        Value::Factory(_, args) => 1 + args.iter().map(count_values).sum::<usize>(),
    }
}

fn count_all_values(statements: &[Statement]) -> usize {
    statements
        .iter()
        .map(|statement| match statement {
            Statement::Assign(_, value) => count_values(value),
            Statement::Element(_, args, body) => {
                args.iter().map(count_values).sum::<usize>() + body.as_deref().map_or(0, count_all_values)
            }
        })
        .sum()
}

proptest! {
    #[test]
    fn test_supported_scripts_lower_without_errors(statements in prop::collection::vec(statement(), 0..8)) {
        let mut text = String::new();
        render(&statements, 0, &mut text);

        let tree = parse(SourceIdentifier::new("build.dcl"), &text);
        let result = convert_block_to_document(&tree.top_level_block);
        let document = &result.document;

        prop_assert_eq!(document.error_nodes().count(), 0, "script:\n{}", text);
        prop_assert_eq!(document.content().len(), statements.len());
        prop_assert_eq!(document.node_count(), count_statements(&statements));
        prop_assert_eq!(document.value_count(), count_all_values(&statements));
        prop_assert_eq!(document.walk().len(), document.node_count());

        for (id, node) in document.walk() {
            match result.mappings.source_of_node(id) {
                SourceElement::Statement(statement) => prop_assert_eq!(statement.source(), node.source()),
                SourceElement::Failure(_) => prop_assert!(false, "unexpected failure mapping"),
            }
        }
    }
}

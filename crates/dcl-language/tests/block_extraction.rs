//! Top-level block extraction over generated scripts.

use dcl_language::{extract_top_level_block, parse, BlockError, SourceIdentifier};
use proptest::prelude::*;

/// Statements that may surround or fill a block; some contain braces hidden
/// in strings and comments.
fn statement() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,6}".prop_map(|name| format!("{name} = 1")),
        "[a-z]{1,6}".prop_map(|name| format!("{name}(\"{{\")")),
        "[a-z]{1,6}".prop_map(|name| format!("// {name} }}")),
        "[a-z]{1,6}".prop_map(|name| format!("/* {{ {name} */")),
        "[a-z]{1,6}".prop_map(|name| format!("{name} {{\n    nested {{ x = \"}}\" }}\n}}")),
    ]
}

fn lines(count: usize) -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(statement(), 0..count)
}

proptest! {
    #[test]
    fn test_block_range_reproduces_block_text(before in lines(4), inside in lines(4), after in lines(4)) {
        let block = format!("buildscript {{\n{}\n}}", inside.join("\n"));
        let script = format!("{}\n{}\n{}\n", before.join("\n"), block, after.join("\n"));

        let found = extract_top_level_block(&script, "buildscript").unwrap().unwrap();
        prop_assert_eq!(found.text(&script), block.as_str());
        prop_assert_eq!(found.body_text(&script), format!("\n{}\n", inside.join("\n")));
    }

    #[test]
    fn test_repeated_block_is_rejected(between in lines(3)) {
        let script = format!("plugins {{ }}\n{}\nplugins {{ id(\"a\") }}\n", between.join("\n"));
        let result = extract_top_level_block(&script, "plugins");
        let is_unexpected_block = matches!(result, Err(BlockError::UnexpectedBlock { first: 0, .. }));
        prop_assert!(is_unexpected_block);
    }
}

#[test]
fn test_extracted_body_parses() {
    let script = "plugins {\n    id(\"java\")\n    id(\"application\")\n}\n\napplication {\n    mainClass = \"a.b.Main\"\n}\n";
    let block = extract_top_level_block(script, "plugins").unwrap().unwrap();
    let tree = parse(SourceIdentifier::new("plugins"), block.body_text(script));
    assert!(!tree.has_failures());
    assert_eq!(tree.top_level_block.statements().count(), 2);
}

//! Locating a named top-level block (`plugins { ... }`) without a full parse.

use std::ops::Range;

use thiserror::Error;

use crate::lexer::{tokenize, Token, TokenKind};

/// A `name { ... }` block found at the top level of a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopLevelBlock {
    /// From the first byte of the identifier through the closing brace.
    pub range: Range<usize>,
    /// Between the braces, exclusive of both.
    pub body: Range<usize>,
}

impl TopLevelBlock {
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.range.clone()]
    }

    pub fn body_text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.body.clone()]
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockError {
    #[error("Unexpected `{name}` block at offset {second}; only one is allowed (first at offset {first})")]
    UnexpectedBlock {
        name: String,
        first: usize,
        second: usize,
    },

    #[error("The `{name}` block starting at offset {start} is not closed")]
    Unterminated { name: String, start: usize },
}

/// Finds the single top-level block called `name`.
///
/// Returns `Ok(None)` when there is no such block. Braces inside strings and
/// comments are ignored.
pub fn extract_top_level_block(text: &str, name: &str) -> Result<Option<TopLevelBlock>, BlockError> {
    let tokens = tokenize(text);
    let mut found: Option<TopLevelBlock> = None;
    let mut depth = 0usize;
    let mut at_statement_start = true;
    let mut index = 0;

    while index < tokens.len() {
        let token = &tokens[index];
        match &token.kind {
            TokenKind::Identifier(identifier)
                if depth == 0
                    && at_statement_start
                    && identifier == name
                    && matches!(tokens.get(index + 1).map(|t| &t.kind), Some(TokenKind::LBrace)) =>
            {
                let (block, next) = match_block(&tokens, index, name)?;
                if let Some(first) = &found {
                    return Err(BlockError::UnexpectedBlock {
                        name: name.to_string(),
                        first: first.range.start,
                        second: block.range.start,
                    });
                }
                found = Some(block);
                index = next;
                at_statement_start = false;
                continue;
            }
            TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => depth += 1,
            TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket => {
                depth = depth.saturating_sub(1)
            }
            TokenKind::Eof => break,
            _ => {}
        }
        at_statement_start = matches!(
            token.kind,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::RBrace
        );
        index += 1;
    }

    Ok(found)
}

/// Matches the braces of the block whose identifier is at `tokens[start]`.
/// Returns the block and the index of the token after its closing brace.
fn match_block(tokens: &[Token], start: usize, name: &str) -> Result<(TopLevelBlock, usize), BlockError> {
    let open = &tokens[start + 1];
    let mut depth = 0usize;
    for (offset, token) in tokens[start + 1..].iter().enumerate() {
        match token.kind {
            TokenKind::LBrace => depth += 1,
            TokenKind::RBrace => {
                depth -= 1;
                if depth == 0 {
                    let block = TopLevelBlock {
                        range: tokens[start].start..token.end,
                        body: open.end..token.start,
                    };
                    return Ok((block, start + 1 + offset + 1));
                }
            }
            _ => {}
        }
    }
    Err(BlockError::Unterminated {
        name: name.to_string(),
        start: tokens[start].start,
    })
}

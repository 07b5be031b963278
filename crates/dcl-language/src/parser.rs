//! Recursive-descent parser producing a [`LanguageTreeResult`].
//!
//! Unsupported but well-formed constructs are recorded and parsing carries on,
//! so one statement can report several problems at once. Malformed input
//! aborts the current statement; the parser then skips to the next statement
//! boundary and continues.

use std::mem;

use crate::lexer::{tokenize, NumberToken, Token, TokenKind};
use crate::result::{
    FailingResult, LanguageTreeResult, ParsingError, SingleFailure, UnsupportedConstruct,
    UnsupportedLanguageFeature,
};
use crate::source::{LineIndex, SourceData, SourceIdentifier};
use crate::tree::{
    Assignment, Block, BlockElement, DataStatement, Expr, FunctionArgument, FunctionCall, Import,
    Literal, LiteralValue, LocalValue, PropertyAccess,
};

/// Keywords that start a declaration the language does not support.
const TYPE_DECLARATION_KEYWORDS: &[&str] = &["class", "interface", "object", "typealias", "enum"];

/// Parse a script into a language tree.
///
/// Never fails: problems are reported through the returned result.
pub fn parse(identifier: SourceIdentifier, text: &str) -> LanguageTreeResult {
    let mut parser = Parser {
        text,
        tokens: tokenize(text),
        pos: 0,
        last_end: 0,
        identifier,
        lines: LineIndex::new(text),
        pending: Vec::new(),
    };
    parser.script()
}

type ParseResult<T> = Result<T, ParsingError>;

struct Parser<'t> {
    text: &'t str,
    tokens: Vec<Token>,
    pos: usize,
    /// End offset of the last consumed token.
    last_end: usize,
    identifier: SourceIdentifier,
    lines: LineIndex,
    /// Unsupported constructs found in the statement being parsed.
    pending: Vec<SingleFailure>,
}

impl<'t> Parser<'t> {
    // === Token access ===

    fn peek(&self) -> &Token {
        // The token list always ends with Eof and `pos` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_nth_kind(&self, n: usize) -> &TokenKind {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
            self.last_end = token.end;
        }
        token
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek_kind(), TokenKind::Identifier(name) if name == keyword)
    }

    fn skip_newlines(&mut self) {
        while self.at(&TokenKind::Newline) {
            self.advance();
        }
    }

    /// Whether the next non-newline token is one of `kinds`.
    fn next_significant_is(&self, kinds: &[TokenKind]) -> bool {
        let mut index = self.pos;
        while index < self.tokens.len() && self.tokens[index].kind == TokenKind::Newline {
            index += 1;
        }
        index < self.tokens.len() && kinds.contains(&self.tokens[index].kind)
    }

    fn expect(&mut self, kind: TokenKind, what: &str, element_start: usize) -> ParseResult<Token> {
        if *self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.error_at_current(element_start, format!("Expecting {what}")))
        }
    }

    fn expect_identifier(&mut self, element_start: usize) -> ParseResult<(String, Token)> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => Ok((name, self.advance())),
            _ => Err(self.error_at_current(element_start, "Expecting a name".to_string())),
        }
    }

    // === Source data and failures ===

    fn span(&self, start: usize, end: usize) -> SourceData {
        SourceData {
            identifier: self.identifier.clone(),
            start,
            end,
            start_position: self.lines.position(self.text, start),
            end_position: self.lines.position(self.text, end),
        }
    }

    fn span_to_last(&self, start: usize) -> SourceData {
        self.span(start, self.last_end.max(start))
    }

    fn error_at_current(&self, element_start: usize, message: String) -> ParsingError {
        let token = self.peek();
        let message = match &token.kind {
            TokenKind::Error(cause) => format!("{message}. {cause}"),
            _ => message,
        };
        ParsingError {
            potential_element_source: self.span(element_start, token.end.max(element_start)),
            erroneous_source: self.span(token.start, token.end),
            message,
        }
    }

    fn unsupported(
        &mut self,
        element_start: usize,
        erroneous: SourceData,
        feature: UnsupportedLanguageFeature,
    ) {
        let potential_element_source = self.span(element_start, erroneous.end.max(element_start));
        self.pending
            .push(SingleFailure::Unsupported(UnsupportedConstruct {
                potential_element_source,
                erroneous_source: erroneous,
                language_feature: feature,
            }));
    }

    // === Script structure ===

    fn script(&mut self) -> LanguageTreeResult {
        let mut header_failures = Vec::new();
        let mut imports = Vec::new();

        self.skip_separators();
        if self.at_keyword("package") {
            let start = self.peek().start;
            self.advance();
            self.skip_to_statement_end();
            let source = self.span_to_last(start);
            header_failures.push(FailingResult {
                source: source.clone(),
                failures: vec![SingleFailure::Unsupported(UnsupportedConstruct {
                    potential_element_source: source.clone(),
                    erroneous_source: source,
                    language_feature: UnsupportedLanguageFeature::PackageHeader,
                })],
            });
            self.skip_separators();
        }

        while self.at_keyword("import") {
            match self.import() {
                Ok(import) => imports.push(import),
                Err(failure) => header_failures.push(failure),
            }
            self.skip_separators();
        }

        let start = self.peek().start;
        let content = self.block_content(false);
        let end = self.text.len();
        LanguageTreeResult {
            imports,
            top_level_block: Block {
                content,
                source: self.span(start.min(end), end),
            },
            header_failures,
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Semicolon) {
            self.advance();
        }
    }

    fn import(&mut self) -> Result<Import, FailingResult> {
        let start = self.peek().start;
        self.advance();
        let outer = mem::take(&mut self.pending);

        let parsed = self.import_name(start);
        let failures = mem::replace(&mut self.pending, outer);
        match parsed {
            Ok(name_parts) if failures.is_empty() => Ok(Import {
                name_parts,
                source: self.span_to_last(start),
            }),
            Ok(_) => Err(FailingResult {
                source: self.span_to_last(start),
                failures,
            }),
            Err(error) => {
                self.skip_to_statement_end();
                let mut failures = failures;
                failures.push(SingleFailure::Parsing(error));
                Err(FailingResult {
                    source: self.span_to_last(start),
                    failures,
                })
            }
        }
    }

    fn import_name(&mut self, start: usize) -> ParseResult<Vec<String>> {
        let (first, _) = self.expect_identifier(start)?;
        let mut parts = vec![first];
        while self.at(&TokenKind::Dot) {
            self.advance();
            if matches!(self.peek_kind(), TokenKind::Operator(op) if op == "*") {
                let star = self.advance();
                let erroneous = self.span(star.start, star.end);
                self.unsupported(start, erroneous, UnsupportedLanguageFeature::StarImport);
                return Ok(parts);
            }
            let (name, _) = self.expect_identifier(start)?;
            parts.push(name);
        }
        if self.at_keyword("as") {
            let alias_start = self.peek().start;
            self.advance();
            self.expect_identifier(start)?;
            let erroneous = self.span_to_last(alias_start);
            self.unsupported(start, erroneous, UnsupportedLanguageFeature::RenamingImport);
        }
        Ok(parts)
    }

    /// Parses statements up to the closing brace (inside a lambda) or the end
    /// of input. The closing brace itself is not consumed.
    fn block_content(&mut self, in_lambda: bool) -> Vec<BlockElement> {
        let mut content = Vec::new();
        loop {
            self.skip_separators();
            match self.peek_kind() {
                TokenKind::Eof => return content,
                TokenKind::RBrace if in_lambda => return content,
                TokenKind::RBrace => {
                    let token = self.advance();
                    let source = self.span(token.start, token.end);
                    content.push(BlockElement::Failure(FailingResult {
                        source: source.clone(),
                        failures: vec![SingleFailure::Parsing(ParsingError {
                            potential_element_source: source.clone(),
                            erroneous_source: source,
                            message: "Unexpected '}'".to_string(),
                        })],
                    }));
                }
                _ => content.push(self.statement_element()),
            }
        }
    }

    fn statement_element(&mut self) -> BlockElement {
        let start = self.peek().start;
        let outer = mem::take(&mut self.pending);

        let parsed = self.statement(start).and_then(|statement| {
            if self.at_statement_end() {
                Ok(statement)
            } else {
                Err(self.error_at_current(
                    start,
                    "Unexpected tokens (use ';' to separate statements on the same line)"
                        .to_string(),
                ))
            }
        });

        let mut failures = mem::replace(&mut self.pending, outer);
        match parsed {
            Ok(Some(statement)) if failures.is_empty() => BlockElement::Statement(statement),
            Ok(_) => BlockElement::Failure(FailingResult {
                source: self.span_to_last(start),
                failures,
            }),
            Err(error) => {
                self.skip_to_statement_end();
                failures.push(SingleFailure::Parsing(error));
                BlockElement::Failure(FailingResult {
                    source: self.span_to_last(start),
                    failures,
                })
            }
        }
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
        )
    }

    /// Skips to the next newline or `;` outside of brackets, or to a `}` that
    /// closes the enclosing block.
    fn skip_to_statement_end(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek_kind() {
                TokenKind::Eof => return,
                TokenKind::Newline | TokenKind::Semicolon if depth == 0 => return,
                TokenKind::RBrace if depth == 0 => return,
                TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket => {
                    depth = depth.saturating_sub(1)
                }
                _ => {}
            }
            self.advance();
        }
    }

    // === Statements ===

    /// Returns `Ok(None)` when the statement was consumed but is unsupported
    /// as a whole (its failures are pending).
    fn statement(&mut self, start: usize) -> ParseResult<Option<DataStatement>> {
        if self.at(&TokenKind::At) {
            self.annotation(start)?;
            self.skip_newlines();
        }

        match self.peek_kind().clone() {
            TokenKind::Identifier(keyword) if keyword == "val" || keyword == "var" => {
                let keyword_token = self.advance();
                if keyword == "var" {
                    let erroneous = self.span(keyword_token.start, keyword_token.end);
                    self.unsupported(start, erroneous, UnsupportedLanguageFeature::LocalVarNotSupported);
                }
                self.local_value(start).map(Some)
            }
            TokenKind::Identifier(keyword) if keyword == "fun" => {
                self.unsupported_declaration(start, UnsupportedLanguageFeature::FunctionDeclaration);
                Ok(None)
            }
            TokenKind::Identifier(keyword)
                if TYPE_DECLARATION_KEYWORDS.contains(&keyword.as_str())
                    && matches!(self.peek_nth_kind(1), TokenKind::Identifier(_)) =>
            {
                self.unsupported_declaration(start, UnsupportedLanguageFeature::TypeDeclaration);
                Ok(None)
            }
            _ => self.expression_statement(start).map(Some),
        }
    }

    fn annotation(&mut self, start: usize) -> ParseResult<()> {
        let at = self.advance();
        self.expect_identifier(start)?;
        while self.at(&TokenKind::Dot) {
            self.advance();
            self.expect_identifier(start)?;
        }
        if self.at(&TokenKind::LParen) {
            self.value_arguments(start)?;
        }
        let erroneous = self.span_to_last(at.start);
        self.unsupported(start, erroneous, UnsupportedLanguageFeature::AnnotationUsage);
        Ok(())
    }

    fn unsupported_declaration(&mut self, start: usize, feature: UnsupportedLanguageFeature) {
        self.advance();
        self.skip_to_statement_end();
        let erroneous = self.span_to_last(start);
        self.unsupported(start, erroneous, feature);
    }

    fn local_value(&mut self, start: usize) -> ParseResult<DataStatement> {
        let (name, _) = self.expect_identifier(start)?;

        if self.at(&TokenKind::Colon) {
            let colon = self.advance();
            self.type_reference(start)?;
            let erroneous = self.span_to_last(colon.start);
            self.unsupported(start, erroneous, UnsupportedLanguageFeature::ExplicitVariableType);
        }

        if !self.at(&TokenKind::Eq) {
            let erroneous = self.span_to_last(start);
            self.unsupported(start, erroneous, UnsupportedLanguageFeature::UninitializedProperty);
            let source = self.span_to_last(start);
            return Ok(DataStatement::LocalValue(LocalValue {
                name,
                rhs: Expr::Null(source.clone()),
                source,
            }));
        }
        self.advance();
        self.skip_newlines();

        let rhs = self.expression(start)?;
        Ok(DataStatement::LocalValue(LocalValue {
            name,
            rhs,
            source: self.span_to_last(start),
        }))
    }

    fn type_reference(&mut self, start: usize) -> ParseResult<()> {
        self.expect_identifier(start)?;
        while self.at(&TokenKind::Dot) {
            self.advance();
            self.expect_identifier(start)?;
        }
        if matches!(self.peek_kind(), TokenKind::Operator(op) if op == "<") {
            let mut depth = 0usize;
            loop {
                match self.peek_kind() {
                    TokenKind::Operator(op) if op == "<" => depth += 1,
                    TokenKind::Operator(op) if op == ">" => depth -= 1,
                    TokenKind::Eof | TokenKind::Newline => {
                        return Err(self.error_at_current(start, "Unclosed type arguments".to_string()))
                    }
                    _ => {}
                }
                self.advance();
                if depth == 0 {
                    break;
                }
            }
        }
        if matches!(self.peek_kind(), TokenKind::Operator(op) if op == "?") {
            self.advance();
        }
        Ok(())
    }

    fn expression_statement(&mut self, start: usize) -> ParseResult<DataStatement> {
        let lhs = self.unary(start)?;

        if self.at(&TokenKind::Eq) {
            let lhs = match lhs {
                Expr::PropertyAccess(access) => access,
                other => {
                    return Err(ParsingError {
                        potential_element_source: self.span_to_last(start),
                        erroneous_source: other.source().clone(),
                        message: "Expecting a property as the assignment target".to_string(),
                    })
                }
            };
            self.advance();
            self.skip_newlines();
            let rhs = self.expression(start)?;
            return Ok(DataStatement::Assignment(Assignment {
                lhs,
                rhs,
                source: self.span_to_last(start),
            }));
        }

        let expr = self.binary_tail(start, lhs)?;
        Ok(DataStatement::Expr(expr))
    }

    // === Expressions ===

    fn expression(&mut self, start: usize) -> ParseResult<Expr> {
        let lhs = self.unary(start)?;
        self.binary_tail(start, lhs)
    }

    /// Consumes binary and infix operations after `lhs`, reporting each as an
    /// unsupported construct. The left operand is kept as the result.
    fn binary_tail(&mut self, start: usize, lhs: Expr) -> ParseResult<Expr> {
        loop {
            let feature = match self.peek_kind() {
                TokenKind::Operator(_) | TokenKind::Minus => {
                    UnsupportedLanguageFeature::UnsupportedOperationInBinaryExpression
                }
                TokenKind::Identifier(_) => UnsupportedLanguageFeature::InfixFunctionCall,
                _ => return Ok(lhs),
            };
            let operator = self.advance();
            self.skip_newlines();
            let rhs = self.unary(start)?;
            let erroneous = self.span(lhs.source().start, rhs.source().end.max(operator.end));
            self.unsupported(start, erroneous, feature);
        }
    }

    fn unary(&mut self, start: usize) -> ParseResult<Expr> {
        match self.peek_kind().clone() {
            TokenKind::Minus => {
                let minus = self.advance();
                if let TokenKind::Number(number) = self.peek_kind().clone() {
                    let token = self.advance();
                    let literal = self.number_literal(start, &number, minus.start, token.end, true)?;
                    return self.postfix(start, literal);
                }
                let operand = self.unary(start)?;
                let erroneous = self.span(minus.start, minus.end);
                self.unsupported(start, erroneous, UnsupportedLanguageFeature::UnsupportedOperator);
                Ok(operand)
            }
            TokenKind::Operator(op) if op == "!" || op == "+" || op == "++" || op == "--" => {
                let operator = self.advance();
                let operand = self.unary(start)?;
                let erroneous = self.span(operator.start, operator.end);
                self.unsupported(start, erroneous, UnsupportedLanguageFeature::UnsupportedOperator);
                Ok(operand)
            }
            _ => {
                let primary = self.primary(start)?;
                self.postfix(start, primary)
            }
        }
    }

    fn postfix(&mut self, start: usize, mut current: Expr) -> ParseResult<Expr> {
        loop {
            if self.next_significant_is(&[TokenKind::Dot, TokenKind::SafeDot]) {
                self.skip_newlines();
                let dot = self.advance();
                if dot.kind == TokenKind::SafeDot {
                    let erroneous = self.span(dot.start, dot.end);
                    self.unsupported(start, erroneous, UnsupportedLanguageFeature::SafeNavigation);
                }
                let (name, name_token) = self.expect_identifier(start)?;
                let source = self.span(current.source().start, name_token.end);
                current = Expr::PropertyAccess(PropertyAccess {
                    receiver: Some(Box::new(current)),
                    name,
                    source,
                });
                continue;
            }

            match self.peek_kind() {
                TokenKind::LParen => {
                    let args = self.value_arguments(start)?;
                    current = self.call(start, current, args)?;
                }
                TokenKind::LBrace => {
                    let lambda = self.lambda(start)?;
                    current = match current {
                        Expr::FunctionCall(mut call) => {
                            call.source = call.source.join(lambda.source());
                            call.args.push(lambda);
                            Expr::FunctionCall(call)
                        }
                        other => self.call(start, other, vec![lambda])?,
                    };
                }
                TokenKind::LBracket => {
                    let open = self.advance();
                    self.skip_newlines();
                    self.expression(start)?;
                    self.skip_newlines();
                    self.expect(TokenKind::RBracket, "']'", start)?;
                    let erroneous = self.span_to_last(open.start);
                    self.unsupported(start, erroneous, UnsupportedLanguageFeature::Indexing);
                }
                _ => return Ok(current),
            }
        }
    }

    /// Turns `callee` (which must name the function) and `args` into a call.
    fn call(&mut self, start: usize, callee: Expr, args: Vec<FunctionArgument>) -> ParseResult<Expr> {
        match callee {
            Expr::PropertyAccess(access) => {
                // A call on a receiver spans from its own name, not from the receiver.
                let source_start = match &access.receiver {
                    Some(_) => access.source.end.saturating_sub(access.name.len()),
                    None => access.source.start,
                };
                Ok(Expr::FunctionCall(FunctionCall {
                    receiver: access.receiver,
                    name: access.name,
                    args,
                    source: self.span(source_start, self.last_end.max(source_start)),
                }))
            }
            other => Err(ParsingError {
                potential_element_source: self.span_to_last(start),
                erroneous_source: other.source().clone(),
                message: "Expecting a function name before the argument list".to_string(),
            }),
        }
    }

    fn value_arguments(&mut self, start: usize) -> ParseResult<Vec<FunctionArgument>> {
        self.expect(TokenKind::LParen, "'('", start)?;
        let mut args = Vec::new();
        loop {
            self.skip_newlines();
            if self.at(&TokenKind::RParen) {
                self.advance();
                return Ok(args);
            }

            let arg_start = self.peek().start;
            let named = matches!(self.peek_kind(), TokenKind::Identifier(_))
                && *self.peek_nth_kind(1) == TokenKind::Eq;
            let argument = if named {
                let (name, _) = self.expect_identifier(start)?;
                self.advance();
                self.skip_newlines();
                let expr = self.expression(start)?;
                FunctionArgument::Named {
                    name,
                    expr,
                    source: self.span_to_last(arg_start),
                }
            } else if self.at(&TokenKind::LBrace) {
                self.lambda(start)?
            } else {
                let expr = self.expression(start)?;
                FunctionArgument::Positional {
                    expr,
                    source: self.span_to_last(arg_start),
                }
            };
            args.push(argument);

            self.skip_newlines();
            match self.peek_kind() {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::RParen => {}
                _ => return Err(self.error_at_current(start, "Expecting ',' or ')'".to_string())),
            }
        }
    }

    fn lambda(&mut self, start: usize) -> ParseResult<FunctionArgument> {
        let open = self.expect(TokenKind::LBrace, "'{'", start)?;

        if let Some(arrow_offset) = self.lambda_parameters_arrow() {
            let params_start = self.peek().start;
            for _ in 0..=arrow_offset {
                self.advance();
            }
            let erroneous = self.span_to_last(params_start);
            self.unsupported(start, erroneous, UnsupportedLanguageFeature::LambdaWithParameters);
        }

        let content = self.block_content(true);
        self.expect(TokenKind::RBrace, "'}'", start)?;
        let source = self.span_to_last(open.start);
        Ok(FunctionArgument::Lambda {
            block: Block {
                content,
                source: source.clone(),
            },
            source,
        })
    }

    /// Looks for `a, b ->` (or a bare `->`) right after an opening brace and
    /// returns the token offset of the arrow.
    fn lambda_parameters_arrow(&self) -> Option<usize> {
        let mut offset = 0;
        loop {
            match self.peek_nth_kind(offset) {
                TokenKind::Arrow => return Some(offset),
                TokenKind::Identifier(_) | TokenKind::Comma | TokenKind::Colon => offset += 1,
                _ => return None,
            }
        }
    }

    fn primary(&mut self, start: usize) -> ParseResult<Expr> {
        match self.peek_kind().clone() {
            TokenKind::Number(number) => {
                let token = self.advance();
                self.number_literal(start, &number, token.start, token.end, false)
            }
            TokenKind::Str(string) => {
                let token = self.advance();
                let source = self.span(token.start, token.end);
                if !string.terminated {
                    return Err(ParsingError {
                        potential_element_source: self.span_to_last(start),
                        erroneous_source: source,
                        message: "Unterminated string literal".to_string(),
                    });
                }
                if string.has_template {
                    self.unsupported(start, source.clone(), UnsupportedLanguageFeature::StringTemplates);
                }
                Ok(Expr::Literal(Literal {
                    value: LiteralValue::String(string.value),
                    source,
                }))
            }
            TokenKind::Identifier(name) => {
                let token = self.advance();
                let source = self.span(token.start, token.end);
                match name.as_str() {
                    "true" | "false" => Ok(Expr::Literal(Literal {
                        value: LiteralValue::Boolean(name == "true"),
                        source,
                    })),
                    "null" => Ok(Expr::Null(source)),
                    "this" => {
                        if self.at(&TokenKind::At) {
                            self.advance();
                            self.expect_identifier(start)?;
                            let erroneous = self.span_to_last(token.start);
                            self.unsupported(start, erroneous, UnsupportedLanguageFeature::ThisWithLabelQualifier);
                        }
                        Ok(Expr::This(source))
                    }
                    _ => Ok(Expr::PropertyAccess(PropertyAccess {
                        receiver: None,
                        name,
                        source,
                    })),
                }
            }
            TokenKind::LParen => {
                self.advance();
                self.skip_newlines();
                let inner = self.expression(start)?;
                self.skip_newlines();
                self.expect(TokenKind::RParen, "')'", start)?;
                Ok(inner)
            }
            TokenKind::LBrace => {
                let lambda = self.lambda(start)?;
                let source = lambda.source().clone();
                self.unsupported(start, source.clone(), UnsupportedLanguageFeature::FunctionDeclaration);
                Ok(Expr::Null(source))
            }
            _ => Err(self.error_at_current(start, "Expecting an expression".to_string())),
        }
    }

    fn number_literal(
        &mut self,
        start: usize,
        number: &NumberToken,
        literal_start: usize,
        literal_end: usize,
        negative: bool,
    ) -> ParseResult<Expr> {
        let source = self.span(literal_start, literal_end);
        let out_of_range = |parser: &Self| ParsingError {
            potential_element_source: parser.span_to_last(start),
            erroneous_source: source.clone(),
            message: "The value is out of range".to_string(),
        };

        if number.floating {
            return Err(ParsingError {
                potential_element_source: self.span_to_last(start),
                erroneous_source: source.clone(),
                message: "Floating point literals are not supported".to_string(),
            });
        }
        if number.unsigned {
            self.unsupported(start, source.clone(), UnsupportedLanguageFeature::UnsignedType);
        }

        let magnitude = u64::from_str_radix(&number.digits, number.radix)
            .map_err(|_| out_of_range(self))?;
        let value = if negative {
            if magnitude > i64::MAX as u64 + 1 {
                return Err(out_of_range(self));
            }
            (magnitude as i64).wrapping_neg()
        } else {
            i64::try_from(magnitude).map_err(|_| out_of_range(self))?
        };

        let value = match i32::try_from(value) {
            Ok(int) if !number.long_suffix => LiteralValue::Int(int),
            _ => LiteralValue::Long(value),
        };
        Ok(Expr::Literal(Literal { value, source }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_text(text: &str) -> LanguageTreeResult {
        parse(SourceIdentifier::new("test"), text)
    }

    fn single_statement(text: &str) -> DataStatement {
        let result = parse_text(text);
        assert!(!result.has_failures(), "unexpected failures: {:?}", result.all_failures());
        let statements: Vec<_> = result.top_level_block.statements().cloned().collect();
        assert_eq!(statements.len(), 1);
        statements.into_iter().next().unwrap()
    }

    fn single_failure(text: &str) -> FailingResult {
        let result = parse_text(text);
        let failures = result.all_failures();
        assert_eq!(failures.len(), 1, "expected one failure: {:?}", failures);
        failures[0].clone()
    }

    fn features(failure: &FailingResult) -> Vec<UnsupportedLanguageFeature> {
        failure
            .failures
            .iter()
            .filter_map(|f| match f {
                SingleFailure::Unsupported(u) => Some(u.language_feature),
                SingleFailure::Parsing(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_parse_literals() {
        let result = parse_text("a = 1\nb = \"test\"\nc = \"\"\"test\"\"\"\ne = true\nd = false");
        let values: Vec<_> = result
            .top_level_block
            .statements()
            .map(|s| match s {
                DataStatement::Assignment(a) => match &a.rhs {
                    Expr::Literal(l) => l.value.clone(),
                    other => panic!("unexpected rhs {other:?}"),
                },
                other => panic!("unexpected statement {other:?}"),
            })
            .collect();
        assert_eq!(
            values,
            vec![
                LiteralValue::Int(1),
                LiteralValue::String("test".to_string()),
                LiteralValue::String("test".to_string()),
                LiteralValue::Boolean(true),
                LiteralValue::Boolean(false),
            ]
        );
    }

    #[test]
    fn test_assignment_source_ranges() {
        let statement = single_statement("a = 1");
        let DataStatement::Assignment(assignment) = statement else {
            panic!("expected an assignment");
        };
        assert_eq!(assignment.source.range(), 0..5);
        assert_eq!(assignment.lhs.source.range(), 0..1);
        assert_eq!(assignment.rhs.source().range(), 4..5);
        assert_eq!(assignment.rhs.source().start_position.column, 5);
    }

    #[test]
    fn test_parse_long_and_negative_literals() {
        let result = parse_text("a = 1L\nb = -5\nc = 3000000000\nd = -2147483648");
        let values: Vec<_> = result
            .top_level_block
            .statements()
            .map(|s| match s {
                DataStatement::Assignment(a) => match &a.rhs {
                    Expr::Literal(l) => l.value.clone(),
                    other => panic!("unexpected rhs {other:?}"),
                },
                other => panic!("unexpected statement {other:?}"),
            })
            .collect();
        assert_eq!(
            values,
            vec![
                LiteralValue::Long(1),
                LiteralValue::Int(-5),
                LiteralValue::Long(3_000_000_000),
                LiteralValue::Int(i32::MIN),
            ]
        );
    }

    #[test]
    fn test_parse_imports() {
        let result = parse_text("import a.b.c\nimport a.b.MyData\nimport MyOtherData\n");
        let names: Vec<_> = result.imports.iter().map(|i| i.name_parts.join(".")).collect();
        assert_eq!(names, vec!["a.b.c", "a.b.MyData", "MyOtherData"]);
        assert!(result.header_failures.is_empty());
    }

    #[test]
    fn test_star_and_renaming_imports_are_rejected() {
        let result = parse_text("import a.b.*\nimport a.B as C\n");
        assert!(result.imports.is_empty());
        let features: Vec<_> = result.header_failures.iter().flat_map(features).collect();
        assert_eq!(
            features,
            vec![
                UnsupportedLanguageFeature::StarImport,
                UnsupportedLanguageFeature::RenamingImport
            ]
        );
    }

    #[test]
    fn test_package_header_is_rejected() {
        let result = parse_text("package com.example\nfoo = 1");
        assert_eq!(
            features(&result.header_failures[0]),
            vec![UnsupportedLanguageFeature::PackageHeader]
        );
        assert_eq!(result.top_level_block.statements().count(), 1);
    }

    #[test]
    fn test_parse_function_call_with_access_chain() {
        let statement = single_statement("f.g.h.i.j.k(test)");
        let DataStatement::Expr(Expr::FunctionCall(call)) = statement else {
            panic!("expected a call");
        };
        assert_eq!(call.name, "k");
        assert_eq!(call.source.range(), 10..17);
        let Some(receiver) = &call.receiver else {
            panic!("expected a receiver");
        };
        let Expr::PropertyAccess(access) = receiver.as_ref() else {
            panic!("expected a property access receiver");
        };
        assert_eq!(
            access.as_dotted_names().unwrap(),
            vec!["f", "g", "h", "i", "j"]
        );
        assert!(matches!(
            &call.args[0],
            FunctionArgument::Positional { expr: Expr::PropertyAccess(p), .. } if p.name == "test"
        ));
    }

    #[test]
    fn test_parse_positional_and_named_arguments() {
        let statement = single_statement("f(1, x, \"s\", g(), a = b)");
        let DataStatement::Expr(Expr::FunctionCall(call)) = statement else {
            panic!("expected a call");
        };
        assert_eq!(call.args.len(), 5);
        assert!(matches!(&call.args[3], FunctionArgument::Positional { expr: Expr::FunctionCall(g), .. } if g.name == "g"));
        assert!(matches!(&call.args[4], FunctionArgument::Named { name, .. } if name == "a"));
    }

    #[test]
    fn test_parse_trailing_lambda() {
        let statement = single_statement("baz(1, 2) {\n    bar = 2\n}");
        let DataStatement::Expr(Expr::FunctionCall(call)) = statement else {
            panic!("expected a call");
        };
        assert_eq!(call.args.len(), 3);
        let lambdas: Vec<_> = call.lambdas().collect();
        assert_eq!(lambdas.len(), 1);
        assert_eq!(lambdas[0].statements().count(), 1);
    }

    #[test]
    fn test_parse_lambda_without_parentheses() {
        let statement = single_statement("plugins { id(\"java\") }");
        let DataStatement::Expr(Expr::FunctionCall(call)) = statement else {
            panic!("expected a call");
        };
        assert_eq!(call.name, "plugins");
        assert_eq!(call.lambdas().count(), 1);
    }

    #[test]
    fn test_parse_local_value() {
        let statement = single_statement("val x = 1");
        assert!(matches!(statement, DataStatement::LocalValue(LocalValue { ref name, .. }) if name == "x"));
    }

    #[test]
    fn test_parse_this_and_null() {
        let result = parse_text("a = this\nb = null");
        let rhs: Vec<_> = result
            .top_level_block
            .statements()
            .map(|s| match s {
                DataStatement::Assignment(a) => a.rhs.clone(),
                other => panic!("unexpected statement {other:?}"),
            })
            .collect();
        assert!(matches!(rhs[0], Expr::This(_)));
        assert!(matches!(rhs[1], Expr::Null(_)));
    }

    #[test]
    fn test_rejected_features() {
        let cases = [
            ("var x = 1", UnsupportedLanguageFeature::LocalVarNotSupported),
            ("val x: Int = 1", UnsupportedLanguageFeature::ExplicitVariableType),
            ("val x", UnsupportedLanguageFeature::UninitializedProperty),
            ("a = b?.c", UnsupportedLanguageFeature::SafeNavigation),
            ("a = \"${b}\"", UnsupportedLanguageFeature::StringTemplates),
            ("a = b[0]", UnsupportedLanguageFeature::Indexing),
            ("@Suppress(\"x\") a = 1", UnsupportedLanguageFeature::AnnotationUsage),
            ("a = this@foo", UnsupportedLanguageFeature::ThisWithLabelQualifier),
            ("a = !b", UnsupportedLanguageFeature::UnsupportedOperator),
            ("a = b + c", UnsupportedLanguageFeature::UnsupportedOperationInBinaryExpression),
            ("a = b to c", UnsupportedLanguageFeature::InfixFunctionCall),
            ("f { x -> x }", UnsupportedLanguageFeature::LambdaWithParameters),
            ("a = 1u", UnsupportedLanguageFeature::UnsignedType),
            ("fun f() { }", UnsupportedLanguageFeature::FunctionDeclaration),
            ("class A { }", UnsupportedLanguageFeature::TypeDeclaration),
        ];
        for (text, expected) in cases {
            let failure = single_failure(text);
            assert_eq!(features(&failure), vec![expected], "for input {text:?}");
        }
    }

    #[test]
    fn test_multiple_unsupported_constructs_in_one_statement() {
        let failure = single_failure("var x = a?.b");
        assert_eq!(
            features(&failure),
            vec![
                UnsupportedLanguageFeature::LocalVarNotSupported,
                UnsupportedLanguageFeature::SafeNavigation,
            ]
        );
    }

    #[test]
    fn test_syntax_error_recovers_at_next_statement() {
        let result = parse_text("a = 1\nf(1 2)\nc = 3");
        let failures = result.all_failures();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].failures[0], SingleFailure::Parsing(_)));
        let names: Vec<_> = result
            .top_level_block
            .statements()
            .filter_map(|s| match s {
                DataStatement::Assignment(a) => Some(a.lhs.name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_failure_inside_lambda_stays_inside() {
        let result = parse_text("foo {\n    a = b?.c\n    d = 1\n}\ne = 2");
        assert_eq!(result.top_level_block.failures().count(), 0);
        assert_eq!(result.code_failures().len(), 1);
        assert_eq!(result.top_level_block.statements().count(), 2);
    }

    #[test]
    fn test_unclosed_lambda_is_a_parsing_error() {
        let failure = single_failure("foo {\n    a = 1\n");
        assert!(failure
            .failures
            .iter()
            .any(|f| matches!(f, SingleFailure::Parsing(p) if p.message.contains("'}'"))));
    }

    #[test]
    fn test_statements_on_one_line_need_separator() {
        let result = parse_text("a = 1; b = 2");
        assert!(!result.has_failures());
        assert_eq!(result.top_level_block.statements().count(), 2);

        let result = parse_text("a = 1 b = 2");
        assert_eq!(result.all_failures().len(), 1);
    }

    #[test]
    fn test_floating_point_literal_is_rejected() {
        let failure = single_failure("a = 1.5");
        assert!(matches!(&failure.failures[0], SingleFailure::Parsing(p) if p.message.contains("Floating")));
    }

    #[test]
    fn test_dot_on_next_line_continues_chain() {
        let statement = single_statement("a = foo\n    .bar");
        let DataStatement::Assignment(assignment) = statement else {
            panic!("expected an assignment");
        };
        let Expr::PropertyAccess(access) = assignment.rhs else {
            panic!("expected a property access");
        };
        assert_eq!(access.as_dotted_names().unwrap(), vec!["foo", "bar"]);
    }

    fn assert_spans_in_bounds(block: &Block, len: usize) {
        for element in &block.content {
            let source = element.source();
            assert!(source.start <= source.end && source.end <= len, "{source}");
            if let BlockElement::Statement(DataStatement::Expr(Expr::FunctionCall(call))) = element {
                for lambda in call.lambdas() {
                    assert_spans_in_bounds(lambda, len);
                }
            }
        }
    }

    proptest::proptest! {
        #[test]
        fn test_parse_never_panics(text in "[a-z0-9 =(){}.,;\"\n@$?:+-]{0,64}") {
            let result = parse_text(&text);
            assert_spans_in_bounds(&result.top_level_block, text.len());
            for failure in result.all_failures() {
                proptest::prop_assert!(!failure.failures.is_empty());
            }
        }
    }
}

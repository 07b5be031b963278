//! Tokenizer for declarative scripts.
//!
//! Comments and horizontal whitespace are dropped; newlines are kept because
//! they terminate statements.

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Identifier(String),
    Number(NumberToken),
    Str(StringToken),
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    SafeDot,
    Colon,
    Semicolon,
    Eq,
    Arrow,
    At,
    Minus,
    /// Any operator the language has no use for (`+`, `==`, `&&`, `+=`, ...).
    Operator(String),
    Newline,
    /// Malformed input such as an unterminated comment or a stray character.
    Error(String),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NumberToken {
    /// Digits without underscores, prefix or suffix.
    pub digits: String,
    pub radix: u32,
    pub long_suffix: bool,
    pub unsigned: bool,
    pub floating: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StringToken {
    pub value: String,
    pub has_template: bool,
    pub terminated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

/// Splits `text` into tokens. The last token is always [`TokenKind::Eof`].
pub(crate) fn tokenize(text: &str) -> Vec<Token> {
    let mut lexer = Lexer {
        text,
        bytes: text.as_bytes(),
        pos: 0,
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return tokens;
        }
    }
}

struct Lexer<'t> {
    text: &'t str,
    bytes: &'t [u8],
    pos: usize,
}

impl<'t> Lexer<'t> {
    fn peek_byte(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn starts_with(&self, pattern: &str) -> bool {
        self.text[self.pos..].starts_with(pattern)
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            start,
            end: self.pos,
        }
    }

    fn next_token(&mut self) -> Token {
        if let Some(error) = self.skip_trivia() {
            return error;
        }

        let start = self.pos;
        let Some(c) = self.text[self.pos..].chars().next() else {
            return self.token(TokenKind::Eof, start);
        };

        if c == '\n' {
            self.pos += 1;
            return self.token(TokenKind::Newline, start);
        }
        if c.is_ascii_digit() {
            return self.number(start);
        }
        if c == '"' {
            return self.string(start);
        }
        if c == '`' {
            return self.quoted_identifier(start);
        }
        if c == '_' || c.is_alphabetic() {
            while let Some(next) = self.text[self.pos..].chars().next() {
                if next == '_' || next.is_alphanumeric() {
                    self.pos += next.len_utf8();
                } else {
                    break;
                }
            }
            let name = self.text[start..self.pos].to_string();
            return self.token(TokenKind::Identifier(name), start);
        }

        const MULTI_CHAR: &[&str] = &[
            "?.", "?:", "->", "==", "!=", "<=", ">=", "&&", "||", "+=", "-=", "*=", "/=", "%=",
            "::", "..", "!!", "++", "--",
        ];
        for operator in MULTI_CHAR {
            if self.starts_with(operator) {
                self.pos += operator.len();
                let kind = match *operator {
                    "?." => TokenKind::SafeDot,
                    "->" => TokenKind::Arrow,
                    other => TokenKind::Operator(other.to_string()),
                };
                return self.token(kind, start);
            }
        }

        self.pos += c.len_utf8();
        let kind = match c {
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '=' => TokenKind::Eq,
            '@' => TokenKind::At,
            '-' => TokenKind::Minus,
            '+' | '*' | '/' | '%' | '<' | '>' | '!' | '?' | '&' | '|' | '^' | '~' => {
                TokenKind::Operator(c.to_string())
            }
            other => TokenKind::Error(format!("Unexpected character '{other}'")),
        };
        self.token(kind, start)
    }

    /// Skips spaces and comments. Returns an error token for an unterminated
    /// block comment.
    fn skip_trivia(&mut self) -> Option<Token> {
        loop {
            match self.peek_byte(0) {
                Some(b' ' | b'\t' | b'\r') => self.pos += 1,
                Some(b'/') if self.peek_byte(1) == Some(b'/') => {
                    while let Some(byte) = self.peek_byte(0) {
                        if byte == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                Some(b'/') if self.peek_byte(1) == Some(b'*') => {
                    let start = self.pos;
                    self.pos += 2;
                    let mut depth = 1;
                    while depth > 0 {
                        if self.starts_with("/*") {
                            depth += 1;
                            self.pos += 2;
                        } else if self.starts_with("*/") {
                            depth -= 1;
                            self.pos += 2;
                        } else if self.pos < self.bytes.len() {
                            self.pos += 1;
                        } else {
                            return Some(self.token(
                                TokenKind::Error("Unterminated comment".to_string()),
                                start,
                            ));
                        }
                    }
                }
                _ => return None,
            }
        }
    }

    fn number(&mut self, start: usize) -> Token {
        let mut radix = 10;
        if self.starts_with("0x") || self.starts_with("0X") {
            radix = 16;
            self.pos += 2;
        } else if self.starts_with("0b") || self.starts_with("0B") {
            radix = 2;
            self.pos += 2;
        }

        let mut digits = String::new();
        let mut floating = false;
        while let Some(byte) = self.peek_byte(0) {
            let c = byte as char;
            if c == '_' {
                self.pos += 1;
            } else if c.is_digit(radix) {
                digits.push(c);
                self.pos += 1;
            } else if radix == 10
                && c == '.'
                && !floating
                && self.peek_byte(1).is_some_and(|b| b.is_ascii_digit())
            {
                floating = true;
                digits.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }

        let mut long_suffix = false;
        let mut unsigned = false;
        match self.peek_byte(0) {
            Some(b'u' | b'U') => {
                unsigned = true;
                self.pos += 1;
                if self.peek_byte(0) == Some(b'L') {
                    long_suffix = true;
                    self.pos += 1;
                }
            }
            Some(b'L') => {
                long_suffix = true;
                self.pos += 1;
            }
            Some(b'f' | b'F') if radix == 10 => {
                floating = true;
                self.pos += 1;
            }
            _ => {}
        }

        self.token(
            TokenKind::Number(NumberToken {
                digits,
                radix,
                long_suffix,
                unsigned,
                floating,
            }),
            start,
        )
    }

    fn string(&mut self, start: usize) -> Token {
        if self.starts_with("\"\"\"") {
            self.pos += 3;
            let content_start = self.pos;
            return match self.text[self.pos..].find("\"\"\"") {
                Some(relative_end) => {
                    let value = &self.text[content_start..content_start + relative_end];
                    self.pos = content_start + relative_end + 3;
                    self.token(
                        TokenKind::Str(StringToken {
                            value: value.to_string(),
                            has_template: has_template(value),
                            terminated: true,
                        }),
                        start,
                    )
                }
                None => {
                    self.pos = self.bytes.len();
                    self.token(
                        TokenKind::Str(StringToken {
                            value: self.text[content_start..].to_string(),
                            has_template: false,
                            terminated: false,
                        }),
                        start,
                    )
                }
            };
        }

        self.pos += 1;
        let mut value = String::new();
        let mut has_template = false;
        let mut terminated = false;
        while let Some(c) = self.text[self.pos..].chars().next() {
            match c {
                '"' => {
                    self.pos += 1;
                    terminated = true;
                    break;
                }
                '\n' => break,
                '\\' => {
                    self.pos += 1;
                    let Some(escaped) = self.text[self.pos..].chars().next() else {
                        break;
                    };
                    self.pos += escaped.len_utf8();
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        'b' => value.push('\u{8}'),
                        'u' => {
                            let hex = self.text.get(self.pos..self.pos + 4).unwrap_or("");
                            match u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
                                Some(decoded) => {
                                    value.push(decoded);
                                    self.pos += 4;
                                }
                                None => value.push('u'),
                            }
                        }
                        other => value.push(other),
                    }
                }
                '$' => {
                    self.pos += 1;
                    if self.text[self.pos..]
                        .chars()
                        .next()
                        .is_some_and(|next| next == '{' || next == '_' || next.is_alphabetic())
                    {
                        has_template = true;
                    }
                    value.push('$');
                }
                other => {
                    self.pos += other.len_utf8();
                    value.push(other);
                }
            }
        }

        self.token(
            TokenKind::Str(StringToken {
                value,
                has_template,
                terminated,
            }),
            start,
        )
    }

    fn quoted_identifier(&mut self, start: usize) -> Token {
        self.pos += 1;
        match self.text[self.pos..].find(|c: char| c == '`' || c == '\n') {
            Some(relative) if self.bytes[self.pos + relative] == b'`' => {
                let name = self.text[self.pos..self.pos + relative].to_string();
                self.pos += relative + 1;
                self.token(TokenKind::Identifier(name), start)
            }
            _ => self.token(
                TokenKind::Error("Unterminated quoted identifier".to_string()),
                start,
            ),
        }
    }
}

fn has_template(raw: &str) -> bool {
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' {
            if let Some(&next) = chars.peek() {
                if next == '{' || next == '_' || next.is_alphabetic() {
                    return true;
                }
            }
        }
    }
    false
}

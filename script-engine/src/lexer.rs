use crate::error::SyntaxError;
use crate::token::{Keyword, Tok, Token};

/// Hand-written scanner. Identifiers use a longest-match scan followed by a
/// reserved-word table lookup. Newlines terminate statements but are
/// suppressed inside parentheses so call arguments may wrap.
pub fn lex(source: &str) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    paren_depth: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            paren_depth: 0,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn push(&mut self, tok: Tok, line: usize, column: usize) {
        self.tokens.push(Token { tok, line, column });
    }

    fn run(mut self) -> Result<Vec<Token>, SyntaxError> {
        while let Some(ch) = self.peek() {
            let (line, column) = (self.line, self.column);
            match ch {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '\n' => {
                    self.bump();
                    if self.paren_depth == 0 {
                        // Collapse runs of blank lines into one terminator.
                        if !matches!(
                            self.tokens.last(),
                            None | Some(Token {
                                tok: Tok::Newline,
                                ..
                            })
                        ) {
                            self.push(Tok::Newline, line, column);
                        }
                    }
                }
                '/' if self.peek_next() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                '"' | '\'' => self.string(ch, line, column)?,
                '0'..='9' => self.number(line, column),
                'a'..='z' | 'A'..='Z' | '_' => self.identifier(line, column),
                '(' => {
                    self.bump();
                    self.paren_depth += 1;
                    self.push(Tok::LParen, line, column);
                }
                ')' => {
                    self.bump();
                    self.paren_depth = self.paren_depth.saturating_sub(1);
                    self.push(Tok::RParen, line, column);
                }
                ',' => {
                    self.bump();
                    self.push(Tok::Comma, line, column);
                }
                '.' => {
                    self.bump();
                    self.push(Tok::Dot, line, column);
                }
                '+' => {
                    self.bump();
                    self.push(Tok::Plus, line, column);
                }
                '-' => {
                    self.bump();
                    self.push(Tok::Minus, line, column);
                }
                '*' => {
                    self.bump();
                    self.push(Tok::Star, line, column);
                }
                '/' => {
                    self.bump();
                    self.push(Tok::Slash, line, column);
                }
                '%' => {
                    self.bump();
                    self.push(Tok::Percent, line, column);
                }
                '>' => {
                    self.bump();
                    let tok = if self.eat('=') { Tok::Ge } else { Tok::Gt };
                    self.push(tok, line, column);
                }
                '<' => {
                    self.bump();
                    let tok = if self.eat('=') { Tok::Le } else { Tok::Lt };
                    self.push(tok, line, column);
                }
                '=' => {
                    self.bump();
                    let tok = if self.eat('=') { Tok::EqEq } else { Tok::Assign };
                    self.push(tok, line, column);
                }
                '!' => {
                    self.bump();
                    let tok = if self.eat('=') { Tok::NotEq } else { Tok::Bang };
                    self.push(tok, line, column);
                }
                other => {
                    return Err(SyntaxError::new(
                        format!("unexpected character `{other}`"),
                        line,
                        column,
                    ));
                }
            }
        }
        let (line, column) = (self.line, self.column);
        self.push(Tok::Eof, line, column);
        Ok(self.tokens)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn string(&mut self, quote: char, line: usize, column: usize) -> Result<(), SyntaxError> {
        self.bump(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    // Report at the opening quote so the caller can point at it.
                    return Err(SyntaxError::new("unterminated string literal", line, column));
                }
                Some('\\') => {
                    self.bump();
                    match self.bump() {
                        Some(escaped) => value.push(escaped),
                        None => {
                            return Err(SyntaxError::new(
                                "unterminated string literal",
                                line,
                                column,
                            ));
                        }
                    }
                }
                Some(c) if c == quote => {
                    self.bump();
                    self.push(Tok::Str(value), line, column);
                    return Ok(());
                }
                Some(c) => {
                    value.push(c);
                    self.bump();
                }
            }
        }
    }

    fn number(&mut self, line: usize, column: usize) {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            text.push('.');
            self.bump();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
        }
        // Digits-only text always parses.
        let value: f64 = text.parse().unwrap_or(f64::NAN);
        self.push(Tok::Number(value), line, column);
    }

    fn identifier(&mut self, line: usize, column: usize) {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let tok = match Keyword::lookup(&text) {
            Some(kw) => Tok::Keyword(kw),
            None => Tok::Ident(text),
        };
        self.push(tok, line, column);
    }
}

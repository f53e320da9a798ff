// ABOUTME: Scanner turning source text into a token stream

use crate::error::VeldError;
use crate::token::{keyword, Literal, Token, TokenType};

pub struct Scanner {
    /// Source as code points; indexing by char keeps line/column bookkeeping
    /// simple and makes string literals UTF-8 clean.
    source: Vec<char>,
    tokens: Vec<Token>,
    errors: Vec<VeldError>,
    start: usize,
    current: usize,
    line: usize,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Scanner {
            source: source.chars().collect(),
            tokens: Vec::new(),
            errors: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
        }
    }

    /// Scan the whole source. Errors do not stop the scan; if any occurred,
    /// all of them come back in `Err` and the tokens are discarded.
    pub fn scan_tokens(mut self) -> Result<Vec<Token>, Vec<VeldError>> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token();
        }
        self.tokens
            .push(Token::new(TokenType::Eof, String::new(), Literal::None, self.line));
        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.errors)
        }
    }

    fn scan_token(&mut self) {
        let c = self.advance();
        match c {
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            '[' => self.add_token(TokenType::LeftBracket),
            ']' => self.add_token(TokenType::RightBracket),
            ',' => self.add_token(TokenType::Comma),
            '.' => self.add_token(TokenType::Dot),
            ';' => self.add_token(TokenType::Semicolon),
            ':' => self.add_token(TokenType::Colon),
            '+' => self.add_token(TokenType::Plus),
            '-' => self.add_token(TokenType::Minus),
            '%' => self.add_token(TokenType::Percent),
            '&' => self.add_token(TokenType::Amp),
            '|' => self.add_token(TokenType::Pipe),
            '^' => self.add_token(TokenType::Caret),
            '~' => self.add_token(TokenType::Tilde),
            '*' => {
                let kind = if self.matches('*') {
                    TokenType::StarStar
                } else {
                    TokenType::Star
                };
                self.add_token(kind);
            }
            '!' => {
                let kind = if self.matches('=') {
                    TokenType::BangEqual
                } else {
                    TokenType::Bang
                };
                self.add_token(kind);
            }
            '=' => {
                let kind = if self.matches('=') {
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                };
                self.add_token(kind);
            }
            '<' => {
                let kind = if self.matches('=') {
                    TokenType::LessEqual
                } else if self.matches('<') {
                    TokenType::LessLess
                } else {
                    TokenType::Less
                };
                self.add_token(kind);
            }
            '>' => {
                let kind = if self.matches('=') {
                    TokenType::GreaterEqual
                } else if self.matches('>') {
                    TokenType::GreaterGreater
                } else {
                    TokenType::Greater
                };
                self.add_token(kind);
            }
            '/' => {
                if self.matches('/') {
                    // Line comment runs to end of line
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenType::Slash);
                }
            }
            ' ' | '\r' | '\t' => {}
            '\n' => self.line += 1,
            '\'' | '"' => self.string(c),
            _ => {
                if c.is_ascii_digit() {
                    self.number(c);
                } else if is_identifier_start(c) {
                    self.identifier();
                } else {
                    self.error(format!("Unexpected character '{c}'."));
                }
            }
        }
    }

    fn string(&mut self, quote: char) {
        let mut text = String::new();
        while self.peek() != quote && !self.is_at_end() {
            let c = self.advance();
            if c == '\n' {
                self.line += 1;
                text.push(c);
            } else if c == '\\' {
                if self.is_at_end() {
                    break;
                }
                let escaped = self.advance();
                match escaped {
                    'n' => text.push('\n'),
                    't' => text.push('\t'),
                    '\\' => text.push('\\'),
                    '\'' => text.push('\''),
                    '"' => text.push('"'),
                    other => {
                        // Unknown escapes pass through unchanged
                        text.push('\\');
                        text.push(other);
                    }
                }
            } else {
                text.push(c);
            }
        }

        if self.is_at_end() {
            self.error("Unterminated string.");
            return;
        }

        // Consume the closing quote
        self.advance();
        self.add_literal(TokenType::String, Literal::Str { text, quote });
    }

    fn number(&mut self, first: char) {
        if first == '0' {
            let base = match self.peek() {
                'b' | 'B' => Some(2),
                'o' | 'O' => Some(8),
                'x' | 'X' => Some(16),
                _ => None,
            };
            if let Some(base) = base {
                self.advance();
                self.based_number(base);
                return;
            }
        }

        while self.peek().is_ascii_digit() {
            self.advance();
        }

        let mut is_float = false;
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            is_float = true;
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        if is_float {
            match text.parse::<f64>() {
                Ok(value) => self.add_literal(TokenType::Number, Literal::Float(value)),
                Err(_) => self.error(format!("Invalid number literal '{text}'.")),
            }
        } else {
            // Integer literals that overflow i64 fall back to a float value
            match text.parse::<i64>() {
                Ok(value) => self.add_literal(TokenType::Number, Literal::Int(value)),
                Err(_) => match text.parse::<f64>() {
                    Ok(value) => self.add_literal(TokenType::Number, Literal::Float(value)),
                    Err(_) => self.error(format!("Invalid number literal '{text}'.")),
                },
            }
        }
    }

    fn based_number(&mut self, base: u32) {
        let digits_start = self.current;
        while self.peek().is_digit(base) {
            self.advance();
        }
        if self.current == digits_start {
            let text: String = self.source[self.start..self.current].iter().collect();
            self.error(format!("Invalid number literal '{text}'."));
            return;
        }
        let digits: String = self.source[digits_start..self.current].iter().collect();
        match i64::from_str_radix(&digits, base) {
            Ok(value) => self.add_literal(TokenType::Number, Literal::Int(value)),
            Err(_) => {
                let text: String = self.source[self.start..self.current].iter().collect();
                self.error(format!("Invalid number literal '{text}'."));
            }
        }
    }

    fn identifier(&mut self) {
        while is_identifier_part(self.peek()) {
            self.advance();
        }
        let text: String = self.source[self.start..self.current].iter().collect();
        let kind = keyword(&text).unwrap_or(TokenType::Identifier);
        self.add_token(kind);
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.source[self.current]
        }
    }

    fn peek_next(&self) -> char {
        if self.current + 1 >= self.source.len() {
            '\0'
        } else {
            self.source[self.current + 1]
        }
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        c
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn add_token(&mut self, kind: TokenType) {
        self.add_literal(kind, Literal::None);
    }

    fn add_literal(&mut self, kind: TokenType, literal: Literal) {
        let lexeme: String = self.source[self.start..self.current].iter().collect();
        self.tokens.push(Token::new(kind, lexeme, literal, self.line));
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(VeldError::scan(self.line, message));
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

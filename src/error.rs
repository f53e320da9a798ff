// ABOUTME: Error types for scan, parse, resolution, and runtime failures

use crate::token::{Token, TokenType};
use thiserror::Error;

/// A diagnostic produced by any stage of the pipeline.
///
/// The display strings are the user-visible report lines; the driver prints
/// them to stderr verbatim.
#[derive(Error, Debug, Clone)]
pub enum VeldError {
    /// Lexical error: the scanner has no token to point at, only a line.
    #[error("[line {line}] Error: {message}")]
    Scan { line: usize, message: String },

    /// Parse or resolution error anchored to a token.
    /// `location` is `'lexeme'` or `end` for the EOF token.
    #[error("[line {line}] Error at {location}: {message}")]
    Parse {
        line: usize,
        location: String,
        message: String,
    },

    /// Runtime error anchored to the token whose evaluation failed.
    #[error("[line {line}] Error at '{lexeme}': {message}")]
    Runtime {
        line: usize,
        lexeme: String,
        message: String,
    },
}

impl VeldError {
    pub fn scan(line: usize, message: impl Into<String>) -> Self {
        VeldError::Scan {
            line,
            message: message.into(),
        }
    }

    pub fn parse(token: &Token, message: impl Into<String>) -> Self {
        let location = if token.kind == TokenType::Eof {
            "end".to_string()
        } else {
            format!("'{}'", token.lexeme)
        };
        VeldError::Parse {
            line: token.line,
            location,
            message: message.into(),
        }
    }

    pub fn runtime(token: &Token, message: impl Into<String>) -> Self {
        VeldError::Runtime {
            line: token.line,
            lexeme: token.lexeme.clone(),
            message: message.into(),
        }
    }

    /// The message without the location prefix, used by tests.
    pub fn message(&self) -> &str {
        match self {
            VeldError::Scan { message, .. }
            | VeldError::Parse { message, .. }
            | VeldError::Runtime { message, .. } => message,
        }
    }
}

/// Error raised inside a native function before a source location is known.
/// The evaluator attaches the call-site token when converting to [`VeldError`].
#[derive(Debug, Clone)]
pub struct NativeError(pub String);

impl From<String> for NativeError {
    fn from(message: String) -> Self {
        NativeError(message)
    }
}

impl From<&str> for NativeError {
    fn from(message: &str) -> Self {
        NativeError(message.to_string())
    }
}

/// Outcome of running a whole source unit, split by pipeline stage so the
/// driver can map it onto the conventional exit codes.
#[derive(Debug)]
pub enum RunError {
    /// Scan, parse, or resolution errors; possibly several per run.
    Static(Vec<VeldError>),
    /// A runtime error; evaluation stops at the first one.
    Runtime(VeldError),
}

impl RunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Static(_) => 65,
            RunError::Runtime(_) => 70,
        }
    }

    /// Print every diagnostic to stderr.
    pub fn report(&self) {
        match self {
            RunError::Static(errors) => {
                for error in errors {
                    eprintln!("{error}");
                }
            }
            RunError::Runtime(error) => eprintln!("{error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Literal;

    fn token(kind: TokenType, lexeme: &str, line: usize) -> Token {
        Token::new(kind, lexeme.to_string(), Literal::None, line)
    }

    #[test]
    fn test_scan_error_format() {
        let err = VeldError::scan(3, "Unexpected character '@'.");
        assert_eq!(err.to_string(), "[line 3] Error: Unexpected character '@'.");
    }

    #[test]
    fn test_parse_error_format() {
        let err = VeldError::parse(&token(TokenType::Semicolon, ";", 7), "Expect expression.");
        assert_eq!(err.to_string(), "[line 7] Error at ';': Expect expression.");
    }

    #[test]
    fn test_parse_error_at_end() {
        let err = VeldError::parse(&token(TokenType::Eof, "", 2), "Expect ';'.");
        assert_eq!(err.to_string(), "[line 2] Error at end: Expect ';'.");
    }

    #[test]
    fn test_runtime_error_format() {
        let err = VeldError::runtime(
            &token(TokenType::Plus, "+", 1),
            "Operands must be numbers.",
        );
        assert_eq!(
            err.to_string(),
            "[line 1] Error at '+': Operands must be numbers."
        );
    }

    #[test]
    fn test_exit_codes() {
        let stat = RunError::Static(vec![VeldError::scan(1, "x")]);
        let run = RunError::Runtime(VeldError::scan(1, "x"));
        assert_eq!(stat.exit_code(), 65);
        assert_eq!(run.exit_code(), 70);
    }
}

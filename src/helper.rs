// ABOUTME: REPL helper with multi-line input validation and syntax colors
// Implements rustyline's Validator so unbalanced blocks keep the line open,
// and Highlighter to color keywords, numbers, strings, and comments

use crate::token::keyword;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline_derive::{Completer, Helper, Hinter};
use std::borrow::Cow;

// ANSI color codes (3-bit/4-bit colors for maximum terminal compatibility)
const COLOR_RESET: &str = "\x1b[0m";
const COLOR_KEYWORD: &str = "\x1b[1;35m"; // Bold magenta
const COLOR_NUMBER: &str = "\x1b[33m"; // Yellow
const COLOR_STRING: &str = "\x1b[32m"; // Green
const COLOR_COMMENT: &str = "\x1b[90m"; // Bright black (gray)

#[derive(Completer, Helper, Hinter)]
pub struct VeldHelper;

impl VeldHelper {
    pub fn new() -> Self {
        VeldHelper
    }
}

impl Default for VeldHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for VeldHelper {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        if input_is_open(ctx.input()) {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

/// True while brackets or a string literal are still open, so the REPL keeps
/// reading lines instead of submitting a half-finished block.
fn input_is_open(input: &str) -> bool {
    let mut depth: i64 = 0;
    let mut string_quote: Option<char> = None;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(quote) = string_quote {
            if c == '\\' {
                chars.next();
            } else if c == quote {
                string_quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => string_quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '/' if chars.peek() == Some(&'/') => {
                // Comment runs to end of line
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    depth > 0 || string_quote.is_some()
}

impl Highlighter for VeldHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let highlighted = highlight_line(line);
        if highlighted == line {
            Cow::Borrowed(line)
        } else {
            Cow::Owned(highlighted)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn highlight_line(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        // Comments swallow the rest of the line
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            out.push_str(COLOR_COMMENT);
            out.extend(&chars[i..]);
            out.push_str(COLOR_RESET);
            break;
        }

        // String literals
        if c == '\'' || c == '"' {
            let start = i;
            i += 1;
            while i < chars.len() {
                if chars[i] == '\\' {
                    i += 2;
                    continue;
                }
                if chars[i] == c {
                    i += 1;
                    break;
                }
                i += 1;
            }
            out.push_str(COLOR_STRING);
            out.extend(&chars[start..i.min(chars.len())]);
            out.push_str(COLOR_RESET);
            continue;
        }

        // Numbers
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                i += 1;
            }
            out.push_str(COLOR_NUMBER);
            out.extend(&chars[start..i]);
            out.push_str(COLOR_RESET);
            continue;
        }

        // Identifiers and keywords
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            if keyword(&word).is_some() {
                out.push_str(COLOR_KEYWORD);
                out.push_str(&word);
                out.push_str(COLOR_RESET);
            } else {
                out.push_str(&word);
            }
            continue;
        }

        out.push(c);
        i += 1;
    }

    out
}

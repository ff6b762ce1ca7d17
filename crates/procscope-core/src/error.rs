//! Error types for batch parsing.
//!
//! # Error Handling Strategy
//!
//! Two complementary patterns are used across the crate:
//!
//! - [`ParseError`]: the front-end rejected a batch. Returned as
//!   `Result<T, ParseError>`; the affected source match is not classified.
//!
//! - Report rows: non-fatal per-name failures (a name the locator cannot
//!   find, a batch the front-end rejects) are recorded as rows in the
//!   accumulated report, so a run always proceeds to completion over the
//!   remaining names.
//!
//! Unrecognized constructs inside a parsable batch are not errors at all:
//! the classifier skips them at the node level.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Error encountered while parsing a statement batch.
///
/// Preserves structured information from the underlying parser, including
/// position information when available.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Human-readable error message.
    pub message: String,
    /// Position where the error occurred, if available.
    pub position: Option<Position>,
    /// The specific category of parse error.
    pub kind: ParseErrorKind,
}

/// Position information for a parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed).
    pub column: usize,
}

/// Category of parse error for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseErrorKind {
    /// Unexpected token or character in input.
    #[default]
    SyntaxError,
    /// Missing required clause or keyword.
    MissingClause,
    /// Invalid or unexpected end of input.
    UnexpectedEof,
    /// Lexer/tokenization error.
    LexerError,
}

impl ParseError {
    /// Creates a new parse error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
            kind: ParseErrorKind::SyntaxError,
        }
    }

    /// Sets the error kind.
    pub fn with_kind(mut self, kind: ParseErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Parses position from the sqlparser error message format
    /// ("Expected ..., found ... at Line: X, Column: Y").
    ///
    /// This parsing is coupled to the `sqlparser` crate's message format and
    /// gracefully returns `None` when the expected format is not found.
    fn parse_position_from_message(message: &str) -> Option<Position> {
        static POSITION_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = POSITION_REGEX.get_or_init(|| {
            Regex::new(r"Line:\s*(\d+)\s*,\s*Column:\s*(\d+)").expect("Invalid regex pattern")
        });

        re.captures(message).and_then(|caps| {
            let line: usize = caps.get(1)?.as_str().parse().ok()?;
            let column: usize = caps.get(2)?.as_str().parse().ok()?;
            Some(Position { line, column })
        })
    }

    /// Determines the error kind from the message content. Relies on
    /// patterns in `sqlparser` messages, like
    /// [`Self::parse_position_from_message`].
    fn infer_kind_from_message(message: &str) -> ParseErrorKind {
        let lower = message.to_lowercase();
        if lower.contains("unexpected end") || lower.contains("eof") {
            ParseErrorKind::UnexpectedEof
        } else if lower.contains("expected") {
            ParseErrorKind::MissingClause
        } else if lower.contains("lexer") || lower.contains("token") {
            ParseErrorKind::LexerError
        } else {
            ParseErrorKind::SyntaxError
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error")?;
        if let Some(pos) = self.position {
            write!(f, " at line {}, column {}", pos.line, pos.column)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for ParseError {}

impl From<sqlparser::parser::ParserError> for ParseError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        let message = err.to_string();
        let position = Self::parse_position_from_message(&message);
        let kind = Self::infer_kind_from_message(&message);

        Self {
            message,
            position,
            kind,
        }
    }
}

impl From<sqlparser::tokenizer::TokenizerError> for ParseError {
    fn from(err: sqlparser::tokenizer::TokenizerError) -> Self {
        Self::new(err.to_string()).with_kind(ParseErrorKind::LexerError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_position_from_message() {
        let msg = "Expected SELECT, found 'INSERT' at Line: 1, Column: 5";
        let pos = ParseError::parse_position_from_message(msg);
        assert_eq!(pos, Some(Position { line: 1, column: 5 }));
    }

    #[test]
    fn test_parse_position_no_position() {
        let msg = "Unexpected token";
        let pos = ParseError::parse_position_from_message(msg);
        assert_eq!(pos, None);
    }

    #[test]
    fn test_parse_position_no_whitespace() {
        let msg = "Error at Line:1,Column:5";
        let pos = ParseError::parse_position_from_message(msg);
        assert_eq!(pos, Some(Position { line: 1, column: 5 }));
    }

    #[test]
    fn test_infer_kind_eof() {
        let kind = ParseError::infer_kind_from_message("Unexpected end of input");
        assert_eq!(kind, ParseErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_infer_kind_expected() {
        let kind = ParseError::infer_kind_from_message("Expected SELECT keyword");
        assert_eq!(kind, ParseErrorKind::MissingClause);
    }

    #[test]
    fn test_display_with_position() {
        let err = ParseError {
            message: "Unexpected token".to_string(),
            position: Some(Position {
                line: 10,
                column: 5,
            }),
            kind: ParseErrorKind::SyntaxError,
        };
        assert_eq!(
            err.to_string(),
            "Parse error at line 10, column 5: Unexpected token"
        );
    }

    #[test]
    fn test_error_trait() {
        let err = ParseError::new("Test error");
        let _: &dyn std::error::Error = &err;
    }
}

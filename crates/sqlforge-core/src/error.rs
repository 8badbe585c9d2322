//! Error types for the sqlforge compiler.
//!
//! # Error Handling Strategy
//!
//! - [`ScanError`] / [`ParseError`]: fatal errors that abort lex/parse for the
//!   current file. Returned as `Result<T, ParseError>`.
//! - [`CheckError`]: non-fatal errors accumulated during semantic analysis.
//!   Checking continues across a query (and across all queries) so the
//!   caller sees every problem in one run, not just the first.
//! - [`EmitError`]: target-formatting failures only. Code emission assumes a
//!   checked (post-`Checker::check_all`) tree; an unexpanded fragment or an
//!   unresolved variable name reaching the emitter is a programmer bug, not
//!   a recoverable [`EmitError`].
//! - [`ConfigError`]: driver-level config file problems (unknown/missing key).

use std::fmt;
use thiserror::Error;

/// Fatal error raised by the scanner while tokenizing source text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("line {line}: unterminated string")]
    UnterminatedString { line: usize },
    #[error("line {line}: unexpected character: {character}")]
    UnexpectedCharacter { line: usize, character: char },
    #[error("line {line}: error parsing number: {lexeme}")]
    InvalidNumber { line: usize, lexeme: String },
}

/// Category of parse error, exposed for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseErrorKind {
    #[default]
    SyntaxError,
    UnexpectedToken,
    UnknownTemplateKeyword,
    TypeMismatch,
    UnexpectedEof,
}

/// Fatal error raised while parsing a schema or query file. Parsing
/// terminates on the first error — cascading syntax errors after the first
/// real one are rarely useful, so (per spec) we don't try to recover.
#[derive(Debug, Clone, Error)]
#[error("{}{message}", self.line_prefix())]
pub struct ParseError {
    pub message: String,
    pub line: Option<usize>,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            kind: ParseErrorKind::SyntaxError,
        }
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_kind(mut self, kind: ParseErrorKind) -> Self {
        self.kind = kind;
        self
    }

    fn line_prefix(&self) -> String {
        match self.line {
            Some(line) => format!("line {line}: "),
            None => String::new(),
        }
    }
}

impl From<ScanError> for ParseError {
    fn from(err: ScanError) -> Self {
        let line = match err {
            ScanError::UnterminatedString { line } => line,
            ScanError::UnexpectedCharacter { line, .. } => line,
            ScanError::InvalidNumber { line, .. } => line,
        };
        ParseError::new(err.to_string())
            .with_line(line)
            .with_kind(ParseErrorKind::SyntaxError)
    }
}

/// Non-fatal error accumulated while checking a single query.
///
/// Mirrors the taxonomy of the original `sqld` compiler's `check.go`
/// (`ErrUnknownTable`, `ErrUnknownField`, `ErrUnknownParam`,
/// `ErrUnknownFragment`, `ErrFragmentParamMismatch`), generalized with
/// `AmbiguousField` and `RangeVarNotList`/`NegativeLimit` for the join-scope
/// resolution spec.md adds beyond the original.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    #[error("unknown table: {table}")]
    UnknownTable { table: String },
    #[error("unknown field: {field}")]
    UnknownField { field: String },
    #[error("ambiguous field: {field} is present in multiple tables in scope")]
    AmbiguousField { field: String },
    #[error("unknown param: {name}")]
    UnknownParam { name: String },
    #[error("unknown fragment: {name}")]
    UnknownFragment { name: String },
    #[error("mismatched fragment params: {fragment} expects {expected} argument(s), got {got}")]
    FragmentParamArity {
        fragment: String,
        expected: usize,
        got: usize,
    },
    #[error("mismatched fragment params: argument {index} to {fragment} has the wrong type")]
    FragmentParamType { fragment: String, index: usize },
    #[error("range variable {name} is not a list")]
    RangeVarNotList { name: String },
    #[error("limit is negative")]
    NegativeLimit,
    #[error("query {query} has no FROM table")]
    MissingTable { query: String },
}

/// A [`CheckError`] tagged with the query it occurred in, for driver reporting.
#[derive(Debug, Clone)]
pub struct QueryCheckError {
    pub query: String,
    pub error: CheckError,
}

impl fmt::Display for QueryCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.query, self.error)
    }
}

/// Error raised by an [`crate::emit::Emitter`]. Kept deliberately small:
/// emission reads an already-checked tree and writes directly to a `String`
/// (no intermediate formatter pass that can fail the way `go/format` can),
/// so the only real failure mode is target-language string formatting.
#[derive(Debug, Clone, Error)]
pub enum EmitError {
    #[error("failed to format emitted source: {0}")]
    FormattingFailed(String),
}

/// Error raised while reading/validating the driver's `key = "value";`
/// config file (spec.md §6.1).
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("unknown config key: {key}")]
    UnknownKey { key: String },
    #[error("missing required config key: {key}")]
    MissingKey { key: String },
    #[error("invalid config syntax: {0}")]
    Syntax(#[from] ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_error_converts_to_parse_error_with_line() {
        let scan_err = ScanError::UnterminatedString { line: 4 };
        let parse_err: ParseError = scan_err.into();
        assert_eq!(parse_err.line, Some(4));
        assert!(parse_err.to_string().contains("unterminated string"));
    }

    #[test]
    fn parse_error_display_without_line() {
        let err = ParseError::new("unexpected token");
        assert_eq!(err.to_string(), "unexpected token");
    }

    #[test]
    fn parse_error_display_with_line() {
        let err = ParseError::new("unexpected token").with_line(12);
        assert_eq!(err.to_string(), "line 12: unexpected token");
    }

    #[test]
    fn check_error_messages_are_stable() {
        assert_eq!(
            CheckError::UnknownTable {
                table: "foo".into()
            }
            .to_string(),
            "unknown table: foo"
        );
        assert_eq!(
            CheckError::FragmentParamArity {
                fragment: "Frag".into(),
                expected: 2,
                got: 1
            }
            .to_string(),
            "mismatched fragment params: Frag expects 2 argument(s), got 1"
        );
    }
}

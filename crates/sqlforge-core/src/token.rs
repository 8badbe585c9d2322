//! Tokens produced by the [`crate::scanner::Scanner`] (spec.md §3, §6.2).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of token kinds the scanner can produce (spec.md §6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
    Minus,
    Plus,
    Semicolon,
    Slash,
    Star,
    Colon,
    QuestionMark,
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Identifier,
    String,
    Number,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// The literal value carried by `String`/`Number` tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub enum Literal {
    String(String),
    Number(f64),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "{s}"),
            Literal::Number(n) => write!(f, "{n}"),
        }
    }
}

/// A single token: kind, original lexeme, line number, and (for identifiers)
/// a lower-cased copy used for case-insensitive keyword comparison. String
/// tokens additionally carry their literal value and which quote delimited
/// them (single-quote: SQL string literal; double-quote: quoted identifier).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub literal: Option<Literal>,
    /// Only meaningful for `String` tokens: `true` when the original
    /// delimiter was a single quote (SQL string literal) rather than a
    /// double quote (SQL quoted identifier).
    pub single_quoted: bool,
    /// Lower-cased copy of `lexeme`, populated for `Identifier` tokens only.
    pub lexeme_lowered: Option<String>,
}

impl Token {
    pub fn eof(line: usize) -> Self {
        Token {
            kind: TokenKind::Eof,
            lexeme: String::new(),
            line,
            literal: None,
            single_quoted: false,
            lexeme_lowered: None,
        }
    }

    pub fn simple(kind: TokenKind, lexeme: impl Into<String>, line: usize) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            line,
            literal: None,
            single_quoted: false,
            lexeme_lowered: None,
        }
    }

    /// `true` if this is an `Identifier` token whose lower-cased lexeme
    /// matches one of `keywords`.
    pub fn is_keyword(&self, keywords: &[&str]) -> bool {
        if self.kind != TokenKind::Identifier {
            return false;
        }
        match &self.lexeme_lowered {
            Some(lowered) => keywords.iter().any(|k| k.eq_ignore_ascii_case(lowered)),
            None => false,
        }
    }

    pub fn string_literal(&self) -> Option<&str> {
        match &self.literal {
            Some(Literal::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn number_literal(&self) -> Option<f64> {
        match &self.literal {
            Some(Literal::Number(n)) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.lexeme)
    }
}

/// Reserved keywords: cannot be used as bare table aliases (spec.md §6.3).
pub const RESERVED_KEYWORDS: &[&str] = &[
    "from", "where", "limit", "join", "on", "inner", "outer", "cross", "full", "left", "right",
];

pub fn is_reserved_keyword(lowered: &str) -> bool {
    RESERVED_KEYWORDS.contains(&lowered)
}

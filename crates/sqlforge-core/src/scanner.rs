//! Forward scanner over DSL source text (spec.md §4.1).
//!
//! Tokens are materialized lazily into a small ring buffer so the parser can
//! use up to two tokens of lookahead (`peek`, `peek_after`) without the
//! scanner re-tokenizing anything. Grounded closely in `original_source/scan.go`'s
//! `Scanner`, translated from byte-string slicing to `char` iteration since
//! Rust strings aren't indexable by byte offset the way Go's are.

use crate::error::ScanError;
use crate::token::{Literal, Token, TokenKind};

/// Ring buffer capacity; spec.md requires at least 5 to comfortably support
/// two-token lookahead plus in-flight scans.
const RING_BUFFER_SIZE: usize = 5;

pub struct Scanner {
    chars: Vec<char>,
    start: usize,
    current: usize,
    line: usize,

    ring: [Option<Token>; RING_BUFFER_SIZE],
    buffer_size: usize,
    buffer_start: usize,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Scanner {
            chars: source.chars().collect(),
            start: 0,
            current: 0,
            line: 1,
            ring: Default::default(),
            buffer_size: 0,
            buffer_start: 0,
        }
    }

    /// `false` once the source is exhausted and the next token would be EOF.
    pub fn has_next(&mut self) -> bool {
        match self.peek() {
            Ok(tok) => tok.kind != TokenKind::Eof,
            Err(_) => true,
        }
    }

    /// Returns the current token without consuming it. Idempotent.
    pub fn peek(&mut self) -> Result<Token, ScanError> {
        if self.buffer_size == 0 {
            self.scan_token()?;
        }
        Ok(self.ring[self.buffer_start].clone().expect("token just scanned"))
    }

    /// Returns the `n`-th token after the current one (`n == 0` is `peek()`).
    pub fn peek_after(&mut self, n: usize) -> Result<Token, ScanError> {
        while self.buffer_size < n + 1 {
            self.scan_token()?;
        }
        let idx = (self.buffer_start + n) % RING_BUFFER_SIZE;
        Ok(self.ring[idx].clone().expect("token just scanned"))
    }

    /// Returns the current token and advances past it.
    pub fn eat(&mut self) -> Result<Token, ScanError> {
        if self.buffer_size == 0 {
            self.scan_token()?;
        }
        let token = self.ring[self.buffer_start].take().expect("token just scanned");
        if self.buffer_size > 1 {
            self.buffer_start = (self.buffer_start + 1) % RING_BUFFER_SIZE;
        }
        self.buffer_size -= 1;
        Ok(token)
    }

    fn is_at_end_of_source(&self) -> bool {
        self.current >= self.chars.len()
    }

    fn push_token(&mut self, token: Token) {
        assert!(self.buffer_size < RING_BUFFER_SIZE, "scanner ring buffer full");
        let idx = (self.buffer_start + self.buffer_size) % RING_BUFFER_SIZE;
        self.ring[idx] = Some(token);
        self.buffer_size += 1;
    }

    fn scan_token(&mut self) -> Result<(), ScanError> {
        loop {
            if self.is_at_end_of_source() {
                self.push_token(Token::eof(self.line));
                return Ok(());
            }

            let c = self.advance();
            if is_whitespace(c) {
                if c == '\n' {
                    self.line += 1;
                }
                continue;
            }

            self.start = self.current - 1;
            return self.scan_from(c);
        }
    }

    fn scan_from(&mut self, c: char) -> Result<(), ScanError> {
        match c {
            '(' => self.add_token(TokenKind::LeftParen),
            ')' => self.add_token(TokenKind::RightParen),
            '{' => self.add_token(TokenKind::LeftBrace),
            '}' => self.add_token(TokenKind::RightBrace),
            '[' => self.add_token(TokenKind::LeftBracket),
            ']' => self.add_token(TokenKind::RightBracket),
            ',' => self.add_token(TokenKind::Comma),
            '.' => self.add_token(TokenKind::Dot),
            '-' => {
                if self.match_char('-') {
                    self.skip_line_comment();
                    return self.scan_token();
                }
                self.add_token(TokenKind::Minus)
            }
            '+' => self.add_token(TokenKind::Plus),
            ';' => self.add_token(TokenKind::Semicolon),
            '*' => self.add_token(TokenKind::Star),
            ':' => self.add_token(TokenKind::Colon),
            '?' => self.add_token(TokenKind::QuestionMark),
            '!' => {
                let kind = if self.match_char('=') { TokenKind::BangEqual } else { TokenKind::Bang };
                self.add_token(kind)
            }
            '=' => {
                let kind = if self.match_char('=') { TokenKind::EqualEqual } else { TokenKind::Equal };
                self.add_token(kind)
            }
            '<' => {
                let kind = if self.match_char('=') {
                    TokenKind::LessEqual
                } else if self.match_char('>') {
                    // `<>` normalizes to `!=` (spec.md §4.1)
                    TokenKind::BangEqual
                } else {
                    TokenKind::Less
                };
                self.add_token(kind)
            }
            '>' => {
                let kind = if self.match_char('=') { TokenKind::GreaterEqual } else { TokenKind::Greater };
                self.add_token(kind)
            }
            '/' => {
                if self.match_char('/') {
                    self.skip_line_comment();
                    return self.scan_token();
                }
                self.add_token(TokenKind::Slash)
            }
            '"' => self.scan_string('"', false),
            '\'' => self.scan_string('\'', true),
            _ if c.is_ascii_digit() => self.scan_number(),
            _ if is_alpha(c) => {
                self.scan_identifier();
                Ok(())
            }
            _ => Err(ScanError::UnexpectedCharacter { line: self.line, character: c }),
        }
    }

    fn skip_line_comment(&mut self) {
        while self.peek_char() != Some('\n') && !self.is_at_end_of_source() {
            self.advance();
        }
    }

    fn scan_identifier(&mut self) {
        while self.peek_char().map(is_alphanumeric).unwrap_or(false) {
            self.advance();
        }
        self.add_token(TokenKind::Identifier).expect("identifiers never fail to scan");
    }

    fn scan_number(&mut self) -> Result<(), ScanError> {
        while self.peek_char().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            self.advance();
        }

        if self.peek_char() == Some('.') && self.peek_next_char().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            self.advance();
            while self.peek_char().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                self.advance();
            }
        }

        let lexeme: String = self.chars[self.start..self.current].iter().collect();
        let value: f64 = lexeme.parse().map_err(|_| ScanError::InvalidNumber { line: self.line, lexeme: lexeme.clone() })?;
        self.add_token_literal(TokenKind::Number, Some(Literal::Number(value)), false)
    }

    fn scan_string(&mut self, end_char: char, single_quoted: bool) -> Result<(), ScanError> {
        while self.peek_char() != Some(end_char) && !self.is_at_end_of_source() {
            if self.peek_char() == Some('\n') {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end_of_source() {
            return Err(ScanError::UnterminatedString { line: self.line });
        }

        // consume closing quote
        self.advance();

        let value: String = self.chars[self.start + 1..self.current - 1].iter().collect();
        self.add_token_literal(TokenKind::String, Some(Literal::String(value)), single_quoted)
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.current).copied()
    }

    fn peek_next_char(&self) -> Option<char> {
        self.chars.get(self.current + 1).copied()
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek_char() != Some(expected) {
            return false;
        }
        self.current += 1;
        true
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.current];
        self.current += 1;
        c
    }

    fn add_token(&mut self, kind: TokenKind) -> Result<(), ScanError> {
        self.add_token_literal(kind, None, false)
    }

    fn add_token_literal(&mut self, kind: TokenKind, literal: Option<Literal>, single_quoted: bool) -> Result<(), ScanError> {
        let lexeme: String = self.chars[self.start..self.current].iter().collect();
        let lexeme_lowered = matches!(kind, TokenKind::Identifier).then(|| lexeme.to_lowercase());

        let token = Token {
            kind,
            lexeme,
            line: self.line,
            literal,
            single_quoted,
            lexeme_lowered,
        };
        self.push_token(token);
        Ok(())
    }
}

fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn is_alpha(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_alphanumeric(c: char) -> bool {
    is_alpha(c) || c.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut scanner = Scanner::new(source);
        let mut out = Vec::new();
        loop {
            let tok = scanner.eat().unwrap();
            let done = tok.kind == TokenKind::Eof;
            out.push(tok.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn scans_single_char_tokens() {
        assert_eq!(
            kinds("(){}[],.-+;*:?"),
            vec![
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::LeftBracket,
                TokenKind::RightBracket,
                TokenKind::Comma,
                TokenKind::Dot,
                TokenKind::Minus,
                TokenKind::Plus,
                TokenKind::Semicolon,
                TokenKind::Star,
                TokenKind::Colon,
                TokenKind::QuestionMark,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_two_char_tokens_and_normalizes_ne() {
        assert_eq!(
            kinds("!= == <= >= <>"),
            vec![
                TokenKind::BangEqual,
                TokenKind::EqualEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::BangEqual,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_line_comments() {
        let mut scanner = Scanner::new("id -- a comment\n= 5 // trailing\n");
        assert_eq!(scanner.eat().unwrap().kind, TokenKind::Identifier);
        assert_eq!(scanner.eat().unwrap().kind, TokenKind::Equal);
        assert_eq!(scanner.eat().unwrap().kind, TokenKind::Number);
        assert_eq!(scanner.eat().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn tracks_string_delimiter_kind() {
        let mut scanner = Scanner::new("'single' \"double\"");
        let single = scanner.eat().unwrap();
        assert!(single.single_quoted);
        assert_eq!(single.string_literal(), Some("single"));

        let double = scanner.eat().unwrap();
        assert!(!double.single_quoted);
        assert_eq!(double.string_literal(), Some("double"));
    }

    #[test]
    fn numbers_support_fractional_part() {
        let mut scanner = Scanner::new("42 3.14");
        assert_eq!(scanner.eat().unwrap().number_literal(), Some(42.0));
        assert_eq!(scanner.eat().unwrap().number_literal(), Some(3.14));
    }

    #[test]
    fn identifiers_get_lowercase_copy() {
        let mut scanner = Scanner::new("SELECT");
        let tok = scanner.eat().unwrap();
        assert_eq!(tok.lexeme, "SELECT");
        assert_eq!(tok.lexeme_lowered.as_deref(), Some("select"));
        assert!(tok.is_keyword(&["select"]));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let mut scanner = Scanner::new("'oops");
        assert_eq!(scanner.eat(), Err(ScanError::UnterminatedString { line: 1 }));
    }

    #[test]
    fn unexpected_character_is_an_error() {
        let mut scanner = Scanner::new("$");
        assert_eq!(scanner.eat(), Err(ScanError::UnexpectedCharacter { line: 1, character: '$' }));
    }

    #[test]
    fn peek_is_idempotent_and_peek_after_looks_ahead() {
        let mut scanner = Scanner::new("a b c");
        let first = scanner.peek().unwrap();
        let first_again = scanner.peek().unwrap();
        assert_eq!(first, first_again);

        let second = scanner.peek_after(1).unwrap();
        assert_eq!(second.lexeme, "b");

        assert_eq!(scanner.eat().unwrap().lexeme, "a");
        assert_eq!(scanner.eat().unwrap().lexeme, "b");
        assert_eq!(scanner.eat().unwrap().lexeme, "c");
    }

    #[test]
    fn has_next_is_false_at_eof() {
        let mut scanner = Scanner::new("a");
        assert!(scanner.has_next());
        scanner.eat().unwrap();
        assert!(!scanner.has_next());
    }

    #[test]
    fn newlines_advance_line_counter_for_errors() {
        let mut scanner = Scanner::new("a\nb\n'oops");
        scanner.eat().unwrap();
        scanner.eat().unwrap();
        assert_eq!(scanner.eat(), Err(ScanError::UnterminatedString { line: 3 }));
    }
}

//! Schema parser: a tolerant subset of `CREATE TABLE` DDL (spec.md §4.2).
//!
//! Grounded in `original_source/parse_schema.go`. Statements that don't start
//! with `CREATE TABLE` (case-insensitive) are skipped to the next `;` so a
//! real DDL file with extensions (indexes, extensions, grants, ...) can be
//! fed straight in.

use crate::error::ParseError;
use crate::scanner::Scanner;
use crate::token::TokenKind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Field {
    pub name: String,
    /// Raw type lexeme. Unrecognized types are tolerated as "unknown" —
    /// the checker only consults field *names*, never types.
    pub ty: String,
    pub primary_key: bool,
    pub not_null: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Table {
    pub schema: Option<String>,
    pub name: String,
    pub fields: Vec<Field>,
}

impl Table {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Schema {
    pub tables: Vec<Table>,
}

impl Schema {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }
}

pub struct SchemaParser {
    scanner: Scanner,
}

impl SchemaParser {
    pub fn new(source: &str) -> Self {
        SchemaParser { scanner: Scanner::new(source) }
    }

    pub fn parse(mut self) -> Result<Schema, ParseError> {
        let mut schema = Schema::default();

        while self.scanner.has_next()? {
            let token = self.scanner.peek()?;
            let token2 = self.scanner.peek_after(1)?;

            let is_create = token.is_keyword(&["create"]);
            let is_table = token2.is_keyword(&["table"]);

            if !(is_create && is_table) {
                // not a CREATE TABLE statement - skip to the next semicolon
                loop {
                    let tok = self.scanner.peek()?;
                    if tok.kind == TokenKind::Semicolon {
                        self.scanner.eat()?;
                        break;
                    }
                    if !self.scanner.has_next()? {
                        break;
                    }
                    self.scanner.eat()?;
                }
                continue;
            }

            self.scanner.eat()?; // CREATE
            self.scanner.eat()?; // TABLE
            schema.tables.push(self.parse_table()?);
        }

        Ok(schema)
    }

    fn maybe_quoted_name(&mut self) -> Result<String, ParseError> {
        let token = self.scanner.eat()?;
        match token.kind {
            TokenKind::Identifier => Ok(token.lexeme),
            TokenKind::String => Ok(token.lexeme),
            other => Err(ParseError::new(format!(
                "expected name as identifier or quoted string, got {other}"
            ))
            .with_line(token.line)),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<crate::token::Token, ParseError> {
        let token = self.scanner.eat()?;
        if token.kind != kind {
            return Err(ParseError::new(format!("expected token type {kind}, got {}", token.kind))
                .with_line(token.line));
        }
        Ok(token)
    }

    fn parse_table_schema_and_name(&mut self) -> Result<(Option<String>, String), ParseError> {
        let first = self.maybe_quoted_name()?;
        let next = self.scanner.peek()?;
        if next.kind == TokenKind::Dot {
            self.scanner.eat()?;
            let table_name = self.maybe_quoted_name()?;
            Ok((Some(first), table_name))
        } else {
            Ok((None, first))
        }
    }

    fn parse_table(&mut self) -> Result<Table, ParseError> {
        let (schema, name) = self.parse_table_schema_and_name()?;
        self.expect(TokenKind::LeftParen)?;

        let mut fields = Vec::new();
        loop {
            let token = self.scanner.peek()?;
            if token.kind == TokenKind::RightParen {
                break;
            }
            fields.push(self.parse_field()?);
        }

        self.expect(TokenKind::RightParen)?;
        self.expect(TokenKind::Semicolon)?;

        Ok(Table { schema, name, fields })
    }

    /// Parses one field definition: `name TYPE <free-form options...>`.
    /// Only `PRIMARY KEY`, `NULL`, and `NOT NULL` in the options tail are
    /// recognized; everything else (parenthesis depth tracked) is tolerated
    /// and ignored.
    fn parse_field(&mut self) -> Result<Field, ParseError> {
        let name = self.maybe_quoted_name()?;
        let ty_token = self.expect(TokenKind::Identifier)?;
        let ty = ty_token.lexeme;

        let mut field = Field { name, ty, primary_key: false, not_null: false };

        let mut paren_depth: i32 = 0;
        loop {
            let token = self.scanner.peek()?;
            if paren_depth == 0 && matches!(token.kind, TokenKind::Comma | TokenKind::RightParen) {
                break;
            }

            let token = self.scanner.eat()?;
            match token.kind {
                TokenKind::LeftParen => paren_depth += 1,
                TokenKind::RightParen if paren_depth > 0 => paren_depth -= 1,
                TokenKind::Identifier => match token.lexeme_lowered.as_deref() {
                    Some("primary") => {
                        let next = self.expect(TokenKind::Identifier)?;
                        if next.lexeme_lowered.as_deref() == Some("key") {
                            field.primary_key = true;
                        }
                    }
                    Some("null") => field.not_null = false,
                    Some("not") => {
                        let next = self.expect(TokenKind::Identifier)?;
                        if next.lexeme_lowered.as_deref() == Some("null") {
                            field.not_null = true;
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        if self.scanner.peek()?.kind == TokenKind::Comma {
            self.scanner.eat()?;
        }

        Ok(field)
    }
}

#[cfg_attr(feature = "tracing", tracing::instrument(skip(source), fields(len = source.len())))]
pub fn parse_schema(source: &str) -> Result<Schema, ParseError> {
    let result = SchemaParser::new(source).parse();
    #[cfg(feature = "tracing")]
    if let Ok(schema) = &result {
        tracing::debug!(tables = schema.tables.len(), "parsed schema");
    }
    result
}

//! Driver config file format: `key = "value";` pairs (spec.md §6.1).
//!
//! Ground: `original_source/main.go`'s `parseConfig`, which literally reuses
//! the DSL's own [`Scanner`] to tokenize the config file rather than writing
//! a second lexer.

use crate::error::ConfigError;
use crate::scanner::Scanner;
use crate::token::TokenKind;

/// The four keys the driver recognizes. All are required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub schema_path: String,
    pub query_path: String,
    pub output_path: String,
    pub output_package: String,
}

impl Config {
    fn set(&mut self, key: &str, value: String) -> Result<(), ConfigError> {
        match key {
            "schema_path" => self.schema_path = value,
            "query_path" => self.query_path = value,
            "output_path" => self.output_path = value,
            "output_package" => self.output_package = value,
            other => return Err(ConfigError::UnknownKey { key: other.to_string() }),
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_path.is_empty() {
            return Err(ConfigError::MissingKey { key: "schema_path".into() });
        }
        if self.query_path.is_empty() {
            return Err(ConfigError::MissingKey { key: "query_path".into() });
        }
        if self.output_path.is_empty() {
            return Err(ConfigError::MissingKey { key: "output_path".into() });
        }
        if self.output_package.is_empty() {
            return Err(ConfigError::MissingKey { key: "output_package".into() });
        }
        Ok(())
    }
}

/// Parses `key = "value";` pairs, one per statement, in any order.
#[cfg_attr(feature = "tracing", tracing::instrument(skip(source)))]
pub fn parse_config(source: &str) -> Result<Config, ConfigError> {
    let mut config = Config::default();
    let mut scanner = Scanner::new(source);

    while scanner.has_next() {
        let key_token = scanner.eat().map_err(|e| ConfigError::Syntax(e.into()))?;
        if key_token.kind != TokenKind::Identifier {
            return Err(ConfigError::Syntax(
                crate::error::ParseError::new("expected identifier as config key")
                    .with_line(key_token.line),
            ));
        }

        let equals = scanner.eat().map_err(|e| ConfigError::Syntax(e.into()))?;
        if equals.kind != TokenKind::Equal {
            return Err(ConfigError::Syntax(
                crate::error::ParseError::new("expected '=' after config key").with_line(equals.line),
            ));
        }

        let value_token = scanner.eat().map_err(|e| ConfigError::Syntax(e.into()))?;
        let value = value_token.string_literal().ok_or_else(|| {
            ConfigError::Syntax(
                crate::error::ParseError::new("expected a quoted string value")
                    .with_line(value_token.line),
            )
        })?;

        config.set(&key_token.lexeme, value.to_string())?;

        if scanner.has_next() {
            let next = scanner.peek().map_err(|e| ConfigError::Syntax(e.into()))?;
            if next.kind == TokenKind::Semicolon {
                scanner.eat().map_err(|e| ConfigError::Syntax(e.into()))?;
            }
        }
    }

    config.validate()?;
    Ok(config)
}

//! Core compiler for the sqlforge dynamic SQL query DSL.
//!
//! The pipeline, in order: [`schema`] parses a `CREATE TABLE` DDL file into a
//! [`schema::Schema`]; [`query_parser`] parses a query/fragment file into a
//! [`ast::Queries`]; [`checker`] resolves and annotates that tree against the
//! schema in place; [`emit`] turns each checked query into Rust source text.
//! [`config`] reads the driver's own config file format.

pub mod ast;
pub mod checker;
pub mod config;
pub mod emit;
pub mod error;
pub mod query_parser;
pub mod scanner;
pub mod schema;
pub mod token;

pub use ast::{
    BinaryOp, ExprKind, Expression, FieldRef, IfBranch, Join, JoinKind, LiteralKind, Param,
    ParamType, Queries, Query, SelectStmt,
};
pub use checker::check_all;
pub use config::{parse_config, Config};
pub use emit::{emit_module, Emitter, RustEmitter, Value};
pub use error::{CheckError, ConfigError, EmitError, ParseError, QueryCheckError, ScanError};
pub use query_parser::parse_queries;
pub use schema::{parse_schema, Field, Schema, Table};
pub use token::{Token, TokenKind};

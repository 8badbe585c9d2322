//! Code emission (spec.md §4.5).
//!
//! Generalizes spec.md's "modeled as a pluggable emitter interface" note into
//! an actual trait with one concrete implementor, [`rust_emitter::RustEmitter`],
//! which emits Rust source for each checked query: a `fn query_Xxx(input)
//! -> (String, Vec<Value>)` that builds the SQL text and bind argument vector
//! at the *generated* function's own runtime (ground:
//! `original_source/generate.go`'s `Generator`).

pub mod rust_emitter;

pub use rust_emitter::RustEmitter;

use crate::ast::{Query, Queries};
use crate::error::EmitError;

/// A target-language code emitter. `sqlforge` ships one implementation
/// ([`RustEmitter`]); the trait exists so the checked AST -> source-text step
/// is not hard-wired to a single target, per spec.md §4.5.
pub trait Emitter {
    fn emit_query(&mut self, query: &Query) -> Result<String, EmitError>;
}

/// The runtime bind-argument representation (spec.md §6.4 "emitted
/// artifact"). The original Go compiler binds into `[]interface{}`; sqlforge
/// uses a closed sum type instead of `dyn Any`, matching the corpus's general
/// preference for tagged-union polymorphism (spec.md §9).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
}

/// Emits every non-fragment query in `queries` through `emitter`, joined into
/// one module body. Fragments never reach an emitter directly — they are
/// inlined at `{include}` sites during checking (spec.md §4.4 Invariant 2).
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(queries = queries.queries.len())))]
pub fn emit_module(emitter: &mut impl Emitter, queries: &Queries) -> Result<String, EmitError> {
    let mut out = String::new();
    out.push_str("// Code generated by sqlforge. DO NOT EDIT.\n\n");
    out.push_str("#[derive(Debug, Clone, PartialEq)]\npub enum Value {\n    Str(String),\n    Int(i64),\n}\n\n");

    for query in &queries.queries {
        if query.is_fragment {
            continue;
        }
        out.push_str(&emitter.emit_query(query)?);
        out.push('\n');
    }

    Ok(out)
}

//! `--dump-ast json` support (ambient debug tooling, SPEC_FULL.md §1
//! ambient-stack addition; grounded in `flowscope-core::types`'s pervasive
//! `serde`/`schemars` derives on its AST-adjacent types).

use anyhow::{Context, Result};
use sqlforge_core::Queries;

/// Serializes the checked query AST as pretty-printed JSON.
pub fn dump_ast_json(queries: &Queries) -> Result<String> {
    serde_json::to_string_pretty(queries).context("failed to serialize query AST as JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlforge_core::{check_all, parse_queries, parse_schema};

    #[test]
    fn dumps_checked_ast_as_json() {
        let schema = parse_schema("CREATE TABLE authors (id BIGSERIAL PRIMARY KEY);").unwrap();
        let mut queries = parse_queries("query Foo { SELECT id FROM authors }").unwrap();
        check_all(&mut queries, &schema).unwrap();
        let json = dump_ast_json(&queries).unwrap();
        assert!(json.contains("\"name\": \"Foo\""));
    }
}

//! End-to-end pipeline tests: schema -> queries -> check -> emit, covering
//! spec.md §8's round-trip scenarios 1-6 and the named error scenarios.
//!
//! These are deliberately plain string assertions rather than snapshots:
//! the generated Rust text embeds a monotonic temp/local counter and
//! runtime `argIndex` bookkeeping whose exact layout is an implementation
//! detail, so tests assert on the load-bearing substrings spec.md actually
//! promises (placeholder numbering, arg order, presence/absence of clauses)
//! instead of whole-file equality.

use sqlforge_core::{check_all, emit_module, parse_queries, parse_schema, Emitter, RustEmitter};

const AUTHORS_SCHEMA: &str = r#"
CREATE TABLE authors (
    id BIGSERIAL PRIMARY KEY,
    first_name text NOT NULL,
    last_name text NOT NULL,
    alias text NOT NULL,
    bio text
);
"#;

fn emit(query_src: &str) -> String {
    let schema = parse_schema(AUTHORS_SCHEMA).expect("schema parses");
    let mut queries = parse_queries(query_src).expect("queries parse");
    check_all(&mut queries, &schema).expect("queries check");
    let mut emitter = RustEmitter::new();
    emit_module(&mut emitter, &queries).expect("queries emit")
}

fn expect_check_error(query_src: &str) -> String {
    let schema = parse_schema(AUTHORS_SCHEMA).expect("schema parses");
    let mut queries = parse_queries(query_src).expect("queries parse");
    let errors = check_all(&mut queries, &schema).expect_err("expected check errors");
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
}

#[test]
fn scenario_1_simple_literal_where_has_no_input_and_no_placeholders() {
    let source = emit("query GetAuthorById { SELECT id FROM authors WHERE id = 5 }");
    assert!(source.contains("pub fn query_GetAuthorById() -> (String, Vec<Value>)"));
    assert!(!source.contains("GetAuthorByIdInput"));
    assert!(source.contains("id = 5"));
    assert!(!source.contains('$'));
}

#[test]
fn scenario_2_required_typed_variable_binds_a_single_placeholder() {
    let source = emit(
        "query GetAuthorById(id: string!) { SELECT id FROM authors WHERE id = {id} LIMIT 1 }",
    );
    assert!(source.contains("pub struct GetAuthorByIdInput"));
    assert!(source.contains("pub id: String,"));
    assert!(source.contains("LIMIT 1"));
    assert!(source.contains("Value::Str(input.id.clone())"));
    // a single bound variable always renders as a runtime-numbered placeholder.
    assert!(source.contains("arg_index"));
}

#[test]
fn scenario_3_optional_where_is_skipped_entirely_when_absent_at_runtime() {
    let source = emit(
        "query GetAuthorById(id: string?) { SELECT id FROM authors WHERE id = {id} LIMIT 1 }",
    );
    assert!(source.contains("Option<String>"));
    assert!(source.contains("if let Some(v1) = &input.id"));
    // the WHERE keyword itself must be conditional on the guarded group being non-empty,
    // not hard-coded, so that "id=nil" drops the whole clause rather than just its body.
    assert!(source.contains("WHERE"));
    assert!(source.contains("LIMIT 1"));
}

#[test]
fn scenario_4_foreach_emits_one_loop_contributing_four_placeholders_per_element() {
    let source = emit(
        r#"query SearchAuthors(bioLike: string, queries: [string]) {
            SELECT id FROM authors
            WHERE bio like {bioLike} AND {foreach q in queries: OR}
                (first_name = {q} OR last_name = {q} OR alias = {q} OR bio like {q})
            {end}
        }"#,
    );
    assert!(source.contains("pub queries: Vec<String>,"));
    assert!(source.contains("for local1_q in input.queries.iter()"));
    // four distinct uses of the iterator variable inside the loop body.
    assert_eq!(source.matches("Value::Str(local1_q.clone())").count(), 4);
    assert!(source.contains("Value::Str(input.bioLike.clone())"));
}

#[test]
fn scenario_5_fragment_include_inlines_body_and_respects_optional_arg() {
    let source = emit(
        r#"
        fragment BioLikeFrag(bioLikeOptional: string?) { bio LIKE {bioLikeOptional} }
        query GetAuthorById(id: string!, bioLikeOptional: string?) {
            SELECT id FROM authors WHERE id = {id} AND {include BioLikeFrag(bioLikeOptional)}
        }
        "#,
    );
    assert!(source.contains("pub struct GetAuthorByIdInput"));
    assert!(!source.contains("BioLikeFragInput"));
    assert!(source.contains("bio LIKE"));
    assert!(source.contains("if let Some"));
}

#[test]
fn scenario_6_if_else_if_else_chain_with_is_null() {
    let source = emit(
        r#"query GetAuthorById(bioOptional: string?) {
            SELECT id FROM authors
            WHERE
                {if bioOptional IS NULL}
                    bio IS NULL
                {else if bioOptional = "specialValue"}
                {else}
                    bio = {bioOptional}
                {end}
        }"#,
    );
    assert!(source.contains("if input.bioOptional.is_none()"));
    assert!(source.contains("bio IS NULL"));
    assert!(source.contains("else if input.bioOptional.as_deref() == Some(\"specialValue\")"));
    assert!(source.contains("else {"));
    assert!(source.contains("bio = "));
}

#[test]
fn unknown_table_is_reported_and_nothing_is_emitted() {
    let errors = expect_check_error("query Foo { SELECT id FROM nonexistent }");
    assert!(errors.contains("unknown table"), "got: {errors}");
}

#[test]
fn unknown_field_is_reported() {
    let errors = expect_check_error("query Foo { SELECT ghost FROM authors }");
    assert!(errors.contains("unknown field") || errors.contains("ghost"), "got: {errors}");
}

#[test]
fn ambiguous_field_across_joins_is_reported() {
    // both sides of the join expose an `id` column; an unqualified reference is ambiguous.
    let errors = expect_check_error(
        "query Foo { SELECT id FROM authors JOIN authors as other ON authors.id = other.id }",
    );
    assert!(errors.to_lowercase().contains("ambiguous"), "got: {errors}");
}

#[test]
fn unknown_fragment_include_is_reported() {
    let errors = expect_check_error(
        "query Foo(a: string) { SELECT id FROM authors WHERE {include Missing(a)} }",
    );
    assert!(errors.contains("unknown fragment"), "got: {errors}");
}

#[test]
fn fragment_arity_mismatch_is_reported() {
    let errors = expect_check_error(
        r#"
        fragment F(a: string, b: string) { a = {a} }
        query Foo(a: string) { SELECT id FROM authors WHERE {include F(a)} }
        "#,
    );
    assert!(errors.to_lowercase().contains("arity") || errors.contains("argument"), "got: {errors}");
}

#[test]
fn fragment_argument_type_mismatch_is_reported() {
    let errors = expect_check_error(
        r#"
        fragment F(a: int) { bio like {a} }
        query Foo(a: string) { SELECT id FROM authors WHERE {include F(a)} }
        "#,
    );
    assert!(errors.to_lowercase().contains("type"), "got: {errors}");
}

#[test]
fn foreach_over_non_list_param_is_reported() {
    let errors = expect_check_error(
        "query Foo(id: string) { SELECT id FROM authors WHERE {foreach x in id: OR} bio like {x} {end} }",
    );
    assert!(errors.to_lowercase().contains("list"), "got: {errors}");
}

#[test]
fn negative_limit_is_rejected() {
    // the grammar has no unary minus on number literals, so a negative LIMIT
    // can only arise from a tree built by something other than the parser;
    // exercise the checker directly the way its own unit tests do.
    let schema = parse_schema(AUTHORS_SCHEMA).expect("schema parses");
    let mut queries = parse_queries("query Foo { SELECT id FROM authors }").expect("queries parse");
    queries.queries[0].select.as_mut().unwrap().limit = Some(-1);
    let errors = check_all(&mut queries, &schema).expect_err("expected a negative-limit error");
    let message = errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n");
    assert!(message.to_lowercase().contains("limit"), "got: {message}");
}

//! Semantic checker and fragment expander (spec.md §4.4).
//!
//! Walks each non-fragment query's expression tree, resolving field and
//! parameter references against the schema and the query's declared
//! parameters, mutating the tree in place: `Variable` literals are rewritten
//! to their resolved global name, `ForLoop` bindings get a freshly minted
//! `localN_<name>` identifier, and `Fragment` nodes are replaced by a
//! deep-copied, independently-checked copy of the referenced fragment body.
//!
//! Grounded in `original_source/check.go`, generalized from single-table
//! scope to join-aware `TableBinding` scope resolution (qualified and
//! unqualified field lookup, ambiguous-field detection) since sqlforge's
//! grammar supports `JOIN`, which the original compiler's single-table
//! version never had to resolve.

use std::collections::HashMap;

use crate::ast::{Expression, ExprKind, FieldRef, LiteralKind, Param, Query, Queries};
use crate::error::{CheckError, QueryCheckError};
use crate::schema::{Schema, Table};

struct TableBinding<'a> {
    alias: String,
    table: &'a Table,
}

struct Scope<'a> {
    schema: &'a Schema,
    fragments: &'a HashMap<String, Query>,
    tables: Vec<TableBinding<'a>>,
    query_params: HashMap<String, Param>,
    locals: Vec<Param>,
    local_index: usize,
}

impl<'a> Scope<'a> {
    fn resolve_param(&self, name: &str) -> Result<Param, CheckError> {
        if let Some(param) = self.locals.iter().rev().find(|p| p.name == name) {
            return Ok(param.clone());
        }
        if let Some(param) = self.query_params.get(name) {
            return Ok(param.clone());
        }
        Err(CheckError::UnknownParam { name: name.to_string() })
    }

    fn check_field(&self, field: &FieldRef) -> Result<(), CheckError> {
        if let Some(table) = &field.table {
            let binding = self
                .tables
                .iter()
                .find(|b| b.alias.eq_ignore_ascii_case(table))
                .ok_or_else(|| CheckError::UnknownTable { table: table.clone() })?;
            if field.star {
                return Ok(());
            }
            binding
                .table
                .field(&field.name)
                .map(|_| ())
                .ok_or_else(|| CheckError::UnknownField { field: field.name.clone() })
        } else if field.star {
            Ok(())
        } else {
            let matches: Vec<&TableBinding> =
                self.tables.iter().filter(|b| b.table.field(&field.name).is_some()).collect();
            match matches.len() {
                0 => Err(CheckError::UnknownField { field: field.name.clone() }),
                1 => Ok(()),
                _ => Err(CheckError::AmbiguousField { field: field.name.clone() }),
            }
        }
    }

    fn mint_local(&mut self, name: &str) -> String {
        self.local_index += 1;
        format!("local{}_{name}", self.local_index)
    }

    fn expand_fragment(&mut self, name: &str, args: &[String]) -> Result<Expression, CheckError> {
        let fragment = self
            .fragments
            .get(name)
            .cloned()
            .ok_or_else(|| CheckError::UnknownFragment { name: name.to_string() })?;

        if fragment.params.len() != args.len() {
            return Err(CheckError::FragmentParamArity {
                fragment: name.to_string(),
                expected: fragment.params.len(),
                got: args.len(),
            });
        }

        let mut locals = Vec::with_capacity(fragment.params.len());
        for (index, (fragment_param, arg_name)) in fragment.params.iter().zip(args).enumerate() {
            let resolved = self.resolve_param(arg_name)?;
            if resolved.ty != fragment_param.ty {
                return Err(CheckError::FragmentParamType { fragment: name.to_string(), index });
            }
            locals.push(Param {
                name: fragment_param.name.clone(),
                ty: resolved.ty,
                required: resolved.required,
                is_list: resolved.is_list,
                query_scoped: resolved.query_scoped,
                global_name: resolved.global_name,
            });
        }

        let mut fragment_scope = Scope {
            schema: self.schema,
            fragments: self.fragments,
            tables: std::mem::take(&mut self.tables),
            query_params: HashMap::new(),
            locals,
            local_index: self.local_index,
        };

        let mut body =
            fragment.fragment_body.clone().expect("fragment query always has a body");
        let result = check_expr(&mut body, &mut fragment_scope);
        self.tables = fragment_scope.tables;
        self.local_index = fragment_scope.local_index;
        result?;

        Ok(body)
    }
}

fn check_expr(expr: &mut Expression, scope: &mut Scope) -> Result<(), CheckError> {
    if let ExprKind::Fragment { name, args } = &expr.kind {
        let name = name.clone();
        let args = args.clone();
        let replaced = scope.expand_fragment(&name, &args)?;
        *expr = replaced;
        return Ok(());
    }

    match &mut expr.kind {
        ExprKind::Binary { left, right, .. } => {
            check_expr(left, scope)?;
            check_expr(right, scope)?;
            expr.is_clause_required = left.is_clause_required || right.is_clause_required;
        }
        ExprKind::Literal(LiteralKind::Field(field)) => {
            scope.check_field(field)?;
            expr.is_clause_required = true;
        }
        ExprKind::Literal(LiteralKind::Variable(name)) => {
            let param = scope.resolve_param(name)?;
            *name = param.global_name.clone();
            expr.is_clause_required = param.required;
            expr.is_query_scoped = param.query_scoped;
        }
        ExprKind::Literal(LiteralKind::Number(_) | LiteralKind::String(_) | LiteralKind::Null) => {
            expr.is_clause_required = true;
        }
        ExprKind::If { branches, else_body } => {
            for branch in branches.iter_mut() {
                check_expr(&mut branch.condition, scope)?;
                if let Some(body) = branch.body.as_mut() {
                    check_expr(body, scope)?;
                }
            }
            if let Some(body) = else_body.as_mut() {
                check_expr(body, scope)?;
            }
        }
        ExprKind::ForLoop { iterator_name, iterable_name, body, .. } => {
            let param = scope.resolve_param(iterable_name)?;
            if !param.is_list {
                return Err(CheckError::RangeVarNotList { name: iterable_name.clone() });
            }

            let minted = scope.mint_local(iterator_name);
            *iterable_name = param.global_name.clone();

            scope.locals.push(Param {
                name: iterator_name.clone(),
                ty: param.ty,
                required: true,
                is_list: false,
                query_scoped: false,
                global_name: minted.clone(),
            });
            *iterator_name = minted;

            let result = check_expr(body, scope);
            scope.locals.pop();
            result?;
        }
        ExprKind::Fragment { .. } => unreachable!("handled above"),
    }

    Ok(())
}

fn check_query(
    query: &mut Query,
    schema: &Schema,
    fragments: &HashMap<String, Query>,
) -> Result<(), Vec<CheckError>> {
    let mut errors = Vec::new();

    let select = match query.select.as_mut() {
        Some(select) => select,
        None => {
            errors.push(CheckError::MissingTable { query: query.name.clone() });
            return Err(errors);
        }
    };

    let mut tables = Vec::new();
    match schema.table(&select.from) {
        Some(table) => tables.push(TableBinding {
            alias: select.from_alias.clone().unwrap_or_else(|| select.from.clone()),
            table,
        }),
        None => errors.push(CheckError::UnknownTable { table: select.from.clone() }),
    }

    let query_params: HashMap<String, Param> =
        query.params.iter().map(|p| (p.name.clone(), p.clone())).collect();
    let mut local_index = 0usize;

    for join in select.joins.iter_mut() {
        match schema.table(&join.table) {
            Some(table) => tables.push(TableBinding {
                alias: join.alias.clone().unwrap_or_else(|| join.table.clone()),
                table,
            }),
            None => {
                errors.push(CheckError::UnknownTable { table: join.table.clone() });
                continue;
            }
        }

        let mut scope = Scope {
            schema,
            fragments,
            tables,
            query_params: query_params.clone(),
            locals: Vec::new(),
            local_index,
        };
        let result = check_expr(&mut join.on, &mut scope);
        tables = scope.tables;
        local_index = scope.local_index;
        if let Err(e) = result {
            errors.push(e);
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let mut scope =
        Scope { schema, fragments, tables, query_params, locals: Vec::new(), local_index };

    if let Some(where_clause) = select.where_clause.as_mut() {
        if let Err(e) = check_expr(where_clause, &mut scope) {
            errors.push(e);
        }
    }

    for field in select.fields.iter().chain(select.order_by.iter()) {
        if let Err(e) = scope.check_field(field) {
            errors.push(e);
        }
    }

    if let Some(limit) = select.limit {
        if limit < 0 {
            errors.push(CheckError::NegativeLimit);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks every non-fragment query in `queries` against `schema`, mutating
/// the tree in place. Fragments are never checked standalone — only when
/// expanded at an `{include}` site, against the caller's parameter scope.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(queries = queries.queries.len())))]
pub fn check_all(queries: &mut Queries, schema: &Schema) -> Result<(), Vec<QueryCheckError>> {
    let mut fragments = HashMap::new();
    for query in &queries.queries {
        if query.is_fragment {
            fragments.insert(query.name.clone(), query.clone());
        }
    }

    let mut errors = Vec::new();
    for query in queries.queries.iter_mut().filter(|q| !q.is_fragment) {
        if let Err(errs) = check_query(query, schema, &fragments) {
            let name = query.name.clone();
            errors.extend(errs.into_iter().map(|error| QueryCheckError { query: name.clone(), error }));
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(error_count = errors.len(), "checked all queries");

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_parser::parse_queries;
    use crate::schema::parse_schema;

    const AUTHORS_SCHEMA: &str = r#"
        CREATE TABLE authors (
            id BIGSERIAL PRIMARY KEY,
            first_name text NOT NULL,
            last_name text NOT NULL,
            alias text NOT NULL,
            bio text
        );
    "#;

    fn schema() -> Schema {
        parse_schema(AUTHORS_SCHEMA).unwrap()
    }

    #[test]
    fn accepts_simple_query() {
        let schema = schema();
        let mut queries = parse_queries("query Foo { SELECT id FROM authors WHERE id = 5 }").unwrap();
        assert!(check_all(&mut queries, &schema).is_ok());
    }

    #[test]
    fn rejects_unknown_table() {
        let schema = schema();
        let mut queries = parse_queries("query Foo { SELECT id FROM nopers WHERE id = 5 }").unwrap();
        let errors = check_all(&mut queries, &schema).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].error, CheckError::UnknownTable { .. }));
    }

    #[test]
    fn rejects_unknown_field() {
        let schema = schema();
        let mut queries =
            parse_queries("query Foo { SELECT id FROM authors WHERE nope = 5 }").unwrap();
        let errors = check_all(&mut queries, &schema).unwrap_err();
        assert!(matches!(errors[0].error, CheckError::UnknownField { .. }));
    }

    #[test]
    fn rewrites_variable_to_global_name() {
        let schema = schema();
        let mut queries =
            parse_queries("query Foo(id: string!) { SELECT id FROM authors WHERE id = {id} }")
                .unwrap();
        check_all(&mut queries, &schema).unwrap();
        let select = queries.queries[0].select.as_ref().unwrap();
        match &select.where_clause.as_ref().unwrap().kind {
            ExprKind::Binary { right, .. } => match &right.kind {
                ExprKind::Literal(LiteralKind::Variable(name)) => assert_eq!(name, "input.id"),
                other => panic!("expected Variable, got {other:?}"),
            },
            other => panic!("expected Binary, got {other:?}"),
        }
    }

    #[test]
    fn required_any_propagates_through_or() {
        let schema = schema();
        let mut queries = parse_queries(
            "query Foo(id: string?, id2: string?) { SELECT id FROM authors WHERE id = {id} OR id = {id2} }",
        )
        .unwrap();
        check_all(&mut queries, &schema).unwrap();
        let select = queries.queries[0].select.as_ref().unwrap();
        let top = select.where_clause.as_ref().unwrap();
        // both operands optional -> OR as a whole is not clause-required
        assert!(!top.is_clause_required);
    }

    #[test]
    fn foreach_mints_unique_local_name_and_rewrites_iterable() {
        let schema = schema();
        let mut queries = parse_queries(
            "query Foo(queries: [string]) { SELECT id FROM authors WHERE {foreach q in queries: OR} bio like {q} {end} }",
        )
        .unwrap();
        check_all(&mut queries, &schema).unwrap();
        let select = queries.queries[0].select.as_ref().unwrap();
        match &select.where_clause.as_ref().unwrap().kind {
            ExprKind::ForLoop { iterator_name, iterable_name, .. } => {
                assert_eq!(iterable_name, "input.queries");
                assert!(iterator_name.starts_with("local1_q"));
            }
            other => panic!("expected ForLoop, got {other:?}"),
        }
    }

    #[test]
    fn foreach_over_non_list_param_is_rejected() {
        let schema = schema();
        let mut queries = parse_queries(
            "query Foo(id: string!) { SELECT id FROM authors WHERE {foreach q in id: OR} bio like {q} {end} }",
        )
        .unwrap();
        let errors = check_all(&mut queries, &schema).unwrap_err();
        assert!(matches!(errors[0].error, CheckError::RangeVarNotList { .. }));
    }

    #[test]
    fn fragment_expands_and_checks_against_caller_scope() {
        let schema = schema();
        let mut queries = parse_queries(
            r#"
            fragment AuthorFragment(bioLike2: string, bioLikeOptional2: string?) {
                bio like {bioLike2} or bio like {bioLikeOptional2}
            }
            query Foo(bioLike: string, bioOptional: string?) {
                SELECT id FROM authors WHERE id = 1 AND {include AuthorFragment(bioLike, bioOptional)}
            }
            "#,
        )
        .unwrap();
        check_all(&mut queries, &schema).unwrap();

        let foo = queries.queries.iter().find(|q| q.name == "Foo").unwrap();
        let select = foo.select.as_ref().unwrap();
        match &select.where_clause.as_ref().unwrap().kind {
            ExprKind::Binary { right, .. } => match &right.kind {
                ExprKind::Binary { op, left, right } => {
                    assert_eq!(*op, crate::ast::BinaryOp::Or);
                    match &left.kind {
                        ExprKind::Literal(LiteralKind::Variable(name)) => {
                            assert_eq!(name, "input.bioLike")
                        }
                        other => panic!("unexpected {other:?}"),
                    }
                    match &right.kind {
                        ExprKind::Literal(LiteralKind::Variable(name)) => {
                            assert_eq!(name, "input.bioOptional")
                        }
                        other => panic!("unexpected {other:?}"),
                    }
                }
                other => panic!("expected fragment body Binary, got {other:?}"),
            },
            other => panic!("expected Binary, got {other:?}"),
        }
    }

    #[test]
    fn fragment_arity_mismatch_is_an_error() {
        let schema = schema();
        let mut queries = parse_queries(
            r#"
            fragment F(a: string) { bio like {a} }
            query Foo(x: string, y: string) { SELECT id FROM authors WHERE {include F(x, y)} }
            "#,
        )
        .unwrap();
        let errors = check_all(&mut queries, &schema).unwrap_err();
        assert!(matches!(errors[0].error, CheckError::FragmentParamArity { .. }));
    }

    #[test]
    fn fragment_type_mismatch_is_an_error() {
        let schema = schema();
        let mut queries = parse_queries(
            r#"
            fragment F(a: string) { bio like {a} }
            query Foo(x: int) { SELECT id FROM authors WHERE {include F(x)} }
            "#,
        )
        .unwrap();
        let errors = check_all(&mut queries, &schema).unwrap_err();
        assert!(matches!(errors[0].error, CheckError::FragmentParamType { .. }));
    }

    #[test]
    fn unknown_fragment_is_an_error() {
        let schema = schema();
        let mut queries =
            parse_queries("query Foo { SELECT id FROM authors WHERE {include Typo()} }").unwrap();
        let errors = check_all(&mut queries, &schema).unwrap_err();
        assert!(matches!(errors[0].error, CheckError::UnknownFragment { .. }));
    }

    #[test]
    fn join_scope_resolves_qualified_and_detects_ambiguity() {
        let mut schema = schema();
        schema.tables.push(crate::schema::Table {
            schema: None,
            name: "books".into(),
            fields: vec![
                crate::schema::Field {
                    name: "id".into(),
                    ty: "bigserial".into(),
                    primary_key: true,
                    not_null: true,
                },
                crate::schema::Field {
                    name: "author_id".into(),
                    ty: "bigint".into(),
                    primary_key: false,
                    not_null: true,
                },
            ],
        });

        let mut ok = parse_queries(
            "query Foo { SELECT authors.id FROM authors JOIN books ON books.author_id = authors.id }",
        )
        .unwrap();
        assert!(check_all(&mut ok, &schema).is_ok());

        let mut ambiguous = parse_queries(
            "query Foo { SELECT id FROM authors JOIN books ON books.author_id = authors.id }",
        )
        .unwrap();
        let errors = check_all(&mut ambiguous, &schema).unwrap_err();
        assert!(matches!(errors[0].error, CheckError::AmbiguousField { .. }));
    }

    #[test]
    fn negative_limit_is_rejected() {
        let schema = schema();
        let mut queries = parse_queries("query Foo { SELECT id FROM authors }").unwrap();
        queries.queries[0].select.as_mut().unwrap().limit = Some(-1);
        let errors = check_all(&mut queries, &schema).unwrap_err();
        assert!(matches!(errors[0].error, CheckError::NegativeLimit));
    }
}

//! `RustEmitter`: the one concrete [`crate::emit::Emitter`] implementation.
//!
//! Translates a checked [`Query`] into Rust source text implementing the
//! group-buffer assembly protocol of `original_source/generate.go`'s
//! `Generator`: every dynamic (`Binary` logical, `If`, `ForLoop`) node in the
//! WHERE clause contributes zero-or-one SQL text fragment into a runtime
//! `Vec<String>` "group", closed by joining with its operator and wrapping in
//! parentheses before being pushed into its parent group. Plain comparisons
//! push their fragment directly. The whole SELECT/FROM/JOIN/ORDER BY/LIMIT
//! text outside WHERE is static at codegen time, since nothing in this
//! grammar parameterizes it, and is emitted as a single literal.

use std::collections::HashMap;

use crate::ast::{BinaryOp, Expression, ExprKind, FieldRef, IfBranch, LiteralKind, ParamType, Query};
use crate::error::EmitError;

#[derive(Clone, Copy)]
struct ParamInfo {
    ty: ParamType,
    required: bool,
    /// `true` when the generated identifier already names a reference (`&T`)
    /// rather than an owned/Copy value — true for loop-iterator bindings and
    /// for names bound inside an `if let Some(name) = &...` guard.
    is_reference: bool,
}

enum Operand {
    /// SQL text known at codegen time (field names, numeric/string constants, NULL).
    Inline(String),
    Variable { global_name: String, ty: ParamType, optional: bool, is_reference: bool },
}

enum CondOperand {
    Variable { global_name: String, ty: ParamType, optional: bool },
    Constant(String),
    Null,
}

struct Ctx {
    body: String,
    indent: usize,
    temp_counter: usize,
}

impl Ctx {
    fn new() -> Self {
        Ctx { body: String::new(), indent: 1, temp_counter: 0 }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.body.push_str("    ");
        }
        self.body.push_str(text);
        self.body.push('\n');
    }

    fn enter(&mut self) {
        self.indent += 1;
    }

    fn leave(&mut self) {
        self.indent -= 1;
    }

    fn temp(&mut self, prefix: &str) -> String {
        self.temp_counter += 1;
        format!("{prefix}{}", self.temp_counter)
    }
}

/// Emits Rust source for sqlforge's generated query functions.
#[derive(Default)]
pub struct RustEmitter;

impl RustEmitter {
    pub fn new() -> Self {
        RustEmitter
    }
}

impl super::Emitter for RustEmitter {
    fn emit_query(&mut self, query: &Query) -> Result<String, EmitError> {
        emit_query(query)
    }
}

#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(query = %query.name)))]
fn emit_query(query: &Query) -> Result<String, EmitError> {
    let select = query.select.as_ref().ok_or_else(|| {
        EmitError::FormattingFailed(format!(
            "query {} has no select body (fragments are not emitted directly)",
            query.name
        ))
    })?;

    let mut type_table: HashMap<String, ParamInfo> = HashMap::new();
    for param in &query.params {
        type_table.insert(
            param.global_name.clone(),
            ParamInfo { ty: param.ty, required: param.required, is_reference: false },
        );
    }

    let mut out = String::new();
    let has_params = !query.params.is_empty();

    if has_params {
        out.push_str(&emit_input_struct(query));
        out.push('\n');
    }

    let mut ctx = Ctx::new();

    let signature = if has_params {
        format!("pub fn query_{}(input: &{}Input) -> (String, Vec<Value>) {{", query.name, query.name)
    } else {
        format!("pub fn query_{}() -> (String, Vec<Value>) {{", query.name)
    };
    out.push_str("#[allow(non_snake_case)]\n");
    out.push_str(&signature);
    out.push('\n');

    ctx.line("let mut sql = String::new();");
    ctx.line("let mut args: Vec<Value> = Vec::new();");
    ctx.line("let mut arg_index: usize = 1;");

    let head = render_head(select)?;
    ctx.line(&format!("sql.push_str({});", rust_string_literal(&head)));

    if let Some(where_expr) = &select.where_clause {
        ctx.line("let mut where_group: Vec<String> = Vec::new();");
        let sep = emit_where_root(where_expr, "where_group", &mut ctx, &mut type_table)?;
        ctx.line("if !where_group.is_empty() {");
        ctx.enter();
        ctx.line("sql.push_str(\" WHERE \");");
        ctx.line(&format!("sql.push_str(&where_group.join({}));", rust_string_literal(&sep)));
        ctx.leave();
        ctx.line("}");
    }

    let tail = render_tail(select);
    ctx.line(&format!("sql.push_str({});", rust_string_literal(&tail)));
    ctx.line("(sql, args)");

    out.push_str(&ctx.body);
    out.push_str("}\n");

    Ok(out)
}

fn emit_input_struct(query: &Query) -> String {
    let mut s = String::new();
    s.push_str("#[derive(Debug, Clone)]\n");
    s.push_str(&format!("pub struct {}Input {{\n", query.name));
    for param in &query.params {
        let base = match param.ty {
            ParamType::String => "String",
            ParamType::Int => "i64",
        };
        let ty = if param.is_list {
            format!("Vec<{base}>")
        } else if !param.required {
            format!("Option<{base}>")
        } else {
            base.to_string()
        };
        // Field names mirror the DSL parameter names verbatim: the checker
        // rewrites `Variable` literals to `input.<name>`, so the struct field
        // must match exactly, even when that isn't snake_case.
        s.push_str(&format!("    pub {}: {},\n", param.name, ty));
    }
    s.push_str("}\n");
    s
}

fn render_head(select: &crate::ast::SelectStmt) -> Result<String, EmitError> {
    let mut head = String::new();
    head.push_str("SELECT ");
    head.push_str(&render_field_list(&select.fields));
    head.push_str(" FROM ");
    head.push_str(&select.from);
    if let Some(alias) = &select.from_alias {
        head.push(' ');
        head.push_str(alias);
    }
    for join in &select.joins {
        head.push(' ');
        head.push_str(join.kind.sql_keyword());
        head.push(' ');
        head.push_str(&join.table);
        if let Some(alias) = &join.alias {
            head.push(' ');
            head.push_str(alias);
        }
        head.push_str(" ON ");
        head.push_str(&render_static_condition(&join.on)?);
    }
    Ok(head)
}

fn render_tail(select: &crate::ast::SelectStmt) -> String {
    let mut tail = String::new();
    if !select.order_by.is_empty() {
        tail.push_str(" ORDER BY ");
        let fields: Vec<String> = select.order_by.iter().map(field_sql_text).collect();
        tail.push_str(&fields.join(", "));
    }
    if let Some(limit) = select.limit {
        tail.push_str(&format!(" LIMIT {limit}"));
    }
    tail.push(';');
    tail
}

fn render_field_list(fields: &[FieldRef]) -> String {
    fields
        .iter()
        .map(|f| match &f.alias {
            Some(alias) => format!("{} {}", field_sql_text(f), alias),
            None => field_sql_text(f),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn field_sql_text(field: &FieldRef) -> String {
    let name = if field.star { "*".to_string() } else { field.name.clone() };
    match &field.table {
        Some(table) => format!("{table}.{name}"),
        None => name,
    }
}

fn render_static_condition(expr: &Expression) -> Result<String, EmitError> {
    match &expr.kind {
        ExprKind::Binary { op, left, right } if op.is_logical() => {
            Ok(format!(
                "{} {} {}",
                render_static_condition(left)?,
                op.sql_symbol(),
                render_static_condition(right)?
            ))
        }
        ExprKind::Binary { op, left, right } => {
            Ok(format!("{} {} {}", render_static_operand(left)?, op.sql_symbol(), render_static_operand(right)?))
        }
        _ => Err(EmitError::FormattingFailed("unsupported JOIN ON clause shape".into())),
    }
}

fn render_static_operand(expr: &Expression) -> Result<String, EmitError> {
    match &expr.kind {
        ExprKind::Literal(LiteralKind::Field(f)) => Ok(field_sql_text(f)),
        ExprKind::Literal(LiteralKind::Number(n)) => Ok(n.to_string()),
        ExprKind::Literal(LiteralKind::String(s)) => Ok(sql_string_literal(s)),
        ExprKind::Literal(LiteralKind::Null) => Ok("NULL".to_string()),
        ExprKind::Literal(LiteralKind::Variable(_)) => {
            Err(EmitError::FormattingFailed("JOIN ON clauses may not reference query parameters".into()))
        }
        _ => Err(EmitError::FormattingFailed("unsupported JOIN ON clause operand".into())),
    }
}

/// Emits the WHERE clause's root expression. Unlike every nested logical
/// `Binary`, the root's two sides are pushed directly into `where_group`
/// rather than wrapped in an extra parenthesized layer — returns the
/// separator (`" AND "`, `" OR "`, or `""` for a non-logical root) the caller
/// should join `where_group` with.
fn emit_where_root(
    expr: &Expression,
    group_var: &str,
    ctx: &mut Ctx,
    type_table: &mut HashMap<String, ParamInfo>,
) -> Result<String, EmitError> {
    if let ExprKind::Binary { op, left, right } = &expr.kind {
        if op.is_logical() {
            emit_bool(left, group_var, ctx, type_table)?;
            emit_bool(right, group_var, ctx, type_table)?;
            return Ok(format!(" {} ", op.sql_symbol()));
        }
    }
    emit_bool(expr, group_var, ctx, type_table)?;
    Ok(String::new())
}

fn emit_bool(
    expr: &Expression,
    group_var: &str,
    ctx: &mut Ctx,
    type_table: &mut HashMap<String, ParamInfo>,
) -> Result<(), EmitError> {
    match &expr.kind {
        ExprKind::Binary { op, left, right } if op.is_logical() => {
            let g = ctx.temp("group");
            ctx.line(&format!("let mut {g}: Vec<String> = Vec::new();"));
            emit_bool(left, &g, ctx, type_table)?;
            emit_bool(right, &g, ctx, type_table)?;
            ctx.line(&format!("if !{g}.is_empty() {{"));
            ctx.enter();
            let sep = rust_string_literal(&format!(" {} ", op.sql_symbol()));
            ctx.line(&format!("{group_var}.push(format!(\"({{}})\", {g}.join({sep})));"));
            ctx.leave();
            ctx.line("}");
        }
        ExprKind::Binary { op, left, right } => {
            emit_comparison(*op, left, right, group_var, ctx, type_table)?;
        }
        ExprKind::If { branches, else_body } => {
            emit_if(branches, else_body.as_deref(), group_var, ctx, type_table)?;
        }
        ExprKind::ForLoop { iterator_name, iterable_name, join_by_or, body } => {
            emit_for_loop(iterator_name, iterable_name, *join_by_or, body, group_var, ctx, type_table)?;
        }
        ExprKind::Literal(_) => {
            return Err(EmitError::FormattingFailed(
                "a bare literal cannot stand alone as a boolean clause".into(),
            ));
        }
        ExprKind::Fragment { .. } => {
            panic!("unexpanded fragment reached the emitter: checker invariant violated");
        }
    }
    Ok(())
}

fn resolve_operand(expr: &Expression, type_table: &HashMap<String, ParamInfo>) -> Result<Operand, EmitError> {
    match &expr.kind {
        ExprKind::Literal(LiteralKind::Field(f)) => Ok(Operand::Inline(field_sql_text(f))),
        ExprKind::Literal(LiteralKind::Number(n)) => Ok(Operand::Inline(n.to_string())),
        ExprKind::Literal(LiteralKind::String(s)) => Ok(Operand::Inline(sql_string_literal(s))),
        ExprKind::Literal(LiteralKind::Null) => Ok(Operand::Inline("NULL".to_string())),
        ExprKind::Literal(LiteralKind::Variable(name)) => {
            let info = type_table
                .get(name)
                .ok_or_else(|| EmitError::FormattingFailed(format!("unresolved variable: {name}")))?;
            Ok(Operand::Variable {
                global_name: name.clone(),
                ty: info.ty,
                optional: !info.required,
                is_reference: info.is_reference,
            })
        }
        _ => Err(EmitError::FormattingFailed("comparison operand must be a literal".into())),
    }
}

fn emit_comparison(
    op: BinaryOp,
    left: &Expression,
    right: &Expression,
    group_var: &str,
    ctx: &mut Ctx,
    type_table: &HashMap<String, ParamInfo>,
) -> Result<(), EmitError> {
    let l = resolve_operand(left, type_table)?;
    let r = resolve_operand(right, type_table)?;

    let mut depth = 0;
    let l_bound = open_optional_guard(&l, ctx, &mut depth);
    let r_bound = open_optional_guard(&r, ctx, &mut depth);

    let frag = ctx.temp("frag");
    ctx.line(&format!("let mut {frag} = String::new();"));
    push_operand_text(&l, l_bound.as_deref(), &frag, ctx);
    ctx.line(&format!("{frag}.push_str({});", rust_string_literal(&format!(" {} ", op.sql_symbol()))));
    push_operand_text(&r, r_bound.as_deref(), &frag, ctx);
    ctx.line(&format!("{group_var}.push({frag});"));

    for _ in 0..depth {
        ctx.leave();
        ctx.line("}");
    }

    Ok(())
}

fn open_optional_guard(operand: &Operand, ctx: &mut Ctx, depth: &mut usize) -> Option<String> {
    if let Operand::Variable { optional: true, global_name, .. } = operand {
        let bound = ctx.temp("v");
        ctx.line(&format!("if let Some({bound}) = &{global_name} {{"));
        ctx.enter();
        *depth += 1;
        Some(bound)
    } else {
        None
    }
}

fn push_operand_text(operand: &Operand, bound_override: Option<&str>, frag_var: &str, ctx: &mut Ctx) {
    match operand {
        Operand::Inline(text) => {
            ctx.line(&format!("{frag_var}.push_str({});", rust_string_literal(text)));
        }
        Operand::Variable { global_name, ty, is_reference, .. } => {
            let value_ref = bound_override.unwrap_or(global_name.as_str());
            let reference = bound_override.is_some() || *is_reference;
            ctx.line(&format!("{frag_var}.push_str(&format!(\"${{}}\", arg_index));"));
            let value_expr = match ty {
                ParamType::String => format!("{value_ref}.clone()"),
                ParamType::Int if reference => format!("*{value_ref}"),
                ParamType::Int => value_ref.to_string(),
            };
            let ctor = match ty {
                ParamType::String => "Str",
                ParamType::Int => "Int",
            };
            ctx.line(&format!("args.push(Value::{ctor}({value_expr}));"));
            ctx.line("arg_index += 1;");
        }
    }
}

fn emit_for_loop(
    iterator_name: &str,
    iterable_name: &str,
    join_by_or: bool,
    body: &Expression,
    group_var: &str,
    ctx: &mut Ctx,
    type_table: &mut HashMap<String, ParamInfo>,
) -> Result<(), EmitError> {
    let info = *type_table
        .get(iterable_name)
        .ok_or_else(|| EmitError::FormattingFailed(format!("unresolved range variable: {iterable_name}")))?;

    let loop_group = ctx.temp("loop_group");
    ctx.line(&format!("let mut {loop_group}: Vec<String> = Vec::with_capacity({iterable_name}.len());"));
    ctx.line(&format!("for {iterator_name} in {iterable_name}.iter() {{"));
    ctx.enter();

    let iter_group = ctx.temp("iter_group");
    ctx.line(&format!("let mut {iter_group}: Vec<String> = Vec::new();"));

    type_table.insert(
        iterator_name.to_string(),
        ParamInfo { ty: info.ty, required: true, is_reference: true },
    );
    emit_bool(body, &iter_group, ctx, type_table)?;

    ctx.line(&format!("if !{iter_group}.is_empty() {{"));
    ctx.enter();
    ctx.line(&format!("{loop_group}.push({iter_group}.join(\"\"));"));
    ctx.leave();
    ctx.line("}");

    ctx.leave();
    ctx.line("}");

    ctx.line(&format!("if !{loop_group}.is_empty() {{"));
    ctx.enter();
    let sep = rust_string_literal(if join_by_or { " OR " } else { " AND " });
    ctx.line(&format!("{group_var}.push(format!(\"({{}})\", {loop_group}.join({sep})));"));
    ctx.leave();
    ctx.line("}");

    Ok(())
}

fn emit_if(
    branches: &[IfBranch],
    else_body: Option<&Expression>,
    group_var: &str,
    ctx: &mut Ctx,
    type_table: &mut HashMap<String, ParamInfo>,
) -> Result<(), EmitError> {
    for (index, branch) in branches.iter().enumerate() {
        let cond = render_condition(&branch.condition, type_table)?;
        let keyword = if index == 0 { "if" } else { "else if" };
        ctx.line(&format!("{keyword} {cond} {{"));
        ctx.enter();
        if let Some(body) = &branch.body {
            emit_bool(body, group_var, ctx, type_table)?;
        }
        ctx.leave();
        ctx.line("}");
    }

    if let Some(body) = else_body {
        ctx.line("else {");
        ctx.enter();
        emit_bool(body, group_var, ctx, type_table)?;
        ctx.leave();
        ctx.line("}");
    }

    Ok(())
}

fn condition_operand(expr: &Expression, type_table: &HashMap<String, ParamInfo>) -> Result<CondOperand, EmitError> {
    match &expr.kind {
        ExprKind::Literal(LiteralKind::Variable(name)) => {
            let info = type_table
                .get(name)
                .ok_or_else(|| EmitError::FormattingFailed(format!("unresolved variable: {name}")))?;
            Ok(CondOperand::Variable { global_name: name.clone(), ty: info.ty, optional: !info.required })
        }
        ExprKind::Literal(LiteralKind::Null) => Ok(CondOperand::Null),
        ExprKind::Literal(LiteralKind::Number(n)) => Ok(CondOperand::Constant(n.to_string())),
        ExprKind::Literal(LiteralKind::String(s)) => Ok(CondOperand::Constant(s.clone())),
        _ => Err(EmitError::FormattingFailed("unsupported if-condition operand".into())),
    }
}

fn render_condition(expr: &Expression, type_table: &HashMap<String, ParamInfo>) -> Result<String, EmitError> {
    match &expr.kind {
        ExprKind::Binary { op, left, right } if op.is_logical() => {
            let l = render_condition(left, type_table)?;
            let r = render_condition(right, type_table)?;
            let symbol = if *op == BinaryOp::And { "&&" } else { "||" };
            Ok(format!("({l} {symbol} {r})"))
        }
        ExprKind::Binary { op, left, right } => render_condition_comparison(*op, left, right, type_table),
        _ => Err(EmitError::FormattingFailed("unsupported if-condition shape".into())),
    }
}

fn render_condition_comparison(
    op: BinaryOp,
    left: &Expression,
    right: &Expression,
    type_table: &HashMap<String, ParamInfo>,
) -> Result<String, EmitError> {
    let lo = condition_operand(left, type_table)?;
    let ro = condition_operand(right, type_table)?;

    match (lo, ro) {
        (CondOperand::Variable { global_name, optional, .. }, CondOperand::Null)
        | (CondOperand::Null, CondOperand::Variable { global_name, optional, .. }) => {
            if !optional {
                return Ok((op == BinaryOp::IsNot).to_string());
            }
            match op {
                BinaryOp::Is => Ok(format!("{global_name}.is_none()")),
                BinaryOp::IsNot => Ok(format!("{global_name}.is_some()")),
                _ => Err(EmitError::FormattingFailed("NULL comparisons only support IS / IS NOT".into())),
            }
        }
        (CondOperand::Variable { global_name, optional, ty }, CondOperand::Constant(text))
        | (CondOperand::Constant(text), CondOperand::Variable { global_name, optional, ty }) => {
            let rust_op = condition_rust_operator(op)?;
            let literal = match ty {
                ParamType::String => rust_string_literal(&text),
                ParamType::Int => text,
            };
            if optional {
                match ty {
                    ParamType::String => Ok(format!("{global_name}.as_deref() {rust_op} Some({literal})")),
                    ParamType::Int => Ok(format!("{global_name} {rust_op} Some({literal})")),
                }
            } else {
                Ok(format!("{global_name} {rust_op} {literal}"))
            }
        }
        _ => Err(EmitError::FormattingFailed("unsupported if-condition operand combination".into())),
    }
}

fn condition_rust_operator(op: BinaryOp) -> Result<&'static str, EmitError> {
    match op {
        BinaryOp::Eq => Ok("=="),
        BinaryOp::NotEq => Ok("!="),
        BinaryOp::Less => Ok("<"),
        BinaryOp::Greater => Ok(">"),
        BinaryOp::LessEq => Ok("<="),
        BinaryOp::GreaterEq => Ok(">="),
        _ => Err(EmitError::FormattingFailed("unsupported if-condition operator".into())),
    }
}

fn sql_string_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Renders `s` as a valid, escaped Rust string literal (double-quoted, with
/// `"`/`\` escaped) for embedding directly into generated source text.
fn rust_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

//! The query AST (spec.md §3). Nodes are created by [`crate::query_parser::QueryParser`]
//! and mutated in place by [`crate::checker::Checker`] (annotations, rewritten
//! variable/iterator names); after checking the tree is read-only and handed
//! to an [`crate::emit::Emitter`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The semantic type of a DSL parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ParamType {
    String,
    Int,
}

/// A declared or resolved parameter: top-level query input field, fragment
/// parameter, or `foreach` iterator binding (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Param {
    pub name: String,
    pub ty: ParamType,
    pub required: bool,
    pub is_list: bool,
    /// `true` for the top-level input struct's fields, `false` for loop
    /// iterator bindings.
    pub query_scoped: bool,
    /// The identifier the emitter uses to refer to this parameter's runtime
    /// value: `input.<name>` for top-level params, `localN_<name>` for
    /// minted iterator bindings. Empty until assigned (top-level params get
    /// it at parse time; iterator bindings get it during check).
    pub global_name: String,
}

/// A binary comparison/logical operator (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    NotEq,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    Like,
    NotLike,
    Is,
    IsNot,
}

impl BinaryOp {
    /// The SQL operator text emitted between operands.
    pub fn sql_symbol(self) -> &'static str {
        match self {
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "!=",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::LessEq => "<=",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::Like => "LIKE",
            BinaryOp::NotLike => "NOT LIKE",
            BinaryOp::Is => "IS",
            BinaryOp::IsNot => "IS NOT",
        }
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

/// A column reference: `table.name`, `table.*`, or a bare `name`/`*`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldRef {
    pub table: Option<String>,
    pub name: String,
    pub star: bool,
    pub alias: Option<String>,
}

impl FieldRef {
    pub fn new(name: impl Into<String>) -> Self {
        FieldRef { table: None, name: name.into(), star: false, alias: None }
    }
}

/// The sub-kind of a `Literal` expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub enum LiteralKind {
    Number(i64),
    String(String),
    Field(FieldRef),
    /// Rewritten during check to the resolved parameter's global name.
    Variable(String),
    Null,
}

/// One `{if ...} body` or `{else if ...} body` branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IfBranch {
    pub condition: Expression,
    pub body: Option<Box<Expression>>,
}

/// The tagged-union payload of an [`Expression`] (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub enum ExprKind {
    Binary { op: BinaryOp, left: Box<Expression>, right: Box<Expression> },
    Literal(LiteralKind),
    If { branches: Vec<IfBranch>, else_body: Option<Box<Expression>> },
    ForLoop {
        /// Rewritten by the checker to the minted `localN_<name>` binding.
        iterator_name: String,
        /// The list-typed parameter being iterated; rewritten to its global name.
        iterable_name: String,
        join_by_or: bool,
        body: Box<Expression>,
    },
    /// Only present before checking; the checker replaces every `Fragment`
    /// node with a deep-copied, rewritten instance of the fragment body.
    Fragment { name: String, args: Vec<String> },
}

/// A node in the query/fragment expression tree, with analysis-phase
/// annotations (spec.md §3 Invariants 1-4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Expression {
    pub kind: ExprKind,
    /// `true` iff this expression is guaranteed to contribute SQL text
    /// regardless of runtime parameter presence (propagated upward by OR
    /// over Binary children — "required-any", not "required-all").
    pub is_clause_required: bool,
    /// Mirrored from the resolved parameter for `Variable` literals; used by
    /// the emitter to decide `input.field` vs a local binding.
    pub is_query_scoped: bool,
}

impl Expression {
    pub fn new(kind: ExprKind) -> Self {
        Expression { kind, is_clause_required: false, is_query_scoped: false }
    }

    pub fn required(kind: ExprKind) -> Self {
        Expression { kind, is_clause_required: true, is_query_scoped: false }
    }
}

/// INNER/CROSS/LEFT/RIGHT/FULL join kind (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum JoinKind {
    Inner,
    Cross,
    Left,
    Right,
    Full,
}

impl JoinKind {
    pub fn sql_keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Cross => "CROSS JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL OUTER JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Join {
    pub table: String,
    pub alias: Option<String>,
    pub kind: JoinKind,
    pub on: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SelectStmt {
    pub fields: Vec<FieldRef>,
    pub from: String,
    pub from_alias: Option<String>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Expression>,
    pub limit: Option<i64>,
    pub order_by: Vec<FieldRef>,
}

/// A query or fragment root (spec.md §3). `IsFragment == true` means `body`
/// is `None` and `fragment_body` holds the single root expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Query {
    pub name: String,
    pub is_fragment: bool,
    pub params: Vec<Param>,
    pub select: Option<SelectStmt>,
    pub fragment_body: Option<Expression>,
}

impl Query {
    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// The query/fragment file's parse result: every top-level `query`/`fragment`
/// declaration in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Queries {
    pub queries: Vec<Query>,
}

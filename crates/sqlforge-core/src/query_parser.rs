//! Query/fragment DSL parser (spec.md §4.3).
//!
//! Recursive-descent with precedence climbing for expressions: Or -> And ->
//! DynamicClause -> Comparison -> Grouping -> Literal. Grounded directly in
//! `original_source/parse_queries.go`'s `QueryParser`, with the `IS`/`IS NOT`
//! lookahead cleaned up (see DESIGN.md) and `ORDER BY` generalized to appear
//! before or after `LIMIT`.

use crate::ast::{
    BinaryOp, Expression, ExprKind, FieldRef, IfBranch, Join, JoinKind, LiteralKind, Param,
    ParamType, Queries, Query, SelectStmt,
};
use crate::error::{ParseError, ParseErrorKind};
use crate::scanner::Scanner;
use crate::token::{is_reserved_keyword, Token, TokenKind};

pub struct QueryParser {
    scanner: Scanner,
    /// `true` while parsing a template expression (`{if ...}` conditions,
    /// `{var}` bodies): bare identifiers denote parameters, not columns.
    is_parsing_template: bool,
}

impl QueryParser {
    pub fn new(source: &str) -> Self {
        QueryParser { scanner: Scanner::new(source), is_parsing_template: false }
    }

    pub fn parse(mut self) -> Result<Queries, ParseError> {
        let mut queries = Queries::default();

        while self.scanner.has_next()? {
            let token = self.expect(TokenKind::Identifier)?;
            let is_fragment = match token.lexeme_lowered.as_deref() {
                Some("query") => false,
                Some("fragment") => true,
                _ => {
                    return Err(ParseError::new(format!(
                        "expected 'query' or 'fragment', got '{}'",
                        token.lexeme
                    ))
                    .with_line(token.line)
                    .with_kind(ParseErrorKind::UnexpectedToken))
                }
            };
            queries.queries.push(self.parse_query(is_fragment)?);
        }

        Ok(queries)
    }

    // --- token helpers -----------------------------------------------

    fn peek(&mut self) -> Result<Token, ParseError> {
        Ok(self.scanner.peek()?)
    }

    fn peek_after(&mut self, n: usize) -> Result<Token, ParseError> {
        Ok(self.scanner.peek_after(n)?)
    }

    fn eat(&mut self) -> Result<Token, ParseError> {
        Ok(self.scanner.eat()?)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        let token = self.eat()?;
        if token.kind != kind {
            return Err(ParseError::new(format!("expected token type {kind}, got {}", token.kind))
                .with_line(token.line)
                .with_kind(ParseErrorKind::UnexpectedToken));
        }
        Ok(token)
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<Token, ParseError> {
        let token = self.expect(TokenKind::Identifier)?;
        if token.lexeme_lowered.as_deref() != Some(keyword) {
            return Err(ParseError::new(format!("expected '{keyword}', got '{}'", token.lexeme))
                .with_line(token.line)
                .with_kind(ParseErrorKind::UnexpectedToken));
        }
        Ok(token)
    }

    fn maybe_quoted_name(&mut self) -> Result<String, ParseError> {
        let token = self.eat()?;
        match token.kind {
            TokenKind::Identifier => Ok(token.lexeme),
            TokenKind::String => Ok(token.string_literal().unwrap_or_default().to_string()),
            other => Err(ParseError::new(format!(
                "expected name as identifier or quoted string, got {other}"
            ))
            .with_line(token.line)),
        }
    }

    // --- declarations --------------------------------------------------

    fn parse_query(&mut self, is_fragment: bool) -> Result<Query, ParseError> {
        let name_token = self.expect(TokenKind::Identifier)?;
        let name = name_token.lexeme;

        let mut params = Vec::new();
        if self.peek()?.kind == TokenKind::LeftParen {
            self.eat()?;
            params = self.parse_params(is_fragment)?;
            self.expect(TokenKind::RightParen)?;
        }

        self.expect(TokenKind::LeftBrace)?;

        let (select, fragment_body) = if is_fragment {
            (None, Some(self.parse_expression()?))
        } else {
            self.expect_keyword("select")?;
            (Some(self.parse_select()?), None)
        };

        if self.peek()?.kind == TokenKind::Semicolon {
            self.eat()?;
        }
        self.expect(TokenKind::RightBrace)?;

        Ok(Query { name, is_fragment, params, select, fragment_body })
    }

    fn parse_params(&mut self, is_fragment: bool) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();

        loop {
            if self.peek()?.kind == TokenKind::RightParen {
                break;
            }

            let name_token = self.expect(TokenKind::Identifier)?;
            let name = name_token.lexeme;
            let global_name = if is_fragment { String::new() } else { format!("input.{name}") };

            self.expect(TokenKind::Colon)?;

            let mut is_list = false;
            let ty_token = if self.peek()?.kind == TokenKind::LeftBracket {
                is_list = true;
                self.eat()?;
                let t = self.expect(TokenKind::Identifier)?;
                self.expect(TokenKind::RightBracket)?;
                t
            } else {
                self.expect(TokenKind::Identifier)?
            };

            let ty = match ty_token.lexeme.as_str() {
                "string" => ParamType::String,
                "int" => ParamType::Int,
                other => {
                    return Err(ParseError::new(format!("unrecognized param type: {other}"))
                        .with_line(ty_token.line)
                        .with_kind(ParseErrorKind::TypeMismatch))
                }
            };

            let required = match self.peek()?.kind {
                TokenKind::Bang => {
                    self.eat()?;
                    true
                }
                TokenKind::QuestionMark => {
                    self.eat()?;
                    false
                }
                _ => true,
            };

            params.push(Param { name, ty, required, is_list, query_scoped: true, global_name });

            if self.peek()?.kind == TokenKind::Comma {
                self.eat()?;
            }
        }

        Ok(params)
    }

    // --- SELECT ---------------------------------------------------------

    fn parse_select(&mut self) -> Result<SelectStmt, ParseError> {
        let mut fields = Vec::new();
        loop {
            let token = self.peek()?;
            if token.is_keyword(&["from"]) {
                break;
            }
            fields.push(self.parse_field_with_alias()?);

            if self.peek()?.kind != TokenKind::Comma {
                break;
            }
            self.eat()?;
        }

        self.expect_keyword("from")?;

        let from_token = self.expect(TokenKind::Identifier)?;
        let from = from_token.lexeme;
        let from_alias = self.parse_alias_for_table()?;

        let joins = self.parse_joins()?;

        let where_clause = if self.peek()?.is_keyword(&["where"]) {
            self.eat()?;
            Some(self.parse_expression()?)
        } else {
            None
        };

        let mut limit = None;
        let mut order_by = Vec::new();

        // LIMIT and ORDER BY may appear in either order, at most one of each.
        for _ in 0..2 {
            let token = self.peek()?;
            if token.kind != TokenKind::Identifier {
                break;
            }
            match token.lexeme_lowered.as_deref() {
                Some("limit") if limit.is_none() => limit = Some(self.parse_limit()?),
                Some("order") if order_by.is_empty() => order_by = self.parse_order_by()?,
                _ => break,
            }
        }

        Ok(SelectStmt { fields, from, from_alias, joins, where_clause, limit, order_by })
    }

    fn parse_limit(&mut self) -> Result<i64, ParseError> {
        self.expect_keyword("limit")?;
        let token = self.expect(TokenKind::Number)?;
        Ok(token.number_literal().unwrap_or_default() as i64)
    }

    fn parse_order_by(&mut self) -> Result<Vec<FieldRef>, ParseError> {
        self.expect_keyword("order")?;
        self.expect_keyword("by")?;

        let mut fields = vec![self.parse_field_name()?];
        while self.peek()?.kind == TokenKind::Comma {
            self.eat()?;
            fields.push(self.parse_field_name()?);
        }
        Ok(fields)
    }

    fn parse_joins(&mut self) -> Result<Vec<Join>, ParseError> {
        let mut joins = Vec::new();

        while self.is_join()? {
            let token = self.peek()?;
            let kind = match token.lexeme_lowered.as_deref() {
                Some("join") => {
                    self.eat()?;
                    JoinKind::Inner
                }
                Some("inner") => {
                    self.eat()?;
                    self.expect_keyword("join")?;
                    JoinKind::Inner
                }
                Some("cross") => {
                    self.eat()?;
                    self.expect_keyword("join")?;
                    JoinKind::Cross
                }
                Some("left") => {
                    self.eat()?;
                    self.parse_outer_join_suffix()?;
                    JoinKind::Left
                }
                Some("right") => {
                    self.eat()?;
                    self.parse_outer_join_suffix()?;
                    JoinKind::Right
                }
                Some("full") => {
                    self.eat()?;
                    self.parse_outer_join_suffix()?;
                    JoinKind::Full
                }
                _ => {
                    return Err(ParseError::new("expected identifier to start join")
                        .with_line(token.line))
                }
            };

            let table_token = self.expect(TokenKind::Identifier)?;
            let table = table_token.lexeme;
            let alias = self.parse_alias_for_table()?;

            self.expect_keyword("on")?;
            let on = self.parse_expression()?;

            joins.push(Join { table, alias, kind, on });
        }

        Ok(joins)
    }

    fn parse_outer_join_suffix(&mut self) -> Result<(), ParseError> {
        let token = self.peek()?;
        if token.is_keyword(&["outer"]) {
            self.eat()?;
            self.expect_keyword("join")?;
        } else if token.is_keyword(&["join"]) {
            self.eat()?;
        } else {
            return Err(ParseError::new("expected 'outer' or 'join'").with_line(token.line));
        }
        Ok(())
    }

    fn is_join(&mut self) -> Result<bool, ParseError> {
        let t1 = self.peek()?;
        let t2 = self.peek_after(1)?;
        let t3 = self.peek_after(2)?;
        Ok(t1.is_keyword(&["join"]) || t2.is_keyword(&["join"]) || t3.is_keyword(&["join"]))
    }

    // --- fields / aliases -------------------------------------------------

    fn parse_field_name(&mut self) -> Result<FieldRef, ParseError> {
        let token = self.peek()?;
        if token.kind == TokenKind::Star {
            self.eat()?;
            return Ok(FieldRef { table: None, name: String::new(), star: true, alias: None });
        }

        let first = self.maybe_quoted_name()?;

        if self.peek()?.kind == TokenKind::Dot {
            self.eat()?;
            let table = first;
            if self.peek()?.kind == TokenKind::Star {
                self.eat()?;
                return Ok(FieldRef { table: Some(table), name: String::new(), star: true, alias: None });
            }
            let name = self.maybe_quoted_name()?;
            Ok(FieldRef { table: Some(table), name, star: false, alias: None })
        } else {
            Ok(FieldRef { table: None, name: first, star: false, alias: None })
        }
    }

    fn parse_field_with_alias(&mut self) -> Result<FieldRef, ParseError> {
        let mut field = self.parse_field_name()?;
        field.alias = self.parse_alias_for_column()?;
        Ok(field)
    }

    fn parse_alias_for_column(&mut self) -> Result<Option<String>, ParseError> {
        let token = self.peek()?;
        if token.is_keyword(&["as"]) {
            self.eat()?;
            return Ok(Some(self.maybe_quoted_name()?));
        }

        let token = self.peek()?;
        let bare_allowed = token.kind == TokenKind::String
            || (token.kind == TokenKind::Identifier
                && !is_reserved_keyword(token.lexeme_lowered.as_deref().unwrap_or_default()));
        if bare_allowed {
            return Ok(Some(self.maybe_quoted_name()?));
        }

        Ok(None)
    }

    fn parse_alias_for_table(&mut self) -> Result<Option<String>, ParseError> {
        let token = self.peek()?;
        if token.is_keyword(&["as"]) {
            self.eat()?;
            let token = self.expect(TokenKind::Identifier)?;
            if is_reserved_keyword(token.lexeme_lowered.as_deref().unwrap_or_default()) {
                return Err(ParseError::new("cannot use reserved word as table alias")
                    .with_line(token.line));
            }
            return Ok(Some(token.lexeme));
        }

        let token = self.peek()?;
        if token.kind == TokenKind::Identifier
            && !is_reserved_keyword(token.lexeme_lowered.as_deref().unwrap_or_default())
        {
            self.eat()?;
            return Ok(Some(token.lexeme));
        }

        Ok(None)
    }

    // --- expressions ------------------------------------------------------

    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_and()?;
        while self.peek()?.is_keyword(&["or"]) {
            self.eat()?;
            let right = self.parse_and()?;
            expr = Expression::new(ExprKind::Binary {
                op: BinaryOp::Or,
                left: Box::new(expr),
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_dynamic_clause()?;
        while self.peek()?.is_keyword(&["and"]) {
            self.eat()?;
            let right = self.parse_dynamic_clause()?;
            expr = Expression::new(ExprKind::Binary {
                op: BinaryOp::And,
                left: Box::new(expr),
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    fn parse_dynamic_clause(&mut self) -> Result<Expression, ParseError> {
        let token = self.peek()?;
        if token.kind != TokenKind::LeftBrace {
            return self.parse_comparison();
        }

        let after = self.peek_after(1)?;
        if after.kind != TokenKind::Identifier {
            return self.parse_comparison();
        }

        match after.lexeme_lowered.as_deref() {
            Some("foreach") => return self.parse_foreach(),
            Some("if") => return self.parse_if(),
            Some("include") => return self.parse_include(),
            _ => {}
        }

        // Not one of the three recognized template forms. `{var}` (a bare
        // interpolation) is `{` identifier `}` with nothing between the
        // identifier and the closing brace, so let that fall through to
        // `parse_comparison`/`parse_literal`. Anything else naming an
        // identifier right after `{` is a typo'd or unsupported template
        // keyword (e.g. `{forech q in queries: OR}`), not a plain literal.
        if self.peek_after(2)?.kind == TokenKind::RightBrace {
            return self.parse_comparison();
        }

        Err(ParseError::new(format!("unknown template keyword: {}", after.lexeme))
            .with_line(after.line)
            .with_kind(ParseErrorKind::UnknownTemplateKeyword))
    }

    fn parse_foreach(&mut self) -> Result<Expression, ParseError> {
        self.eat()?; // {
        self.eat()?; // foreach

        let iterator_name = self.expect(TokenKind::Identifier)?.lexeme;

        let in_token = self.expect(TokenKind::Identifier)?;
        if in_token.lexeme_lowered.as_deref() != Some("in") {
            return Err(ParseError::new("expected 'in'").with_line(in_token.line));
        }

        let iterable_name = self.expect(TokenKind::Identifier)?.lexeme;

        self.expect(TokenKind::Colon)?;
        let join_token = self.expect(TokenKind::Identifier)?;
        let join_by_or = match join_token.lexeme_lowered.as_deref() {
            Some("and") => false,
            Some("or") => true,
            _ => {
                return Err(ParseError::new("foreach must join with AND or OR")
                    .with_line(join_token.line))
            }
        };
        self.expect(TokenKind::RightBrace)?;

        let body = self.parse_expression()?;

        self.expect(TokenKind::LeftBrace)?;
        self.expect_keyword("end")?;
        self.expect(TokenKind::RightBrace)?;

        Ok(Expression::new(ExprKind::ForLoop {
            iterator_name,
            iterable_name,
            join_by_or,
            body: Box::new(body),
        }))
    }

    fn parse_maybe_body(&mut self) -> Result<Option<Box<Expression>>, ParseError> {
        let maybe_brace = self.peek()?;
        let maybe_else = self.peek_after(1)?;
        let else_is_next = maybe_brace.kind == TokenKind::LeftBrace
            && maybe_else.is_keyword(&["else"]);

        if else_is_next {
            return Ok(None);
        }

        // An immediate `{end}` also means an empty body.
        if maybe_brace.kind == TokenKind::LeftBrace && maybe_else.is_keyword(&["end"]) {
            return Ok(None);
        }

        Ok(Some(Box::new(self.parse_expression()?)))
    }

    fn parse_if(&mut self) -> Result<Expression, ParseError> {
        self.eat()?; // {
        self.eat()?; // if

        self.is_parsing_template = true;
        let first_condition = self.parse_expression()?;
        self.is_parsing_template = false;
        self.expect(TokenKind::RightBrace)?;

        let first_body = self.parse_maybe_body()?;

        let mut branches = vec![IfBranch { condition: first_condition, body: first_body }];
        let mut else_body = None;

        loop {
            self.expect(TokenKind::LeftBrace)?;
            let keyword = self.expect(TokenKind::Identifier)?;
            match keyword.lexeme_lowered.as_deref() {
                Some("else") => {
                    let next = self.peek()?;
                    if next.kind == TokenKind::RightBrace {
                        // bare `{else}`
                        self.eat()?;
                        let body = self.parse_maybe_body()?;
                        else_body = body;
                        self.expect(TokenKind::LeftBrace)?;
                        self.expect_keyword("end")?;
                        self.expect(TokenKind::RightBrace)?;
                        break;
                    } else if next.is_keyword(&["if"]) {
                        self.eat()?;
                        self.is_parsing_template = true;
                        let cond = self.parse_expression()?;
                        self.is_parsing_template = false;
                        self.expect(TokenKind::RightBrace)?;
                        let body = self.parse_maybe_body()?;
                        branches.push(IfBranch { condition: cond, body });
                    } else {
                        return Err(ParseError::new("expected 'if' or '}' after 'else'")
                            .with_line(next.line));
                    }
                }
                Some("end") => {
                    self.expect(TokenKind::RightBrace)?;
                    break;
                }
                _ => {
                    return Err(ParseError::new("expected 'else' or 'end'")
                        .with_line(keyword.line))
                }
            }
        }

        Ok(Expression::new(ExprKind::If { branches, else_body }))
    }

    fn parse_include(&mut self) -> Result<Expression, ParseError> {
        self.eat()?; // {
        self.eat()?; // include

        let name = self.expect(TokenKind::Identifier)?.lexeme;
        self.expect(TokenKind::LeftParen)?;

        let mut args = Vec::new();
        loop {
            if self.peek()?.kind == TokenKind::RightParen {
                break;
            }
            if !args.is_empty() {
                self.expect(TokenKind::Comma)?;
            }
            args.push(self.expect(TokenKind::Identifier)?.lexeme);
        }
        self.expect(TokenKind::RightParen)?;
        self.expect(TokenKind::RightBrace)?;

        Ok(Expression::new(ExprKind::Fragment { name, args }))
    }

    fn parse_comparison(&mut self) -> Result<Expression, ParseError> {
        let left = self.parse_grouping()?;
        let token = self.peek()?;

        let op = match token.kind {
            TokenKind::Equal => BinaryOp::Eq,
            TokenKind::BangEqual => BinaryOp::NotEq,
            TokenKind::Less => BinaryOp::Less,
            TokenKind::Greater => BinaryOp::Greater,
            TokenKind::LessEqual => BinaryOp::LessEq,
            TokenKind::GreaterEqual => BinaryOp::GreaterEq,
            TokenKind::Identifier => match token.lexeme_lowered.as_deref() {
                Some("not") => {
                    self.eat()?;
                    let next = self.expect(TokenKind::Identifier)?;
                    if next.lexeme_lowered.as_deref() != Some("like") {
                        return Err(ParseError::new("expected 'like' after 'not'")
                            .with_line(next.line));
                    }
                    BinaryOp::NotLike
                }
                Some("like") => {
                    self.eat()?;
                    BinaryOp::Like
                }
                Some("is") => {
                    self.eat()?;
                    // REDESIGN: eat the peeked 'not' instead of re-peeking it
                    // and relying on the caller's single EatToken (see DESIGN.md).
                    if self.peek()?.is_keyword(&["not"]) {
                        self.eat()?;
                        BinaryOp::IsNot
                    } else {
                        BinaryOp::Is
                    }
                }
                _ => return Ok(left),
            },
            _ => return Ok(left),
        };

        // operators matched via Identifier-keyword branches above already
        // consumed their own tokens; the symbolic operators (=, !=, <, ...)
        // still need to be eaten here.
        if matches!(
            token.kind,
            TokenKind::Equal
                | TokenKind::BangEqual
                | TokenKind::Less
                | TokenKind::Greater
                | TokenKind::LessEqual
                | TokenKind::GreaterEqual
        ) {
            self.eat()?;
        }

        let right = self.parse_grouping()?;

        Ok(Expression::new(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }))
    }

    fn parse_grouping(&mut self) -> Result<Expression, ParseError> {
        if self.peek()?.kind == TokenKind::LeftParen {
            self.eat()?;
            let expr = self.parse_expression()?;
            self.expect(TokenKind::RightParen)?;
            return Ok(expr);
        }
        self.parse_literal()
    }

    fn parse_literal(&mut self) -> Result<Expression, ParseError> {
        let token = self.peek()?;

        let is_non_template_quoted_identifier =
            token.kind == TokenKind::String && !token.single_quoted && !self.is_parsing_template;
        let is_non_template_non_keyword_identifier = token.kind == TokenKind::Identifier
            && token.lexeme_lowered.as_deref() != Some("null")
            && !self.is_parsing_template;

        if is_non_template_quoted_identifier || is_non_template_non_keyword_identifier {
            let field = self.parse_field_name()?;
            return Ok(Expression::required(ExprKind::Literal(LiteralKind::Field(field))));
        }

        match token.kind {
            TokenKind::Identifier => {
                if token.lexeme_lowered.as_deref() == Some("null") {
                    self.eat()?;
                    Ok(Expression::required(ExprKind::Literal(LiteralKind::Null)))
                } else if self.is_parsing_template {
                    let tok = self.eat()?;
                    Ok(Expression::required(ExprKind::Literal(LiteralKind::Variable(tok.lexeme))))
                } else {
                    Err(ParseError::new("unhandled literal").with_line(token.line))
                }
            }
            TokenKind::Number => {
                let tok = self.eat()?;
                let n = tok.number_literal().unwrap_or_default() as i64;
                Ok(Expression::new(ExprKind::Literal(LiteralKind::Number(n))))
            }
            TokenKind::LeftBrace => {
                self.eat()?;
                let var = self.expect(TokenKind::Identifier)?.lexeme;
                self.expect(TokenKind::RightBrace)?;
                Ok(Expression::new(ExprKind::Literal(LiteralKind::Variable(var))))
            }
            TokenKind::String => {
                let tok = self.eat()?;
                let s = tok.string_literal().unwrap_or_default().to_string();
                Ok(Expression::new(ExprKind::Literal(LiteralKind::String(s))))
            }
            _ => Err(ParseError::new(format!("unhandled literal type: {}", token.kind))
                .with_line(token.line)
                .with_kind(ParseErrorKind::UnexpectedToken)),
        }
    }
}

#[cfg_attr(feature = "tracing", tracing::instrument(skip(source), fields(len = source.len())))]
pub fn parse_queries(source: &str) -> Result<Queries, ParseError> {
    let result = QueryParser::new(source).parse();
    #[cfg(feature = "tracing")]
    match &result {
        Ok(queries) => tracing::debug!(count = queries.queries.len(), "parsed query/fragment declarations"),
        Err(err) => tracing::debug!(%err, "query parse failed"),
    }
    result
}

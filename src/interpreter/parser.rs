use std::rc::Rc;
use thiserror::Error;

use crate::ast::{
    AssignTarget, BinaryOp, ClassDecl, Expr, ExprKind, FieldDecl, FunctionBody, FunctionDecl, Literal, LogicalOp,
    Program, Stmt, StructDecl, UnaryOp,
};
use crate::diagnostic::{Diagnostic, Label, Span};
use crate::lexer::{tokenize, LexError, SpannedToken};
use crate::stack::ensure_sufficient_stack;
use crate::token::Token;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Syntax error at line {line}, column {col}: expected {expected}, found {found}")]
pub struct SyntaxError {
    pub line: usize,
    pub col: usize,
    pub expected: String,
    pub found: String,
    pub span: Span,
}

impl SyntaxError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(format!("expected {}, found {}", self.expected, self.found))
            .with_code("E0101")
            .with_label(Label::primary(self.span, format!("expected {}", self.expected)))
    }
}

/// Anything that stops a program from reaching evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::Lex(err) => err.span(),
            ParseError::Syntax(err) => err.span,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ParseError::Lex(err) => err.to_diagnostic(),
            ParseError::Syntax(err) => err.to_diagnostic(),
        }
    }
}

type ParseResult<T> = Result<T, SyntaxError>;

/// Lexes and parses a whole program, stopping at the first error.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let tokens = tokenize(source)?;
    let program = TokenParser::new(tokens).parse_program()?;
    tracing::debug!(statements = program.statements.len(), "parsed program");
    Ok(program)
}

/// Recursive-descent parser over a token sequence ending in `Token::Eof`.
pub struct TokenParser {
    tokens: Vec<SpannedToken>,
    current: usize,
    /// Number of enclosing `def` bodies; `return` is only legal above zero.
    function_depth: usize,
}

impl TokenParser {
    pub fn new(mut tokens: Vec<SpannedToken>) -> Self {
        if !matches!(tokens.last(), Some(SpannedToken { token: Token::Eof, .. })) {
            let end = tokens.last().map(|st| st.span.end).unwrap_or(0);
            let (line, col) = tokens.last().map(|st| (st.line, st.col)).unwrap_or((1, 1));
            tokens.push(SpannedToken {
                token: Token::Eof,
                lexeme: String::new(),
                span: Span::new(end, end),
                line,
                col,
            });
        }
        Self {
            tokens,
            current: 0,
            function_depth: 0,
        }
    }

    pub fn parse_program(&mut self) -> ParseResult<Program> {
        let mut statements = Vec::new();
        while !self.at_end() {
            if let Some(stmt) = self.parse_statement()? {
                statements.push(stmt);
            }
        }
        Ok(Program { statements })
    }

    // === Token cursor ===

    fn peek(&self) -> &Token {
        &self.tokens[self.current].token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let index = (self.current + offset).min(self.tokens.len() - 1);
        &self.tokens[index].token
    }

    fn at_end(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn current_span(&self) -> Span {
        self.tokens[self.current].span
    }

    fn previous_span(&self) -> Span {
        if self.current > 0 {
            self.tokens[self.current - 1].span
        } else {
            self.current_span()
        }
    }

    fn advance(&mut self) -> SpannedToken {
        let st = self.tokens[self.current].clone();
        if !self.at_end() {
            self.current += 1;
        }
        st
    }

    fn check(&self, expected: &Token) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(expected)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error_expected(&self, expected: impl Into<String>) -> SyntaxError {
        let st = &self.tokens[self.current];
        SyntaxError {
            line: st.line,
            col: st.col,
            expected: expected.into(),
            found: st.token.describe(),
            span: st.span,
        }
    }

    fn expect(&mut self, expected: Token) -> ParseResult<Span> {
        if self.check(&expected) {
            Ok(self.advance().span)
        } else {
            Err(self.error_expected(format!("`{}`", expected)))
        }
    }

    fn expect_ident(&mut self, what: &str) -> ParseResult<(Rc<str>, Span)> {
        if let Token::Ident(name) = self.peek() {
            let name: Rc<str> = Rc::from(name.as_str());
            let span = self.advance().span;
            Ok((name, span))
        } else {
            Err(self.error_expected(what))
        }
    }

    // === Statements ===

    /// Returns `None` for an empty statement (a stray `;`).
    /// Nested blocks recurse through here; the stack grows on demand.
    fn parse_statement(&mut self) -> ParseResult<Option<Stmt>> {
        ensure_sufficient_stack(|| self.parse_statement_inner())
    }

    fn parse_statement_inner(&mut self) -> ParseResult<Option<Stmt>> {
        let stmt = match self.peek() {
            Token::Semicolon => {
                self.advance();
                return Ok(None);
            }
            Token::Let => {
                let stmt = self.parse_let_clause()?;
                self.expect(Token::Semicolon)?;
                stmt
            }
            Token::If => self.parse_if_statement()?,
            Token::While => self.parse_while_statement()?,
            Token::For => self.parse_for_statement()?,
            Token::Def => Stmt::Function(self.parse_function_decl()?),
            Token::Class => self.parse_class_decl()?,
            Token::Struct => self.parse_struct_decl()?,
            Token::Delete => self.parse_delete_statement()?,
            Token::Return => self.parse_return_statement()?,
            Token::Print => self.parse_print_statement()?,
            Token::Parallel => self.parse_parallel_statement()?,
            Token::LBrace => Stmt::Block(self.parse_block()?),
            _ => {
                let stmt = self.parse_simple_statement()?;
                self.expect(Token::Semicolon)?;
                stmt
            }
        };
        Ok(Some(stmt))
    }

    fn parse_block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(Token::LBrace)?;
        let mut statements = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.at_end() {
                return Err(self.error_expected("`}`"));
            }
            if let Some(stmt) = self.parse_statement()? {
                statements.push(stmt);
            }
        }
        self.expect(Token::RBrace)?;
        Ok(statements)
    }

    /// `let name = expr` without the terminating `;`.
    fn parse_let_clause(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(Token::Let)?;
        let (name, _) = self.expect_ident("identifier after `let`")?;
        self.expect(Token::Assign)?;
        let value = self.parse_expression()?;
        let span = start.merge(value.span);
        Ok(Stmt::Let { name, value, span })
    }

    /// An expression or an assignment, without the terminating `;`.
    fn parse_simple_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.parse_expression()?;
        if !self.check(&Token::Assign) {
            return Ok(Stmt::Expr(expr));
        }

        let target = match expr.kind {
            ExprKind::Identifier(name) => AssignTarget::Variable(name),
            ExprKind::Member { object, field } => AssignTarget::Member { object: *object, field },
            ExprKind::Index { target, index } => AssignTarget::Index {
                target: *target,
                index: *index,
            },
            _ => return Err(self.error_expected("`;`")),
        };
        self.advance();
        let value = self.parse_expression()?;
        let span = expr.span.merge(value.span);
        Ok(Stmt::Assign { target, value, span })
    }

    fn parse_parenthesized_condition(&mut self) -> ParseResult<Expr> {
        self.expect(Token::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(Token::RParen)?;
        Ok(condition)
    }

    fn parse_if_statement(&mut self) -> ParseResult<Stmt> {
        self.expect(Token::If)?;
        let condition = self.parse_parenthesized_condition()?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.eat(&Token::Else) {
            if self.check(&Token::If) {
                Some(vec![self.parse_if_statement()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_while_statement(&mut self) -> ParseResult<Stmt> {
        self.expect(Token::While)?;
        let condition = self.parse_parenthesized_condition()?;
        let body = self.parse_block()?;
        Ok(Stmt::While { condition, body })
    }

    fn parse_for_statement(&mut self) -> ParseResult<Stmt> {
        self.expect(Token::For)?;
        self.expect(Token::LParen)?;

        let init = if self.check(&Token::Semicolon) {
            None
        } else if self.check(&Token::Let) {
            Some(Box::new(self.parse_let_clause()?))
        } else {
            Some(Box::new(self.parse_simple_statement()?))
        };
        self.expect(Token::Semicolon)?;

        let condition = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(Token::Semicolon)?;

        let update = if self.check(&Token::RParen) {
            None
        } else {
            Some(Box::new(self.parse_simple_statement()?))
        };
        self.expect(Token::RParen)?;

        let body = self.parse_block()?;
        Ok(Stmt::For {
            init,
            condition,
            update,
            body,
        })
    }

    fn parse_params(&mut self) -> ParseResult<Vec<Rc<str>>> {
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                let (param, _) = self.expect_ident("parameter name")?;
                params.push(param);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;
        Ok(params)
    }

    fn parse_function_decl(&mut self) -> ParseResult<Rc<FunctionDecl>> {
        let start = self.expect(Token::Def)?;
        let (name, _) = self.expect_ident("function name")?;
        let params = self.parse_params()?;

        self.function_depth += 1;
        let body = self.parse_block();
        self.function_depth -= 1;
        let body = body?;

        Ok(Rc::new(FunctionDecl {
            name: Some(name),
            params,
            body: FunctionBody::Block(body),
            span: start.merge(self.previous_span()),
        }))
    }

    fn parse_class_decl(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(Token::Class)?;
        let (name, _) = self.expect_ident("class name")?;
        self.expect(Token::LBrace)?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        loop {
            match self.peek() {
                Token::RBrace => break,
                Token::Let => {
                    self.advance();
                    let (field, _) = self.expect_ident("field name")?;
                    let init = if self.eat(&Token::Assign) {
                        Some(self.parse_expression()?)
                    } else {
                        None
                    };
                    self.expect(Token::Semicolon)?;
                    fields.push(FieldDecl { name: field, init });
                }
                Token::Def => methods.push(self.parse_function_decl()?),
                _ => return Err(self.error_expected("`let`, `def` or `}`")),
            }
        }
        let end = self.expect(Token::RBrace)?;

        Ok(Stmt::Class(Rc::new(ClassDecl {
            name,
            fields,
            methods,
            span: start.merge(end),
        })))
    }

    fn parse_struct_decl(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(Token::Struct)?;
        let (name, _) = self.expect_ident("struct name")?;
        self.expect(Token::LBrace)?;

        let mut fields = Vec::new();
        loop {
            let (field, _) = self.expect_ident("field name")?;
            fields.push(field);
            if !self.eat(&Token::Comma) || self.check(&Token::RBrace) {
                break;
            }
        }
        let end = self.expect(Token::RBrace)?;

        Ok(Stmt::Struct(Rc::new(StructDecl {
            name,
            fields,
            span: start.merge(end),
        })))
    }

    fn parse_delete_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(Token::Delete)?;
        let name = if self.eat(&Token::LParen) {
            let (name, _) = self.expect_ident("variable name")?;
            self.expect(Token::RParen)?;
            name
        } else {
            self.expect_ident("variable name")?.0
        };
        let end = self.expect(Token::Semicolon)?;
        Ok(Stmt::Delete {
            name,
            span: start.merge(end),
        })
    }

    fn parse_return_statement(&mut self) -> ParseResult<Stmt> {
        if self.function_depth == 0 {
            return Err(self.error_expected("statement (`return` is only allowed inside `def`)"));
        }
        self.expect(Token::Return)?;
        let value = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(Token::Semicolon)?;
        Ok(Stmt::Return(value))
    }

    fn parse_print_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(Token::Print)?;
        let args = self.parse_args()?;
        let end = self.expect(Token::Semicolon)?;
        Ok(Stmt::Print {
            args,
            span: start.merge(end),
        })
    }

    fn parse_parallel_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.current_span();
        let mut tasks = Vec::new();
        while self.eat(&Token::Parallel) {
            tasks.push(self.parse_block()?);
        }
        Ok(Stmt::Parallel {
            tasks,
            span: start.merge(self.previous_span()),
        })
    }

    // === Expressions ===

    fn parse_expression(&mut self) -> ParseResult<Expr> {
        ensure_sufficient_stack(|| self.parse_expression_inner())
    }

    fn parse_expression_inner(&mut self) -> ParseResult<Expr> {
        if self.is_lambda_start() {
            return self.parse_lambda();
        }
        self.parse_binary_expr(0)
    }

    /// `(` ident-list `)` `->` without consuming anything.
    fn is_lambda_start(&self) -> bool {
        if !matches!(self.peek(), Token::LParen) {
            return false;
        }
        let mut offset = 1;
        if matches!(self.peek_at(offset), Token::RParen) {
            return matches!(self.peek_at(offset + 1), Token::Arrow);
        }
        loop {
            if !matches!(self.peek_at(offset), Token::Ident(_)) {
                return false;
            }
            offset += 1;
            match self.peek_at(offset) {
                Token::Comma => offset += 1,
                Token::RParen => return matches!(self.peek_at(offset + 1), Token::Arrow),
                _ => return false,
            }
        }
    }

    fn parse_lambda(&mut self) -> ParseResult<Expr> {
        let start = self.current_span();
        let params = self.parse_params()?;
        self.expect(Token::Arrow)?;
        let body = self.parse_expression()?;
        let span = start.merge(body.span);
        Ok(Expr {
            kind: ExprKind::Lambda(Rc::new(FunctionDecl {
                name: None,
                params,
                body: FunctionBody::Expr(body),
                span,
            })),
            span,
        })
    }

    fn token_to_binary_operator(token: &Token) -> Option<(u8, BinaryOperator)> {
        match token {
            Token::Or => Some((1, BinaryOperator::Logical(LogicalOp::Or))),
            Token::And => Some((2, BinaryOperator::Logical(LogicalOp::And))),
            Token::Eq => Some((3, BinaryOperator::Binary(BinaryOp::Eq))),
            Token::NotEq => Some((3, BinaryOperator::Binary(BinaryOp::NotEq))),
            Token::Greater => Some((3, BinaryOperator::Binary(BinaryOp::Greater))),
            Token::Less => Some((3, BinaryOperator::Binary(BinaryOp::Less))),
            Token::GreaterEq => Some((3, BinaryOperator::Binary(BinaryOp::GreaterEq))),
            Token::LessEq => Some((3, BinaryOperator::Binary(BinaryOp::LessEq))),
            Token::Plus => Some((4, BinaryOperator::Binary(BinaryOp::Add))),
            Token::Minus => Some((4, BinaryOperator::Binary(BinaryOp::Sub))),
            Token::Star => Some((5, BinaryOperator::Binary(BinaryOp::Mul))),
            Token::Slash => Some((5, BinaryOperator::Binary(BinaryOp::Div))),
            Token::Percent => Some((5, BinaryOperator::Binary(BinaryOp::Mod))),
            Token::Caret => Some((6, BinaryOperator::Binary(BinaryOp::Pow))),
            _ => None,
        }
    }

    fn parse_binary_expr(&mut self, min_precedence: u8) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;

        while let Some((precedence, operator)) = Self::token_to_binary_operator(self.peek()) {
            if precedence < min_precedence {
                break;
            }
            self.advance();
            // `^` is right-associative; every other level is left-associative.
            let next_min = if matches!(operator, BinaryOperator::Binary(BinaryOp::Pow)) {
                precedence
            } else {
                precedence + 1
            };
            let right = self.parse_binary_expr(next_min)?;
            let span = left.span.merge(right.span);
            let kind = match operator {
                BinaryOperator::Binary(op) => ExprKind::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                BinaryOperator::Logical(op) => ExprKind::Logical {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
            };
            left = Expr { kind, span };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Not => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        let start = self.advance().span;
        let expr = ensure_sufficient_stack(|| self.parse_unary())?;
        let span = start.merge(expr.span);
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                expr: Box::new(expr),
            },
            span,
        })
    }

    fn parse_args(&mut self) -> ParseResult<Vec<Expr>> {
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;
        Ok(args)
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let (field, _) = self.expect_ident("field name after `.`")?;

                    if self.check(&Token::LParen) {
                        let args = self.parse_args()?;
                        let span = expr.span.merge(self.previous_span());
                        expr = Expr {
                            kind: ExprKind::MethodCall {
                                object: Box::new(expr),
                                method: field,
                                args,
                            },
                            span,
                        };
                    } else {
                        let span = expr.span.merge(self.previous_span());
                        expr = Expr {
                            kind: ExprKind::Member {
                                object: Box::new(expr),
                                field,
                            },
                            span,
                        };
                    }
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    let end = self.expect(Token::RBracket)?;
                    let span = expr.span.merge(end);
                    expr = Expr {
                        kind: ExprKind::Index {
                            target: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    };
                }
                Token::LParen => {
                    let args = self.parse_args()?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr {
                        kind: ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let literal = match self.peek() {
            Token::Int(n) => Some(Literal::Int(*n)),
            Token::Float(n) => Some(Literal::Float(*n)),
            Token::String(s) => Some(Literal::String(Rc::from(s.as_str()))),
            Token::True => Some(Literal::Bool(true)),
            Token::False => Some(Literal::Bool(false)),
            Token::Null => Some(Literal::Null),
            _ => None,
        };
        if let Some(literal) = literal {
            let span = self.advance().span;
            return Ok(Expr {
                kind: ExprKind::Literal(literal),
                span,
            });
        }

        match self.peek() {
            Token::Ident(_) => {
                let (name, span) = self.expect_ident("identifier")?;
                Ok(Expr {
                    kind: ExprKind::Identifier(name),
                    span,
                })
            }
            Token::Input => {
                let start = self.advance().span;
                self.expect(Token::LParen)?;
                let prompt = if self.check(&Token::RParen) {
                    None
                } else {
                    Some(Box::new(self.parse_expression()?))
                };
                let end = self.expect(Token::RParen)?;
                Ok(Expr {
                    kind: ExprKind::Input { prompt },
                    span: start.merge(end),
                })
            }
            Token::LBrace => {
                let start = self.advance().span;
                let mut elements = Vec::new();
                while !self.check(&Token::RBrace) {
                    elements.push(self.parse_expression()?);
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                let end = self.expect(Token::RBrace)?;
                Ok(Expr {
                    kind: ExprKind::Array { elements },
                    span: start.merge(end),
                })
            }
            Token::LParen => {
                let start = self.advance().span;
                let inner = self.parse_expression()?;
                let end = self.expect(Token::RParen)?;
                Ok(Expr {
                    kind: ExprKind::Grouped(Box::new(inner)),
                    span: start.merge(end),
                })
            }
            _ => Err(self.error_expected("expression")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum BinaryOperator {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

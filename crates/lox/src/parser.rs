//! Recursive-descent parser: token stream → statements appended into a shared `Ast`.
//!
//! Precedence climbs through a chain of methods, lowest to highest: `assignment`,
//! `or`, `and`, `equality`, `comparison`, `term`, `factor`, `unary`, `call`,
//! `primary` — one method per grammar level, each calling the next tighter one for
//! its operands. A parse error reports through `Diagnostics` and unwinds via
//! `ParseError` to the nearest statement boundary, where [`Parser::synchronize`]
//! resumes so one bad statement doesn't hide every error after it.

use std::rc::Rc;

use crate::ast::{Ast, BinaryOp, ExprId, ExprKind, FunctionDecl, Literal, LogicalOp, StmtId, StmtKind, UnaryOp};
use crate::diagnostics::Diagnostics;
use crate::token::{Token, TokenKind};

const MAX_ARGS: usize = 255;

struct ParseError;

pub struct Parser<'a> {
    tokens: Vec<Token>,
    current: usize,
    ast: &'a mut Ast,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, ast: &'a mut Ast, diagnostics: &'a mut Diagnostics) -> Self {
        Self { tokens, current: 0, ast, diagnostics }
    }

    /// Parses as many declarations as the token stream holds, recovering from each
    /// parse error and continuing rather than stopping at the first one.
    pub fn parse(&mut self) -> Vec<StmtId> {
        let mut stmts = Vec::new();
        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => stmts.push(stmt),
                Err(ParseError) => self.synchronize(),
            }
        }
        stmts
    }

    // --- declarations ---

    fn declaration(&mut self) -> Result<StmtId, ParseError> {
        if self.match_token(TokenKind::Class) {
            return self.class_declaration();
        }
        if self.match_token(TokenKind::Fun) {
            return self.function("function");
        }
        if self.match_token(TokenKind::Var) {
            return self.var_declaration();
        }
        self.statement()
    }

    fn class_declaration(&mut self) -> Result<StmtId, ParseError> {
        let name = self.consume(TokenKind::Identifier, "Expect class name.")?;

        let superclass = if self.match_token(TokenKind::Less) {
            let super_name = self.consume(TokenKind::Identifier, "Expect superclass name.")?;
            Some(self.ast.alloc_expr(ExprKind::Variable { name: super_name }))
        } else {
            None
        };

        self.consume(TokenKind::LeftBrace, "Expect '{' before class body.")?;

        let mut methods = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            methods.push(self.method_decl()?);
        }

        self.consume(TokenKind::RightBrace, "Expect '}' after class body.")?;

        Ok(self.ast.alloc_stmt(StmtKind::Class { name, superclass, methods }))
    }

    fn method_decl(&mut self) -> Result<Rc<FunctionDecl>, ParseError> {
        let name = self.consume(TokenKind::Identifier, "Expect method name.")?;
        self.function_tail(name)
    }

    fn function(&mut self, kind: &str) -> Result<StmtId, ParseError> {
        let name = self.consume(TokenKind::Identifier, &format!("Expect {kind} name."))?;
        let decl = self.function_tail(name)?;
        Ok(self.ast.alloc_stmt(StmtKind::Function(decl)))
    }

    fn function_tail(&mut self, name: Token) -> Result<Rc<FunctionDecl>, ParseError> {
        self.consume(TokenKind::LeftParen, "Expect '(' after name.")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_ARGS {
                    let token = self.peek().clone();
                    self.diagnostics.error_at(&token, "Can't have more than 255 parameters.");
                }
                params.push(self.consume(TokenKind::Identifier, "Expect parameter name.")?);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;
        self.consume(TokenKind::LeftBrace, "Expect '{' before body.")?;
        let body = self.block()?;
        Ok(Rc::new(FunctionDecl { name, params, body }))
    }

    fn var_declaration(&mut self) -> Result<StmtId, ParseError> {
        let name = self.consume(TokenKind::Identifier, "Expect variable name.")?;
        let initializer =
            if self.match_token(TokenKind::Equal) { Some(self.expression()?) } else { None };
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(self.ast.alloc_stmt(StmtKind::Var { name, initializer }))
    }

    // --- statements ---

    fn statement(&mut self) -> Result<StmtId, ParseError> {
        if self.match_token(TokenKind::For) {
            return self.for_statement();
        }
        if self.match_token(TokenKind::If) {
            return self.if_statement();
        }
        if self.match_token(TokenKind::Print) {
            return self.print_statement();
        }
        if self.match_token(TokenKind::Return) {
            return self.return_statement();
        }
        if self.match_token(TokenKind::While) {
            return self.while_statement();
        }
        if self.match_token(TokenKind::LeftBrace) {
            let stmts = self.block()?;
            return Ok(self.ast.alloc_stmt(StmtKind::Block(stmts)));
        }
        self.expression_statement()
    }

    /// Desugars `for (init; cond; incr) body` into `{ init; while (cond) { body; incr; } }`.
    fn for_statement(&mut self) -> Result<StmtId, ParseError> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_token(TokenKind::Semicolon) {
            None
        } else if self.match_token(TokenKind::Var) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition =
            if self.check(TokenKind::Semicolon) { None } else { Some(self.expression()?) };
        self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.")?;

        let increment =
            if self.check(TokenKind::RightParen) { None } else { Some(self.expression()?) };
        self.consume(TokenKind::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            let increment_stmt = self.ast.alloc_stmt(StmtKind::Expression(increment));
            body = self.ast.alloc_stmt(StmtKind::Block(vec![body, increment_stmt]));
        }

        let condition = condition.unwrap_or_else(|| self.ast.alloc_expr(ExprKind::Literal(Literal::Bool(true))));
        body = self.ast.alloc_stmt(StmtKind::While { condition, body });

        if let Some(initializer) = initializer {
            body = self.ast.alloc_stmt(StmtKind::Block(vec![initializer, body]));
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> Result<StmtId, ParseError> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after if condition.")?;

        let then_branch = self.statement()?;
        let else_branch = if self.match_token(TokenKind::Else) { Some(self.statement()?) } else { None };

        Ok(self.ast.alloc_stmt(StmtKind::If { condition, then_branch, else_branch }))
    }

    fn print_statement(&mut self) -> Result<StmtId, ParseError> {
        let value = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after value.")?;
        Ok(self.ast.alloc_stmt(StmtKind::Print(value)))
    }

    fn return_statement(&mut self) -> Result<StmtId, ParseError> {
        let keyword = self.previous().clone();
        let value = if self.check(TokenKind::Semicolon) { None } else { Some(self.expression()?) };
        self.consume(TokenKind::Semicolon, "Expect ';' after return value.")?;
        Ok(self.ast.alloc_stmt(StmtKind::Return { keyword, value }))
    }

    fn while_statement(&mut self) -> Result<StmtId, ParseError> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after condition.")?;
        let body = self.statement()?;
        Ok(self.ast.alloc_stmt(StmtKind::While { condition, body }))
    }

    fn block(&mut self) -> Result<Vec<StmtId>, ParseError> {
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            stmts.push(self.declaration()?);
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.")?;
        Ok(stmts)
    }

    fn expression_statement(&mut self) -> Result<StmtId, ParseError> {
        let expr = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.")?;
        Ok(self.ast.alloc_stmt(StmtKind::Expression(expr)))
    }

    // --- expressions ---

    fn expression(&mut self) -> Result<ExprId, ParseError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<ExprId, ParseError> {
        let expr = self.or()?;

        if self.match_token(TokenKind::Equal) {
            let equals = self.previous().clone();
            let value = self.assignment()?;

            return match self.ast.expr(expr) {
                ExprKind::Variable { name } => {
                    let name = name.clone();
                    Ok(self.ast.alloc_expr(ExprKind::Assign { name, value }))
                }
                ExprKind::Get { object, name } => {
                    let (object, name) = (*object, name.clone());
                    Ok(self.ast.alloc_expr(ExprKind::Set { object, name, value }))
                }
                _ => {
                    self.diagnostics.error_at(&equals, "Invalid assignment target.");
                    Ok(expr)
                }
            };
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<ExprId, ParseError> {
        let mut expr = self.and()?;
        while self.match_token(TokenKind::Or) {
            let right = self.and()?;
            expr = self.ast.alloc_expr(ExprKind::Logical { left: expr, op: LogicalOp::Or, right });
        }
        Ok(expr)
    }

    fn and(&mut self) -> Result<ExprId, ParseError> {
        let mut expr = self.equality()?;
        while self.match_token(TokenKind::And) {
            let right = self.equality()?;
            expr = self.ast.alloc_expr(ExprKind::Logical { left: expr, op: LogicalOp::And, right });
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<ExprId, ParseError> {
        let mut expr = self.comparison()?;
        loop {
            let op = if self.match_token(TokenKind::BangEqual) {
                BinaryOp::NotEqual
            } else if self.match_token(TokenKind::EqualEqual) {
                BinaryOp::Equal
            } else {
                break;
            };
            let op_token = self.previous().clone();
            let right = self.comparison()?;
            expr = self.ast.alloc_expr(ExprKind::Binary { left: expr, op, op_token, right });
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<ExprId, ParseError> {
        let mut expr = self.term()?;
        loop {
            let op = if self.match_token(TokenKind::Greater) {
                BinaryOp::Greater
            } else if self.match_token(TokenKind::GreaterEqual) {
                BinaryOp::GreaterEqual
            } else if self.match_token(TokenKind::Less) {
                BinaryOp::Less
            } else if self.match_token(TokenKind::LessEqual) {
                BinaryOp::LessEqual
            } else {
                break;
            };
            let op_token = self.previous().clone();
            let right = self.term()?;
            expr = self.ast.alloc_expr(ExprKind::Binary { left: expr, op, op_token, right });
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<ExprId, ParseError> {
        let mut expr = self.factor()?;
        loop {
            let op = if self.match_token(TokenKind::Minus) {
                BinaryOp::Subtract
            } else if self.match_token(TokenKind::Plus) {
                BinaryOp::Add
            } else {
                break;
            };
            let op_token = self.previous().clone();
            let right = self.factor()?;
            expr = self.ast.alloc_expr(ExprKind::Binary { left: expr, op, op_token, right });
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<ExprId, ParseError> {
        let mut expr = self.unary()?;
        loop {
            let op = if self.match_token(TokenKind::Slash) {
                BinaryOp::Divide
            } else if self.match_token(TokenKind::Star) {
                BinaryOp::Multiply
            } else {
                break;
            };
            let op_token = self.previous().clone();
            let right = self.unary()?;
            expr = self.ast.alloc_expr(ExprKind::Binary { left: expr, op, op_token, right });
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<ExprId, ParseError> {
        let op = if self.match_token(TokenKind::Bang) {
            Some(UnaryOp::Bang)
        } else if self.match_token(TokenKind::Minus) {
            Some(UnaryOp::Minus)
        } else {
            None
        };

        if let Some(op) = op {
            let op_token = self.previous().clone();
            let right = self.unary()?;
            return Ok(self.ast.alloc_expr(ExprKind::Unary { op, op_token, right }));
        }

        self.call()
    }

    fn call(&mut self) -> Result<ExprId, ParseError> {
        let mut expr = self.primary()?;

        loop {
            if self.match_token(TokenKind::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if self.match_token(TokenKind::Dot) {
                let name = self.consume(TokenKind::Identifier, "Expect property name after '.'.")?;
                expr = self.ast.alloc_expr(ExprKind::Get { object: expr, name });
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: ExprId) -> Result<ExprId, ParseError> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if args.len() >= MAX_ARGS {
                    let token = self.peek().clone();
                    self.diagnostics.error_at(&token, "Can't have more than 255 arguments.");
                }
                args.push(self.expression()?);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        let paren = self.consume(TokenKind::RightParen, "Expect ')' after arguments.")?;
        Ok(self.ast.alloc_expr(ExprKind::Call { callee, paren, args }))
    }

    fn primary(&mut self) -> Result<ExprId, ParseError> {
        if self.match_token(TokenKind::False) {
            return Ok(self.ast.alloc_expr(ExprKind::Literal(Literal::Bool(false))));
        }
        if self.match_token(TokenKind::True) {
            return Ok(self.ast.alloc_expr(ExprKind::Literal(Literal::Bool(true))));
        }
        if self.match_token(TokenKind::Nil) {
            return Ok(self.ast.alloc_expr(ExprKind::Literal(Literal::Nil)));
        }
        if self.match_token(TokenKind::Number) {
            let Some(crate::token::TokenLiteral::Number(n)) = self.previous().literal else {
                unreachable!("scanner always attaches a Number literal to a Number token")
            };
            return Ok(self.ast.alloc_expr(ExprKind::Literal(Literal::Number(n))));
        }
        if self.match_token(TokenKind::String) {
            let Some(crate::token::TokenLiteral::Str(s)) = self.previous().literal.clone() else {
                unreachable!("scanner always attaches a Str literal to a String token")
            };
            return Ok(self.ast.alloc_expr(ExprKind::Literal(Literal::Str(s))));
        }
        if self.match_token(TokenKind::Super) {
            let keyword = self.previous().clone();
            self.consume(TokenKind::Dot, "Expect '.' after 'super'.")?;
            let method = self.consume(TokenKind::Identifier, "Expect superclass method name.")?;
            return Ok(self.ast.alloc_expr(ExprKind::Super { keyword, method }));
        }
        if self.match_token(TokenKind::This) {
            let keyword = self.previous().clone();
            return Ok(self.ast.alloc_expr(ExprKind::This { keyword }));
        }
        if self.match_token(TokenKind::Identifier) {
            let name = self.previous().clone();
            return Ok(self.ast.alloc_expr(ExprKind::Variable { name }));
        }
        if self.match_token(TokenKind::LeftParen) {
            let expr = self.expression()?;
            self.consume(TokenKind::RightParen, "Expect ')' after expression.")?;
            return Ok(self.ast.alloc_expr(ExprKind::Grouping(expr)));
        }

        let token = self.peek().clone();
        self.diagnostics.error_at(&token, "Expect expression.");
        Err(ParseError)
    }

    // --- token stream helpers ---

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            return Ok(self.advance().clone());
        }
        let token = self.peek().clone();
        self.diagnostics.error_at(&token, message);
        Err(ParseError)
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    /// Discards tokens until we're at a plausible statement boundary, so a single
    /// syntax error doesn't cascade into a wall of spurious followups.
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            match self.peek().kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> (Ast, bool) {
        let mut diagnostics = Diagnostics::new();
        let tokens = crate::scanner::Scanner::new(source, &mut diagnostics).scan_tokens();
        let mut ast = Ast::new();
        Parser::new(tokens, &mut ast, &mut diagnostics).parse();
        (ast, diagnostics.had_error())
    }

    #[test]
    fn parses_arithmetic_with_precedence() {
        let (_, had_error) = parse("1 + 2 * 3;");
        assert!(!had_error);
    }

    #[test]
    fn missing_semicolon_is_a_parse_error() {
        let (_, had_error) = parse("var x = 1");
        assert!(had_error);
    }

    #[test]
    fn invalid_assignment_target_is_reported_but_recovers() {
        let (_, had_error) = parse("1 + 2 = 3;");
        assert!(had_error);
    }

    #[test]
    fn for_loop_desugars_without_error() {
        let (_, had_error) = parse("for (var i = 0; i < 3; i = i + 1) print i;");
        assert!(!had_error);
    }

    #[test]
    fn class_with_superclass_and_methods_parses() {
        let (_, had_error) = parse("class A { foo() { return 1; } } class B < A { bar() { return super.foo(); } }");
        assert!(!had_error);
    }
}

//! Static scope analysis: annotates each variable use with a scope depth and
//! catches the handful of errors that are cheaper to find before execution.
//!
//! The resolver never mutates the AST; it only writes into the caller-supplied
//! `locals` depth table and into the shared `Diagnostics` sink. Running it is what
//! lets the interpreter capture a closure's *defining* environment rather than
//! whatever environment happens to be live at the call site (see the `environment`
//! module and `interpreter::Interpreter::look_up_variable`).

use std::collections::HashMap;

use crate::ast::{Ast, ExprId, ExprKind, StmtId, StmtKind};
use crate::diagnostics::Diagnostics;
use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VarState {
    Declared,
    Defined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionKind {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassKind {
    None,
    Class,
    Subclass,
}

/// Resolves a batch of top-level statements, writing scope depths into `locals`.
///
/// Global scope is never pushed onto the scope stack: a name lookup that falls off
/// the stack is left unresolved, which the interpreter interprets as "look it up in
/// `globals`". Each call starts with an empty scope stack, so repeated calls (one
/// per REPL line) behave as though every line's declarations are additional
/// top-level declarations — exactly what a REPL needs.
pub fn resolve(ast: &Ast, stmts: &[StmtId], locals: &mut HashMap<ExprId, usize>, diagnostics: &mut Diagnostics) {
    let mut resolver = Resolver {
        ast,
        scopes: Vec::new(),
        current_function: FunctionKind::None,
        current_class: ClassKind::None,
        locals,
        diagnostics,
    };
    resolver.resolve_stmts(stmts);
}

struct Resolver<'a> {
    ast: &'a Ast,
    scopes: Vec<HashMap<String, VarState>>,
    current_function: FunctionKind,
    current_class: ClassKind,
    locals: &'a mut HashMap<ExprId, usize>,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Resolver<'a> {
    fn resolve_stmts(&mut self, stmts: &[StmtId]) {
        for &stmt in stmts {
            self.resolve_stmt(stmt);
        }
    }

    fn resolve_stmt(&mut self, stmt: StmtId) {
        match self.ast.stmt(stmt) {
            StmtKind::Expression(expr) | StmtKind::Print(expr) => self.resolve_expr(*expr),
            StmtKind::Var { name, initializer } => {
                self.declare(name);
                if let Some(init) = initializer {
                    self.resolve_expr(*init);
                }
                self.define(name);
            }
            StmtKind::Block(stmts) => {
                self.begin_scope();
                self.resolve_stmts(stmts);
                self.end_scope();
            }
            StmtKind::If { condition, then_branch, else_branch } => {
                self.resolve_expr(*condition);
                self.resolve_stmt(*then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(*else_branch);
                }
            }
            StmtKind::While { condition, body } => {
                self.resolve_expr(*condition);
                self.resolve_stmt(*body);
            }
            StmtKind::Function(decl) => {
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(&decl.params, &decl.body, FunctionKind::Function);
            }
            StmtKind::Return { keyword, value } => {
                if self.current_function == FunctionKind::None {
                    self.diagnostics.error_at(keyword, "Can't return from top-level code.");
                }
                if let Some(value) = value {
                    if self.current_function == FunctionKind::Initializer {
                        self.diagnostics.error_at(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(*value);
                }
            }
            StmtKind::Class { name, superclass, methods } => {
                let enclosing_class = self.current_class;
                self.current_class = ClassKind::Class;

                self.declare(name);
                self.define(name);

                if let Some(superclass) = superclass {
                    if let ExprKind::Variable { name: super_name } = self.ast.expr(*superclass) {
                        if super_name.lexeme == name.lexeme {
                            self.diagnostics.error_at(super_name, "A class can't inherit from itself.");
                        }
                    }
                    self.current_class = ClassKind::Subclass;
                    self.resolve_expr(*superclass);
                    self.begin_scope();
                    self.scopes.last_mut().expect("scope just pushed").insert("super".to_owned(), VarState::Defined);
                }

                self.begin_scope();
                self.scopes.last_mut().expect("scope just pushed").insert("this".to_owned(), VarState::Defined);

                for method in methods {
                    let kind =
                        if method.name.lexeme.as_ref() == "init" { FunctionKind::Initializer } else { FunctionKind::Method };
                    self.resolve_function(&method.params, &method.body, kind);
                }

                self.end_scope();
                if superclass.is_some() {
                    self.end_scope();
                }

                self.current_class = enclosing_class;
            }
        }
    }

    fn resolve_expr(&mut self, expr: ExprId) {
        match self.ast.expr(expr) {
            ExprKind::Literal(_) => {}
            ExprKind::Grouping(inner) => self.resolve_expr(*inner),
            ExprKind::Unary { right, .. } => self.resolve_expr(*right),
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.resolve_expr(*left);
                self.resolve_expr(*right);
            }
            ExprKind::Variable { name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(name.lexeme.as_ref()) == Some(&VarState::Declared) {
                        self.diagnostics.error_at(name, "Can't read local variable in its own initializer.");
                    }
                }
                self.resolve_local(expr, name);
            }
            ExprKind::Assign { name, value } => {
                self.resolve_expr(*value);
                self.resolve_local(expr, name);
            }
            ExprKind::Call { callee, args, .. } => {
                self.resolve_expr(*callee);
                for &arg in args {
                    self.resolve_expr(arg);
                }
            }
            ExprKind::Get { object, .. } => self.resolve_expr(*object),
            ExprKind::Set { object, value, .. } => {
                self.resolve_expr(*value);
                self.resolve_expr(*object);
            }
            ExprKind::This { keyword } => {
                if self.current_class == ClassKind::None {
                    self.diagnostics.error_at(keyword, "Can't use 'this' outside of a class.");
                    return;
                }
                self.resolve_local(expr, keyword);
            }
            ExprKind::Super { keyword, .. } => {
                match self.current_class {
                    ClassKind::None => {
                        self.diagnostics.error_at(keyword, "Can't use 'super' outside of a class.");
                    }
                    ClassKind::Class => {
                        self.diagnostics.error_at(keyword, "Can't use 'super' in a class with no superclass.");
                    }
                    ClassKind::Subclass => {}
                }
                self.resolve_local(expr, keyword);
            }
        }
    }

    fn resolve_function(&mut self, params: &[Token], body: &[StmtId], kind: FunctionKind) {
        let enclosing_function = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(body);
        self.end_scope();

        self.current_function = enclosing_function;
    }

    fn resolve_local(&mut self, expr: ExprId, name: &Token) {
        for (i, scope) in self.scopes.iter().enumerate().rev() {
            if scope.contains_key(name.lexeme.as_ref()) {
                self.locals.insert(expr, self.scopes.len() - 1 - i);
                return;
            }
        }
        // Not found in any scope: treat as global, consistent with the interpreter's
        // "absence means globals" rule.
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else { return };
        if scope.contains_key(name.lexeme.as_ref()) {
            self.diagnostics.error_at(name, "Already a variable with this name in this scope.");
        }
        scope.insert(name.lexeme.to_string(), VarState::Declared);
    }

    fn define(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else { return };
        scope.insert(name.lexeme.to_string(), VarState::Defined);
    }
}

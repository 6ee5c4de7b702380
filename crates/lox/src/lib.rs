#![doc = include_str!("../../../README.md")]

mod ast;
mod callable;
mod diagnostics;
mod environment;
mod interpreter;
mod io;
mod parser;
mod resolver;
mod scanner;
mod token;
mod value;

use std::collections::HashMap;

use ast::{Ast, ExprId, StmtId};
use environment::Environment;
use interpreter::Interpreter;
use parser::Parser;
use scanner::Scanner;

pub use diagnostics::{Diagnostics, RuntimeError};
pub use io::{CollectStringPrint, NoPrint, PrintWriter, StdPrint};
pub use value::Value;

/// A session of the Lox pipeline: scanner, parser, resolver and interpreter, sharing
/// one growing `Ast` and one global environment across every call to [`Lox::run`].
///
/// A single `Lox` can be driven either as a one-shot script runner (one `run` call)
/// or as a REPL (one `run` call per line): global declarations and scope-depth
/// resolutions made by an earlier call remain visible to later ones, which is what
/// lets a function defined on one REPL line close over a variable defined on another.
pub struct Lox {
    ast: Ast,
    locals: HashMap<ExprId, usize>,
    globals: Environment,
}

impl Lox {
    #[must_use]
    pub fn new() -> Self {
        Self { ast: Ast::new(), locals: HashMap::new(), globals: Environment::new_global() }
    }

    /// Scans, parses, resolves and interprets `source`, writing `print` output
    /// through `print` and diagnostics through `diagnostics`.
    ///
    /// Returns early (without interpreting) if scanning or parsing produced any
    /// error, matching the reference driver's "don't execute code we're not sure we
    /// understood" behavior. Static errors and runtime errors are both reported
    /// through `diagnostics` rather than returned, since a REPL needs to keep going
    /// after either kind.
    pub fn run(&mut self, source: &str, print: &mut dyn PrintWriter, diagnostics: &mut Diagnostics) {
        let Some(stmts) = self.parse(source, diagnostics) else { return };

        resolver::resolve(&self.ast, &stmts, &mut self.locals, diagnostics);
        if diagnostics.had_error() {
            return;
        }

        let mut interpreter = Interpreter::with_globals(&self.ast, &self.locals, print, self.globals.clone());
        if let Err(err) = interpreter.interpret(&stmts) {
            diagnostics.runtime_error(&err);
        }
    }

    fn parse(&mut self, source: &str, diagnostics: &mut Diagnostics) -> Option<Vec<StmtId>> {
        let tokens = Scanner::new(source, diagnostics).scan_tokens();
        let stmts = Parser::new(tokens, &mut self.ast, diagnostics).parse();
        if diagnostics.had_error() { None } else { Some(stmts) }
    }
}

impl Default for Lox {
    fn default() -> Self {
        Self::new()
    }
}

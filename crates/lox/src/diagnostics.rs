//! Error reporting sink shared by the scanner, parser, resolver and interpreter.
//!
//! The reference implementation this language is modeled on keeps `hadError` and
//! `hadRuntimeError` as process-global flags. A library crate should not impose a
//! process-wide global on embedders, so both flags live on a `Diagnostics` value the
//! caller owns and threads (by reference) through every pipeline stage instead.

use std::cell::Cell;
use std::fmt;
use std::io::{self, Write};

use crate::token::{Token, TokenKind};

/// A runtime error: wrong operand types, undefined names, wrong arity, and so on.
///
/// `token` supplies the source line for the `[line L]` suffix reported to the sink.
/// Some errors raised deep inside a native call (e.g. in `clock`) may have no
/// precise token at hand and carry `None`.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub message: String,
    pub token: Option<Token>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, token: Token) -> Self {
        Self { message: message.into(), token: Some(token) }
    }

    pub fn without_token(message: impl Into<String>) -> Self {
        Self { message: message.into(), token: None }
    }

    fn line(&self) -> Option<u32> {
        self.token.as_ref().map(|t| t.line)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RuntimeError {}

/// Collects `hadError`/`hadRuntimeError` state and writes formatted diagnostics to an
/// injectable sink, rather than hardcoding `eprintln!` at every call site.
pub struct Diagnostics<W: Write = io::Stderr> {
    had_error: Cell<bool>,
    had_runtime_error: Cell<bool>,
    sink: W,
}

impl Diagnostics<io::Stderr> {
    #[must_use]
    pub fn new() -> Self {
        Self { had_error: Cell::new(false), had_runtime_error: Cell::new(false), sink: io::stderr() }
    }
}

impl Default for Diagnostics<io::Stderr> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Diagnostics<W> {
    pub fn with_sink(sink: W) -> Self {
        Self { had_error: Cell::new(false), had_runtime_error: Cell::new(false), sink }
    }

    #[must_use]
    pub fn had_error(&self) -> bool {
        self.had_error.get()
    }

    #[must_use]
    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error.get()
    }

    /// Clears the static-error flag. Called by the REPL between lines; the
    /// runtime-error flag is intentionally left untouched (see §9 of the design).
    pub fn reset_error(&self) {
        self.had_error.set(false);
    }

    /// Reports a lexical error tied only to a line number.
    pub fn error(&mut self, line: u32, message: &str) {
        self.report(line, "", message);
    }

    /// Reports a parse or resolve error tied to a specific token.
    pub fn error_at(&mut self, token: &Token, message: &str) {
        if token.kind == TokenKind::Eof {
            self.report(token.line, " at end", message);
        } else {
            self.report(token.line, &format!(" at '{}'", token.lexeme), message);
        }
    }

    /// Reports a runtime error that unwound to the top of execution.
    pub fn runtime_error(&mut self, err: &RuntimeError) {
        self.had_runtime_error.set(true);
        let _ = match err.line() {
            Some(line) => writeln!(self.sink, "{}\n[line {line}]", err.message),
            None => writeln!(self.sink, "{}", err.message),
        };
    }

    fn report(&mut self, line: u32, location: &str, message: &str) {
        self.had_error.set(true);
        let _ = writeln!(self.sink, "[line {line}] Error{location}: {message}");
    }
}

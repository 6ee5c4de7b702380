//! Lexically nested name→value environment chain.
//!
//! Each frame is reference-counted so a closure can capture its defining frame and
//! keep it alive after the scope that created it has otherwise gone out of scope —
//! there is no garbage collector here, just ordinary `Rc` lifetime extension.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::diagnostics::RuntimeError;
use crate::token::Token;
use crate::value::Value;

struct EnvironmentData {
    values: HashMap<String, Value>,
    enclosing: Option<Environment>,
}

/// A single frame in the environment chain, cheap to clone (an `Rc` bump).
#[derive(Clone)]
pub struct Environment(Rc<RefCell<EnvironmentData>>);

impl Environment {
    /// Creates a fresh global frame with no enclosing scope.
    #[must_use]
    pub fn new_global() -> Self {
        Self(Rc::new(RefCell::new(EnvironmentData { values: HashMap::new(), enclosing: None })))
    }

    /// Creates a fresh frame nested directly inside `enclosing`.
    #[must_use]
    pub fn with_enclosing(enclosing: Environment) -> Self {
        Self(Rc::new(RefCell::new(EnvironmentData { values: HashMap::new(), enclosing: Some(enclosing) })))
    }

    /// `define` always writes to this frame unconditionally — redefining an existing
    /// name in the same frame (allowed at global scope, and used by REPL reruns) just
    /// overwrites the slot.
    pub fn define(&self, name: &str, value: Value) {
        self.0.borrow_mut().values.insert(name.to_owned(), value);
    }

    /// Walks outward from this frame searching for an existing binding of `name`.
    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = self.0.borrow().values.get(name.lexeme.as_ref()) {
            return Ok(value.clone());
        }
        if let Some(enclosing) = &self.0.borrow().enclosing {
            return enclosing.get(name);
        }
        Err(RuntimeError::new(format!("Undefined variable '{}'.", name.lexeme), name.clone()))
    }

    /// Walks outward searching for an existing binding of `name` to overwrite; fails
    /// if no frame in the chain already defines it (Lox has no implicit globals).
    pub fn assign(&self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        if self.0.borrow().values.contains_key(name.lexeme.as_ref()) {
            self.0.borrow_mut().values.insert(name.lexeme.to_string(), value);
            return Ok(());
        }
        let enclosing = self.0.borrow().enclosing.clone();
        if let Some(enclosing) = enclosing {
            return enclosing.assign(name, value);
        }
        Err(RuntimeError::new(format!("Undefined variable '{}'.", name.lexeme), name.clone()))
    }

    /// Walks exactly `distance` links outward and reads from that frame directly,
    /// trusting the resolver's placement (no presence check).
    #[must_use]
    pub fn get_at(&self, distance: usize, name: &str) -> Value {
        self.ancestor(distance).0.borrow().values.get(name).cloned().expect("resolver-placed binding must exist")
    }

    /// Walks exactly `distance` links outward and writes directly into that frame.
    pub fn assign_at(&self, distance: usize, name: &str, value: Value) {
        self.ancestor(distance).0.borrow_mut().values.insert(name.to_owned(), value);
    }

    fn ancestor(&self, distance: usize) -> Environment {
        let mut env = self.clone();
        for _ in 0..distance {
            let next = env.0.borrow().enclosing.clone().expect("resolver distance must not exceed chain length");
            env = next;
        }
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;

    fn name_token(name: &str) -> Token {
        Token::new(TokenKind::Identifier, name, None, 1)
    }

    #[test]
    fn define_then_get_round_trips() {
        let env = Environment::new_global();
        env.define("a", Value::Number(1.0));
        assert_eq!(env.get(&name_token("a")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn get_falls_through_to_enclosing() {
        let global = Environment::new_global();
        global.define("a", Value::Number(1.0));
        let child = Environment::with_enclosing(global);
        assert_eq!(child.get(&name_token("a")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn assign_fails_when_undefined_anywhere() {
        let env = Environment::new_global();
        assert!(env.assign(&name_token("missing"), Value::Nil).is_err());
    }

    #[test]
    fn assign_writes_to_the_frame_that_defines_the_name() {
        let global = Environment::new_global();
        global.define("a", Value::Number(1.0));
        let child = Environment::with_enclosing(global.clone());
        child.assign(&name_token("a"), Value::Number(2.0)).unwrap();
        assert_eq!(global.get(&name_token("a")).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn get_at_and_assign_at_walk_exact_distance() {
        let global = Environment::new_global();
        global.define("shadowed", Value::Number(0.0));
        let middle = Environment::with_enclosing(global);
        middle.define("shadowed", Value::Number(1.0));
        let inner = Environment::with_enclosing(middle);
        assert_eq!(inner.get_at(1, "shadowed"), Value::Number(1.0));
        inner.assign_at(1, "shadowed", Value::Number(2.0));
        assert_eq!(inner.get_at(1, "shadowed"), Value::Number(2.0));
    }
}

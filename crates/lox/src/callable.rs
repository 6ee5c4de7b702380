//! Callable values: native functions, user functions/closures, classes and instances.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::FunctionDecl;
use crate::environment::Environment;
use crate::value::Value;

/// A callable value. Refines into the four shapes the language can invoke.
#[derive(Clone)]
pub enum Callable {
    Native(Rc<NativeFunction>),
    Function(Rc<LoxFunction>),
    Class(Rc<LoxClass>),
    Instance(Rc<RefCell<LoxInstance>>),
}

impl Callable {
    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            Callable::Native(f) => f.arity,
            Callable::Function(f) => f.declaration.params.len(),
            Callable::Class(c) => c.find_method("init").map_or(0, |init| init.declaration.params.len()),
            Callable::Instance(_) => 0,
        }
    }

    /// Identity comparison used by `Value`'s strict-equality rule: two callables are
    /// equal only if they are literally the same underlying object.
    #[must_use]
    pub fn is_same(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Native(a), Callable::Native(b)) => Rc::ptr_eq(a, b),
            (Callable::Function(a), Callable::Function(b)) => Rc::ptr_eq(a, b),
            (Callable::Class(a), Callable::Class(b)) => Rc::ptr_eq(a, b),
            (Callable::Instance(a), Callable::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Callable {
    /// `NativeFunction` holds a boxed closure, which has no meaningful `Debug` of its
    /// own, so this just reuses the `Display` rendering used to print callables.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Native(n) => write!(f, "<native fn {}>", n.name),
            Callable::Function(func) => write!(f, "<fn {}>", func.declaration.name.lexeme),
            Callable::Class(c) => write!(f, "{}", c.name),
            Callable::Instance(i) => write!(f, "{} instance", i.borrow().class.name),
        }
    }
}

/// A host-provided builtin such as `clock`.
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: Box<dyn Fn(&[Value]) -> Value>,
}

/// A user-defined function or method, paired with the environment in force at its
/// declaration (its closure).
pub struct LoxFunction {
    pub declaration: Rc<FunctionDecl>,
    pub closure: Environment,
    pub is_initializer: bool,
}

impl LoxFunction {
    /// Produces a new function whose closure is a fresh environment binding `this`
    /// to `instance`, one frame above the function's declared closure.
    #[must_use]
    pub fn bind(&self, instance: Rc<RefCell<LoxInstance>>) -> Rc<LoxFunction> {
        let env = Environment::with_enclosing(self.closure.clone());
        env.define("this", Value::Callable(Callable::Instance(instance)));
        Rc::new(LoxFunction { declaration: self.declaration.clone(), closure: env, is_initializer: self.is_initializer })
    }
}

/// A class: a name, an optional superclass, and its own (unflattened) method table.
pub struct LoxClass {
    pub name: String,
    pub superclass: Option<Rc<LoxClass>>,
    pub methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    /// Looks up a method by name, walking the superclass chain.
    #[must_use]
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        if let Some(method) = self.methods.get(name) {
            return Some(method.clone());
        }
        self.superclass.as_ref().and_then(|sup| sup.find_method(name))
    }
}

/// A class instance: its class plus a mutable field table.
pub struct LoxInstance {
    pub class: Rc<LoxClass>,
    pub fields: HashMap<String, Value>,
}

impl LoxInstance {
    #[must_use]
    pub fn new(class: Rc<LoxClass>) -> Self {
        Self { class, fields: HashMap::new() }
    }

    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }
}

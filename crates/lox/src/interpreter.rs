//! The tree-walking evaluator.
//!
//! Statements execute for effect; expressions evaluate to a `Value`. Control flow
//! that needs to unwind past ordinary statement execution — `return` — rides back up
//! through `Result`'s error channel as a `Signal::Return`, threaded through `?` at
//! every call site instead of using native exceptions.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{Ast, BinaryOp, ExprId, ExprKind, FunctionDecl, Literal, LogicalOp, StmtId, StmtKind, UnaryOp};
use crate::callable::{Callable, LoxClass, LoxFunction, LoxInstance, NativeFunction};
use crate::diagnostics::RuntimeError;
use crate::environment::Environment;
use crate::io::PrintWriter;
use crate::token::Token;
use crate::value::Value;

/// What happened while executing a sequence of statements: either we ran off the
/// end normally, or a `return` unwound with a value.
enum Signal {
    Normal,
    Return(Value),
}

type ExecResult = Result<Signal, RuntimeError>;

/// Owns global and current-scope state for one interpreter session.
///
/// `locals` is the resolver's depth table, consulted by [`Interpreter::look_up_variable`]
/// and [`Interpreter::exec_assign`]; an `ExprId` absent from the table is a global
/// reference.
pub struct Interpreter<'a> {
    globals: Environment,
    environment: Environment,
    locals: &'a HashMap<ExprId, usize>,
    ast: &'a Ast,
    print: &'a mut dyn PrintWriter,
}

impl<'a> Interpreter<'a> {
    #[must_use]
    pub fn new(ast: &'a Ast, locals: &'a HashMap<ExprId, usize>, print: &'a mut dyn PrintWriter) -> Self {
        let globals = Environment::new_global();
        seed_globals(&globals);
        Self { environment: globals.clone(), globals, locals, ast, print }
    }

    /// Like [`Interpreter::new`], but reuses an existing global environment instead of
    /// seeding a fresh one. Used by the REPL driver, where each line parses and
    /// resolves into the session's growing `Ast` but must see every earlier line's
    /// global declarations.
    #[must_use]
    pub fn with_globals(
        ast: &'a Ast,
        locals: &'a HashMap<ExprId, usize>,
        print: &'a mut dyn PrintWriter,
        globals: Environment,
    ) -> Self {
        Self { environment: globals.clone(), globals, locals, ast, print }
    }

    /// Executes a batch of top-level statements (one program, or one REPL line).
    pub fn interpret(&mut self, stmts: &[StmtId]) -> Result<(), RuntimeError> {
        for &stmt in stmts {
            self.execute(stmt)?;
        }
        Ok(())
    }

    fn execute(&mut self, stmt: StmtId) -> Result<(), RuntimeError> {
        self.exec(stmt).map(|_| ())
    }

    fn exec(&mut self, stmt: StmtId) -> ExecResult {
        match self.ast.stmt(stmt) {
            StmtKind::Expression(expr) => {
                self.evaluate(*expr)?;
                Ok(Signal::Normal)
            }
            StmtKind::Print(expr) => {
                let value = self.evaluate(*expr)?;
                self.print.print_line(&value.stringify());
                Ok(Signal::Normal)
            }
            StmtKind::Var { name, initializer } => {
                let value = match initializer {
                    Some(init) => self.evaluate(*init)?,
                    None => Value::Nil,
                };
                self.environment.define(&name.lexeme, value);
                Ok(Signal::Normal)
            }
            StmtKind::Block(stmts) => {
                let enclosing = Environment::with_enclosing(self.environment.clone());
                self.exec_block(stmts, enclosing)
            }
            StmtKind::If { condition, then_branch, else_branch } => {
                if self.evaluate(*condition)?.is_truthy() {
                    self.exec(*then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.exec(*else_branch)
                } else {
                    Ok(Signal::Normal)
                }
            }
            StmtKind::While { condition, body } => {
                while self.evaluate(*condition)?.is_truthy() {
                    match self.exec(*body)? {
                        Signal::Normal => {}
                        ret @ Signal::Return(_) => return Ok(ret),
                    }
                }
                Ok(Signal::Normal)
            }
            StmtKind::Function(decl) => {
                let function =
                    LoxFunction { declaration: decl.clone(), closure: self.environment.clone(), is_initializer: false };
                self.environment.define(&decl.name.lexeme, Value::Callable(Callable::Function(Rc::new(function))));
                Ok(Signal::Normal)
            }
            StmtKind::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(*expr)?,
                    None => Value::Nil,
                };
                Ok(Signal::Return(value))
            }
            StmtKind::Class { name, superclass, methods } => self.exec_class(name, superclass, methods),
        }
    }

    /// Runs `stmts` with `environment` as the current frame, restoring the caller's
    /// frame afterward even if a statement raises or returns early.
    fn exec_block(&mut self, stmts: &[StmtId], environment: Environment) -> ExecResult {
        let previous = std::mem::replace(&mut self.environment, environment);
        let result = (|| {
            for &stmt in stmts {
                match self.exec(stmt)? {
                    Signal::Normal => {}
                    ret @ Signal::Return(_) => return Ok(ret),
                }
            }
            Ok(Signal::Normal)
        })();
        self.environment = previous;
        result
    }

    fn exec_class(
        &mut self,
        name: &Token,
        superclass: &Option<ExprId>,
        methods: &[Rc<FunctionDecl>],
    ) -> ExecResult {
        let superclass_value = match superclass {
            Some(expr) => {
                let value = self.evaluate(*expr)?;
                match value {
                    Value::Callable(Callable::Class(class)) => Some(class),
                    _ => {
                        let token = match self.ast.expr(*expr) {
                            ExprKind::Variable { name } => name.clone(),
                            _ => name.clone(),
                        };
                        return Err(RuntimeError::new("Superclass must be a class.", token));
                    }
                }
            }
            None => None,
        };

        self.environment.define(&name.lexeme, Value::Nil);

        let method_env = match &superclass_value {
            Some(sup) => {
                let env = Environment::with_enclosing(self.environment.clone());
                env.define("super", Value::Callable(Callable::Class(sup.clone())));
                env
            }
            None => self.environment.clone(),
        };

        let mut method_table = HashMap::new();
        for method in methods {
            let function = LoxFunction {
                declaration: method.clone(),
                closure: method_env.clone(),
                is_initializer: method.name.lexeme.as_ref() == "init",
            };
            method_table.insert(method.name.lexeme.to_string(), Rc::new(function));
        }

        let class = Rc::new(LoxClass { name: name.lexeme.to_string(), superclass: superclass_value, methods: method_table });
        self.environment.assign(name, Value::Callable(Callable::Class(class))).expect("just defined above");
        Ok(Signal::Normal)
    }

    fn evaluate(&mut self, expr: ExprId) -> Result<Value, RuntimeError> {
        match self.ast.expr(expr) {
            ExprKind::Literal(lit) => Ok(literal_value(lit)),
            ExprKind::Grouping(inner) => self.evaluate(*inner),
            ExprKind::Unary { op, op_token, right } => self.eval_unary(*op, op_token, *right),
            ExprKind::Binary { left, op, op_token, right } => self.eval_binary(*left, *op, op_token, *right),
            ExprKind::Logical { left, op, right } => self.eval_logical(*left, *op, *right),
            ExprKind::Variable { name } => self.look_up_variable(expr, name),
            ExprKind::Assign { name, value } => self.eval_assign(expr, name, *value),
            ExprKind::Call { callee, paren, args } => self.eval_call(*callee, paren, args),
            ExprKind::Get { object, name } => self.eval_get(*object, name),
            ExprKind::Set { object, name, value } => self.eval_set(*object, name, *value),
            ExprKind::This { keyword } => self.look_up_variable(expr, keyword),
            ExprKind::Super { keyword, method } => self.eval_super(expr, keyword, method),
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, op_token: &Token, right: ExprId) -> Result<Value, RuntimeError> {
        let right = self.evaluate(right)?;
        match op {
            UnaryOp::Bang => Ok(Value::Bool(!right.is_truthy())),
            UnaryOp::Minus => match right {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(RuntimeError::new("Operand must be a number.", op_token.clone())),
            },
        }
    }

    fn eval_binary(&mut self, left: ExprId, op: BinaryOp, op_token: &Token, right: ExprId) -> Result<Value, RuntimeError> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;
        match op {
            BinaryOp::Equal => Ok(Value::Bool(left == right)),
            BinaryOp::NotEqual => Ok(Value::Bool(left != right)),
            BinaryOp::Add => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(Rc::from(format!("{a}{b}")))),
                _ => Err(RuntimeError::new("Operands must be two numbers or two strings.", op_token.clone())),
            },
            BinaryOp::Subtract => numeric(left, right, op_token, |a, b| a - b),
            BinaryOp::Multiply => numeric(left, right, op_token, |a, b| a * b),
            BinaryOp::Divide => numeric(left, right, op_token, |a, b| a / b),
            BinaryOp::Less => compare(left, right, op_token, |a, b| a < b),
            BinaryOp::LessEqual => compare(left, right, op_token, |a, b| a <= b),
            BinaryOp::Greater => compare(left, right, op_token, |a, b| a > b),
            BinaryOp::GreaterEqual => compare(left, right, op_token, |a, b| a >= b),
        }
    }

    fn eval_logical(&mut self, left: ExprId, op: LogicalOp, right: ExprId) -> Result<Value, RuntimeError> {
        let left = self.evaluate(left)?;
        match op {
            LogicalOp::Or if left.is_truthy() => Ok(left),
            LogicalOp::And if !left.is_truthy() => Ok(left),
            _ => self.evaluate(right),
        }
    }

    fn look_up_variable(&self, expr: ExprId, name: &Token) -> Result<Value, RuntimeError> {
        match self.locals.get(&expr) {
            Some(&distance) => Ok(self.environment.get_at(distance, &name.lexeme)),
            None => self.globals.get(name),
        }
    }

    fn eval_assign(&mut self, expr: ExprId, name: &Token, value: ExprId) -> Result<Value, RuntimeError> {
        let value = self.evaluate(value)?;
        match self.locals.get(&expr) {
            Some(&distance) => self.environment.assign_at(distance, &name.lexeme, value.clone()),
            None => self.globals.assign(name, value.clone())?,
        }
        Ok(value)
    }

    fn eval_call(&mut self, callee: ExprId, paren: &Token, args: &[ExprId]) -> Result<Value, RuntimeError> {
        let callee = self.evaluate(callee)?;
        let mut arguments = Vec::with_capacity(args.len());
        for &arg in args {
            arguments.push(self.evaluate(arg)?);
        }

        let Value::Callable(callable @ (Callable::Native(_) | Callable::Function(_) | Callable::Class(_))) = callee
        else {
            return Err(RuntimeError::new("Can only call functions and classes.", paren.clone()));
        };

        let arity = callable.arity();
        if arguments.len() != arity {
            return Err(RuntimeError::new(
                format!("Expected {arity} arguments but got {}.", arguments.len()),
                paren.clone(),
            ));
        }

        self.call(callable, arguments)
    }

    fn call(&mut self, callable: Callable, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
        match callable {
            Callable::Native(native) => Ok((native.func)(&arguments)),
            Callable::Function(function) => self.call_function(&function, arguments),
            Callable::Class(class) => {
                let instance = Rc::new(RefCell::new(LoxInstance::new(class.clone())));
                if let Some(initializer) = class.find_method("init") {
                    let bound = initializer.bind(instance.clone());
                    self.call_function(&bound, arguments)?;
                }
                Ok(Value::Callable(Callable::Instance(instance)))
            }
            Callable::Instance(_) => unreachable!("eval_call filters out Instance before calling Interpreter::call"),
        }
    }

    fn call_function(&mut self, function: &Rc<LoxFunction>, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
        let call_env = Environment::with_enclosing(function.closure.clone());
        for (param, arg) in function.declaration.params.iter().zip(arguments) {
            call_env.define(&param.lexeme, arg);
        }

        let signal = self.exec_block(&function.declaration.body, call_env)?;

        if function.is_initializer {
            return Ok(function.closure.get_at(0, "this"));
        }

        Ok(match signal {
            Signal::Normal => Value::Nil,
            Signal::Return(value) => value,
        })
    }

    fn eval_get(&mut self, object: ExprId, name: &Token) -> Result<Value, RuntimeError> {
        let object = self.evaluate(object)?;
        let Value::Callable(Callable::Instance(instance)) = object else {
            return Err(RuntimeError::new("Only instances have properties.", name.clone()));
        };

        if let Some(value) = instance.borrow().get_field(&name.lexeme) {
            return Ok(value);
        }

        let class = instance.borrow().class.clone();
        if let Some(method) = class.find_method(&name.lexeme) {
            return Ok(Value::Callable(Callable::Function(method.bind(instance))));
        }

        Err(RuntimeError::new(format!("Undefined property '{}'.", name.lexeme), name.clone()))
    }

    fn eval_set(&mut self, object: ExprId, name: &Token, value: ExprId) -> Result<Value, RuntimeError> {
        let object = self.evaluate(object)?;
        let Value::Callable(Callable::Instance(instance)) = object else {
            return Err(RuntimeError::new("Only instances have fields.", name.clone()));
        };

        let value = self.evaluate(value)?;
        instance.borrow_mut().fields.insert(name.lexeme.to_string(), value.clone());
        Ok(value)
    }

    fn eval_super(&mut self, expr: ExprId, keyword: &Token, method: &Token) -> Result<Value, RuntimeError> {
        let distance = *self.locals.get(&expr).expect("resolver always assigns 'super' a depth");
        let superclass = self.environment.get_at(distance, "super");
        let Value::Callable(Callable::Class(superclass)) = superclass else {
            unreachable!("resolver only binds 'super' to a class value")
        };

        // `this` is always bound one frame closer than `super` (see resolver.rs).
        let instance = self.environment.get_at(distance - 1, "this");
        let Value::Callable(Callable::Instance(instance)) = instance else {
            unreachable!("resolver only binds 'this' to an instance value")
        };

        let Some(bound_method) = superclass.find_method(&method.lexeme) else {
            return Err(RuntimeError::new(format!("Undefined property '{}'.", method.lexeme), keyword.clone()));
        };

        Ok(Value::Callable(Callable::Function(bound_method.bind(instance))))
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Nil => Value::Nil,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Number(n) => Value::Number(*n),
        Literal::Str(s) => Value::Str(s.clone()),
    }
}

fn numeric(left: Value, right: Value, op_token: &Token, f: impl Fn(f64, f64) -> f64) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(f(a, b))),
        _ => Err(RuntimeError::new("Operands must be numbers.", op_token.clone())),
    }
}

fn compare(left: Value, right: Value, op_token: &Token, f: impl Fn(f64, f64) -> bool) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(f(a, b))),
        _ => Err(RuntimeError::new("Operands must be numbers.", op_token.clone())),
    }
}

fn seed_globals(globals: &Environment) {
    let clock = NativeFunction {
        name: "clock",
        arity: 0,
        func: Box::new(|_args| {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("system clock must be after the Unix epoch");
            Value::Number(now.as_secs_f64())
        }),
    };
    globals.define("clock", Value::Callable(Callable::Native(Rc::new(clock))));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::io::CollectStringPrint;
    use crate::parser::Parser;
    use crate::resolver;
    use crate::scanner::Scanner;

    fn run(source: &str) -> Result<String, String> {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new(source, &mut diagnostics).scan_tokens();
        let mut ast = Ast::new();
        let stmts = Parser::new(tokens, &mut ast, &mut diagnostics).parse();
        if diagnostics.had_error() {
            return Err("parse error".to_owned());
        }

        let mut locals = HashMap::new();
        resolver::resolve(&ast, &stmts, &mut locals, &mut diagnostics);
        if diagnostics.had_error() {
            return Err("resolve error".to_owned());
        }

        let mut print = CollectStringPrint::new();
        let mut interpreter = Interpreter::new(&ast, &locals, &mut print);
        interpreter.interpret(&stmts).map_err(|e| e.to_string())?;
        Ok(print.into_output())
    }

    #[test]
    fn arithmetic_and_string_concatenation() {
        assert_eq!(run(r#"print 1 + 2 * 3; print "a" + "b";"#).unwrap(), "7\nab\n");
    }

    #[test]
    fn adding_number_and_string_is_a_runtime_error() {
        assert!(run(r#"print 1 + "a";"#).is_err());
    }

    #[test]
    fn closures_capture_their_defining_environment() {
        let source = r#"
            fun makeCounter() {
                var i = 0;
                fun counter() {
                    i = i + 1;
                    return i;
                }
                return counter;
            }
            var counter = makeCounter();
            print counter();
            print counter();
        "#;
        assert_eq!(run(source).unwrap(), "1\n2\n");
    }

    #[test]
    fn closure_binds_to_shadowed_global_at_definition_time() {
        let source = r#"
            var a = "global";
            {
                fun showA() { print a; }
                showA();
                var a = "block";
                showA();
            }
        "#;
        assert_eq!(run(source).unwrap(), "global\nglobal\n");
    }

    #[test]
    fn inheritance_and_super_dispatch() {
        let source = r#"
            class Doughnut {
                cook() { print "Fry until golden brown."; }
            }
            class BostonCream < Doughnut {
                cook() {
                    super.cook();
                    print "Pipe full of custard and coat with chocolate.";
                }
            }
            BostonCream().cook();
        "#;
        assert_eq!(run(source).unwrap(), "Fry until golden brown.\nPipe full of custard and coat with chocolate.\n");
    }

    #[test]
    fn initializer_implicitly_returns_this_even_with_bare_return() {
        let source = r#"
            class Thing {
                init() {
                    this.value = 1;
                    return;
                }
            }
            var t = Thing();
            print t.value;
        "#;
        assert_eq!(run(source).unwrap(), "1\n");
    }

    #[test]
    fn top_level_return_is_a_static_error() {
        assert!(run("return 1;").is_err());
    }
}

//! End-to-end tests: whole programs run through the public `Lox` driver.

use lox::{CollectStringPrint, Diagnostics, Lox};

fn run(source: &str) -> (String, bool, bool) {
    let mut lox = Lox::new();
    let mut print = CollectStringPrint::new();
    let mut diagnostics = Diagnostics::new();
    lox.run(source, &mut print, &mut diagnostics);
    (print.into_output(), diagnostics.had_error(), diagnostics.had_runtime_error())
}

#[test]
fn fibonacci_via_recursion() {
    let source = r#"
        fun fib(n) {
            if (n < 2) return n;
            return fib(n - 2) + fib(n - 1);
        }
        for (var i = 0; i < 8; i = i + 1) {
            print fib(i);
        }
    "#;
    let (output, had_error, had_runtime_error) = run(source);
    assert!(!had_error && !had_runtime_error);
    assert_eq!(output, "0\n1\n1\n2\n3\n5\n8\n13\n");
}

#[test]
fn undefined_variable_is_a_runtime_error_not_a_parse_error() {
    let (_, had_error, had_runtime_error) = run("print nope;");
    assert!(!had_error);
    assert!(had_runtime_error);
}

#[test]
fn class_fields_and_methods() {
    let source = r#"
        class Counter {
            init() { this.count = 0; }
            increment() { this.count = this.count + 1; }
        }
        var c = Counter();
        c.increment();
        c.increment();
        print c.count;
    "#;
    let (output, had_error, had_runtime_error) = run(source);
    assert!(!had_error && !had_runtime_error);
    assert_eq!(output, "2\n");
}

#[test]
fn calling_a_non_callable_value_is_a_runtime_error() {
    let (_, had_error, had_runtime_error) = run(r#"var x = "hi"; x();"#);
    assert!(!had_error);
    assert!(had_runtime_error);
}

#[test]
fn calling_a_class_instance_is_a_runtime_error() {
    let source = r#"
        class Foo {}
        var foo = Foo();
        foo();
    "#;
    let (_, had_error, had_runtime_error) = run(source);
    assert!(!had_error);
    assert!(had_runtime_error);
}

#[test]
fn wrong_arity_is_a_runtime_error() {
    let source = r#"
        fun add(a, b) { return a + b; }
        add(1);
    "#;
    let (_, had_error, had_runtime_error) = run(source);
    assert!(!had_error);
    assert!(had_runtime_error);
}

#[test]
fn logical_operators_short_circuit_and_return_operand_value() {
    let source = r#"
        print nil or "default";
        print false and "unreached";
    "#;
    let (output, had_error, had_runtime_error) = run(source);
    assert!(!had_error && !had_runtime_error);
    assert_eq!(output, "default\nfalse\n");
}

#[test]
fn repl_style_session_shares_state_across_run_calls() {
    let mut lox = Lox::new();
    let mut print = CollectStringPrint::new();
    let mut diagnostics = Diagnostics::new();

    lox.run("var total = 0;", &mut print, &mut diagnostics);
    diagnostics.reset_error();
    lox.run("fun add(n) { total = total + n; }", &mut print, &mut diagnostics);
    diagnostics.reset_error();
    lox.run("add(4); add(5); print total;", &mut print, &mut diagnostics);

    assert!(!diagnostics.had_error() && !diagnostics.had_runtime_error());
    assert_eq!(print.into_output(), "9\n");
}

//! Functions, lambdas, closures and recursion

mod common;

use common::{run, runtime_error};
use pretty_assertions::assert_eq;
use toy::InterpreterError;

#[test]
fn test_function_call() {
    assert_eq!(run("def add(a, b) { return a + b; } print(add(2, 3));"), vec!["5"]);
}

#[test]
fn test_function_without_return_yields_null() {
    assert_eq!(run("def noop() { let x = 1; } print(noop());"), vec!["None"]);
    assert_eq!(run("def early() { return; } print(early());"), vec!["None"]);
}

#[test]
fn test_recursion() {
    let source = r#"
        def fib(n) {
            if (n < 2) {
                return n;
            }
            return fib(n - 1) + fib(n - 2);
        }
        print(fib(15));
    "#;
    assert_eq!(run(source), vec!["610"]);
}

#[test]
fn test_deep_recursion_below_the_limit() {
    let source = r#"
        def sum(n) {
            if (n == 0) {
                return 0;
            }
            return n + sum(n - 1);
        }
        print(sum(900));
    "#;
    assert_eq!(run(source), vec!["405450"]);
}

#[test]
fn test_unbounded_recursion_is_stopped() {
    let err = runtime_error("def forever(n) { return forever(n + 1); } forever(0);");
    assert_eq!(err.to_string(), "Maximum recursion depth exceeded (1000)");
}

#[test]
fn test_parameters_shadow_globals() {
    let output = run("let n = 1; def f(n) { return n * 2; } print(f(21), n);");
    assert_eq!(output, vec!["42 1"]);
}

#[test]
fn test_arity_mismatch() {
    let err = runtime_error("def f(a) { return a; } f(1, 2);");
    assert_eq!(err.to_string(), "'f' expects 1 argument(s) but got 2");
}

// =============================================================================
// LAMBDAS
// =============================================================================

#[test]
fn test_lambda_expression() {
    let output = run(r#"let greet = (name) -> "Hello, " + name; print(greet("Alice"));"#);
    assert_eq!(output, vec!["Hello, Alice"]);
}

#[test]
fn test_lambda_without_parameters() {
    assert_eq!(run("let answer = () -> 42; print(answer());"), vec!["42"]);
}

#[test]
fn test_lambda_arity() {
    let err = runtime_error("let add = (a, b) -> a + b; add(1);");
    assert!(matches!(err, InterpreterError::Arity { expected: 2, found: 1, .. }));
}

#[test]
fn test_higher_order_functions() {
    let output = run(r#"
        def apply_twice(f, x) {
            return f(f(x));
        }
        print(apply_twice((n) -> n * 3, 2));
    "#);
    assert_eq!(output, vec!["18"]);
}

#[test]
fn test_function_values_print_by_name() {
    assert_eq!(run("def f() { } print(f, () -> 1);"), vec!["<function f> <lambda>"]);
}

// =============================================================================
// CLOSURES
// =============================================================================

#[test]
fn test_closure_keeps_defining_scope_alive() {
    let output = run(r#"
        def make_adder(k) {
            return (x) -> x + k;
        }
        let add5 = make_adder(5);
        let add10 = make_adder(10);
        print(add5(1), add10(1));
    "#);
    assert_eq!(output, vec!["6 11"]);
}

#[test]
fn test_closure_shares_captured_variables() {
    let output = run(r#"
        def make_counter() {
            let count = 0;
            def next() {
                count = count + 1;
                return count;
            }
            return next;
        }
        let counter = make_counter();
        counter();
        counter();
        print(counter());
    "#);
    assert_eq!(output, vec!["3"]);
}

#[test]
fn test_calling_a_non_function() {
    let err = runtime_error("let n = 5; n();");
    assert_eq!(err.to_string(), "Value of type Int is not callable");
}

#[test]
fn test_local_functions_survive_frame_teardown_when_captured() {
    let output = run(r#"
        def make() {
            def square(x) {
                return x * x;
            }
            return (n) -> square(n) + 1;
        }
        let f = make();
        print(f(3));
    "#);
    assert_eq!(output, vec!["10"]);
}

#[test]
fn test_local_recursive_function_called_repeatedly() {
    let output = run(r#"
        def outer(start) {
            def count_down(n) {
                if (n == 0) {
                    return "done";
                }
                return count_down(n - 1);
            }
            return count_down(start);
        }
        let i = 0;
        while (i < 50) {
            outer(i);
            i = i + 1;
        }
        print(outer(3));
    "#);
    assert_eq!(output, vec!["done"]);
}

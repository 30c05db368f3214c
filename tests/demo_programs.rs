use memstep::interpreter::{Interpreter, SessionConfig};
use memstep::parser::Parser;
use std::fs;
use std::path::Path;

/// Parse and run a file under `demos/`, returning the finished session
fn run_demo(name: &str) -> Interpreter {
    let path = Path::new("demos").join(name);
    let source = fs::read_to_string(&path).expect("Failed to read demo file");

    let mut parser = Parser::new(&source).expect("Parser creation failed");
    let program = parser.parse_program().expect("Parsing failed");

    let config = SessionConfig {
        seed: Some(1),
        ..SessionConfig::default()
    };
    let mut interpreter = Interpreter::new(program, config).expect("Session creation failed");
    interpreter.run().expect("Execution failed");
    interpreter
}

fn output_of(name: &str) -> Vec<String> {
    run_demo(name).terminal().get_output()
}

#[test]
fn test_stack_variables_demo() {
    assert_eq!(output_of("stack_variables.rs"), vec!["a = 2, b = 4, c = 2"]);
}

#[test]
fn test_heap_box_demo() {
    assert_eq!(
        output_of("heap_box.rs"),
        vec!["*b = 42", "clone still holds 42"]
    );
}

#[test]
fn test_vec_growth_demo() {
    assert_eq!(output_of("vec_growth.rs"), vec!["[1, 2, 3, 4, 5] has len 5"]);
}

#[test]
fn test_references_demo() {
    assert_eq!(output_of("references.rs"), vec!["n = 6, *r = 6"]);
}

#[test]
fn test_fibonacci_demo() {
    assert_eq!(output_of("fibonacci.rs"), vec!["fib(6) = 8"]);
}

#[test]
fn test_shadowing_demo() {
    assert_eq!(output_of("shadowing.rs"), vec!["x = 10"]);
}

#[test]
fn test_double_free_demo_runs_to_completion() {
    let interpreter = run_demo("double_free.rs");
    assert!(interpreter.error().is_none());
    assert_eq!(
        interpreter.terminal().get_output(),
        vec!["p1 = null, p2 = null"]
    );
}

#[test]
fn test_memory_tampering_demo() {
    assert_eq!(output_of("memory_tampering.rs"), vec!["secret = 0"]);
}

#[test]
fn test_vec_by_value_or_reference_demo() {
    assert_eq!(
        output_of("vec_by_value_or_reference.rs"),
        vec!["sum = 12, len = 3"]
    );
}

// Integration tests for the stepping interpreter

use memstep::interpreter::errors::RuntimeError;
use memstep::interpreter::{Interpreter, SessionConfig};
use memstep::memory::{Cell, Value, HEAP_BOTTOM, STACK_LIMIT, STACK_TOP};
use memstep::parser::Parser;

fn session(source: &str) -> Interpreter {
    session_with(source, SessionConfig::default())
}

fn session_with(source: &str, config: SessionConfig) -> Interpreter {
    // Parse
    let mut parser = Parser::new(source).expect("Parser creation failed");
    let program = parser.parse_program().expect("Parsing failed");

    // Execute
    Interpreter::new(program, config).expect("Session creation failed")
}

fn value_at(interpreter: &Interpreter, addr: usize) -> Value {
    interpreter.memory().cells()[addr].value.clone()
}

fn value_of(interpreter: &Interpreter, name: &str) -> Value {
    let addr = interpreter
        .memory()
        .get_addr(name)
        .unwrap_or_else(|_| panic!("'{}' is not bound", name));
    value_at(interpreter, addr)
}

#[test]
fn test_stack_locals_then_return_clears_the_stack() {
    let source = r#"
        fn main() {
            let a = 1 + 1;
            let b = a * 2;
            return;
        }
    "#;

    let mut interpreter = session(source);

    interpreter.step_forward().expect("Step failed");
    assert_eq!(value_at(&interpreter, STACK_TOP), Value::Int(2));
    assert_eq!(interpreter.memory().cells()[STACK_TOP].label, "a");

    interpreter.step_forward().expect("Step failed");
    assert_eq!(value_at(&interpreter, STACK_TOP - 1), Value::Int(4));
    assert_eq!(interpreter.memory().cells()[STACK_TOP - 1].label, "b");

    interpreter.step_forward().expect("Step failed");
    assert!(interpreter.is_finished());
    assert!(interpreter.memory().frames().is_empty());
    assert_eq!(interpreter.memory().stack_pointer(), STACK_TOP + 1);
    assert!(interpreter.memory().cells().iter().all(Cell::is_blank));
}

#[test]
fn test_vec_push_reallocates_full_buffer() {
    let source = r#"
        fn main() {
            let mut v = vec![1, 2, 3];
            v.push(4);
        }
    "#;

    let mut interpreter = session(source);
    interpreter.run().expect("Execution failed");

    // Metadata sits at the top of main's frame as [cap, len, ptr]
    let base = interpreter.memory().get_addr("v.cap").expect("v.cap is not bound");
    assert_eq!(base, STACK_TOP - 2);
    assert_eq!(value_of(&interpreter, "v.cap"), Value::Int(6));
    assert_eq!(value_of(&interpreter, "v.len"), Value::Int(4));
    assert_eq!(value_of(&interpreter, "v.ptr"), Value::Int(4));
    assert!(interpreter.memory().cells()[base + 2].is_pointer);

    let cells = interpreter.memory().cells();
    for cell in &cells[HEAP_BOTTOM..HEAP_BOTTOM + 3] {
        assert!(cell.freed);
        assert_eq!(cell.value, Value::Freed);
    }
    let values: Vec<Value> = cells[4..8].iter().map(|c| c.value.clone()).collect();
    assert_eq!(
        values,
        vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]
    );
    assert_eq!(cells[4].label, "v[0]");
    assert!(!cells[8].value.is_initialized());
    assert!(!cells[9].value.is_initialized());
}

#[test]
fn test_double_free_is_not_guarded() {
    let source = r#"
        fn main() {
            let p1 = Box::new(42);
            let p2 = p1;
            drop(p2);
            drop(p1);
        }
    "#;

    let mut interpreter = session(source);

    interpreter.step_forward().expect("Step failed");
    let heap = &interpreter.memory().cells()[HEAP_BOTTOM];
    assert_eq!(heap.label, "*p1");
    assert_eq!(heap.value, Value::Int(42));
    assert_eq!(value_of(&interpreter, "p1"), Value::Int(HEAP_BOTTOM as i32));

    let result = interpreter.run();
    assert!(result.is_ok(), "Execution failed: {:?}", result);

    let heap = &interpreter.memory().cells()[HEAP_BOTTOM];
    assert!(heap.freed);
    assert_eq!(heap.value, Value::Freed);
    assert_eq!(value_of(&interpreter, "p1"), Value::Null);
    assert_eq!(value_of(&interpreter, "p2"), Value::Null);
}

#[test]
fn test_recursion_grows_and_unwinds_frames() {
    let source = r#"
        fn fib(n: i32) -> i32 {
            if n < 2 {
                return n;
            }
            return fib(n - 1) + fib(n - 2);
        }

        fn main() {
            let r = fib(4);
        }
    "#;

    let mut interpreter = session(source);
    let mut deepest = interpreter.memory().depth();
    while !interpreter.is_finished() {
        interpreter.step_forward().expect("Step failed");
        deepest = deepest.max(interpreter.memory().depth());
    }

    assert_eq!(deepest, 5);
    assert_eq!(interpreter.memory().depth(), 1);
    assert_eq!(value_of(&interpreter, "r"), Value::Int(3));

    // Every callee frame was blanked on the way out
    let cells = interpreter.memory().cells();
    assert!(cells[..STACK_TOP].iter().all(Cell::is_blank));
}

#[test]
fn test_floor_division() {
    let source = r#"
        fn main() {
            let a = -7 / 2;
            let b = 7 / -2;
            let c = 7 / 2;
        }
    "#;

    let mut interpreter = session(source);
    interpreter.run().expect("Execution failed");

    assert_eq!(value_of(&interpreter, "a"), Value::Int(-4));
    assert_eq!(value_of(&interpreter, "b"), Value::Int(-4));
    assert_eq!(value_of(&interpreter, "c"), Value::Int(3));
}

#[test]
fn test_division_by_zero_halts_the_session() {
    let source = r#"
        fn main() {
            let zero = 0;
            let x = 1 / zero;
        }
    "#;

    let mut interpreter = session(source);
    let result = interpreter.run();
    assert_eq!(result, Err(RuntimeError::DivisionByZero));

    // The error sticks
    assert_eq!(interpreter.step(), Err(RuntimeError::DivisionByZero));
    assert_eq!(interpreter.error(), Some(&RuntimeError::DivisionByZero));
}

#[test]
fn test_shadowing_takes_a_new_slot() {
    let source = r#"
        fn main() {
            let x = 5;
            let x = x + 1;
        }
    "#;

    let mut interpreter = session(source);
    interpreter.run().expect("Execution failed");

    assert_eq!(value_at(&interpreter, STACK_TOP), Value::Int(5));
    assert_eq!(value_at(&interpreter, STACK_TOP - 1), Value::Int(6));
    assert_eq!(interpreter.memory().get_addr("x").unwrap(), STACK_TOP - 1);
}

#[test]
fn test_heap_first_fit_reuses_dropped_cell() {
    let source = r#"
        fn main() {
            let a = Box::new(1);
            let b = Box::new(2);
            drop(a);
            let c = Box::new(3);
        }
    "#;

    let mut interpreter = session(source);
    interpreter.run().expect("Execution failed");

    assert_eq!(value_of(&interpreter, "b"), Value::Int(HEAP_BOTTOM as i32 + 1));
    assert_eq!(value_of(&interpreter, "c"), Value::Int(HEAP_BOTTOM as i32));

    let reused = &interpreter.memory().cells()[HEAP_BOTTOM];
    assert!(!reused.freed);
    assert_eq!(reused.label, "*c");
    assert_eq!(reused.value, Value::Int(3));
}

#[test]
fn test_first_push_into_empty_vec_allocates_four() {
    let source = r#"
        fn main() {
            let mut v = Vec::new();
            v.push(5);
        }
    "#;

    let mut interpreter = session(source);

    interpreter.step_forward().expect("Step failed");
    assert_eq!(value_of(&interpreter, "v.cap"), Value::Int(0));
    assert_eq!(value_of(&interpreter, "v.len"), Value::Int(0));

    interpreter.run().expect("Execution failed");
    assert_eq!(value_of(&interpreter, "v.cap"), Value::Int(4));
    assert_eq!(value_of(&interpreter, "v.len"), Value::Int(1));
    assert_eq!(value_of(&interpreter, "v.ptr"), Value::Int(HEAP_BOTTOM as i32));
    assert_eq!(value_at(&interpreter, HEAP_BOTTOM), Value::Int(5));
}

#[test]
fn test_vec_drop_frees_buffer_and_clears_metadata() {
    let source = r#"
        fn main() {
            let v = vec![7, 8];
            drop(v);
        }
    "#;

    let mut interpreter = session(source);
    interpreter.run().expect("Execution failed");

    let cells = interpreter.memory().cells();
    assert!(cells[HEAP_BOTTOM].freed && cells[HEAP_BOTTOM + 1].freed);
    assert!(cells[HEAP_BOTTOM].label.is_empty());
    assert_eq!(value_of(&interpreter, "v.ptr"), Value::Null);
    assert_eq!(value_of(&interpreter, "v.len"), Value::Int(0));
    assert_eq!(value_of(&interpreter, "v.cap"), Value::Int(0));
}

#[test]
fn test_single_element_vec_push_and_print() {
    let source = r#"
        fn main() {
            let mut v = vec![7];
            v.push(8);
            println!("{:?}", v);
        }
    "#;

    let mut interpreter = session(source);
    interpreter.run().expect("Execution failed");

    assert_eq!(interpreter.terminal().get_output(), vec!["[7, 8]"]);
    assert_eq!(value_of(&interpreter, "v.cap"), Value::Int(2));
    assert_eq!(value_of(&interpreter, "v.len"), Value::Int(2));
    assert_eq!(value_of(&interpreter, "v.ptr"), Value::Int(HEAP_BOTTOM as i32 + 1));

    let cells = interpreter.memory().cells();
    assert!(cells[HEAP_BOTTOM].freed);
    assert_eq!(cells[HEAP_BOTTOM + 1].label, "v[0]");
    assert_eq!(cells[HEAP_BOTTOM + 2].label, "v[1]");
}

#[test]
fn test_single_element_vec_buffer_is_indexed() {
    let source = r#"
        fn main() {
            let v = vec![7];
            let w = v;
            println!("{}", w.len());
        }
    "#;

    let mut interpreter = session(source);
    interpreter.run().expect("Execution failed");

    assert_eq!(interpreter.memory().cells()[HEAP_BOTTOM].label, "v[0]");
    assert_eq!(value_of(&interpreter, "w.ptr"), Value::Int(HEAP_BOTTOM as i32));
    assert_eq!(interpreter.terminal().get_output(), vec!["1"]);
}

#[test]
fn test_single_element_vec_drop() {
    let source = r#"
        fn main() {
            let v = vec![7];
            drop(v);
        }
    "#;

    let mut interpreter = session(source);
    interpreter.run().expect("Execution failed");

    assert!(interpreter.memory().cells()[HEAP_BOTTOM].freed);
    assert_eq!(value_of(&interpreter, "v.ptr"), Value::Null);
    assert_eq!(value_of(&interpreter, "v.cap"), Value::Int(0));
}

#[test]
fn test_single_element_array_is_copied_by_value() {
    let source = r#"
        fn main() {
            let a = [5];
            let b = a;
            println!("{:?} {}", b, b[0]);
        }
    "#;

    let mut interpreter = session(source);
    interpreter.run().expect("Execution failed");

    assert_eq!(value_at(&interpreter, STACK_TOP), Value::Int(5));
    assert_eq!(value_at(&interpreter, STACK_TOP - 1), Value::Int(5));
    assert_eq!(interpreter.memory().cells()[STACK_TOP - 1].label, "b[0]");
    assert_eq!(interpreter.terminal().get_output(), vec!["[5] 5"]);
}

#[test]
fn test_single_element_array_argument_is_passed_by_value() {
    let source = r#"
        fn first(x: [i32; 1]) -> i32 {
            return x[0];
        }

        fn main() {
            let a = [5];
            let r = first(a);
        }
    "#;

    let mut interpreter = session(source);
    interpreter.run().expect("Execution failed");

    assert_eq!(value_of(&interpreter, "r"), Value::Int(5));
}

#[test]
fn test_use_after_drop_is_an_invalid_pointer() {
    let source = r#"
        fn main() {
            let b = Box::new(5);
            drop(b);
            let x = *b;
        }
    "#;

    let mut interpreter = session(source);
    let result = interpreter.run();

    assert!(result.is_err(), "Expected use-after-free error");
    assert!(
        matches!(result, Err(RuntimeError::InvalidPointer { .. })),
        "Wrong error type: {:?}",
        result
    );
}

#[test]
fn test_unbounded_recursion_overflows_the_stack() {
    let source = r#"
        fn f(n: i32) -> i32 {
            return f(n + 1);
        }

        fn main() {
            let x = f(0);
        }
    "#;

    let mut interpreter = session(source);
    let result = interpreter.run();

    assert!(
        matches!(result, Err(RuntimeError::StackOverflow { .. })),
        "Expected stack overflow, got {:?}",
        result
    );
    // No frame ever crosses into the heap region
    assert!(interpreter.memory().stack_pointer() >= STACK_LIMIT);
}

#[test]
fn test_println_output() {
    let source = r#"
        fn main() {
            let x = 3;
            let v = vec![1, 2];
            println!("x = {}", x);
            print!("a");
            println!("b {:?}", v);
            println!(x);
        }
    "#;

    let mut interpreter = session(source);
    interpreter.run().expect("Execution failed");

    assert_eq!(
        interpreter.terminal().get_output(),
        vec!["x = 3", "ab [1, 2]", "3"]
    );
}

#[test]
fn test_while_loop() {
    let source = r#"
        fn main() {
            let mut i = 0;
            let mut sum = 0;
            while i < 4 {
                sum += i;
                i += 1;
            }
        }
    "#;

    let mut interpreter = session(source);
    interpreter.run().expect("Execution failed");

    assert_eq!(value_of(&interpreter, "i"), Value::Int(4));
    assert_eq!(value_of(&interpreter, "sum"), Value::Int(6));
}

#[test]
fn test_call_in_condition() {
    let source = r#"
        fn is_small(n: i32) -> bool {
            return n < 3;
        }

        fn main() {
            let mut c = 0;
            if is_small(1) {
                c = 1;
            } else {
                c = 2;
            }
        }
    "#;

    let mut interpreter = session(source);
    interpreter.run().expect("Execution failed");

    assert_eq!(value_of(&interpreter, "c"), Value::Int(1));
    assert_eq!(interpreter.memory().depth(), 1);
}

#[test]
fn test_vec_passed_by_reference_grows_in_place() {
    let source = r#"
        fn add(v: &mut Vec<i32>) {
            v.push(9);
        }

        fn main() {
            let mut v = vec![1];
            add(&mut v);
        }
    "#;

    let mut interpreter = session(source);
    interpreter.run().expect("Execution failed");

    assert_eq!(value_of(&interpreter, "v.len"), Value::Int(2));
    assert_eq!(value_of(&interpreter, "v.cap"), Value::Int(2));
    let Value::Int(ptr) = value_of(&interpreter, "v.ptr") else {
        panic!("v.ptr should hold an address");
    };
    let ptr = ptr as usize;
    assert_eq!(value_at(&interpreter, ptr), Value::Int(1));
    assert_eq!(value_at(&interpreter, ptr + 1), Value::Int(9));
    assert!(interpreter.memory().cells()[HEAP_BOTTOM].freed);
}

#[test]
fn test_rand_int_is_seeded_and_in_range() {
    let source = r#"
        fn main() {
            let r = rand_int(1, 6);
        }
    "#;
    let config = SessionConfig {
        seed: Some(7),
        ..SessionConfig::default()
    };

    let mut first = session_with(source, config.clone());
    first.run().expect("Execution failed");
    let mut second = session_with(source, config);
    second.run().expect("Execution failed");

    let Value::Int(r) = value_of(&first, "r") else {
        panic!("r should be an integer");
    };
    assert!((1..=6).contains(&r));
    assert_eq!(value_of(&second, "r"), Value::Int(r));
}

#[test]
fn test_step_backward_at_beginning() {
    let mut interpreter = session("fn main() { let a = 1; }");

    let result = interpreter.step_backward();
    assert!(
        matches!(result, Err(RuntimeError::HistoryOperationFailed { .. })),
        "Expected history error, got {:?}",
        result
    );
}

#[test]
fn test_step_backward_restores_state() {
    let source = r#"
        fn main() {
            let a = 1;
            let b = 2;
            println!("{}", a + b);
        }
    "#;

    let mut interpreter = session(source);
    interpreter.run().expect("Execution failed");
    assert_eq!(interpreter.total_snapshots(), 4);
    assert_eq!(interpreter.terminal().get_output(), vec!["3"]);

    interpreter.step_backward().expect("Step backward failed");
    assert!(interpreter.terminal().get_output().is_empty());
    assert_eq!(value_at(&interpreter, STACK_TOP - 1), Value::Int(2));

    interpreter.rewind_to_start().expect("Rewind failed");
    assert_eq!(interpreter.history_position(), 0);
    assert!(!value_at(&interpreter, STACK_TOP).is_initialized());

    // Forward replays recorded history instead of re-executing
    interpreter.step_forward().expect("Step forward failed");
    assert_eq!(interpreter.history_position(), 1);
    assert_eq!(value_at(&interpreter, STACK_TOP), Value::Int(1));
    assert_eq!(interpreter.total_snapshots(), 4);
}

#[test]
fn test_missing_main_is_rejected() {
    let program = Parser::new("fn helper() { }")
        .expect("Parser creation failed")
        .parse_program()
        .expect("Parsing failed");

    let result = Interpreter::new(program, SessionConfig::default());
    assert!(matches!(result, Err(RuntimeError::NoMainFunction)));
}

#[test]
fn test_parse_errors() {
    let broken = [
        "fn main() { let x = 1 }",
        "fn main() { let x = 1;",
        "fn main() { let x = @; }",
        "fn main() { println!(\"oops); }",
    ];

    for source in broken {
        let result = Parser::new(source).and_then(|mut parser| parser.parse_program());
        assert!(result.is_err(), "Expected parse error for {:?}", source);
    }
}

#[test]
fn test_snapshot_limit_arrests_infinite_loop() {
    let source = r#"
        fn main() {
            let mut i = 0;
            while true {
                i += 1;
            }
        }
    "#;
    let config = SessionConfig {
        snapshot_limit: 16 * 1024,
        ..SessionConfig::default()
    };

    let mut interpreter = session_with(source, config);
    let result = interpreter.run();

    assert!(
        matches!(result, Err(RuntimeError::SnapshotLimitExceeded { .. })),
        "Expected snapshot limit error, got {:?}",
        result
    );
    assert!(interpreter.total_snapshots() > 1);
}

//! Step-wise interpreter execution engine
//!
//! This module provides the core execution logic:
//! - [`engine`]: the stepping session with history ([`Interpreter`](engine::Interpreter))
//! - [`scheduler`]: program counter and control transfer between blocks and calls
//! - [`machine`]: mutable state that expressions and statements operate on
//! - [`context`]: per-node execution contexts stored in frames
//! - [`eval`]: evaluation results and the suspension protocol
//! - [`errors`]: Runtime error types
//!
//! # Execution Model
//!
//! Every expression and statement is a resumable computation. A step runs the
//! current instruction until it either completes or suspends (an array literal
//! between elements, a call between arguments or while its callee runs). A
//! suspended node keeps its progress in its execution context and continues
//! where it left off on the next step.
//!
//! # Built-in Functions
//!
//! `push`, `len`, `clone`, `rand_int` and `print!`/`println!` are implemented
//! directly in the machine rather than as user functions.

pub mod context;
pub mod engine;
pub mod errors;
pub mod eval;
pub mod machine;
pub mod scheduler;

mod builtins;
mod expressions;
mod lvalues;
mod memory_ops;
mod statements;

pub use engine::{Interpreter, SessionConfig};

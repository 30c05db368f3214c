//! # Introduction
//!
//! memstep parses a small Rust-like teaching language and executes it one
//! step at a time over a deliberately tiny flat memory, so every stack slot,
//! heap cell and dangling pointer stays visible. A snapshot is captured after
//! each visible step; the history is navigated forward and backward through a
//! terminal UI built with [ratatui](https://docs.rs/ratatui).
//!
//! ## Execution pipeline
//!
//! ```text
//! Source → Parser → AST → Interpreter → Snapshots → TUI
//! ```
//!
//! 1. [`parser`]: scans the source and builds an AST with unique node ids.
//! 2. [`interpreter`]: resumable evaluation of every node, a step scheduler
//!    for blocks and calls, and the stepping session with history.
//! 3. [`memory`]: 26 cells, stack growing down from the top, heap growing up
//!    from address 1, frames holding bindings and execution contexts.
//! 4. [`snapshot`]: memory-bounded history and a [`snapshot::MockTerminal`]
//!    that records `println!` output.
//! 5. [`ui`]: ratatui-based TUI; not part of the stable library API.
//!
//! ## Supported language
//!
//! Types: `i32`, `usize`, `bool`, references, raw pointers, fixed-size arrays,
//! `Vec<i32>` and `Box<i32>`.
//! Control flow: `if`/`else if`/`else`, `while`, `return`, recursion.
//! Built-ins: `vec![]`, `Box::new`, `push`, `len`, `clone`, `drop`,
//! `rand_int`, `print!`, `println!`.

pub mod interpreter;
pub mod memory;
pub mod parser;
pub mod snapshot;
pub mod ui;

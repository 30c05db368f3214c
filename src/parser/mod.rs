//! Teaching-language source parser
//!
//! This module transforms source text into an Abstract Syntax Tree (AST):
//! - [`parse`]: the [`Parser`] entry point, errors and the byte scanner
//! - `declarations`: top-level functions and signatures
//! - `statements`: blocks, control flow and assignment targets
//! - `expressions`: operators and primaries
//! - [`ast`]: AST node definitions
//!
//! # Supported Subset
//!
//! - Types: `i32`, `usize`, `bool`, `&T`, `*const T`, `[T; N]`, `Vec<T>`, `Box<T>`
//! - Statements: `let`, assignment, compound assignment, `if`/`else if`/`else`,
//!   `while`, `return`, `drop(name)`
//! - Expressions: arithmetic, comparison, logical, references, dereferences,
//!   `vec![..]`, `Box::new`, `push`/`len`/`clone`, `rand_int`, `print!`/`println!`
//! - No structs, traits, generics, closures, `for`, `loop` or `match`
//!
//! # Parser Implementation
//!
//! Hand-written scanner: text is cut at depth-0 delimiters instead of being
//! tokenized first. The first malformed construct fails the whole parse with
//! a [`ParseError`]. No external parser generator dependencies.

pub mod ast;
pub mod parse;

mod declarations;
mod expressions;
mod statements;

pub use parse::{ParseError, Parser};

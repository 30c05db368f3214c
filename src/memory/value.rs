//! Runtime value representation
//!
//! This module defines [`Value`], the scalar stored in one memory cell, and
//! [`Cell`], the cell itself with its display metadata.
//!
//! # Sentinels
//!
//! Besides plain scalars a cell can hold one of three markers:
//! - [`Value::Freed`]: the cell belonged to a heap run that was dropped
//! - [`Value::Null`]: a pointer slot whose pointee was dropped
//! - [`Value::Uninitialized`]: nothing has been written yet
//!
//! Arithmetic on any of them is a type error and dereferencing them is an
//! invalid-pointer error, which is how use-after-free bugs surface.

use super::constants::MEM_SIZE;
use crate::parser::ast::TypeTag;
use std::fmt;

/// Memory address (index into the cell array)
pub type Address = usize;

/// Scalar values held by a single cell
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    Int(i32),
    Bool(bool),
    Str(String),
    Unit,
    Null,
    Freed,
    #[default]
    Uninitialized,
}

impl Value {
    pub fn is_initialized(&self) -> bool {
        !matches!(self, Value::Uninitialized)
    }

    /// Integer view of the value; booleans coerce to `1`/`0`
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(i32::from(*b)),
            _ => None,
        }
    }

    /// Interpret the value as an in-range address
    pub fn as_address(&self) -> Option<Address> {
        match self {
            Value::Int(n) if *n >= 0 && (*n as usize) < MEM_SIZE => Some(*n as usize),
            _ => None,
        }
    }

    /// Truthiness used by `if`, `while`, `!`, `&&` and `||`
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(n) => Some(*n != 0),
            _ => None,
        }
    }

    /// Short name used in type errors
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Unit => "()",
            Value::Null => "null",
            Value::Freed => "FREED",
            Value::Uninitialized => "uninitialized",
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{}", s),
            Value::Unit => write!(f, "()"),
            Value::Null => write!(f, "null"),
            Value::Freed => write!(f, "FREED"),
            Value::Uninitialized => Ok(()),
        }
    }
}

/// One addressable unit of memory
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    pub value: Value,
    pub label: String,
    pub ty: Option<TypeTag>,
    pub freed: bool,
    pub is_pointer: bool,
    /// Index of the owning stack frame, `None` for heap or free space
    pub frame: Option<usize>,
}

impl Cell {
    /// A blank cell reserved by the given frame
    pub fn owned_by(frame: usize) -> Self {
        Cell {
            frame: Some(frame),
            ..Cell::default()
        }
    }

    /// True if the cell is in its default (never written) state
    pub fn is_blank(&self) -> bool {
        *self == Cell::default()
    }

    /// Whether a heap scan may hand this cell out
    pub fn is_free(&self) -> bool {
        if self.freed {
            return true;
        }
        self.frame.is_none() && self.ty.is_none() && !self.value.is_initialized()
    }

    /// Pointer target, if this cell holds a pointer to an in-range address
    pub fn points_to(&self) -> Option<Address> {
        if self.is_pointer {
            self.value.as_address()
        } else {
            None
        }
    }
}

//! Runtime error types for the interpreter
//!
//! This module defines [`RuntimeError`], which represents all errors that can occur
//! during program execution (as opposed to parse errors or system errors).
//!
//! All runtime errors are fatal. They halt the stepping session, which keeps
//! reporting the same error until it is rewound. Use-after-free and dangling
//! pointer bugs in the interpreted program surface as [`RuntimeError::InvalidPointer`].

use crate::memory::value::Address;
use std::fmt;

/// Runtime errors that can occur during execution
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// A frame push or stack binding would cross `STACK_LIMIT` or its frame's extent
    StackOverflow {
        requested: usize,
        stack_pointer: Address,
    },

    /// No run of free heap cells is large enough
    HeapOverflow { requested: usize },

    /// Name not bound in any live frame nor labeled on the heap
    VariableNotFound { name: String },

    /// Dereference of a sentinel, non-integer or out-of-range address
    InvalidPointer {
        message: String,
        address: Option<Address>,
    },

    /// Vec metadata words are not all integers
    CorruptedMetadata { message: String },

    /// Method name outside the supported set
    UnsupportedMethod { method: String },

    /// Operation the interpreter cannot perform on these operands
    UnsupportedOperation { message: String },

    /// Operand of the wrong kind
    TypeError { expected: String, got: String },

    /// Integer division by zero
    DivisionByZero,

    /// Integer overflow in arithmetic operation
    IntegerOverflow { operation: String },

    /// Undefined function call
    UndefinedFunction { name: String },

    /// Function argument count mismatch
    ArgumentCountMismatch {
        function: String,
        expected: usize,
        got: usize,
    },

    /// Argument does not fit the shape of its parameter
    ArgumentShapeMismatch {
        function: String,
        param: String,
        expected: usize,
        got: usize,
    },

    /// Main function not found
    NoMainFunction,

    /// No stack frame available
    NoStackFrame,

    /// Snapshot history limit exceeded
    SnapshotLimitExceeded { current: usize, limit: usize },

    /// History/snapshot operation failed
    HistoryOperationFailed { message: String },
}

impl RuntimeError {
    /// Shorthand for a type error on a value
    pub(crate) fn type_error(expected: &str, got: impl fmt::Display) -> Self {
        RuntimeError::TypeError {
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::StackOverflow {
                requested,
                stack_pointer,
            } => {
                write!(
                    f,
                    "Stack overflow: {} slot{} requested below 0x{:02X}",
                    requested,
                    if *requested == 1 { "" } else { "s" },
                    stack_pointer
                )
            }
            RuntimeError::HeapOverflow { requested } => {
                write!(f, "Heap overflow: no run of {} free cells", requested)
            }
            RuntimeError::VariableNotFound { name } => {
                write!(f, "Variable '{}' not found", name)
            }
            RuntimeError::InvalidPointer { message, address } => {
                if let Some(addr) = address {
                    write!(f, "Invalid pointer at 0x{:02X}: {}", addr, message)
                } else {
                    write!(f, "Invalid pointer: {}", message)
                }
            }
            RuntimeError::CorruptedMetadata { message } => {
                write!(f, "Corrupted Vec metadata: {}", message)
            }
            RuntimeError::UnsupportedMethod { method } => {
                write!(f, "Method '{}' is not implemented", method)
            }
            RuntimeError::UnsupportedOperation { message } => {
                write!(f, "Unsupported operation: {}", message)
            }
            RuntimeError::TypeError { expected, got } => {
                write!(f, "Type error: expected {}, got {}", expected, got)
            }
            RuntimeError::DivisionByZero => write!(f, "Division by zero"),
            RuntimeError::IntegerOverflow { operation } => {
                write!(f, "Integer overflow in operation: {}", operation)
            }
            RuntimeError::UndefinedFunction { name } => {
                write!(f, "Undefined function '{}'", name)
            }
            RuntimeError::ArgumentCountMismatch {
                function,
                expected,
                got,
            } => {
                write!(
                    f,
                    "Function '{}' expects {} argument{}, got {}",
                    function,
                    expected,
                    if *expected == 1 { "" } else { "s" },
                    got
                )
            }
            RuntimeError::ArgumentShapeMismatch {
                function,
                param,
                expected,
                got,
            } => {
                write!(
                    f,
                    "Parameter '{}' of '{}' takes {} value{}, got {}",
                    param,
                    function,
                    expected,
                    if *expected == 1 { "" } else { "s" },
                    got
                )
            }
            RuntimeError::NoMainFunction => write!(f, "No main() function found"),
            RuntimeError::NoStackFrame => write!(f, "No stack frame available"),
            RuntimeError::SnapshotLimitExceeded { current, limit } => {
                write!(
                    f,
                    "Snapshot memory limit exceeded: {} bytes used, limit is {}",
                    current, limit
                )
            }
            RuntimeError::HistoryOperationFailed { message } => {
                write!(f, "History operation failed: {}", message)
            }
        }
    }
}

impl std::error::Error for RuntimeError {}

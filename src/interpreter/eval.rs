//! Evaluation results and the suspension protocol
//!
//! Every expression evaluates to [`Eval`]: either a finished [`EvalResult`] or
//! [`Eval::Suspended`], meaning "call me again on a later step". Instructions
//! report [`ExecStatus`] in the same spirit.

use crate::interpreter::errors::RuntimeError;
use crate::memory::value::{Address, Value};
use crate::parser::ast::TypeTag;

/// Value produced by an expression
///
/// Aggregates (array elements, Vec metadata) are kept as an ordered list and
/// collapse to a scalar only where a consumer asks for one.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalResult {
    pub values: Vec<Value>,
    pub ty: TypeTag,
    pub is_pointer: bool,
    /// The single value is the address of an unread array or Vec, not its contents
    pub is_place: bool,
}

impl EvalResult {
    pub fn scalar(value: Value, ty: TypeTag) -> Self {
        EvalResult {
            values: vec![value],
            ty,
            is_pointer: false,
            is_place: false,
        }
    }

    pub fn int(n: i32) -> Self {
        Self::scalar(Value::Int(n), TypeTag::I32)
    }

    pub fn pointer(addr: Address, ty: TypeTag) -> Self {
        EvalResult {
            values: vec![Value::Int(addr as i32)],
            ty,
            is_pointer: true,
            is_place: false,
        }
    }

    /// Address-valued result that is not a pointer (array base, Vec metadata base)
    pub fn place(addr: Address, ty: TypeTag) -> Self {
        EvalResult {
            values: vec![Value::Int(addr as i32)],
            ty,
            is_pointer: false,
            is_place: true,
        }
    }

    pub fn unit() -> Self {
        Self::scalar(Value::Unit, TypeTag::Unit)
    }

    pub fn many(values: Vec<Value>, ty: TypeTag) -> Self {
        EvalResult {
            values,
            ty,
            is_pointer: false,
            is_place: false,
        }
    }

    /// The single value of a scalar result
    pub fn get_scalar(&self) -> Result<&Value, RuntimeError> {
        match self.values.as_slice() {
            [value] => Ok(value),
            values => Err(RuntimeError::type_error(
                "a single value",
                format!("{} values", values.len()),
            )),
        }
    }

    pub fn as_int(&self) -> Result<i32, RuntimeError> {
        let value = self.get_scalar()?;
        value
            .as_int()
            .ok_or_else(|| RuntimeError::type_error("integer", value.kind_name()))
    }

    pub fn as_bool(&self) -> Result<bool, RuntimeError> {
        let value = self.get_scalar()?;
        value
            .as_bool()
            .ok_or_else(|| RuntimeError::type_error("bool", value.kind_name()))
    }

    /// The scalar as an in-range address
    pub fn as_address(&self) -> Result<Address, RuntimeError> {
        let value = self.get_scalar()?;
        value.as_address().ok_or_else(|| RuntimeError::InvalidPointer {
            message: format!("'{}' is not a valid address", value),
            address: None,
        })
    }

    /// An unmaterialized array place: one address standing for all `N` cells
    pub fn is_array_place(&self) -> bool {
        self.is_place && self.ty.array_len().is_some()
    }

    /// An unmaterialized Vec place: the address of the metadata block
    pub fn is_vec_place(&self) -> bool {
        self.is_place && self.ty.is_vec()
    }
}

/// Outcome of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Eval {
    Done(EvalResult),
    Suspended,
}

/// Outcome of executing an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    Complete,
    Incomplete,
}

/// Unwrap a finished evaluation or propagate the suspension.
///
/// The optional second argument is what to return on suspension (defaults to
/// [`Eval::Suspended`]); instructions pass [`ExecStatus::Incomplete`].
macro_rules! ready {
    ($e:expr) => {
        match $e? {
            $crate::interpreter::eval::Eval::Done(result) => result,
            $crate::interpreter::eval::Eval::Suspended => {
                return Ok($crate::interpreter::eval::Eval::Suspended)
            }
        }
    };
    ($e:expr, $suspended:expr) => {
        match $e? {
            $crate::interpreter::eval::Eval::Done(result) => result,
            $crate::interpreter::eval::Eval::Suspended => return Ok($suspended),
        }
    };
}

pub(crate) use ready;

//! Error types for the Kronos VM crate.
//!
//! This module provides error handling for bytecode decoding, heap
//! operations and execution.

use thiserror::Error;

/// VM execution errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VmError {
    /// Bytecode decode error with context.
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Unknown opcode byte.
    #[error("Invalid opcode: {opcode:#04x}")]
    InvalidOpCode { opcode: u8 },

    /// Operand stack underflow.
    #[error("Stack underflow: attempted to access {requested} items, but only {available} available")]
    StackUnderflow { requested: usize, available: usize },

    /// Operand stack grew past the configured limit.
    #[error("Stack overflow: maximum stack size {max_size} exceeded")]
    StackOverflow { max_size: usize },

    /// A value had the wrong type for the operation.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Division by zero.
    #[error("Division by zero in operation: {operation}")]
    DivisionByZero { operation: String },

    /// Container index out of range.
    #[error("Index out of range: {index} (length {len})")]
    IndexOutOfRange { index: i64, len: usize },

    /// Map lookup for a key that is not present.
    #[error("Key not found in map")]
    KeyNotFound,

    /// Read of a variable that was never bound.
    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String },

    /// Call of a name that is neither a builtin nor a user function.
    #[error("Undefined function: {name}")]
    UndefinedFunction { name: String },

    /// Rebind of an immutable variable.
    #[error("Cannot reassign immutable variable: {name}")]
    ImmutableReassignment { name: String },

    /// Call with the wrong number of arguments.
    #[error("Function {name} expects {expected} arguments, got {actual}")]
    ArityMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Constant pool index out of range.
    #[error("Invalid constant index: {index}")]
    InvalidConstant { index: usize },

    /// A handle that does not refer to a live heap object.
    #[error("Dangling value handle: #{id}")]
    DanglingHandle { id: u64 },

    /// Call depth limit exceeded.
    #[error("Call depth limit exceeded: depth {depth}, limit {limit}")]
    CallDepthExceeded { depth: usize, limit: usize },

    /// Error raised by a Kronos `raise` statement.
    #[error("{message}")]
    Raised { message: String },

    /// A builtin function reported a failure.
    #[error("Builtin {name} failed: {message}")]
    Builtin { name: String, message: String },

    /// Invalid operation with context.
    #[error("Invalid operation: {operation}, reason: {reason}")]
    InvalidOperation { operation: String, reason: String },
}

impl VmError {
    /// Create a new parse error.
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a new invalid opcode error.
    pub fn invalid_opcode(opcode: u8) -> Self {
        Self::InvalidOpCode { opcode }
    }

    /// Create a new stack underflow error.
    pub fn stack_underflow(requested: usize, available: usize) -> Self {
        Self::StackUnderflow {
            requested,
            available,
        }
    }

    /// Create a new type mismatch error.
    pub fn type_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a new division by zero error.
    pub fn division_by_zero<S: Into<String>>(operation: S) -> Self {
        Self::DivisionByZero {
            operation: operation.into(),
        }
    }

    /// Create a new index out of range error.
    pub fn index_out_of_range(index: i64, len: usize) -> Self {
        Self::IndexOutOfRange { index, len }
    }

    /// Create a new undefined variable error.
    pub fn undefined_variable<S: Into<String>>(name: S) -> Self {
        Self::UndefinedVariable { name: name.into() }
    }

    /// Create a new undefined function error.
    pub fn undefined_function<S: Into<String>>(name: S) -> Self {
        Self::UndefinedFunction { name: name.into() }
    }

    /// Create a new invalid operation error.
    pub fn invalid_operation<S: Into<String>>(operation: S, reason: S) -> Self {
        Self::InvalidOperation {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a new builtin failure error.
    pub fn builtin<S: Into<String>>(name: S, message: S) -> Self {
        Self::Builtin {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns `true` when the error came from user-level `raise`.
    pub fn is_raised(&self) -> bool {
        matches!(self, VmError::Raised { .. })
    }

    /// Error category for logging and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            VmError::Parse { .. } | VmError::InvalidOpCode { .. } => "bytecode",
            VmError::StackUnderflow { .. } | VmError::StackOverflow { .. } => "stack",
            VmError::TypeMismatch { .. } => "type",
            VmError::DivisionByZero { .. } => "arithmetic",
            VmError::IndexOutOfRange { .. } | VmError::KeyNotFound => "container",
            VmError::UndefinedVariable { .. }
            | VmError::UndefinedFunction { .. }
            | VmError::ImmutableReassignment { .. } => "binding",
            VmError::ArityMismatch { .. } => "call",
            VmError::InvalidConstant { .. } | VmError::DanglingHandle { .. } => "heap",
            VmError::CallDepthExceeded { .. } => "resource",
            VmError::Raised { .. } => "raise",
            VmError::Builtin { .. } => "builtin",
            VmError::InvalidOperation { .. } => "operation",
        }
    }
}

/// Result type for VM operations.
pub type VmResult<T> = std::result::Result<T, VmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = VmError::type_mismatch("number", "string");
        assert_eq!(err.to_string(), "Type mismatch: expected number, got string");

        let err = VmError::stack_underflow(2, 0);
        assert_eq!(
            err.to_string(),
            "Stack underflow: attempted to access 2 items, but only 0 available"
        );

        let err = VmError::undefined_function("square");
        assert_eq!(err.to_string(), "Undefined function: square");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(VmError::parse("x").category(), "bytecode");
        assert_eq!(VmError::division_by_zero("DIV").category(), "arithmetic");
        assert_eq!(VmError::undefined_variable("x").category(), "binding");
        assert!(VmError::Raised {
            message: "boom".into()
        }
        .is_raised());
    }
}

//! Compile error types.

use thiserror::Error;

/// Errors reported by the bytecode compiler.
///
/// The compiler is sticky: the first error is kept, later emits become
/// no-ops, and the entry point reports the stored error after draining
/// the AST. No partial bytecode escapes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The constant pool would no longer be addressable by a `u16`.
    #[error("Too many constants (limit 65535)")]
    TooManyConstants,

    /// The code buffer exceeded its addressable size.
    #[error("Bytecode capacity overflow")]
    CapacityOverflow,

    /// A jump distance does not fit a signed 16-bit offset.
    #[error("Jump offset out of range: {distance}")]
    JumpOutOfRange { distance: i64 },

    /// A function body starts beyond the range a `u16` can address.
    #[error("Function body start exceeds addressable range")]
    FunctionBodyOutOfRange,

    /// A construct the bytecode compiler does not support.
    #[error("Unsupported construct: {construct}")]
    Unsupported { construct: String },

    /// A malformed AST node.
    #[error("Invalid AST: {reason}")]
    InvalidAst { reason: String },
}

impl CompileError {
    /// Create an unsupported-construct error.
    pub fn unsupported<S: Into<String>>(construct: S) -> Self {
        Self::Unsupported {
            construct: construct.into(),
        }
    }

    /// Create an invalid-AST error.
    pub fn invalid_ast<S: Into<String>>(reason: S) -> Self {
        Self::InvalidAst {
            reason: reason.into(),
        }
    }
}

/// Result type for compilation.
pub type CompileResult<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_messages() {
        assert_eq!(
            CompileError::TooManyConstants.to_string(),
            "Too many constants (limit 65535)"
        );
        assert_eq!(
            CompileError::CapacityOverflow.to_string(),
            "Bytecode capacity overflow"
        );
        assert_eq!(
            CompileError::unsupported("try/catch").to_string(),
            "Unsupported construct: try/catch"
        );
    }
}

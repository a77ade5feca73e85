//! # Kronos Compiler
//!
//! Translates the Kronos abstract syntax tree into the compact bytecode
//! executed by `kronos-vm`. The compiler is a single-pass syntax-directed
//! emitter: statements keep the operand stack balanced, expressions push
//! exactly one value, and forward jumps are back-patched as their targets
//! become known.
//!
//! ## Example
//!
//! ```
//! use kronos_compiler::ast::{Expr, Stmt};
//! use kronos_compiler::compile;
//! use kronos_vm::{Interpreter, Runtime};
//!
//! let runtime = Runtime::new();
//! let program = vec![
//!     Stmt::Assign {
//!         name: "x".into(),
//!         value: Expr::Number(21.0),
//!         is_mutable: true,
//!         type_name: None,
//!     },
//!     Stmt::Print(Expr::BinOp {
//!         op: kronos_compiler::ast::BinOpKind::Add,
//!         left: Box::new(Expr::Var("x".into())),
//!         right: Some(Box::new(Expr::Var("x".into()))),
//!     }),
//! ];
//!
//! let bytecode = compile(&runtime, &program).unwrap();
//! let mut interpreter = Interpreter::new(runtime);
//! interpreter.capture_output();
//! interpreter.run(&bytecode).unwrap();
//! assert_eq!(interpreter.take_output(), "42\n");
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

/// AST node definitions — the compiler's input contract.
pub mod ast;
/// The bytecode emitter.
pub mod codegen;
/// Compile error types.
pub mod error;

pub use codegen::{compile, Compiler};
pub use error::{CompileError, CompileResult};

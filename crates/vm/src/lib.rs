//! # Kronos Virtual Machine
//!
//! The execution core of the Kronos scripting language: a reference-counted
//! value system with an on-demand cycle collector, and a stack-based
//! virtual machine that executes the compact bytecode produced by
//! `kronos-compiler`.
//!
//! ## Architecture
//!
//! - **Runtime**: the shared heap. Every value is a tagged heap object
//!   addressed by a `Copy` handle; ownership is explicit through
//!   `retain`/`release`, and a mark & sweep pass reclaims reference cycles.
//! - **Bytecode**: a flat instruction stream plus a constant pool that owns
//!   one reference per constant. In-memory only; no stable on-disk format.
//! - **Interpreter**: a fetch-decode-execute loop dispatching through a
//!   256-entry jump table, with an operand stack, a scope stack, call
//!   frames and a builtin registry.
//!
//! ## Example
//!
//! ```
//! use kronos_vm::{Bytecode, Interpreter, OpCode, Runtime};
//!
//! let runtime = Runtime::new();
//! let mut bytecode = Bytecode::new(runtime.clone());
//!
//! // print 1 + 2
//! let one = bytecode.add_constant(runtime.new_number(1.0)).unwrap();
//! let two = bytecode.add_constant(runtime.new_number(2.0)).unwrap();
//! bytecode.emit_opcode(OpCode::LoadConst);
//! bytecode.emit_u16(one);
//! bytecode.emit_opcode(OpCode::LoadConst);
//! bytecode.emit_u16(two);
//! bytecode.emit_opcode(OpCode::Add);
//! bytecode.emit_opcode(OpCode::Print);
//! bytecode.emit_opcode(OpCode::Halt);
//!
//! let mut interpreter = Interpreter::new(runtime);
//! interpreter.capture_output();
//! interpreter.run(&bytecode).unwrap();
//! assert_eq!(interpreter.take_output(), "3\n");
//! ```
//!
//! ## Threading
//!
//! A [`Runtime`] handle is `Clone + Send + Sync`; the heap, intern table
//! and statistics sit behind one mutex, which also makes the per-value
//! reference counts effectively atomic. Each [`Interpreter`] is
//! single-threaded over one [`Bytecode`]; to run in parallel, give each
//! thread its own interpreter over a shared runtime.

#![warn(rustdoc::missing_crate_level_docs)]

/// Builtin function registry and the default pure builtins.
pub mod builtins;
/// The compiled bytecode artifact and its emission API.
pub mod bytecode;
/// VM error types and result handling.
pub mod error;
/// Instruction representation and decoding.
pub mod instruction;
/// The fetch-decode-execute engine.
pub mod interpreter;
/// OpCode dispatch table and per-category handlers.
pub mod jump_table;
/// Execution limits.
pub mod limits;
/// Opcode definitions.
pub mod op_code;
/// Heap, reference counting, interning and cycle collection.
pub mod runtime;
/// Variable scopes and call frames.
pub mod scope;
/// The operand stack.
pub mod stack;
/// Value handles and runtime types.
pub mod value;
/// VM state flags.
pub mod vm_state;

pub use builtins::{BuiltinFn, BuiltinRegistry};
pub use bytecode::{Bytecode, MAX_CONSTANTS};
pub use error::{VmError, VmResult};
pub use instruction::Instruction;
pub use interpreter::{FunctionDef, Interpreter};
pub use jump_table::{JumpTable, OpHandler};
pub use limits::InterpreterLimits;
pub use op_code::{OpCode, OperandLayout};
pub use runtime::Runtime;
pub use scope::{Binding, CallFrame, Scope};
pub use stack::OperandStack;
pub use value::{Value, ValueType};
pub use vm_state::VmState;

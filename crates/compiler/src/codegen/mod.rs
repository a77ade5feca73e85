//! The AST-to-bytecode compiler.
//!
//! A single-pass syntax-directed emitter. The first error sticks: later
//! emits become no-ops, the AST is still drained, and the entry point
//! returns the stored error — no partial bytecode escapes (dropping the
//! buffer releases its constants).

mod expr;
mod stmt;

use kronos_vm::{Bytecode, OpCode, Runtime, MAX_CONSTANTS};

use crate::ast::Stmt;
use crate::error::{CompileError, CompileResult};

/// Code addresses must stay below this for function bodies to remain
/// `u16`-addressable and jump math to stay well-defined.
const MAX_CODE_SIZE: usize = u32::MAX as usize;

/// Compiles a program into bytecode against the given runtime.
pub fn compile(runtime: &Runtime, program: &[Stmt]) -> CompileResult<Bytecode> {
    let mut compiler = Compiler::new(runtime.clone());
    for stmt in program {
        compiler.compile_stmt(stmt);
    }
    let statements = program.len();
    let bytecode = compiler.finish()?;
    log::debug!(
        "compiled {statements} statements into {} bytes, {} constants",
        bytecode.len(),
        bytecode.constants().len()
    );
    Ok(bytecode)
}

/// The bytecode compiler.
pub struct Compiler {
    runtime: Runtime,
    bytecode: Bytecode,
    error: Option<CompileError>,
    /// Pool index per interned name; names are deduplicated so the index
    /// is stable (the hidden-variable scheme depends on that).
    names: std::collections::HashMap<String, u16>,
    /// Distinguishes hidden variables introduced by map literals.
    hidden_counter: u32,
}

impl Compiler {
    /// Creates a compiler emitting into a fresh buffer.
    pub fn new(runtime: Runtime) -> Self {
        let bytecode = Bytecode::new(runtime.clone());
        Self {
            runtime,
            bytecode,
            error: None,
            names: std::collections::HashMap::new(),
            hidden_counter: 0,
        }
    }

    /// Terminates the program with `HALT` and returns the bytecode, or
    /// the first error recorded during compilation.
    pub fn finish(mut self) -> CompileResult<Bytecode> {
        self.emit_op(OpCode::Halt);
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(self.bytecode),
        }
    }

    /// The runtime constants are allocated in.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    // ---- Sticky error machinery -----------------------------------------

    pub(crate) fn fail(&mut self, err: CompileError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    pub(crate) fn failed(&self) -> bool {
        self.error.is_some()
    }

    /// Current emit position.
    pub(crate) fn pc(&self) -> usize {
        self.bytecode.len()
    }

    pub(crate) fn emit_op(&mut self, op: OpCode) {
        if self.failed() {
            return;
        }
        if self.bytecode.len() >= MAX_CODE_SIZE {
            self.fail(CompileError::CapacityOverflow);
            return;
        }
        self.bytecode.emit_opcode(op);
    }

    pub(crate) fn emit_u8(&mut self, byte: u8) {
        if !self.failed() {
            self.bytecode.emit(byte);
        }
    }

    pub(crate) fn emit_u16(&mut self, value: u16) {
        if !self.failed() {
            self.bytecode.emit_u16(value);
        }
    }

    pub(crate) fn emit_i16(&mut self, value: i16) {
        if !self.failed() {
            self.bytecode.emit_i16(value);
        }
    }

    // ---- Constants -------------------------------------------------------

    /// Adds a number constant.
    pub(crate) fn number_constant(&mut self, n: f64) -> u16 {
        if self.failed() {
            return 0;
        }
        let value = self.runtime.new_number(n);
        self.add_constant(value)
    }

    /// Adds a string constant (literal text, not interned).
    pub(crate) fn string_constant(&mut self, text: &str) -> u16 {
        if self.failed() {
            return 0;
        }
        let value = self.runtime.new_string(text.as_bytes());
        self.add_constant(value)
    }

    /// Adds an interned name constant (variable, parameter and function
    /// names). Repeated names reuse their pool slot.
    pub(crate) fn name_constant(&mut self, name: &str) -> u16 {
        if self.failed() {
            return 0;
        }
        if let Some(idx) = self.names.get(name) {
            return *idx;
        }
        let value = self.runtime.intern_str(name);
        let idx = self.add_constant(value);
        if !self.failed() {
            self.names.insert(name.to_string(), idx);
        }
        idx
    }

    /// Adds a bool constant.
    pub(crate) fn bool_constant(&mut self, b: bool) -> u16 {
        if self.failed() {
            return 0;
        }
        let value = self.runtime.new_bool(b);
        self.add_constant(value)
    }

    /// Adds a nil constant.
    pub(crate) fn nil_constant(&mut self) -> u16 {
        if self.failed() {
            return 0;
        }
        let value = self.runtime.new_nil();
        self.add_constant(value)
    }

    fn add_constant(&mut self, value: kronos_vm::Value) -> u16 {
        if self.bytecode.constants().len() >= MAX_CONSTANTS {
            self.runtime.release(value);
            self.fail(CompileError::TooManyConstants);
            return 0;
        }
        match self.bytecode.add_constant(value) {
            Ok(idx) => idx,
            Err(_) => {
                self.fail(CompileError::TooManyConstants);
                0
            }
        }
    }

    // ---- Jump emission and patching -------------------------------------

    /// Emits a jump-family opcode with a placeholder offset; returns the
    /// offset field position for later patching.
    pub(crate) fn emit_jump_placeholder(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        let at = self.pc();
        self.emit_i16(0);
        at
    }

    /// Back-patches a forward jump so it lands at the current position.
    pub(crate) fn patch_jump_to_here(&mut self, offset_at: usize) {
        if self.failed() {
            return;
        }
        let distance = self.pc() as i64 - (offset_at as i64 + 2);
        if distance > i64::from(i16::MAX) || distance < i64::from(i16::MIN) {
            self.fail(CompileError::JumpOutOfRange { distance });
            return;
        }
        if self.bytecode.patch_i16(offset_at, distance as i16).is_err() {
            self.fail(CompileError::CapacityOverflow);
        }
    }

    /// Emits a backwards jump to `target`.
    pub(crate) fn emit_jump_back(&mut self, target: usize) {
        if self.failed() {
            return;
        }
        self.emit_op(OpCode::Jump);
        let offset_at = self.pc();
        let distance = target as i64 - (offset_at as i64 + 2);
        if distance > i64::from(i16::MAX) || distance < i64::from(i16::MIN) {
            self.fail(CompileError::JumpOutOfRange { distance });
            return;
        }
        self.emit_i16(distance as i16);
    }

    /// Patches a `u16` field (function body starts).
    pub(crate) fn patch_u16(&mut self, at: usize, value: u16) {
        if self.failed() {
            return;
        }
        if self.bytecode.patch_i16(at, value as i16).is_err() {
            self.fail(CompileError::CapacityOverflow);
        }
    }

    /// A fresh id for compiler-introduced hidden variables that are not
    /// keyed by a loop variable.
    pub(crate) fn next_hidden_id(&mut self) -> u32 {
        let id = self.hidden_counter;
        self.hidden_counter += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinOpKind, Expr};

    fn ops_of(bytecode: &Bytecode) -> Vec<OpCode> {
        let mut out = Vec::new();
        let mut pos = 0;
        while pos < bytecode.code().len() {
            let instr = kronos_vm::Instruction::parse(bytecode.code(), pos).unwrap();
            out.push(instr.opcode());
            pos += instr.size();
        }
        out
    }

    #[test]
    fn test_assign_emits_store() {
        let rt = Runtime::new();
        let program = vec![Stmt::Assign {
            name: "x".into(),
            value: Expr::Number(1.0),
            is_mutable: true,
            type_name: None,
        }];
        let bc = compile(&rt, &program).unwrap();
        assert_eq!(
            ops_of(&bc),
            vec![OpCode::LoadConst, OpCode::StoreVar, OpCode::Halt]
        );
    }

    #[test]
    fn test_binop_is_postorder() {
        let rt = Runtime::new();
        let program = vec![Stmt::Print(Expr::BinOp {
            op: BinOpKind::Add,
            left: Box::new(Expr::Number(1.0)),
            right: Some(Box::new(Expr::Number(2.0))),
        })];
        let bc = compile(&rt, &program).unwrap();
        assert_eq!(
            ops_of(&bc),
            vec![
                OpCode::LoadConst,
                OpCode::LoadConst,
                OpCode::Add,
                OpCode::Print,
                OpCode::Halt
            ]
        );
    }

    #[test]
    fn test_sticky_error_drains_ast() {
        let rt = Runtime::new();
        // A try statement is unsupported; the statements after it must
        // still be drained without panicking, and the error must win.
        let program = vec![
            Stmt::Try {
                try_block: vec![],
                catch_blocks: vec![],
                finally_block: None,
            },
            Stmt::Print(Expr::Number(1.0)),
        ];
        let err = compile(&rt, &program).unwrap_err();
        assert!(matches!(err, CompileError::Unsupported { .. }));
        // The partial bytecode was dropped; its constants were released.
        assert_eq!(rt.object_count(), 0);
    }

    #[test]
    fn test_constant_pool_overflow_reports_documented_error() {
        let rt = Runtime::new();
        let mut compiler = Compiler::new(rt.clone());
        for i in 0..=MAX_CONSTANTS {
            compiler.number_constant(i as f64);
        }
        let err = compiler.finish().unwrap_err();
        assert_eq!(err, CompileError::TooManyConstants);
        assert_eq!(err.to_string(), "Too many constants (limit 65535)");
        assert_eq!(rt.object_count(), 0);
    }
}

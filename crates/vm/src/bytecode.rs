//! The compiled bytecode artifact: a flat code buffer plus its constant
//! pool.
//!
//! The format is in-memory only; there is no stable on-disk encoding.
//! Multi-byte fields are big-endian. The constant pool owns one reference
//! to each constant and releases them all when the bytecode is dropped.

use crate::error::{VmError, VmResult};
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::runtime::Runtime;
use crate::value::Value;

/// Maximum number of entries in the constant pool; operand indices are
/// `u16`.
pub const MAX_CONSTANTS: usize = u16::MAX as usize;

/// A compiled program: instruction stream plus constant pool.
pub struct Bytecode {
    /// The instruction stream.
    code: Vec<u8>,

    /// The constant pool; one owned reference per entry.
    constants: Vec<Value>,

    /// Runtime owning the constants.
    runtime: Runtime,
}

impl Bytecode {
    /// Creates an empty bytecode buffer against a runtime.
    pub fn new(runtime: Runtime) -> Self {
        Self {
            code: Vec::with_capacity(256),
            constants: Vec::with_capacity(32),
            runtime,
        }
    }

    /// The raw instruction stream.
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Current length of the instruction stream — the next emit position.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Whether any code has been emitted.
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// The constant pool.
    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    /// The runtime this bytecode's constants live in.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Looks up a constant by operand index.
    pub fn constant(&self, index: usize) -> VmResult<Value> {
        self.constants
            .get(index)
            .copied()
            .ok_or(VmError::InvalidConstant { index })
    }

    /// Adds a constant, taking ownership of the caller's reference.
    ///
    /// Fails once the pool would no longer be addressable by a `u16`
    /// operand; the value is released in that case so no reference leaks.
    pub fn add_constant(&mut self, value: Value) -> VmResult<u16> {
        if self.constants.len() >= MAX_CONSTANTS {
            self.runtime.release(value);
            return Err(VmError::invalid_operation(
                "add_constant",
                "Too many constants (limit 65535)",
            ));
        }
        self.constants.push(value);
        Ok((self.constants.len() - 1) as u16)
    }

    /// Emits a single raw byte.
    pub fn emit(&mut self, byte: u8) {
        self.code.push(byte);
    }

    /// Emits an opcode byte.
    pub fn emit_opcode(&mut self, op: OpCode) {
        self.code.push(op as u8);
    }

    /// Emits a big-endian `u16`.
    pub fn emit_u16(&mut self, value: u16) {
        self.code.extend_from_slice(&value.to_be_bytes());
    }

    /// Emits a big-endian `i16` (jump offsets).
    pub fn emit_i16(&mut self, value: i16) {
        self.code.extend_from_slice(&value.to_be_bytes());
    }

    /// Overwrites a previously emitted big-endian `i16` at `position`.
    /// Used to back-patch forward jumps.
    pub fn patch_i16(&mut self, position: usize, value: i16) -> VmResult<()> {
        let bytes = value.to_be_bytes();
        match self.code.get_mut(position..position + 2) {
            Some(slot) => {
                slot.copy_from_slice(&bytes);
                Ok(())
            }
            None => Err(VmError::invalid_operation(
                "patch_i16",
                "patch position out of bounds",
            )),
        }
    }

    /// Renders a human-readable listing of the instruction stream.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        let mut pos = 0;
        while pos < self.code.len() {
            match Instruction::parse(&self.code, pos) {
                Ok(instr) => {
                    out.push_str(&format!("{:04} {}", pos, instr.opcode().mnemonic()));
                    for byte in &instr.operand {
                        out.push_str(&format!(" {byte:02x}"));
                    }
                    if instr.opcode() == OpCode::LoadConst {
                        if let Ok(idx) = instr.operand_u16(0) {
                            if let Ok(value) = self.constant(idx as usize) {
                                if let Ok(text) = self.runtime.display(value) {
                                    out.push_str(&format!("  ; {text}"));
                                }
                            }
                        }
                    }
                    out.push('\n');
                    pos += instr.size();
                }
                Err(_) => {
                    out.push_str(&format!("{:04} ?? {:02x}\n", pos, self.code[pos]));
                    pos += 1;
                }
            }
        }
        out
    }
}

impl Drop for Bytecode {
    fn drop(&mut self) {
        for value in self.constants.drain(..) {
            self.runtime.release(value);
        }
    }
}

impl std::fmt::Debug for Bytecode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bytecode")
            .field("code_len", &self.code.len())
            .field("constants", &self.constants.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_and_patch() {
        let rt = Runtime::new();
        let mut bc = Bytecode::new(rt);
        bc.emit_opcode(OpCode::Jump);
        let patch_pos = bc.len();
        bc.emit_i16(0);
        bc.emit_opcode(OpCode::Halt);
        bc.patch_i16(patch_pos, 1).unwrap();

        assert_eq!(bc.code(), &[OpCode::Jump as u8, 0x00, 0x01, 0xFF]);
        assert!(bc.patch_i16(100, 1).is_err());
    }

    #[test]
    fn test_constant_pool_ownership() {
        let rt = Runtime::new();
        let v = rt.new_number(1.5);
        {
            let mut bc = Bytecode::new(rt.clone());
            let idx = bc.add_constant(v).unwrap();
            assert_eq!(idx, 0);
            assert_eq!(bc.constant(0).unwrap(), v);
            assert!(bc.constant(1).is_err());
            assert!(rt.is_live(v));
        }
        // Dropping the bytecode releases the pool's reference.
        assert!(!rt.is_live(v));
    }

    #[test]
    fn test_disassemble() {
        let rt = Runtime::new();
        let mut bc = Bytecode::new(rt.clone());
        let c = rt.new_number(42.0);
        let idx = bc.add_constant(c).unwrap();
        bc.emit_opcode(OpCode::LoadConst);
        bc.emit_u16(idx);
        bc.emit_opcode(OpCode::Print);
        bc.emit_opcode(OpCode::Halt);

        let listing = bc.disassemble();
        assert!(listing.contains("LOAD_CONST"));
        assert!(listing.contains("; 42"));
        assert!(listing.contains("PRINT"));
        assert!(listing.contains("HALT"));
    }
}

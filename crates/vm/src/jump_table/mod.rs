//! Instruction dispatch for the Kronos VM.
//!
//! A 256-entry table of handler function pointers, one slot per opcode
//! byte. Handlers are registered by category module; the default table is
//! built once and copied into each interpreter.

pub mod arithmetic;
pub mod control;
pub mod functions;
pub mod lists;
pub mod logic;
pub mod vars;

use once_cell::sync::Lazy;

use crate::bytecode::Bytecode;
use crate::error::{VmError, VmResult};
use crate::instruction::Instruction;
use crate::interpreter::Interpreter;
use crate::op_code::OpCode;

/// A handler for one VM instruction.
pub type OpHandler = fn(&mut Interpreter, &Bytecode, &Instruction) -> VmResult<()>;

/// The default jump table, built once.
static DEFAULT: Lazy<JumpTable> = Lazy::new(JumpTable::new);

/// Opcode-indexed dispatch table.
#[derive(Clone, Copy)]
pub struct JumpTable {
    handlers: [Option<OpHandler>; 256],
}

impl JumpTable {
    /// Creates a table with every default handler registered.
    pub fn new() -> Self {
        let mut table = Self {
            handlers: [None; 256],
        };
        vars::register_handlers(&mut table);
        arithmetic::register_handlers(&mut table);
        logic::register_handlers(&mut table);
        control::register_handlers(&mut table);
        functions::register_handlers(&mut table);
        lists::register_handlers(&mut table);
        table
    }

    /// Returns a copy of the shared default table.
    pub fn shared() -> Self {
        *DEFAULT
    }

    /// Registers a handler for an opcode, replacing any previous one.
    pub fn register(&mut self, opcode: OpCode, handler: OpHandler) {
        self.handlers[opcode as usize] = Some(handler);
    }

    /// Gets the handler for an opcode.
    pub fn get(&self, opcode: OpCode) -> Option<OpHandler> {
        self.handlers[opcode as usize]
    }

    /// Dispatches one instruction.
    pub fn execute(
        &self,
        interpreter: &mut Interpreter,
        bytecode: &Bytecode,
        instruction: &Instruction,
    ) -> VmResult<()> {
        match self.get(instruction.opcode()) {
            Some(handler) => handler(interpreter, bytecode, instruction),
            None => Err(VmError::invalid_opcode(instruction.opcode() as u8)),
        }
    }
}

impl Default for JumpTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_opcode_has_a_handler() {
        let table = JumpTable::new();
        let all = [
            OpCode::LoadConst,
            OpCode::LoadVar,
            OpCode::StoreVar,
            OpCode::Print,
            OpCode::Pop,
            OpCode::Add,
            OpCode::Sub,
            OpCode::Mul,
            OpCode::Div,
            OpCode::Eq,
            OpCode::Neq,
            OpCode::Gt,
            OpCode::Lt,
            OpCode::Gte,
            OpCode::Lte,
            OpCode::And,
            OpCode::Or,
            OpCode::Not,
            OpCode::Jump,
            OpCode::JumpIfFalse,
            OpCode::DefineFunc,
            OpCode::CallFunc,
            OpCode::ReturnVal,
            OpCode::ListNew,
            OpCode::ListAppend,
            OpCode::ListGet,
            OpCode::ListSet,
            OpCode::ListLen,
            OpCode::ListSlice,
            OpCode::ListIter,
            OpCode::ListNext,
            OpCode::Halt,
        ];
        for op in all {
            assert!(table.get(op).is_some(), "no handler for {op:?}");
        }
    }

    #[test]
    fn test_custom_handler_registration() {
        fn nop(
            _interpreter: &mut Interpreter,
            _bytecode: &Bytecode,
            _instruction: &Instruction,
        ) -> VmResult<()> {
            Ok(())
        }

        let mut table = JumpTable::new();
        table.register(OpCode::Halt, nop);
        assert_eq!(table.get(OpCode::Halt).unwrap() as usize, nop as usize);
    }
}

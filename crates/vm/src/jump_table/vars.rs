//! Constant and variable operations for the Kronos VM.

use crate::bytecode::Bytecode;
use crate::error::VmResult;
use crate::instruction::Instruction;
use crate::interpreter::Interpreter;
use crate::jump_table::JumpTable;
use crate::op_code::OpCode;

/// Registers the constant and variable handlers.
pub fn register_handlers(table: &mut JumpTable) {
    table.register(OpCode::LoadConst, load_const);
    table.register(OpCode::LoadVar, load_var);
    table.register(OpCode::StoreVar, store_var);
}

/// Implements the LOAD_CONST operation: push pool\[idx\], retained.
fn load_const(
    interpreter: &mut Interpreter,
    bytecode: &Bytecode,
    instruction: &Instruction,
) -> VmResult<()> {
    let index = instruction.operand_u16(0)?;
    let value = bytecode.constant(index as usize)?;
    interpreter.runtime().retain(value);
    interpreter.push(value)
}

/// Implements the LOAD_VAR operation: look the name up from the innermost
/// scope outwards; reading an unbound name is fatal.
fn load_var(
    interpreter: &mut Interpreter,
    bytecode: &Bytecode,
    instruction: &Instruction,
) -> VmResult<()> {
    let name_idx = instruction.operand_u16(0)?;
    let name = interpreter.constant_string(bytecode, name_idx)?;
    let value = interpreter.lookup_var(&name)?;
    interpreter.runtime().retain(value);
    interpreter.push(value)
}

/// Implements the STORE_VAR operation: bind in the innermost scope.
///
/// The operand carries the mutability flag and an optional type
/// annotation; rebinding an immutable name or violating a recorded
/// annotation is fatal.
fn store_var(
    interpreter: &mut Interpreter,
    bytecode: &Bytecode,
    instruction: &Instruction,
) -> VmResult<()> {
    let name_idx = instruction.operand_u16(0)?;
    let mutable = instruction.operand_u8(2)? != 0;
    let has_type = instruction.operand_u8(3)? != 0;
    let type_name = if has_type {
        let type_idx = instruction.operand_u16(4)?;
        Some(interpreter.constant_string(bytecode, type_idx)?)
    } else {
        None
    };

    let name = interpreter.constant_string(bytecode, name_idx)?;
    let value = interpreter.pop()?;
    interpreter.bind_var(&name, value, mutable, type_name)
}

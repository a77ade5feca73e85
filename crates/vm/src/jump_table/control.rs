//! Flow control, printing and stack housekeeping for the Kronos VM.

use crate::bytecode::Bytecode;
use crate::error::VmResult;
use crate::instruction::Instruction;
use crate::interpreter::Interpreter;
use crate::jump_table::JumpTable;
use crate::op_code::OpCode;

/// Registers the flow control handlers.
pub fn register_handlers(table: &mut JumpTable) {
    table.register(OpCode::Jump, jump);
    table.register(OpCode::JumpIfFalse, jump_if_false);
    table.register(OpCode::Print, print);
    table.register(OpCode::Pop, pop);
    table.register(OpCode::Halt, halt);
}

/// Implements the JUMP operation. The offset is relative to the byte
/// after the offset field.
fn jump(
    interpreter: &mut Interpreter,
    bytecode: &Bytecode,
    instruction: &Instruction,
) -> VmResult<()> {
    let offset = instruction.operand_i16(0)?;
    interpreter.jump_relative(bytecode, instruction, offset)
}

/// Implements the JUMP_IF_FALSE operation: pops the condition and jumps
/// when it is not truthy.
fn jump_if_false(
    interpreter: &mut Interpreter,
    bytecode: &Bytecode,
    instruction: &Instruction,
) -> VmResult<()> {
    let offset = instruction.operand_i16(0)?;
    let condition = interpreter.pop()?;
    let truthy = interpreter.runtime().is_truthy(condition);
    interpreter.release(condition);
    if !truthy? {
        interpreter.jump_relative(bytecode, instruction, offset)?;
    }
    Ok(())
}

/// Implements the PRINT operation.
fn print(
    interpreter: &mut Interpreter,
    _bytecode: &Bytecode,
    _instruction: &Instruction,
) -> VmResult<()> {
    let value = interpreter.pop()?;
    let text = interpreter.runtime().display(value);
    interpreter.release(value);
    interpreter.write_line(&text?)
}

/// Implements the POP operation.
fn pop(
    interpreter: &mut Interpreter,
    _bytecode: &Bytecode,
    _instruction: &Instruction,
) -> VmResult<()> {
    let value = interpreter.pop()?;
    interpreter.release(value);
    Ok(())
}

/// Implements the HALT operation.
fn halt(
    interpreter: &mut Interpreter,
    _bytecode: &Bytecode,
    _instruction: &Instruction,
) -> VmResult<()> {
    interpreter.halt();
    Ok(())
}

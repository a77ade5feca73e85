//! Comparison and logical operations for the Kronos VM.

use crate::bytecode::Bytecode;
use crate::error::VmResult;
use crate::instruction::Instruction;
use crate::interpreter::Interpreter;
use crate::jump_table::JumpTable;
use crate::op_code::OpCode;

/// Registers the comparison and logical operation handlers.
pub fn register_handlers(table: &mut JumpTable) {
    table.register(OpCode::Eq, eq);
    table.register(OpCode::Neq, neq);
    table.register(OpCode::Gt, gt);
    table.register(OpCode::Lt, lt);
    table.register(OpCode::Gte, gte);
    table.register(OpCode::Lte, lte);
    table.register(OpCode::And, and);
    table.register(OpCode::Or, or);
    table.register(OpCode::Not, not);
}

/// Implements the EQ operation (structural equality).
fn eq(interpreter: &mut Interpreter, _bytecode: &Bytecode, _instruction: &Instruction) -> VmResult<()> {
    let b = interpreter.pop()?;
    let a = interpreter.pop()?;
    let result = interpreter.runtime().values_equal(a, b);
    interpreter.release(a);
    interpreter.release(b);
    let equal = result?;
    let out = interpreter.runtime().new_bool(equal);
    interpreter.push(out)
}

/// Implements the NEQ operation.
fn neq(interpreter: &mut Interpreter, _bytecode: &Bytecode, _instruction: &Instruction) -> VmResult<()> {
    let b = interpreter.pop()?;
    let a = interpreter.pop()?;
    let result = interpreter.runtime().values_equal(a, b);
    interpreter.release(a);
    interpreter.release(b);
    let equal = result?;
    let out = interpreter.runtime().new_bool(!equal);
    interpreter.push(out)
}

/// Implements the GT operation (numeric ordering).
fn gt(interpreter: &mut Interpreter, _bytecode: &Bytecode, _instruction: &Instruction) -> VmResult<()> {
    ordering(interpreter, |a, b| a > b)
}

/// Implements the LT operation.
fn lt(interpreter: &mut Interpreter, _bytecode: &Bytecode, _instruction: &Instruction) -> VmResult<()> {
    ordering(interpreter, |a, b| a < b)
}

/// Implements the GTE operation.
fn gte(interpreter: &mut Interpreter, _bytecode: &Bytecode, _instruction: &Instruction) -> VmResult<()> {
    ordering(interpreter, |a, b| a >= b)
}

/// Implements the LTE operation.
fn lte(interpreter: &mut Interpreter, _bytecode: &Bytecode, _instruction: &Instruction) -> VmResult<()> {
    ordering(interpreter, |a, b| a <= b)
}

fn ordering(interpreter: &mut Interpreter, cmp: impl FnOnce(f64, f64) -> bool) -> VmResult<()> {
    let b = interpreter.pop()?;
    let a = interpreter.pop()?;
    let result: VmResult<bool> = (|| {
        let x = interpreter.runtime().number(a)?;
        let y = interpreter.runtime().number(b)?;
        Ok(cmp(x, y))
    })();
    interpreter.release(a);
    interpreter.release(b);
    let out = interpreter.runtime().new_bool(result?);
    interpreter.push(out)
}

/// Implements the AND operation on truthiness.
fn and(interpreter: &mut Interpreter, _bytecode: &Bytecode, _instruction: &Instruction) -> VmResult<()> {
    truthy_binop(interpreter, |a, b| a && b)
}

/// Implements the OR operation on truthiness.
fn or(interpreter: &mut Interpreter, _bytecode: &Bytecode, _instruction: &Instruction) -> VmResult<()> {
    truthy_binop(interpreter, |a, b| a || b)
}

fn truthy_binop(interpreter: &mut Interpreter, op: impl FnOnce(bool, bool) -> bool) -> VmResult<()> {
    let b = interpreter.pop()?;
    let a = interpreter.pop()?;
    let result: VmResult<bool> = (|| {
        let x = interpreter.runtime().is_truthy(a)?;
        let y = interpreter.runtime().is_truthy(b)?;
        Ok(op(x, y))
    })();
    interpreter.release(a);
    interpreter.release(b);
    let out = interpreter.runtime().new_bool(result?);
    interpreter.push(out)
}

/// Implements the NOT operation.
fn not(interpreter: &mut Interpreter, _bytecode: &Bytecode, _instruction: &Instruction) -> VmResult<()> {
    let v = interpreter.pop()?;
    let result = interpreter.runtime().is_truthy(v);
    interpreter.release(v);
    let truthy = result?;
    let out = interpreter.runtime().new_bool(!truthy);
    interpreter.push(out)
}

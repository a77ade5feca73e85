//! Arithmetic operations for the Kronos VM.

use crate::bytecode::Bytecode;
use crate::error::{VmError, VmResult};
use crate::instruction::Instruction;
use crate::interpreter::Interpreter;
use crate::jump_table::JumpTable;
use crate::op_code::OpCode;
use crate::runtime::Runtime;
use crate::value::{Value, ValueType};

/// Registers the arithmetic operation handlers.
pub fn register_handlers(table: &mut JumpTable) {
    table.register(OpCode::Add, add);
    table.register(OpCode::Sub, sub);
    table.register(OpCode::Mul, mul);
    table.register(OpCode::Div, div);
}

/// Implements the ADD operation.
///
/// Numbers add; strings concatenate; a mixed string/number pair (either
/// order) coerces the non-string side through its printable form.
fn add(interpreter: &mut Interpreter, _bytecode: &Bytecode, _instruction: &Instruction) -> VmResult<()> {
    let b = interpreter.pop()?;
    let a = interpreter.pop()?;
    let result = add_values(interpreter.runtime(), a, b);
    interpreter.release(a);
    interpreter.release(b);
    interpreter.push(result?)
}

fn add_values(rt: &Runtime, a: Value, b: Value) -> VmResult<Value> {
    let ta = rt.type_of(a)?;
    let tb = rt.type_of(b)?;
    match (ta, tb) {
        (ValueType::Number, ValueType::Number) => {
            Ok(rt.new_number(rt.number(a)? + rt.number(b)?))
        }
        (ValueType::Str, _) | (_, ValueType::Str) => {
            let mut text = rt.display(a)?;
            text.push_str(&rt.display(b)?);
            Ok(rt.new_string(text.as_bytes()))
        }
        _ => Err(VmError::type_mismatch(
            "number or string",
            if ta == ValueType::Number { tb } else { ta }.name(),
        )),
    }
}

/// Implements the SUB operation.
fn sub(interpreter: &mut Interpreter, _bytecode: &Bytecode, _instruction: &Instruction) -> VmResult<()> {
    numeric_binop(interpreter, |a, b| Ok(a - b))
}

/// Implements the MUL operation.
fn mul(interpreter: &mut Interpreter, _bytecode: &Bytecode, _instruction: &Instruction) -> VmResult<()> {
    numeric_binop(interpreter, |a, b| Ok(a * b))
}

/// Implements the DIV operation. Division by zero is fatal.
fn div(interpreter: &mut Interpreter, _bytecode: &Bytecode, _instruction: &Instruction) -> VmResult<()> {
    numeric_binop(interpreter, |a, b| {
        if b == 0.0 {
            Err(VmError::division_by_zero("DIV"))
        } else {
            Ok(a / b)
        }
    })
}

fn numeric_binop(
    interpreter: &mut Interpreter,
    op: impl FnOnce(f64, f64) -> VmResult<f64>,
) -> VmResult<()> {
    let b = interpreter.pop()?;
    let a = interpreter.pop()?;
    let result: VmResult<Value> = (|| {
        let x = interpreter.runtime().number(a)?;
        let y = interpreter.runtime().number(b)?;
        Ok(interpreter.runtime().new_number(op(x, y)?))
    })();
    interpreter.release(a);
    interpreter.release(b);
    interpreter.push(result?)
}

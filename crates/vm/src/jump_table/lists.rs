//! List, sequence and map operations for the Kronos VM.

use crate::bytecode::Bytecode;
use crate::error::{VmError, VmResult};
use crate::instruction::Instruction;
use crate::interpreter::Interpreter;
use crate::jump_table::JumpTable;
use crate::op_code::OpCode;
use crate::value::{Value, ValueType};

/// Registers the list operation handlers.
pub fn register_handlers(table: &mut JumpTable) {
    table.register(OpCode::ListNew, list_new);
    table.register(OpCode::ListAppend, list_append);
    table.register(OpCode::ListGet, list_get);
    table.register(OpCode::ListSet, list_set);
    table.register(OpCode::ListLen, list_len);
    table.register(OpCode::ListSlice, list_slice);
    table.register(OpCode::ListIter, list_iter);
    table.register(OpCode::ListNext, list_next);
}

/// Implements the LIST_NEW operation; the operand is a capacity hint.
fn list_new(
    interpreter: &mut Interpreter,
    _bytecode: &Bytecode,
    instruction: &Instruction,
) -> VmResult<()> {
    let capacity = instruction.operand_u16(0)? as usize;
    let list = interpreter.runtime().new_list(capacity);
    interpreter.push(list)
}

/// Implements the LIST_APPEND operation: append the top of stack to the
/// list beneath it, leaving the list in place.
fn list_append(
    interpreter: &mut Interpreter,
    _bytecode: &Bytecode,
    _instruction: &Instruction,
) -> VmResult<()> {
    let element = interpreter.pop()?;
    let result = interpreter
        .peek(0)
        .and_then(|list| interpreter.runtime().list_push(list, element));
    // The stack's reference to the element transfers to the list.
    interpreter.release(element);
    result
}

/// Implements the LIST_GET operation.
///
/// Lists and tuples index by number (negative counts from the end);
/// strings index to a one-character string; maps treat the index as a key
/// and fault when it is missing.
fn list_get(
    interpreter: &mut Interpreter,
    _bytecode: &Bytecode,
    _instruction: &Instruction,
) -> VmResult<()> {
    let index = interpreter.pop()?;
    let base = interpreter.pop()?;
    let result: VmResult<Value> = (|| {
        let rt = interpreter.runtime();
        match rt.type_of(base)? {
            ValueType::List | ValueType::Tuple => rt.list_get(base, index_number(interpreter, index)?),
            ValueType::Str => rt.string_char(base, index_number(interpreter, index)?),
            ValueType::Map => match rt.map_get(base, index)? {
                Some(v) => Ok(v),
                None => Err(VmError::KeyNotFound),
            },
            other => Err(VmError::type_mismatch("list", other.name())),
        }
    })();
    interpreter.release(index);
    interpreter.release(base);
    interpreter.push(result?)
}

/// Implements the LIST_SET operation: mutate a list element or map entry.
fn list_set(
    interpreter: &mut Interpreter,
    _bytecode: &Bytecode,
    _instruction: &Instruction,
) -> VmResult<()> {
    let value = interpreter.pop()?;
    let index = interpreter.pop()?;
    let base = interpreter.pop()?;
    let result: VmResult<()> = (|| {
        let rt = interpreter.runtime();
        match rt.type_of(base)? {
            ValueType::List => rt.list_set(base, index_number(interpreter, index)?, value),
            ValueType::Map => rt.map_set(base, index, value),
            other => Err(VmError::type_mismatch("list or map", other.name())),
        }
    })();
    interpreter.release(value);
    interpreter.release(index);
    interpreter.release(base);
    result
}

/// Implements the LIST_LEN operation over lists, strings, ranges, tuples
/// and maps.
fn list_len(
    interpreter: &mut Interpreter,
    _bytecode: &Bytecode,
    _instruction: &Instruction,
) -> VmResult<()> {
    let value = interpreter.pop()?;
    let result = interpreter.runtime().sequence_len(value);
    interpreter.release(value);
    let n = interpreter.runtime().new_number(result? as f64);
    interpreter.push(n)
}

/// Implements the LIST_SLICE operation; `end == -1` means "through end".
fn list_slice(
    interpreter: &mut Interpreter,
    _bytecode: &Bytecode,
    _instruction: &Instruction,
) -> VmResult<()> {
    let end = interpreter.pop()?;
    let start = interpreter.pop()?;
    let base = interpreter.pop()?;
    let result: VmResult<Value> = (|| {
        let lo = index_number(interpreter, start)?;
        let hi = index_number(interpreter, end)?;
        interpreter.runtime().slice(base, lo, hi)
    })();
    interpreter.release(end);
    interpreter.release(start);
    interpreter.release(base);
    interpreter.push(result?)
}

/// Implements the LIST_ITER operation: leave the sequence and push index 0.
fn list_iter(
    interpreter: &mut Interpreter,
    _bytecode: &Bytecode,
    _instruction: &Instruction,
) -> VmResult<()> {
    let base = interpreter.peek(0)?;
    match interpreter.runtime().type_of(base)? {
        ValueType::List | ValueType::Tuple | ValueType::Str | ValueType::Range => {}
        other => return Err(VmError::type_mismatch("list", other.name())),
    }
    let zero = interpreter.runtime().new_number(0.0);
    interpreter.push(zero)
}

/// Implements the LIST_NEXT operation.
///
/// Stack effect `list idx → list idx+1 item has_more`: while items remain
/// the next item and `true` are pushed; at the end nil and `false`.
fn list_next(
    interpreter: &mut Interpreter,
    _bytecode: &Bytecode,
    _instruction: &Instruction,
) -> VmResult<()> {
    let index_value = interpreter.pop()?;
    let index = {
        let result = interpreter.runtime().number(index_value);
        interpreter.release(index_value);
        result? as usize
    };
    let base = interpreter.peek(0)?;
    let next = interpreter.runtime().iter_next(base, index)?;

    let advanced = interpreter.runtime().new_number((index + 1) as f64);
    interpreter.push(advanced)?;
    match next {
        Some(item) => {
            interpreter.push(item)?;
            let more = interpreter.runtime().new_bool(true);
            interpreter.push(more)
        }
        None => {
            let nil = interpreter.runtime().new_nil();
            interpreter.push(nil)?;
            let more = interpreter.runtime().new_bool(false);
            interpreter.push(more)
        }
    }
}

/// Reads a stack value as an integral index.
fn index_number(interpreter: &Interpreter, v: Value) -> VmResult<i64> {
    Ok(interpreter.runtime().number(v)? as i64)
}

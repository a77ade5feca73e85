//! Function definition, call and return for the Kronos VM.

use crate::bytecode::Bytecode;
use crate::error::{VmError, VmResult};
use crate::instruction::Instruction;
use crate::interpreter::{FunctionDef, Interpreter};
use crate::jump_table::JumpTable;
use crate::op_code::OpCode;

/// Registers the function handlers.
pub fn register_handlers(table: &mut JumpTable) {
    table.register(OpCode::DefineFunc, define_func);
    table.register(OpCode::CallFunc, call_func);
    table.register(OpCode::ReturnVal, return_val);
}

/// Implements the DEFINE_FUNC operation.
///
/// Registers the function under its name and materialises a `Function`
/// heap value copying the body slice. The compiler emits a skip `JUMP`
/// directly after this instruction; its target delimits the body, and
/// falling through to it is what skips the body during top-level
/// execution.
fn define_func(
    interpreter: &mut Interpreter,
    bytecode: &Bytecode,
    instruction: &Instruction,
) -> VmResult<()> {
    let name_idx = instruction.operand_u16(0)?;
    let name = interpreter.constant_string(bytecode, name_idx)?;
    let arity = instruction.operand_u8(2)?;

    let mut param_values = Vec::with_capacity(usize::from(arity));
    let mut param_names = Vec::with_capacity(usize::from(arity));
    for i in 0..usize::from(arity) {
        let param_idx = instruction.operand_u16(3 + 2 * i)?;
        let param = bytecode.constant(param_idx as usize)?;
        param_names.push(interpreter.runtime().string(param)?);
        param_values.push(param);
    }
    let body_start = instruction.operand_u16(3 + 2 * usize::from(arity))? as usize;

    // The skip jump right after this instruction bounds the body.
    let skip_at = instruction.pointer + instruction.size();
    let skip = Instruction::parse(bytecode.code(), skip_at)?;
    if skip.opcode() != OpCode::Jump {
        return Err(VmError::parse(
            "DEFINE_FUNC must be followed by a skip jump".to_string(),
        ));
    }
    let after_skip = skip_at + skip.size();
    let body_end = after_skip as i64 + i64::from(skip.operand_i16(0)?);
    if body_start > body_end as usize || body_end as usize > bytecode.code().len() {
        return Err(VmError::parse(format!(
            "Function body range {body_start}..{body_end} out of bounds"
        )));
    }

    let body = &bytecode.code()[body_start..body_end as usize];
    let value = interpreter
        .runtime()
        .new_function(body, arity, &param_values)?;

    interpreter.define_function(
        &name,
        FunctionDef {
            value,
            body_start,
            arity,
            param_names,
        },
    );
    Ok(())
}

/// Implements the CALL_FUNC operation.
///
/// Builtins take priority; otherwise the user function table is
/// consulted, a frame and scope are pushed, and parameters are bound from
/// the stack. An unknown name is fatal.
fn call_func(
    interpreter: &mut Interpreter,
    bytecode: &Bytecode,
    instruction: &Instruction,
) -> VmResult<()> {
    let name_idx = instruction.operand_u16(0)?;
    let argc = usize::from(instruction.operand_u8(2)?);
    let name = interpreter.constant_string(bytecode, name_idx)?;

    // Arguments were pushed left to right; popping reverses them.
    let mut args = Vec::with_capacity(argc);
    for _ in 0..argc {
        args.push(interpreter.pop()?);
    }
    args.reverse();

    if let Some(handler) = interpreter.builtins().get(&name) {
        let result = handler(interpreter.runtime(), &args);
        for arg in &args {
            interpreter.release(*arg);
        }
        return interpreter.push(result?);
    }

    let Some(def) = interpreter.function(&name) else {
        for arg in &args {
            interpreter.release(*arg);
        }
        return Err(VmError::undefined_function(name));
    };

    if args.len() != usize::from(def.arity) {
        let err = VmError::ArityMismatch {
            name,
            expected: usize::from(def.arity),
            actual: args.len(),
        };
        for arg in &args {
            interpreter.release(*arg);
        }
        return Err(err);
    }

    let return_pc = instruction.pointer + instruction.size();
    if let Err(err) = interpreter.push_frame(return_pc) {
        for arg in &args {
            interpreter.release(*arg);
        }
        return Err(err);
    }
    interpreter.push_scope();
    for (param, arg) in def.param_names.iter().zip(args.into_iter()) {
        // The popped reference transfers into the binding.
        interpreter.bind_var(param, arg, true, None)?;
    }
    interpreter.jump_to(def.body_start);
    Ok(())
}

/// Implements the RETURN_VAL operation.
fn return_val(
    interpreter: &mut Interpreter,
    _bytecode: &Bytecode,
    _instruction: &Instruction,
) -> VmResult<()> {
    let value = interpreter.pop()?;
    let Some(frame) = interpreter.pop_frame() else {
        interpreter.release(value);
        return Err(VmError::invalid_operation(
            "RETURN_VAL",
            "return outside of a function",
        ));
    };
    // Dropping the callee scope releases its bindings.
    interpreter.truncate_scopes(frame.scope_index + 1);
    interpreter.push(value)?;
    interpreter.jump_to(frame.return_pc);
    Ok(())
}

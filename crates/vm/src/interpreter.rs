//! The Kronos virtual machine: a fetch-decode-execute loop over compiled
//! bytecode.
//!
//! The interpreter owns its operand stack, scope stack, call stack and
//! function registry, all of which hold references into the shared
//! [`Runtime`]. Execution is single-threaded over one [`Bytecode`];
//! separate interpreters in separate threads may share a runtime.

use std::io::Write;

use hashbrown::HashMap;

use crate::builtins::BuiltinRegistry;
use crate::bytecode::Bytecode;
use crate::error::{VmError, VmResult};
use crate::instruction::Instruction;
use crate::jump_table::JumpTable;
use crate::limits::InterpreterLimits;
use crate::runtime::Runtime;
use crate::scope::{CallFrame, Scope};
use crate::stack::OperandStack;
use crate::value::Value;
use crate::vm_state::VmState;

/// A function registered by `DEFINE_FUNC`.
#[derive(Clone)]
pub struct FunctionDef {
    /// The materialised `Function` heap value; the registry owns one
    /// reference.
    pub value: Value,

    /// Absolute position of the first body instruction.
    pub body_start: usize,

    /// Number of parameters.
    pub arity: u8,

    /// Parameter names, binding order.
    pub param_names: Vec<String>,
}

/// Where `PRINT` output goes.
enum OutputSink {
    /// Line-buffered standard output.
    Stdout,
    /// An in-memory buffer, for embedding and tests.
    Buffer(Vec<u8>),
}

/// The virtual machine.
pub struct Interpreter {
    runtime: Runtime,
    state: VmState,
    pc: usize,
    is_jumping: bool,
    limits: InterpreterLimits,
    jump_table: JumpTable,
    operand_stack: OperandStack,
    scopes: Vec<Scope>,
    call_stack: Vec<CallFrame>,
    functions: HashMap<String, FunctionDef>,
    builtins: BuiltinRegistry,
    output: OutputSink,
    last_error: Option<VmError>,
}

impl Interpreter {
    /// Creates an interpreter with default limits, the default builtin
    /// registry, and stdout as the print sink.
    pub fn new(runtime: Runtime) -> Self {
        Self::with_limits(runtime, InterpreterLimits::default())
    }

    /// Creates an interpreter with explicit limits.
    pub fn with_limits(runtime: Runtime, limits: InterpreterLimits) -> Self {
        let operand_stack = OperandStack::new(runtime.clone(), limits.max_operand_stack);
        let global = Scope::new(runtime.clone());
        Self {
            runtime,
            state: VmState::NONE,
            pc: 0,
            is_jumping: false,
            limits,
            jump_table: JumpTable::shared(),
            operand_stack,
            scopes: vec![global],
            call_stack: Vec::new(),
            functions: HashMap::new(),
            builtins: BuiltinRegistry::new(),
            output: OutputSink::Stdout,
            last_error: None,
        }
    }

    /// The shared runtime.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// The current VM state.
    pub fn state(&self) -> VmState {
        self.state
    }

    /// The error that faulted the machine, if any.
    pub fn last_error(&self) -> Option<&VmError> {
        self.last_error.as_ref()
    }

    /// The builtin registry.
    pub fn builtins(&self) -> &BuiltinRegistry {
        &self.builtins
    }

    /// Mutable access to the builtin registry, for host registration.
    pub fn builtins_mut(&mut self) -> &mut BuiltinRegistry {
        &mut self.builtins
    }

    /// Redirects `PRINT` output into an in-memory buffer.
    pub fn capture_output(&mut self) {
        self.output = OutputSink::Buffer(Vec::new());
    }

    /// Takes the captured output, leaving an empty buffer.
    pub fn take_output(&mut self) -> String {
        match &mut self.output {
            OutputSink::Stdout => String::new(),
            OutputSink::Buffer(buf) => String::from_utf8_lossy(&std::mem::take(buf)).into_owned(),
        }
    }

    // ---- Execution -------------------------------------------------------

    /// Executes the bytecode until HALT or FAULT. Returns the final state.
    pub fn execute(&mut self, bytecode: &Bytecode) -> VmState {
        self.pc = 0;
        self.state = VmState::NONE;
        self.last_error = None;

        while !self.state.is_halt() && !self.state.is_fault() {
            if let Err(err) = self.execute_next(bytecode) {
                self.on_fault(err);
            }
        }
        self.state
    }

    /// Executes the bytecode, surfacing the fault as an error.
    pub fn run(&mut self, bytecode: &Bytecode) -> VmResult<()> {
        match self.execute(bytecode) {
            state if state.is_fault() => Err(self
                .last_error
                .clone()
                .unwrap_or_else(|| VmError::invalid_operation("run", "unknown fault"))),
            _ => Ok(()),
        }
    }

    /// Executes one instruction.
    pub fn execute_next(&mut self, bytecode: &Bytecode) -> VmResult<()> {
        if self.state.is_halt() || self.state.is_fault() {
            return Ok(());
        }

        // Running off the end of the code halts the machine.
        if self.pc >= bytecode.code().len() {
            self.state = VmState::HALT;
            return Ok(());
        }

        self.is_jumping = false;
        let instruction = Instruction::parse(bytecode.code(), self.pc)?;
        let table = self.jump_table;
        table.execute(self, bytecode, &instruction)?;

        if !self.is_jumping {
            self.pc = instruction.pointer + instruction.size();
        }
        Ok(())
    }

    fn on_fault(&mut self, err: VmError) {
        log::debug!("interpreter fault: {err}");
        self.last_error = Some(err);
        self.state = VmState::FAULT;
    }

    /// Transitions to HALT.
    pub fn halt(&mut self) {
        self.state = VmState::HALT;
    }

    /// Sets the program counter directly (absolute jump).
    pub(crate) fn jump_to(&mut self, target: usize) {
        self.pc = target;
        self.is_jumping = true;
    }

    /// Applies a relative jump: the offset is relative to the byte after
    /// the offset field.
    pub(crate) fn jump_relative(
        &mut self,
        bytecode: &Bytecode,
        instruction: &Instruction,
        offset: i16,
    ) -> VmResult<()> {
        let base = instruction.pointer + instruction.size();
        let target = base as i64 + i64::from(offset);
        if target < 0 || target as usize > bytecode.code().len() {
            return Err(VmError::parse(format!(
                "Jump target {target} out of bounds (code length {})",
                bytecode.code().len()
            )));
        }
        self.jump_to(target as usize);
        Ok(())
    }

    // ---- Operand stack ---------------------------------------------------

    /// Pushes a value, taking ownership of the caller's reference.
    pub(crate) fn push(&mut self, value: Value) -> VmResult<()> {
        self.operand_stack.push(value)
    }

    /// Pops a value, transferring its reference to the caller.
    pub(crate) fn pop(&mut self) -> VmResult<Value> {
        self.operand_stack.pop()
    }

    /// Peeks `n` slots below the top.
    pub(crate) fn peek(&self, n: usize) -> VmResult<Value> {
        self.operand_stack.peek(n)
    }

    /// Releases one reference to a value.
    pub(crate) fn release(&self, value: Value) {
        self.runtime.release(value);
    }

    /// Number of values on the operand stack.
    pub fn operand_stack_len(&self) -> usize {
        self.operand_stack.len()
    }

    /// Number of scopes (the global scope counts as one).
    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    // ---- Constants -------------------------------------------------------

    /// Reads a string constant by operand index.
    pub(crate) fn constant_string(&self, bytecode: &Bytecode, index: u16) -> VmResult<String> {
        let value = bytecode.constant(index as usize)?;
        self.runtime.string(value)
    }

    // ---- Variables -------------------------------------------------------

    /// Looks a name up from the innermost scope outwards. The returned
    /// handle stays owned by its binding.
    pub(crate) fn lookup_var(&self, name: &str) -> VmResult<Value> {
        for scope in self.scopes.iter().rev() {
            if let Some(binding) = scope.get(name) {
                return Ok(binding.value);
            }
        }
        Err(VmError::undefined_variable(name))
    }

    /// Binds a name in the innermost scope, taking ownership of the
    /// caller's reference.
    pub(crate) fn bind_var(
        &mut self,
        name: &str,
        value: Value,
        mutable: bool,
        type_name: Option<String>,
    ) -> VmResult<()> {
        let scope = self
            .scopes
            .last_mut()
            .expect("the global scope always exists");
        scope.bind(name, value, mutable, type_name)
    }

    // ---- Functions -------------------------------------------------------

    /// Registers a function definition, replacing (and releasing) any
    /// previous definition under the same name.
    pub(crate) fn define_function(&mut self, name: &str, def: FunctionDef) {
        if let Some(old) = self.functions.insert(name.to_string(), def) {
            self.runtime.release(old.value);
        }
    }

    /// Looks up a function definition.
    pub(crate) fn function(&self, name: &str) -> Option<FunctionDef> {
        self.functions.get(name).cloned()
    }

    /// Pushes a call frame recording the return position and the caller's
    /// scope index.
    pub(crate) fn push_frame(&mut self, return_pc: usize) -> VmResult<()> {
        if self.call_stack.len() >= self.limits.max_call_depth {
            return Err(VmError::CallDepthExceeded {
                depth: self.call_stack.len(),
                limit: self.limits.max_call_depth,
            });
        }
        self.call_stack.push(CallFrame {
            return_pc,
            scope_index: self.scopes.len() - 1,
        });
        Ok(())
    }

    /// Pops the top call frame.
    pub(crate) fn pop_frame(&mut self) -> Option<CallFrame> {
        self.call_stack.pop()
    }

    /// Pushes a fresh scope for a function activation.
    pub(crate) fn push_scope(&mut self) {
        self.scopes.push(Scope::new(self.runtime.clone()));
    }

    /// Drops scopes above `len`, releasing their bindings.
    pub(crate) fn truncate_scopes(&mut self, len: usize) {
        self.scopes.truncate(len);
    }

    // ---- Output ----------------------------------------------------------

    /// Writes one line of `PRINT` output.
    pub(crate) fn write_line(&mut self, text: &str) -> VmResult<()> {
        match &mut self.output {
            OutputSink::Stdout => {
                let stdout = std::io::stdout();
                let mut lock = stdout.lock();
                writeln!(lock, "{text}").map_err(|e| VmError::invalid_operation(
                    "print".to_string(),
                    e.to_string(),
                ))
            }
            OutputSink::Buffer(buf) => {
                buf.extend_from_slice(text.as_bytes());
                buf.push(b'\n');
                Ok(())
            }
        }
    }

    // ---- Garbage collection ---------------------------------------------

    /// Runs the cycle collector with this interpreter's live values and
    /// the bytecode's constant pool pinned as roots.
    pub fn collect_cycles(&mut self, bytecode: &Bytecode) -> usize {
        let mut roots: Vec<Value> = Vec::new();
        roots.extend_from_slice(self.operand_stack.items());
        for scope in &self.scopes {
            roots.extend(scope.values());
        }
        for def in self.functions.values() {
            roots.push(def.value);
        }
        roots.extend_from_slice(bytecode.constants());
        self.runtime.collect_cycles_with_roots(&roots)
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        for (_, def) in self.functions.drain() {
            self.runtime.release(def.value);
        }
        // Scopes and the operand stack release their contents on drop.
    }
}

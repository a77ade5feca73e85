//! Statement compilation.

use kronos_vm::OpCode;

use crate::ast::{CatchClause, Expr, ForKind, Stmt};
use crate::codegen::Compiler;
use crate::error::CompileError;

impl Compiler {
    /// Compiles one statement, leaving the operand stack balanced.
    pub(crate) fn compile_stmt(&mut self, stmt: &Stmt) {
        if self.failed() {
            return;
        }
        match stmt {
            Stmt::Assign {
                name,
                value,
                is_mutable,
                type_name,
            } => self.compile_assign(name, value, *is_mutable, type_name.as_deref()),
            Stmt::Print(value) => {
                self.compile_expr(value);
                self.emit_op(OpCode::Print);
            }
            Stmt::If {
                condition,
                block,
                else_if_conditions,
                else_if_blocks,
                else_block,
            } => self.compile_if(
                condition,
                block,
                else_if_conditions,
                else_if_blocks,
                else_block.as_deref(),
            ),
            Stmt::While { condition, block } => self.compile_while(condition, block),
            Stmt::For { var, kind, block } => match kind {
                ForKind::Range { start, end } => self.compile_for_range(var, start, end, block),
                ForKind::Iterable(iterable) => self.compile_for_iterable(var, iterable, block),
            },
            Stmt::Function {
                name,
                params,
                block,
            } => self.compile_function(name, params, block),
            Stmt::Return(value) => {
                match value {
                    Some(expr) => self.compile_expr(expr),
                    None => {
                        let nil = self.nil_constant();
                        self.emit_op(OpCode::LoadConst);
                        self.emit_u16(nil);
                    }
                }
                self.emit_op(OpCode::ReturnVal);
            }
            Stmt::Call { name, args } => {
                // Uniform policy: a call statement discards its result.
                self.compile_call(name, args);
                self.emit_op(OpCode::Pop);
            }
            Stmt::Import { .. } => {
                // No bytecode; modules resolve at call time through the
                // dotted name on CALL_FUNC.
            }
            Stmt::Try {
                catch_blocks,
                ..
            } => self.compile_try(catch_blocks),
            Stmt::Raise(message) => {
                self.compile_expr(message);
                let name = self.name_constant("raise");
                self.emit_op(OpCode::CallFunc);
                self.emit_u16(name);
                self.emit_u8(1);
                self.emit_op(OpCode::Pop);
            }
        }
    }

    pub(crate) fn compile_block(&mut self, block: &[Stmt]) {
        for stmt in block {
            self.compile_stmt(stmt);
        }
    }

    fn compile_assign(
        &mut self,
        name: &str,
        value: &Expr,
        mutable: bool,
        type_name: Option<&str>,
    ) {
        self.compile_expr(value);
        self.emit_store(name, mutable, type_name);
    }

    /// Emits a `STORE_VAR` with its variable-length operand.
    pub(crate) fn emit_store(&mut self, name: &str, mutable: bool, type_name: Option<&str>) {
        let name_idx = self.name_constant(name);
        self.emit_op(OpCode::StoreVar);
        self.emit_u16(name_idx);
        self.emit_u8(u8::from(mutable));
        match type_name {
            Some(annotation) => {
                let type_idx = self.name_constant(annotation);
                self.emit_u8(1);
                self.emit_u16(type_idx);
            }
            None => self.emit_u8(0),
        }
    }

    fn compile_if(
        &mut self,
        condition: &Expr,
        block: &[Stmt],
        else_if_conditions: &[Expr],
        else_if_blocks: &[Vec<Stmt>],
        else_block: Option<&[Stmt]>,
    ) {
        if else_if_conditions.len() != else_if_blocks.len() {
            self.fail(CompileError::invalid_ast(
                "else-if conditions and blocks out of step",
            ));
            return;
        }

        let mut arms: Vec<(&Expr, &[Stmt])> = vec![(condition, block)];
        for (cond, blk) in else_if_conditions.iter().zip(else_if_blocks.iter()) {
            arms.push((cond, blk.as_slice()));
        }

        let mut end_patches = Vec::new();
        let arm_count = arms.len();
        for (i, (cond, blk)) in arms.into_iter().enumerate() {
            self.compile_expr(cond);
            let skip = self.emit_jump_placeholder(OpCode::JumpIfFalse);
            self.compile_block(blk);
            let is_last_arm = i + 1 == arm_count;
            if !is_last_arm || else_block.is_some() {
                end_patches.push(self.emit_jump_placeholder(OpCode::Jump));
            }
            self.patch_jump_to_here(skip);
        }
        if let Some(else_body) = else_block {
            self.compile_block(else_body);
        }
        for patch in end_patches {
            self.patch_jump_to_here(patch);
        }
    }

    fn compile_while(&mut self, condition: &Expr, block: &[Stmt]) {
        let loop_start = self.pc();
        self.compile_expr(condition);
        let exit = self.emit_jump_placeholder(OpCode::JumpIfFalse);
        self.compile_block(block);
        self.emit_jump_back(loop_start);
        self.patch_jump_to_here(exit);
    }

    /// A counted loop: `start` seeds the loop variable, the condition is
    /// `var <= end`, and the post-step increments by 1.
    fn compile_for_range(&mut self, var: &str, start: &Expr, end: &Expr, block: &[Stmt]) {
        self.compile_expr(start);
        self.emit_store(var, true, None);

        let loop_start = self.pc();
        let var_idx = self.name_constant(var);
        self.emit_op(OpCode::LoadVar);
        self.emit_u16(var_idx);
        self.compile_expr(end);
        self.emit_op(OpCode::Lte);
        let exit = self.emit_jump_placeholder(OpCode::JumpIfFalse);

        self.compile_block(block);

        self.emit_op(OpCode::LoadVar);
        self.emit_u16(var_idx);
        let one = self.number_constant(1.0);
        self.emit_op(OpCode::LoadConst);
        self.emit_u16(one);
        self.emit_op(OpCode::Add);
        self.emit_store(var, true, None);

        self.emit_jump_back(loop_start);
        self.patch_jump_to_here(exit);
    }

    /// Iterator state is spilled into two hidden variables so the operand
    /// stack stays balanced across the body. The names derive from the
    /// loop variable's constant-pool index, which keeps nested loops
    /// apart.
    fn compile_for_iterable(&mut self, var: &str, iterable: &Expr, block: &[Stmt]) {
        let var_idx = self.name_constant(var);
        let list_var = format!("__iter_list_{var_idx}");
        let index_var = format!("__iter_index_{var_idx}");

        self.compile_expr(iterable);
        self.emit_op(OpCode::ListIter);
        self.emit_store(&index_var, true, None);
        self.emit_store(&list_var, true, None);

        let loop_start = self.pc();
        let list_idx = self.name_constant(&list_var);
        let index_idx = self.name_constant(&index_var);
        self.emit_op(OpCode::LoadVar);
        self.emit_u16(list_idx);
        self.emit_op(OpCode::LoadVar);
        self.emit_u16(index_idx);
        self.emit_op(OpCode::ListNext);
        let exit = self.emit_jump_placeholder(OpCode::JumpIfFalse);

        self.emit_store(var, true, None);
        self.emit_store(&index_var, true, None);
        self.emit_store(&list_var, true, None);

        self.compile_block(block);
        self.emit_jump_back(loop_start);
        self.patch_jump_to_here(exit);

        // Exhausted LIST_NEXT leaves sequence, advanced index and nil.
        self.emit_op(OpCode::Pop);
        self.emit_op(OpCode::Pop);
        self.emit_op(OpCode::Pop);

        // Drop the iterator references held by the hidden variables.
        let nil = self.nil_constant();
        self.emit_op(OpCode::LoadConst);
        self.emit_u16(nil);
        self.emit_store(&list_var, true, None);
        self.emit_op(OpCode::LoadConst);
        self.emit_u16(nil);
        self.emit_store(&index_var, true, None);
    }

    fn compile_function(&mut self, name: &str, params: &[String], block: &[Stmt]) {
        if params.len() > u8::MAX as usize {
            self.fail(CompileError::invalid_ast("more than 255 parameters"));
            return;
        }

        let name_idx = self.name_constant(name);
        let param_indices: Vec<u16> = params.iter().map(|p| self.name_constant(p)).collect();

        self.emit_op(OpCode::DefineFunc);
        self.emit_u16(name_idx);
        self.emit_u8(params.len() as u8);
        for idx in param_indices {
            self.emit_u16(idx);
        }
        let body_start_at = self.pc();
        self.emit_u16(0);

        let skip = self.emit_jump_placeholder(OpCode::Jump);

        let body_start = self.pc();
        if body_start > usize::from(u16::MAX) {
            self.fail(CompileError::FunctionBodyOutOfRange);
            return;
        }
        self.patch_u16(body_start_at, body_start as u16);

        self.compile_block(block);

        // Implicit return: every body ends with RETURN_VAL.
        let nil = self.nil_constant();
        self.emit_op(OpCode::LoadConst);
        self.emit_u16(nil);
        self.emit_op(OpCode::ReturnVal);

        self.patch_jump_to_here(skip);
    }

    fn compile_try(&mut self, _catch_blocks: &[CatchClause]) {
        // The opcode inventory has no exception-handling family; the
        // bytecode backend rejects try/catch outright rather than
        // silently dropping handlers.
        self.fail(CompileError::unsupported("try/catch"));
    }
}

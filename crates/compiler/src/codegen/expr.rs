//! Expression compilation. Every expression pushes exactly one value.

use kronos_vm::OpCode;

use crate::ast::{BinOpKind, Expr};
use crate::codegen::Compiler;
use crate::error::CompileError;

impl Compiler {
    /// Compiles one expression.
    pub(crate) fn compile_expr(&mut self, expr: &Expr) {
        if self.failed() {
            return;
        }
        match expr {
            Expr::Number(n) => {
                let idx = self.number_constant(*n);
                self.emit_op(OpCode::LoadConst);
                self.emit_u16(idx);
            }
            Expr::Str(text) => {
                let idx = self.string_constant(text);
                self.emit_op(OpCode::LoadConst);
                self.emit_u16(idx);
            }
            Expr::Bool(b) => {
                let idx = self.bool_constant(*b);
                self.emit_op(OpCode::LoadConst);
                self.emit_u16(idx);
            }
            Expr::Null => {
                let idx = self.nil_constant();
                self.emit_op(OpCode::LoadConst);
                self.emit_u16(idx);
            }
            Expr::Var(name) => {
                let idx = self.name_constant(name);
                self.emit_op(OpCode::LoadVar);
                self.emit_u16(idx);
            }
            Expr::FString(parts) => self.compile_fstring(parts),
            Expr::BinOp { op, left, right } => self.compile_binop(*op, left, right.as_deref()),
            Expr::List(elements) => {
                self.emit_op(OpCode::ListNew);
                self.emit_u16(0);
                for element in elements {
                    self.compile_expr(element);
                    self.emit_op(OpCode::ListAppend);
                }
            }
            Expr::Map { keys, values } => self.compile_map_literal(keys, values),
            Expr::Index { base, index } => {
                self.compile_expr(base);
                self.compile_expr(index);
                self.emit_op(OpCode::ListGet);
            }
            Expr::Slice { base, start, end } => {
                self.compile_expr(base);
                self.compile_expr(start);
                match end {
                    Some(end) => self.compile_expr(end),
                    None => {
                        // "through the end" sentinel.
                        let idx = self.number_constant(-1.0);
                        self.emit_op(OpCode::LoadConst);
                        self.emit_u16(idx);
                    }
                }
                self.emit_op(OpCode::ListSlice);
            }
            Expr::Call { name, args } => self.compile_call(name, args),
        }
    }

    /// Compiles a call; the return value stays on the stack.
    pub(crate) fn compile_call(&mut self, name: &str, args: &[Expr]) {
        if args.len() > u8::MAX as usize {
            self.fail(CompileError::invalid_ast("more than 255 arguments"));
            return;
        }
        for arg in args {
            self.compile_expr(arg);
        }
        let name_idx = self.name_constant(name);
        self.emit_op(OpCode::CallFunc);
        self.emit_u16(name_idx);
        self.emit_u8(args.len() as u8);
    }

    fn compile_binop(&mut self, op: BinOpKind, left: &Expr, right: Option<&Expr>) {
        match op {
            BinOpKind::Not => {
                self.compile_expr(left);
                self.emit_op(OpCode::Not);
                return;
            }
            BinOpKind::Neg => {
                // Lowered as 0 - x; the inventory has no negate opcode.
                let zero = self.number_constant(0.0);
                self.emit_op(OpCode::LoadConst);
                self.emit_u16(zero);
                self.compile_expr(left);
                self.emit_op(OpCode::Sub);
                return;
            }
            BinOpKind::Mod => {
                // Lowered through the `mod` builtin.
                let Some(right) = right else {
                    self.fail(CompileError::invalid_ast("mod without right operand"));
                    return;
                };
                self.compile_expr(left);
                self.compile_expr(right);
                let name_idx = self.name_constant("mod");
                self.emit_op(OpCode::CallFunc);
                self.emit_u16(name_idx);
                self.emit_u8(2);
                return;
            }
            _ => {}
        }

        let Some(right) = right else {
            self.fail(CompileError::invalid_ast("binary operator without right operand"));
            return;
        };
        self.compile_expr(left);
        self.compile_expr(right);
        let opcode = match op {
            BinOpKind::Add => OpCode::Add,
            BinOpKind::Sub => OpCode::Sub,
            BinOpKind::Mul => OpCode::Mul,
            BinOpKind::Div => OpCode::Div,
            BinOpKind::Eq => OpCode::Eq,
            BinOpKind::Neq => OpCode::Neq,
            BinOpKind::Gt => OpCode::Gt,
            BinOpKind::Lt => OpCode::Lt,
            BinOpKind::Gte => OpCode::Gte,
            BinOpKind::Lte => OpCode::Lte,
            BinOpKind::And => OpCode::And,
            BinOpKind::Or => OpCode::Or,
            BinOpKind::Not | BinOpKind::Neg | BinOpKind::Mod => unreachable!("handled above"),
        };
        self.emit_op(opcode);
    }

    /// f-strings compile to concatenation: string parts load directly,
    /// expression parts pass through the `to_string` builtin, and `ADD`
    /// joins everything left to right.
    fn compile_fstring(&mut self, parts: &[Expr]) {
        let mut rest = parts;
        match parts.first() {
            Some(Expr::Str(text)) => {
                let idx = self.string_constant(text);
                self.emit_op(OpCode::LoadConst);
                self.emit_u16(idx);
                rest = &parts[1..];
            }
            _ => {
                // Leading expression part: seed with an empty string.
                let idx = self.string_constant("");
                self.emit_op(OpCode::LoadConst);
                self.emit_u16(idx);
            }
        }

        for part in rest {
            match part {
                Expr::Str(text) => {
                    let idx = self.string_constant(text);
                    self.emit_op(OpCode::LoadConst);
                    self.emit_u16(idx);
                }
                expr => {
                    self.compile_expr(expr);
                    let name_idx = self.name_constant("to_string");
                    self.emit_op(OpCode::CallFunc);
                    self.emit_u16(name_idx);
                    self.emit_u8(1);
                }
            }
            self.emit_op(OpCode::Add);
        }
    }

    /// Map literals lower through the map builtins and a hidden variable;
    /// the opcode inventory has no map family.
    fn compile_map_literal(&mut self, keys: &[Expr], values: &[Expr]) {
        if keys.len() != values.len() {
            self.fail(CompileError::invalid_ast("map literal keys and values out of step"));
            return;
        }
        let hidden = format!("__map_lit_{}", self.next_hidden_id());

        let map_new = self.name_constant("map_new");
        self.emit_op(OpCode::CallFunc);
        self.emit_u16(map_new);
        self.emit_u8(0);
        self.emit_store(&hidden, true, None);

        let hidden_idx = self.name_constant(&hidden);
        let map_set = self.name_constant("map_set");
        for (key, value) in keys.iter().zip(values.iter()) {
            self.emit_op(OpCode::LoadVar);
            self.emit_u16(hidden_idx);
            self.compile_expr(key);
            self.compile_expr(value);
            self.emit_op(OpCode::CallFunc);
            self.emit_u16(map_set);
            self.emit_u8(3);
            self.emit_op(OpCode::Pop);
        }

        self.emit_op(OpCode::LoadVar);
        self.emit_u16(hidden_idx);

        // Clear the hidden binding so it stops owning the map.
        let nil = self.nil_constant();
        self.emit_op(OpCode::LoadConst);
        self.emit_u16(nil);
        self.emit_store(&hidden, true, None);
    }
}

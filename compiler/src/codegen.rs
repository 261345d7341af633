use std::collections::HashSet;

use diagnostics::Diagnostic;
use memory::value::{I44_MAX, I44_MIN};
use memory::{Float, Function, Value};
use orbit_parser::ast::{BinaryOp, Expr, Program, Span, Stmt, UnaryOp};
use vm::opcode::instruction::{encode_abc, encode_abx, patch_bx};
use vm::opcode::Opcode;
use vm::CompiledUnit;

use crate::error::CompileError;
use crate::interner::Interner;

const MAX_REGISTERS: u16 = 256;

/// Single-pass code generator. Registers are stack-allocated per
/// statement: locals pin the low registers, expression temporaries grow
/// above them and are released at each statement boundary.
pub(crate) struct CodeGen {
    file_id: u32,
    interner: Interner,
    protos: Vec<Function>,
    warnings: Vec<Diagnostic>,
    defined_globals: HashSet<String>,
}

struct FuncState {
    name: Option<String>,
    arity: u8,
    chunk: Vec<u32>,
    constants: Vec<Value>,
    locals: Vec<String>,
    next_reg: u16,
    max_slots: u16,
    /// The entry prototype: `var` declares globals here, and it is the
    /// only place `func` declarations are legal.
    is_main: bool,
}

impl FuncState {
    fn new(name: Option<String>, params: &[String], is_main: bool) -> Self {
        let mut state = FuncState {
            name,
            arity: params.len() as u8,
            chunk: Vec::new(),
            constants: Vec::new(),
            locals: params.to_vec(),
            next_reg: params.len() as u16,
            max_slots: params.len() as u16,
            is_main,
        };
        state.max_slots = state.next_reg;
        state
    }

    fn alloc_temp(&mut self, span: Span) -> Result<u8, CompileError> {
        if self.next_reg >= MAX_REGISTERS {
            return Err(CompileError::semantic(
                "function too complex: out of registers",
                span.line,
                span.col,
            ));
        }
        let reg = self.next_reg as u8;
        self.next_reg += 1;
        if self.next_reg > self.max_slots {
            self.max_slots = self.next_reg;
        }
        Ok(reg)
    }

    fn local_reg(&self, name: &str) -> Option<u8> {
        self.locals.iter().position(|l| l == name).map(|i| i as u8)
    }

    fn free_to(&mut self, mark: u16) {
        self.next_reg = mark;
    }

    fn emit(&mut self, word: u32) -> usize {
        self.chunk.push(word);
        self.chunk.len() - 1
    }

    fn here(&self, span: Span) -> Result<u16, CompileError> {
        if self.chunk.len() > u16::MAX as usize {
            return Err(CompileError::semantic(
                "function too long",
                span.line,
                span.col,
            ));
        }
        Ok(self.chunk.len() as u16)
    }

    fn patch(&mut self, index: usize, target: u16) {
        self.chunk[index] = patch_bx(self.chunk[index], target);
    }

    fn add_constant(&mut self, value: Value, span: Span) -> Result<u16, CompileError> {
        if let Some(index) = self.constants.iter().position(|c| *c == value) {
            return Ok(index as u16);
        }
        if self.constants.len() > u16::MAX as usize {
            return Err(CompileError::semantic(
                "too many constants in function",
                span.line,
                span.col,
            ));
        }
        self.constants.push(value);
        Ok((self.constants.len() - 1) as u16)
    }

    fn finish(self) -> Function {
        Function::bytecode(
            self.name,
            self.arity,
            self.max_slots,
            self.chunk,
            self.constants,
        )
    }
}

impl CodeGen {
    pub(crate) fn new(file_id: u32) -> Self {
        CodeGen {
            file_id,
            interner: Interner::new(),
            protos: Vec::new(),
            warnings: Vec::new(),
            defined_globals: HashSet::new(),
        }
    }

    pub(crate) fn compile_program(mut self, program: &Program) -> Result<CompiledUnit, CompileError> {
        let mut main = FuncState::new(Some("main".to_string()), &[], true);
        for stmt in &program.stmts {
            self.stmt(&mut main, stmt)?;
        }
        main.emit(encode_abc(Opcode::Return, 0, 0, 0));

        self.protos.push(main.finish());
        let main_index = (self.protos.len() - 1) as u32;
        Ok(CompiledUnit {
            strings: self.interner.into_strings(),
            protos: self.protos,
            main: main_index,
            warnings: self.warnings,
        })
    }

    // --- Statements ---

    fn stmt(&mut self, fs: &mut FuncState, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Var { name, init, span } => self.var_stmt(fs, name, init.as_ref(), *span),
            Stmt::Func {
                name,
                params,
                body,
                span,
            } => self.func_stmt(fs, name, params, body, *span),
            Stmt::If {
                cond,
                then_body,
                else_body,
                span,
            } => self.if_stmt(fs, cond, then_body, else_body.as_deref(), *span),
            Stmt::While { cond, body, span } => self.while_stmt(fs, cond, body, *span),
            Stmt::Return { value, span } => self.return_stmt(fs, value.as_ref(), *span),
            Stmt::Assign { name, value, span } => self.assign_stmt(fs, name, value, *span),
            Stmt::AssignMember {
                object,
                member,
                value,
                span,
            } => self.assign_member_stmt(fs, object, member, value, *span),
            Stmt::Expr { expr, span } => {
                let mark = fs.next_reg;
                let reg = fs.alloc_temp(*span)?;
                self.expr(fs, expr, reg)?;
                fs.free_to(mark);
                Ok(())
            }
        }
    }

    fn var_stmt(
        &mut self,
        fs: &mut FuncState,
        name: &str,
        init: Option<&Expr>,
        span: Span,
    ) -> Result<(), CompileError> {
        if fs.is_main {
            let mark = fs.next_reg;
            let reg = fs.alloc_temp(span)?;
            match init {
                Some(expr) => self.expr(fs, expr, reg)?,
                None => {
                    fs.emit(encode_abc(Opcode::LoadNull, reg, 0, 0));
                }
            }
            let name_const = self.name_constant(fs, name, span)?;
            fs.emit(encode_abx(Opcode::DefGlobal, reg, name_const));
            fs.free_to(mark);
            self.note_global(name, span);
            Ok(())
        } else {
            if fs.local_reg(name).is_some() {
                return Err(CompileError::semantic(
                    format!("duplicate variable '{}'", name),
                    span.line,
                    span.col,
                ));
            }
            let mark = fs.next_reg;
            let reg = fs.alloc_temp(span)?;
            match init {
                Some(expr) => self.expr(fs, expr, reg)?,
                None => {
                    fs.emit(encode_abc(Opcode::LoadNull, reg, 0, 0));
                }
            }
            // The name becomes visible only after its initializer has
            // run, so the initializer resolves it as a global rather
            // than reading the local's uninitialized register.
            fs.locals.push(name.to_string());
            fs.free_to(mark + 1);
            Ok(())
        }
    }

    fn func_stmt(
        &mut self,
        fs: &mut FuncState,
        name: &str,
        params: &[String],
        body: &[Stmt],
        span: Span,
    ) -> Result<(), CompileError> {
        if !fs.is_main {
            return Err(CompileError::semantic(
                "nested function declarations are not supported",
                span.line,
                span.col,
            ));
        }
        if params.len() > u8::MAX as usize {
            return Err(CompileError::semantic(
                "too many parameters",
                span.line,
                span.col,
            ));
        }

        let mut inner = FuncState::new(Some(name.to_string()), params, false);
        for stmt in body {
            self.stmt(&mut inner, stmt)?;
        }
        inner.emit(encode_abc(Opcode::Return, 0, 0, 0));
        self.protos.push(inner.finish());

        let proto_index = self.protos.len() - 1;
        if proto_index > u16::MAX as usize {
            return Err(CompileError::semantic(
                "too many functions",
                span.line,
                span.col,
            ));
        }

        let mark = fs.next_reg;
        let reg = fs.alloc_temp(span)?;
        fs.emit(encode_abx(Opcode::Closure, reg, proto_index as u16));
        let name_const = self.name_constant(fs, name, span)?;
        fs.emit(encode_abx(Opcode::DefGlobal, reg, name_const));
        fs.free_to(mark);
        self.note_global(name, span);
        Ok(())
    }

    fn if_stmt(
        &mut self,
        fs: &mut FuncState,
        cond: &Expr,
        then_body: &[Stmt],
        else_body: Option<&[Stmt]>,
        span: Span,
    ) -> Result<(), CompileError> {
        let mark = fs.next_reg;
        let cond_reg = fs.alloc_temp(span)?;
        self.expr(fs, cond, cond_reg)?;
        let skip_then = fs.emit(encode_abx(Opcode::JumpIfFalse, cond_reg, 0));
        fs.free_to(mark);

        for stmt in then_body {
            self.stmt(fs, stmt)?;
        }

        match else_body {
            Some(else_body) => {
                let skip_else = fs.emit(encode_abx(Opcode::Jump, 0, 0));
                let else_start = fs.here(span)?;
                fs.patch(skip_then, else_start);
                for stmt in else_body {
                    self.stmt(fs, stmt)?;
                }
                let end = fs.here(span)?;
                fs.patch(skip_else, end);
            }
            None => {
                let end = fs.here(span)?;
                fs.patch(skip_then, end);
            }
        }
        Ok(())
    }

    fn while_stmt(
        &mut self,
        fs: &mut FuncState,
        cond: &Expr,
        body: &[Stmt],
        span: Span,
    ) -> Result<(), CompileError> {
        let loop_start = fs.here(span)?;
        let mark = fs.next_reg;
        let cond_reg = fs.alloc_temp(span)?;
        self.expr(fs, cond, cond_reg)?;
        let exit = fs.emit(encode_abx(Opcode::JumpIfFalse, cond_reg, 0));
        fs.free_to(mark);

        for stmt in body {
            self.stmt(fs, stmt)?;
        }
        fs.emit(encode_abx(Opcode::Jump, 0, loop_start));
        let end = fs.here(span)?;
        fs.patch(exit, end);
        Ok(())
    }

    fn return_stmt(
        &mut self,
        fs: &mut FuncState,
        value: Option<&Expr>,
        span: Span,
    ) -> Result<(), CompileError> {
        match value {
            Some(expr) => {
                let mark = fs.next_reg;
                let reg = fs.alloc_temp(span)?;
                self.expr(fs, expr, reg)?;
                fs.emit(encode_abc(Opcode::Return, reg, 1, 0));
                fs.free_to(mark);
            }
            None => {
                fs.emit(encode_abc(Opcode::Return, 0, 0, 0));
            }
        }
        Ok(())
    }

    fn assign_stmt(
        &mut self,
        fs: &mut FuncState,
        name: &str,
        value: &Expr,
        span: Span,
    ) -> Result<(), CompileError> {
        // The value is built in a fresh temporary either way: writing it
        // straight into a local's register would clobber the local while
        // the right-hand side still reads it.
        if let Some(reg) = fs.local_reg(name) {
            let mark = fs.next_reg;
            let tmp = fs.alloc_temp(span)?;
            self.expr(fs, value, tmp)?;
            fs.emit(encode_abc(Opcode::Move, reg, tmp, 0));
            fs.free_to(mark);
            return Ok(());
        }
        let mark = fs.next_reg;
        let reg = fs.alloc_temp(span)?;
        self.expr(fs, value, reg)?;
        let name_const = self.name_constant(fs, name, span)?;
        fs.emit(encode_abx(Opcode::SetGlobal, reg, name_const));
        fs.free_to(mark);
        Ok(())
    }

    fn assign_member_stmt(
        &mut self,
        fs: &mut FuncState,
        object: &Expr,
        member: &str,
        value: &Expr,
        span: Span,
    ) -> Result<(), CompileError> {
        let mark = fs.next_reg;
        let obj_reg = fs.alloc_temp(span)?;
        self.expr(fs, object, obj_reg)?;
        let value_reg = fs.alloc_temp(span)?;
        self.expr(fs, value, value_reg)?;
        let name_const = self.member_name_constant(fs, member, span)?;
        fs.emit(encode_abc(Opcode::SetMember, obj_reg, name_const, value_reg));
        fs.free_to(mark);
        Ok(())
    }

    // --- Expressions ---

    fn expr(&mut self, fs: &mut FuncState, expr: &Expr, dest: u8) -> Result<(), CompileError> {
        match expr {
            Expr::Int { value, span } => {
                let index = fs.add_constant(int_value(*value), *span)?;
                fs.emit(encode_abx(Opcode::LoadConst, dest, index));
                Ok(())
            }
            Expr::Float { value, span } => {
                let index = fs.add_constant(Value::float(*value as Float), *span)?;
                fs.emit(encode_abx(Opcode::LoadConst, dest, index));
                Ok(())
            }
            Expr::Str { value, span } => {
                let handle = self.interner.intern(value);
                let index = fs.add_constant(Value::string(handle), *span)?;
                fs.emit(encode_abx(Opcode::LoadConst, dest, index));
                Ok(())
            }
            Expr::Bool { value, .. } => {
                let op = if *value {
                    Opcode::LoadTrue
                } else {
                    Opcode::LoadFalse
                };
                fs.emit(encode_abc(op, dest, 0, 0));
                Ok(())
            }
            Expr::Null { .. } => {
                fs.emit(encode_abc(Opcode::LoadNull, dest, 0, 0));
                Ok(())
            }
            Expr::Ident { name, span } => {
                if let Some(reg) = fs.local_reg(name) {
                    if reg != dest {
                        fs.emit(encode_abc(Opcode::Move, dest, reg, 0));
                    }
                    return Ok(());
                }
                let name_const = self.name_constant(fs, name, *span)?;
                fs.emit(encode_abx(Opcode::GetGlobal, dest, name_const));
                Ok(())
            }
            Expr::Unary { op, operand, .. } => {
                self.expr(fs, operand, dest)?;
                let opcode = match op {
                    UnaryOp::Neg => Opcode::Neg,
                    UnaryOp::Not => Opcode::Not,
                };
                fs.emit(encode_abc(opcode, dest, dest, 0));
                Ok(())
            }
            Expr::Binary { op, lhs, rhs, span } => self.binary(fs, *op, lhs, rhs, *span, dest),
            Expr::Call { callee, args, span } => self.call(fs, callee, args, *span, dest),
            Expr::Member { object, member, span } => {
                self.expr(fs, object, dest)?;
                let name_const = self.member_name_constant(fs, member, *span)?;
                fs.emit(encode_abc(Opcode::GetMember, dest, dest, name_const));
                Ok(())
            }
        }
    }

    fn binary(
        &mut self,
        fs: &mut FuncState,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        span: Span,
        dest: u8,
    ) -> Result<(), CompileError> {
        // Short-circuit forms leave the deciding value in `dest`.
        if op == BinaryOp::And || op == BinaryOp::Or {
            self.expr(fs, lhs, dest)?;
            let jump_op = if op == BinaryOp::And {
                Opcode::JumpIfFalse
            } else {
                Opcode::JumpIfTrue
            };
            let skip = fs.emit(encode_abx(jump_op, dest, 0));
            self.expr(fs, rhs, dest)?;
            let end = fs.here(span)?;
            fs.patch(skip, end);
            return Ok(());
        }

        self.expr(fs, lhs, dest)?;
        let mark = fs.next_reg;
        let rhs_reg = fs.alloc_temp(span)?;
        self.expr(fs, rhs, rhs_reg)?;
        let opcode = match op {
            BinaryOp::Add => Opcode::Add,
            BinaryOp::Sub => Opcode::Sub,
            BinaryOp::Mul => Opcode::Mul,
            BinaryOp::Div => Opcode::Div,
            BinaryOp::Mod => Opcode::Mod,
            BinaryOp::Eq => Opcode::Eq,
            BinaryOp::Ne => Opcode::Ne,
            BinaryOp::Lt => Opcode::Lt,
            BinaryOp::Le => Opcode::Le,
            BinaryOp::Gt => Opcode::Gt,
            BinaryOp::Ge => Opcode::Ge,
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        };
        fs.emit(encode_abc(opcode, dest, dest, rhs_reg));
        fs.free_to(mark);
        Ok(())
    }

    /// Call window: callee, receiver, then the arguments, contiguously at
    /// the top of the temporaries. A method call evaluates the object
    /// once, into the receiver slot; a plain call gets a null receiver.
    fn call(
        &mut self,
        fs: &mut FuncState,
        callee: &Expr,
        args: &[Expr],
        span: Span,
        dest: u8,
    ) -> Result<(), CompileError> {
        if args.len() > u8::MAX as usize {
            return Err(CompileError::semantic(
                "too many arguments",
                span.line,
                span.col,
            ));
        }

        let mark = fs.next_reg;
        let callee_reg = fs.alloc_temp(span)?;
        let recv_reg = fs.alloc_temp(span)?;

        match callee {
            Expr::Member { object, member, span: member_span } => {
                self.expr(fs, object, recv_reg)?;
                let name_const = self.member_name_constant(fs, member, *member_span)?;
                fs.emit(encode_abc(Opcode::GetMember, callee_reg, recv_reg, name_const));
            }
            other => {
                self.expr(fs, other, callee_reg)?;
                fs.emit(encode_abc(Opcode::LoadNull, recv_reg, 0, 0));
            }
        }

        for arg in args {
            let arg_reg = fs.alloc_temp(span)?;
            self.expr(fs, arg, arg_reg)?;
        }

        fs.emit(encode_abc(Opcode::Call, dest, callee_reg, args.len() as u8));
        fs.free_to(mark);
        Ok(())
    }

    // --- Helpers ---

    fn name_constant(
        &mut self,
        fs: &mut FuncState,
        name: &str,
        span: Span,
    ) -> Result<u16, CompileError> {
        let handle = self.interner.intern(name);
        fs.add_constant(Value::string(handle), span)
    }

    /// Member names ride in an 8-bit operand, so they must land in the
    /// low part of the constant pool.
    fn member_name_constant(
        &mut self,
        fs: &mut FuncState,
        name: &str,
        span: Span,
    ) -> Result<u8, CompileError> {
        let index = self.name_constant(fs, name, span)?;
        if index > u8::MAX as u16 {
            return Err(CompileError::semantic(
                "too many constants in function",
                span.line,
                span.col,
            ));
        }
        Ok(index as u8)
    }

    fn note_global(&mut self, name: &str, span: Span) {
        if !self.defined_globals.insert(name.to_string()) {
            self.warnings.push(Diagnostic::warning(
                format!("redefinition of global '{}'", name),
                self.file_id,
                span.line,
                span.col,
            ));
        }
    }
}

/// Integer literals keep the inline representation while they fit, and
/// widen to float beyond it.
fn int_value(n: i64) -> Value {
    if (I44_MIN..=I44_MAX).contains(&n) {
        Value::int(n)
    } else {
        Value::float(n as Float)
    }
}

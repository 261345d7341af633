use std::collections::HashMap;
use std::time::Instant;

use diagnostics::{ErrorSink, SharedSink};
use memory::{Float, Heap, Value};

use crate::error::RuntimeError;
use crate::loader::{self, LoadError};
use crate::machine::bind::HostRef;
use crate::machine::control::ControlFlowOps;
use crate::machine::frame::CallFrame;
use crate::machine::gc::GarbageCollector;
use crate::machine::globals::GlobalOps;
use crate::machine::member::MemberOps;
use crate::machine::stack::StackOps;
use crate::native::NativeFn;
use crate::opcode::{instruction, Opcode};
use crate::unit::CompiledUnit;

/// The virtual machine: a single fiber, a register stack, a heap, and the
/// host binding state. Single-threaded and non-reentrant; natives run
/// synchronously on the fiber.
pub struct Vm {
    pub heap: Heap,
    pub(crate) stack: Vec<Value>,
    pub(crate) frames: Vec<CallFrame>,
    pub(crate) globals: HashMap<String, Value>,
    pub(crate) natives: Vec<NativeFn>,
    /// Function handles of the adopted prototypes, in load order. Proto
    /// index in `Closure` instructions and function constants resolves
    /// through this table.
    pub(crate) prototypes: Vec<u32>,
    /// Host-owned handles in registration order; walked in reverse at
    /// teardown.
    pub(crate) host_refs: Vec<HostRef>,
    pub(crate) sink: SharedSink,
    result: Value,
    elapsed: f64,
    /// Collect on every instruction. For tests that must shake out
    /// missing roots.
    pub stress_gc: bool,
}

impl Vm {
    pub fn new(sink: SharedSink) -> Self {
        Vm {
            heap: Heap::new(),
            stack: Vec::new(),
            frames: Vec::new(),
            globals: HashMap::new(),
            natives: Vec::new(),
            prototypes: Vec::new(),
            host_refs: Vec::new(),
            sink,
            result: Value::nil(),
            elapsed: 0.0,
            stress_gc: false,
        }
    }

    /// Adopt a compiled unit. The transfer is one-time and one-directional:
    /// the unit's strings become the heap's string arena and every
    /// prototype becomes a GC-owned function object, so it must happen
    /// before any other allocation. Returns the entry closure handle.
    pub fn load_unit(&mut self, unit: CompiledUnit) -> Result<u32, LoadError> {
        debug_assert!(
            self.heap.functions.data.is_empty(),
            "unit must be adopted into an empty heap"
        );
        self.heap.import_strings(unit.strings);
        for proto in unit.protos {
            let handle = self.heap.alloc_function(proto, memory::Ownership::Gc);
            self.prototypes.push(handle);
        }
        let entry_fn = self
            .prototypes
            .get(unit.main as usize)
            .copied()
            .ok_or_else(|| LoadError::Malformed("main index out of range".to_string()))?;
        Ok(self.heap.alloc_closure(
            memory::Closure::bare(entry_fn),
            memory::Ownership::Gc,
        ))
    }

    /// Read a `.orbc` executable and adopt it.
    pub fn load_executable<R: std::io::Read>(&mut self, reader: &mut R) -> Result<u32, LoadError> {
        let unit = loader::load_executable(reader)?;
        self.load_unit(unit)
    }

    /// Run the entry closure to completion. Returns `false` when a runtime
    /// error aborted the run; the error is reported exactly once through
    /// the sink and the result is nil.
    pub fn run_main(&mut self, entry: u32) -> bool {
        let start = Instant::now();
        self.result = Value::nil();
        self.frames.clear();
        self.stack.clear();

        let outcome = self
            .push_entry_frame(entry)
            .and_then(|()| self.execute());
        self.elapsed = start.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(()) => true,
            Err(err) => {
                self.result = Value::nil();
                self.frames.clear();
                self.sink.borrow_mut().report(&err.into_diagnostic());
                false
            }
        }
    }

    /// Result of the last successful run; nil after a failed one.
    pub fn result(&self) -> Value {
        self.result
    }

    /// Wall-clock duration of the last run, in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed
    }

    fn push_entry_frame(&mut self, entry: u32) -> Result<(), RuntimeError> {
        let function = self
            .heap
            .get_closure(entry)
            .map(|c| c.function)
            .ok_or_else(|| RuntimeError::new("invalid entry closure"))?;
        let max_slots = match self.heap.get_function(function).map(|f| &f.kind) {
            Some(memory::FunctionKind::Bytecode { max_slots, .. }) => *max_slots,
            _ => return Err(RuntimeError::new("entry closure is not bytecode")),
        };
        // Slot 0 is the entry receiver (always nil); registers follow.
        self.stack.push(Value::nil());
        self.ensure_stack(1 + max_slots as usize);
        self.frames.push(CallFrame::new(entry, 1, None));
        Ok(())
    }

    // --- Dispatch ---

    pub(crate) fn execute(&mut self) -> Result<(), RuntimeError> {
        loop {
            if self.stress_gc || self.heap.should_collect() {
                self.collect_garbage();
            }

            let word = self.fetch()?;
            let op = instruction::op(word)
                .ok_or_else(|| RuntimeError::new("unknown opcode"))?;
            let a = instruction::a(word);

            match op {
                Opcode::LoadConst => {
                    let value = self.constant(instruction::bx(word))?;
                    self.set_reg(a, value)?;
                }
                Opcode::LoadTrue => self.set_reg(a, Value::bool(true))?,
                Opcode::LoadFalse => self.set_reg(a, Value::bool(false))?,
                Opcode::LoadNull => self.set_reg(a, Value::nil())?,
                Opcode::Move => {
                    let value = self.reg(instruction::b(word))?;
                    self.set_reg(a, value)?;
                }

                Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::Div
                | Opcode::Mod => {
                    self.arith(op, a, instruction::b(word), instruction::c(word))?;
                }
                Opcode::Neg => {
                    let value = self.reg(instruction::b(word))?;
                    let negated = if let Some(i) = value.as_int() {
                        int_result(-i)
                    } else if let Some(f) = value.as_float() {
                        Value::float(-f)
                    } else {
                        return Err(RuntimeError::new("operand of '-' is not a number"));
                    };
                    self.set_reg(a, negated)?;
                }

                Opcode::Eq => {
                    let (x, y) = (self.reg(instruction::b(word))?, self.reg(instruction::c(word))?);
                    let eq = self.values_equal(x, y);
                    self.set_reg(a, Value::bool(eq))?;
                }
                Opcode::Ne => {
                    let (x, y) = (self.reg(instruction::b(word))?, self.reg(instruction::c(word))?);
                    let eq = self.values_equal(x, y);
                    self.set_reg(a, Value::bool(!eq))?;
                }
                Opcode::Lt | Opcode::Le | Opcode::Gt | Opcode::Ge => {
                    let (x, y) = (self.reg(instruction::b(word))?, self.reg(instruction::c(word))?);
                    let holds = self.compare(op, x, y)?;
                    self.set_reg(a, Value::bool(holds))?;
                }
                Opcode::Not => {
                    let value = self.reg(instruction::b(word))?;
                    self.set_reg(a, Value::bool(value.is_falsey()))?;
                }

                Opcode::Return => {
                    let has_value = instruction::b(word) == 1;
                    if self.do_return(a, has_value)? {
                        return Ok(());
                    }
                }
                Opcode::Call => {
                    self.do_call(a, instruction::b(word), instruction::c(word))?;
                }
                Opcode::Closure => {
                    let proto = instruction::bx(word) as usize;
                    let function = self
                        .prototypes
                        .get(proto)
                        .copied()
                        .ok_or_else(|| RuntimeError::new("prototype index out of range"))?;
                    let closure = self
                        .heap
                        .alloc_closure(memory::Closure::bare(function), memory::Ownership::Gc);
                    self.set_reg(a, Value::closure(closure))?;
                }

                Opcode::Jump => self.jump(instruction::bx(word))?,
                Opcode::JumpIfFalse => {
                    if self.reg(a)?.is_falsey() {
                        self.jump(instruction::bx(word))?;
                    }
                }
                Opcode::JumpIfTrue => {
                    if !self.reg(a)?.is_falsey() {
                        self.jump(instruction::bx(word))?;
                    }
                }

                Opcode::DefGlobal => self.op_def_global(a, instruction::bx(word))?,
                Opcode::GetGlobal => self.op_get_global(a, instruction::bx(word))?,
                Opcode::SetGlobal => self.op_set_global(a, instruction::bx(word))?,

                Opcode::GetMember => {
                    self.op_get_member(a, instruction::b(word), instruction::c(word))?;
                }
                Opcode::SetMember => {
                    self.op_set_member(a, instruction::b(word), instruction::c(word))?;
                }

                Opcode::Nop => {}
            }
        }
    }

    fn fetch(&mut self) -> Result<u32, RuntimeError> {
        let Vm { frames, heap, .. } = self;
        let frame = frames
            .last_mut()
            .ok_or_else(|| RuntimeError::new("no active frame"))?;
        let function = heap
            .get_closure(frame.closure)
            .map(|c| c.function)
            .ok_or_else(|| RuntimeError::new("dangling closure handle"))?;
        let chunk = match heap.get_function(function).map(|f| &f.kind) {
            Some(memory::FunctionKind::Bytecode { chunk, .. }) => chunk,
            _ => return Err(RuntimeError::new("active frame is not bytecode")),
        };
        let word = chunk
            .get(frame.ip)
            .copied()
            .ok_or_else(|| RuntimeError::new("instruction pointer out of range"))?;
        frame.ip += 1;
        Ok(word)
    }

    fn jump(&mut self, target: u16) -> Result<(), RuntimeError> {
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| RuntimeError::new("no active frame"))?;
        frame.ip = target as usize;
        Ok(())
    }

    /// Constant `index` of the current frame's function.
    pub(crate) fn constant(&self, index: u16) -> Result<Value, RuntimeError> {
        let frame = self
            .frames
            .last()
            .ok_or_else(|| RuntimeError::new("no active frame"))?;
        let function = self
            .heap
            .get_closure(frame.closure)
            .map(|c| c.function)
            .ok_or_else(|| RuntimeError::new("dangling closure handle"))?;
        match self.heap.get_function(function).map(|f| &f.kind) {
            Some(memory::FunctionKind::Bytecode { constants, .. }) => constants
                .get(index as usize)
                .copied()
                .ok_or_else(|| RuntimeError::new("constant index out of range")),
            _ => Err(RuntimeError::new("active frame is not bytecode")),
        }
    }

    /// Constant `index`, required to be a string; returns its content.
    pub(crate) fn constant_string(&self, index: u16) -> Result<String, RuntimeError> {
        let value = self.constant(index)?;
        value
            .as_handle()
            .filter(|_| value.is_string())
            .and_then(|h| self.heap.get_string(h))
            .cloned()
            .ok_or_else(|| RuntimeError::new("constant is not a string"))
    }

    // --- Operators ---

    fn arith(&mut self, op: Opcode, a: u8, b: u8, c: u8) -> Result<(), RuntimeError> {
        let x = self.reg(b)?;
        let y = self.reg(c)?;

        // String concatenation rides on Add.
        if op == Opcode::Add && x.is_string() && y.is_string() {
            let joined = {
                let left = self.string_content(x)?;
                let right = self.string_content(y)?;
                format!("{}{}", left, right)
            };
            let handle = self.heap.alloc_string(joined);
            return self.set_reg(a, Value::string(handle));
        }

        let result = if let (Some(i), Some(j)) = (x.as_int(), y.as_int()) {
            match op {
                Opcode::Add => int_result(i + j),
                Opcode::Sub => int_result(i - j),
                Opcode::Mul => match i.checked_mul(j) {
                    Some(n) => int_result(n),
                    None => Value::float(i as Float * j as Float),
                },
                Opcode::Div => {
                    if j == 0 {
                        return Err(RuntimeError::new("division by zero"));
                    }
                    int_result(i / j)
                }
                Opcode::Mod => {
                    if j == 0 {
                        return Err(RuntimeError::new("modulo by zero"));
                    }
                    int_result(i % j)
                }
                _ => unreachable!("non-arithmetic opcode in arith"),
            }
        } else if let (Some(p), Some(q)) = (x.as_numeric(), y.as_numeric()) {
            let f = match op {
                Opcode::Add => p + q,
                Opcode::Sub => p - q,
                Opcode::Mul => p * q,
                Opcode::Div => p / q,
                Opcode::Mod => p % q,
                _ => unreachable!("non-arithmetic opcode in arith"),
            };
            Value::float(f)
        } else {
            return Err(RuntimeError::new(format!(
                "unsupported operands for '{}'",
                arith_symbol(op)
            )));
        };
        self.set_reg(a, result)
    }

    pub(crate) fn values_equal(&self, x: Value, y: Value) -> bool {
        if x.is_numeric() && y.is_numeric() {
            return x.as_numeric() == y.as_numeric();
        }
        if x.is_string() && y.is_string() {
            let left = x.as_handle().and_then(|h| self.heap.get_string(h));
            let right = y.as_handle().and_then(|h| self.heap.get_string(h));
            return match (left, right) {
                (Some(l), Some(r)) => l == r,
                _ => false,
            };
        }
        x == y
    }

    fn compare(&self, op: Opcode, x: Value, y: Value) -> Result<bool, RuntimeError> {
        if let (Some(p), Some(q)) = (x.as_numeric(), y.as_numeric()) {
            let holds = match op {
                Opcode::Lt => p < q,
                Opcode::Le => p <= q,
                Opcode::Gt => p > q,
                Opcode::Ge => p >= q,
                _ => unreachable!("non-comparison opcode in compare"),
            };
            return Ok(holds);
        }
        if x.is_string() && y.is_string() {
            let left = self.string_content(x)?;
            let right = self.string_content(y)?;
            let holds = match op {
                Opcode::Lt => left < right,
                Opcode::Le => left <= right,
                Opcode::Gt => left > right,
                Opcode::Ge => left >= right,
                _ => unreachable!("non-comparison opcode in compare"),
            };
            return Ok(holds);
        }
        Err(RuntimeError::new(
            "comparison requires two numbers or two strings",
        ))
    }

    pub(crate) fn string_content(&self, value: Value) -> Result<&String, RuntimeError> {
        value
            .as_handle()
            .filter(|_| value.is_string())
            .and_then(|h| self.heap.get_string(h))
            .ok_or_else(|| RuntimeError::new("dangling string handle"))
    }

    /// Human-readable rendition of a value, for the host's output.
    pub fn render_value(&self, value: Value) -> String {
        if value.is_nil() {
            return "null".to_string();
        }
        if let Some(b) = value.as_bool() {
            return b.to_string();
        }
        if let Some(i) = value.as_int() {
            return i.to_string();
        }
        if let Some(f) = value.as_float() {
            return f.to_string();
        }
        match value.as_handle() {
            Some(h) if value.is_string() => self
                .heap
                .get_string(h)
                .cloned()
                .unwrap_or_else(|| "<string>".to_string()),
            Some(h) if value.is_closure() => {
                let name = self
                    .heap
                    .get_closure(h)
                    .and_then(|c| self.heap.get_function(c.function))
                    .and_then(|f| f.name.clone());
                match name {
                    Some(name) => format!("<func {}>", name),
                    None => "<func>".to_string(),
                }
            }
            Some(h) if value.is_class() => match self.heap.get_class(h) {
                Some(class) => format!("<class {}>", class.name),
                None => "<class>".to_string(),
            },
            Some(h) if value.is_instance() => {
                let name = self
                    .heap
                    .get_instance(h)
                    .and_then(|i| self.heap.get_class(i.class))
                    .map(|c| c.name.clone());
                match name {
                    Some(name) => format!("<{} instance>", name),
                    None => "<instance>".to_string(),
                }
            }
            _ => "<object>".to_string(),
        }
    }

    pub(crate) fn set_result(&mut self, value: Value) {
        self.result = value;
    }
}

/// Integer op result: stays an int while it fits the inline range,
/// otherwise widens to float.
pub(crate) fn int_result(n: i64) -> Value {
    if (memory::value::I44_MIN..=memory::value::I44_MAX).contains(&n) {
        Value::int(n)
    } else {
        Value::float(n as Float)
    }
}

fn arith_symbol(op: Opcode) -> &'static str {
    match op {
        Opcode::Add => "+",
        Opcode::Sub => "-",
        Opcode::Mul => "*",
        Opcode::Div => "/",
        Opcode::Mod => "%",
        _ => "?",
    }
}

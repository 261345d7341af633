use memory::{Instance, Value, VARIADIC};

use crate::error::RuntimeError;
use crate::machine::frame::CallFrame;
use crate::machine::member::MemberOps;
use crate::machine::stack::StackOps;
use crate::machine::Vm;
use crate::native::Slots;

const MAX_FRAMES: usize = 1024;

/// Flattened view of a callee's kind, copied out so the heap borrow drops
/// before the frame and stack mutate.
enum Callable {
    Bytecode { arity: u8, max_slots: u16 },
    Native { native: u32, arity: memory::Arity },
    Computed,
}

/// Call and return paths. The call window convention: the callee sits in
/// register B, the receiver in B+1, and C arguments follow contiguously.
/// A bytecode callee's frame base is the slot after the receiver, so its
/// parameters are its first registers and the receiver is at `base - 1`.
pub trait ControlFlowOps {
    fn do_call(&mut self, a: u8, b: u8, c: u8) -> Result<(), RuntimeError>;
    fn do_return(&mut self, a: u8, has_value: bool) -> Result<bool, RuntimeError>;
    fn invoke(
        &mut self,
        dest: Option<u8>,
        closure: u32,
        recv_index: usize,
        argc: usize,
    ) -> Result<(), RuntimeError>;
    fn call_native(
        &mut self,
        dest: Option<u8>,
        native: u32,
        window: Vec<Value>,
    ) -> Result<(), RuntimeError>;
}

impl ControlFlowOps for Vm {
    fn do_call(&mut self, a: u8, b: u8, c: u8) -> Result<(), RuntimeError> {
        let base = self.frame_base()?;
        let callee = self.reg(b)?;
        let recv_index = base + b as usize + 1;
        let argc = c as usize;

        if callee.is_closure() {
            let handle = obj_handle(callee)?;
            return self.invoke(Some(a), handle, recv_index, argc);
        }
        if callee.is_class() {
            let handle = obj_handle(callee)?;
            return self.instantiate(a, handle, recv_index, argc);
        }
        Err(RuntimeError::new("value is not callable"))
    }

    fn do_return(&mut self, a: u8, has_value: bool) -> Result<bool, RuntimeError> {
        let value = if has_value { self.reg(a)? } else { Value::nil() };
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| RuntimeError::new("no active frame"))?;

        if self.frames.is_empty() {
            self.set_result(value);
            return Ok(true);
        }

        // Release everything above the caller's register window.
        if let Some(top) = self.caller_top() {
            if self.stack.len() > top {
                self.stack.truncate(top);
            }
        }

        if let Some(dest) = frame.dest_reg {
            self.set_reg(dest, value)?;
        }
        Ok(false)
    }

    fn invoke(
        &mut self,
        dest: Option<u8>,
        closure: u32,
        recv_index: usize,
        argc: usize,
    ) -> Result<(), RuntimeError> {
        let function = self
            .heap
            .get_closure(closure)
            .map(|c| c.function)
            .ok_or_else(|| RuntimeError::new("dangling closure handle"))?;
        let (name, kind) = {
            let func = self
                .heap
                .get_function(function)
                .ok_or_else(|| RuntimeError::new("dangling function handle"))?;
            let name = func.name.clone().unwrap_or_else(|| "anonymous".to_string());
            let kind = match func.kind {
                memory::FunctionKind::Bytecode {
                    arity, max_slots, ..
                } => Callable::Bytecode { arity, max_slots },
                memory::FunctionKind::Native { native, arity } => {
                    Callable::Native { native, arity }
                }
                memory::FunctionKind::Computed { .. } => Callable::Computed,
            };
            (name, kind)
        };

        match kind {
            Callable::Bytecode { arity, max_slots } => {
                if argc != arity as usize {
                    return Err(RuntimeError::new(format!(
                        "'{}' expected {} arguments, got {}",
                        name, arity, argc
                    )));
                }
                if self.frames.len() >= MAX_FRAMES {
                    return Err(RuntimeError::new("call stack overflow"));
                }
                let base = recv_index + 1;
                self.ensure_stack(base + max_slots as usize);
                self.frames.push(CallFrame::new(closure, base, dest));
                Ok(())
            }
            Callable::Native { native, arity } => {
                if arity != VARIADIC && argc != arity as usize {
                    return Err(RuntimeError::new(format!(
                        "'{}' expected {} arguments, got {}",
                        name, arity, argc
                    )));
                }
                let window = self.window(recv_index, argc)?;
                self.call_native(dest, native, window)
            }
            Callable::Computed => {
                Err(RuntimeError::new("computed property is not callable"))
            }
        }
    }

    fn call_native(
        &mut self,
        dest: Option<u8>,
        native: u32,
        window: Vec<Value>,
    ) -> Result<(), RuntimeError> {
        let f = self
            .natives
            .get(native as usize)
            .copied()
            .ok_or_else(|| RuntimeError::new("unregistered native function"))?;

        let mut result = Value::nil();
        {
            let mut slots = Slots::new(&window, &mut result);
            f(self, &mut slots)?;
        }
        if let Some(dest) = dest {
            self.set_reg(dest, result)?;
        }
        Ok(())
    }
}

impl Vm {
    /// Call on a class value: allocate an instance, then run its `init`
    /// member as the constructor when one is bound. The constructor frame
    /// has no destination register, so nothing it returns can clobber the
    /// freshly stored instance.
    fn instantiate(
        &mut self,
        dest: u8,
        class: u32,
        recv_index: usize,
        argc: usize,
    ) -> Result<(), RuntimeError> {
        let instance = self.heap.alloc_instance(Instance::new(class));
        let value = Value::instance(instance);
        self.set_reg(dest, value)?;

        // The constructor's receiver is the new instance, not the class.
        match self.stack.get_mut(recv_index) {
            Some(slot) => *slot = value,
            None => return Err(RuntimeError::new("call window out of range")),
        }

        match self.member_in_chain(class, "init") {
            Some(init) if init.is_closure() => {
                let handle = obj_handle(init)?;
                self.invoke(None, handle, recv_index, argc)
            }
            Some(_) => Err(RuntimeError::new("'init' member is not callable")),
            None if argc > 0 => {
                let name = self
                    .heap
                    .get_class(class)
                    .map(|c| c.name.clone())
                    .unwrap_or_default();
                Err(RuntimeError::new(format!(
                    "class '{}' takes no constructor arguments",
                    name
                )))
            }
            None => Ok(()),
        }
    }

    /// Copy of the receiver-plus-arguments window starting at `recv_index`.
    pub(crate) fn window(
        &self,
        recv_index: usize,
        argc: usize,
    ) -> Result<Vec<Value>, RuntimeError> {
        self.stack
            .get(recv_index..=recv_index + argc)
            .map(|slice| slice.to_vec())
            .ok_or_else(|| RuntimeError::new("call window out of range"))
    }

    /// Absolute stack index just past the current frame's register window.
    fn caller_top(&self) -> Option<usize> {
        let frame = self.frames.last()?;
        let function = self.heap.get_closure(frame.closure)?.function;
        match self.heap.get_function(function)?.kind {
            memory::FunctionKind::Bytecode { max_slots, .. } => {
                Some(frame.base + max_slots as usize)
            }
            _ => None,
        }
    }
}

pub(crate) fn obj_handle(value: Value) -> Result<u32, RuntimeError> {
    value
        .as_handle()
        .ok_or_else(|| RuntimeError::new("value is not a heap object"))
}

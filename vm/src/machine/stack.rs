use memory::Value;

use crate::error::RuntimeError;
use crate::machine::Vm;

/// Register-file access for the current frame. Every access is checked;
/// a bad register index means corrupt bytecode, reported as a runtime
/// error rather than a panic.
pub trait StackOps {
    fn frame_base(&self) -> Result<usize, RuntimeError>;
    fn reg(&self, r: u8) -> Result<Value, RuntimeError>;
    fn set_reg(&mut self, r: u8, value: Value) -> Result<(), RuntimeError>;
    fn ensure_stack(&mut self, top: usize);
}

impl StackOps for Vm {
    fn frame_base(&self) -> Result<usize, RuntimeError> {
        self.frames
            .last()
            .map(|f| f.base)
            .ok_or_else(|| RuntimeError::new("no active frame"))
    }

    fn reg(&self, r: u8) -> Result<Value, RuntimeError> {
        let index = self.frame_base()? + r as usize;
        self.stack
            .get(index)
            .copied()
            .ok_or_else(|| RuntimeError::new(format!("register {} out of range", r)))
    }

    fn set_reg(&mut self, r: u8, value: Value) -> Result<(), RuntimeError> {
        let index = self.frame_base()? + r as usize;
        match self.stack.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(RuntimeError::new(format!("register {} out of range", r))),
        }
    }

    fn ensure_stack(&mut self, top: usize) {
        if self.stack.len() < top {
            self.stack.resize(top, Value::nil());
        }
    }
}

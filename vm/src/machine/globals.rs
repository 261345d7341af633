use crate::error::RuntimeError;
use crate::machine::stack::StackOps;
use crate::machine::Vm;

/// Global variable instructions. Globals live in a name-keyed table;
/// `DefGlobal` installs unconditionally (the compiler warns on top-level
/// redefinition), while `SetGlobal` requires the name to exist.
pub trait GlobalOps {
    fn op_def_global(&mut self, a: u8, bx: u16) -> Result<(), RuntimeError>;
    fn op_get_global(&mut self, a: u8, bx: u16) -> Result<(), RuntimeError>;
    fn op_set_global(&mut self, a: u8, bx: u16) -> Result<(), RuntimeError>;
}

impl GlobalOps for Vm {
    fn op_def_global(&mut self, a: u8, bx: u16) -> Result<(), RuntimeError> {
        let name = self.constant_string(bx)?;
        let value = self.reg(a)?;
        self.globals.insert(name, value);
        Ok(())
    }

    fn op_get_global(&mut self, a: u8, bx: u16) -> Result<(), RuntimeError> {
        let name = self.constant_string(bx)?;
        match self.globals.get(&name).copied() {
            Some(value) => self.set_reg(a, value),
            None => Err(undefined_global(&name)),
        }
    }

    fn op_set_global(&mut self, a: u8, bx: u16) -> Result<(), RuntimeError> {
        let name = self.constant_string(bx)?;
        let value = self.reg(a)?;
        match self.globals.get_mut(&name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(undefined_global(&name)),
        }
    }
}

fn undefined_global(name: &str) -> RuntimeError {
    RuntimeError::new(format!("undefined global '{}'", name))
}

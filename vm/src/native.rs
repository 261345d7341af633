//! Native calling convention.
//!
//! A native receives the machine and a [`Slots`] view of its call window.
//! Slot 0 is the receiver and slots `1..=nargs` are the arguments; every
//! access is bounds-checked and returns `Err` past the window rather than
//! unspecified data. The only way a native produces a value is
//! [`Slots::set_result`]; returning `Err` aborts the run with a RUNTIME
//! diagnostic and discards the result cell.

use memory::{Float, Value};

use crate::error::RuntimeError;
use crate::machine::Vm;

/// Host function callable from script code.
pub type NativeFn = fn(&mut Vm, &mut Slots) -> Result<(), RuntimeError>;

/// Bounds-checked view over one call's slot window. Borrows the frame it
/// was built for and cannot outlive it.
pub struct Slots<'a> {
    values: &'a [Value],
    result: &'a mut Value,
}

impl<'a> Slots<'a> {
    /// `values[0]` is the receiver; the rest are the arguments in order.
    pub fn new(values: &'a [Value], result: &'a mut Value) -> Self {
        debug_assert!(!values.is_empty(), "slot window always holds a receiver");
        Slots { values, result }
    }

    /// Number of arguments, excluding the receiver.
    pub fn nargs(&self) -> usize {
        self.values.len() - 1
    }

    /// Slot `i` of the window: 0 is the receiver, 1 the first argument.
    pub fn arg(&self, i: usize) -> Result<Value, RuntimeError> {
        self.values.get(i).copied().ok_or_else(|| {
            RuntimeError::new(format!(
                "slot {} out of range ({} arguments supplied)",
                i,
                self.nargs()
            ))
        })
    }

    pub fn receiver(&self) -> Value {
        self.values[0]
    }

    /// Slot `i` as a float, accepting ints by widening.
    pub fn float_arg(&self, i: usize) -> Result<Float, RuntimeError> {
        self.arg(i)?
            .as_numeric()
            .ok_or_else(|| RuntimeError::new(format!("slot {}: expected a number", i)))
    }

    pub fn int_arg(&self, i: usize) -> Result<i64, RuntimeError> {
        self.arg(i)?
            .as_int()
            .ok_or_else(|| RuntimeError::new(format!("slot {}: expected an int", i)))
    }

    pub fn set_result(&mut self, value: Value) {
        *self.result = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_past_the_window_is_an_error() {
        let window = [Value::nil(), Value::int(1)];
        let mut result = Value::nil();
        let slots = Slots::new(&window, &mut result);
        assert_eq!(slots.nargs(), 1);
        assert!(slots.arg(1).is_ok());
        assert!(slots.arg(2).is_err());
    }

    #[test]
    fn float_arg_widens_ints() {
        let window = [Value::nil(), Value::int(3), Value::float(2.5)];
        let mut result = Value::nil();
        let slots = Slots::new(&window, &mut result);
        assert_eq!(slots.float_arg(1).unwrap(), 3.0);
        assert_eq!(slots.float_arg(2).unwrap(), 2.5);
    }

    #[test]
    fn typed_accessors_reject_wrong_tags() {
        let window = [Value::nil(), Value::bool(true)];
        let mut result = Value::nil();
        let slots = Slots::new(&window, &mut result);
        assert!(slots.float_arg(1).is_err());
        assert!(slots.int_arg(1).is_err());
    }

    #[test]
    fn set_result_writes_the_cell() {
        let window = [Value::nil()];
        let mut result = Value::nil();
        {
            let mut slots = Slots::new(&window, &mut result);
            slots.set_result(Value::int(42));
        }
        assert_eq!(result.as_int(), Some(42));
    }
}

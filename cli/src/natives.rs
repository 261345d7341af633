//! The host-registered `CMath` class: class-level methods `log` and
//! `pow`, and the read-only computed property `pi`. Everything is built
//! through the public binding layer and pinned as host-owned; the driver
//! releases it at teardown.

use memory::{Float, Ownership, Value};
use vm::{RuntimeError, Slots, Vm};

pub const PI: Float = 3.141593;

fn math_log(_vm: &mut Vm, slots: &mut Slots) -> Result<(), RuntimeError> {
    let n = slots.float_arg(1)?;
    slots.set_result(Value::float(n.ln()));
    Ok(())
}

fn math_pow(_vm: &mut Vm, slots: &mut Slots) -> Result<(), RuntimeError> {
    let base = slots.float_arg(1)?;
    let exp = slots.float_arg(2)?;
    slots.set_result(Value::float(base.powf(exp)));
    Ok(())
}

fn math_pi(_vm: &mut Vm, slots: &mut Slots) -> Result<(), RuntimeError> {
    slots.set_result(Value::float(PI));
    Ok(())
}

/// Build and register `CMath`. Returns the class handle.
pub fn register_cmath(vm: &mut Vm) -> u32 {
    let class = vm.new_class_pair("CMath", None, Ownership::Host);
    let meta = match vm.heap.meta_of(class) {
        Some(meta) => meta,
        None => return class,
    };

    let log_fn = vm.native_function("log", 1, math_log, Ownership::Host);
    let log = vm.closure(log_fn, Ownership::Host);
    vm.heap.bind_member(meta, "log", Value::closure(log));

    let pow_fn = vm.native_function("pow", 2, math_pow, Ownership::Host);
    let pow = vm.closure(pow_fn, Ownership::Host);
    vm.heap.bind_member(meta, "pow", Value::closure(pow));

    let pi_fn = vm.native_function("pi", 0, math_pi, Ownership::Host);
    let pi_getter = vm.closure(pi_fn, Ownership::Host);
    let pi = vm.computed_property(pi_getter, None, Ownership::Host);
    vm.heap.bind_member(meta, "pi", Value::closure(pi));

    vm.set_global("CMath", Value::class(class));
    class
}

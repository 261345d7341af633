use memory::{FunctionKind, Value};

use crate::error::RuntimeError;
use crate::machine::control::{obj_handle, ControlFlowOps};
use crate::machine::stack::StackOps;
use crate::machine::Vm;

/// Member access and assignment, including computed-property dispatch.
///
/// Reads on an instance check its fields first, then the class chain;
/// reads on a class resolve against its meta-class, so class-level
/// members never collide with instance members of the same name. A
/// member that resolves to a computed-property closure is never handed
/// to the script: the read runs its getter, the write runs its setter or
/// fails when none is bound.
pub trait MemberOps {
    fn op_get_member(&mut self, a: u8, b: u8, c: u8) -> Result<(), RuntimeError>;
    fn op_set_member(&mut self, a: u8, b: u8, c: u8) -> Result<(), RuntimeError>;
    fn member_in_chain(&self, class: u32, name: &str) -> Option<Value>;
}

impl MemberOps for Vm {
    fn op_get_member(&mut self, a: u8, b: u8, c: u8) -> Result<(), RuntimeError> {
        let name = self.constant_string(c as u16)?;
        let object = self.reg(b)?;

        if object.is_instance() {
            let handle = obj_handle(object)?;
            let instance = self
                .heap
                .get_instance(handle)
                .ok_or_else(|| RuntimeError::new("dangling instance handle"))?;
            if let Some(field) = instance.fields.get(&name).copied() {
                return self.set_reg(a, field);
            }
            let class = instance.class;
            return match self.member_in_chain(class, &name) {
                Some(member) => self.member_read(a, object, member),
                None => Err(undefined_member(&name)),
            };
        }

        if object.is_class() {
            let handle = obj_handle(object)?;
            // A class resolves member reads against its meta-class; a
            // meta-class (no meta of its own) resolves against itself.
            let target = self.heap.meta_of(handle).unwrap_or(handle);
            return match self.member_in_chain(target, &name) {
                Some(member) => self.member_read(a, object, member),
                None => Err(undefined_member(&name)),
            };
        }

        Err(RuntimeError::new("value has no members"))
    }

    fn op_set_member(&mut self, a: u8, b: u8, c: u8) -> Result<(), RuntimeError> {
        let name = self.constant_string(b as u16)?;
        let object = self.reg(a)?;
        let value = self.reg(c)?;

        if object.is_instance() {
            let handle = obj_handle(object)?;
            let class = self
                .heap
                .get_instance(handle)
                .map(|i| i.class)
                .ok_or_else(|| RuntimeError::new("dangling instance handle"))?;

            if let Some(member) = self.member_in_chain(class, &name) {
                if let Some((_, setter)) = self.computed_parts(member) {
                    return match setter {
                        Some(setter) => self.run_accessor(None, setter, object, Some(value)),
                        None => Err(RuntimeError::new(format!(
                            "'{}' is a read-only property",
                            name
                        ))),
                    };
                }
            }

            match self.heap.get_instance_mut(handle) {
                Some(instance) => {
                    instance.fields.insert(name, value);
                    Ok(())
                }
                None => Err(RuntimeError::new("dangling instance handle")),
            }
        } else if object.is_class() {
            let handle = obj_handle(object)?;
            let target = self.heap.meta_of(handle).unwrap_or(handle);
            if let Some(member) = self.member_in_chain(target, &name) {
                if let Some((_, setter)) = self.computed_parts(member) {
                    return match setter {
                        Some(setter) => self.run_accessor(None, setter, object, Some(value)),
                        None => Err(RuntimeError::new(format!(
                            "'{}' is a read-only property",
                            name
                        ))),
                    };
                }
            }
            // Plain class members are bound host-side only.
            Err(RuntimeError::new(format!(
                "cannot assign to member '{}' of a class",
                name
            )))
        } else {
            Err(RuntimeError::new("value has no members"))
        }
    }

    fn member_in_chain(&self, class: u32, name: &str) -> Option<Value> {
        let mut current = Some(class);
        while let Some(handle) = current {
            let class = self.heap.get_class(handle)?;
            if let Some(member) = class.members.get(name) {
                return Some(*member);
            }
            current = class.superclass;
        }
        None
    }
}

impl Vm {
    /// Deliver a resolved member read: plain values land in the register;
    /// a computed-property closure runs its getter with the receiver as
    /// slot 0.
    fn member_read(&mut self, dest: u8, receiver: Value, member: Value) -> Result<(), RuntimeError> {
        match self.computed_parts(member) {
            Some((getter, _)) => self.run_accessor(Some(dest), getter, receiver, None),
            None => self.set_reg(dest, member),
        }
    }

    /// Getter and setter closure handles when `member` is a closure over
    /// a computed-property function.
    fn computed_parts(&self, member: Value) -> Option<(u32, Option<u32>)> {
        if !member.is_closure() {
            return None;
        }
        let closure = self.heap.get_closure(member.as_handle()?)?;
        match self.heap.get_function(closure.function)?.kind {
            FunctionKind::Computed { getter, setter } => Some((getter, setter)),
            _ => None,
        }
    }

    /// Run a getter or setter closure. Native accessors run inline on a
    /// fresh window; bytecode ones run as an ordinary frame on the fiber.
    fn run_accessor(
        &mut self,
        dest: Option<u8>,
        accessor: u32,
        receiver: Value,
        new_value: Option<Value>,
    ) -> Result<(), RuntimeError> {
        let recv_index = self.stack.len();
        self.stack.push(receiver);
        let mut argc = 0;
        if let Some(value) = new_value {
            self.stack.push(value);
            argc = 1;
        }
        let depth = self.frames.len();
        let outcome = self.invoke(dest, accessor, recv_index, argc);
        // A native accessor ran inline; drop its window now. A bytecode
        // one pushed a frame whose return path reclaims the slots.
        if self.frames.len() == depth {
            self.stack.truncate(recv_index);
        }
        outcome
    }
}

fn undefined_member(name: &str) -> RuntimeError {
    RuntimeError::new(format!("undefined member '{}'", name))
}

//! Heap object model: functions, closures, classes, and instances.

use std::collections::HashMap;

use crate::value::Value;

/// Declared argument count of a native callable; `VARIADIC` disables the
/// check.
pub type Arity = i16;
pub const VARIADIC: Arity = -1;

/// What a function executes when called.
#[derive(Debug, Clone)]
pub enum FunctionKind {
    /// Compiled bytecode plus its constant pool.
    Bytecode {
        arity: u8,
        max_slots: u16,
        chunk: Vec<u32>,
        constants: Vec<Value>,
    },
    /// Host-native code: an index into the VM's native registry. The
    /// function object itself stays free of host pointers so the object
    /// model does not depend on the machine.
    Native { native: u32, arity: Arity },
    /// Computed property: member access runs the getter closure; member
    /// assignment runs the setter, or fails when none is bound.
    Computed { getter: u32, setter: Option<u32> },
}

/// A callable unit without captured state.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: Option<String>,
    pub kind: FunctionKind,
}

impl Function {
    pub fn bytecode(
        name: Option<String>,
        arity: u8,
        max_slots: u16,
        chunk: Vec<u32>,
        constants: Vec<Value>,
    ) -> Self {
        Self {
            name,
            kind: FunctionKind::Bytecode {
                arity,
                max_slots,
                chunk,
                constants,
            },
        }
    }

    pub fn native(name: Option<String>, arity: Arity, native: u32) -> Self {
        Self {
            name,
            kind: FunctionKind::Native { native, arity },
        }
    }

    pub fn computed(getter: u32, setter: Option<u32>) -> Self {
        Self {
            name: None,
            kind: FunctionKind::Computed { getter, setter },
        }
    }
}

/// A function bound to its captured variables; the unit the VM invokes.
/// Closures over native functions always have zero captures.
#[derive(Debug, Clone)]
pub struct Closure {
    pub function: u32,
    pub captured: Vec<Value>,
}

impl Closure {
    pub fn bare(function: u32) -> Self {
        Self {
            function,
            captured: Vec::new(),
        }
    }
}

/// A named member table. Classes come in pairs: every class owns a
/// meta-class whose members are the class-level (static) members of the
/// owner. The meta-class keeps a non-owning back-reference so the pair
/// never forms an ownership cycle.
#[derive(Debug, Clone)]
pub struct Class {
    pub name: String,
    pub superclass: Option<u32>,
    pub members: HashMap<String, Value>,
    /// Handle of the owned meta-class; `None` on meta-classes themselves.
    pub meta: Option<u32>,
    /// Back-reference from a meta-class to its owner, for introspection.
    pub owner: Option<u32>,
}

impl Class {
    pub fn is_meta(&self) -> bool {
        self.owner.is_some()
    }
}

/// One script-side object of a class.
#[derive(Debug, Clone)]
pub struct Instance {
    pub class: u32,
    pub fields: HashMap<String, Value>,
}

impl Instance {
    pub fn new(class: u32) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }
}

//! The host binding layer: everything an embedder needs to expose native
//! functionality to scripts. All registration funnels through these
//! methods so host-owned handles are captured for teardown.

use std::collections::HashMap;

use memory::{Arity, Class, Closure, Function, Ownership, Value};

use crate::machine::Vm;
use crate::native::NativeFn;

/// A host-owned heap handle, remembered in registration order. Teardown
/// walks the list in reverse, mirroring the original registration.
#[derive(Debug, Clone, Copy)]
pub enum HostRef {
    Function(u32),
    Closure(u32),
    Class(u32),
}

impl Vm {
    /// Register a native and wrap it in a function object. The function
    /// carries only the registry index, never the pointer itself.
    pub fn native_function(
        &mut self,
        name: &str,
        arity: Arity,
        f: NativeFn,
        owner: Ownership,
    ) -> u32 {
        let index = self.natives.len() as u32;
        self.natives.push(f);
        let handle = self
            .heap
            .alloc_function(Function::native(Some(name.to_string()), arity, index), owner);
        if owner == Ownership::Host {
            self.host_refs.push(HostRef::Function(handle));
        }
        handle
    }

    /// Wrap a function in a closure, the only shape the call path accepts.
    pub fn closure(&mut self, function: u32, owner: Ownership) -> u32 {
        let handle = self.heap.alloc_closure(Closure::bare(function), owner);
        if owner == Ownership::Host {
            self.host_refs.push(HostRef::Closure(handle));
        }
        handle
    }

    /// Create a class and its meta-class in one step. The pair is
    /// inseparable: the class owns the meta, the meta points back at its
    /// owner, and the meta of a subclass inherits from the meta of the
    /// superclass so class-level members are inherited too.
    pub fn new_class_pair(
        &mut self,
        name: &str,
        superclass: Option<u32>,
        owner: Ownership,
    ) -> u32 {
        let meta_super = superclass.and_then(|s| self.heap.meta_of(s));
        let meta = self.heap.alloc_class(
            Class {
                name: format!("{} meta", name),
                superclass: meta_super,
                members: HashMap::new(),
                meta: None,
                owner: None,
            },
            owner,
        );
        let class = self.heap.alloc_class(
            Class {
                name: name.to_string(),
                superclass,
                members: HashMap::new(),
                meta: Some(meta),
                owner: None,
            },
            owner,
        );
        if let Some(m) = self.heap.get_class_mut(meta) {
            m.owner = Some(class);
        }
        if owner == Ownership::Host {
            self.host_refs.push(HostRef::Class(meta));
            self.host_refs.push(HostRef::Class(class));
        }
        class
    }

    /// Build a computed-property member from accessor closures. Returns
    /// the closure to bind; reads run `getter`, writes run `setter` or
    /// fail as read-only when `None`.
    pub fn computed_property(
        &mut self,
        getter: u32,
        setter: Option<u32>,
        owner: Ownership,
    ) -> u32 {
        let function = self
            .heap
            .alloc_function(Function::computed(getter, setter), owner);
        if owner == Ownership::Host {
            self.host_refs.push(HostRef::Function(function));
        }
        self.closure(function, owner)
    }

    /// Make a value visible to scripts. Registration is a separate,
    /// required step: a class that is never registered stays invisible.
    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).copied()
    }

    /// Release every host-owned object, newest first. Safe to call more
    /// than once; releases of already-released handles are no-ops.
    pub fn release_host_owned(&mut self) {
        while let Some(host_ref) = self.host_refs.pop() {
            match host_ref {
                HostRef::Function(h) => self.heap.release_function(h),
                HostRef::Closure(h) => self.heap.release_closure(h),
                HostRef::Class(h) => self.heap.release_class(h),
            }
        }
    }
}

//! Arena heap with u32 handles, mark-sweep collection, and an explicit
//! host-owned/GC-owned split.
//!
//! Host-owned ("pinned") objects are never swept; the embedding host that
//! allocated them must release them explicitly during teardown. Everything
//! else is reclaimed when unreachable from the VM's roots.

use std::collections::HashSet;

use crate::object::{Class, Closure, Function, FunctionKind, Instance};
use crate::value::{self, Value};

/// Who is responsible for an object's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Traced and swept by the collector.
    Gc,
    /// Pinned: invisible to sweep, released manually by the host.
    Host,
}

#[derive(Debug, Clone, Default)]
pub struct Arena<T> {
    pub data: Vec<T>,
    pub free_indices: Vec<u32>,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            free_indices: Vec::new(),
        }
    }

    fn alloc(&mut self, obj: T) -> u32 {
        if let Some(idx) = self.free_indices.pop() {
            self.data[idx as usize] = obj;
            idx
        } else {
            let index = self.data.len() as u32;
            self.data.push(obj);
            index
        }
    }

    fn get(&self, index: u32) -> Option<&T> {
        if self.free_indices.contains(&index) {
            return None;
        }
        self.data.get(index as usize)
    }

    fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        if self.free_indices.contains(&index) {
            return None;
        }
        self.data.get_mut(index as usize)
    }

    /// Blank the slot and return it to the free list.
    fn free(&mut self, index: u32, blank: T) {
        if (index as usize) < self.data.len() && !self.free_indices.contains(&index) {
            self.data[index as usize] = blank;
            self.free_indices.push(index);
        }
    }

    pub fn live_count(&self) -> usize {
        self.data.len() - self.free_indices.len()
    }
}

pub struct Heap {
    // Typed arenas
    pub strings: Arena<String>,
    pub functions: Arena<Function>,
    pub closures: Arena<Closure>,
    pub classes: Arena<Class>,
    pub instances: Arena<Instance>,

    // Mark state (one set per arena)
    marked_strings: HashSet<u32>,
    marked_functions: HashSet<u32>,
    marked_closures: HashSet<u32>,
    marked_classes: HashSet<u32>,
    marked_instances: HashSet<u32>,

    // Host-owned pins (never swept)
    pinned_functions: HashSet<u32>,
    pinned_closures: HashSet<u32>,
    pinned_classes: HashSet<u32>,

    // GC metrics
    pub bytes_allocated: usize,
    pub next_gc_threshold: usize,
    pub request_gc: bool,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Self {
            strings: Arena::new(),
            functions: Arena::new(),
            closures: Arena::new(),
            classes: Arena::new(),
            instances: Arena::new(),

            marked_strings: HashSet::new(),
            marked_functions: HashSet::new(),
            marked_closures: HashSet::new(),
            marked_classes: HashSet::new(),
            marked_instances: HashSet::new(),

            pinned_functions: HashSet::new(),
            pinned_closures: HashSet::new(),
            pinned_classes: HashSet::new(),

            bytes_allocated: 0,
            next_gc_threshold: 1024 * 1024,
            request_gc: false,
        }
    }

    // --- Allocation ---

    pub fn alloc_string(&mut self, s: String) -> u32 {
        self.track(s.capacity());
        self.strings.alloc(s)
    }

    pub fn alloc_function(&mut self, f: Function, owner: Ownership) -> u32 {
        let size = match &f.kind {
            FunctionKind::Bytecode {
                chunk, constants, ..
            } => chunk.len() * 4 + constants.len() * std::mem::size_of::<Value>(),
            _ => std::mem::size_of::<Function>(),
        };
        self.track(size);
        let idx = self.functions.alloc(f);
        if owner == Ownership::Host {
            self.pinned_functions.insert(idx);
        }
        idx
    }

    pub fn alloc_closure(&mut self, c: Closure, owner: Ownership) -> u32 {
        self.track(std::mem::size_of::<Closure>() + c.captured.len() * 8);
        let idx = self.closures.alloc(c);
        if owner == Ownership::Host {
            self.pinned_closures.insert(idx);
        }
        idx
    }

    pub fn alloc_class(&mut self, c: Class, owner: Ownership) -> u32 {
        self.track(std::mem::size_of::<Class>());
        let idx = self.classes.alloc(c);
        if owner == Ownership::Host {
            self.pinned_classes.insert(idx);
        }
        idx
    }

    pub fn alloc_instance(&mut self, i: Instance) -> u32 {
        self.track(std::mem::size_of::<Instance>());
        self.instances.alloc(i)
    }

    fn track(&mut self, bytes: usize) {
        self.bytes_allocated += bytes;
        if self.bytes_allocated > self.next_gc_threshold {
            self.request_gc = true;
        }
    }

    // --- Access ---

    pub fn get_string(&self, h: u32) -> Option<&String> {
        self.strings.get(h)
    }

    pub fn get_function(&self, h: u32) -> Option<&Function> {
        self.functions.get(h)
    }

    pub fn get_closure(&self, h: u32) -> Option<&Closure> {
        self.closures.get(h)
    }

    pub fn get_class(&self, h: u32) -> Option<&Class> {
        self.classes.get(h)
    }

    pub fn get_class_mut(&mut self, h: u32) -> Option<&mut Class> {
        self.classes.get_mut(h)
    }

    pub fn get_instance(&self, h: u32) -> Option<&Instance> {
        self.instances.get(h)
    }

    pub fn get_instance_mut(&mut self, h: u32) -> Option<&mut Instance> {
        self.instances.get_mut(h)
    }

    /// Meta-class handle of a class.
    pub fn meta_of(&self, class: u32) -> Option<u32> {
        self.classes.get(class).and_then(|c| c.meta)
    }

    /// Install or overwrite a member on a class. Last write wins. Binding
    /// on a class makes an instance member; binding on its meta-class
    /// makes a class-level member.
    pub fn bind_member(&mut self, class: u32, name: &str, value: Value) {
        if let Some(c) = self.classes.get_mut(class) {
            c.members.insert(name.to_string(), value);
        }
    }

    pub fn is_pinned_class(&self, h: u32) -> bool {
        self.pinned_classes.contains(&h)
    }

    // --- Host release (teardown path) ---

    pub fn release_function(&mut self, h: u32) {
        if self.pinned_functions.remove(&h) {
            self.functions
                .free(h, Function::bytecode(None, 0, 0, Vec::new(), Vec::new()));
        }
    }

    pub fn release_closure(&mut self, h: u32) {
        if self.pinned_closures.remove(&h) {
            self.closures.free(h, Closure::bare(0));
        }
    }

    pub fn release_class(&mut self, h: u32) {
        if self.pinned_classes.remove(&h) {
            self.classes.free(
                h,
                Class {
                    name: String::new(),
                    superclass: None,
                    members: std::collections::HashMap::new(),
                    meta: None,
                    owner: None,
                },
            );
        }
    }

    /// Bulk-adopt the compiler's interned strings. Handles baked into
    /// constant pools index this table, so it must land before any other
    /// string allocation.
    pub fn import_strings(&mut self, strings: Vec<String>) {
        debug_assert!(self.strings.data.is_empty(), "string arena must be empty");
        self.strings.data = strings;
        self.strings.free_indices.clear();
    }

    // --- Mark phase ---

    /// Mark everything reachable from `roots`. Pinned objects are marked
    /// too when reached; that is harmless (sweep skips them regardless)
    /// and keeps GC-owned values stored inside host-owned members alive.
    pub fn trace(&mut self, roots: Vec<Value>) {
        let mut worklist = roots;

        while let Some(val) = worklist.pop() {
            if !val.is_obj() {
                continue;
            }
            let Some(handle) = val.as_handle() else {
                continue;
            };

            match val.type_tag() {
                value::TAG_STRING => {
                    self.marked_strings.insert(handle);
                }
                value::TAG_FUNCTION => {
                    if self.marked_functions.insert(handle) {
                        if let Some(func) = self.functions.get(handle) {
                            match &func.kind {
                                FunctionKind::Bytecode { constants, .. } => {
                                    worklist.extend(constants.iter().copied());
                                }
                                FunctionKind::Computed { getter, setter } => {
                                    worklist.push(Value::closure(*getter));
                                    if let Some(s) = setter {
                                        worklist.push(Value::closure(*s));
                                    }
                                }
                                FunctionKind::Native { .. } => {}
                            }
                        }
                    }
                }
                value::TAG_CLOSURE => {
                    if self.marked_closures.insert(handle) {
                        if let Some(closure) = self.closures.get(handle) {
                            worklist.push(Value::function(closure.function));
                            worklist.extend(closure.captured.iter().copied());
                        }
                    }
                }
                value::TAG_CLASS => {
                    if self.marked_classes.insert(handle) {
                        if let Some(class) = self.classes.get(handle) {
                            // The owner back-reference is non-owning and
                            // deliberately not traced.
                            worklist.extend(class.members.values().copied());
                            if let Some(meta) = class.meta {
                                worklist.push(Value::class(meta));
                            }
                            if let Some(sup) = class.superclass {
                                worklist.push(Value::class(sup));
                            }
                        }
                    }
                }
                value::TAG_INSTANCE => {
                    if self.marked_instances.insert(handle) {
                        if let Some(inst) = self.instances.get(handle) {
                            worklist.push(Value::class(inst.class));
                            worklist.extend(inst.fields.values().copied());
                        }
                    }
                }
                _ => {}
            }
        }
    }

    // --- Sweep phase ---

    pub fn sweep(&mut self) {
        for i in 0..self.strings.data.len() {
            let idx = i as u32;
            if !self.marked_strings.contains(&idx) {
                self.strings.free(idx, String::new());
            }
        }
        self.marked_strings.clear();

        for i in 0..self.functions.data.len() {
            let idx = i as u32;
            if !self.marked_functions.contains(&idx) && !self.pinned_functions.contains(&idx) {
                self.functions
                    .free(idx, Function::bytecode(None, 0, 0, Vec::new(), Vec::new()));
            }
        }
        self.marked_functions.clear();

        for i in 0..self.closures.data.len() {
            let idx = i as u32;
            if !self.marked_closures.contains(&idx) && !self.pinned_closures.contains(&idx) {
                self.closures.free(idx, Closure::bare(0));
            }
        }
        self.marked_closures.clear();

        for i in 0..self.classes.data.len() {
            let idx = i as u32;
            if !self.marked_classes.contains(&idx) && !self.pinned_classes.contains(&idx) {
                self.classes.free(
                    idx,
                    Class {
                        name: String::new(),
                        superclass: None,
                        members: std::collections::HashMap::new(),
                        meta: None,
                        owner: None,
                    },
                );
            }
        }
        self.marked_classes.clear();

        for i in 0..self.instances.data.len() {
            let idx = i as u32;
            if !self.marked_instances.contains(&idx) {
                self.instances.free(idx, Instance::new(0));
            }
        }
        self.marked_instances.clear();

        self.bytes_allocated = 0;
        self.request_gc = false;
    }

    pub fn should_collect(&self) -> bool {
        self.bytes_allocated > self.next_gc_threshold
    }
}

use memory::Value;

use crate::machine::Vm;

/// Collection entry points. The heap does the tracing and sweeping; the
/// machine's job is to enumerate its roots: every live register, the
/// globals, the adopted prototypes, the closures of active frames, and
/// the captured result. Host-owned (pinned) objects survive regardless.
pub trait GarbageCollector {
    fn collect_garbage(&mut self);
    fn gc_roots(&self) -> Vec<Value>;
}

impl GarbageCollector for Vm {
    fn collect_garbage(&mut self) {
        let roots = self.gc_roots();
        self.heap.trace(roots);
        self.heap.sweep();
    }

    fn gc_roots(&self) -> Vec<Value> {
        let mut roots = Vec::with_capacity(
            self.stack.len() + self.globals.len() + self.prototypes.len() + self.frames.len() + 1,
        );
        roots.extend_from_slice(&self.stack);
        roots.extend(self.globals.values().copied());
        roots.extend(self.prototypes.iter().map(|&h| Value::function(h)));
        roots.extend(self.frames.iter().map(|f| Value::closure(f.closure)));
        roots.push(self.result());
        roots
    }
}

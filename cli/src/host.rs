//! The embedding driver: an explicit state machine around one script's
//! life, from source to result.
//!
//! `Loaded → Compiled → Linked → Running → Done | Failed`. Compilation
//! failures report exactly one diagnostic and leave no machine behind;
//! teardown sweeps GC-owned objects first, then releases the host-owned
//! ones in reverse registration order.

use diagnostics::{Diagnostic, ErrorSink, SharedSink};
use vm::{CompiledUnit, GarbageCollector, Vm};

use crate::natives;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Loaded,
    Compiled,
    Linked,
    Running,
    Done,
    Failed,
}

pub struct Driver {
    file_id: u32,
    source: Option<String>,
    sink: SharedSink,
    state: DriverState,
    unit: Option<CompiledUnit>,
    vm: Option<Vm>,
    entry: Option<u32>,
    /// Forwarded to the machine at link time.
    pub stress_gc: bool,
}

impl Driver {
    pub fn new(file_id: u32, source: String, sink: SharedSink) -> Self {
        Driver {
            file_id,
            source: Some(source),
            sink,
            state: DriverState::Loaded,
            unit: None,
            vm: None,
            entry: None,
            stress_gc: false,
        }
    }

    /// Start from an already-compiled unit (a loaded `.orbc` file),
    /// skipping the compile step.
    pub fn with_unit(file_id: u32, unit: CompiledUnit, sink: SharedSink) -> Self {
        Driver {
            file_id,
            source: None,
            sink,
            state: DriverState::Compiled,
            unit: Some(unit),
            vm: None,
            entry: None,
            stress_gc: false,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn vm(&self) -> Option<&Vm> {
        self.vm.as_ref()
    }

    /// `Loaded → Compiled | Failed`. A failure reports exactly one
    /// diagnostic; success reports only the compiler's warnings.
    pub fn compile(&mut self) -> bool {
        if self.state != DriverState::Loaded {
            return false;
        }
        let source = match self.source.take() {
            Some(source) => source,
            None => return false,
        };
        match compiler::Compiler::new(self.file_id).compile(&source) {
            Ok(unit) => {
                for warning in &unit.warnings {
                    self.sink.borrow_mut().report(warning);
                }
                self.unit = Some(unit);
                self.state = DriverState::Compiled;
                true
            }
            Err(err) => {
                self.sink
                    .borrow_mut()
                    .report(&err.into_diagnostic(self.file_id));
                self.state = DriverState::Failed;
                false
            }
        }
    }

    /// `Compiled → Linked`: create the machine, adopt the unit, and
    /// register the native classes. The machine exists only from here on.
    pub fn link(&mut self) -> bool {
        if self.state != DriverState::Compiled {
            return false;
        }
        let unit = match self.unit.take() {
            Some(unit) => unit,
            None => return false,
        };
        let mut vm = Vm::new(self.sink.clone());
        vm.stress_gc = self.stress_gc;
        let entry = match vm.load_unit(unit) {
            Ok(entry) => entry,
            Err(err) => {
                self.sink
                    .borrow_mut()
                    .report(&Diagnostic::io(err.to_string()));
                self.state = DriverState::Failed;
                return false;
            }
        };
        natives::register_cmath(&mut vm);
        self.vm = Some(vm);
        self.entry = Some(entry);
        self.state = DriverState::Linked;
        true
    }

    /// `Linked → Running → Done | Failed`.
    pub fn run(&mut self) -> bool {
        if self.state != DriverState::Linked {
            return false;
        }
        let (vm, entry) = match (self.vm.as_mut(), self.entry) {
            (Some(vm), Some(entry)) => (vm, entry),
            _ => return false,
        };
        self.state = DriverState::Running;
        let ok = vm.run_main(entry);
        self.state = if ok {
            DriverState::Done
        } else {
            DriverState::Failed
        };
        ok
    }

    /// Result of the run, rendered for output.
    pub fn result_text(&self) -> Option<String> {
        self.vm.as_ref().map(|vm| vm.render_value(vm.result()))
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.vm.as_ref().map(|vm| vm.elapsed_ms()).unwrap_or(0.0)
    }

    /// Sweep GC-owned objects, then release host-owned ones newest-first,
    /// then drop the machine. Safe to call in any state, more than once.
    pub fn teardown(&mut self) {
        if let Some(vm) = self.vm.as_mut() {
            vm.collect_garbage();
            vm.release_host_owned();
        }
        self.vm = None;
        self.entry = None;
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        self.teardown();
    }
}

//! The Orbit virtual machine and its host binding layer.
//!
//! The embedding surface is small: create a [`Vm`] with an error sink,
//! adopt a [`CompiledUnit`], register native classes and functions
//! through the binding methods on [`Vm`], register them into script
//! scope with [`Vm::set_global`], and call [`Vm::run_main`].

pub mod error;
pub mod loader;
pub mod machine;
pub mod native;
pub mod opcode;
pub mod specs;
pub mod unit;

pub use error::RuntimeError;
pub use loader::LoadError;
pub use machine::{GarbageCollector, Vm};
pub use native::{NativeFn, Slots};
pub use unit::CompiledUnit;

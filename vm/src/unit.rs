use diagnostics::Diagnostic;
use memory::Function;

/// Output of a successful compilation, ready to be adopted by a machine.
///
/// The unit is moved into the VM by [`crate::machine::Vm::load_unit`]; the
/// transfer is one-time and one-directional, and every prototype becomes a
/// GC-owned heap object on the way in. String constants index `strings`,
/// function constants index `protos`, and both index spaces line up with
/// the heap handles the import produces.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    pub strings: Vec<String>,
    pub protos: Vec<Function>,
    /// Index into `protos` of the entry prototype.
    pub main: u32,
    /// Non-fatal notices collected during compilation. Never affect the
    /// exit status.
    pub warnings: Vec<Diagnostic>,
}

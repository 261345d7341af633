mod bind;
mod control;
mod frame;
mod gc;
mod globals;
mod member;
mod stack;
mod vm;

pub use bind::HostRef;
pub use control::ControlFlowOps;
pub use frame::CallFrame;
pub use gc::GarbageCollector;
pub use globals::GlobalOps;
pub use member::MemberOps;
pub use stack::StackOps;
pub use vm::Vm;

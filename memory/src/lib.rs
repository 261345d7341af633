pub mod heap;
pub mod object;
pub mod value;


pub use heap::{Arena, Heap, Ownership};
pub use object::{Arity, Class, Closure, Function, FunctionKind, Instance, VARIADIC};
pub use value::{Float, Value};

//! Whole-program facts consumed by the interpreter: class, function and
//! constant resolution, return types, static properties and type
//! constraints.

mod func;
mod index;
mod mem;

pub use func::{CallContext, FoldFn, FuncFlags, FuncInfo, FuncRef};
pub use index::Index;
pub use mem::{ClassDecl, MemIndex};
pub use stackflow_bytecode::TypeConstraint;

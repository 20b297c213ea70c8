//! The type lattice and concrete value model consumed by the abstract
//! interpreter.

mod bits;
mod class;
pub mod eval;
mod lattice;
pub mod ops;
pub mod query;
mod ty;
mod value;

pub use bits::TypeBits;
pub use class::ClassRef;
pub use eval::EvalError;
pub use lattice::{HasBottom, HasTop, Lattice};
pub use ops::{BinaryOp, CastKind, CmpOp};
pub use query::{Emptiness, IsTypeOp, IterCount, IterTypes, Presence};
pub use ty::{ClassSpec, Data, Exactness, Type};
pub use value::{ArrayKey, Value};

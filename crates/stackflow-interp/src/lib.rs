//! Instruction-level abstract interpreter for a stack-based bytecode.
//!
//! Given the abstract [`State`] on entry to a basic block, [`run`] computes
//! the state at every instruction and on every outgoing edge. Along the way
//! each instruction is summarized by [`EffectFlags`]: whether it may throw,
//! whether it is free of side effects, whether its result is a literal, and
//! which cheaper sequence may replace it.
//!
//! The interpreter is one half of a fixpoint analysis; the caller owns the
//! worklist, merges the propagated states and applies the proposed rewrites.
//!
//! ```ignore
//! let mut collect = CollectedInfo::default();
//! let mut interp = Interp::builder()
//!     .index(&index)
//!     .func(&func)
//!     .block(BlockId::new(0))
//!     .collect(&mut collect)
//!     .build()?;
//! let flags = run(&mut interp, |target, state| worklist.merge(target, state))?;
//! ```

mod calls;
mod collect;
mod env;
mod equiv;
mod error;
mod flags;
mod fusion;
mod interp;
pub mod ops;
mod options;
mod reduce;
mod state;

pub use collect::{CollectedInfo, ConstantUse};
pub use env::{Env, Interp};
pub use equiv::LocalEquiv;
pub use error::{InterpError, Result};
pub use flags::{EffectFlags, LocalSet, LocalStaticUses, RunFlags};
pub use interp::{run, step};
pub use ops::dispatch;
pub use options::{CollectionOpts, Options};
pub use reduce::{impl_only, impl_ops, reduce};
pub use state::{
    ActRec, FpiKind, Iter, LocalStaticBinding, StackElem, StackEquiv, State, TrackedIter,
};

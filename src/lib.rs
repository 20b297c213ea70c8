//! Block-at-a-time abstract interpretation of stack bytecode.
//!
//! The pieces live in their own crates and are re-exported here:
//!
//! - [`types`]: the type lattice and literal evaluation,
//! - [`bytecode`]: instructions, blocks and functions,
//! - [`index`]: what is known about the rest of the program,
//! - [`interp`]: the per-block interpreter.

pub use stackflow_bytecode as bytecode;
pub use stackflow_index as index;
pub use stackflow_interp as interp;
pub use stackflow_types as types;

pub mod prelude {
    pub use stackflow_bytecode::{Block, BlockId, Function, LocalId, Op, Param};
    pub use stackflow_index::{Index, MemIndex};
    pub use stackflow_interp::{
        CollectedInfo, EffectFlags, Interp, InterpError, Options, RunFlags, State, dispatch, run,
        step,
    };
    pub use stackflow_types::{HasBottom, HasTop, Lattice, Type, Value};
}

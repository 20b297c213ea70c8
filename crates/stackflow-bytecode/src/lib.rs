//! Instructions, blocks and functions of the stack-machine bytecode.

mod func;
mod id;
mod op;

pub use func::{Block, FuncAttrs, Function, Param, TypeConstraint};
pub use id::{BlockId, ClsRefSlotId, IterId, LocalId, LocalRange};
pub use op::{
    BareThisOp, FatalOp, IncDecOp, InclOp, Op, OpTag, SilenceOp, SpecialClsRef, SwitchKind,
    show_ops,
};

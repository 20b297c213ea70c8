use stackflow_bytecode::{BlockId, ClsRefSlotId, IterId, LocalId, OpTag};

/// Faults in the interpreter or its input, as opposed to runtime errors of
/// the analyzed program, which are modeled as effect flags.
///
/// Any of these aborts the analysis of the current block.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterpError {
    /// An instruction consumed more operands than the stack holds.
    #[error("operand stack underflow")]
    StackUnderflow,
    /// A call instruction found no pending call record.
    #[error("no pending call record")]
    NoActRec,
    #[error("local {0} out of range")]
    LocalOutOfRange(LocalId),
    #[error("iterator {0} out of range")]
    IterOutOfRange(IterId),
    #[error("class-ref slot {0} out of range")]
    ClsRefSlotOutOfRange(ClsRefSlotId),
    /// A class-ref slot was read without a preceding write in this block.
    #[error("class-ref slot {0} read before it was written")]
    UntrackedClsRef(ClsRefSlotId),
    /// An unconditional jump reached dispatch; the CFG turns these into
    /// fallthrough edges.
    #[error("unexpected jump instruction {0}")]
    UnexpectedJump(OpTag),
    #[error("unknown block {0}")]
    UnknownBlock(BlockId),
}

pub type Result<T> = std::result::Result<T, InterpError>;

#![allow(dead_code)]

use stackflow_bytecode::{Block, BlockId, Function, IterId, LocalId, Op, Param};
use stackflow_test_utils::Harness;

pub fn b(i: u32) -> BlockId {
    BlockId::new(i)
}

pub fn l(i: u32) -> LocalId {
    LocalId::new(i)
}

pub fn it(i: u32) -> IterId {
    IterId::new(i)
}

/// Blocks 1 to 3 only return null.
fn tail_blocks() -> impl Iterator<Item = Block> {
    (1..=3).map(|i| {
        Block::builder()
            .id(b(i))
            .ops(vec![Op::Null, Op::RetC])
            .build()
    })
}

/// `f($x) { $y; $z; }` whose block 0 runs `ops`, falls through to block 1
/// and is covered by the handlers `exits`.
pub fn func_with_exits(ops: Vec<Op>, exits: Vec<BlockId>) -> Function {
    let entry = Block::builder()
        .id(b(0))
        .ops(ops)
        .fallthrough(b(1))
        .factored_exits(exits)
        .build();
    Function::builder()
        .name("f")
        .params(vec![Param::untyped("x")])
        .locals(vec!["y".into(), "z".into()])
        .num_iters(1)
        .num_cls_ref_slots(1)
        .blocks(std::iter::once(entry).chain(tail_blocks()).collect())
        .build()
}

pub fn func(ops: Vec<Op>) -> Function {
    func_with_exits(ops, vec![])
}

pub fn harness(ops: Vec<Op>) -> Harness {
    stackflow_test_utils::init_tracing();
    Harness::new(func(ops))
}

//! Block interpretation.
//!
//! [`run`] walks a block's instructions, interpreting fused groups through
//! [`Group`] and everything else through [`dispatch`], and forwards the
//! resulting states to the block's successors.

use stackflow_bytecode::{BlockId, Op, show_ops};
use tracing::{debug, trace};

use crate::env::{Env, Interp};
use crate::error::Result;
use crate::flags::{EffectFlags, RunFlags};
use crate::fusion::Group;
use crate::ops::dispatch;
use crate::options::CollectionOpts;
use crate::reduce::apply_const_prop;
use crate::state::State;

/// Interpret the instruction, or fused group, at the start of `ops`.
/// Returns the number of instructions consumed with their flags.
fn interp_ops(
    interp: &mut Interp<'_>,
    ops: &[Op],
    propagate: &mut dyn FnMut(BlockId, &State),
) -> Result<(usize, EffectFlags)> {
    let blk = interp.blk;
    // Exception handlers see the state before the instruction, minus the
    // stacks it was working on.
    let before = (!blk.factored_exits.is_empty()).then(|| interp.state.without_stacks());
    let depth = interp.state.stack.len() as isize;

    let group = Group::find(ops);
    let len = group.as_ref().map_or(1, Group::len);
    let arity: isize = ops[..len]
        .iter()
        .map(|op| op.num_push() as isize - op.num_pop() as isize)
        .sum();

    let mut env = Env::new(interp, &mut *propagate);
    match &group {
        Some(group) => group.run(&mut env, ops)?,
        None => {
            dispatch(&mut env, &ops[0])?;
            apply_const_prop(&mut env, &ops[0]);
        }
    }
    let flags = env.flags;

    assert!(
        !flags.effect_free || !flags.was_pei,
        "effect-free instruction marked as throwing: {}",
        show_ops(&ops[..len]),
    );
    if !interp.state.unreachable {
        assert_eq!(
            interp.state.stack.len() as isize,
            depth + arity,
            "stack arity of {}",
            show_ops(&ops[..len]),
        );
    }
    trace!(
        op = %show_ops(&ops[..len]),
        depth = interp.state.stack.len(),
        pei = flags.was_pei,
        "interpreted",
    );

    if flags.was_pei {
        if let Some(before) = &before {
            for exit in &blk.factored_exits {
                propagate(*exit, before);
            }
        }
    }
    Ok((len, flags))
}

/// Interpret the block `interp` was built for, from its entry state.
///
/// States leaving the block are handed to `propagate` with their target:
/// the state before each throwing instruction goes to every factored exit,
/// branches send theirs as they are interpreted, and the state at the end
/// goes to the fallthrough.
pub fn run(interp: &mut Interp<'_>, mut propagate: impl FnMut(BlockId, &State)) -> Result<RunFlags> {
    let blk = interp.blk;
    let ops = &blk.ops[..];
    let mut ret = RunFlags::default();

    let mut at = 0;
    while at < ops.len() {
        let (len, flags) = interp_ops(interp, &ops[at..], &mut propagate)?;
        at += len;

        if interp.collect.effect_free && !flags.effect_free {
            interp.collect.effect_free = false;
            if interp.collect.opts.contains(CollectionOpts::EFFECT_FREE_ONLY) {
                debug!(block = %blk.id, "not effect free, stopping");
                return Ok(ret);
            }
        }
        ret.merge_local_statics(flags.used_local_statics);

        if let Some(returned) = flags.returned {
            trace!(block = %blk.id, %returned, "returned");
            ret.returned = Some(returned);
            return Ok(ret);
        }
        if interp.state.unreachable {
            trace!(block = %blk.id, "rest of block is unreachable");
            return Ok(ret);
        }
        if let Some(dest) = flags.jmp_dest {
            if Some(dest) != blk.fallthrough {
                trace!(block = %blk.id, %dest, "took branch");
                return Ok(ret);
            }
        }
    }

    if let Some(fallthrough) = blk.fallthrough {
        propagate(fallthrough, &interp.state);
    }
    Ok(ret)
}

/// Interpret a single instruction against `interp`'s state, dropping any
/// state it sends elsewhere.
pub fn step(interp: &mut Interp<'_>, op: &Op) -> Result<EffectFlags> {
    let mut ignore = |_: BlockId, _: &State| {};
    let mut env = Env::new(interp, &mut ignore);
    dispatch(&mut env, op)?;
    apply_const_prop(&mut env, op);
    Ok(env.flags)
}

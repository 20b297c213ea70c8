use std::sync::Arc;

use stackflow_bytecode::{BlockId, Op, SwitchKind};
use stackflow_types::query::{assert_emptiness, assert_nonemptiness, emptiness};
use stackflow_types::{Emptiness, Type, Value, eval};

use crate::env::{Env, Location};
use crate::error::{InterpError, Result};

pub(super) fn unexpected_jump(op: &Op) -> Result<()> {
    Err(InterpError::UnexpectedJump(op.tag()))
}

/// The instruction certainly branches to `target`.
fn go(env: &mut Env<'_, '_>, target: BlockId) {
    env.effect_free();
    env.propagate_current(target);
    env.jmp_setdest(target);
}

/// `JmpZ` (`nonzero == false`) or `JmpNZ`.
pub(super) fn jmp_cond(env: &mut Env<'_, '_>, target: BlockId, nonzero: bool) -> Result<()> {
    env.nothrow();
    let location = Location::of(env.top_equiv()?);
    let e = emptiness(&env.pop_c()?);
    let (taken_on, not_taken_on) = if nonzero {
        (Emptiness::NonEmpty, Emptiness::Empty)
    } else {
        (Emptiness::Empty, Emptiness::NonEmpty)
    };

    if e == taken_on {
        env.jmp_setdest(target);
        env.propagate_current(target);
        return Ok(());
    }
    let func = env.func();
    let same_dest = env
        .interp
        .blk
        .fallthrough
        .is_some_and(|ft| func.next_real_block(ft) == func.next_real_block(target));
    if e == not_taken_on || same_dest {
        env.jmp_nevertaken();
        return Ok(());
    }

    let Some(location) = location else {
        env.propagate_current(target);
        return Ok(());
    };
    if nonzero {
        env.refine_location(location, &assert_nonemptiness, target, &assert_emptiness)
    } else {
        env.refine_location(location, &assert_emptiness, target, &assert_nonemptiness)
    }
}

fn propagate_all(env: &mut Env<'_, '_>, targets: &[BlockId]) {
    for target in targets {
        env.propagate_current(*target);
    }
}

fn propagate_cases(env: &mut Env<'_, '_>, cases: &[(Arc<str>, BlockId)], default: BlockId) {
    for (_, target) in cases {
        env.propagate_current(*target);
    }
    env.propagate_current(default);
}

pub(super) fn switch(
    env: &mut Env<'_, '_>,
    kind: SwitchKind,
    base: i64,
    targets: &[BlockId],
) -> Result<()> {
    let t = env.pop_c()?;
    let Some(v) = t.tv() else {
        propagate_all(env, targets);
        return Ok(());
    };

    match kind {
        SwitchKind::Bounded => {
            let dest = match v {
                Value::Int(i) => i
                    .checked_sub(base)
                    .and_then(|i| usize::try_from(i).ok())
                    .and_then(|i| targets.get(i)),
                _ => None,
            };
            match dest {
                Some(target) => go(env, *target),
                None => propagate_all(env, targets),
            }
        }
        SwitchKind::Unbounded => {
            // The last two targets are the default cases.
            let Some(default) = targets.last() else {
                return Ok(());
            };
            let cases = targets.len().saturating_sub(2);
            for (i, target) in targets.iter().take(cases).enumerate() {
                let case = Value::Int(base.wrapping_add(i as i64));
                match eval::equal(&v, &case) {
                    Ok(true) => {
                        go(env, *target);
                        return Ok(());
                    }
                    Ok(false) => {}
                    Err(_) => {
                        propagate_all(env, targets);
                        return Ok(());
                    }
                }
            }
            go(env, *default);
        }
    }
    Ok(())
}

pub(super) fn sswitch(
    env: &mut Env<'_, '_>,
    cases: &[(Arc<str>, BlockId)],
    default: BlockId,
) -> Result<()> {
    let t = env.pop_c()?;
    let Some(v) = t.tv() else {
        propagate_cases(env, cases, default);
        return Ok(());
    };

    for (case, target) in cases {
        match eval::equal(&v, &Value::Str(case.clone())) {
            Ok(true) => {
                go(env, *target);
                return Ok(());
            }
            Ok(false) => {}
            Err(_) => {
                propagate_cases(env, cases, default);
                return Ok(());
            }
        }
    }
    go(env, default);
    Ok(())
}

fn do_ret(env: &mut Env<'_, '_>, t: Type) {
    // Leaving the frame releases every local.
    env.read_unknown_locals();
    env.flags.returned = Some(t);
    env.effect_free();
}

pub(super) fn ret_c(env: &mut Env<'_, '_>) -> Result<()> {
    let t = env.pop_c()?;
    do_ret(env, t);
    Ok(())
}

/// Return several values at once, as a packed tuple.
pub(super) fn ret_m(env: &mut Env<'_, '_>, n: u32) -> Result<()> {
    let elems = env
        .pop_n(n as usize)?
        .iter()
        .map(Type::to_cell)
        .collect();
    do_ret(env, Type::vec(elems));
    Ok(())
}

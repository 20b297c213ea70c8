use stackflow_bytecode::{Op, show_ops};
use stackflow_types::Type;
use tracing::debug;

use crate::env::Env;
use crate::error::Result;
use crate::flags::EffectFlags;
use crate::ops::dispatch;

/// Interpret `ops` in place of the current instruction.
///
/// The flags of the sequence become the flags of the instruction: it may
/// throw if any part may, and it is effect free or constant-propagatable only
/// if every part is. Stops early once the state becomes unreachable, which
/// it does after any terminal part or a part whose replacement ends in one.
/// With `reduce` set, and strength reduction enabled, the executed sequence
/// is proposed as the instruction's replacement.
pub fn impl_ops(env: &mut Env<'_, '_>, reduce: bool, ops: &[Op]) -> Result<()> {
    let reduce = reduce && env.options().strength_reduce;
    let mut acc = std::mem::take(&mut env.flags);
    acc.was_pei = false;
    acc.can_const_prop = true;
    acc.effect_free = true;
    let mut replacement = Vec::with_capacity(ops.len());

    for op in ops {
        env.flags = EffectFlags::default();
        dispatch(env, op)?;
        apply_const_prop(env, op);
        let sub = std::mem::take(&mut env.flags);

        acc.was_pei |= sub.was_pei;
        acc.can_const_prop &= sub.can_const_prop;
        acc.effect_free &= sub.effect_free;
        if sub.jmp_dest.is_some() {
            acc.jmp_dest = sub.jmp_dest;
        }
        if sub.returned.is_some() {
            acc.returned = sub.returned;
        }
        if let Some(uses) = sub.used_local_statics {
            let merged = acc.used_local_statics.get_or_insert_with(Default::default);
            for (l, t) in uses {
                merged.entry(l).or_insert(t);
            }
        }
        acc.may_read_locals.union(&sub.may_read_locals);
        let executed = sub.strength_reduced.as_deref().unwrap_or(std::slice::from_ref(op));
        if executed.last().is_some_and(Op::is_terminal) {
            env.unreachable();
        }
        match sub.strength_reduced {
            Some(nested) if reduce => replacement.extend(nested),
            _ if reduce => replacement.push(op.clone()),
            _ => {}
        }

        if env.interp.state.unreachable {
            break;
        }
    }

    acc.strength_reduced = reduce.then_some(replacement);
    env.flags = acc;
    Ok(())
}

/// Replace the current instruction with the equivalent sequence `ops`.
pub fn reduce(env: &mut Env<'_, '_>, ops: &[Op]) -> Result<()> {
    debug!(replacement = %show_ops(ops), "strength reduction");
    impl_ops(env, true, ops)
}

/// Interpret `ops` in place of the current instruction without proposing
/// them as its replacement.
pub fn impl_only(env: &mut Env<'_, '_>, ops: &[Op]) -> Result<()> {
    impl_ops(env, false, ops)
}

/// When an instruction marked constant-propagatable pushed only literals,
/// it has no effect besides those literals.
pub(crate) fn apply_const_prop(env: &mut Env<'_, '_>, op: &Op) {
    if !env.flags.can_const_prop || !env.options().constant_prop {
        return;
    }
    if (env.flags.effect_free && !env.flags.was_pei) || env.interp.state.unreachable {
        return;
    }
    let n = op.num_push() as usize;
    let stack = &mut env.interp.state.stack;
    if n > stack.len() {
        return;
    }
    let start = stack.len() - n;
    let Some(values) = stack[start..]
        .iter()
        .map(|e| e.ty.tv())
        .collect::<Option<Vec<_>>>()
    else {
        return;
    };
    for (elem, v) in stack[start..].iter_mut().zip(values) {
        elem.ty = Type::from_value(&v);
    }
    env.flags.effect_free = true;
    env.flags.was_pei = false;
}

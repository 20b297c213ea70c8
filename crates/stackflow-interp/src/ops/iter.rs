use stackflow_bytecode::{BlockId, IterId, LocalId};
use stackflow_types::{IterCount, Type};
use stackflow_types::query::iter_types;

use crate::env::Env;
use crate::error::Result;
use crate::state::{Iter, TrackedIter};

/// The edge taken when there is nothing to iterate. It leaves before the
/// locals are written.
fn skip_loop(env: &mut Env<'_, '_>, id: IterId, target: BlockId) -> Result<()> {
    env.free_iter(id)?;
    env.propagate_current(target);
    Ok(())
}

/// `IterInit` and `IterInitK`: start iterating the value on top of the
/// stack, jumping to `target` when there is nothing to visit.
pub(super) fn init(
    env: &mut Env<'_, '_>,
    id: IterId,
    target: BlockId,
    value: LocalId,
    key: Option<LocalId>,
) -> Result<()> {
    let base = env.pop_c()?;
    let types = iter_types(&base);
    if !types.may_throw_on_init {
        env.nothrow();
    }

    match types.count {
        IterCount::Empty => {
            skip_loop(env, id, target)?;
            env.may_read_local(value);
            if let Some(k) = key {
                env.may_read_local(k);
            }
            env.jmp_setdest(target);
            return Ok(());
        }
        IterCount::Single | IterCount::NonEmpty => env.jmp_nevertaken(),
        IterCount::ZeroOrOne | IterCount::Any => skip_loop(env, id, target)?,
    }

    env.set_loc(value, types.value.clone())?;
    if let Some(k) = key {
        env.set_loc(k, types.key.clone())?;
    }
    env.set_iter(id, Iter::Tracked(TrackedIter::from(types)))
}

/// `IterNext` and `IterNextK`: advance, jumping back to `target` while
/// elements remain.
pub(super) fn next(
    env: &mut Env<'_, '_>,
    id: IterId,
    target: BlockId,
    value: LocalId,
    key: Option<LocalId>,
) -> Result<()> {
    let saved_value = env.loc_raw(value)?;
    let saved_key = key.map(|k| env.loc_raw(k)).transpose()?;

    let (next_value, next_key) = match env.iter(id)?.clone() {
        Iter::Unknown => (Type::INIT_CELL, Type::INIT_CELL),
        Iter::Tracked(ti) => {
            if !ti.may_throw_on_next {
                env.nothrow();
            }
            if !matches!(ti.count, IterCount::NonEmpty | IterCount::Any) {
                // At most one element, already visited by the init.
                env.jmp_nevertaken();
                return env.free_iter(id);
            }
            env.set_iter(
                id,
                Iter::Tracked(TrackedIter {
                    count: ti.count.after_next(),
                    ..ti.clone()
                }),
            )?;
            (ti.value, ti.key)
        }
    };

    env.set_loc(value, next_value)?;
    if let Some(k) = key {
        env.set_loc(k, next_key)?;
    }
    env.propagate_current(target);

    env.free_iter(id)?;
    env.set_loc_raw(value, saved_value)?;
    if let (Some(k), Some(t)) = (key, saved_key) {
        env.set_loc_raw(k, t)?;
    }
    Ok(())
}

pub(super) fn free(env: &mut Env<'_, '_>, id: IterId) -> Result<()> {
    env.nothrow();
    env.free_iter(id)
}

/// Leave a loop early, releasing `iters`.
pub(super) fn brk(env: &mut Env<'_, '_>, target: BlockId, iters: &[IterId]) -> Result<()> {
    for id in iters {
        env.free_iter(*id)?;
    }
    env.propagate_current(target);
    Ok(())
}

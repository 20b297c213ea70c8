use stackflow_bytecode::{LocalId, LocalRange, Op, SilenceOp};
use stackflow_types::query::{Presence, array_like_elem, wait_handle_inner};
use stackflow_types::{Type, TypeBits, Value};

use crate::env::Env;
use crate::error::Result;
use crate::reduce::reduce;

use super::types::memoize_impl_ret_type;

// -- Function statics ---------------------------------------------------------

/// The collected value of `l`'s function-static, when it is a single literal
/// that may be relied on.
fn known_local_static(env: &Env<'_, '_>, l: LocalId) -> Option<(Type, Value)> {
    let func = env.func();
    if func.is_memoize_wrapper() || func.is_closure_body() {
        return None;
    }
    let t = env.interp.collect.local_static_type(l)?;
    t.tv().map(|v| (t.clone(), v))
}

/// Bind `l` to its function-static, initialized with `init`. Returns the
/// static's value when it is known to be a single literal, in which case the
/// local holds that literal.
pub(crate) fn static_loc_helper(env: &mut Env<'_, '_>, l: LocalId, init: Type) -> Result<Option<Value>> {
    if env.func().is_volatile_local(l) {
        return Ok(None);
    }
    env.unbind_local_static(l);
    env.set_loc_raw(l, Type::REF)?;
    env.bind_local_static(l, &init);
    env.use_local_static(l);
    match known_local_static(env, l) {
        Some((t, v)) => {
            env.set_loc_raw(l, t)?;
            Ok(Some(v))
        }
        None => Ok(None),
    }
}

pub(super) fn static_loc_check(env: &mut Env<'_, '_>, l: LocalId) -> Result<()> {
    if let Some((t, v)) = known_local_static(env, l) {
        env.use_local_static(l);
        env.set_loc_raw(l, t)?;
        return reduce(env, &[Op::literal(&v), Op::SetL(l), Op::PopC, Op::True]);
    }
    env.set_loc_raw(l, Type::GEN)?;
    env.maybe_bind_local_static(l);
    env.push(Type::BOOL);
    Ok(())
}

/// `StaticLocDef` and `StaticLocInit`.
pub(super) fn static_loc_init(env: &mut Env<'_, '_>, l: LocalId) -> Result<()> {
    let init = env.top_t(0)?.to_cell();
    if static_loc_helper(env, l, init)?.is_some() {
        return reduce(env, &[Op::SetL(l), Op::PopC]);
    }
    env.pop_c()?;
    Ok(())
}

// -- Local ranges -------------------------------------------------------------

/// The lowest-numbered range of locals holding the same values as `range`,
/// slot by slot.
pub(crate) fn equiv_local_range(env: &Env<'_, '_>, range: LocalRange) -> LocalId {
    let state = &env.interp.state;
    let raw = |l: LocalId| state.locals.get(l.index());
    let offset = |l: LocalId, i: u32| LocalId::new(l.index() as u32 + i);

    state
        .equiv
        .members(range.first)
        .filter(|c| *c < range.first)
        .find(|c| {
            // Equivalence ignores whether a local is initialized.
            raw(*c) == raw(range.first)
                && (1..=range.rest).all(|i| {
                    let (a, b) = (offset(*c, i), offset(range.first, i));
                    state.equiv.are_equiv(a, b) && raw(a) == raw(b)
                })
        })
        .unwrap_or(range.first)
}

// -- Memoization --------------------------------------------------------------

/// Look up the memo cache keyed by `range`; uninit on a miss.
pub(super) fn memo_get(env: &mut Env<'_, '_>, range: LocalRange) -> Result<()> {
    let equiv = equiv_local_range(env, range);
    if equiv != range.first {
        return reduce(env, &[Op::MemoGet(LocalRange::new(equiv, range.rest))]);
    }
    range.iter().for_each(|l| env.may_read_local(l));
    env.nothrow();
    let t = if env.func().is_memoize_wrapper() {
        memoize_impl_ret_type(env)?.union(&Type::UNINIT)
    } else {
        Type::CELL
    };
    env.push(t);
    Ok(())
}

/// Store the value on top of the stack in the memo cache keyed by `range`.
pub(super) fn memo_set(env: &mut Env<'_, '_>, range: LocalRange) -> Result<()> {
    let equiv = equiv_local_range(env, range);
    if equiv != range.first {
        return reduce(env, &[Op::MemoSet(LocalRange::new(equiv, range.rest))]);
    }
    range.iter().for_each(|l| env.may_read_local(l));
    let t = env.pop_c()?;
    env.push(t);
    Ok(())
}

// -- Async --------------------------------------------------------------------

/// `Await` and `WHResult`: the result of a wait handle.
pub(super) fn await_result(env: &mut Env<'_, '_>) -> Result<()> {
    let t = env.pop_c()?;
    let inner = if t.could_be(&Type::OBJ) {
        wait_handle_inner(&t.intersect(&Type::OBJ))
    } else {
        Type::BOTTOM
    };
    if inner.is_bottom() {
        env.unreachable();
    }
    env.push(inner);
    Ok(())
}

pub(super) fn await_all(env: &mut Env<'_, '_>, range: LocalRange) -> Result<()> {
    let equiv = equiv_local_range(env, range);
    if equiv != range.first {
        return reduce(env, &[Op::AwaitAll(LocalRange::new(equiv, range.rest))]);
    }
    range.iter().for_each(|l| env.may_read_local(l));
    env.push(Type::INIT_NULL);
    Ok(())
}

// -- Dynamic code -------------------------------------------------------------

/// `Incl` and `Eval`: the included code may touch any local or private
/// property.
pub(super) fn incl_eval(env: &mut Env<'_, '_>) -> Result<()> {
    env.pop_c()?;
    env.kill_locals();
    let collect = env.collect();
    collect.kill_this_props();
    collect.kill_self_props();
    env.read_unknown_locals();
    env.push(Type::INIT_CELL);
    Ok(())
}

// -- Element access -----------------------------------------------------------

/// `Idx` and `ArrayIdx`: the element at a key, or a default when absent.
pub(super) fn idx(env: &mut Env<'_, '_>) -> Result<()> {
    let default = env.pop_c()?;
    let key = env.pop_c()?;
    let base = env.pop_c()?;
    if !base.subtype_of_bits(TypeBits::ARR_LIKE) {
        env.push(Type::INIT_CELL);
        return Ok(());
    }
    let (elem, presence) = array_like_elem(&base, &key);
    env.push(match presence {
        Presence::Present => elem,
        Presence::Missing => default,
        Presence::Maybe => elem.union(&default),
    });
    Ok(())
}

pub(super) fn silence(env: &mut Env<'_, '_>, l: LocalId, subop: SilenceOp) -> Result<()> {
    env.nothrow();
    match subop {
        SilenceOp::Start => env.set_loc(l, Type::INT),
        SilenceOp::End => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use stackflow_bytecode::{Block, BlockId, Function, Param};
    use stackflow_index::MemIndex;

    use super::*;
    use crate::collect::CollectedInfo;
    use crate::env::Interp;

    fn with_env(locals: u32, f: impl FnOnce(&mut Env<'_, '_>)) {
        let func = Function::builder()
            .name("f")
            .params((0..locals).map(|i| Param::untyped(&format!("p{i}"))).collect())
            .blocks(vec![Block::builder().id(BlockId::new(0)).build()])
            .build();
        let index = MemIndex::default();
        let mut collect = CollectedInfo::default();
        let mut interp = Interp::builder()
            .index(&index)
            .func(&func)
            .block(BlockId::new(0))
            .collect(&mut collect)
            .build()
            .unwrap();
        let mut sink = |_: BlockId, _: &crate::state::State| {};
        let mut env = Env::new(&mut interp, &mut sink);
        f(&mut env);
    }

    #[test]
    fn equivalent_ranges_prefer_lowest_locals() {
        with_env(4, |env| {
            let l = LocalId::new;
            env.add_loc_equiv(l(2), l(0));
            env.add_loc_equiv(l(3), l(1));
            assert_eq!(equiv_local_range(env, LocalRange::new(l(2), 1)), l(0));
            assert_eq!(equiv_local_range(env, LocalRange::new(l(0), 1)), l(0));
        });
    }

    #[test]
    fn partially_equivalent_ranges_are_kept() {
        with_env(4, |env| {
            let l = LocalId::new;
            env.add_loc_equiv(l(2), l(0));
            assert_eq!(equiv_local_range(env, LocalRange::new(l(2), 1)), l(2));
        });
    }

    #[test]
    fn idx_on_a_literal_map() {
        with_env(0, |env| {
            let base = Type::dict(vec![("a".into(), Type::int(1))]);
            env.push(base.clone());
            env.push(Type::str("a"));
            env.push(Type::INIT_NULL);
            idx(env).unwrap();
            assert_eq!(env.pop().unwrap(), Type::int(1));

            env.push(base);
            env.push(Type::str("b"));
            env.push(Type::FALSE);
            idx(env).unwrap();
            assert_eq!(env.pop().unwrap(), Type::FALSE);
        });
    }
}

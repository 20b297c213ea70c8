use stackflow_bytecode::{BareThisOp, IncDecOp, LocalId, Op};
use stackflow_types::query::type_of_istype;
use stackflow_types::{BinaryOp, IsTypeOp, Type, TypeBits};

use crate::env::Env;
use crate::error::Result;
use crate::reduce::{impl_only, reduce};
use crate::state::StackEquiv;

use super::basic::cast_bool;
use super::types::push_type_test;

/// The equivalence a value read from `l` carries on the stack.
fn local_equiv(env: &Env<'_, '_>, l: LocalId) -> StackEquiv {
    if env.func().is_volatile_local(l) {
        StackEquiv::None
    } else {
        StackEquiv::Local(l)
    }
}

fn is_this_loc(env: &Env<'_, '_>, l: LocalId) -> bool {
    env.interp.state.this_loc_to_kill == Some(l)
}

/// A store through a name only known at runtime: any local that is not a
/// reference may now hold any value.
pub(super) fn lose_local_types(env: &mut Env<'_, '_>) {
    let num_locals = env.interp.state.locals.len();
    for i in 0..num_locals {
        let l = LocalId::new(i as u32);
        env.modify_local_static(l, &Type::INIT_CELL);
        let slot = &mut env.state().locals[i];
        if slot.could_be_bits(TypeBits::REF) {
            continue;
        }
        *slot = if slot.could_be_bits(TypeBits::UNINIT) {
            Type::CELL
        } else {
            Type::INIT_CELL
        };
    }
    let state = env.state();
    state.equiv.clear();
    for elem in &mut state.stack {
        if matches!(elem.equiv, StackEquiv::Local(_)) {
            elem.equiv = StackEquiv::None;
        }
    }
}

// -- Reads --------------------------------------------------------------------

pub(super) fn cget(env: &mut Env<'_, '_>, l: LocalId) -> Result<()> {
    if is_this_loc(env, l) {
        return reduce(env, &[Op::BareThis(BareThisOp::Notice)]);
    }
    if !env.loc_could_be_uninit(l)? {
        env.nothrow();
        env.constprop();
    }
    env.may_read_local(l);
    let t = env.loc_as_cell(l)?;
    let equiv = local_equiv(env, l);
    env.push_equiv(t, equiv);
    Ok(())
}

pub(super) fn cget_quiet(env: &mut Env<'_, '_>, l: LocalId) -> Result<()> {
    if is_this_loc(env, l) {
        return reduce(env, &[Op::BareThis(BareThisOp::NoNotice)]);
    }
    env.nothrow();
    env.constprop();
    env.may_read_local(l);
    let t = env.loc_as_cell(l)?;
    let equiv = local_equiv(env, l);
    env.push_equiv(t, equiv);
    Ok(())
}

/// Read a local without converting an uninitialized value to null.
pub(super) fn cuget(env: &mut Env<'_, '_>, l: LocalId) -> Result<()> {
    let raw = env.loc_raw(l)?;
    if raw.subtype_of(&Type::UNINIT) {
        return reduce(env, &[Op::NullUninit]);
    }
    env.nothrow();
    if !raw.could_be_bits(TypeBits::UNINIT) {
        env.constprop();
    }
    env.may_read_local(l);
    let t = if raw.subtype_of(&Type::CELL) {
        raw
    } else {
        Type::CELL
    };
    let equiv = local_equiv(env, l);
    env.push_equiv(t, equiv);
    Ok(())
}

/// Move a local's value to the stack, leaving the local unset.
pub(super) fn push_l(env: &mut Env<'_, '_>, l: LocalId) -> Result<()> {
    if let Some(v) = env.loc_raw(l)?.tv() {
        return reduce(env, &[Op::literal(&v), Op::UnsetL(l)]);
    }
    impl_only(env, &[Op::CGetL(l), Op::UnsetL(l)])
}

/// Push a local beneath the value on top of the stack.
pub(super) fn cget2(env: &mut Env<'_, '_>, l: LocalId) -> Result<()> {
    if !env.loc_could_be_uninit(l)? {
        env.effect_free();
    }
    env.may_read_local(l);
    let loc = env.loc_as_cell(l)?;
    let top = env.pop_elem()?;
    let top_equiv = match top.equiv {
        StackEquiv::Local(_) => top.equiv,
        _ => StackEquiv::None,
    };
    let equiv = local_equiv(env, l);
    env.push_equiv(loc, equiv);
    env.push_equiv(top.ty, top_equiv);
    Ok(())
}

/// Read a local by name.
pub(super) fn cget_n(env: &mut Env<'_, '_>) -> Result<()> {
    let known = env
        .top_t(0)?
        .str_val()
        .and_then(|name| env.func().find_local(name));
    if let Some(l) = known {
        return reduce(env, &[Op::PopC, Op::CGetL(l)]);
    }
    env.read_unknown_locals();
    env.pop_c()?;
    env.push(Type::INIT_CELL);
    Ok(())
}

// -- Tests --------------------------------------------------------------------

pub(super) fn isset(env: &mut Env<'_, '_>, l: LocalId) -> Result<()> {
    if is_this_loc(env, l) {
        return reduce(
            env,
            &[
                Op::BareThis(BareThisOp::NoNotice),
                Op::IsTypeC(IsTypeOp::Null),
                Op::Not,
            ],
        );
    }
    env.nothrow();
    env.constprop();
    env.may_read_local(l);
    let loc = env.loc_as_cell(l)?;
    env.push(if loc.subtype_of(&Type::NULL) {
        Type::FALSE
    } else if !loc.could_be(&Type::NULL) {
        Type::TRUE
    } else {
        Type::BOOL
    });
    Ok(())
}

pub(super) fn empty(env: &mut Env<'_, '_>, l: LocalId) -> Result<()> {
    env.may_read_local(l);
    let loc = env.loc_as_cell(l)?;
    env.push(loc);
    cast_bool(env, true)
}

pub(super) fn is_type(env: &mut Env<'_, '_>, l: LocalId, test: IsTypeOp) -> Result<()> {
    if !env.loc_could_be_uninit(l)? {
        env.nothrow();
        env.constprop();
    }
    env.may_read_local(l);
    let loc = env.loc_as_cell(l)?;
    push_type_test(env, &loc, &type_of_istype(test));
    Ok(())
}

// -- Writes -------------------------------------------------------------------

/// `SetL` (`keep == true`) or `PopL`: store the top of the stack in `l`.
pub(super) fn move_to_loc(env: &mut Env<'_, '_>, l: LocalId, keep: bool) -> Result<()> {
    env.nothrow();
    let mut equiv = env.top_local();
    let raw = env.loc_raw(l)?;
    let tracked = !raw.could_be_bits(TypeBits::REF) && !env.func().is_volatile_local(l);
    if tracked {
        match equiv {
            Some(e) if e == l || env.locs_are_equiv(e, l) => {
                // Equivalence ignores whether the local is initialized.
                if raw == *env.top_t(0)? {
                    return reduce(env, &[if keep { Op::Nop } else { Op::PopC }]);
                }
            }
            Some(_) => {}
            None => equiv = Some(l),
        }
    }

    let val = env.pop_c()?;
    env.set_loc(l, val.clone())?;
    if let Some(e) = equiv {
        if tracked && e != l {
            env.add_loc_equiv(l, e);
        }
    }
    if keep {
        env.push_equiv(val, equiv.map_or(StackEquiv::None, StackEquiv::Local));
    }
    Ok(())
}

/// Store to a local by name.
pub(super) fn set_n(env: &mut Env<'_, '_>) -> Result<()> {
    let t1 = env.pop_c()?;
    let name = env.pop_c()?;
    match name.str_val().and_then(|n| env.func().find_local(n)) {
        Some(l) => env.set_loc(l, t1.clone())?,
        None => lose_local_types(env),
    }
    env.read_unknown_locals();
    env.push(t1);
    Ok(())
}

pub(super) fn set_op(env: &mut Env<'_, '_>, l: LocalId, op: BinaryOp) -> Result<()> {
    let rhs = env.pop_c()?;
    env.may_read_local(l);
    let loc = env.loc_as_cell(l)?;
    let result = match (loc.tv(), rhs.tv()) {
        (Some(a), Some(b)) => match op.eval(&a, &b) {
            // Strings and containers built at runtime are not literals.
            Ok(v) => {
                let t = Type::from_value(&v);
                if t.subtype_of_bits(TypeBits::STR | TypeBits::ARR_LIKE) {
                    t.loosen_values()
                } else {
                    t
                }
            }
            Err(_) => Type::INIT_CELL,
        },
        _ => op.result_type(&loc, &rhs),
    };
    env.set_loc(l, result.clone())?;
    env.push(result);
    Ok(())
}

fn inc_dec_type(op: IncDecOp, t: &Type) -> Type {
    let one = Type::int(1);
    if t.subtype_of(&Type::NUM) {
        let bop = if op.is_inc() { BinaryOp::Add } else { BinaryOp::Sub };
        bop.result_type(t, &one)
    } else if t.subtype_of(&Type::INIT_NULL) {
        // Decrementing null leaves it null.
        if op.is_inc() { one } else { Type::INIT_NULL }
    } else if t.subtype_of(&Type::BOOL) {
        t.clone()
    } else {
        Type::INIT_CELL
    }
}

pub(super) fn inc_dec(env: &mut Env<'_, '_>, l: LocalId, op: IncDecOp) -> Result<()> {
    env.may_read_local(l);
    let loc = env.loc_as_cell(l)?;
    let updated = inc_dec_type(op, &loc);
    // Incrementing a string may exceed the maximum string length.
    if !env.loc_could_be_uninit(l)? && !loc.could_be_bits(TypeBits::STR) {
        env.nothrow();
    }
    if !op.is_pre() {
        env.push(loc);
    }
    env.set_loc(l, updated.clone())?;
    if op.is_pre() {
        env.push(updated);
    }
    Ok(())
}

pub(super) fn unset(env: &mut Env<'_, '_>, l: LocalId) -> Result<()> {
    if env.loc_raw(l)?.subtype_of(&Type::UNINIT) {
        return reduce(env, &[Op::Nop]);
    }
    env.nothrow();
    env.set_loc_raw(l, Type::UNINIT)
}

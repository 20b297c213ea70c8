use std::collections::hash_map::Entry;
use std::sync::Arc;

use stackflow_bytecode::{BareThisOp, ClsRefSlotId, LocalId, Op};
use stackflow_types::Type;

use crate::calls::obj_cls;
use crate::collect::ConstantUse;
use crate::env::Env;
use crate::error::Result;
use crate::reduce::reduce;

// -- Static properties --------------------------------------------------------

/// The collected type of private static `name` when `cls` is certainly the
/// context class or one of its subclasses.
fn self_prop_of(env: &Env<'_, '_>, cls: &Type, name: &Type) -> Option<Type> {
    let self_t = env.self_cls_sub()?;
    let name = name.str_val()?;
    if !cls.subtype_of(&self_t) {
        return None;
    }
    env.interp.collect.self_prop(name).map(Type::to_cell)
}

pub(super) fn cget_s(env: &mut Env<'_, '_>, slot: ClsRefSlotId) -> Result<()> {
    let cls = env.take_cls_ref(slot)?;
    let name = env.pop_c()?;

    if let Some(t) = self_prop_of(env, &cls, &name) {
        // Private statics of the context class are always accessible.
        env.nothrow();
        // A subclass may shadow the property, which fails at runtime.
        if env.self_cls_exact().is_some_and(|e| cls.subtype_of(&e)) {
            env.constprop();
        }
        env.push(t);
        return Ok(());
    }

    let t = env.index().lookup_public_static(&cls, &name);
    if t.subtype_of(&Type::INIT_CELL) {
        if env.options().hard_const_prop {
            env.constprop();
        }
        env.push(t);
    } else {
        env.push(Type::INIT_CELL);
    }
    Ok(())
}

pub(super) fn set_s(env: &mut Env<'_, '_>, slot: ClsRefSlotId) -> Result<()> {
    let val = env.pop_c()?;
    let cls = env.take_cls_ref(slot)?;
    let name = env.pop_c()?;

    let may_be_self = match env.self_cls_sub() {
        None => true,
        Some(self_t) => cls.could_be(&self_t),
    };
    if may_be_self {
        match name.str_val() {
            Some(n) => {
                env.nothrow();
                env.collect().merge_self_prop(n, &val);
            }
            None => env
                .collect()
                .self_props
                .values_mut()
                .for_each(|t| *t = t.union(&val)),
        }
    }
    env.index().merge_public_static(&cls, &name, &val);
    env.push(val);
    Ok(())
}

fn null_test(t: &Type) -> Option<Type> {
    if t.subtype_of(&Type::NULL) {
        Some(Type::FALSE)
    } else if !t.could_be(&Type::NULL) {
        Some(Type::TRUE)
    } else {
        None
    }
}

pub(super) fn isset_s(env: &mut Env<'_, '_>, slot: ClsRefSlotId) -> Result<()> {
    let cls = env.take_cls_ref(slot)?;
    let name = env.pop_c()?;

    if let Some(result) = self_prop_of(env, &cls, &name).and_then(|t| null_test(&t)) {
        env.constprop();
        env.push(result);
        return Ok(());
    }

    let t = env.index().lookup_public_static(&cls, &name);
    if t.subtype_of(&Type::INIT_CELL) {
        if env.options().hard_const_prop {
            env.constprop();
        }
        if let Some(result) = null_test(&t) {
            env.push(result);
            return Ok(());
        }
    }
    env.push(Type::BOOL);
    Ok(())
}

// -- Class-ref slots ----------------------------------------------------------

/// The class named by, or of, a value of type `t`.
fn cls_of_value(env: &mut Env<'_, '_>, t: &Type) -> Type {
    if t.subtype_of(&Type::OBJ) {
        env.nothrow();
        return obj_cls(t);
    }
    t.str_val()
        .and_then(|name| env.index().resolve_class(name))
        .map_or(Type::CLS, Type::cls_exact)
}

pub(super) fn cls_ref_get_l(env: &mut Env<'_, '_>, l: LocalId, slot: ClsRefSlotId) -> Result<()> {
    if env.interp.state.this_loc_to_kill == Some(l) {
        return reduce(
            env,
            &[Op::BareThis(BareThisOp::Notice), Op::ClsRefGetC(slot)],
        );
    }
    env.may_read_local(l);
    let t = env.loc_as_cell(l)?;
    let cls = cls_of_value(env, &t);
    env.put_cls_ref(slot, cls)
}

pub(super) fn cls_ref_get_c(env: &mut Env<'_, '_>, slot: ClsRefSlotId) -> Result<()> {
    let t = env.pop_c()?;
    let cls = cls_of_value(env, &t);
    env.put_cls_ref(slot, cls)
}

pub(super) fn discard_cls_ref(env: &mut Env<'_, '_>, slot: ClsRefSlotId) -> Result<()> {
    env.nothrow();
    env.take_cls_ref(slot).map(drop)
}

pub(super) fn self_cls(env: &mut Env<'_, '_>, slot: ClsRefSlotId) -> Result<()> {
    let t = env.self_cls_exact().unwrap_or(Type::CLS);
    env.put_cls_ref(slot, t)
}

pub(super) fn parent_cls(env: &mut Env<'_, '_>, slot: ClsRefSlotId) -> Result<()> {
    let t = env.parent_cls_exact().unwrap_or(Type::CLS);
    env.put_cls_ref(slot, t)
}

pub(super) fn late_bound_cls(env: &mut Env<'_, '_>, slot: ClsRefSlotId) -> Result<()> {
    let t = env.self_cls_sub().unwrap_or(Type::CLS);
    env.put_cls_ref(slot, t)
}

// -- Constants ----------------------------------------------------------------

pub(super) fn cns(env: &mut Env<'_, '_>, name: &Arc<str>, fallback: Option<&Arc<str>>) -> Result<()> {
    if !env.options().hard_const_prop {
        env.push(Type::INIT_CELL);
        return Ok(());
    }
    let index = env.index();
    let t = index
        .lookup_constant(name)
        .or_else(|| fallback.and_then(|f| index.lookup_constant(f)));
    match t {
        Some(t) => {
            // Reading an undefined constant may autoload.
            if t.strict_subtype_of(&Type::INIT_CELL) {
                env.constprop();
            }
            env.push(t);
        }
        None => {
            // Make sure the next round of analysis finds an entry.
            let collect = env.collect();
            collect
                .cns_map
                .entry(name.clone())
                .or_insert(ConstantUse::ReadOnly);
            collect.reads_untracked_constants = true;
            env.push(Type::INIT_CELL);
        }
    }
    Ok(())
}

pub(super) fn def_cns(env: &mut Env<'_, '_>, name: &Arc<str>) -> Result<()> {
    let t = env.pop_c()?;
    if env.options().hard_const_prop {
        let value = t.tv();
        let cns_map = &mut env.collect().cns_map;
        match (cns_map.entry(name.clone()), value) {
            (Entry::Occupied(mut e), Some(v)) => {
                let next = match e.get() {
                    ConstantUse::ReadOnly => ConstantUse::Value(v),
                    _ => ConstantUse::Dynamic,
                };
                e.insert(next);
            }
            (Entry::Vacant(e), Some(v)) => {
                e.insert(ConstantUse::Value(v));
            }
            (Entry::Occupied(mut e), None) => {
                e.insert(ConstantUse::Dynamic);
            }
            (Entry::Vacant(e), None) => {
                e.insert(ConstantUse::Dynamic);
            }
        }
    }
    env.push(Type::BOOL);
    Ok(())
}

pub(super) fn cls_cns(env: &mut Env<'_, '_>, name: &Arc<str>, slot: ClsRefSlotId) -> Result<()> {
    let exact = env
        .peek_cls_ref(slot)?
        .dcls()
        .filter(|spec| spec.is_exact())
        .map(|spec| Arc::<str>::from(spec.cls.name()));
    if let Some(class) = exact {
        return reduce(
            env,
            &[
                Op::DiscardClsRef(slot),
                Op::ClsCnsD {
                    name: name.clone(),
                    class,
                },
            ],
        );
    }
    env.take_cls_ref(slot)?;
    env.push(Type::INIT_CELL);
    Ok(())
}

pub(super) fn cls_cns_d(env: &mut Env<'_, '_>, name: &Arc<str>, class: &Arc<str>) -> Result<()> {
    let Some(cls) = env.index().resolve_class(class) else {
        env.push(Type::INIT_CELL);
        return Ok(());
    };
    let t = env
        .index()
        .lookup_class_constant(&Type::cls_exact(cls), name);
    if env.options().hard_const_prop {
        env.constprop();
    }
    env.push(t);
    Ok(())
}

// -- $this --------------------------------------------------------------------

pub(super) fn this(env: &mut Env<'_, '_>) -> Result<()> {
    if env.interp.state.this_available {
        return reduce(env, &[Op::BareThis(BareThisOp::NeverNull)]);
    }
    let t = env.this_type().unwrap_or(Type::OBJ);
    env.push(t);
    env.set_this_available()
}

pub(super) fn bare_this(env: &mut Env<'_, '_>, subop: BareThisOp) -> Result<()> {
    if env.interp.state.this_available && subop != BareThisOp::NeverNull {
        return reduce(env, &[Op::BareThis(BareThisOp::NeverNull)]);
    }
    let t = env.this_type().unwrap_or(Type::OBJ);
    match subop {
        BareThisOp::Notice => {}
        BareThisOp::NoNotice => env.nothrow(),
        BareThisOp::NeverNull => {
            env.nothrow();
            env.set_this_available()?;
            env.push(t);
            return Ok(());
        }
    }
    env.push(t.opt());
    Ok(())
}

pub(super) fn check_this(env: &mut Env<'_, '_>) -> Result<()> {
    if env.interp.state.this_available {
        reduce(env, &[Op::Nop])?;
    }
    env.set_this_available()
}

/// `l` holds `$this`, or null when there is none.
pub(super) fn init_this_loc(env: &mut Env<'_, '_>, l: LocalId) -> Result<()> {
    env.set_loc_raw(l, Type::CELL)?;
    env.state().this_loc_to_kill = Some(l);
    Ok(())
}

#[cfg(test)]
mod tests {
    use stackflow_types::TypeBits;

    use super::*;

    #[test]
    fn null_tests_decide_only_certain_outcomes() {
        assert_eq!(null_test(&Type::INIT_NULL), Some(Type::FALSE));
        assert_eq!(null_test(&Type::INT), Some(Type::TRUE));
        assert_eq!(null_test(&Type::INT.union_bits(TypeBits::INIT_NULL)), None);
    }
}

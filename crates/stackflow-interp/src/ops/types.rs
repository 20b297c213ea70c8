use std::sync::Arc;

use stackflow_bytecode::{LocalId, Op};
use stackflow_index::CallContext;
use stackflow_types::query::type_of_istype;
use stackflow_types::{IsTypeOp, Type, TypeBits};

use crate::env::Env;
use crate::error::{InterpError, Result};
use crate::reduce::reduce;

/// Interfaces that strings, arrays or collections may satisfy without being
/// objects.
const NON_OBJECT_INTERFACES: [&str; 6] = [
    "Stringish",
    "XHPChild",
    "Traversable",
    "KeyedTraversable",
    "Container",
    "KeyedContainer",
];

pub(crate) fn supports_non_objects(name: &str) -> bool {
    NON_OBJECT_INTERFACES
        .iter()
        .any(|i| i.eq_ignore_ascii_case(name))
}

/// Push the outcome of testing a value of type `t` against `test`.
pub(super) fn push_type_test(env: &mut Env<'_, '_>, t: &Type, test: &Type) {
    env.constprop();
    env.push(if t.subtype_of(test) {
        Type::TRUE
    } else if !t.could_be(test) {
        Type::FALSE
    } else {
        Type::BOOL
    });
}

pub(super) fn is_type_c(env: &mut Env<'_, '_>, test: IsTypeOp) -> Result<()> {
    env.nothrow();
    let t = env.pop_c()?;
    push_type_test(env, &t, &type_of_istype(test));
    Ok(())
}

/// Test the value on top of the stack for being uninitialized, leaving it in
/// place.
pub(super) fn is_uninit(env: &mut Env<'_, '_>) -> Result<()> {
    env.nothrow();
    let t = env.top_t(0)?.clone();
    push_type_test(env, &t, &Type::UNINIT);
    Ok(())
}

pub(super) fn instance_of_d(env: &mut Env<'_, '_>, name: &Arc<str>) -> Result<()> {
    let t = env.top_t(0)?.to_cell();
    let cls = env.index().resolve_class(name);
    let Some(cls) = cls.filter(|_| !supports_non_objects(name)) else {
        env.pop_c()?;
        env.push(Type::BOOL);
        return Ok(());
    };

    let test = Type::obj_sub(cls);
    let result = if t.subtype_of(&test) {
        Type::TRUE
    } else if !t.could_be(&test) {
        Type::FALSE
    } else if t.is_opt() && t.unopt().subtype_of(&test) {
        return reduce(env, &[Op::IsTypeC(IsTypeOp::Null), Op::Not]);
    } else {
        Type::BOOL
    };
    env.nothrow();
    if result != Type::BOOL {
        env.constprop();
    }
    env.pop_c()?;
    env.push(result);
    Ok(())
}

pub(super) fn instance_of(env: &mut Env<'_, '_>) -> Result<()> {
    let t = env.top_t(0)?;
    if let Some(name) = t.str_val() {
        let name: Arc<str> = name.into();
        return reduce(env, &[Op::PopC, Op::InstanceOfD(name)]);
    }
    if t.subtype_of(&Type::OBJ) {
        if let Some(spec) = t.dobj().filter(|s| s.is_exact()) {
            let name: Arc<str> = spec.cls.name().into();
            return reduce(env, &[Op::PopC, Op::InstanceOfD(name)]);
        }
    }
    env.discard(2)?;
    env.push(Type::BOOL);
    Ok(())
}

/// The type the memoized implementation behind the current wrapper returns
/// for the wrapper's arguments.
pub(crate) fn memoize_impl_ret_type(env: &Env<'_, '_>) -> Result<Type> {
    let func = env.func();
    let index = env.index();
    let impl_name = func.memoize_impl_name();
    let callee = match env.self_cls() {
        Some(cls) => {
            let cls_t = env.self_cls_exact().unwrap_or(Type::CLS);
            index.resolve_method(Some(cls), &cls_t, &impl_name)
        }
        None => index.resolve_func(&impl_name),
    };

    let args = (0..func.params.len())
        .map(|i| env.loc_as_cell(LocalId::new(i as u32)))
        .collect::<Result<Vec<_>>>()?;
    let context = match env.self_cls() {
        None => Type::BOTTOM,
        Some(_) if func.is_static() => env.self_cls_exact().unwrap_or(Type::CLS),
        Some(_) => env.this_type().unwrap_or(Type::OBJ),
    };

    let ret = index.lookup_return_type(&CallContext { args, context }, &callee);
    Ok(if ret.subtype_of(&Type::INIT_CELL) {
        ret
    } else {
        Type::INIT_CELL
    })
}

/// `IsMemoType` (`maybe == false`) or `MaybeMemoType`: whether a cached
/// value may be, or certainly is, of the memoized implementation's type.
pub(super) fn memo_type(env: &mut Env<'_, '_>, maybe: bool) -> Result<()> {
    env.nothrow();
    env.constprop();
    let memo = memoize_impl_ret_type(env)?;
    let t = env.pop_c()?;
    let outcome = if maybe {
        t.could_be(&memo)
    } else {
        memo.subtype_of(&t)
    };
    env.push(Type::bool(outcome));
    Ok(())
}

pub(super) fn ak_exists(env: &mut Env<'_, '_>) -> Result<()> {
    let base = env.pop_c()?;
    let key = env.pop_c()?;

    let base_ok = [
        TypeBits::OBJ,
        TypeBits::ARR,
        TypeBits::VEC,
        TypeBits::DICT,
        TypeBits::KEYSET,
    ]
    .iter()
    .any(|b| base.subtype_of_bits(*b));
    let may_throw = if !base_ok {
        true
    } else if key.subtype_of_bits(TypeBits::STR) || key.subtype_of_bits(TypeBits::NULL) {
        // Legacy containers warn about non-int keys in compat mode.
        (base.subtype_of_bits(TypeBits::OBJ) || base.subtype_of_bits(TypeBits::ARR))
            && env.options().hack_arr_compat_notices
    } else {
        !key.subtype_of_bits(TypeBits::INT)
    };
    if !may_throw {
        env.nothrow();
    }
    env.push(Type::BOOL);
    Ok(())
}

// -- Verification -------------------------------------------------------------

pub(super) fn verify_param(env: &mut Env<'_, '_>, l: LocalId) -> Result<()> {
    let func = env.func();
    let hard = env.options().hard_type_hints;
    if func.is_memoize_impl() && hard && !env.loc_raw(l)?.could_be_bits(TypeBits::REF) {
        return reduce(env, &[Op::Nop]);
    }
    let param = func
        .params
        .get(l.index())
        .ok_or(InterpError::LocalOutOfRange(l))?;
    let constraint = &param.constraint;
    let loc = env.loc_as_cell(l)?;
    let index = env.index();
    if index.satisfies_constraint(env.self_cls(), &loc, constraint) {
        return reduce(env, &[Op::Nop]);
    }
    if !hard || !constraint.has_constraint() {
        return Ok(());
    }
    if constraint.is_this() && !env.options().hard_return_type_hints {
        return Ok(());
    }

    let t = index.lookup_constraint(env.self_cls(), constraint);
    if t.is_bottom() {
        env.unreachable();
    }
    env.set_loc(l, t)
}

/// Whether a failed return check is known to throw, so that a passing check
/// may narrow the returned value.
fn return_check_narrows(env: &Env<'_, '_>) -> bool {
    env.options().hard_return_type_hints && !env.func().ret_constraint.is_soft()
}

pub(super) fn verify_ret(env: &mut Env<'_, '_>) -> Result<()> {
    let constraint = &env.func().ret_constraint;
    let index = env.index();
    let stack_t = env.top_t(0)?.to_cell();
    if index.satisfies_constraint(env.self_cls(), &stack_t, constraint) {
        return reduce(env, &[Op::Nop]);
    }
    if !return_check_narrows(env) {
        return Ok(());
    }

    // A nullable `$this` passes once it is known not to be null.
    if constraint.is_this()
        && !constraint.is_nullable()
        && stack_t.is_opt()
        && index.satisfies_constraint(env.self_cls(), &stack_t.unopt(), constraint)
    {
        return reduce(env, &[Op::VerifyRetNonNullC]);
    }

    let mut tc = index
        .lookup_constraint(env.self_cls(), constraint)
        .remove_uninit();
    // Narrowing to an interface could widen a value already known to be a
    // more precise class.
    if tc.dobj().is_some_and(|spec| spec.cls.is_interface()) {
        tc = if tc.is_opt() { Type::OBJ.opt() } else { Type::OBJ };
    }

    let ret = tc.intersect(&stack_t);
    if ret.is_bottom() {
        env.unreachable();
        return Ok(());
    }
    env.pop_c()?;
    env.push(ret);
    Ok(())
}

pub(super) fn verify_ret_non_null(env: &mut Env<'_, '_>) -> Result<()> {
    if !return_check_narrows(env) {
        return Ok(());
    }
    let stack_t = env.top_t(0)?.to_cell();
    if !stack_t.is_opt() {
        return reduce(env, &[Op::Nop]);
    }
    env.pop_c()?;
    env.push(stack_t.unopt());
    Ok(())
}

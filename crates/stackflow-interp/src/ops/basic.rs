use stackflow_bytecode::Op;
use stackflow_types::ops::{append_type, bit_not_may_throw, bit_not_type};
use stackflow_types::query::{could_be_nan, emptiness, iter_types, type_same};
use stackflow_types::{
    ArrayKey, BinaryOp, CastKind, CmpOp, Data, Emptiness, Type, TypeBits, Value, eval,
};

use crate::env::Env;
use crate::error::Result;
use crate::options::CollectionOpts;
use crate::reduce::reduce;
use crate::state::StackEquiv;

// -- Stack shuffling ----------------------------------------------------------

pub(super) fn nop(env: &mut Env<'_, '_>) -> Result<()> {
    env.effect_free();
    Ok(())
}

pub(super) fn pop_c(env: &mut Env<'_, '_>) -> Result<()> {
    let t = env.pop()?;
    // Dropping the last reference to an object may run its destructor.
    if !t.could_be_bits(TypeBits::OBJ | TypeBits::RES | TypeBits::REF) {
        env.effect_free();
    }
    Ok(())
}

pub(super) fn dup(env: &mut Env<'_, '_>) -> Result<()> {
    env.effect_free();
    let top = env.pop_elem()?;
    let ty = top.ty.to_cell();
    env.push_equiv(ty.clone(), top.equiv);
    env.push_equiv(ty, StackEquiv::Dup);
    Ok(())
}

// -- Literals and containers --------------------------------------------------

pub(super) fn push_literal(env: &mut Env<'_, '_>, v: Value) -> Result<()> {
    env.effect_free();
    env.push(Type::from_value(&v));
    Ok(())
}

pub(super) fn new_array(env: &mut Env<'_, '_>, capacity: u32) -> Result<()> {
    if capacity == 0 {
        env.effect_free();
    }
    env.push(Type::arr_empty());
    Ok(())
}

pub(super) fn new_dict_array(env: &mut Env<'_, '_>, capacity: u32) -> Result<()> {
    if capacity == 0 {
        env.effect_free();
    }
    env.push(Type::dict_empty());
    Ok(())
}

fn pop_cells(env: &mut Env<'_, '_>, n: u32) -> Result<Vec<Type>> {
    Ok(env
        .pop_n(n as usize)?
        .iter()
        .map(Type::to_cell)
        .collect())
}

pub(super) fn new_packed_array(env: &mut Env<'_, '_>, n: u32) -> Result<()> {
    let elems = pop_cells(env, n)?;
    env.constprop();
    env.push(Type::arr_packed(elems));
    Ok(())
}

pub(super) fn new_vec_array(env: &mut Env<'_, '_>, n: u32) -> Result<()> {
    let elems = pop_cells(env, n)?;
    env.constprop();
    env.push(Type::vec(elems));
    Ok(())
}

pub(super) fn new_struct_dict(env: &mut Env<'_, '_>, keys: &[std::sync::Arc<str>]) -> Result<()> {
    let vals = pop_cells(env, keys.len() as u32)?;
    let entries = keys
        .iter()
        .map(|k| ArrayKey::Str(k.clone()))
        .zip(vals)
        .collect();
    env.constprop();
    env.push(Type::dict(entries));
    Ok(())
}

pub(super) fn new_keyset_array(env: &mut Env<'_, '_>, n: u32) -> Result<()> {
    let elems = pop_cells(env, n)?;
    let mut literal_keys: Option<Vec<ArrayKey>> = Some(Vec::new());
    let mut union = Type::BOTTOM;
    let mut bad = false;
    for t in &elems {
        let key = t.intersect(&Type::ARR_KEY);
        if key.is_bottom() {
            bad = true;
        }
        literal_keys = literal_keys.and_then(|mut keys| {
            let k = match key.tv()? {
                Value::Int(i) => ArrayKey::Int(i),
                Value::Str(s) => ArrayKey::Str(s),
                _ => return None,
            };
            if !keys.contains(&k) {
                keys.push(k);
            }
            Some(keys)
        });
        union = union.union(&key);
    }

    if bad {
        env.unreachable();
        env.push(Type::BOTTOM);
        return Ok(());
    }
    match literal_keys {
        Some(keys) => {
            env.constprop();
            env.push(Type::keyset(keys));
        }
        None => env.push(Type::keyset_n(union)),
    }
    Ok(())
}

/// `c` (a legacy array or a dict) with `key` set to `val`, and whether the
/// store is silent.
fn container_set(c: &Type, key: &Type, val: &Type) -> (Type, bool) {
    if let (Some(cv), Some(kv), Some(vv)) = (c.tv(), key.tv(), val.tv()) {
        if let Ok(r) = eval::set_elem(&cv, &kv, vv) {
            return (Type::from_value(&r), true);
        }
    }

    let is_dict = c.subtype_of(&Type::DICT);
    let silent = key.subtype_of(&Type::ARR_KEY);
    let literal_key = key.tv().and_then(|k| {
        if is_dict {
            eval::to_hack_key(&k).ok()
        } else {
            eval::to_arr_key(&k).ok()
        }
    });
    let known_entries = match c.data() {
        Some(Data::Map(entries)) => Some(entries.clone()),
        Some(Data::Packed(elems)) => Some(
            elems
                .iter()
                .enumerate()
                .map(|(i, t)| (ArrayKey::Int(i as i64), t.clone()))
                .collect::<Vec<_>>(),
        ),
        _ => None,
    };
    if let (Some(k), Some(mut entries)) = (literal_key, known_entries) {
        match entries.iter_mut().find(|(ek, _)| *ek == k) {
            Some(slot) => slot.1 = val.clone(),
            None => entries.push((k, val.clone())),
        }
        let t = if is_dict {
            Type::dict(entries)
        } else {
            Type::arr_map(entries)
        };
        return (t, silent);
    }

    let key = if silent {
        key.clone()
    } else if is_dict {
        key.intersect(&Type::ARR_KEY)
    } else {
        Type::ARR_KEY
    };
    if key.is_bottom() {
        return (Type::BOTTOM, false);
    }
    let existing = iter_types(c);
    let key = existing.key.union(&key);
    let val = existing.value.union(val);
    let t = if is_dict {
        Type::dict_n(key, val)
    } else {
        Type::arr_n(key, val)
    };
    (t, silent)
}

pub(super) fn add_elem(env: &mut Env<'_, '_>) -> Result<()> {
    let v = env.pop_c()?;
    let k = env.pop_c()?;
    let c = env.pop_c()?;
    if !c.subtype_of(&Type::ARR) && !c.subtype_of(&Type::DICT) {
        env.push(Type::ARR.union(&Type::DICT));
        return Ok(());
    }

    let (out, silent) = container_set(&c, &k, &v);
    if out.is_bottom() {
        env.unreachable();
    } else if env.collect().opts.contains(CollectionOpts::TRACK_CONSTANT_ARRAYS) {
        env.constprop();
    }
    if silent {
        env.nothrow();
    }
    env.push(out);
    Ok(())
}

pub(super) fn add_new_elem(env: &mut Env<'_, '_>) -> Result<()> {
    let v = env.pop_c()?;
    let c = env.pop_c()?;
    let appendable = [Type::ARR, Type::VEC, Type::KEYSET]
        .iter()
        .any(|kind| c.subtype_of(kind));
    if !appendable {
        env.push(Type::INIT_CELL);
        return Ok(());
    }

    let out = append_type(&c, &v);
    if out.is_bottom() {
        env.unreachable();
    } else if env.collect().opts.contains(CollectionOpts::TRACK_CONSTANT_ARRAYS) {
        env.constprop();
    }
    env.push(out);
    Ok(())
}

// -- Arithmetic ---------------------------------------------------------------

pub(super) fn arith(env: &mut Env<'_, '_>, op: BinaryOp) -> Result<()> {
    env.constprop();
    let t1 = env.pop_c()?;
    let t2 = env.pop_c()?;
    if !op.may_throw(&t2, &t1) {
        env.nothrow();
    }
    env.push(op.result_type(&t2, &t1));
    Ok(())
}

/// Number of operands from the top of the stack, up to `n`, that are
/// literals with a string form, and the concatenation of those strings.
fn literal_concat_prefix(env: &Env<'_, '_>, n: usize) -> Result<(usize, String)> {
    let mut parts = Vec::new();
    for depth in 0..n {
        let part = env
            .top_t(depth)?
            .tv()
            .filter(|v| !v.is_array_like())
            .and_then(|v| eval::to_string(&v).ok());
        match part {
            Some(s) => parts.push(s),
            None => break,
        }
    }
    let folded = parts.iter().rev().map(|s| &**s).collect();
    Ok((parts.len(), folded))
}

/// Replace the top `folded` literal operands of a concatenation of `n` with
/// their concatenation.
fn fold_concat(env: &mut Env<'_, '_>, n: usize, folded: usize, s: &str) -> Result<()> {
    let mut ops = vec![Op::PopC; folded];
    ops.push(Op::string(s));
    if folded < n {
        let rest = n - folded + 1;
        ops.push(if rest == 2 {
            Op::Concat
        } else {
            Op::ConcatN(rest as u32)
        });
    }
    reduce(env, &ops)
}

pub(super) fn concat(env: &mut Env<'_, '_>) -> Result<()> {
    let (folded, s) = literal_concat_prefix(env, 2)?;
    if folded == 2 {
        return fold_concat(env, 2, folded, &s);
    }
    let t1 = env.pop_c()?;
    let t2 = env.pop_c()?;
    if !BinaryOp::Concat.may_throw(&t2, &t1) {
        env.nothrow();
    }
    env.push(BinaryOp::Concat.result_type(&t2, &t1));
    Ok(())
}

pub(super) fn concat_n(env: &mut Env<'_, '_>, n: u32) -> Result<()> {
    let n = n as usize;
    let (folded, s) = literal_concat_prefix(env, n)?;
    if folded >= 2 {
        return fold_concat(env, n, folded, &s);
    }
    if n == 2 {
        return reduce(env, &[Op::Concat]);
    }
    let parts = pop_cells(env, n as u32)?;
    if parts.iter().all(|t| t.subtype_of(&Type::INIT_UNC)) {
        env.nothrow();
    }
    env.push(Type::STR);
    Ok(())
}

pub(super) fn xor(env: &mut Env<'_, '_>) -> Result<()> {
    let t1 = env.pop_c()?;
    let t2 = env.pop_c()?;
    env.nothrow();
    match (t1.tv(), t2.tv()) {
        (Some(a), Some(b)) => {
            env.constprop();
            env.push(Type::bool(eval::to_bool(&a) ^ eval::to_bool(&b)));
        }
        _ => env.push(Type::BOOL),
    }
    Ok(())
}

pub(super) fn bit_not(env: &mut Env<'_, '_>) -> Result<()> {
    let t = env.pop_c()?;
    if let Some(r) = t.tv().and_then(|v| eval::bit_not(&v).ok()) {
        env.constprop();
        env.nothrow();
        env.push(Type::from_value(&r));
        return Ok(());
    }
    if !bit_not_may_throw(&t) {
        env.nothrow();
    }
    env.push(bit_not_type(&t));
    Ok(())
}

// -- Comparisons --------------------------------------------------------------

/// Values compared with `Same` are interchangeable only if neither could be
/// NaN.
pub(crate) fn nan_free(a: &Type, b: &Type) -> bool {
    !could_be_nan(a) && !could_be_nan(b)
}

/// The result type of `Same` on the top two stack slots, and whether the
/// comparison may raise a notice.
///
/// Slots known to hold the same local, or a duplicate of the slot beneath,
/// are identical unless a NaN could be involved.
pub(crate) fn resolve_same(env: &Env<'_, '_>) -> Result<(Type, bool)> {
    let e1 = env.top_elem(0)?;
    let e2 = env.top_elem(1)?;
    let t1 = e1.ty.to_cell();
    let t2 = e2.ty.to_cell();

    let might_warn = env.options().hack_arr_compat_notices
        && ((t1.could_be_bits(TypeBits::ARR) && t2.could_be_bits(TypeBits::HACK_ARR))
            || (t2.could_be_bits(TypeBits::ARR) && t1.could_be_bits(TypeBits::HACK_ARR)));

    let identical = match (e1.equiv, e2.equiv) {
        (StackEquiv::Dup, _) => true,
        (StackEquiv::Local(a), StackEquiv::Local(b)) => a == b || env.locs_are_equiv(a, b),
        _ => false,
    };
    if identical && nan_free(&t1, &t2) {
        return Ok((Type::TRUE, might_warn));
    }
    Ok((type_same(&t2, &t1), might_warn))
}

fn negate_bool(t: &Type) -> Type {
    if *t == Type::TRUE {
        Type::FALSE
    } else if *t == Type::FALSE {
        Type::TRUE
    } else {
        Type::BOOL
    }
}

pub(super) fn same(env: &mut Env<'_, '_>, negate: bool) -> Result<()> {
    let (result, might_warn) = resolve_same(env)?;
    env.discard(2)?;
    if !might_warn {
        env.nothrow();
        env.constprop();
    }
    env.push(if negate { negate_bool(&result) } else { result });
    Ok(())
}

fn bin_op_bool(env: &mut Env<'_, '_>, op: CmpOp) -> Result<()> {
    let t1 = env.pop_c()?;
    let t2 = env.pop_c()?;
    let result = op.result_type(&t2, &t1);
    if result.is_scalar() {
        env.constprop();
    }
    if !op.may_throw(&t2, &t1) {
        env.nothrow();
    }
    env.push(result);
    Ok(())
}

pub(super) fn loose_eq(env: &mut Env<'_, '_>, negate: bool) -> Result<()> {
    let (result, might_warn) = resolve_same(env)?;
    if result == Type::TRUE {
        if !might_warn {
            env.nothrow();
            env.constprop();
        }
        env.discard(2)?;
        env.push(Type::bool(!negate));
        return Ok(());
    }
    bin_op_bool(env, if negate { CmpOp::Neq } else { CmpOp::Eq })
}

pub(super) fn compare(env: &mut Env<'_, '_>, op: CmpOp) -> Result<()> {
    bin_op_bool(env, op)
}

// -- Casts --------------------------------------------------------------------

/// Truthiness of the popped value, negated for `Not`.
pub(crate) fn cast_bool(env: &mut Env<'_, '_>, negate: bool) -> Result<()> {
    env.nothrow();
    env.constprop();
    let t = env.pop_c()?;
    env.push(match emptiness(&t) {
        Emptiness::Empty => Type::bool(negate),
        Emptiness::NonEmpty => Type::bool(!negate),
        Emptiness::Maybe => Type::BOOL,
    });
    Ok(())
}

/// A cast that cannot change its operand is a constant `Nop`.
fn identity_cast(env: &mut Env<'_, '_>) -> Result<()> {
    reduce(env, &[Op::Nop])?;
    env.constprop();
    Ok(())
}

pub(super) fn cast_to_bool(env: &mut Env<'_, '_>) -> Result<()> {
    if CastKind::Bool.is_identity_on(env.top_t(0)?) {
        return identity_cast(env);
    }
    cast_bool(env, false)
}

pub(super) fn cast_to_int(env: &mut Env<'_, '_>) -> Result<()> {
    if CastKind::Int.is_identity_on(env.top_t(0)?) {
        return identity_cast(env);
    }
    env.constprop();
    let t = env.pop_c()?;
    // Objects convert with a notice.
    if !t.could_be_bits(TypeBits::OBJ) {
        env.nothrow();
    }
    env.push(CastKind::Int.result_type(&t));
    Ok(())
}

pub(super) fn cast(env: &mut Env<'_, '_>, kind: CastKind) -> Result<()> {
    if kind.is_identity_on(env.top_t(0)?) {
        return identity_cast(env);
    }
    let t = env.pop_c()?;
    let result = kind.result_type(&t);
    if t.is_scalar() && result.is_scalar() {
        env.constprop();
    }
    if !kind.may_throw(&t) {
        env.nothrow();
    }
    env.push(result);
    Ok(())
}

// -- Output and exceptions ----------------------------------------------------

pub(super) fn print(env: &mut Env<'_, '_>) -> Result<()> {
    env.pop_c()?;
    env.push(Type::int(1));
    Ok(())
}

pub(super) fn clone(env: &mut Env<'_, '_>) -> Result<()> {
    let t = env.pop_c()?;
    env.push(if t.subtype_of(&Type::OBJ) {
        t
    } else if t.is_opt() {
        t.unopt()
    } else {
        Type::OBJ
    });
    Ok(())
}

pub(super) fn exit(env: &mut Env<'_, '_>) -> Result<()> {
    env.pop_c()?;
    env.push(Type::INIT_NULL);
    env.unreachable();
    Ok(())
}

pub(super) fn throw(env: &mut Env<'_, '_>) -> Result<()> {
    env.pop_c()?;
    env.unreachable();
    Ok(())
}

pub(super) fn catch(env: &mut Env<'_, '_>) -> Result<()> {
    env.nothrow();
    let t = env
        .index()
        .builtin_class("Throwable")
        .map(Type::obj_sub)
        .unwrap_or(Type::OBJ);
    env.push(t);
    Ok(())
}

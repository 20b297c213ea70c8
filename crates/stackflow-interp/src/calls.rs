//! Call-site resolution.
//!
//! A call is made of a push instruction, which records the callee in an
//! [`ActRec`] on the fpi stack, and a call instruction, which pops the
//! arguments and the record and pushes the return type the index infers.
//! Between the two the callee can only become more precise: call
//! instructions re-issue themselves with the sharper identity when it has.
//!
//! Calls to foldable functions with literal arguments are evaluated at
//! analysis time and replaced by the literal result. A failed attempt is
//! remembered in [`CollectedInfo`](crate::CollectedInfo) so the push is not
//! marked foldable again.

use std::sync::Arc;

use stackflow_bytecode::{ClsRefSlotId, Op, SpecialClsRef};
use stackflow_index::{CallContext, FuncRef};
use stackflow_types::{Data, Type, TypeBits, Value};

use crate::collect::ConstantUse;
use crate::env::{Env, Location};
use crate::error::Result;
use crate::options::CollectionOpts;
use crate::reduce::{impl_only, reduce};
use crate::state::{ActRec, FpiKind};

/// Callees that may assign the caller's locals by name.
const WRITES_CALLER_FRAME: [&str; 2] = ["extract", "parse_str"];
/// Callees that may read the caller's locals by name.
const READS_CALLER_FRAME: [&str; 2] = ["compact", "get_defined_vars"];

// ============================================================================
// Helpers
// ============================================================================

/// The class type of objects of type `t`.
pub(crate) fn obj_cls(t: &Type) -> Type {
    match t.dobj() {
        Some(spec) if spec.is_exact() => Type::cls_exact(spec.cls.clone()),
        Some(spec) => Type::cls_sub(spec.cls.clone()),
        None => Type::CLS,
    }
}

/// The object type of instances of class type `t`.
fn cls_obj(t: &Type) -> Type {
    match t.dcls() {
        Some(spec) if spec.is_exact() => Type::obj_exact(spec.cls.clone()),
        Some(spec) => Type::obj_sub(spec.cls.clone()),
        None => Type::OBJ,
    }
}

fn special_cls(env: &Env<'_, '_>, r: SpecialClsRef) -> Type {
    if env.self_cls().is_none() {
        return Type::CLS;
    }
    let t = match r {
        SpecialClsRef::Static => env.self_cls_sub(),
        SpecialClsRef::SelfCls => env.self_cls_exact(),
        SpecialClsRef::Parent => env.parent_cls_exact(),
    };
    t.unwrap_or(Type::CLS)
}

fn callee_frame_effects(env: &mut Env<'_, '_>, func: &FuncRef) {
    if WRITES_CALLER_FRAME.iter().any(|n| func.is_named(n)) {
        env.read_unknown_locals();
        env.kill_locals();
    } else if READS_CALLER_FRAME.iter().any(|n| func.is_named(n)) {
        env.read_unknown_locals();
    }
}

/// Effects of the call described by `ar` on the calling frame.
fn special_function_effects(env: &mut Env<'_, '_>, ar: &ActRec) {
    match ar.kind {
        FpiKind::Func | FpiKind::Unknown | FpiKind::Builtin => {
            let Some(func) = &ar.func else {
                if ar.kind != FpiKind::Builtin {
                    // Any function may be called, including the ones above.
                    env.read_unknown_locals();
                    env.kill_locals();
                }
                return;
            };
            callee_frame_effects(env, func);
            if let Some(fallback) = &ar.fallback_func {
                callee_frame_effects(env, fallback);
            }
        }
        FpiKind::ObjMeth
        | FpiKind::ClsMeth
        | FpiKind::Ctor
        | FpiKind::CallableArr
        | FpiKind::ObjInvoke => {}
    }
}

/// `defined("X")` suggests `X` is meant to be defined at runtime.
fn note_defined(env: &mut Env<'_, '_>, func: &FuncRef, args: &[Type]) {
    if !env.options().hard_const_prop || args.len() != 1 || !func.is_named("defined") {
        return;
    }
    let Some(name) = args[0].str_val() else {
        return;
    };
    if env.index().lookup_constant(name).is_none() {
        env.collect()
            .cns_map
            .insert(name.into(), ConstantUse::Dynamic);
    }
}

/// Pop `n` arguments, bottom-most first.
fn pop_args(env: &mut Env<'_, '_>, n: u32) -> Result<Vec<Type>> {
    Ok(env
        .pop_n(n as usize)?
        .iter()
        .map(Type::to_cell)
        .collect())
}

/// Push the result of a call returning `ty`. With `num_rets`, the call
/// returns several values as a tuple and first pops the `num_rets - 1`
/// slots reserved for them.
fn push_call_return_type(env: &mut Env<'_, '_>, ty: Type, num_rets: Option<u32>) -> Result<()> {
    if ty.is_bottom() {
        // The callee never returns.
        env.unreachable();
    }
    let Some(n) = num_rets else {
        env.push(ty);
        return Ok(());
    };
    env.discard(n.saturating_sub(1) as usize)?;
    let elems = match ty.data() {
        Some(Data::Packed(elems))
            if ty.subtype_of_bits(TypeBits::VEC) && elems.len() == n as usize =>
        {
            Some(elems.clone())
        }
        _ => None,
    };
    match elems {
        // The first element ends up on top.
        Some(elems) => {
            elems.iter().skip(1).for_each(|e| env.push(e.clone()));
            if let Some(first) = elems.first() {
                env.push(first.clone());
            }
        }
        None => (0..n).for_each(|_| env.push(Type::INIT_CELL)),
    }
    Ok(())
}

/// Evaluate a call to `func` on the `n` arguments on top of the stack, when
/// they are literals and the call succeeds.
fn try_fold(env: &Env<'_, '_>, func: &FuncRef, n: u32) -> Result<Option<Value>> {
    let Some(info) = func.exact() else {
        return Ok(None);
    };
    let args = (0..n as usize)
        .rev()
        .map(|depth| env.top_t(depth).map(Type::to_cell))
        .collect::<Result<Vec<_>>>()?;
    if args.iter().any(|a| a.tv().is_none()) {
        return Ok(None);
    }
    Ok(env.index().lookup_foldable_return_type(info, &args).tv())
}

/// Replace a call by the literal it evaluates to.
fn fold_to(env: &mut Env<'_, '_>, num_args: u32, v: &Value) -> Result<()> {
    let mut ops = vec![Op::PopC; num_args as usize];
    ops.push(Op::literal(v));
    reduce(env, &ops)
}

/// A call marked foldable could not be evaluated: remember it and push the
/// uninhabited type until the push block is analyzed again.
fn fold_failed(env: &mut Env<'_, '_>, num_args: u32, num_rets: u32) -> Result<()> {
    env.fpi_not_foldable()?;
    env.fpi_pop()?;
    env.discard((num_args + num_rets.saturating_sub(1)) as usize)?;
    (0..num_rets).for_each(|_| env.push(Type::BOTTOM));
    Ok(())
}

// ============================================================================
// Push phase
// ============================================================================

pub(crate) fn fpush_func_d(env: &mut Env<'_, '_>, _num_args: u32, name: &Arc<str>) -> Result<()> {
    let func = env.index().resolve_func(name);
    if func.is_builtin() {
        env.fpi_push(ActRec::new(FpiKind::Builtin, Type::BOTTOM).with_func(Some(func)));
        return reduce(env, &[Op::Nop]);
    }
    if env.fpi_push(ActRec::new(FpiKind::Func, Type::BOTTOM).with_func(Some(func))) {
        return reduce(env, &[Op::Nop]);
    }
    Ok(())
}

pub(crate) fn fpush_func(env: &mut Env<'_, '_>, num_args: u32) -> Result<()> {
    let t = env.top_t(0)?.to_cell();
    if let Some(name) = t.str_val() {
        // Class-method pairs are resolved at runtime.
        if !name.contains("::") {
            let name: Arc<str> = name.into();
            return reduce(env, &[Op::PopC, Op::FPushFuncD { num_args, name }]);
        }
    }
    env.pop_c()?;
    let ar = if t.subtype_of(&Type::OBJ) {
        ActRec::new(FpiKind::ObjInvoke, t)
    } else if t.subtype_of(&Type::ARR) {
        ActRec::new(FpiKind::CallableArr, Type::TOP)
    } else if t.subtype_of(&Type::STR) {
        ActRec::new(FpiKind::Func, Type::TOP)
    } else {
        ActRec::new(FpiKind::Unknown, Type::TOP)
    };
    env.fpi_push(ar);
    Ok(())
}

pub(crate) fn fpush_func_u(
    env: &mut Env<'_, '_>,
    num_args: u32,
    name: &Arc<str>,
    fallback: &Arc<str>,
) -> Result<()> {
    let index = env.index();
    let fallback_func = index.resolve_func_fallback(name, fallback);
    if env.options().elide_autoload_invokes && fallback_func.is_none() {
        return reduce(
            env,
            &[Op::FPushFuncD {
                num_args,
                name: name.clone(),
            }],
        );
    }
    let func = index.resolve_func(name);
    env.fpi_push(
        ActRec::new(FpiKind::Func, Type::BOTTOM)
            .with_func(Some(func))
            .with_fallback(fallback_func),
    );
    Ok(())
}

pub(crate) fn fpush_obj_method_d(
    env: &mut Env<'_, '_>,
    _num_args: u32,
    method: &Arc<str>,
    null_safe: bool,
) -> Result<()> {
    let mut t = env.top_t(0)?.to_cell();
    let receiver = if null_safe {
        Type::OBJ.opt()
    } else {
        Type::OBJ
    };
    if !t.could_be(&receiver) {
        env.fpi_push(ActRec::new(FpiKind::ObjMeth, t));
        env.pop_c()?;
        env.unreachable();
        return Ok(());
    }
    if !null_safe && t.is_opt() {
        t = t.unopt();
    }

    let cls_t = obj_cls(&t);
    let cls = cls_t.dcls().map(|spec| spec.cls.clone());
    let func = env.index().resolve_method(env.self_cls(), &cls_t, method);
    let ar = ActRec::new(FpiKind::ObjMeth, t)
        .with_cls(cls)
        .with_func(Some(func));
    if env.fpi_push(ar) {
        return reduce(env, &[Op::PopC]);
    }

    // Past the push the receiver is known to be an object.
    let location = Location::of(env.top_equiv()?);
    env.pop_c()?;
    if let Some(loc) = location {
        env.refine_at(loc, &|t| t.intersect(&receiver))?;
    }
    Ok(())
}

pub(crate) fn fpush_obj_method(env: &mut Env<'_, '_>, num_args: u32, null_safe: bool) -> Result<()> {
    if let Some(name) = env.top_t(0)?.str_val() {
        let method: Arc<str> = name.into();
        return reduce(
            env,
            &[
                Op::PopC,
                Op::FPushObjMethodD {
                    num_args,
                    method,
                    null_safe,
                },
            ],
        );
    }
    env.pop_c()?;
    let receiver = env.pop_c()?;
    let cls = obj_cls(&receiver).dcls().map(|spec| spec.cls.clone());
    env.fpi_push(ActRec::new(FpiKind::ObjMeth, receiver).with_cls(cls));
    Ok(())
}

pub(crate) fn fpush_cls_method_d(
    env: &mut Env<'_, '_>,
    _num_args: u32,
    method: &Arc<str>,
    class: &Arc<str>,
) -> Result<()> {
    let index = env.index();
    let cls = index.resolve_class(class);
    let cls_t = cls.clone().map_or(Type::CLS, Type::cls_exact);
    let func = index.resolve_method(env.self_cls(), &cls_t, method);
    let ar = ActRec::new(FpiKind::ClsMeth, cls_t)
        .with_cls(cls)
        .with_func(Some(func));
    if env.fpi_push(ar) {
        return reduce(env, &[Op::Nop]);
    }
    Ok(())
}

pub(crate) fn fpush_cls_method(env: &mut Env<'_, '_>, num_args: u32, slot: ClsRefSlotId) -> Result<()> {
    let cls_t = env.peek_cls_ref(slot)?.clone();
    let name_t = env.top_t(0)?.to_cell();
    let (cls, exact) = match cls_t.dcls() {
        Some(spec) => (Some(spec.cls.clone()), spec.is_exact()),
        None => (None, false),
    };

    let mut func = None;
    if let Some(name) = name_t.str_val() {
        if exact {
            if let Some(c) = &cls {
                return reduce(
                    env,
                    &[
                        Op::DiscardClsRef(slot),
                        Op::PopC,
                        Op::FPushClsMethodD {
                            num_args,
                            method: name.into(),
                            class: c.name().into(),
                        },
                    ],
                );
            }
        }
        func = Some(env.index().resolve_method(env.self_cls(), &cls_t, name));
    }

    let ar = ActRec::new(FpiKind::ClsMeth, cls_t).with_cls(cls).with_func(func);
    if env.fpi_push(ar) {
        return reduce(env, &[Op::DiscardClsRef(slot), Op::PopC]);
    }
    env.take_cls_ref(slot)?;
    env.pop_c()?;
    Ok(())
}

pub(crate) fn fpush_cls_method_sd(
    env: &mut Env<'_, '_>,
    num_args: u32,
    cls_ref: SpecialClsRef,
    method: &Arc<str>,
) -> Result<()> {
    let cls_t = special_cls(env, cls_ref);
    let spec = cls_t.dcls().cloned();
    if let Some(spec) = &spec {
        if cls_ref == SpecialClsRef::Static && spec.is_exact() {
            return reduce(
                env,
                &[Op::FPushClsMethodD {
                    num_args,
                    method: method.clone(),
                    class: spec.cls.name().into(),
                }],
            );
        }
    }

    let func = env.index().resolve_method(env.self_cls(), &cls_t, method);
    let context = env.self_cls_sub().unwrap_or(Type::CLS);
    let ar = ActRec::new(FpiKind::ClsMeth, context)
        .with_cls(spec.map(|s| s.cls))
        .with_func(Some(func));
    if env.fpi_push(ar) {
        return reduce(env, &[Op::Nop]);
    }
    Ok(())
}

pub(crate) fn fpush_ctor_d(env: &mut Env<'_, '_>, _num_args: u32, class: &Arc<str>) -> Result<()> {
    let index = env.index();
    let cls = index.resolve_class(class);
    let cls_t = cls.clone().map_or(Type::CLS, Type::cls_exact);
    let func = cls
        .as_ref()
        .and_then(|_| index.resolve_ctor(env.self_cls(), &cls_t));
    let obj_t = cls_obj(&cls_t);
    env.fpi_push(ActRec::new(FpiKind::Ctor, cls_t).with_cls(cls).with_func(func));
    env.push(obj_t);
    Ok(())
}

pub(crate) fn fpush_ctor(env: &mut Env<'_, '_>, num_args: u32, slot: ClsRefSlotId) -> Result<()> {
    let cls_t = env.peek_cls_ref(slot)?.clone();
    let Some(spec) = cls_t.dcls().cloned() else {
        env.take_cls_ref(slot)?;
        env.push(Type::OBJ);
        env.fpi_push(ActRec::new(FpiKind::Ctor, Type::CLS));
        return Ok(());
    };

    let func = env.index().resolve_ctor(env.self_cls(), &cls_t);
    if spec.is_exact() && func.is_some() {
        return reduce(
            env,
            &[
                Op::DiscardClsRef(slot),
                Op::FPushCtorD {
                    num_args,
                    class: spec.cls.name().into(),
                },
            ],
        );
    }
    env.take_cls_ref(slot)?;
    env.push(cls_obj(&cls_t));
    env.fpi_push(
        ActRec::new(FpiKind::Ctor, cls_t)
            .with_cls(Some(spec.cls))
            .with_func(func),
    );
    Ok(())
}

/// `call_user_func`-style push: the callee is a runtime value.
pub(crate) fn fpush_cuf(env: &mut Env<'_, '_>) -> Result<()> {
    env.pop_c()?;
    env.fpi_push(ActRec::new(FpiKind::Unknown, Type::TOP));
    Ok(())
}

// ============================================================================
// Call phase
// ============================================================================

/// A call whose callee is not known: any value may come back.
fn fcall_unknown(env: &mut Env<'_, '_>, num_args: u32, num_rets: Option<u32>) -> Result<()> {
    env.discard(num_args as usize)?;
    let ar = env.fpi_pop()?;
    special_function_effects(env, &ar);
    match num_rets {
        None => env.push(Type::INIT_CELL),
        Some(n) => {
            env.discard(n.saturating_sub(1) as usize)?;
            (0..n).for_each(|_| env.push(Type::INIT_CELL));
        }
    }
    Ok(())
}

/// A call to a resolved callee.
fn fcall_known(env: &mut Env<'_, '_>, num_args: u32, num_rets: Option<u32>) -> Result<()> {
    let ar = env.fpi_top()?.clone();
    let Some(func) = ar.func.clone() else {
        return fcall_unknown(env, num_args, num_rets);
    };

    if env.options().constant_fold_builtins && ar.foldable {
        if num_rets.is_none() {
            if let Some(v) = try_fold(env, &func, num_args)? {
                env.fpi_pop()?;
                return fold_to(env, num_args, &v);
            }
        }
        return fold_failed(env, num_args, num_rets.unwrap_or(1));
    }

    env.fpi_pop()?;
    special_function_effects(env, &ar);
    let args = pop_args(env, num_args)?;
    note_defined(env, &func, &args);

    let index = env.index();
    let call = CallContext {
        args,
        context: ar.context.clone(),
    };
    let mut ty = index.lookup_return_type(&call, &func);
    if let Some(fallback) = &ar.fallback_func {
        ty = ty.union(&index.lookup_return_type(&call, fallback));
    }
    push_call_return_type(env, ty, num_rets)
}

/// Finish a call to a builtin pushed by `FPushFuncD`: fold it, or turn it
/// into a direct builtin call.
fn finish_builtin(env: &mut Env<'_, '_>, num_args: u32) -> Result<()> {
    let ar = env.fpi_top()?.clone();
    let Some(func) = ar.func else {
        return fcall_unknown(env, num_args, None);
    };
    if ar.foldable {
        if let Some(v) = try_fold(env, &func, num_args)? {
            env.fpi_pop()?;
            return fold_to(env, num_args, &v);
        }
        return fold_failed(env, num_args, 1);
    }
    env.fpi_pop()?;
    reduce(
        env,
        &[Op::FCallBuiltin {
            num_args,
            name: func.name().into(),
        }],
    )
}

/// The name the callee of `ar` has in a re-issued call instruction, when it
/// differs from the `class`/`func` immediates.
fn sharpened(ar: &ActRec, class: &str, func: &str) -> Option<(Arc<str>, Arc<str>)> {
    let f = ar.func.as_ref()?;
    let cls_name = ar.cls.as_ref().map_or("", |c| c.name());
    let cls_changed = ar.cls.is_some() && cls_name != class;
    (f.name() != func || cls_changed).then(|| (cls_name.into(), f.name().into()))
}

pub(crate) fn fcall(env: &mut Env<'_, '_>, num_args: u32) -> Result<()> {
    let ar = env.fpi_top()?.clone();
    if let (Some(func), None) = (&ar.func, &ar.fallback_func) {
        match ar.kind {
            FpiKind::Func => {
                return reduce(
                    env,
                    &[Op::FCallD {
                        num_args,
                        class: "".into(),
                        func: func.name().into(),
                    }],
                );
            }
            FpiKind::Builtin => return finish_builtin(env, num_args),
            // An old-style constructor shares its name with the class.
            FpiKind::Ctor if !func.is_named("__construct") => {}
            FpiKind::Ctor | FpiKind::ObjMeth | FpiKind::ClsMeth => {
                if let Some(cls) = &ar.cls {
                    if func.cant_be_magic_call() {
                        return reduce(
                            env,
                            &[Op::FCallD {
                                num_args,
                                class: cls.name().into(),
                                func: func.name().into(),
                            }],
                        );
                    }
                }
                return fcall_known(env, num_args, None);
            }
            FpiKind::Unknown | FpiKind::CallableArr | FpiKind::ObjInvoke => {}
        }
    }
    fcall_unknown(env, num_args, None)
}

pub(crate) fn fcall_d(
    env: &mut Env<'_, '_>,
    num_args: u32,
    class: &Arc<str>,
    func: &Arc<str>,
) -> Result<()> {
    let ar = env.fpi_top()?.clone();
    if let Some((class, func)) = sharpened(&ar, class, func) {
        return reduce(
            env,
            &[Op::FCallD {
                num_args,
                class,
                func,
            }],
        );
    }
    if ar.kind == FpiKind::Builtin {
        return finish_builtin(env, num_args);
    }
    if ar.func.is_some() {
        return fcall_known(env, num_args, None);
    }
    fcall_unknown(env, num_args, None)
}

pub(crate) fn fcall_m(env: &mut Env<'_, '_>, num_args: u32, num_rets: u32) -> Result<()> {
    let ar = env.fpi_top()?.clone();
    if let (Some(func), None) = (&ar.func, &ar.fallback_func) {
        match ar.kind {
            FpiKind::Func => {
                return reduce(
                    env,
                    &[Op::FCallDM {
                        num_args,
                        num_rets,
                        class: "".into(),
                        func: func.name().into(),
                    }],
                );
            }
            FpiKind::ObjMeth | FpiKind::ClsMeth => {
                if let Some(cls) = &ar.cls {
                    if func.cant_be_magic_call() {
                        return reduce(
                            env,
                            &[Op::FCallDM {
                                num_args,
                                num_rets,
                                class: cls.name().into(),
                                func: func.name().into(),
                            }],
                        );
                    }
                }
                return fcall_known(env, num_args, Some(num_rets));
            }
            FpiKind::Builtin
            | FpiKind::Ctor
            | FpiKind::Unknown
            | FpiKind::CallableArr
            | FpiKind::ObjInvoke => {}
        }
    }
    fcall_unknown(env, num_args, Some(num_rets))
}

pub(crate) fn fcall_dm(
    env: &mut Env<'_, '_>,
    num_args: u32,
    num_rets: u32,
    class: &Arc<str>,
    func: &Arc<str>,
) -> Result<()> {
    let ar = env.fpi_top()?.clone();
    if let Some((class, func)) = sharpened(&ar, class, func) {
        return reduce(
            env,
            &[Op::FCallDM {
                num_args,
                num_rets,
                class,
                func,
            }],
        );
    }
    if ar.func.is_some() && ar.kind != FpiKind::Builtin {
        return fcall_known(env, num_args, Some(num_rets));
    }
    fcall_unknown(env, num_args, Some(num_rets))
}

/// `FCallArray` and `FCallUnpack`: arguments passed in a container.
pub(crate) fn fcall_array(env: &mut Env<'_, '_>, num_args: u32) -> Result<()> {
    let ar = env.fpi_top()?.clone();
    if ar.foldable {
        return fold_failed(env, num_args, 1);
    }
    env.discard(num_args as usize)?;
    env.fpi_pop()?;
    special_function_effects(env, &ar);
    let Some(func) = &ar.func else {
        env.push(Type::INIT_CELL);
        return Ok(());
    };

    let index = env.index();
    let call = CallContext {
        args: Vec::new(),
        context: ar.context.clone(),
    };
    let mut ty = index.lookup_return_type(&call, func);
    if let Some(fallback) = &ar.fallback_func {
        ty = ty.union(&index.lookup_return_type(&call, fallback));
    }
    push_call_return_type(env, ty, None)
}

pub(crate) fn fcall_await(
    env: &mut Env<'_, '_>,
    num_args: u32,
    class: &Arc<str>,
    func: &Arc<str>,
) -> Result<()> {
    let ar = env.fpi_top()?.clone();
    if ar.foldable {
        return fold_failed(env, num_args, 1);
    }
    if let Some((class, func)) = sharpened(&ar, class, func) {
        return reduce(
            env,
            &[Op::FCallAwait {
                num_args,
                class,
                func,
            }],
        );
    }
    impl_only(
        env,
        &[
            Op::FCallD {
                num_args,
                class: class.clone(),
                func: func.clone(),
            },
            Op::Await,
        ],
    )
}

/// A direct call to a builtin, with no pending call record.
pub(crate) fn fcall_builtin(env: &mut Env<'_, '_>, num_args: u32, name: &Arc<str>) -> Result<()> {
    let func = env.index().resolve_func(name);
    let may_fold = env.options().constant_fold_builtins
        && func.is_foldable()
        && !env.interp.collect.opts.contains(CollectionOpts::SPECULATING);
    if may_fold {
        if let Some(v) = try_fold(env, &func, num_args)? {
            return fold_to(env, num_args, &v);
        }
    }

    let args = pop_args(env, num_args)?;
    callee_frame_effects(env, &func);
    note_defined(env, &func, &args);
    let call = CallContext {
        args,
        context: Type::BOTTOM,
    };
    let ty = env.index().lookup_return_type(&call, &func);
    push_call_return_type(env, ty, None)
}

#[cfg(test)]
mod tests {
    use stackflow_types::ClassRef;

    use super::*;

    #[test]
    fn object_and_class_types_correspond() {
        let base = ClassRef::declare().name("Base").new();
        let exact = Type::obj_exact(base.clone());
        assert_eq!(obj_cls(&exact), Type::cls_exact(base.clone()));
        assert_eq!(cls_obj(&obj_cls(&exact)), exact);
        assert_eq!(obj_cls(&Type::obj_sub(base.clone())), Type::cls_sub(base));
        assert_eq!(obj_cls(&Type::INT), Type::CLS);
        assert_eq!(cls_obj(&Type::CLS), Type::OBJ);
    }
}

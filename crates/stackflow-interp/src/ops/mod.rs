//! Transfer functions of the individual instructions.
//!
//! Each handler consumes its operands from the [`Env`]'s state, pushes its
//! results and raises the flags that describe what the instruction did.
//! A handler may instead ask for the instruction to be replaced by an
//! equivalent sequence through [`reduce`](crate::reduce::reduce), in which
//! case the sequence is interpreted in its place.
//!
//! Handlers start from the conservative defaults of [`EffectFlags`]: the
//! instruction may throw, is not effect free and its result is not known at
//! analysis time.
//!
//! [`EffectFlags`]: crate::flags::EffectFlags

mod basic;
mod cls;
mod control;
mod iter;
mod locals;
mod misc;
mod types;

use stackflow_bytecode::Op;
use stackflow_types::{BinaryOp, CastKind, CmpOp, Value};

use crate::calls;
use crate::env::Env;
use crate::error::Result;

pub(crate) use basic::{cast_bool, nan_free, resolve_same};
pub(crate) use misc::static_loc_helper;
pub(crate) use types::{memoize_impl_ret_type, supports_non_objects};

/// Interpret a single instruction against the current state.
pub fn dispatch(env: &mut Env<'_, '_>, op: &Op) -> Result<()> {
    match op {
        Op::Nop => basic::nop(env),
        Op::PopC => basic::pop_c(env),
        Op::Dup => basic::dup(env),

        Op::Null => basic::push_literal(env, Value::Null),
        Op::NullUninit => basic::push_literal(env, Value::Uninit),
        Op::True => basic::push_literal(env, Value::Bool(true)),
        Op::False => basic::push_literal(env, Value::Bool(false)),
        Op::Int(i) => basic::push_literal(env, Value::Int(*i)),
        Op::Double(d) => basic::push_literal(env, Value::Dbl(*d)),
        Op::String(s) => basic::push_literal(env, Value::Str(s.clone())),
        Op::Array(entries) => basic::push_literal(env, Value::Arr(entries.clone())),
        Op::Vec(elems) => basic::push_literal(env, Value::Vec(elems.clone())),
        Op::Dict(entries) => basic::push_literal(env, Value::Dict(entries.clone())),
        Op::Keyset(keys) => basic::push_literal(env, Value::Keyset(keys.clone())),

        Op::NewArray(n) => basic::new_array(env, *n),
        Op::NewDictArray(n) => basic::new_dict_array(env, *n),
        Op::NewPackedArray(n) => basic::new_packed_array(env, *n),
        Op::NewVecArray(n) => basic::new_vec_array(env, *n),
        Op::NewKeysetArray(n) => basic::new_keyset_array(env, *n),
        Op::NewStructDict(keys) => basic::new_struct_dict(env, keys),
        Op::AddElemC => basic::add_elem(env),
        Op::AddNewElemC => basic::add_new_elem(env),

        Op::Add => basic::arith(env, BinaryOp::Add),
        Op::Sub => basic::arith(env, BinaryOp::Sub),
        Op::Mul => basic::arith(env, BinaryOp::Mul),
        Op::Div => basic::arith(env, BinaryOp::Div),
        Op::Mod => basic::arith(env, BinaryOp::Mod),
        Op::Pow => basic::arith(env, BinaryOp::Pow),
        Op::BitAnd => basic::arith(env, BinaryOp::BitAnd),
        Op::BitOr => basic::arith(env, BinaryOp::BitOr),
        Op::BitXor => basic::arith(env, BinaryOp::BitXor),
        Op::Shl => basic::arith(env, BinaryOp::Shl),
        Op::Shr => basic::arith(env, BinaryOp::Shr),
        Op::Concat => basic::concat(env),
        Op::ConcatN(n) => basic::concat_n(env, *n),
        Op::Xor => basic::xor(env),
        Op::Not => cast_bool(env, true),
        Op::BitNot => basic::bit_not(env),

        Op::Eq => basic::loose_eq(env, false),
        Op::Neq => basic::loose_eq(env, true),
        Op::Lt => basic::compare(env, CmpOp::Lt),
        Op::Gt => basic::compare(env, CmpOp::Gt),
        Op::Lte => basic::compare(env, CmpOp::Lte),
        Op::Gte => basic::compare(env, CmpOp::Gte),
        Op::Cmp => basic::compare(env, CmpOp::Cmp),
        Op::Same => basic::same(env, false),
        Op::NSame => basic::same(env, true),

        Op::CastBool => basic::cast_to_bool(env),
        Op::CastInt => basic::cast_to_int(env),
        Op::CastDouble => basic::cast(env, CastKind::Double),
        Op::CastString => basic::cast(env, CastKind::String),
        Op::CastArray => basic::cast(env, CastKind::Array),
        Op::CastObject => basic::cast(env, CastKind::Object),
        Op::CastVec => basic::cast(env, CastKind::Vec),
        Op::CastDict => basic::cast(env, CastKind::Dict),
        Op::CastKeyset => basic::cast(env, CastKind::Keyset),

        Op::Print => basic::print(env),
        Op::Clone => basic::clone(env),
        Op::Exit => basic::exit(env),
        Op::Fatal(_) | Op::Throw => basic::throw(env),
        Op::Catch => basic::catch(env),

        Op::Jmp(_) | Op::JmpNS(_) => control::unexpected_jump(op),
        Op::JmpZ(target) => control::jmp_cond(env, *target, false),
        Op::JmpNZ(target) => control::jmp_cond(env, *target, true),
        Op::Switch {
            kind,
            base,
            targets,
        } => control::switch(env, *kind, *base, targets),
        Op::SSwitch { cases, default } => control::sswitch(env, cases, *default),
        Op::RetC => control::ret_c(env),
        Op::RetM(n) => control::ret_m(env, *n),

        Op::CGetL(l) => locals::cget(env, *l),
        Op::CGetQuietL(l) => locals::cget_quiet(env, *l),
        Op::CUGetL(l) => locals::cuget(env, *l),
        Op::PushL(l) => locals::push_l(env, *l),
        Op::CGetL2(l) => locals::cget2(env, *l),
        Op::CGetN => locals::cget_n(env),
        Op::IssetL(l) => locals::isset(env, *l),
        Op::EmptyL(l) => locals::empty(env, *l),
        Op::IsTypeL(l, test) => locals::is_type(env, *l, *test),
        Op::SetL(l) => locals::move_to_loc(env, *l, true),
        Op::PopL(l) => locals::move_to_loc(env, *l, false),
        Op::SetN => locals::set_n(env),
        Op::SetOpL(l, bop) => locals::set_op(env, *l, *bop),
        Op::IncDecL(l, incdec) => locals::inc_dec(env, *l, *incdec),
        Op::UnsetL(l) => locals::unset(env, *l),

        Op::IsTypeC(test) => types::is_type_c(env, *test),
        Op::IsUninit => types::is_uninit(env),
        Op::InstanceOfD(name) => types::instance_of_d(env, name),
        Op::InstanceOf => types::instance_of(env),
        Op::IsMemoType => types::memo_type(env, false),
        Op::MaybeMemoType => types::memo_type(env, true),
        Op::AKExists => types::ak_exists(env),

        Op::CGetS(slot) => cls::cget_s(env, *slot),
        Op::SetS(slot) => cls::set_s(env, *slot),
        Op::IssetS(slot) => cls::isset_s(env, *slot),
        Op::ClsRefGetL(l, slot) => cls::cls_ref_get_l(env, *l, *slot),
        Op::ClsRefGetC(slot) => cls::cls_ref_get_c(env, *slot),
        Op::DiscardClsRef(slot) => cls::discard_cls_ref(env, *slot),
        Op::SelfCls(slot) => cls::self_cls(env, *slot),
        Op::ParentCls(slot) => cls::parent_cls(env, *slot),
        Op::LateBoundCls(slot) => cls::late_bound_cls(env, *slot),

        Op::Cns(name) | Op::CnsE(name) => cls::cns(env, name, None),
        Op::CnsU { name, fallback } => cls::cns(env, name, Some(fallback)),
        Op::DefCns(name) => cls::def_cns(env, name),
        Op::ClsCns { name, slot } => cls::cls_cns(env, name, *slot),
        Op::ClsCnsD { name, class } => cls::cls_cns_d(env, name, class),

        Op::This => cls::this(env),
        Op::BareThis(subop) => cls::bare_this(env, *subop),
        Op::CheckThis => cls::check_this(env),
        Op::InitThisLoc(l) => cls::init_this_loc(env, *l),

        Op::StaticLocCheck(l) => misc::static_loc_check(env, *l),
        Op::StaticLocDef(l) | Op::StaticLocInit(l) => misc::static_loc_init(env, *l),

        Op::IterInit {
            iter,
            target,
            value,
        } => iter::init(env, *iter, *target, *value, None),
        Op::IterInitK {
            iter,
            target,
            value,
            key,
        } => iter::init(env, *iter, *target, *value, Some(*key)),
        Op::IterNext {
            iter,
            target,
            value,
        } => iter::next(env, *iter, *target, *value, None),
        Op::IterNextK {
            iter,
            target,
            value,
            key,
        } => iter::next(env, *iter, *target, *value, Some(*key)),
        Op::IterFree(id) => iter::free(env, *id),
        Op::IterBreak { target, iters } => iter::brk(env, *target, iters),

        Op::MemoGet(range) => misc::memo_get(env, *range),
        Op::MemoSet(range) => misc::memo_set(env, *range),

        Op::VerifyParamType(l) => types::verify_param(env, *l),
        Op::VerifyRetTypeC => types::verify_ret(env),
        Op::VerifyRetNonNullC => types::verify_ret_non_null(env),

        Op::Await | Op::WHResult => misc::await_result(env),
        Op::AwaitAll(range) => misc::await_all(env, *range),

        Op::Incl(_) | Op::Eval => misc::incl_eval(env),
        Op::Idx | Op::ArrayIdx => misc::idx(env),
        Op::Silence(l, subop) => misc::silence(env, *l, *subop),

        Op::FPushFuncD { num_args, name } => calls::fpush_func_d(env, *num_args, name),
        Op::FPushFunc { num_args } => calls::fpush_func(env, *num_args),
        Op::FPushFuncU {
            num_args,
            name,
            fallback,
        } => calls::fpush_func_u(env, *num_args, name, fallback),
        Op::FPushObjMethodD {
            num_args,
            method,
            null_safe,
        } => calls::fpush_obj_method_d(env, *num_args, method, *null_safe),
        Op::FPushObjMethod {
            num_args,
            null_safe,
        } => calls::fpush_obj_method(env, *num_args, *null_safe),
        Op::FPushClsMethodD {
            num_args,
            method,
            class,
        } => calls::fpush_cls_method_d(env, *num_args, method, class),
        Op::FPushClsMethod { num_args, slot } => calls::fpush_cls_method(env, *num_args, *slot),
        Op::FPushClsMethodSD {
            num_args,
            cls_ref,
            method,
        } => calls::fpush_cls_method_sd(env, *num_args, *cls_ref, method),
        Op::FPushCtorD { num_args, class } => calls::fpush_ctor_d(env, *num_args, class),
        Op::FPushCtor { num_args, slot } => calls::fpush_ctor(env, *num_args, *slot),
        Op::FPushCuf { .. } => calls::fpush_cuf(env),

        Op::FCall { num_args } => calls::fcall(env, *num_args),
        Op::FCallD {
            num_args,
            class,
            func,
        } => calls::fcall_d(env, *num_args, class, func),
        Op::FCallM { num_args, num_rets } => calls::fcall_m(env, *num_args, *num_rets),
        Op::FCallDM {
            num_args,
            num_rets,
            class,
            func,
        } => calls::fcall_dm(env, *num_args, *num_rets, class, func),
        Op::FCallArray => calls::fcall_array(env, 1),
        Op::FCallUnpack { num_args } => calls::fcall_array(env, *num_args),
        Op::FCallAwait {
            num_args,
            class,
            func,
        } => calls::fcall_await(env, *num_args, class, func),
        Op::FCallBuiltin { num_args, name } => calls::fcall_builtin(env, *num_args, name),
    }
}

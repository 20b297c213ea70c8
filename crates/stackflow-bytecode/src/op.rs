use std::fmt;
use std::sync::Arc;

use stackflow_types::{ArrayKey, BinaryOp, IsTypeOp, Value};

use crate::id::{BlockId, ClsRefSlotId, IterId, LocalId, LocalRange};

// ============================================================================
// Immediates
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BareThisOp {
    /// Raise a notice when `$this` is null.
    Notice,
    NoNotice,
    /// `$this` is known to be available.
    NeverNull,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SilenceOp {
    Start,
    End,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IncDecOp {
    PreInc,
    PostInc,
    PreDec,
    PostDec,
}

impl IncDecOp {
    pub fn is_inc(self) -> bool {
        matches!(self, IncDecOp::PreInc | IncDecOp::PostInc)
    }

    /// Whether the pushed value is the updated one.
    pub fn is_pre(self) -> bool {
        matches!(self, IncDecOp::PreInc | IncDecOp::PreDec)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FatalOp {
    Runtime,
    Parse,
    RuntimeOmitFrame,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InclOp {
    Incl,
    InclOnce,
    Req,
    ReqOnce,
    ReqDoc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SwitchKind {
    /// The scrutinee is an index into the target table.
    Bounded,
    /// Targets but the last match `base + i`; the last is the default.
    Unbounded,
}

/// The class a `FPushClsMethodSD` call is made against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpecialClsRef {
    SelfCls,
    Static,
    Parent,
}

macro_rules! debug_names {
    ($($ty:ident),* $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    fmt::Debug::fmt(self, f)
                }
            }
        )*
    };
}

debug_names!(BareThisOp, SilenceOp, IncDecOp, FatalOp, InclOp, SwitchKind, SpecialClsRef);

// ============================================================================
// Instructions
// ============================================================================

/// A bytecode instruction.
///
/// Stack effects are given as `num_pop`/`num_push`; instructions that inspect
/// the top of the stack without consuming it (`IsUninit`, `MemoGet`) count
/// only what they add.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    Nop,
    PopC,
    Dup,

    // -- Literals ------------------------------------------------------------
    Null,
    NullUninit,
    True,
    False,
    Int(i64),
    Double(f64),
    String(Arc<str>),
    Array(Vec<(ArrayKey, Value)>),
    Vec(Vec<Value>),
    Dict(Vec<(ArrayKey, Value)>),
    Keyset(Vec<ArrayKey>),

    // -- Container builders --------------------------------------------------
    NewArray(u32),
    NewPackedArray(u32),
    NewVecArray(u32),
    NewKeysetArray(u32),
    NewDictArray(u32),
    NewStructDict(Vec<Arc<str>>),
    AddElemC,
    AddNewElemC,

    // -- Arithmetic and logic ------------------------------------------------
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Concat,
    ConcatN(u32),
    Xor,
    Not,
    BitNot,

    // -- Comparison ----------------------------------------------------------
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
    Cmp,
    Same,
    NSame,

    // -- Casts ---------------------------------------------------------------
    CastBool,
    CastInt,
    CastDouble,
    CastString,
    CastArray,
    CastObject,
    CastVec,
    CastDict,
    CastKeyset,

    // -- Misc ----------------------------------------------------------------
    Print,
    Clone,
    Exit,
    Fatal(FatalOp),
    Throw,
    Catch,

    // -- Control flow --------------------------------------------------------
    Jmp(BlockId),
    JmpNS(BlockId),
    JmpZ(BlockId),
    JmpNZ(BlockId),
    Switch {
        kind: SwitchKind,
        base: i64,
        targets: Vec<BlockId>,
    },
    SSwitch {
        cases: Vec<(Arc<str>, BlockId)>,
        default: BlockId,
    },
    RetC,
    RetM(u32),

    // -- Locals --------------------------------------------------------------
    CGetL(LocalId),
    CGetQuietL(LocalId),
    CUGetL(LocalId),
    PushL(LocalId),
    CGetL2(LocalId),
    CGetN,
    IssetL(LocalId),
    EmptyL(LocalId),
    IsTypeL(LocalId, IsTypeOp),
    SetL(LocalId),
    PopL(LocalId),
    SetN,
    SetOpL(LocalId, BinaryOp),
    IncDecL(LocalId, IncDecOp),
    UnsetL(LocalId),

    // -- Type tests ----------------------------------------------------------
    IsTypeC(IsTypeOp),
    IsUninit,
    InstanceOfD(Arc<str>),
    InstanceOf,
    IsMemoType,
    MaybeMemoType,
    AKExists,

    // -- Class references and statics ----------------------------------------
    CGetS(ClsRefSlotId),
    SetS(ClsRefSlotId),
    IssetS(ClsRefSlotId),
    ClsRefGetL(LocalId, ClsRefSlotId),
    ClsRefGetC(ClsRefSlotId),
    DiscardClsRef(ClsRefSlotId),
    SelfCls(ClsRefSlotId),
    ParentCls(ClsRefSlotId),
    LateBoundCls(ClsRefSlotId),

    // -- Constants -----------------------------------------------------------
    Cns(Arc<str>),
    CnsE(Arc<str>),
    CnsU {
        name: Arc<str>,
        fallback: Arc<str>,
    },
    DefCns(Arc<str>),
    ClsCns {
        name: Arc<str>,
        slot: ClsRefSlotId,
    },
    ClsCnsD {
        name: Arc<str>,
        class: Arc<str>,
    },

    // -- Object context ------------------------------------------------------
    This,
    BareThis(BareThisOp),
    CheckThis,
    InitThisLoc(LocalId),

    // -- Function statics ----------------------------------------------------
    StaticLocCheck(LocalId),
    StaticLocDef(LocalId),
    StaticLocInit(LocalId),

    // -- Iterators -----------------------------------------------------------
    IterInit {
        iter: IterId,
        target: BlockId,
        value: LocalId,
    },
    IterInitK {
        iter: IterId,
        target: BlockId,
        value: LocalId,
        key: LocalId,
    },
    IterNext {
        iter: IterId,
        target: BlockId,
        value: LocalId,
    },
    IterNextK {
        iter: IterId,
        target: BlockId,
        value: LocalId,
        key: LocalId,
    },
    IterFree(IterId),
    IterBreak {
        target: BlockId,
        iters: Vec<IterId>,
    },

    // -- Memoization ---------------------------------------------------------
    MemoGet(LocalRange),
    MemoSet(LocalRange),

    // -- Verification --------------------------------------------------------
    VerifyParamType(LocalId),
    VerifyRetTypeC,
    VerifyRetNonNullC,

    // -- Async ---------------------------------------------------------------
    Await,
    AwaitAll(LocalRange),
    WHResult,

    // -- Dynamic code and element access -------------------------------------
    Incl(InclOp),
    Eval,
    Idx,
    ArrayIdx,
    Silence(LocalId, SilenceOp),

    // -- Calls: push phase ---------------------------------------------------
    FPushFuncD {
        num_args: u32,
        name: Arc<str>,
    },
    FPushFunc {
        num_args: u32,
    },
    FPushFuncU {
        num_args: u32,
        name: Arc<str>,
        fallback: Arc<str>,
    },
    FPushObjMethodD {
        num_args: u32,
        method: Arc<str>,
        null_safe: bool,
    },
    FPushObjMethod {
        num_args: u32,
        null_safe: bool,
    },
    FPushClsMethodD {
        num_args: u32,
        method: Arc<str>,
        class: Arc<str>,
    },
    FPushClsMethod {
        num_args: u32,
        slot: ClsRefSlotId,
    },
    FPushClsMethodSD {
        num_args: u32,
        cls_ref: SpecialClsRef,
        method: Arc<str>,
    },
    FPushCtorD {
        num_args: u32,
        class: Arc<str>,
    },
    FPushCtor {
        num_args: u32,
        slot: ClsRefSlotId,
    },
    FPushCuf {
        num_args: u32,
    },

    // -- Calls: call phase ---------------------------------------------------
    FCall {
        num_args: u32,
    },
    /// `class` is empty for free functions.
    FCallD {
        num_args: u32,
        class: Arc<str>,
        func: Arc<str>,
    },
    /// Pops `num_rets - 1` placeholder slots besides the arguments.
    FCallM {
        num_args: u32,
        num_rets: u32,
    },
    FCallDM {
        num_args: u32,
        num_rets: u32,
        class: Arc<str>,
        func: Arc<str>,
    },
    FCallArray,
    FCallUnpack {
        num_args: u32,
    },
    FCallAwait {
        num_args: u32,
        class: Arc<str>,
        func: Arc<str>,
    },
    FCallBuiltin {
        num_args: u32,
        name: Arc<str>,
    },
}

macro_rules! op_tags {
    ($($name:ident),* $(,)?) => {
        /// The opcode of an [`Op`], without immediates.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum OpTag {
            $($name),*
        }

        impl OpTag {
            pub fn name(self) -> &'static str {
                match self {
                    $(OpTag::$name => stringify!($name)),*
                }
            }
        }
    };
}

op_tags! {
    Nop, PopC, Dup,
    Null, NullUninit, True, False, Int, Double, String, Array, Vec, Dict, Keyset,
    NewArray, NewPackedArray, NewVecArray, NewKeysetArray, NewDictArray, NewStructDict,
    AddElemC, AddNewElemC,
    Add, Sub, Mul, Div, Mod, Pow, BitAnd, BitOr, BitXor, Shl, Shr, Concat, ConcatN,
    Xor, Not, BitNot,
    Eq, Neq, Lt, Gt, Lte, Gte, Cmp, Same, NSame,
    CastBool, CastInt, CastDouble, CastString, CastArray, CastObject, CastVec, CastDict,
    CastKeyset,
    Print, Clone, Exit, Fatal, Throw, Catch,
    Jmp, JmpNS, JmpZ, JmpNZ, Switch, SSwitch, RetC, RetM,
    CGetL, CGetQuietL, CUGetL, PushL, CGetL2, CGetN, IssetL, EmptyL, IsTypeL, SetL, PopL,
    SetN, SetOpL, IncDecL, UnsetL,
    IsTypeC, IsUninit, InstanceOfD, InstanceOf, IsMemoType, MaybeMemoType, AKExists,
    CGetS, SetS, IssetS, ClsRefGetL, ClsRefGetC, DiscardClsRef, SelfCls, ParentCls,
    LateBoundCls,
    Cns, CnsE, CnsU, DefCns, ClsCns, ClsCnsD,
    This, BareThis, CheckThis, InitThisLoc,
    StaticLocCheck, StaticLocDef, StaticLocInit,
    IterInit, IterInitK, IterNext, IterNextK, IterFree, IterBreak,
    MemoGet, MemoSet,
    VerifyParamType, VerifyRetTypeC, VerifyRetNonNullC,
    Await, AwaitAll, WHResult,
    Incl, Eval, Idx, ArrayIdx, Silence,
    FPushFuncD, FPushFunc, FPushFuncU, FPushObjMethodD, FPushObjMethod, FPushClsMethodD,
    FPushClsMethod, FPushClsMethodSD, FPushCtorD, FPushCtor, FPushCuf,
    FCall, FCallD, FCallM, FCallDM, FCallArray, FCallUnpack, FCallAwait, FCallBuiltin,
}

impl fmt::Display for OpTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Op {
    pub fn string(s: &str) -> Op {
        Op::String(s.into())
    }

    /// The instruction pushing the literal `v`.
    pub fn literal(v: &Value) -> Op {
        match v {
            Value::Uninit => Op::NullUninit,
            Value::Null => Op::Null,
            Value::Bool(true) => Op::True,
            Value::Bool(false) => Op::False,
            Value::Int(i) => Op::Int(*i),
            Value::Dbl(d) => Op::Double(*d),
            Value::Str(s) => Op::String(s.clone()),
            Value::Arr(entries) => Op::Array(entries.clone()),
            Value::Vec(elems) => Op::Vec(elems.clone()),
            Value::Dict(entries) => Op::Dict(entries.clone()),
            Value::Keyset(keys) => Op::Keyset(keys.clone()),
        }
    }

    pub fn tag(&self) -> OpTag {
        match self {
            Op::Nop => OpTag::Nop,
            Op::PopC => OpTag::PopC,
            Op::Dup => OpTag::Dup,
            Op::Null => OpTag::Null,
            Op::NullUninit => OpTag::NullUninit,
            Op::True => OpTag::True,
            Op::False => OpTag::False,
            Op::Int(_) => OpTag::Int,
            Op::Double(_) => OpTag::Double,
            Op::String(_) => OpTag::String,
            Op::Array(_) => OpTag::Array,
            Op::Vec(_) => OpTag::Vec,
            Op::Dict(_) => OpTag::Dict,
            Op::Keyset(_) => OpTag::Keyset,
            Op::NewArray(_) => OpTag::NewArray,
            Op::NewPackedArray(_) => OpTag::NewPackedArray,
            Op::NewVecArray(_) => OpTag::NewVecArray,
            Op::NewKeysetArray(_) => OpTag::NewKeysetArray,
            Op::NewDictArray(_) => OpTag::NewDictArray,
            Op::NewStructDict(_) => OpTag::NewStructDict,
            Op::AddElemC => OpTag::AddElemC,
            Op::AddNewElemC => OpTag::AddNewElemC,
            Op::Add => OpTag::Add,
            Op::Sub => OpTag::Sub,
            Op::Mul => OpTag::Mul,
            Op::Div => OpTag::Div,
            Op::Mod => OpTag::Mod,
            Op::Pow => OpTag::Pow,
            Op::BitAnd => OpTag::BitAnd,
            Op::BitOr => OpTag::BitOr,
            Op::BitXor => OpTag::BitXor,
            Op::Shl => OpTag::Shl,
            Op::Shr => OpTag::Shr,
            Op::Concat => OpTag::Concat,
            Op::ConcatN(_) => OpTag::ConcatN,
            Op::Xor => OpTag::Xor,
            Op::Not => OpTag::Not,
            Op::BitNot => OpTag::BitNot,
            Op::Eq => OpTag::Eq,
            Op::Neq => OpTag::Neq,
            Op::Lt => OpTag::Lt,
            Op::Gt => OpTag::Gt,
            Op::Lte => OpTag::Lte,
            Op::Gte => OpTag::Gte,
            Op::Cmp => OpTag::Cmp,
            Op::Same => OpTag::Same,
            Op::NSame => OpTag::NSame,
            Op::CastBool => OpTag::CastBool,
            Op::CastInt => OpTag::CastInt,
            Op::CastDouble => OpTag::CastDouble,
            Op::CastString => OpTag::CastString,
            Op::CastArray => OpTag::CastArray,
            Op::CastObject => OpTag::CastObject,
            Op::CastVec => OpTag::CastVec,
            Op::CastDict => OpTag::CastDict,
            Op::CastKeyset => OpTag::CastKeyset,
            Op::Print => OpTag::Print,
            Op::Clone => OpTag::Clone,
            Op::Exit => OpTag::Exit,
            Op::Fatal(_) => OpTag::Fatal,
            Op::Throw => OpTag::Throw,
            Op::Catch => OpTag::Catch,
            Op::Jmp(_) => OpTag::Jmp,
            Op::JmpNS(_) => OpTag::JmpNS,
            Op::JmpZ(_) => OpTag::JmpZ,
            Op::JmpNZ(_) => OpTag::JmpNZ,
            Op::Switch { .. } => OpTag::Switch,
            Op::SSwitch { .. } => OpTag::SSwitch,
            Op::RetC => OpTag::RetC,
            Op::RetM(_) => OpTag::RetM,
            Op::CGetL(_) => OpTag::CGetL,
            Op::CGetQuietL(_) => OpTag::CGetQuietL,
            Op::CUGetL(_) => OpTag::CUGetL,
            Op::PushL(_) => OpTag::PushL,
            Op::CGetL2(_) => OpTag::CGetL2,
            Op::CGetN => OpTag::CGetN,
            Op::IssetL(_) => OpTag::IssetL,
            Op::EmptyL(_) => OpTag::EmptyL,
            Op::IsTypeL(..) => OpTag::IsTypeL,
            Op::SetL(_) => OpTag::SetL,
            Op::PopL(_) => OpTag::PopL,
            Op::SetN => OpTag::SetN,
            Op::SetOpL(..) => OpTag::SetOpL,
            Op::IncDecL(..) => OpTag::IncDecL,
            Op::UnsetL(_) => OpTag::UnsetL,
            Op::IsTypeC(_) => OpTag::IsTypeC,
            Op::IsUninit => OpTag::IsUninit,
            Op::InstanceOfD(_) => OpTag::InstanceOfD,
            Op::InstanceOf => OpTag::InstanceOf,
            Op::IsMemoType => OpTag::IsMemoType,
            Op::MaybeMemoType => OpTag::MaybeMemoType,
            Op::AKExists => OpTag::AKExists,
            Op::CGetS(_) => OpTag::CGetS,
            Op::SetS(_) => OpTag::SetS,
            Op::IssetS(_) => OpTag::IssetS,
            Op::ClsRefGetL(..) => OpTag::ClsRefGetL,
            Op::ClsRefGetC(_) => OpTag::ClsRefGetC,
            Op::DiscardClsRef(_) => OpTag::DiscardClsRef,
            Op::SelfCls(_) => OpTag::SelfCls,
            Op::ParentCls(_) => OpTag::ParentCls,
            Op::LateBoundCls(_) => OpTag::LateBoundCls,
            Op::Cns(_) => OpTag::Cns,
            Op::CnsE(_) => OpTag::CnsE,
            Op::CnsU { .. } => OpTag::CnsU,
            Op::DefCns(_) => OpTag::DefCns,
            Op::ClsCns { .. } => OpTag::ClsCns,
            Op::ClsCnsD { .. } => OpTag::ClsCnsD,
            Op::This => OpTag::This,
            Op::BareThis(_) => OpTag::BareThis,
            Op::CheckThis => OpTag::CheckThis,
            Op::InitThisLoc(_) => OpTag::InitThisLoc,
            Op::StaticLocCheck(_) => OpTag::StaticLocCheck,
            Op::StaticLocDef(_) => OpTag::StaticLocDef,
            Op::StaticLocInit(_) => OpTag::StaticLocInit,
            Op::IterInit { .. } => OpTag::IterInit,
            Op::IterInitK { .. } => OpTag::IterInitK,
            Op::IterNext { .. } => OpTag::IterNext,
            Op::IterNextK { .. } => OpTag::IterNextK,
            Op::IterFree(_) => OpTag::IterFree,
            Op::IterBreak { .. } => OpTag::IterBreak,
            Op::MemoGet(_) => OpTag::MemoGet,
            Op::MemoSet(_) => OpTag::MemoSet,
            Op::VerifyParamType(_) => OpTag::VerifyParamType,
            Op::VerifyRetTypeC => OpTag::VerifyRetTypeC,
            Op::VerifyRetNonNullC => OpTag::VerifyRetNonNullC,
            Op::Await => OpTag::Await,
            Op::AwaitAll(_) => OpTag::AwaitAll,
            Op::WHResult => OpTag::WHResult,
            Op::Incl(_) => OpTag::Incl,
            Op::Eval => OpTag::Eval,
            Op::Idx => OpTag::Idx,
            Op::ArrayIdx => OpTag::ArrayIdx,
            Op::Silence(..) => OpTag::Silence,
            Op::FPushFuncD { .. } => OpTag::FPushFuncD,
            Op::FPushFunc { .. } => OpTag::FPushFunc,
            Op::FPushFuncU { .. } => OpTag::FPushFuncU,
            Op::FPushObjMethodD { .. } => OpTag::FPushObjMethodD,
            Op::FPushObjMethod { .. } => OpTag::FPushObjMethod,
            Op::FPushClsMethodD { .. } => OpTag::FPushClsMethodD,
            Op::FPushClsMethod { .. } => OpTag::FPushClsMethod,
            Op::FPushClsMethodSD { .. } => OpTag::FPushClsMethodSD,
            Op::FPushCtorD { .. } => OpTag::FPushCtorD,
            Op::FPushCtor { .. } => OpTag::FPushCtor,
            Op::FPushCuf { .. } => OpTag::FPushCuf,
            Op::FCall { .. } => OpTag::FCall,
            Op::FCallD { .. } => OpTag::FCallD,
            Op::FCallM { .. } => OpTag::FCallM,
            Op::FCallDM { .. } => OpTag::FCallDM,
            Op::FCallArray => OpTag::FCallArray,
            Op::FCallUnpack { .. } => OpTag::FCallUnpack,
            Op::FCallAwait { .. } => OpTag::FCallAwait,
            Op::FCallBuiltin { .. } => OpTag::FCallBuiltin,
        }
    }

    /// Number of stack slots consumed.
    pub fn num_pop(&self) -> u32 {
        match self {
            Op::Nop
            | Op::Null
            | Op::NullUninit
            | Op::True
            | Op::False
            | Op::Int(_)
            | Op::Double(_)
            | Op::String(_)
            | Op::Array(_)
            | Op::Vec(_)
            | Op::Dict(_)
            | Op::Keyset(_)
            | Op::NewArray(_)
            | Op::NewDictArray(_)
            | Op::Catch
            | Op::Jmp(_)
            | Op::JmpNS(_)
            | Op::CGetL(_)
            | Op::CGetQuietL(_)
            | Op::CUGetL(_)
            | Op::PushL(_)
            | Op::IssetL(_)
            | Op::EmptyL(_)
            | Op::IsTypeL(..)
            | Op::IncDecL(..)
            | Op::UnsetL(_)
            | Op::IsUninit
            | Op::ClsRefGetL(..)
            | Op::DiscardClsRef(_)
            | Op::SelfCls(_)
            | Op::ParentCls(_)
            | Op::LateBoundCls(_)
            | Op::Cns(_)
            | Op::CnsE(_)
            | Op::CnsU { .. }
            | Op::ClsCns { .. }
            | Op::ClsCnsD { .. }
            | Op::This
            | Op::BareThis(_)
            | Op::CheckThis
            | Op::InitThisLoc(_)
            | Op::StaticLocCheck(_)
            | Op::IterNext { .. }
            | Op::IterNextK { .. }
            | Op::IterFree(_)
            | Op::IterBreak { .. }
            | Op::MemoGet(_)
            | Op::VerifyParamType(_)
            | Op::AwaitAll(_)
            | Op::Silence(..)
            | Op::FPushFuncD { .. }
            | Op::FPushFuncU { .. }
            | Op::FPushClsMethodD { .. }
            | Op::FPushClsMethodSD { .. }
            | Op::FPushCtorD { .. }
            | Op::FPushCtor { .. } => 0,

            Op::PopC
            | Op::Dup
            | Op::Not
            | Op::BitNot
            | Op::CastBool
            | Op::CastInt
            | Op::CastDouble
            | Op::CastString
            | Op::CastArray
            | Op::CastObject
            | Op::CastVec
            | Op::CastDict
            | Op::CastKeyset
            | Op::Print
            | Op::Clone
            | Op::Exit
            | Op::Fatal(_)
            | Op::Throw
            | Op::JmpZ(_)
            | Op::JmpNZ(_)
            | Op::Switch { .. }
            | Op::SSwitch { .. }
            | Op::RetC
            | Op::CGetL2(_)
            | Op::CGetN
            | Op::SetL(_)
            | Op::PopL(_)
            | Op::SetOpL(..)
            | Op::IsTypeC(_)
            | Op::InstanceOfD(_)
            | Op::IsMemoType
            | Op::MaybeMemoType
            | Op::CGetS(_)
            | Op::IssetS(_)
            | Op::ClsRefGetC(_)
            | Op::DefCns(_)
            | Op::StaticLocDef(_)
            | Op::StaticLocInit(_)
            | Op::IterInit { .. }
            | Op::IterInitK { .. }
            | Op::MemoSet(_)
            | Op::VerifyRetTypeC
            | Op::VerifyRetNonNullC
            | Op::Await
            | Op::WHResult
            | Op::Incl(_)
            | Op::Eval
            | Op::FPushFunc { .. }
            | Op::FPushObjMethodD { .. }
            | Op::FPushClsMethod { .. }
            | Op::FPushCuf { .. }
            | Op::FCallArray => 1,

            Op::AddNewElemC
            | Op::Add
            | Op::Sub
            | Op::Mul
            | Op::Div
            | Op::Mod
            | Op::Pow
            | Op::BitAnd
            | Op::BitOr
            | Op::BitXor
            | Op::Shl
            | Op::Shr
            | Op::Concat
            | Op::Xor
            | Op::Eq
            | Op::Neq
            | Op::Lt
            | Op::Gt
            | Op::Lte
            | Op::Gte
            | Op::Cmp
            | Op::Same
            | Op::NSame
            | Op::SetN
            | Op::InstanceOf
            | Op::AKExists
            | Op::SetS(_)
            | Op::FPushObjMethod { .. } => 2,

            Op::AddElemC | Op::Idx | Op::ArrayIdx => 3,

            Op::NewPackedArray(n)
            | Op::NewVecArray(n)
            | Op::NewKeysetArray(n)
            | Op::ConcatN(n)
            | Op::RetM(n) => *n,
            Op::NewStructDict(keys) => keys.len() as u32,

            Op::FCall { num_args }
            | Op::FCallD { num_args, .. }
            | Op::FCallUnpack { num_args }
            | Op::FCallAwait { num_args, .. }
            | Op::FCallBuiltin { num_args, .. } => *num_args,
            Op::FCallM { num_args, num_rets } | Op::FCallDM { num_args, num_rets, .. } => {
                num_args + num_rets.saturating_sub(1)
            }
        }
    }

    /// Number of stack slots produced.
    pub fn num_push(&self) -> u32 {
        match self {
            Op::Nop
            | Op::PopC
            | Op::Fatal(_)
            | Op::Throw
            | Op::Jmp(_)
            | Op::JmpNS(_)
            | Op::JmpZ(_)
            | Op::JmpNZ(_)
            | Op::Switch { .. }
            | Op::SSwitch { .. }
            | Op::RetC
            | Op::RetM(_)
            | Op::PopL(_)
            | Op::UnsetL(_)
            | Op::ClsRefGetL(..)
            | Op::ClsRefGetC(_)
            | Op::DiscardClsRef(_)
            | Op::SelfCls(_)
            | Op::ParentCls(_)
            | Op::LateBoundCls(_)
            | Op::CheckThis
            | Op::InitThisLoc(_)
            | Op::StaticLocDef(_)
            | Op::StaticLocInit(_)
            | Op::IterInit { .. }
            | Op::IterInitK { .. }
            | Op::IterNext { .. }
            | Op::IterNextK { .. }
            | Op::IterFree(_)
            | Op::IterBreak { .. }
            | Op::VerifyParamType(_)
            | Op::Silence(..)
            | Op::FPushFuncD { .. }
            | Op::FPushFunc { .. }
            | Op::FPushFuncU { .. }
            | Op::FPushObjMethodD { .. }
            | Op::FPushObjMethod { .. }
            | Op::FPushClsMethodD { .. }
            | Op::FPushClsMethod { .. }
            | Op::FPushClsMethodSD { .. }
            | Op::FPushCuf { .. } => 0,

            Op::Dup | Op::CGetL2(_) => 2,

            Op::FCallM { num_rets, .. } | Op::FCallDM { num_rets, .. } => *num_rets,

            Op::Null
            | Op::NullUninit
            | Op::True
            | Op::False
            | Op::Int(_)
            | Op::Double(_)
            | Op::String(_)
            | Op::Array(_)
            | Op::Vec(_)
            | Op::Dict(_)
            | Op::Keyset(_)
            | Op::NewArray(_)
            | Op::NewPackedArray(_)
            | Op::NewVecArray(_)
            | Op::NewKeysetArray(_)
            | Op::NewDictArray(_)
            | Op::NewStructDict(_)
            | Op::AddElemC
            | Op::AddNewElemC
            | Op::Add
            | Op::Sub
            | Op::Mul
            | Op::Div
            | Op::Mod
            | Op::Pow
            | Op::BitAnd
            | Op::BitOr
            | Op::BitXor
            | Op::Shl
            | Op::Shr
            | Op::Concat
            | Op::ConcatN(_)
            | Op::Xor
            | Op::Not
            | Op::BitNot
            | Op::Eq
            | Op::Neq
            | Op::Lt
            | Op::Gt
            | Op::Lte
            | Op::Gte
            | Op::Cmp
            | Op::Same
            | Op::NSame
            | Op::CastBool
            | Op::CastInt
            | Op::CastDouble
            | Op::CastString
            | Op::CastArray
            | Op::CastObject
            | Op::CastVec
            | Op::CastDict
            | Op::CastKeyset
            | Op::Print
            | Op::Clone
            | Op::Exit
            | Op::Catch
            | Op::CGetL(_)
            | Op::CGetQuietL(_)
            | Op::CUGetL(_)
            | Op::PushL(_)
            | Op::CGetN
            | Op::IssetL(_)
            | Op::EmptyL(_)
            | Op::IsTypeL(..)
            | Op::SetL(_)
            | Op::SetN
            | Op::SetOpL(..)
            | Op::IncDecL(..)
            | Op::IsTypeC(_)
            | Op::IsUninit
            | Op::InstanceOfD(_)
            | Op::InstanceOf
            | Op::IsMemoType
            | Op::MaybeMemoType
            | Op::AKExists
            | Op::CGetS(_)
            | Op::SetS(_)
            | Op::IssetS(_)
            | Op::Cns(_)
            | Op::CnsE(_)
            | Op::CnsU { .. }
            | Op::DefCns(_)
            | Op::ClsCns { .. }
            | Op::ClsCnsD { .. }
            | Op::This
            | Op::BareThis(_)
            | Op::StaticLocCheck(_)
            | Op::MemoGet(_)
            | Op::MemoSet(_)
            | Op::VerifyRetTypeC
            | Op::VerifyRetNonNullC
            | Op::Await
            | Op::AwaitAll(_)
            | Op::WHResult
            | Op::Incl(_)
            | Op::Eval
            | Op::Idx
            | Op::ArrayIdx
            | Op::FPushCtorD { .. }
            | Op::FPushCtor { .. }
            | Op::FCall { .. }
            | Op::FCallD { .. }
            | Op::FCallArray
            | Op::FCallUnpack { .. }
            | Op::FCallAwait { .. }
            | Op::FCallBuiltin { .. } => 1,
        }
    }

    /// Whether control never continues to the next instruction.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Op::RetC
                | Op::RetM(_)
                | Op::Throw
                | Op::Fatal(_)
                | Op::Exit
                | Op::Jmp(_)
                | Op::JmpNS(_)
        )
    }

    /// Blocks this instruction may branch to, excluding fallthrough.
    pub fn targets(&self) -> Vec<BlockId> {
        match self {
            Op::Jmp(t) | Op::JmpNS(t) | Op::JmpZ(t) | Op::JmpNZ(t) => vec![*t],
            Op::Switch { targets, .. } => targets.clone(),
            Op::SSwitch { cases, default } => cases
                .iter()
                .map(|(_, t)| *t)
                .chain(std::iter::once(*default))
                .collect(),
            Op::IterInit { target, .. }
            | Op::IterInitK { target, .. }
            | Op::IterNext { target, .. }
            | Op::IterNextK { target, .. }
            | Op::IterBreak { target, .. } => vec![*target],
            _ => Vec::new(),
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    f.write_str("<")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(">")
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())?;
        match self {
            Op::Int(i) => write!(f, " {i}"),
            Op::Double(d) => write!(f, " {d:?}"),
            Op::String(s) | Op::InstanceOfD(s) | Op::Cns(s) | Op::CnsE(s) | Op::DefCns(s) => {
                write!(f, " {s:?}")
            }
            Op::Array(entries) => write!(f, " {}", Value::Arr(entries.clone())),
            Op::Vec(elems) => write!(f, " {}", Value::Vec(elems.clone())),
            Op::Dict(entries) => write!(f, " {}", Value::Dict(entries.clone())),
            Op::Keyset(keys) => write!(f, " {}", Value::Keyset(keys.clone())),
            Op::NewArray(n)
            | Op::NewPackedArray(n)
            | Op::NewVecArray(n)
            | Op::NewKeysetArray(n)
            | Op::NewDictArray(n)
            | Op::ConcatN(n)
            | Op::RetM(n) => write!(f, " {n}"),
            Op::NewStructDict(keys) => {
                f.write_str(" ")?;
                let quoted: Vec<String> = keys.iter().map(|k| format!("{k:?}")).collect();
                write_list(f, &quoted)
            }
            Op::Fatal(op) => write!(f, " {op}"),
            Op::Jmp(t) | Op::JmpNS(t) | Op::JmpZ(t) | Op::JmpNZ(t) => write!(f, " {t}"),
            Op::Switch {
                kind,
                base,
                targets,
            } => {
                write!(f, " {kind} {base} ")?;
                write_list(f, targets)
            }
            Op::SSwitch { cases, default } => {
                f.write_str(" ")?;
                let arms: Vec<String> = cases
                    .iter()
                    .map(|(s, t)| format!("{s:?}:{t}"))
                    .chain(std::iter::once(format!("-:{default}")))
                    .collect();
                write_list(f, &arms)
            }
            Op::CGetL(l)
            | Op::CGetQuietL(l)
            | Op::CUGetL(l)
            | Op::PushL(l)
            | Op::CGetL2(l)
            | Op::IssetL(l)
            | Op::EmptyL(l)
            | Op::SetL(l)
            | Op::PopL(l)
            | Op::UnsetL(l)
            | Op::InitThisLoc(l)
            | Op::StaticLocCheck(l)
            | Op::StaticLocDef(l)
            | Op::StaticLocInit(l)
            | Op::VerifyParamType(l) => write!(f, " {l}"),
            Op::IsTypeL(l, op) => write!(f, " {l} {op}"),
            Op::SetOpL(l, op) => write!(f, " {l} {op}"),
            Op::IncDecL(l, op) => write!(f, " {l} {op}"),
            Op::Silence(l, op) => write!(f, " {l} {op}"),
            Op::IsTypeC(op) => write!(f, " {op}"),
            Op::CGetS(s)
            | Op::SetS(s)
            | Op::IssetS(s)
            | Op::ClsRefGetC(s)
            | Op::DiscardClsRef(s)
            | Op::SelfCls(s)
            | Op::ParentCls(s)
            | Op::LateBoundCls(s) => write!(f, " {s}"),
            Op::ClsRefGetL(l, s) => write!(f, " {l} {s}"),
            Op::CnsU { name, fallback } => write!(f, " {name:?} {fallback:?}"),
            Op::ClsCns { name, slot } => write!(f, " {name:?} {slot}"),
            Op::ClsCnsD { name, class } => write!(f, " {name:?} {class:?}"),
            Op::BareThis(op) => write!(f, " {op}"),
            Op::IterInit {
                iter,
                target,
                value,
            }
            | Op::IterNext {
                iter,
                target,
                value,
            } => write!(f, " {iter} {target} {value}"),
            Op::IterInitK {
                iter,
                target,
                value,
                key,
            }
            | Op::IterNextK {
                iter,
                target,
                value,
                key,
            } => write!(f, " {iter} {target} {value} {key}"),
            Op::IterFree(iter) => write!(f, " {iter}"),
            Op::IterBreak { target, iters } => {
                write!(f, " {target} ")?;
                write_list(f, iters)
            }
            Op::MemoGet(range) | Op::MemoSet(range) | Op::AwaitAll(range) => {
                write!(f, " {range}")
            }
            Op::Incl(op) => write!(f, " {op}"),
            Op::FPushFuncD { num_args, name } => write!(f, " {num_args} {name:?}"),
            Op::FPushFuncU {
                num_args,
                name,
                fallback,
            } => write!(f, " {num_args} {name:?} {fallback:?}"),
            Op::FPushObjMethodD {
                num_args,
                method,
                null_safe,
            } => {
                write!(f, " {num_args} {method:?}")?;
                if *null_safe { f.write_str(" NullSafe") } else { Ok(()) }
            }
            Op::FPushObjMethod {
                num_args,
                null_safe,
            } => {
                write!(f, " {num_args}")?;
                if *null_safe { f.write_str(" NullSafe") } else { Ok(()) }
            }
            Op::FPushClsMethodD {
                num_args,
                method,
                class,
            } => write!(f, " {num_args} {method:?} {class:?}"),
            Op::FPushClsMethod { num_args, slot } | Op::FPushCtor { num_args, slot } => {
                write!(f, " {num_args} {slot}")
            }
            Op::FPushClsMethodSD {
                num_args,
                cls_ref,
                method,
            } => write!(f, " {num_args} {cls_ref} {method:?}"),
            Op::FPushCtorD { num_args, class } => write!(f, " {num_args} {class:?}"),
            Op::FPushFunc { num_args }
            | Op::FPushCuf { num_args }
            | Op::FCall { num_args }
            | Op::FCallUnpack { num_args } => write!(f, " {num_args}"),
            Op::FCallD {
                num_args,
                class,
                func,
            }
            | Op::FCallAwait {
                num_args,
                class,
                func,
            } => write!(f, " {num_args} {class:?} {func:?}"),
            Op::FCallM { num_args, num_rets } => write!(f, " {num_args} {num_rets}"),
            Op::FCallDM {
                num_args,
                num_rets,
                class,
                func,
            } => write!(f, " {num_args} {num_rets} {class:?} {func:?}"),
            Op::FCallBuiltin { num_args, name } => write!(f, " {num_args} {name:?}"),
            _ => Ok(()),
        }
    }
}

/// Render a sequence of instructions separated by `; `.
pub fn show_ops(ops: &[Op]) -> String {
    ops.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

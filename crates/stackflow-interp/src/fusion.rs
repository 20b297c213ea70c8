//! Type tests feeding a conditional jump, interpreted as one unit.
//!
//! Interpreted one at a time, a test pushes a boolean and the jump can only
//! refine that boolean. As a group, the tested value itself is refined on
//! each edge: `IsTypeL $x Int; JmpZ` knows `$x` is an int on the fallthrough.
//!
//! A group is a test, an optional `Not` that swaps the edges, and a `JmpZ`
//! or `JmpNZ`. The groups are listed in [`PATTERNS`]. A handler that finds
//! nothing to refine interprets the instructions one by one instead.

use stackflow_bytecode::{BlockId, LocalId, Op, OpTag, show_ops};
use stackflow_types::query::{refine_istype, type_of_istype};
use stackflow_types::{IsTypeOp, Type, TypeBits};
use tracing::debug;

use crate::env::{Env, Location};
use crate::error::Result;
use crate::ops::{
    memoize_impl_ret_type, nan_free, resolve_same, static_loc_helper, supports_non_objects,
};
use crate::reduce::impl_only;
use crate::state::StackEquiv;

/// The jump closing a group, with a `Not` already applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CondJmp {
    target: BlockId,
    /// The jump is taken when the test succeeded.
    on_success: bool,
}

type GroupHandler = fn(&mut Env<'_, '_>, &[Op], CondJmp) -> Result<()>;

struct Pattern {
    /// The instructions before the optional `Not` and the jump.
    head: &'static [OpTag],
    negatable: bool,
    handler: GroupHandler,
}

/// Longer heads come first.
const PATTERNS: &[Pattern] = &[
    Pattern {
        head: &[OpTag::MemoGet, OpTag::IsUninit],
        negatable: false,
        handler: memo_get_jmp,
    },
    Pattern {
        head: &[OpTag::InstanceOfD],
        negatable: true,
        handler: instance_of_jmp,
    },
    Pattern {
        head: &[OpTag::IsTypeL],
        negatable: true,
        handler: is_type_l_jmp,
    },
    Pattern {
        head: &[OpTag::IsTypeC],
        negatable: true,
        handler: is_type_c_jmp,
    },
    Pattern {
        head: &[OpTag::IsUninit],
        negatable: true,
        handler: is_uninit_jmp,
    },
    Pattern {
        head: &[OpTag::StaticLocCheck],
        negatable: true,
        handler: static_loc_check_jmp,
    },
    Pattern {
        head: &[OpTag::Same],
        negatable: true,
        handler: same_jmp,
    },
    Pattern {
        head: &[OpTag::NSame],
        negatable: true,
        handler: same_jmp,
    },
];

impl Pattern {
    fn matches(&self, ops: &[Op]) -> Option<Group> {
        let n = self.head.len();
        if ops.len() <= n || !ops.iter().zip(self.head).all(|(op, tag)| op.tag() == *tag) {
            return None;
        }
        let negate = self.negatable && matches!(ops[n], Op::Not);
        let i = if negate { n + 1 } else { n };
        let (target, nonzero) = match ops.get(i)? {
            Op::JmpZ(target) => (*target, false),
            Op::JmpNZ(target) => (*target, true),
            _ => return None,
        };
        Some(Group {
            len: i + 1,
            jmp: CondJmp {
                target,
                on_success: nonzero != negate,
            },
            handler: self.handler,
        })
    }
}

/// A group found at the start of a run of instructions.
pub(crate) struct Group {
    len: usize,
    jmp: CondJmp,
    handler: GroupHandler,
}

impl Group {
    /// The group starting `ops`, if any.
    pub(crate) fn find(ops: &[Op]) -> Option<Group> {
        PATTERNS.iter().find_map(|p| p.matches(ops))
    }

    /// Number of instructions in the group.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Interpret the group; `ops` starts with it.
    pub(crate) fn run(&self, env: &mut Env<'_, '_>, ops: &[Op]) -> Result<()> {
        let ops = &ops[..self.len];
        debug!(group = %show_ops(ops), "fused branch");
        (self.handler)(env, ops, self.jmp)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Interpret the group one instruction at a time.
fn bail(env: &mut Env<'_, '_>, ops: &[Op]) -> Result<()> {
    impl_only(env, ops)
}

/// Refine `loc` with `pass` on the edge taken when the test succeeded and
/// with `fail` on the other.
fn branch_on(
    env: &mut Env<'_, '_>,
    loc: Location,
    jmp: CondJmp,
    pass: &dyn Fn(&Type) -> Type,
    fail: &dyn Fn(&Type) -> Type,
) -> Result<()> {
    if jmp.on_success {
        env.refine_location(loc, pass, jmp.target, fail)
    } else {
        env.refine_location(loc, fail, jmp.target, pass)
    }
}

/// Send `target` the state with `taken` on top of the stack and continue
/// with `fallthrough` there.
fn split_top(env: &mut Env<'_, '_>, target: BlockId, taken: Type, fallthrough: Type) -> Result<()> {
    env.push(taken);
    env.propagate_current(target);
    env.discard(1)?;
    env.push(fallthrough);
    Ok(())
}

/// The tested value `val` has been popped. Push it back, as `test` on the
/// success edge and as `fail` on the other.
fn type_test_propagate(
    env: &mut Env<'_, '_>,
    val: Type,
    test: Type,
    fail: Type,
    jmp: CondJmp,
) -> Result<()> {
    env.nothrow();
    let passed = if val.subtype_of(&test) || fail.is_bottom() {
        env.push(val);
        true
    } else if !val.could_be(&test) {
        env.push(fail);
        false
    } else if jmp.on_success {
        return split_top(env, jmp.target, test, fail);
    } else {
        return split_top(env, jmp.target, fail, test);
    };

    if passed == jmp.on_success {
        env.jmp_setdest(jmp.target);
        env.propagate_current(jmp.target);
    } else {
        env.jmp_nevertaken();
    }
    Ok(())
}

// ============================================================================
// Type tests
// ============================================================================

/// Whether the outcome of `test` on a value of type `val` is open, so that
/// each edge learns something.
fn is_type_refines(test: IsTypeOp, val: &Type) -> bool {
    if matches!(test, IsTypeOp::Scalar | IsTypeOp::ArrLike) {
        return false;
    }
    let test_t = type_of_istype(test);
    val.subtype_of(&Type::CELL) && !val.subtype_of(&test_t) && val.could_be(&test_t)
}

fn is_type_branch(env: &mut Env<'_, '_>, test: IsTypeOp, loc: Location, jmp: CondJmp) -> Result<()> {
    branch_on(
        env,
        loc,
        jmp,
        &|t| refine_istype(test, t).0,
        &|t| refine_istype(test, t).1,
    )
}

fn is_type_l_jmp(env: &mut Env<'_, '_>, ops: &[Op], jmp: CondJmp) -> Result<()> {
    let Op::IsTypeL(l, test) = &ops[0] else {
        return bail(env, ops);
    };
    if !is_type_refines(*test, &env.loc_raw(*l)?) {
        return bail(env, ops);
    }
    if !env.loc_could_be_uninit(*l)? {
        env.nothrow();
    }
    env.may_read_local(*l);
    is_type_branch(env, *test, Location::Local(*l), jmp)
}

fn is_type_c_jmp(env: &mut Env<'_, '_>, ops: &[Op], jmp: CondJmp) -> Result<()> {
    let Op::IsTypeC(test) = &ops[0] else {
        return bail(env, ops);
    };
    let Some(loc) = Location::of(env.top_equiv()?) else {
        return bail(env, ops);
    };
    if !is_type_refines(*test, env.top_t(0)?) {
        return bail(env, ops);
    }
    env.nothrow();
    env.pop()?;
    is_type_branch(env, *test, loc, jmp)
}

fn is_uninit_jmp(env: &mut Env<'_, '_>, _ops: &[Op], jmp: CondJmp) -> Result<()> {
    let val = env.pop()?;
    let fail = val.remove_uninit();
    type_test_propagate(env, val, Type::UNINIT, fail, jmp)
}

/// A memo cache hit has the memoized implementation's return type.
fn memo_get_jmp(env: &mut Env<'_, '_>, ops: &[Op], jmp: CondJmp) -> Result<()> {
    impl_only(env, &ops[..1])?;
    let val = env.pop()?;
    let hit = if env.func().is_memoize_wrapper() {
        memoize_impl_ret_type(env)?
    } else {
        val.remove_uninit()
    };
    type_test_propagate(env, val, Type::UNINIT, hit, jmp)
}

fn instance_of_jmp(env: &mut Env<'_, '_>, ops: &[Op], jmp: CondJmp) -> Result<()> {
    let Op::InstanceOfD(name) = &ops[0] else {
        return bail(env, ops);
    };
    let Some(loc) = Location::of(env.top_equiv()?) else {
        return bail(env, ops);
    };
    if supports_non_objects(name) {
        return bail(env, ops);
    }
    let Some(cls) = env.index().resolve_class(name) else {
        return bail(env, ops);
    };
    let val = env.top_t(0)?.to_cell();
    let test = Type::obj_sub(cls);
    if val.subtype_of(&test) || !val.could_be(&test) {
        return bail(env, ops);
    }

    // An optional value whose object always passes fails only when null.
    let fail_implies_null = val.is_opt() && val.unopt().subtype_of(&test);
    env.nothrow();
    env.pop_c()?;
    branch_on(
        env,
        loc,
        jmp,
        &|_| test.clone(),
        &|t| match fail_implies_null {
            true if t.could_be_bits(TypeBits::UNINIT) => Type::NULL,
            true => Type::INIT_NULL,
            false => t.clone(),
        },
    )
}

// ============================================================================
// Strict equality
// ============================================================================

/// The location a `Same` operand stands for, once both operands are popped.
fn operand_location(equiv: StackEquiv, depth: usize) -> Option<Location> {
    match equiv {
        StackEquiv::Local(l) => Some(Location::Local(l)),
        // The lower operand duplicates the slot left on top.
        StackEquiv::Dup if depth == 1 => Some(Location::StackTop),
        StackEquiv::Dup | StackEquiv::None => None,
    }
}

/// The operands of a `Same` whose outcome is open. `0` was on top.
struct SameOperands {
    loc0: Option<Location>,
    loc1: Option<Location>,
    ty0: Type,
    ty1: Type,
}

impl SameOperands {
    /// Both operands hold the same value.
    fn refine_same(&self, env: &mut Env<'_, '_>) -> Result<()> {
        if let (Some(Location::Local(a)), Some(Location::Local(b))) = (self.loc0, self.loc1) {
            // Identity of objects and resources, or an uncounted value, is
            // what `===` compares.
            let by_identity = [&self.ty0, &self.ty1]
                .iter()
                .any(|t| t.subtype_of(&Type::OBJ.opt()) || t.subtype_of(&Type::RES.opt()))
                || (self.ty0.subtype_of(&Type::UNC) && self.ty1.subtype_of(&Type::UNC));
            if by_identity {
                env.add_loc_equiv(a, b);
            }
        }
        let Some(loc) = self.loc1.or(self.loc0) else {
            return Ok(());
        };
        let isect = self.ty0.intersect(&self.ty1);
        env.refine_at(loc, &|t| {
            if !t.could_be_bits(TypeBits::UNINIT) || !isect.could_be_bits(TypeBits::NULL) {
                t.intersect(&isect)
            } else if isect.subtype_of(&Type::NULL) {
                if t.could_be_bits(TypeBits::INIT_NULL) {
                    Type::NULL
                } else {
                    Type::UNINIT
                }
            } else {
                t.clone()
            }
        })?;
        Ok(())
    }

    /// The operands hold different values.
    fn refine_differ(&self, env: &mut Env<'_, '_>) -> Result<()> {
        if let Some(loc) = self.loc0 {
            refine_differ(env, loc, &self.ty1)?;
        }
        if let Some(loc) = self.loc1 {
            refine_differ(env, loc, &self.ty0)?;
        }
        Ok(())
    }
}

/// A value known to differ from one of type `other` is not null when
/// `other` is, and has the other boolean when `other` is a boolean literal.
fn refine_differ(env: &mut Env<'_, '_>, loc: Location, other: &Type) -> Result<()> {
    if other.subtype_of(&Type::NULL) {
        env.refine_at(loc, &|t| {
            let t = t.remove_uninit();
            if t.is_opt() { t.unopt() } else { t }
        })?;
    } else if other.strict_subtype_of(&Type::BOOL) {
        let flipped = if *other == Type::FALSE {
            Type::TRUE
        } else {
            Type::FALSE
        };
        env.refine_at(loc, &|t| {
            if t.subtype_of(&Type::BOOL) {
                flipped.clone()
            } else {
                t.clone()
            }
        })?;
    }
    Ok(())
}

fn same_jmp(env: &mut Env<'_, '_>, ops: &[Op], jmp: CondJmp) -> Result<()> {
    let nsame = matches!(ops[0], Op::NSame);
    let (result, might_warn) = resolve_same(env)?;
    if result != Type::BOOL {
        return bail(env, ops);
    }

    let e0 = env.top_elem(0)?.clone();
    let e1 = env.top_elem(1)?.clone();
    let operands = SameOperands {
        loc0: operand_location(e0.equiv, 0),
        loc1: operand_location(e1.equiv, 1),
        ty0: e0.ty.to_cell(),
        ty1: e1.ty.to_cell(),
    };
    let SameOperands {
        loc0,
        loc1,
        ty0,
        ty1,
    } = &operands;
    if loc0.is_none() && loc1.is_none() {
        return bail(env, ops);
    }
    if !nan_free(ty0, ty1) {
        return bail(env, ops);
    }
    let (val0, val1) = (ty0.tv(), ty1.tv());
    if (val0.is_some() && val1.is_some())
        || (loc0.is_none() && val0.is_none() && ty1.subtype_of(ty0))
        || (loc1.is_none() && val1.is_none() && ty0.subtype_of(ty1))
    {
        return bail(env, ops);
    }

    if !might_warn {
        env.nothrow();
    }
    env.discard(2)?;

    let same_on_jump = nsame != jmp.on_success;
    let saved = env.interp.state.clone();
    if same_on_jump {
        operands.refine_same(env)?;
    } else {
        operands.refine_differ(env)?;
    }
    env.propagate_current(jmp.target);
    env.interp.state = saved;
    if same_on_jump {
        operands.refine_differ(env)
    } else {
        operands.refine_same(env)
    }
}

// ============================================================================
// Function statics
// ============================================================================

/// After a `StaticLocCheck` the local is bound on the success edge and
/// untouched on the other.
fn static_loc_check_jmp(env: &mut Env<'_, '_>, ops: &[Op], jmp: CondJmp) -> Result<()> {
    let Op::StaticLocCheck(l) = &ops[0] else {
        return bail(env, ops);
    };
    let l: LocalId = *l;
    let saved = env.interp.state.clone();
    if static_loc_helper(env, l, Type::BOTTOM)?.is_some() {
        env.interp.state = saved;
        return bail(env, ops);
    }

    let never_initialized = env
        .interp
        .collect
        .local_static_type(l)
        .is_some_and(Type::is_bottom);
    if never_initialized {
        if jmp.on_success {
            env.interp.state = saved;
            env.jmp_nevertaken();
        } else {
            env.propagate(jmp.target, &saved);
            env.jmp_setdest(jmp.target);
        }
        return Ok(());
    }

    if jmp.on_success {
        env.propagate_current(jmp.target);
        env.interp.state = saved;
    } else {
        env.propagate(jmp.target, &saved);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use stackflow_types::IsTypeOp;

    use super::*;

    fn b(i: u32) -> BlockId {
        BlockId::new(i)
    }

    #[test]
    fn not_swaps_the_edges() {
        let l = LocalId::new(0);
        let plain = Group::find(&[Op::IsTypeL(l, IsTypeOp::Null), Op::JmpZ(b(1))]).unwrap();
        assert_eq!(plain.len(), 2);
        assert!(!plain.jmp.on_success);

        let negated = Group::find(&[
            Op::IsTypeL(l, IsTypeOp::Null),
            Op::Not,
            Op::JmpZ(b(1)),
            Op::Nop,
        ])
        .unwrap();
        assert_eq!(negated.len(), 3);
        assert!(negated.jmp.on_success);
    }

    #[test]
    fn memo_get_needs_the_uninit_test() {
        let range = stackflow_bytecode::LocalRange::new(LocalId::new(0), 0);
        let group = Group::find(&[Op::MemoGet(range), Op::IsUninit, Op::JmpNZ(b(2))]).unwrap();
        assert_eq!(group.len(), 3);
        assert!(Group::find(&[Op::MemoGet(range), Op::JmpNZ(b(2))]).is_none());
        assert!(Group::find(&[Op::MemoGet(range), Op::IsUninit, Op::Not, Op::JmpNZ(b(2))]).is_none());
    }

    #[test]
    fn tests_without_a_jump_are_not_grouped() {
        assert!(Group::find(&[Op::Same, Op::Not]).is_none());
        assert!(Group::find(&[Op::Same]).is_none());
        assert!(Group::find(&[Op::Eq, Op::JmpZ(b(1))]).is_none());
    }
}

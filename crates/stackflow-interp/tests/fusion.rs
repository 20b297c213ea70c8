//! Type tests feeding a conditional jump refine the tested value per edge.

mod common;

use common::*;
use proptest::prelude::*;
use stackflow_bytecode::Op;
use stackflow_index::{ClassDecl, MemIndex};
use stackflow_test_utils::{Harness, Outcome};
use stackflow_types::{ClassRef, IsTypeOp, Type};

fn run_with_x(ops: Vec<Op>, x: Type) -> Outcome {
    let mut h = harness(ops);
    let state = h.entry_state().with_local(l(0), x);
    h.run_from(b(0), state).unwrap()
}

/// The type of `$x` on each edge, in propagation order.
fn x_on_edges(out: &Outcome) -> Vec<(u32, Type)> {
    out.propagated
        .iter()
        .map(|(blk, s)| (blk.index() as u32, s.local(l(0)).cloned().unwrap()))
        .collect()
}

#[test]
fn is_type_splits_the_local() {
    let out = run_with_x(
        vec![Op::IsTypeL(l(0), IsTypeOp::Int), Op::JmpZ(b(2))],
        Type::INIT_CELL,
    );
    let edges = x_on_edges(&out);
    assert_eq!(edges.len(), 2);
    let (taken, fallthrough) = (&edges[0], &edges[1]);
    assert_eq!(taken.0, 2);
    assert!(!taken.1.could_be(&Type::INT));
    assert_eq!(fallthrough, &(1, Type::INT));
    assert_eq!(taken.1.union(&fallthrough.1), Type::INIT_CELL);
}

#[test]
fn not_swaps_the_refinements() {
    let out = run_with_x(
        vec![Op::IsTypeL(l(0), IsTypeOp::Null), Op::Not, Op::JmpZ(b(2))],
        Type::INT.opt(),
    );
    assert_eq!(
        x_on_edges(&out),
        vec![(2, Type::INIT_NULL), (1, Type::INT)]
    );
}

#[test]
fn refinement_reaches_equivalent_locals() {
    let ops = vec![
        Op::CGetL(l(0)),
        Op::SetL(l(1)),
        Op::PopC,
        Op::IsTypeL(l(1), IsTypeOp::Str),
        Op::JmpNZ(b(2)),
    ];
    let out = run_with_x(ops, Type::INT.union(&Type::STR));
    let taken = out.to(b(2))[0];
    assert_eq!(taken.local(l(0)), Some(&Type::STR));
    assert_eq!(taken.local(l(1)), Some(&Type::STR));
    assert_eq!(out.state.local(l(0)), Some(&Type::INT));
}

#[test]
fn stack_test_refines_the_local_it_was_read_from() {
    let ops = vec![
        Op::CGetL(l(0)),
        Op::IsTypeC(IsTypeOp::Null),
        Op::JmpNZ(b(2)),
    ];
    let out = run_with_x(ops, Type::STR.opt());
    assert_eq!(
        x_on_edges(&out),
        vec![(2, Type::INIT_NULL), (1, Type::STR)]
    );
}

#[test]
fn decided_tests_take_a_single_edge() {
    let out = run_with_x(
        vec![Op::IsTypeL(l(0), IsTypeOp::Int), Op::JmpNZ(b(2))],
        Type::INT,
    );
    assert_eq!(x_on_edges(&out), vec![(2, Type::INT)]);
    assert!(out.flags.returned.is_none());
}

#[test]
fn uninit_test_splits_or_settles_the_stack_top() {
    let ops = vec![Op::CUGetL(l(1)), Op::IsUninit, Op::JmpNZ(b(2))];
    let mut h = harness(ops);

    let maybe = h.entry_state().with_local(l(1), Type::UNINIT.union(&Type::INT));
    let out = h.run_from(b(0), maybe).unwrap();
    assert_eq!(out.targets(), vec![b(2), b(1)]);
    assert_eq!(out.to(b(2))[0].top(), Some(&Type::UNINIT));
    assert_eq!(out.to(b(1))[0].top(), Some(&Type::INT));

    let set = h.entry_state().with_local(l(1), Type::INT);
    let out = h.run_from(b(0), set).unwrap();
    assert_eq!(out.targets(), vec![b(1)]);
    assert_eq!(out.state.top(), Some(&Type::INT));
}

#[test]
fn null_comparison_splits_an_optional() {
    let ops = vec![Op::CGetL(l(0)), Op::Null, Op::Same, Op::JmpZ(b(2))];
    let out = run_with_x(ops, Type::INT.opt());
    assert_eq!(
        x_on_edges(&out),
        vec![(2, Type::INT), (1, Type::INIT_NULL)]
    );
}

#[test]
fn identical_locals_compare_equal_without_throwing() {
    let ops = vec![
        Op::CGetL(l(0)),
        Op::SetL(l(1)),
        Op::PopC,
        Op::CGetL(l(0)),
        Op::CGetL(l(1)),
        Op::Same,
        Op::JmpZ(b(2)),
    ];
    let mut h = Harness::new(func_with_exits(ops, vec![b(3)]));
    let state = h.entry_state().with_local(l(0), Type::INT);
    let out = h.run_from(b(0), state.clone()).unwrap();
    assert_eq!(out.targets(), vec![b(1)]);

    let state = state
        .with_local(l(1), Type::INT)
        .with_stack([Type::INT, Type::INT]);
    let mut same_locals = state.clone();
    same_locals.equiv.add(l(1), l(0));
    same_locals.stack[0].equiv = stackflow_interp::StackEquiv::Local(l(0));
    same_locals.stack[1].equiv = stackflow_interp::StackEquiv::Local(l(1));
    let (flags, after) = h.step(same_locals, &Op::Same).unwrap();
    assert_eq!(after.top(), Some(&Type::TRUE));
    assert!(flags.effect_free);

    let (_, after) = h.step(state, &Op::Same).unwrap();
    assert_eq!(after.top(), Some(&Type::BOOL));
}

#[test]
fn a_double_need_not_be_identical_to_itself() {
    let mut h = harness(vec![]);
    let mut state = h
        .entry_state()
        .with_local(l(0), Type::DBL)
        .with_stack([Type::DBL, Type::DBL]);
    state.stack[0].equiv = stackflow_interp::StackEquiv::Local(l(0));
    state.stack[1].equiv = stackflow_interp::StackEquiv::Local(l(0));
    let (_, after) = h.step(state.clone(), &Op::Same).unwrap();
    assert_eq!(after.top(), Some(&Type::BOOL));

    state.stack[1].equiv = stackflow_interp::StackEquiv::Dup;
    let (_, after) = h.step(state, &Op::NSame).unwrap();
    assert_eq!(after.top(), Some(&Type::BOOL));
}

#[test]
fn comparison_that_could_involve_nan_does_not_refine() {
    let ops = vec![Op::CGetL(l(0)), Op::Null, Op::Same, Op::JmpZ(b(2))];
    let x = Type::DBL.opt();
    let out = run_with_x(ops, x.clone());
    assert_eq!(x_on_edges(&out), vec![(2, x.clone()), (1, x)]);
}

#[test]
fn instance_test_of_an_optional_object() {
    let foo = ClassRef::declare().name("Foo").new();
    let index = MemIndex::new().with_class(ClassDecl::builder().cls(foo.clone()).build());
    let ops = vec![
        Op::CGetL(l(0)),
        Op::InstanceOfD("Foo".into()),
        Op::JmpZ(b(2)),
    ];
    let mut h = harness(ops).with_index(index);
    let state = h
        .entry_state()
        .with_local(l(0), Type::obj_sub(foo.clone()).opt());
    let out = h.run_from(b(0), state).unwrap();
    assert_eq!(
        x_on_edges(&out),
        vec![(2, Type::INIT_NULL), (1, Type::obj_sub(foo))]
    );
}

fn tested_types() -> Vec<Type> {
    vec![
        Type::INIT_CELL,
        Type::INT,
        Type::INT.opt(),
        Type::INT.union(&Type::STR),
        Type::NUM,
        Type::BOOL,
        Type::INIT_NULL,
        Type::STR.opt(),
        Type::ARR_KEY,
    ]
}

fn tests() -> Vec<IsTypeOp> {
    vec![
        IsTypeOp::Null,
        IsTypeOp::Bool,
        IsTypeOp::Int,
        IsTypeOp::Dbl,
        IsTypeOp::Str,
        IsTypeOp::Vec,
    ]
}

proptest! {
    #[test]
    fn fused_refinements_partition_the_tested_type(
        x in prop::sample::select(tested_types()),
        test in prop::sample::select(tests()),
        negate in any::<bool>(),
        nonzero in any::<bool>(),
    ) {
        let mut ops = vec![Op::IsTypeL(l(0), test)];
        if negate {
            ops.push(Op::Not);
        }
        ops.push(if nonzero { Op::JmpNZ(b(2)) } else { Op::JmpZ(b(2)) });

        let out = run_with_x(ops, x.clone());
        let edges = x_on_edges(&out);
        prop_assert!(!edges.is_empty() && edges.len() <= 2);
        let union = edges.iter().fold(Type::BOTTOM, |acc, (_, t)| acc.union(t));
        prop_assert_eq!(union, x);
        if let [(_, a), (_, b)] = edges.as_slice() {
            prop_assert!(!a.could_be(b));
        }
    }
}

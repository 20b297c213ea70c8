//! Block-level behavior: what `run` returns and which states leave the block.

mod common;

use common::*;
use stackflow_bytecode::{Op, SwitchKind};
use stackflow_interp::{CollectedInfo, CollectionOpts, InterpError};
use stackflow_test_utils::Harness;
use stackflow_types::{Type, Value};

#[test]
fn literal_arithmetic_folds_to_a_constant() {
    let mut h = harness(vec![Op::Int(1), Op::Int(2), Op::Add, Op::RetC]);
    let out = h.run(b(0)).unwrap();
    assert_eq!(out.flags.returned, Some(Type::int(3)));
    assert!(out.propagated.is_empty());

    let state = h.entry_state().with_stack([Type::int(1), Type::int(2)]);
    let (flags, after) = h.step(state, &Op::Add).unwrap();
    assert!(flags.can_const_prop);
    assert!(flags.effect_free);
    assert!(!flags.was_pei);
    insta::assert_snapshot!(after, @"stack: [Int=3] locals: L0:InitCell L1:Uninit L2:Uninit");
}

#[test]
fn end_of_block_state_flows_to_the_fallthrough() {
    let mut h = harness(vec![Op::Int(7), Op::SetL(l(1)), Op::PopC]);
    let out = h.run(b(0)).unwrap();
    assert_eq!(out.flags.returned, None);
    assert_eq!(out.targets(), vec![b(1)]);
    assert_eq!(out.to(b(1))[0].local(l(1)), Some(&Type::int(7)));
}

#[test]
fn throwing_instructions_feed_the_handlers() {
    let ops = vec![Op::CGetL(l(1)), Op::RetC];
    let mut h = Harness::new(func_with_exits(ops, vec![b(3)]));
    let out = h.run(b(0)).unwrap();

    // Reading the uninitialized `$y` may raise a notice.
    let handled = out.to(b(3));
    assert_eq!(handled.len(), 1);
    assert!(handled[0].stack.is_empty());
    assert_eq!(out.flags.returned, Some(Type::INIT_NULL));
    assert!(out.to(b(1)).is_empty());
}

#[test]
fn nothing_runs_after_a_throw() {
    let ops = vec![Op::string("boom"), Op::Throw, Op::Int(1), Op::RetC];
    let mut h = Harness::new(func_with_exits(ops, vec![b(3)]));
    let out = h.run(b(0)).unwrap();
    assert!(out.state.unreachable);
    assert_eq!(out.flags.returned, None);
    assert_eq!(out.targets(), vec![b(3)]);
}

#[test]
fn literal_switch_takes_one_edge() {
    let switch = Op::Switch {
        kind: SwitchKind::Bounded,
        base: 0,
        targets: vec![b(2), b(3)],
    };
    let mut h = harness(vec![Op::Int(1), switch.clone()]);
    let out = h.run(b(0)).unwrap();
    assert_eq!(out.targets(), vec![b(3)]);

    let mut h = harness(vec![Op::CGetL(l(0)), switch]);
    let out = h.run(b(0)).unwrap();
    assert_eq!(out.targets(), vec![b(2), b(3), b(1)]);
}

#[test]
fn unbounded_switch_defaults_to_the_last_target() {
    let switch = Op::Switch {
        kind: SwitchKind::Unbounded,
        base: 10,
        targets: vec![b(2), b(1), b(3)],
    };
    let mut h = harness(vec![Op::Int(10), switch.clone()]);
    assert_eq!(h.run(b(0)).unwrap().targets(), vec![b(2)]);

    let mut h = harness(vec![Op::Int(99), switch]);
    assert_eq!(h.run(b(0)).unwrap().targets(), vec![b(3)]);
}

#[test]
fn string_switch_compares_loosely() {
    let sswitch = Op::SSwitch {
        cases: vec![("a".into(), b(2)), ("b".into(), b(3))],
        default: b(1),
    };
    let mut h = harness(vec![Op::string("b"), sswitch]);
    assert_eq!(h.run(b(0)).unwrap().targets(), vec![b(3)]);
}

#[test]
fn iterating_an_empty_container_skips_the_loop() {
    let init = Op::IterInit {
        iter: it(0),
        target: b(2),
        value: l(1),
    };
    let mut h = harness(vec![Op::Vec(vec![]), init]);
    let out = h.run(b(0)).unwrap();

    assert_eq!(out.targets(), vec![b(2)]);
    let skipped = out.to(b(2))[0];
    assert_eq!(skipped.local(l(1)), Some(&Type::UNINIT));
}

#[test]
fn iterating_a_literal_vec_enters_the_loop() {
    let init = Op::IterInit {
        iter: it(0),
        target: b(2),
        value: l(1),
    };
    let literal = Op::Vec(vec![Value::Int(1), Value::Int(2)]);
    let mut h = harness(vec![literal, init]);
    let out = h.run(b(0)).unwrap();

    assert_eq!(out.targets(), vec![b(1)]);
    let body = out.to(b(1))[0];
    let value = body.local(l(1)).unwrap();
    assert!(value.subtype_of(&Type::INT));
}

#[test]
fn effect_free_collection_stops_at_the_first_effect() {
    let ops = vec![Op::Int(1), Op::Print, Op::PopC, Op::Null, Op::RetC];
    let mut h = harness(ops).with_collect(CollectedInfo::new(CollectionOpts::EFFECT_FREE_ONLY));
    let out = h.run(b(0)).unwrap();
    assert!(!h.collect.effect_free);
    assert_eq!(out.flags.returned, None);
    assert_eq!(out.state.stack_types(), vec![Type::int(1)]);
}

#[test]
fn malformed_blocks_are_errors() {
    let mut h = harness(vec![Op::Add]);
    assert_eq!(h.run(b(0)).unwrap_err(), InterpError::StackUnderflow);

    let mut h = harness(vec![Op::Jmp(b(1))]);
    assert!(matches!(
        h.run(b(0)),
        Err(InterpError::UnexpectedJump(_))
    ));

    let mut h = harness(vec![]);
    assert_eq!(h.run(b(9)).unwrap_err(), InterpError::UnknownBlock(b(9)));
}

#[test]
fn comparing_equivalent_locals_never_reaches_a_handler() {
    let ops = vec![
        Op::CGetL(l(0)),
        Op::SetL(l(1)),
        Op::PopC,
        Op::CGetL(l(0)),
        Op::CGetL(l(1)),
        Op::Same,
        Op::RetC,
    ];
    let mut h = Harness::new(func_with_exits(ops, vec![b(3)]));
    let state = h.entry_state().with_local(l(0), Type::INT);
    let out = h.run_from(b(0), state).unwrap();
    assert!(out.targets().is_empty());
    assert_eq!(out.flags.returned, Some(Type::TRUE));
}

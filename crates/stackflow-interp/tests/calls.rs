mod common;

use common::*;
use stackflow_bytecode::{BlockId, Op};
use stackflow_index::MemIndex;
use stackflow_interp::{ConstantUse, FpiKind};
use stackflow_test_utils::Harness;
use stackflow_types::{Type, Value};

fn push_strlen() -> Op {
    Op::FPushFuncD {
        num_args: 1,
        name: "strlen".into(),
    }
}

#[test]
fn builtin_call_on_a_literal_folds() {
    let mut h = harness(vec![]);
    let state = h.entry_state().with_stack([Type::str("abc")]);

    let (flags, state) = h.step(state, &push_strlen()).unwrap();
    assert_eq!(flags.strength_reduced, Some(vec![Op::Nop]));
    let ar = &state.fpi_stack[0];
    assert_eq!(ar.kind, FpiKind::Builtin);
    assert!(ar.foldable);

    let (flags, state) = h.step(state, &Op::FCall { num_args: 1 }).unwrap();
    assert_eq!(flags.strength_reduced, Some(vec![Op::PopC, Op::Int(3)]));
    assert_eq!(state.stack_types(), vec![Type::int(3)]);
    assert!(state.fpi_stack.is_empty());
    assert!(h.collect.unfoldable_funcs.is_empty());
}

#[test]
fn failed_fold_schedules_reanalysis() {
    let mut h = harness(vec![]);
    let entry = h.entry_state().with_stack([Type::int(3)]);

    let (_, state) = h.step(entry.clone(), &push_strlen()).unwrap();
    let (_, state) = h.step(state, &Op::FCall { num_args: 1 }).unwrap();
    assert_eq!(state.stack_types(), vec![Type::BOTTOM]);
    assert!(h.collect.is_unfoldable("strlen", BlockId::new(0)));
    assert!(h.collect.reanalyze.contains(&BlockId::new(0)));

    // The second pass over the push block knows better than to try again.
    let (_, state) = h.step(entry, &push_strlen()).unwrap();
    assert!(!state.fpi_stack[0].foldable);
    let (flags, state) = h.step(state, &Op::FCall { num_args: 1 }).unwrap();
    assert_eq!(
        flags.strength_reduced,
        Some(vec![Op::FCallBuiltin {
            num_args: 1,
            name: "strlen".into(),
        }])
    );
    assert_eq!(state.stack_types(), vec![Type::INT]);
}

#[test]
fn folding_can_be_disabled() {
    let options = stackflow_interp::Options::default().with_constant_fold_builtins(false);
    let mut h = harness(vec![]).with_options(options);
    let state = h.entry_state().with_stack([Type::str("abc")]);
    let (_, state) = h.step(state, &push_strlen()).unwrap();
    assert!(!state.fpi_stack[0].foldable);
    let (flags, _) = h.step(state, &Op::FCall { num_args: 1 }).unwrap();
    assert!(matches!(
        flags.strength_reduced.as_deref(),
        Some([Op::FCallBuiltin { .. }])
    ));
}

#[test]
fn unknown_callee_clobbers_locals() {
    let ops = vec![
        Op::CGetL(l(0)),
        Op::FPushFunc { num_args: 0 },
        Op::FCall { num_args: 0 },
        Op::PopC,
    ];
    let mut h = harness(ops);
    let state = h.entry_state().with_local(l(1), Type::INT);
    let out = h.run_from(b(0), state).unwrap();
    let after = out.to(b(1))[0];
    assert_eq!(after.local(l(1)), Some(&Type::GEN));
    assert!(after.fpi_stack.is_empty());
}

#[test]
fn known_constant_is_a_literal() {
    let index = MemIndex::new().with_constant("LIMIT", Value::Int(10));
    let mut h = Harness::new(func(vec![])).with_index(index);
    let (flags, state) = h
        .step(h.entry_state(), &Op::Cns("LIMIT".into()))
        .unwrap();
    assert_eq!(state.top(), Some(&Type::int(10)));
    assert!(flags.can_const_prop);
    assert!(flags.effect_free);
    assert!(!h.collect.reads_untracked_constants);
}

#[test]
fn unknown_constant_is_recorded() {
    let mut h = harness(vec![]);
    let (_, state) = h
        .step(h.entry_state(), &Op::Cns("MYSTERY".into()))
        .unwrap();
    assert_eq!(state.top(), Some(&Type::INIT_CELL));
    assert!(h.collect.reads_untracked_constants);
    assert_eq!(
        h.collect.cns_map.get("MYSTERY"),
        Some(&ConstantUse::ReadOnly)
    );

    // Defining it afterwards pins the value.
    let state = h.entry_state().with_stack([Type::int(5)]);
    let (_, state) = h.step(state, &Op::DefCns("MYSTERY".into())).unwrap();
    assert_eq!(state.top(), Some(&Type::BOOL));
    assert_eq!(
        h.collect.cns_map.get("MYSTERY"),
        Some(&ConstantUse::Value(Value::Int(5)))
    );
}

#[test]
fn folded_call_is_stable_under_reanalysis() {
    let folded = vec![Op::Nop, Op::string("abc"), Op::PopC, Op::Int(3), Op::RetC];
    let mut h = harness(folded.clone());
    let out = h.run(b(0)).unwrap();
    assert_eq!(out.flags.returned, Some(Type::int(3)));
    assert!(out.propagated.is_empty());
    assert!(h.collect.reanalyze.is_empty());

    let mut state = h.entry_state();
    for op in &folded {
        let (flags, after) = h.step(state, op).unwrap();
        assert_eq!(flags.strength_reduced, None, "{op:?}");
        assert!(flags.effect_free, "{op:?}");
        state = after;
    }
}

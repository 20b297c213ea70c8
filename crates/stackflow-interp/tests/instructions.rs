//! Single-instruction semantics not covered by the block and branch tests.

mod common;

use common::*;
use stackflow_bytecode::{BareThisOp, BlockId, Op};
use stackflow_index::MemIndex;
use stackflow_interp::{
    CollectedInfo, EffectFlags, Env, Interp, Iter, StackEquiv, State, TrackedIter, impl_only,
    reduce,
};
use stackflow_types::{IterCount, Type, Value};

#[test]
fn literal_vec_builder_is_a_constant() {
    let mut h = harness(vec![]);
    let state = h.entry_state().with_stack([Type::int(1), Type::int(2)]);
    let (flags, after) = h.step(state, &Op::NewVecArray(2)).unwrap();
    assert!(flags.can_const_prop);
    assert!(flags.effect_free);
    assert_eq!(
        after.top().and_then(Type::tv),
        Some(Value::Vec(vec![Value::Int(1), Value::Int(2)]))
    );
}

#[test]
fn struct_dict_keeps_the_key_order() {
    let mut h = harness(vec![]);
    let state = h.entry_state().with_stack([Type::INT, Type::STR]);
    let keys = vec!["a".into(), "b".into()];
    let (_, after) = h.step(state, &Op::NewStructDict(keys)).unwrap();
    let dict = after.top().unwrap();
    assert!(dict.subtype_of(&Type::DICT));
    assert_eq!(after.stack.len(), 1);
}

#[test]
fn adjacent_literal_strings_concatenate() {
    let mut h = harness(vec![]);
    let state = h.entry_state().with_stack([Type::str("foo"), Type::str("bar")]);
    let (flags, after) = h.step(state, &Op::Concat).unwrap();
    assert_eq!(
        flags.strength_reduced,
        Some(vec![Op::PopC, Op::PopC, Op::string("foobar")])
    );
    assert_eq!(after.top(), Some(&Type::str("foobar")));
}

#[test]
fn storing_a_local_into_itself_is_elided() {
    let mut h = harness(vec![]);
    let mut state = h.entry_state().with_local(l(1), Type::INT).with_stack([Type::INT]);
    state.stack[0].equiv = StackEquiv::Local(l(1));

    let (flags, after) = h.step(state.clone(), &Op::SetL(l(1))).unwrap();
    assert_eq!(flags.strength_reduced, Some(vec![Op::Nop]));
    assert_eq!(after.stack.len(), 1);

    let (flags, after) = h.step(state, &Op::PopL(l(1))).unwrap();
    assert_eq!(flags.strength_reduced, Some(vec![Op::PopC]));
    assert!(after.stack.is_empty());
}

#[test]
fn a_store_breaks_old_equivalences() {
    let mut h = harness(vec![]);
    let state = h.entry_state().with_local(l(0), Type::INT);
    let (_, state) = h.step(state, &Op::CGetL(l(0))).unwrap();
    let (_, state) = h.step(state, &Op::SetL(l(1))).unwrap();
    assert!(state.equiv.members(l(1)).any(|m| m == l(0)));

    let state = state.with_stack([Type::STR]);
    let (_, state) = h.step(state, &Op::PopL(l(1))).unwrap();
    assert_eq!(state.local(l(1)), Some(&Type::STR));
    assert_eq!(state.equiv.members(l(1)).count(), 0);
}

#[test]
fn iterator_advance_feeds_the_loop_body() {
    let mut h = harness(vec![Op::IterNext {
        iter: it(0),
        target: b(2),
        value: l(1),
    }]);
    let mut state = h.entry_state();
    state.iters[0] = Iter::Tracked(TrackedIter {
        key: Type::INT,
        value: Type::STR,
        count: IterCount::NonEmpty,
        may_throw_on_init: false,
        may_throw_on_next: false,
    });
    let out = h.run_from(b(0), state).unwrap();

    assert_eq!(out.targets(), vec![b(2), b(1)]);
    let body = out.to(b(2))[0];
    assert_eq!(body.local(l(1)), Some(&Type::STR));
    assert!(matches!(
        &body.iters[0],
        Iter::Tracked(TrackedIter {
            count: IterCount::Any,
            ..
        })
    ));

    let done = out.to(b(1))[0];
    assert_eq!(done.local(l(1)), Some(&Type::UNINIT));
    assert_eq!(done.iters[0], Iter::Unknown);
}

#[test]
fn single_element_iterator_never_loops() {
    let mut h = harness(vec![Op::IterNext {
        iter: it(0),
        target: b(2),
        value: l(1),
    }]);
    let mut state = h.entry_state();
    state.iters[0] = Iter::Tracked(TrackedIter {
        key: Type::INT,
        value: Type::STR,
        count: IterCount::Single,
        may_throw_on_init: false,
        may_throw_on_next: false,
    });
    let out = h.run_from(b(0), state).unwrap();
    assert_eq!(out.targets(), vec![b(1)]);
}

#[test]
fn second_this_read_cannot_be_null() {
    let mut h = harness(vec![]);
    let (_, state) = h.step(h.entry_state(), &Op::This).unwrap();
    assert!(state.this_available);
    let (flags, _) = h.step(state.with_stack([]), &Op::This).unwrap();
    assert_eq!(
        flags.strength_reduced,
        Some(vec![Op::BareThis(BareThisOp::NeverNull)])
    );
}

/// Interpret `ops` as the replacement of a single instruction, from the
/// entry state of block 0.
fn interpret_sequence(ops: &[Op], propose: bool) -> (EffectFlags, State) {
    let func = func(vec![]);
    let index = MemIndex::new();
    let mut collect = CollectedInfo::default();
    let mut interp = Interp::builder()
        .index(&index)
        .func(&func)
        .block(b(0))
        .collect(&mut collect)
        .build()
        .unwrap();
    let mut ignore = |_: BlockId, _: &State| {};
    let mut env = Env::new(&mut interp, &mut ignore);
    if propose {
        reduce(&mut env, ops).unwrap();
    } else {
        impl_only(&mut env, ops).unwrap();
    }
    let flags = std::mem::take(&mut env.flags);
    (flags, interp.state)
}

#[test]
fn a_return_inside_a_sequence_ends_it() {
    let ops = [Op::Int(1), Op::RetC, Op::Int(2), Op::PopC];

    let (flags, state) = interpret_sequence(&ops, false);
    assert!(state.unreachable);
    assert!(state.stack.is_empty());
    assert_eq!(flags.returned, Some(Type::int(1)));
    assert_eq!(flags.strength_reduced, None);

    let (flags, state) = interpret_sequence(&ops, true);
    assert!(state.unreachable);
    assert_eq!(flags.strength_reduced, Some(vec![Op::Int(1), Op::RetC]));
}

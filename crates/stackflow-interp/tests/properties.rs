mod common;

use common::*;
use proptest::prelude::*;
use stackflow_bytecode::Op;
use stackflow_types::{Type, Value, eval};

fn pure_ops() -> Vec<Op> {
    vec![
        Op::Int(0),
        Op::Int(7),
        Op::True,
        Op::Null,
        Op::string("12"),
        Op::string("x"),
        Op::CGetL(l(0)),
        Op::Add,
        Op::Sub,
        Op::Mul,
        Op::Concat,
        Op::Same,
        Op::Not,
        Op::CastInt,
        Op::Dup,
        Op::PopC,
    ]
}

/// Keep only the instructions whose operands are on the stack.
fn well_formed(ops: Vec<Op>) -> Vec<Op> {
    let mut depth = 0u32;
    ops.into_iter()
        .filter(|op| {
            if op.num_pop() > depth {
                return false;
            }
            depth = depth - op.num_pop() + op.num_push();
            true
        })
        .collect()
}

proptest! {
    #[test]
    fn effect_free_never_throws(ops in prop::collection::vec(prop::sample::select(pure_ops()), 1..24)) {
        let ops = well_formed(ops);
        let mut h = harness(ops.clone());
        let mut state = h.entry_state().with_local(l(0), Type::INT.opt());
        for op in &ops {
            let depth = state.stack.len() as i64;
            let (flags, after) = h.step(state, op).unwrap();
            prop_assert!(!(flags.effect_free && flags.was_pei), "{op:?}");
            prop_assert_eq!(
                after.stack.len() as i64,
                depth + op.num_push() as i64 - op.num_pop() as i64
            );
            state = after;
        }

        // The whole block agrees with the single steps.
        let out = h.run(b(0)).unwrap();
        prop_assert_eq!(out.targets(), vec![b(1)]);
        prop_assert_eq!(out.state.stack.len(), state.stack.len());
    }

    #[test]
    fn adding_literals_yields_a_literal(a in any::<i64>(), b in any::<i64>()) {
        let mut h = harness(vec![]);
        let state = h.entry_state().with_stack([Type::int(a), Type::int(b)]);
        let (flags, after) = h.step(state, &Op::Add).unwrap();
        let sum = eval::add(&Value::Int(a), &Value::Int(b)).unwrap();
        prop_assert_eq!(after.stack_types(), vec![Type::from_value(&sum)]);
        if let Some(n) = a.checked_add(b) {
            prop_assert_eq!(after.top(), Some(&Type::int(n)));
        }
        prop_assert!(flags.can_const_prop);
        prop_assert!(flags.effect_free);
        prop_assert!(!flags.was_pei);
    }

    #[test]
    fn casting_twice_is_a_no_op(n in any::<i64>()) {
        let mut h = harness(vec![]);
        let state = h.entry_state().with_stack([Type::int(n)]);
        let (_, once) = h.step(state, &Op::CastInt).unwrap();
        prop_assert_eq!(once.top(), Some(&Type::int(n)));

        let state = h.entry_state().with_stack([Type::INT]);
        let (flags, after) = h.step(state, &Op::CastInt).unwrap();
        prop_assert_eq!(flags.strength_reduced, Some(vec![Op::Nop]));
        prop_assert!(flags.effect_free);
        prop_assert!(flags.can_const_prop);
        prop_assert!(!flags.was_pei);
        prop_assert_eq!(after.top(), Some(&Type::INT));

        let (flags, _) = h.step(after, &Op::Nop).unwrap();
        prop_assert_eq!(flags.strength_reduced, None);
    }
}

//! Drive the block interpreter over whole loop-free functions, the way a
//! fixpoint solver would.

use stackflow::interp::{LocalEquiv, StackEquiv};
use stackflow::prelude::*;
use stackflow::types::IsTypeOp;

/// The least state covering both `a` and `b`.
fn join(a: &State, b: &State) -> State {
    let mut out = a.clone();
    for (t, u) in out.locals.iter_mut().zip(&b.locals) {
        *t = t.union(u);
    }
    for (e, f) in out.stack.iter_mut().zip(&b.stack) {
        e.ty = e.ty.union(&f.ty);
        if e.equiv != f.equiv {
            e.equiv = StackEquiv::None;
        }
    }
    out.equiv = LocalEquiv::new(out.locals.len());
    out
}

struct Analysis {
    returns: Type,
    inputs: Vec<Option<State>>,
}

/// Visit the blocks in order; every edge of the function must point forward.
fn analyze(
    func: &Function,
    index: &MemIndex,
    collect: &mut CollectedInfo,
) -> Result<Analysis, InterpError> {
    let mut inputs: Vec<Option<State>> = vec![None; func.blocks.len()];
    inputs[0] = Some(State::entry(func));
    let mut returns = Type::BOTTOM;

    for blk in &func.blocks {
        let Some(state) = inputs[blk.id.index()].clone() else {
            continue;
        };
        let mut out = Vec::new();
        let mut interp = Interp::builder()
            .index(index)
            .func(func)
            .block(blk.id)
            .collect(&mut *collect)
            .state(state)
            .build()?;
        let flags = run(&mut interp, |target, s| out.push((target, s.clone())))?;
        if let Some(t) = flags.returned {
            returns = returns.union(&t);
        }
        for (target, s) in out {
            assert!(target > blk.id, "backward edge to {target}");
            let slot = &mut inputs[target.index()];
            *slot = Some(match slot.take() {
                Some(prev) => join(&prev, &s),
                None => s,
            });
        }
    }
    Ok(Analysis { returns, inputs })
}

fn block(id: u32, ops: Vec<Op>) -> Block {
    Block::builder().id(BlockId::new(id)).ops(ops).build()
}

#[test]
fn null_check_splits_the_return_paths() {
    let x = LocalId::new(0);
    let entry = Block::builder()
        .id(BlockId::new(0))
        .ops(vec![Op::IsTypeL(x, IsTypeOp::Null), Op::JmpNZ(BlockId::new(2))])
        .fallthrough(BlockId::new(1))
        .build();
    let func = Function::builder()
        .name("int_or_zero")
        .params(vec![Param::untyped("x")])
        .blocks(vec![
            entry,
            block(1, vec![Op::CGetL(x), Op::CastInt, Op::RetC]),
            block(2, vec![Op::Int(0), Op::RetC]),
        ])
        .build();

    let index = MemIndex::new();
    let mut collect = CollectedInfo::default();
    let analysis = analyze(&func, &index, &mut collect).unwrap();

    assert_eq!(analysis.returns, Type::INT);
    let non_null = analysis.inputs[1].as_ref().unwrap();
    assert!(!non_null.local(x).unwrap().could_be(&Type::INIT_NULL));
    let null = analysis.inputs[2].as_ref().unwrap();
    assert_eq!(null.local(x), Some(&Type::INIT_NULL));
}

#[test]
fn unfoldable_call_is_resolved_on_the_second_pass() {
    let x = LocalId::new(0);
    let func = Function::builder()
        .name("len")
        .params(vec![Param::untyped("x")])
        .blocks(vec![block(
            0,
            vec![
                Op::FPushFuncD {
                    num_args: 1,
                    name: "strlen".into(),
                },
                Op::CGetL(x),
                Op::FCall { num_args: 1 },
                Op::RetC,
            ],
        )])
        .build();

    let index = MemIndex::new();
    let mut collect = CollectedInfo::default();
    analyze(&func, &index, &mut collect).unwrap();
    assert!(collect.reanalyze.contains(&BlockId::new(0)));

    collect.reanalyze.clear();
    let analysis = analyze(&func, &index, &mut collect).unwrap();
    assert_eq!(analysis.returns, Type::INT);
    assert!(collect.reanalyze.is_empty());
}

#[test]
fn literal_arguments_fold_away() {
    let func = Function::builder()
        .name("three")
        .blocks(vec![block(
            0,
            vec![
                Op::FPushFuncD {
                    num_args: 1,
                    name: "strlen".into(),
                },
                Op::string("abc"),
                Op::FCall { num_args: 1 },
                Op::RetC,
            ],
        )])
        .build();

    let mut collect = CollectedInfo::default();
    let analysis = analyze(&func, &MemIndex::new(), &mut collect).unwrap();
    assert_eq!(analysis.returns, Type::int(3));
    assert!(collect.unfoldable_funcs.is_empty());
}

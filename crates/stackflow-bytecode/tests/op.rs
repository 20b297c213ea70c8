use stackflow_bytecode::*;
use stackflow_types::{BinaryOp, IsTypeOp, Value};

fn l(i: u32) -> LocalId {
    LocalId::new(i)
}

fn b(i: u32) -> BlockId {
    BlockId::new(i)
}

#[test]
fn render_straight_line_code() {
    let ops = vec![
        Op::Int(5),
        Op::string("a"),
        Op::CGetL(l(0)),
        Op::IsTypeL(l(1), IsTypeOp::Null),
        Op::JmpZ(b(2)),
        Op::FPushFuncD {
            num_args: 1,
            name: "strlen".into(),
        },
        Op::FCallD {
            num_args: 1,
            class: "".into(),
            func: "strlen".into(),
        },
        Op::RetC,
    ];
    insta::assert_snapshot!(
        show_ops(&ops),
        @r#"Int 5; String "a"; CGetL L0; IsTypeL L1 Null; JmpZ B2; FPushFuncD 1 "strlen"; FCallD 1 "" "strlen"; RetC"#
    );
}

#[test]
fn render_immediates() {
    let ops = vec![
        Op::Switch {
            kind: SwitchKind::Bounded,
            base: 0,
            targets: vec![b(1), b(2)],
        },
        Op::SSwitch {
            cases: vec![("a".into(), b(1))],
            default: b(2),
        },
        Op::Vec(vec![Value::Int(1)]),
        Op::Double(1.5),
        Op::IterInitK {
            iter: IterId::new(0),
            target: b(3),
            value: l(1),
            key: l(2),
        },
        Op::MemoGet(LocalRange::new(l(0), 1)),
        Op::SetOpL(l(0), BinaryOp::Add),
        Op::IncDecL(l(0), IncDecOp::PreInc),
    ];
    insta::assert_snapshot!(
        show_ops(&ops),
        @r#"Switch Bounded 0 <B1 B2>; SSwitch <"a":B1 -:B2>; Vec vec[1]; Double 1.5; IterInitK I0 B3 L1 L2; MemoGet L0+1; SetOpL L0 Add; IncDecL L0 PreInc"#
    );
}

#[test]
fn stack_effects() {
    assert_eq!((Op::Dup.num_pop(), Op::Dup.num_push()), (1, 2));
    assert_eq!((Op::IsUninit.num_pop(), Op::IsUninit.num_push()), (0, 1));
    let multi = Op::FCallM {
        num_args: 2,
        num_rets: 3,
    };
    assert_eq!((multi.num_pop(), multi.num_push()), (4, 3));
    let structs = Op::NewStructDict(vec!["a".into(), "b".into()]);
    assert_eq!((structs.num_pop(), structs.num_push()), (2, 1));
    assert_eq!(Op::RetM(2).num_pop(), 2);
}

#[test]
fn terminals_and_targets() {
    assert!(Op::RetC.is_terminal());
    assert!(Op::Jmp(b(1)).is_terminal());
    assert!(!Op::JmpZ(b(1)).is_terminal());
    let sswitch = Op::SSwitch {
        cases: vec![("a".into(), b(1)), ("b".into(), b(2))],
        default: b(3),
    };
    assert_eq!(sswitch.targets(), vec![b(1), b(2), b(3)]);
    assert!(Op::Add.targets().is_empty());
}

#[test]
fn literal_instructions_match_values() {
    assert_eq!(Op::literal(&Value::Bool(true)), Op::True);
    assert_eq!(Op::literal(&Value::Null), Op::Null);
    assert_eq!(Op::literal(&Value::str("x")), Op::string("x"));
    assert_eq!(Op::Int(3).tag(), OpTag::Int);
    assert_eq!(OpTag::SelfCls.to_string(), "SelfCls");
}

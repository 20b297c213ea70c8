use proptest::prelude::*;
use stackflow_types::eval::{self, EvalError};
use stackflow_types::{BinaryOp, Type, Value};

proptest! {
    #[test]
    fn int_add_matches_checked_arithmetic(a in any::<i64>(), b in any::<i64>()) {
        let sum = eval::add(&Value::Int(a), &Value::Int(b)).unwrap();
        match a.checked_add(b) {
            Some(s) => prop_assert_eq!(sum, Value::Int(s)),
            None => prop_assert_eq!(sum, Value::Dbl(a as f64 + b as f64)),
        }
    }

    #[test]
    fn folded_add_is_a_singleton(a in -1_000_000i64..1_000_000, b in -1_000_000i64..1_000_000) {
        let t = BinaryOp::Add.result_type(&Type::int(a), &Type::int(b));
        prop_assert_eq!(t.tv(), Some(Value::Int(a + b)));
        prop_assert!(!BinaryOp::Add.may_throw(&Type::int(a), &Type::int(b)));
    }

    #[test]
    fn int_identity_agrees_with_equality(a in any::<i64>(), b in any::<i64>()) {
        prop_assert_eq!(eval::same(&Value::Int(a), &Value::Int(b)), a == b);
    }
}

#[test]
fn double_identity_is_ieee_equality() {
    let cases = [0.0, -0.0, 1.5, f64::NAN, f64::INFINITY, f64::NEG_INFINITY];
    for x in cases {
        for y in cases {
            assert_eq!(eval::same(&Value::Dbl(x), &Value::Dbl(y)), x == y, "{x} === {y}");
        }
    }
}

#[test]
fn nested_nan_breaks_container_identity() {
    let v = Value::Vec(vec![Value::Dbl(f64::NAN)]);
    assert!(!eval::same(&v, &v.clone()));
}

#[test]
fn shifts_reject_negative_counts() {
    assert_eq!(eval::shl(&Value::Int(1), &Value::Int(-1)), Err(EvalError::NegativeShift));
    assert_eq!(eval::shl(&Value::Int(1), &Value::Int(3)), Ok(Value::Int(8)));
    assert_eq!(eval::shr(&Value::Int(-8), &Value::Int(70)), Ok(Value::Int(-1)));
}

#[test]
fn string_bitwise_ops_work_bytewise() {
    assert_eq!(
        eval::bit_or(&Value::str("a"), &Value::str(" ")),
        Ok(Value::str("a"))
    );
    assert_eq!(eval::bit_and(&Value::str("ab"), &Value::str("a")), Ok(Value::str("a")));
}

#[test]
fn casts_between_containers() {
    let vec = Value::Vec(vec![Value::Int(1), Value::Int(1), Value::str("x")]);
    let keyset = eval::cast_keyset(&vec).unwrap();
    insta::assert_snapshot!(keyset, @r#"keyset[1, "x"]"#);
    let dict = eval::cast_dict(&vec).unwrap();
    insta::assert_snapshot!(dict, @r#"dict[0 => 1, 1 => 1, 2 => "x"]"#);
}

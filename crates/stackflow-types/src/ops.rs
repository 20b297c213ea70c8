//! Abstract counterparts of the arithmetic, bitwise, comparison and cast
//! instructions.
//!
//! Each operator folds when every operand is a literal and the concrete
//! evaluation is silent, and otherwise returns a sound over-approximation of
//! the result.

use std::cmp::Ordering;
use std::fmt;

use crate::bits::TypeBits;
use crate::eval::{self, EvalResult};
use crate::lattice::Lattice;
use crate::ty::{Data, Type};
use crate::value::Value;

/// Both operands as literals, evaluated with `f` when that is silent.
fn fold2(a: &Type, b: &Type, f: impl FnOnce(&Value, &Value) -> EvalResult) -> Option<Type> {
    let (va, vb) = (a.tv()?, b.tv()?);
    f(&va, &vb).ok().map(|v| Type::from_value(&v))
}

fn both_within(a: &Type, b: &Type, bits: TypeBits) -> bool {
    a.subtype_of_bits(bits) && b.subtype_of_bits(bits)
}

/// Kinds arithmetic converts silently: null and bools read as ints.
const ARITH_SAFE: TypeBits = TypeBits::INIT_NULL
    .union(TypeBits::BOOL)
    .union(TypeBits::NUM);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
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
}

impl BinaryOp {
    pub fn eval(self, a: &Value, b: &Value) -> EvalResult {
        match self {
            BinaryOp::Add => eval::add(a, b),
            BinaryOp::Sub => eval::sub(a, b),
            BinaryOp::Mul => eval::mul(a, b),
            BinaryOp::Div => eval::div(a, b),
            BinaryOp::Mod => eval::modulo(a, b),
            BinaryOp::Pow => eval::pow(a, b),
            BinaryOp::BitAnd => eval::bit_and(a, b),
            BinaryOp::BitOr => eval::bit_or(a, b),
            BinaryOp::BitXor => eval::bit_xor(a, b),
            BinaryOp::Shl => eval::shl(a, b),
            BinaryOp::Shr => eval::shr(a, b),
            BinaryOp::Concat => eval::concat(a, b),
        }
    }

    /// Result type of `a op b`.
    pub fn result_type(self, a: &Type, b: &Type) -> Type {
        if let Some(t) = fold2(a, b, |x, y| self.eval(x, y)) {
            return t;
        }
        match self {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => {
                if self == BinaryOp::Add && both_within(a, b, TypeBits::ARR) {
                    return Type::ARR;
                }
                arith_result(a, b)
            }
            BinaryOp::Div | BinaryOp::Pow => {
                if a.subtype_of_bits(TypeBits::DBL) || b.subtype_of_bits(TypeBits::DBL) {
                    Type::DBL
                } else {
                    Type::NUM
                }
            }
            BinaryOp::Mod | BinaryOp::Shl | BinaryOp::Shr => Type::INT,
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
                if both_within(a, b, TypeBits::STR) {
                    Type::STR
                } else if !a.could_be_bits(TypeBits::STR) || !b.could_be_bits(TypeBits::STR) {
                    Type::INT
                } else {
                    Type::ARR_KEY
                }
            }
            BinaryOp::Concat => Type::STR,
        }
    }

    /// Whether evaluating `a op b` may raise or emit a diagnostic.
    pub fn may_throw(self, a: &Type, b: &Type) -> bool {
        if fold2(a, b, |x, y| self.eval(x, y)).is_some() {
            return false;
        }
        match self {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Pow => {
                !both_within(a, b, ARITH_SAFE)
                    && !(self == BinaryOp::Add && both_within(a, b, TypeBits::ARR))
            }
            // The divisor may be zero.
            BinaryOp::Div | BinaryOp::Mod => {
                !both_within(a, b, ARITH_SAFE) || !b.tv().is_some_and(|v| eval::to_bool(&v))
            }
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
                !both_within(a, b, TypeBits::INT) && !both_within(a, b, TypeBits::STR)
            }
            BinaryOp::Shl | BinaryOp::Shr => {
                !both_within(a, b, TypeBits::INT) || !b.int_val().is_some_and(|n| n >= 0)
            }
            BinaryOp::Concat => !both_within(a, b, TypeBits::INIT_UNC),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Add => "Add",
            BinaryOp::Sub => "Sub",
            BinaryOp::Mul => "Mul",
            BinaryOp::Div => "Div",
            BinaryOp::Mod => "Mod",
            BinaryOp::Pow => "Pow",
            BinaryOp::BitAnd => "BitAnd",
            BinaryOp::BitOr => "BitOr",
            BinaryOp::BitXor => "BitXor",
            BinaryOp::Shl => "Shl",
            BinaryOp::Shr => "Shr",
            BinaryOp::Concat => "Concat",
        })
    }
}

fn arith_result(a: &Type, b: &Type) -> Type {
    if !both_within(a, b, ARITH_SAFE.union(TypeBits::STR)) {
        return Type::NUM.union_bits(TypeBits::ARR);
    }
    let dbl_a = a.subtype_of_bits(TypeBits::DBL);
    let dbl_b = b.subtype_of_bits(TypeBits::DBL);
    if (dbl_a && b.subtype_of_bits(ARITH_SAFE)) || (dbl_b && a.subtype_of_bits(ARITH_SAFE)) {
        Type::DBL
    } else {
        Type::NUM
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
    /// Three-way comparison producing -1, 0 or 1.
    Cmp,
}

impl CmpOp {
    pub fn eval(self, a: &Value, b: &Value) -> EvalResult {
        let ordered = |test: fn(Ordering) -> bool| eval::compare(a, b).map(|o| Value::Bool(test(o)));
        match self {
            CmpOp::Eq => eval::equal(a, b).map(Value::Bool),
            CmpOp::Neq => eval::equal(a, b).map(|r| Value::Bool(!r)),
            CmpOp::Lt => ordered(Ordering::is_lt),
            CmpOp::Gt => ordered(Ordering::is_gt),
            CmpOp::Lte => ordered(Ordering::is_le),
            CmpOp::Gte => ordered(Ordering::is_ge),
            CmpOp::Cmp => eval::compare(a, b).map(|o| Value::Int(o as i64)),
        }
    }

    pub fn result_type(self, a: &Type, b: &Type) -> Type {
        if let Some(t) = fold2(a, b, |x, y| self.eval(x, y)) {
            return t;
        }
        match self {
            CmpOp::Cmp => Type::INT,
            _ => Type::BOOL,
        }
    }

    /// Comparisons of primitives and strings are silent.
    pub fn may_throw(self, a: &Type, b: &Type) -> bool {
        fold2(a, b, |x, y| self.eval(x, y)).is_none() && !both_within(a, b, TypeBits::INIT_UNC)
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CmpOp::Eq => "Eq",
            CmpOp::Neq => "Neq",
            CmpOp::Lt => "Lt",
            CmpOp::Gt => "Gt",
            CmpOp::Lte => "Lte",
            CmpOp::Gte => "Gte",
            CmpOp::Cmp => "Cmp",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CastKind {
    Bool,
    Int,
    Double,
    String,
    Array,
    Vec,
    Dict,
    Keyset,
    Object,
}

impl CastKind {
    /// The type every result of the cast belongs to.
    pub fn target(self) -> Type {
        match self {
            CastKind::Bool => Type::BOOL,
            CastKind::Int => Type::INT,
            CastKind::Double => Type::DBL,
            CastKind::String => Type::STR,
            CastKind::Array => Type::ARR,
            CastKind::Vec => Type::VEC,
            CastKind::Dict => Type::DICT,
            CastKind::Keyset => Type::KEYSET,
            CastKind::Object => Type::OBJ,
        }
    }

    pub fn eval(self, v: &Value) -> EvalResult {
        match self {
            CastKind::Bool => Ok(Value::Bool(eval::to_bool(v))),
            CastKind::Int if !v.is_array_like() => Ok(Value::Int(eval::to_int(v))),
            CastKind::Double if !v.is_array_like() => Ok(Value::Dbl(eval::to_double(v))),
            CastKind::String => eval::to_string(v).map(Value::Str),
            CastKind::Array => eval::cast_array(v),
            CastKind::Vec => eval::cast_vec(v),
            CastKind::Dict => eval::cast_dict(v),
            CastKind::Keyset => eval::cast_keyset(v),
            CastKind::Int | CastKind::Double | CastKind::Object => {
                Err(eval::EvalError::UnsupportedOperand(v.kind_name()))
            }
        }
    }

    /// Whether the cast leaves every value of `t` unchanged.
    pub fn is_identity_on(self, t: &Type) -> bool {
        !t.is_bottom() && t.subtype_of(&self.target())
    }

    pub fn result_type(self, t: &Type) -> Type {
        if self.is_identity_on(t) {
            return t.clone();
        }
        if let Some(v) = t.tv() {
            if let Ok(r) = self.eval(&v) {
                return Type::from_value(&r);
            }
        }
        self.target()
    }

    pub fn may_throw(self, t: &Type) -> bool {
        if let Some(v) = t.tv() {
            if self.eval(&v).is_ok() {
                return false;
            }
        }
        let silent_from = match self {
            CastKind::Bool => TypeBits::INIT_CELL,
            CastKind::Int | CastKind::Double | CastKind::String => TypeBits::INIT_UNC,
            CastKind::Array => TypeBits::INIT_UNC | TypeBits::ARR_LIKE,
            CastKind::Vec | CastKind::Dict => TypeBits::ARR_LIKE,
            CastKind::Keyset => TypeBits::KEYSET,
            CastKind::Object => TypeBits::OBJ,
        };
        !t.subtype_of_bits(silent_from)
    }
}

impl fmt::Display for CastKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CastKind::Bool => "Bool",
            CastKind::Int => "Int",
            CastKind::Double => "Double",
            CastKind::String => "String",
            CastKind::Array => "Array",
            CastKind::Vec => "Vec",
            CastKind::Dict => "Dict",
            CastKind::Keyset => "Keyset",
            CastKind::Object => "Object",
        })
    }
}

/// Result type of bitwise negation.
pub fn bit_not_type(t: &Type) -> Type {
    if let Some(r) = t.tv().and_then(|v| eval::bit_not(&v).ok()) {
        return Type::from_value(&r);
    }
    if t.subtype_of_bits(TypeBits::NUM) {
        Type::INT
    } else if t.subtype_of_bits(TypeBits::STR) {
        Type::STR
    } else {
        Type::ARR_KEY
    }
}

pub fn bit_not_may_throw(t: &Type) -> bool {
    !t.subtype_of_bits(TypeBits::NUM) && !t.subtype_of_bits(TypeBits::STR)
}

/// Result type of appending `elem` to a container of type `container`.
pub fn append_type(container: &Type, elem: &Type) -> Type {
    if let (Some(c), Some(e)) = (container.tv(), elem.tv()) {
        if let Ok(r) = eval::append(&c, e) {
            return Type::from_value(&r);
        }
    }
    let bits = container.bits();
    match container.data() {
        Some(Data::Packed(elems)) if bits == TypeBits::VEC || bits == TypeBits::ARR => {
            let mut elems = elems.clone();
            elems.push(elem.clone());
            if bits == TypeBits::VEC {
                Type::vec(elems)
            } else {
                Type::arr_packed(elems)
            }
        }
        Some(Data::PackedN(inner)) if bits == TypeBits::VEC => Type::vec_n(inner.join(elem)),
        Some(Data::PackedN(inner)) if bits == TypeBits::ARR => {
            Type::arr_n(Type::INT, inner.join(elem))
        }
        _ if bits == TypeBits::KEYSET => Type::keyset_n(elem.intersect(&Type::ARR_KEY)),
        _ if bits == TypeBits::DICT => Type::dict_n(Type::ARR_KEY, elem.clone()),
        _ => Type::from_bits(bits & TypeBits::ARR_LIKE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_operands_fold() {
        assert_eq!(BinaryOp::Add.result_type(&Type::int(2), &Type::int(3)), Type::int(5));
        assert!(!BinaryOp::Add.may_throw(&Type::int(2), &Type::int(3)));
        assert_eq!(
            BinaryOp::Concat.result_type(&Type::str("a"), &Type::int(1)),
            Type::str("a1")
        );
        assert_eq!(CmpOp::Lt.result_type(&Type::int(1), &Type::int(2)), Type::TRUE);
    }

    #[test]
    fn raising_literals_are_not_folded() {
        assert_eq!(BinaryOp::Div.result_type(&Type::int(1), &Type::int(0)), Type::NUM);
        assert!(BinaryOp::Div.may_throw(&Type::int(1), &Type::int(0)));
        assert!(!BinaryOp::Div.may_throw(&Type::INT, &Type::int(2)));
    }

    #[test]
    fn over_approximations() {
        assert_eq!(BinaryOp::Add.result_type(&Type::INT, &Type::INT), Type::NUM);
        assert_eq!(BinaryOp::Add.result_type(&Type::INT, &Type::DBL), Type::DBL);
        assert_eq!(BinaryOp::Mul.result_type(&Type::DBL, &Type::INT), Type::DBL);
        assert_eq!(BinaryOp::BitOr.result_type(&Type::STR, &Type::STR), Type::STR);
        assert_eq!(BinaryOp::Shl.result_type(&Type::INT, &Type::INT), Type::INT);
        assert!(BinaryOp::Shl.may_throw(&Type::INT, &Type::INT));
    }

    #[test]
    fn cast_identity() {
        assert!(CastKind::Int.is_identity_on(&Type::INT));
        assert!(CastKind::Int.is_identity_on(&Type::int(3)));
        assert!(!CastKind::Int.is_identity_on(&Type::NUM));
        assert_eq!(CastKind::Int.result_type(&Type::str("12")), Type::int(12));
        assert_eq!(CastKind::Bool.result_type(&Type::OBJ), Type::BOOL);
        assert!(CastKind::String.may_throw(&Type::VEC));
    }
}

//! Predicates and refinements the interpreter asks of types: truthiness,
//! type tests, iteration, element lookup and identity.

use std::fmt;

use crate::bits::TypeBits;
use crate::eval;
use crate::lattice::Lattice;
use crate::ty::{Data, Type};
use crate::value::{ArrayKey, Value};

/// The primitive kinds, one bit each.
const KINDS: [TypeBits; 15] = [
    TypeBits::UNINIT,
    TypeBits::INIT_NULL,
    TypeBits::FALSE,
    TypeBits::TRUE,
    TypeBits::INT,
    TypeBits::DBL,
    TypeBits::STR,
    TypeBits::ARR,
    TypeBits::VEC,
    TypeBits::DICT,
    TypeBits::KEYSET,
    TypeBits::OBJ,
    TypeBits::RES,
    TypeBits::CLS,
    TypeBits::REF,
];

/// Split `t` into one piece per kind, each keeping the specialization.
fn pieces(t: &Type) -> impl Iterator<Item = (TypeBits, Type)> + '_ {
    KINDS
        .into_iter()
        .filter(move |k| t.bits().contains(*k))
        .map(move |k| (k, t.intersect(&Type::from_bits(k))))
}

fn empty_container(kind: TypeBits) -> Type {
    if kind == TypeBits::VEC {
        Type::vec_empty()
    } else if kind == TypeBits::DICT {
        Type::dict_empty()
    } else if kind == TypeBits::KEYSET {
        Type::keyset_empty()
    } else {
        Type::arr_empty()
    }
}

/// Known element count of a container piece.
fn known_len(piece: &Type) -> Option<usize> {
    match piece.data()? {
        Data::Packed(elems) => Some(elems.len()),
        Data::Map(entries) => Some(entries.len()),
        _ => None,
    }
}

// ============================================================================
// Emptiness
// ============================================================================

/// Whether values of a type convert to `false`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Emptiness {
    /// Every value is falsy.
    Empty,
    /// Every value is truthy.
    NonEmpty,
    Maybe,
}

fn piece_emptiness(kind: TypeBits, piece: &Type) -> Emptiness {
    if let Some(v) = piece.tv() {
        return if eval::to_bool(&v) { Emptiness::NonEmpty } else { Emptiness::Empty };
    }
    if kind.intersects(TypeBits::NULL | TypeBits::FALSE) {
        Emptiness::Empty
    } else if kind.intersects(TypeBits::TRUE | TypeBits::OBJ | TypeBits::RES | TypeBits::CLS) {
        Emptiness::NonEmpty
    } else if kind.intersects(TypeBits::ARR_LIKE) {
        match known_len(piece) {
            Some(0) => Emptiness::Empty,
            Some(_) => Emptiness::NonEmpty,
            None => Emptiness::Maybe,
        }
    } else {
        Emptiness::Maybe
    }
}

pub fn emptiness(t: &Type) -> Emptiness {
    let mut result = None;
    for (kind, piece) in pieces(t) {
        let e = piece_emptiness(kind, &piece);
        result = match result {
            None => Some(e),
            Some(prev) if prev == e => Some(e),
            Some(_) => return Emptiness::Maybe,
        };
    }
    result.unwrap_or(Emptiness::Maybe)
}

/// The falsy values of `t`.
pub fn assert_emptiness(t: &Type) -> Type {
    pieces(t).fold(Type::BOTTOM, |acc, (kind, piece)| {
        let falsy = match piece_emptiness(kind, &piece) {
            Emptiness::Empty => piece,
            Emptiness::NonEmpty => Type::BOTTOM,
            Emptiness::Maybe if kind == TypeBits::INT => Type::int(0),
            Emptiness::Maybe if kind.intersects(TypeBits::ARR_LIKE) => empty_container(kind),
            Emptiness::Maybe => Type::from_bits(kind),
        };
        acc.join(&falsy)
    })
}

/// The truthy values of `t`.
pub fn assert_nonemptiness(t: &Type) -> Type {
    pieces(t).fold(Type::BOTTOM, |acc, (kind, piece)| {
        let truthy = match piece_emptiness(kind, &piece) {
            Emptiness::Empty => Type::BOTTOM,
            _ => piece,
        };
        acc.join(&truthy)
    })
}

// ============================================================================
// Type tests
// ============================================================================

/// The kind tested by `IsTypeL`/`IsTypeC`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IsTypeOp {
    Null,
    Bool,
    Int,
    Dbl,
    Str,
    Arr,
    Vec,
    Dict,
    Keyset,
    Obj,
    Res,
    /// Bool, number or string.
    Scalar,
    ArrLike,
}

impl IsTypeOp {
    pub fn bits(self) -> TypeBits {
        match self {
            IsTypeOp::Null => TypeBits::NULL,
            IsTypeOp::Bool => TypeBits::BOOL,
            IsTypeOp::Int => TypeBits::INT,
            IsTypeOp::Dbl => TypeBits::DBL,
            IsTypeOp::Str => TypeBits::STR,
            IsTypeOp::Arr => TypeBits::ARR,
            IsTypeOp::Vec => TypeBits::VEC,
            IsTypeOp::Dict => TypeBits::DICT,
            IsTypeOp::Keyset => TypeBits::KEYSET,
            IsTypeOp::Obj => TypeBits::OBJ,
            IsTypeOp::Res => TypeBits::RES,
            IsTypeOp::Scalar => TypeBits::BOOL | TypeBits::NUM | TypeBits::STR,
            IsTypeOp::ArrLike => TypeBits::ARR_LIKE,
        }
    }
}

impl fmt::Display for IsTypeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IsTypeOp::Null => "Null",
            IsTypeOp::Bool => "Bool",
            IsTypeOp::Int => "Int",
            IsTypeOp::Dbl => "Dbl",
            IsTypeOp::Str => "Str",
            IsTypeOp::Arr => "Arr",
            IsTypeOp::Vec => "Vec",
            IsTypeOp::Dict => "Dict",
            IsTypeOp::Keyset => "Keyset",
            IsTypeOp::Obj => "Obj",
            IsTypeOp::Res => "Res",
            IsTypeOp::Scalar => "Scalar",
            IsTypeOp::ArrLike => "ArrLike",
        })
    }
}

/// The type of values passing `op`.
pub fn type_of_istype(op: IsTypeOp) -> Type {
    Type::from_bits(op.bits())
}

/// Outcome of `op` on a value of type `t`, when it is decided.
pub fn istype_outcome(op: IsTypeOp, t: &Type) -> Option<bool> {
    let test = op.bits();
    if t.subtype_of_bits(test) {
        Some(true)
    } else if !t.could_be_bits(test) {
        Some(false)
    } else {
        None
    }
}

/// Refinements of `t` on the passing and failing sides of `op`.
pub fn refine_istype(op: IsTypeOp, t: &Type) -> (Type, Type) {
    let test = op.bits();
    (t.intersect(&Type::from_bits(test)), t.remove_bits(test))
}

/// Outcome of an instance test of a value of type `t` against `cls`.
pub fn instanceof_outcome(t: &Type, cls: &Type) -> Option<bool> {
    if t.subtype_of(cls) {
        return Some(true);
    }
    if !t.could_be(cls) {
        return Some(false);
    }
    None
}

// ============================================================================
// Iteration
// ============================================================================

/// How many elements an iteration visits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IterCount {
    Empty,
    Single,
    ZeroOrOne,
    NonEmpty,
    Any,
}

impl IterCount {
    /// The count remaining after one successful step.
    pub fn after_next(self) -> IterCount {
        match self {
            IterCount::Empty | IterCount::Single | IterCount::ZeroOrOne => IterCount::Empty,
            IterCount::NonEmpty | IterCount::Any => IterCount::Any,
        }
    }

    pub fn could_be_empty(self) -> bool {
        matches!(self, IterCount::Empty | IterCount::ZeroOrOne | IterCount::Any)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct IterTypes {
    pub key: Type,
    pub value: Type,
    pub count: IterCount,
    pub may_throw_on_init: bool,
    pub may_throw_on_next: bool,
}

fn count_of(len: usize) -> IterCount {
    match len {
        0 => IterCount::Empty,
        1 => IterCount::Single,
        _ => IterCount::NonEmpty,
    }
}

fn union_all(types: impl IntoIterator<Item = Type>) -> Type {
    types.into_iter().fold(Type::BOTTOM, |acc, t| acc.join(&t))
}

fn key_literal(k: &ArrayKey) -> Type {
    Type::from_value(&k.to_value())
}

/// Key, value and count of iterating a value of type `t`.
pub fn iter_types(t: &Type) -> IterTypes {
    if t.is_bottom() || !t.subtype_of_bits(TypeBits::ARR_LIKE) {
        return IterTypes {
            key: Type::INIT_CELL,
            value: Type::INIT_CELL,
            count: IterCount::Any,
            may_throw_on_init: true,
            may_throw_on_next: true,
        };
    }
    let bits = t.bits();
    let (key, value, count) = match t.data() {
        Some(Data::Packed(elems)) => (
            union_all((0..elems.len() as i64).map(Type::int)),
            union_all(elems.iter().cloned()),
            count_of(elems.len()),
        ),
        Some(Data::PackedN(elem)) => (Type::INT, (**elem).clone(), IterCount::Any),
        Some(Data::Map(entries)) => (
            union_all(entries.iter().map(|(k, _)| key_literal(k))),
            union_all(entries.iter().map(|(_, v)| v.clone())),
            count_of(entries.len()),
        ),
        Some(Data::MapN(k, v)) => ((**k).clone(), (**v).clone(), IterCount::Any),
        _ if bits == TypeBits::VEC => (Type::INT, Type::INIT_CELL, IterCount::Any),
        _ if bits == TypeBits::KEYSET => (Type::ARR_KEY, Type::ARR_KEY, IterCount::Any),
        _ => (Type::ARR_KEY, Type::INIT_CELL, IterCount::Any),
    };
    IterTypes {
        key,
        value,
        count,
        may_throw_on_init: false,
        may_throw_on_next: false,
    }
}

// ============================================================================
// Element access
// ============================================================================

/// Whether a key is present in a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Presence {
    Present,
    Missing,
    Maybe,
}

fn lookup_key(t: &Type, key: &Value) -> Option<ArrayKey> {
    if t.bits() == TypeBits::ARR {
        eval::to_arr_key(key).ok()
    } else {
        eval::to_hack_key(key).ok()
    }
}

/// The element type at `key` in a container of type `t`, and whether the key
/// is present.
pub fn array_like_elem(t: &Type, key: &Type) -> (Type, Presence) {
    let single_kind = [TypeBits::ARR, TypeBits::VEC, TypeBits::DICT, TypeBits::KEYSET]
        .contains(&t.bits());
    if !single_kind {
        return (Type::INIT_CELL, Presence::Maybe);
    }
    let literal_key = key.tv().and_then(|k| lookup_key(t, &k));
    match (t.data(), literal_key) {
        (Some(Data::Packed(elems)), Some(ArrayKey::Int(i))) => {
            match usize::try_from(i).ok().and_then(|i| elems.get(i)) {
                Some(e) => (e.clone(), Presence::Present),
                None => (Type::BOTTOM, Presence::Missing),
            }
        }
        (Some(Data::Packed(_)), Some(ArrayKey::Str(_))) => (Type::BOTTOM, Presence::Missing),
        (Some(Data::Packed(elems)), None) => (union_all(elems.iter().cloned()), Presence::Maybe),
        (Some(Data::PackedN(elem)), Some(ArrayKey::Int(i))) if i >= 0 => {
            ((**elem).clone(), Presence::Maybe)
        }
        (Some(Data::PackedN(_)), Some(_)) => (Type::BOTTOM, Presence::Missing),
        (Some(Data::PackedN(elem)), None) => ((**elem).clone(), Presence::Maybe),
        (Some(Data::Map(entries)), Some(k)) => match entries.iter().find(|(ek, _)| *ek == k) {
            Some((_, v)) => (v.clone(), Presence::Present),
            None => (Type::BOTTOM, Presence::Missing),
        },
        (Some(Data::Map(entries)), None) => (
            union_all(entries.iter().map(|(_, v)| v.clone())),
            Presence::Maybe,
        ),
        (Some(Data::MapN(k, v)), Some(lit)) => {
            if key_literal(&lit).subtype_of(k) {
                ((**v).clone(), Presence::Maybe)
            } else {
                (Type::BOTTOM, Presence::Missing)
            }
        }
        (Some(Data::MapN(_, v)), None) => ((**v).clone(), Presence::Maybe),
        _ if t.bits() == TypeBits::KEYSET => (Type::ARR_KEY, Presence::Maybe),
        _ => (Type::INIT_CELL, Presence::Maybe),
    }
}

// ============================================================================
// Identity
// ============================================================================

/// Whether some value of `t` could be a NaN or a container holding one.
pub fn could_be_nan(t: &Type) -> bool {
    if let Some(Value::Dbl(d)) = t.tv() {
        return d.is_nan();
    }
    if t.could_be_bits(TypeBits::DBL) || t.could_be_bits(TypeBits::REF) {
        return true;
    }
    if !t.could_be_bits(TypeBits::ARR_LIKE | TypeBits::OBJ) {
        return false;
    }
    match t.data() {
        Some(Data::Packed(elems)) => elems.iter().any(could_be_nan),
        Some(Data::PackedN(elem)) => could_be_nan(elem),
        Some(Data::Map(entries)) => entries.iter().any(|(_, v)| could_be_nan(v)),
        Some(Data::MapN(_, v)) => could_be_nan(v),
        Some(Data::Obj(_)) => false,
        _ => t.could_be_bits(TypeBits::ARR_LIKE & !TypeBits::KEYSET),
    }
}

/// Result type of `a === b`.
pub fn type_same(a: &Type, b: &Type) -> Type {
    if let (Some(x), Some(y)) = (a.tv(), b.tv()) {
        return Type::bool(eval::same(&x, &y));
    }
    let (ca, cb) = (a.to_cell(), b.to_cell());
    if !ca.could_be(&cb) {
        return Type::FALSE;
    }
    Type::BOOL
}

/// Result type of `a !== b`.
pub fn type_nsame(a: &Type, b: &Type) -> Type {
    let same = type_same(a, b);
    if same == Type::TRUE {
        Type::FALSE
    } else if same == Type::FALSE {
        Type::TRUE
    } else {
        Type::BOOL
    }
}

/// The result type of awaiting a value of type `t`.
pub fn wait_handle_inner(t: &Type) -> Type {
    match t.data() {
        Some(Data::WaitHandle(inner)) => (**inner).clone(),
        _ => Type::INIT_CELL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emptiness_of_common_types() {
        assert_eq!(emptiness(&Type::INIT_NULL), Emptiness::Empty);
        assert_eq!(emptiness(&Type::int(0)), Emptiness::Empty);
        assert_eq!(emptiness(&Type::int(7)), Emptiness::NonEmpty);
        assert_eq!(emptiness(&Type::OBJ), Emptiness::NonEmpty);
        assert_eq!(emptiness(&Type::INT), Emptiness::Maybe);
        assert_eq!(emptiness(&Type::vec(vec![Type::INT])), Emptiness::NonEmpty);
        assert_eq!(emptiness(&Type::OBJ.opt()), Emptiness::Maybe);
    }

    #[test]
    fn truthiness_refinement_partitions() {
        let t = Type::OBJ.opt();
        assert_eq!(assert_nonemptiness(&t), Type::OBJ);
        assert_eq!(assert_emptiness(&t), Type::INIT_NULL);

        let t = Type::INT;
        assert_eq!(assert_emptiness(&t), Type::int(0));
        assert_eq!(assert_nonemptiness(&t), Type::INT);
    }

    #[test]
    fn istype_refinement() {
        let t = Type::INT.opt();
        assert_eq!(istype_outcome(IsTypeOp::Null, &t), None);
        let (pass, fail) = refine_istype(IsTypeOp::Null, &t);
        assert_eq!(pass, Type::INIT_NULL);
        assert_eq!(fail, Type::INT);
        assert_eq!(istype_outcome(IsTypeOp::Int, &Type::int(3)), Some(true));
        assert_eq!(istype_outcome(IsTypeOp::Str, &Type::int(3)), Some(false));
    }

    #[test]
    fn iteration_counts() {
        assert_eq!(iter_types(&Type::vec_empty()).count, IterCount::Empty);
        let single = iter_types(&Type::dict(vec![(ArrayKey::from("k"), Type::INT)]));
        assert_eq!(single.count, IterCount::Single);
        assert_eq!(single.key, Type::str("k"));
        assert_eq!(single.value, Type::INT);
        assert!(iter_types(&Type::OBJ).may_throw_on_init);
    }

    #[test]
    fn element_lookup() {
        let t = Type::vec(vec![Type::int(1), Type::STR]);
        assert_eq!(array_like_elem(&t, &Type::int(1)), (Type::STR, Presence::Present));
        assert_eq!(array_like_elem(&t, &Type::int(5)), (Type::BOTTOM, Presence::Missing));
        assert_eq!(array_like_elem(&t, &Type::INT).1, Presence::Maybe);
    }

    #[test]
    fn identity_of_literals() {
        assert_eq!(type_same(&Type::int(1), &Type::int(1)), Type::TRUE);
        assert_eq!(type_same(&Type::dbl(f64::NAN), &Type::dbl(f64::NAN)), Type::FALSE);
        assert_eq!(type_same(&Type::INT, &Type::STR), Type::FALSE);
        assert_eq!(type_nsame(&Type::INT, &Type::INT), Type::BOOL);
        assert!(could_be_nan(&Type::DBL));
        assert!(!could_be_nan(&Type::dbl(1.0)));
        assert!(!could_be_nan(&Type::INT));
    }
}

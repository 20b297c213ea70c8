use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::bits::{TypeBits, bits_name};
use crate::class::ClassRef;
use crate::lattice::{HasBottom, HasTop, Lattice};
use crate::value::{ArrayKey, Value};

// ============================================================================
// Specializations
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Exactness {
    Exact,
    Sub,
}

/// An object or class specialization: exactly `cls`, or `cls` or a subclass.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClassSpec {
    pub exactness: Exactness,
    pub cls: ClassRef,
}

impl ClassSpec {
    pub fn exact(cls: ClassRef) -> Self {
        ClassSpec {
            exactness: Exactness::Exact,
            cls,
        }
    }

    pub fn sub(cls: ClassRef) -> Self {
        ClassSpec {
            exactness: Exactness::Sub,
            cls,
        }
    }

    pub fn is_exact(&self) -> bool {
        self.exactness == Exactness::Exact
    }

    fn subtype_of(&self, other: &ClassSpec) -> bool {
        match other.exactness {
            Exactness::Exact => self.is_exact() && self.cls == other.cls,
            Exactness::Sub => self.cls.subclass_of(&other.cls),
        }
    }

    fn join(&self, other: &ClassSpec) -> Option<ClassSpec> {
        if self.subtype_of(other) {
            return Some(other.clone());
        }
        if other.subtype_of(self) {
            return Some(self.clone());
        }
        std::iter::once(&self.cls)
            .chain(self.cls.ancestors())
            .find(|a| other.cls.subclass_of(a))
            .map(|a| ClassSpec::sub(a.clone()))
    }

    /// `None` when no value can satisfy both.
    fn meet(&self, other: &ClassSpec) -> Option<ClassSpec> {
        if self.subtype_of(other) {
            return Some(self.clone());
        }
        if other.subtype_of(self) {
            return Some(other.clone());
        }
        if self.is_exact() || other.is_exact() {
            return None;
        }
        match (self.cls.is_interface(), other.cls.is_interface()) {
            (false, false) => None,
            (false, true) => Some(self.clone()),
            (true, false) => Some(other.clone()),
            (true, true) if self.cls.name() <= other.cls.name() => Some(self.clone()),
            (true, true) => Some(other.clone()),
        }
    }
}

/// The specialization carried by a [`Type`].
///
/// A specialization only describes the non-null part of a type, and a type
/// carries one only when that part is a single primitive kind the
/// specialization applies to.
#[derive(Clone, Debug)]
pub enum Data {
    Int(i64),
    Dbl(f64),
    Str(Arc<str>),
    /// Keys `0..n` with the given element types.
    Packed(Vec<Type>),
    /// Keys `0..n` for unknown `n`, every element of the given type.
    PackedN(Box<Type>),
    /// Exactly these keys, in order.
    Map(Vec<(ArrayKey, Type)>),
    /// Any number of entries with the given key and value types.
    MapN(Box<Type>, Box<Type>),
    Obj(ClassSpec),
    Cls(ClassSpec),
    /// A wait handle whose result has the inner type.
    WaitHandle(Box<Type>),
}

impl PartialEq for Data {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Data::Int(a), Data::Int(b)) => a == b,
            (Data::Dbl(a), Data::Dbl(b)) => a.to_bits() == b.to_bits(),
            (Data::Str(a), Data::Str(b)) => a == b,
            (Data::Packed(a), Data::Packed(b)) => a == b,
            (Data::PackedN(a), Data::PackedN(b)) => a == b,
            (Data::Map(a), Data::Map(b)) => a == b,
            (Data::MapN(ka, va), Data::MapN(kb, vb)) => ka == kb && va == vb,
            (Data::Obj(a), Data::Obj(b)) | (Data::Cls(a), Data::Cls(b)) => a == b,
            (Data::WaitHandle(a), Data::WaitHandle(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Data {}

impl Hash for Data {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Data::Int(i) => i.hash(state),
            Data::Dbl(d) => d.to_bits().hash(state),
            Data::Str(s) => s.hash(state),
            Data::Packed(elems) => elems.hash(state),
            Data::PackedN(elem) => elem.hash(state),
            Data::Map(entries) => entries.hash(state),
            Data::MapN(k, v) => {
                k.hash(state);
                v.hash(state);
            }
            Data::Obj(spec) | Data::Cls(spec) => spec.hash(state),
            Data::WaitHandle(inner) => inner.hash(state),
        }
    }
}

impl Data {
    /// Whether this specialization can describe values of primitive kind
    /// `kind` (a type's bits without `INIT_NULL`).
    fn applies_to(&self, kind: TypeBits) -> bool {
        match self {
            Data::Int(_) => kind == TypeBits::INT,
            Data::Dbl(_) => kind == TypeBits::DBL,
            Data::Str(_) => kind == TypeBits::STR,
            Data::Packed(_) | Data::PackedN(_) => kind == TypeBits::VEC || kind == TypeBits::ARR,
            Data::Map(_) | Data::MapN(..) => {
                kind == TypeBits::DICT || kind == TypeBits::ARR || kind == TypeBits::KEYSET
            }
            Data::Obj(_) | Data::WaitHandle(_) => kind == TypeBits::OBJ,
            Data::Cls(_) => kind == TypeBits::CLS,
        }
    }
}

fn key_type(key: &ArrayKey) -> Type {
    match key {
        ArrayKey::Int(i) => Type::int(*i),
        ArrayKey::Str(s) => Type::str(s),
    }
}

fn union_all<'a>(types: impl IntoIterator<Item = &'a Type>) -> Type {
    types
        .into_iter()
        .fold(Type::BOTTOM, |acc, t| acc.join(t))
}

/// Element type of a packed specialization.
fn packed_elem(data: &Data) -> Type {
    match data {
        Data::Packed(elems) => union_all(elems),
        Data::PackedN(elem) => (**elem).clone(),
        _ => Type::INIT_CELL,
    }
}

/// Key and value types of any container specialization.
fn map_kv(data: &Data) -> (Type, Type) {
    match data {
        Data::Packed(elems) => {
            let keys = (0..elems.len() as i64).fold(Type::BOTTOM, |acc, i| acc.join(&Type::int(i)));
            (keys, union_all(elems))
        }
        Data::PackedN(elem) => (Type::INT, (**elem).clone()),
        Data::Map(entries) => (
            entries
                .iter()
                .fold(Type::BOTTOM, |acc, (k, _)| acc.join(&key_type(k))),
            union_all(entries.iter().map(|(_, v)| v)),
        ),
        Data::MapN(k, v) => ((**k).clone(), (**v).clone()),
        _ => (Type::ARR_KEY, Type::INIT_CELL),
    }
}

fn join_data(a: &Data, b: &Data) -> Option<Data> {
    if a == b {
        return Some(a.clone());
    }
    match (a, b) {
        (Data::Packed(x), Data::Packed(y)) if x.len() == y.len() => Some(Data::Packed(
            x.iter().zip(y).map(|(l, r)| l.join(r)).collect(),
        )),
        (Data::Packed(_) | Data::PackedN(_), Data::Packed(_) | Data::PackedN(_)) => Some(
            Data::PackedN(Box::new(packed_elem(a).join(&packed_elem(b)))),
        ),
        (Data::Map(x), Data::Map(y))
            if x.len() == y.len() && x.iter().zip(y).all(|((kx, _), (ky, _))| kx == ky) =>
        {
            Some(Data::Map(
                x.iter()
                    .zip(y)
                    .map(|((k, l), (_, r))| (k.clone(), l.join(r)))
                    .collect(),
            ))
        }
        (
            Data::Packed(_) | Data::PackedN(_) | Data::Map(_) | Data::MapN(..),
            Data::Packed(_) | Data::PackedN(_) | Data::Map(_) | Data::MapN(..),
        ) => {
            let (ka, va) = map_kv(a);
            let (kb, vb) = map_kv(b);
            Some(Data::MapN(Box::new(ka.join(&kb)), Box::new(va.join(&vb))))
        }
        (Data::Obj(x), Data::Obj(y)) => x.join(y).map(Data::Obj),
        (Data::Cls(x), Data::Cls(y)) => x.join(y).map(Data::Cls),
        (Data::WaitHandle(x), Data::WaitHandle(y)) => Some(Data::WaitHandle(Box::new(x.join(y)))),
        _ => None,
    }
}

fn meet_elems<'a>(pairs: impl Iterator<Item = (&'a Type, &'a Type)>) -> Option<Vec<Type>> {
    pairs
        .map(|(l, r)| {
            let m = l.meet(r);
            (!m.is_bottom()).then_some(m)
        })
        .collect()
}

/// `None` when the two specializations share no value.
fn meet_data(a: &Data, b: &Data) -> Option<Data> {
    if a == b {
        return Some(a.clone());
    }
    match (a, b) {
        (Data::Packed(x), Data::Packed(y)) if x.len() == y.len() => {
            meet_elems(x.iter().zip(y)).map(Data::Packed)
        }
        (Data::Packed(x), Data::PackedN(t)) | (Data::PackedN(t), Data::Packed(x)) => {
            meet_elems(x.iter().map(|e| (e, &**t))).map(Data::Packed)
        }
        (Data::PackedN(s), Data::PackedN(t)) => {
            let m = s.meet(t);
            Some(if m.is_bottom() {
                Data::Packed(Vec::new())
            } else {
                Data::PackedN(Box::new(m))
            })
        }
        (Data::Map(x), Data::Map(y))
            if x.len() == y.len() && x.iter().zip(y).all(|((kx, _), (ky, _))| kx == ky) =>
        {
            meet_elems(x.iter().zip(y).map(|((_, l), (_, r))| (l, r)))
                .map(|vals| Data::Map(x.iter().map(|(k, _)| k.clone()).zip(vals).collect()))
        }
        (Data::Map(x), Data::MapN(k, v)) | (Data::MapN(k, v), Data::Map(x)) => {
            if !x.iter().all(|(key, _)| key_type(key).is_subseteq(k)) {
                return None;
            }
            meet_elems(x.iter().map(|(_, e)| (e, &**v)))
                .map(|vals| Data::Map(x.iter().map(|(k, _)| k.clone()).zip(vals).collect()))
        }
        (Data::MapN(k1, v1), Data::MapN(k2, v2)) => {
            let k = k1.meet(k2);
            let v = v1.meet(v2);
            Some(if k.is_bottom() || v.is_bottom() {
                Data::Map(Vec::new())
            } else {
                Data::MapN(Box::new(k), Box::new(v))
            })
        }
        (Data::Packed(x), Data::MapN(k, v)) | (Data::MapN(k, v), Data::Packed(x)) => {
            if !(0..x.len() as i64).all(|i| Type::int(i).is_subseteq(k)) {
                return None;
            }
            meet_elems(x.iter().map(|e| (e, &**v))).map(Data::Packed)
        }
        (Data::PackedN(t), Data::MapN(k, v)) | (Data::MapN(k, v), Data::PackedN(t)) => {
            let m = t.meet(v);
            Some(if !Type::INT.is_subseteq(k) || m.is_bottom() {
                Data::Packed(Vec::new())
            } else {
                Data::PackedN(Box::new(m))
            })
        }
        (Data::Obj(x), Data::Obj(y)) => x.meet(y).map(Data::Obj),
        (Data::Cls(x), Data::Cls(y)) => x.meet(y).map(Data::Cls),
        (Data::WaitHandle(x), Data::WaitHandle(y)) => {
            let m = x.meet(y);
            (!m.is_bottom()).then(|| Data::WaitHandle(Box::new(m)))
        }
        _ => None,
    }
}

fn subtype_data(a: &Data, b: &Data) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Data::Packed(x), Data::Packed(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| l.is_subseteq(r))
        }
        (Data::Packed(x), Data::PackedN(t)) => x.iter().all(|e| e.is_subseteq(t)),
        (Data::PackedN(s), Data::PackedN(t)) => s.is_subseteq(t),
        (Data::Map(x), Data::Map(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .zip(y)
                    .all(|((kx, l), (ky, r))| kx == ky && l.is_subseteq(r))
        }
        (Data::Map(x), Data::MapN(k, v)) => x
            .iter()
            .all(|(key, e)| key_type(key).is_subseteq(k) && e.is_subseteq(v)),
        (Data::MapN(k1, v1), Data::MapN(k2, v2)) => k1.is_subseteq(k2) && v1.is_subseteq(v2),
        (Data::Packed(x), Data::MapN(k, v)) => x
            .iter()
            .enumerate()
            .all(|(i, e)| Type::int(i as i64).is_subseteq(k) && e.is_subseteq(v)),
        (Data::PackedN(t), Data::MapN(k, v)) => Type::INT.is_subseteq(k) && t.is_subseteq(v),
        (Data::Obj(x), Data::Obj(y)) | (Data::Cls(x), Data::Cls(y)) => x.subtype_of(y),
        (Data::WaitHandle(x), Data::WaitHandle(y)) => x.is_subseteq(y),
        _ => false,
    }
}

// ============================================================================
// Type
// ============================================================================

/// An abstract value: a union of primitive kinds with an optional
/// specialization of its non-null part.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Type {
    bits: TypeBits,
    data: Option<Data>,
}

impl Type {
    pub const BOTTOM: Type = Type::from_bits(TypeBits::empty());
    pub const UNINIT: Type = Type::from_bits(TypeBits::UNINIT);
    pub const INIT_NULL: Type = Type::from_bits(TypeBits::INIT_NULL);
    pub const NULL: Type = Type::from_bits(TypeBits::NULL);
    pub const FALSE: Type = Type::from_bits(TypeBits::FALSE);
    pub const TRUE: Type = Type::from_bits(TypeBits::TRUE);
    pub const BOOL: Type = Type::from_bits(TypeBits::BOOL);
    pub const INT: Type = Type::from_bits(TypeBits::INT);
    pub const DBL: Type = Type::from_bits(TypeBits::DBL);
    pub const NUM: Type = Type::from_bits(TypeBits::NUM);
    pub const STR: Type = Type::from_bits(TypeBits::STR);
    pub const ARR_KEY: Type = Type::from_bits(TypeBits::ARR_KEY);
    pub const ARR: Type = Type::from_bits(TypeBits::ARR);
    pub const VEC: Type = Type::from_bits(TypeBits::VEC);
    pub const DICT: Type = Type::from_bits(TypeBits::DICT);
    pub const KEYSET: Type = Type::from_bits(TypeBits::KEYSET);
    pub const ARR_LIKE: Type = Type::from_bits(TypeBits::ARR_LIKE);
    pub const OBJ: Type = Type::from_bits(TypeBits::OBJ);
    pub const RES: Type = Type::from_bits(TypeBits::RES);
    pub const CLS: Type = Type::from_bits(TypeBits::CLS);
    pub const REF: Type = Type::from_bits(TypeBits::REF);
    pub const INIT_PRIM: Type = Type::from_bits(TypeBits::INIT_PRIM);
    pub const INIT_UNC: Type = Type::from_bits(TypeBits::INIT_UNC);
    pub const UNC: Type = Type::from_bits(TypeBits::UNC);
    pub const INIT_CELL: Type = Type::from_bits(TypeBits::INIT_CELL);
    pub const CELL: Type = Type::from_bits(TypeBits::CELL);
    pub const INIT_GEN: Type = Type::from_bits(TypeBits::INIT_GEN);
    pub const GEN: Type = Type::from_bits(TypeBits::GEN);
    pub const TOP: Type = Type::from_bits(TypeBits::TOP);

    pub const fn from_bits(bits: TypeBits) -> Self {
        Type { bits, data: None }
    }

    /// Build a type, dropping `data` when it cannot describe the non-null
    /// part of `bits`.
    fn with_data(bits: TypeBits, data: Option<Data>) -> Self {
        let kind = bits.difference(TypeBits::INIT_NULL);
        let data = data.filter(|d| !kind.is_empty() && d.applies_to(kind));
        let data = match data {
            // A legacy array with keys 0..n is packed.
            Some(Data::Map(entries))
                if kind == TypeBits::ARR
                    && entries
                        .iter()
                        .enumerate()
                        .all(|(i, (k, _))| *k == ArrayKey::Int(i as i64)) =>
            {
                Some(Data::Packed(entries.into_iter().map(|(_, v)| v).collect()))
            }
            other => other,
        };
        Type { bits, data }
    }

    pub fn bits(&self) -> TypeBits {
        self.bits
    }

    pub fn data(&self) -> Option<&Data> {
        self.data.as_ref()
    }

    pub fn is_bottom(&self) -> bool {
        self.bits.is_empty()
    }

    // -- Constructors --------------------------------------------------------

    pub fn int(i: i64) -> Self {
        Type::with_data(TypeBits::INT, Some(Data::Int(i)))
    }

    pub fn dbl(d: f64) -> Self {
        Type::with_data(TypeBits::DBL, Some(Data::Dbl(d)))
    }

    pub fn str(s: &str) -> Self {
        Type::with_data(TypeBits::STR, Some(Data::Str(s.into())))
    }

    pub fn bool(b: bool) -> Self {
        if b { Type::TRUE } else { Type::FALSE }
    }

    fn container(bits: TypeBits, data: Data, elems_bottom: bool) -> Self {
        if elems_bottom {
            return Type::BOTTOM;
        }
        Type::with_data(bits, Some(data))
    }

    /// A vec with exactly these element types.
    pub fn vec(elems: Vec<Type>) -> Self {
        let bottom = elems.iter().any(Type::is_bottom);
        Type::container(TypeBits::VEC, Data::Packed(elems), bottom)
    }

    pub fn vec_empty() -> Self {
        Type::vec(Vec::new())
    }

    /// A vec of any length whose elements have type `elem`.
    pub fn vec_n(elem: Type) -> Self {
        if elem.is_bottom() {
            return Type::vec_empty();
        }
        Type::with_data(TypeBits::VEC, Some(Data::PackedN(Box::new(elem))))
    }

    /// A legacy array with keys `0..n`.
    pub fn arr_packed(elems: Vec<Type>) -> Self {
        let bottom = elems.iter().any(Type::is_bottom);
        Type::container(TypeBits::ARR, Data::Packed(elems), bottom)
    }

    pub fn arr_empty() -> Self {
        Type::arr_packed(Vec::new())
    }

    pub fn arr_map(entries: Vec<(ArrayKey, Type)>) -> Self {
        let bottom = entries.iter().any(|(_, v)| v.is_bottom());
        Type::container(TypeBits::ARR, Data::Map(entries), bottom)
    }

    pub fn arr_n(key: Type, val: Type) -> Self {
        Type::map_n(TypeBits::ARR, key, val)
    }

    pub fn dict(entries: Vec<(ArrayKey, Type)>) -> Self {
        let bottom = entries.iter().any(|(_, v)| v.is_bottom());
        Type::container(TypeBits::DICT, Data::Map(entries), bottom)
    }

    pub fn dict_empty() -> Self {
        Type::dict(Vec::new())
    }

    pub fn dict_n(key: Type, val: Type) -> Self {
        Type::map_n(TypeBits::DICT, key, val)
    }

    pub fn keyset(keys: Vec<ArrayKey>) -> Self {
        let entries = keys.into_iter().map(|k| {
            let t = key_type(&k);
            (k, t)
        });
        Type::with_data(TypeBits::KEYSET, Some(Data::Map(entries.collect())))
    }

    pub fn keyset_empty() -> Self {
        Type::keyset(Vec::new())
    }

    pub fn keyset_n(key: Type) -> Self {
        Type::map_n(TypeBits::KEYSET, key.clone(), key)
    }

    fn map_n(bits: TypeBits, key: Type, val: Type) -> Self {
        if key.is_bottom() || val.is_bottom() {
            return Type::with_data(bits, Some(Data::Map(Vec::new())));
        }
        Type::with_data(bits, Some(Data::MapN(Box::new(key), Box::new(val))))
    }

    pub fn obj_exact(cls: ClassRef) -> Self {
        Type::with_data(TypeBits::OBJ, Some(Data::Obj(ClassSpec::exact(cls))))
    }

    pub fn obj_sub(cls: ClassRef) -> Self {
        Type::with_data(TypeBits::OBJ, Some(Data::Obj(ClassSpec::sub(cls))))
    }

    pub fn cls_exact(cls: ClassRef) -> Self {
        Type::with_data(TypeBits::CLS, Some(Data::Cls(ClassSpec::exact(cls))))
    }

    pub fn cls_sub(cls: ClassRef) -> Self {
        Type::with_data(TypeBits::CLS, Some(Data::Cls(ClassSpec::sub(cls))))
    }

    pub fn wait_handle(inner: Type) -> Self {
        Type::with_data(TypeBits::OBJ, Some(Data::WaitHandle(Box::new(inner))))
    }

    /// The type containing exactly `v`.
    pub fn from_value(v: &Value) -> Self {
        match v {
            Value::Uninit => Type::UNINIT,
            Value::Null => Type::INIT_NULL,
            Value::Bool(b) => Type::bool(*b),
            Value::Int(i) => Type::int(*i),
            Value::Dbl(d) => Type::dbl(*d),
            Value::Str(s) => Type::with_data(TypeBits::STR, Some(Data::Str(s.clone()))),
            Value::Vec(elems) => Type::vec(elems.iter().map(Type::from_value).collect()),
            Value::Arr(entries) => Type::arr_map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Type::from_value(v)))
                    .collect(),
            ),
            Value::Dict(entries) => Type::dict(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Type::from_value(v)))
                    .collect(),
            ),
            Value::Keyset(keys) => Type::keyset(keys.clone()),
        }
    }

    // -- Queries -------------------------------------------------------------

    pub fn union(&self, other: &Type) -> Type {
        self.join(other)
    }

    pub fn intersect(&self, other: &Type) -> Type {
        self.meet(other)
    }

    pub fn subtype_of(&self, other: &Type) -> bool {
        self.is_subseteq(other)
    }

    /// Strict subtype.
    pub fn strict_subtype_of(&self, other: &Type) -> bool {
        self.is_subseteq(other) && self != other
    }

    pub fn could_be(&self, other: &Type) -> bool {
        self.bits.intersects(other.bits) && !self.meet(other).is_bottom()
    }

    pub fn could_be_bits(&self, bits: TypeBits) -> bool {
        self.bits.intersects(bits)
    }

    pub fn subtype_of_bits(&self, bits: TypeBits) -> bool {
        bits.contains(self.bits)
    }

    /// The non-null kinds of this type.
    fn nonnull(&self) -> TypeBits {
        self.bits.difference(TypeBits::INIT_NULL)
    }

    /// `?T` shape: `INIT_NULL` together with other kinds.
    pub fn is_opt(&self) -> bool {
        self.bits.contains(TypeBits::INIT_NULL)
            && !self.nonnull().is_empty()
            && !self.nonnull().contains(TypeBits::UNINIT)
    }

    pub fn unopt(&self) -> Type {
        Type::with_data(self.nonnull(), self.data.clone())
    }

    pub fn opt(&self) -> Type {
        Type::with_data(self.bits | TypeBits::INIT_NULL, self.data.clone())
    }

    /// The single value this type contains, if it contains exactly one.
    pub fn tv(&self) -> Option<Value> {
        let bits = self.bits;
        if bits == TypeBits::UNINIT {
            return Some(Value::Uninit);
        }
        if bits == TypeBits::INIT_NULL {
            return Some(Value::Null);
        }
        if bits == TypeBits::TRUE {
            return Some(Value::Bool(true));
        }
        if bits == TypeBits::FALSE {
            return Some(Value::Bool(false));
        }
        let data = self.data.as_ref()?;
        match data {
            Data::Int(i) if bits == TypeBits::INT => Some(Value::Int(*i)),
            Data::Dbl(d) if bits == TypeBits::DBL => Some(Value::Dbl(*d)),
            Data::Str(s) if bits == TypeBits::STR => Some(Value::Str(s.clone())),
            Data::Packed(elems) if bits == TypeBits::VEC => {
                elems.iter().map(Type::tv).collect::<Option<_>>().map(Value::Vec)
            }
            Data::Packed(elems) if bits == TypeBits::ARR => elems
                .iter()
                .enumerate()
                .map(|(i, e)| e.tv().map(|v| (ArrayKey::Int(i as i64), v)))
                .collect::<Option<_>>()
                .map(Value::Arr),
            Data::Map(entries) if bits == TypeBits::ARR || bits == TypeBits::DICT => {
                let entries = entries
                    .iter()
                    .map(|(k, e)| e.tv().map(|v| (k.clone(), v)))
                    .collect::<Option<_>>()?;
                Some(if bits == TypeBits::ARR {
                    Value::Arr(entries)
                } else {
                    Value::Dict(entries)
                })
            }
            Data::Map(entries) if bits == TypeBits::KEYSET => {
                Some(Value::Keyset(entries.iter().map(|(k, _)| k.clone()).collect()))
            }
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.tv().is_some()
    }

    pub fn int_val(&self) -> Option<i64> {
        match &self.data {
            Some(Data::Int(i)) if self.bits == TypeBits::INT => Some(*i),
            _ => None,
        }
    }

    pub fn str_val(&self) -> Option<&str> {
        match &self.data {
            Some(Data::Str(s)) if self.bits == TypeBits::STR => Some(s),
            _ => None,
        }
    }

    /// The object specialization of an object type.
    pub fn dobj(&self) -> Option<&ClassSpec> {
        match &self.data {
            Some(Data::Obj(spec)) => Some(spec),
            _ => None,
        }
    }

    /// The class specialization of a class type.
    pub fn dcls(&self) -> Option<&ClassSpec> {
        match &self.data {
            Some(Data::Cls(spec)) => Some(spec),
            _ => None,
        }
    }

    /// The type a local of this type reads as: `Uninit` reads as null and a
    /// reference may hold anything.
    pub fn to_cell(&self) -> Type {
        if self.bits.contains(TypeBits::REF) {
            return Type::INIT_CELL;
        }
        if self.bits.contains(TypeBits::UNINIT) {
            let bits = self.bits.difference(TypeBits::UNINIT) | TypeBits::INIT_NULL;
            return Type::with_data(bits, self.data.clone());
        }
        self.clone()
    }

    pub fn remove_uninit(&self) -> Type {
        Type::with_data(self.bits.difference(TypeBits::UNINIT), self.data.clone())
    }

    /// Forget the specialization.
    pub fn loosen_values(&self) -> Type {
        Type::from_bits(self.bits)
    }

    /// Add kinds to this type, keeping the specialization when it still
    /// applies.
    pub fn union_bits(&self, bits: TypeBits) -> Type {
        self.join(&Type::from_bits(bits))
    }

    /// Remove kinds from this type.
    pub fn remove_bits(&self, bits: TypeBits) -> Type {
        Type::with_data(self.bits.difference(bits), self.data.clone())
    }
}

impl Lattice for Type {
    fn join(&self, other: &Self) -> Self {
        let bits = self.bits | other.bits;
        let data = match (&self.data, &other.data) {
            (None, None) => None,
            (Some(d), None) => other.nonnull().is_empty().then(|| d.clone()),
            (None, Some(d)) => self.nonnull().is_empty().then(|| d.clone()),
            (Some(a), Some(b)) => join_data(a, b),
        };
        Type::with_data(bits, data)
    }

    fn meet(&self, other: &Self) -> Self {
        let bits = self.bits & other.bits;
        match (&self.data, &other.data) {
            (None, None) => Type::from_bits(bits),
            (Some(d), None) | (None, Some(d)) => Type::with_data(bits, Some(d.clone())),
            (Some(a), Some(b)) => match meet_data(a, b) {
                Some(d) => Type::with_data(bits, Some(d)),
                None => Type::from_bits(bits & TypeBits::INIT_NULL),
            },
        }
    }

    fn is_subseteq(&self, other: &Self) -> bool {
        if !other.bits.contains(self.bits) {
            return false;
        }
        match (&self.data, &other.data) {
            (_, None) => true,
            (None, Some(_)) => self.nonnull().is_empty(),
            (Some(a), Some(b)) => self.nonnull().is_empty() || subtype_data(a, b),
        }
    }
}

impl HasBottom for Type {
    fn bottom() -> Self {
        Type::BOTTOM
    }
}

impl HasTop for Type {
    fn top() -> Self {
        Type::TOP
    }
}

impl Default for Type {
    fn default() -> Self {
        Type::BOTTOM
    }
}

impl From<&Value> for Type {
    fn from(v: &Value) -> Self {
        Type::from_value(v)
    }
}

// ============================================================================
// Display
// ============================================================================

fn write_list(f: &mut fmt::Formatter<'_>, elems: &[Type]) -> fmt::Result {
    for (i, e) in elems.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{e}")?;
    }
    Ok(())
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let named = crate::bits::NAMED_BITS
            .iter()
            .any(|(bits, _)| *bits == self.bits);
        if self.is_opt() && !named {
            write!(f, "?{}", bits_name(self.nonnull()))?;
        } else {
            f.write_str(&bits_name(self.bits))?;
        }
        match &self.data {
            None => Ok(()),
            Some(Data::Int(i)) => write!(f, "={i}"),
            Some(Data::Dbl(d)) => write!(f, "={d:?}"),
            Some(Data::Str(s)) => write!(f, "={s:?}"),
            Some(Data::Packed(elems)) => {
                f.write_str("(")?;
                write_list(f, elems)?;
                f.write_str(")")
            }
            Some(Data::PackedN(elem)) => write!(f, "([{elem}])"),
            Some(Data::Map(entries)) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Some(Data::MapN(k, v)) => write!(f, "([{k}:{v}])"),
            Some(Data::Obj(spec)) | Some(Data::Cls(spec)) => match spec.exactness {
                Exactness::Exact => write!(f, "={}", spec.cls),
                Exactness::Sub => write!(f, "<={}", spec.cls),
            },
            Some(Data::WaitHandle(inner)) => write!(f, "<WaitH<{inner}>>"),
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_classes_join_to_parent() {
        let base = ClassRef::declare().name("Base").new();
        let a = ClassRef::declare().name("A").parent(base.clone()).new();
        let b = ClassRef::declare().name("B").parent(base.clone()).new();
        let joined = Type::obj_exact(a.clone()).join(&Type::obj_exact(b.clone()));
        assert_eq!(joined, Type::obj_sub(base));
        assert!(Type::obj_exact(a).meet(&Type::obj_exact(b)).is_bottom());
    }

    #[test]
    fn literal_extraction() {
        assert_eq!(Type::int(3).tv(), Some(Value::Int(3)));
        assert_eq!(Type::INT.tv(), None);
        assert_eq!(
            Type::vec(vec![Type::int(1), Type::str("x")]).tv(),
            Some(Value::Vec(vec![Value::Int(1), Value::str("x")]))
        );
        assert_eq!(Type::vec(vec![Type::INT]).tv(), None);
        assert_eq!(Type::int(1).opt().tv(), None);
    }

    #[test]
    fn sequential_legacy_map_is_packed() {
        let t = Type::arr_map(vec![(ArrayKey::Int(0), Type::int(5))]);
        assert_eq!(t, Type::arr_packed(vec![Type::int(5)]));
    }

    #[test]
    fn optional_types() {
        let t = Type::int(4).opt();
        assert!(t.is_opt());
        assert_eq!(t.unopt(), Type::int(4));
        assert_eq!(t.to_string(), "?Int=4");
    }

    #[test]
    fn display_forms() {
        insta::assert_snapshot!(Type::vec(vec![Type::int(1), Type::str("a")]), @r#"Vec(Int=1, Str="a")"#);
        insta::assert_snapshot!(Type::INIT_CELL, @"InitCell");
        insta::assert_snapshot!(Type::INT.join(&Type::STR).join(&Type::OBJ), @"ArrKey|Obj");
        insta::assert_snapshot!(Type::dict_n(Type::STR, Type::INT), @"Dict([Str:Int])");
    }
}

bitflags::bitflags! {
    /// Primitive kinds a value may have. A [`Type`](crate::Type) is a union
    /// of these plus an optional specialization.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct TypeBits: u32 {
        const UNINIT = 1 << 0;
        const INIT_NULL = 1 << 1;
        const FALSE = 1 << 2;
        const TRUE = 1 << 3;
        const INT = 1 << 4;
        const DBL = 1 << 5;
        const STR = 1 << 6;
        const ARR = 1 << 7;
        const VEC = 1 << 8;
        const DICT = 1 << 9;
        const KEYSET = 1 << 10;
        const OBJ = 1 << 11;
        const RES = 1 << 12;
        const CLS = 1 << 13;
        const REF = 1 << 14;

        const NULL = Self::UNINIT.bits() | Self::INIT_NULL.bits();
        const BOOL = Self::FALSE.bits() | Self::TRUE.bits();
        const NUM = Self::INT.bits() | Self::DBL.bits();
        const ARR_KEY = Self::INT.bits() | Self::STR.bits();
        const HACK_ARR = Self::VEC.bits() | Self::DICT.bits() | Self::KEYSET.bits();
        const ARR_LIKE = Self::ARR.bits() | Self::HACK_ARR.bits();
        const INIT_PRIM = Self::INIT_NULL.bits() | Self::BOOL.bits() | Self::NUM.bits();
        const PRIM = Self::INIT_PRIM.bits() | Self::UNINIT.bits();
        const INIT_UNC = Self::INIT_PRIM.bits() | Self::STR.bits();
        const UNC = Self::INIT_UNC.bits() | Self::UNINIT.bits();
        const INIT_CELL = Self::INIT_UNC.bits()
            | Self::ARR_LIKE.bits()
            | Self::OBJ.bits()
            | Self::RES.bits();
        const CELL = Self::INIT_CELL.bits() | Self::UNINIT.bits();
        const INIT_GEN = Self::INIT_CELL.bits() | Self::REF.bits();
        const GEN = Self::CELL.bits() | Self::REF.bits();
        const TOP = Self::GEN.bits() | Self::CLS.bits();
    }
}

/// Display names, most general first. Composite names win over spelling out
/// their members.
pub(crate) const NAMED_BITS: &[(TypeBits, &str)] = &[
    (TypeBits::TOP, "Top"),
    (TypeBits::GEN, "Gen"),
    (TypeBits::INIT_GEN, "InitGen"),
    (TypeBits::CELL, "Cell"),
    (TypeBits::INIT_CELL, "InitCell"),
    (TypeBits::UNC, "Unc"),
    (TypeBits::INIT_UNC, "InitUnc"),
    (TypeBits::PRIM, "Prim"),
    (TypeBits::INIT_PRIM, "InitPrim"),
    (TypeBits::ARR_LIKE, "ArrLike"),
    (TypeBits::HACK_ARR, "HackArr"),
    (TypeBits::ARR_KEY, "ArrKey"),
    (TypeBits::NUM, "Num"),
    (TypeBits::BOOL, "Bool"),
    (TypeBits::NULL, "Null"),
    (TypeBits::UNINIT, "Uninit"),
    (TypeBits::INIT_NULL, "InitNull"),
    (TypeBits::FALSE, "False"),
    (TypeBits::TRUE, "True"),
    (TypeBits::INT, "Int"),
    (TypeBits::DBL, "Dbl"),
    (TypeBits::STR, "Str"),
    (TypeBits::ARR, "Arr"),
    (TypeBits::VEC, "Vec"),
    (TypeBits::DICT, "Dict"),
    (TypeBits::KEYSET, "Keyset"),
    (TypeBits::OBJ, "Obj"),
    (TypeBits::RES, "Res"),
    (TypeBits::CLS, "Cls"),
    (TypeBits::REF, "Ref"),
];

/// Spell `bits` with as few names as possible, greedily taking the largest
/// named subsets first.
pub(crate) fn bits_name(bits: TypeBits) -> String {
    if bits.is_empty() {
        return "Bottom".to_string();
    }
    let mut rest = bits;
    let mut parts = Vec::new();
    for (named, name) in NAMED_BITS {
        if !rest.is_empty() && rest.contains(*named) {
            parts.push(*name);
            rest.remove(*named);
        }
    }
    parts.join("|")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_names_are_preferred() {
        assert_eq!(bits_name(TypeBits::INIT_CELL), "InitCell");
        assert_eq!(bits_name(TypeBits::INT | TypeBits::STR), "ArrKey");
        assert_eq!(bits_name(TypeBits::INT | TypeBits::OBJ), "Int|Obj");
        assert_eq!(bits_name(TypeBits::empty()), "Bottom");
    }
}

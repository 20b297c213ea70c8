use std::fmt;

macro_rules! identifier {
    ($(#[$attr:meta])* struct $name:ident, $prefix:literal) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(u32);

        impl $name {
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Return the raw index.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

identifier! {
    /// A basic block of a function.
    struct BlockId, "B"
}

identifier! {
    /// A local variable slot. Parameters occupy the first slots.
    struct LocalId, "L"
}

identifier! {
    /// An iterator slot.
    struct IterId, "I"
}

identifier! {
    /// A class-reference slot.
    struct ClsRefSlotId, "S"
}

/// A contiguous run of locals: `first` and the `rest` that follow it.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocalRange {
    pub first: LocalId,
    pub rest: u32,
}

impl LocalRange {
    pub fn new(first: LocalId, rest: u32) -> Self {
        LocalRange { first, rest }
    }

    pub fn iter(self) -> impl Iterator<Item = LocalId> {
        let start = self.first.0;
        (start..=start + self.rest).map(LocalId)
    }
}

impl fmt::Display for LocalRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rest == 0 {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}+{}", self.first, self.rest)
        }
    }
}

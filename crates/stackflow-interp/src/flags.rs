use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use stackflow_bytecode::{BlockId, LocalId, Op};
use stackflow_types::Type;

/// The type each function-static local had when it was first used, keyed by
/// local.
pub type LocalStaticUses = FxHashMap<LocalId, Type>;

/// A set of locals, possibly all of them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocalSet {
    all: bool,
    locals: SmallVec<[LocalId; 4]>,
}

impl LocalSet {
    pub fn insert(&mut self, l: LocalId) {
        if !self.all && !self.locals.contains(&l) {
            self.locals.push(l);
        }
    }

    pub fn insert_all(&mut self) {
        self.all = true;
        self.locals.clear();
    }

    pub fn contains(&self, l: LocalId) -> bool {
        self.all || self.locals.contains(&l)
    }

    pub fn is_all(&self) -> bool {
        self.all
    }

    pub fn is_empty(&self) -> bool {
        !self.all && self.locals.is_empty()
    }

    /// The individually recorded locals; empty when the set holds all.
    pub fn iter(&self) -> impl Iterator<Item = LocalId> + '_ {
        self.locals.iter().copied()
    }

    pub fn union(&mut self, other: &LocalSet) {
        if other.all {
            self.insert_all();
        } else {
            other.iter().for_each(|l| self.insert(l));
        }
    }
}

/// Per-instruction summary of what the instruction did besides its effect
/// on the abstract state.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectFlags {
    /// The instruction may raise.
    pub was_pei: bool,
    /// The pushed values are literals whenever the inputs were.
    pub can_const_prop: bool,
    /// No observable effect beyond the stack. Implies `!was_pei`.
    pub effect_free: bool,
    /// An equivalent sequence to replace the instruction with.
    pub strength_reduced: Option<Vec<Op>>,
    /// The branch the instruction certainly takes; the fallthrough when it
    /// never branches.
    pub jmp_dest: Option<BlockId>,
    /// Type of the value returned from the function.
    pub returned: Option<Type>,
    pub used_local_statics: Option<LocalStaticUses>,
    /// Locals whose current value the instruction may observe.
    pub may_read_locals: LocalSet,
}

impl Default for EffectFlags {
    fn default() -> Self {
        Self {
            was_pei: true,
            can_const_prop: false,
            effect_free: false,
            strength_reduced: None,
            jmp_dest: None,
            returned: None,
            used_local_statics: None,
            may_read_locals: LocalSet::default(),
        }
    }
}

/// Summary of interpreting a whole block.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunFlags {
    /// Union of the types the block may return.
    pub returned: Option<Type>,
    pub used_local_statics: Option<LocalStaticUses>,
}

impl RunFlags {
    pub(crate) fn merge_local_statics(&mut self, uses: Option<LocalStaticUses>) {
        let Some(uses) = uses else { return };
        let merged = self.used_local_statics.get_or_insert_with(Default::default);
        for (l, t) in uses {
            merged.entry(l).or_insert(t);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_absorbs_individual_locals() {
        let mut set = LocalSet::default();
        set.insert(LocalId::new(1));
        set.insert(LocalId::new(1));
        assert_eq!(set.iter().count(), 1);
        let mut all = LocalSet::default();
        all.insert_all();
        set.union(&all);
        assert!(set.is_all());
        assert!(set.contains(LocalId::new(9)));
    }

    #[test]
    fn first_recorded_static_type_wins() {
        let mut run = RunFlags::default();
        let l = LocalId::new(0);
        run.merge_local_statics(Some(FxHashMap::from_iter([(l, Type::int(1))])));
        run.merge_local_statics(Some(FxHashMap::from_iter([(l, Type::INT)])));
        assert_eq!(run.used_local_statics.unwrap()[&l], Type::int(1));
    }
}

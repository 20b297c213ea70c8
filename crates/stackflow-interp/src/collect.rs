use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use stackflow_bytecode::{BlockId, LocalId};
use stackflow_types::{Type, Value};

use crate::options::CollectionOpts;

/// What a function does with a named constant.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstantUse {
    /// Only read.
    ReadOnly,
    /// Defined more than once, or with a value known only at runtime.
    Dynamic,
    /// Defined exactly once with this value.
    Value(Value),
}

/// Facts gathered across all blocks of the function being analyzed.
///
/// Unlike [`State`](crate::State), these are shared by every block and only
/// grow while the function is analyzed.
#[derive(Clone, Debug)]
pub struct CollectedInfo {
    pub opts: CollectionOpts,
    /// Cleared at the first instruction that is not effect free.
    pub effect_free: bool,
    pub cns_map: FxHashMap<Arc<str>, ConstantUse>,
    /// A constant the index knows nothing about was read.
    pub reads_untracked_constants: bool,
    /// Union of the values each function-static local may hold, indexed by
    /// local.
    pub local_static_types: Vec<Type>,
    /// Calls that failed to fold, keyed by callee and the block that pushed
    /// them.
    pub unfoldable_funcs: FxHashSet<(Arc<str>, BlockId)>,
    /// Blocks whose analysis is stale and must be redone.
    pub reanalyze: FxHashSet<BlockId>,
    /// Types of the private static properties of the context class.
    pub self_props: FxHashMap<Arc<str>, Type>,
    /// Types of the private instance properties of the context class.
    pub this_props: FxHashMap<Arc<str>, Type>,
}

impl Default for CollectedInfo {
    fn default() -> Self {
        Self::new(CollectionOpts::empty())
    }
}

impl CollectedInfo {
    pub fn new(opts: CollectionOpts) -> Self {
        Self {
            opts,
            effect_free: true,
            cns_map: FxHashMap::default(),
            reads_untracked_constants: false,
            local_static_types: Vec::new(),
            unfoldable_funcs: FxHashSet::default(),
            reanalyze: FxHashSet::default(),
            self_props: FxHashMap::default(),
            this_props: FxHashMap::default(),
        }
    }

    pub fn with_self_prop(mut self, name: &str, t: Type) -> Self {
        self.self_props.insert(name.into(), t);
        self
    }

    pub fn with_this_prop(mut self, name: &str, t: Type) -> Self {
        self.this_props.insert(name.into(), t);
        self
    }

    pub fn with_local_static(mut self, l: LocalId, t: Type) -> Self {
        self.widen_local_static(l, &t);
        self
    }

    pub fn local_static_type(&self, l: LocalId) -> Option<&Type> {
        self.local_static_types.get(l.index())
    }

    pub(crate) fn widen_local_static(&mut self, l: LocalId, t: &Type) {
        if self.local_static_types.len() <= l.index() {
            self.local_static_types.resize(l.index() + 1, Type::BOTTOM);
        }
        let slot = &mut self.local_static_types[l.index()];
        *slot = if t.subtype_of(&Type::CELL) {
            slot.union(t)
        } else {
            Type::GEN
        };
    }

    pub fn is_unfoldable(&self, func: &str, push_block: BlockId) -> bool {
        self.unfoldable_funcs.contains(&(Arc::from(func), push_block))
    }

    // -- Private properties ---------------------------------------------------

    pub fn self_prop(&self, name: &str) -> Option<&Type> {
        self.self_props.get(name)
    }

    pub(crate) fn merge_self_prop(&mut self, name: &str, t: &Type) {
        if let Some(slot) = self.self_props.get_mut(name) {
            *slot = slot.union(t);
        }
    }

    pub(crate) fn kill_self_props(&mut self) {
        self.self_props
            .values_mut()
            .for_each(|t| *t = Type::INIT_CELL);
    }

    pub(crate) fn kill_this_props(&mut self) {
        self.this_props
            .values_mut()
            .for_each(|t| *t = Type::INIT_CELL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_statics_only_widen() {
        let mut info = CollectedInfo::default();
        let l = LocalId::new(2);
        info.widen_local_static(l, &Type::int(1));
        assert_eq!(info.local_static_type(l), Some(&Type::int(1)));
        assert_eq!(info.local_static_type(LocalId::new(0)), Some(&Type::BOTTOM));
        info.widen_local_static(l, &Type::STR);
        assert_eq!(info.local_static_type(l), Some(&Type::int(1).union(&Type::STR)));
        info.widen_local_static(l, &Type::REF);
        assert_eq!(info.local_static_type(l), Some(&Type::GEN));
    }

    #[test]
    fn untracked_props_are_not_created() {
        let mut info = CollectedInfo::default().with_self_prop("x", Type::INT);
        info.merge_self_prop("y", &Type::STR);
        info.merge_self_prop("x", &Type::STR);
        assert_eq!(info.self_prop("y"), None);
        assert_eq!(info.self_prop("x"), Some(&Type::ARR_KEY));
    }
}

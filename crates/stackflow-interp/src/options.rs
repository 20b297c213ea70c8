/// Global knobs of the optimizer that change what the interpreter may
/// assume or rewrite.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Options {
    /// Propose rewrites of instructions into cheaper equivalents.
    pub strength_reduce: bool,
    /// Replace instructions whose results are literals by the literals.
    pub constant_prop: bool,
    /// Assume constants keep the value the index recorded for them.
    pub hard_const_prop: bool,
    /// Evaluate calls to foldable functions on literal arguments.
    pub constant_fold_builtins: bool,
    /// Resolve calls that could trigger autoloading to their primary target
    /// when no fallback can be reached.
    pub elide_autoload_invokes: bool,
    /// Parameter type hints are enforced, so a passing check narrows the
    /// parameter.
    pub hard_type_hints: bool,
    /// Return type hints are enforced, so a passing check narrows the
    /// returned value.
    pub hard_return_type_hints: bool,
    /// Comparisons between legacy arrays and hack arrays may raise a notice.
    pub hack_arr_compat_notices: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            strength_reduce: true,
            constant_prop: true,
            hard_const_prop: true,
            constant_fold_builtins: true,
            elide_autoload_invokes: true,
            hard_type_hints: true,
            hard_return_type_hints: false,
            hack_arr_compat_notices: false,
        }
    }
}

impl Options {
    pub fn with_strength_reduce(mut self, on: bool) -> Self {
        self.strength_reduce = on;
        self
    }

    pub fn with_constant_prop(mut self, on: bool) -> Self {
        self.constant_prop = on;
        self
    }

    pub fn with_hard_const_prop(mut self, on: bool) -> Self {
        self.hard_const_prop = on;
        self
    }

    pub fn with_constant_fold_builtins(mut self, on: bool) -> Self {
        self.constant_fold_builtins = on;
        self
    }

    pub fn with_elide_autoload_invokes(mut self, on: bool) -> Self {
        self.elide_autoload_invokes = on;
        self
    }

    pub fn with_hard_type_hints(mut self, on: bool) -> Self {
        self.hard_type_hints = on;
        self
    }

    pub fn with_hard_return_type_hints(mut self, on: bool) -> Self {
        self.hard_return_type_hints = on;
        self
    }

    pub fn with_hack_arr_compat_notices(mut self, on: bool) -> Self {
        self.hack_arr_compat_notices = on;
        self
    }
}

bitflags::bitflags! {
    /// What the caller of the interpreter wants collected while a function
    /// is analyzed.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct CollectionOpts: u32 {
        /// Building an array from literals is constant-propagatable.
        const TRACK_CONSTANT_ARRAYS = 1 << 0;
        /// The function is analyzed for inlining into a caller.
        const INLINING = 1 << 1;
        /// Only whether the function is effect free matters; stop at the
        /// first instruction that is not.
        const EFFECT_FREE_ONLY = 1 << 2;
        /// Analysis under assumptions that may not hold.
        const SPECULATING = 1 << 3;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let opts = Options::default()
            .with_strength_reduce(false)
            .with_hack_arr_compat_notices(true);
        assert!(!opts.strength_reduce);
        assert!(opts.hack_arr_compat_notices);
        assert!(opts.constant_prop);
    }
}

use std::fmt;

use stackflow_bytecode::{BlockId, Function, LocalId};
use stackflow_index::FuncRef;
use stackflow_types::{ClassRef, IterCount, IterTypes, Type};

use crate::equiv::LocalEquiv;

// ============================================================================
// Operand stack
// ============================================================================

/// What a stack slot is known to equal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StackEquiv {
    #[default]
    None,
    /// The current value of a local.
    Local(LocalId),
    /// The slot directly beneath.
    Dup,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StackElem {
    pub ty: Type,
    pub equiv: StackEquiv,
}

impl StackElem {
    pub fn new(ty: Type) -> Self {
        Self {
            ty,
            equiv: StackEquiv::None,
        }
    }
}

// ============================================================================
// Iterators
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct TrackedIter {
    pub key: Type,
    pub value: Type,
    pub count: IterCount,
    pub may_throw_on_init: bool,
    pub may_throw_on_next: bool,
}

impl From<IterTypes> for TrackedIter {
    fn from(t: IterTypes) -> Self {
        Self {
            key: t.key,
            value: t.value,
            count: t.count,
            may_throw_on_init: t.may_throw_on_init,
            may_throw_on_next: t.may_throw_on_next,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Iter {
    #[default]
    Unknown,
    Tracked(TrackedIter),
}

// ============================================================================
// Pending calls
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FpiKind {
    Func,
    ObjMeth,
    ClsMeth,
    Ctor,
    Builtin,
    CallableArr,
    ObjInvoke,
    Unknown,
}

/// A call whose target has been pushed but which has not been made yet.
#[derive(Clone, Debug, PartialEq)]
pub struct ActRec {
    pub kind: FpiKind,
    /// The object or class the callee runs against.
    pub context: Type,
    pub cls: Option<ClassRef>,
    pub func: Option<FuncRef>,
    /// Called instead of `func` when that turns out not to exist.
    pub fallback_func: Option<FuncRef>,
    /// The call may be evaluated at analysis time.
    pub foldable: bool,
    /// The block holding the push instruction.
    pub push_block: BlockId,
}

impl ActRec {
    pub fn new(kind: FpiKind, context: Type) -> Self {
        Self {
            kind,
            context,
            cls: None,
            func: None,
            fallback_func: None,
            foldable: false,
            push_block: BlockId::new(0),
        }
    }

    pub fn with_cls(mut self, cls: Option<ClassRef>) -> Self {
        self.cls = cls;
        self
    }

    pub fn with_func(mut self, func: Option<FuncRef>) -> Self {
        self.func = func;
        self
    }

    pub fn with_fallback(mut self, func: Option<FuncRef>) -> Self {
        self.fallback_func = func;
        self
    }
}

// ============================================================================
// State
// ============================================================================

/// Whether a local is bound to the function-static of the same name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LocalStaticBinding {
    #[default]
    NotBound,
    MaybeBound,
    Bound,
}

/// The abstract state at a point inside a block.
#[derive(Clone, Debug, PartialEq)]
pub struct State {
    pub stack: Vec<StackElem>,
    pub locals: Vec<Type>,
    /// `None` for slots whose content is not tracked.
    pub cls_ref_slots: Vec<Option<Type>>,
    pub iters: Vec<Iter>,
    pub fpi_stack: Vec<ActRec>,
    /// `$this` is known to be non-null.
    pub this_available: bool,
    /// A local holding `$this` that must be re-read through `BareThis`.
    pub this_loc_to_kill: Option<LocalId>,
    pub equiv: LocalEquiv,
    pub local_static_bindings: Vec<LocalStaticBinding>,
    pub unreachable: bool,
}

impl State {
    /// The state on entry to `func`: parameters hold any value, other locals
    /// are uninitialized.
    pub fn entry(func: &Function) -> Self {
        let num_locals = func.num_locals();
        let locals = (0..num_locals)
            .map(|i| {
                if i < func.params.len() {
                    Type::INIT_CELL
                } else {
                    Type::UNINIT
                }
            })
            .collect();
        Self {
            stack: Vec::new(),
            locals,
            cls_ref_slots: vec![None; func.num_cls_ref_slots as usize],
            iters: vec![Iter::Unknown; func.num_iters as usize],
            fpi_stack: Vec::new(),
            this_available: false,
            this_loc_to_kill: None,
            equiv: LocalEquiv::new(num_locals),
            local_static_bindings: vec![LocalStaticBinding::NotBound; num_locals],
            unreachable: false,
        }
    }

    /// The state as seen by an exception handler: the operand stack and
    /// pending calls are discarded.
    pub fn without_stacks(&self) -> Self {
        Self {
            stack: Vec::new(),
            fpi_stack: Vec::new(),
            ..self.clone()
        }
    }

    pub fn with_stack(mut self, types: impl IntoIterator<Item = Type>) -> Self {
        self.stack = types.into_iter().map(StackElem::new).collect();
        self
    }

    pub fn with_local(mut self, l: LocalId, t: Type) -> Self {
        if let Some(slot) = self.locals.get_mut(l.index()) {
            *slot = t;
        }
        self
    }

    pub fn top(&self) -> Option<&Type> {
        self.stack.last().map(|e| &e.ty)
    }

    pub fn stack_types(&self) -> Vec<Type> {
        self.stack.iter().map(|e| e.ty.clone()).collect()
    }

    pub fn local(&self, l: LocalId) -> Option<&Type> {
        self.locals.get(l.index())
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unreachable {
            return f.write_str("<unreachable>");
        }
        f.write_str("stack: [")?;
        for (i, elem) in self.stack.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", elem.ty)?;
            match elem.equiv {
                StackEquiv::None => {}
                StackEquiv::Local(l) => write!(f, "@{l}")?,
                StackEquiv::Dup => f.write_str("@dup")?,
            }
        }
        f.write_str("] locals:")?;
        for (i, t) in self.locals.iter().enumerate() {
            write!(f, " L{i}:{t}")?;
        }
        if !self.fpi_stack.is_empty() {
            write!(f, " fpi: {}", self.fpi_stack.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use stackflow_bytecode::Param;

    use super::*;

    #[test]
    fn entry_state_of_function() {
        let func = Function::builder()
            .name("f")
            .params(vec![Param::untyped("a")])
            .locals(vec!["b".into()])
            .num_iters(1)
            .build();
        let state = State::entry(&func).with_stack([Type::int(1)]);
        insta::assert_snapshot!(state, @"stack: [Int=1] locals: L0:InitCell L1:Uninit");
        assert_eq!(state.iters, vec![Iter::Unknown]);
        assert!(state.without_stacks().stack.is_empty());
    }
}

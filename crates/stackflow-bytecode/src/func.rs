use std::fmt;
use std::sync::Arc;

use stackflow_types::ClassRef;

use crate::id::{BlockId, LocalId};
use crate::op::Op;

bitflags::bitflags! {
    /// Function attributes the interpreter consults.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct FuncAttrs: u32 {
        /// Checks the memo cache and forwards to the memoized implementation.
        const MEMOIZE_WRAPPER = 1 << 0;
        /// The implementation behind a memoize wrapper.
        const MEMOIZE_IMPL = 1 << 1;
        const CLOSURE_BODY = 1 << 2;
        const STATIC = 1 << 3;
        const ASYNC = 1 << 4;
        /// The top-level code of a file. Every local may be touched by name.
        const PSEUDO_MAIN = 1 << 5;
    }
}

/// A declared parameter or return type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TypeConstraint {
    name: Option<Arc<str>>,
    nullable: bool,
    soft: bool,
    this: bool,
}

impl TypeConstraint {
    /// No constraint.
    pub fn none() -> Self {
        Self::default()
    }

    /// A constraint by type or class name, e.g. `int` or `Foo`.
    pub fn named(name: &str) -> Self {
        TypeConstraint {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// The `this` return constraint.
    pub fn this() -> Self {
        TypeConstraint {
            name: Some("this".into()),
            this: true,
            ..Self::default()
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// A soft constraint only warns on mismatch.
    pub fn soft(mut self) -> Self {
        self.soft = true;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn has_constraint(&self) -> bool {
        self.name.is_some()
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_soft(&self) -> bool {
        self.soft
    }

    pub fn is_this(&self) -> bool {
        self.this
    }
}

impl fmt::Display for TypeConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(name) = &self.name else {
            return f.write_str("<none>");
        };
        if self.soft {
            f.write_str("@")?;
        }
        if self.nullable {
            f.write_str("?")?;
        }
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub name: Arc<str>,
    pub constraint: TypeConstraint,
}

impl Param {
    pub fn new(name: &str, constraint: TypeConstraint) -> Self {
        Param {
            name: name.into(),
            constraint,
        }
    }

    pub fn untyped(name: &str) -> Self {
        Self::new(name, TypeConstraint::none())
    }
}

/// A basic block: straight-line instructions with an optional fallthrough
/// successor and the exception handlers covering it.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub ops: Vec<Op>,
    pub fallthrough: Option<BlockId>,
    pub factored_exits: Vec<BlockId>,
}

#[bon::bon]
impl Block {
    #[builder]
    pub fn new(
        #[builder(into)] id: BlockId,
        #[builder(default)] ops: Vec<Op>,
        #[builder(into)] fallthrough: Option<BlockId>,
        #[builder(default)] factored_exits: Vec<BlockId>,
    ) -> Self {
        Block {
            id,
            ops,
            fallthrough,
            factored_exits,
        }
    }
}

/// A function body as the interpreter sees it.
///
/// Locals are numbered parameters first, then named locals, then unnamed
/// temporaries.
#[derive(Clone, Debug)]
pub struct Function {
    pub name: Arc<str>,
    pub cls: Option<ClassRef>,
    pub params: Vec<Param>,
    pub ret_constraint: TypeConstraint,
    pub attrs: FuncAttrs,
    pub num_iters: u32,
    pub num_cls_ref_slots: u32,
    pub blocks: Vec<Block>,
    local_names: Vec<Option<Arc<str>>>,
}

#[bon::bon]
impl Function {
    #[builder]
    pub fn new(
        #[builder(into)] name: Arc<str>,
        cls: Option<ClassRef>,
        #[builder(default)] params: Vec<Param>,
        /// Named locals besides the parameters.
        #[builder(default)]
        locals: Vec<Arc<str>>,
        /// Unnamed temporaries after the named locals.
        #[builder(default)]
        temps: u32,
        #[builder(default)] ret_constraint: TypeConstraint,
        #[builder(default)] attrs: FuncAttrs,
        #[builder(default)] num_iters: u32,
        #[builder(default)] num_cls_ref_slots: u32,
        #[builder(default)] blocks: Vec<Block>,
    ) -> Self {
        let local_names = params
            .iter()
            .map(|p| Some(p.name.clone()))
            .chain(locals.into_iter().map(Some))
            .chain((0..temps).map(|_| None))
            .collect();
        Function {
            name,
            cls,
            params,
            ret_constraint,
            attrs,
            num_iters,
            num_cls_ref_slots,
            blocks,
            local_names,
        }
    }
}

impl Function {
    pub fn num_locals(&self) -> usize {
        self.local_names.len()
    }

    pub fn local_name(&self, l: LocalId) -> Option<&str> {
        self.local_names.get(l.index())?.as_deref()
    }

    /// The local named `name`, if any.
    pub fn find_local(&self, name: &str) -> Option<LocalId> {
        self.local_names
            .iter()
            .position(|n| n.as_deref() == Some(name))
            .map(|i| LocalId::new(i as u32))
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.index()).filter(|b| b.id == id)
    }

    pub fn is_memoize_wrapper(&self) -> bool {
        self.attrs.contains(FuncAttrs::MEMOIZE_WRAPPER)
    }

    pub fn is_memoize_impl(&self) -> bool {
        self.attrs.contains(FuncAttrs::MEMOIZE_IMPL)
    }

    pub fn is_closure_body(&self) -> bool {
        self.attrs.contains(FuncAttrs::CLOSURE_BODY)
    }

    pub fn is_static(&self) -> bool {
        self.attrs.contains(FuncAttrs::STATIC)
    }

    /// Whether locals may be accessed by name from outside the function body.
    pub fn is_volatile_local(&self, _l: LocalId) -> bool {
        self.attrs.contains(FuncAttrs::PSEUDO_MAIN)
    }

    /// Name of the implementation a memoize wrapper forwards to.
    pub fn memoize_impl_name(&self) -> String {
        format!("{}$memoize_impl", self.name)
    }

    /// Skip over blocks that do nothing but fall through.
    pub fn next_real_block(&self, mut id: BlockId) -> BlockId {
        for _ in 0..self.blocks.len() {
            let Some(blk) = self.block(id) else { break };
            let empty = blk
                .ops
                .iter()
                .all(|op| matches!(op, Op::Nop | Op::Jmp(_) | Op::JmpNS(_)));
            match blk.fallthrough {
                Some(next) if empty => id = next,
                _ => break,
            }
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func(blocks: Vec<Block>) -> Function {
        Function::builder()
            .name("f")
            .params(vec![Param::untyped("x")])
            .locals(vec!["y".into()])
            .temps(1)
            .blocks(blocks)
            .build()
    }

    #[test]
    fn locals_are_numbered_params_first() {
        let f = func(vec![]);
        assert_eq!(f.num_locals(), 3);
        assert_eq!(f.local_name(LocalId::new(0)), Some("x"));
        assert_eq!(f.find_local("y"), Some(LocalId::new(1)));
        assert_eq!(f.local_name(LocalId::new(2)), None);
    }

    #[test]
    fn next_real_block_skips_empty_chains() {
        let f = func(vec![
            Block::builder()
                .id(BlockId::new(0))
                .ops(vec![Op::Int(1), Op::RetC])
                .build(),
            Block::builder()
                .id(BlockId::new(1))
                .ops(vec![Op::Nop])
                .fallthrough(BlockId::new(2))
                .build(),
            Block::builder()
                .id(BlockId::new(2))
                .ops(vec![Op::Jmp(BlockId::new(0))])
                .fallthrough(BlockId::new(0))
                .build(),
        ]);
        assert_eq!(f.next_real_block(BlockId::new(1)), BlockId::new(0));
        assert_eq!(f.next_real_block(BlockId::new(0)), BlockId::new(0));
    }

    #[test]
    fn constraint_rendering() {
        assert_eq!(TypeConstraint::named("int").nullable().to_string(), "?int");
        assert_eq!(TypeConstraint::named("Foo").soft().to_string(), "@Foo");
        assert_eq!(TypeConstraint::none().to_string(), "<none>");
    }
}

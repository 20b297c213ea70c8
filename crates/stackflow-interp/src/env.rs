use stackflow_bytecode::{Block, BlockId, ClsRefSlotId, Function, IterId, LocalId};
use stackflow_index::Index;
use stackflow_types::{ClassRef, Type, TypeBits};
use tracing::debug;

use crate::collect::CollectedInfo;
use crate::error::{InterpError, Result};
use crate::flags::EffectFlags;
use crate::options::{CollectionOpts, Options};
use crate::state::{ActRec, Iter, LocalStaticBinding, StackElem, StackEquiv, State};

/// Everything needed to interpret one block: the function it belongs to, the
/// whole-program index, the facts collected so far and the state on entry.
pub struct Interp<'a> {
    pub index: &'a dyn Index,
    pub func: &'a Function,
    pub blk: &'a Block,
    pub options: Options,
    pub collect: &'a mut CollectedInfo,
    pub state: State,
}

#[bon::bon]
impl<'a> Interp<'a> {
    /// Prepare the interpretation of block `block` of `func`.
    ///
    /// Without an explicit `state` the block starts from the function's entry
    /// state.
    #[builder]
    pub fn new(
        index: &'a dyn Index,
        func: &'a Function,
        #[builder(into)] block: BlockId,
        #[builder(default)] options: Options,
        collect: &'a mut CollectedInfo,
        state: Option<State>,
    ) -> Result<Self> {
        let blk = func.block(block).ok_or(InterpError::UnknownBlock(block))?;
        Ok(Interp {
            index,
            func,
            blk,
            options,
            collect,
            state: state.unwrap_or_else(|| State::entry(func)),
        })
    }
}

/// A place whose type a branch can refine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Location {
    Local(LocalId),
    /// The slot on top of the stack once the tested value is popped.
    StackTop,
}

impl Location {
    /// The location a stack slot with equivalence `equiv` stands for.
    pub(crate) fn of(equiv: StackEquiv) -> Option<Location> {
        match equiv {
            StackEquiv::None => None,
            StackEquiv::Local(l) => Some(Location::Local(l)),
            StackEquiv::Dup => Some(Location::StackTop),
        }
    }
}

/// The interpreter's view while one instruction runs: the block being
/// interpreted, the flags the instruction has raised so far and the sink for
/// states flowing to other blocks.
pub struct Env<'e, 'a> {
    pub interp: &'e mut Interp<'a>,
    pub flags: EffectFlags,
    propagate: &'e mut dyn FnMut(BlockId, &State),
}

impl<'e, 'a> Env<'e, 'a> {
    pub fn new(interp: &'e mut Interp<'a>, propagate: &'e mut dyn FnMut(BlockId, &State)) -> Self {
        Env {
            interp,
            flags: EffectFlags::default(),
            propagate,
        }
    }

    pub fn state(&mut self) -> &mut State {
        &mut self.interp.state
    }

    pub fn index(&self) -> &'a dyn Index {
        self.interp.index
    }

    pub fn func(&self) -> &'a Function {
        self.interp.func
    }

    pub fn options(&self) -> &Options {
        &self.interp.options
    }

    pub fn collect(&mut self) -> &mut CollectedInfo {
        &mut *self.interp.collect
    }

    pub fn block_id(&self) -> BlockId {
        self.interp.blk.id
    }

    // -- Flags ---------------------------------------------------------------

    pub fn nothrow(&mut self) {
        self.flags.was_pei = false;
    }

    pub fn effect_free(&mut self) {
        self.flags.was_pei = false;
        self.flags.effect_free = true;
    }

    pub fn constprop(&mut self) {
        self.flags.can_const_prop = true;
    }

    pub fn unreachable(&mut self) {
        if !self.interp.state.unreachable {
            debug!(block = %self.interp.blk.id, "state became unreachable");
        }
        self.interp.state.unreachable = true;
    }

    /// The instruction certainly branches to `target`.
    pub fn jmp_setdest(&mut self, target: BlockId) {
        self.flags.jmp_dest = Some(target);
    }

    /// The instruction certainly falls through.
    pub fn jmp_nevertaken(&mut self) {
        self.flags.jmp_dest = self.interp.blk.fallthrough;
    }

    pub fn propagate(&mut self, target: BlockId, state: &State) {
        (self.propagate)(target, state);
    }

    /// Send the current state along the edge to `target`.
    pub fn propagate_current(&mut self, target: BlockId) {
        (self.propagate)(target, &self.interp.state);
    }

    // -- Operand stack -------------------------------------------------------

    pub fn push(&mut self, ty: Type) {
        self.push_equiv(ty, StackEquiv::None);
    }

    pub fn push_equiv(&mut self, ty: Type, equiv: StackEquiv) {
        self.interp.state.stack.push(StackElem { ty, equiv });
    }

    pub fn pop_elem(&mut self) -> Result<StackElem> {
        self.interp
            .state
            .stack
            .pop()
            .ok_or(InterpError::StackUnderflow)
    }

    pub fn pop(&mut self) -> Result<Type> {
        self.pop_elem().map(|e| e.ty)
    }

    /// Pop a value as a cell: uninitialized values read as null.
    pub fn pop_c(&mut self) -> Result<Type> {
        self.pop().map(|t| t.to_cell())
    }

    /// Pop `n` values, returning them bottom-most first.
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Type>> {
        let len = self.interp.state.stack.len();
        if n > len {
            return Err(InterpError::StackUnderflow);
        }
        Ok(self
            .interp
            .state
            .stack
            .drain(len - n..)
            .map(|e| e.ty)
            .collect())
    }

    pub fn discard(&mut self, n: usize) -> Result<()> {
        self.pop_n(n).map(drop)
    }

    /// The element `depth` slots below the top.
    pub fn top_elem(&self, depth: usize) -> Result<&StackElem> {
        let stack = &self.interp.state.stack;
        stack
            .len()
            .checked_sub(depth + 1)
            .map(|i| &stack[i])
            .ok_or(InterpError::StackUnderflow)
    }

    pub fn top_t(&self, depth: usize) -> Result<&Type> {
        self.top_elem(depth).map(|e| &e.ty)
    }

    pub fn top_equiv(&self) -> Result<StackEquiv> {
        self.top_elem(0).map(|e| e.equiv)
    }

    /// The local the top of the stack is known to equal.
    pub fn top_local(&self) -> Option<LocalId> {
        match self.top_elem(0).ok()?.equiv {
            StackEquiv::Local(l) => Some(l),
            _ => None,
        }
    }

    fn top_mut(&mut self) -> Result<&mut StackElem> {
        self.interp
            .state
            .stack
            .last_mut()
            .ok_or(InterpError::StackUnderflow)
    }

    pub(crate) fn set_top_equiv(&mut self, equiv: StackEquiv) -> Result<()> {
        self.top_mut().map(|top| top.equiv = equiv)
    }

    // -- Locals --------------------------------------------------------------

    fn check_local(&self, l: LocalId) -> Result<()> {
        if l.index() < self.interp.state.locals.len() {
            Ok(())
        } else {
            Err(InterpError::LocalOutOfRange(l))
        }
    }

    fn is_volatile(&self, l: LocalId) -> bool {
        self.interp.func.is_volatile_local(l)
    }

    /// The stored type of a local, references included.
    pub fn loc_raw(&self, l: LocalId) -> Result<Type> {
        self.check_local(l)?;
        if self.is_volatile(l) {
            return Ok(Type::GEN);
        }
        Ok(self.interp.state.locals[l.index()].clone())
    }

    /// The type read from a local.
    pub fn loc_as_cell(&self, l: LocalId) -> Result<Type> {
        self.loc_raw(l).map(|t| t.to_cell())
    }

    pub fn loc_could_be_uninit(&self, l: LocalId) -> Result<bool> {
        self.loc_raw(l).map(|t| t.could_be_bits(TypeBits::UNINIT | TypeBits::REF))
    }

    pub fn may_read_local(&mut self, l: LocalId) {
        self.flags.may_read_locals.insert(l);
    }

    /// The instruction may read any local by name.
    pub fn read_unknown_locals(&mut self) {
        self.flags.may_read_locals.insert_all();
    }

    fn kill_stack_equiv(&mut self, l: LocalId) {
        for elem in &mut self.interp.state.stack {
            if elem.equiv == StackEquiv::Local(l) {
                elem.equiv = StackEquiv::None;
            }
        }
    }

    /// Store `stored` in a local on behalf of a write of `written`. The local
    /// no longer equals anything it was known to equal.
    fn write_local(&mut self, l: LocalId, stored: Type, written: &Type) -> Result<()> {
        self.check_local(l)?;
        self.interp.state.equiv.kill(l);
        self.kill_stack_equiv(l);
        if self.is_volatile(l) {
            return Ok(());
        }
        if self.interp.state.this_loc_to_kill == Some(l) {
            self.interp.state.this_loc_to_kill = None;
        }
        self.modify_local_static(l, written);
        self.interp.state.locals[l.index()] = stored;
        Ok(())
    }

    /// Overwrite the stored type of a local.
    pub fn set_loc_raw(&mut self, l: LocalId, t: Type) -> Result<()> {
        let written = t.clone();
        self.write_local(l, t, &written)
    }

    /// Assign a value to a local. Assigning through a reference leaves the
    /// local a reference.
    pub fn set_loc(&mut self, l: LocalId, t: Type) -> Result<()> {
        let raw = self.loc_raw(l)?;
        if raw.could_be_bits(TypeBits::REF) {
            let stored = if raw.subtype_of(&Type::REF) { raw } else { Type::GEN };
            return self.write_local(l, stored, &t);
        }
        self.set_loc_raw(l, t)
    }

    /// Narrow a local and everything known to equal it. Equivalences survive.
    pub(crate) fn refine_local(&mut self, l: LocalId, t: Type) -> Result<()> {
        self.check_local(l)?;
        if self.is_volatile(l) {
            return Ok(());
        }
        let state = &mut self.interp.state;
        if state.locals[l.index()].could_be_bits(TypeBits::REF) {
            return Ok(());
        }
        let members: Vec<LocalId> = std::iter::once(l).chain(state.equiv.members(l)).collect();
        for m in &members {
            state.locals[m.index()] = t.clone();
        }
        for elem in &mut state.stack {
            if let StackEquiv::Local(m) = elem.equiv {
                if members.contains(&m) {
                    elem.ty = elem.ty.intersect(&t);
                }
            }
        }
        Ok(())
    }

    /// Forget every local's type and equivalence.
    pub fn kill_locals(&mut self) {
        let state = &mut self.interp.state;
        state.locals.iter_mut().for_each(|t| *t = Type::GEN);
        state.equiv.clear();
        for elem in &mut state.stack {
            if matches!(elem.equiv, StackEquiv::Local(_)) {
                elem.equiv = StackEquiv::None;
            }
        }
        state.this_loc_to_kill = None;
    }

    pub fn add_loc_equiv(&mut self, l: LocalId, to: LocalId) {
        if !self.is_volatile(l) && !self.is_volatile(to) {
            self.interp.state.equiv.add(l, to);
        }
    }

    pub fn locs_are_equiv(&self, a: LocalId, b: LocalId) -> bool {
        self.interp.state.equiv.are_equiv(a, b)
    }

    // -- Branch refinement ---------------------------------------------------

    /// Apply `refine` to the type at `loc`. `false` when the refinement
    /// leaves no value.
    pub(crate) fn refine_at(&mut self, loc: Location, refine: &dyn Fn(&Type) -> Type) -> Result<bool> {
        match loc {
            Location::Local(l) => {
                let raw = self.loc_raw(l)?;
                if raw.could_be_bits(TypeBits::REF) {
                    return Ok(true);
                }
                let t = refine(&raw);
                if t.is_bottom() {
                    return Ok(false);
                }
                self.refine_local(l, t)?;
            }
            Location::StackTop => {
                let top = self.top_mut()?;
                let t = refine(&top.ty);
                if t.is_bottom() {
                    return Ok(false);
                }
                top.ty = t;
            }
        }
        Ok(true)
    }

    /// Split the state at a conditional branch to `target`: `taken` refines
    /// `loc` along the branch, `fallthrough` refines it for the instructions
    /// that follow.
    pub(crate) fn refine_location(
        &mut self,
        loc: Location,
        taken: &dyn Fn(&Type) -> Type,
        target: BlockId,
        fallthrough: &dyn Fn(&Type) -> Type,
    ) -> Result<()> {
        let before = self.interp.state.clone();
        let taken_reachable = self.refine_at(loc, taken)?;
        let taken_state = std::mem::replace(&mut self.interp.state, before.clone());
        let fallthrough_reachable = self.refine_at(loc, fallthrough)?;
        match (taken_reachable, fallthrough_reachable) {
            (true, true) => self.propagate(target, &taken_state),
            (true, false) => {
                self.interp.state = taken_state;
                self.jmp_setdest(target);
                self.propagate_current(target);
            }
            (false, true) => self.jmp_nevertaken(),
            (false, false) => {
                self.interp.state = before;
                self.unreachable();
            }
        }
        Ok(())
    }

    // -- Iterators -----------------------------------------------------------

    pub fn iter(&self, id: IterId) -> Result<&Iter> {
        self.interp
            .state
            .iters
            .get(id.index())
            .ok_or(InterpError::IterOutOfRange(id))
    }

    pub fn set_iter(&mut self, id: IterId, iter: Iter) -> Result<()> {
        let slot = self
            .interp
            .state
            .iters
            .get_mut(id.index())
            .ok_or(InterpError::IterOutOfRange(id))?;
        *slot = iter;
        Ok(())
    }

    pub fn free_iter(&mut self, id: IterId) -> Result<()> {
        self.set_iter(id, Iter::Unknown)
    }

    // -- Class-ref slots -----------------------------------------------------

    pub fn put_cls_ref(&mut self, slot: ClsRefSlotId, t: Type) -> Result<()> {
        let s = self
            .interp
            .state
            .cls_ref_slots
            .get_mut(slot.index())
            .ok_or(InterpError::ClsRefSlotOutOfRange(slot))?;
        *s = Some(t);
        Ok(())
    }

    pub fn peek_cls_ref(&self, slot: ClsRefSlotId) -> Result<&Type> {
        self.interp
            .state
            .cls_ref_slots
            .get(slot.index())
            .ok_or(InterpError::ClsRefSlotOutOfRange(slot))?
            .as_ref()
            .ok_or(InterpError::UntrackedClsRef(slot))
    }

    /// Read a class-ref slot, leaving it empty.
    pub fn take_cls_ref(&mut self, slot: ClsRefSlotId) -> Result<Type> {
        self.interp
            .state
            .cls_ref_slots
            .get_mut(slot.index())
            .ok_or(InterpError::ClsRefSlotOutOfRange(slot))?
            .take()
            .ok_or(InterpError::UntrackedClsRef(slot))
    }

    // -- Pending calls -------------------------------------------------------

    /// Whether a call to `ar`'s target may be evaluated at analysis time once
    /// its arguments are known.
    fn can_fold(&self, ar: &ActRec) -> bool {
        let interp = &*self.interp;
        if !interp.options.constant_fold_builtins
            || interp.collect.opts.contains(CollectionOpts::SPECULATING)
            || ar.fallback_func.is_some()
        {
            return false;
        }
        match ar.func.as_ref().and_then(|f| f.exact()) {
            Some(f) => f.is_foldable() && !interp.collect.is_unfoldable(f.name(), interp.blk.id),
            None => false,
        }
    }

    /// Push a pending call. Returns whether it was marked foldable.
    pub fn fpi_push(&mut self, mut ar: ActRec) -> bool {
        ar.foldable = self.can_fold(&ar);
        ar.push_block = self.interp.blk.id;
        let foldable = ar.foldable;
        if foldable {
            self.effect_free();
        }
        self.interp.state.fpi_stack.push(ar);
        foldable
    }

    pub fn fpi_pop(&mut self) -> Result<ActRec> {
        self.interp
            .state
            .fpi_stack
            .pop()
            .ok_or(InterpError::NoActRec)
    }

    pub fn fpi_top(&self) -> Result<&ActRec> {
        self.interp
            .state
            .fpi_stack
            .last()
            .ok_or(InterpError::NoActRec)
    }

    /// Record that the pending call on top of the fpi stack cannot be folded
    /// and have its push block analyzed again.
    pub(crate) fn fpi_not_foldable(&mut self) -> Result<()> {
        let ar = self
            .interp
            .state
            .fpi_stack
            .last_mut()
            .ok_or(InterpError::NoActRec)?;
        ar.foldable = false;
        let push_block = ar.push_block;
        if let Some(f) = ar.func.clone() {
            debug!(callee = %f, %push_block, "call is not foldable");
            self.interp
                .collect
                .unfoldable_funcs
                .insert((f.name().into(), push_block));
        }
        self.interp.collect.reanalyze.insert(push_block);
        Ok(())
    }

    // -- Object context ------------------------------------------------------

    pub fn self_cls(&self) -> Option<&'a ClassRef> {
        self.interp.func.cls.as_ref()
    }

    pub fn self_cls_exact(&self) -> Option<Type> {
        self.self_cls().map(|c| Type::cls_exact(c.clone()))
    }

    pub fn self_cls_sub(&self) -> Option<Type> {
        self.self_cls().map(|c| Type::cls_sub(c.clone()))
    }

    pub fn parent_cls_exact(&self) -> Option<Type> {
        self.self_cls()
            .and_then(ClassRef::parent)
            .map(|c| Type::cls_exact(c.clone()))
    }

    /// The type `$this` has when it is set.
    pub fn this_type(&self) -> Option<Type> {
        if self.interp.func.is_static() {
            return None;
        }
        self.self_cls().map(|c| {
            if c.could_be_overridden() {
                Type::obj_sub(c.clone())
            } else {
                Type::obj_exact(c.clone())
            }
        })
    }

    pub fn set_this_available(&mut self) -> Result<()> {
        self.interp.state.this_available = true;
        let Some(l) = self.interp.state.this_loc_to_kill else {
            return Ok(());
        };
        let this = self.this_type().unwrap_or(Type::OBJ);
        let t = self.loc_raw(l)?;
        if !t.could_be_bits(TypeBits::REF) && this.subtype_of(&t) {
            self.interp.state.locals[l.index()] = this;
        }
        Ok(())
    }

    // -- Function statics ----------------------------------------------------

    fn binding(&self, l: LocalId) -> LocalStaticBinding {
        self.interp
            .state
            .local_static_bindings
            .get(l.index())
            .copied()
            .unwrap_or_default()
    }

    fn set_binding(&mut self, l: LocalId, b: LocalStaticBinding) {
        let bindings = &mut self.interp.state.local_static_bindings;
        if bindings.len() <= l.index() {
            bindings.resize(l.index() + 1, LocalStaticBinding::NotBound);
        }
        bindings[l.index()] = b;
    }

    /// A write of `t` to a local that may be bound to its function-static.
    pub(crate) fn modify_local_static(&mut self, l: LocalId, t: &Type) {
        if self.is_volatile(l) || self.binding(l) == LocalStaticBinding::NotBound {
            return;
        }
        if *t == Type::UNINIT {
            self.set_binding(l, LocalStaticBinding::NotBound);
            return;
        }
        self.interp.collect.widen_local_static(l, t);
    }

    pub(crate) fn bind_local_static(&mut self, l: LocalId, t: &Type) {
        if self.is_volatile(l) {
            return;
        }
        self.set_binding(l, LocalStaticBinding::Bound);
        self.modify_local_static(l, t);
    }

    pub(crate) fn maybe_bind_local_static(&mut self, l: LocalId) {
        if !self.is_volatile(l) {
            self.set_binding(l, LocalStaticBinding::MaybeBound);
        }
    }

    pub(crate) fn unbind_local_static(&mut self, l: LocalId) {
        self.modify_local_static(l, &Type::UNINIT);
    }

    /// Record that the instruction relied on the collected type of `l`'s
    /// function-static.
    pub(crate) fn use_local_static(&mut self, l: LocalId) {
        let t = self
            .interp
            .collect
            .local_static_type(l)
            .cloned()
            .unwrap_or(Type::BOTTOM);
        self.flags
            .used_local_statics
            .get_or_insert_with(Default::default)
            .entry(l)
            .or_insert(t);
    }
}

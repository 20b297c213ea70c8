use stackflow_bytecode::LocalId;

/// Partition of the locals into classes of provably equal values.
///
/// Each local carries the id of its class, or `None` when it is known to be
/// equal to no other local. A class always has at least two members.
#[derive(Clone, Debug, Default)]
pub struct LocalEquiv {
    classes: Vec<Option<u32>>,
    next_class: u32,
}

impl LocalEquiv {
    pub fn new(num_locals: usize) -> Self {
        Self {
            classes: vec![None; num_locals],
            next_class: 0,
        }
    }

    fn class_of(&self, l: LocalId) -> Option<u32> {
        self.classes.get(l.index()).copied().flatten()
    }

    /// Whether `a` and `b` are distinct locals known to hold equal values.
    pub fn are_equiv(&self, a: LocalId, b: LocalId) -> bool {
        a != b && self.class_of(a).is_some_and(|c| self.class_of(b) == Some(c))
    }

    pub fn has_equiv(&self, l: LocalId) -> bool {
        self.class_of(l).is_some()
    }

    /// The other members of `l`'s class, in ascending order.
    pub fn members(&self, l: LocalId) -> impl Iterator<Item = LocalId> + '_ {
        let class = self.class_of(l);
        self.classes
            .iter()
            .enumerate()
            .filter(move |(i, c)| class.is_some() && **c == class && *i != l.index())
            .map(|(i, _)| LocalId::new(i as u32))
    }

    /// The member of `l`'s class following `l`, wrapping around to the
    /// smallest member; `None` when `l` has no equivalents.
    pub fn find_equiv(&self, l: LocalId) -> Option<LocalId> {
        let mut members = self.members(l).peekable();
        let first = *members.peek()?;
        Some(members.find(|m| *m > l).unwrap_or(first))
    }

    /// Record that `l` now holds the same value as `to`. Any previous
    /// equivalence of `l` is dropped.
    pub fn add(&mut self, l: LocalId, to: LocalId) {
        if l == to || l.index() >= self.classes.len() || to.index() >= self.classes.len() {
            return;
        }
        self.kill(l);
        let class = match self.class_of(to) {
            Some(c) => c,
            None => {
                let c = self.next_class;
                self.next_class += 1;
                self.classes[to.index()] = Some(c);
                c
            }
        };
        self.classes[l.index()] = Some(class);
    }

    /// Remove `l` from its class, dissolving the class if one member is
    /// left.
    pub fn kill(&mut self, l: LocalId) {
        let Some(class) = self.class_of(l) else { return };
        self.classes[l.index()] = None;
        let mut rest = self
            .classes
            .iter_mut()
            .filter(|c| **c == Some(class))
            .collect::<Vec<_>>();
        if let [only] = rest.as_mut_slice() {
            **only = None;
        }
    }

    pub fn clear(&mut self) {
        self.classes.iter_mut().for_each(|c| *c = None);
    }

    pub fn is_empty(&self) -> bool {
        self.classes.iter().all(Option::is_none)
    }

    /// Each local mapped to the smallest member of its class.
    fn canonical(&self) -> Vec<Option<usize>> {
        let mut first_of = rustc_hash::FxHashMap::default();
        self.classes
            .iter()
            .enumerate()
            .map(|(i, c)| c.map(|c| *first_of.entry(c).or_insert(i)))
            .collect()
    }
}

impl PartialEq for LocalEquiv {
    fn eq(&self, other: &Self) -> bool {
        self.classes.len() == other.classes.len() && self.canonical() == other.canonical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l(i: u32) -> LocalId {
        LocalId::new(i)
    }

    #[test]
    fn add_joins_existing_class() {
        let mut eq = LocalEquiv::new(4);
        eq.add(l(1), l(0));
        eq.add(l(2), l(0));
        assert!(eq.are_equiv(l(1), l(2)));
        assert_eq!(eq.members(l(0)).collect::<Vec<_>>(), vec![l(1), l(2)]);
        assert!(!eq.are_equiv(l(0), l(0)));
    }

    #[test]
    fn kill_dissolves_pairs() {
        let mut eq = LocalEquiv::new(3);
        eq.add(l(1), l(0));
        eq.kill(l(0));
        assert!(!eq.has_equiv(l(1)));
        assert!(eq.is_empty());
    }

    #[test]
    fn find_equiv_cycles_through_members() {
        let mut eq = LocalEquiv::new(4);
        eq.add(l(3), l(1));
        eq.add(l(0), l(1));
        assert_eq!(eq.find_equiv(l(0)), Some(l(1)));
        assert_eq!(eq.find_equiv(l(1)), Some(l(3)));
        assert_eq!(eq.find_equiv(l(3)), Some(l(0)));
        assert_eq!(eq.find_equiv(l(2)), None);
    }

    #[test]
    fn equality_ignores_class_numbering() {
        let mut a = LocalEquiv::new(3);
        a.add(l(1), l(0));
        let mut b = LocalEquiv::new(3);
        b.add(l(2), l(0));
        b.kill(l(2));
        b.add(l(0), l(1));
        assert_eq!(a, b);
    }
}

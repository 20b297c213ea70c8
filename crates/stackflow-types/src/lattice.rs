/// A join-semilattice with a meet and a partial order.
///
/// Implementations must keep `is_subseteq` consistent with `join` and `meet`:
/// `a ⊑ b` exactly when `a ⊔ b == b` and `a ⊓ b == a`.
pub trait Lattice {
    fn join(&self, other: &Self) -> Self;
    fn meet(&self, other: &Self) -> Self;
    fn is_subseteq(&self, other: &Self) -> bool;
}

pub trait HasBottom: Lattice {
    fn bottom() -> Self;
}

pub trait HasTop: Lattice {
    fn top() -> Self;
}

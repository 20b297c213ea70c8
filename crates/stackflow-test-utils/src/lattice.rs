//! Assertions for the algebraic laws of a [`Lattice`].
//!
//! Every check runs over all pairs (and, for associativity, triples) of the
//! sample elements. Violations are gathered first and reported in one panic,
//! so a broken lattice shows every failing law at once.
//!
//! ```
//! use stackflow_test_utils::lattice::assert_finite_lattice_laws;
//! use stackflow_types::Type;
//!
//! assert_finite_lattice_laws(&[Type::INT, Type::int(1), Type::STR, Type::INIT_NULL]);
//! ```

use std::fmt::{Debug, Write};

use stackflow_types::{HasBottom, HasTop, Lattice};

/// Violations gathered over one set of samples.
struct Laws<'s, L> {
    samples: &'s [L],
    violations: Vec<String>,
}

impl<'s, L: Lattice + PartialEq + Debug> Laws<'s, L> {
    fn over(samples: &'s [L]) -> Self {
        Laws {
            samples,
            violations: Vec::new(),
        }
    }

    fn fail(&mut self, msg: String) {
        self.violations.push(msg);
    }

    fn operation(&mut self, name: &str, op: fn(&L, &L) -> L) -> &mut Self {
        let samples = self.samples;
        for a in samples {
            if op(a, a) != *a {
                self.fail(format!("{name} not idempotent on {a:?}"));
            }
            for b in samples {
                let ab = op(a, b);
                if ab != op(b, a) {
                    self.fail(format!("{name} not commutative on {a:?}, {b:?}"));
                }
                for c in samples {
                    if op(&ab, c) != op(a, &op(b, c)) {
                        self.fail(format!("{name} not associative on {a:?}, {b:?}, {c:?}"));
                    }
                }
            }
        }
        self
    }

    fn join(&mut self) -> &mut Self {
        self.operation("join", L::join)
    }

    fn meet(&mut self) -> &mut Self {
        self.operation("meet", L::meet)
    }

    fn absorption(&mut self) -> &mut Self {
        let samples = self.samples;
        for a in samples {
            for b in samples {
                if a.join(&a.meet(b)) != *a {
                    self.fail(format!("{a:?} join ({a:?} meet {b:?}) is not {a:?}"));
                }
                if a.meet(&a.join(b)) != *a {
                    self.fail(format!("{a:?} meet ({a:?} join {b:?}) is not {a:?}"));
                }
            }
        }
        self
    }

    fn ordering(&mut self) -> &mut Self {
        let samples = self.samples;
        for a in samples {
            for b in samples {
                let sub = a.is_subseteq(b);
                if sub != (a.join(b) == *b) {
                    self.fail(format!(
                        "{a:?} <= {b:?} is {sub} but their join disagrees"
                    ));
                }
                if sub != (a.meet(b) == *a) {
                    self.fail(format!(
                        "{a:?} <= {b:?} is {sub} but their meet disagrees"
                    ));
                }
            }
        }
        self
    }

    fn all(&mut self) -> &mut Self {
        self.join().meet().absorption().ordering()
    }

    fn report(&self) {
        if self.violations.is_empty() {
            return;
        }
        let mut msg = format!("{} lattice law violation(s):\n", self.violations.len());
        for (i, v) in self.violations.iter().enumerate() {
            let _ = writeln!(msg, "  {}. {v}", i + 1);
        }
        panic!("{msg}");
    }
}

impl<L: HasBottom + PartialEq + Debug> Laws<'_, L> {
    fn bottom(&mut self) -> &mut Self {
        let bot = L::bottom();
        for x in self.samples {
            if !bot.is_subseteq(x) {
                self.violations.push(format!("bottom is not below {x:?}"));
            }
            if bot.join(x) != *x {
                self.violations.push(format!("bottom join {x:?} is not {x:?}"));
            }
            if bot.meet(x) != bot {
                self.violations.push(format!("bottom meet {x:?} is not bottom"));
            }
        }
        self
    }
}

impl<L: HasTop + PartialEq + Debug> Laws<'_, L> {
    fn top(&mut self) -> &mut Self {
        let top = L::top();
        for x in self.samples {
            if !x.is_subseteq(&top) {
                self.violations.push(format!("{x:?} is not below top"));
            }
            if top.join(x) != top {
                self.violations.push(format!("top join {x:?} is not top"));
            }
            if top.meet(x) != *x {
                self.violations.push(format!("top meet {x:?} is not {x:?}"));
            }
        }
        self
    }
}

/// `join` is idempotent, commutative and associative over `samples`.
pub fn assert_join_laws<L: Lattice + PartialEq + Debug>(samples: &[L]) {
    Laws::over(samples).join().report();
}

/// `meet` is idempotent, commutative and associative over `samples`.
pub fn assert_meet_laws<L: Lattice + PartialEq + Debug>(samples: &[L]) {
    Laws::over(samples).meet().report();
}

/// `a ⊔ (a ⊓ b) == a` and `a ⊓ (a ⊔ b) == a` for every pair.
pub fn assert_absorption<L: Lattice + PartialEq + Debug>(samples: &[L]) {
    Laws::over(samples).absorption().report();
}

/// `a ⊑ b` holds exactly when `a ⊔ b == b`, and exactly when `a ⊓ b == a`.
pub fn assert_ordering_consistent<L: Lattice + PartialEq + Debug>(samples: &[L]) {
    Laws::over(samples).ordering().report();
}

/// Every law above, reported together.
pub fn assert_lattice_laws<L: Lattice + PartialEq + Debug>(samples: &[L]) {
    Laws::over(samples).all().report();
}

pub fn assert_bottom_laws<L: HasBottom + PartialEq + Debug>(samples: &[L]) {
    Laws::over(samples).bottom().report();
}

pub fn assert_top_laws<L: HasTop + PartialEq + Debug>(samples: &[L]) {
    Laws::over(samples).top().report();
}

/// [`assert_lattice_laws`] plus the bottom and top laws against every sample.
pub fn assert_finite_lattice_laws<L: HasBottom + HasTop + PartialEq + Debug>(samples: &[L]) {
    Laws::over(samples).all().bottom().top().report();
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The four-element diamond: `Lo < A, B < Hi`.
    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Diamond {
        Lo,
        A,
        B,
        Hi,
    }

    impl Lattice for Diamond {
        fn join(&self, other: &Self) -> Self {
            use Diamond::*;
            match (*self, *other) {
                (Lo, x) | (x, Lo) => x,
                (x, y) if x == y => x,
                _ => Hi,
            }
        }

        fn meet(&self, other: &Self) -> Self {
            use Diamond::*;
            match (*self, *other) {
                (Hi, x) | (x, Hi) => x,
                (x, y) if x == y => x,
                _ => Lo,
            }
        }

        fn is_subseteq(&self, other: &Self) -> bool {
            self.join(other) == *other
        }
    }

    impl HasBottom for Diamond {
        fn bottom() -> Self {
            Diamond::Lo
        }
    }

    impl HasTop for Diamond {
        fn top() -> Self {
            Diamond::Hi
        }
    }

    #[test]
    fn diamond_is_a_lattice() {
        use Diamond::*;
        assert_finite_lattice_laws(&[Lo, A, B, Hi]);
    }

    #[test]
    #[should_panic(expected = "not commutative")]
    fn reports_broken_join() {
        #[derive(Debug, PartialEq)]
        struct Left(u8);
        impl Lattice for Left {
            fn join(&self, _: &Self) -> Self {
                Left(self.0)
            }
            fn meet(&self, _: &Self) -> Self {
                Left(self.0)
            }
            fn is_subseteq(&self, other: &Self) -> bool {
                self == other
            }
        }
        assert_join_laws(&[Left(0), Left(1)]);
    }
}

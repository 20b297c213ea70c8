use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Debug)]
struct ClassInfo {
    name: Arc<str>,
    parent: Option<ClassRef>,
    interfaces: Vec<ClassRef>,
    is_interface: bool,
    is_final: bool,
}

/// A resolved class. Identity is the class name.
#[derive(Clone)]
pub struct ClassRef(Arc<ClassInfo>);

#[bon::bon]
impl ClassRef {
    /// Declare a class.
    ///
    /// ```ignore
    /// let base = ClassRef::declare().name("Base").new();
    /// let leaf = ClassRef::declare().name("Leaf").parent(base).is_final(true).new();
    /// ```
    #[builder(finish_fn = new)]
    pub fn declare(
        #[builder(into)] name: Arc<str>,
        parent: Option<ClassRef>,
        #[builder(default)] interfaces: Vec<ClassRef>,
        #[builder(default)] is_interface: bool,
        #[builder(default)] is_final: bool,
    ) -> ClassRef {
        ClassRef(Arc::new(ClassInfo {
            name,
            parent,
            interfaces,
            is_interface,
            is_final,
        }))
    }
}

impl ClassRef {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn parent(&self) -> Option<&ClassRef> {
        self.0.parent.as_ref()
    }

    pub fn is_interface(&self) -> bool {
        self.0.is_interface
    }

    /// Whether a subclass may exist.
    pub fn could_be_overridden(&self) -> bool {
        !self.0.is_final
    }

    /// Proper ancestors along the parent chain, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = &ClassRef> {
        std::iter::successors(self.parent(), |c| c.parent())
    }

    /// Reflexive, transitive subclass test through parents and interfaces.
    pub fn subclass_of(&self, other: &ClassRef) -> bool {
        if self == other {
            return true;
        }
        if let Some(parent) = self.parent() {
            if parent.subclass_of(other) {
                return true;
            }
        }
        self.0.interfaces.iter().any(|i| i.subclass_of(other))
    }
}

impl PartialEq for ClassRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name
    }
}

impl Eq for ClassRef {}

impl Hash for ClassRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Display for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subclass_through_parents_and_interfaces() {
        let iface = ClassRef::declare().name("I").is_interface(true).new();
        let base = ClassRef::declare().name("Base").interfaces(vec![iface.clone()]).new();
        let leaf = ClassRef::declare().name("Leaf").parent(base.clone()).new();

        assert!(leaf.subclass_of(&base));
        assert!(leaf.subclass_of(&iface));
        assert!(!base.subclass_of(&leaf));
        assert_eq!(leaf.ancestors().map(|c| c.name()).collect::<Vec<_>>(), ["Base"]);
    }
}

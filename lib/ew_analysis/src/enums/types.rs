//! Sets of types a register may hold.

use ew_ir::types::{TypeId, TypeTable};
use std::collections::BTreeSet;
use std::fmt;

/// The type-set lattice: the concrete types that may flow into a register.
///
/// Join is set union and the empty set is the neutral element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EnumTypes(BTreeSet<TypeId>);

impl EnumTypes {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn singleton(type_: TypeId) -> Self {
        Self(BTreeSet::from([type_]))
    }

    /// Returns the union of both sets.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self(self.0.union(&other.0).copied().collect())
    }

    /// In place union.
    pub fn join_with(&mut self, other: &Self) {
        self.0.extend(other.0.iter().copied());
    }

    pub fn add(&mut self, type_: TypeId) {
        self.0.insert(type_);
    }

    #[must_use]
    pub fn contains(&self, type_: TypeId) -> bool {
        self.0.contains(&type_)
    }

    /// Elements in increasing handle order.
    pub fn elements(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.0.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drops the primitive types, that are irrelevant to consistency checks.
    #[must_use]
    pub fn without_primitives(&self, types: &TypeTable) -> Self {
        Self(
            self.0
                .iter()
                .copied()
                .filter(|t| !types.is_primitive(*t))
                .collect(),
        )
    }

    /// Returns the single element of the set, if it has exactly one.
    #[must_use]
    pub fn single(&self) -> Option<TypeId> {
        if self.0.len() == 1 {
            self.0.first().copied()
        } else {
            None
        }
    }
}

impl FromIterator<TypeId> for EnumTypes {
    fn from_iter<I: IntoIterator<Item = TypeId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for EnumTypes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, t) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{t}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_laws() {
        let a = EnumTypes::singleton(TypeId::JAVA_LANG_STRING);
        let b = EnumTypes::singleton(TypeId::JAVA_LANG_CLASS);
        let c = EnumTypes::singleton(TypeId::INT);

        assert_eq!(a.union(&b), b.union(&a));
        assert_eq!(a.union(&b).union(&c), a.union(&b.union(&c)));
        assert_eq!(a.union(&a), a);
        assert_eq!(a.union(&EnumTypes::empty()), a);

        let mut d = a.clone();
        d.join_with(&b);
        assert_eq!(d, a.union(&b));
        assert_eq!(d.len(), 2);
        assert!(d.contains(TypeId::JAVA_LANG_CLASS));
        assert_eq!(d.single(), None);
        assert_eq!(a.single(), Some(TypeId::JAVA_LANG_STRING));
    }

    #[test]
    fn discard_primitives() {
        let types = TypeTable::new();
        let set: EnumTypes = [TypeId::INT, TypeId::JAVA_LANG_STRING, TypeId::VOID]
            .into_iter()
            .collect();
        let objects = set.without_primitives(&types);
        assert_eq!(objects.elements().collect::<Vec<_>>(), vec![TypeId::JAVA_LANG_STRING]);
        assert_eq!(set.to_string(), "{#0, #5, #10}");
    }
}

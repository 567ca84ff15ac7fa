//! Abstract environments of the enum type analysis.

use crate::enums::types::EnumTypes;
use ew_ir::registers::Reg;
use std::collections::BTreeMap;
use std::fmt;

/// Mapping from registers to the types they may hold at a program point.
///
/// The bottom environment denotes unreachable points. Registers without a binding hold
/// no type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumTypeEnvironment {
    registers: BTreeMap<Reg, EnumTypes>,
    bottom: bool,
}

impl Default for EnumTypeEnvironment {
    fn default() -> Self {
        Self::top()
    }
}

impl EnumTypeEnvironment {
    /// The environment of reachable points without any binding.
    #[must_use]
    pub fn top() -> Self {
        Self {
            registers: BTreeMap::new(),
            bottom: false,
        }
    }

    #[must_use]
    pub fn bottom() -> Self {
        Self {
            registers: BTreeMap::new(),
            bottom: true,
        }
    }

    #[must_use]
    pub const fn is_bottom(&self) -> bool {
        self.bottom
    }

    #[must_use]
    pub fn get(&self, reg: Reg) -> EnumTypes {
        self.registers.get(&reg).cloned().unwrap_or_default()
    }

    /// Binds a register, unbinding it when given the empty set.
    pub fn set(&mut self, reg: Reg, types: EnumTypes) {
        if self.bottom {
            return;
        }
        if types.is_empty() {
            self.registers.remove(&reg);
        } else {
            self.registers.insert(reg, types);
        }
    }

    /// Binds the first register of a pair and clears the second one.
    pub fn set_wide(&mut self, reg: Reg, types: EnumTypes) {
        self.set(reg, types);
        if reg != Reg::RESULT {
            self.set(reg.next(), EnumTypes::empty());
        }
    }

    /// Pointwise union.
    pub fn join(&mut self, other: &Self) {
        if other.bottom {
            return;
        }
        if self.bottom {
            *self = other.clone();
            return;
        }
        for (reg, types) in &other.registers {
            self.registers
                .entry(*reg)
                .or_default()
                .join_with(types);
        }
    }

    /// Bound registers, the result register being the last one.
    pub fn iter(&self) -> impl Iterator<Item = (Reg, &EnumTypes)> {
        self.registers.iter().map(|(reg, types)| (*reg, types))
    }
}

impl fmt::Display for EnumTypeEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.bottom {
            return write!(f, "_|_");
        }
        for (i, (reg, types)) in self.registers.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{reg}: {types}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ew_ir::types::TypeId;

    #[test]
    fn get_set() {
        let v0 = Reg::from(0u16);
        let v1 = Reg::from(1u16);
        let mut env = EnumTypeEnvironment::top();
        assert!(env.get(v0).is_empty());

        env.set(v0, EnumTypes::singleton(TypeId::JAVA_LANG_STRING));
        env.set(v1, EnumTypes::singleton(TypeId::JAVA_LANG_CLASS));
        assert_eq!(env.get(v0), EnumTypes::singleton(TypeId::JAVA_LANG_STRING));

        env.set_wide(v0, EnumTypes::empty());
        assert!(env.get(v0).is_empty());
        assert!(env.get(v1).is_empty());
        assert_eq!(env, EnumTypeEnvironment::top());

        env.set_wide(Reg::RESULT, EnumTypes::singleton(TypeId::LONG));
        assert_eq!(env.get(Reg::RESULT), EnumTypes::singleton(TypeId::LONG));
    }

    #[test]
    fn bottom() {
        let v0 = Reg::from(0u16);
        let mut env = EnumTypeEnvironment::bottom();
        env.set(v0, EnumTypes::singleton(TypeId::JAVA_LANG_STRING));
        assert!(env.is_bottom());
        assert!(env.get(v0).is_empty());
        assert_eq!(env.to_string(), "_|_");

        let mut reachable = EnumTypeEnvironment::top();
        reachable.set(v0, EnumTypes::singleton(TypeId::JAVA_LANG_STRING));
        env.join(&reachable);
        assert_eq!(env, reachable);

        let before = reachable.clone();
        reachable.join(&EnumTypeEnvironment::bottom());
        assert_eq!(reachable, before);
    }

    #[test]
    fn pointwise_join() {
        let v0 = Reg::from(0u16);
        let v1 = Reg::from(1u16);
        let mut left = EnumTypeEnvironment::top();
        left.set(v0, EnumTypes::singleton(TypeId::JAVA_LANG_STRING));
        let mut right = EnumTypeEnvironment::top();
        right.set(v0, EnumTypes::singleton(TypeId::JAVA_LANG_CLASS));
        right.set(v1, EnumTypes::singleton(TypeId::JAVA_LANG_ENUM));

        left.join(&right);
        assert_eq!(
            left.get(v0),
            [TypeId::JAVA_LANG_STRING, TypeId::JAVA_LANG_CLASS]
                .into_iter()
                .collect()
        );
        assert_eq!(left.get(v1), EnumTypes::singleton(TypeId::JAVA_LANG_ENUM));
        assert_eq!(left.to_string(), "v0: {#10, #11}\nv1: {#12}");
    }
}

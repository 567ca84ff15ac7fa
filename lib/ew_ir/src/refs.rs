//! Symbolic references to methods and fields, as found in instruction operands.

use crate::types::{TypeId, TypeTable};
use crate::PrettyPrint;
use std::fmt;

/// A method prototype: return type and parameters types.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Proto {
    return_type: TypeId,
    parameters: Vec<TypeId>,
}

impl Proto {
    #[must_use]
    pub fn new(return_type: TypeId, parameters: Vec<TypeId>) -> Self {
        Self {
            return_type,
            parameters,
        }
    }

    #[inline]
    #[must_use]
    pub const fn return_type(&self) -> TypeId {
        self.return_type
    }

    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &[TypeId] {
        &self.parameters
    }

    /// Appends the return type then the parameters types.
    pub fn gather_types(&self, types: &mut Vec<TypeId>) {
        types.push(self.return_type);
        types.extend_from_slice(&self.parameters);
    }
}

impl PrettyPrint for Proto {
    fn pp(&self, f: &mut fmt::Formatter, types: &TypeTable) -> fmt::Result {
        write!(f, "(")?;
        for p in &self.parameters {
            write!(f, "{}", types.descriptor(*p))?;
        }
        write!(f, "){}", types.descriptor(self.return_type))
    }
}

/// Reference to a method, possibly not defined in the repository.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodRef {
    class: TypeId,
    name: String,
    proto: Proto,
}

impl MethodRef {
    #[must_use]
    pub fn new(class: TypeId, name: impl Into<String>, proto: Proto) -> Self {
        Self {
            class,
            name: name.into(),
            proto,
        }
    }

    /// The declaring type of the method.
    #[inline]
    #[must_use]
    pub const fn class(&self) -> TypeId {
        self.class
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub const fn proto(&self) -> &Proto {
        &self.proto
    }

    /// Checks that both methods have the same name and prototype, whatever their
    /// declaring types.
    #[must_use]
    pub fn signature_matches(&self, name: &str, proto: &Proto) -> bool {
        self.name == name && &self.proto == proto
    }
}

impl PrettyPrint for MethodRef {
    fn pp(&self, f: &mut fmt::Formatter, types: &TypeTable) -> fmt::Result {
        write!(f, "{}->{}", types.descriptor(self.class), self.name)?;
        self.proto.pp(f, types)
    }
}

/// Reference to a field, possibly not defined in the repository.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldRef {
    class: TypeId,
    name: String,
    type_: TypeId,
}

impl FieldRef {
    #[must_use]
    pub fn new(class: TypeId, name: impl Into<String>, type_: TypeId) -> Self {
        Self {
            class,
            name: name.into(),
            type_,
        }
    }

    #[inline]
    #[must_use]
    pub const fn class(&self) -> TypeId {
        self.class
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub const fn type_(&self) -> TypeId {
        self.type_
    }
}

impl PrettyPrint for FieldRef {
    fn pp(&self, f: &mut fmt::Formatter, types: &TypeTable) -> fmt::Result {
        write!(
            f,
            "{}->{}:{}",
            types.descriptor(self.class),
            self.name,
            types.descriptor(self.type_)
        )
    }
}

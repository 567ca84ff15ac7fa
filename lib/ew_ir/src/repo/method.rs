use crate::code::Code;
use crate::refs::{MethodRef, Proto};
use crate::repo::{KeepState, MethodFlags, MethodUid};
use crate::types::{TypeId, TypeTable};
use crate::PrettyPrint;
use std::fmt;

/// Method declaration, before registration in a repository.
#[derive(Debug, Clone)]
pub struct MethodDef {
    pub name: String,
    pub proto: Proto,
    pub flags: MethodFlags,
    pub code: Option<Code>,
    pub keep: KeepState,
}

/// A method defined by a class of the repository.
#[derive(Debug, Clone)]
pub struct Method {
    uid: MethodUid,
    class: TypeId,
    name: String,
    proto: Proto,
    flags: MethodFlags,
    code: Option<Code>,
    keep: KeepState,
}

impl Method {
    pub(crate) fn new(uid: MethodUid, class: TypeId, def: MethodDef) -> Self {
        Self {
            uid,
            class,
            name: def.name,
            proto: def.proto,
            flags: def.flags,
            code: def.code,
            keep: def.keep,
        }
    }

    #[inline]
    #[must_use]
    pub const fn uid(&self) -> MethodUid {
        self.uid
    }

    /// The declaring class.
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

    #[inline]
    #[must_use]
    pub const fn return_type(&self) -> TypeId {
        self.proto.return_type()
    }

    #[inline]
    #[must_use]
    pub fn parameters_types(&self) -> &[TypeId] {
        self.proto.parameters()
    }

    #[inline]
    #[must_use]
    pub const fn flags(&self) -> MethodFlags {
        self.flags
    }

    #[inline]
    #[must_use]
    pub const fn code(&self) -> Option<&Code> {
        self.code.as_ref()
    }

    #[inline]
    #[must_use]
    pub const fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::ACC_STATIC)
    }

    #[inline]
    #[must_use]
    pub const fn is_private(&self) -> bool {
        self.flags.contains(MethodFlags::ACC_PRIVATE)
    }

    #[inline]
    #[must_use]
    pub const fn is_abstract(&self) -> bool {
        self.flags.contains(MethodFlags::ACC_ABSTRACT)
    }

    #[inline]
    #[must_use]
    pub const fn is_native(&self) -> bool {
        self.flags.contains(MethodFlags::ACC_NATIVE)
    }

    #[inline]
    #[must_use]
    pub fn is_clinit(&self) -> bool {
        self.name == "<clinit>"
    }

    #[inline]
    #[must_use]
    pub fn is_init(&self) -> bool {
        self.name == "<init>"
    }

    #[inline]
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.flags.contains(MethodFlags::ACC_CONSTRUCTOR) || self.is_init() || self.is_clinit()
    }

    /// Direct methods are dispatched statically: static, private and constructors.
    #[must_use]
    pub fn is_direct(&self) -> bool {
        self.is_static() || self.is_private() || self.is_constructor()
    }

    #[inline]
    #[must_use]
    pub const fn keep(&self) -> &KeepState {
        &self.keep
    }

    #[inline]
    #[must_use]
    pub const fn can_rename(&self) -> bool {
        self.keep.can_rename()
    }

    #[must_use]
    pub fn reference(&self) -> MethodRef {
        MethodRef::new(self.class, self.name.clone(), self.proto.clone())
    }

    /// Appends the prototype types then every type referenced by the code.
    pub fn gather_types(&self, types: &mut Vec<TypeId>) {
        self.proto.gather_types(types);
        if let Some(code) = &self.code {
            code.gather_types(types);
        }
    }
}

impl PrettyPrint for Method {
    fn pp(&self, f: &mut fmt::Formatter, types: &TypeTable) -> fmt::Result {
        write!(f, "{}->{}", types.descriptor(self.class), self.name)?;
        self.proto.pp(f, types)
    }
}

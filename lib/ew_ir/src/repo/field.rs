use crate::refs::FieldRef;
use crate::repo::{FieldFlags, FieldUid, KeepState};
use crate::types::{TypeId, TypeTable};
use crate::PrettyPrint;
use std::fmt;

/// Field declaration, before registration in a repository.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub type_: TypeId,
    pub flags: FieldFlags,
    pub keep: KeepState,
}

/// A field defined by a class of the repository.
#[derive(Debug, Clone)]
pub struct Field {
    uid: FieldUid,
    class: TypeId,
    name: String,
    type_: TypeId,
    flags: FieldFlags,
    keep: KeepState,
}

impl Field {
    pub(crate) fn new(uid: FieldUid, class: TypeId, def: FieldDef) -> Self {
        Self {
            uid,
            class,
            name: def.name,
            type_: def.type_,
            flags: def.flags,
            keep: def.keep,
        }
    }

    #[inline]
    #[must_use]
    pub const fn uid(&self) -> FieldUid {
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
    pub const fn type_(&self) -> TypeId {
        self.type_
    }

    #[inline]
    #[must_use]
    pub const fn flags(&self) -> FieldFlags {
        self.flags
    }

    #[inline]
    #[must_use]
    pub const fn is_static(&self) -> bool {
        self.flags.contains(FieldFlags::ACC_STATIC)
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
    pub fn reference(&self) -> FieldRef {
        FieldRef::new(self.class, self.name.clone(), self.type_)
    }
}

impl PrettyPrint for Field {
    fn pp(&self, f: &mut fmt::Formatter, types: &TypeTable) -> fmt::Result {
        self.reference().pp(f, types)
    }
}

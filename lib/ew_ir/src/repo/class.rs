use crate::refs::Proto;
use crate::repo::{
    ClassFlags, ClassUid, Field, FieldDef, FieldUid, KeepState, Method, MethodDef, MethodUid, Repo,
};
use crate::types::TypeId;

/// Class declaration, before registration in a repository.
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub type_: TypeId,
    pub flags: ClassFlags,
    pub superclass: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
    pub keep: KeepState,
    pub fields: Vec<FieldDef>,
    pub methods: Vec<MethodDef>,
}

impl ClassDef {
    #[must_use]
    pub fn new(type_: TypeId, flags: ClassFlags, superclass: Option<TypeId>) -> Self {
        Self {
            type_,
            flags,
            superclass,
            interfaces: Vec::new(),
            keep: KeepState::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }
}

/// A class of the repository.
#[derive(Debug, Clone)]
pub struct Class {
    uid: ClassUid,
    type_: TypeId,
    flags: ClassFlags,
    superclass: Option<TypeId>,
    interfaces: Vec<TypeId>,
    keep: KeepState,
    methods: Vec<MethodUid>,
    fields: Vec<FieldUid>,
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Eq for Class {}

impl Class {
    pub(crate) fn new(
        uid: ClassUid,
        def: &ClassDef,
        methods: Vec<MethodUid>,
        fields: Vec<FieldUid>,
    ) -> Self {
        Self {
            uid,
            type_: def.type_,
            flags: def.flags,
            superclass: def.superclass,
            interfaces: def.interfaces.clone(),
            keep: def.keep,
            methods,
            fields,
        }
    }

    #[inline]
    #[must_use]
    pub const fn uid(&self) -> ClassUid {
        self.uid
    }

    #[inline]
    #[must_use]
    pub const fn type_(&self) -> TypeId {
        self.type_
    }

    #[inline]
    #[must_use]
    pub const fn flags(&self) -> ClassFlags {
        self.flags
    }

    #[inline]
    #[must_use]
    pub const fn is_enum(&self) -> bool {
        self.flags.contains(ClassFlags::ACC_ENUM)
    }

    #[inline]
    #[must_use]
    pub const fn is_interface(&self) -> bool {
        self.flags.contains(ClassFlags::ACC_INTERFACE)
    }

    #[inline]
    #[must_use]
    pub const fn superclass(&self) -> Option<TypeId> {
        self.superclass
    }

    #[inline]
    #[must_use]
    pub fn interfaces(&self) -> &[TypeId] {
        &self.interfaces
    }

    #[inline]
    #[must_use]
    pub const fn keep(&self) -> &KeepState {
        &self.keep
    }

    pub fn iter_methods<'r>(&'r self, repo: &'r Repo) -> impl Iterator<Item = &'r Method> {
        self.methods.iter().map(move |uid| &repo[*uid])
    }

    pub fn iter_fields<'r>(&'r self, repo: &'r Repo) -> impl Iterator<Item = &'r Field> {
        self.fields.iter().map(move |uid| &repo[*uid])
    }

    /// Looks up a method declared by this class (inherited ones excluded).
    #[must_use]
    pub fn get_method<'r>(&self, name: &str, proto: &Proto, repo: &'r Repo) -> Option<&'r Method> {
        self.methods
            .iter()
            .map(|uid| &repo[*uid])
            .find(|method| method.name() == name && method.proto() == proto)
    }
}

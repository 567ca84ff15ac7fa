//! A repository to centralize the classes of an application.

use crate::errors::{IrError, IrResult};
use crate::refs::{FieldRef, MethodRef};
use crate::repo::*;
use crate::types::{TypeId, TypeTable};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::ops;

#[derive(Debug, Default)]
pub struct Repo {
    types: TypeTable,
    classes: Vec<Class>,
    methods: Vec<Method>,
    fields: Vec<Field>,
    class_ids: BTreeMap<TypeId, ClassUid>,
}

impl ops::Index<ClassUid> for Repo {
    type Output = Class;

    fn index(&self, cuid: ClassUid) -> &Class {
        &self.classes[cuid.idx()]
    }
}

impl ops::Index<MethodUid> for Repo {
    type Output = Method;

    fn index(&self, muid: MethodUid) -> &Method {
        &self.methods[muid.idx()]
    }
}

impl ops::Index<FieldUid> for Repo {
    type Output = Field;

    fn index(&self, fuid: FieldUid) -> &Field {
        &self.fields[fuid.idx()]
    }
}

impl Repo {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub const fn types(&self) -> &TypeTable {
        &self.types
    }

    #[inline]
    pub fn types_mut(&mut self) -> &mut TypeTable {
        &mut self.types
    }

    pub fn register_class(&mut self, def: ClassDef) -> IrResult<ClassUid> {
        let descriptor = self.types.descriptor(def.type_).to_string();
        log::trace!("pushing '{}' in repository", descriptor);

        if self.class_ids.contains_key(&def.type_) {
            return Err(IrError::DuplicateClass(descriptor));
        }
        let mut seen_fields = BTreeSet::new();
        for field in &def.fields {
            if !seen_fields.insert(field.name.as_str()) {
                return Err(IrError::DuplicateMember(format!(
                    "{descriptor}->{}",
                    field.name
                )));
            }
        }
        let mut seen_methods = BTreeSet::new();
        for method in &def.methods {
            if !seen_methods.insert((method.name.as_str(), &method.proto)) {
                return Err(IrError::DuplicateMember(format!(
                    "{descriptor}->{}",
                    method.name
                )));
            }
        }

        let uid = ClassUid::from_idx(self.classes.len());
        let class_type = def.type_;
        let mut method_uids = Vec::with_capacity(def.methods.len());
        for method in &def.methods {
            let muid = MethodUid::from_idx(self.methods.len());
            self.methods
                .push(Method::new(muid, class_type, method.clone()));
            method_uids.push(muid);
        }
        let mut field_uids = Vec::with_capacity(def.fields.len());
        for field in &def.fields {
            let fuid = FieldUid::from_idx(self.fields.len());
            self.fields.push(Field::new(fuid, class_type, field.clone()));
            field_uids.push(fuid);
        }
        self.classes
            .push(Class::new(uid, &def, method_uids, field_uids));
        self.class_ids.insert(class_type, uid);
        Ok(uid)
    }

    #[inline]
    pub fn iter_classes(&self) -> impl Iterator<Item = &Class> {
        self.classes.iter()
    }

    #[inline]
    pub fn iter_methods(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter()
    }

    #[inline]
    pub fn iter_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    #[inline]
    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn iter_classes_methods(&self) -> impl Iterator<Item = (&Class, &Method)> {
        self.iter_classes()
            .flat_map(move |class| class.iter_methods(self).map(move |method| (class, method)))
    }

    #[must_use]
    pub fn get_class(&self, type_: TypeId) -> Option<&Class> {
        self.class_ids.get(&type_).map(|uid| &self[*uid])
    }

    #[must_use]
    pub fn get_class_by_name(&self, descriptor: &str) -> Option<&Class> {
        self.types
            .lookup(descriptor)
            .and_then(|type_| self.get_class(type_))
    }

    /// Classes whose descriptor matches the pattern.
    pub fn find_classes<'a>(&'a self, pattern: &'a Regex) -> impl Iterator<Item = &'a Class> {
        self.classes
            .iter()
            .filter(|class| pattern.is_match(&self.types.descriptor(class.type_()).to_string()))
    }

    /// Classes of the repository directly extending the given type.
    pub fn subclasses(&self, type_: TypeId) -> impl Iterator<Item = &Class> {
        self.classes
            .iter()
            .filter(move |class| class.superclass() == Some(type_))
    }

    /// Superclasses chain of a type, from its direct parent up to the first class that is
    /// not defined in the repository.
    #[must_use]
    pub fn superclasses(&self, type_: TypeId) -> Vec<TypeId> {
        let mut chain = Vec::new();
        let mut current = self.get_class(type_).and_then(Class::superclass);
        while let Some(parent) = current {
            if parent == type_ || chain.contains(&parent) {
                log::warn!("cyclic class hierarchy above {}", self.types.descriptor(type_));
                break;
            }
            chain.push(parent);
            current = self.get_class(parent).and_then(Class::superclass);
        }
        chain
    }

    /// Resolves a method reference to its definition, looking up the superclasses
    /// when the referenced class does not define the method.
    #[must_use]
    pub fn resolve_method(&self, mref: &MethodRef) -> Option<&Method> {
        std::iter::once(mref.class())
            .chain(self.superclasses(mref.class()))
            .filter_map(|type_| self.get_class(type_))
            .find_map(|class| class.get_method(mref.name(), mref.proto(), self))
    }

    /// Resolves a field reference to its definition, looking up the superclasses.
    #[must_use]
    pub fn resolve_field(&self, fref: &FieldRef) -> Option<&Field> {
        std::iter::once(fref.class())
            .chain(self.superclasses(fref.class()))
            .filter_map(|type_| self.get_class(type_))
            .find_map(|class| {
                class
                    .iter_fields(self)
                    .find(|field| field.name() == fref.name() && field.type_() == fref.type_())
            })
    }

    pub fn nb_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn nb_methods(&self) -> usize {
        self.methods.len()
    }

    pub fn nb_fields(&self) -> usize {
        self.fields.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refs::Proto;

    fn method_def(name: &str, proto: Proto) -> MethodDef {
        MethodDef {
            name: name.to_string(),
            proto,
            flags: MethodFlags::ACC_PUBLIC | MethodFlags::ACC_ABSTRACT,
            code: None,
            keep: KeepState::new(),
        }
    }

    #[test]
    fn registration_and_resolution() {
        let mut repo = Repo::new();
        let base = repo.types_mut().intern_descriptor("Lcom/example/Base;").unwrap();
        let child = repo.types_mut().intern_descriptor("Lcom/example/Child;").unwrap();

        let mut base_def = ClassDef::new(base, ClassFlags::ACC_PUBLIC, Some(TypeId::JAVA_LANG_OBJECT));
        base_def
            .methods
            .push(method_def("size", Proto::new(TypeId::INT, vec![])));
        base_def.fields.push(FieldDef {
            name: "count".to_string(),
            type_: TypeId::INT,
            flags: FieldFlags::ACC_PUBLIC,
            keep: KeepState::new(),
        });
        repo.register_class(base_def).unwrap();
        repo.register_class(ClassDef::new(child, ClassFlags::ACC_PUBLIC, Some(base)))
            .unwrap();

        assert_eq!(repo.nb_classes(), 2);
        assert_eq!(repo.nb_methods(), 1);
        assert_eq!(repo.superclasses(child), vec![base, TypeId::JAVA_LANG_OBJECT]);
        assert_eq!(repo.subclasses(base).count(), 1);

        let mref = MethodRef::new(child, "size", Proto::new(TypeId::INT, vec![]));
        let method = repo.resolve_method(&mref).unwrap();
        assert_eq!(method.class(), base);
        let missing = MethodRef::new(child, "size", Proto::new(TypeId::LONG, vec![]));
        assert!(repo.resolve_method(&missing).is_none());

        let fref = FieldRef::new(child, "count", TypeId::INT);
        assert_eq!(repo.resolve_field(&fref).unwrap().class(), base);

        let pattern = Regex::new("Child").unwrap();
        assert_eq!(repo.find_classes(&pattern).count(), 1);
        assert!(repo.get_class_by_name("Lcom/example/Child;").is_some());
    }

    #[test]
    fn duplicates() {
        let mut repo = Repo::new();
        let base = repo.types_mut().intern_descriptor("Lcom/example/Base;").unwrap();
        repo.register_class(ClassDef::new(base, ClassFlags::empty(), None))
            .unwrap();
        assert!(matches!(
            repo.register_class(ClassDef::new(base, ClassFlags::empty(), None)),
            Err(IrError::DuplicateClass(_))
        ));

        let other = repo.types_mut().intern_descriptor("Lcom/example/Other;").unwrap();
        let mut def = ClassDef::new(other, ClassFlags::empty(), None);
        def.methods
            .push(method_def("f", Proto::new(TypeId::VOID, vec![])));
        def.methods
            .push(method_def("f", Proto::new(TypeId::VOID, vec![])));
        assert!(matches!(
            repo.register_class(def),
            Err(IrError::DuplicateMember(_))
        ));
    }
}

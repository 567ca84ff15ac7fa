//! Type descriptors and their interning table.
//!
//! Types are manipulated by the analyses through [`TypeId`] handles only: a handle is an
//! index into the [`TypeTable`] that owns the descriptor and some cached metadata (array
//! component and innermost element). Two handles are equal iff they denote the same type.

use crate::errors::{IrError, IrResult};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Dalvik concrete type descriptor type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Type {
    /// `void` type, only valid for return types.
    Void,
    /// `boolean` type.
    Boolean,
    /// `byte` type.
    Byte,
    /// `short` type.
    Short,
    /// `char` type.
    Char,
    /// `int` type.
    Int,
    /// `long` type.
    Long,
    /// `float` type.
    Float,
    /// `double` type.
    Double,
    /// Array of the given type descriptor, with its number of dimensions.
    Array(usize, Box<Self>),
    /// Type of a fully-qualified class (slash separated, without `L` and `;`).
    Class(String),
}

impl Type {
    /// Returns a java-like representation of the type.
    #[must_use]
    pub fn to_java_string(&self) -> String {
        match self {
            Self::Void => "void".to_string(),
            Self::Boolean => "boolean".to_string(),
            Self::Byte => "byte".to_string(),
            Self::Short => "short".to_string(),
            Self::Char => "char".to_string(),
            Self::Int => "int".to_string(),
            Self::Long => "long".to_string(),
            Self::Float => "float".to_string(),
            Self::Double => "double".to_string(),
            Self::Array(n, sub) => {
                let mut s = sub.to_java_string();
                for _ in 0..*n {
                    s.push_str("[]");
                }
                s
            }
            Self::Class(name) => name.replace('/', "."),
        }
    }

    /// Primitive types are the scalar ones, `void` included.
    #[must_use]
    pub const fn is_primitive(&self) -> bool {
        !matches!(self, Self::Array(_, _) | Self::Class(_))
    }

    /// Wide types occupy a register pair.
    #[must_use]
    pub const fn is_wide(&self) -> bool {
        matches!(self, Self::Long | Self::Double)
    }

    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self, Self::Array(_, _))
    }

    /// Returns the type obtained by removing one array dimension.
    #[must_use]
    pub fn component(&self) -> Option<Self> {
        match self {
            Self::Array(1, inner) => Some(inner.as_ref().clone()),
            Self::Array(n, inner) => Some(Self::Array(n - 1, inner.clone())),
            _ => None,
        }
    }

    /// Returns the innermost element type of an array type.
    #[must_use]
    pub fn element(&self) -> Option<&Self> {
        match self {
            Self::Array(_, inner) => Some(inner),
            _ => None,
        }
    }

    pub fn as_class_name(&self) -> IrResult<&str> {
        if let Self::Class(name) = self {
            Ok(name)
        } else {
            Err(IrError::InvalidType(format!("{self} is not a class type")))
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Void => write!(f, "V"),
            Self::Boolean => write!(f, "Z"),
            Self::Byte => write!(f, "B"),
            Self::Short => write!(f, "S"),
            Self::Char => write!(f, "C"),
            Self::Int => write!(f, "I"),
            Self::Long => write!(f, "J"),
            Self::Float => write!(f, "F"),
            Self::Double => write!(f, "D"),
            Self::Array(n, inner) => {
                for _ in 0..*n {
                    write!(f, "[")?;
                }
                write!(f, "{inner}")
            }
            Self::Class(classname) => write!(f, "L{classname};"),
        }
    }
}

impl TryFrom<&str> for Type {
    type Error = IrError;

    fn try_from(s: &str) -> IrResult<Self> {
        lazy_static! {
            static ref RE: Regex = Regex::new(r"^(\[*)([VZBSCIJFD]|L[^;\[\s]+;)$")
                .expect("failed to compile type descriptor regex");
        }
        let conversion_error = || IrError::Conversion {
            from: format!("&str ({s:?})"),
            to: "Type".to_string(),
        };

        let caps = RE.captures(s).ok_or_else(conversion_error)?;
        let dims = caps.get(1).map_or(0, |m| m.as_str().len());
        let base = caps.get(2).map_or("", |m| m.as_str());

        let t = match base {
            "V" => Self::Void,
            "Z" => Self::Boolean,
            "B" => Self::Byte,
            "S" => Self::Short,
            "C" => Self::Char,
            "I" => Self::Int,
            "J" => Self::Long,
            "F" => Self::Float,
            "D" => Self::Double,
            class => Self::Class(class[1..class.len() - 1].to_string()),
        };
        match dims {
            0 => Ok(t),
            _ if dims > 255 || t == Self::Void => Err(conversion_error()),
            _ => Ok(Self::Array(dims, Box::new(t))),
        }
    }
}

/// Interned handle over a [`Type`] of a [`TypeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TypeId(u32);

impl TypeId {
    pub const VOID: Self = Self(0);
    pub const BOOLEAN: Self = Self(1);
    pub const BYTE: Self = Self(2);
    pub const SHORT: Self = Self(3);
    pub const CHAR: Self = Self(4);
    pub const INT: Self = Self(5);
    pub const LONG: Self = Self(6);
    pub const FLOAT: Self = Self(7);
    pub const DOUBLE: Self = Self(8);
    pub const JAVA_LANG_OBJECT: Self = Self(9);
    pub const JAVA_LANG_STRING: Self = Self(10);
    pub const JAVA_LANG_CLASS: Self = Self(11);
    pub const JAVA_LANG_ENUM: Self = Self(12);
    pub const JAVA_LANG_STRING_BUILDER: Self = Self(13);
    pub const JAVA_LANG_THROWABLE: Self = Self(14);

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

lazy_static! {
    // Interned by every table at fixed positions, matching the `TypeId` constants.
    static ref PRELUDE: Vec<Type> = vec![
        Type::Void,
        Type::Boolean,
        Type::Byte,
        Type::Short,
        Type::Char,
        Type::Int,
        Type::Long,
        Type::Float,
        Type::Double,
        Type::Class("java/lang/Object".to_string()),
        Type::Class("java/lang/String".to_string()),
        Type::Class("java/lang/Class".to_string()),
        Type::Class("java/lang/Enum".to_string()),
        Type::Class("java/lang/StringBuilder".to_string()),
        Type::Class("java/lang/Throwable".to_string()),
    ];
}

#[derive(Debug, Clone)]
struct TypeInfo {
    descr: Type,
    component: Option<TypeId>,
    element: Option<TypeId>,
}

/// The interning table, owning every type known to a repository.
#[derive(Debug, Clone)]
pub struct TypeTable {
    infos: Vec<TypeInfo>,
    ids: BTreeMap<Type, TypeId>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    #[must_use]
    pub fn new() -> Self {
        let mut table = Self {
            infos: Vec::new(),
            ids: BTreeMap::new(),
        };
        for typ in PRELUDE.iter() {
            table.intern(typ);
        }
        table
    }

    /// Returns the handle of the given type, registering it first if needed.
    pub fn intern(&mut self, typ: &Type) -> TypeId {
        if let Some(id) = self.ids.get(typ) {
            return *id;
        }
        let (component, element) = match typ {
            Type::Array(_, inner) => {
                let component = typ.component().map(|c| self.intern(&c));
                (component, Some(self.intern(inner)))
            }
            _ => (None, None),
        };
        let id = TypeId(u32::try_from(self.infos.len()).expect("type table overflow"));
        self.infos.push(TypeInfo {
            descr: typ.clone(),
            component,
            element,
        });
        self.ids.insert(typ.clone(), id);
        id
    }

    /// Parses a Dalvik descriptor and interns the resulting type.
    pub fn intern_descriptor(&mut self, descriptor: &str) -> IrResult<TypeId> {
        let typ = Type::try_from(descriptor)?;
        Ok(self.intern(&typ))
    }

    #[must_use]
    pub fn get(&self, typ: &Type) -> Option<TypeId> {
        self.ids.get(typ).copied()
    }

    /// Looks up an already interned type from its descriptor.
    #[must_use]
    pub fn lookup(&self, descriptor: &str) -> Option<TypeId> {
        Type::try_from(descriptor)
            .ok()
            .and_then(|typ| self.get(&typ))
    }

    /// Returns the descriptor of the handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle was not produced by this table.
    #[must_use]
    pub fn descriptor(&self, id: TypeId) -> &Type {
        &self.infos[id.index()].descr
    }

    #[inline]
    #[must_use]
    pub fn is_primitive(&self, id: TypeId) -> bool {
        self.descriptor(id).is_primitive()
    }

    #[inline]
    #[must_use]
    pub fn is_wide(&self, id: TypeId) -> bool {
        self.descriptor(id).is_wide()
    }

    #[inline]
    #[must_use]
    pub fn is_array(&self, id: TypeId) -> bool {
        self.descriptor(id).is_array()
    }

    /// `[[LFoo;` gives `[LFoo;`.
    #[inline]
    #[must_use]
    pub fn array_component(&self, id: TypeId) -> Option<TypeId> {
        self.infos[id.index()].component
    }

    /// `[[LFoo;` gives `LFoo;`.
    #[inline]
    #[must_use]
    pub fn array_element(&self, id: TypeId) -> Option<TypeId> {
        self.infos[id.index()].element
    }

    /// Returns the innermost element type for arrays, the type itself otherwise.
    #[must_use]
    pub fn strip_array(&self, id: TypeId) -> TypeId {
        self.array_element(id).unwrap_or(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_conversion() {
        assert_eq!(Type::try_from("I").unwrap(), Type::Int);
        assert_eq!(
            Type::try_from("Lcom/example/Color;").unwrap(),
            Type::Class("com/example/Color".to_string())
        );
        assert_eq!(
            Type::try_from("[[Lcom/example/Color;").unwrap(),
            Type::Array(2, Box::new(Type::Class("com/example/Color".to_string())))
        );
        assert!(Type::try_from("").is_err());
        assert!(Type::try_from("[V").is_err());
        assert!(Type::try_from("Lcom/example/Color").is_err());
        assert!(Type::try_from("Q").is_err());
    }

    #[test]
    fn descriptor_display() {
        for descr in ["V", "J", "[I", "Ljava/lang/String;", "[[Lcom/example/Color;"] {
            assert_eq!(format!("{}", Type::try_from(descr).unwrap()), descr);
        }
        assert_eq!(
            Type::try_from("[Ljava/lang/String;")
                .unwrap()
                .to_java_string(),
            "java.lang.String[]"
        );
    }

    #[test]
    fn prelude_ids() {
        let table = TypeTable::new();
        assert_eq!(table.lookup("V"), Some(TypeId::VOID));
        assert_eq!(table.lookup("D"), Some(TypeId::DOUBLE));
        assert_eq!(table.lookup("Ljava/lang/Enum;"), Some(TypeId::JAVA_LANG_ENUM));
        assert_eq!(
            table.lookup("Ljava/lang/StringBuilder;"),
            Some(TypeId::JAVA_LANG_STRING_BUILDER)
        );
        assert_eq!(
            table.lookup("Ljava/lang/Throwable;"),
            Some(TypeId::JAVA_LANG_THROWABLE)
        );
        assert!(table.is_primitive(TypeId::VOID));
        assert!(!table.is_primitive(TypeId::JAVA_LANG_CLASS));
    }

    #[test]
    fn interning_arrays() {
        let mut table = TypeTable::new();
        let arr2 = table.intern_descriptor("[[Lcom/example/Color;").unwrap();
        let arr1 = table.lookup("[Lcom/example/Color;").unwrap();
        let color = table.lookup("Lcom/example/Color;").unwrap();

        assert_eq!(table.intern_descriptor("[[Lcom/example/Color;").unwrap(), arr2);
        assert!(table.is_array(arr2));
        assert_eq!(table.array_component(arr2), Some(arr1));
        assert_eq!(table.array_component(arr1), Some(color));
        assert_eq!(table.array_element(arr2), Some(color));
        assert_eq!(table.array_element(color), None);
        assert_eq!(table.strip_array(arr2), color);
        assert_eq!(table.strip_array(color), color);

        let ints = table.intern_descriptor("[I").unwrap();
        assert_eq!(table.array_element(ints), Some(TypeId::INT));
    }
}

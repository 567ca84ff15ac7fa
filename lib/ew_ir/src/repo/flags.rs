//! Access flags of classes and members, with their assembly keywords.

use bitflags::bitflags;
use std::fmt;
use std::ops::BitOr;

bitflags! {
    /// Dalvik class flags
    pub struct ClassFlags: u32 {
        const ACC_PUBLIC                = 0x00001;
        const ACC_PRIVATE               = 0x00002;
        const ACC_PROTECTED             = 0x00004;
        const ACC_STATIC                = 0x00008;
        const ACC_FINAL                 = 0x00010;
        const ACC_INTERFACE             = 0x00200;
        const ACC_ABSTRACT              = 0x00400;
        const ACC_SYNTHETIC             = 0x01000;
        const ACC_ANNOTATION            = 0x02000;
        const ACC_ENUM                  = 0x04000;
    }
}

bitflags! {
    pub struct MethodFlags: u32 {
        const ACC_PUBLIC                = 0x00001;
        const ACC_PRIVATE               = 0x00002;
        const ACC_PROTECTED             = 0x00004;
        const ACC_STATIC                = 0x00008;
        const ACC_FINAL                 = 0x00010;
        const ACC_SYNCHRONIZED          = 0x00020;
        const ACC_BRIDGE                = 0x00040;
        const ACC_VARARGS               = 0x00080;
        const ACC_NATIVE                = 0x00100;
        const ACC_ABSTRACT              = 0x00400;
        const ACC_STRICT                = 0x00800;
        const ACC_SYNTHETIC             = 0x01000;
        const ACC_CONSTRUCTOR           = 0x10000;
        const ACC_DECLARED_SYNCHRONIZED = 0x20000;
    }
}

bitflags! {
    pub struct FieldFlags: u32 {
        const ACC_PUBLIC                = 0x00001;
        const ACC_PRIVATE               = 0x00002;
        const ACC_PROTECTED             = 0x00004;
        const ACC_STATIC                = 0x00008;
        const ACC_FINAL                 = 0x00010;
        const ACC_VOLATILE              = 0x00040;
        const ACC_TRANSIENT             = 0x00080;
        const ACC_SYNTHETIC             = 0x01000;
        const ACC_ENUM                  = 0x04000;
    }
}

/// Flags that can be written as keywords in declarations.
pub trait Keywords: Sized + Copy + BitOr<Output = Self> + 'static {
    const KEYWORDS: &'static [(&'static str, Self)];
    const EMPTY: Self;

    fn from_keyword(word: &str) -> Option<Self> {
        Self::KEYWORDS
            .iter()
            .find_map(|(kw, flag)| (*kw == word).then_some(*flag))
    }

    /// Combines whitespace separated keywords, returning the first unknown one on error.
    fn from_keywords(words: &str) -> Result<Self, &str> {
        words.split_whitespace().try_fold(Self::EMPTY, |flags, word| {
            Self::from_keyword(word).map(|flag| flags | flag).ok_or(word)
        })
    }
}

impl Keywords for ClassFlags {
    const EMPTY: Self = Self::empty();
    const KEYWORDS: &'static [(&'static str, Self)] = &[
        ("public", Self::ACC_PUBLIC),
        ("private", Self::ACC_PRIVATE),
        ("protected", Self::ACC_PROTECTED),
        ("static", Self::ACC_STATIC),
        ("final", Self::ACC_FINAL),
        ("interface", Self::ACC_INTERFACE),
        ("abstract", Self::ACC_ABSTRACT),
        ("synthetic", Self::ACC_SYNTHETIC),
        ("annotation", Self::ACC_ANNOTATION),
        ("enum", Self::ACC_ENUM),
    ];
}

impl Keywords for MethodFlags {
    const EMPTY: Self = Self::empty();
    const KEYWORDS: &'static [(&'static str, Self)] = &[
        ("public", Self::ACC_PUBLIC),
        ("private", Self::ACC_PRIVATE),
        ("protected", Self::ACC_PROTECTED),
        ("static", Self::ACC_STATIC),
        ("final", Self::ACC_FINAL),
        ("synchronized", Self::ACC_SYNCHRONIZED),
        ("bridge", Self::ACC_BRIDGE),
        ("varargs", Self::ACC_VARARGS),
        ("native", Self::ACC_NATIVE),
        ("abstract", Self::ACC_ABSTRACT),
        ("strictfp", Self::ACC_STRICT),
        ("synthetic", Self::ACC_SYNTHETIC),
        ("constructor", Self::ACC_CONSTRUCTOR),
        ("declared-synchronized", Self::ACC_DECLARED_SYNCHRONIZED),
    ];
}

impl Keywords for FieldFlags {
    const EMPTY: Self = Self::empty();
    const KEYWORDS: &'static [(&'static str, Self)] = &[
        ("public", Self::ACC_PUBLIC),
        ("private", Self::ACC_PRIVATE),
        ("protected", Self::ACC_PROTECTED),
        ("static", Self::ACC_STATIC),
        ("final", Self::ACC_FINAL),
        ("volatile", Self::ACC_VOLATILE),
        ("transient", Self::ACC_TRANSIENT),
        ("synthetic", Self::ACC_SYNTHETIC),
        ("enum", Self::ACC_ENUM),
    ];
}

macro_rules! display_keywords {
    ($flags:ty) => {
        impl fmt::Display for $flags {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                for (kw, flag) in Self::KEYWORDS {
                    if self.contains(*flag) {
                        write!(f, "{kw} ")?;
                    }
                }
                Ok(())
            }
        }
    };
}

display_keywords!(ClassFlags);
display_keywords!(MethodFlags);
display_keywords!(FieldFlags);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords() {
        assert_eq!(ClassFlags::from_keyword("enum"), Some(ClassFlags::ACC_ENUM));
        assert_eq!(
            MethodFlags::from_keyword("constructor"),
            Some(MethodFlags::ACC_CONSTRUCTOR)
        );
        assert_eq!(FieldFlags::from_keyword("constructor"), None);
        let flags = MethodFlags::ACC_PUBLIC | MethodFlags::ACC_STATIC;
        assert_eq!(flags.to_string(), "public static ");
        assert_eq!(MethodFlags::from_keywords("public  static"), Ok(flags));
        assert_eq!(MethodFlags::from_keywords(""), Ok(MethodFlags::empty()));
        assert_eq!(FieldFlags::from_keywords("public bridge"), Err("bridge"));
    }
}

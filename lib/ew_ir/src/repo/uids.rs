//! Repository handles over classes, methods and fields.
//!
//! A handle is the position of the member in the repository storage, allocated when the
//! member is registered and stable afterwards (members are never removed).

use serde::Serialize;
use std::fmt;

macro_rules! uid {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            pub(crate) fn from_idx(idx: usize) -> Self {
                Self(u32::try_from(idx).unwrap_or(u32::MAX))
            }

            pub(crate) const fn idx(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

uid!(
    /// Unique id of a class in the repo.
    ClassUid,
    "c"
);
uid!(
    /// Unique id of a method in the repo.
    MethodUid,
    "m"
);
uid!(
    /// Unique id of a field in the repo.
    FieldUid,
    "f"
);

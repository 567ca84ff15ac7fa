//! Classes, methods and fields definitions, and the repository storing them.

mod class;
mod field;
mod flags;
mod keep;
mod method;
mod repository;
mod uids;

pub use class::{Class, ClassDef};
pub use field::{Field, FieldDef};
pub use flags::{ClassFlags, FieldFlags, Keywords, MethodFlags};
pub use keep::KeepState;
pub use method::{Method, MethodDef};
pub use repository::Repo;
pub use uids::{ClassUid, FieldUid, MethodUid};

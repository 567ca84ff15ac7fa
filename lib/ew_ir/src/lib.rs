//! Intermediate representation of Dalvik-like bytecode for the `EnumWorks` project.
//!
//! The crate provides interned types, a register-based instruction set with explicit
//! parameter loading and pseudo results, method code and its control flow graph, and a
//! repository of classes loaded from a textual assembly format.

mod addr;
mod parsers;

pub mod code;
pub mod controlflow;
pub mod errors;
pub mod instrs;
pub mod refs;
pub mod registers;
pub mod repo;
pub mod types;

pub use crate::addr::Addr;
pub use crate::parsers::{parse_into, parse_repo as parse};

use crate::types::TypeTable;
use std::fmt;

/// Rendering of IR parts whose printing needs to resolve interned types.
pub trait PrettyPrint {
    fn pp(&self, f: &mut fmt::Formatter, types: &TypeTable) -> fmt::Result;
}

/// Adapter implementing [`fmt::Display`] for [`PrettyPrint`] values.
pub struct PrettyPrinter<'a, T>(pub &'a T, pub &'a TypeTable);

impl<'a, T: PrettyPrint> fmt::Display for PrettyPrinter<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.pp(f, self.1)
    }
}

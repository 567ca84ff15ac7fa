//! Rejection diagnostics.

use ew_ir::repo::{FieldUid, MethodUid};
use ew_ir::types::TypeId;
use ew_ir::Addr;
use serde::Serialize;
use std::fmt;

/// Why a candidate enum cannot be replaced by integers.
///
/// Only the first reason found for a given enum matters for users; types may be
/// rejected for several reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    Unknown,
    CastWhenReturn,
    CastThisPointer,
    CastParameter,
    UsedAsClassObject,
    CastCheckCast,
    CastIsputObject,
    CastAputObject,
    MultiEnumTypes,
    UnsafeInvocationOnCandidateEnum,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Unknown => "pinned by keep rules",
            Self::CastWhenReturn => "cast when returned",
            Self::CastThisPointer => "cast as a receiver",
            Self::CastParameter => "cast as a parameter",
            Self::UsedAsClassObject => "used as a class object",
            Self::CastCheckCast => "cast by check-cast",
            Self::CastIsputObject => "cast when stored into a field",
            Self::CastAputObject => "cast when stored into an array",
            Self::MultiEnumTypes => "mixed with other types",
            Self::UnsafeInvocationOnCandidateEnum => "unsafe invocation",
        };
        write!(f, "{s}")
    }
}

/// The member whose analysis rejected a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Field(FieldUid),
    Method(MethodUid),
}

/// A diagnostic record emitted for every rejection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Rejection {
    pub type_: TypeId,
    pub reason: Reason,
    pub origin: Origin,
    /// Rejecting instruction, if any.
    pub addr: Option<Addr>,
}

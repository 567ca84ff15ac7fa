//! Enum unboxing safety analysis.
//!
//! Candidate enums are replaced by integers only if no method may use one of their
//! instances as a plain object. A forward dataflow analysis computes, for every register,
//! the set of types it may hold, then every instruction where a candidate could flow
//! into a location of another type rejects it.

pub mod analysis;
pub mod candidates;
pub mod detector;
pub mod driver;
pub mod env;
pub mod reasons;
pub mod transfer;
pub mod types;

pub use analysis::{reject_unsafe_enums, Rejections};
pub use candidates::{collect_candidate_enums, load_candidates};
pub use driver::{optimize, AnalysisOptions, Report};
pub use env::EnumTypeEnvironment;
pub use reasons::{Origin, Reason, Rejection};
pub use types::EnumTypes;

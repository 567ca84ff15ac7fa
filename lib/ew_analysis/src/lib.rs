//! This crate provides the enum unboxing analysis algorithms of the `EnumWorks`
//! project.

pub mod concurrent;
pub mod dataflow;
pub mod enums;
pub mod errors;

use crate::concurrent::ConcurrentSet;
use crate::errors::AnalysisResult;
use ew_ir::controlflow::Cfg;
use ew_ir::repo::{Method, Repo};
use ew_ir::types::TypeId;

/// Computes the enum types environments of a method at each block entry and exit.
pub fn enum_types(
    method: &Method,
    repo: &Repo,
) -> AnalysisResult<dataflow::Dataflow<enums::EnumTypeEnvironment>> {
    let code = method.code().ok_or_else(|| {
        errors::AnalysisError::NoCode(ew_ir::PrettyPrinter(method, repo.types()).to_string())
    })?;
    let cfg = Cfg::build(code)?;
    dataflow::forward::<enums::EnumTypeEnvironment>(method, &cfg, repo.types())
}

/// Runs a single rejection round, removing the rejected types from `candidates`.
pub fn reject_unsafe_enums(
    repo: &Repo,
    candidates: &ConcurrentSet<TypeId>,
) -> AnalysisResult<enums::Rejections> {
    enums::reject_unsafe_enums(repo, candidates)
}

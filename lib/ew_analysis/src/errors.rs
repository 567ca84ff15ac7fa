//! Analysis errors definition.

use ew_ir::errors::IrError;
use rayon::ThreadPoolBuildError;
use thiserror::Error;

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("IR error: {0}")]
    Ir(#[from] IrError),

    #[error("invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("method {0} has no implementation")]
    NoCode(String),

    #[error("thread pool error: {0}")]
    ThreadPool(#[from] ThreadPoolBuildError),
}

/// Program properties that candidate selection guarantees, checked while analyzing.
///
/// A violation means the candidate set was not built from the analyzed program, and
/// aborts the whole analysis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("{method}: instance field {field} of a candidate enum is accessed")]
    CandidateFieldAccess { method: String, field: String },

    #[error("{method}: direct invocation of candidate enum method {callee}")]
    DirectInvocationOnCandidate { method: String, callee: String },

    #[error("{method}: invocation of {callee} with {found} registers, {expected} expected")]
    InvocationArity {
        method: String,
        callee: String,
        expected: usize,
        found: usize,
    },

    #[error("{method}: {found} parameter loading instructions, {expected} expected")]
    ParameterMismatch {
        method: String,
        expected: usize,
        found: usize,
    },
}

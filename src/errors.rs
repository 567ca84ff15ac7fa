//! Global error handling.
//!
//! Each sub-crate of the project defines its own type error.
//! Their types can be unified, for example in a main function,
//! when winding results at the top-level.
//!
//! ```rust
//! use enumworks::prelude::*;
//!
//! fn main() -> EwResult<()> { // can return a EwError
//!    let _repo = ir::parse(".class LFoo;\n")?; // can return a IrError
//!    Ok(())
//! }
//! ```

use ew_analysis::errors::AnalysisError;
use ew_ir::errors::IrError;
use std::io;
use thiserror::Error;

/// An alias for result that can be a [`EwError`].
pub type EwResult<T> = Result<T, EwError>;

/// The main error type for error winding at the top-level.
/// It mainly consists of transparent wrapper over error types that
/// are defined in dependencies.
#[derive(Debug, Error)]
pub enum EwError {
    /// Custom error for reporting bad command line arguments usage.
    #[error("bad arguments: {0}")]
    BadArguments(String),

    /// Error that can be returned from [I/O operations](std::io).
    #[error(transparent)]
    IO(#[from] io::Error),

    /// Error that can be returned from regex compilation.
    #[error(transparent)]
    Regex(#[from] regex::Error),

    /// Error that can be returned when serializing reports.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Assembly file that could not be loaded.
    #[error("{file}: {source}")]
    Input {
        file: String,
        #[source]
        source: IrError,
    },

    /// Error that can be returned from [`ew_analysis`] functions.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Error that can be returned from [`ew_ir`] functions.
    #[error(transparent)]
    Ir(#[from] IrError),
}

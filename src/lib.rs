//! # `EnumWorks`
//!
//! `enumworks` is the main crate of the `EnumWorks` project, which decides which enums
//! of a bytecode program can be replaced by plain integers. The project is subdivided
//! into two crates, `enumworks` acts as entry point by reexporting important structs and
//! functions from them. Most of the reexport are done within the `enumworks::prelude`
//! namespace.
//!
//! ## Library basics
//!
//! Programs are written in a textual assembly close to smali, and loaded into a `Repo`:
//!
//! ```rust
//! use enumworks::prelude::*;
//!
//! let repo = ir::parse(".class public final enum LColor;\n.super Ljava/lang/Enum;\n")?;
//! println!("classes count: {}", repo.nb_classes());
//! # Ok::<(), EwError>(())
//! ```
//!
//! The candidate enums are then narrowed down by the analysis driver:
//!
//! ```rust
//! use enumworks::prelude::*;
//!
//! let repo = ir::parse(".class public final enum LColor;\n.super Ljava/lang/Enum;\n")?;
//! let candidates = enums::collect_candidate_enums(&repo);
//! let report = enums::optimize(&repo, &candidates, &AnalysisOptions::default())?;
//! assert_eq!(report.accepted, candidates);
//! # Ok::<(), EwError>(())
//! ```
//!
//! ## Sub-crates
//!
//!  - [`ew_ir`] contains the intermediate representation: interned types, instructions,
//!    method code, control flow graphs, and the assembly loader,
//!  - [`ew_analysis`] contains the dataflow framework and the enum analysis.

mod errors;

pub mod cli;
pub mod ew_cfg;
pub mod ew_unbox;

pub use ew_analysis as analysis;
pub use ew_ir as ir;

use std::fs;
use std::path::Path;

/// Reexport module of commonly used structures and functions from `EnumWorks` project
/// sub-crates:
///
/// ```rust
/// use enumworks::prelude::*;
/// ```
pub mod prelude {
    pub use crate::errors::{EwError, EwResult};

    pub use ew_analysis::enums;
    pub use ew_analysis::enums::{AnalysisOptions, Reason, Rejection, Report};

    pub use ew_ir::controlflow::Cfg;
    pub use ew_ir::repo::{Class, Field, Method, Repo};
    pub use ew_ir::types::TypeId;
    pub use ew_ir::{Addr, PrettyPrinter};

    pub use crate::ir;

    use clap::ArgMatches;

    pub fn init_logger(args: &ArgMatches) {
        let env = env_logger::Env::new()
            .filter_or("EW_LOG", "info")
            .write_style("EW_LOG_STYLE");

        let mut builder = env_logger::Builder::from_env(env);
        if args.get_flag("verbose") {
            builder.filter_level(log::LevelFilter::Trace);
        } else if args.get_flag("debug") {
            builder.filter_level(log::LevelFilter::Debug);
        }
        if args.get_flag("ecslog") {
            builder.format(ecs_logger::format);
        }
        builder.init();
    }
}

use crate::prelude::*;

/// Loads every assembly file into a single repository.
///
/// # Errors
///
/// Fails if a file cannot be read, or on the first syntax error, reported along with
/// the file name.
pub fn load_repo<P: AsRef<Path>>(inputs: &[P]) -> EwResult<Repo> {
    let mut repo = Repo::new();
    for input in inputs {
        let input = input.as_ref();
        let source = fs::read_to_string(input)?;
        let classes = ir::parse_into(&mut repo, &source).map_err(|err| EwError::Input {
            file: input.display().to_string(),
            source: err,
        })?;
        log::debug!("{} classes loaded from {}", classes.len(), input.display());
    }
    log::info!(
        "{} classes, {} methods, {} fields loaded",
        repo.nb_classes(),
        repo.nb_methods(),
        repo.nb_fields()
    );
    Ok(repo)
}

//! Repeated rejection rounds until the candidates stabilize.

use crate::concurrent::ConcurrentSet;
use crate::enums::analysis::reject_unsafe_enums;
use crate::enums::reasons::Rejection;
use crate::errors::{AnalysisError, AnalysisResult};
use ew_ir::repo::Repo;
use ew_ir::types::TypeId;
use serde::Serialize;

/// Tuning of [`optimize`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisOptions {
    /// Maximum number of rejection rounds, unbounded when `None`.
    pub max_rounds: Option<usize>,
    /// Size of the worker pool, rayon default when `None`.
    pub threads: Option<usize>,
}

/// Outcome of the whole analysis.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    /// Number of rejection rounds run.
    pub rounds: usize,
    /// Whether the last round rejected nothing.
    pub stable: bool,
    /// Candidates that can safely be replaced by integers, sorted.
    pub accepted: Vec<TypeId>,
    /// Rejected candidates, sorted.
    pub rejected: Vec<TypeId>,
    pub diagnostics: Vec<Rejection>,
}

/// Narrows the candidate enums of a repository down to the ones that are never used as
/// objects.
///
/// A round only sees the rejections of the previous ones, so rounds are repeated until
/// one of them rejects nothing, or `options.max_rounds` is reached.
///
/// # Errors
///
/// Fails on invariant violations, or if the worker pool cannot be built.
pub fn optimize(
    repo: &Repo,
    candidates: &[TypeId],
    options: &AnalysisOptions,
) -> AnalysisResult<Report> {
    if let Some(foreign) = candidates
        .iter()
        .find(|type_| type_.index() >= repo.types().len())
    {
        return Err(AnalysisError::Internal(format!(
            "candidate {foreign} is not a type of the repository"
        )));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = options.threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder.build()?;
    pool.install(|| run_rounds(repo, candidates, options.max_rounds))
}

fn run_rounds(
    repo: &Repo,
    candidates: &[TypeId],
    max_rounds: Option<usize>,
) -> AnalysisResult<Report> {
    let types = repo.types();
    let live: ConcurrentSet<TypeId> = candidates.iter().copied().collect();
    let mut report = Report::default();

    while max_rounds.map_or(true, |max| report.rounds < max) {
        report.rounds += 1;
        let round = reject_unsafe_enums(repo, &live)?;
        log::info!(
            "round {}: {} enums rejected, {} candidates left",
            report.rounds,
            round.rejected.len(),
            live.len()
        );
        for type_ in &round.rejected {
            log::debug!("{} rejected", types.descriptor(*type_));
        }
        if round.rejected.is_empty() {
            report.stable = true;
            break;
        }
        report.rejected.extend(round.rejected);
        report.diagnostics.extend(round.diagnostics);
    }

    report.rejected.sort();
    report.accepted = live.to_sorted_vec();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::reasons::Reason;

    const SRC: &str = r#"
.class public final enum LInner;
.super Ljava/lang/Enum;

.class public final enum LOuter;
.super Ljava/lang/Enum;

.class public final enum LSafe;
.super Ljava/lang/Enum;

.class public LUser;

.method public static leak(LOuter;)Ljava/lang/Object;
.registers 1
    return-object p0
.end method

.method public static hide(LOuter;LInner;)Ljava/lang/Object;
.registers 2
    return-object p1
.end method

.method public static ordinal(LSafe;)I
.registers 2
    invoke-virtual {p0}, LSafe;->ordinal()I
    move-result v0
    return v0
.end method
"#;

    fn ids(repo: &Repo, descriptors: &[&str]) -> Vec<TypeId> {
        let mut ids: Vec<TypeId> = descriptors
            .iter()
            .map(|d| repo.types().lookup(d).unwrap())
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn until_stable() {
        let repo = ew_ir::parse(SRC).unwrap();
        let candidates = ids(&repo, &["LInner;", "LOuter;", "LSafe;"]);
        let report = optimize(&repo, &candidates, &AnalysisOptions::default()).unwrap();
        assert!(report.stable);
        assert_eq!(report.rounds, 2);
        assert_eq!(report.accepted, ids(&repo, &["LSafe;"]));
        assert_eq!(report.rejected, ids(&repo, &["LInner;", "LOuter;"]));
        assert!(report
            .diagnostics
            .iter()
            .all(|r| r.reason == Reason::CastWhenReturn));
    }

    #[test]
    fn bounded_rounds() {
        let repo = ew_ir::parse(SRC).unwrap();
        let candidates = ids(&repo, &["LSafe;"]);
        let options = AnalysisOptions {
            max_rounds: Some(1),
            threads: Some(2),
        };
        let report = optimize(&repo, &candidates, &options).unwrap();
        assert_eq!(report.rounds, 1);
        assert!(report.stable);
        assert_eq!(report.accepted, candidates);

        let options = AnalysisOptions {
            max_rounds: Some(0),
            threads: Some(1),
        };
        let report = optimize(&repo, &candidates, &options).unwrap();
        assert_eq!(report.rounds, 0);
        assert!(!report.stable);
    }
}

//! Orchestration of the enum upcast analysis over a whole repository.

use crate::concurrent::ConcurrentSet;
use crate::dataflow;
use crate::enums::detector::EnumUpcastDetector;
use crate::enums::env::EnumTypeEnvironment;
use crate::enums::reasons::{Origin, Reason, Rejection};
use crate::errors::AnalysisResult;
use ew_ir::controlflow::Cfg;
use ew_ir::repo::{Field, Method, Repo};
use ew_ir::types::{TypeId, TypeTable};
use ew_ir::PrettyPrinter;
use rayon::prelude::*;
use serde::Serialize;

/// Outcome of one call to [`reject_unsafe_enums`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct Rejections {
    /// Types removed from the candidates, sorted.
    pub rejected: Vec<TypeId>,
    /// Every recorded rejection, sorted by type then reason.
    pub diagnostics: Vec<Rejection>,
}

/// Returns `true` if the method is the `values()` accessor generated for an enum.
#[must_use]
pub fn is_enum_values(method: &Method, repo: &Repo) -> bool {
    method.is_static()
        && is_enum_class(method.class(), repo)
        && method.name() == "values"
        && method.parameters_types().is_empty()
        && repo.types().array_component(method.return_type()) == Some(method.class())
}

/// Returns `true` if the method is the `valueOf(String)` accessor generated for an enum.
#[must_use]
pub fn is_enum_valueof(method: &Method, repo: &Repo) -> bool {
    method.is_static()
        && is_enum_class(method.class(), repo)
        && method.name() == "valueOf"
        && method.parameters_types() == [TypeId::JAVA_LANG_STRING]
        && method.return_type() == method.class()
}

fn is_enum_class(type_: TypeId, repo: &Repo) -> bool {
    repo.get_class(type_).map_or(false, |class| class.is_enum())
}

fn is_live_candidate(
    type_: TypeId,
    candidates: &ConcurrentSet<TypeId>,
    rejected: &ConcurrentSet<TypeId>,
) -> bool {
    candidates.contains_relaxed(&type_) && !rejected.contains(&type_)
}

// The generated members of a candidate only manipulate it in ways integers can model.
fn is_generated_enum_method(
    method: &Method,
    repo: &Repo,
    candidates: &ConcurrentSet<TypeId>,
    rejected: &ConcurrentSet<TypeId>,
) -> bool {
    is_live_candidate(method.class(), candidates, rejected)
        && (method.is_clinit()
            || method.is_init()
            || is_enum_values(method, repo)
            || is_enum_valueof(method, repo))
}

/// Returns `true` if the method has code and its signature or body reference a candidate
/// that is not rejected yet.
#[must_use]
pub fn need_analyze(
    method: &Method,
    types: &TypeTable,
    candidates: &ConcurrentSet<TypeId>,
    rejected: &ConcurrentSet<TypeId>,
) -> bool {
    if method.code().is_none() {
        return false;
    }
    let mut referenced = Vec::new();
    method.gather_types(&mut referenced);
    referenced
        .into_iter()
        .any(|t| is_live_candidate(types.strip_array(t), candidates, rejected))
}

fn check_field(
    field: &Field,
    types: &TypeTable,
    candidates: &ConcurrentSet<TypeId>,
    rejected: &ConcurrentSet<TypeId>,
) -> Option<Rejection> {
    if candidates.contains_relaxed(&field.class()) {
        return None;
    }
    let type_ = types.strip_array(field.type_());
    if !is_live_candidate(type_, candidates, rejected) || field.can_rename() {
        return None;
    }
    rejected.insert(type_);
    log::debug!(
        "reject {} (pinned field {})",
        types.descriptor(type_),
        PrettyPrinter(field, types)
    );
    Some(Rejection {
        type_,
        reason: Reason::Unknown,
        origin: Origin::Field(field.uid()),
        addr: None,
    })
}

/// Runs the enum type fixpoint on a method and rejects the candidates it may upcast.
///
/// # Errors
///
/// Fails if the method code violates one of the properties candidates are selected on.
pub fn analyze_method(
    method: &Method,
    repo: &Repo,
    candidates: &ConcurrentSet<TypeId>,
    rejected: &ConcurrentSet<TypeId>,
) -> AnalysisResult<Vec<Rejection>> {
    if is_generated_enum_method(method, repo, candidates, rejected) {
        return Ok(Vec::new());
    }
    let types = repo.types();
    let mut diagnostics = Vec::new();

    // names of candidates are rewritten in signatures
    if !method.can_rename() {
        let mut signature = Vec::new();
        method.proto().gather_types(&mut signature);
        for type_ in signature {
            let type_ = types.strip_array(type_);
            if is_live_candidate(type_, candidates, rejected) {
                rejected.insert(type_);
                diagnostics.push(Rejection {
                    type_,
                    reason: Reason::Unknown,
                    origin: Origin::Method(method.uid()),
                    addr: None,
                });
            }
        }
    }

    if !need_analyze(method, types, candidates, rejected) {
        return Ok(diagnostics);
    }
    let Some(code) = method.code() else {
        return Ok(diagnostics);
    };

    log::trace!("analyzing {}", PrettyPrinter(method, types));
    let cfg = Cfg::build(code)?;
    let flow = dataflow::forward::<EnumTypeEnvironment>(method, &cfg, types)?;
    let mut detector = EnumUpcastDetector::new(repo, method, candidates, rejected);
    detector.run(&cfg, &flow)?;
    diagnostics.extend(detector.into_rejections());
    Ok(diagnostics)
}

/// Rejects the candidate enums that may be used as objects in the repository, then
/// removes them from the candidates.
///
/// Fields and methods are analyzed in parallel. A single call does not propagate the
/// rejections between methods: a method analyzed before another one rejects a type may
/// reject fewer types than it would afterwards.
///
/// # Errors
///
/// Fails on the first invariant violation found, leaving the candidates unchanged.
pub fn reject_unsafe_enums(
    repo: &Repo,
    candidates: &ConcurrentSet<TypeId>,
) -> AnalysisResult<Rejections> {
    let types = repo.types();
    let rejected = ConcurrentSet::new();

    let mut diagnostics: Vec<Rejection> = repo
        .fields()
        .par_iter()
        .filter_map(|field| check_field(field, types, candidates, &rejected))
        .collect();

    let per_method = repo
        .methods()
        .par_iter()
        .map(|method| analyze_method(method, repo, candidates, &rejected))
        .collect::<AnalysisResult<Vec<_>>>()?;
    diagnostics.extend(per_method.into_iter().flatten());
    diagnostics.sort();

    let rejected = rejected.to_sorted_vec();
    for type_ in &rejected {
        candidates.remove(type_);
    }
    log::debug!(
        "{} candidates rejected, {} remaining",
        rejected.len(),
        candidates.len()
    );

    Ok(Rejections {
        rejected,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = r#"
.class public final enum LColor;
.super Ljava/lang/Enum;
.field private static final synthetic $VALUES:[LColor;

.method static constructor <clinit>()V
.registers 1
    const/4 v0, 0
    new-array v0, v0, [LColor;
    sput-object v0, LColor;->$VALUES:[LColor;
    return-void
.end method

.method public static values()[LColor;
.registers 1
    sget-object v0, LColor;->$VALUES:[LColor;
    return-object v0
.end method

.method public static valueOf(Ljava/lang/String;)LColor;
.registers 3
    sget-object v0, LColor;->$VALUES:[LColor;
    const/4 v1, 0
    aget-object v0, v0, v1
    return-object v0
.end method

.class public final enum LSize;
.super Ljava/lang/Enum;

.class public final enum LPinned;
.super Ljava/lang/Enum;

.class public LHolder;
.field public static size:LSize;
.keep names

.method public static pinned(LPinned;)V
.registers 1
.keep names
    return-void
.end method

.method public static hidden(LColor;)Ljava/lang/Object;
.registers 1
    return-object p0
.end method
"#;

    fn descriptors(repo: &Repo, types: &[TypeId]) -> Vec<String> {
        types
            .iter()
            .map(|t| repo.types().descriptor(*t).to_string())
            .collect()
    }

    #[test]
    fn generated_accessors() {
        let repo = ew_ir::parse(SRC).unwrap();
        let methods: Vec<&Method> = repo.iter_methods().collect();
        assert!(methods.iter().any(|m| is_enum_values(m, &repo)));
        assert!(methods.iter().any(|m| is_enum_valueof(m, &repo)));
        assert!(!methods
            .iter()
            .filter(|m| m.name() == "hidden")
            .any(|m| is_enum_values(m, &repo) || is_enum_valueof(m, &repo)));
    }

    #[test]
    fn shrink_candidates() {
        let repo = ew_ir::parse(SRC).unwrap();
        let candidates: ConcurrentSet<TypeId> = ["LColor;", "LSize;", "LPinned;"]
            .iter()
            .map(|d| repo.types().lookup(d).unwrap())
            .collect();

        let result = reject_unsafe_enums(&repo, &candidates).unwrap();
        assert_eq!(
            descriptors(&repo, &result.rejected),
            vec!["LColor;", "LSize;", "LPinned;"]
        );
        assert!(candidates.is_empty());

        let reasons: Vec<Reason> = result.diagnostics.iter().map(|r| r.reason).collect();
        assert_eq!(
            reasons,
            vec![Reason::CastWhenReturn, Reason::Unknown, Reason::Unknown]
        );
        assert!(matches!(result.diagnostics[1].origin, Origin::Field(_)));
        assert!(matches!(result.diagnostics[2].origin, Origin::Method(_)));
    }

    #[test]
    fn untouched_candidates() {
        let repo = ew_ir::parse(SRC).unwrap();
        let color = repo.types().lookup("LColor;").unwrap();
        let size = repo.types().lookup("LSize;").unwrap();
        let candidates: ConcurrentSet<TypeId> = [size].into_iter().collect();
        let result = reject_unsafe_enums(&repo, &candidates).unwrap();
        assert_eq!(result.rejected, vec![size]);

        // accessors and static initializer of an accepted enum are skipped
        let candidates: ConcurrentSet<TypeId> = [color].into_iter().collect();
        let rejected = ConcurrentSet::new();
        for method in repo.iter_methods().filter(|m| m.class() == color) {
            assert!(analyze_method(method, &repo, &candidates, &rejected)
                .unwrap()
                .is_empty());
        }
        assert!(rejected.is_empty());
    }
}

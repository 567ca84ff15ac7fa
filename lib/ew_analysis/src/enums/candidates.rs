//! Selection of the enums that may be replaced by integers.

use ew_ir::refs::Proto;
use ew_ir::repo::{Class, Repo};
use ew_ir::types::TypeId;

/// Returns `true` if the class is an enum whose instances carry nothing but their
/// ordinal, and whose code never dispatches on them.
#[must_use]
pub fn is_candidate_enum(class: &Class, repo: &Repo) -> bool {
    let types = repo.types();
    let name = types.descriptor(class.type_());

    if !class.is_enum() || class.superclass() != Some(TypeId::JAVA_LANG_ENUM) {
        return false;
    }
    if !class.keep().can_delete() {
        log::trace!("{name} is kept");
        return false;
    }
    if !class.interfaces().is_empty() {
        log::trace!("{name} implements interfaces");
        return false;
    }
    if class.iter_fields(repo).any(|field| !field.is_static()) {
        log::trace!("{name} has instance fields");
        return false;
    }
    if class
        .iter_methods(repo)
        .any(|method| !method.is_static() && method.is_private() && !method.is_init())
    {
        log::trace!("{name} has private instance methods");
        return false;
    }
    let to_string = Proto::new(TypeId::JAVA_LANG_STRING, vec![]);
    if class.get_method("toString", &to_string, repo).is_some() {
        log::trace!("{name} overrides toString()");
        return false;
    }
    if repo.subclasses(class.type_()).next().is_some() {
        log::trace!("{name} has constant specific bodies");
        return false;
    }
    true
}

/// Collects the candidate enums of a repository, sorted.
#[must_use]
pub fn collect_candidate_enums(repo: &Repo) -> Vec<TypeId> {
    let mut candidates: Vec<TypeId> = repo
        .iter_classes()
        .filter(|class| is_candidate_enum(class, repo))
        .map(Class::type_)
        .collect();
    candidates.sort();
    candidates
}

/// Reads a candidates list: one type descriptor per line, `#` starting a comment.
///
/// Descriptors that are not enums of the repository are ignored with a warning.
#[must_use]
pub fn load_candidates(repo: &Repo, text: &str) -> Vec<TypeId> {
    let mut candidates = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        match repo.get_class_by_name(line) {
            Some(class) if class.is_enum() => candidates.push(class.type_()),
            Some(_) => log::warn!("line {}: {line} is not an enum", lineno + 1),
            None => log::warn!("line {}: unknown class {line}", lineno + 1),
        }
    }
    candidates.sort();
    candidates.dedup();
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = r#"
.class public final enum LPlain;
.super Ljava/lang/Enum;
.field public static final enum A:LPlain;

.class public final enum LWithField;
.super Ljava/lang/Enum;
.field private final label:Ljava/lang/String;

.class public final enum LTagged;
.super Ljava/lang/Enum;
.implements Ljava/io/Serializable;

.class public final enum LPrinted;
.super Ljava/lang/Enum;
.method public toString()Ljava/lang/String;
.registers 2
    const-string v0, "printed"
    return-object v0
.end method

.class public enum LBodies;
.super Ljava/lang/Enum;

.class final enum LBodies$1;
.super LBodies;

.class public final enum LHelper;
.super Ljava/lang/Enum;
.method private check()V
.registers 1
    return-void
.end method

.class public LNotEnum;

.class public final enum LKept;
.super Ljava/lang/Enum;
.keep root

.class public final enum LShrinkable;
.super Ljava/lang/Enum;
.keep keep allowshrinking
"#;

    #[test]
    fn collect() {
        let repo = ew_ir::parse(SRC).unwrap();
        let collected = collect_candidate_enums(&repo);
        let expected: Vec<TypeId> = ["LPlain;", "LShrinkable;"]
            .iter()
            .map(|d| repo.types().lookup(d).unwrap())
            .collect();
        assert_eq!(collected, expected);
    }

    #[test]
    fn load() {
        let repo = ew_ir::parse(SRC).unwrap();
        let loaded = load_candidates(
            &repo,
            "# candidates\nLTagged;\n\nLPlain;  # plain\nLNotEnum;\nLMissing;\nLPlain;\n",
        );
        let expected: Vec<TypeId> = ["LPlain;", "LTagged;"]
            .iter()
            .map(|d| repo.types().lookup(d).unwrap())
            .collect();
        let mut expected = expected;
        expected.sort();
        assert_eq!(loaded, expected);
    }
}

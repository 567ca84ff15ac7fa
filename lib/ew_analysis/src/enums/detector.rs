//! Rejection of candidate enums that may be used as plain objects.

use crate::concurrent::ConcurrentSet;
use crate::dataflow::Dataflow;
use crate::enums::analysis::{is_enum_valueof, is_enum_values};
use crate::enums::env::EnumTypeEnvironment;
use crate::enums::reasons::{Origin, Reason, Rejection};
use crate::enums::transfer::analyze_instruction;
use crate::enums::types::EnumTypes;
use crate::errors::{AnalysisResult, InvariantViolation};
use ew_ir::controlflow::Cfg;
use ew_ir::instrs::{Instr, InvokeKind, ValueKind};
use ew_ir::refs::{FieldRef, MethodRef, Proto};
use ew_ir::registers::Reg;
use ew_ir::repo::{Method, Repo};
use ew_ir::types::{TypeId, TypeTable};
use ew_ir::{Addr, PrettyPrinter};
use std::collections::BTreeSet;

// Signatures of the methods whose invocation on enums can be modeled with integers.
struct KnownProtos {
    equals: Proto,
    compare_to: Proto,
    to_string: Proto,
    ordinal: Proto,
    append: Proto,
}

impl KnownProtos {
    fn new() -> Self {
        Self {
            equals: Proto::new(TypeId::BOOLEAN, vec![TypeId::JAVA_LANG_OBJECT]),
            compare_to: Proto::new(TypeId::INT, vec![TypeId::JAVA_LANG_ENUM]),
            to_string: Proto::new(TypeId::JAVA_LANG_STRING, vec![]),
            ordinal: Proto::new(TypeId::INT, vec![]),
            append: Proto::new(
                TypeId::JAVA_LANG_STRING_BUILDER,
                vec![TypeId::JAVA_LANG_OBJECT],
            ),
        }
    }
}

/// Inspects the instructions of a method, once the enum types fixpoint is reached,
/// and rejects the candidate enums that may be cast to another type.
///
/// Rejected types are inserted into the shared rejected set, the candidate set is never
/// modified.
pub struct EnumUpcastDetector<'a> {
    repo: &'a Repo,
    method: &'a Method,
    candidates: &'a ConcurrentSet<TypeId>,
    rejected: &'a ConcurrentSet<TypeId>,
    known: KnownProtos,
    rejections: BTreeSet<Rejection>,
}

impl<'a> EnumUpcastDetector<'a> {
    #[must_use]
    pub fn new(
        repo: &'a Repo,
        method: &'a Method,
        candidates: &'a ConcurrentSet<TypeId>,
        rejected: &'a ConcurrentSet<TypeId>,
    ) -> Self {
        Self {
            repo,
            method,
            candidates,
            rejected,
            known: KnownProtos::new(),
            rejections: BTreeSet::new(),
        }
    }

    fn types(&self) -> &'a TypeTable {
        self.repo.types()
    }

    /// Replays the fixpoint states over every reachable block.
    ///
    /// # Errors
    ///
    /// Fails on the program properties violations described by [`InvariantViolation`].
    pub fn run(&mut self, cfg: &Cfg, dataflow: &Dataflow<EnumTypeEnvironment>) -> AnalysisResult<()> {
        for (_, block) in cfg.iter_ordered_blocks() {
            let Some(entry) = dataflow.entry_at(block.start_addr()) else {
                continue;
            };
            if entry.is_bottom() {
                continue;
            }
            let mut env = entry.clone();
            for (addr, instr) in block.instructions() {
                analyze_instruction(instr, &mut env, self.types());
                self.process_instruction(addr, instr, &env)?;
            }
        }
        Ok(())
    }

    /// Diagnostics of the rejections, in a stable order.
    #[must_use]
    pub fn into_rejections(self) -> Vec<Rejection> {
        self.rejections.into_iter().collect()
    }

    fn process_instruction(
        &mut self,
        addr: Addr,
        instr: &Instr,
        env: &EnumTypeEnvironment,
    ) -> AnalysisResult<()> {
        match instr {
            Instr::CheckCast(src, type_) => {
                self.reject_if_inconsistent(addr, &env.get(*src), *type_, Reason::CastCheckCast);
            }
            Instr::ConstClass(type_) => self.reject(addr, *type_, Reason::UsedAsClassObject),
            Instr::Invoke(kind, args, mref) => match kind {
                InvokeKind::Interface | InvokeKind::Super => {
                    self.process_general_invocation(addr, *kind, args, mref, env)?;
                }
                InvokeKind::Direct => {
                    if self.candidates.contains_relaxed(&mref.class())
                        && !self.is_own_initialization(mref)
                    {
                        return Err(InvariantViolation::DirectInvocationOnCandidate {
                            method: self.method_name(),
                            callee: PrettyPrinter(mref, self.types()).to_string(),
                        }
                        .into());
                    }
                    self.process_general_invocation(addr, *kind, args, mref, env)?;
                }
                InvokeKind::Static => {
                    if !self.is_candidate_generated_accessor(mref) {
                        self.process_general_invocation(addr, *kind, args, mref, env)?;
                    }
                }
                InvokeKind::Virtual => self.process_virtual_invocation(addr, args, mref, env)?,
            },
            Instr::ReturnObject(src) => {
                let return_type = self.method.return_type();
                self.reject_if_inconsistent(addr, &env.get(*src), return_type, Reason::CastWhenReturn);
            }
            Instr::Aput(ValueKind::Object, src, array, _) => {
                self.process_aput_object(addr, *src, *array, env);
            }
            Instr::Iget(ValueKind::Object, _, field) => self.check_instance_field(field)?,
            Instr::Iput(ValueKind::Object, src, _, field) => {
                self.check_instance_field(field)?;
                self.reject_if_inconsistent(addr, &env.get(*src), field.type_(), Reason::CastIsputObject);
            }
            Instr::Sput(ValueKind::Object, src, field) => {
                self.reject_if_inconsistent(addr, &env.get(*src), field.type_(), Reason::CastIsputObject);
            }
            _ => (),
        }
        Ok(())
    }

    // candidate enums do not have instance fields
    fn check_instance_field(&self, field: &FieldRef) -> AnalysisResult<()> {
        if self.candidates.contains_relaxed(&field.class()) {
            return Err(InvariantViolation::CandidateFieldAccess {
                method: self.method_name(),
                field: PrettyPrinter(field, self.types()).to_string(),
            }
            .into());
        }
        Ok(())
    }

    // Initializers of a candidate are only analyzed once it is rejected, and construct
    // its instances with direct calls.
    fn is_own_initialization(&self, mref: &MethodRef) -> bool {
        mref.class() == self.method.class() && (self.method.is_clinit() || self.method.is_init())
    }

    fn is_candidate_generated_accessor(&self, mref: &MethodRef) -> bool {
        if !self.candidates.contains_relaxed(&mref.class()) {
            return false;
        }
        self.repo
            .resolve_method(mref)
            .map_or(false, |m| is_enum_values(m, self.repo) || is_enum_valueof(m, self.repo))
    }

    fn process_aput_object(&mut self, addr: Addr, src: Reg, array: Reg, env: &EnumTypeEnvironment) {
        let types = self.types();
        let elem_types = env.get(src);
        // non array types and arrays of primitives are ignored
        let acceptable: BTreeSet<TypeId> = env
            .get(array)
            .elements()
            .filter_map(|t| types.array_element(t))
            .filter(|t| !types.is_primitive(*t))
            .collect();
        if acceptable.len() > 1 {
            self.reject_all(addr, elem_types.elements(), Reason::CastAputObject);
            self.reject_all(addr, acceptable.into_iter(), Reason::CastAputObject);
        } else if let Some(required) = acceptable.into_iter().next() {
            self.reject_if_inconsistent(addr, &elem_types, required, Reason::CastAputObject);
        }
    }

    fn process_virtual_invocation(
        &mut self,
        addr: Addr,
        args: &[Reg],
        mref: &MethodRef,
        env: &EnumTypeEnvironment,
    ) -> AnalysisResult<()> {
        let types = self.types();
        let container = mref.class();
        let arg_types = |i: usize| {
            args.get(i)
                .map_or_else(EnumTypes::empty, |r| env.get(*r).without_primitives(types))
        };

        if container == TypeId::JAVA_LANG_ENUM || self.candidates.contains_relaxed(&container) {
            let this_types = arg_types(0);
            if mref.signature_matches("equals", &self.known.equals)
                || mref.signature_matches("compareTo", &self.known.compare_to)
            {
                let that_types = arg_types(1);
                let mismatch = match (this_types.single(), that_types.single()) {
                    (Some(this), Some(that)) => this != that,
                    _ => this_types.len() > 1 || that_types.len() > 1,
                };
                if mismatch {
                    self.reject_all(addr, this_types.elements(), Reason::CastThisPointer);
                    self.reject_all(addr, that_types.elements(), Reason::CastParameter);
                }
                return Ok(());
            }
            if mref.signature_matches("toString", &self.known.to_string)
                || mref.signature_matches("name", &self.known.to_string)
                || mref.signature_matches("ordinal", &self.known.ordinal)
            {
                if this_types.len() > 1 {
                    self.reject_all(addr, this_types.elements(), Reason::MultiEnumTypes);
                }
                return Ok(());
            }
        } else if container == TypeId::JAVA_LANG_STRING_BUILDER
            && mref.signature_matches("append", &self.known.append)
        {
            let that_types = arg_types(1);
            if that_types.len() > 1 {
                self.reject_all(addr, that_types.elements(), Reason::MultiEnumTypes);
            }
            return Ok(());
        }
        self.process_general_invocation(addr, InvokeKind::Virtual, args, mref, env)
    }

    /// Checks the invocation arguments against the callee signature.
    fn process_general_invocation(
        &mut self,
        addr: Addr,
        kind: InvokeKind,
        args: &[Reg],
        mref: &MethodRef,
        env: &EnumTypeEnvironment,
    ) -> AnalysisResult<()> {
        let container = mref.class();
        let has_receiver = kind != InvokeKind::Static;
        if has_receiver && self.candidates.contains_relaxed(&container) {
            log::trace!(
                "unsafe invocation {}",
                PrettyPrinter(mref, self.types())
            );
            self.reject(addr, container, Reason::UnsafeInvocationOnCandidateEnum);
        }

        let formals = mref.proto().parameters();
        let expected = formals.len() + usize::from(has_receiver);
        if args.len() != expected {
            return Err(InvariantViolation::InvocationArity {
                method: self.method_name(),
                callee: PrettyPrinter(mref, self.types()).to_string(),
                expected,
                found: args.len(),
            }
            .into());
        }

        let mut args = args.iter();
        if has_receiver {
            if let Some(this) = args.next() {
                self.reject_if_inconsistent(addr, &env.get(*this), container, Reason::CastThisPointer);
            }
        }
        for (arg, formal) in args.zip(formals) {
            self.reject_if_inconsistent(addr, &env.get(*arg), *formal, Reason::CastParameter);
        }
        Ok(())
    }

    /// Rejects the types flowing into a location of type `required` when they are not
    /// consistent with it.
    ///
    /// If `required` is a candidate, any other object type makes it and the other types
    /// rejected. Otherwise every candidate of `observed` is upcast and rejected.
    fn reject_if_inconsistent(
        &mut self,
        addr: Addr,
        observed: &EnumTypes,
        required: TypeId,
        reason: Reason,
    ) {
        if self.candidates.contains_relaxed(&required) {
            let types = self.types();
            let mut need_reject = false;
            for possible in observed.elements() {
                if !types.is_primitive(possible) && possible != required {
                    need_reject = true;
                    self.reject(addr, possible, reason);
                }
            }
            if need_reject {
                self.reject(addr, required, reason);
            }
        } else {
            self.reject_all(addr, observed.elements(), reason);
        }
    }

    fn reject_all(&mut self, addr: Addr, types: impl Iterator<Item = TypeId>, reason: Reason) {
        for type_ in types {
            self.reject(addr, type_, reason);
        }
    }

    fn reject(&mut self, addr: Addr, type_: TypeId, reason: Reason) {
        if !self.candidates.contains_relaxed(&type_) {
            return;
        }
        self.rejected.insert(type_);
        let rejection = Rejection {
            type_,
            reason,
            origin: Origin::Method(self.method.uid()),
            addr: Some(addr),
        };
        if self.rejections.insert(rejection) {
            log::debug!(
                "reject {} ({reason}) in {} at {addr}",
                self.types().descriptor(type_),
                self.method_name()
            );
        }
    }

    fn method_name(&self) -> String {
        PrettyPrinter(self.method, self.types()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflow;
    use crate::errors::AnalysisError;

    const SRC: &str = r#"
.class public final enum LColor;
.super Ljava/lang/Enum;
.field public static final enum RED:LColor;

.method static constructor <clinit>()V
.registers 3
    new-instance v0, LColor;
    const-string v1, "RED"
    const/4 v2, 0
    invoke-direct {v0, v1, v2}, LColor;-><init>(Ljava/lang/String;I)V
    sput-object v0, LColor;->RED:LColor;
    return-void
.end method

.method public static values()[LColor;
.registers 1
    sget-object v0, LColor;->$VALUES:[LColor;
    return-object v0
.end method

.method public static fresh()LColor;
.registers 3
    new-instance v0, LColor;
    const-string v1, "BLUE"
    const/4 v2, 2
    invoke-direct {v0, v1, v2}, LColor;-><init>(Ljava/lang/String;I)V
    return-object v0
.end method

.class public final enum LShape;
.super Ljava/lang/Enum;

.class public LUser;
.field public color:LColor;
.field public static any:Ljava/lang/Object;

.method public static same(LColor;LColor;)Z
.registers 3
    invoke-virtual {p0, p1}, LColor;->equals(Ljava/lang/Object;)Z
    move-result v0
    return v0
.end method

.method public static mixed(LColor;LShape;)Z
.registers 3
    invoke-virtual {p0, p1}, Ljava/lang/Enum;->equals(Ljava/lang/Object;)Z
    move-result v0
    return v0
.end method

.method public static describe(ZLColor;LShape;)Ljava/lang/String;
.registers 4
    move-object v0, p1
    if-eqz p0, :call
    move-object v0, p2
:call
    invoke-virtual {v0}, Ljava/lang/Enum;->toString()Ljava/lang/String;
    move-result-object v0
    return-object v0
.end method

.method public static label(Ljava/lang/StringBuilder;LColor;)V
.registers 2
    invoke-virtual {p0, p1}, Ljava/lang/StringBuilder;->append(Ljava/lang/Object;)Ljava/lang/StringBuilder;
    return-void
.end method

.method public static labels(ZLjava/lang/StringBuilder;LColor;LShape;)V
.registers 5
    move-object v0, p2
    if-eqz p0, :append
    move-object v0, p3
:append
    invoke-virtual {p1, v0}, Ljava/lang/StringBuilder;->append(Ljava/lang/Object;)Ljava/lang/StringBuilder;
    return-void
.end method

.method public static upcast(LColor;)Ljava/lang/Object;
.registers 1
    return-object p0
.end method

.method public static narrow(Ljava/lang/Object;)V
.registers 1
    check-cast p0, LColor;
    return-void
.end method

.method public static renarrow(LColor;)V
.registers 1
    check-cast p0, LColor;
    return-void
.end method

.method public static assign(LUser;LShape;)V
.registers 2
    iput-object p1, p0, LUser;->color:LColor;
    return-void
.end method

.method public static publish(LColor;)V
.registers 1
    sput-object p0, LUser;->any:Ljava/lang/Object;
    return-void
.end method

.method public static order(Ljava/lang/Comparable;LColor;)I
.registers 3
    invoke-interface {p0, p1}, Ljava/lang/Comparable;->compareTo(Ljava/lang/Object;)I
    move-result v0
    return v0
.end method

.method public check(LShape;)V
.registers 2
    invoke-super {p0, p1}, Ljava/lang/Object;->equals(Ljava/lang/Object;)Z
    return-void
.end method

.method public static all()[LColor;
.registers 1
    invoke-static {}, LColor;->values()[LColor;
    move-result-object v0
    return-object v0
.end method

.method public static hash(LColor;)I
.registers 2
    invoke-virtual {p0}, LColor;->hashCode()I
    move-result v0
    return v0
.end method

.method public static store([LColor;LShape;)V
.registers 3
    const/4 v0, 0
    aput-object p1, p0, v0
    return-void
.end method

.method public static direct(LColor;)V
.registers 1
    invoke-direct {p0}, LColor;->secret()V
    return-void
.end method

.method public static peek(LColor;)V
.registers 2
    iget-object v0, p0, LColor;->secret:Ljava/lang/Object;
    return-void
.end method

.method public static arity(LColor;)V
.registers 1
    invoke-static {p0, p0}, LUser;->upcast(LColor;)Ljava/lang/Object;
    return-void
.end method
"#;

    fn run(method_name: &str) -> AnalysisResult<Vec<(String, Reason)>> {
        let repo = ew_ir::parse(SRC).unwrap();
        let types = repo.types();
        let candidates: ConcurrentSet<TypeId> = ["LColor;", "LShape;"]
            .iter()
            .map(|d| types.lookup(d).unwrap())
            .collect();
        let rejected = ConcurrentSet::new();

        let method = repo
            .iter_methods()
            .find(|m| m.name() == method_name)
            .unwrap();
        let cfg = Cfg::build(method.code().unwrap())?;
        let dataflow = dataflow::forward::<EnumTypeEnvironment>(method, &cfg, types)?;
        let mut detector = EnumUpcastDetector::new(&repo, method, &candidates, &rejected);
        detector.run(&cfg, &dataflow)?;
        let rejections = detector.into_rejections();
        assert_eq!(
            rejected.len(),
            rejections.iter().map(|r| r.type_).collect::<BTreeSet<_>>().len()
        );
        assert_eq!(candidates.len(), 2);
        let mut rejections: Vec<(String, Reason)> = rejections
            .into_iter()
            .map(|r| (types.descriptor(r.type_).to_string(), r.reason))
            .collect();
        rejections.sort();
        Ok(rejections)
    }

    fn both(reason: Reason) -> Vec<(String, Reason)> {
        vec![("LColor;".to_string(), reason), ("LShape;".to_string(), reason)]
    }

    #[test]
    fn enum_methods() {
        assert!(run("same").unwrap().is_empty());
        assert!(run("all").unwrap().is_empty());
        assert_eq!(
            run("mixed").unwrap(),
            vec![
                ("LColor;".to_string(), Reason::CastThisPointer),
                ("LShape;".to_string(), Reason::CastParameter),
            ]
        );
        assert_eq!(
            run("hash").unwrap(),
            vec![("LColor;".to_string(), Reason::UnsafeInvocationOnCandidateEnum)]
        );
        assert_eq!(run("describe").unwrap(), both(Reason::MultiEnumTypes));
    }

    #[test]
    fn string_builder() {
        assert!(run("label").unwrap().is_empty());
        assert_eq!(run("labels").unwrap(), both(Reason::MultiEnumTypes));
    }

    #[test]
    fn upcasts() {
        assert_eq!(
            run("upcast").unwrap(),
            vec![("LColor;".to_string(), Reason::CastWhenReturn)]
        );
        assert_eq!(run("store").unwrap(), both(Reason::CastAputObject));
    }

    #[test]
    fn casts_and_fields() {
        assert_eq!(
            run("narrow").unwrap(),
            vec![("LColor;".to_string(), Reason::CastCheckCast)]
        );
        assert!(run("renarrow").unwrap().is_empty());
        assert_eq!(run("assign").unwrap(), both(Reason::CastIsputObject));
        assert_eq!(
            run("publish").unwrap(),
            vec![("LColor;".to_string(), Reason::CastIsputObject)]
        );
    }

    #[test]
    fn general_invocations() {
        assert_eq!(
            run("order").unwrap(),
            vec![("LColor;".to_string(), Reason::CastParameter)]
        );
        assert_eq!(
            run("check").unwrap(),
            vec![("LShape;".to_string(), Reason::CastParameter)]
        );
    }

    #[test]
    fn own_initialization() {
        // the receiver is still an instance of the candidate
        assert_eq!(
            run("<clinit>").unwrap(),
            vec![("LColor;".to_string(), Reason::UnsafeInvocationOnCandidateEnum)]
        );
        assert!(matches!(
            run("fresh"),
            Err(AnalysisError::Invariant(
                InvariantViolation::DirectInvocationOnCandidate { .. }
            ))
        ));
    }

    #[test]
    fn invariants() {
        assert!(matches!(
            run("direct"),
            Err(AnalysisError::Invariant(
                InvariantViolation::DirectInvocationOnCandidate { .. }
            ))
        ));
        assert!(matches!(
            run("peek"),
            Err(AnalysisError::Invariant(
                InvariantViolation::CandidateFieldAccess { .. }
            ))
        ));
        assert!(matches!(
            run("arity"),
            Err(AnalysisError::Invariant(
                InvariantViolation::InvocationArity {
                    expected: 1,
                    found: 2,
                    ..
                }
            ))
        ));
    }
}

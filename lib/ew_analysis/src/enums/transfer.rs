//! Transfer functions of the enum type analysis.

use crate::dataflow::AbstractForwardState;
use crate::enums::env::EnumTypeEnvironment;
use crate::enums::types::EnumTypes;
use crate::errors::{AnalysisError, AnalysisResult, InvariantViolation};
use ew_ir::controlflow::Branch;
use ew_ir::instrs::{Instr, ValueKind};
use ew_ir::registers::Reg;
use ew_ir::repo::Method;
use ew_ir::types::{TypeId, TypeTable};
use ew_ir::PrettyPrinter;

/// Updates the environment with the effect of an instruction.
///
/// Instructions storing a value into [`Reg::RESULT`] update it, the `move-result*`
/// instructions then copy it into their destination.
pub fn analyze_instruction(instr: &Instr, env: &mut EnumTypeEnvironment, types: &TypeTable) {
    let dest = if instr.writes_result() {
        Reg::RESULT
    } else if let Some(dest) = instr.dest() {
        dest
    } else {
        return;
    };

    match instr {
        // materialized by the initial environment
        Instr::LoadParam(_) | Instr::LoadParamWide(_) | Instr::LoadParamObject(_) => (),
        Instr::MoveObject(_, src) => env.set(dest, env.get(*src)),
        Instr::Invoke(_, _, method) => {
            env.set(dest, EnumTypes::singleton(method.proto().return_type()));
        }
        Instr::ConstClass(_) => env.set(dest, EnumTypes::singleton(TypeId::JAVA_LANG_CLASS)),
        Instr::CheckCast(_, type_) => env.set(dest, EnumTypes::singleton(*type_)),
        Instr::MoveResultObject(_) | Instr::MoveResultPseudoObject(_) => {
            env.set(dest, env.get(Reg::RESULT));
        }
        Instr::Sget(ValueKind::Object, field) | Instr::Iget(ValueKind::Object, _, field) => {
            if !types.is_primitive(field.type_()) {
                env.set(dest, EnumTypes::singleton(field.type_()));
            }
        }
        Instr::Aget(ValueKind::Object, array, _) => {
            let elements = env
                .get(*array)
                .elements()
                .filter_map(|t| types.array_element(t))
                .filter(|t| !types.is_primitive(*t))
                .collect();
            env.set(dest, elements);
        }
        _ => {
            let result = match instr {
                Instr::NewInstance(t) | Instr::NewArray(_, t) | Instr::FilledNewArray(_, t) => {
                    EnumTypes::singleton(*t)
                }
                Instr::InstanceOf(_, _) => EnumTypes::singleton(TypeId::BOOLEAN),
                Instr::ArrayLength(_) => EnumTypes::singleton(TypeId::INT),
                _ => EnumTypes::empty(),
            };
            if instr.dest().is_some() && instr.dest_is_wide() {
                env.set_wide(dest, result);
            } else {
                env.set(dest, result);
            }
        }
    }
}

/// Builds the environment at method entry: each parameter register holds its declared
/// type, the receiver (if any) holding the declaring class.
///
/// # Errors
///
/// Fails if the method code does not start with one parameter loading instruction per
/// formal parameter.
pub fn initial_environment(method: &Method, types: &TypeTable) -> AnalysisResult<EnumTypeEnvironment> {
    let code = method
        .code()
        .ok_or_else(|| AnalysisError::NoCode(PrettyPrinter(method, types).to_string()))?;

    let receiver = (!method.is_static()).then_some(method.class());
    let formals: Vec<TypeId> = receiver
        .into_iter()
        .chain(method.parameters_types().iter().copied())
        .collect();
    let loads: Vec<&Instr> = code.param_instructions().collect();
    if loads.len() != formals.len() {
        return Err(InvariantViolation::ParameterMismatch {
            method: PrettyPrinter(method, types).to_string(),
            expected: formals.len(),
            found: loads.len(),
        }
        .into());
    }

    let mut env = EnumTypeEnvironment::top();
    for (load, type_) in loads.into_iter().zip(formals) {
        if let Some(dest) = load.dest() {
            env.set(dest, EnumTypes::singleton(type_));
        }
    }
    Ok(env)
}

impl<'a> AbstractForwardState<'a> for EnumTypeEnvironment {
    type Context<'c> = TypeTable;
    type Error = AnalysisError;

    fn init(method: &Method, types: &TypeTable) -> AnalysisResult<Self> {
        initial_environment(method, types)
    }

    fn join(&mut self, other: &Self, _types: &TypeTable) -> AnalysisResult<()> {
        Self::join(self, other);
        Ok(())
    }

    fn transfer_branch(&mut self, _branch: Branch, _types: &TypeTable) -> AnalysisResult<()> {
        Ok(())
    }

    fn transfer_instr(&mut self, instr: &Instr, types: &TypeTable) -> AnalysisResult<()> {
        analyze_instruction(instr, self, types);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ew_ir::code::Code;
    use ew_ir::instrs::InvokeKind;
    use ew_ir::refs::{FieldRef, MethodRef, Proto};
    use ew_ir::repo::{ClassDef, ClassFlags, KeepState, MethodDef, MethodFlags, Repo};

    fn reg(r: u16) -> Reg {
        Reg::from(r)
    }

    #[test]
    fn moves_and_results() {
        let mut types = TypeTable::new();
        let color = types.intern_descriptor("Lcom/example/Color;").unwrap();
        let colors = types.intern_descriptor("[[Lcom/example/Color;").unwrap();
        let ints = types.intern_descriptor("[I").unwrap();

        let mut env = EnumTypeEnvironment::top();
        env.set(reg(0), EnumTypes::singleton(color));
        analyze_instruction(&Instr::MoveObject(reg(1), reg(0)), &mut env, &types);
        assert_eq!(env.get(reg(1)), EnumTypes::singleton(color));

        let values = MethodRef::new(color, "values", Proto::new(colors, vec![]));
        analyze_instruction(
            &Instr::Invoke(InvokeKind::Static, vec![], values),
            &mut env,
            &types,
        );
        assert_eq!(env.get(Reg::RESULT), EnumTypes::singleton(colors));
        analyze_instruction(&Instr::MoveResultObject(reg(2)), &mut env, &types);
        assert_eq!(env.get(reg(2)), EnumTypes::singleton(colors));

        // innermost element, primitive arrays and non arrays skipped
        env.set(reg(3), EnumTypes::singleton(ints));
        let mut arrays = env.get(reg(2));
        arrays.join_with(&env.get(reg(3)));
        arrays.add(color);
        env.set(reg(4), arrays);
        analyze_instruction(&Instr::Aget(ValueKind::Object, reg(4), reg(5)), &mut env, &types);
        assert_eq!(env.get(Reg::RESULT), EnumTypes::singleton(color));

        analyze_instruction(&Instr::CheckCast(reg(0), TypeId::JAVA_LANG_STRING), &mut env, &types);
        assert_eq!(env.get(Reg::RESULT), EnumTypes::singleton(TypeId::JAVA_LANG_STRING));
        assert_eq!(env.get(reg(0)), EnumTypes::singleton(color));

        analyze_instruction(&Instr::ConstClass(color), &mut env, &types);
        analyze_instruction(&Instr::MoveResultPseudoObject(reg(0)), &mut env, &types);
        assert_eq!(env.get(reg(0)), EnumTypes::singleton(TypeId::JAVA_LANG_CLASS));
    }

    #[test]
    fn fields_and_defaults() {
        let mut types = TypeTable::new();
        let color = types.intern_descriptor("Lcom/example/Color;").unwrap();
        let holder = types.intern_descriptor("Lcom/example/Holder;").unwrap();

        let mut env = EnumTypeEnvironment::top();
        let field = FieldRef::new(holder, "color", color);
        analyze_instruction(&Instr::Sget(ValueKind::Object, field), &mut env, &types);
        assert_eq!(env.get(Reg::RESULT), EnumTypes::singleton(color));

        let count = FieldRef::new(holder, "count", TypeId::INT);
        analyze_instruction(&Instr::Iget(ValueKind::Normal, reg(0), count), &mut env, &types);
        assert!(env.get(Reg::RESULT).is_empty());

        analyze_instruction(&Instr::NewInstance(holder), &mut env, &types);
        assert_eq!(env.get(Reg::RESULT), EnumTypes::singleton(holder));
        analyze_instruction(&Instr::InstanceOf(reg(0), holder), &mut env, &types);
        assert_eq!(env.get(Reg::RESULT), EnumTypes::singleton(TypeId::BOOLEAN));
        analyze_instruction(&Instr::ConstString("a".to_string()), &mut env, &types);
        assert!(env.get(Reg::RESULT).is_empty());

        env.set(reg(1), EnumTypes::singleton(color));
        env.set(reg(2), EnumTypes::singleton(color));
        analyze_instruction(&Instr::ConstWide(reg(1), 3), &mut env, &types);
        assert!(env.get(reg(1)).is_empty());
        assert!(env.get(reg(2)).is_empty());

        // no destination
        let before = env.clone();
        analyze_instruction(&Instr::ReturnVoid, &mut env, &types);
        analyze_instruction(&Instr::Throw(reg(0)), &mut env, &types);
        assert_eq!(env, before);
    }

    #[test]
    fn parameters_loading() {
        let mut repo = Repo::new();
        let holder = repo.types_mut().intern_descriptor("LHolder;").unwrap();
        let color = repo.types_mut().intern_descriptor("LColor;").unwrap();
        let mut class = ClassDef::new(
            holder,
            ClassFlags::ACC_PUBLIC,
            Some(TypeId::JAVA_LANG_OBJECT),
        );
        let method = |name: &str, instrs: Vec<Instr>| MethodDef {
            name: name.to_string(),
            proto: Proto::new(TypeId::VOID, vec![color]),
            flags: MethodFlags::ACC_PUBLIC | MethodFlags::ACC_STATIC,
            code: Some(Code::new(1, 1, instrs, vec![]).unwrap()),
            keep: KeepState::new(),
        };
        class.methods.push(method(
            "loaded",
            vec![Instr::LoadParamObject(reg(0)), Instr::ReturnVoid],
        ));
        class.methods.push(method("unloaded", vec![Instr::ReturnVoid]));
        repo.register_class(class).unwrap();

        let loaded = repo.iter_methods().find(|m| m.name() == "loaded").unwrap();
        let env = initial_environment(loaded, repo.types()).unwrap();
        assert_eq!(env.get(reg(0)), EnumTypes::singleton(color));

        let unloaded = repo.iter_methods().find(|m| m.name() == "unloaded").unwrap();
        assert!(matches!(
            initial_environment(unloaded, repo.types()),
            Err(AnalysisError::Invariant(InvariantViolation::ParameterMismatch {
                expected: 1,
                found: 0,
                ..
            }))
        ));
    }
}

//! Textual assembly parsing.
//!
//! The accepted syntax is close to smali, line oriented:
//!
//! ```text
//! .class public final enum Lcom/example/Color;
//! .super Ljava/lang/Enum;
//! .field public static final enum RED:Lcom/example/Color;
//! .keep names
//!
//! .method public static ordinal(Lcom/example/Color;)I
//! .registers 2
//!     invoke-virtual {p0}, Lcom/example/Color;->ordinal()I
//!     move-result v0
//!     return v0
//! .end method
//! .end class
//! ```
//!
//! Differences with smali:
//!  - invocations and `filled-new-array` take one register per argument, wide arguments
//!    included,
//!  - switches are written inline: `switch v0, [0 -> :a, 1 -> :b]`,
//!  - `.keep` applies to the enclosing method, else to the field declared on the previous
//!    line, else to the class,
//!  - `.end class` is optional.
//!
//! Parameters live in the last registers of the frame and can be named `pN`. Parameter
//! loading instructions are synthesized at the start of every concrete method.

use crate::code::{Code, Handler, TryItem};
use crate::errors::{IrError, IrResult};
use crate::instrs::{
    BinOp, CmpKind, Comp, Instr, InvokeKind, NumKind, UnOp, ValueKind,
};
use crate::refs::{FieldRef, MethodRef, Proto};
use crate::registers::Reg;
use crate::repo::{
    ClassDef, ClassFlags, ClassUid, FieldDef, FieldFlags, KeepState, Keywords, MethodDef,
    MethodFlags, Repo,
};
use crate::types::{Type, TypeId, TypeTable};
use crate::Addr;
use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, is_not, tag, take_while1};
use nom::character::complete::{char, digit1, hex_digit1, none_of, one_of, space0, space1};
use nom::combinator::{all_consuming, map, map_res, opt, recognize, value};
use nom::multi::{many0, many0_count, separated_list0};
use nom::sequence::{delimited, pair, preceded, separated_pair, terminated, tuple};
use nom::{Finish, IResult};
use std::collections::BTreeMap;

/// Parses a whole assembly source into a fresh repository.
pub fn parse_repo(input: &str) -> IrResult<Repo> {
    let mut repo = Repo::new();
    parse_into(&mut repo, input)?;
    Ok(repo)
}

/// Parses an assembly source and registers its classes into an existing repository.
pub fn parse_into(repo: &mut Repo, input: &str) -> IrResult<Vec<ClassUid>> {
    log::trace!("parsing assembly...");
    let mut parser = Parser::default();
    for (i, line) in input.lines().enumerate() {
        let line = strip_comment(line).trim();
        if line.is_empty() {
            continue;
        }
        parser
            .line(repo, line)
            .map_err(|err| err.at_line(i + 1))?;
    }
    let nb_lines = input.lines().count();
    parser
        .finish_class(repo)
        .map_err(|err| err.at_line(nb_lines))?;
    log::debug!("{} classes parsed", parser.classes.len());
    Ok(parser.classes)
}

fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..i],
            _ => (),
        }
    }
    line
}

#[derive(Default)]
struct Parser {
    class: Option<ClassDef>,
    method: Option<MethodBuilder>,
    after_field: bool,
    classes: Vec<ClassUid>,
}

impl Parser {
    fn line(&mut self, repo: &mut Repo, line: &str) -> IrResult<()> {
        let after_field = std::mem::take(&mut self.after_field);
        if let Some(label) = line.strip_prefix(':') {
            return self.current_method(line)?.define_label(label);
        }
        if !line.starts_with('.') {
            let (opcode, operands) = instruction_line(line).finish()?.1;
            let method = self
                .method
                .as_mut()
                .ok_or_else(|| IrError::Misplaced(opcode.to_string(), "method".to_string()))?;
            return method.push(repo.types_mut(), opcode, &operands);
        }

        let (directive, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        match directive {
            ".class" => {
                self.finish_class(repo)?;
                let (words, descr) = split_last_word(rest, directive)?;
                let flags = parse_flags::<ClassFlags>(words)?;
                let type_ = repo.types_mut().intern_descriptor(descr)?;
                self.class = Some(ClassDef::new(type_, flags, None));
            }
            ".super" => {
                let type_ = repo.types_mut().intern_descriptor(rest)?;
                self.current_class(directive)?.superclass = Some(type_);
            }
            ".implements" => {
                let type_ = repo.types_mut().intern_descriptor(rest)?;
                self.current_class(directive)?.interfaces.push(type_);
            }
            ".source" => (),
            ".field" => {
                if self.method.is_some() {
                    return Err(IrError::Misplaced(directive.to_string(), "class".to_string()));
                }
                let (words, decl) = split_last_word(rest, directive)?;
                let flags = parse_flags::<FieldFlags>(words)?;
                let (name, typ) = all_consuming(field_decl)(decl).finish()?.1;
                let type_ = repo.types_mut().intern(&typ);
                self.current_class(directive)?.fields.push(FieldDef {
                    name: name.to_string(),
                    type_,
                    flags,
                    keep: KeepState::new(),
                });
                self.after_field = true;
            }
            ".method" => {
                if self.method.is_some() {
                    return Err(IrError::Unterminated("method".to_string()));
                }
                let (words, decl) = split_last_word(rest, directive)?;
                let flags = parse_flags::<MethodFlags>(words)?;
                let (name, (params, ret)) = all_consuming(method_decl)(decl).finish()?.1;
                let class_type = self.current_class(directive)?.type_;
                let types = repo.types_mut();
                let proto = Proto::new(
                    types.intern(&ret),
                    params.iter().map(|p| types.intern(p)).collect(),
                );
                self.method = Some(MethodBuilder::new(
                    class_type,
                    name.to_string(),
                    proto,
                    flags,
                    types,
                ));
            }
            ".registers" | ".locals" => {
                let count: u32 = rest
                    .parse()
                    .map_err(|_| IrError::BadOperands(directive.to_string()))?;
                let method = self.current_method(directive)?;
                if method.registers.is_some() {
                    return Err(IrError::Misplaced(
                        directive.to_string(),
                        "method header".to_string(),
                    ));
                }
                method.registers = Some(if directive == ".locals" {
                    count + method.ins
                } else {
                    count
                });
            }
            ".keep" => {
                let keep = if let Some(method) = self.method.as_mut() {
                    &mut method.keep
                } else {
                    let class = self.class.as_mut().ok_or_else(|| {
                        IrError::Misplaced(directive.to_string(), "class".to_string())
                    })?;
                    match class.fields.last_mut() {
                        Some(field) if after_field => &mut field.keep,
                        _ => &mut class.keep,
                    }
                };
                for word in rest.split_whitespace() {
                    apply_keep(keep, word)?;
                }
                self.after_field = after_field;
            }
            ".catch" | ".catchall" => {
                let (catch_type, (start, end), handler) =
                    all_consuming(catch_decl)(rest).finish()?.1;
                let catch_type = match (directive, catch_type) {
                    (".catch", Some(typ)) => Some(repo.types_mut().intern(&typ)),
                    (".catchall", None) => None,
                    _ => return Err(IrError::BadOperands(directive.to_string())),
                };
                self.current_method(directive)?.catches.push(CatchDecl {
                    catch_type,
                    start: start.to_string(),
                    end: end.to_string(),
                    handler: handler.to_string(),
                });
            }
            ".end" => match rest {
                "method" => {
                    let method = self
                        .method
                        .take()
                        .ok_or_else(|| IrError::Misplaced(line.to_string(), "method".to_string()))?;
                    let def = method.finish()?;
                    self.current_class(line)?.methods.push(def);
                }
                "class" => {
                    if self.class.is_none() {
                        return Err(IrError::Misplaced(line.to_string(), "class".to_string()));
                    }
                    self.finish_class(repo)?;
                }
                _ => return Err(IrError::Unknown(line.to_string())),
            },
            _ => return Err(IrError::Unknown(directive.to_string())),
        }
        Ok(())
    }

    fn current_class(&mut self, what: &str) -> IrResult<&mut ClassDef> {
        self.class
            .as_mut()
            .ok_or_else(|| IrError::Misplaced(what.to_string(), "class".to_string()))
    }

    fn current_method(&mut self, what: &str) -> IrResult<&mut MethodBuilder> {
        self.method
            .as_mut()
            .ok_or_else(|| IrError::Misplaced(what.to_string(), "method".to_string()))
    }

    fn finish_class(&mut self, repo: &mut Repo) -> IrResult<()> {
        if let Some(method) = &self.method {
            return Err(IrError::Unterminated(format!("method {}", method.name)));
        }
        if let Some(mut class) = self.class.take() {
            if class.superclass.is_none() && class.type_ != TypeId::JAVA_LANG_OBJECT {
                class.superclass = Some(TypeId::JAVA_LANG_OBJECT);
            }
            self.classes.push(repo.register_class(class)?);
        }
        Ok(())
    }
}

fn split_last_word<'a>(rest: &'a str, directive: &str) -> IrResult<(&'a str, &'a str)> {
    match rest.rsplit_once(char::is_whitespace) {
        Some((words, last)) => Ok((words, last)),
        None if !rest.is_empty() => Ok(("", rest)),
        None => Err(IrError::BadOperands(directive.to_string())),
    }
}

fn parse_flags<F: Keywords>(words: &str) -> IrResult<F> {
    F::from_keywords(words).map_err(|word| IrError::Unknown(format!("access flag {word}")))
}

fn apply_keep(keep: &mut KeepState, word: &str) -> IrResult<()> {
    match word {
        "root" => keep.set_root(),
        "keep" => keep.set_has_keep(),
        "names" => keep.set_keep_name(),
        "string" => keep.ref_by_string(),
        "resources" => keep.set_referenced_by_resources(),
        "allowshrinking" => keep.set_allowshrinking(),
        "allowobfuscation" => keep.set_allowobfuscation(),
        _ => return Err(IrError::Unknown(format!("keep attribute {word}"))),
    }
    Ok(())
}

struct CatchDecl {
    catch_type: Option<TypeId>,
    start: String,
    end: String,
    handler: String,
}

// Instructions awaiting label resolution.
enum Pending {
    Ready(Instr),
    Goto(String),
    If(Comp, Reg, Reg, String),
    Ifz(Comp, Reg, String),
    Switch(Reg, Vec<(i32, String)>),
}

struct MethodBuilder {
    name: String,
    proto: Proto,
    flags: MethodFlags,
    keep: KeepState,
    // parameters loading, receiver first
    params: Vec<Instr>,
    ins: u32,
    registers: Option<u32>,
    body: Vec<Pending>,
    labels: BTreeMap<String, usize>,
    catches: Vec<CatchDecl>,
}

impl MethodBuilder {
    fn new(
        class: TypeId,
        name: String,
        proto: Proto,
        flags: MethodFlags,
        types: &TypeTable,
    ) -> Self {
        let mut kinds = Vec::new();
        if !flags.contains(MethodFlags::ACC_STATIC) {
            kinds.push(class);
        }
        kinds.extend_from_slice(proto.parameters());

        // registers are relative to the first parameter register until the frame size is known
        let mut params = Vec::with_capacity(kinds.len());
        let mut ins = 0;
        for type_ in kinds {
            let reg = Reg::from(ins);
            if !types.is_primitive(type_) {
                params.push(Instr::LoadParamObject(reg));
                ins += 1;
            } else if types.is_wide(type_) {
                params.push(Instr::LoadParamWide(reg));
                ins += 2;
            } else {
                params.push(Instr::LoadParam(reg));
                ins += 1;
            }
        }

        Self {
            name,
            proto,
            flags,
            keep: KeepState::new(),
            params,
            ins,
            registers: None,
            body: Vec::new(),
            labels: BTreeMap::new(),
            catches: Vec::new(),
        }
    }

    fn define_label(&mut self, label: &str) -> IrResult<()> {
        if self
            .labels
            .insert(label.to_string(), self.body.len())
            .is_some()
        {
            return Err(IrError::DuplicateLabel(label.to_string()));
        }
        Ok(())
    }

    fn frame(&mut self) -> Frame {
        let registers = *self.registers.get_or_insert(self.ins);
        Frame {
            registers,
            ins: self.ins,
        }
    }

    fn push(&mut self, types: &mut TypeTable, opcode: &str, operands: &[Operand]) -> IrResult<()> {
        let frame = self.frame();
        let mut lowering = Lowering {
            types,
            frame,
            opcode,
        };
        let lowered = lowering.lower(operands)?;
        self.body.extend(lowered);
        Ok(())
    }

    fn label(&self, label: &str, offset: usize) -> IrResult<Addr> {
        self.labels
            .get(label)
            .map(|idx| Addr(idx + offset))
            .ok_or_else(|| IrError::UnknownLabel(label.to_string()))
    }

    fn finish(mut self) -> IrResult<MethodDef> {
        let has_code = !self
            .flags
            .intersects(MethodFlags::ACC_ABSTRACT | MethodFlags::ACC_NATIVE);
        if !has_code {
            if !self.body.is_empty() {
                return Err(IrError::Misplaced(
                    "instruction".to_string(),
                    "concrete method".to_string(),
                ));
            }
            return Ok(MethodDef {
                name: self.name,
                proto: self.proto,
                flags: self.flags,
                code: None,
                keep: self.keep,
            });
        }
        if self.body.is_empty() {
            return Err(IrError::NoCode(self.name));
        }

        let Frame { registers, ins } = self.frame();
        if registers < ins {
            return Err(IrError::BadRegister(format!("{ins} parameters"), registers));
        }
        let first_param = registers - ins;
        let offset = self.params.len();

        let mut instrs = Vec::with_capacity(offset + self.body.len());
        for param in &self.params {
            instrs.push(match param {
                Instr::LoadParam(r) => Instr::LoadParam(Reg::from(r.value() + first_param)),
                Instr::LoadParamWide(r) => {
                    Instr::LoadParamWide(Reg::from(r.value() + first_param))
                }
                Instr::LoadParamObject(r) => {
                    Instr::LoadParamObject(Reg::from(r.value() + first_param))
                }
                _ => return Err(IrError::Internal("unexpected parameter load".to_string())),
            });
        }
        for pending in std::mem::take(&mut self.body) {
            instrs.push(match pending {
                Pending::Ready(instr) => instr,
                Pending::Goto(l) => Instr::Goto(self.label(&l, offset)?),
                Pending::If(comp, r1, r2, l) => Instr::If(comp, r1, r2, self.label(&l, offset)?),
                Pending::Ifz(comp, r, l) => Instr::Ifz(comp, r, self.label(&l, offset)?),
                Pending::Switch(r, cases) => Instr::Switch(
                    r,
                    cases
                        .iter()
                        .map(|(key, l)| Ok((*key, self.label(l, offset)?)))
                        .collect::<IrResult<_>>()?,
                ),
            });
        }

        let mut tries: Vec<(Addr, Addr, Vec<Handler>)> = Vec::new();
        for catch in &self.catches {
            let start = self.label(&catch.start, offset)?;
            let end = self.label(&catch.end, offset)?;
            let handler = Handler {
                catch_type: catch.catch_type,
                addr: self.label(&catch.handler, offset)?,
            };
            match tries.iter_mut().find(|(s, e, _)| *s == start && *e == end) {
                Some((_, _, handlers)) => handlers.push(handler),
                None => tries.push((start, end, vec![handler])),
            }
        }
        let tries = tries
            .into_iter()
            .map(|(start, end, handlers)| TryItem::new(start, end, handlers))
            .collect();

        log::trace!(
            "method {} lowered to {} instructions",
            self.name,
            instrs.len()
        );
        Ok(MethodDef {
            name: self.name,
            proto: self.proto,
            flags: self.flags,
            code: Some(Code::new(registers, ins, instrs, tries)?),
            keep: self.keep,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    registers: u32,
    ins: u32,
}

impl Frame {
    fn resolve(self, prefix: char, num: u32) -> IrResult<Reg> {
        if prefix == 'p' {
            if num < self.ins {
                Ok(Reg::from(self.registers - self.ins + num))
            } else {
                Err(IrError::BadRegister(format!("p{num}"), self.ins))
            }
        } else if num < self.registers {
            Ok(Reg::from(num))
        } else {
            Err(IrError::BadRegister(format!("v{num}"), self.registers))
        }
    }
}

/// Instruction operands, as written.
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Reg(char, u32),
    RegList(Vec<(char, u32)>),
    RegRange((char, u32), (char, u32)),
    Int(i64),
    Str(String),
    Label(String),
    Cases(Vec<(i64, String)>),
    Type(Type),
    Field(Type, String, Type),
    Method(Type, String, Vec<Type>, Type),
}

struct Lowering<'t> {
    types: &'t mut TypeTable,
    frame: Frame,
    opcode: &'t str,
}

impl<'t> Lowering<'t> {
    fn bad(&self) -> IrError {
        IrError::BadOperands(self.opcode.to_string())
    }

    fn reg(&self, op: &Operand) -> IrResult<Reg> {
        match op {
            Operand::Reg(prefix, num) => self.frame.resolve(*prefix, *num),
            _ => Err(self.bad()),
        }
    }

    fn regs(&self, op: &Operand) -> IrResult<Vec<Reg>> {
        match op {
            Operand::RegList(regs) => regs
                .iter()
                .map(|(prefix, num)| self.frame.resolve(*prefix, *num))
                .collect(),
            Operand::RegRange(first, last) => {
                let first = self.frame.resolve(first.0, first.1)?.value();
                let last = self.frame.resolve(last.0, last.1)?.value();
                if first > last {
                    return Err(self.bad());
                }
                Ok((first..=last).map(Reg::from).collect())
            }
            _ => Err(self.bad()),
        }
    }

    fn type_(&mut self, op: &Operand) -> IrResult<TypeId> {
        match op {
            Operand::Type(typ) => Ok(self.types.intern(typ)),
            _ => Err(self.bad()),
        }
    }

    fn field(&mut self, op: &Operand) -> IrResult<FieldRef> {
        match op {
            Operand::Field(class, name, typ) => Ok(FieldRef::new(
                self.types.intern(class),
                name.clone(),
                self.types.intern(typ),
            )),
            _ => Err(self.bad()),
        }
    }

    fn method(&mut self, op: &Operand) -> IrResult<MethodRef> {
        match op {
            Operand::Method(class, name, params, ret) => {
                let proto = Proto::new(
                    self.types.intern(ret),
                    params.iter().map(|p| self.types.intern(p)).collect(),
                );
                Ok(MethodRef::new(self.types.intern(class), name.clone(), proto))
            }
            _ => Err(self.bad()),
        }
    }

    fn int(&self, op: &Operand) -> IrResult<i64> {
        match op {
            Operand::Int(v) => Ok(*v),
            _ => Err(self.bad()),
        }
    }

    fn int32(&self, op: &Operand) -> IrResult<i32> {
        let v = self.int(op)?;
        i32::try_from(v)
            .or_else(|_| u32::try_from(v).map(|u| u as i32))
            .map_err(|_| self.bad())
    }

    fn label(&self, op: &Operand) -> IrResult<String> {
        match op {
            Operand::Label(l) => Ok(l.clone()),
            _ => Err(self.bad()),
        }
    }

    fn arity<'o, const N: usize>(&self, ops: &'o [Operand]) -> IrResult<&'o [Operand; N]> {
        ops.try_into().map_err(|_| self.bad())
    }

    fn pseudo(kind: ValueKind, dest: Reg) -> Instr {
        match kind {
            ValueKind::Wide => Instr::MoveResultPseudoWide(dest),
            ValueKind::Object => Instr::MoveResultPseudoObject(dest),
            _ => Instr::MoveResultPseudo(dest),
        }
    }

    #[allow(clippy::too_many_lines)]
    fn lower(&mut self, ops: &[Operand]) -> IrResult<Vec<Pending>> {
        let (base, variant) = self
            .opcode
            .split_once('/')
            .map_or((self.opcode, None), |(base, variant)| (base, Some(variant)));

        let instrs = match base {
            "nop" => {
                self.arity::<0>(ops)?;
                vec![Instr::Nop]
            }
            "move" | "move-wide" | "move-object" => {
                let [d, s] = self.arity(ops)?;
                let (d, s) = (self.reg(d)?, self.reg(s)?);
                vec![match base {
                    "move" => Instr::Move(d, s),
                    "move-wide" => Instr::MoveWide(d, s),
                    _ => Instr::MoveObject(d, s),
                }]
            }
            "move-result" | "move-result-wide" | "move-result-object" | "move-exception" => {
                let [d] = self.arity(ops)?;
                let d = self.reg(d)?;
                vec![match base {
                    "move-result" => Instr::MoveResult(d),
                    "move-result-wide" => Instr::MoveResultWide(d),
                    "move-result-object" => Instr::MoveResultObject(d),
                    _ => Instr::MoveException(d),
                }]
            }
            "return-void" => {
                self.arity::<0>(ops)?;
                vec![Instr::ReturnVoid]
            }
            "return" | "return-wide" | "return-object" => {
                let [r] = self.arity(ops)?;
                let r = self.reg(r)?;
                vec![match base {
                    "return" => Instr::Return(r),
                    "return-wide" => Instr::ReturnWide(r),
                    _ => Instr::ReturnObject(r),
                }]
            }
            "const" => {
                let [d, v] = self.arity(ops)?;
                vec![Instr::Const(self.reg(d)?, self.int32(v)?)]
            }
            "const-wide" => {
                let [d, v] = self.arity(ops)?;
                vec![Instr::ConstWide(self.reg(d)?, self.int(v)?)]
            }
            "const-string" => {
                let [d, s] = self.arity(ops)?;
                let Operand::Str(s) = s else {
                    return Err(self.bad());
                };
                vec![
                    Instr::ConstString(s.clone()),
                    Instr::MoveResultPseudoObject(self.reg(d)?),
                ]
            }
            "const-class" => {
                let [d, t] = self.arity(ops)?;
                vec![
                    Instr::ConstClass(self.type_(t)?),
                    Instr::MoveResultPseudoObject(self.reg(d)?),
                ]
            }
            "monitor-enter" | "monitor-exit" | "throw" | "fill-array-data" => {
                let [r] = self.arity(ops)?;
                let r = self.reg(r)?;
                vec![match base {
                    "monitor-enter" => Instr::MonitorEnter(r),
                    "monitor-exit" => Instr::MonitorExit(r),
                    "throw" => Instr::Throw(r),
                    _ => Instr::FillArrayData(r),
                }]
            }
            "check-cast" => {
                let [r, t] = self.arity(ops)?;
                let r = self.reg(r)?;
                vec![
                    Instr::CheckCast(r, self.type_(t)?),
                    Instr::MoveResultPseudoObject(r),
                ]
            }
            "instance-of" => {
                let [d, s, t] = self.arity(ops)?;
                vec![
                    Instr::InstanceOf(self.reg(s)?, self.type_(t)?),
                    Instr::MoveResultPseudo(self.reg(d)?),
                ]
            }
            "array-length" => {
                let [d, s] = self.arity(ops)?;
                vec![
                    Instr::ArrayLength(self.reg(s)?),
                    Instr::MoveResultPseudo(self.reg(d)?),
                ]
            }
            "new-instance" => {
                let [d, t] = self.arity(ops)?;
                vec![
                    Instr::NewInstance(self.type_(t)?),
                    Instr::MoveResultPseudoObject(self.reg(d)?),
                ]
            }
            "new-array" => {
                let [d, size, t] = self.arity(ops)?;
                vec![
                    Instr::NewArray(self.reg(size)?, self.type_(t)?),
                    Instr::MoveResultPseudoObject(self.reg(d)?),
                ]
            }
            "filled-new-array" => {
                let [regs, t] = self.arity(ops)?;
                vec![Instr::FilledNewArray(self.regs(regs)?, self.type_(t)?)]
            }
            "goto" => {
                let [l] = self.arity(ops)?;
                return Ok(vec![Pending::Goto(self.label(l)?)]);
            }
            "switch" => {
                let [r, cases] = self.arity(ops)?;
                let Operand::Cases(cases) = cases else {
                    return Err(self.bad());
                };
                let cases = cases
                    .iter()
                    .map(|(key, l)| {
                        i32::try_from(*key)
                            .map(|key| (key, l.clone()))
                            .map_err(|_| self.bad())
                    })
                    .collect::<IrResult<_>>()?;
                return Ok(vec![Pending::Switch(self.reg(r)?, cases)]);
            }
            "cmpl-float" | "cmpg-float" | "cmpl-double" | "cmpg-double" | "cmp-long" => {
                let kind = match base {
                    "cmpl-float" => CmpKind::CmplFloat,
                    "cmpg-float" => CmpKind::CmpgFloat,
                    "cmpl-double" => CmpKind::CmplDouble,
                    "cmpg-double" => CmpKind::CmpgDouble,
                    _ => CmpKind::CmpLong,
                };
                let [d, a, b] = self.arity(ops)?;
                vec![Instr::Cmp(kind, self.reg(d)?, self.reg(a)?, self.reg(b)?)]
            }
            "int-to-byte" | "int-to-char" | "int-to-short" => {
                let op = match base {
                    "int-to-byte" => UnOp::IntToByte,
                    "int-to-char" => UnOp::IntToChar,
                    _ => UnOp::IntToShort,
                };
                let [d, s] = self.arity(ops)?;
                vec![Instr::UnOp(op, self.reg(d)?, self.reg(s)?)]
            }
            _ => return self.lower_family(base, variant, ops),
        };
        Ok(instrs.into_iter().map(Pending::Ready).collect())
    }

    // Opcodes built from a family name and a suffix (kinds, comparisons, etc.).
    fn lower_family(
        &mut self,
        base: &str,
        variant: Option<&str>,
        ops: &[Operand],
    ) -> IrResult<Vec<Pending>> {
        if let Some(comp) = base.strip_prefix("if-") {
            if let Some(comp) = comp.strip_suffix('z').and_then(Comp::from_name) {
                let [r, l] = self.arity(ops)?;
                return Ok(vec![Pending::Ifz(comp, self.reg(r)?, self.label(l)?)]);
            }
            if let Some(comp) = Comp::from_name(comp) {
                let [a, b, l] = self.arity(ops)?;
                return Ok(vec![Pending::If(
                    comp,
                    self.reg(a)?,
                    self.reg(b)?,
                    self.label(l)?,
                )]);
            }
        }

        if let Some(kind) = base.strip_prefix("invoke-").and_then(InvokeKind::from_name) {
            let [args, m] = self.arity(ops)?;
            let instr = Instr::Invoke(kind, self.regs(args)?, self.method(m)?);
            return Ok(vec![Pending::Ready(instr)]);
        }

        for (prefix, is_get) in [("aget", true), ("aput", false)] {
            if let Some(kind) = base.strip_prefix(prefix).and_then(ValueKind::from_suffix) {
                let [v, arr, idx] = self.arity(ops)?;
                let (v, arr, idx) = (self.reg(v)?, self.reg(arr)?, self.reg(idx)?);
                return Ok(if is_get {
                    vec![
                        Pending::Ready(Instr::Aget(kind, arr, idx)),
                        Pending::Ready(Self::pseudo(kind, v)),
                    ]
                } else {
                    vec![Pending::Ready(Instr::Aput(kind, v, arr, idx))]
                });
            }
        }
        for (prefix, is_get) in [("iget", true), ("iput", false)] {
            if let Some(kind) = base.strip_prefix(prefix).and_then(ValueKind::from_suffix) {
                let [v, obj, f] = self.arity(ops)?;
                let (v, obj, f) = (self.reg(v)?, self.reg(obj)?, self.field(f)?);
                return Ok(if is_get {
                    vec![
                        Pending::Ready(Instr::Iget(kind, obj, f)),
                        Pending::Ready(Self::pseudo(kind, v)),
                    ]
                } else {
                    vec![Pending::Ready(Instr::Iput(kind, v, obj, f))]
                });
            }
        }
        for (prefix, is_get) in [("sget", true), ("sput", false)] {
            if let Some(kind) = base.strip_prefix(prefix).and_then(ValueKind::from_suffix) {
                let [v, f] = self.arity(ops)?;
                let (v, f) = (self.reg(v)?, self.field(f)?);
                return Ok(if is_get {
                    vec![
                        Pending::Ready(Instr::Sget(kind, f)),
                        Pending::Ready(Self::pseudo(kind, v)),
                    ]
                } else {
                    vec![Pending::Ready(Instr::Sput(kind, v, f))]
                });
            }
        }

        if let Some((from, to)) = base.split_once("-to-") {
            if let (Some(from), Some(to)) = (NumKind::from_name(from), NumKind::from_name(to)) {
                let [d, s] = self.arity(ops)?;
                let instr = Instr::UnOp(UnOp::Convert(from, to), self.reg(d)?, self.reg(s)?);
                return Ok(vec![Pending::Ready(instr)]);
            }
        }

        if let Some((name, kind)) = base.split_once('-') {
            if let Some(kind) = NumKind::from_name(kind) {
                let unop = match name {
                    "neg" => Some(UnOp::Neg(kind)),
                    "not" => Some(UnOp::Not(kind)),
                    _ => None,
                };
                if let Some(op) = unop {
                    let [d, s] = self.arity(ops)?;
                    return Ok(vec![Pending::Ready(Instr::UnOp(
                        op,
                        self.reg(d)?,
                        self.reg(s)?,
                    ))]);
                }
                if let Some(op) = BinOp::from_name(name) {
                    let instr = match variant {
                        None => {
                            let [d, a, b] = self.arity(ops)?;
                            Instr::BinOp(op, kind, self.reg(d)?, self.reg(a)?, self.reg(b)?)
                        }
                        Some("2addr") => {
                            let [a, b] = self.arity(ops)?;
                            let a = self.reg(a)?;
                            Instr::BinOp(op, kind, a, a, self.reg(b)?)
                        }
                        Some("lit8" | "lit16") if kind == NumKind::Int => {
                            let [d, s, lit] = self.arity(ops)?;
                            Instr::BinOpLit(op, self.reg(d)?, self.reg(s)?, self.int32(lit)?)
                        }
                        Some(_) => return Err(IrError::Unknown(self.opcode.to_string())),
                    };
                    return Ok(vec![Pending::Ready(instr)]);
                }
            }
        }

        Err(IrError::Unknown(self.opcode.to_string()))
    }
}

fn comma(input: &str) -> IResult<&str, (), IrError> {
    value((), tuple((space0, char(','), space0)))(input)
}

fn descriptor(input: &str) -> IResult<&str, Type, IrError> {
    map_res(
        recognize(pair(
            many0_count(char('[')),
            alt((
                recognize(one_of("VZBSCIJFD")),
                recognize(tuple((char('L'), is_not(";[ \t,(){}"), char(';')))),
            )),
        )),
        Type::try_from,
    )(input)
}

fn member_name(input: &str) -> IResult<&str, &str, IrError> {
    take_while1(|c: char| c.is_alphanumeric() || "_$<>".contains(c))(input)
}

fn proto(input: &str) -> IResult<&str, (Vec<Type>, Type), IrError> {
    pair(
        delimited(char('('), many0(descriptor), char(')')),
        descriptor,
    )(input)
}

fn field_decl(input: &str) -> IResult<&str, (&str, Type), IrError> {
    separated_pair(member_name, char(':'), descriptor)(input)
}

fn method_decl(input: &str) -> IResult<&str, (&str, (Vec<Type>, Type)), IrError> {
    pair(member_name, proto)(input)
}

fn label(input: &str) -> IResult<&str, &str, IrError> {
    preceded(
        char(':'),
        take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '$'),
    )(input)
}

fn catch_decl(input: &str) -> IResult<&str, (Option<Type>, (&str, &str), &str), IrError> {
    tuple((
        opt(terminated(descriptor, space1)),
        delimited(
            pair(char('{'), space0),
            separated_pair(label, tuple((space1, tag(".."), space1)), label),
            pair(space0, char('}')),
        ),
        preceded(space1, label),
    ))(input)
}

fn register(input: &str) -> IResult<&str, (char, u32), IrError> {
    pair(one_of("vp"), map_res(digit1, str::parse::<u32>))(input)
}

fn int_literal(input: &str) -> IResult<&str, i64, IrError> {
    let (input, neg) = opt(char('-'))(input)?;
    let (input, v) = alt((
        map_res(
            preceded(alt((tag("0x"), tag("0X"))), hex_digit1),
            |digits: &str| u64::from_str_radix(digits, 16).map(|v| v as i64),
        ),
        map_res(digit1, str::parse::<i64>),
    ))(input)?;
    let (input, _) = opt(one_of("lLts"))(input)?;
    Ok((input, if neg.is_some() { v.wrapping_neg() } else { v }))
}

fn string_literal(input: &str) -> IResult<&str, String, IrError> {
    alt((
        value(String::new(), tag("\"\"")),
        delimited(
            char('"'),
            escaped_transform(
                none_of("\\\""),
                '\\',
                alt((
                    value("\\", char('\\')),
                    value("\"", char('"')),
                    value("\n", char('n')),
                    value("\t", char('t')),
                    value("\r", char('r')),
                )),
            ),
            char('"'),
        ),
    ))(input)
}

fn member_or_type(input: &str) -> IResult<&str, Operand, IrError> {
    let (input, class) = descriptor(input)?;
    let (input, member) = opt(preceded(
        tag("->"),
        pair(
            member_name,
            alt((
                map(preceded(char(':'), descriptor), |typ| (None, typ)),
                map(proto, |(params, ret)| (Some(params), ret)),
            )),
        ),
    ))(input)?;
    let operand = match member {
        None => Operand::Type(class),
        Some((name, (None, typ))) => Operand::Field(class, name.to_string(), typ),
        Some((name, (Some(params), ret))) => {
            Operand::Method(class, name.to_string(), params, ret)
        }
    };
    Ok((input, operand))
}

fn operand(input: &str) -> IResult<&str, Operand, IrError> {
    alt((
        delimited(
            pair(char('{'), space0),
            alt((
                map(
                    separated_pair(register, tuple((space1, tag(".."), space1)), register),
                    |(first, last)| Operand::RegRange(first, last),
                ),
                map(separated_list0(comma, register), Operand::RegList),
            )),
            pair(space0, char('}')),
        ),
        map(
            delimited(
                pair(char('['), space0),
                separated_list0(
                    comma,
                    separated_pair(
                        int_literal,
                        tuple((space0, tag("->"), space0)),
                        map(label, str::to_string),
                    ),
                ),
                pair(space0, char(']')),
            ),
            Operand::Cases,
        ),
        map(string_literal, Operand::Str),
        map(label, |l| Operand::Label(l.to_string())),
        map(register, |(prefix, num)| Operand::Reg(prefix, num)),
        map(int_literal, Operand::Int),
        member_or_type,
    ))(input)
}

fn instruction_line(input: &str) -> IResult<&str, (&str, Vec<Operand>), IrError> {
    all_consuming(terminated(
        pair(
            take_while1(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '/'),
            map(
                opt(preceded(space1, separated_list0(comma, operand))),
                Option::unwrap_or_default,
            ),
        ),
        space0,
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PrettyPrinter;

    const COLOR: &str = r#"
# a simple enum
.class public final enum Lcom/example/Color;
.super Ljava/lang/Enum;
.field public static final enum RED:Lcom/example/Color;
.keep names
.field private static final synthetic $VALUES:[Lcom/example/Color;

.method public static values()[Lcom/example/Color;
.registers 1
    sget-object v0, Lcom/example/Color;->$VALUES:[Lcom/example/Color;
    invoke-virtual {v0}, [Lcom/example/Color;->clone()Ljava/lang/Object;
    move-result-object v0
    check-cast v0, [Lcom/example/Color;
    return-object v0
.end method

.method public static describe(Lcom/example/Color;J)Ljava/lang/String;
.keep root
.registers 5
    if-eqz p0, :null
    const-string v0, "color # \"quoted\""
    return-object v0
:null
    const/4 v0, 0x0
    return-object v0
.end method
.end class
"#;

    #[test]
    fn parse_enum_class() {
        let repo = parse_repo(COLOR).unwrap();
        let types = repo.types();
        let class = repo.get_class_by_name("Lcom/example/Color;").unwrap();
        assert!(class.is_enum());
        assert_eq!(class.superclass(), Some(TypeId::JAVA_LANG_ENUM));

        let fields: Vec<_> = class.iter_fields(&repo).collect();
        assert_eq!(fields.len(), 2);
        assert!(!fields[0].can_rename());
        assert!(fields[1].can_rename());
        assert!(types.is_array(fields[1].type_()));

        let values = class.iter_methods(&repo).next().unwrap();
        assert!(values.is_static());
        let code = values.code().unwrap();
        let instrs: Vec<String> = code
            .iter_instructions()
            .map(|(_, instr)| PrettyPrinter(instr, types).to_string())
            .collect();
        assert_eq!(
            instrs,
            vec![
                "sget-object Lcom/example/Color;->$VALUES:[Lcom/example/Color;",
                "move-result-pseudo-object v0",
                "invoke-virtual {v0}, [Lcom/example/Color;->clone()Ljava/lang/Object;",
                "move-result-object v0",
                "check-cast v0, [Lcom/example/Color;",
                "move-result-pseudo-object v0",
                "return-object v0",
            ]
        );
    }

    #[test]
    fn parameters_and_labels() {
        let repo = parse_repo(COLOR).unwrap();
        let class = repo.get_class_by_name("Lcom/example/Color;").unwrap();
        let describe = class.iter_methods(&repo).nth(1).unwrap();
        assert!(!describe.can_rename());
        let code = describe.code().unwrap();
        assert_eq!(code.registers_size(), 5);
        assert_eq!(code.ins_size(), 3);
        let params: Vec<_> = code.param_instructions().cloned().collect();
        assert_eq!(
            params,
            vec![
                Instr::LoadParamObject(Reg::from(2u16)),
                Instr::LoadParamWide(Reg::from(3u16)),
            ]
        );
        assert_eq!(
            code.instruction_at(Addr(2)).unwrap(),
            &Instr::Ifz(Comp::Eq, Reg::from(2u16), Addr(6))
        );
        assert_eq!(
            code.instruction_at(Addr(3)).unwrap(),
            &Instr::ConstString("color # \"quoted\"".to_string())
        );
        assert_eq!(
            code.instruction_at(Addr(6)).unwrap(),
            &Instr::Const(Reg::from(0u16), 0)
        );
    }

    #[test]
    fn lowering() {
        let src = r#"
.class public LFoo;
.method public run([LFoo;I)V
.registers 8
    aget-object v0, p1, p2
    iput-object v0, p0, LFoo;->next:LFoo;
    add-int/lit8 v1, p2, -1
    mul-long/2addr v2, v4
    int-to-long v2, v1
    instance-of v1, v0, LFoo;
    invoke-static/range {v0 .. v1}, LFoo;->check(LFoo;Z)V
    switch p2, [0 -> :a, 7 -> :a]
:a
    return-void
.end method
"#;
        let repo = parse_repo(src).unwrap();
        let types = repo.types();
        let method = repo.iter_methods().next().unwrap();
        let code = method.code().unwrap();
        let instrs: Vec<String> = code
            .iter_instructions()
            .map(|(_, instr)| PrettyPrinter(instr, types).to_string())
            .collect();
        assert_eq!(
            instrs,
            vec![
                "load-param-object v5",
                "load-param-object v6",
                "load-param v7",
                "aget-object v6, v7",
                "move-result-pseudo-object v0",
                "iput-object v0, v5, LFoo;->next:LFoo;",
                "add-int/lit v1, v7, -1",
                "mul-long v2, v2, v4",
                "int-to-long v2, v1",
                "instance-of v0, LFoo;",
                "move-result-pseudo v1",
                "invoke-static {v0, v1}, LFoo;->check(LFoo;Z)V",
                "switch v7, [0 -> @0013, 7 -> @0013]",
                "return-void",
            ]
        );
    }

    #[test]
    fn abstract_methods_and_catches() {
        let src = r#"
.class public abstract LBase;
.method public abstract size()I
.end method
.method public static safe()V
.registers 1
.catch Ljava/lang/Throwable; {:start .. :end} :handler
.catchall {:start .. :end} :handler
    :start
    invoke-static {}, LBase;->run()V
    :end
    return-void
    :handler
    move-exception v0
    return-void
.end method
"#;
        let repo = parse_repo(src).unwrap();
        let class = repo.get_class_by_name("LBase;").unwrap();
        let mut methods = class.iter_methods(&repo);
        assert!(methods.next().unwrap().code().is_none());
        let code = methods.next().unwrap().code().unwrap();
        assert_eq!(code.instructions_count(), 4);
        let try_ = code.try_covering(Addr(0)).unwrap();
        assert_eq!(try_.end_addr(), Addr(1));
        let handlers: Vec<_> = try_.iter_handlers().copied().collect();
        assert_eq!(
            handlers,
            vec![
                Handler {
                    catch_type: Some(TypeId::JAVA_LANG_THROWABLE),
                    addr: Addr(2)
                },
                Handler {
                    catch_type: None,
                    addr: Addr(2)
                },
            ]
        );
    }

    #[test]
    fn errors() {
        let unknown_label = ".class LA;\n.method static f()V\n.registers 1\ngoto :nowhere\n.end method\n";
        assert!(matches!(
            parse_repo(unknown_label),
            Err(IrError::Line { line: 5, source }) if matches!(*source, IrError::UnknownLabel(_))
        ));

        let bad_register = ".class LA;\n.method static f()V\n.registers 1\nconst v3, 1\n";
        assert!(matches!(
            parse_repo(bad_register),
            Err(IrError::Line { line: 4, source }) if matches!(*source, IrError::BadRegister(_, 1))
        ));

        let unterminated = ".class LA;\n.method static f()V\n.registers 1\nreturn-void\n";
        assert!(matches!(
            parse_repo(unterminated),
            Err(IrError::Line { source, .. }) if matches!(*source, IrError::Unterminated(_))
        ));

        let outside = "return-void\n";
        assert!(parse_repo(outside).is_err());

        let unknown_opcode = ".class LA;\n.method static f()V\n.registers 1\nfrobnicate v0\n";
        assert!(matches!(
            parse_repo(unknown_opcode),
            Err(IrError::Line { line: 4, source }) if matches!(*source, IrError::Unknown(_))
        ));

        let late_registers =
            ".class LA;\n.method static f()V\nreturn-void\n.registers 1\n.end method\n";
        assert!(matches!(
            parse_repo(late_registers),
            Err(IrError::Line { line: 4, source }) if matches!(*source, IrError::Misplaced(_, _))
        ));

        let abstract_code = ".class LA;\n.method abstract f()V\nreturn-void\n.end method\n";
        assert!(parse_repo(abstract_code).is_err());

        let duplicate = ".class LA;\n.end class\n.class LA;\n";
        assert!(parse_repo(duplicate).is_err());
    }

    #[test]
    fn comments() {
        assert_eq!(strip_comment("const v0, 1 # one"), "const v0, 1 ");
        assert_eq!(
            strip_comment(r#"const-string v0, "a # b" # c"#),
            r#"const-string v0, "a # b" "#
        );
        assert_eq!(strip_comment(r##""\"#" # c"##), r##""\"#" "##);
    }
}

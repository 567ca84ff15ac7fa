//! IR instructions.
//!
//! The instruction set follows Dalvik bytecode with two departures that ease dataflow
//! analyses:
//!
//!  - parameters are materialized by explicit `load-param` instructions at method entry,
//!  - instructions producing a value that may throw (field and array reads, casts,
//!    allocations, etc.) do not name a destination register: their value is stored in the
//!    [`Reg::RESULT`] pseudo register and moved by the `move-result-pseudo` instruction
//!    that immediately follows them, exactly as invocations and `move-result`.

use crate::refs::{FieldRef, MethodRef};
use crate::registers::Reg;
use crate::types::{TypeId, TypeTable};
use crate::{Addr, PrettyPrint};
use std::fmt;

/// Kind of the value transferred by array and field accesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Normal,
    Wide,
    Object,
    Boolean,
    Byte,
    Char,
    Short,
}

impl ValueKind {
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Normal => "",
            Self::Wide => "-wide",
            Self::Object => "-object",
            Self::Boolean => "-boolean",
            Self::Byte => "-byte",
            Self::Char => "-char",
            Self::Short => "-short",
        }
    }

    #[must_use]
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "" => Some(Self::Normal),
            "-wide" => Some(Self::Wide),
            "-object" => Some(Self::Object),
            "-boolean" => Some(Self::Boolean),
            "-byte" => Some(Self::Byte),
            "-char" => Some(Self::Char),
            "-short" => Some(Self::Short),
            _ => None,
        }
    }
}

/// Numeric kinds of arithmetic instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumKind {
    Int,
    Long,
    Float,
    Double,
}

impl NumKind {
    #[must_use]
    pub const fn is_wide(self) -> bool {
        matches!(self, Self::Long | Self::Double)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int" => Some(Self::Int),
            "long" => Some(Self::Long),
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Ushr,
}

impl BinOp {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Rem => "rem",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Shl => "shl",
            Self::Shr => "shr",
            Self::Ushr => "ushr",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "add" => Some(Self::Add),
            "sub" => Some(Self::Sub),
            "mul" => Some(Self::Mul),
            "div" => Some(Self::Div),
            "rem" => Some(Self::Rem),
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            "xor" => Some(Self::Xor),
            "shl" => Some(Self::Shl),
            "shr" => Some(Self::Shr),
            "ushr" => Some(Self::Ushr),
            _ => None,
        }
    }

    /// Integer division and remainder may throw `ArithmeticException`.
    #[must_use]
    pub const fn can_throw(self, kind: NumKind) -> bool {
        matches!(self, Self::Div | Self::Rem) && matches!(kind, NumKind::Int | NumKind::Long)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg(NumKind),
    Not(NumKind),
    Convert(NumKind, NumKind),
    IntToByte,
    IntToChar,
    IntToShort,
}

impl UnOp {
    /// Numeric kind of the produced value.
    #[must_use]
    pub const fn result_kind(self) -> NumKind {
        match self {
            Self::Neg(k) | Self::Not(k) | Self::Convert(_, k) => k,
            Self::IntToByte | Self::IntToChar | Self::IntToShort => NumKind::Int,
        }
    }
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Neg(k) => write!(f, "neg-{}", k.name()),
            Self::Not(k) => write!(f, "not-{}", k.name()),
            Self::Convert(from, to) => write!(f, "{}-to-{}", from.name(), to.name()),
            Self::IntToByte => write!(f, "int-to-byte"),
            Self::IntToChar => write!(f, "int-to-char"),
            Self::IntToShort => write!(f, "int-to-short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpKind {
    CmplFloat,
    CmpgFloat,
    CmplDouble,
    CmpgDouble,
    CmpLong,
}

impl CmpKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CmplFloat => "cmpl-float",
            Self::CmpgFloat => "cmpg-float",
            Self::CmplDouble => "cmpl-double",
            Self::CmpgDouble => "cmpg-double",
            Self::CmpLong => "cmp-long",
        }
    }
}

/// Comparison of conditional branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comp {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl Comp {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Ge => "ge",
            Self::Gt => "gt",
            Self::Le => "le",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "lt" => Some(Self::Lt),
            "ge" => Some(Self::Ge),
            "gt" => Some(Self::Gt),
            "le" => Some(Self::Le),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    Virtual,
    Super,
    Direct,
    Static,
    Interface,
}

impl InvokeKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Virtual => "virtual",
            Self::Super => "super",
            Self::Direct => "direct",
            Self::Static => "static",
            Self::Interface => "interface",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "virtual" => Some(Self::Virtual),
            "super" => Some(Self::Super),
            "direct" => Some(Self::Direct),
            "static" => Some(Self::Static),
            "interface" => Some(Self::Interface),
            _ => None,
        }
    }
}

/// The IR instruction type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    Nop,

    LoadParam(Reg),
    LoadParamWide(Reg),
    LoadParamObject(Reg),

    Move(Reg, Reg),
    MoveWide(Reg, Reg),
    MoveObject(Reg, Reg),
    MoveResult(Reg),
    MoveResultWide(Reg),
    MoveResultObject(Reg),
    MoveResultPseudo(Reg),
    MoveResultPseudoWide(Reg),
    MoveResultPseudoObject(Reg),
    MoveException(Reg),

    ReturnVoid,
    Return(Reg),
    ReturnWide(Reg),
    ReturnObject(Reg),

    Const(Reg, i32),
    ConstWide(Reg, i64),
    ConstString(String),
    ConstClass(TypeId),

    MonitorEnter(Reg),
    MonitorExit(Reg),
    CheckCast(Reg, TypeId),
    InstanceOf(Reg, TypeId),
    ArrayLength(Reg),
    NewInstance(TypeId),
    NewArray(Reg, TypeId),
    FilledNewArray(Vec<Reg>, TypeId),
    FillArrayData(Reg),
    Throw(Reg),

    Goto(Addr),
    If(Comp, Reg, Reg, Addr),
    Ifz(Comp, Reg, Addr),
    Switch(Reg, Vec<(i32, Addr)>),

    Cmp(CmpKind, Reg, Reg, Reg),
    BinOp(BinOp, NumKind, Reg, Reg, Reg),
    BinOpLit(BinOp, Reg, Reg, i32),
    UnOp(UnOp, Reg, Reg),

    /// `aget (kind, array, index)`
    Aget(ValueKind, Reg, Reg),
    /// `aput (kind, value, array, index)`
    Aput(ValueKind, Reg, Reg, Reg),
    /// `iget (kind, object, field)`
    Iget(ValueKind, Reg, FieldRef),
    /// `iput (kind, value, object, field)`
    Iput(ValueKind, Reg, Reg, FieldRef),
    Sget(ValueKind, FieldRef),
    Sput(ValueKind, Reg, FieldRef),

    Invoke(InvokeKind, Vec<Reg>, MethodRef),
}

impl Instr {
    #[must_use]
    pub const fn is_load_param(&self) -> bool {
        matches!(
            self,
            Self::LoadParam(_) | Self::LoadParamWide(_) | Self::LoadParamObject(_)
        )
    }

    #[must_use]
    pub const fn is_invoke(&self) -> bool {
        matches!(self, Self::Invoke(_, _, _))
    }

    /// Checks if the instruction value is stored into the result register and must be
    /// followed by a `move-result-pseudo` instruction.
    #[must_use]
    pub const fn has_move_result_pseudo(&self) -> bool {
        matches!(
            self,
            Self::ConstString(_)
                | Self::ConstClass(_)
                | Self::CheckCast(_, _)
                | Self::InstanceOf(_, _)
                | Self::ArrayLength(_)
                | Self::NewInstance(_)
                | Self::NewArray(_, _)
                | Self::Aget(_, _, _)
                | Self::Iget(_, _, _)
                | Self::Sget(_, _)
        )
    }

    /// Checks if the instruction value goes to [`Reg::RESULT`]: invocations,
    /// `filled-new-array` (read back by `move-result-object`) and pseudo result producers.
    #[must_use]
    pub const fn writes_result(&self) -> bool {
        self.is_invoke()
            || self.has_move_result_pseudo()
            || matches!(self, Self::FilledNewArray(_, _))
    }

    /// Returns the register written by the instruction, if any.
    ///
    /// Instructions storing their value in [`Reg::RESULT`] have no destination.
    #[must_use]
    pub const fn dest(&self) -> Option<Reg> {
        match self {
            Self::LoadParam(r)
            | Self::LoadParamWide(r)
            | Self::LoadParamObject(r)
            | Self::Move(r, _)
            | Self::MoveWide(r, _)
            | Self::MoveObject(r, _)
            | Self::MoveResult(r)
            | Self::MoveResultWide(r)
            | Self::MoveResultObject(r)
            | Self::MoveResultPseudo(r)
            | Self::MoveResultPseudoWide(r)
            | Self::MoveResultPseudoObject(r)
            | Self::MoveException(r)
            | Self::Const(r, _)
            | Self::ConstWide(r, _)
            | Self::Cmp(_, r, _, _)
            | Self::BinOp(_, _, r, _, _)
            | Self::BinOpLit(_, r, _, _)
            | Self::UnOp(_, r, _) => Some(*r),
            _ => None,
        }
    }

    /// Checks if the destination register is the first of a register pair.
    #[must_use]
    pub const fn dest_is_wide(&self) -> bool {
        match self {
            Self::LoadParamWide(_)
            | Self::MoveWide(_, _)
            | Self::MoveResultWide(_)
            | Self::MoveResultPseudoWide(_)
            | Self::ConstWide(_, _) => true,
            Self::BinOp(_, kind, _, _, _) => kind.is_wide(),
            Self::UnOp(op, _, _) => op.result_kind().is_wide(),
            _ => false,
        }
    }

    #[must_use]
    pub const fn is_return(&self) -> bool {
        matches!(
            self,
            Self::ReturnVoid | Self::Return(_) | Self::ReturnWide(_) | Self::ReturnObject(_)
        )
    }

    #[must_use]
    pub const fn can_throw(&self) -> bool {
        match self {
            Self::MonitorEnter(_)
            | Self::MonitorExit(_)
            | Self::ConstClass(_)
            | Self::CheckCast(_, _)
            | Self::InstanceOf(_, _)
            | Self::ArrayLength(_)
            | Self::NewInstance(_)
            | Self::NewArray(_, _)
            | Self::FilledNewArray(_, _)
            | Self::FillArrayData(_)
            | Self::Throw(_)
            | Self::Aget(_, _, _)
            | Self::Aput(_, _, _, _)
            | Self::Iget(_, _, _)
            | Self::Iput(_, _, _, _)
            | Self::Sget(_, _)
            | Self::Sput(_, _, _)
            | Self::Invoke(_, _, _) => true,
            Self::BinOp(op, kind, _, _, _) => op.can_throw(*kind),
            Self::BinOpLit(op, _, _, _) => op.can_throw(NumKind::Int),
            _ => false,
        }
    }

    /// Checks if the control never flows to the following instruction.
    #[must_use]
    pub const fn ends_flow(&self) -> bool {
        self.is_return() || matches!(self, Self::Throw(_) | Self::Goto(_))
    }

    /// Returns the explicit branching targets of the instruction.
    #[must_use]
    pub fn branch_targets(&self) -> Vec<Addr> {
        match self {
            Self::Goto(a) | Self::If(_, _, _, a) | Self::Ifz(_, _, a) => vec![*a],
            Self::Switch(_, cases) => cases.iter().map(|(_, a)| *a).collect(),
            _ => Vec::new(),
        }
    }

    /// Appends every type referenced by the instruction operands.
    pub fn gather_types(&self, types: &mut Vec<TypeId>) {
        match self {
            Self::ConstClass(t)
            | Self::CheckCast(_, t)
            | Self::InstanceOf(_, t)
            | Self::NewInstance(t)
            | Self::NewArray(_, t)
            | Self::FilledNewArray(_, t) => types.push(*t),
            Self::Iget(_, _, field)
            | Self::Iput(_, _, _, field)
            | Self::Sget(_, field)
            | Self::Sput(_, _, field) => {
                types.push(field.class());
                types.push(field.type_());
            }
            Self::Invoke(_, _, method) => {
                types.push(method.class());
                method.proto().gather_types(types);
            }
            _ => (),
        }
    }
}

fn pp_regs(f: &mut fmt::Formatter, regs: &[Reg]) -> fmt::Result {
    write!(f, "{{")?;
    for (i, r) in regs.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{r}")?;
    }
    write!(f, "}}")
}

impl PrettyPrint for Instr {
    #[allow(clippy::too_many_lines)]
    fn pp(&self, f: &mut fmt::Formatter, types: &TypeTable) -> fmt::Result {
        match self {
            Self::Nop => write!(f, "nop"),
            Self::LoadParam(r) => write!(f, "load-param {r}"),
            Self::LoadParamWide(r) => write!(f, "load-param-wide {r}"),
            Self::LoadParamObject(r) => write!(f, "load-param-object {r}"),
            Self::Move(d, s) => write!(f, "move {d}, {s}"),
            Self::MoveWide(d, s) => write!(f, "move-wide {d}, {s}"),
            Self::MoveObject(d, s) => write!(f, "move-object {d}, {s}"),
            Self::MoveResult(d) => write!(f, "move-result {d}"),
            Self::MoveResultWide(d) => write!(f, "move-result-wide {d}"),
            Self::MoveResultObject(d) => write!(f, "move-result-object {d}"),
            Self::MoveResultPseudo(d) => write!(f, "move-result-pseudo {d}"),
            Self::MoveResultPseudoWide(d) => write!(f, "move-result-pseudo-wide {d}"),
            Self::MoveResultPseudoObject(d) => write!(f, "move-result-pseudo-object {d}"),
            Self::MoveException(d) => write!(f, "move-exception {d}"),
            Self::ReturnVoid => write!(f, "return-void"),
            Self::Return(r) => write!(f, "return {r}"),
            Self::ReturnWide(r) => write!(f, "return-wide {r}"),
            Self::ReturnObject(r) => write!(f, "return-object {r}"),
            Self::Const(d, v) => write!(f, "const {d}, {v}"),
            Self::ConstWide(d, v) => write!(f, "const-wide {d}, {v}"),
            Self::ConstString(s) => write!(f, "const-string {s:?}"),
            Self::ConstClass(t) => write!(f, "const-class {}", types.descriptor(*t)),
            Self::MonitorEnter(r) => write!(f, "monitor-enter {r}"),
            Self::MonitorExit(r) => write!(f, "monitor-exit {r}"),
            Self::CheckCast(r, t) => write!(f, "check-cast {r}, {}", types.descriptor(*t)),
            Self::InstanceOf(r, t) => write!(f, "instance-of {r}, {}", types.descriptor(*t)),
            Self::ArrayLength(r) => write!(f, "array-length {r}"),
            Self::NewInstance(t) => write!(f, "new-instance {}", types.descriptor(*t)),
            Self::NewArray(r, t) => write!(f, "new-array {r}, {}", types.descriptor(*t)),
            Self::FilledNewArray(regs, t) => {
                write!(f, "filled-new-array ")?;
                pp_regs(f, regs)?;
                write!(f, ", {}", types.descriptor(*t))
            }
            Self::FillArrayData(r) => write!(f, "fill-array-data {r}"),
            Self::Throw(r) => write!(f, "throw {r}"),
            Self::Goto(a) => write!(f, "goto @{a}"),
            Self::If(c, r1, r2, a) => write!(f, "if-{} {r1}, {r2}, @{a}", c.name()),
            Self::Ifz(c, r, a) => write!(f, "if-{}z {r}, @{a}", c.name()),
            Self::Switch(r, cases) => {
                write!(f, "switch {r}, [")?;
                for (i, (key, a)) in cases.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key} -> @{a}")?;
                }
                write!(f, "]")
            }
            Self::Cmp(k, d, s1, s2) => write!(f, "{} {d}, {s1}, {s2}", k.name()),
            Self::BinOp(op, k, d, s1, s2) => {
                write!(f, "{}-{} {d}, {s1}, {s2}", op.name(), k.name())
            }
            Self::BinOpLit(op, d, s, lit) => write!(f, "{}-int/lit {d}, {s}, {lit}", op.name()),
            Self::UnOp(op, d, s) => write!(f, "{op} {d}, {s}"),
            Self::Aget(k, arr, idx) => write!(f, "aget{} {arr}, {idx}", k.suffix()),
            Self::Aput(k, src, arr, idx) => write!(f, "aput{} {src}, {arr}, {idx}", k.suffix()),
            Self::Iget(k, obj, field) => {
                write!(f, "iget{} {obj}, ", k.suffix())?;
                field.pp(f, types)
            }
            Self::Iput(k, src, obj, field) => {
                write!(f, "iput{} {src}, {obj}, ", k.suffix())?;
                field.pp(f, types)
            }
            Self::Sget(k, field) => {
                write!(f, "sget{} ", k.suffix())?;
                field.pp(f, types)
            }
            Self::Sput(k, src, field) => {
                write!(f, "sput{} {src}, ", k.suffix())?;
                field.pp(f, types)
            }
            Self::Invoke(k, args, method) => {
                write!(f, "invoke-{} ", k.name())?;
                pp_regs(f, args)?;
                write!(f, ", ")?;
                method.pp(f, types)
            }
        }
    }
}

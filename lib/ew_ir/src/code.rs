//! Method code: instructions, register frame and exception handlers.

use crate::errors::{IrError, IrResult};
use crate::instrs::Instr;
use crate::types::{TypeId, TypeTable};
use crate::{Addr, PrettyPrint};
use std::fmt;

/// An exception handler of a try block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handler {
    /// Caught type, `None` for catch-all handlers.
    pub catch_type: Option<TypeId>,
    pub addr: Addr,
}

/// A range of instructions `[start, end)` protected by exception handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryItem {
    start: Addr,
    end: Addr,
    handlers: Vec<Handler>,
}

impl TryItem {
    #[must_use]
    pub fn new(start: Addr, end: Addr, handlers: Vec<Handler>) -> Self {
        Self {
            start,
            end,
            handlers,
        }
    }

    #[inline]
    #[must_use]
    pub const fn start_addr(&self) -> Addr {
        self.start
    }

    #[inline]
    #[must_use]
    pub const fn end_addr(&self) -> Addr {
        self.end
    }

    #[inline]
    #[must_use]
    pub const fn covers(&self, addr: Addr) -> bool {
        addr.0 >= self.start.0 && addr.0 < self.end.0
    }

    /// Handlers in declaration order, the catch-all one (if any) being the last.
    pub fn iter_handlers(&self) -> impl Iterator<Item = &Handler> {
        self.handlers.iter()
    }
}

/// The code of a concrete method.
#[derive(Debug, Clone)]
pub struct Code {
    registers_size: u32,
    ins_size: u32,
    instrs: Vec<Instr>,
    tries: Vec<TryItem>,
}

impl Code {
    /// Builds and checks method code.
    ///
    /// Branch and handler targets must address existing instructions, every
    /// instruction producing a pseudo result must be immediately followed by a
    /// `move-result-pseudo` and the control must not flow out of the last instruction.
    pub fn new(
        registers_size: u32,
        ins_size: u32,
        instrs: Vec<Instr>,
        tries: Vec<TryItem>,
    ) -> IrResult<Self> {
        let code = Self {
            registers_size,
            ins_size,
            instrs,
            tries,
        };
        code.check()?;
        Ok(code)
    }

    fn check(&self) -> IrResult<()> {
        let last = self
            .instrs
            .last()
            .ok_or_else(|| IrError::Unterminated("empty code".to_string()))?;
        if !last.ends_flow() {
            return Err(IrError::Unterminated(format!(
                "code falling through after {}",
                Addr(self.instrs.len() - 1)
            )));
        }

        let in_range = |addr: Addr| {
            if addr.0 < self.instrs.len() {
                Ok(())
            } else {
                Err(IrError::InstructionNotFound(addr))
            }
        };
        for (addr, instr) in self.iter_instructions() {
            for target in instr.branch_targets() {
                in_range(target)?;
            }
            let next_is_pseudo = matches!(
                self.instrs.get(addr.next().0),
                Some(
                    Instr::MoveResultPseudo(_)
                        | Instr::MoveResultPseudoWide(_)
                        | Instr::MoveResultPseudoObject(_)
                )
            );
            if instr.has_move_result_pseudo() && !next_is_pseudo {
                return Err(IrError::Misplaced(
                    format!("missing move-result-pseudo at {}", addr.next()),
                    "pseudo result producing instruction".to_string(),
                ));
            }
            if next_is_pseudo && !instr.has_move_result_pseudo() {
                return Err(IrError::Misplaced(
                    format!("move-result-pseudo at {}", addr.next()),
                    "pseudo result producing instruction".to_string(),
                ));
            }
        }
        if matches!(
            self.instrs.first(),
            Some(
                Instr::MoveResultPseudo(_)
                    | Instr::MoveResultPseudoWide(_)
                    | Instr::MoveResultPseudoObject(_)
            )
        ) {
            return Err(IrError::Misplaced(
                "move-result-pseudo at 0000".to_string(),
                "pseudo result producing instruction".to_string(),
            ));
        }

        for try_ in &self.tries {
            if try_.start.0 >= try_.end.0 {
                return Err(IrError::Internal(format!(
                    "empty try block [{}, {})",
                    try_.start, try_.end
                )));
            }
            if try_.end.0 > self.instrs.len() {
                return Err(IrError::InstructionNotFound(try_.end));
            }
            for handler in &try_.handlers {
                in_range(handler.addr)?;
            }
        }
        Ok(())
    }

    #[inline]
    #[must_use]
    pub const fn registers_size(&self) -> u32 {
        self.registers_size
    }

    /// Number of registers holding parameters (receiver included), wide ones counting twice.
    #[inline]
    #[must_use]
    pub const fn ins_size(&self) -> u32 {
        self.ins_size
    }

    #[inline]
    #[must_use]
    pub fn instructions_count(&self) -> usize {
        self.instrs.len()
    }

    pub fn iter_instructions(&self) -> impl Iterator<Item = (Addr, &Instr)> {
        self.instrs.iter().enumerate().map(|(i, instr)| (Addr(i), instr))
    }

    pub fn instruction_at(&self, addr: Addr) -> IrResult<&Instr> {
        self.instrs
            .get(addr.0)
            .ok_or(IrError::InstructionNotFound(addr))
    }

    #[inline]
    #[must_use]
    pub fn instructions(&self) -> &[Instr] {
        &self.instrs
    }

    /// Leading `load-param*` instructions, one per formal parameter (receiver first).
    pub fn param_instructions(&self) -> impl Iterator<Item = &Instr> {
        self.instrs.iter().take_while(|instr| instr.is_load_param())
    }

    pub fn iter_tries(&self) -> impl Iterator<Item = &TryItem> {
        self.tries.iter()
    }

    /// Returns the innermost try block covering the given instruction.
    #[must_use]
    pub fn try_covering(&self, addr: Addr) -> Option<&TryItem> {
        self.tries.iter().find(|try_| try_.covers(addr))
    }

    /// Appends every type referenced by the instructions.
    pub fn gather_types(&self, types: &mut Vec<TypeId>) {
        for instr in &self.instrs {
            instr.gather_types(types);
        }
    }
}

impl PrettyPrint for Code {
    fn pp(&self, f: &mut fmt::Formatter, types: &TypeTable) -> fmt::Result {
        writeln!(f, ".registers {}", self.registers_size)?;
        for (addr, instr) in self.iter_instructions() {
            write!(f, "  {addr}: ")?;
            instr.pp(f, types)?;
            writeln!(f)?;
        }
        for try_ in &self.tries {
            for handler in &try_.handlers {
                match handler.catch_type {
                    Some(t) => write!(f, "  .catch {}", types.descriptor(t))?,
                    None => write!(f, "  .catchall")?,
                }
                writeln!(f, " [{}, {}) @{}", try_.start, try_.end, handler.addr)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::Reg;

    #[test]
    fn code_checks() {
        let v0 = Reg::from(0u16);
        assert!(Code::new(1, 0, vec![Instr::ReturnVoid], vec![]).is_ok());
        assert!(Code::new(1, 0, vec![], vec![]).is_err());
        assert!(Code::new(1, 0, vec![Instr::Const(v0, 1)], vec![]).is_err());
        assert!(matches!(
            Code::new(1, 0, vec![Instr::Goto(Addr(3))], vec![]),
            Err(IrError::InstructionNotFound(Addr(3)))
        ));
        assert!(Code::new(
            1,
            0,
            vec![Instr::ConstString("a".to_string()), Instr::ReturnVoid],
            vec![]
        )
        .is_err());
        assert!(Code::new(
            1,
            0,
            vec![Instr::MoveResultPseudoObject(v0), Instr::ReturnVoid],
            vec![]
        )
        .is_err());
        assert!(Code::new(
            1,
            0,
            vec![
                Instr::ConstString("a".to_string()),
                Instr::MoveResultPseudoObject(v0),
                Instr::ReturnObject(v0)
            ],
            vec![]
        )
        .is_ok());
    }

    #[test]
    fn params_and_tries() {
        let v0 = Reg::from(0u16);
        let v1 = Reg::from(1u16);
        let code = Code::new(
            2,
            1,
            vec![
                Instr::LoadParamObject(v1),
                Instr::Throw(v1),
                Instr::MoveException(v0),
                Instr::ReturnVoid,
            ],
            vec![TryItem::new(
                Addr(1),
                Addr(2),
                vec![Handler {
                    catch_type: None,
                    addr: Addr(2),
                }],
            )],
        )
        .unwrap();
        assert_eq!(code.param_instructions().count(), 1);
        assert!(code.try_covering(Addr(1)).is_some());
        assert!(code.try_covering(Addr(2)).is_none());
        assert_eq!(code.instruction_at(Addr(3)).unwrap(), &Instr::ReturnVoid);
        assert!(code.instruction_at(Addr(4)).is_err());
    }
}

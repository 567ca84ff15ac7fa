//! Control flow graph representation.

use crate::code::Code;
use crate::errors::{IrError, IrResult};
use crate::instrs::Instr;
use crate::types::{TypeId, TypeTable};
use crate::{Addr, PrettyPrinter};
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::NodeRef;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fmt::Write;

/// A basic block: a slice of consecutive instructions of the method code.
#[derive(Debug)]
pub struct Block<'a> {
    start: Addr,
    instrs: &'a [Instr],
    can_throw: bool,
}

impl<'a> fmt::Display for Block<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end_addr())
    }
}

impl<'a> Block<'a> {
    fn new(start: Addr, instrs: &'a [Instr]) -> Self {
        let can_throw = instrs.first().map_or(false, Instr::can_throw);
        Self {
            start,
            instrs,
            can_throw,
        }
    }

    #[inline]
    pub fn instructions(&self) -> impl Iterator<Item = (Addr, &'a Instr)> + '_ {
        let start = self.start.0;
        self.instrs
            .iter()
            .enumerate()
            .map(move |(i, instr)| (Addr(start + i), instr))
    }

    #[inline]
    #[must_use]
    pub const fn start_addr(&self) -> Addr {
        self.start
    }

    #[inline]
    #[must_use]
    pub const fn end_addr(&self) -> Addr {
        Addr(self.start.0 + self.instrs.len())
    }

    #[inline]
    #[must_use]
    pub fn last_instruction(&self) -> Option<&'a Instr> {
        self.instrs.last()
    }

    /// Throwing instructions always form their own block.
    #[inline]
    #[must_use]
    pub const fn can_throw(&self) -> bool {
        self.can_throw
    }

    fn label(&self, types: &TypeTable) -> String {
        let mut res = String::new();
        for (addr, instr) in self.instructions() {
            let line = format!("{addr}: {}", PrettyPrinter(instr, types));
            res.push_str(&line.replace('\\', "\\\\").replace('"', "\\\""));
            res.push_str("\\l");
        }
        res
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    IfTrue,
    IfFalse,
    Switch(i32),
    SwitchDefault,
    Jmp,
    Sequence,
    Catch(TypeId),
    CatchAll,
}

impl Branch {
    /// Exceptional edges leave their source block before its (single) instruction
    /// completes.
    #[must_use]
    pub const fn is_exceptional(self) -> bool {
        matches!(self, Self::Catch(_) | Self::CatchAll)
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::IfTrue => write!(f, "<true>"),
            Self::IfFalse => write!(f, "<false>"),
            Self::Switch(key) => write!(f, "<switch {key}>"),
            Self::SwitchDefault => write!(f, "<switch _>"),
            Self::Jmp => write!(f, "<jmp>"),
            Self::Sequence => write!(f, "<seq>"),
            Self::Catch(typ) => write!(f, "<catch {typ}>"),
            Self::CatchAll => write!(f, "<catch *>"),
        }
    }
}

#[derive(Debug)]
pub struct Cfg<'a> {
    inner: DiGraph<Block<'a>, Branch>,
    node_ids: BTreeMap<Addr, NodeIndex>,
    start: NodeIndex,
}

impl<'a> Cfg<'a> {
    #[inline]
    #[must_use]
    pub const fn graph(&self) -> &DiGraph<Block<'a>, Branch> {
        &self.inner
    }

    #[inline]
    #[must_use]
    pub const fn start_index(&self) -> NodeIndex {
        self.start
    }

    #[must_use]
    pub fn node_index(&self, addr: Addr) -> Option<NodeIndex> {
        self.node_ids.get(&addr).copied()
    }

    #[inline]
    #[must_use]
    pub fn block(&self, id: NodeIndex) -> &Block<'a> {
        &self.inner[id]
    }

    #[inline]
    #[must_use]
    pub fn nb_blocks(&self) -> usize {
        self.inner.node_count()
    }

    /// Blocks sorted by start address.
    pub fn iter_ordered_blocks(&self) -> impl Iterator<Item = (NodeIndex, &Block<'a>)> {
        self.node_ids.values().map(move |id| (*id, &self.inner[*id]))
    }

    pub fn to_dot(&self, types: &TypeTable) -> IrResult<String> {
        let mut res = String::new();
        res.push_str("digraph {\n");
        res.push_str("  splines=ortho;\n");
        res.push_str("  nodesep=2;\n");
        write!(
            res,
            "{}",
            Dot::with_attr_getters(
                &self.inner,
                &[Config::GraphContentOnly, Config::EdgeNoLabel, Config::NodeNoLabel],
                &|_, edge| {
                    let color = match edge.weight() {
                        Branch::IfTrue => "green",
                        Branch::IfFalse => "red",
                        Branch::Switch(_) | Branch::SwitchDefault => "purple",
                        Branch::Jmp => "blue",
                        Branch::Catch(_) | Branch::CatchAll => "orchid",
                        Branch::Sequence => "black",
                    };
                    let xlabel = match edge.weight() {
                        Branch::Catch(typ) => format!("<catch {}>", types.descriptor(*typ)),
                        other => other.to_string(),
                    };
                    format!("color={color},xlabel=\"{xlabel}\"")
                },
                &|_, node| {
                    let color = if node.weight().can_throw() {
                        "blue"
                    } else {
                        "black"
                    };
                    format!(
                        "shape=box,color={color},label=\"{}\"",
                        node.weight().label(types)
                    )
                }
            )
        )?;
        res.push('}');
        Ok(res)
    }

    pub fn build(code: &'a Code) -> IrResult<Self> {
        let instrs = code.instructions();
        let mut cfgraph = DiGraph::new();
        let mut blocks_map = BTreeMap::new();

        let leaders = compute_block_leaders(code);
        let mut bounds: Vec<usize> = leaders.iter().map(|addr| addr.0).collect();
        bounds.push(instrs.len());
        for window in bounds.windows(2) {
            let block = Block::new(Addr(window[0]), &instrs[window[0]..window[1]]);
            blocks_map.insert(block.start_addr(), cfgraph.add_node(block));
        }

        let breakers: Vec<(NodeIndex, Addr, &'a Instr)> = blocks_map
            .values()
            .filter_map(|id| {
                let block: &Block<'a> = &cfgraph[*id];
                block
                    .last_instruction()
                    .map(|instr| (*id, Addr(block.end_addr().0 - 1), instr))
            })
            .collect();
        for (src_id, addr, instr) in breakers {
            for (branch, dst) in instruction_branching(addr, instr)
                .into_iter()
                .chain(handlers_branching(code, addr, instr))
            {
                if let Some(dst_id) = blocks_map.get(&dst) {
                    cfgraph.add_edge(src_id, *dst_id, branch);
                }
            }
        }

        let start = *blocks_map
            .get(&Addr::entry())
            .ok_or(IrError::InstructionNotFound(Addr::entry()))?;
        Ok(Self {
            inner: cfgraph,
            node_ids: blocks_map,
            start,
        })
    }
}

// Block leaders are block first instructions addresses:
//   - the entry point,
//   - target addresses of branching instructions,
//   - addresses following a branching, returning or throwable instruction,
//   - throwable instructions (so that the state before the instruction is the state
//     flowing to exception handlers),
//   - try blocks boundaries and handlers.
fn compute_block_leaders(code: &Code) -> BTreeSet<Addr> {
    let mut leaders = BTreeSet::new();
    leaders.insert(Addr::entry());

    for (addr, instr) in code.iter_instructions() {
        if is_branching(instr) || instr.can_throw() || instr.is_return() {
            leaders.insert(addr.next());
        }
        for dst in instr.branch_targets() {
            leaders.insert(dst);
        }
        if instr.can_throw() {
            leaders.insert(addr);
        }
    }

    for try_ in code.iter_tries() {
        leaders.insert(try_.start_addr());
        leaders.insert(try_.end_addr());
        for handler in try_.iter_handlers() {
            leaders.insert(handler.addr);
        }
    }

    let len = code.instructions_count();
    leaders.retain(|addr| addr.0 < len);
    leaders
}

const fn is_branching(instr: &Instr) -> bool {
    matches!(
        instr,
        Instr::Goto(_) | Instr::If(_, _, _, _) | Instr::Ifz(_, _, _) | Instr::Switch(_, _)
    )
}

fn instruction_branching(addr: Addr, instr: &Instr) -> Vec<(Branch, Addr)> {
    match instr {
        Instr::Goto(dst) => vec![(Branch::Jmp, *dst)],
        Instr::If(_, _, _, dst) | Instr::Ifz(_, _, dst) => {
            vec![(Branch::IfTrue, *dst), (Branch::IfFalse, addr.next())]
        }
        Instr::Switch(_, cases) => std::iter::once((Branch::SwitchDefault, addr.next()))
            .chain(cases.iter().map(|(key, dst)| (Branch::Switch(*key), *dst)))
            .collect(),
        instr if instr.ends_flow() => vec![],
        _ => vec![(Branch::Sequence, addr.next())],
    }
}

fn handlers_branching(code: &Code, addr: Addr, instr: &Instr) -> Vec<(Branch, Addr)> {
    if !instr.can_throw() {
        return vec![];
    }
    code.try_covering(addr).map_or_else(Vec::new, |try_| {
        try_.iter_handlers()
            .map(|handler| match handler.catch_type {
                Some(typ) => (Branch::Catch(typ), handler.addr),
                None => (Branch::CatchAll, handler.addr),
            })
            .collect()
    })
}

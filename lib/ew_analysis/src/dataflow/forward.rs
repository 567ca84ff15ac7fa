use crate::dataflow::Dataflow;
use crate::errors::{AnalysisError, AnalysisResult};
use ew_ir::controlflow::{Branch, Cfg};
use ew_ir::instrs::Instr;
use ew_ir::repo::Method;
use fixedbitset::FixedBitSet;
use petgraph::graph::NodeIndex;
use petgraph::visit::{DfsPostOrder, EdgeRef};
use petgraph::Direction;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

/// The abstract state that is carried along the control flow graph
/// during forward dataflow analysis.
pub trait AbstractForwardState<'a>: Eq + Sized {
    type Context<'c>;
    type Error;

    /// The state initialization function, giving the state at method entry.
    ///
    /// # Errors
    ///
    /// This method should return a `Self::Error` if given method does not allow
    /// a proper state initialization.
    fn init(method: &Method, ctx: &Self::Context<'a>) -> Result<Self, Self::Error>;

    /// The state join operation function.
    ///
    /// # Errors
    ///
    /// This method should return a `Self::Error` if given states
    /// cannot be joined properly with respect to the context.
    fn join(&mut self, other: &Self, ctx: &Self::Context<'a>) -> Result<(), Self::Error>;

    /// The control flow branch transfer function.
    ///
    /// # Errors
    ///
    /// This method should return a `Self::Error` if given branch
    /// cannot be passed with the current state with respect to the
    /// context.
    fn transfer_branch(&mut self, branch: Branch, ctx: &Self::Context<'a>)
        -> Result<(), Self::Error>;

    /// The instruction transfer function.
    ///
    /// # Errors
    ///
    /// This method should return a `Self::Error` if given instruction
    /// cannot be passed with the current state with respect to the
    /// context.
    fn transfer_instr(&mut self, instr: &Instr, ctx: &Self::Context<'a>)
        -> Result<(), Self::Error>;
}

/// Performs a forward dataflow analysis over the control flow graph of a method.
///
/// The analysis parameters are given by the `AbstractForwardState` trait
/// methods passed as a type parameter. Block entry states are the join of the
/// states flowing along incoming edges: exit states for normal edges, entry
/// states for exceptional ones (throwing instructions are alone in their block).
///
/// # Errors
///
/// This function may generate errors resulting of an underlying
/// abstract state error (at initialization, join or transfer
/// operation). Also, the exact type of the error is parameterized
/// through an `AbstractForwardState` trait associated type.
pub fn forward<'a, S>(
    method: &Method,
    cfg: &Cfg,
    context: &S::Context<'a>,
) -> AnalysisResult<Dataflow<S>>
where
    S: AbstractForwardState<'a> + Clone + fmt::Display,
    S::Error: Into<AnalysisError>,
{
    let cfgraph = cfg.graph();
    let init = S::init(method, context).map_err(S::Error::into)?;

    let mut block_entries: BTreeMap<NodeIndex, S> = BTreeMap::new();
    let mut block_exits: BTreeMap<NodeIndex, S> = BTreeMap::new();

    // For forward dataflow, optimal order is reverse postorder.
    let mut postorder = DfsPostOrder::new(cfgraph, cfg.start_index());
    let mut order = Vec::with_capacity(cfgraph.node_count());
    while let Some(id) = postorder.next(cfgraph) {
        order.push(id);
    }
    let mut worklist: VecDeque<NodeIndex> = order.into_iter().rev().collect();
    let mut queued = FixedBitSet::with_capacity(cfgraph.node_count());
    for id in &worklist {
        queued.insert(id.index());
    }

    let mut nb_iterations = 0usize;
    while let Some(id) = worklist.pop_front() {
        queued.set(id.index(), false);
        nb_iterations += 1;
        let block = &cfgraph[id];

        let mut entry: Option<S> = (id == cfg.start_index()).then(|| init.clone());
        for edge in cfgraph.edges_directed(id, Direction::Incoming) {
            let source = if edge.weight().is_exceptional() {
                block_entries.get(&edge.source())
            } else {
                block_exits.get(&edge.source())
            };
            // predecessors not analyzed yet contribute bottom
            let Some(source) = source else {
                continue;
            };
            let mut incoming = source.clone();
            incoming
                .transfer_branch(*edge.weight(), context)
                .map_err(S::Error::into)?;
            entry = Some(match entry.take() {
                None => incoming,
                Some(mut state) => {
                    state.join(&incoming, context).map_err(S::Error::into)?;
                    state
                }
            });
        }
        let Some(entry) = entry else {
            continue;
        };
        if block_entries.get(&id) == Some(&entry) {
            continue;
        }

        log::debug!("    ---- block {block}");
        log::debug!("    -- ENTRY STATE:");
        for line in format!("{entry}").split('\n') {
            log::debug!("      {line}");
        }

        let mut state = entry.clone();
        for (addr, instr) in block.instructions() {
            log::trace!("transfer_instr( {addr} )");
            log::trace!("    before: {state}");
            state
                .transfer_instr(instr, context)
                .map_err(S::Error::into)?;
            log::trace!("    after:  {state}");
        }
        log::debug!("    -- EXIT STATE:");
        for line in format!("{state}").split('\n') {
            log::debug!("      {line}");
        }

        block_entries.insert(id, entry);
        block_exits.insert(id, state);

        for succ in cfgraph.neighbors_directed(id, Direction::Outgoing) {
            if !queued.contains(succ.index()) {
                queued.insert(succ.index());
                worklist.push_back(succ);
            }
        }
    }
    log::debug!(
        "fixpoint reached after {nb_iterations} block analyses ({} blocks)",
        cfgraph.node_count()
    );

    let by_addr = |states: BTreeMap<NodeIndex, S>| -> BTreeMap<_, _> {
        states
            .into_iter()
            .map(|(id, state)| (cfgraph[id].start_addr(), state))
            .collect()
    };
    Ok(Dataflow {
        entries: by_addr(block_entries),
        exits: by_addr(block_exits),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{EnumTypeEnvironment, EnumTypes};
    use ew_ir::registers::Reg;
    use ew_ir::repo::Repo;
    use ew_ir::types::TypeId;
    use ew_ir::Addr;

    const SRC: &str = r#"
.class public LFlow;

.method public static guarded(LColor;)Ljava/lang/Object;
.registers 3
.catchall {:start .. :end} :handler
    const/4 v1, 0
:start
    move-object v1, p0
    invoke-static {}, LFlow;->run()V
    sget-object v1, LShape;->CIRCLE:LShape;
:end
    return-object v1
:handler
    move-exception v0
    return-object v1
.end method

.method public static spin()Ljava/lang/Object;
.registers 2
:top
    if-eqz v1, :next
    return-object v0
:next
    sget-object v0, LShape;->CIRCLE:LShape;
    goto :top
.end method

.method public static swap(ZLColor;LShape;)Ljava/lang/Object;
.registers 5
    move-object v0, p1
:loop
    if-eqz p0, :done
    move-object v1, v0
    move-object v0, p2
    goto :loop
:done
    return-object v1
.end method
"#;

    fn solve(repo: &Repo, name: &str) -> Dataflow<EnumTypeEnvironment> {
        let method = repo.iter_methods().find(|m| m.name() == name).unwrap();
        let cfg = Cfg::build(method.code().unwrap()).unwrap();
        forward::<EnumTypeEnvironment>(method, &cfg, repo.types()).unwrap()
    }

    fn lookup(repo: &Repo, descriptor: &str) -> TypeId {
        repo.types().lookup(descriptor).unwrap()
    }

    #[test]
    fn handlers_see_throwing_entry_states() {
        let repo = ew_ir::parse(SRC).unwrap();
        let color = lookup(&repo, "LColor;");
        let shape = lookup(&repo, "LShape;");
        let flow = solve(&repo, "guarded");
        let v1 = Reg::from(1u16);

        // 0: load-param, 1: const, 2: move, 3: invoke, 4: sget, 5: move-result-pseudo,
        // 6: return, 7: move-exception
        let handler = flow.entry_at(Addr(7)).unwrap();
        assert_eq!(handler.get(v1), EnumTypes::singleton(color));
        assert_eq!(
            flow.entry_at(Addr(6)).unwrap().get(v1),
            EnumTypes::singleton(shape)
        );
        // the pseudo result move is not throwing, the handler never sees it
        assert_eq!(
            flow.exit_at(Addr(5)).unwrap().get(v1),
            EnumTypes::singleton(shape)
        );
    }

    #[test]
    fn entry_joins_back_edges() {
        let repo = ew_ir::parse(SRC).unwrap();
        let shape = lookup(&repo, "LShape;");
        let flow = solve(&repo, "spin");
        let v0 = Reg::from(0u16);

        let entry = flow.entry_at(Addr::entry()).unwrap();
        assert!(!entry.is_bottom());
        assert_eq!(entry.get(v0), EnumTypes::singleton(shape));
        assert_eq!(
            flow.entry_at(Addr(1)).unwrap().get(v0),
            EnumTypes::singleton(shape)
        );
    }

    #[test]
    fn loops_reach_fixpoint() {
        let repo = ew_ir::parse(SRC).unwrap();
        let color = lookup(&repo, "LColor;");
        let shape = lookup(&repo, "LShape;");
        let flow = solve(&repo, "swap");
        let (v0, v1) = (Reg::from(0u16), Reg::from(1u16));

        let both: EnumTypes = [color, shape].into_iter().collect();
        let (_, done) = flow.entries.iter().next_back().unwrap();
        assert_eq!(done.get(v0), both);
        assert_eq!(done.get(v1), both);

        // a second solve gives the same states
        let again = solve(&repo, "swap");
        assert_eq!(again.entries, flow.entries);
        assert_eq!(again.exits, flow.exits);
    }
}

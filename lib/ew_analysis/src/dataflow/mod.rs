//! Dataflow analysis framework.

use ew_ir::Addr;
use std::collections::BTreeMap;

mod forward;

pub use forward::{forward, AbstractForwardState};

/// Dataflow analysis result object.
///
/// Contains entries and exits abstract states of every reachable basic block of the
/// analyzed method, indexed by block start address, after reaching fixpoint. Blocks
/// missing from the maps are unreachable.
#[derive(Debug, Clone)]
pub struct Dataflow<S> {
    pub entries: BTreeMap<Addr, S>,
    pub exits: BTreeMap<Addr, S>,
}

impl<S> Dataflow<S> {
    #[must_use]
    pub fn entry_at(&self, block_start: Addr) -> Option<&S> {
        self.entries.get(&block_start)
    }

    #[must_use]
    pub fn exit_at(&self, block_start: Addr) -> Option<&S> {
        self.exits.get(&block_start)
    }
}

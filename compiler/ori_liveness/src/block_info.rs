//! Per-block liveness sets.

use crate::bitset::LiveSet;
use crate::ir::BlockId;

/// The `kill`, `live_in`, and `live_out` sets of one block, indexed by
/// `ValueId::index()`.
///
/// Read-only outside the crate. The solver updates the sets through the
/// crate-private methods below.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    live_in: LiveSet,
    live_out: LiveSet,
    kill: LiveSet,
}

impl BlockInfo {
    pub(crate) fn new(num_values: usize) -> Self {
        Self {
            live_in: LiveSet::new_empty(num_values),
            live_out: LiveSet::new_empty(num_values),
            kill: LiveSet::new_empty(num_values),
        }
    }

    /// Values live on entry, phis of this block excluded.
    #[inline]
    pub fn live_in(&self) -> &LiveSet {
        &self.live_in
    }

    /// Values live on exit: the union of the successors' `live_in`.
    ///
    /// Values consumed only by a successor's phi are not included.
    #[inline]
    pub fn live_out(&self) -> &LiveSet {
        &self.live_out
    }

    /// Values defined in this block, phis included.
    #[inline]
    pub fn kill(&self) -> &LiveSet {
        &self.kill
    }

    pub(crate) fn kill_mut(&mut self) -> &mut LiveSet {
        &mut self.kill
    }

    pub(crate) fn set_live_in(&mut self, live_in: &LiveSet) {
        self.live_in.clone_from(live_in);
    }

    /// `live_in |= live_out - kill`. Returns `true` if `live_in` grew.
    pub(crate) fn update_live_in(&mut self) -> bool {
        self.live_in.union_if_not_in(&self.live_out, &self.kill)
    }
}

/// `live_out(block) |= live_in(s)` for every successor `s`. Returns `true`
/// if `live_out(block)` grew.
pub(crate) fn update_live_out(infos: &mut [BlockInfo], block: BlockId, successors: &[BlockId]) -> bool {
    let mut live_out = std::mem::replace(&mut infos[block.index()].live_out, LiveSet::new_empty(0));
    let mut changed = false;
    for &succ in successors {
        changed |= live_out.union_with(&infos[succ.index()].live_in);
    }
    infos[block.index()].live_out = live_out;
    changed
}

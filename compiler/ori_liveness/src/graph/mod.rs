//! Traversal orders and dominators over a [`Cfg`].
//!
//! [`CfgBuilder`](crate::CfgBuilder) uses these to reject unreachable and
//! irreducible graphs and to discover loops; `verify_linear_order` uses the
//! dominator tree to check that no block precedes its dominator.

use crate::ir::{BlockId, Cfg};

/// Blocks reachable from the entry, in DFS postorder.
///
/// The builder compares the length against the block count to find
/// unreachable blocks. Iterative, so deeply nested methods cannot overflow
/// the stack.
pub(crate) fn compute_postorder(cfg: &Cfg) -> Vec<BlockId> {
    let num_blocks = cfg.num_blocks();
    let mut visited = vec![false; num_blocks];
    let mut postorder = Vec::with_capacity(num_blocks);

    // (block, successors already pushed)
    let mut stack: Vec<(BlockId, bool)> = vec![(cfg.entry(), false)];

    while let Some(&mut (block, ref mut children_done)) = stack.last_mut() {
        if *children_done {
            postorder.push(block);
            stack.pop();
            continue;
        }
        *children_done = true;

        if visited[block.index()] {
            stack.pop();
            continue;
        }
        visited[block.index()] = true;

        for &succ in &cfg.block(block).successors {
            if !visited[succ.index()] {
                stack.push((succ, false));
            }
        }
    }

    postorder
}

/// Reverse postorder from the entry block.
pub(crate) fn reverse_postorder(cfg: &Cfg) -> Vec<BlockId> {
    let mut rpo = compute_postorder(cfg);
    rpo.reverse();
    rpo
}

/// Immediate dominators of every block.
///
/// Computed with the iterative scheme of Cooper, Harvey and Kennedy, "A
/// Simple, Fast Dominance Algorithm" (2001), over reverse postorder.
pub struct DominatorTree {
    /// Indexed by block. The entry is its own idom; unreachable blocks
    /// have none.
    idom: Vec<Option<usize>>,
}

impl DominatorTree {
    pub fn build(cfg: &Cfg) -> Self {
        let n = cfg.num_blocks();
        if n == 0 {
            return Self { idom: vec![] };
        }

        let rpo = reverse_postorder(cfg);

        // Block index to RPO position.
        let mut rpo_pos = vec![usize::MAX; n];
        for (pos, &block) in rpo.iter().enumerate() {
            rpo_pos[block.index()] = pos;
        }

        let entry = cfg.entry().index();
        let mut idom: Vec<Option<usize>> = vec![None; n];
        idom[entry] = Some(entry);

        let mut changed = true;
        while changed {
            changed = false;
            for &block in &rpo[1..] {
                let preds = &cfg.block(block).predecessors;

                let Some(mut new_idom) = preds
                    .iter()
                    .map(|p| p.index())
                    .find(|&p| idom[p].is_some())
                else {
                    continue;
                };

                for pred in preds.iter().map(|p| p.index()) {
                    if pred != new_idom && idom[pred].is_some() {
                        new_idom = Self::intersect(pred, new_idom, &idom, &rpo_pos);
                    }
                }

                if idom[block.index()] != Some(new_idom) {
                    idom[block.index()] = Some(new_idom);
                    changed = true;
                }
            }
        }

        Self { idom }
    }

    /// Does `a` dominate `b`? Every block dominates itself.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let a_idx = a.index();
        let mut current = b.index();
        loop {
            if current == a_idx {
                return true;
            }
            match self.idom[current] {
                Some(dom) if dom != current => current = dom,
                _ => return false,
            }
        }
    }

    /// Immediate dominator of `block`. `None` for the entry block.
    pub fn idom(&self, block: BlockId) -> Option<BlockId> {
        self.idom[block.index()]
            .filter(|&dom| dom != block.index())
            .map(|dom| BlockId::new(block_u32(dom)))
    }

    /// Nearest common dominator of `a` and `b`.
    ///
    /// Both `a` and `b` must be reachable from the entry. Their idom chains
    /// then end at the entry node and `idom[x]` is always `Some` here.
    fn intersect(mut a: usize, mut b: usize, idom: &[Option<usize>], rpo_pos: &[usize]) -> usize {
        while a != b {
            while rpo_pos[a] > rpo_pos[b] {
                let Some(next) = idom[a] else {
                    debug_assert!(false, "intersect: broken idom chain at {a}");
                    return a;
                };
                a = next;
            }
            while rpo_pos[b] > rpo_pos[a] {
                let Some(next) = idom[b] else {
                    debug_assert!(false, "intersect: broken idom chain at {b}");
                    return b;
                };
                b = next;
            }
        }
        a
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "block counts fit in u32"
)]
fn block_u32(idx: usize) -> u32 {
    idx as u32
}

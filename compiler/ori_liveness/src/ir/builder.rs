//! Incremental construction of a [`Cfg`].
//!
//! The builder collects blocks, instructions, and edges in any order, then
//! [`build`](CfgBuilder::build) derives predecessor lists, the dominator
//! tree, and natural loops, and validates the SSA shape the liveness
//! analysis relies on.

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use super::{Block, BlockId, Cfg, Instr, InstrId, InstrKind, Loop, LoopId, ValueType};
use crate::bitset::BitSet;
use crate::graph::{compute_postorder, DominatorTree};
use crate::CfgError;

/// Builder for [`Cfg`].
///
/// Block 0 is the entry block.
#[derive(Default)]
pub struct CfgBuilder {
    blocks: Vec<Block>,
    instrs: Vec<Instr>,
    edges: Vec<(BlockId, BlockId)>,
    /// First misuse seen while adding instructions, reported by `build`.
    first_error: Option<CfgError>,
}

impl CfgBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new empty block.
    pub fn block(&mut self) -> BlockId {
        let id = BlockId::new(to_u32(self.blocks.len()));
        self.blocks.push(Block {
            id,
            phis: Vec::new(),
            instrs: Vec::new(),
            predecessors: SmallVec::new(),
            successors: SmallVec::new(),
            loop_id: None,
        });
        id
    }

    /// Append a phi to `block`. Inputs are matched to predecessors by the
    /// order in which edges into `block` are added.
    pub fn phi(&mut self, block: BlockId, ty: ValueType, inputs: &[InstrId]) -> InstrId {
        self.push_instr(block, InstrKind::Phi, Some(ty), inputs, &[])
    }

    /// Append an ordinary instruction to `block`.
    pub fn op(&mut self, block: BlockId, ty: Option<ValueType>, inputs: &[InstrId]) -> InstrId {
        self.push_instr(block, InstrKind::Op, ty, inputs, &[])
    }

    /// Append an instruction that also captures `environment` for
    /// deoptimization.
    pub fn op_with_env(
        &mut self,
        block: BlockId,
        ty: Option<ValueType>,
        inputs: &[InstrId],
        environment: &[InstrId],
    ) -> InstrId {
        self.push_instr(block, InstrKind::Op, ty, inputs, environment)
    }

    /// Replace the inputs of a phi. Loop-carried phis reference values that
    /// are created after the phi itself.
    pub fn set_phi_inputs(&mut self, phi: InstrId, inputs: &[InstrId]) {
        let Some(instr) = self.instrs.get_mut(phi.index()).filter(|i| i.is_phi()) else {
            self.record_error(CfgError::NotAPhi { instr: phi });
            return;
        };
        instr.inputs = inputs.iter().copied().collect();
    }

    /// Add a control-flow edge. Successor order is the order of calls.
    pub fn edge(&mut self, from: BlockId, to: BlockId) {
        self.edges.push((from, to));
    }

    /// Finish the graph.
    pub fn build(mut self) -> Result<Cfg, CfgError> {
        if let Some(err) = self.first_error.take() {
            return Err(err);
        }
        if self.blocks.is_empty() {
            return Err(CfgError::Empty);
        }

        self.wire_edges()?;
        self.check_operands()?;

        let mut cfg = Cfg {
            blocks: self.blocks,
            instrs: self.instrs,
            loops: Vec::new(),
            entry: BlockId::new(0),
        };

        let postorder = compute_postorder(&cfg);
        if postorder.len() != cfg.num_blocks() {
            let mut reached = BitSet::new_empty(cfg.num_blocks());
            for &b in &postorder {
                reached.insert(b.index());
            }
            let unreachable = (0..cfg.num_blocks())
                .find(|&i| !reached.contains(i))
                .map_or(cfg.entry, |i| BlockId::new(to_u32(i)));
            return Err(CfgError::UnreachableBlock { block: unreachable });
        }

        let dom = DominatorTree::build(&cfg);
        let rpo: Vec<BlockId> = postorder.iter().rev().copied().collect();
        check_reducible(&cfg, &dom, &rpo)?;
        check_dominating_defs(&cfg, &dom)?;
        compute_loops(&mut cfg, &dom, &rpo);

        tracing::debug!(
            blocks = cfg.num_blocks(),
            instrs = cfg.instrs.len(),
            loops = cfg.loops.len(),
            "built cfg"
        );

        Ok(cfg)
    }

    fn push_instr(
        &mut self,
        block: BlockId,
        kind: InstrKind,
        ty: Option<ValueType>,
        inputs: &[InstrId],
        environment: &[InstrId],
    ) -> InstrId {
        let id = InstrId::new(to_u32(self.instrs.len()));
        self.instrs.push(Instr {
            id,
            block,
            kind,
            ty,
            inputs: inputs.iter().copied().collect(),
            environment: environment.iter().copied().collect(),
        });
        let Some(b) = self.blocks.get_mut(block.index()) else {
            self.record_error(CfgError::UnknownBlock { block });
            return id;
        };
        match kind {
            InstrKind::Phi => b.phis.push(id),
            InstrKind::Op => b.instrs.push(id),
        }
        id
    }

    fn record_error(&mut self, err: CfgError) {
        if self.first_error.is_none() {
            self.first_error = Some(err);
        }
    }

    fn wire_edges(&mut self) -> Result<(), CfgError> {
        let num_blocks = self.blocks.len();
        let mut seen = FxHashSet::default();
        for &(from, to) in &self.edges {
            for block in [from, to] {
                if block.index() >= num_blocks {
                    return Err(CfgError::UnknownBlock { block });
                }
            }
            if !seen.insert((from, to)) {
                return Err(CfgError::DuplicateEdge { from, to });
            }
            self.blocks[from.index()].successors.push(to);
            self.blocks[to.index()].predecessors.push(from);
        }
        Ok(())
    }

    fn check_operands(&self) -> Result<(), CfgError> {
        for instr in &self.instrs {
            for &operand in instr.inputs.iter().chain(&instr.environment) {
                let is_value = self
                    .instrs
                    .get(operand.index())
                    .is_some_and(Instr::produces_value);
                if !is_value {
                    return Err(CfgError::NotAValue {
                        user: instr.id,
                        operand,
                    });
                }
            }
            if instr.is_phi() {
                let expected = self.blocks[instr.block.index()].predecessors.len();
                if instr.inputs.len() != expected {
                    return Err(CfgError::PhiArity {
                        phi: instr.id,
                        expected,
                        found: instr.inputs.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Every retreating edge must target a block that dominates its source.
fn check_reducible(cfg: &Cfg, dom: &DominatorTree, rpo: &[BlockId]) -> Result<(), CfgError> {
    let mut rpo_pos = vec![0usize; cfg.num_blocks()];
    for (pos, &b) in rpo.iter().enumerate() {
        rpo_pos[b.index()] = pos;
    }
    for block in cfg.blocks() {
        for &succ in &block.successors {
            let retreating = rpo_pos[succ.index()] <= rpo_pos[block.id.index()];
            if retreating && !dom.dominates(succ, block.id) {
                return Err(CfgError::Irreducible {
                    from: block.id,
                    to: succ,
                });
            }
        }
    }
    Ok(())
}

/// Every operand's definition must dominate the point where it is read.
///
/// A phi reads input `i` at the end of predecessor `i`.
fn check_dominating_defs(cfg: &Cfg, dom: &DominatorTree) -> Result<(), CfgError> {
    // Order of each instruction inside its block: phis share slot 0.
    let mut slot = vec![0usize; cfg.instrs().len()];
    for block in cfg.blocks() {
        for (i, &id) in block.instrs.iter().enumerate() {
            slot[id.index()] = i + 1;
        }
    }

    for instr in cfg.instrs() {
        let user_block = cfg.block(instr.block);
        if instr.is_phi() {
            for (&operand, &pred) in instr.inputs.iter().zip(&user_block.predecessors) {
                if !dom.dominates(cfg.instr(operand).block, pred) {
                    return Err(CfgError::UseNotDominated {
                        user: instr.id,
                        operand,
                    });
                }
            }
            continue;
        }
        for &operand in instr.inputs.iter().chain(&instr.environment) {
            let def = cfg.instr(operand);
            let ok = if def.block == instr.block {
                def.is_phi() || slot[operand.index()] < slot[instr.id.index()]
            } else {
                dom.dominates(def.block, instr.block)
            };
            if !ok {
                return Err(CfgError::UseNotDominated {
                    user: instr.id,
                    operand,
                });
            }
        }
    }
    Ok(())
}

/// Discover natural loops and record each block's innermost loop.
///
/// Loops are numbered in reverse postorder of their headers, so an outer
/// loop always has a smaller ID than the loops nested in it.
fn compute_loops(cfg: &mut Cfg, dom: &DominatorTree, rpo: &[BlockId]) {
    let num_blocks = cfg.num_blocks();
    let mut loops: Vec<Loop> = Vec::new();

    for &header in rpo {
        let back_edges: SmallVec<[BlockId; 2]> = cfg
            .block(header)
            .predecessors
            .iter()
            .copied()
            .filter(|&pred| dom.dominates(header, pred))
            .collect();
        if back_edges.is_empty() {
            continue;
        }

        // Walk backwards from the back-edge sources until the header.
        let mut blocks = BitSet::new_empty(num_blocks);
        blocks.insert(header.index());
        let mut worklist: Vec<BlockId> = back_edges.to_vec();
        while let Some(b) = worklist.pop() {
            if blocks.insert(b.index()) {
                worklist.extend(cfg.block(b).predecessors.iter().copied());
            }
        }

        loops.push(Loop {
            id: LoopId::new(to_u32(loops.len())),
            header,
            back_edges,
            blocks,
            parent: None,
        });
    }

    // Parent = smallest other loop containing the header.
    let sizes: Vec<usize> = loops.iter().map(|l| l.blocks.count()).collect();
    let parents: Vec<Option<LoopId>> = loops
        .iter()
        .map(|inner| {
            loops
                .iter()
                .filter(|outer| outer.id != inner.id && outer.contains(inner.header))
                .min_by_key(|outer| sizes[outer.id.index()])
                .map(|outer| outer.id)
        })
        .collect();
    for (l, parent) in loops.iter_mut().zip(parents) {
        l.parent = parent;
    }

    for block in &mut cfg.blocks {
        block.loop_id = loops
            .iter()
            .filter(|l| l.contains(block.id))
            .min_by_key(|l| sizes[l.id.index()])
            .map(|l| l.id);
    }

    cfg.loops = loops;
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "block and instruction counts fit in u32"
)]
fn to_u32(n: usize) -> u32 {
    n as u32
}

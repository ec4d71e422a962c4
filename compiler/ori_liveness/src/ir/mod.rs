//! SSA control-flow graph consumed by the liveness analysis.
//!
//! The graph is produced by the SSA builder and is read-only from here on:
//! no pass in this crate adds, removes, or reorders blocks or instructions.
//!
//! - **[`Cfg`]**: the method body: blocks, instructions, loops, entry
//! - **[`Block`]**: phis, ordinary instructions, predecessor/successor edges,
//!   and the innermost enclosing [`Loop`]
//! - **[`Instr`]**: a phi or an ordinary operation, optionally producing a
//!   value of some [`ValueType`]
//!
//! Phi input `i` flows in from predecessor `i` of the phi's block. Build a
//! `Cfg` with [`CfgBuilder`], which derives predecessors and loop nesting
//! and rejects graphs the analysis cannot handle.

mod builder;

use smallvec::SmallVec;

use crate::bitset::BitSet;

pub use builder::CfgBuilder;

// ── ID newtypes ─────────────────────────────────────────────────────

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create an ID from a raw index.
            #[inline]
            pub fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Get the raw `u32` value.
            #[inline]
            pub fn raw(self) -> u32 {
                self.0
            }

            /// Get the index as `usize` (for indexing into `Vec`s).
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_id!(
    /// Basic block ID, dense from 0 in creation order.
    BlockId
);

define_id!(
    /// Instruction ID, dense from 0 in creation order across all blocks.
    InstrId
);

define_id!(
    /// Loop ID, dense from 0 in reverse postorder of loop headers.
    LoopId
);

define_id!(
    /// Dense SSA value index, assigned by lifetime numbering in linear order.
    ///
    /// Every value-producing instruction gets exactly one. Phis are values too.
    ValueId
);

// ── Instructions ────────────────────────────────────────────────────

/// Primitive type of an SSA value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    Bool,
    Int,
    Long,
    Float,
    Double,
    /// Heap reference.
    Ref,
}

/// Whether an instruction is a phi or an ordinary operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstrKind {
    /// Merges one input per predecessor at block entry.
    Phi,
    /// Any other instruction.
    Op,
}

/// A single instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instr {
    pub id: InstrId,
    /// The block this instruction lives in.
    pub block: BlockId,
    pub kind: InstrKind,
    /// Result type. `Some` iff the instruction produces a value.
    pub ty: Option<ValueType>,
    /// Operands. An operand read needs the value in a register.
    pub inputs: SmallVec<[InstrId; 4]>,
    /// Values captured for deoptimization state only. They must stay alive
    /// across the instruction but do not need a register.
    pub environment: SmallVec<[InstrId; 4]>,
}

impl Instr {
    #[inline]
    pub fn is_phi(&self) -> bool {
        self.kind == InstrKind::Phi
    }

    #[inline]
    pub fn produces_value(&self) -> bool {
        self.ty.is_some()
    }

    #[inline]
    pub fn has_environment(&self) -> bool {
        !self.environment.is_empty()
    }
}

// ── Blocks and loops ────────────────────────────────────────────────

/// A basic block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    pub phis: Vec<InstrId>,
    /// Ordinary instructions in execution order.
    pub instrs: Vec<InstrId>,
    pub predecessors: SmallVec<[BlockId; 2]>,
    pub successors: SmallVec<[BlockId; 2]>,
    /// Innermost loop containing this block, if any.
    pub loop_id: Option<LoopId>,
}

impl Block {
    /// Position of `pred` in this block's predecessor list.
    ///
    /// This is also the phi input index for values flowing in from `pred`.
    pub fn predecessor_index(&self, pred: BlockId) -> Option<usize> {
        self.predecessors.iter().position(|&p| p == pred)
    }
}

/// A natural loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Loop {
    pub id: LoopId,
    pub header: BlockId,
    /// Sources of the back edges into `header`.
    pub back_edges: SmallVec<[BlockId; 2]>,
    /// Member blocks (header included), indexed by `BlockId::index()`.
    pub blocks: BitSet,
    /// Closest enclosing loop.
    pub parent: Option<LoopId>,
}

impl Loop {
    #[inline]
    pub fn contains(&self, block: BlockId) -> bool {
        self.blocks.contains(block.index())
    }
}

// ── Function body ───────────────────────────────────────────────────

/// A method body in SSA form.
///
/// Constructed only through [`CfgBuilder::build`], so every `Cfg` is
/// reachable, reducible, and has dominating definitions.
#[derive(Clone, Debug)]
pub struct Cfg {
    blocks: Vec<Block>,
    instrs: Vec<Instr>,
    loops: Vec<Loop>,
    entry: BlockId,
}

impl Cfg {
    #[inline]
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    #[inline]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    #[inline]
    pub fn instr(&self, id: InstrId) -> &Instr {
        &self.instrs[id.index()]
    }

    #[inline]
    pub fn loops(&self) -> &[Loop] {
        &self.loops
    }

    #[inline]
    pub fn loop_info(&self, id: LoopId) -> &Loop {
        &self.loops[id.index()]
    }

    /// The loop whose header is `block`, if `block` is a loop header.
    pub fn loop_headed_by(&self, block: BlockId) -> Option<&Loop> {
        self.block(block)
            .loop_id
            .map(|id| self.loop_info(id))
            .filter(|l| l.header == block)
    }

    #[inline]
    pub fn is_loop_header(&self, block: BlockId) -> bool {
        self.loop_headed_by(block).is_some()
    }

    /// Is `inner` a loop nested (at any depth) inside `outer`?
    ///
    /// A loop is not inner to itself.
    pub fn is_inner_loop(&self, inner: LoopId, outer: LoopId) -> bool {
        inner != outer && self.loop_info(outer).contains(self.loop_info(inner).header)
    }
}

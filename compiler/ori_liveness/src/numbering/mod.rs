//! Lifetime numbering.
//!
//! One walk over the linear order assigns:
//!
//! - a [`BlockSpan`] to every block,
//! - a [`LifetimePos`] to every instruction,
//! - a dense [`ValueId`] to every value-producing instruction, together with
//!   its [`LiveInterval`] in the method's [`IntervalArena`].
//!
//! Within a block, all phis share the block's start position. Ordinary
//! instructions follow at even positions two apart, and the block ends one
//! slot past its last instruction:
//!
//! ```text
//! block b:  phis  i0  i1  i2 | next block
//!           s     s+2 s+4 s+6| s+8 = end(b) = start(next)
//! ```

use crate::interval::{BlockSpan, IntervalArena, IntervalId, LifetimePos, LiveInterval};
use crate::ir::{BlockId, Cfg, InstrId, ValueId};

/// Block spans and instruction positions.
#[derive(Clone, Debug, Default)]
pub struct Lifetimes {
    block_spans: Vec<BlockSpan>,
    instr_positions: Vec<LifetimePos>,
}

impl Lifetimes {
    #[inline]
    pub fn block_span(&self, block: BlockId) -> BlockSpan {
        self.block_spans[block.index()]
    }

    #[inline]
    pub fn position(&self, instr: InstrId) -> LifetimePos {
        self.instr_positions[instr.index()]
    }
}

/// The bijection between value indices and defining instructions.
#[derive(Clone, Debug, Default)]
pub struct SsaValues {
    instrs: Vec<InstrId>,
    by_instr: Vec<Option<ValueId>>,
}

impl SsaValues {
    #[inline]
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    /// The instruction defining `value`.
    #[inline]
    pub fn instr(&self, value: ValueId) -> InstrId {
        self.instrs[value.index()]
    }

    /// The value defined by `instr`, if it defines one.
    #[inline]
    pub fn value_of(&self, instr: InstrId) -> Option<ValueId> {
        self.by_instr[instr.index()]
    }

    /// Every value with its defining instruction, in numbering order.
    pub fn iter(&self) -> impl Iterator<Item = (ValueId, InstrId)> + '_ {
        (0u32..).map(ValueId::new).zip(self.instrs.iter().copied())
    }
}

/// Everything produced by [`number_instructions`].
#[derive(Clone, Debug, Default)]
pub struct Numbering {
    pub lifetimes: Lifetimes,
    pub values: SsaValues,
    /// One seeded interval per value; `IntervalId` index == `ValueId` index.
    pub intervals: IntervalArena,
}

/// Number the blocks and instructions of `cfg` in `order`.
pub fn number_instructions(cfg: &Cfg, order: &[BlockId]) -> Numbering {
    let num_instrs = cfg.instrs().len();
    let zero = LifetimePos::new(0);
    let mut lifetimes = Lifetimes {
        block_spans: vec![BlockSpan { start: zero, end: zero }; cfg.num_blocks()],
        instr_positions: vec![zero; num_instrs],
    };
    let mut values = SsaValues {
        instrs: Vec::new(),
        by_instr: vec![None; num_instrs],
    };
    let mut intervals = IntervalArena::with_capacity(num_instrs);

    let mut position = zero;
    for &block_id in order {
        let block = cfg.block(block_id);
        let start = position;
        for &phi in &block.phis {
            lifetimes.instr_positions[phi.index()] = start;
        }
        position = position.next_instruction();
        for &id in &block.instrs {
            lifetimes.instr_positions[id.index()] = position;
            position = position.next_instruction();
        }
        let end = position;
        lifetimes.block_spans[block_id.index()] = BlockSpan { start, end };

        for &id in block.phis.iter().chain(&block.instrs) {
            let Some(ty) = cfg.instr(id).ty else {
                continue;
            };
            #[expect(
                clippy::cast_possible_truncation,
                reason = "value counts fit in u32"
            )]
            let value = ValueId::new(values.instrs.len() as u32);
            values.instrs.push(id);
            values.by_instr[id.index()] = Some(value);

            let seed = LiveInterval::seeded(ty, lifetimes.position(id), end);
            let interval = intervals.alloc(seed);
            debug_assert_eq!(interval, IntervalId::for_value(value));
        }
        tracing::trace!(block = block_id.raw(), start = start.raw(), end = end.raw(), "numbered block");
    }

    tracing::debug!(
        values = values.len(),
        positions = position.raw(),
        "numbered instructions"
    );
    Numbering {
        lifetimes,
        values,
        intervals,
    }
}

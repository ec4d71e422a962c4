//! Backward liveness over the linear order, producing live intervals and
//! per-block liveness sets.
//!
//! # Algorithm
//!
//! 1. **Range construction** ([`compute_live_ranges`]). Walk blocks in
//!    reverse linear order and instructions backwards, keeping a scratch
//!    set of live values:
//!    - start from the union of the successors' `live_in`, plus the phi
//!      inputs flowing out along each edge (recorded as phi uses at the end
//!      of this block);
//!    - every live value gets a range over the whole block;
//!    - a definition kills its value and sets the start of its interval;
//!      every operand adds a use and becomes live;
//!    - at a loop header, every value still live is live across the entire
//!      loop body, recorded with one loop range.
//!
//!    The scratch set at block entry becomes the block's initial `live_in`.
//!    Successors reached through a back edge have not been visited yet, so
//!    loop bodies miss values that are live around the loop. Their ranges
//!    are already right thanks to the loop range; only the sets are short.
//! 2. **Fixed point** ([`compute_live_in_and_live_out`]) over reverse
//!    linear order:
//!    - `live_out(B) = ∪ live_in(S)` for each successor S;
//!    - `live_in(B) |= live_out(B) - kill(B)`.
//!
//!    Repeat until a full pass changes nothing.
//!
//! # References
//!
//! - Wimmer, Franz: "Linear Scan Register Allocation on SSA Form" (CGO 2010)
//! - Appel: "Modern Compiler Implementation" §10.1 (dataflow analysis)

use crate::bitset::LiveSet;
use crate::block_info::{update_live_out, BlockInfo};
use crate::interval::IntervalId;
use crate::ir::{BlockId, Cfg, InstrId, ValueId};
use crate::numbering::{Numbering, SsaValues};

/// Build every value's live interval and each block's `kill` and initial
/// `live_in` set.
pub fn compute_live_ranges(cfg: &Cfg, order: &[BlockId], numbering: &mut Numbering) -> Vec<BlockInfo> {
    let (lifetimes, values, intervals) = (
        &numbering.lifetimes,
        &numbering.values,
        &mut numbering.intervals,
    );
    let num_values = values.len();
    let mut infos: Vec<BlockInfo> = (0..cfg.num_blocks()).map(|_| BlockInfo::new(num_values)).collect();
    let mut live = LiveSet::new_empty(num_values);

    for &block_id in order.iter().rev() {
        let block = cfg.block(block_id);
        let span = lifetimes.block_span(block_id);
        live.clear();

        // Step 1: values live into successors, and phi inputs along each edge.
        for &succ_id in &block.successors {
            live.union_with(infos[succ_id.index()].live_in());

            let succ = cfg.block(succ_id);
            let Some(input_index) = succ.predecessor_index(block_id) else {
                panic!("{block_id:?} is missing from the predecessors of {succ_id:?}");
            };
            for &phi in &succ.phis {
                let input = value_of(values, cfg.instr(phi).inputs[input_index]);
                intervals
                    .get_mut(IntervalId::for_value(input))
                    .add_phi_use(phi, span.end);
                live.insert(input.index());
            }
        }

        // Step 2: everything live at the end is live through the whole block
        // until a definition says otherwise.
        for value in live.iter() {
            intervals
                .get_mut(interval_at(value))
                .add_range(span.start, span.end);
        }

        // Step 3: instructions, last to first.
        for &id in block.instrs.iter().rev() {
            let position = lifetimes.position(id);
            if let Some(def) = values.value_of(id) {
                infos[block_id.index()].kill_mut().insert(def.index());
                live.remove(def.index());
                intervals.get_mut(IntervalId::for_value(def)).set_from(position);
            }

            let instr = cfg.instr(id);
            let operands = instr
                .inputs
                .iter()
                .map(|&op| (op, true))
                .chain(instr.environment.iter().map(|&op| (op, false)));
            for (operand, needs_register) in operands {
                let used = value_of(values, operand);
                intervals
                    .get_mut(IntervalId::for_value(used))
                    .add_use(id, position, span, needs_register);
                live.insert(used.index());
            }
        }

        // Step 4: phis define their values at the block start.
        for &phi in &block.phis {
            let def = value_of(values, phi);
            infos[block_id.index()].kill_mut().insert(def.index());
            live.remove(def.index());
            intervals.get_mut(IntervalId::for_value(def)).set_from(span.start);
        }

        // Step 5: values live at a loop header are live across the whole loop.
        if let Some(l) = cfg.loop_headed_by(block_id) {
            let loop_end = l
                .blocks
                .iter()
                .map(|b| lifetimes.block_span(BlockId::new(to_u32(b))).end)
                .max()
                .unwrap_or(span.end);
            for value in live.iter() {
                intervals
                    .get_mut(interval_at(value))
                    .add_loop_range(span.start, loop_end);
            }
        }

        infos[block_id.index()].set_live_in(&live);
        tracing::trace!(block = block_id.raw(), live_in = ?live, "block ranges");
    }

    infos
}

/// Iterate `live_in`/`live_out` to a fixed point. Returns the number of
/// passes, including the final one that changed nothing.
///
/// Each pass that changes something adds at least one bit to some set, so
/// there are at most `blocks * values + 1` passes.
pub fn compute_live_in_and_live_out(cfg: &Cfg, order: &[BlockId], infos: &mut [BlockInfo]) -> usize {
    let num_values = infos.first().map_or(0, |info| info.live_in().universe());
    let max_passes = order.len() * num_values + 1;

    let mut passes = 0;
    loop {
        passes += 1;
        assert!(
            passes <= max_passes,
            "liveness did not converge within {max_passes} passes"
        );

        let mut changed = false;
        for &block in order.iter().rev() {
            // live_in only depends on live_out (kill is fixed), so it only
            // needs recomputing when live_out grew.
            if update_live_out(infos, block, &cfg.block(block).successors)
                && infos[block.index()].update_live_in()
            {
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }

    tracing::debug!(passes, "liveness converged");
    passes
}

fn value_of(values: &SsaValues, instr: InstrId) -> ValueId {
    let Some(value) = values.value_of(instr) else {
        panic!("{instr:?} is used as a value but defines none");
    };
    value
}

fn interval_at(value_index: usize) -> IntervalId {
    IntervalId::for_value(ValueId::new(to_u32(value_index)))
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "block and value counts fit in u32"
)]
fn to_u32(n: usize) -> u32 {
    n as u32
}

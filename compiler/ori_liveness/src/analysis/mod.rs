//! The liveness analysis driver.
//!
//! [`SsaLivenessAnalysis`] runs linearization, numbering, range construction
//! and the fixed point in that order, once, and then exposes the results to
//! the register allocator.

use std::fmt;

use crate::bitset::LiveSet;
use crate::block_info::BlockInfo;
use crate::interval::{IntervalArena, IntervalId, LifetimePos, LiveInterval};
use crate::ir::{BlockId, Cfg, Instr, InstrId, ValueId};
use crate::linearize::{linearize, verify_linear_order};
use crate::liveness::{compute_live_in_and_live_out, compute_live_ranges};
use crate::numbering::{number_instructions, Numbering};
use crate::LivenessOptions;

/// How far [`SsaLivenessAnalysis::analyze`] has progressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnalysisState {
    NotRun,
    Linearized,
    Numbered,
    RangesComputed,
    Converged,
}

/// Liveness of every SSA value in one method.
///
/// ```
/// use ori_liveness::{CfgBuilder, SsaLivenessAnalysis, ValueType};
///
/// let mut b = CfgBuilder::new();
/// let entry = b.block();
/// let x = b.op(entry, Some(ValueType::Int), &[]);
/// b.op(entry, None, &[x]);
/// let cfg = b.build().unwrap();
///
/// let mut liveness = SsaLivenessAnalysis::new(&cfg);
/// liveness.analyze();
/// let v = liveness.value_of(x).unwrap();
/// assert_eq!(liveness.interval(v).to_string(), "ranges: { [2,4) }, uses: { 4 }");
/// ```
pub struct SsaLivenessAnalysis<'cfg> {
    cfg: &'cfg Cfg,
    options: LivenessOptions,
    state: AnalysisState,
    linear_order: Vec<BlockId>,
    numbering: Numbering,
    block_infos: Vec<BlockInfo>,
}

impl<'cfg> SsaLivenessAnalysis<'cfg> {
    /// An analysis configured from the environment (see
    /// [`LivenessOptions::from_env`]).
    pub fn new(cfg: &'cfg Cfg) -> Self {
        Self::with_options(cfg, LivenessOptions::from_env())
    }

    pub fn with_options(cfg: &'cfg Cfg, options: LivenessOptions) -> Self {
        Self {
            cfg,
            options,
            state: AnalysisState::NotRun,
            linear_order: Vec::new(),
            numbering: Numbering::default(),
            block_infos: Vec::new(),
        }
    }

    /// Run the analysis.
    ///
    /// # Panics
    ///
    /// Panics if called twice, or if verification is enabled and finds a
    /// broken invariant.
    pub fn analyze(&mut self) {
        assert_eq!(
            self.state,
            AnalysisState::NotRun,
            "liveness analysis already ran"
        );
        let cfg = self.cfg;

        self.linear_order = linearize(cfg);
        self.state = AnalysisState::Linearized;

        self.numbering = number_instructions(cfg, &self.linear_order);
        self.state = AnalysisState::Numbered;

        self.block_infos = compute_live_ranges(cfg, &self.linear_order, &mut self.numbering);
        self.state = AnalysisState::RangesComputed;

        compute_live_in_and_live_out(cfg, &self.linear_order, &mut self.block_infos);
        self.state = AnalysisState::Converged;

        if self.options.verify {
            self.verify();
        }
        if self.options.dump {
            eprintln!("=== liveness ===");
            eprintln!("{}", self.dump());
            eprintln!("=== end liveness ===");
        }
    }

    #[inline]
    pub fn state(&self) -> AnalysisState {
        self.state
    }

    #[inline]
    pub fn cfg(&self) -> &'cfg Cfg {
        self.cfg
    }

    #[inline]
    pub fn options(&self) -> LivenessOptions {
        self.options
    }

    fn assert_converged(&self) {
        assert_eq!(
            self.state,
            AnalysisState::Converged,
            "liveness results read before analyze() finished"
        );
    }

    // ── Block sets ──────────────────────────────────────────────────

    pub fn block_info(&self, block: BlockId) -> &BlockInfo {
        self.assert_converged();
        &self.block_infos[block.index()]
    }

    pub fn live_in(&self, block: BlockId) -> &LiveSet {
        self.block_info(block).live_in()
    }

    pub fn live_out(&self, block: BlockId) -> &LiveSet {
        self.block_info(block).live_out()
    }

    pub fn kill(&self, block: BlockId) -> &LiveSet {
        self.block_info(block).kill()
    }

    /// Blocks in the order positions were assigned.
    pub fn linear_order(&self) -> &[BlockId] {
        self.assert_converged();
        &self.linear_order
    }

    // ── Values and positions ────────────────────────────────────────

    pub fn number_of_values(&self) -> usize {
        self.assert_converged();
        self.numbering.values.len()
    }

    /// The instruction defining `value`.
    pub fn instruction_for_value(&self, value: ValueId) -> &'cfg Instr {
        self.assert_converged();
        self.cfg.instr(self.numbering.values.instr(value))
    }

    /// The value defined by `instr`, if it defines one.
    pub fn value_of(&self, instr: InstrId) -> Option<ValueId> {
        self.assert_converged();
        self.numbering.values.value_of(instr)
    }

    pub fn lifetime_position(&self, instr: InstrId) -> LifetimePos {
        self.assert_converged();
        self.numbering.lifetimes.position(instr)
    }

    pub fn block_lifetime_start(&self, block: BlockId) -> LifetimePos {
        self.assert_converged();
        self.numbering.lifetimes.block_span(block).start
    }

    pub fn block_lifetime_end(&self, block: BlockId) -> LifetimePos {
        self.assert_converged();
        self.numbering.lifetimes.block_span(block).end
    }

    // ── Intervals ───────────────────────────────────────────────────

    /// The interval of `value`, before any split the allocator made.
    pub fn interval(&self, value: ValueId) -> &LiveInterval {
        self.assert_converged();
        self.numbering.intervals.get(IntervalId::for_value(value))
    }

    pub fn intervals(&self) -> &IntervalArena {
        self.assert_converged();
        &self.numbering.intervals
    }

    /// Mutable access for the register allocator: splitting and register
    /// assignment.
    pub fn intervals_mut(&mut self) -> &mut IntervalArena {
        self.assert_converged();
        &mut self.numbering.intervals
    }

    /// Human-readable form of every block and interval, for debugging.
    pub fn dump(&self) -> LivenessDump<'_, 'cfg> {
        self.assert_converged();
        LivenessDump { analysis: self }
    }

    // ── Verification ────────────────────────────────────────────────

    fn verify(&self) {
        if let Err(msg) = verify_linear_order(self.cfg, &self.linear_order) {
            panic!("invalid linear order: {msg}");
        }

        let Numbering {
            lifetimes,
            values,
            intervals,
        } = &self.numbering;
        for (value, instr) in values.iter() {
            let interval = intervals.get(IntervalId::for_value(value));
            if let Err(msg) = interval.check_invariants() {
                panic!("interval of {value:?}: {msg}");
            }
            let def = lifetimes.position(instr);
            assert_eq!(
                interval.start(),
                def,
                "interval of {value:?} does not start at its definition: {interval}"
            );
        }

        for &block in &self.linear_order {
            let start = lifetimes.block_span(block).start;
            let live_in = self.block_infos[block.index()].live_in();
            for (value, _) in values.iter().filter(|(v, _)| live_in.contains(v.index())) {
                let interval = intervals.get(IntervalId::for_value(value));
                assert!(
                    interval.covers(start),
                    "{value:?} is live into {block:?} but its interval does not cover {start}: {interval}"
                );
            }
        }
        tracing::debug!(values = values.len(), "liveness verified");
    }
}

/// Display adapter returned by [`SsaLivenessAnalysis::dump`].
pub struct LivenessDump<'a, 'cfg> {
    analysis: &'a SsaLivenessAnalysis<'cfg>,
}

impl fmt::Display for LivenessDump<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = self.analysis;
        let lifetimes = &a.numbering.lifetimes;

        f.write_str("linear order:")?;
        for block in &a.linear_order {
            write!(f, " b{}", block.raw())?;
        }
        writeln!(f)?;

        for &block in &a.linear_order {
            let span = lifetimes.block_span(block);
            let info = &a.block_infos[block.index()];
            writeln!(
                f,
                "b{} [{},{}) live_in: {:?} live_out: {:?} kill: {:?}",
                block.raw(),
                span.start,
                span.end,
                info.live_in(),
                info.live_out(),
                info.kill(),
            )?;
        }

        for (value, instr) in a.numbering.values.iter() {
            let interval = a.numbering.intervals.get(IntervalId::for_value(value));
            writeln!(f, "v{} (i{}): {interval}", value.raw(), instr.raw())?;
        }
        Ok(())
    }
}

//! SSA liveness analysis for the Ori native backend.
//!
//! This crate turns a method body in SSA form into the liveness facts a
//! linear-scan register allocator works from:
//!
//! - **Linear order** ([`linearize`]): a block order where dominators come
//!   first and every loop body is contiguous.
//! - **Lifetime positions** ([`numbering`]): every block and instruction
//!   gets a position along that order; every value gets a dense
//!   [`ValueId`].
//! - **Live intervals** ([`LiveInterval`]): for each value, the sorted
//!   ranges of positions where it is live and the positions where it is
//!   read, plus the splitting and intersection primitives the allocator
//!   uses.
//! - **Block sets** ([`BlockInfo`]): `kill`, `live_in`, and `live_out` per
//!   block, solved to a fixed point.
//!
//! [`SsaLivenessAnalysis`] drives the passes in order and exposes the
//! results.
//!
//! # Design
//!
//! Follows the linear-scan-on-SSA scheme of Wimmer and Franz: ranges are
//! built in one backward walk over the linear order, and a value live at a
//! loop header is made live across the whole loop with a single range
//! instead of one range per loop block. All intervals of a method live in
//! one [`IntervalArena`] and are addressed by [`IntervalId`].
//!
//! Input graphs are validated once by [`CfgBuilder::build`]. After that,
//! every broken invariant is a compiler bug and panics.
//!
//! # Crate Dependencies
//!
//! Standalone: no dependency on the front-end crates. The SSA builder
//! lowers into [`Cfg`] through [`CfgBuilder`].

mod bitset;
mod block_info;
mod error;
mod graph;
mod options;

pub mod analysis;
pub mod interval;
pub mod ir;
pub mod linearize;
pub mod liveness;
pub mod numbering;

#[cfg(test)]
mod test_helpers;

pub use analysis::{AnalysisState, LivenessDump, SsaLivenessAnalysis};
pub use bitset::{BitSet, LiveSet};
pub use block_info::BlockInfo;
pub use error::CfgError;
pub use graph::DominatorTree;
pub use interval::{
    BlockSpan, IntervalArena, IntervalId, LifetimePos, LiveInterval, LiveRange, PhysReg,
    UsePosition,
};
pub use ir::{
    Block, BlockId, Cfg, CfgBuilder, Instr, InstrId, InstrKind, Loop, LoopId, ValueId, ValueType,
};
pub use options::{LivenessOptions, DEBUG_ENV_VAR};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Call this once at startup. Safe to call multiple times.
/// Enable with `RUST_LOG=ori_liveness=debug` or `RUST_LOG=ori_liveness=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .try_init()
                .ok();
        }
    });
}

//! Shared test utilities: ID shorthands and CFG shape factories.
//!
//! Only compiled in test builds.

use crate::interval::{BlockSpan, LifetimePos};
use crate::ir::{BlockId, Cfg, CfgBuilder, InstrId, ValueId, ValueType};
use crate::{init_tracing, LivenessOptions, SsaLivenessAnalysis};

/// Shorthand for `BlockId::new(n)`.
pub(crate) fn b(n: u32) -> BlockId {
    BlockId::new(n)
}

/// Shorthand for `InstrId::new(n)`.
pub(crate) fn i(n: u32) -> InstrId {
    InstrId::new(n)
}

/// Shorthand for `ValueId::new(n)`.
pub(crate) fn v(n: u32) -> ValueId {
    ValueId::new(n)
}

/// Shorthand for `LifetimePos::new(n)`.
pub(crate) fn lp(n: u32) -> LifetimePos {
    LifetimePos::new(n)
}

pub(crate) fn span(start: u32, end: u32) -> BlockSpan {
    BlockSpan {
        start: lp(start),
        end: lp(end),
    }
}

/// Run the analysis with verification on.
pub(crate) fn analyze(cfg: &Cfg) -> SsaLivenessAnalysis<'_> {
    init_tracing();
    let mut analysis = SsaLivenessAnalysis::with_options(
        cfg,
        LivenessOptions {
            verify: true,
            dump: false,
        },
    );
    analysis.analyze();
    analysis
}

/// A graph plus the instruction under test.
pub(crate) struct Shape {
    pub cfg: Cfg,
    /// The value the shape is built around.
    pub x: InstrId,
}

/// One block:
///
/// ```text
/// b0: i0 = op            ; x, pos 2
///     i1 = op i0         ; pos 4
///          op i1         ; pos 6, end 8
/// ```
pub(crate) fn straight_line() -> Shape {
    let mut cb = CfgBuilder::new();
    let b0 = cb.block();
    let x = cb.op(b0, Some(ValueType::Int), &[]);
    let y = cb.op(b0, Some(ValueType::Int), &[x]);
    cb.op(b0, None, &[y]);
    Shape {
        cfg: cb.build().unwrap(),
        x,
    }
}

/// Diamond, `x` defined in the entry and used only in the merge block:
///
/// ```text
///        b0 (x)
///       /  \
///     b1    b2
///       \  /
///        b3 (use x)
/// ```
///
/// Linear order is b0 b2 b1 b3; spans [0,4) [4,8) [8,12) [12,16).
pub(crate) fn diamond() -> Shape {
    let mut cb = CfgBuilder::new();
    let [b0, b1, b2, b3] = [cb.block(), cb.block(), cb.block(), cb.block()];
    let x = cb.op(b0, Some(ValueType::Int), &[]);
    cb.op(b1, None, &[]);
    cb.op(b2, None, &[]);
    cb.op(b3, None, &[x]);
    cb.edge(b0, b1);
    cb.edge(b0, b2);
    cb.edge(b1, b3);
    cb.edge(b2, b3);
    Shape {
        cfg: cb.build().unwrap(),
        x,
    }
}

/// Simple loop, `x` defined before it and used only after it:
///
/// ```text
/// b0 (x) -> b1 (header) -> b2 (body) -> b1
///              |
///              v
///             b3 (use x)
/// ```
///
/// Linear order is b0 b1 b2 b3; spans [0,4) [4,8) [8,12) [12,16).
pub(crate) fn simple_loop() -> Shape {
    let mut cb = CfgBuilder::new();
    let [b0, b1, b2, b3] = [cb.block(), cb.block(), cb.block(), cb.block()];
    let x = cb.op(b0, Some(ValueType::Int), &[]);
    cb.op(b1, None, &[]);
    cb.op(b2, None, &[]);
    cb.op(b3, None, &[x]);
    cb.edge(b0, b1);
    cb.edge(b1, b2);
    cb.edge(b1, b3);
    cb.edge(b2, b1);
    Shape {
        cfg: cb.build().unwrap(),
        x,
    }
}

/// Two nested loops, `x` defined before both and used after both:
///
/// ```text
/// b0 (x) -> b1 (outer header) -> b2 (inner header) -> b3 (inner body) -> b2
///              |                    |
///              v                    v
///             b5 (use x)           b4 (outer latch) -> b1
/// ```
///
/// Linear order is b0 .. b5; each block spans four positions.
pub(crate) fn nested_loop() -> Shape {
    let mut cb = CfgBuilder::new();
    let [b0, b1, b2, b3, b4, b5] = [
        cb.block(),
        cb.block(),
        cb.block(),
        cb.block(),
        cb.block(),
        cb.block(),
    ];
    let x = cb.op(b0, Some(ValueType::Int), &[]);
    for block in [b1, b2, b3, b4] {
        cb.op(block, None, &[]);
    }
    cb.op(b5, None, &[x]);
    cb.edge(b0, b1);
    cb.edge(b1, b2);
    cb.edge(b1, b5);
    cb.edge(b2, b3);
    cb.edge(b2, b4);
    cb.edge(b3, b2);
    cb.edge(b4, b1);
    Shape {
        cfg: cb.build().unwrap(),
        x,
    }
}

/// Counting loop with a loop-carried phi:
///
/// ```text
/// b0: i0 = op                 ; c, pos 2
/// b1: i1 = phi [i0, i3]       ; p, pos 4
///          op i1              ; pos 6
/// b2: i3 = op i1              ; n, pos 10
/// b3:      op i1              ; pos 14
/// ```
///
/// `x` is the phi.
pub(crate) fn phi_loop() -> Shape {
    let mut cb = CfgBuilder::new();
    let [b0, b1, b2, b3] = [cb.block(), cb.block(), cb.block(), cb.block()];
    let c = cb.op(b0, Some(ValueType::Int), &[]);
    let p = cb.phi(b1, ValueType::Int, &[]);
    cb.op(b1, None, &[p]);
    let n = cb.op(b2, Some(ValueType::Int), &[p]);
    cb.op(b3, None, &[p]);
    cb.set_phi_inputs(p, &[c, n]);
    cb.edge(b0, b1);
    cb.edge(b1, b2);
    cb.edge(b1, b3);
    cb.edge(b2, b1);
    Shape {
        cfg: cb.build().unwrap(),
        x: p,
    }
}

/// Two sibling loops, both entered straight from the entry, `x` used only
/// in the body of the second-placed one:
///
/// ```text
///            b0 (x)
///           /      \
///   b1 (header)    b2 (header)
///    |   ^  \      /   ^   |
///    v   |   \    /    |   v
///   b3 (use x) b5    b4 -+
/// ```
///
/// Linear order is b0 b2 b4 b1 b3 b5; spans [0,4) [4,8) [8,12) [12,16)
/// [16,20) [20,24).
pub(crate) fn sibling_loops() -> Shape {
    let mut cb = CfgBuilder::new();
    let [b0, b1, b2, b3, b4, b5] = [
        cb.block(),
        cb.block(),
        cb.block(),
        cb.block(),
        cb.block(),
        cb.block(),
    ];
    let x = cb.op(b0, Some(ValueType::Int), &[]);
    for block in [b1, b2, b4, b5] {
        cb.op(block, None, &[]);
    }
    cb.op(b3, None, &[x]);
    cb.edge(b0, b1);
    cb.edge(b0, b2);
    cb.edge(b1, b3);
    cb.edge(b3, b1);
    cb.edge(b2, b4);
    cb.edge(b4, b2);
    cb.edge(b1, b5);
    cb.edge(b2, b5);
    Shape {
        cfg: cb.build().unwrap(),
        x,
    }
}

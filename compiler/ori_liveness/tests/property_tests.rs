//! Property-based tests for live intervals.
//!
//! Random range lists and use lists are checked against brute-force
//! oracles that test every position individually:
//! 1. Range lists stay sorted, disjoint, and merged
//! 2. `covers`/`is_dead_at` agree with the union of ranges
//! 3. `first_register_use_after` is monotone and never looks backwards
//! 4. Splitting preserves the union of ranges and partitions the uses
//! 5. `first_intersection_with` finds the smallest common position
//! 6. Straight-line programs get exactly def-to-last-use intervals
//! 7. Structured graphs get contiguous loops, and a value defined in the
//!    entry is covered exactly at the starts of the blocks it is live into

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]
#![allow(
    clippy::doc_markdown,
    clippy::cast_possible_truncation,
    reason = "Proptest macros generate code with these patterns"
)]

use ori_liveness::{
    BlockId, BlockSpan, CfgBuilder, InstrId, LifetimePos, LiveInterval, LivenessOptions,
    SsaLivenessAnalysis, ValueType,
};
use proptest::prelude::*;

// -- Strategies --

/// Up to eight `[start, start + len)` ranges, in arbitrary order.
fn ranges_strategy() -> impl Strategy<Value = Vec<(u32, u32)>> {
    prop::collection::vec((0u32..200, 1u32..20), 1..8)
        .prop_map(|v| v.into_iter().map(|(s, len)| (s, s + len)).collect())
}

/// Distinct use positions, each tagged with whether it needs a register.
fn uses_strategy() -> impl Strategy<Value = Vec<(u32, bool)>> {
    prop::collection::btree_map(1u32..100, any::<bool>(), 1..12)
        .prop_map(|m| m.into_iter().collect())
}

/// Structured control flow. Lowering it always yields a reducible graph.
#[derive(Clone, Debug)]
enum Region {
    Block { uses_x: bool },
    Seq(Box<Region>, Box<Region>),
    Branch(Box<Region>, Box<Region>),
    Loop(Box<Region>),
}

fn region_strategy() -> impl Strategy<Value = Region> {
    let leaf = any::<bool>().prop_map(|uses_x| Region::Block { uses_x });
    leaf.prop_recursive(5, 32, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| Region::Seq(Box::new(a), Box::new(b))),
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| Region::Branch(Box::new(a), Box::new(b))),
            inner.prop_map(|body| Region::Loop(Box::new(body))),
        ]
    })
}

// -- Helpers --

/// Lower `region` so that it is entered from `from`. Returns the block
/// control leaves the region through.
fn lower(cb: &mut CfgBuilder, region: &Region, from: BlockId, x: InstrId) -> BlockId {
    match region {
        Region::Block { uses_x } => {
            let block = cb.block();
            let inputs: &[InstrId] = if *uses_x { &[x] } else { &[] };
            cb.op(block, None, inputs);
            cb.edge(from, block);
            block
        }
        Region::Seq(first, second) => {
            let mid = lower(cb, first, from, x);
            lower(cb, second, mid, x)
        }
        Region::Branch(left, right) => {
            let left = lower(cb, left, from, x);
            let right = lower(cb, right, from, x);
            let join = cb.block();
            cb.edge(left, join);
            cb.edge(right, join);
            join
        }
        Region::Loop(body) => {
            let header = cb.block();
            cb.edge(from, header);
            let latch = lower(cb, body, header, x);
            cb.edge(latch, header);
            let exit = cb.block();
            cb.edge(header, exit);
            exit
        }
    }
}

fn pos(n: u32) -> LifetimePos {
    LifetimePos::new(n)
}

fn build(ranges: &[(u32, u32)]) -> LiveInterval {
    let (&(s, e), rest) = ranges.split_first().unwrap();
    let mut it = LiveInterval::with_range(ValueType::Int, pos(s), pos(e));
    for &(s, e) in rest {
        it.add_range(pos(s), pos(e));
    }
    it
}

fn oracle_covers(ranges: &[(u32, u32)], p: u32) -> bool {
    ranges.iter().any(|&(s, e)| s <= p && p < e)
}

fn max_end(ranges: &[(u32, u32)]) -> u32 {
    ranges.iter().map(|&(_, e)| e).max().unwrap()
}

/// An interval over one block `[0, 200)` with the given uses, added last to
/// first the way the liveness pass adds them.
fn with_uses(uses: &[(u32, bool)]) -> LiveInterval {
    let block = BlockSpan {
        start: pos(0),
        end: pos(200),
    };
    let mut it = LiveInterval::seeded(ValueType::Int, pos(0), pos(200));
    for (n, &(p, needs_register)) in uses.iter().enumerate().rev() {
        it.add_use(InstrId::new(n as u32), pos(p), block, needs_register);
    }
    it
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    /// Ranges stay canonical whatever order they are added in.
    #[test]
    fn prop_ranges_stay_canonical(ranges in ranges_strategy()) {
        let it = build(&ranges);
        prop_assert_eq!(it.check_invariants(), Ok(()));
        for w in it.ranges().windows(2) {
            prop_assert!(w[0].end() < w[1].start());
        }
    }

    /// `covers` and `is_dead_at` agree with the union of the input ranges.
    #[test]
    fn prop_covers_matches_union(ranges in ranges_strategy()) {
        let it = build(&ranges);
        let end = max_end(&ranges);
        for p in 0..end + 5 {
            prop_assert_eq!(it.covers(pos(p)), oracle_covers(&ranges, p), "covers({})", p);
            prop_assert_eq!(it.is_dead_at(pos(p)), p >= end, "is_dead_at({})", p);
        }
    }

    /// The next register use never moves backwards and is never before the
    /// queried position.
    #[test]
    fn prop_first_register_use_monotone(uses in uses_strategy()) {
        let it = with_uses(&uses);
        let mut previous = None;
        for p in 0..110 {
            let next = it.first_register_use_after(pos(p));
            let expected = uses.iter().find(|&&(u, reg)| u >= p && reg).map(|&(u, _)| pos(u));
            prop_assert_eq!(next, expected);
            if let Some(found) = next {
                prop_assert!(found >= pos(p));
            }
            if let (Some(prev), Some(found)) = (previous, next) {
                prop_assert!(prev <= found);
            }
            if next.is_some() {
                previous = next;
            }
        }
    }

    /// Splitting keeps every live position on exactly one side of the cut.
    #[test]
    fn prop_split_preserves_union(ranges in ranges_strategy(), offset in 1u32..240) {
        let original = build(&ranges);
        let start = original.start().raw();
        let end = max_end(&ranges);
        let at = start + offset;

        let mut head = original.clone();
        match head.split_off(pos(at)) {
            None => {
                prop_assert!(at >= end);
                prop_assert_eq!(&head, &original);
            }
            Some(tail) => {
                prop_assert!(at < end);
                prop_assert_eq!(head.check_invariants(), Ok(()));
                prop_assert_eq!(tail.check_invariants(), Ok(()));
                prop_assert!(head.end() <= pos(at));
                prop_assert!(tail.start() >= pos(at));
                for p in 0..end + 5 {
                    prop_assert_eq!(
                        head.covers(pos(p)) || tail.covers(pos(p)),
                        original.covers(pos(p)),
                        "position {}", p
                    );
                    prop_assert!(!(head.covers(pos(p)) && tail.covers(pos(p))));
                }
            }
        }
    }

    /// Uses are partitioned at the split position.
    #[test]
    fn prop_split_partitions_uses(uses in uses_strategy(), at in 1u32..100) {
        let mut head = with_uses(&uses);
        let total = head.uses().len();
        if let Some(tail) = head.split_off(pos(at)) {
            prop_assert!(head.uses().iter().all(|u| u.position() < pos(at)));
            prop_assert!(tail.uses().iter().all(|u| u.position() >= pos(at)));
            prop_assert!(tail.uses().iter().all(|u| u.position() >= tail.start()));
            prop_assert_eq!(head.uses().len() + tail.uses().len(), total);
        }
    }

    /// The first intersection is the smallest position both intervals cover.
    #[test]
    fn prop_first_intersection_is_minimal(a in ranges_strategy(), b in ranges_strategy()) {
        let (a, b) = if build(&a).start() <= build(&b).start() { (a, b) } else { (b, a) };
        let ia = build(&a);
        let ib = build(&b);
        if ia.covers(ib.start()) {
            // `b` must start in a hole of `a`.
            return Ok(());
        }

        let limit = max_end(&a).max(max_end(&b));
        let expected = (0..limit)
            .find(|&p| oracle_covers(&a, p) && oracle_covers(&b, p))
            .map(pos);
        prop_assert_eq!(ia.first_intersection_with(&ib), expected);
    }

    /// In one block, every value lives from its definition to its last use,
    /// or just its own slot if nothing reads it.
    #[test]
    fn prop_straight_line_intervals(
        operands in prop::collection::vec(prop::collection::vec(any::<prop::sample::Index>(), 0..3), 1..20)
    ) {
        let mut cb = CfgBuilder::new();
        let block = cb.block();
        let mut instrs: Vec<InstrId> = Vec::new();
        for picks in &operands {
            let inputs: Vec<InstrId> = if instrs.is_empty() {
                Vec::new()
            } else {
                picks.iter().map(|ix| instrs[ix.index(instrs.len())]).collect()
            };
            instrs.push(cb.op(block, Some(ValueType::Long), &inputs));
        }
        let cfg = cb.build().unwrap();

        let mut analysis = SsaLivenessAnalysis::with_options(
            &cfg,
            LivenessOptions { verify: true, dump: false },
        );
        analysis.analyze();

        for (k, &id) in instrs.iter().enumerate() {
            let def = 2 + 2 * k as u32;
            let last_use = cfg
                .instrs()
                .iter()
                .filter(|user| user.inputs.contains(&id))
                .map(|user| 2 + 2 * user.id.raw())
                .max();
            let value = analysis.value_of(id).unwrap();
            let interval = analysis.interval(value);
            let expected_end = last_use.unwrap_or(def + 2);
            prop_assert_eq!(interval.ranges().len(), 1);
            prop_assert_eq!(interval.start(), pos(def));
            prop_assert_eq!(interval.end(), pos(expected_end));
        }
    }

    /// Every loop is contiguous and starts at its header, and the entry
    /// value is covered at a block start exactly when it is live into it.
    #[test]
    fn prop_structured_graphs(region in region_strategy()) {
        let mut cb = CfgBuilder::new();
        let entry = cb.block();
        let x = cb.op(entry, Some(ValueType::Int), &[]);
        lower(&mut cb, &region, entry, x);
        let cfg = cb.build().unwrap();

        let mut analysis = SsaLivenessAnalysis::with_options(
            &cfg,
            LivenessOptions { verify: true, dump: false },
        );
        analysis.analyze();

        let order = analysis.linear_order();
        let index_of = |block: BlockId| order.iter().position(|&o| o == block).unwrap();
        for l in cfg.loops() {
            let members: Vec<usize> = l
                .blocks
                .iter()
                .map(|m| index_of(BlockId::new(m as u32)))
                .collect();
            let first = *members.iter().min().unwrap();
            let last = *members.iter().max().unwrap();
            prop_assert_eq!(last - first + 1, members.len(), "loop at {:?} in {:?}", l.header, order);
            prop_assert_eq!(order[first], l.header);
        }

        let value = analysis.value_of(x).unwrap();
        let interval = analysis.interval(value);
        for &block in order {
            prop_assert_eq!(
                interval.covers(analysis.block_lifetime_start(block)),
                analysis.live_in(block).contains(value.index()),
                "{:?}: {}", block, interval
            );
        }
    }
}

//! Live intervals: the per-value liveness representation consumed by the
//! register allocator.
//!
//! # Key Concepts
//!
//! - **[`LifetimePos`]**: a position in the linearized method. Each
//!   instruction owns an even entry position and the odd position after it.
//! - **[`LiveRange`]**: a half-open span `[start, end)` where a value is live.
//! - **[`UsePosition`]**: a position where a value is read, tagged with
//!   whether the read needs a register.
//! - **[`LiveInterval`]**: the sorted, disjoint, non-touching ranges plus the
//!   sorted uses of one value, or of one split fragment of a value.
//! - **[`IntervalArena`]**: owns every interval of one method; split
//!   fragments are chained through [`LiveInterval::sibling`].
//!
//! Ranges are built back to front: the liveness pass walks blocks in linear
//! postorder and instructions backwards, so new ranges almost always land in
//! front of the existing ones. Callers rely on that order; see the individual
//! methods for the exact preconditions.

use std::fmt;

use smallvec::{smallvec, SmallVec};

use crate::ir::{InstrId, ValueId, ValueType};

// ── Positions ───────────────────────────────────────────────────────

/// A lifetime position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct LifetimePos(u32);

impl LifetimePos {
    /// Distance between two consecutive instructions.
    pub const INSTRUCTION_STRIDE: u32 = 2;

    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Is this an instruction's entry position (as opposed to its exit)?
    #[inline]
    pub const fn is_entry(self) -> bool {
        self.0 % 2 == 0
    }

    /// Entry position of the next instruction slot.
    #[inline]
    #[must_use]
    pub const fn next_instruction(self) -> Self {
        Self(self.0 + Self::INSTRUCTION_STRIDE)
    }
}

impl fmt::Display for LifetimePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The `[start, end)` lifetime span of a basic block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockSpan {
    /// Position of the block's first slot (its phis).
    pub start: LifetimePos,
    /// One past the exit of the block's last instruction.
    pub end: LifetimePos,
}

// ── Ranges and uses ─────────────────────────────────────────────────

/// A half-open span `[start, end)` where a value is live. Never empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LiveRange {
    start: LifetimePos,
    end: LifetimePos,
}

impl LiveRange {
    /// # Panics
    ///
    /// Panics if `start >= end`.
    pub fn new(start: LifetimePos, end: LifetimePos) -> Self {
        assert!(start < end, "empty live range [{start},{end})");
        Self { start, end }
    }

    #[inline]
    pub fn start(&self) -> LifetimePos {
        self.start
    }

    #[inline]
    pub fn end(&self) -> LifetimePos {
        self.end
    }

    #[inline]
    pub fn contains(&self, position: LifetimePos) -> bool {
        self.start <= position && position < self.end
    }

    #[inline]
    pub fn intersects_with(&self, other: &LiveRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Does this range end at or before `other` starts?
    #[inline]
    pub fn is_before(&self, other: &LiveRange) -> bool {
        self.end <= other.start
    }
}

impl fmt::Display for LiveRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{})", self.start, self.end)
    }
}

/// A read of a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UsePosition {
    user: InstrId,
    position: LifetimePos,
    needs_register: bool,
}

impl UsePosition {
    pub fn new(user: InstrId, position: LifetimePos, needs_register: bool) -> Self {
        Self {
            user,
            position,
            needs_register,
        }
    }

    #[inline]
    pub fn user(&self) -> InstrId {
        self.user
    }

    #[inline]
    pub fn position(&self) -> LifetimePos {
        self.position
    }

    /// `false` for reads that only keep the value alive, such as values
    /// captured in a deoptimization environment.
    #[inline]
    pub fn needs_register(&self) -> bool {
        self.needs_register
    }
}

// ── Physical registers ──────────────────────────────────────────────

/// Physical register number, as chosen by the register allocator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PhysReg(u16);

impl PhysReg {
    #[inline]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

// ── Intervals ───────────────────────────────────────────────────────

/// Handle to a [`LiveInterval`] inside an [`IntervalArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct IntervalId(u32);

impl IntervalId {
    /// The interval lifetime numbering allocated for `value`. Split fragments
    /// are reached through its sibling chain.
    #[inline]
    pub fn for_value(value: ValueId) -> Self {
        Self(value.raw())
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The liveness of one value (or one split fragment of it).
///
/// Invariants, checked by [`LiveInterval::check_invariants`]:
/// - at least one range;
/// - ranges strictly ascending, and no two overlap or touch;
/// - uses ascending by position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveInterval {
    ranges: SmallVec<[LiveRange; 2]>,
    uses: Vec<UsePosition>,
    ty: ValueType,
    register: Option<PhysReg>,
    sibling: Option<IntervalId>,
    /// The single range is the provisional one installed at numbering time
    /// and has not been confirmed by any use or live-through block yet.
    provisional: bool,
}

impl LiveInterval {
    /// An interval seeded with the provisional range `[def, block_end)`.
    ///
    /// The first range-building call (`add_use`, `add_range`,
    /// `add_loop_range`) replaces the seed with real liveness. If none
    /// happens, [`set_from`](Self::set_from) shrinks it to the definition
    /// slot.
    pub fn seeded(ty: ValueType, def: LifetimePos, block_end: LifetimePos) -> Self {
        Self {
            ranges: smallvec![LiveRange::new(def, block_end)],
            uses: Vec::new(),
            ty,
            register: None,
            sibling: None,
            provisional: true,
        }
    }

    /// An interval with one confirmed range.
    pub fn with_range(ty: ValueType, start: LifetimePos, end: LifetimePos) -> Self {
        Self {
            provisional: false,
            ..Self::seeded(ty, start, end)
        }
    }

    #[inline]
    pub fn value_type(&self) -> ValueType {
        self.ty
    }

    #[inline]
    pub fn ranges(&self) -> &[LiveRange] {
        &self.ranges
    }

    #[inline]
    pub fn uses(&self) -> &[UsePosition] {
        &self.uses
    }

    /// The fragment produced by splitting this interval, if any.
    #[inline]
    pub fn sibling(&self) -> Option<IntervalId> {
        self.sibling
    }

    #[inline]
    pub fn start(&self) -> LifetimePos {
        self.ranges[0].start
    }

    #[inline]
    pub fn end(&self) -> LifetimePos {
        self.last_range().end
    }

    #[inline]
    fn last_range(&self) -> &LiveRange {
        &self.ranges[self.ranges.len() - 1]
    }

    // ── Registers ───────────────────────────────────────────────────

    #[inline]
    pub fn register(&self) -> Option<PhysReg> {
        self.register
    }

    #[inline]
    pub fn set_register(&mut self, reg: PhysReg) {
        self.register = Some(reg);
    }

    #[inline]
    pub fn clear_register(&mut self) {
        self.register = None;
    }

    #[inline]
    pub fn has_register(&self) -> bool {
        self.register.is_some()
    }

    // ── Construction ────────────────────────────────────────────────

    fn drop_provisional(&mut self) {
        if self.provisional {
            self.ranges.clear();
            self.provisional = false;
        }
    }

    fn insert_use(&mut self, use_pos: UsePosition) {
        let at = self
            .uses
            .partition_point(|u| u.position < use_pos.position);
        self.uses.insert(at, use_pos);
    }

    /// Record a read by `user` at `position`, inside the block spanning `span`.
    ///
    /// Uses must be added back to front: every existing range lies in this
    /// block or after it.
    ///
    /// - No range yet: the value is live from the block start to the use.
    /// - The leading range already starts at this block: the use is an
    ///   earlier read in the same block and must fall inside it.
    /// - The leading range starts right where this block ends: extend it.
    /// - Otherwise there is a lifetime hole; push a new leading range.
    pub fn add_use(&mut self, user: InstrId, position: LifetimePos, span: BlockSpan, needs_register: bool) {
        self.drop_provisional();
        match self.ranges.first().copied() {
            None => self.ranges.push(LiveRange::new(span.start, position)),
            Some(first) if first.start == span.start => {
                assert!(
                    position <= first.end,
                    "use at {position} escapes the range {first} of its own block"
                );
            }
            Some(first) if first.start == span.end => self.ranges[0].start = span.start,
            Some(first) => {
                assert!(
                    span.end < first.start,
                    "use at {position} added out of order before {first}"
                );
                self.ranges.insert(0, LiveRange::new(span.start, position));
            }
        }
        self.insert_use(UsePosition::new(user, position, needs_register));
    }

    /// Record that a phi in a successor consumes this value at the end of
    /// the predecessor block ending at `block_end`. Ranges are unchanged.
    pub fn add_phi_use(&mut self, phi: InstrId, block_end: LifetimePos) {
        self.insert_use(UsePosition::new(phi, block_end, true));
    }

    /// Mark the value live over `[start, end)`.
    ///
    /// Touching or overlapping ranges are merged, so the result is always a
    /// canonical range list regardless of insertion order.
    pub fn add_range(&mut self, start: LifetimePos, end: LifetimePos) {
        self.drop_provisional();
        let mut new = LiveRange::new(start, end);

        // Ranges entirely before `new` (not even touching) stay untouched.
        let lo = self.ranges.partition_point(|r| r.end < new.start);
        // Ranges from `hi` on start after `new` ends without touching it.
        let hi = self.ranges.partition_point(|r| r.start <= new.end);
        if lo < hi {
            new.start = new.start.min(self.ranges[lo].start);
            new.end = new.end.max(self.ranges[hi - 1].end);
        }
        self.ranges.drain(lo..hi);
        self.ranges.insert(lo, new);
    }

    /// Mark the value live over a whole loop `[start, end)`.
    ///
    /// Called for values live at a loop header once the loop's blocks have
    /// been processed. Ranges inside the loop are absorbed. A range that
    /// reaches the loop end is extended back to `start`; if the next use
    /// after the loop sits behind a hole, the loop gets its own range.
    pub fn add_loop_range(&mut self, start: LifetimePos, end: LifetimePos) {
        self.drop_provisional();
        debug_assert!(
            self.ranges.first().is_none_or(|r| start <= r.start),
            "loop range must not start after the value's first range"
        );

        let after_loop = self.ranges.iter().position(|r| r.end >= end);
        match after_loop {
            None => {
                // Uses are only in the loop.
                self.ranges.clear();
                self.ranges.push(LiveRange::new(start, end));
            }
            Some(i) if self.ranges[i].start <= end => {
                // There are uses after the loop, contiguous with it.
                self.ranges.drain(..i);
                self.ranges[0].start = start;
            }
            Some(i) => {
                // The use after the loop is after a lifetime hole.
                self.ranges.drain(..i);
                self.ranges.insert(0, LiveRange::new(start, end));
            }
        }
    }

    /// Move the start of the leading range to the definition at `from`.
    ///
    /// A value nobody reads keeps the definition slot `[from, from + 2)`.
    pub fn set_from(&mut self, from: LifetimePos) {
        if self.provisional {
            self.ranges.clear();
            self.ranges
                .push(LiveRange::new(from, from.next_instruction()));
            self.provisional = false;
            return;
        }
        let first = &mut self.ranges[0];
        assert!(
            from < first.end,
            "definition at {from} is not before the end of {first}"
        );
        first.start = from;
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Is the value live at `position`?
    pub fn covers(&self, position: LifetimePos) -> bool {
        self.ranges.iter().any(|r| r.contains(position))
    }

    /// Is the value dead at and after `position`?
    #[inline]
    pub fn is_dead_at(&self, position: LifetimePos) -> bool {
        self.end() <= position
    }

    /// First use at or after `position` that needs the value in a register.
    pub fn first_register_use_after(&self, position: LifetimePos) -> Option<LifetimePos> {
        self.uses
            .iter()
            .find(|u| u.position >= position && u.needs_register)
            .map(|u| u.position)
    }

    /// First use that needs a register.
    pub fn first_register_use(&self) -> Option<LifetimePos> {
        self.first_register_use_after(self.start())
    }

    #[inline]
    pub fn starts_before(&self, other: &LiveInterval) -> bool {
        self.start() <= other.start()
    }

    #[inline]
    pub fn starts_after(&self, other: &LiveInterval) -> bool {
        self.start() >= other.start()
    }

    /// The first position where `self` and `other` are both live.
    ///
    /// Used when `other` begins inside a lifetime hole of `self`: the
    /// allocator needs to know how long the hole stays free.
    ///
    /// # Panics
    ///
    /// Panics unless `self` starts no later than `other` and does not cover
    /// `other`'s start.
    pub fn first_intersection_with(&self, other: &LiveInterval) -> Option<LifetimePos> {
        let other_start = other.start();
        assert!(
            self.start() <= other_start,
            "first_intersection_with: {self} starts after {other}"
        );
        assert!(
            !self.covers(other_start),
            "first_intersection_with: {self} covers the start of {other}"
        );

        // Ranges starting before `other` end before it too.
        let mut i = self.ranges.partition_point(|r| r.start < other_start);
        let mut j = 0;
        while i < self.ranges.len() && j < other.ranges.len() {
            let (mine, theirs) = (&self.ranges[i], &other.ranges[j]);
            if mine.intersects_with(theirs) {
                return Some(mine.start.max(theirs.start));
            }
            if mine.is_before(theirs) {
                i += 1;
            } else {
                debug_assert!(theirs.is_before(mine));
                j += 1;
            }
        }
        None
    }

    // ── Splitting ───────────────────────────────────────────────────

    /// Cut this interval at `position`.
    ///
    /// `self` keeps `[start, position)`; the returned fragment gets
    /// `[position, end)`. Uses before the fragment's first live position
    /// stay, the rest move. Inside a range that position is `position`
    /// itself; in a lifetime hole it is the start of the next range, so a
    /// use ending the last kept range stays here. Returns `None` if the
    /// value is already dead at `position`.
    ///
    /// Does not link siblings; [`IntervalArena::split_at`] does.
    ///
    /// # Panics
    ///
    /// Panics if `position <= self.start()`.
    pub fn split_off(&mut self, position: LifetimePos) -> Option<LiveInterval> {
        assert!(
            position > self.start(),
            "cannot split {self} at {position}: not after its start"
        );
        if self.is_dead_at(position) {
            return None;
        }

        // First range still live at or after `position`. Exists because
        // the interval is not dead there.
        let idx = self.ranges.partition_point(|r| r.end <= position);
        let tail: SmallVec<[LiveRange; 2]> = if position <= self.ranges[idx].start {
            // `position` is in the hole before ranges[idx].
            debug_assert!(idx > 0, "split position before the first range");
            self.ranges.drain(idx..).collect()
        } else {
            // `position` is strictly inside ranges[idx].
            let covering = self.ranges[idx];
            self.ranges[idx].end = position;
            let mut tail = SmallVec::with_capacity(self.ranges.len() - idx);
            tail.push(LiveRange::new(position, covering.end));
            tail.extend(self.ranges.drain(idx + 1..));
            tail
        };

        // A read ends its range at the use position, so a use sitting on the
        // end of the last kept range belongs here, not to the fragment.
        let tail_start = tail[0].start;
        let first_moved = self.uses.partition_point(|u| u.position < tail_start);
        let uses = self.uses.split_off(first_moved);

        Some(LiveInterval {
            ranges: tail,
            uses,
            ty: self.ty,
            register: None,
            sibling: None,
            provisional: false,
        })
    }

    // ── Verification ────────────────────────────────────────────────

    /// Check the range and use list invariants.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.ranges.is_empty() {
            return Err("interval has no ranges".to_owned());
        }
        for pair in self.ranges.windows(2) {
            if pair[0].end >= pair[1].start {
                return Err(format!(
                    "ranges {} and {} overlap or touch in {self}",
                    pair[0], pair[1]
                ));
            }
        }
        for pair in self.uses.windows(2) {
            if pair[0].position > pair[1].position {
                return Err(format!("uses out of order in {self}"));
            }
        }
        Ok(())
    }
}

impl fmt::Display for LiveInterval {
    /// `ranges: { [s1,e1) [s2,e2) }, uses: { p1 p2 }`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ranges: { ")?;
        for range in &self.ranges {
            write!(f, "{range} ")?;
        }
        f.write_str("}, uses: { ")?;
        for use_pos in &self.uses {
            write!(f, "{} ", use_pos.position)?;
        }
        f.write_str("}")
    }
}

// ── Arena ───────────────────────────────────────────────────────────

/// Owner of every [`LiveInterval`] of one method.
///
/// Intervals are never freed individually; the arena is dropped as a whole
/// when the method's compilation finishes. Intervals allocated by lifetime
/// numbering come first, so `IntervalId` and `ValueId` indices coincide for
/// unsplit values.
#[derive(Clone, Debug, Default)]
pub struct IntervalArena {
    intervals: Vec<LiveInterval>,
}

impl IntervalArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            intervals: Vec::with_capacity(capacity),
        }
    }

    pub fn alloc(&mut self, interval: LiveInterval) -> IntervalId {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "interval counts fit in u32"
        )]
        let id = IntervalId(self.intervals.len() as u32);
        self.intervals.push(interval);
        id
    }

    #[inline]
    pub fn get(&self, id: IntervalId) -> &LiveInterval {
        &self.intervals[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: IntervalId) -> &mut LiveInterval {
        &mut self.intervals[id.index()]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (IntervalId, &LiveInterval)> {
        (0u32..).map(IntervalId).zip(&self.intervals)
    }

    /// Split interval `id` at `position` and link the new fragment as its
    /// sibling.
    ///
    /// To split a value again, split the newest sibling in its chain.
    ///
    /// # Panics
    ///
    /// Panics if `id` already has a sibling, or if `position` is not after
    /// the interval's start.
    pub fn split_at(&mut self, id: IntervalId, position: LifetimePos) -> Option<IntervalId> {
        let interval = &mut self.intervals[id.index()];
        assert!(
            interval.sibling.is_none(),
            "{id:?} was already split; split its newest sibling instead"
        );
        let tail = interval.split_off(position)?;
        let new_id = self.alloc(tail);
        self.intervals[id.index()].sibling = Some(new_id);
        tracing::trace!(from = id.raw(), to = new_id.raw(), at = position.raw(), "split interval");
        Some(new_id)
    }

    /// `id` followed by every fragment split off from it, in order.
    pub fn siblings(&self, id: IntervalId) -> impl Iterator<Item = IntervalId> + '_ {
        std::iter::successors(Some(id), |&cur| self.get(cur).sibling)
    }
}

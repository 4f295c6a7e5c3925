//! Contiguous cell store; stride-partitioned append across worker threads.
//!
//! Index 0 is reserved as the chain-termination sentinel and is never
//! written. Worker `id` (0-based, out of `n` workers) owns indices
//! `{start, start+n, start+2n, ...}` where `start` is `n` for worker 0
//! (so it skips the sentinel) and `id` otherwise.

use std::cell::Cell as StdCell;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::engine::point::Point;

/// One arena record. `next` chains within a hash bucket; `v` accumulates
/// the neighbour-contribution sum for this generation.
///
/// `point` and `next` are written exactly once, by the worker that owns
/// this slot, before the slot is published into a hash bucket via
/// [`SpatialHash::add_cell`](crate::engine::hash::SpatialHash::add_cell)'s
/// `Release` compare-and-swap. Every other thread only ever reads them,
/// and only after observing that CAS (`Acquire` on the bucket head, or
/// transitively via a chain walk rooted at it), so the plain `Cell<T>`
/// writes are visible under the usual happens-before edge — the same
/// publish-then-link pattern a lock-free queue uses for its slots. `v`
/// is mutated concurrently by any worker adding a contribution, so it
/// stays atomic.
pub struct CellSlot {
    point: StdCell<Point>,
    next: StdCell<u32>,
    v: AtomicU8,
}

// Safety: see the struct doc. `point`/`next` follow a write-once,
// publish-via-CAS discipline; `v` is already `Sync` via `AtomicU8`.
unsafe impl Sync for CellSlot {}

impl CellSlot {
    #[inline(always)]
    pub fn point(&self) -> Point {
        self.point.get()
    }

    #[inline(always)]
    pub fn next(&self) -> u32 {
        self.next.get()
    }

    /// Current contribution sum. Only meaningful after the generation's
    /// whole-phase barrier has released every worker; within a phase,
    /// only eventual consistency of the sum is needed, so this load is
    /// `Relaxed`.
    #[inline(always)]
    pub fn value(&self) -> u8 {
        self.v.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub(crate) fn fetch_add(&self, delta: u8) -> u8 {
        self.v.fetch_add(delta, Ordering::Relaxed)
    }

    #[inline]
    fn reset(&self) {
        self.v.store(0, Ordering::Relaxed);
    }
}

/// Growable, append-only (within a generation) cell store.
pub struct CellArena {
    slots: Box<[CellSlot]>,
}

impl CellArena {
    /// Allocate a slot store with room for at least `capacity` entries
    /// (plus the reserved sentinel slot 0).
    pub fn with_capacity(capacity: usize) -> Self {
        let len = capacity.max(1) + 1;
        let slots = (0..len)
            .map(|_| CellSlot {
                point: StdCell::new(Point::new(0, 0)),
                next: StdCell::new(0),
                v: AtomicU8::new(0),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        CellArena { slots }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Clear logical contents for a fresh generation. Only the atomic
    /// value needs resetting — `point`/`next` are overwritten before
    /// they are read again this generation.
    pub fn clear(&self) {
        for slot in self.slots.iter() {
            slot.reset();
        }
    }

    #[inline(always)]
    pub fn get(&self, index: u32) -> &CellSlot {
        &self.slots[index as usize]
    }

    /// Write a brand-new record at `index`. Caller guarantees `index`
    /// belongs to its own partition and has not yet been published into
    /// a bucket chain.
    #[inline]
    pub fn write(&self, index: u32, point: Point, next: u32, v: u8) {
        let slot = &self.slots[index as usize];
        slot.point.set(point);
        slot.next.set(next);
        slot.v.store(v, Ordering::Relaxed);
    }
}

/// Initial write cursor for worker `id` (0-based) out of `n` workers.
/// Index 0 is the sentinel, so worker 0 starts at `n` instead.
#[inline(always)]
pub fn partition_start(id: u32, n: u32) -> u32 {
    if id == 0 {
        n
    } else {
        id
    }
}

/// Required arena capacity for a generation with `live` cells outside
/// static (inactive-tile) regions, run on `n` worker threads: each live
/// cell can contribute to itself and up to 8 neighbours.
#[inline]
pub fn required_capacity(live_outside_static: usize, n: u32) -> usize {
    live_outside_static.saturating_mul(8 + n as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_starts_skip_sentinel() {
        assert_eq!(partition_start(0, 4), 4);
        assert_eq!(partition_start(1, 4), 1);
        assert_eq!(partition_start(3, 4), 3);
    }

    #[test]
    fn write_then_read_round_trips() {
        let arena = CellArena::with_capacity(8);
        arena.write(3, Point::new(10, 20), 7, 12);
        let slot = arena.get(3);
        assert_eq!(slot.point(), Point::new(10, 20));
        assert_eq!(slot.next(), 7);
        assert_eq!(slot.value(), 12);
    }

    #[test]
    fn clear_resets_value_only() {
        let arena = CellArena::with_capacity(4);
        arena.write(1, Point::new(1, 1), 0, 9);
        arena.clear();
        assert_eq!(arena.get(1).value(), 0);
    }
}

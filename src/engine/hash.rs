//! Lock-free spatial hash: bucket heads into the cell arena, chained by
//! compare-and-swap.
//!
//! `addCell` is the sole mutating entry point. Concurrent calls on the
//! same bucket are linearised by the CAS on the bucket head; value
//! updates on an existing record are commutative adds and need only
//! `Relaxed` ordering.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::engine::arena::CellArena;
use crate::engine::point::Point;

/// Hash order `k` is clamped to this range regardless of how many
/// populated cells are expected this generation.
pub const MIN_ORDER: u32 = 6;
pub const MAX_ORDER: u32 = 12;

/// The order `k` a hash sized for `expected` populated cells would use,
/// without allocating the bucket array — cheap enough to call every
/// generation just to check whether a resize is warranted.
#[inline]
pub fn order_for(expected: usize) -> u32 {
    let mut k = MIN_ORDER;
    while k < MAX_ORDER && (1usize << (2 * k)) < expected {
        k += 1;
    }
    k
}

pub struct SpatialHash {
    buckets: Box<[AtomicU32]>,
    order: u32,
    shift: u32,
}

impl SpatialHash {
    /// Choose `k` so `2^(2k)` comfortably covers `expected` populated
    /// cells, clamped to `[MIN_ORDER, MAX_ORDER]`, and derive `shift` so
    /// `(x*x) >> shift` yields a k-bit quantity.
    pub fn new(expected: usize) -> Self {
        Self::with_order(order_for(expected))
    }

    pub fn with_order(order: u32) -> Self {
        let order = order.clamp(MIN_ORDER, MAX_ORDER);
        let shift = 32u32.saturating_sub(order);
        let len = 1usize << (2 * order);
        let buckets = (0..len)
            .map(|_| AtomicU32::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        SpatialHash {
            buckets,
            order,
            shift,
        }
    }

    #[inline(always)]
    pub fn order(&self) -> u32 {
        self.order
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Clear every bucket head for a fresh generation.
    pub fn clear(&self) {
        for b in self.buckets.iter() {
            b.store(0, Ordering::Relaxed);
        }
    }

    /// The middle-bits-of-squared-coordinates mixing function:
    /// `((x*x) >> shift) XOR (((y*y) >> shift) << k)`.
    #[inline(always)]
    pub fn index(&self, p: Point) -> usize {
        let hx = p.x.wrapping_mul(p.x) >> self.shift;
        let hy = p.y.wrapping_mul(p.y) >> self.shift;
        ((hx ^ (hy << self.order)) as usize) & (self.buckets.len() - 1)
    }

    /// Add a neighbour/self contribution `v` to the cell at `p`,
    /// inserting a new arena record if none exists yet.
    ///
    /// `cursor` is the calling worker's next free arena index within its
    /// partition (stride `stride`); it only advances when a new record
    /// is actually committed.
    pub fn add_cell(&self, arena: &CellArena, p: Point, v: u8, cursor: &mut u32, stride: u32) {
        let h = self.index(p);
        let bucket = &self.buckets[h];
        let packed = p.pack();
        loop {
            let head = bucket.load(Ordering::Acquire);
            let mut walk = head;
            while walk != 0 {
                let slot = arena.get(walk);
                if slot.point().pack() == packed {
                    slot.fetch_add(v);
                    return;
                }
                walk = slot.next();
            }
            // Miss: stage a new record at our cursor slot, then try to
            // publish it as the bucket's new head.
            arena.write(*cursor, p, head, v);
            match bucket.compare_exchange(head, *cursor, Ordering::Release, Ordering::Relaxed) {
                Ok(_) => {
                    *cursor += stride;
                    return;
                }
                Err(_) => {
                    // Someone else linked a node first. The record we
                    // just staged is unpublished and transparently
                    // reused on the retry — the cursor has not moved.
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::arena::{partition_start, CellArena};

    #[test]
    fn order_clamped_to_range() {
        assert_eq!(SpatialHash::new(1).order(), MIN_ORDER);
        assert_eq!(SpatialHash::new(usize::MAX).order(), MAX_ORDER);
    }

    #[test]
    fn single_threaded_insert_and_accumulate() {
        let hash = SpatialHash::new(64);
        let arena = CellArena::with_capacity(16);
        let mut cursor = partition_start(0, 1);
        let p = Point::new(100, 200);

        hash.add_cell(&arena, p, 10, &mut cursor, 1);
        hash.add_cell(&arena, p, 1, &mut cursor, 1);
        hash.add_cell(&arena, p, 1, &mut cursor, 1);

        let h = hash.index(p);
        let head = hash.buckets[h].load(Ordering::Relaxed);
        assert_ne!(head, 0);
        assert_eq!(arena.get(head).value(), 12);
    }

    #[test]
    fn distinct_points_get_distinct_records() {
        let hash = SpatialHash::new(64);
        let arena = CellArena::with_capacity(16);
        let mut cursor = partition_start(0, 1);

        hash.add_cell(&arena, Point::new(1, 1), 10, &mut cursor, 1);
        hash.add_cell(&arena, Point::new(2, 2), 10, &mut cursor, 1);

        assert_eq!(cursor, partition_start(0, 1) + 2);
    }
}

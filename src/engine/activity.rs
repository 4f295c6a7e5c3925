//! Tile activity map: one flag per `staticSize`-aligned tile, indexed by
//! the spatial hash's mixing function so both structures share
//! dimensions and a tile's representative coordinate hashes to the same
//! slot every generation.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::engine::hash::SpatialHash;
use crate::engine::point::Point;

pub struct ActivityMap {
    active: Box<[AtomicBool]>,
    tile_size: u32,
}

impl ActivityMap {
    pub fn new(len: usize, tile_size: u32) -> Self {
        debug_assert!(tile_size.is_power_of_two());
        let active = (0..len.max(1))
            .map(|_| AtomicBool::new(false))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        ActivityMap { active, tile_size }
    }

    /// An activity map the same size as `new`, but with every tile
    /// flagged active. Used when the hash order changes generation to
    /// generation: the previous map can't be reinterpreted under the
    /// new index function, and under-approximating activity would break
    /// correctness, so the safe choice is to over-approximate instead —
    /// spurious collisions only waste a little arena capacity.
    pub fn new_all_active(len: usize, tile_size: u32) -> Self {
        let map = Self::new(len, tile_size);
        for a in map.active.iter() {
            a.store(true, Ordering::Relaxed);
        }
        map
    }

    #[inline(always)]
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn clear(&self) {
        for a in self.active.iter() {
            a.store(false, Ordering::Relaxed);
        }
    }

    #[inline(always)]
    fn mask(&self) -> u32 {
        self.tile_size - 1
    }

    /// Is the tile containing `p` active, per `hash`'s index function?
    #[inline]
    pub fn is_active(&self, hash: &SpatialHash, p: Point) -> bool {
        let idx = hash.index(p.tile_key(self.mask()));
        self.active[idx % self.active.len()].load(Ordering::Relaxed)
    }

    /// Flag `p`'s tile active, and — for boundary points — the 1, 2, or
    /// 3 neighbouring tiles the boundary touches (corner: 3, edge: 1,
    /// interior: 0). Collisions in the tile index are benign
    /// over-approximation.
    pub fn set_active(&self, hash: &SpatialHash, p: Point) {
        let m = self.mask();
        self.flag(hash, p.tile_key(m));

        let x_lo = p.x & m == 0;
        let x_hi = p.x & m == m;
        let y_lo = p.y & m == 0;
        let y_hi = p.y & m == m;

        if x_lo {
            self.flag(hash, Point::new(p.x.wrapping_sub(1), p.y).tile_key(m));
        } else if x_hi {
            self.flag(hash, Point::new(p.x.wrapping_add(1), p.y).tile_key(m));
        }
        if y_lo {
            self.flag(hash, Point::new(p.x, p.y.wrapping_sub(1)).tile_key(m));
        } else if y_hi {
            self.flag(hash, Point::new(p.x, p.y.wrapping_add(1)).tile_key(m));
        }
        // Corner: also flag the diagonal neighbour so the full 3-tile
        // neighbourhood around the corner is covered.
        if (x_lo || x_hi) && (y_lo || y_hi) {
            let dx = if x_lo {
                p.x.wrapping_sub(1)
            } else {
                p.x.wrapping_add(1)
            };
            let dy = if y_lo {
                p.y.wrapping_sub(1)
            } else {
                p.y.wrapping_add(1)
            };
            self.flag(hash, Point::new(dx, dy).tile_key(m));
        }
    }

    #[inline]
    fn flag(&self, hash: &SpatialHash, tile_key: Point) {
        let idx = hash.index(tile_key);
        self.active[idx % self.active.len()].store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_point_flags_only_its_own_tile() {
        let hash = SpatialHash::new(64);
        let map = ActivityMap::new(hash.len(), 4);
        map.set_active(&hash, Point::new(5, 5)); // interior of tile (4,4)-(7,7)
        assert!(map.is_active(&hash, Point::new(5, 5)));
        assert!(map.is_active(&hash, Point::new(6, 6)));
    }

    #[test]
    fn boundary_point_flags_neighbor_tile() {
        let hash = SpatialHash::new(64);
        let map = ActivityMap::new(hash.len(), 4);
        // x=3 is the east edge of tile (0,0)-(3,3); must also flag tile (4,*)
        map.set_active(&hash, Point::new(3, 5));
        assert!(map.is_active(&hash, Point::new(3, 5)));
        assert!(map.is_active(&hash, Point::new(4, 5)));
    }

    #[test]
    fn all_active_starts_everything_flagged() {
        let hash = SpatialHash::new(64);
        let map = ActivityMap::new_all_active(hash.len(), 4);
        assert!(map.is_active(&hash, Point::new(1000, 1000)));
    }
}

//! The two worker-thread phases: alive-expansion (E) scatters neighbour
//! contributions into the spatial hash; cell-resolution (F) scans the
//! arena in deterministic round-robin chunks and rebuilds the alive
//! sets and next-generation activity map.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::engine::alive::AliveSet;
use crate::engine::autotrack::{AutoTrack, Event};
use crate::engine::point::Point;
use crate::engine::EngineFrame;

/// Everything a worker needs to run one generation's two phases. Built
/// fresh (cheaply — all fields are references/ids) by the main thread
/// before releasing workers into phase E.
pub struct WorkerCtx<'a> {
    pub worker_id: u32,
    pub workers: u32,
    pub chunk_size: u32,
    pub sensitivity: u32,
    pub frame: &'a EngineFrame,
    pub alive: &'a Mutex<AliveSet>,
    pub pending: &'a Mutex<AliveSet>,
    /// This worker's own buffer of alive points to check against the
    /// view window — private for the whole of phase E so no worker ever
    /// contends the shared screen buffer's lock; the main thread drains
    /// all of them into the screen after the phase barrier.
    pub visible: &'a Mutex<Vec<Point>>,
    pub autotrack: &'a RwLock<AutoTrack>,
    pub births: &'a AtomicU64,
    pub deaths: &'a AtomicU64,
}

/// Phase E: walk this worker's alive set, scattering self (+10) and
/// neighbour (+1) contributions into the hash for every point whose
/// tile (or whose neighbour's tile) is active. Static cells (whole tile
/// inactive) are retained directly into `pending` without an arena
/// entry; their neighbours are still visited for contributions crossing
/// into an active tile.
pub fn process_alive(ctx: &WorkerCtx) {
    let alive = ctx.alive.lock();
    let mut pending = ctx.pending.lock();
    pending.clear();
    pending.reserve(alive.len());

    let stride = ctx.workers;
    let mut cursor = crate::engine::arena::partition_start(ctx.worker_id, ctx.workers);
    let mut visible = ctx.visible.lock();
    visible.clear();
    visible.reserve(alive.len());

    for &p in alive.iter() {
        let self_active = ctx.frame.grid.is_active(&ctx.frame.hash, p);
        if self_active {
            ctx.frame
                .hash
                .add_cell(&ctx.frame.arena, p, 10, &mut cursor, stride);
        } else {
            pending.push(p);
        }
        for nb in p.neighbors() {
            if ctx.frame.grid.is_active(&ctx.frame.hash, nb) {
                ctx.frame
                    .hash
                    .add_cell(&ctx.frame.arena, nb, 1, &mut cursor, stride);
            }
        }
        visible.push(p);
    }
}

/// Phase F: scan this worker's round-robin share of arena chunks,
/// classify each entry's summed value, and fold survivors/births into
/// `pending` (seeded in phase E with the retained static cells).
pub fn process_cells(ctx: &WorkerCtx) {
    let cells_len = ctx.frame.arena.capacity();
    let chunk_size = ctx.chunk_size.max(1) as usize;
    let num_chunks = (cells_len + chunk_size - 1) / chunk_size;

    let mut pending = ctx.pending.lock();
    let mut chunk = ctx.worker_id as usize;
    while chunk < num_chunks {
        let start = (chunk * chunk_size).max(1);
        let end = ((chunk + 1) * chunk_size).min(cells_len);
        for i in start..end {
            let slot = ctx.frame.arena.get(i as u32);
            let v = slot.value();
            match v {
                0 => {}
                3 => {
                    let p = slot.point();
                    pending.push(p);
                    ctx.frame.newgrid.set_active(&ctx.frame.hash, p);
                    ctx.autotrack
                        .read()
                        .record(Event::Birth, p, ctx.sensitivity);
                    ctx.births.fetch_add(1, Ordering::Relaxed);
                }
                12 | 13 => {
                    pending.push(slot.point());
                }
                10 | 11 | 14..=18 => {
                    let p = slot.point();
                    ctx.frame.newgrid.set_active(&ctx.frame.hash, p);
                    ctx.autotrack
                        .read()
                        .record(Event::Death, p, ctx.sensitivity);
                    ctx.deaths.fetch_add(1, Ordering::Relaxed);
                }
                _ => {}
            }
        }
        chunk += ctx.workers as usize;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::activity::ActivityMap;
    use crate::engine::arena::CellArena;
    use crate::engine::hash::SpatialHash;

    fn frame(capacity: usize) -> EngineFrame {
        let hash = SpatialHash::new(64);
        let arena = CellArena::with_capacity(capacity);
        let grid = ActivityMap::new_all_active(hash.len(), 4);
        let newgrid = ActivityMap::new(hash.len(), 4);
        EngineFrame {
            hash,
            arena,
            grid,
            newgrid,
        }
    }

    #[test]
    fn single_worker_blinker_one_generation() {
        let frame = frame(64);
        let alive = Mutex::new(AliveSet::from_iter([
            Point::new(10, 10),
            Point::new(11, 10),
            Point::new(12, 10),
        ]));
        let pending = Mutex::new(AliveSet::new());
        let visible = Mutex::new(Vec::new());
        let autotrack = RwLock::new(AutoTrack::new(Point::new(10, 10)));
        let births = AtomicU64::new(0);
        let deaths = AtomicU64::new(0);

        let ctx = WorkerCtx {
            worker_id: 0,
            workers: 1,
            chunk_size: 1000,
            sensitivity: 1,
            frame: &frame,
            alive: &alive,
            pending: &pending,
            visible: &visible,
            autotrack: &autotrack,
            births: &births,
            deaths: &deaths,
        };

        process_alive(&ctx);
        assert_eq!(visible.lock().len(), 3);
        process_cells(&ctx);

        let result = pending.lock();
        let mut points: Vec<Point> = result.iter().copied().collect();
        points.sort();
        let mut expected = vec![Point::new(11, 9), Point::new(11, 10), Point::new(11, 11)];
        expected.sort();
        assert_eq!(points, expected);
        assert_eq!(births.load(Ordering::Relaxed), 2);
        assert_eq!(deaths.load(Ordering::Relaxed), 2);
    }
}

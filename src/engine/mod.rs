//! Bundles every generation-scoped resource into one `Engine` value and
//! drives the main-thread state machine:
//!
//! ```text
//! INIT -> ROTATE_HASH -> SIZE_ARENA -> RELEASE_ALIVE -> POLL_INPUT ->
//!   AWAIT_ALIVE -> PREP_NEWGRID -> RELEASE_CELLS -> UPDATE_STATS/DISPLAY ->
//!   AWAIT_CELLS -> SLEEP(delay) -> ADJUST_TRACK -> (going?) -> ROTATE_HASH
//! ```
//!
//! `POLL_INPUT` and `SLEEP` are owned by the caller (the CLI binary,
//! which has the terminal and the clock); everything else lives here.

pub mod activity;
pub mod alive;
pub mod arena;
pub mod autotrack;
pub mod display;
pub mod hash;
pub mod phases;
pub mod point;
pub mod pool;

#[cfg(test)]
mod scenarios;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::config::Config;
use activity::ActivityMap;
use alive::AliveSet;
use arena::CellArena;
use autotrack::AutoTrack;
use display::{DisplayHandoff, FramePusher, ScreenBuffer};
use hash::SpatialHash;
use phases::{process_alive, process_cells, WorkerCtx};
use point::Point;
use pool::{Gate, Phase};

/// Translated, engine-native intent from whatever raw input source the
/// caller drives (term module, test harness, ...). Keeping this in the
/// engine, rather than importing a terminal crate's event type, is what
/// lets the core stay free of any rendering dependency.
#[derive(Clone, Copy, Debug)]
pub enum ControlEvent {
    NudgeView { dx: i32, dy: i32 },
    ToggleAutotrack,
    AdjustSensitivity { up: bool },
    AdjustRate { double: bool },
    AdjustDampening { double: bool },
    AdjustDisplayStride { double: bool },
    SwapViewState,
    Quit,
}

/// The live-adjustable half of view state: where the window is centred,
/// how tight autotracking's active neighbourhood is, and how strongly
/// window moves are damped. `w` swaps `active` and `alternate` wholesale.
#[derive(Clone, Copy)]
struct ViewSlot {
    center: Point,
    sensitivity: u32,
    dampening: u32,
}

#[derive(Clone, Copy)]
struct ViewState {
    active: ViewSlot,
    alternate: ViewSlot,
    autotrack_enabled: bool,
}

/// The resizable hash/arena/activity bundle. Swapped in place each
/// generation as population shifts capacity needs; the main thread is
/// the sole writer (between phases, while workers are parked), so the
/// `RwLock` is never contended in practice — it exists so worker reads
/// during a phase are checked by the type system rather than by
/// convention alone.
pub struct EngineFrame {
    pub(crate) hash: SpatialHash,
    pub(crate) arena: CellArena,
    pub(crate) grid: ActivityMap,
    pub(crate) newgrid: ActivityMap,
}

/// Serialisable generation snapshot; see [`Engine::snapshot`].
#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct EngineSnapshot {
    pub generation: u64,
    pub alive: Vec<Vec<Point>>,
}

pub struct Engine {
    config: Config,
    generation: AtomicU64,
    frame: RwLock<EngineFrame>,
    alive: Vec<Mutex<AliveSet>>,
    pending: Vec<Mutex<AliveSet>>,
    visible: Vec<Mutex<Vec<Point>>>,
    screen: Mutex<ScreenBuffer>,
    gate: Arc<Gate>,
    display: Arc<DisplayHandoff>,
    autotrack: RwLock<AutoTrack>,
    births: AtomicU64,
    deaths: AtomicU64,
    view: Mutex<ViewState>,
    rate: std::sync::atomic::AtomicU32,
    display_stride_log2: std::sync::atomic::AtomicU32,
    last_recenter: AtomicU64,
    going: std::sync::atomic::AtomicBool,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    non_static: AtomicU64,
}

impl Engine {
    /// Build an engine from a validated config, initial per-worker alive
    /// sets (already round-robin balanced by the pattern decoder), and
    /// the terminal dimensions for the screen buffer.
    pub fn new(
        config: Config,
        initial_alive: Vec<AliveSet>,
        width: u16,
        height: u16,
    ) -> Result<Arc<Self>, crate::error::EngineError> {
        Self::with_generation(config, initial_alive, 0, width, height)
    }

    /// Rebuild an engine from a [`EngineSnapshot`], picking up at its
    /// recorded generation count so later generations match a run that
    /// never stopped.
    pub fn from_snapshot(
        config: Config,
        snapshot: EngineSnapshot,
        width: u16,
        height: u16,
    ) -> Result<Arc<Self>, crate::error::EngineError> {
        let alive = snapshot.alive.into_iter().map(AliveSet::from_iter).collect();
        Self::with_generation(config, alive, snapshot.generation, width, height)
    }

    fn with_generation(
        config: Config,
        initial_alive: Vec<AliveSet>,
        generation: u64,
        width: u16,
        height: u16,
    ) -> Result<Arc<Self>, crate::error::EngineError> {
        config.validate()?;
        assert_eq!(initial_alive.len() as u32, config.threads);

        let pop: usize = initial_alive.iter().map(|a| a.len()).sum();
        let hash = SpatialHash::new(pop.max(1));
        let arena = CellArena::with_capacity(arena::required_capacity(pop, config.threads));
        // `newgrid` holds the all-active map so the first `rotate_hash`
        // swap (newgrid becomes grid) hands phase E an all-active read
        // map for generation 1, exactly as every later rotation does.
        let grid = ActivityMap::new(hash.len(), config.static_size);
        let newgrid = ActivityMap::new_all_active(hash.len(), config.static_size);

        let n = config.threads as usize;
        let alive = initial_alive.into_iter().map(Mutex::new).collect();
        let pending = (0..n).map(|_| Mutex::new(AliveSet::new())).collect();
        let visible = (0..n).map(|_| Mutex::new(Vec::new())).collect();

        let origin = config.origin_point();
        let engine = Arc::new(Engine {
            generation: AtomicU64::new(generation),
            frame: RwLock::new(EngineFrame {
                hash,
                arena,
                grid,
                newgrid,
            }),
            alive,
            pending,
            visible,
            screen: Mutex::new(ScreenBuffer::new(width, height)),
            gate: Arc::new(Gate::new(config.threads)),
            display: Arc::new(DisplayHandoff::new()),
            autotrack: RwLock::new(AutoTrack::new(origin)),
            births: AtomicU64::new(0),
            deaths: AtomicU64::new(0),
            view: Mutex::new(ViewState {
                active: ViewSlot {
                    center: origin,
                    sensitivity: config.sensitivity,
                    dampening: config.dampening,
                },
                alternate: ViewSlot {
                    center: origin,
                    sensitivity: config.sensitivity,
                    dampening: config.dampening,
                },
                autotrack_enabled: true,
            }),
            rate: std::sync::atomic::AtomicU32::new(config.rate),
            display_stride_log2: std::sync::atomic::AtomicU32::new(config.display_stride_log2),
            last_recenter: AtomicU64::new(0),
            going: std::sync::atomic::AtomicBool::new(true),
            workers: Mutex::new(Vec::new()),
            non_static: AtomicU64::new(0),
            config,
        });
        engine.spawn_workers();
        Ok(engine)
    }

    fn spawn_workers(self: &Arc<Self>) {
        for id in 0..self.config.threads {
            let engine = Arc::clone(self);
            let handle = thread::Builder::new()
                .name(format!("lifeswarm-worker-{id}"))
                .spawn(move || engine.worker_loop(id))
                .expect("failed to spawn worker thread");
            self.workers.lock().push(handle);
        }
    }

    fn worker_loop(&self, id: u32) {
        let mut last_epoch = 0u64;
        loop {
            match self.gate.wait_for_phase(last_epoch) {
                None => return,
                Some((epoch, phase)) => {
                    last_epoch = epoch;
                    let frame = self.frame.read();
                    let view = *self.view.lock();
                    let ctx = WorkerCtx {
                        worker_id: id,
                        workers: self.config.threads,
                        chunk_size: self.config.chunk_size,
                        sensitivity: view.active.sensitivity,
                        frame: &frame,
                        alive: &self.alive[id as usize],
                        pending: &self.pending[id as usize],
                        visible: &self.visible[id as usize],
                        autotrack: &self.autotrack,
                        births: &self.births,
                        deaths: &self.deaths,
                    };
                    match phase {
                        Phase::AliveExpansion => process_alive(&ctx),
                        Phase::CellResolution => process_cells(&ctx),
                    }
                    self.gate.finish_phase();
                }
            }
        }
    }

    #[inline(always)]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    pub fn population(&self) -> usize {
        self.alive.iter().map(|a| a.lock().len()).sum()
    }

    /// The union of all workers' alive sets, for snapshotting and test
    /// assertions. Per-worker ordering is not canonical — only the
    /// resulting set is.
    pub fn alive_points(&self) -> Vec<Point> {
        self.alive
            .iter()
            .flat_map(|a| a.lock().iter().copied().collect::<Vec<_>>())
            .collect()
    }

    /// A serialisable snapshot: one worker's alive set per partition
    /// plus the generation counter. Feeding this back through
    /// [`Engine::from_snapshot`] reproduces the same future generation
    /// counts and point sets (modulo the racy autotracking/birth/death
    /// counters, which are advisory display state, not simulation state).
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            generation: self.generation(),
            alive: self.alive.iter().map(|a| a.lock().clone_points()).collect(),
        }
    }

    pub fn births(&self) -> u64 {
        self.births.load(Ordering::Relaxed)
    }

    pub fn deaths(&self) -> u64 {
        self.deaths.load(Ordering::Relaxed)
    }

    pub fn view_center(&self) -> Point {
        self.view.lock().active.center
    }

    /// Current generation rate cap, gen/s — live-adjustable via
    /// [`ControlEvent::AdjustRate`].
    pub fn rate(&self) -> u32 {
        self.rate.load(Ordering::Relaxed)
    }

    pub fn hash_order(&self) -> u32 {
        self.frame.read().hash.order()
    }

    pub fn arena_capacity(&self) -> usize {
        self.frame.read().arena.capacity()
    }

    pub fn handle_control(&self, event: ControlEvent) {
        match event {
            ControlEvent::NudgeView { dx, dy } => {
                let mut view = self.view.lock();
                view.autotrack_enabled = false;
                view.active.center = Point::new(
                    view.active.center.x.wrapping_add(dx as u32),
                    view.active.center.y.wrapping_add(dy as u32),
                );
            }
            ControlEvent::ToggleAutotrack => {
                let mut view = self.view.lock();
                view.autotrack_enabled = !view.autotrack_enabled;
            }
            ControlEvent::AdjustSensitivity { up } => {
                let mut view = self.view.lock();
                let s = view.active.sensitivity;
                view.active.sensitivity = if up {
                    if s >= 11 { 1 } else { s + 1 }
                } else if s <= 1 {
                    11
                } else {
                    s - 1
                };
            }
            ControlEvent::AdjustRate { double } => {
                let r = self.rate.load(Ordering::Relaxed);
                let next = if double { r.saturating_mul(2).min(16384) } else { (r / 2).max(1) };
                self.rate.store(next, Ordering::Relaxed);
            }
            ControlEvent::AdjustDampening { double } => {
                let mut view = self.view.lock();
                let d = view.active.dampening;
                view.active.dampening = if double { (d * 2).min(64) } else { (d / 2).max(1) };
            }
            ControlEvent::AdjustDisplayStride { double } => {
                let s = self.display_stride_log2.load(Ordering::Relaxed);
                let next = if double { (s + 1).min(30) } else { s.saturating_sub(1) };
                self.display_stride_log2.store(next, Ordering::Relaxed);
            }
            ControlEvent::SwapViewState => {
                let mut view = self.view.lock();
                std::mem::swap(&mut view.active, &mut view.alternate);
            }
            ControlEvent::Quit => {
                self.going.store(false, Ordering::Relaxed);
            }
        }
    }

    pub fn is_going(&self) -> bool {
        self.going.load(Ordering::Relaxed)
    }

    pub fn shut_down(&self) {
        self.going.store(false, Ordering::Relaxed);
        self.gate.shut_down();
        self.display.shut_down();
    }

    /// Block until every worker thread has observed shutdown and
    /// exited. Call after `shut_down`, from a thread other than a
    /// worker (the main thread, typically).
    pub fn join_workers(&self) {
        for handle in self.workers.lock().drain(..) {
            let _ = handle.join();
        }
    }

    pub fn display_handoff(&self) -> Arc<DisplayHandoff> {
        Arc::clone(&self.display)
    }

    pub fn run_renderer(&self, pusher: &mut dyn FramePusher) {
        self.display.run(pusher);
    }

    /// Run one full generation: ROTATE_HASH through ADJUST_TRACK. Reads
    /// the live rate cap (`rate()`), which `AdjustRate` may have changed
    /// since the previous call.
    pub fn step(&self) {
        let next_generation = self.generation.load(Ordering::Relaxed) + 1;
        self.rotate_hash();
        self.size_arena();

        self.gate.run_phase(Phase::AliveExpansion);
        self.merge_visible_into_screen();
        self.prep_newgrid();
        self.gate.run_phase(Phase::CellResolution);

        self.swap_alive_pending();
        self.update_status_line();
        self.adjust_track();

        self.generation.store(next_generation, Ordering::Relaxed);
    }

    /// ROTATE_HASH: `grid` becomes last generation's `newgrid`. Reuse the
    /// hash order unchanged when possible; if population has shifted
    /// enough to need a different order, the carried-over activity map
    /// can't be reindexed, so fall back to all-active (a safe
    /// over-approximation — every tile looks active until the next
    /// generation's real flags are computed).
    fn rotate_hash(&self) {
        let pop = self.population();
        let desired_order = hash::order_for(pop.max(1));
        let mut frame = self.frame.write();
        if desired_order == frame.hash.order() {
            // `newgrid`, filled by phase F last generation, becomes the
            // read-only `grid` for the phase E that's about to run.
            // Its old contents are stale and get cleared by
            // `prep_newgrid` before phase F writes into it again.
            std::mem::swap(&mut frame.grid, &mut frame.newgrid);
        } else {
            debug!(from = frame.hash.order(), to = desired_order, "resizing spatial hash");
            let new_hash = SpatialHash::with_order(desired_order);
            frame.grid = ActivityMap::new_all_active(new_hash.len(), self.config.static_size);
            frame.newgrid = ActivityMap::new(new_hash.len(), self.config.static_size);
            frame.hash = new_hash;
        }
    }

    /// SIZE_ARENA: resize the arena to cover this generation's worst
    /// case, and zero the hash buckets for a fresh chain build.
    fn size_arena(&self) {
        let mut live_outside_static = 0usize;
        let frame = self.frame.read();
        for set in &self.alive {
            for &p in set.lock().iter() {
                if frame.grid.is_active(&frame.hash, p) {
                    live_outside_static += 1;
                }
            }
        }
        drop(frame);
        self.non_static
            .store(live_outside_static as u64, Ordering::Relaxed);
        let needed = arena::required_capacity(live_outside_static, self.config.threads);
        let mut frame = self.frame.write();
        if frame.arena.capacity() < needed + 1 {
            frame.arena = CellArena::with_capacity(needed);
        } else {
            frame.arena.clear();
        }
        frame.hash.clear();
    }

    /// Fold phase E's per-worker visible-point buffers into the shared
    /// screen buffer. Workers never touch `screen` directly — each one
    /// appends to its own private `Vec` during phase E with no lock
    /// contention, and the single merge here pays the shared lock's cost
    /// exactly once per generation rather than once per alive cell.
    fn merge_visible_into_screen(&self) {
        let center = self.view.lock().active.center;
        let mut screen = self.screen.lock();
        for bucket in &self.visible {
            let mut points = bucket.lock();
            for &p in points.iter() {
                screen.set_if_visible(p, center);
            }
            points.clear();
        }
    }

    /// PREP_NEWGRID: between phases E and F, `newgrid` starts this
    /// generation's accumulation clean.
    fn prep_newgrid(&self) {
        self.frame.read().newgrid.clear();
    }

    fn swap_alive_pending(&self) {
        for (alive, pending) in self.alive.iter().zip(self.pending.iter()) {
            let mut a = alive.lock();
            let mut p = pending.lock();
            std::mem::swap(&mut *a, &mut *p);
        }
    }

    fn update_status_line(&self) {
        let pop = self.population();
        let order = self.hash_order();
        let capacity = self.arena_capacity();
        let stride_log2 = self.display_stride_log2.load(Ordering::Relaxed);
        let rate = self.rate();
        let rate_capped = if rate >= 16384 { '>' } else { ' ' };
        let view = self.view.lock();
        let sensitivity = view.active.sensitivity;
        let threshold = 1u32 << (23 - sensitivity.clamp(1, 11));
        let line = format!(
            "generation {gen}({stride}) population {pop}({non_static}) births {b} deaths {d} rate{rate_capped}{rate} heap({order}) {cap} window({srate}) {x},{y} \u{00b1}{threshold} {rate10k}",
            // ± kept as an escape above rather than a literal glyph so the
            // source stays plain ASCII end to end.
            gen = self.generation(),
            stride = 1u32 << stride_log2,
            pop = pop,
            non_static = self.non_static.load(Ordering::Relaxed),
            b = self.births.load(Ordering::Relaxed),
            d = self.deaths.load(Ordering::Relaxed),
            order = order,
            cap = capacity,
            srate = view.active.dampening,
            x = view.active.center.x.wrapping_sub(self.config.origin) as i32,
            y = view.active.center.y.wrapping_sub(self.config.origin) as i32,
            rate10k = rate as u64 * 10_000,
        );
        drop(view);
        let mut screen = self.screen.lock();
        screen.status = line;

        if self.generation() % (1u64 << stride_log2) == 0 {
            let snapshot = Arc::new(screen.clone());
            if !self.display.try_push(snapshot) {
                tracing::debug!(generation = self.generation(), "renderer busy, frame skipped");
            }
            screen.clear();
        }
    }

    /// Screen half-extents the tracked centre is measured against when
    /// deciding whether the view window needs to recentre.
    fn half_window(&self) -> (i64, i64) {
        let screen = self.screen.lock();
        (screen.width() as i64 / 2, screen.height() as i64 / 2)
    }

    /// ADJUST_TRACK: fold this generation's birth/death events into the
    /// tracked centre, then recentre the view window onto it if the
    /// tracked centre has strayed past 2/3 of the half-window and enough
    /// generations have passed since the last recentre. `k` scales the
    /// cadence from 1 (slow rate) to 10 (fast rate) so a fast-running
    /// simulation doesn't recentre on every single generation.
    fn adjust_track(&self) {
        let rate = self.rate();
        let mut track = self.autotrack.write();
        track.step(rate);
        let tracked = track.center();
        drop(track);

        let mut view = self.view.lock();
        if view.autotrack_enabled {
            let (half_w, half_h) = self.half_window();
            let dx = (tracked.x.wrapping_sub(view.active.center.x) as i32).unsigned_abs() as i64;
            let dy = (tracked.y.wrapping_sub(view.active.center.y) as i32).unsigned_abs() as i64;
            let strayed = dx * 3 >= half_w * 2 || dy * 3 >= half_h * 2;

            let k = 1 + (rate.min(16384) as u64 * 9) / 16384;
            let cadence = ((view.active.dampening as u64 * rate as u64) / k).max(1);
            let gen = self.generation();
            let last = self.last_recenter.load(Ordering::Relaxed);

            if strayed && gen.saturating_sub(last) >= cadence {
                view.active.center = tracked;
                self.last_recenter.store(gen, Ordering::Relaxed);
            }
        }
        drop(view);
        info!(generation = self.generation(), population = self.population(), "generation complete");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Only signal, never join: the thread dropping the last `Arc`
        // can itself be one of the workers (it drops its own clone as
        // its final act after `wait_for_phase` returns `None`), and
        // joining a handle from inside that same thread deadlocks.
        // Callers that need a clean shutdown call `join_workers`
        // explicitly from an outside thread after `shut_down`.
        self.shut_down();
    }
}

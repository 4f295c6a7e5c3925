//! Integration tests against a handful of well-known Game of Life
//! patterns. Cheap ones run by default; multi-hundred-generation
//! scenarios are marked `#[ignore]` so `cargo test` stays fast
//! (`cargo test -- --ignored` for the full sweep).

use super::*;
use crate::config::Config;

fn single_worker_config() -> Config {
    Config {
        threads: 1,
        ..Config::default()
    }
}

fn engine_with(config: Config, points: &[Point]) -> Arc<Engine> {
    let alive = vec![AliveSet::from_iter(points.iter().copied())];
    Engine::new(config, alive, 64, 64).unwrap()
}

fn offset(o: u32, dx: i32, dy: i32) -> Point {
    Point::new(o.wrapping_add(dx as u32), o.wrapping_add(dy as u32))
}

fn sorted(mut pts: Vec<Point>) -> Vec<Point> {
    pts.sort();
    pts
}

/// A three-cell blinker (period 2) rotates 90 degrees and back.
#[test]
fn blinker_rotates_and_returns() {
    let cfg = single_worker_config();
    let o = cfg.origin;
    let engine = engine_with(
        cfg,
        &[offset(o, 0, 0), offset(o, 1, 0), offset(o, 2, 0)],
    );

    engine.step();
    assert_eq!(
        sorted(engine.alive_points()),
        sorted(vec![offset(o, 1, -1), offset(o, 1, 0), offset(o, 1, 1)])
    );
    assert_eq!(engine.births(), 2);
    assert_eq!(engine.deaths(), 2);

    engine.step();
    assert_eq!(
        sorted(engine.alive_points()),
        sorted(vec![offset(o, 0, 0), offset(o, 1, 0), offset(o, 2, 0)])
    );
    engine.shut_down();
}

/// A 2x2 block (still life) never births or dies, any generation.
#[test]
fn block_is_a_fixed_point() {
    let cfg = single_worker_config();
    let o = cfg.origin;
    let start = vec![
        offset(o, 0, 0),
        offset(o, 1, 0),
        offset(o, 0, 1),
        offset(o, 1, 1),
    ];
    let engine = engine_with(cfg, &start);

    for _ in 0..3 {
        engine.step();
        assert_eq!(sorted(engine.alive_points()), sorted(start.clone()));
        assert_eq!(engine.births(), 0);
        assert_eq!(engine.deaths(), 0);
    }
    engine.shut_down();
}

/// A horizontal blinker's boundary crossing flags its own tile plus
/// the tiles its neighbours reached into.
#[test]
fn blinker_flags_expected_tiles() {
    let cfg = Config {
        threads: 1,
        static_size: 4,
        ..Config::default()
    };
    let o = cfg.origin;
    let engine = engine_with(
        cfg,
        &[offset(o, 0, 0), offset(o, 1, 0), offset(o, 2, 0)],
    );
    engine.step();

    let frame = engine.frame.read();
    for dy in [0i32, -1, 1] {
        let p = offset(o, 0, dy);
        assert!(
            frame.newgrid.is_active(&frame.hash, p),
            "expected tile containing {p:?} to be flagged active"
        );
    }
    drop(frame);
    engine.shut_down();
}

/// The R-pentomino stabilises at generation 1103 with population 116
/// (12 still-life components, 6 gliders, 8 blinkers — a standard
/// reference value for this pattern).
#[test]
#[ignore]
fn r_pentomino_stabilises_at_gen_1103() {
    let cfg = single_worker_config();
    let o = cfg.origin;
    let engine = engine_with(
        cfg,
        &[
            offset(o, 1, 0),
            offset(o, 2, 0),
            offset(o, 0, 1),
            offset(o, 1, 1),
            offset(o, 1, 2),
        ],
    );
    for _ in 0..1103 {
        engine.step();
    }
    assert_eq!(engine.population(), 116);
    engine.shut_down();
}

/// The same glider run for 1,000 generations produces the same final
/// point set whether N = 1 or N = 8.
#[test]
#[ignore]
fn parallel_run_is_deterministic_across_thread_counts() {
    let glider = |o: u32| {
        vec![
            offset(o, 1, 0),
            offset(o, 2, 1),
            offset(o, 0, 2),
            offset(o, 1, 2),
            offset(o, 2, 2),
        ]
    };

    let run = |threads: u32| {
        let cfg = Config {
            threads,
            ..Config::default()
        };
        let o = cfg.origin;
        let points = glider(o);
        let per_worker = points.len() / threads as usize + 1;
        let alive: Vec<AliveSet> = points
            .chunks(per_worker.max(1))
            .map(|c| AliveSet::from_iter(c.iter().copied()))
            .chain(std::iter::repeat_with(AliveSet::new))
            .take(threads as usize)
            .collect();
        let engine = Engine::new(cfg, alive, 64, 64).unwrap();
        for _ in 0..1000 {
            engine.step();
        }
        let result = sorted(engine.alive_points());
        engine.shut_down();
        result
    };

    assert_eq!(run(1), run(8));
}

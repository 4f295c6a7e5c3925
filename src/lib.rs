//! lifeswarm — a parallel sparse Game of Life engine.
//!
//! The core (`engine`) holds no rendering or input dependency: it is
//! driven by a `Config`, an initial set of per-worker alive points, and
//! a terminal size, and exposes generation-stepping plus read-only
//! status accessors. `pattern` and `term` are concrete external
//! collaborators (RLE decoding, terminal rendering/input) the `lifeswarm`
//! binary wires together in `main.rs`.

pub mod config;
pub mod engine;
pub mod error;
pub mod pattern;
pub mod term;

/// Install the global tracing subscriber. `level` overrides the
/// `RUST_LOG`-style env filter (defaults to `info`); safe to call more
/// than once — later calls are no-ops.
pub fn setup_logging(level: Option<&str>) {
    let filter = level.unwrap_or("info");
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter.to_string())
        .try_init();
}

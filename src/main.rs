use std::fs;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use crossterm::terminal;

use lifeswarm::config::Config;
use lifeswarm::engine::{ControlEvent, Engine};
use lifeswarm::pattern;
use lifeswarm::term::{poll_control_event, TerminalPusher};

/// Parallel sparse Game of Life engine.
#[derive(Parser, Debug)]
#[command(name = "lifeswarm", version, about)]
struct Cli {
    /// Worker thread count.
    #[arg(long, default_value_t = 4)]
    threads: u32,

    /// Tile edge length; must be a power of two.
    #[arg(long, default_value_t = 4)]
    static_size: u32,

    /// Round-robin block size in the cell-resolution phase.
    #[arg(long, default_value_t = 1000)]
    chunk_size: u32,

    /// Initial arena/alive capacity, in multiples of chunk-size.
    #[arg(long, default_value_t = 4)]
    num_chunks: u32,

    /// World anchor the pattern's (0,0) cell maps to.
    #[arg(long, default_value_t = 1 << 30)]
    origin: u32,

    /// Path to an RLE pattern file.
    #[arg(long)]
    pattern_file: String,

    /// Autotracking sensitivity, [1, 11].
    #[arg(long, default_value_t = 6)]
    sensitivity: u32,

    /// Generation rate cap, [1, 16384] gen/s.
    #[arg(long, default_value_t = 60)]
    rate: u32,

    /// Window-move dampening, [1, 64].
    #[arg(long, default_value_t = 8)]
    dampening: u32,

    /// Render every 2^s generations.
    #[arg(long, default_value_t = 0)]
    display_stride_log2: u32,
}

fn main() -> anyhow::Result<()> {
    lifeswarm::setup_logging(None);

    let cli = Cli::parse();
    let config = Config {
        threads: cli.threads,
        static_size: cli.static_size,
        chunk_size: cli.chunk_size,
        num_chunks: cli.num_chunks,
        origin: cli.origin,
        pattern: fs::read_to_string(&cli.pattern_file)?,
        sensitivity: cli.sensitivity.clamp(1, 11),
        rate: cli.rate.clamp(1, 16384),
        dampening: cli.dampening.clamp(1, 64),
        display_stride_log2: cli.display_stride_log2,
    };
    config.validate()?;

    let (width, height) = terminal::size().unwrap_or((80, 24));
    let initial_alive = pattern::decode(&config.pattern, config.origin_point(), config.threads)?;
    let engine = Engine::new(config, initial_alive, width, height)?;

    let renderer_engine = Arc::clone(&engine);
    let renderer = thread::Builder::new()
        .name("lifeswarm-renderer".into())
        .spawn(move || {
            let mut pusher = TerminalPusher::new(io::stdout());
            renderer_engine.run_renderer(&mut pusher);
        })?;

    terminal::enable_raw_mode()?;
    let result = run_loop(&engine);
    let _ = terminal::disable_raw_mode();

    engine.shut_down();
    engine.join_workers();
    let _ = renderer.join();
    result
}

fn run_loop(engine: &Arc<Engine>) -> anyhow::Result<()> {
    while engine.is_going() {
        if let Some(event) = poll_control_event(Duration::from_millis(1), 8)? {
            if matches!(event, ControlEvent::Quit) {
                engine.handle_control(event);
                break;
            }
            engine.handle_control(event);
        }

        engine.step();
        let frame_budget = Duration::from_secs_f64(1.0 / engine.rate().max(1) as f64);
        thread::sleep(frame_budget);
    }
    Ok(())
}

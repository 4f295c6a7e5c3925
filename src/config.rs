//! Runtime configuration: a plain value the library takes, constructible
//! in tests without going through the CLI at all. `threads`, `rate`,
//! `sensitivity`, and `dampening` only seed the engine's live-adjustable
//! state at construction — see [`crate::engine::ControlEvent`] for how
//! those are changed afterward.

use crate::error::EngineError;

#[derive(Clone, Debug)]
pub struct Config {
    /// Worker thread count `N`.
    pub threads: u32,
    /// Tile edge length; must be a power of two (4 is the documented optimum).
    pub static_size: u32,
    /// Round-robin block size in phase F.
    pub chunk_size: u32,
    /// Initial arena/alive capacity, expressed in multiples of `chunk_size`.
    pub num_chunks: u32,
    /// World anchor the pattern's (0,0) cell maps to.
    pub origin: u32,
    /// Raw RLE pattern text.
    pub pattern: String,

    /// Autotracking sensitivity `tg`, `[1, 11]`.
    pub sensitivity: u32,
    /// Generation rate cap, `[1, 16384]` gen/s.
    pub rate: u32,
    /// Window-move dampening `sRate`, `[1, 64]`.
    pub dampening: u32,
    /// Display stride exponent `s`: render every `2^s` generations.
    pub display_stride_log2: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            threads: 4,
            static_size: 4,
            chunk_size: 1000,
            num_chunks: 4,
            origin: 1 << 30,
            pattern: String::new(),
            sensitivity: 6,
            rate: 60,
            dampening: 8,
            display_stride_log2: 0,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.threads == 0 {
            return Err(EngineError::ZeroThreads);
        }
        if !self.static_size.is_power_of_two() {
            return Err(EngineError::InvalidStaticSize(self.static_size));
        }
        Ok(())
    }

    #[inline(always)]
    pub fn origin_point(&self) -> crate::engine::point::Point {
        crate::engine::point::Point::new(self.origin, self.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_threads_rejected() {
        let mut cfg = Config::default();
        cfg.threads = 0;
        assert!(matches!(cfg.validate(), Err(EngineError::ZeroThreads)));
    }

    #[test]
    fn non_power_of_two_static_size_rejected() {
        let mut cfg = Config::default();
        cfg.static_size = 5;
        assert!(matches!(
            cfg.validate(),
            Err(EngineError::InvalidStaticSize(5))
        ));
    }
}

//! RLE pattern decoder: `b` = dead, `o` = alive, a leading digit run
//! repeats the next tag, `$` ends a row, `!` ends the pattern. Row 0 /
//! column 0 anchors at `origin`.
//! Emitted points are distributed round-robin across the engine's `N`
//! alive sets, switching worker every 16 live cells, so the very first
//! generation starts load-balanced.

use crate::engine::alive::AliveSet;
use crate::engine::point::Point;
use crate::error::EngineError;

const SWITCH_EVERY: u32 = 16;

/// Decode an RLE pattern into `workers` round-robin-balanced alive sets.
pub fn decode(text: &str, origin: Point, workers: u32) -> Result<Vec<AliveSet>, EngineError> {
    assert!(workers > 0);
    let mut sets: Vec<AliveSet> = (0..workers).map(|_| AliveSet::new()).collect();
    let mut target = 0usize;
    let mut since_switch = 0u32;

    let mut row: i64 = 0;
    let mut col: i64 = 0;
    let mut run: u32 = 0;

    for (offset, ch) in body(text) {
        match ch {
            '0'..='9' => {
                run = run
                    .checked_mul(10)
                    .and_then(|r| r.checked_add(ch as u32 - '0' as u32))
                    .ok_or_else(|| decode_err(offset, "run-length overflow"))?;
            }
            'b' => {
                col += take_run(&mut run) as i64;
            }
            'o' => {
                let n = take_run(&mut run);
                for _ in 0..n {
                    let x = origin.x.wrapping_add(col as i32 as u32);
                    let y = origin.y.wrapping_add(row as i32 as u32);
                    sets[target].push(Point::new(x, y));
                    since_switch += 1;
                    if since_switch >= SWITCH_EVERY {
                        since_switch = 0;
                        target = (target + 1) % workers as usize;
                    }
                    col += 1;
                }
            }
            '$' => {
                row += take_run(&mut run) as i64;
                col = 0;
            }
            '!' => break,
            c if c.is_whitespace() => {}
            c => return Err(decode_err(offset, &format!("unexpected character '{c}'"))),
        }
    }

    Ok(sets)
}

#[inline]
fn take_run(run: &mut u32) -> u32 {
    let n = if *run == 0 { 1 } else { *run };
    *run = 0;
    n
}

fn decode_err(offset: usize, reason: &str) -> EngineError {
    EngineError::PatternDecode {
        offset,
        reason: reason.to_string(),
    }
}

/// Strip comment (`#`) and life-1.06/RLE header lines before the tag
/// grammar runs, so files copied verbatim from common pattern
/// collections decode without pre-processing by the caller.
fn body(text: &str) -> impl Iterator<Item = (usize, char)> + '_ {
    text.char_indices().filter_map(move |(o, c)| {
        let line_start = text[..o].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line = &text[line_start..];
        let line = &line[..line.find('\n').unwrap_or(line.len())];
        let skip = line.starts_with('#') || line.trim_start().starts_with("x =");
        if skip {
            None
        } else {
            Some((o, c))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blinker_decodes_to_three_points() {
        let sets = decode("3o!", Point::new(100, 100), 1).unwrap();
        assert_eq!(sets[0].len(), 3);
    }

    #[test]
    fn rows_advance_with_dollar() {
        let sets = decode("o$o!", Point::new(0, 0), 1).unwrap();
        let mut pts: Vec<Point> = sets[0].iter().copied().collect();
        pts.sort();
        assert_eq!(pts, vec![Point::new(0, 0), Point::new(0, 1)]);
    }

    #[test]
    fn header_and_comment_lines_are_ignored() {
        let text = "#C glider\nx = 3, y = 3, rule = B3/S23\nbo$2bo$3o!";
        let sets = decode(text, Point::new(0, 0), 1).unwrap();
        assert_eq!(sets[0].len(), 5);
    }

    #[test]
    fn round_robins_across_workers_every_16_cells() {
        let rle = format!("{}o!", 40);
        let sets = decode(&rle, Point::new(0, 0), 4).unwrap();
        assert_eq!(sets[0].len(), 16);
        assert_eq!(sets[1].len(), 16);
        assert_eq!(sets[2].len(), 8);
        assert_eq!(sets[3].len(), 0);
    }

    #[test]
    fn unexpected_character_is_a_decode_error() {
        let err = decode("x!", Point::new(0, 0), 1).unwrap_err();
        assert!(matches!(err, EngineError::PatternDecode { .. }));
    }
}

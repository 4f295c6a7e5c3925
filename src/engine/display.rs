//! Screen hand-off: the main thread builds a fresh buffer each
//! generation and clones it into the renderer's mailbox; a dedicated
//! renderer thread drains it asynchronously. A generation is skipped
//! for display purposes entirely if the renderer hasn't caught up yet,
//! rather than blocking the simulation on render speed.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::engine::point::Point;

/// A terminal-sized grid of live-cell flags plus the row-0 status line.
#[derive(Clone)]
pub struct ScreenBuffer {
    width: u16,
    height: u16,
    cells: Vec<bool>,
    pub status: String,
}

impl ScreenBuffer {
    pub fn new(width: u16, height: u16) -> Self {
        ScreenBuffer {
            width,
            height,
            cells: vec![false; width as usize * height as usize],
            status: String::new(),
        }
    }

    #[inline(always)]
    pub fn width(&self) -> u16 {
        self.width
    }

    #[inline(always)]
    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|c| *c = false);
    }

    /// Mark `p` live if it falls within `view` (a window centred on
    /// `center` with half-extents derived from the buffer dimensions).
    pub fn set_if_visible(&mut self, p: Point, center: Point) {
        let hw = self.width as i64 / 2;
        let hh = self.height as i64 / 2;
        let dx = (p.x.wrapping_sub(center.x)) as i32 as i64;
        let dy = (p.y.wrapping_sub(center.y)) as i32 as i64;
        if dx < -hw || dx >= hw || dy < -hh || dy >= hh {
            return;
        }
        let col = (dx + hw) as usize;
        let row = (dy + hh) as usize;
        if row == 0 {
            return; // row 0 is reserved for the status line
        }
        let idx = row * self.width as usize + col;
        if idx < self.cells.len() {
            self.cells[idx] = true;
        }
    }

    pub fn is_set(&self, col: usize, row: usize) -> bool {
        self.cells
            .get(row * self.width as usize + col)
            .copied()
            .unwrap_or(false)
    }
}

/// External collaborator: whatever actually paints a filled buffer to a
/// terminal. Errors are logged and swallowed by the renderer loop — the
/// next generation tries again.
pub trait FramePusher: Send {
    fn push(&mut self, frame: &ScreenBuffer) -> anyhow::Result<()>;
}

struct HandoffState {
    pending: Option<Arc<ScreenBuffer>>,
    going: bool,
    busy: bool,
}

/// Third barrier gate: main hands off a filled buffer, the renderer
/// thread drains it asynchronously. If the renderer is still busy when
/// a new generation is ready, that generation is silently skipped for
/// display purposes.
pub struct DisplayHandoff {
    state: Mutex<HandoffState>,
    cv: Condvar,
}

impl DisplayHandoff {
    pub fn new() -> Self {
        DisplayHandoff {
            state: Mutex::new(HandoffState {
                pending: None,
                going: true,
                busy: false,
            }),
            cv: Condvar::new(),
        }
    }

    /// Main-thread call. Returns `true` if the frame was accepted,
    /// `false` if the renderer was still busy and the frame was dropped.
    pub fn try_push(&self, frame: Arc<ScreenBuffer>) -> bool {
        let mut s = self.state.lock();
        if s.busy {
            return false;
        }
        s.pending = Some(frame);
        self.cv.notify_one();
        true
    }

    pub fn shut_down(&self) {
        let mut s = self.state.lock();
        s.going = false;
        self.cv.notify_one();
    }

    /// Renderer-thread loop body: park for the next frame, push it
    /// through `pusher`, and report failures without tearing anything
    /// down.
    pub fn run(&self, pusher: &mut dyn FramePusher) {
        loop {
            let frame = {
                let mut s = self.state.lock();
                while s.going && s.pending.is_none() {
                    self.cv.wait(&mut s);
                }
                if !s.going && s.pending.is_none() {
                    return;
                }
                s.busy = true;
                s.pending.take().unwrap()
            };
            if let Err(err) = pusher.push(&frame) {
                tracing::warn!(error = %err, "display push failed, will retry next generation");
            }
            let mut s = self.state.lock();
            s.busy = false;
        }
    }
}

impl Default for DisplayHandoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    struct CountingPusher(Arc<AtomicUsize>);
    impl FramePusher for CountingPusher {
        fn push(&mut self, _frame: &ScreenBuffer) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn pushed_frame_reaches_the_renderer() {
        let handoff = Arc::new(DisplayHandoff::new());
        let count = Arc::new(AtomicUsize::new(0));
        let renderer_handoff = Arc::clone(&handoff);
        let renderer_count = Arc::clone(&count);
        let handle = thread::spawn(move || {
            let mut pusher = CountingPusher(renderer_count);
            renderer_handoff.run(&mut pusher);
        });

        let frame = Arc::new(ScreenBuffer::new(10, 10));
        assert!(handoff.try_push(frame));

        // Give the renderer a moment, then shut down.
        thread::sleep(std::time::Duration::from_millis(20));
        handoff.shut_down();
        handle.join().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn visible_point_is_set_near_center() {
        let mut buf = ScreenBuffer::new(10, 10);
        buf.set_if_visible(Point::new(100, 101), Point::new(100, 100));
        assert!(buf.is_set(5, 6));
    }
}

//! Terminal front-end: a `crossterm` renderer implementing
//! [`FramePusher`] and a keyboard poller translating raw key events
//! into [`ControlEvent`]s. All interpretation of *what* a key does to
//! tracking/window state lives in the engine; this module only maps
//! keys to engine-native intents.

use std::io::{self, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::{cursor, queue, style, terminal};

use crate::engine::display::{FramePusher, ScreenBuffer};
use crate::engine::ControlEvent;

pub struct TerminalPusher<W: Write> {
    out: W,
}

impl<W: Write> TerminalPusher<W> {
    pub fn new(out: W) -> Self {
        TerminalPusher { out }
    }
}

impl<W: Write + Send> FramePusher for TerminalPusher<W> {
    fn push(&mut self, frame: &ScreenBuffer) -> anyhow::Result<()> {
        queue!(self.out, cursor::MoveTo(0, 0), terminal::Clear(terminal::ClearType::All))?;
        queue!(self.out, style::Print(&frame.status))?;
        for row in 1..frame.height() {
            queue!(self.out, cursor::MoveTo(0, row))?;
            let mut line = String::with_capacity(frame.width() as usize);
            for col in 0..frame.width() {
                line.push(if frame.is_set(col as usize, row as usize) {
                    '#'
                } else {
                    ' '
                });
            }
            queue!(self.out, style::Print(line))?;
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Non-blocking poll for the next keyboard event, translated into an
/// engine [`ControlEvent`]. Returns `Ok(None)` when nothing is pending;
/// a malformed or unrecognised event is a no-op, never an error.
pub fn poll_control_event(timeout: Duration, step: i32) -> io::Result<Option<ControlEvent>> {
    if !event::poll(timeout)? {
        return Ok(None);
    }
    let ev = event::read()?;
    let Event::Key(key) = ev else {
        return Ok(None);
    };
    if key.kind != KeyEventKind::Press {
        return Ok(None);
    }
    Ok(match key.code {
        KeyCode::Up => Some(ControlEvent::NudgeView { dx: 0, dy: -step }),
        KeyCode::Down => Some(ControlEvent::NudgeView { dx: 0, dy: step }),
        KeyCode::Left => Some(ControlEvent::NudgeView { dx: -step, dy: 0 }),
        KeyCode::Right => Some(ControlEvent::NudgeView { dx: step, dy: 0 }),
        KeyCode::Char('t') => Some(ControlEvent::ToggleAutotrack),
        KeyCode::Char('T') => Some(ControlEvent::AdjustSensitivity { up: true }),
        KeyCode::Char('<') => Some(ControlEvent::AdjustRate { double: false }),
        KeyCode::Char('>') => Some(ControlEvent::AdjustRate { double: true }),
        KeyCode::Char('[') => Some(ControlEvent::AdjustDampening { double: false }),
        KeyCode::Char(']') => Some(ControlEvent::AdjustDampening { double: true }),
        KeyCode::Char('+') => Some(ControlEvent::AdjustDisplayStride { double: true }),
        KeyCode::Char('-') => Some(ControlEvent::AdjustDisplayStride { double: false }),
        KeyCode::Char('w') => Some(ControlEvent::SwapViewState),
        KeyCode::Char('q') | KeyCode::Esc => Some(ControlEvent::Quit),
        _ => None,
    })
}

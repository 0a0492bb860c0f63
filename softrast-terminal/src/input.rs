/// Terminal keyboard and mouse events folded into per-frame input snapshots
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, MouseEvent, MouseEventKind};
use std::io;
use std::time::{Duration, Instant};

use softrast_core::{InputSnapshot, KeySet};

/// Without release events a key counts as held this long after its last press or repeat
const KEY_HOLD_TIMEOUT: Duration = Duration::from_millis(300);

/// Look delta, in pixels, injected by one arrow key press
const ARROW_LOOK_STEP: f32 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Movement {
    Forward,
    Backward,
    StrafeLeft,
    StrafeRight,
    Descend,
}

impl Movement {
    fn from_key(code: KeyCode) -> Option<Self> {
        match code {
            KeyCode::Char('w') | KeyCode::Char('W') => Some(Self::Forward),
            KeyCode::Char('s') | KeyCode::Char('S') => Some(Self::Backward),
            KeyCode::Char('a') | KeyCode::Char('A') => Some(Self::StrafeLeft),
            KeyCode::Char('d') | KeyCode::Char('D') => Some(Self::StrafeRight),
            KeyCode::Char(' ') => Some(Self::Descend),
            _ => None,
        }
    }
}

/// Collects terminal events between frames.
///
/// Mouse motion arrives as absolute cell positions; consecutive positions are
/// turned into frame-buffer pixel deltas (one column is one pixel, one row is
/// two) and accumulated until the next [`TerminalInput::snapshot`].
pub struct TerminalInput {
    held: [Option<Instant>; 5],
    releases_reported: bool,
    last_mouse: Option<(u16, u16)>,
    mouse_dx: f32,
    mouse_dy: f32,
    resized: Option<(u16, u16)>,
    quit: bool,
}

impl TerminalInput {
    /// `releases_reported` is true when the terminal sends key release events
    pub fn new(releases_reported: bool) -> Self {
        Self {
            held: [None; 5],
            releases_reported,
            last_mouse: None,
            mouse_dx: 0.0,
            mouse_dy: 0.0,
            resized: None,
            quit: false,
        }
    }

    /// Drain every pending terminal event without blocking
    pub fn poll(&mut self) -> io::Result<()> {
        while event::poll(Duration::ZERO)? {
            let event = event::read()?;
            self.handle_event(&event, Instant::now());
        }
        Ok(())
    }

    pub fn handle_event(&mut self, event: &Event, now: Instant) {
        match event {
            Event::Key(key) => self.handle_key(key, now),
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            Event::Resize(columns, rows) => self.resized = Some((*columns, *rows)),
            Event::FocusLost => {
                self.held = [None; 5];
                self.last_mouse = None;
            }
            _ => {}
        }
    }

    fn handle_key(&mut self, key: &KeyEvent, now: Instant) {
        if let Some(movement) = Movement::from_key(key.code) {
            self.held[movement as usize] = match key.kind {
                KeyEventKind::Press | KeyEventKind::Repeat => Some(now),
                KeyEventKind::Release => None,
            };
            return;
        }

        if key.kind == KeyEventKind::Release {
            return;
        }
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => self.quit = true,
            KeyCode::Left => self.mouse_dx -= ARROW_LOOK_STEP,
            KeyCode::Right => self.mouse_dx += ARROW_LOOK_STEP,
            KeyCode::Up => self.mouse_dy -= ARROW_LOOK_STEP,
            KeyCode::Down => self.mouse_dy += ARROW_LOOK_STEP,
            _ => {}
        }
    }

    fn handle_mouse(&mut self, mouse: &MouseEvent) {
        match mouse.kind {
            MouseEventKind::Moved | MouseEventKind::Drag(_) => {
                if let Some((column, row)) = self.last_mouse {
                    self.mouse_dx += mouse.column as f32 - column as f32;
                    self.mouse_dy += 2.0 * (mouse.row as f32 - row as f32);
                }
                self.last_mouse = Some((mouse.column, mouse.row));
            }
            _ => {}
        }
    }

    /// Held keys plus the motion since the previous snapshot; motion is reset
    pub fn snapshot(&mut self, now: Instant) -> InputSnapshot {
        let held = |movement: Movement| match self.held[movement as usize] {
            Some(_) if self.releases_reported => true,
            Some(at) => now.saturating_duration_since(at) < KEY_HOLD_TIMEOUT,
            None => false,
        };
        let snapshot = InputSnapshot {
            keys: KeySet {
                forward: held(Movement::Forward),
                backward: held(Movement::Backward),
                strafe_left: held(Movement::StrafeLeft),
                strafe_right: held(Movement::StrafeRight),
                descend: held(Movement::Descend),
            },
            mouse_dx: self.mouse_dx,
            mouse_dy: self.mouse_dy,
        };
        self.mouse_dx = 0.0;
        self.mouse_dy = 0.0;
        snapshot
    }

    /// Whether key releases arrive as events; decided once at startup
    pub fn releases_reported(&self) -> bool {
        self.releases_reported
    }

    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    /// New terminal size in cells, if the terminal was resized since the last call
    pub fn take_resize(&mut self) -> Option<(u16, u16)> {
        self.resized.take()
    }
}

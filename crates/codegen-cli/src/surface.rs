//! Terminal display surface.
//!
//! On a TTY every frame replacement clears the screen and repaints, so a
//! streaming submission looks like a live-updating document. When stdout is
//! piped, intermediate frames are held back and only the final one is
//! printed by `finish`, keeping piped output clean.

use codegen_render::Surface;
use crossterm::tty::IsTty;
use crossterm::{cursor, queue, terminal};
use std::io::{Stdout, Write, stdout};

pub struct TerminalSurface {
    out: Stdout,
    interactive: bool,
    last_frame: String,
}

impl TerminalSurface {
    pub fn new() -> Self {
        let out = stdout();
        let interactive = out.is_tty();
        Self {
            out,
            interactive,
            last_frame: String::new(),
        }
    }

    /// Print the final frame when running non-interactively.
    pub fn finish(&mut self) {
        if !self.interactive && !self.last_frame.is_empty() {
            let _ = self.out.write_all(self.last_frame.as_bytes());
            let _ = self.out.flush();
        }
    }
}

impl Default for TerminalSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for TerminalSurface {
    fn replace(&mut self, frame: &str) {
        self.last_frame = frame.to_string();
        if !self.interactive {
            return;
        }
        let _ = queue!(
            self.out,
            terminal::Clear(terminal::ClearType::All),
            cursor::MoveTo(0, 0)
        );
        let _ = self.out.write_all(frame.as_bytes());
        let _ = self.out.flush();
    }
}

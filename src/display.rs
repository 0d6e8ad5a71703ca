//! Display sinks: where rendered frames end up.
//!
//! The panel is a serial resource. The controller is the only caller and never
//! has more than one write in flight.

use crate::framebuffer::PixelBuffer;
use std::io::Write;
use thiserror::Error;

/// The display transport rejected a command or a frame.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("display init failed: {0}")]
    Init(String),

    #[error("display write failed: {0}")]
    Write(String),
}

pub trait DisplaySink {
    /// Replace the panel contents with `frame`.
    fn push(&mut self, frame: &PixelBuffer) -> Result<(), TransportError>;

    /// Blank the panel.
    fn clear(&mut self) -> Result<(), TransportError>;
}

/// Development sink printing every frame as ASCII art.
pub struct TerminalSink<W: Write> {
    out: W,
    frames: u64,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, frames: 0 }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl TerminalSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> DisplaySink for TerminalSink<W> {
    fn push(&mut self, frame: &PixelBuffer) -> Result<(), TransportError> {
        self.frames += 1;
        write!(self.out, "--- frame {} ---\n{}", self.frames, frame.to_ascii())
            .and_then(|_| self.out.flush())
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    fn clear(&mut self) -> Result<(), TransportError> {
        writeln!(self.out, "--- blank ---")
            .and_then(|_| self.out.flush())
            .map_err(|e| TransportError::Write(e.to_string()))
    }
}

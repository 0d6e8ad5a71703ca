//! Button input with scan-based debouncing.
//!
//! Two physical buttons (active-low with internal pull-up):
//!   - NAVIGATE - cycle to the next screen
//!   - SHUTDOWN - power the board off
//!
//! The raw level of each line is sampled every scan period. A level change is
//! only accepted once it has been stable for the debounce threshold, and a
//! `Pressed` edge is emitted when the accepted level goes active. Holding the
//! button never re-fires; releasing and pressing again does.

use crate::ButtonEvent;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// A raw GPIO line could not be read.
#[derive(Error, Debug)]
#[error("GPIO read failed: {0}")]
pub struct InputError(pub String);

/// Raw button level. Implementations hide the electrical polarity: `true`
/// always means "pressed".
pub trait ButtonLine {
    fn is_active(&mut self) -> Result<bool, InputError>;
}

/// A source of debounced button edges, polled by the controller loop.
pub trait InputSource {
    fn poll(&mut self, now: Instant) -> ButtonEvent;
}

/// Stable-level debouncer driven by timestamps, no timers of its own.
#[derive(Debug, Clone)]
pub struct Debouncer {
    threshold: Duration,
    stable: bool,
    candidate_since: Option<Instant>,
}

impl Debouncer {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            stable: false,
            candidate_since: None,
        }
    }

    /// Feed one raw sample; returns `Pressed` on the accepted inactive→active edge.
    pub fn update(&mut self, active: bool, now: Instant) -> ButtonEvent {
        if active == self.stable {
            self.candidate_since = None;
            return ButtonEvent::Idle;
        }

        let since = *self.candidate_since.get_or_insert(now);
        if now.saturating_duration_since(since) < self.threshold {
            return ButtonEvent::Idle;
        }

        self.stable = active;
        self.candidate_since = None;
        if active {
            ButtonEvent::Pressed
        } else {
            ButtonEvent::Idle
        }
    }

    /// Debounced level.
    pub fn is_held(&self) -> bool {
        self.stable
    }
}

/// A [`ButtonLine`] paired with its [`Debouncer`].
pub struct DebouncedButton<L> {
    name: &'static str,
    line: L,
    debouncer: Debouncer,
    failing: bool,
}

impl<L: ButtonLine> DebouncedButton<L> {
    pub fn new(name: &'static str, line: L, threshold: Duration) -> Self {
        Self {
            name,
            line,
            debouncer: Debouncer::new(threshold),
            failing: false,
        }
    }
}

impl<L: ButtonLine> InputSource for DebouncedButton<L> {
    fn poll(&mut self, now: Instant) -> ButtonEvent {
        let active = match self.line.is_active() {
            Ok(active) => {
                self.failing = false;
                active
            }
            Err(e) => {
                // Only the first failure of a streak is worth a log line.
                if !self.failing {
                    warn!(button = self.name, error = %e, "button read failed");
                    self.failing = true;
                }
                return ButtonEvent::Idle;
            }
        };

        let event = self.debouncer.update(active, now);
        if event.is_pressed() {
            debug!(button = self.name, "press detected");
        }
        event
    }
}

/// Presses delivered over a channel, already debounced (keyboard in dev mode).
/// Feed it from a `sync_channel(1)`: at most one press waits, extra ones are
/// dropped by the sender.
pub struct ChannelButton {
    presses: Receiver<()>,
}

impl ChannelButton {
    pub fn new(presses: Receiver<()>) -> Self {
        Self { presses }
    }
}

impl InputSource for ChannelButton {
    fn poll(&mut self, _now: Instant) -> ButtonEvent {
        match self.presses.try_recv() {
            Ok(()) => ButtonEvent::Pressed,
            Err(_) => ButtonEvent::Idle,
        }
    }
}

impl<I: InputSource + ?Sized> InputSource for Box<I> {
    fn poll(&mut self, now: Instant) -> ButtonEvent {
        (**self).poll(now)
    }
}

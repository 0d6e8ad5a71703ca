//! # Pi Status Display Core Library
//!
//! This library provides the building blocks of the status daemon: the screen
//! set, metric snapshots, the host telemetry adapters, the pixel renderer, the
//! button debouncer and the controller loop that ties them together. It's
//! designed for small single-board computers (Raspberry Pi Zero class) driving
//! a 128x64 monochrome OLED and two push buttons.
//!
//! ## Design Philosophy
//!
//! ### One loop, one owner
//! - **Single control loop**: [`controller::ScreenController`] owns the active
//!   screen, the render cadence and the shutdown flag; nothing else mutates them
//! - **Interleaved polling**: buttons are scanned every few milliseconds while
//!   frames are rendered at a much slower tick, both on the same thread
//! - **Injected time**: the loop only sees time through [`controller::Clock`],
//!   so every timing contract is testable with a fake clock
//!
//! ### Hardware at the edges
//! Everything that touches the OS or a bus sits behind a small trait:
//! - [`sources::MetricSource`]: one telemetry category, bounded by a timeout
//! - [`display::DisplaySink`]: the physical panel (SSD1306 or terminal)
//! - [`debounce::ButtonLine`]: a raw GPIO level, debounced into [`ButtonEvent`]s
//! - [`shutdown::ShutdownAgent`]: the privileged power-off call
//!
//! ### Failure is local
//! A sensor that cannot be read renders as a placeholder, a display write that
//! fails is retried on the next natural tick, and only an invalid configuration
//! stops the daemon before it starts.
//!
//! ## Core Types
//!
//! - [`Screen`]: the five metric pages in their fixed cyclic order
//! - [`ButtonEvent`]: a debounced logical press edge

pub mod config;
pub mod controller;
pub mod debounce;
pub mod display;
pub mod framebuffer;
pub mod host;
pub mod metrics;
pub mod renderer;
pub mod shutdown;
pub mod sources;

#[cfg(all(target_os = "linux", feature = "hardware"))]
pub mod gpio_lines;
#[cfg(all(target_os = "linux", feature = "hardware"))]
pub mod oled;

#[cfg(test)]
mod tests;

/// One metric page of the display.
///
/// The declaration order is the navigation order: the navigate button always
/// moves to [`Screen::next`], wrapping from [`Screen::Clock`] back to
/// [`Screen::Network`].
///
/// # Example
/// ```
/// use status_display_lib::Screen;
///
/// assert_eq!(Screen::Network.next(), Screen::Storage);
/// assert_eq!(Screen::Clock.next(), Screen::Network);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Screen {
    Network,
    Storage,
    SystemLoad,
    Temperature,
    Clock,
}

impl Screen {
    /// All screens in navigation order.
    pub const ALL: [Screen; 5] = [
        Screen::Network,
        Screen::Storage,
        Screen::SystemLoad,
        Screen::Temperature,
        Screen::Clock,
    ];

    /// Number of screens in the cycle.
    pub const COUNT: usize = Self::ALL.len();

    /// Zero-based position in the navigation order.
    pub fn index(self) -> usize {
        match self {
            Screen::Network => 0,
            Screen::Storage => 1,
            Screen::SystemLoad => 2,
            Screen::Temperature => 3,
            Screen::Clock => 4,
        }
    }

    /// Cyclic successor.
    pub fn next(self) -> Screen {
        Self::ALL[(self.index() + 1) % Self::COUNT]
    }

    /// Header text drawn at the top of the page.
    pub fn title(self) -> &'static str {
        match self {
            Screen::Network => "Network",
            Screen::Storage => "Storage",
            Screen::SystemLoad => "System",
            Screen::Temperature => "CPU Temp",
            Screen::Clock => "Date & Time",
        }
    }
}

impl std::fmt::Display for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

/// A debounced logical button edge.
///
/// `Pressed` is reported once per physical press, never while the button is
/// merely held down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ButtonEvent {
    #[default]
    Idle,
    Pressed,
}

impl ButtonEvent {
    pub fn is_pressed(self) -> bool {
        self == ButtonEvent::Pressed
    }
}

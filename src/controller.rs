//! # Screen Controller
//!
//! The single control loop of the daemon. It owns the active screen, the render
//! cadence and the shutdown flag, and is the only component that talks to the
//! display sink.
//!
//! ## Lifecycle
//!
//! ```text
//! Running --shutdown press--> ShuttingDown --agent called--> Stopped
//! Running --stop flag------------------------------------> Stopped
//! ```
//!
//! While `Running`, every [`ScreenController::step`] polls both buttons once,
//! handles at most one transition and renders the active screen when its
//! refresh period has elapsed. A shutdown press wins over a navigate press
//! reported in the same scan.
//!
//! Once `shutdown_requested` is set nothing is sampled or pushed again; the
//! only remaining display operation is the final `clear`.

use crate::config::Config;
use crate::debounce::InputSource;
use crate::display::DisplaySink;
use crate::metrics::MetricSnapshot;
use crate::renderer;
use crate::shutdown::{ShutdownAgent, ShutdownError};
use crate::sources::SourceSet;
use crate::Screen;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Monotonic time as seen by the loop.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Running,
    ShuttingDown,
    Stopped,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerState {
    pub active_screen: Screen,
    /// Start of the most recent render, `None` before the first frame
    pub last_render: Option<Instant>,
    pub shutdown_requested: bool,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            active_screen: Screen::Network,
            last_render: None,
            shutdown_requested: false,
        }
    }
}

/// How the loop ended.
#[derive(Debug)]
pub enum Outcome {
    /// The power-off agent accepted the request
    PoweredOff,
    /// The stop flag was raised (Ctrl+C, SIGTERM)
    Interrupted,
    /// The power-off agent failed; the daemon should exit non-zero
    ShutdownFailed(ShutdownError),
}

/// Loop timing, derived from [`Config`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cadence {
    pub scan: Duration,
    pub render_tick: Duration,
    pub network_refresh: Duration,
    pub storage_refresh: Duration,
    /// Deliberately longer than one tick: the notice must stay readable.
    pub shutdown_notice: Duration,
}

impl Cadence {
    pub fn from_config(config: &Config) -> Self {
        Self {
            scan: Duration::from_millis(config.buttons.scan_ms),
            render_tick: config.timing.render_tick(),
            network_refresh: Duration::from_millis(config.timing.network_refresh_ms),
            storage_refresh: Duration::from_millis(config.timing.storage_refresh_ms),
            shutdown_notice: config.timing.shutdown_notice(),
        }
    }

    /// Minimum time between two renders of `screen`.
    pub fn refresh_period(&self, screen: Screen) -> Duration {
        match screen {
            Screen::Network => self.network_refresh,
            Screen::Storage => self.storage_refresh,
            _ => self.render_tick,
        }
    }
}

impl Default for Cadence {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Drives screens, buttons and the shutdown sequence.
pub struct ScreenController<C, N, S, D, A> {
    clock: C,
    navigate: N,
    shutdown: S,
    sources: SourceSet,
    sink: D,
    agent: A,
    cadence: Cadence,
    state: ControllerState,
    phase: Phase,
    force_render: bool,
    latched: Latched,
    stop: Option<Arc<AtomicBool>>,
    outcome: Option<Outcome>,
}

/// Presses seen while a metric read was in progress, handled on the next scan.
#[derive(Clone, Copy, Debug, Default)]
struct Latched {
    navigate: bool,
    shutdown: bool,
}

impl<C, N, S, D, A> ScreenController<C, N, S, D, A>
where
    C: Clock,
    N: InputSource,
    S: InputSource,
    D: DisplaySink,
    A: ShutdownAgent,
{
    pub fn new(
        clock: C,
        navigate: N,
        shutdown: S,
        sources: SourceSet,
        sink: D,
        agent: A,
        cadence: Cadence,
    ) -> Self {
        Self {
            clock,
            navigate,
            shutdown,
            sources,
            sink,
            agent,
            cadence,
            state: ControllerState::default(),
            phase: Phase::Running,
            force_render: true,
            latched: Latched::default(),
            stop: None,
            outcome: None,
        }
    }

    /// Stop the loop once `flag` becomes true, without powering off.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    /// Run until `Stopped`.
    pub fn run(&mut self) -> Outcome {
        info!(screen = %self.state.active_screen, "controller started");
        while self.step() != Phase::Stopped {}
        self.outcome.take().unwrap_or(Outcome::Interrupted)
    }

    /// Render the active screen immediately, ignoring the cadence.
    pub fn render_once(&mut self) {
        let now = self.clock.now();
        self.render_active(now);
    }

    /// One scan of the loop.
    pub fn step(&mut self) -> Phase {
        match self.phase {
            Phase::Stopped => return Phase::Stopped,
            Phase::ShuttingDown => {
                self.finish_shutdown();
                return self.phase;
            }
            Phase::Running => {}
        }

        if self.stop_requested() {
            self.stop_interrupted();
            return self.phase;
        }

        let scan_started = self.clock.now();
        let latched = std::mem::take(&mut self.latched);
        let navigate = self.navigate.poll(scan_started).is_pressed() || latched.navigate;
        let shutdown = self.shutdown.poll(scan_started).is_pressed() || latched.shutdown;

        if shutdown {
            if navigate {
                debug!("navigate press ignored, shutdown takes priority");
            }
            self.begin_shutdown();
            return self.phase;
        }

        if navigate {
            self.state.active_screen = self.state.active_screen.next();
            self.force_render = true;
            info!(screen = %self.state.active_screen, "switched screen");
        }

        let now = self.clock.now();
        if self.render_due(now) {
            self.render_active(now);
        }

        let spent = self.clock.now().saturating_duration_since(scan_started);
        self.clock.sleep(self.cadence.scan.saturating_sub(spent));
        self.phase
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn render_due(&self, now: Instant) -> bool {
        if self.force_render {
            return true;
        }
        match self.state.last_render {
            None => true,
            Some(last) => {
                now.saturating_duration_since(last)
                    >= self.cadence.refresh_period(self.state.active_screen)
            }
        }
    }

    fn render_active(&mut self, now: Instant) {
        let screen = self.state.active_screen;
        let clock = &self.clock;
        let navigate = &mut self.navigate;
        let shutdown = &mut self.shutdown;
        let latched = &mut self.latched;
        // Keep scanning the buttons while the read is in flight.
        let mut scan_buttons = || {
            let now = clock.now();
            latched.navigate |= navigate.poll(now).is_pressed();
            latched.shutdown |= shutdown.poll(now).is_pressed();
        };
        let sampled = self
            .sources
            .sample_while(screen, self.cadence.scan, &mut scan_buttons);

        let snapshot = sampled.unwrap_or_else(|e| {
            warn!(%screen, error = %e, "metric unavailable");
            MetricSnapshot::unavailable(screen)
        });

        let frame = renderer::render(screen, &snapshot);
        debug!(%screen, lit = frame.lit_pixels(), "pushing frame");
        // A failed push is retried by the next natural render.
        if let Err(e) = self.sink.push(&frame) {
            warn!(%screen, error = %e, "display update failed");
        }

        self.state.last_render = Some(now);
        self.force_render = false;
    }

    fn begin_shutdown(&mut self) {
        info!("shutdown button pressed");
        self.phase = Phase::ShuttingDown;

        if let Err(e) = self.sink.push(&renderer::render_notice(renderer::SHUTDOWN_NOTICE)) {
            warn!(error = %e, "could not show shutdown notice");
        }
        self.clock.sleep(self.cadence.shutdown_notice);
        self.state.shutdown_requested = true;
    }

    fn finish_shutdown(&mut self) {
        if let Err(e) = self.sink.clear() {
            warn!(error = %e, "could not blank display");
        }

        let outcome = match self.agent.power_off() {
            Ok(()) => {
                info!("power-off requested");
                Outcome::PoweredOff
            }
            Err(e) => {
                error!(error = %e, "power-off failed");
                Outcome::ShutdownFailed(e)
            }
        };
        self.outcome = Some(outcome);
        self.phase = Phase::Stopped;
    }

    fn stop_interrupted(&mut self) {
        info!("stop requested, blanking display");
        if let Err(e) = self.sink.clear() {
            warn!(error = %e, "could not blank display");
        }
        self.outcome = Some(Outcome::Interrupted);
        self.phase = Phase::Stopped;
    }
}

//! Test doubles shared by the scenario tests.

use crate::controller::{Cadence, Clock, ScreenController};
use crate::debounce::{ButtonLine, DebouncedButton, InputError};
use crate::display::{DisplaySink, TransportError};
use crate::framebuffer::PixelBuffer;
use crate::metrics::MetricSnapshot;
use crate::shutdown::{ShutdownAgent, ShutdownError};
use crate::sources::{MetricSource, SourceError, SourceSet};
use crate::Screen;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Everything observable that the controller did, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Sample(Screen),
    Push(PixelBuffer),
    Clear,
    PowerOff,
}

#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<Event>>>);

impl Log {
    fn record(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn pushes(&self) -> Vec<PixelBuffer> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Push(frame) => Some(frame),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &Event) -> usize {
        self.events().iter().filter(|e| *e == wanted).count()
    }
}

/// Manually advanced monotonic clock. `sleep` just moves time forward.
/// Shared with the fake sources, which spend time while reading.
#[derive(Clone)]
pub struct FakeClock {
    start: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        *self.offset.lock().unwrap() += duration;
    }
}

/// A raw button level that is active during the given time windows.
pub struct ScheduledLine {
    clock: FakeClock,
    windows: Vec<(Duration, Duration)>,
}

impl ButtonLine for ScheduledLine {
    fn is_active(&mut self) -> Result<bool, InputError> {
        let t = self.clock.elapsed();
        Ok(self
            .windows
            .iter()
            .any(|(from, until)| (*from..*until).contains(&t)))
    }
}

/// Press windows of 120 ms starting at each of `starts_ms`.
pub fn presses(starts_ms: &[u64]) -> Vec<(Duration, Duration)> {
    starts_ms
        .iter()
        .map(|ms| {
            let from = Duration::from_millis(*ms);
            (from, from + Duration::from_millis(120))
        })
        .collect()
}

pub struct FakeSource {
    screen: Screen,
    reply: Option<MetricSnapshot>,
    log: Log,
    clock: FakeClock,
    read_time: Duration,
}

impl MetricSource for FakeSource {
    fn screen(&self) -> Screen {
        self.screen
    }

    /// Spends `read_time` of fake time, yielding every `scan` like the
    /// bounded sampler does.
    fn sample_while(
        &self,
        scan: Duration,
        on_wait: &mut dyn FnMut(),
    ) -> Result<MetricSnapshot, SourceError> {
        let mut left = self.read_time;
        while !left.is_zero() {
            let slice = scan.min(left);
            self.clock.sleep(slice);
            left -= slice;
            on_wait();
        }
        self.sample()
    }

    fn sample(&self) -> Result<MetricSnapshot, SourceError> {
        self.log.record(Event::Sample(self.screen));
        self.reply
            .clone()
            .ok_or_else(|| SourceError::Unavailable(self.screen.title().to_string()))
    }
}

pub struct RecordingSink {
    log: Log,
    failing: bool,
}

impl DisplaySink for RecordingSink {
    fn push(&mut self, frame: &PixelBuffer) -> Result<(), TransportError> {
        self.log.record(Event::Push(frame.clone()));
        if self.failing {
            return Err(TransportError::Write("bus nack".into()));
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<(), TransportError> {
        self.log.record(Event::Clear);
        Ok(())
    }
}

pub struct RecordingAgent {
    log: Log,
    failing: bool,
}

impl ShutdownAgent for RecordingAgent {
    fn power_off(&mut self) -> Result<(), ShutdownError> {
        self.log.record(Event::PowerOff);
        if self.failing {
            return Err(ShutdownError::Spawn {
                program: "sudo".into(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "not allowed"),
            });
        }
        Ok(())
    }
}

pub type TestController = ScreenController<
    FakeClock,
    DebouncedButton<ScheduledLine>,
    DebouncedButton<ScheduledLine>,
    RecordingSink,
    RecordingAgent,
>;

/// Builder for a controller wired to fakes.
pub struct Rig {
    pub clock: FakeClock,
    pub log: Log,
    navigate: Vec<(Duration, Duration)>,
    shutdown: Vec<(Duration, Duration)>,
    replies: Vec<(Screen, Option<MetricSnapshot>)>,
    read_time: Duration,
    sink_failing: bool,
    agent_failing: bool,
}

impl Rig {
    /// Every source answers with an all-unavailable snapshot by default.
    pub fn new() -> Self {
        Self {
            clock: FakeClock::new(),
            log: Log::default(),
            navigate: Vec::new(),
            shutdown: Vec::new(),
            replies: Screen::ALL
                .iter()
                .map(|s| (*s, Some(MetricSnapshot::unavailable(*s))))
                .collect(),
            read_time: Duration::ZERO,
            sink_failing: false,
            agent_failing: false,
        }
    }

    pub fn navigate_at(mut self, starts_ms: &[u64]) -> Self {
        self.navigate = presses(starts_ms);
        self
    }

    pub fn navigate_windows(mut self, windows: Vec<(Duration, Duration)>) -> Self {
        self.navigate = windows;
        self
    }

    pub fn shutdown_at(mut self, starts_ms: &[u64]) -> Self {
        self.shutdown = presses(starts_ms);
        self
    }

    /// `None` makes the source fail on every read.
    pub fn reply(mut self, screen: Screen, reply: Option<MetricSnapshot>) -> Self {
        for entry in self.replies.iter_mut().filter(|(s, _)| *s == screen) {
            entry.1 = reply.clone();
        }
        self
    }

    /// Every source takes `read_time` per sample.
    pub fn slow_reads(mut self, read_time: Duration) -> Self {
        self.read_time = read_time;
        self
    }

    pub fn failing_sink(mut self) -> Self {
        self.sink_failing = true;
        self
    }

    pub fn failing_agent(mut self) -> Self {
        self.agent_failing = true;
        self
    }

    pub fn build(&self) -> TestController {
        let debounce = Duration::from_millis(50);
        let line = |windows: &Vec<(Duration, Duration)>| ScheduledLine {
            clock: self.clock.clone(),
            windows: windows.clone(),
        };
        let sources = self
            .replies
            .iter()
            .map(|(screen, reply)| {
                Box::new(FakeSource {
                    screen: *screen,
                    reply: reply.clone(),
                    log: self.log.clone(),
                    clock: self.clock.clone(),
                    read_time: self.read_time,
                }) as Box<dyn MetricSource>
            })
            .collect();

        ScreenController::new(
            self.clock.clone(),
            DebouncedButton::new("navigate", line(&self.navigate), debounce),
            DebouncedButton::new("shutdown", line(&self.shutdown), debounce),
            SourceSet::new(sources).unwrap(),
            RecordingSink {
                log: self.log.clone(),
                failing: self.sink_failing,
            },
            RecordingAgent {
                log: self.log.clone(),
                failing: self.agent_failing,
            },
            Cadence::default(),
        )
    }
}

/// Step the controller until `until_ms` of fake time has passed or it stops.
pub fn run_until(controller: &mut TestController, clock: &FakeClock, until_ms: u64) {
    let until = Duration::from_millis(until_ms);
    while clock.elapsed() < until {
        if controller.step() == crate::controller::Phase::Stopped {
            break;
        }
    }
}

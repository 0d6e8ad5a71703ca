//! Metric sources and the bounded sampler that guards the loop cadence.
//!
//! A [`MetricSource`] produces one [`MetricSnapshot`] per call and keeps no
//! mutable state between calls. Host queries can hang (a stale NFS mount, a
//! stuck subprocess), so every source used by the controller is wrapped in a
//! [`Bounded`] sampler: the read runs on the tokio blocking pool and is
//! abandoned after a fixed budget, degrading to "unavailable" instead of
//! stalling the display.

use crate::config::ConfigError;
use crate::metrics::MetricSnapshot;
use crate::Screen;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Reasons a metric could not be read. All of them are recovered locally by
/// rendering a placeholder.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The metric does not exist on this host (no sensor, unknown mount)
    #[error("{0} unavailable")]
    Unavailable(String),

    /// The read did not finish within its budget
    #[error("read timed out after {0:?}")]
    Timeout(Duration),

    /// A file or subprocess operation failed
    #[error("io: {0}")]
    Io(#[from] io::Error),

    /// The OS returned something we could not interpret
    #[error("parse: {0}")]
    Parse(String),

    /// A previous read timed out and is still blocked in the OS
    #[error("previous read still in progress")]
    Stalled,

    /// The blocking task panicked or was cancelled
    #[error("sampler task failed: {0}")]
    Task(String),
}

/// Upper bound on a single metric read.
pub const SOURCE_TIMEOUT: Duration = Duration::from_secs(2);

/// One telemetry category.
pub trait MetricSource: Send + Sync {
    /// The screen this source feeds.
    fn screen(&self) -> Screen;

    fn sample(&self) -> Result<MetricSnapshot, SourceError>;

    /// Same as [`sample`](Self::sample), but calls `on_wait` roughly every
    /// `scan` while the read is still running so the caller can keep
    /// servicing its inputs. Synchronous sources never wait.
    fn sample_while(
        &self,
        scan: Duration,
        on_wait: &mut dyn FnMut(),
    ) -> Result<MetricSnapshot, SourceError> {
        let _ = (scan, on_wait);
        self.sample()
    }
}

type Read = JoinHandle<Result<MetricSnapshot, SourceError>>;

/// Runs an inner source on the tokio blocking pool under a timeout.
///
/// At most one read per source is ever outstanding: while a timed-out read
/// is still stuck in the OS, further samples fail fast with
/// [`SourceError::Stalled`] instead of piling up blocked threads.
pub struct Bounded {
    inner: Arc<dyn MetricSource>,
    handle: Handle,
    budget: Duration,
    stuck: Mutex<Option<Read>>,
}

impl Bounded {
    pub fn new<S>(inner: S, handle: Handle, budget: Duration) -> Self
    where
        S: MetricSource + 'static,
    {
        Self {
            inner: Arc::new(inner),
            handle,
            budget,
            stuck: Mutex::new(None),
        }
    }

    /// True while an abandoned read has not returned yet.
    pub fn is_stalled(&self) -> bool {
        self.stuck
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|read| !read.is_finished()))
            .unwrap_or(false)
    }
}

impl MetricSource for Bounded {
    fn screen(&self) -> Screen {
        self.inner.screen()
    }

    fn sample(&self) -> Result<MetricSnapshot, SourceError> {
        self.sample_while(self.budget, &mut || {})
    }

    fn sample_while(
        &self,
        scan: Duration,
        on_wait: &mut dyn FnMut(),
    ) -> Result<MetricSnapshot, SourceError> {
        let mut stuck = self
            .stuck
            .lock()
            .map_err(|_| SourceError::Task("sampler state poisoned".to_string()))?;
        if let Some(read) = stuck.take() {
            if !read.is_finished() {
                *stuck = Some(read);
                return Err(SourceError::Stalled);
            }
        }

        let inner = Arc::clone(&self.inner);
        let mut read = self.handle.spawn_blocking(move || inner.sample());
        let started = Instant::now();
        let scan = scan.max(Duration::from_millis(1));

        loop {
            let wait = scan.min(self.budget.saturating_sub(started.elapsed()));
            match self
                .handle
                .block_on(async { tokio::time::timeout(wait, &mut read).await })
            {
                Ok(Ok(result)) => return result,
                Ok(Err(join)) => return Err(SourceError::Task(join.to_string())),
                Err(_) if started.elapsed() >= self.budget => {
                    // The thread stays blocked until the OS call returns.
                    *stuck = Some(read);
                    return Err(SourceError::Timeout(self.budget));
                }
                Err(_) => on_wait(),
            }
        }
    }
}

/// Exactly one source per screen.
pub struct SourceSet {
    sources: HashMap<Screen, Box<dyn MetricSource>>,
}

impl std::fmt::Debug for SourceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut screens: Vec<_> = self.sources.keys().copied().collect();
        screens.sort_by_key(|s| s.index());
        f.debug_struct("SourceSet").field("screens", &screens).finish()
    }
}

impl SourceSet {
    /// Build the set, rejecting missing or duplicated screens.
    pub fn new(sources: Vec<Box<dyn MetricSource>>) -> Result<Self, ConfigError> {
        let mut map = HashMap::with_capacity(Screen::COUNT);
        for source in sources {
            let screen = source.screen();
            if map.insert(screen, source).is_some() {
                return Err(ConfigError::Invalid(format!(
                    "more than one metric source for the {screen} screen"
                )));
            }
        }
        if let Some(missing) = Screen::ALL.iter().find(|s| !map.contains_key(*s)) {
            return Err(ConfigError::Invalid(format!(
                "no metric source for the {missing} screen"
            )));
        }
        Ok(Self { sources: map })
    }

    pub fn sample(&self, screen: Screen) -> Result<MetricSnapshot, SourceError> {
        self.sample_while(screen, Duration::MAX, &mut || {})
    }

    /// Sample `screen`, calling `on_wait` every `scan` while the read runs.
    pub fn sample_while(
        &self,
        screen: Screen,
        scan: Duration,
        on_wait: &mut dyn FnMut(),
    ) -> Result<MetricSnapshot, SourceError> {
        match self.sources.get(&screen) {
            Some(source) => source.sample_while(scan, on_wait),
            None => Err(SourceError::Unavailable(screen.title().to_string())),
        }
    }
}

//! # Host Telemetry Adapters
//!
//! One [`MetricSource`] per screen, each a thin wrapper over an OS query:
//!
//! | Screen      | Backing query                                            |
//! |-------------|----------------------------------------------------------|
//! | Network     | sysinfo `Networks` + `iwgetid -r` for the WiFi SSID       |
//! | Storage     | sysinfo `Disks`, longest mount-point match                |
//! | SystemLoad  | sysinfo `System` CPU window + memory counters             |
//! | Temperature | sysfs thermal zone, sysinfo `Components` as a fallback    |
//! | Clock       | chrono local time                                        |
//!
//! The parsing and selection rules are plain functions so they can be tested
//! without the host they describe.

use crate::config::Config;
use crate::metrics::{
    ClockInfo, ConnectionKind, LoadInfo, MetricSnapshot, NetworkInfo, StorageInfo,
    TemperatureInfo,
};
use crate::sources::{Bounded, MetricSource, SourceError, SOURCE_TIMEOUT};
use crate::Screen;
use chrono::Local;
use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::process::Command;
use sysinfo::{Components, Disks, Networks, System};
use tokio::runtime::Handle;
use tracing::debug;

/// Build the five host sources, each behind the fixed read budget.
pub fn bounded_sources(config: &Config, handle: &Handle) -> Vec<Box<dyn MetricSource>> {
    let bound = |source: Box<dyn MetricSource>| -> Box<dyn MetricSource> {
        Box::new(Bounded::new(BoxedSource(source), handle.clone(), SOURCE_TIMEOUT))
    };
    host_sources(config).into_iter().map(bound).collect()
}

/// The five host sources without a timeout guard.
pub fn host_sources(config: &Config) -> Vec<Box<dyn MetricSource>> {
    vec![
        Box::new(NetworkSource),
        Box::new(StorageSource::new(&config.storage.mount_path)),
        Box::new(SystemLoadSource),
        Box::new(TemperatureSource::new(&config.temperature.sysfs_path)),
        Box::new(ClockSource),
    ]
}

struct BoxedSource(Box<dyn MetricSource>);

impl MetricSource for BoxedSource {
    fn screen(&self) -> Screen {
        self.0.screen()
    }

    fn sample(&self) -> Result<MetricSnapshot, SourceError> {
        self.0.sample()
    }
}

// ---- Network ---------------------------------------------------------------

/// Interface families, in selection priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum InterfaceKind {
    Wired,
    Wireless,
    Other,
    Loopback,
}

impl InterfaceKind {
    fn connection(self) -> ConnectionKind {
        match self {
            InterfaceKind::Wired => ConnectionKind::Ethernet,
            InterfaceKind::Wireless => ConnectionKind::Wifi,
            InterfaceKind::Other | InterfaceKind::Loopback => ConnectionKind::Connected,
        }
    }
}

/// Classify an interface by its kernel name.
pub fn classify_interface(name: &str) -> InterfaceKind {
    if name == "lo" {
        InterfaceKind::Loopback
    } else if name.starts_with("eth") || name.starts_with("en") {
        InterfaceKind::Wired
    } else if name.starts_with("wlan") || name.starts_with("wl") {
        InterfaceKind::Wireless
    } else {
        InterfaceKind::Other
    }
}

/// Pick the address to show: wired before wireless before anything else,
/// alphabetical within a family, loopback never.
pub fn select_address<I>(candidates: I) -> Option<(ConnectionKind, Ipv4Addr)>
where
    I: IntoIterator<Item = (String, Ipv4Addr)>,
{
    candidates
        .into_iter()
        .map(|(name, addr)| (classify_interface(&name), name, addr))
        .filter(|(kind, _, addr)| *kind != InterfaceKind::Loopback && !addr.is_loopback())
        .min_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)))
        .map(|(kind, _, addr)| (kind.connection(), addr))
}

pub struct NetworkSource;

impl NetworkSource {
    fn current_ssid() -> Option<String> {
        let output = match Command::new("iwgetid").arg("-r").output() {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                debug!(status = %output.status, "iwgetid reported no SSID");
                return None;
            }
            Err(e) => {
                debug!(error = %e, "iwgetid not available");
                return None;
            }
        };
        let ssid = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!ssid.is_empty()).then_some(ssid)
    }
}

impl MetricSource for NetworkSource {
    fn screen(&self) -> Screen {
        Screen::Network
    }

    fn sample(&self) -> Result<MetricSnapshot, SourceError> {
        let networks = Networks::new_with_refreshed_list();
        let candidates = networks.list().iter().flat_map(|(name, data)| {
            data.ip_networks().iter().filter_map(move |net| match net.addr {
                IpAddr::V4(addr) => Some((name.clone(), addr)),
                IpAddr::V6(_) => None,
            })
        });

        let info = match select_address(candidates) {
            Some((connection, addr)) => NetworkInfo {
                connection: Some(connection),
                ssid: if connection == ConnectionKind::Wifi {
                    Self::current_ssid()
                } else {
                    None
                },
                ipv4: Some(addr),
            },
            None => NetworkInfo {
                connection: Some(ConnectionKind::Disconnected),
                ssid: None,
                ipv4: None,
            },
        };
        Ok(MetricSnapshot::Network(info))
    }
}

// ---- Storage ---------------------------------------------------------------

/// Capacity of one mounted filesystem.
#[derive(Clone, Debug, PartialEq)]
pub struct MountUsage {
    pub mount_point: PathBuf,
    pub total_bytes: u64,
    pub available_bytes: u64,
}

/// Find the filesystem holding `path`: the longest mount point that prefixes it.
pub fn usage_for<'a>(path: &Path, mounts: &'a [MountUsage]) -> Option<&'a MountUsage> {
    mounts
        .iter()
        .filter(|m| path.starts_with(&m.mount_point))
        .max_by_key(|m| m.mount_point.components().count())
}

/// Share of the filesystem that is not available to us, in percent.
pub fn used_percent(total_bytes: u64, available_bytes: u64) -> Option<f32> {
    if total_bytes == 0 {
        return None;
    }
    let used = total_bytes.saturating_sub(available_bytes);
    Some((used as f64 / total_bytes as f64 * 100.0) as f32)
}

pub struct StorageSource {
    mount_path: PathBuf,
}

impl StorageSource {
    pub fn new(mount_path: &Path) -> Self {
        Self {
            mount_path: mount_path.to_path_buf(),
        }
    }
}

impl MetricSource for StorageSource {
    fn screen(&self) -> Screen {
        Screen::Storage
    }

    fn sample(&self) -> Result<MetricSnapshot, SourceError> {
        let disks = Disks::new_with_refreshed_list();
        let mounts: Vec<MountUsage> = disks
            .list()
            .iter()
            .map(|disk| MountUsage {
                mount_point: disk.mount_point().to_path_buf(),
                total_bytes: disk.total_space(),
                available_bytes: disk.available_space(),
            })
            .collect();

        let usage = usage_for(&self.mount_path, &mounts).ok_or_else(|| {
            SourceError::Unavailable(format!("filesystem at {}", self.mount_path.display()))
        })?;

        Ok(MetricSnapshot::Storage(StorageInfo {
            free_bytes: Some(usage.available_bytes),
            used_percent: used_percent(usage.total_bytes, usage.available_bytes),
        }))
    }
}

// ---- CPU / memory ----------------------------------------------------------

pub struct SystemLoadSource;

impl MetricSource for SystemLoadSource {
    fn screen(&self) -> Screen {
        Screen::SystemLoad
    }

    fn sample(&self) -> Result<MetricSnapshot, SourceError> {
        // CPU usage is a delta, so measure over one short window per call.
        let mut system = System::new();
        system.refresh_cpu_usage();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        system.refresh_cpu_usage();
        system.refresh_memory();

        let cpu = system.global_cpu_usage();
        let total = system.total_memory();
        let used = system.used_memory();

        Ok(MetricSnapshot::SystemLoad(LoadInfo {
            cpu_percent: (!system.cpus().is_empty()).then_some(cpu),
            ram_used_mb: (total > 0).then(|| used / (1024 * 1024)),
            ram_percent: (total > 0).then(|| (used as f64 / total as f64 * 100.0) as f32),
        }))
    }
}

// ---- Temperature -----------------------------------------------------------

/// Parse a sysfs thermal reading (millidegrees Celsius).
pub fn parse_millidegrees(raw: &str) -> Result<f32, SourceError> {
    let trimmed = raw.trim();
    trimmed
        .parse::<i64>()
        .map(|milli| milli as f32 / 1000.0)
        .map_err(|e| SourceError::Parse(format!("thermal reading {trimmed:?}: {e}")))
}

pub struct TemperatureSource {
    sysfs_path: PathBuf,
}

impl TemperatureSource {
    pub fn new(sysfs_path: &Path) -> Self {
        Self {
            sysfs_path: sysfs_path.to_path_buf(),
        }
    }

    fn hottest_component() -> Option<f32> {
        Components::new_with_refreshed_list()
            .list()
            .iter()
            .filter_map(|c| c.temperature())
            .filter(|t| t.is_finite())
            .reduce(f32::max)
    }
}

impl MetricSource for TemperatureSource {
    fn screen(&self) -> Screen {
        Screen::Temperature
    }

    fn sample(&self) -> Result<MetricSnapshot, SourceError> {
        let celsius = match fs::read_to_string(&self.sysfs_path) {
            Ok(raw) => parse_millidegrees(&raw)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.sysfs_path.display(), "thermal zone missing, trying hwmon");
                Self::hottest_component()
                    .ok_or_else(|| SourceError::Unavailable("CPU temperature".to_string()))?
            }
            Err(e) => return Err(e.into()),
        };
        Ok(MetricSnapshot::Temperature(TemperatureInfo {
            celsius: Some(celsius),
        }))
    }
}

// ---- Clock -----------------------------------------------------------------

pub struct ClockSource;

impl MetricSource for ClockSource {
    fn screen(&self) -> Screen {
        Screen::Clock
    }

    fn sample(&self) -> Result<MetricSnapshot, SourceError> {
        Ok(MetricSnapshot::Clock(ClockInfo {
            local: Some(Local::now().naive_local()),
        }))
    }
}

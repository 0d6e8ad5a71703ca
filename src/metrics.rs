//! Metric snapshots produced by the host adapters.
//!
//! Every field is an `Option`: `None` means "could not be read" and is rendered
//! as a placeholder, never as an empty or garbage value.

use crate::Screen;
use chrono::NaiveDateTime;
use std::net::Ipv4Addr;

/// How the board is attached to the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionKind {
    Ethernet,
    Wifi,
    /// An address is assigned but the interface kind is not recognised
    Connected,
    Disconnected,
}

impl ConnectionKind {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionKind::Ethernet => "Ethernet",
            ConnectionKind::Wifi => "WiFi",
            ConnectionKind::Connected => "Connected",
            ConnectionKind::Disconnected => "Disconnected",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NetworkInfo {
    pub connection: Option<ConnectionKind>,
    /// Only meaningful for [`ConnectionKind::Wifi`]
    pub ssid: Option<String>,
    pub ipv4: Option<Ipv4Addr>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StorageInfo {
    pub free_bytes: Option<u64>,
    pub used_percent: Option<f32>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadInfo {
    pub cpu_percent: Option<f32>,
    pub ram_used_mb: Option<u64>,
    pub ram_percent: Option<f32>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TemperatureInfo {
    pub celsius: Option<f32>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClockInfo {
    pub local: Option<NaiveDateTime>,
}

/// One reading for one screen.
#[derive(Clone, Debug, PartialEq)]
pub enum MetricSnapshot {
    Network(NetworkInfo),
    Storage(StorageInfo),
    SystemLoad(LoadInfo),
    Temperature(TemperatureInfo),
    Clock(ClockInfo),
}

impl MetricSnapshot {
    /// The screen this reading belongs to.
    pub fn screen(&self) -> Screen {
        match self {
            MetricSnapshot::Network(_) => Screen::Network,
            MetricSnapshot::Storage(_) => Screen::Storage,
            MetricSnapshot::SystemLoad(_) => Screen::SystemLoad,
            MetricSnapshot::Temperature(_) => Screen::Temperature,
            MetricSnapshot::Clock(_) => Screen::Clock,
        }
    }

    /// A reading with every field unavailable, used when a source fails outright.
    pub fn unavailable(screen: Screen) -> Self {
        match screen {
            Screen::Network => MetricSnapshot::Network(NetworkInfo::default()),
            Screen::Storage => MetricSnapshot::Storage(StorageInfo::default()),
            Screen::SystemLoad => MetricSnapshot::SystemLoad(LoadInfo::default()),
            Screen::Temperature => MetricSnapshot::Temperature(TemperatureInfo::default()),
            Screen::Clock => MetricSnapshot::Clock(ClockInfo::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_snapshot_matches_screen() {
        for screen in Screen::ALL {
            assert_eq!(MetricSnapshot::unavailable(screen).screen(), screen);
        }
    }

    #[test]
    fn unavailable_network_has_no_fields() {
        let MetricSnapshot::Network(info) = MetricSnapshot::unavailable(Screen::Network) else {
            panic!("expected network snapshot");
        };
        assert!(info.connection.is_none());
        assert!(info.ssid.is_none());
        assert!(info.ipv4.is_none());
    }
}

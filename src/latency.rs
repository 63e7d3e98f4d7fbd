//! Latency unit handling for metric points

use crate::errors::{MonitorError, Result};

/// Unit a latency metric is reported in. Probe timings are measured in
/// seconds and converted on push.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LatencyUnit {
    Milliseconds,
    #[default]
    Seconds,
    Minutes,
    Hours,
}

impl LatencyUnit {
    /// Parses a unit name, accepting both the short and the long form.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "ms" | "milliseconds" => Ok(LatencyUnit::Milliseconds),
            "s" | "seconds" => Ok(LatencyUnit::Seconds),
            "m" | "minutes" => Ok(LatencyUnit::Minutes),
            "h" | "hours" => Ok(LatencyUnit::Hours),
            other => Err(MonitorError::Config(format!("Invalid latency unit: {}", other))),
        }
    }

    /// Conversion factor relative to seconds.
    pub fn factor(self) -> f64 {
        match self {
            LatencyUnit::Milliseconds => 1000.0,
            LatencyUnit::Seconds => 1.0,
            LatencyUnit::Minutes => 1.0 / 60.0,
            LatencyUnit::Hours => 1.0 / 3600.0,
        }
    }

    /// Converts a value measured in seconds into this unit.
    pub fn from_seconds(self, seconds: f64) -> f64 {
        seconds * self.factor()
    }
}

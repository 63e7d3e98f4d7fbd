//! URL result expectations
//!
//! Each expectation inspects one probe response and yields a component
//! status. New expectation kinds are registered in
//! `ExpectationFactory::create`.

use crate::config::ExpectationConfig;
use crate::errors::{MonitorError, Result};
use crate::status::ComponentStatus;
use regex::{Regex, RegexBuilder};
use std::time::Duration;

/// A captured HTTP probe response, as seen by expectations.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status_code: u16,
    pub elapsed: Duration,
    pub body: String,
}

/// Trait for declarative checks against a probe response. Status follows
/// Cachet's component status documentation: the worst verdict across all
/// expectations wins.
pub trait Expectation: Send + Sync {
    /// The component status this response maps to.
    fn status(&self, response: &ProbeResponse) -> ComponentStatus;

    /// The error message reported when this expectation fails.
    fn message(&self, response: &ProbeResponse) -> String;

    /// One-line description for the startup log.
    fn describe(&self) -> String;
}

/// Builds expectations from their configuration entries.
pub struct ExpectationFactory;

impl ExpectationFactory {
    /// Create an expectation from its config entry. Unknown `type` tags are
    /// a configuration error.
    pub fn create(config: &ExpectationConfig) -> Result<Box<dyn Expectation>> {
        match config.kind.as_str() {
            "HTTP_STATUS" => Ok(Box::new(HttpStatus::new(config)?)),
            "LATENCY" => Ok(Box::new(Latency::new(config)?)),
            "REGEX" => Ok(Box::new(BodyRegex::new(config)?)),
            other => Err(MonitorError::Config(format!("Invalid expectation type: {}", other))),
        }
    }
}

/// The configured `incident` severity flag overrides the variant default.
fn resolve_incident_status(
    config: &ExpectationConfig,
    default: ComponentStatus,
) -> ComponentStatus {
    config
        .incident
        .as_deref()
        .and_then(ComponentStatus::from_incident_flag)
        .unwrap_or(default)
}

/// Expects the HTTP status code to fall inside a configured range.
pub struct HttpStatus {
    range: (u16, u16),
    incident_status: ComponentStatus,
}

impl HttpStatus {
    pub fn new(config: &ExpectationConfig) -> Result<Self> {
        let range_value = config.status_range.as_ref().ok_or_else(|| {
            MonitorError::Config("HTTP_STATUS expectation is missing status_range".to_string())
        })?;

        Ok(Self {
            range: parse_range(range_value)?,
            incident_status: resolve_incident_status(config, ComponentStatus::PartialOutage),
        })
    }
}

/// Parses a status range from either a bare integer (a single status) or a
/// "lo-hi" string. The result is inclusive-lower, exclusive-upper.
fn parse_range(value: &serde_yaml::Value) -> Result<(u16, u16)> {
    let invalid = || MonitorError::Config(format!("Invalid status range: {:?}", value));

    match value {
        serde_yaml::Value::Number(number) => {
            let code = number.as_u64().and_then(|n| u16::try_from(n).ok()).ok_or_else(invalid)?;
            Ok((code, code + 1))
        }
        serde_yaml::Value::String(range) => {
            let parts: Vec<&str> = range.split('-').collect();
            match parts.as_slice() {
                [single] => {
                    let code: u16 = single.trim().parse().map_err(|_| invalid())?;
                    Ok((code, code + 1))
                }
                [lower, upper, ..] => {
                    let lower: u16 = lower.trim().parse().map_err(|_| invalid())?;
                    let upper: u16 = upper.trim().parse().map_err(|_| invalid())?;
                    Ok((lower, upper))
                }
                [] => Err(invalid()),
            }
        }
        _ => Err(invalid()),
    }
}

impl Expectation for HttpStatus {
    fn status(&self, response: &ProbeResponse) -> ComponentStatus {
        if self.range.0 <= response.status_code && response.status_code < self.range.1 {
            ComponentStatus::Operational
        } else {
            self.incident_status
        }
    }

    fn message(&self, response: &ProbeResponse) -> String {
        format!("Unexpected HTTP status ({})", response.status_code)
    }

    fn describe(&self) -> String {
        format!("HTTP status range: [{}, {}[", self.range.0, self.range.1)
    }
}

/// Expects the probe to respond within a latency threshold, in seconds.
pub struct Latency {
    threshold: f64,
    incident_status: ComponentStatus,
}

impl Latency {
    pub fn new(config: &ExpectationConfig) -> Result<Self> {
        let threshold = config.threshold.ok_or_else(|| {
            MonitorError::Config("LATENCY expectation is missing threshold".to_string())
        })?;

        Ok(Self {
            threshold,
            incident_status: resolve_incident_status(config, ComponentStatus::PerformanceIssues),
        })
    }
}

impl Expectation for Latency {
    fn status(&self, response: &ProbeResponse) -> ComponentStatus {
        if response.elapsed.as_secs_f64() <= self.threshold {
            ComponentStatus::Operational
        } else {
            self.incident_status
        }
    }

    fn message(&self, response: &ProbeResponse) -> String {
        format!("Latency above threshold: {:.4} seconds", response.elapsed.as_secs_f64())
    }

    fn describe(&self) -> String {
        format!("Latency threshold: {:.4} seconds", self.threshold)
    }
}

/// Expects the response body to match a regex from its first byte. The
/// pattern is Unicode-aware and `.` matches newlines.
pub struct BodyRegex {
    pattern: String,
    regex: Regex,
    incident_status: ComponentStatus,
}

impl BodyRegex {
    pub fn new(config: &ExpectationConfig) -> Result<Self> {
        let pattern = config.regex.clone().ok_or_else(|| {
            MonitorError::Config("REGEX expectation is missing regex".to_string())
        })?;

        // Anchored at the start of the body, like a leftmost match that
        // must begin at offset zero.
        let regex = RegexBuilder::new(&format!("^(?:{})", pattern))
            .dot_matches_new_line(true)
            .build()
            .map_err(|err| MonitorError::Config(format!("Invalid regex [{}]: {}", pattern, err)))?;

        Ok(Self {
            pattern,
            regex,
            incident_status: resolve_incident_status(config, ComponentStatus::PartialOutage),
        })
    }
}

impl Expectation for BodyRegex {
    fn status(&self, response: &ProbeResponse) -> ComponentStatus {
        if self.regex.is_match(&response.body) {
            ComponentStatus::Operational
        } else {
            self.incident_status
        }
    }

    fn message(&self, _response: &ProbeResponse) -> String {
        "Regex did not match anything in the body".to_string()
    }

    fn describe(&self) -> String {
        format!("Regex: {}", self.pattern)
    }
}

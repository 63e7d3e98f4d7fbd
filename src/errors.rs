//! Error types for the monitor agent

use std::fmt;

pub type Result<T> = std::result::Result<T, MonitorError>;

#[derive(Debug)]
pub enum MonitorError {
    /// IO operation failed
    Io(std::io::Error),

    /// HTTP request failed
    Http(reqwest::Error),

    /// Config document could not be parsed
    Yaml(serde_yaml::Error),

    /// Configuration error
    Config(String),

    /// The component does not exist on the Cachet server
    ComponentNonexistent(u32),

    /// The metric does not exist on the Cachet server
    MetricNonexistent(u32),

    /// Unknown token provider type in the configuration
    InvalidTokenProvider(String),

    /// No token provider yielded a token
    TokenNotFound,

    /// Cachet API rejected a request
    Api(String),
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::Io(err) => write!(f, "IO error: {}", err),
            MonitorError::Http(err) => write!(f, "HTTP error: {}", err),
            MonitorError::Yaml(err) => write!(f, "YAML error: {}", err),
            MonitorError::Config(msg) => write!(f, "Configuration error: {}", msg),
            MonitorError::ComponentNonexistent(id) => {
                write!(f, "Component with id [{}] does not exist", id)
            }
            MonitorError::MetricNonexistent(id) => {
                write!(f, "Metric with id [{}] does not exist", id)
            }
            MonitorError::InvalidTokenProvider(name) => {
                write!(f, "Invalid token provider type: {}", name)
            }
            MonitorError::TokenNotFound => write!(f, "Token could not be found"),
            MonitorError::Api(msg) => write!(f, "API error: {}", msg),
        }
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MonitorError::Io(err) => Some(err),
            MonitorError::Http(err) => Some(err),
            MonitorError::Yaml(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MonitorError {
    fn from(err: std::io::Error) -> Self {
        MonitorError::Io(err)
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        MonitorError::Http(err)
    }
}

impl From<serde_yaml::Error> for MonitorError {
    fn from(err: serde_yaml::Error) -> Self {
        MonitorError::Yaml(err)
    }
}

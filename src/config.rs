//! Configuration loading for the monitor agent
//!
//! The config document is YAML: one `cachet` section with the API
//! coordinates, a list of monitored `endpoints`, and optional `webhooks`
//! and incident `messages` overrides.

use crate::errors::{MonitorError, Result};
use crate::status::ComponentStatus;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub cachet: CachetSettings,
    pub endpoints: Vec<EndpointConfig>,

    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,

    #[serde(default)]
    pub messages: IncidentTitles,
}

/// Coordinates and credential for the Cachet server.
#[derive(Debug, Clone, Deserialize)]
pub struct CachetSettings {
    pub api_url: String,
    pub token: TokenConfig,

    /// Default latency unit for metric points, overridable per endpoint.
    pub latency_unit: Option<String>,
}

/// The token entry is either a plain string or a provider chain.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TokenConfig {
    Literal(String),
    Providers(Vec<TokenProviderConfig>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenProviderConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// One monitored endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    pub url: String,
    pub method: String,

    /// Probe timeout in seconds. Fractional values are allowed.
    pub timeout: f64,

    /// Additional headers sent with every probe.
    #[serde(default)]
    pub header: HashMap<String, String>,

    pub expectation: Vec<ExpectationConfig>,

    /// Consecutive failures tolerated before reporting a change.
    #[serde(default)]
    pub allowed_fails: u32,

    pub component_id: u32,
    pub metric_id: Option<u32>,
    pub latency_unit: Option<String>,

    #[serde(default)]
    pub public_incidents: bool,

    #[serde(default)]
    pub action: Vec<Action>,

    /// Seconds between evaluation cycles.
    pub frequency: u64,
}

/// Reconciliation behaviors an endpoint opts into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Action {
    #[serde(rename = "CREATE_INCIDENT")]
    CreateIncident,
    #[serde(rename = "UPDATE_STATUS")]
    UpdateStatus,
    #[serde(rename = "PUSH_METRICS")]
    PushMetrics,
}

/// Raw expectation entry; `ExpectationFactory` turns it into a checker.
#[derive(Debug, Clone, Deserialize)]
pub struct ExpectationConfig {
    #[serde(rename = "type")]
    pub kind: String,

    /// HTTP_STATUS: bare integer or "lo-hi" string.
    pub status_range: Option<serde_yaml::Value>,

    /// LATENCY: threshold in seconds.
    pub threshold: Option<f64>,

    /// REGEX: pattern matched against the response body.
    pub regex: Option<String>,

    /// Severity flag (PARTIAL, MAJOR or PERFORMANCE) overriding the
    /// variant's default incident status.
    pub incident: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    pub url: String,

    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Incident title templates by severity, with `{name}` interpolation.
#[derive(Debug, Clone, Deserialize)]
pub struct IncidentTitles {
    #[serde(default = "default_outage_title")]
    pub outage: String,

    #[serde(default = "default_performance_title")]
    pub performance: String,

    #[serde(default = "default_operational_title")]
    pub operational: String,
}

fn default_outage_title() -> String {
    "{name} is unavailable".to_string()
}

fn default_performance_title() -> String {
    "{name} has degraded performance".to_string()
}

fn default_operational_title() -> String {
    "{name} is operational".to_string()
}

impl Default for IncidentTitles {
    fn default() -> Self {
        Self {
            outage: default_outage_title(),
            performance: default_performance_title(),
            operational: default_operational_title(),
        }
    }
}

impl IncidentTitles {
    /// The incident title for the given component status and endpoint name.
    pub fn title_for(&self, status: ComponentStatus, name: &str) -> String {
        let template = match status {
            ComponentStatus::Operational => &self.operational,
            ComponentStatus::PerformanceIssues => &self.performance,
            _ => &self.outage,
        };
        template.replace("{name}", name)
    }
}

impl Config {
    /// Load and validate a config document from a YAML file, applying
    /// environment variable overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables take precedence over the config file, so the
    /// same document works across deployments.
    fn apply_env_overrides(&mut self) {
        if let Ok(api_url) = env::var("CACHET_API_URL") {
            if !api_url.is_empty() {
                self.cachet.api_url = api_url;
            }
        }
    }

    /// Validate the invariants the document shape alone cannot express.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.cachet.api_url.is_empty() {
            errors.push("cachet.api_url".to_string());
        }

        if self.endpoints.is_empty() {
            errors.push("endpoints".to_string());
        }

        for (index, endpoint) in self.endpoints.iter().enumerate() {
            if endpoint.name.is_empty() {
                errors.push(format!("endpoints[{}].name", index));
            }
            if endpoint.url.is_empty() {
                errors.push(format!("endpoints[{}].url", index));
            }
            if endpoint.expectation.is_empty() {
                errors.push(format!("endpoints[{}].expectation", index));
            }
            if endpoint.frequency == 0 {
                errors.push(format!("endpoints[{}].frequency", index));
            }
            if endpoint.timeout <= 0.0 {
                errors.push(format!("endpoints[{}].timeout", index));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(MonitorError::Config(format!(
                "Config failed validation. Missing or invalid keys: {}",
                errors.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // Config::load reads CACHET_API_URL, so tests touching the environment
    // must not interleave with other loads.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const SAMPLE_CONFIG: &str = r#"
cachet:
  api_url: https://demo.cachethq.io/api/v1
  token: my_token
endpoints:
  - name: swagger
    url: http://localhost:8080/swagger
    method: GET
    timeout: 0.010
    expectation:
      - type: HTTP_STATUS
        status_range: 200-300
    allowed_fails: 0
    component_id: 1
    metric_id: 2
    public_incidents: true
    action:
      - UPDATE_STATUS
      - CREATE_INCIDENT
      - PUSH_METRICS
    frequency: 30
webhooks:
  - url: "https://push.example.com/message?token=<apptoken>"
    params:
      title: "{title}"
      message: "{message}"
messages:
  outage: "{name} is down"
"#;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_sample_config() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let file = write_config(SAMPLE_CONFIG);
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.cachet.api_url, "https://demo.cachethq.io/api/v1");
        assert_eq!(config.endpoints.len(), 1);

        let endpoint = &config.endpoints[0];
        assert_eq!(endpoint.name, "swagger");
        assert_eq!(endpoint.method, "GET");
        assert_eq!(endpoint.timeout, 0.010);
        assert_eq!(endpoint.component_id, 1);
        assert_eq!(endpoint.metric_id, Some(2));
        assert_eq!(endpoint.allowed_fails, 0);
        assert!(endpoint.public_incidents);
        assert_eq!(
            endpoint.action,
            vec![Action::UpdateStatus, Action::CreateIncident, Action::PushMetrics]
        );
        assert_eq!(endpoint.frequency, 30);

        assert_eq!(config.webhooks.len(), 1);
        assert_eq!(config.webhooks[0].params["title"], "{title}");
    }

    #[test]
    fn test_messages_override_keeps_other_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let file = write_config(SAMPLE_CONFIG);
        let config = Config::load(file.path()).unwrap();

        assert_eq!(
            config.messages.title_for(ComponentStatus::PartialOutage, "swagger"),
            "swagger is down"
        );
        assert_eq!(
            config.messages.title_for(ComponentStatus::PerformanceIssues, "swagger"),
            "swagger has degraded performance"
        );
        assert_eq!(
            config.messages.title_for(ComponentStatus::Operational, "swagger"),
            "swagger is operational"
        );
    }

    #[test]
    fn test_default_titles() {
        let titles = IncidentTitles::default();
        assert_eq!(
            titles.title_for(ComponentStatus::MajorOutage, "api"),
            "api is unavailable"
        );
    }

    #[test]
    fn test_token_provider_chain_config() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let contents = r#"
cachet:
  api_url: https://demo.cachethq.io/api/v1
  token:
    - type: ENVIRONMENT_VARIABLE
      value: CACHET_TOKEN
    - type: TOKEN
      value: my_token
endpoints:
  - name: swagger
    url: http://localhost:8080/swagger
    method: GET
    timeout: 1
    expectation:
      - type: HTTP_STATUS
        status_range: 200-300
    component_id: 1
    frequency: 30
"#;
        let file = write_config(contents);
        let config = Config::load(file.path()).unwrap();

        match &config.cachet.token {
            TokenConfig::Providers(providers) => {
                assert_eq!(providers.len(), 2);
                assert_eq!(providers[0].kind, "ENVIRONMENT_VARIABLE");
                assert_eq!(providers[1].value, "my_token");
            }
            TokenConfig::Literal(_) => panic!("expected a provider chain"),
        }
    }

    #[test]
    fn test_missing_mandatory_field_fails() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        // No url on the endpoint.
        let contents = r#"
cachet:
  api_url: https://demo.cachethq.io/api/v1
  token: my_token
endpoints:
  - name: swagger
    method: GET
    timeout: 1
    expectation:
      - type: HTTP_STATUS
        status_range: 200-300
    component_id: 1
    frequency: 30
"#;
        let file = write_config(contents);
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_empty_expectation_list_fails() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let contents = r#"
cachet:
  api_url: https://demo.cachethq.io/api/v1
  token: my_token
endpoints:
  - name: swagger
    url: http://localhost:8080/swagger
    method: GET
    timeout: 1
    expectation: []
    component_id: 1
    frequency: 30
"#;
        let file = write_config(contents);
        let error = Config::load(file.path()).unwrap_err();
        assert!(error.to_string().contains("endpoints[0].expectation"));
    }

    #[test]
    fn test_unknown_action_fails() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let contents = r#"
cachet:
  api_url: https://demo.cachethq.io/api/v1
  token: my_token
endpoints:
  - name: swagger
    url: http://localhost:8080/swagger
    method: GET
    timeout: 1
    expectation:
      - type: HTTP_STATUS
        status_range: 200-300
    component_id: 1
    action:
      - DELETE_EVERYTHING
    frequency: 30
"#;
        let file = write_config(contents);
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_api_url_env_override() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        unsafe { env::set_var("CACHET_API_URL", "https://override.example.com/api/v1") };
        let file = write_config(SAMPLE_CONFIG);
        let config = Config::load(file.path()).unwrap();
        unsafe { env::remove_var("CACHET_API_URL") };

        assert_eq!(config.cachet.api_url, "https://override.example.com/api/v1");
    }
}

//! Per-endpoint monitoring: probe, expectation evaluation, debounce and
//! reconciliation against the Cachet server

use crate::client::CachetClient;
use crate::config::{Action, Config, EndpointConfig, IncidentTitles};
use crate::errors::{MonitorError, Result};
use crate::expectation::{Expectation, ExpectationFactory, ProbeResponse};
use crate::latency::LatencyUnit;
use crate::status::ComponentStatus;
use crate::webhook::Webhook;

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Result of one probe request. The three failure classes map directly to
/// a status and message without consulting expectations.
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    Response(ProbeResponse),
    Unreachable,
    HttpError,
    TimedOut,
}

/// Monitors one endpoint and reconciles its health against the Cachet
/// server. Owns all per-endpoint runtime state; monitors never share
/// anything beyond the Cachet client.
pub struct EndpointMonitor {
    name: String,
    url: String,
    method: Method,
    timeout: Duration,
    headers: HeaderMap,
    expectations: Vec<Box<dyn Expectation>>,
    actions: Vec<Action>,
    allowed_fails: u32,
    component_id: u32,
    metric_id: Option<u32>,
    public_incidents: bool,
    latency_unit: LatencyUnit,
    frequency: Duration,
    titles: IncidentTitles,
    default_metric_value: f64,
    client: Arc<CachetClient>,
    probe_client: reqwest::Client,
    webhooks: Vec<Webhook>,

    // Runtime state, mutated every cycle.
    current_status: ComponentStatus,
    previous_status: ComponentStatus,
    current_message: String,
    current_fails: u32,
    trigger_update: bool,
    incident_id: Option<u64>,
    last_probe: Option<ProbeOutcome>,
}

impl EndpointMonitor {
    /// Build a monitor from its endpoint config. Fetches the metric's
    /// default value up front when a metric id is configured; a failure
    /// there aborts this endpoint's startup.
    pub async fn new(
        endpoint: &EndpointConfig,
        config: &Config,
        client: Arc<CachetClient>,
        probe_client: reqwest::Client,
    ) -> Result<Self> {
        let method = Method::from_bytes(endpoint.method.to_uppercase().as_bytes())
            .map_err(|_| MonitorError::Config(format!("Invalid HTTP method: {}", endpoint.method)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &endpoint.header {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| MonitorError::Config(format!("Invalid header name: {}", name)))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| MonitorError::Config(format!("Invalid value for header {}", name)))?;
            headers.insert(header_name, header_value);
        }

        let mut expectations = Vec::new();
        for entry in &endpoint.expectation {
            let expectation = ExpectationFactory::create(entry)?;
            info!("[{}] Registered expectation: {}", endpoint.name, expectation.describe());
            expectations.push(expectation);
        }

        let unit_name = endpoint.latency_unit.as_deref().or(config.cachet.latency_unit.as_deref());
        let latency_unit = match unit_name {
            Some(name) => LatencyUnit::parse(name)?,
            None => LatencyUnit::default(),
        };

        // Queried once; pushed in place of the latency whenever a probe
        // fails, so failed cycles don't record a misleading zero.
        let default_metric_value = match endpoint.metric_id {
            Some(metric_id) => client.get_default_metric_value(metric_id).await?,
            None => 0.0,
        };

        let webhooks = config
            .webhooks
            .iter()
            .map(|webhook| Webhook::new(webhook, probe_client.clone()))
            .collect();

        Ok(Self {
            name: endpoint.name.clone(),
            url: endpoint.url.clone(),
            method,
            timeout: Duration::from_secs_f64(endpoint.timeout),
            headers,
            expectations,
            actions: endpoint.action.clone(),
            allowed_fails: endpoint.allowed_fails,
            component_id: endpoint.component_id,
            metric_id: endpoint.metric_id,
            public_incidents: endpoint.public_incidents,
            latency_unit,
            frequency: Duration::from_secs(endpoint.frequency),
            titles: config.messages.clone(),
            default_metric_value,
            client,
            probe_client,
            webhooks,
            current_status: ComponentStatus::Unknown,
            previous_status: ComponentStatus::Unknown,
            current_message: String::new(),
            current_fails: 0,
            trigger_update: false,
            incident_id: None,
            last_probe: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Seconds between evaluation cycles.
    pub fn frequency(&self) -> Duration {
        self.frequency
    }

    /// One full evaluation-and-reconciliation cycle. Never propagates an
    /// error; everything recoverable is logged and retried on a later
    /// cycle.
    pub async fn run_cycle(&mut self) {
        self.evaluate().await;
        self.update_trigger();

        // Metrics go first and are not gated by the debounce.
        if self.actions.contains(&Action::PushMetrics) {
            self.push_metrics().await;
        }
        if self.actions.contains(&Action::UpdateStatus) {
            self.push_status().await;
        }
        if self.actions.contains(&Action::CreateIncident) {
            self.push_incident().await;
        }
    }

    /// Probe the endpoint and fold the expectation verdicts into the
    /// current status.
    async fn evaluate(&mut self) {
        let outcome = self.probe().await;
        self.apply_outcome(outcome);
    }

    async fn probe(&self) -> ProbeOutcome {
        let start = Instant::now();
        let request = self
            .probe_client
            .request(self.method.clone(), &self.url)
            .timeout(self.timeout)
            .headers(self.headers.clone());

        match request.send().await {
            Ok(response) => {
                // Elapsed time covers up to the response head, like the
                // latency a client would perceive.
                let elapsed = start.elapsed();
                let status_code = response.status().as_u16();
                match response.text().await {
                    Ok(body) => {
                        ProbeOutcome::Response(ProbeResponse { status_code, elapsed, body })
                    }
                    Err(err) if err.is_timeout() => ProbeOutcome::TimedOut,
                    Err(_) => ProbeOutcome::HttpError,
                }
            }
            Err(err) if err.is_timeout() => ProbeOutcome::TimedOut,
            Err(err) if err.is_connect() => ProbeOutcome::Unreachable,
            Err(_) => ProbeOutcome::HttpError,
        }
    }

    fn apply_outcome(&mut self, outcome: ProbeOutcome) {
        let (status, message) = match &outcome {
            ProbeOutcome::Unreachable => (
                ComponentStatus::PartialOutage,
                format!("The URL is unreachable: {} {}", self.method, self.url),
            ),
            ProbeOutcome::HttpError => {
                (ComponentStatus::PartialOutage, "Unexpected HTTP response".to_string())
            }
            ProbeOutcome::TimedOut => {
                (ComponentStatus::PerformanceIssues, "Request timed out".to_string())
            }
            ProbeOutcome::Response(response) => {
                // The endpoint is assumed healthy until an expectation
                // says otherwise.
                let mut status = ComponentStatus::Operational;
                let mut message = String::new();
                for expectation in &self.expectations {
                    let verdict = expectation.status(response);
                    // The greater the status, the worse the state. On a
                    // tie the first worst verdict keeps its message.
                    if verdict > status {
                        status = verdict;
                        message = expectation.message(response);
                    }
                }
                (status, message)
            }
        };

        if status != ComponentStatus::Operational {
            warn!("[{}] {}", self.name, message);
        }

        self.current_status = status;
        self.current_message = message;
        self.last_probe = Some(outcome);
    }

    /// Decide whether this cycle's result is reported. Up to
    /// `allowed_fails` consecutive failures are suppressed before the
    /// change is pushed out; a recovery always reports immediately.
    fn update_trigger(&mut self) {
        if self.current_status != ComponentStatus::Operational {
            self.current_fails += 1;
            debug!(
                "[{}] Failure #{} with {} allowed",
                self.name, self.current_fails, self.allowed_fails
            );
            if self.current_fails <= self.allowed_fails {
                self.trigger_update = false;
                return;
            }
        }
        self.current_fails = 0;
        self.trigger_update = true;
    }

    /// Reconcile the component status on the Cachet server.
    async fn push_status(&mut self) {
        if !self.trigger_update {
            return;
        }

        if self.current_status == self.previous_status {
            // No change in status, don't keep spamming the API.
            self.trigger_update = false;
            return;
        }

        let remote_status = match self.client.get_component_status(self.component_id).await {
            Ok(status) => Some(status),
            Err(err) => {
                warn!("[{}] Component status read failed: {}", self.name, err);
                None
            }
        };

        if remote_status == Some(self.current_status) {
            // Someone else already converged the remote status.
            debug!(
                "[{}] Component [{}] already at [{}], skipping update",
                self.name, self.component_id, self.current_status
            );
        } else {
            match self.client.push_status(self.component_id, self.current_status).await {
                Ok(()) => info!("[{}] Component update: status [{}]", self.name, self.current_status),
                Err(err) => warn!("[{}] Component update failed: {}", self.name, err),
            }
        }

        self.previous_status = self.current_status;
    }

    /// Reconcile the incident state on the Cachet server. At most one
    /// incident is open per endpoint at any time.
    async fn push_incident(&mut self) {
        if !self.trigger_update {
            return;
        }

        if let Some(incident_id) = self.incident_id {
            if self.current_status == ComponentStatus::Operational {
                let title = self.titles.title_for(ComponentStatus::Operational, &self.name);
                match self.client.resolve_incident(incident_id, &title).await {
                    Ok(()) => {
                        info!(
                            "[{}] Incident [{}] updated: component status [{}]",
                            self.name, incident_id, self.current_status
                        );
                        self.incident_id = None;
                    }
                    Err(err) => {
                        // Keep the id; the resolve is retried on the next
                        // triggering cycle.
                        warn!("[{}] Incident [{}] update failed: {}", self.name, incident_id, err);
                    }
                }
                self.notify_webhooks(&title).await;
            }
        } else if self.current_status != ComponentStatus::Operational {
            let title = self.titles.title_for(self.current_status, &self.name);
            match self
                .client
                .create_incident(
                    &title,
                    &self.current_message,
                    self.component_id,
                    self.current_status,
                    self.public_incidents,
                )
                .await
            {
                Ok(incident_id) => {
                    info!(
                        "[{}] Incident [{}] uploaded: component status [{}], message: \"{}\"",
                        self.name, incident_id, self.current_status, self.current_message
                    );
                    self.incident_id = Some(incident_id);
                }
                Err(err) => {
                    warn!("[{}] Incident upload failed: {}", self.name, err);
                }
            }
            self.notify_webhooks(&title).await;
        }
    }

    async fn notify_webhooks(&self, title: &str) {
        for webhook in &self.webhooks {
            if let Err(err) = webhook.push_incident(title, &self.current_message).await {
                warn!("[{}] Webhook push failed: {}", self.name, err);
            }
        }
    }

    /// Push one latency metric point, every cycle, independent of the
    /// debounce gate.
    async fn push_metrics(&mut self) {
        let Some(metric_id) = self.metric_id else {
            return;
        };

        let value = match (&self.last_probe, self.current_status) {
            (Some(ProbeOutcome::Response(response)), ComponentStatus::Operational) => {
                self.latency_unit.from_seconds(response.elapsed.as_secs_f64())
            }
            _ => self.default_metric_value,
        };

        let timestamp = chrono::Utc::now().timestamp();
        match self.client.push_metric_point(metric_id, value, timestamp).await {
            Ok(()) => debug!("[{}] Metric uploaded: {}", self.name, value),
            Err(err) => warn!("[{}] Metric upload failed: {}", self.name, err),
        }
    }
}

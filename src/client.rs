//! HTTP client for the Cachet status-page API

use crate::errors::{MonitorError, Result};
use crate::status::{ComponentStatus, IncidentStatus};
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timeout for calls against the Cachet API. Probe timeouts are
/// configured per endpoint and do not apply here.
const API_TIMEOUT: Duration = Duration::from_secs(10);

/// If the passed url doesn't include a scheme, default to http.
pub fn normalize_url(url: &str) -> String {
    if url.to_lowercase().starts_with("http") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}

/// Client for the Cachet server. All requests carry the `X-Cachet-Token`
/// header; request parameters travel as query parameters, matching the
/// Cachet API wire shape.
#[derive(Debug, Clone)]
pub struct CachetClient {
    api_url: String,
    client: Client,
}

impl CachetClient {
    pub fn new(api_url: &str, token: &str) -> Result<Self> {
        let token_value = HeaderValue::from_str(token)
            .map_err(|_| MonitorError::Config("Token contains invalid header characters".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert("X-Cachet-Token", token_value);

        let client = Client::builder()
            .timeout(API_TIMEOUT)
            .user_agent(format!("cachet_monitor/{}", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(MonitorError::Http)?;

        Ok(Self { api_url: normalize_url(api_url), client })
    }

    /// Ping the Cachet API.
    pub async fn ping(&self) -> Result<()> {
        let response = self.client.get(format!("{}/ping", self.api_url)).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(MonitorError::Api(format!("Ping failed with status [{}]", response.status())))
        }
    }

    /// Test connectivity to the Cachet API.
    pub async fn test_connectivity(&self) -> bool {
        match self.ping().await {
            Ok(()) => {
                info!("Cachet API connectivity test successful: {}", self.api_url);
                true
            }
            Err(e) => {
                warn!("Cachet API connectivity test failed: {}", e);
                false
            }
        }
    }

    /// Retrieves the status currently recorded for the component.
    pub async fn get_component_status(&self, component_id: u32) -> Result<ComponentStatus> {
        let response = self
            .client
            .get(format!("{}/components/{}", self.api_url, component_id))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MonitorError::ComponentNonexistent(component_id));
        }

        let body: Value = response.json().await?;
        let code = body["data"]["status"]
            .as_u64()
            .or_else(|| body["data"]["status"].as_str().and_then(|s| s.parse().ok()))
            .ok_or_else(|| {
                MonitorError::Api(format!(
                    "Component [{}] response carried no status field",
                    component_id
                ))
            })?;

        ComponentStatus::from_code(code).ok_or_else(|| {
            MonitorError::Api(format!("Unknown component status code [{}]", code))
        })
    }

    /// Pushes the status of the component to the Cachet server.
    pub async fn push_status(&self, component_id: u32, status: ComponentStatus) -> Result<()> {
        let response = self
            .client
            .put(format!("{}/components/{}", self.api_url, component_id))
            .query(&[
                ("id", component_id.to_string()),
                ("status", status.code().to_string()),
            ])
            .send()
            .await?;

        if response.status().is_success() {
            debug!("Component [{}] status pushed: [{}]", component_id, status);
            Ok(())
        } else {
            Err(MonitorError::Api(format!(
                "Component [{}] update failed with status [{}]",
                component_id,
                response.status()
            )))
        }
    }

    /// Returns the default value configured for the metric.
    pub async fn get_default_metric_value(&self, metric_id: u32) -> Result<f64> {
        let response = self
            .client
            .get(format!("{}/metrics/{}", self.api_url, metric_id))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MonitorError::MetricNonexistent(metric_id));
        }

        let body: Value = response.json().await?;
        body["data"]["default_value"]
            .as_f64()
            .or_else(|| body["data"]["default_value"].as_str().and_then(|s| s.parse().ok()))
            .ok_or_else(|| {
                MonitorError::Api(format!(
                    "Metric [{}] response carried no default_value field",
                    metric_id
                ))
            })
    }

    /// Pushes one metric point. The value must already be converted to the
    /// metric's latency unit.
    pub async fn push_metric_point(&self, metric_id: u32, value: f64, timestamp: i64) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/metrics/{}/points", self.api_url, metric_id))
            .query(&[
                ("id", metric_id.to_string()),
                ("value", value.to_string()),
                ("timestamp", timestamp.to_string()),
            ])
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(MonitorError::Api(format!(
                "Metric [{}] upload failed with status [{}]",
                metric_id,
                response.status()
            )))
        }
    }

    /// Creates a new incident in INVESTIGATING state and returns its id.
    pub async fn create_incident(
        &self,
        title: &str,
        message: &str,
        component_id: u32,
        component_status: ComponentStatus,
        public: bool,
    ) -> Result<u64> {
        let response = self
            .client
            .post(format!("{}/incidents", self.api_url))
            .query(&[
                ("name", title.to_string()),
                ("message", message.to_string()),
                ("status", IncidentStatus::Investigating.code().to_string()),
                ("visible", u8::from(public).to_string()),
                ("component_id", component_id.to_string()),
                ("component_status", component_status.code().to_string()),
                ("notify", "1".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MonitorError::Api(format!(
                "Incident upload failed with status [{}]",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        body["data"]["id"]
            .as_u64()
            .or_else(|| body["data"]["id"].as_str().and_then(|s| s.parse().ok()))
            .ok_or_else(|| {
                MonitorError::Api("Incident response carried no id field".to_string())
            })
    }

    /// Posts a FIXED update to an open incident.
    pub async fn resolve_incident(&self, incident_id: u64, message: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/incidents/{}/updates", self.api_url, incident_id))
            .query(&[
                ("status", IncidentStatus::Fixed.code().to_string()),
                ("message", message.to_string()),
            ])
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(MonitorError::Api(format!(
                "Incident [{}] update failed with status [{}]",
                incident_id,
                response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> CachetClient {
        CachetClient::new(&server.uri(), "my_token").unwrap()
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("demo.cachethq.io/api/v1"), "http://demo.cachethq.io/api/v1");
        assert_eq!(
            normalize_url("https://demo.cachethq.io/api/v1"),
            "https://demo.cachethq.io/api/v1"
        );
        assert_eq!(normalize_url("HTTP://demo.cachethq.io"), "HTTP://demo.cachethq.io");
    }

    #[tokio::test]
    async fn test_get_component_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/components/1"))
            .and(header("X-Cachet-Token", "my_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"status": 2}})))
            .expect(1)
            .mount(&server)
            .await;

        let status = client_for(&server).await.get_component_status(1).await.unwrap();
        assert_eq!(status, ComponentStatus::PerformanceIssues);
    }

    #[tokio::test]
    async fn test_get_component_status_as_string() {
        // Cachet also serves status codes as strings.
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/components/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"status": "3"}})))
            .mount(&server)
            .await;

        let status = client_for(&server).await.get_component_status(1).await.unwrap();
        assert_eq!(status, ComponentStatus::PartialOutage);
    }

    #[tokio::test]
    async fn test_get_component_status_nonexistent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/components/9"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let error = client_for(&server).await.get_component_status(9).await.unwrap_err();
        assert!(matches!(error, MonitorError::ComponentNonexistent(9)));
    }

    #[tokio::test]
    async fn test_push_status() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/components/1"))
            .and(query_param("id", "1"))
            .and(query_param("status", "3"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .await
            .push_status(1, ComponentStatus::PartialOutage)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_push_status_failure() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/components/1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let error = client_for(&server)
            .await
            .push_status(1, ComponentStatus::Operational)
            .await
            .unwrap_err();
        assert!(matches!(error, MonitorError::Api(_)));
    }

    #[tokio::test]
    async fn test_get_default_metric_value() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metrics/2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"default_value": 0.456}})),
            )
            .mount(&server)
            .await;

        let value = client_for(&server).await.get_default_metric_value(2).await.unwrap();
        assert_eq!(value, 0.456);
    }

    #[tokio::test]
    async fn test_get_default_metric_value_nonexistent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metrics/7"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let error = client_for(&server).await.get_default_metric_value(7).await.unwrap_err();
        assert!(matches!(error, MonitorError::MetricNonexistent(7)));
    }

    #[tokio::test]
    async fn test_push_metric_point() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/metrics/2/points"))
            .and(query_param("id", "2"))
            .and(query_param("value", "123.4"))
            .and(query_param("timestamp", "1700000000"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).await.push_metric_point(2, 123.4, 1_700_000_000).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_incident() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/incidents"))
            .and(query_param("name", "swagger is unavailable"))
            .and(query_param("message", "Unexpected HTTP status (400)"))
            .and(query_param("status", "1"))
            .and(query_param("visible", "1"))
            .and(query_param("component_id", "1"))
            .and(query_param("component_status", "3"))
            .and(query_param("notify", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": 42}})))
            .expect(1)
            .mount(&server)
            .await;

        let incident_id = client_for(&server)
            .await
            .create_incident(
                "swagger is unavailable",
                "Unexpected HTTP status (400)",
                1,
                ComponentStatus::PartialOutage,
                true,
            )
            .await
            .unwrap();
        assert_eq!(incident_id, 42);
    }

    #[tokio::test]
    async fn test_create_incident_failure_yields_no_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/incidents"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .await
            .create_incident("title", "message", 1, ComponentStatus::MajorOutage, false)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_resolve_incident() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/incidents/42/updates"))
            .and(query_param("status", "4"))
            .and(query_param("message", "swagger is operational"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .await
            .resolve_incident(42, "swagger is operational")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        assert!(client_for(&server).await.test_connectivity().await);
    }

    #[tokio::test]
    async fn test_ping_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        assert!(!client_for(&server).await.test_connectivity().await);
    }
}

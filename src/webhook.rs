//! Outbound webhook notifications for incident changes

use crate::config::WebhookConfig;
use crate::errors::{MonitorError, Result};
use reqwest::Client;
use std::collections::HashMap;

/// A user-configured notification target. Both the URL and the params map
/// accept `{title}` and `{message}` placeholders.
#[derive(Debug, Clone)]
pub struct Webhook {
    url: String,
    params: HashMap<String, String>,
    client: Client,
}

fn interpolate(template: &str, title: &str, message: &str) -> String {
    template.replace("{title}", title).replace("{message}", message)
}

impl Webhook {
    pub fn new(config: &WebhookConfig, client: Client) -> Self {
        Self { url: config.url.clone(), params: config.params.clone(), client }
    }

    /// Notify the target about an incident. An empty message falls back to
    /// the title.
    pub async fn push_incident(&self, title: &str, message: &str) -> Result<()> {
        let message = if message.is_empty() { title } else { message };

        let url = interpolate(&self.url, title, message);
        let params: Vec<(String, String)> = self
            .params
            .iter()
            .map(|(name, value)| (name.clone(), interpolate(value, title, message)))
            .collect();

        let response = self.client.post(&url).query(&params).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(MonitorError::Api(format!(
                "Webhook push failed with status [{}]",
                response.status()
            )))
        }
    }
}

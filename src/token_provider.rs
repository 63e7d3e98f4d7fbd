//! Token resolution strategies for the Cachet API credential
//!
//! The `cachet.token` config entry is either a plain string or a chain of
//! providers tried in order. The chain is resolved once at startup; the
//! rest of the agent only ever sees the resulting string.

use crate::config::{TokenConfig, TokenProviderConfig};
use crate::errors::{MonitorError, Result};
use async_trait::async_trait;
use std::env;

/// Environment variable consulted before a plain-string token config.
const TOKEN_ENV_VAR: &str = "CACHET_TOKEN";

/// A single credential source. Returns `None` when this source has no
/// token to offer, letting the chain move on.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Option<String>;
}

/// Token written directly into the configuration file.
pub struct ConfigTokenProvider {
    token: String,
}

#[async_trait]
impl TokenProvider for ConfigTokenProvider {
    async fn token(&self) -> Option<String> {
        if self.token.is_empty() { None } else { Some(self.token.clone()) }
    }
}

/// Token read from an environment variable named by the config entry.
pub struct EnvironmentVariableTokenProvider {
    variable_name: String,
}

#[async_trait]
impl TokenProvider for EnvironmentVariableTokenProvider {
    async fn token(&self) -> Option<String> {
        env::var(&self.variable_name).ok().filter(|token| !token.is_empty())
    }
}

/// Token read from a mounted secrets file, trimmed of surrounding
/// whitespace.
pub struct SecretsFileTokenProvider {
    path: String,
}

#[async_trait]
impl TokenProvider for SecretsFileTokenProvider {
    async fn token(&self) -> Option<String> {
        let contents = tokio::fs::read_to_string(&self.path).await.ok()?;
        let token = contents.trim();
        if token.is_empty() { None } else { Some(token.to_string()) }
    }
}

/// Create a provider from its config entry. Unknown types are a fatal
/// startup error.
pub fn create_provider(config: &TokenProviderConfig) -> Result<Box<dyn TokenProvider>> {
    match config.kind.as_str() {
        "TOKEN" => Ok(Box::new(ConfigTokenProvider { token: config.value.clone() })),
        "ENVIRONMENT_VARIABLE" => Ok(Box::new(EnvironmentVariableTokenProvider {
            variable_name: config.value.clone(),
        })),
        "SECRETS_FILE" => Ok(Box::new(SecretsFileTokenProvider { path: config.value.clone() })),
        other => Err(MonitorError::InvalidTokenProvider(other.to_string())),
    }
}

/// Resolve the configured token. Plain-string configs are overridden by the
/// `CACHET_TOKEN` environment variable; provider chains are tried in
/// declaration order, first non-empty token wins.
pub async fn resolve_token(config: &TokenConfig) -> Result<String> {
    match config {
        TokenConfig::Literal(token) => {
            if let Ok(from_env) = env::var(TOKEN_ENV_VAR) {
                if !from_env.is_empty() {
                    return Ok(from_env);
                }
            }
            if token.is_empty() {
                return Err(MonitorError::TokenNotFound);
            }
            Ok(token.clone())
        }
        TokenConfig::Providers(entries) => {
            for entry in entries {
                let provider = create_provider(entry)?;
                if let Some(token) = provider.token().await {
                    return Ok(token);
                }
            }
            Err(MonitorError::TokenNotFound)
        }
    }
}

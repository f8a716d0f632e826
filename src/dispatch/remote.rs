//! HTTP-backed action handlers for the remote data layer.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::{ActionError, ActionHandler, CapabilityRegistry, RegistryError};
use crate::config::ActionsConfig;

/// Connection timeout for data-layer requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Overall timeout for one data-layer call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Calls one `module.action` on the data layer over HTTP.
///
/// The call is a `POST {endpoint}/{module}/{action}` with body
/// `{"args": [...]}`; the JSON response body is the result.
#[derive(Debug, Clone)]
pub struct RemoteAction {
    client: Client,
    url: String,
    token: Option<String>,
}

impl RemoteAction {
    /// Create a handler for `module.action` on `endpoint`.
    #[must_use]
    pub fn new(client: Client, endpoint: &str, module: &str, action: &str) -> Self {
        Self {
            client,
            url: format!("{}/{module}/{action}", endpoint.trim_end_matches('/')),
            token: None,
        }
    }

    /// Attach a bearer token to every call.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Target URL of this handler.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ActionHandler for RemoteAction {
    async fn call(&self, args: Vec<Value>) -> Result<Value, ActionError> {
        let mut request = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "args": args }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ActionError::Remote(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ActionError::Remote(format!("HTTP {status}: {text}")));
        }

        response
            .json()
            .await
            .map_err(|e| ActionError::Remote(format!("Invalid response body: {e}")))
    }
}

/// Register every configured remote capability.
///
/// Does nothing when no endpoint is configured.
///
/// # Errors
///
/// Returns a `RegistryError` if a capability name is invalid or duplicated,
/// or if the HTTP client cannot be built.
pub fn register_remote_capabilities(
    registry: &mut CapabilityRegistry,
    config: &ActionsConfig,
) -> Result<(), RegistryError> {
    let Some(endpoint) = &config.endpoint else {
        if !config.capabilities.is_empty() {
            tracing::warn!("Capabilities configured without an endpoint, ignoring");
        }
        return Ok(());
    };

    let client = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| RegistryError::Client(e.to_string()))?;
    let token = config
        .token_env
        .as_ref()
        .and_then(|name| std::env::var(name).ok());

    for capability in &config.capabilities {
        let handler = RemoteAction::new(
            client.clone(),
            endpoint,
            &capability.module,
            &capability.action,
        )
        .with_token(token.clone());
        registry.register(
            &capability.module,
            &capability.action,
            capability.arity,
            handler,
        )?;
    }

    tracing::info!(
        endpoint = %endpoint,
        count = config.capabilities.len(),
        "Registered remote capabilities"
    );
    Ok(())
}

//! Gateway-facing HTTP client (the upstream fragment BFF). Generalizes the
//! trait-plus-default-impl shape the teacher used for its worker backend
//! (`WorkerBackend`/`HttpWorkerBackend`) to the three gateway calls spec §6
//! names: render, placeholder, static asset body.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::model::GatewayRenderResponse;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request to {0} failed: {1}")]
    Transport(String, String),
    #[error("request to {0} timed out")]
    Timeout(String),
    #[error("invalid response body from {0}: {1}")]
    InvalidBody(String, String),
}

#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// `GET <fragment_url><render_url>?<attrs>&__renderMode=stream`
    async fn fetch_render(
        &self,
        fragment_url: &str,
        render_url: &str,
        attrs: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<GatewayRenderResponse, GatewayError>;

    /// `GET <fragment_url>/placeholder`. Failures resolve to an empty string
    /// at the call site, never bubbled as an error the caller must branch on.
    async fn fetch_placeholder(&self, fragment_url: &str, timeout: Duration) -> String;

    /// `GET <fragment_url>/static/<file_name>`. Failures resolve to `None`.
    async fn fetch_static(
        &self,
        fragment_url: &str,
        file_name: &str,
        timeout: Duration,
    ) -> Option<String>;

    /// Gateway-exposed metadata used to join a `FragmentDescriptor` with its
    /// `assets[]`/`dependencies[]`/`render{}` configuration at compile time.
    /// `None` means the gateway is unreachable or doesn't expose this
    /// fragment — the descriptor becomes `Unfetched`.
    async fn fetch_fragment_config(
        &self,
        fragment_url: &str,
        name: &str,
    ) -> Option<crate::model::GatewayFragmentConfig>;
}

/// Default `reqwest`-backed implementation.
pub struct ReqwestGatewayClient {
    client: reqwest::Client,
}

impl ReqwestGatewayClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestGatewayClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GatewayClient for ReqwestGatewayClient {
    async fn fetch_render(
        &self,
        fragment_url: &str,
        render_url: &str,
        attrs: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<GatewayRenderResponse, GatewayError> {
        let url = format!("{fragment_url}{render_url}");
        let mut query: Vec<(&str, &str)> =
            attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        query.push(("__renderMode", "stream"));

        let resp = self
            .client
            .get(&url)
            .query(&query)
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    GatewayError::Timeout(url.clone())
                } else {
                    GatewayError::Transport(url.clone(), err.to_string())
                }
            })?;

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|err| GatewayError::InvalidBody(url.clone(), err.to_string()))?;

        let html = body
            .as_object()
            .map(|obj| {
                obj.iter()
                    .filter(|(k, _)| k.as_str() != "model")
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        let model = body
            .get("model")
            .and_then(|v| v.as_object())
            .cloned();

        Ok(GatewayRenderResponse {
            status,
            headers,
            html,
            model,
        })
    }

    async fn fetch_placeholder(&self, fragment_url: &str, timeout: Duration) -> String {
        let url = format!("{fragment_url}/placeholder");
        match self.client.get(&url).timeout(timeout).send().await {
            Ok(resp) if resp.status().is_success() => resp.text().await.unwrap_or_default(),
            Ok(resp) => {
                warn!(%url, status = %resp.status(), "placeholder fetch non-2xx");
                String::new()
            }
            Err(err) => {
                warn!(%url, ?err, "placeholder fetch failed");
                String::new()
            }
        }
    }

    async fn fetch_static(
        &self,
        fragment_url: &str,
        file_name: &str,
        timeout: Duration,
    ) -> Option<String> {
        let url = format!("{fragment_url}/static/{file_name}");
        match self.client.get(&url).timeout(timeout).send().await {
            Ok(resp) if resp.status().is_success() => resp.text().await.ok(),
            Ok(resp) => {
                warn!(%url, status = %resp.status(), "asset fetch non-2xx");
                None
            }
            Err(err) => {
                warn!(%url, ?err, "asset fetch failed");
                None
            }
        }
    }

    async fn fetch_fragment_config(
        &self,
        fragment_url: &str,
        name: &str,
    ) -> Option<crate::model::GatewayFragmentConfig> {
        let url = format!("{fragment_url}/config");
        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json().await {
                Ok(cfg) => Some(cfg),
                Err(err) => {
                    warn!(%url, %name, ?err, "fragment config body invalid");
                    None
                }
            },
            Ok(resp) => {
                warn!(%url, %name, status = %resp.status(), "fragment config non-2xx");
                None
            }
            Err(err) => {
                warn!(%url, %name, ?err, "fragment config fetch failed");
                None
            }
        }
    }
}

/// Fixed, in-memory gateway used by tests and by documentation examples.
#[cfg(test)]
pub mod stub {
    use super::*;
    use std::collections::HashMap as Map;
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub struct StubGatewayClient {
        pub configs: Mutex<Map<String, crate::model::GatewayFragmentConfig>>,
        pub renders: Mutex<Map<String, GatewayRenderResponse>>,
        pub placeholders: Mutex<Map<String, String>>,
    }

    #[async_trait]
    impl GatewayClient for StubGatewayClient {
        async fn fetch_render(
            &self,
            fragment_url: &str,
            _render_url: &str,
            _attrs: &HashMap<String, String>,
            _timeout: Duration,
        ) -> Result<GatewayRenderResponse, GatewayError> {
            self.renders
                .lock()
                .await
                .get(fragment_url)
                .cloned()
                .ok_or_else(|| GatewayError::Transport(fragment_url.to_string(), "no stub".into()))
        }

        async fn fetch_placeholder(&self, fragment_url: &str, _timeout: Duration) -> String {
            self.placeholders
                .lock()
                .await
                .get(fragment_url)
                .cloned()
                .unwrap_or_default()
        }

        async fn fetch_static(
            &self,
            _fragment_url: &str,
            _file_name: &str,
            _timeout: Duration,
        ) -> Option<String> {
            None
        }

        async fn fetch_fragment_config(
            &self,
            fragment_url: &str,
            _name: &str,
        ) -> Option<crate::model::GatewayFragmentConfig> {
            self.configs.lock().await.get(fragment_url).cloned()
        }
    }
}

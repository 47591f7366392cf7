use std::time::Duration;

use http::header::{HeaderMap, ACCEPT, CONTENT_TYPE};

use crate::config::AppConfig;
use crate::error::ProxyError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const POOL_MAX_IDLE_PER_HOST: usize = 16;
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(15);

/// Pooled HTTP client for the upstream completion service.
///
/// No overall request timeout is set: completion responses stream for as
/// long as the model keeps producing tokens.
pub struct UpstreamClient {
    client: reqwest::Client,
    chat_url: String,
    models_url: String,
    fallback_key: String,
}

impl UpstreamClient {
    /// Build the shared client from the loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Internal`] when the HTTP client cannot be built.
    pub fn new(config: &AppConfig) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .tcp_nodelay(true)
            .connect_timeout(CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()
            .map_err(|err| ProxyError::Internal(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            chat_url: config.upstream_url.clone(),
            models_url: config.upstream_models_url(),
            fallback_key: config.upstream_api_key.clone(),
        })
    }

    /// Configured key used when the client request carries none.
    #[must_use]
    pub fn fallback_key(&self) -> &str {
        &self.fallback_key
    }

    /// POST the raw completion request body upstream and return the
    /// streaming response. `forwarded` carries client headers the proxy
    /// relays (`X-*` and `Extra`).
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Transport`] when the request cannot be sent.
    pub async fn send_chat(
        &self,
        api_key: &str,
        forwarded: HeaderMap,
        body: bytes::Bytes,
    ) -> Result<reqwest::Response, ProxyError> {
        tracing::info!("sending request to upstream: {}", self.chat_url);
        self.client
            .post(&self.chat_url)
            .headers(forwarded)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .bearer_auth(api_key)
            .body(body)
            .send()
            .await
            .map_err(|err| ProxyError::Transport(format!("Upstream request failed: {err}")))
    }

    /// GET the upstream model listing with the resolved key.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Transport`] when the request cannot be sent.
    pub async fn fetch_models(&self, api_key: &str) -> Result<reqwest::Response, ProxyError> {
        self.client
            .get(&self.models_url)
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|err| ProxyError::Transport(format!("Upstream request failed: {err}")))
    }
}

/// Select the client headers the proxy forwards upstream: anything prefixed
/// `X-` plus the literal `Extra` header.
#[must_use]
pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::new();
    for (name, value) in headers {
        if name.as_str().starts_with("x-") || name.as_str() == "extra" {
            forwarded.append(name.clone(), value.clone());
        }
    }
    forwarded
}

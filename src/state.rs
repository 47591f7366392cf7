use crate::config::AppConfig;
use crate::transport::UpstreamClient;

/// Shared application state handed to every request handler.
pub struct AppState {
    pub config: AppConfig,
    pub upstream: UpstreamClient,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, upstream: UpstreamClient) -> Self {
        Self { config, upstream }
    }
}

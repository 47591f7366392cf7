use serde_json::{json, Value};

/// Canonical error type for the proxy shell.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Auth error: {0}")]
    Auth(String),
    #[error("Upstream error: {message}")]
    Upstream { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    #[must_use]
    pub fn status(&self) -> http::StatusCode {
        match self {
            ProxyError::InvalidRequest(_) => http::StatusCode::BAD_REQUEST,
            ProxyError::Auth(_) => http::StatusCode::UNAUTHORIZED,
            ProxyError::Upstream { .. } | ProxyError::Transport(_) => http::StatusCode::BAD_GATEWAY,
            ProxyError::Internal(_) => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ProxyError::InvalidRequest(_) | ProxyError::Auth(_) => "invalid_request_error",
            ProxyError::Upstream { .. } | ProxyError::Transport(_) => "upstream_error",
            ProxyError::Internal(_) => "internal_error",
        }
    }

    fn code(&self) -> String {
        match self {
            ProxyError::Upstream { status, .. } => format!("status_{status}"),
            ProxyError::Auth(_) => "missing_api_key".to_string(),
            _ => String::new(),
        }
    }
}

/// OpenAI-shaped error body: `{"error":{"message","type","code"}}`.
#[must_use]
pub fn error_payload(err: &ProxyError) -> Value {
    json!({
        "error": {
            "message": err.to_string(),
            "type": err.kind(),
            "code": err.code(),
        }
    })
}

impl axum::response::IntoResponse for ProxyError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("{self}");
        (self.status(), axum::Json(error_payload(&self))).into_response()
    }
}

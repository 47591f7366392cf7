use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;
use http::header::CONTENT_TYPE;
use http::HeaderMap;

use crate::auth::resolve_upstream_key;
use crate::error::ProxyError;
use crate::state::AppState;

/// Authenticated passthrough of the upstream model listing.
///
/// Relays status, content type, and body verbatim so clients see exactly
/// what the upstream advertises.
pub async fn models_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ProxyError> {
    let api_key = resolve_upstream_key(&headers, state.upstream.fallback_key());
    if api_key.is_empty() {
        return Err(ProxyError::Auth("Missing API key".to_string()));
    }

    let upstream_response = state.upstream.fetch_models(api_key).await?;
    let status = upstream_response.status();
    let content_type = upstream_response.headers().get(CONTENT_TYPE).cloned();
    let body = upstream_response
        .bytes()
        .await
        .map_err(|err| ProxyError::Transport(format!("Failed to read upstream body: {err}")))?;

    let mut response = Response::new(axum::body::Body::from(body));
    *response.status_mut() = status;
    if let Some(content_type) = content_type {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    Ok(response)
}

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;
use bytes::Bytes;
use futures_util::StreamExt;
use http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};

use crate::auth::resolve_upstream_key;
use crate::capture::EventCapture;
use crate::error::ProxyError;
use crate::state::AppState;
use crate::stream::{event_stream, rewrite_stream};
use crate::transport::forwardable_headers;

/// Proxy one chat-completion request.
///
/// The client body is forwarded without interpretation; the upstream SSE
/// response flows back through the tool-call rewriter, one downstream event
/// per rewritten payload.
pub async fn completions_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let api_key = resolve_upstream_key(&headers, state.upstream.fallback_key());
    let forwarded = forwardable_headers(&headers);

    let upstream_response = state.upstream.send_chat(api_key, forwarded, body).await?;

    let status = upstream_response.status();
    if !status.is_success() {
        let message = upstream_response.text().await.unwrap_or_default();
        return Err(ProxyError::Upstream {
            status: status.as_u16(),
            message,
        });
    }

    let capture = open_capture(&state);
    let events = event_stream(upstream_response.bytes_stream());
    let body = axum::body::Body::from_stream(
        rewrite_stream(events, capture).map(Ok::<_, Infallible>),
    );

    Ok(sse_response(body))
}

fn open_capture(state: &AppState) -> Option<EventCapture> {
    let dir = state.config.sse_log_dir.as_deref()?;
    match EventCapture::create(dir) {
        Ok(capture) => Some(capture),
        Err(err) => {
            tracing::error!("failed to create sse capture in {}: {err}", dir.display());
            None
        }
    }
}

fn sse_response(body: axum::body::Body) -> Response {
    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        http::HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    response
}

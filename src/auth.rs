use http::header::AUTHORIZATION;

/// Resolve the key to present upstream.
///
/// A client `Authorization: Bearer <key>` header wins; anything else falls
/// back to the configured upstream key. The proxy relays credentials, it
/// does not gate on them.
#[must_use]
pub fn resolve_upstream_key<'a>(headers: &'a http::HeaderMap, fallback: &'a str) -> &'a str {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|key| !key.is_empty())
        .unwrap_or(fallback)
}

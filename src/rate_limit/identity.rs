//! Request identity extraction for rate limiting.

use std::sync::Arc;

use axum::http::HeaderMap;

/// Bucket shared by every caller without address information.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derives the rate-limit identity of a request from its headers.
pub type KeyGenerator = Arc<dyn Fn(&HeaderMap) -> String + Send + Sync>;

/// Originating client address of a request.
///
/// Takes the first entry of `X-Forwarded-For`, then `X-Real-IP`, and falls
/// back to [`UNKNOWN_CLIENT`].
pub fn client_address(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|addr| !addr.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Key generator combining a route name with the client address, so one
/// policy can be enforced per route.
pub fn route_scoped(route: impl Into<String>) -> KeyGenerator {
    let route = route.into();
    Arc::new(move |headers: &HeaderMap| format!("{route}:{}", client_address(headers)))
}

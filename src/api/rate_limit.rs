//! Rate-limit middleware for the ops API.

use axum::{
    extract::{Request, State},
    http::{header::RETRY_AFTER, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use super::handlers::AppState;
use crate::models::RateLimitedResponse;
use crate::rate_limit::RateLimitDecision;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
/// Unix seconds at which the window ends
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Counts the request against the state's API policy. Denied requests get
/// a 429; allowed ones pass through with the window headers attached.
pub async fn enforce_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let decision = state
        .limiter
        .check(&state.api_policy, request.headers())
        .await;

    if !decision.allowed {
        let now_ms = state.limiter.now_ms();
        return RateLimited::new(state.api_policy.name(), decision, now_ms).into_response();
    }

    let mut response = next.run(request).await;
    apply_window_headers(response.headers_mut(), &decision);
    response
}

fn apply_window_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(
        X_RATELIMIT_RESET,
        HeaderValue::from(decision.reset_at_ms.div_ceil(1000)),
    );
}

// == Rate Limited Response ==
/// A denied request, rendered as `429 Too Many Requests`.
#[derive(Debug, Clone)]
pub struct RateLimited {
    policy: String,
    decision: RateLimitDecision,
    retry_after_secs: u64,
}

impl RateLimited {
    pub fn new(policy: &str, decision: RateLimitDecision, now_ms: u64) -> Self {
        Self {
            policy: policy.to_string(),
            decision,
            retry_after_secs: decision.retry_after_secs(now_ms),
        }
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after_secs
    }
}

impl IntoResponse for RateLimited {
    fn into_response(self) -> Response {
        let body = RateLimitedResponse::new(&self.policy, &self.decision, self.retry_after_secs);
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        let headers = response.headers_mut();
        headers.insert(RETRY_AFTER, HeaderValue::from(self.retry_after_secs));
        apply_window_headers(headers, &self.decision);
        response
    }
}

//! API Handlers
//!
//! HTTP request handlers for each ops endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::cache::{Backend, CacheManager, CacheOptions, Namespace, NamespaceCache};
use crate::clock::Clock;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::invalidation::{InvalidationReport, Invalidator};
use crate::models::requests::validate_key;
use crate::models::{
    ClearResponse, DeleteResponse, GetResponse, HealthResponse, InvalidateResponse,
    NamespaceStats, SetRequest, SetResponse, StatsResponse,
};
use crate::rate_limit::{RateLimitPolicy, RateLimiter};
use crate::store::KvStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub caches: Arc<CacheManager>,
    pub limiter: Arc<RateLimiter>,
    pub invalidator: Arc<Invalidator>,
    /// Policy guarding every endpoint except `/health`
    pub api_policy: RateLimitPolicy,
}

impl AppState {
    pub fn new(caches: Arc<CacheManager>, limiter: Arc<RateLimiter>) -> Self {
        let invalidator = Arc::new(Invalidator::new(&caches));
        Self {
            caches,
            limiter,
            invalidator,
            api_policy: RateLimitPolicy::api(),
        }
    }

    /// Builds the cache and the limiter over `store` and starts their
    /// sweep tasks.
    ///
    /// Must be called inside a tokio runtime.
    pub fn from_config(config: &Config, store: Option<Arc<dyn KvStore>>) -> Self {
        let caches = Arc::new(CacheManager::from_config(config, store.clone()));
        let limiter = Arc::new(RateLimiter::from_config(config, store));
        Self::new(caches, limiter)
    }

    /// In-process cache and limiter on `clock`, without sweep tasks.
    pub fn local(clock: Arc<dyn Clock>) -> Self {
        let options = CacheOptions {
            clock: clock.clone(),
            ..CacheOptions::default()
        };
        let backend = Backend::select(None, clock.clone());
        let caches = Arc::new(CacheManager::new(backend, options));
        let limiter = Arc::new(RateLimiter::new(None, "club", clock));
        Self::new(caches, limiter)
    }

    pub fn with_api_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.api_policy = policy;
        self
    }

    /// Stops the sweep tasks of the cache and the limiter.
    pub fn shutdown(&self) {
        self.caches.shutdown();
        self.limiter.shutdown();
    }

    fn cache_for(&self, namespace: &str) -> Result<NamespaceCache> {
        let namespace = Namespace::builtin(namespace)
            .ok_or_else(|| CacheError::NotFound(format!("namespace '{namespace}'")))?;
        Ok(self.caches.namespace(&namespace))
    }
}

fn checked_key(key: &str) -> Result<()> {
    match validate_key(key) {
        Some(error_msg) => Err(CacheError::InvalidRequest(error_msg)),
        None => Ok(()),
    }
}

/// Handler for GET /cache/:namespace/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> Result<Json<GetResponse>> {
    checked_key(&key)?;
    let cache = state.cache_for(&namespace)?;

    match cache.get::<Value>(&key).await {
        Some(value) => Ok(Json(GetResponse::new(namespace, key, value))),
        None => Err(CacheError::NotFound(format!("{namespace}:{key}"))),
    }
}

/// Handler for PUT /cache/:namespace/:key
///
/// Stores any JSON value with an optional TTL in seconds. A zero TTL
/// removes the key.
pub async fn set_handler(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    checked_key(&key)?;
    let cache = state.cache_for(&namespace)?;

    let ttl = req.ttl().unwrap_or(cache.namespace().default_ttl());
    cache.set(&key, &req.value, Some(ttl)).await;

    Ok(Json(SetResponse::new(&namespace, key, ttl.as_secs())))
}

/// Handler for DELETE /cache/:namespace/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>> {
    checked_key(&key)?;
    let cache = state.cache_for(&namespace)?;
    let deleted = cache.delete(&key).await;

    Ok(Json(DeleteResponse::new(key, deleted)))
}

/// Handler for DELETE /cache/:namespace
pub async fn clear_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<ClearResponse>> {
    let cache = state.cache_for(&namespace)?;
    let removed = cache.clear().await;

    Ok(Json(ClearResponse { namespace, removed }))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let mut namespaces = Vec::new();
    for cache in state.caches.namespaces() {
        let ns = cache.namespace();
        namespaces.push(NamespaceStats::new(
            ns.name(),
            cache.size().await,
            ns.default_ttl().as_secs(),
            cache.stats(),
        ));
    }

    Json(StatsResponse {
        backend: state.caches.backend_kind(),
        disabled: state.caches.is_disabled(),
        rate_limit_backend: state.limiter.backend_kind(),
        namespaces,
    })
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for POST /invalidate/events/:id
pub async fn invalidate_event_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<InvalidateResponse> {
    let report = state.invalidator.event_changed(&id).await;
    Json(invalidate_response("event", id, report))
}

/// Handler for POST /invalidate/users/:id
pub async fn invalidate_user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<InvalidateResponse> {
    let report = state.invalidator.user_changed(&id).await;
    Json(invalidate_response("user", id, report))
}

fn invalidate_response(entity: &str, id: String, report: InvalidationReport) -> InvalidateResponse {
    InvalidateResponse {
        entity: entity.to_string(),
        id,
        report,
    }
}

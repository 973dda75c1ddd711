use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use parking_lot::Mutex;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;

use redlock_core::types::Lease;
use redlock_core::{LockError, LockManager};

use crate::handlers::*;

#[derive(Clone)]
pub struct AppState {
    // Only touched from blocking tasks. Acquisitions release the mutex between
    // attempts so an unlock never waits out a contender's retry pauses.
    manager: Arc<Mutex<LockManager>>,
    servers: usize,
    quorum: usize,
}

pub async fn run(host: &str, port: u16, max_in_flight: usize, manager: LockManager) {
    let state = AppState {
        servers: manager.server_count(),
        quorum: manager.quorum(),
        manager: Arc::new(Mutex::new(manager)),
    };

    let app = Router::new()
        // Health is always open (no auth)
        .route("/health", get(health))
        .route("/locks", post(acquire_lock))
        .route("/locks/{resource}/{token}", delete(release_lock))
        .layer(middleware::from_fn(auth_middleware))
        .layer(ConcurrencyLimitLayer::new(max_in_flight))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    let addr = format!("{}:{}", host, port);

    if std::env::var("REDLOCK_API_KEY").is_ok() {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!("No REDLOCK_API_KEY set, server is open (dev mode)");
    }

    tracing::info!(
        servers = state.servers,
        quorum = state.quorum,
        "redlock server starting on http://{}",
        addr
    );

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}

// ─── Auth Middleware ────────────────────────────────────────────────────────

async fn auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // If no API key is configured, allow all requests (dev mode)
    let expected_key = match std::env::var("REDLOCK_API_KEY") {
        Ok(key) if !key.is_empty() => key,
        _ => return Ok(next.run(request).await),
    };

    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth_header.strip_prefix("Bearer ").unwrap_or("");

    if token == expected_key {
        Ok(next.run(request).await)
    } else {
        tracing::warn!("Unauthorized request to {}", request.uri().path());
        Err(StatusCode::UNAUTHORIZED)
    }
}

// ─── Handlers ───────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        servers: state.servers,
        quorum: state.quorum,
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

async fn acquire_lock(
    State(state): State<AppState>,
    Json(req): Json<AcquireLockRequest>,
) -> (StatusCode, Json<ApiResponse<LeaseResponse>>) {
    if let Err(e) = req.validate() {
        return (StatusCode::BAD_REQUEST, Json(ApiResponse::err(e)));
    }

    let manager = state.manager.clone();
    let resource = req.resource.clone();
    let result =
        tokio::task::spawn_blocking(move || LockManager::lock_shared(&manager, &resource, req.ttl))
            .await;

    match result {
        Ok(Ok(lease)) => {
            tracing::info!(
                resource = %lease.resource,
                validity_ms = lease.validity_ms(),
                "Lock acquired"
            );
            (
                StatusCode::CREATED,
                Json(ApiResponse::ok(LeaseResponse::from(&lease))),
            )
        }
        Ok(Err(e @ LockError::RetriesExhausted { .. })) => {
            tracing::info!(resource = %req.resource, "Lock denied");
            (StatusCode::CONFLICT, Json(ApiResponse::err(e.to_string())))
        }
        Ok(Err(e @ LockError::InvalidConfiguration(_))) => {
            (StatusCode::BAD_REQUEST, Json(ApiResponse::err(e.to_string())))
        }
        Err(e) => {
            tracing::error!(resource = %req.resource, error = %e, "Lock task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err("lock task failed")),
            )
        }
    }
}

async fn release_lock(
    State(state): State<AppState>,
    Path((resource, token)): Path<(String, String)>,
) -> (StatusCode, Json<ApiResponse<String>>) {
    if let Err(e) = validate_resource(&resource) {
        return (StatusCode::BAD_REQUEST, Json(ApiResponse::err(e)));
    }

    let manager = state.manager.clone();
    let lease = Lease::from_parts(resource.clone(), token);
    let result = tokio::task::spawn_blocking(move || {
        let mut locks = manager.lock();
        locks.unlock(&lease);
    })
    .await;

    match result {
        Ok(()) => {
            tracing::info!(resource = %resource, "Lock released");
            (
                StatusCode::OK,
                Json(ApiResponse::ok(format!("Lock on '{}' released", resource))),
            )
        }
        Err(e) => {
            tracing::error!(resource = %resource, error = %e, "Unlock task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err("unlock task failed")),
            )
        }
    }
}

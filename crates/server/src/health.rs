//! Liveness endpoint served next to the long-poll loop.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{error, info};

use aktly_db::DbPool;

#[derive(Clone)]
struct HealthState {
    pool: DbPool,
}

pub fn router(pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { pool })
}

async fn health(State(state): State<HealthState>) -> (StatusCode, Json<Value>) {
    let database_ok = sqlx::query("SELECT 1").fetch_one(&state.pool).await.is_ok();

    let (status, body) = if database_ok {
        (StatusCode::OK, json!({ "status": "healthy", "database": "ok" }))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "status": "degraded", "database": "unavailable" }),
        )
    };
    (status, Json(body))
}

/// Binds the health listener and serves it on a background task.
pub async fn spawn(
    pool: DbPool,
    bind_address: &str,
    port: u16,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let listener = tokio::net::TcpListener::bind(format!("{bind_address}:{port}")).await?;
    info!(
        event_name = "health.listener_started",
        address = %listener.local_addr()?,
        "health endpoint listening"
    );

    let app = router(pool);
    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "health endpoint stopped");
        }
    }))
}

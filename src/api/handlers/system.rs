use super::AppState;
use crate::api::models::{ComponentHealth, ComponentsHealth, HealthResponse, HealthStatus};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;

/// Handler for GET /health - Liveness plus a database round trip
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.db.ping().await {
        Ok(()) => ComponentHealth {
            status: HealthStatus::Healthy,
            message: None,
        },
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            ComponentHealth {
                status: HealthStatus::Unhealthy,
                message: Some("Database unavailable".to_string()),
            }
        }
    };

    let status = database.status;
    let code = match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            components: ComponentsHealth { database },
            timestamp: Utc::now().to_rfc3339(),
        }),
    )
}

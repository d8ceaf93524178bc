use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::error;

use super::AppState;

/// Liveness plus store reachability
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    match state.store.health_check().await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "status": "ok",
            "service": "social-graph-service",
        })),
        Err(e) => {
            error!(error = %e, "store health check failed");
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "unavailable",
                "service": "social-graph-service",
            }))
        }
    }
}

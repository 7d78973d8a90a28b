use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;

use crate::modules::payments::ProcessorRegistry;

/// Health check response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

/// Readiness check response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessChecks {
    /// `ok`, `unavailable`, or `in_memory` when no database is configured
    pub storage: String,
    /// Names of the registered payment processors
    pub processors: Vec<String>,
}

/// GET /health - Liveness check
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// GET /ready - Readiness check
///
/// Not ready when the database is unreachable or no processor is registered.
pub async fn readiness_check(
    pool: Option<web::Data<MySqlPool>>,
    registry: Option<web::Data<ProcessorRegistry>>,
) -> impl Responder {
    let storage = match pool {
        Some(pool) => match sqlx::query("SELECT 1").fetch_one(pool.get_ref()).await {
            Ok(_) => "ok",
            Err(e) => {
                tracing::error!(error = %e, "Database readiness check failed");
                "unavailable"
            }
        },
        None => "in_memory",
    };

    let processors: Vec<String> = registry
        .map(|registry| registry.names().into_iter().map(String::from).collect())
        .unwrap_or_default();

    let ready = storage != "unavailable" && !processors.is_empty();
    let response = ReadinessResponse {
        ready,
        checks: ReadinessChecks {
            storage: storage.to_string(),
            processors,
        },
    };

    if ready {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

/// Configure health check routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/ready", web::get().to(readiness_check));
}

/// Health check routes

use actix_web::{http::StatusCode, web, HttpResponse, Responder};
use serde::Serialize;
use std::collections::HashMap;

use crate::app_state::AppState;
use crate::infra::{postgres, redis};

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    ready: bool,
    checks: HashMap<String, CheckResult>,
}

#[derive(Serialize)]
struct CheckResult {
    enabled: bool,
    ok: bool,
    details: String,
}

impl CheckResult {
    fn from_outcome(outcome: Result<(), String>) -> Self {
        match outcome {
            Ok(()) => Self {
                enabled: true,
                ok: true,
                details: "healthy".to_string(),
            },
            Err(details) => Self {
                enabled: true,
                ok: false,
                details,
            },
        }
    }

    /// Enabled in config but never connected
    fn missing() -> Self {
        Self {
            enabled: true,
            ok: false,
            details: "enabled but not connected".to_string(),
        }
    }

    /// Disabled in config; its in-memory stand-in is always ready
    fn in_memory() -> Self {
        Self {
            enabled: false,
            ok: true,
            details: "in-memory".to_string(),
        }
    }
}

pub async fn healthz() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn readyz(state: web::Data<AppState>) -> impl Responder {
    let mut checks = HashMap::new();

    let postgres_check = match state.postgres {
        Some(ref pool) => CheckResult::from_outcome(postgres::check_postgres_health(pool).await),
        None if state.postgres_enabled => CheckResult::missing(),
        None => CheckResult::in_memory(),
    };
    checks.insert("postgres".to_string(), postgres_check);

    let redis_check = match state.redis.clone() {
        Some(mut conn) => CheckResult::from_outcome(redis::check_redis_health(&mut conn).await),
        None if state.redis_enabled => CheckResult::missing(),
        None => CheckResult::in_memory(),
    };
    checks.insert("redis".to_string(), redis_check);

    let ready = checks.values().all(|check| check.ok);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    HttpResponse::build(status).json(ReadyResponse { ready, checks })
}

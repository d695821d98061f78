/// Route modules

pub mod auth;
pub mod health;
pub mod metrics;
pub mod openapi_routes;
pub mod version;

use actix_web::{error::JsonPayloadError, web, HttpRequest};

use crate::errors::ApiError;

pub fn configure(cfg: &mut web::ServiceConfig, body_limit_bytes: usize) {
    cfg.route("/healthz", web::get().to(health::healthz))
        .route("/readyz", web::get().to(health::readyz))
        .route("/version", web::get().to(version::version))
        .route("/metrics", web::get().to(metrics::get_metrics))
        .service(
            web::scope("/api-docs")
                .route("/openapi.json", web::get().to(openapi_routes::openapi_json)),
        )
        .service(
            web::scope("/api").service(
                web::scope("/auth")
                    .app_data(
                        web::JsonConfig::default()
                            .limit(body_limit_bytes)
                            .error_handler(json_error_handler),
                    )
                    .service(web::resource("/challenge").route(web::get().to(auth::get_challenge)))
                    .service(web::resource("/verify").route(web::post().to(auth::verify)))
                    .service(web::resource("/session").route(web::get().to(auth::get_session)))
                    .service(web::resource("/logout").route(web::post().to(auth::logout))),
            ),
        );
}

/// Malformed bodies get the same error shape as every other 400
fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(error = %err, "Rejected request body");
    ApiError::BadRequest {
        missing: Vec::new(),
        reason: Some(err.to_string()),
    }
    .into()
}

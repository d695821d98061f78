use actix_web::{web, HttpResponse, Responder};

use crate::app_state::AppState;

pub async fn get_metrics(state: web::Data<AppState>) -> impl Responder {
    match state.metrics.render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4; charset=utf-8")
            .body(body),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}

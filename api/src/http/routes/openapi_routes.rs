use actix_web::{web, HttpResponse, Responder};

use crate::app_state::AppState;

pub async fn openapi_json(state: web::Data<AppState>) -> impl Responder {
    let spec = crate::openapi::generate_openapi_spec(&state.service_config.version);
    HttpResponse::Ok().json(spec)
}

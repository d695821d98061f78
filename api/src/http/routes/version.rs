/// Version route

use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Serialize)]
struct VersionResponse {
    name: String,
    version: String,
    key_encoding: &'static str,
    enforce_challenge: bool,
}

pub async fn version(state: web::Data<AppState>) -> impl Responder {
    let settings = state.authenticator.settings();
    HttpResponse::Ok().json(VersionResponse {
        name: state.service_config.name.clone(),
        version: state.service_config.version.clone(),
        key_encoding: settings.encoding.as_str(),
        enforce_challenge: settings.enforce_challenge,
    })
}

/// HTTP server module

pub mod middleware;
pub mod routes;

use actix_cors::Cors;
use actix_web::{dev::Server, http, web, App, HttpServer};
use std::io;

use crate::app_state::AppState;
use crate::config::{Config, SecurityConfig};
use middleware::{logger::Logger, ratelimit::RateLimit, request_id::RequestId};

/// CORS policy from `security.cors_*`; `*` allows any origin or header
pub fn build_cors(security: &SecurityConfig) -> Cors {
    let mut cors = Cors::default();
    for origin in &security.cors_allowed_origins {
        if origin == "*" {
            cors = cors.allow_any_origin();
            break;
        }
        cors = cors.allowed_origin(origin);
    }

    let methods: Vec<http::Method> = security
        .cors_allowed_methods
        .iter()
        .filter_map(|m| m.parse::<http::Method>().ok())
        .collect();
    cors = cors.allowed_methods(methods);

    if security.cors_allowed_headers.iter().any(|h| h == "*") {
        cors.allow_any_header()
    } else {
        cors.allowed_headers(
            security
                .cors_allowed_headers
                .iter()
                .filter_map(|h| h.parse::<http::header::HeaderName>().ok())
                .collect::<Vec<_>>(),
        )
    }
}

/// Bind the listener and build the server without running it
pub fn start_server(config: Config, app_state: AppState) -> io::Result<Server> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    tracing::info!(
        service_name = %config.service.name,
        service_version = %config.service.version,
        bind_addr = %bind_addr,
        key_encoding = %config.auth.key_encoding,
        enforce_challenge = config.auth.enforce_challenge,
        log_level = %config.telemetry.log_level,
        log_format = %config.telemetry.log_format,
        "Starting HTTP server"
    );

    let app_state = web::Data::new(app_state);
    let request_id_header = config.telemetry.request_id_header.clone();
    let rate_limiter = RateLimit::new(config.rate_limit.clone());
    let security = config.security.clone();
    let body_limit = config.server.request_body_limit_bytes;

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(web::PayloadConfig::new(body_limit))
            .wrap(build_cors(&security))
            .wrap(Logger)
            .wrap(rate_limiter.clone())
            .wrap(RequestId::new(request_id_header.clone()))
            .configure(|cfg| routes::configure(cfg, body_limit))
    })
    .disable_signals();

    if config.server.workers > 0 {
        server = server.workers(config.server.workers);
    }

    Ok(server.bind(&bind_addr)?.run())
}

/// Authentication routes

use actix_web::{http::header, web, HttpRequest, HttpResponse};
use garden_auth::wire::VerifyRequest;

use crate::app_state::AppState;
use crate::errors::ApiError;
use crate::services::LoginError;

/// `GET /api/auth/challenge`
pub async fn get_challenge(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let challenge = state.authenticator.issue_challenge().await.map_err(|e| {
        tracing::error!(kind = e.kind(), error = %e, "Failed to issue challenge");
        ApiError::from(e)
    })?;

    Ok(HttpResponse::Ok().json(challenge))
}

/// `POST /api/auth/verify`
pub async fn verify(
    body: web::Json<VerifyRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let success = state
        .authenticator
        .verify_login(body.into_inner())
        .await
        .map_err(ApiError::from)?;

    Ok(HttpResponse::Ok().json(success.into_response()))
}

/// `GET /api/auth/session`
pub async fn get_session(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let token = bearer_token(&req)?;
    let session = state
        .authenticator
        .current_session(token)
        .await
        .map_err(|e| ApiError::from(LoginError::from(e)))?
        .ok_or_else(|| ApiError::Unauthorized {
            reason: "session_invalid".to_string(),
        })?;

    Ok(HttpResponse::Ok().json(session))
}

/// `POST /api/auth/logout`
pub async fn logout(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let token = bearer_token(&req)?;
    state
        .authenticator
        .logout(token)
        .await
        .map_err(|e| ApiError::from(LoginError::from(e)))?;

    Ok(HttpResponse::NoContent().finish())
}

fn bearer_token(req: &HttpRequest) -> Result<&str, ApiError> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Unauthorized {
            reason: "missing_bearer_token".to_string(),
        })
}

/// Error handling module
///
/// Provides unified error responses
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use garden_auth::wire::ErrorBody;
use std::fmt;

use crate::services::LoginError;

#[derive(Debug)]
pub enum ApiError {
    Internal {
        reason: String,
    },
    BadRequest {
        missing: Vec<String>,
        reason: Option<String>,
    },
    Unauthorized {
        reason: String,
    },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Internal { reason } => write!(f, "Internal error: {}", reason),
            ApiError::BadRequest { missing, reason } => {
                write!(f, "Bad request: {:?}, {:?}", missing, reason)
            }
            ApiError::Unauthorized { reason } => write!(f, "Unauthorized: {}", reason),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let response = match self {
            ApiError::Internal { reason } => ErrorBody {
                error: "Internal server error".to_string(),
                details: Some(reason.clone()),
                missing: None,
            },
            ApiError::BadRequest { missing, reason } => ErrorBody {
                error: if missing.is_empty() {
                    "Bad request".to_string()
                } else {
                    "Missing required parameters".to_string()
                },
                details: reason.clone(),
                missing: if missing.is_empty() {
                    None
                } else {
                    Some(missing.clone())
                },
            },
            ApiError::Unauthorized { reason } => ErrorBody {
                error: "Unauthorized".to_string(),
                details: Some(reason.clone()),
                missing: None,
            },
        };
        HttpResponse::build(status).json(response)
    }
}

impl From<LoginError> for ApiError {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::MissingParameter(fields) => ApiError::BadRequest {
                missing: fields.into_iter().map(str::to_string).collect(),
                reason: None,
            },
            LoginError::InvalidParameter { field, reason } => ApiError::BadRequest {
                missing: Vec::new(),
                reason: Some(format!("{}: {}", field, reason)),
            },
            LoginError::ChallengeRejected(_)
            | LoginError::BadEncoding(_)
            | LoginError::SignatureMismatch => ApiError::Unauthorized {
                reason: err.kind().to_string(),
            },
            LoginError::Provision(_)
            | LoginError::StorageUnavailable(_)
            | LoginError::RandomSource(_) => ApiError::Internal {
                reason: err.kind().to_string(),
            },
        }
    }
}

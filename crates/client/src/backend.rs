/// Transport to the sign-in service
use async_trait::async_trait;
use garden_auth::wire::{ErrorBody, SessionResponse, VerifyRequest, VerifyResponse};
use garden_auth::Challenge;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::ClientError;

#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn challenge(&self) -> Result<Challenge, ClientError>;

    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, ClientError>;

    async fn session(&self, token: &str) -> Result<SessionResponse, ClientError>;

    async fn logout(&self, token: &str) -> Result<(), ClientError>;
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// [`AuthBackend`] speaking JSON over HTTP to `/api/auth/*`
#[derive(Clone)]
pub struct HttpAuthBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/auth/{}", self.base_url, path)
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn challenge(&self) -> Result<Challenge, ClientError> {
        let response = self.client.get(self.url("challenge")).send().await?;
        read_json(response).await
    }

    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, ClientError> {
        let response = self.client.post(self.url("verify")).json(request).send().await?;
        read_json(response).await
    }

    async fn session(&self, token: &str) -> Result<SessionResponse, ClientError> {
        let response = self
            .client
            .get(self.url("session"))
            .bearer_auth(token)
            .send()
            .await?;
        read_json(response).await
    }

    async fn logout(&self, token: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.url("logout"))
            .bearer_auth(token)
            .send()
            .await?;
        if response.status().is_success() {
            return Ok(());
        }
        Err(read_error(response).await)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    if !response.status().is_success() {
        return Err(read_error(response).await);
    }
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| ClientError::InvalidResponse(e.to_string()))
}

async fn read_error(response: Response) -> ClientError {
    let status = response.status();
    let body = match response.bytes().await {
        Ok(bytes) => serde_json::from_slice::<ErrorBody>(&bytes).ok(),
        Err(e) => {
            tracing::debug!(error = %e, "Failed to read error body");
            None
        }
    };
    error_from_status(status, body)
}

fn error_from_status(status: StatusCode, body: Option<ErrorBody>) -> ClientError {
    let (error, details) = match body {
        Some(body) => (body.error, body.details),
        None => (
            status.canonical_reason().unwrap_or("Unexpected status").to_string(),
            None,
        ),
    };

    if status.is_client_error() {
        ClientError::Rejected {
            status: status.as_u16(),
            error,
            details,
        }
    } else if status.is_server_error() {
        ClientError::Server {
            status: status.as_u16(),
            error,
            details,
        }
    } else {
        ClientError::InvalidResponse(format!("unexpected status {status}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_status() {
        let body = ErrorBody {
            error: "Unauthorized".to_string(),
            details: Some("signature_mismatch".to_string()),
            missing: None,
        };
        let err = error_from_status(StatusCode::UNAUTHORIZED, Some(body));
        assert!(err.is_rejection());
        assert_eq!(err.rejection_kind(), Some("signature_mismatch"));

        let err = error_from_status(StatusCode::BAD_GATEWAY, None);
        assert!(matches!(err, ClientError::Server { status: 502, ref error, .. } if error == "Bad Gateway"));
        assert!(err.is_retryable());

        let err = error_from_status(StatusCode::MOVED_PERMANENTLY, None);
        assert!(matches!(err, ClientError::InvalidResponse(_)));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let backend = HttpAuthBackend::with_client(reqwest::Client::new(), "http://localhost:8080/");
        assert_eq!(backend.url("verify"), "http://localhost:8080/api/auth/verify");
    }
}

use thiserror::Error;

/// Failure reported by the wallet capability
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    /// The user refused to sign
    #[error("wallet declined to sign: {0}")]
    Declined(String),
    /// No wallet is connected or it stopped responding
    #[error("wallet unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("a wallet login is already in progress")]
    LoginInProgress,
    #[error(transparent)]
    Signer(#[from] SignerError),
    #[error("wallet approval timed out")]
    ApprovalTimedOut,
    /// A logout happened while this login was in flight
    #[error("login superseded by logout")]
    Superseded,
    /// 4xx from the service
    #[error("request rejected ({status}): {error}")]
    Rejected {
        status: u16,
        error: String,
        details: Option<String>,
    },
    /// 5xx from the service
    #[error("service error ({status}): {error}")]
    Server {
        status: u16,
        error: String,
        details: Option<String>,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// The signature or request was refused; sign a fresh challenge to retry
    pub fn is_rejection(&self) -> bool {
        matches!(self, ClientError::Rejected { status, .. } if *status != 429)
    }

    /// The service is temporarily unavailable; the same action may succeed later
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Server { .. } | ClientError::Transport(_) | ClientError::ApprovalTimedOut => true,
            ClientError::Rejected { status, .. } => *status == 429,
            _ => false,
        }
    }

    /// `details` of a rejection, e.g. `signature_mismatch`
    pub fn rejection_kind(&self) -> Option<&str> {
        match self {
            ClientError::Rejected { details, .. } => details.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::InvalidResponse(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(status: u16) -> ClientError {
        ClientError::Rejected {
            status,
            error: "Unauthorized".to_string(),
            details: Some("signature_mismatch".to_string()),
        }
    }

    #[test]
    fn test_classification() {
        assert!(rejected(401).is_rejection());
        assert!(!rejected(401).is_retryable());
        assert_eq!(rejected(401).rejection_kind(), Some("signature_mismatch"));

        assert!(rejected(429).is_retryable());
        assert!(!rejected(429).is_rejection());

        let server = ClientError::Server {
            status: 500,
            error: "Internal server error".to_string(),
            details: None,
        };
        assert!(server.is_retryable());
        assert!(!server.is_rejection());

        assert!(!ClientError::LoginInProgress.is_retryable());
        assert!(!ClientError::from(SignerError::Declined("no".to_string())).is_rejection());
    }
}

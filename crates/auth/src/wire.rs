/// JSON bodies exchanged between the sign-in service and its clients
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Body of `POST /api/auth/verify`.
///
/// Fields are optional on the wire so that an incomplete request can be
/// answered with the list of what is missing instead of a parse error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
}

impl VerifyRequest {
    pub fn new(
        public_key: impl Into<String>,
        signature: impl Into<String>,
        message: impl Into<String>,
        wallet_address: impl Into<String>,
    ) -> Self {
        Self {
            public_key: Some(public_key.into()),
            signature: Some(signature.into()),
            message: Some(message.into()),
            wallet_address: Some(wallet_address.into()),
        }
    }

    /// Wire names of required fields that are absent or empty
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("publicKey", &self.public_key),
            ("signature", &self.signature),
            ("message", &self.message),
            ("walletAddress", &self.wallet_address),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, str::is_empty))
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub wallet_address: String,
    pub public_key: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionGrant {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for SessionGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGrant")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub user: AuthenticatedUser,
    pub session: SessionGrant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user: AuthenticatedUser,
    pub session: SessionGrant,
}

/// Error body returned with every 4xx/5xx response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,
}

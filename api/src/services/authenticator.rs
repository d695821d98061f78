/// Sign-in orchestration
///
/// One verification call moves through
/// `Received -> ChallengeChecked -> SignatureChecked -> IdentityResolved -> SessionIssued`.
/// Any stage may end the call: parameter and signature problems are
/// rejections (the caller must re-sign), storage problems are failures
/// (the caller may retry the same attempt later).
use chrono::Utc;
use garden_auth::wire::{AuthenticatedUser, SessionGrant, SessionResponse, VerifyRequest, VerifyResponse};
use garden_auth::{parse_challenge_message, AuthError, Challenge, KeyEncoding, VerifyError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::provisioner::{IdentityProvisioner, ProvisionError};
use super::sessions::SessionIssuer;
use crate::config::AuthConfig;
use crate::metrics::AppMetrics;
use crate::repository::{ChallengeStore, Profile, ProfileRepository, Session, SessionStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
    Received,
    ChallengeChecked,
    SignatureChecked,
    IdentityResolved,
    SessionIssued,
}

impl LoginStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginStage::Received => "received",
            LoginStage::ChallengeChecked => "challenge_checked",
            LoginStage::SignatureChecked => "signature_checked",
            LoginStage::IdentityResolved => "identity_resolved",
            LoginStage::SessionIssued => "session_issued",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChallengeRejection {
    #[error("message is not a sign-in challenge")]
    Malformed,
    #[error("challenge was never issued or is already used")]
    Unknown,
    #[error("challenge expired")]
    Expired,
    #[error("message differs from the issued challenge")]
    Altered,
}

impl ChallengeRejection {
    pub fn kind(&self) -> &'static str {
        match self {
            ChallengeRejection::Malformed => "challenge_malformed",
            ChallengeRejection::Unknown => "challenge_unknown",
            ChallengeRejection::Expired => "challenge_expired",
            ChallengeRejection::Altered => "challenge_altered",
        }
    }
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("missing required parameters: {}", .0.join(", "))]
    MissingParameter(Vec<&'static str>),
    #[error("invalid {field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },
    #[error("challenge rejected: {0}")]
    ChallengeRejected(ChallengeRejection),
    #[error("bad encoding: {0}")]
    BadEncoding(AuthError),
    #[error("signature does not match message and public key")]
    SignatureMismatch,
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error(transparent)]
    StorageUnavailable(#[from] StoreError),
    #[error("secure random source failed: {0}")]
    RandomSource(AuthError),
}

impl LoginError {
    /// Stable label used in logs, metrics and 401/500 response details
    pub fn kind(&self) -> &'static str {
        match self {
            LoginError::MissingParameter(_) => "missing_parameter",
            LoginError::InvalidParameter { .. } => "invalid_parameter",
            LoginError::ChallengeRejected(rejection) => rejection.kind(),
            LoginError::BadEncoding(_) => "bad_encoding",
            LoginError::SignatureMismatch => "signature_mismatch",
            LoginError::Provision(ProvisionError::DuplicateIdentityRace { .. }) => {
                "identity_store_inconsistent"
            }
            LoginError::Provision(ProvisionError::StorageUnavailable(e))
            | LoginError::StorageUnavailable(e) => match e {
                StoreError::Unavailable(_) => "storage_unavailable",
                StoreError::Corrupt(_) => "storage_corrupt",
            },
            LoginError::RandomSource(_) => "random_source",
        }
    }

    /// The caller must change the request (new challenge, new signature)
    pub fn is_rejection(&self) -> bool {
        !self.is_failure()
    }

    /// Server-side problem; the same attempt may succeed later
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            LoginError::Provision(_) | LoginError::StorageUnavailable(_) | LoginError::RandomSource(_)
        )
    }
}

impl From<VerifyError> for LoginError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::BadEncoding(e) => LoginError::BadEncoding(e),
            VerifyError::SignatureMismatch => LoginError::SignatureMismatch,
        }
    }
}

/// A verification request with every field present and the wallet address
/// checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAttempt {
    pub public_key: String,
    pub signature: String,
    pub message: String,
    pub wallet_address: String,
}

impl LoginAttempt {
    pub fn parse(request: VerifyRequest, max_wallet_address_len: usize) -> Result<Self, LoginError> {
        let missing = request.missing_fields();
        if !missing.is_empty() {
            return Err(LoginError::MissingParameter(missing));
        }

        let (Some(public_key), Some(signature), Some(message), Some(wallet_address)) = (
            request.public_key,
            request.signature,
            request.message,
            request.wallet_address,
        ) else {
            return Err(LoginError::MissingParameter(Vec::new()));
        };

        if wallet_address.chars().count() > max_wallet_address_len {
            return Err(LoginError::InvalidParameter {
                field: "walletAddress",
                reason: format!("longer than {} characters", max_wallet_address_len),
            });
        }
        if wallet_address
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(LoginError::InvalidParameter {
                field: "walletAddress",
                reason: "contains whitespace or control characters".to_string(),
            });
        }

        Ok(Self {
            public_key,
            signature,
            message,
            wallet_address,
        })
    }
}

#[derive(Debug, Clone)]
pub struct LoginSuccess {
    pub profile: Profile,
    pub session: Session,
    /// Profile was created by this login
    pub created: bool,
}

impl LoginSuccess {
    pub fn into_response(self) -> VerifyResponse {
        VerifyResponse {
            success: true,
            user: authenticated_user(&self.profile, &self.session),
            session: session_grant(&self.session),
        }
    }
}

pub fn authenticated_user(profile: &Profile, session: &Session) -> AuthenticatedUser {
    AuthenticatedUser {
        id: profile.id,
        wallet_address: profile.wallet_address.clone(),
        public_key: session.public_key.clone(),
        display_name: profile.display_name.clone(),
        avatar_url: profile.avatar_url.clone(),
    }
}

pub fn session_grant(session: &Session) -> SessionGrant {
    SessionGrant {
        access_token: session.token.clone(),
        expires_at: session.expires_at,
    }
}

#[derive(Debug, Clone)]
pub struct AuthenticatorSettings {
    pub encoding: KeyEncoding,
    pub enforce_challenge: bool,
    pub challenge_ttl: Duration,
    pub session_ttl_secs: u64,
    pub max_wallet_address_len: usize,
}

impl AuthenticatorSettings {
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        Ok(Self {
            encoding: config.encoding()?,
            enforce_challenge: config.enforce_challenge,
            challenge_ttl: Duration::from_secs(config.challenge_ttl_secs),
            session_ttl_secs: config.session_ttl_secs,
            max_wallet_address_len: config.max_wallet_address_len,
        })
    }
}

impl Default for AuthenticatorSettings {
    fn default() -> Self {
        Self {
            encoding: KeyEncoding::Hex,
            enforce_challenge: true,
            challenge_ttl: Duration::from_secs(300),
            session_ttl_secs: 86_400,
            max_wallet_address_len: 128,
        }
    }
}

pub struct Authenticator {
    settings: AuthenticatorSettings,
    challenges: Arc<dyn ChallengeStore>,
    profiles: Arc<dyn ProfileRepository>,
    provisioner: IdentityProvisioner,
    sessions: SessionIssuer,
    metrics: AppMetrics,
}

impl Authenticator {
    pub fn new(
        settings: AuthenticatorSettings,
        challenges: Arc<dyn ChallengeStore>,
        profiles: Arc<dyn ProfileRepository>,
        sessions: Arc<dyn SessionStore>,
        metrics: AppMetrics,
    ) -> Self {
        Self {
            provisioner: IdentityProvisioner::new(profiles.clone()),
            sessions: SessionIssuer::new(sessions, settings.session_ttl_secs),
            settings,
            challenges,
            profiles,
            metrics,
        }
    }

    pub fn settings(&self) -> &AuthenticatorSettings {
        &self.settings
    }

    pub async fn issue_challenge(&self) -> Result<Challenge, LoginError> {
        let challenge = garden_auth::issue_challenge().map_err(LoginError::RandomSource)?;
        if self.settings.enforce_challenge {
            self.challenges
                .save(&challenge, self.settings.challenge_ttl)
                .await?;
        }

        self.metrics.challenge_issued();
        tracing::debug!(nonce = %challenge.nonce, "Issued sign-in challenge");
        Ok(challenge)
    }

    pub async fn verify_login(&self, request: VerifyRequest) -> Result<LoginSuccess, LoginError> {
        let wallet_address = request.wallet_address.clone().unwrap_or_default();
        let result = self.run_login(request).await;

        match &result {
            Ok(success) => {
                self.metrics.verification("success");
                if success.created {
                    self.metrics.identity_provisioned();
                }
                tracing::info!(
                    wallet_address = %success.profile.wallet_address,
                    identity_id = %success.profile.id,
                    created = success.created,
                    stage = LoginStage::SessionIssued.as_str(),
                    "Wallet sign-in succeeded"
                );
            }
            Err(err) => {
                self.metrics.verification(err.kind());
                if err.is_failure() {
                    tracing::error!(
                        wallet_address = %wallet_address,
                        kind = err.kind(),
                        error = %err,
                        "Wallet sign-in failed"
                    );
                } else {
                    tracing::warn!(
                        wallet_address = %wallet_address,
                        kind = err.kind(),
                        "Wallet sign-in rejected"
                    );
                }
            }
        }

        result
    }

    async fn run_login(&self, request: VerifyRequest) -> Result<LoginSuccess, LoginError> {
        let attempt = LoginAttempt::parse(request, self.settings.max_wallet_address_len)?;
        tracing::debug!(
            wallet_address = %attempt.wallet_address,
            stage = LoginStage::Received.as_str(),
            "Verification request parsed"
        );

        if self.settings.enforce_challenge {
            self.check_challenge(&attempt.message).await?;
            tracing::debug!(
                wallet_address = %attempt.wallet_address,
                stage = LoginStage::ChallengeChecked.as_str(),
                "Challenge consumed"
            );
        }

        garden_auth::verify(
            &attempt.public_key,
            &attempt.message,
            &attempt.signature,
            self.settings.encoding,
        )?;
        tracing::debug!(
            wallet_address = %attempt.wallet_address,
            stage = LoginStage::SignatureChecked.as_str(),
            "Signature verified"
        );

        let identity = self.provisioner.provision(&attempt.wallet_address).await?;
        tracing::debug!(
            wallet_address = %attempt.wallet_address,
            identity_id = %identity.profile.id,
            stage = LoginStage::IdentityResolved.as_str(),
            "Identity resolved"
        );

        let session = self
            .sessions
            .mint(&identity.profile, &attempt.public_key)
            .await?;

        Ok(LoginSuccess {
            profile: identity.profile,
            session,
            created: identity.created,
        })
    }

    /// Consumes the challenge named in `message` whatever the outcome
    async fn check_challenge(&self, message: &str) -> Result<(), LoginError> {
        let fields = parse_challenge_message(message)
            .ok_or(LoginError::ChallengeRejected(ChallengeRejection::Malformed))?;

        let issued = self
            .challenges
            .consume(fields.nonce)
            .await?
            .ok_or(LoginError::ChallengeRejected(ChallengeRejection::Unknown))?;

        if issued.message != message {
            return Err(LoginError::ChallengeRejected(ChallengeRejection::Altered));
        }

        let age_millis = Utc::now().timestamp_millis() - issued.issued_at_millis;
        let ttl_millis = i64::try_from(self.settings.challenge_ttl.as_millis()).unwrap_or(i64::MAX);
        if age_millis > ttl_millis {
            return Err(LoginError::ChallengeRejected(ChallengeRejection::Expired));
        }

        Ok(())
    }

    /// Profile and session behind a bearer token, if still live
    pub async fn current_session(&self, token: &str) -> Result<Option<SessionResponse>, StoreError> {
        let Some(session) = self.sessions.resolve(token).await? else {
            return Ok(None);
        };
        let Some(profile) = self.profiles.find_by_id(session.identity_id).await? else {
            tracing::warn!(
                identity_id = %session.identity_id,
                "Session refers to a missing profile"
            );
            return Ok(None);
        };

        Ok(Some(SessionResponse {
            user: authenticated_user(&profile, &session),
            session: session_grant(&session),
        }))
    }

    /// `true` when a live session was revoked
    pub async fn logout(&self, token: &str) -> Result<bool, StoreError> {
        let revoked = self.sessions.revoke(token).await?;
        if revoked {
            self.metrics.session_revoked();
            tracing::info!("Session revoked");
        }
        Ok(revoked)
    }
}

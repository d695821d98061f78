use chrono::{Duration, Utc};
use std::sync::Arc;

use super::authenticator::LoginError;
use crate::repository::{Profile, Session, SessionStore, StoreError};

/// Upper bound keeps `chrono::Duration` arithmetic in range
const MAX_SESSION_TTL_SECS: u64 = 10 * 365 * 86_400;

/// Mints opaque bearer tokens and resolves them back to sessions
#[derive(Clone)]
pub struct SessionIssuer {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
}

impl SessionIssuer {
    pub fn new(store: Arc<dyn SessionStore>, ttl_secs: u64) -> Self {
        Self {
            store,
            ttl: Duration::seconds(ttl_secs.clamp(1, MAX_SESSION_TTL_SECS) as i64),
        }
    }

    pub async fn mint(&self, profile: &Profile, public_key: &str) -> Result<Session, LoginError> {
        let token = garden_auth::generate_token().map_err(LoginError::RandomSource)?;
        let issued_at = Utc::now();
        let session = Session {
            token,
            identity_id: profile.id,
            wallet_address: profile.wallet_address.clone(),
            public_key: public_key.to_string(),
            issued_at,
            expires_at: issued_at + self.ttl,
        };

        self.store.insert(&session).await?;
        Ok(session)
    }

    pub async fn resolve(&self, token: &str) -> Result<Option<Session>, StoreError> {
        self.store.get(token).await
    }

    pub async fn revoke(&self, token: &str) -> Result<bool, StoreError> {
        self.store.remove(token).await
    }
}

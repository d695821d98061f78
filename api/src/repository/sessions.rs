use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::StoreError;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub identity_id: Uuid,
    pub wallet_address: String,
    pub public_key: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    fn ttl_secs(&self) -> u64 {
        (self.expires_at - self.issued_at).num_seconds().max(1) as u64
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("identity_id", &self.identity_id)
            .field("wallet_address", &self.wallet_address)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: &Session) -> Result<(), StoreError>;

    /// Live session for `token`; expired sessions are reported as absent
    async fn get(&self, token: &str) -> Result<Option<Session>, StoreError>;

    /// `true` when a session was removed
    async fn remove(&self, token: &str) -> Result<bool, StoreError>;
}

pub struct RedisSessionStore {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisSessionStore {
    pub fn new(conn: ConnectionManager, key_prefix: impl Into<String>) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
        }
    }

    fn key(&self, token: &str) -> String {
        format!("{}:{}", self.key_prefix, token)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn insert(&self, session: &Session) -> Result<(), StoreError> {
        let payload =
            serde_json::to_string(session).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let mut conn = self.conn.clone();

        redis::cmd("SETEX")
            .arg(self.key(&session.token))
            .arg(session.ttl_secs())
            .arg(payload)
            .query_async::<()>(&mut conn)
            .await?;

        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<Session>, StoreError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = redis::cmd("GET")
            .arg(self.key(token))
            .query_async(&mut conn)
            .await?;

        let Some(raw) = payload else {
            return Ok(None);
        };
        let session: Session = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Corrupt(format!("session record: {}", e)))?;

        Ok((!session.is_expired_at(Utc::now())).then_some(session))
    }

    async fn remove(&self, token: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("DEL")
            .arg(self.key(token))
            .query_async(&mut conn)
            .await?;

        Ok(removed > 0)
    }
}

/// Process-local session store for development and tests
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: &Session) -> Result<(), StoreError> {
        let now = Utc::now();
        self.sessions.retain(|_, s| !s.is_expired_at(now));
        self.sessions.insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<Session>, StoreError> {
        let now = Utc::now();
        let found = self.sessions.get(token).map(|s| s.clone());
        match found {
            Some(session) if session.is_expired_at(now) => {
                self.sessions.remove(token);
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn remove(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.sessions.remove(token).is_some())
    }
}

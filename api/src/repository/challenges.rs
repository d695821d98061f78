use async_trait::async_trait;
use dashmap::DashMap;
use garden_auth::Challenge;
use redis::aio::ConnectionManager;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::StoreError;

/// Pending challenges, each usable at most once
#[async_trait]
pub trait ChallengeStore: Send + Sync {
    async fn save(&self, challenge: &Challenge, ttl: Duration) -> Result<(), StoreError>;

    /// Remove and return the challenge issued with `nonce`.
    ///
    /// `None` when it was never issued, has expired or was already consumed.
    async fn consume(&self, nonce: &str) -> Result<Option<Challenge>, StoreError>;
}

pub struct RedisChallengeStore {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisChallengeStore {
    pub fn new(conn: ConnectionManager, key_prefix: impl Into<String>) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
        }
    }

    fn key(&self, nonce: &str) -> String {
        format!("{}:{}", self.key_prefix, nonce)
    }
}

#[async_trait]
impl ChallengeStore for RedisChallengeStore {
    async fn save(&self, challenge: &Challenge, ttl: Duration) -> Result<(), StoreError> {
        let payload =
            serde_json::to_string(challenge).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let mut conn = self.conn.clone();

        redis::cmd("SETEX")
            .arg(self.key(&challenge.nonce))
            .arg(ttl.as_secs().max(1))
            .arg(payload)
            .query_async::<()>(&mut conn)
            .await?;

        Ok(())
    }

    async fn consume(&self, nonce: &str) -> Result<Option<Challenge>, StoreError> {
        let mut conn = self.conn.clone();

        // GETDEL makes read-and-delete a single step, so two concurrent
        // attempts can never both see the same challenge
        let payload: Option<String> = redis::cmd("GETDEL")
            .arg(self.key(nonce))
            .query_async(&mut conn)
            .await?;

        payload
            .map(|raw| {
                serde_json::from_str::<Challenge>(&raw)
                    .map_err(|e| StoreError::Corrupt(format!("challenge {}: {}", nonce, e)))
            })
            .transpose()
    }
}

const DEFAULT_CAPACITY: usize = 100_000;
const DEFAULT_PRUNE_INTERVAL: Duration = Duration::from_secs(30);

/// Process-local challenge store for development and tests.
///
/// Expired entries are swept at most once per prune interval. Once
/// `capacity` live challenges are pending, new ones are refused until
/// entries expire or are consumed.
pub struct InMemoryChallengeStore {
    entries: DashMap<String, (Challenge, Instant)>,
    capacity: usize,
    prune_interval: Duration,
    next_prune: Mutex<Instant>,
}

impl Default for InMemoryChallengeStore {
    fn default() -> Self {
        Self::with_limits(DEFAULT_CAPACITY, DEFAULT_PRUNE_INTERVAL)
    }
}

impl InMemoryChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(capacity: usize, prune_interval: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
            prune_interval,
            next_prune: Mutex::new(Instant::now() + prune_interval),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn prune_if_due(&self, now: Instant) {
        let Ok(mut next_prune) = self.next_prune.try_lock() else {
            // another caller is sweeping
            return;
        };
        if now < *next_prune {
            return;
        }
        *next_prune = now + self.prune_interval;
        drop(next_prune);

        let before = self.entries.len();
        self.entries.retain(|_, (_, expires_at)| *expires_at > now);
        tracing::debug!(
            removed = before.saturating_sub(self.entries.len()),
            remaining = self.entries.len(),
            "Pruned expired challenges"
        );
    }
}

#[async_trait]
impl ChallengeStore for InMemoryChallengeStore {
    async fn save(&self, challenge: &Challenge, ttl: Duration) -> Result<(), StoreError> {
        let now = Instant::now();
        self.prune_if_due(now);

        if self.entries.len() >= self.capacity {
            tracing::warn!(capacity = self.capacity, "In-memory challenge store is full");
            return Err(StoreError::Unavailable(
                "too many pending challenges".to_string(),
            ));
        }
        self.entries
            .insert(challenge.nonce.clone(), (challenge.clone(), now + ttl));
        Ok(())
    }

    async fn consume(&self, nonce: &str) -> Result<Option<Challenge>, StoreError> {
        Ok(self
            .entries
            .remove(nonce)
            .filter(|(_, (_, expires_at))| *expires_at > Instant::now())
            .map(|(_, (challenge, _))| challenge))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_consume_is_single_use() {
        let store = InMemoryChallengeStore::new();
        let challenge = Challenge::new("n-1", 1);
        store
            .save(&challenge, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.consume("n-1").await.unwrap(), Some(challenge));
        assert_eq!(store.consume("n-1").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_nonce() {
        let store = InMemoryChallengeStore::new();
        assert_eq!(store.consume("never-issued").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_challenge_is_not_returned() {
        let store = InMemoryChallengeStore::new();
        store
            .save(&Challenge::new("n-2", 1), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(store.consume("n-2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_full_store_refuses_until_space_frees() {
        let store = InMemoryChallengeStore::with_limits(2, Duration::from_secs(3600));
        let ttl = Duration::from_secs(60);
        store.save(&Challenge::new("a", 1), ttl).await.unwrap();
        store.save(&Challenge::new("b", 1), ttl).await.unwrap();

        let err = store.save(&Challenge::new("c", 1), ttl).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.len(), 2);

        store.consume("a").await.unwrap();
        store.save(&Challenge::new("c", 1), ttl).await.unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_expired_entries_are_swept_on_interval() {
        let store = InMemoryChallengeStore::with_limits(2, Duration::ZERO);
        store.save(&Challenge::new("a", 1), Duration::ZERO).await.unwrap();
        store.save(&Challenge::new("b", 1), Duration::ZERO).await.unwrap();

        store
            .save(&Challenge::new("c", 1), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.consume("c").await.unwrap().map(|c| c.nonce), Some("c".to_string()));
    }

    #[tokio::test]
    async fn test_sweep_waits_for_interval() {
        let store = InMemoryChallengeStore::with_limits(10, Duration::from_secs(3600));
        store.save(&Challenge::new("a", 1), Duration::ZERO).await.unwrap();
        store.save(&Challenge::new("b", 1), Duration::ZERO).await.unwrap();
        assert_eq!(store.len(), 2);
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use super::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub wallet_address: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    pub id: Uuid,
    pub wallet_address: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl NewProfile {
    pub fn for_wallet(wallet_address: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet_address: wallet_address.to_string(),
            display_name: default_display_name(wallet_address),
            avatar_url: None,
        }
    }
}

/// `User 0x1a2b...9f0e`; short addresses are shown whole
pub fn default_display_name(wallet_address: &str) -> String {
    let chars: Vec<char> = wallet_address.chars().collect();
    if chars.len() <= 10 {
        return format!("User {}", wallet_address);
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("User {}...{}", head, tail)
}

#[derive(Debug, Error)]
pub enum CreateProfileError {
    #[error("wallet address {wallet_address} already has a profile")]
    Duplicate { wallet_address: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Identity store keyed by a unique wallet address.
///
/// `create` must report a uniqueness violation as
/// [`CreateProfileError::Duplicate`] and nothing else as such.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_by_wallet_address(
        &self,
        wallet_address: &str,
    ) -> Result<Option<Profile>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>, StoreError>;

    async fn create(&self, profile: &NewProfile) -> Result<Profile, CreateProfileError>;
}

pub struct PgProfileRepository {
    pool: PgPool,
}

impl PgProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileRepository for PgProfileRepository {
    async fn find_by_wallet_address(
        &self,
        wallet_address: &str,
    ) -> Result<Option<Profile>, StoreError> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, wallet_address, display_name, avatar_url, created_at
            FROM profiles
            WHERE wallet_address = $1
            "#,
        )
        .bind(wallet_address)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, wallet_address, display_name, avatar_url, created_at
            FROM profiles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn create(&self, profile: &NewProfile) -> Result<Profile, CreateProfileError> {
        sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, wallet_address, display_name, avatar_url)
            VALUES ($1, $2, $3, $4)
            RETURNING id, wallet_address, display_name, avatar_url, created_at
            "#,
        )
        .bind(profile.id)
        .bind(&profile.wallet_address)
        .bind(&profile.display_name)
        .bind(&profile.avatar_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e: sqlx::Error| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                CreateProfileError::Duplicate {
                    wallet_address: profile.wallet_address.clone(),
                }
            }
            other => CreateProfileError::Store(other.into()),
        })
    }
}

/// Process-local identity store for development and tests
#[derive(Default)]
pub struct InMemoryProfileRepository {
    by_id: DashMap<Uuid, Profile>,
    id_by_wallet: DashMap<String, Uuid>,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.id_by_wallet.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_by_wallet.is_empty()
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn find_by_wallet_address(
        &self,
        wallet_address: &str,
    ) -> Result<Option<Profile>, StoreError> {
        let Some(id) = self.id_by_wallet.get(wallet_address).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.by_id.get(&id).map(|p| p.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        Ok(self.by_id.get(&id).map(|p| p.clone()))
    }

    async fn create(&self, profile: &NewProfile) -> Result<Profile, CreateProfileError> {
        // The vacant entry holds the wallet shard lock until the id is published
        match self.id_by_wallet.entry(profile.wallet_address.clone()) {
            Entry::Occupied(_) => Err(CreateProfileError::Duplicate {
                wallet_address: profile.wallet_address.clone(),
            }),
            Entry::Vacant(slot) => {
                let stored = Profile {
                    id: profile.id,
                    wallet_address: profile.wallet_address.clone(),
                    display_name: profile.display_name.clone(),
                    avatar_url: profile.avatar_url.clone(),
                    created_at: Utc::now(),
                };
                self.by_id.insert(stored.id, stored.clone());
                slot.insert(stored.id);
                Ok(stored)
            }
        }
    }
}

// Repository layer for identity, challenge and session storage
// Every adapter parses what it reads into typed records before returning it

pub mod challenges;
pub mod profiles;
pub mod sessions;

pub use challenges::{ChallengeStore, InMemoryChallengeStore, RedisChallengeStore};
pub use profiles::{
    default_display_name, CreateProfileError, InMemoryProfileRepository, NewProfile,
    PgProfileRepository, Profile, ProfileRepository,
};
pub use sessions::{InMemorySessionStore, RedisSessionStore, Session, SessionStore};

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Backend unreachable or the query failed; callers may retry later
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    /// Backend answered with data that does not parse into a record
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Corrupt(err.to_string())
            }
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

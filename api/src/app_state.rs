/// Application state

use crate::config::{Config, ServiceConfig};
use crate::metrics::AppMetrics;
use crate::repository::{
    ChallengeStore, InMemoryChallengeStore, InMemoryProfileRepository, InMemorySessionStore,
    PgProfileRepository, ProfileRepository, RedisChallengeStore, RedisSessionStore, SessionStore,
};
use crate::services::{Authenticator, AuthenticatorSettings};
use garden_auth::AuthError;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub service_config: ServiceConfig,
    pub authenticator: Arc<Authenticator>,
    pub metrics: AppMetrics,
    pub postgres: Option<PgPool>,
    pub redis: Option<ConnectionManager>,
    /// Backends the configuration asks for; readiness fails while one is missing
    pub postgres_enabled: bool,
    pub redis_enabled: bool,
}

impl AppState {
    /// Wire the sign-in services onto whichever backends are connected.
    ///
    /// A missing Postgres pool or Redis connection is replaced by the
    /// process-local store for that concern. When the backend is enabled in
    /// `integrations` the service keeps running but reports not ready.
    pub fn new(
        config: &Config,
        metrics: AppMetrics,
        postgres: Option<PgPool>,
        redis: Option<ConnectionManager>,
    ) -> Result<Self, AuthError> {
        let settings = AuthenticatorSettings::from_config(&config.auth)?;

        let profiles: Arc<dyn ProfileRepository> = match &postgres {
            Some(pool) => Arc::new(PgProfileRepository::new(pool.clone())),
            None if config.integrations.enable_postgres => {
                tracing::error!("PostgreSQL enabled but unavailable, profiles are kept in memory until restart");
                Arc::new(InMemoryProfileRepository::new())
            }
            None => {
                tracing::warn!("PostgreSQL disabled, profiles are kept in memory");
                Arc::new(InMemoryProfileRepository::new())
            }
        };

        let (challenges, sessions): (Arc<dyn ChallengeStore>, Arc<dyn SessionStore>) = match &redis {
            Some(conn) => (
                Arc::new(RedisChallengeStore::new(
                    conn.clone(),
                    config.auth.challenge_key_prefix.clone(),
                )),
                Arc::new(RedisSessionStore::new(
                    conn.clone(),
                    config.auth.session_key_prefix.clone(),
                )),
            ),
            None => {
                if config.integrations.enable_redis {
                    tracing::error!("Redis enabled but unavailable, challenges and sessions are kept in memory");
                } else {
                    tracing::warn!("Redis disabled, challenges and sessions are kept in memory");
                }
                (
                    Arc::new(InMemoryChallengeStore::new()),
                    Arc::new(InMemorySessionStore::new()),
                )
            }
        };

        let authenticator = Authenticator::new(settings, challenges, profiles, sessions, metrics.clone());

        Ok(Self {
            service_config: config.service.clone(),
            authenticator: Arc::new(authenticator),
            metrics,
            postgres,
            redis,
            postgres_enabled: config.integrations.enable_postgres,
            redis_enabled: config.integrations.enable_redis,
        })
    }

    /// State backed only by in-memory stores, with both backends disabled
    pub fn in_memory(config: &Config, metrics: AppMetrics) -> Result<Self, AuthError> {
        let mut config = config.clone();
        config.integrations.enable_postgres = false;
        config.integrations.enable_redis = false;
        Self::new(&config, metrics, None, None)
    }
}

/// Configuration module
///
/// Loads configuration from TOML files and environment variables.
/// Priority: ENV > TOML > defaults
use garden_auth::KeyEncoding;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub integrations: IntegrationsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub db: DbConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default = "default_service_version")]
    pub version: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_body_limit")]
    pub request_body_limit_bytes: usize,
    /// 0 = actix default (one per core)
    #[serde(default)]
    pub workers: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_request_id_header")]
    pub request_id_header: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IntegrationsConfig {
    #[serde(default = "default_true")]
    pub enable_postgres: bool,
    #[serde(default = "default_true")]
    pub enable_redis: bool,

    // Postgres
    #[serde(default)]
    pub database_url: String,
    #[serde(default = "default_pg_max_connections")]
    pub pg_max_connections: u32,
    #[serde(default = "default_pg_connect_timeout_ms")]
    pub pg_connect_timeout_ms: u64,
    #[serde(default = "default_pg_idle_timeout_ms")]
    pub pg_idle_timeout_ms: u64,

    // Redis
    #[serde(default)]
    pub redis_url: String,
    #[serde(default = "default_redis_connect_timeout_ms")]
    pub redis_connect_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// hex | base58 | base64
    #[serde(default = "default_key_encoding")]
    pub key_encoding: String,
    /// Require every signed message to be a live, unused challenge issued here
    #[serde(default = "default_true")]
    pub enforce_challenge: bool,
    #[serde(default = "default_challenge_ttl_secs")]
    pub challenge_ttl_secs: u64,
    #[serde(default = "default_challenge_key_prefix")]
    pub challenge_key_prefix: String,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_session_key_prefix")]
    pub session_key_prefix: String,
    #[serde(default = "default_max_wallet_address_len")]
    pub max_wallet_address_len: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub respect_x_forwarded_for: bool,
    #[serde(default = "default_ip_max_requests")]
    pub ip_max_requests: u32,
    #[serde(default = "default_ip_window_secs")]
    pub ip_window_secs: u64,
    #[serde(default = "default_protect_prefixes")]
    pub protect_prefixes: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SecurityConfig {
    #[serde(default = "default_cors_allowed_origins")]
    pub cors_allowed_origins: Vec<String>,
    #[serde(default = "default_cors_allowed_methods")]
    pub cors_allowed_methods: Vec<String>,
    #[serde(default = "default_cors_allowed_headers")]
    pub cors_allowed_headers: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DbConfig {
    #[serde(default)]
    pub run_migrations_on_start: bool,
}

impl AuthConfig {
    pub fn encoding(&self) -> Result<KeyEncoding, garden_auth::AuthError> {
        self.key_encoding.parse()
    }
}

// Defaults
fn default_service_name() -> String {
    "garden-auth-api".to_string()
}

fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_body_limit() -> usize {
    16_384
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_id_header() -> String {
    "x-request-id".to_string()
}

fn default_true() -> bool {
    true
}

fn default_pg_max_connections() -> u32 {
    10
}

fn default_pg_connect_timeout_ms() -> u64 {
    3000
}

fn default_pg_idle_timeout_ms() -> u64 {
    300000
}

fn default_redis_connect_timeout_ms() -> u64 {
    1000
}

fn default_key_encoding() -> String {
    "hex".to_string()
}

fn default_challenge_ttl_secs() -> u64 {
    300
}

fn default_challenge_key_prefix() -> String {
    "auth:challenge".to_string()
}

fn default_session_ttl_secs() -> u64 {
    86_400
}

fn default_session_key_prefix() -> String {
    "auth:session".to_string()
}

fn default_max_wallet_address_len() -> usize {
    128
}

fn default_ip_max_requests() -> u32 {
    30
}

fn default_ip_window_secs() -> u64 {
    60
}

fn default_protect_prefixes() -> Vec<String> {
    vec!["/api/auth".to_string()]
}

fn default_cors_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_cors_allowed_methods() -> Vec<String> {
    vec!["GET".to_string(), "POST".to_string(), "OPTIONS".to_string()]
}

fn default_cors_allowed_headers() -> Vec<String> {
    vec![
        "authorization".to_string(),
        "x-client-info".to_string(),
        "apikey".to_string(),
        "content-type".to_string(),
    ]
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            version: default_service_version(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_body_limit_bytes: default_request_body_limit(),
            workers: 0,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            log_level: default_log_level(),
            request_id_header: default_request_id_header(),
        }
    }
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            enable_postgres: true,
            enable_redis: true,
            database_url: String::new(),
            pg_max_connections: default_pg_max_connections(),
            pg_connect_timeout_ms: default_pg_connect_timeout_ms(),
            pg_idle_timeout_ms: default_pg_idle_timeout_ms(),
            redis_url: String::new(),
            redis_connect_timeout_ms: default_redis_connect_timeout_ms(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            key_encoding: default_key_encoding(),
            enforce_challenge: true,
            challenge_ttl_secs: default_challenge_ttl_secs(),
            challenge_key_prefix: default_challenge_key_prefix(),
            session_ttl_secs: default_session_ttl_secs(),
            session_key_prefix: default_session_key_prefix(),
            max_wallet_address_len: default_max_wallet_address_len(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            respect_x_forwarded_for: false,
            ip_max_requests: default_ip_max_requests(),
            ip_window_secs: default_ip_window_secs(),
            protect_prefixes: default_protect_prefixes(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            cors_allowed_origins: default_cors_allowed_origins(),
            cors_allowed_methods: default_cors_allowed_methods(),
            cors_allowed_headers: default_cors_allowed_headers(),
        }
    }
}

impl Config {
    /// Reject values serde accepts but the service cannot run with
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        self.auth
            .encoding()
            .map_err(|e| config::ConfigError::Message(format!("auth.key_encoding: {}", e)))?;
        if self.auth.challenge_ttl_secs == 0 {
            return Err(config::ConfigError::Message(
                "auth.challenge_ttl_secs must be positive".to_string(),
            ));
        }
        if self.auth.session_ttl_secs == 0 {
            return Err(config::ConfigError::Message(
                "auth.session_ttl_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn load_config() -> Result<Config, config::ConfigError> {
    let env = env::var("APP__ENV").unwrap_or_else(|_| "dev".to_string());

    let mut builder = config::Config::builder();

    // Try to load TOML file, but don't fail if it doesn't exist
    let config_path = format!("configs/{}/default", env);
    if std::path::Path::new(&format!("{}.toml", config_path)).exists() {
        builder = builder.add_source(config::File::with_name(&config_path).required(false));
    }

    // Environment variables override with APP__ prefix
    builder = builder.add_source(
        config::Environment::with_prefix("APP")
            .separator("__")
            .try_parsing(true),
    );

    let config: Config = builder.build()?.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.auth.encoding().unwrap(), KeyEncoding::Hex);
        assert!(config.auth.enforce_challenge);
        assert_eq!(config.auth.challenge_ttl_secs, 300);
        assert_eq!(config.rate_limit.protect_prefixes, vec!["/api/auth".to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        env::set_var("APP__ENV", "nonexistent-profile");
        env::set_var("APP__SERVER__PORT", "9191");
        env::set_var("APP__AUTH__KEY_ENCODING", "base58");
        env::set_var("APP__AUTH__ENFORCE_CHALLENGE", "false");

        let config = load_config();

        env::remove_var("APP__ENV");
        env::remove_var("APP__SERVER__PORT");
        env::remove_var("APP__AUTH__KEY_ENCODING");
        env::remove_var("APP__AUTH__ENFORCE_CHALLENGE");

        let config = config.unwrap();
        assert_eq!(config.server.port, 9191);
        assert_eq!(config.auth.encoding().unwrap(), KeyEncoding::Base58);
        assert!(!config.auth.enforce_challenge);
        assert_eq!(config.auth.session_ttl_secs, 86_400);
    }

    #[test]
    #[serial]
    fn test_unknown_encoding_rejected() {
        env::set_var("APP__ENV", "nonexistent-profile");
        env::set_var("APP__AUTH__KEY_ENCODING", "bech32");

        let result = load_config();

        env::remove_var("APP__ENV");
        env::remove_var("APP__AUTH__KEY_ENCODING");

        assert!(result.is_err());
    }
}

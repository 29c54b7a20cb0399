//! Redis store for AI scores that passed validation
//!
//! Entries live under `risk_score:<sha256>` and expire after a week unless
//! `RISK_ENGINE_CACHE_TTL` says otherwise. The cache is optional: the scorer
//! treats every error here as a miss.

use redis::{AsyncCommands, Client};
use serde::{Serialize, de::DeserializeOwned};

const ENV_REDIS_HOST: &str = "RISK_ENGINE_REDIS_HOST";
const ENV_REDIS_PORT: &str = "RISK_ENGINE_REDIS_PORT";
const ENV_REDIS_PASSWORD: &str = "RISK_ENGINE_REDIS_PASSWORD";
const ENV_REDIS_DB: &str = "RISK_ENGINE_REDIS_DB";
const ENV_CACHE_TTL: &str = "RISK_ENGINE_CACHE_TTL";

const SCORE_NAMESPACE: &str = "risk_score";
const WEEK_SECONDS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CacheError {
    #[error("Redis connection error: {0}")]
    Connection(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Cache miss for key: {0}")]
    Miss(String),
}

/// Where the score cache lives and how long entries survive
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: u32,
    pub ttl_seconds: u64,
}

impl CacheSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any variable source; unparsable values fall back to defaults
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            host: read(ENV_REDIS_HOST).unwrap_or_else(|| "127.0.0.1".to_string()),
            port: read(ENV_REDIS_PORT).and_then(|v| v.parse().ok()).unwrap_or(6379),
            password: read(ENV_REDIS_PASSWORD),
            db: read(ENV_REDIS_DB).and_then(|v| v.parse().ok()).unwrap_or(0),
            ttl_seconds: read(ENV_CACHE_TTL)
                .and_then(|v| v.parse().ok())
                .unwrap_or(WEEK_SECONDS),
        }
    }

    /// `redis://[:password@]host:port/db`
    pub fn url(&self) -> String {
        let auth = self
            .password
            .as_deref()
            .map(|p| format!(":{}@", p))
            .unwrap_or_default();
        format!("redis://{}{}:{}/{}", auth, self.host, self.port, self.db)
    }
}

/// Shared handle to the score cache
#[derive(Clone)]
pub struct ScoreCache {
    client: Client,
    ttl_seconds: u64,
}

impl ScoreCache {
    /// Connect using `RISK_ENGINE_REDIS_*` and `RISK_ENGINE_CACHE_TTL`
    pub async fn new() -> Result<Self, CacheError> {
        Self::connect(CacheSettings::from_env()).await
    }

    /// Open a client and PING once so an unreachable server fails early
    pub async fn connect(settings: CacheSettings) -> Result<Self, CacheError> {
        tracing::debug!(host = %settings.host, port = settings.port, db = settings.db, "Connecting to score cache");

        let client = Client::open(settings.url())?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        tracing::info!(
            host = %settings.host,
            port = settings.port,
            ttl_seconds = settings.ttl_seconds,
            "Score cache ready"
        );

        Ok(Self {
            client,
            ttl_seconds: settings.ttl_seconds,
        })
    }

    pub async fn get_score<T: DeserializeOwned>(&self, key_hash: &str) -> Result<T, CacheError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let stored: Option<String> = conn.get(score_key(key_hash)).await?;
        let json = stored.ok_or_else(|| CacheError::Miss(key_hash.to_string()))?;
        serde_json::from_str(&json).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    pub async fn set_score<T: Serialize>(&self, key_hash: &str, scores: &T) -> Result<(), CacheError> {
        let json =
            serde_json::to_string(scores).map_err(|e| CacheError::Serialization(e.to_string()))?;
        let key = score_key(key_hash);

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(&key, json, self.ttl_seconds).await?;

        tracing::debug!(key = %key, ttl_seconds = self.ttl_seconds, "Stored AI score");
        Ok(())
    }
}

fn score_key(key_hash: &str) -> String {
    format!("{}:{}", SCORE_NAMESPACE, key_hash)
}

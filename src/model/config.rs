use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_CONFIG_PATH: &str = "RISK_ENGINE_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

const ENV_AI_TIMEOUT_SECS: &str = "RISK_AI_TIMEOUT_SECS";
const ENV_AI_PACING_MS: &str = "RISK_AI_PACING_MS";
const ENV_MAX_CONCURRENCY: &str = "RISK_MAX_CONCURRENCY";
const ENV_AI_MAX_RETRIES: &str = "RISK_AI_MAX_RETRIES";
const ENV_AI_RETRY_DELAY_MS: &str = "RISK_AI_RETRY_DELAY_MS";
const ENV_PROFILE_DIR: &str = "RISK_PROFILE_DIR";

const DEFAULT_AI_TIMEOUT_SECS: u64 = 30;
const DEFAULT_AI_PACING_MS: u64 = 500;
const DEFAULT_MAX_CONCURRENCY: usize = 1;
const DEFAULT_AI_MAX_RETRIES: u32 = 2;
const DEFAULT_AI_RETRY_DELAY_MS: u64 = 500;

/// Orchestrator tuning
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// Upper bound on the AI path for one threat, retries included; a timeout
    /// triggers fallback
    #[serde(default = "default_ai_timeout_secs")]
    pub ai_timeout_secs: u64,
    /// Minimum spacing between AI calls across all workers
    #[serde(default = "default_ai_pacing_ms")]
    pub ai_pacing_ms: u64,
    /// Threats scored in parallel within one run (1 = sequential)
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Extra AI attempts after a failed request; each one waits its pacing turn
    #[serde(default = "default_ai_max_retries")]
    pub ai_max_retries: u32,
    /// First retry backoff, doubled on every further attempt
    #[serde(default = "default_ai_retry_delay_ms")]
    pub ai_retry_delay_ms: u64,
}

fn default_ai_timeout_secs() -> u64 {
    DEFAULT_AI_TIMEOUT_SECS
}

fn default_ai_pacing_ms() -> u64 {
    DEFAULT_AI_PACING_MS
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_ai_max_retries() -> u32 {
    DEFAULT_AI_MAX_RETRIES
}

fn default_ai_retry_delay_ms() -> u64 {
    DEFAULT_AI_RETRY_DELAY_MS
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ai_timeout_secs: DEFAULT_AI_TIMEOUT_SECS,
            ai_pacing_ms: DEFAULT_AI_PACING_MS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            ai_max_retries: DEFAULT_AI_MAX_RETRIES,
            ai_retry_delay_ms: DEFAULT_AI_RETRY_DELAY_MS,
        }
    }
}

impl EngineSettings {
    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_secs)
    }

    pub fn ai_pacing(&self) -> Duration {
        Duration::from_millis(self.ai_pacing_ms)
    }

    pub fn concurrency(&self) -> usize {
        self.max_concurrency.max(1)
    }

    /// Backoff before retry number `attempt` (0-based)
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.ai_retry_delay_ms.saturating_mul(factor))
    }
}

/// Where to find extra domain profiles besides the built-in ones
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileSources {
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// YAML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub profiles: ProfileSources,
}

/// Application configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub engine: EngineSettings,
    pub profiles: ProfileSources,
}

impl Config {
    /// Load configuration from the config file, then apply environment overrides
    pub fn from_env() -> Self {
        let config_path =
            std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let file = Self::load_config_file(&config_path).unwrap_or_default();

        let mut config = Self {
            engine: file.engine,
            profiles: file.profiles,
        };
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Some(secs) = env_parse(ENV_AI_TIMEOUT_SECS) {
            self.engine.ai_timeout_secs = secs;
        }
        if let Some(ms) = env_parse(ENV_AI_PACING_MS) {
            self.engine.ai_pacing_ms = ms;
        }
        if let Some(n) = env_parse(ENV_MAX_CONCURRENCY) {
            self.engine.max_concurrency = n;
        }
        if let Some(n) = env_parse(ENV_AI_MAX_RETRIES) {
            self.engine.ai_max_retries = n;
        }
        if let Some(ms) = env_parse(ENV_AI_RETRY_DELAY_MS) {
            self.engine.ai_retry_delay_ms = ms;
        }
        if let Ok(dir) = std::env::var(ENV_PROFILE_DIR)
            && !dir.trim().is_empty()
        {
            self.profiles.directory = Some(PathBuf::from(dir));
        }
    }

    /// Load configuration from YAML file
    fn load_config_file(path: &str) -> Option<ConfigFile> {
        let path = Path::new(path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return None;
        }

        match fs::read_to_string(path) {
            Ok(contents) => Self::parse_config(path, &contents),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                None
            }
        }
    }

    fn parse_config(path: &Path, contents: &str) -> Option<ConfigFile> {
        let contents = contents.trim();
        if contents.is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Some(ConfigFile::default());
        }

        match serde_yaml::from_str(contents) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "Loaded configuration from file");
                Some(config)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to parse config file, using defaults");
                None
            }
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

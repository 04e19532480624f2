use config::{Config, ConfigError, Environment, File};
use crate::models::{ScoringWeights, Strategy};
use serde::Deserialize;
use std::path::Path;

const ENV_PREFIX: &str = "VILLAGE";

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    #[serde(default)]
    pub store: StoreSettings,
    pub appwrite: AppwriteSettings,
    pub collection: CollectionSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Which adapters back the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// PostgreSQL ledger and connections, Appwrite profiles and delivery
    #[default]
    Postgres,
    /// Everything in process; state is lost on restart
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppwriteSettings {
    pub endpoint: String,
    pub api_key: String,
    pub project_id: String,
    pub database_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionSettings {
    pub profiles: String,
    pub filter_preferences: String,
    pub blocks: String,
    pub notifications: String,
    pub chat_threads: String,
    pub messages: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSettings {
    /// Unset runs with the in-process cache only
    pub redis_url: Option<String>,
    pub ttl_secs: Option<u64>,
    pub l1_cache_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default)]
    pub default_strategy: Strategy,
    #[serde(default = "default_limit")]
    pub default_limit: u16,
    #[serde(default = "default_max_limit")]
    pub max_limit: u16,
    /// Seconds between passes over the pending re-check queue; 0 disables
    #[serde(default = "default_recheck_interval")]
    pub recheck_interval_secs: u64,
    #[serde(default = "default_stage_window")]
    pub same_stage_window_months: u16,
    #[serde(default = "default_candidate_fetch_limit")]
    pub candidate_fetch_limit: usize,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            default_strategy: Strategy::default(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            recheck_interval_secs: default_recheck_interval(),
            same_stage_window_months: default_stage_window(),
            candidate_fetch_limit: default_candidate_fetch_limit(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_limit() -> u16 { 20 }
fn default_max_limit() -> u16 { 100 }
fn default_recheck_interval() -> u64 { 30 }
fn default_stage_window() -> u16 { 12 }
fn default_candidate_fetch_limit() -> usize { 500 }
fn default_event_capacity() -> usize { 256 }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weights: WeightsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_location_weight")]
    pub location: f64,
    #[serde(default = "default_child_age_weight")]
    pub child_age: f64,
    #[serde(default = "default_interests_weight")]
    pub interests: f64,
    #[serde(default = "default_lifestyle_weight")]
    pub lifestyle: f64,
    #[serde(default = "default_priority_multiplier")]
    pub lifestyle_priority_multiplier: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            location: default_location_weight(),
            child_age: default_child_age_weight(),
            interests: default_interests_weight(),
            lifestyle: default_lifestyle_weight(),
            lifestyle_priority_multiplier: default_priority_multiplier(),
        }
    }
}

fn default_location_weight() -> f64 { 0.30 }
fn default_child_age_weight() -> f64 { 0.30 }
fn default_interests_weight() -> f64 { 0.25 }
fn default_lifestyle_weight() -> f64 { 0.15 }
fn default_priority_multiplier() -> f64 { 2.0 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Later sources override earlier ones:
    /// 1. `config/default.toml`
    /// 2. `config/local.toml` (development overrides)
    /// 3. Environment variables, e.g. `VILLAGE__SERVER__PORT` -> `server.port`
    /// 4. `DATABASE_URL` -> `database.url`
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(env_source())
            .build()?;

        apply_database_url(settings)?.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(env_source())
            .build()?;

        apply_database_url(settings)?.try_deserialize()
    }

    /// Scoring weights assembled from `scoring.weights` and the stage window
    pub fn scoring_weights(&self) -> ScoringWeights {
        let w = &self.scoring.weights;
        ScoringWeights {
            location: w.location,
            child_age: w.child_age,
            interests: w.interests,
            lifestyle: w.lifestyle,
            lifestyle_priority_multiplier: w.lifestyle_priority_multiplier,
            same_stage_window_months: self.matching.same_stage_window_months,
        }
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// The conventional `DATABASE_URL` wins over file and prefixed values
fn apply_database_url(settings: Config) -> Result<Config, ConfigError> {
    match std::env::var("DATABASE_URL") {
        Ok(url) if !url.is_empty() => Config::builder()
            .add_source(settings)
            .set_override("database.url", url)?
            .build(),
        _ => Ok(settings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    const MINIMAL: &str = r#"
        [server]
        host = "127.0.0.1"
        port = 8080

        [appwrite]
        endpoint = "http://localhost/v1"
        api_key = "key"
        project_id = "project"
        database_id = "db"

        [collection]
        profiles = "profiles"
        filter_preferences = "filter_preferences"
        blocks = "blocks"
        notifications = "notifications"
        chat_threads = "chat_threads"
        messages = "messages"

        [database]
        url = "postgres://localhost/village"
    "#;

    fn parse(extra: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(&format!("{}\n{}", MINIMAL, extra), FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_default_weights() {
        let weights = WeightsConfig::default();
        assert_eq!(weights.location, 0.30);
        assert_eq!(weights.child_age, 0.30);
        assert_eq!(weights.interests, 0.25);
        assert_eq!(weights.lifestyle, 0.15);
        assert_eq!(weights.lifestyle_priority_multiplier, 2.0);
    }

    #[test]
    fn test_default_logging() {
        let logging = LoggingSettings::default();
        assert_eq!(logging.level, "info");
        assert_eq!(logging.format, "json");
    }

    #[test]
    fn test_optional_sections_default() {
        let settings = parse("");

        assert_eq!(settings.store.backend, StoreBackend::Postgres);
        assert!(settings.cache.redis_url.is_none());
        assert_eq!(settings.matching.default_strategy, Strategy::Recommended);
        assert_eq!(settings.matching.default_limit, 20);
        assert_eq!(settings.matching.recheck_interval_secs, 30);
        assert_eq!(settings.scoring_weights().same_stage_window_months, 12);
    }

    #[test]
    fn test_matching_overrides() {
        let settings = parse(
            r#"
            [store]
            backend = "memory"

            [matching]
            default_strategy = "same_stage"
            same_stage_window_months = 6

            [scoring.weights]
            location = 0.5
            "#,
        );

        assert_eq!(settings.store.backend, StoreBackend::Memory);
        assert_eq!(settings.matching.default_strategy, Strategy::SameStage);

        let weights = settings.scoring_weights();
        assert_eq!(weights.location, 0.5);
        assert_eq!(weights.child_age, 0.30);
        assert_eq!(weights.same_stage_window_months, 6);
    }
}

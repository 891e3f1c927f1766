use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, WayfarerError};

/// Top-level configuration for the Wayfarer service.
///
/// Loaded from `~/.wayfarer/config.toml` by default. Every section is
/// optional and falls back to its defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WayfarerConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub dialogue: DialogueConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl WayfarerConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: WayfarerConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values that would make the service misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.session.history_window == 0 {
            return Err(WayfarerError::Config(
                "session.history_window must be at least 1".to_string(),
            ));
        }
        if self.session.max_message_chars == 0 {
            return Err(WayfarerError::Config(
                "session.max_message_chars must be at least 1".to_string(),
            ));
        }
        let timeouts = [
            ("aggregator.weather_timeout_ms", self.aggregator.weather_timeout_ms),
            ("aggregator.events_timeout_ms", self.aggregator.events_timeout_ms),
            ("aggregator.search_timeout_ms", self.aggregator.search_timeout_ms),
            ("dialogue.turn_deadline_ms", self.dialogue.turn_deadline_ms),
            ("dialogue.generation_timeout_ms", self.dialogue.generation_timeout_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(WayfarerError::Config(format!("{} must be non-zero", name)));
            }
        }
        if self.dialogue.max_trip_days < 2 {
            return Err(WayfarerError::Config(
                "dialogue.max_trip_days must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Session lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a session is eligible for eviction.
    pub idle_timeout_minutes: u32,
    /// How often the background sweeper evicts idle sessions.
    pub sweep_interval_secs: u64,
    /// Maximum number of recent turns fed back into generation.
    pub history_window: usize,
    /// Longer user messages are truncated to this many characters.
    pub max_message_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: 60,
            sweep_interval_secs: 60,
            history_window: 12,
            max_message_chars: 4000,
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.idle_timeout_minutes) * 60)
    }
}

/// Data aggregator timeouts, cache freshness and result limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub weather_timeout_ms: u64,
    pub events_timeout_ms: u64,
    pub search_timeout_ms: u64,
    pub weather_ttl_secs: u64,
    pub events_ttl_secs: u64,
    pub search_ttl_secs: u64,
    pub max_events: usize,
    pub max_search_results: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            weather_timeout_ms: 4_000,
            events_timeout_ms: 6_000,
            search_timeout_ms: 8_000,
            weather_ttl_secs: 600,
            events_ttl_secs: 3_600,
            search_ttl_secs: 1_800,
            max_events: 8,
            max_search_results: 5,
        }
    }
}

/// Turn handling: deadlines, generation and trip-length policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Overall budget for aggregation plus generation in one turn.
    pub turn_deadline_ms: u64,
    pub generation_timeout_ms: u64,
    /// Days planned when a multi-day request gives no count. Clamped to 3..=5.
    pub default_trip_days: u8,
    /// Upper bound for explicit day counts.
    pub max_trip_days: u8,
    /// Ask the generator for the city when the heuristics find none.
    pub llm_city_fallback: bool,
    pub city_fallback_timeout_ms: u64,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            turn_deadline_ms: 30_000,
            generation_timeout_ms: 20_000,
            default_trip_days: 4,
            max_trip_days: 14,
            llm_city_fallback: false,
            city_fallback_timeout_ms: 3_000,
        }
    }
}

/// External provider endpoints and credentials.
///
/// API keys are never stored in the file; each `*_key_env` names the
/// environment variable that holds the key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openweather_base_url: String,
    pub openweather_key_env: String,
    pub serpapi_base_url: String,
    pub serpapi_key_env: String,
    pub tavily_base_url: String,
    pub tavily_key_env: String,
    pub gemini_base_url: String,
    pub gemini_key_env: String,
    pub gemini_model: String,
    pub temperature: f32,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openweather_base_url: "https://api.openweathermap.org".to_string(),
            openweather_key_env: "OPENWEATHER_API_KEY".to_string(),
            serpapi_base_url: "https://serpapi.com".to_string(),
            serpapi_key_env: "SERPAPI_API_KEY".to_string(),
            tavily_base_url: "https://api.tavily.com".to_string(),
            tavily_key_env: "TAVILY_API_KEY".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            gemini_key_env: "GEMINI_API_KEY".to_string(),
            gemini_model: "gemini-2.0-flash".to_string(),
            temperature: 0.3,
        }
    }
}

impl ProvidersConfig {
    /// Read an API key from the named environment variable, ignoring blanks.
    pub fn key_from_env(var: &str) -> Option<String> {
        std::env::var(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

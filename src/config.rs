use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Main configuration structure for the concierge service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub chat: ChatConfig,
    pub stocks: StocksConfig,
    pub evaluation: EvaluationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub bind: String,
    #[serde(default)]
    pub bearer_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Missing key leaves the generator disabled; every call then takes the fallback path
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Attach the web-search grounding tool to every request
    pub grounding: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub greeting: String,
    pub recommendation_count: usize,
    pub placeholder_images: Vec<String>,
    /// Seed for comparison filler phrases; unset draws from entropy
    #[serde(default)]
    pub phrase_seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StocksConfig {
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub messages: Vec<String>,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryConfig {
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Config {
    /// Load configuration from file with environment variable overrides
    /// ALWAYS returns a valid config - never fails
    pub fn load() -> Self {
        let env_paths = ["../.env", ".env"];

        let mut env_loaded = false;
        for path in &env_paths {
            if dotenvy::from_path(path).is_ok() {
                tracing::info!("Loaded .env from: {}", path);
                env_loaded = true;
                break;
            }
        }

        if !env_loaded {
            tracing::warn!("No .env file found - continuing with env vars only");
        }

        let config_path =
            env::var("CONCIERGE_CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = Self::from_file(&config_path);
        config.apply_env_overrides();

        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    fn from_file(config_path: &str) -> Self {
        if !Path::new(config_path).exists() {
            tracing::warn!("Config file not found at {} - using defaults", config_path);
            return Self::default();
        }

        match fs::read_to_string(config_path) {
            Ok(contents) => match serde_yaml::from_str::<Config>(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", config_path);
                    config
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to parse config file {}: {} - using defaults",
                        config_path,
                        e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                tracing::error!(
                    "Failed to read config file {}: {} - using defaults",
                    config_path,
                    e
                );
                Self::default()
            }
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(bind) = env::var("CONCIERGE_HTTP_BIND") {
            self.server.bind = bind;
        }
        if let Ok(token) = env::var("CONCIERGE_BEARER_TOKEN") {
            self.server.bearer_token = Some(token).filter(|t| !t.is_empty());
        }

        // Gemini overrides
        if let Ok(api_key) = env::var("GEMINI_API_KEY") {
            self.gemini.api_key = Some(api_key).filter(|k| !k.trim().is_empty());
        }
        if let Ok(model) = env::var("GEMINI_MODEL") {
            self.gemini.model = model;
        }
        if let Ok(base_url) = env::var("GEMINI_BASE_URL") {
            self.gemini.base_url = base_url;
        }
        if let Ok(grounding) = env::var("GEMINI_GROUNDING") {
            if let Ok(flag) = grounding.parse() {
                self.gemini.grounding = flag;
            }
        }

        if let Ok(seed) = env::var("CONCIERGE_PHRASE_SEED") {
            self.chat.phrase_seed = seed.parse().ok();
        }

        if let Ok(attempts) = env::var("CONCIERGE_EVAL_ATTEMPTS") {
            if let Ok(n) = attempts.parse() {
                self.evaluation.retry.max_attempts = n;
            }
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.gemini.api_key.is_none() {
            return Err("GEMINI_API_KEY is not set; generation is disabled".into());
        }
        if self.gemini.model.trim().is_empty() {
            return Err("gemini.model cannot be empty".into());
        }
        if self.chat.placeholder_images.is_empty() {
            return Err("chat.placeholder_images must list at least one image".into());
        }
        if self.chat.recommendation_count == 0 {
            return Err("chat.recommendation_count cannot be 0".into());
        }
        if self.evaluation.retry.max_attempts == 0 {
            return Err("evaluation.retry.max_attempts cannot be 0".into());
        }
        if self.evaluation.retry.initial_delay_ms > self.evaluation.retry.max_delay_ms {
            return Err("evaluation.retry.initial_delay_ms exceeds max_delay_ms".into());
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "concierge".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                bind: "127.0.0.1:8787".to_string(),
                bearer_token: None,
            },
            gemini: GeminiConfig {
                api_key: env::var("GEMINI_API_KEY")
                    .ok()
                    .filter(|k| !k.trim().is_empty()),
                model: "gemini-2.0-flash".to_string(),
                base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
                grounding: true,
            },
            chat: ChatConfig {
                greeting: "Hello! How can I help you find the perfect hotel today?".to_string(),
                recommendation_count: 5,
                placeholder_images: default_placeholder_images(),
                phrase_seed: None,
            },
            stocks: StocksConfig {
                symbols: ["AAPL", "GOOGL", "MSFT", "TSLA", "NVDA"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
            evaluation: EvaluationConfig {
                messages: [
                    "I need to stay near the sea in Shenzhen",
                    "Looking for luxury hotels with swimming pool in Shenzhen",
                    "Budget accommodation near business district in Shenzhen",
                    "Family-friendly hotel with kids activities in Shenzhen",
                    "Stay near the train station in Shenzhen",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
                retry: RetryConfig {
                    max_attempts: 3,
                    initial_delay_ms: 1000,
                    max_delay_ms: 8000,
                },
            },
        }
    }
}

fn default_placeholder_images() -> Vec<String> {
    [
        "photo-1566073771259-6a8506099945",
        "photo-1571896349842-33c89424de2d",
        "photo-1582719478250-c89cae4dc85b",
        "photo-1564501049412-61c2a3083791",
        "photo-1520250497591-112f2f40a3f4",
        "photo-1578683010236-d716f9a3f461",
        "photo-1551882547-ff40c63fe5fa",
        "photo-1590490360182-c33d57733427",
        "photo-1445019980597-93fa8acb246c",
        "photo-1542314831-068cd1dbfeeb",
    ]
    .iter()
    .map(|id| {
        format!(
            "https://images.unsplash.com/{id}?w=300&h=200&fit=crop&crop=center&q=80&auto=format"
        )
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_hotel_chat() {
        let cfg = Config::default();
        assert_eq!(cfg.chat.recommendation_count, 5);
        assert_eq!(cfg.chat.placeholder_images.len(), 10);
        assert_eq!(cfg.gemini.model, "gemini-2.0-flash");
        assert!(cfg.gemini.grounding);
        assert_eq!(cfg.evaluation.retry.max_attempts, 3);
        assert_eq!(cfg.stocks.symbols[0], "AAPL");
    }

    #[test]
    fn missing_api_key_is_a_validation_warning() {
        let mut cfg = Config::default();
        cfg.gemini.api_key = None;
        assert!(cfg.validate().is_err());
        cfg.gemini.api_key = Some("key".to_string());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn yaml_round_trips_through_serde() {
        let cfg = Config::default();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.chat.greeting, cfg.chat.greeting);
        assert_eq!(parsed.evaluation.messages.len(), 5);
    }

    #[test]
    fn example_config_parses() {
        let cfg: Config = serde_yaml::from_str(include_str!("../config.example.yaml")).unwrap();
        assert_eq!(cfg.chat.placeholder_images.len(), 5);
        assert!(cfg.chat.phrase_seed.is_none());
        assert!(cfg.gemini.api_key.is_none());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unreadable_path_falls_back_to_defaults() {
        let cfg = Config::from_file("/definitely/not/here/config.yaml");
        assert_eq!(cfg.server.name, "concierge");
    }
}

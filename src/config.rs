use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub push: PushConfig,
    pub market: MarketConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub limiter: LimiterConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path of the persisted watchlist document
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String {
    "watchlist.json".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// Wall-clock time of the daily push, "HH:MM"
    #[serde(default = "default_daily_time")]
    pub daily_time: String,
    /// Seconds between scheduler wake-ups
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Upper bound on a single outbound call (quote fetch, send)
    #[serde(default = "default_outbound_timeout_secs")]
    pub outbound_timeout_secs: u64,
}

fn default_daily_time() -> String {
    "15:05".to_string()
}

fn default_tick_secs() -> u64 {
    60
}

fn default_outbound_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// Quote endpoint, queried as `{quote_url}/quote?symbol=sh600519`
    pub quote_url: String,
    /// Index benchmarks included in every snapshot
    #[serde(default = "default_indices")]
    pub indices: Vec<IndexBenchmark>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexBenchmark {
    pub symbol: String,
    pub label: String,
}

fn default_indices() -> Vec<IndexBenchmark> {
    vec![
        IndexBenchmark {
            symbol: "sh000001".to_string(),
            label: "SSE Composite".to_string(),
        },
        IndexBenchmark {
            symbol: "sz399001".to_string(),
            label: "SZSE Component".to_string(),
        },
        IndexBenchmark {
            symbol: "sz399006".to_string(),
            label: "ChiNext".to_string(),
        },
    ]
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GatewayConfig {
    /// Delivery webhook per group id
    #[serde(default)]
    pub webhooks: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LimiterConfig {
    /// User ids exempt from rate limiting
    #[serde(default)]
    pub admin_users: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("store.path", "watchlist.json")?
            .set_default("push.daily_time", "15:05")?
            .set_default("push.tick_secs", 60)?
            .set_default("push.outbound_timeout_secs", 10)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("TICKWATCH_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (TICKWATCH_MARKET__QUOTE_URL, etc.)
            .add_source(
                Environment::with_prefix("TICKWATCH")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.store.path.trim().is_empty() {
            errors.push("store.path must not be empty".to_string());
        }

        if parse_daily_time(&self.push.daily_time).is_none() {
            errors.push(format!(
                "push.daily_time is not a valid HH:MM time: {}",
                self.push.daily_time
            ));
        }

        if self.push.tick_secs == 0 {
            errors.push("push.tick_secs must be positive".to_string());
        }

        if self.push.outbound_timeout_secs == 0 {
            errors.push("push.outbound_timeout_secs must be positive".to_string());
        }

        if self.market.quote_url.trim().is_empty() {
            errors.push("market.quote_url must not be empty".to_string());
        }

        for index in &self.market.indices {
            if index.symbol.trim().is_empty() || index.label.trim().is_empty() {
                errors.push("market.indices entries need both symbol and label".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Parse "HH:MM" into (hour, minute)
pub fn parse_daily_time(text: &str) -> Option<(u32, u32)> {
    let (hh, mm) = text.split_once(':')?;
    let hour: u32 = hh.parse().ok()?;
    let minute: u32 = mm.parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

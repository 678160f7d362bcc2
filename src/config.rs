use crate::db::migrations::BUSY_TIMEOUT_MS;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Channel used for orders that do not name one.
    pub default_channel: String,
    /// ISO currency code stamped on new orders.
    pub currency: String,
    pub notify_webhook_url: Option<String>,
    /// Total time budget for retrying a transaction on lock conflicts.
    ///
    /// A conflict only surfaces after waiting out SQLite's `busy_timeout`, so
    /// the budget must be longer than that or no retry ever starts.
    pub tx_retry_max_ms: u64,
}

/// Room for two retries after the first lock wait.
const DEFAULT_TX_RETRY_MAX_MS: u64 = 3 * BUSY_TIMEOUT_MS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let default_channel = env_map
            .get("DEFAULT_CHANNEL")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| "web".to_string());
        if default_channel.is_empty() {
            return Err(ConfigError::InvalidValue(
                "DEFAULT_CHANNEL".to_string(),
                "must not be empty".to_string(),
            ));
        }

        let currency = env_map
            .get("CURRENCY")
            .map(|s| s.trim().to_uppercase())
            .unwrap_or_else(|| "RUB".to_string());
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::InvalidValue(
                "CURRENCY".to_string(),
                format!("must be a three-letter code, got {}", currency),
            ));
        }

        let notify_webhook_url = env_map
            .get("NOTIFY_WEBHOOK_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if let Some(url) = &notify_webhook_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue(
                    "NOTIFY_WEBHOOK_URL".to_string(),
                    "must be an http(s) URL".to_string(),
                ));
            }
        }

        let tx_retry_max_ms = match env_map.get("TX_RETRY_MAX_MS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue(
                    "TX_RETRY_MAX_MS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?,
            None => DEFAULT_TX_RETRY_MAX_MS,
        };
        if tx_retry_max_ms <= BUSY_TIMEOUT_MS {
            return Err(ConfigError::InvalidValue(
                "TX_RETRY_MAX_MS".to_string(),
                format!("must exceed the SQLite busy timeout of {} ms", BUSY_TIMEOUT_MS),
            ));
        }

        Ok(Config {
            port,
            database_path,
            default_channel,
            currency,
            notify_webhook_url,
            tx_retry_max_ms,
        })
    }

    /// Configuration for tests and embedded use: defaults plus a database path.
    pub fn for_database(database_path: impl Into<String>) -> Self {
        Config {
            port: 8080,
            database_path: database_path.into(),
            default_channel: "web".to_string(),
            currency: "RUB".to_string(),
            notify_webhook_url: None,
            tx_retry_max_ms: DEFAULT_TX_RETRY_MAX_MS,
        }
    }

    pub fn tx_retry_max(&self) -> Duration {
        Duration::from_millis(self.tx_retry_max_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.default_channel, "web");
        assert_eq!(config.currency, "RUB");
        assert_eq!(config.notify_webhook_url, None);
        assert_eq!(config.tx_retry_max(), Duration::from_millis(15_000));
        assert!(config.tx_retry_max() > Duration::from_millis(BUSY_TIMEOUT_MS));
        assert_eq!(
            Config::for_database("/tmp/x.db").tx_retry_max(),
            config.tx_retry_max()
        );
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_currency_is_normalized_and_checked() {
        let mut env_map = setup_required_env();
        env_map.insert("CURRENCY".to_string(), "eur".to_string());
        assert_eq!(Config::from_env_map(env_map.clone()).unwrap().currency, "EUR");

        env_map.insert("CURRENCY".to_string(), "euro".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "CURRENCY"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_empty_default_channel() {
        let mut env_map = setup_required_env();
        env_map.insert("DEFAULT_CHANNEL".to_string(), "  ".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "DEFAULT_CHANNEL"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_webhook_url() {
        let mut env_map = setup_required_env();
        env_map.insert("NOTIFY_WEBHOOK_URL".to_string(), "".to_string());
        assert_eq!(Config::from_env_map(env_map.clone()).unwrap().notify_webhook_url, None);

        env_map.insert(
            "NOTIFY_WEBHOOK_URL".to_string(),
            "https://hooks.example.com/orders".to_string(),
        );
        assert_eq!(
            Config::from_env_map(env_map.clone()).unwrap().notify_webhook_url.as_deref(),
            Some("https://hooks.example.com/orders")
        );

        env_map.insert("NOTIFY_WEBHOOK_URL".to_string(), "ftp://nope".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "NOTIFY_WEBHOOK_URL"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_retry_budget() {
        let mut env_map = setup_required_env();
        env_map.insert("TX_RETRY_MAX_MS".to_string(), "-5".to_string());
        match Config::from_env_map(env_map.clone()) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "TX_RETRY_MAX_MS"),
            _ => panic!("Expected InvalidValue error"),
        }

        // A budget the first lock wait already exhausts.
        env_map.insert("TX_RETRY_MAX_MS".to_string(), "2000".to_string());
        match Config::from_env_map(env_map.clone()) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "TX_RETRY_MAX_MS"),
            _ => panic!("Expected InvalidValue error"),
        }

        env_map.insert("TX_RETRY_MAX_MS".to_string(), "20000".to_string());
        assert_eq!(
            Config::from_env_map(env_map).unwrap().tx_retry_max(),
            Duration::from_millis(20_000)
        );
    }
}

use crate::domain::{Asset, MarketResolver};
use crate::engine::BasisSmoothing;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub binance_api_url: String,
    pub rate_limit_calls: u32,
    pub rate_limit_period: Duration,
    pub rate_limit_max_wait: Duration,
    pub cache_backend: CacheBackendKind,
    pub cache_database_path: Option<String>,
    pub cache_default_ttl: Duration,
    pub cache_cleanup_interval: Duration,
    pub cache_prices_ttl: Duration,
    pub fetch_workers: usize,
    pub settlement_asset: Asset,
    pub quote_assets: Vec<Asset>,
    pub basis_smoothing: BasisSmoothing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Memory,
    Sqlite,
}

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
        let port = parse_or(&env_map, "PORT", 8080u16, "must be a valid u16")?;

        let binance_api_url = env_map
            .get("BINANCE_API_URL")
            .cloned()
            .unwrap_or_else(|| "https://api.binance.com".to_string());

        let rate_limit_calls =
            parse_or(&env_map, "RATE_LIMIT_CALLS", 1200u32, "must be a positive u32")?;
        if rate_limit_calls == 0 {
            return Err(ConfigError::InvalidValue(
                "RATE_LIMIT_CALLS".to_string(),
                "must be a positive u32".to_string(),
            ));
        }
        let rate_limit_period = secs(&env_map, "RATE_LIMIT_PERIOD_SECS", 60)?;
        let rate_limit_max_wait = Duration::from_secs(parse_or(
            &env_map,
            "RATE_LIMIT_MAX_WAIT_SECS",
            30u64,
            "must be a valid u64",
        )?);

        let cache_backend = match env_map
            .get("CACHE_BACKEND")
            .map(|s| s.as_str())
            .unwrap_or("memory")
        {
            "memory" => CacheBackendKind::Memory,
            "sqlite" => CacheBackendKind::Sqlite,
            other => {
                return Err(ConfigError::InvalidValue(
                    "CACHE_BACKEND".to_string(),
                    format!("must be memory or sqlite, got {}", other),
                ))
            }
        };

        let cache_database_path = env_map.get("CACHE_DATABASE_PATH").cloned();
        if cache_backend == CacheBackendKind::Sqlite && cache_database_path.is_none() {
            return Err(ConfigError::MissingEnv("CACHE_DATABASE_PATH".to_string()));
        }

        let cache_default_ttl = secs(&env_map, "CACHE_DEFAULT_TTL_SECS", 300)?;
        let cache_cleanup_interval = secs(&env_map, "CACHE_CLEANUP_INTERVAL_SECS", 60)?;
        let cache_prices_ttl = secs(&env_map, "CACHE_PRICES_TTL_SECS", 3600)?;

        let fetch_workers = parse_or(&env_map, "FETCH_WORKERS", 8usize, "must be a valid usize")?;
        if fetch_workers == 0 {
            return Err(ConfigError::InvalidValue(
                "FETCH_WORKERS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let settlement_asset = Asset::new(
            env_map
                .get("SETTLEMENT_ASSET")
                .map(|s| s.trim().to_ascii_uppercase())
                .unwrap_or_else(|| "USDT".to_string()),
        );

        let quote_assets: Vec<Asset> = env_map
            .get("QUOTE_ASSETS")
            .map(|s| s.as_str())
            .unwrap_or("USDT,USDC,FDUSD,BTC,ETH,BNB")
            .split(',')
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty())
            .map(Asset::new)
            .collect();

        let basis_smoothing = env_map
            .get("BASIS_SMOOTHING")
            .map(|s| s.as_str())
            .unwrap_or("forward")
            .parse::<BasisSmoothing>()
            .map_err(|e| ConfigError::InvalidValue("BASIS_SMOOTHING".to_string(), e))?;

        Ok(Config {
            port,
            binance_api_url,
            rate_limit_calls,
            rate_limit_period,
            rate_limit_max_wait,
            cache_backend,
            cache_database_path,
            cache_default_ttl,
            cache_cleanup_interval,
            cache_prices_ttl,
            fetch_workers,
            settlement_asset,
            quote_assets,
            basis_smoothing,
        })
    }

    pub fn market_resolver(&self) -> MarketResolver {
        MarketResolver::new(self.settlement_asset.clone(), self.quote_assets.clone())
    }
}

fn parse_or<T: std::str::FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
    expected: &str,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), expected.to_string())),
    }
}

/// A non-zero number of seconds.
fn secs(
    env_map: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let value = parse_or(env_map, key, default, "must be a positive number of seconds")?;
    if value == 0 {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be a positive number of seconds".to_string(),
        ));
    }
    Ok(Duration::from_secs(value))
}
